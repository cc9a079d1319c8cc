pub mod surcharge;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::days_past_due;
use crate::charges::Charge;
use crate::decimal::Money;
use crate::types::{ChargeId, ChargeStatus};

pub use surcharge::{NoSurcharge, PricingLookup, SurchargePolicy};

/// result of sweeping a single charge
#[derive(Debug, Clone, PartialEq)]
pub struct OverdueTransition {
    /// the charge with status and surcharge updated
    pub charge: Charge,
    pub surcharge_applied: Money,
    pub days_overdue: u32,
}

/// summary of one sweep pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub as_of: Option<NaiveDate>,
    /// charges examined as candidates
    pub examined: usize,
    /// charges moved to overdue, in processing order
    pub transitioned: Vec<ChargeId>,
    /// candidates not moved by this pass: they left NotDue before their
    /// update committed, or kept conflicting
    pub skipped: Vec<ChargeId>,
    pub total_surcharge: Money,
}

impl SweepReport {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of: Some(as_of),
            ..Self::default()
        }
    }

    pub fn is_noop(&self) -> bool {
        self.transitioned.is_empty()
    }
}

/// Flips past-due charges to overdue and applies the community surcharge.
///
/// Only charges still `NotDue` are candidates, so a charge that is already
/// overdue is never surcharged twice and rerunning a sweep changes nothing.
pub struct OverdueSweeper<'a, P: PricingLookup + ?Sized> {
    pricing: &'a P,
    today: NaiveDate,
    now: DateTime<Utc>,
}

impl<'a, P: PricingLookup + ?Sized> OverdueSweeper<'a, P> {
    pub fn new(pricing: &'a P, today: NaiveDate, now: DateTime<Utc>) -> Self {
        Self { pricing, today, now }
    }

    /// whether a charge should be picked up by this pass
    pub fn is_candidate(&self, charge: &Charge) -> bool {
        charge.status == ChargeStatus::NotDue && charge.due_date < self.today
    }

    /// plan the update for one charge; `None` when it is not a candidate
    pub fn sweep_charge(&self, charge: &Charge) -> Option<OverdueTransition> {
        if !self.is_candidate(charge) {
            return None;
        }

        let mut updated = charge.clone();
        updated.transition(ChargeStatus::Overdue, self.now);

        let surcharge_applied = match self.pricing.surcharge_policy(charge.community_id) {
            Some(policy) => {
                let surcharge = policy.surcharge_for(charge.amount).max(Money::ZERO);
                updated.surcharge_amount = surcharge;
                surcharge
            }
            None => Money::ZERO,
        };

        Some(OverdueTransition {
            charge: updated,
            surcharge_applied,
            days_overdue: days_past_due(charge.due_date, self.today),
        })
    }
}
