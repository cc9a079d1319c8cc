pub mod schedule;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{ChargeId, ChargeStatus, CommunityId, ContractId};

pub use schedule::{BillingSchedule, ScheduledCharge};

/// an amount owed by a contract for one billing period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub id: ChargeId,
    pub contract_id: ContractId,
    pub community_id: CommunityId,
    pub amount: Money,
    pub surcharge_amount: Money,
    pub due_date: NaiveDate,
    pub status: ChargeStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// optimistic row token, managed by the store
    pub version: u64,
}

/// input for creating a charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub contract_id: ContractId,
    pub community_id: CommunityId,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}

impl Charge {
    /// build a new, unpersisted charge
    pub fn new(request: ChargeRequest, today: NaiveDate, now: DateTime<Utc>) -> Result<Self> {
        if !request.amount.is_positive() {
            return Err(LedgerError::InvalidAmount {
                amount: request.amount,
            });
        }

        let mut charge = Self {
            id: Uuid::new_v4(),
            contract_id: request.contract_id,
            community_id: request.community_id,
            amount: request.amount,
            surcharge_amount: Money::ZERO,
            due_date: request.due_date,
            status: ChargeStatus::NotDue,
            notes: request.notes,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        charge.status = derive_status(&charge, Money::ZERO, today);
        Ok(charge)
    }

    /// amount plus any surcharge
    pub fn total_due(&self) -> Money {
        self.amount + self.surcharge_amount
    }

    /// what is still owed given the allocated total
    pub fn outstanding(&self, total_allocated: Money) -> Money {
        self.total_due().saturating_sub(total_allocated)
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == ChargeStatus::Cancelled
    }

    /// set status, returning the previous one when it changed
    pub fn transition(&mut self, status: ChargeStatus, now: DateTime<Utc>) -> Option<ChargeStatus> {
        self.updated_at = now;
        if self.status == status {
            return None;
        }
        let old = self.status;
        self.status = status;
        Some(old)
    }

    /// recompute status from the allocated total; terminal charges are left alone
    pub fn recompute_status(
        &mut self,
        total_allocated: Money,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Option<ChargeStatus> {
        if self.status.is_terminal() {
            self.updated_at = now;
            return None;
        }
        let status = derive_status(self, total_allocated, today);
        self.transition(status, now)
    }
}

/// Derive a charge's status from its allocated total.
///
/// `Cancelled` is sticky: a cancelled charge stays cancelled and this function
/// never produces it for any other charge.
pub fn derive_status(charge: &Charge, total_allocated: Money, today: NaiveDate) -> ChargeStatus {
    if charge.status.is_terminal() {
        return charge.status;
    }

    if total_allocated.is_zero() || total_allocated.is_negative() {
        if charge.due_date >= today {
            ChargeStatus::NotDue
        } else {
            ChargeStatus::Overdue
        }
    } else if total_allocated < charge.total_due() {
        ChargeStatus::PartiallyPaid
    } else {
        ChargeStatus::Paid
    }
}

/// deterministic charge ordering: due date, then creation time, then id
pub fn sort_charges(charges: &mut [Charge]) {
    charges.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}

/// balance of a single charge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeBalance {
    pub charge_id: ChargeId,
    pub status: ChargeStatus,
    pub total_due: Money,
    pub total_allocated: Money,
    pub outstanding: Money,
}

impl ChargeBalance {
    pub fn of(charge: &Charge, total_allocated: Money) -> Self {
        Self {
            charge_id: charge.id,
            status: charge.status,
            total_due: charge.total_due(),
            total_allocated,
            outstanding: charge.outstanding(total_allocated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn request(amount: Money, due_date: NaiveDate) -> ChargeRequest {
        ChargeRequest {
            contract_id: Uuid::new_v4(),
            community_id: Uuid::new_v4(),
            amount,
            due_date,
            notes: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 15, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_new_charge_initial_status() {
        let today = date(2024, 12, 15);

        let future =
            Charge::new(request(Money::from_major(1000), date(2025, 1, 1)), today, now()).unwrap();
        assert_eq!(future.status, ChargeStatus::NotDue);
        assert_eq!(future.surcharge_amount, Money::ZERO);

        let due_today = Charge::new(request(Money::from_major(1000), today), today, now()).unwrap();
        assert_eq!(due_today.status, ChargeStatus::NotDue);

        let past =
            Charge::new(request(Money::from_major(1000), date(2024, 12, 1)), today, now()).unwrap();
        assert_eq!(past.status, ChargeStatus::Overdue);
    }

    #[test]
    fn test_new_charge_rejects_non_positive_amount() {
        let today = date(2024, 12, 15);
        for amount in [Money::ZERO, Money::from_major(-5)] {
            let err = Charge::new(request(amount, today), today, now()).unwrap_err();
            assert_eq!(err, LedgerError::InvalidAmount { amount });
        }
    }

    #[test]
    fn test_status_function() {
        let today = date(2025, 1, 10);
        let mut charge =
            Charge::new(request(Money::from_major(1000), date(2025, 1, 1)), today, now()).unwrap();
        charge.surcharge_amount = Money::from_major(50);

        assert_eq!(derive_status(&charge, Money::ZERO, today), ChargeStatus::Overdue);
        assert_eq!(derive_status(&charge, Money::ZERO, date(2024, 12, 31)), ChargeStatus::NotDue);
        assert_eq!(
            derive_status(&charge, Money::from_major(600), today),
            ChargeStatus::PartiallyPaid
        );
        // amount alone does not settle a surcharged charge
        assert_eq!(
            derive_status(&charge, Money::from_major(1000), today),
            ChargeStatus::PartiallyPaid
        );
        assert_eq!(derive_status(&charge, Money::from_major(1050), today), ChargeStatus::Paid);

        charge.status = ChargeStatus::Cancelled;
        assert_eq!(derive_status(&charge, Money::ZERO, today), ChargeStatus::Cancelled);
    }

    #[test]
    fn test_recompute_reports_transitions() {
        let today = date(2025, 1, 10);
        let mut charge =
            Charge::new(request(Money::from_major(100), date(2025, 2, 1)), today, now()).unwrap();

        assert_eq!(
            charge.recompute_status(Money::from_major(40), today, now()),
            Some(ChargeStatus::NotDue)
        );
        assert_eq!(charge.status, ChargeStatus::PartiallyPaid);
        assert_eq!(charge.recompute_status(Money::from_major(40), today, now()), None);

        charge.status = ChargeStatus::Cancelled;
        assert_eq!(charge.recompute_status(Money::from_major(100), today, now()), None);
        assert_eq!(charge.status, ChargeStatus::Cancelled);
    }

    #[test]
    fn test_sort_is_deterministic() {
        let today = date(2025, 1, 1);
        let early = now();
        let late = early + chrono::Duration::hours(1);

        let a = Charge::new(request(Money::from_major(1), date(2025, 3, 1)), today, early).unwrap();
        let b = Charge::new(request(Money::from_major(2), date(2025, 2, 1)), today, late).unwrap();
        let c = Charge::new(request(Money::from_major(3), date(2025, 2, 1)), today, early).unwrap();

        let mut charges = vec![a.clone(), b.clone(), c.clone()];
        sort_charges(&mut charges);
        let ids: Vec<_> = charges.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![c.id, b.id, a.id]);
    }

    #[test]
    fn test_balance() {
        let today = date(2025, 1, 1);
        let charge = Charge::new(request(Money::from_major(1000), today), today, now()).unwrap();
        let balance = ChargeBalance::of(&charge, Money::from_major(600));
        assert_eq!(balance.total_due, Money::from_major(1000));
        assert_eq!(balance.outstanding, Money::from_major(400));
    }
}
