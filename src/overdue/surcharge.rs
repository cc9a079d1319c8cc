use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Percentage};
use crate::errors::{LedgerError, Result};
use crate::types::CommunityId;

/// late-payment surcharge applied once when a charge turns overdue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SurchargePolicy {
    /// percentage of the charge amount
    Percentage(Percentage),
    /// fixed amount per overdue charge
    Flat(Money),
}

impl SurchargePolicy {
    /// surcharge owed on a charge of the given amount
    pub fn surcharge_for(&self, amount: Money) -> Money {
        match self {
            SurchargePolicy::Percentage(pct) => amount.percentage(*pct),
            SurchargePolicy::Flat(flat) => *flat,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            SurchargePolicy::Percentage(pct) if pct.is_negative() => {
                Err(LedgerError::InvalidConfiguration {
                    message: format!("surcharge percentage cannot be negative: {}", pct),
                })
            }
            SurchargePolicy::Flat(flat) if flat.is_negative() => {
                Err(LedgerError::InvalidConfiguration {
                    message: format!("flat surcharge cannot be negative: {}", flat),
                })
            }
            _ => Ok(()),
        }
    }
}

/// community pricing collaborator: which surcharge, if any, a community applies
pub trait PricingLookup {
    fn surcharge_policy(&self, community_id: CommunityId) -> Option<SurchargePolicy>;
}

/// pricing that never surcharges
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSurcharge;

impl PricingLookup for NoSurcharge {
    fn surcharge_policy(&self, _community_id: CommunityId) -> Option<SurchargePolicy> {
        None
    }
}

/// the same policy for every community
impl PricingLookup for SurchargePolicy {
    fn surcharge_policy(&self, _community_id: CommunityId) -> Option<SurchargePolicy> {
        Some(*self)
    }
}
