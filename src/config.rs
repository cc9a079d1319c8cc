use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};
use crate::overdue::{PricingLookup, SurchargePolicy};
use crate::types::CommunityId;

/// default number of commit attempts before giving up with `ConcurrentUpdate`
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 3;

/// ledger configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub concurrency: ConcurrencyConfig,
    pub pricing: PricingConfig,
}

/// optimistic concurrency settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// attempts per operation, including the first
    pub max_commit_attempts: u32,
}

/// surcharge pricing per community
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// applied to communities without an override
    pub default_surcharge: Option<SurchargePolicy>,
    pub community_surcharges: HashMap<CommunityId, SurchargePolicy>,
    /// communities exempt from surcharges regardless of the default
    pub exempt_communities: Vec<CommunityId>,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
        }
    }
}

impl LedgerConfig {
    /// configuration applying `policy` to every community
    pub fn with_default_surcharge(policy: SurchargePolicy) -> Self {
        Self {
            pricing: PricingConfig {
                default_surcharge: Some(policy),
                ..PricingConfig::default()
            },
            ..Self::default()
        }
    }

    /// override the surcharge for one community
    pub fn community_surcharge(
        mut self,
        community_id: CommunityId,
        policy: SurchargePolicy,
    ) -> Self {
        self.pricing.community_surcharges.insert(community_id, policy);
        self
    }

    pub fn max_commit_attempts(mut self, attempts: u32) -> Self {
        self.concurrency.max_commit_attempts = attempts;
        self
    }

    /// parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| LedgerError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| LedgerError::InvalidConfiguration {
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency.max_commit_attempts == 0 {
            return Err(LedgerError::InvalidConfiguration {
                message: "max_commit_attempts must be at least 1".to_string(),
            });
        }
        if let Some(policy) = &self.pricing.default_surcharge {
            policy.validate()?;
        }
        for policy in self.pricing.community_surcharges.values() {
            policy.validate()?;
        }
        Ok(())
    }
}

impl PricingLookup for PricingConfig {
    fn surcharge_policy(&self, community_id: CommunityId) -> Option<SurchargePolicy> {
        if self.exempt_communities.contains(&community_id) {
            return None;
        }
        self.community_surcharges
            .get(&community_id)
            .copied()
            .or(self.default_surcharge)
    }
}

impl PricingLookup for LedgerConfig {
    fn surcharge_policy(&self, community_id: CommunityId) -> Option<SurchargePolicy> {
        self.pricing.surcharge_policy(community_id)
    }
}
