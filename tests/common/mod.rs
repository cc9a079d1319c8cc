#![allow(dead_code)]

use chrono::{NaiveDate, TimeZone, Utc};
use community_ledger::{
    ChargeRequest, CommunityId, CommunityLedger, ContractId, LedgerConfig, LedgerScope,
    MemoryStore, Money, PaymentMethod, PaymentRequest, SafeTimeProvider, TimeSource, Uuid,
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// test clock at 09:00 UTC of the given day
pub fn clock(y: i32, m: u32, d: u32) -> SafeTimeProvider {
    SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()))
}

pub fn money(s: &str) -> Money {
    Money::from_str_exact(s).unwrap()
}

/// one contract inside one community
pub struct Household {
    pub community_id: CommunityId,
    pub contract_id: ContractId,
}

impl Household {
    pub fn new() -> Self {
        Self {
            community_id: Uuid::new_v4(),
            contract_id: Uuid::new_v4(),
        }
    }

    pub fn in_community(community_id: CommunityId) -> Self {
        Self {
            community_id,
            contract_id: Uuid::new_v4(),
        }
    }

    pub fn scope(&self) -> LedgerScope {
        LedgerScope::contract(self.community_id, self.contract_id)
    }

    pub fn charge(&self, amount: &str, due_date: NaiveDate) -> ChargeRequest {
        ChargeRequest {
            contract_id: self.contract_id,
            community_id: self.community_id,
            amount: money(amount),
            due_date,
            notes: None,
        }
    }

    pub fn payment(&self, amount: &str, paid_on: NaiveDate) -> PaymentRequest {
        PaymentRequest {
            contract_id: self.contract_id,
            community_id: self.community_id,
            amount: money(amount),
            method: PaymentMethod::Transfer,
            paid_on,
            reference: None,
        }
    }
}

pub fn ledger() -> CommunityLedger<MemoryStore> {
    community_ledger::init_tracing();
    CommunityLedger::in_memory(LedgerConfig::default()).unwrap()
}
