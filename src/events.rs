use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{ChargeId, ChargeStatus, CommunityId, ContractId, PaymentId};

/// all events that can be emitted by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // charge events
    ChargeCreated {
        charge_id: ChargeId,
        contract_id: ContractId,
        community_id: CommunityId,
        amount: Money,
        due_date: NaiveDate,
        status: ChargeStatus,
        timestamp: DateTime<Utc>,
    },
    ChargeCancelled {
        charge_id: ChargeId,
        timestamp: DateTime<Utc>,
    },
    ChargeDeleted {
        charge_id: ChargeId,
        timestamp: DateTime<Utc>,
    },
    SurchargeApplied {
        charge_id: ChargeId,
        amount: Money,
        days_overdue: u32,
        timestamp: DateTime<Utc>,
    },
    SurchargeAdjusted {
        charge_id: ChargeId,
        old_amount: Money,
        new_amount: Money,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentRecorded {
        payment_id: PaymentId,
        contract_id: ContractId,
        amount: Money,
        paid_on: NaiveDate,
        timestamp: DateTime<Utc>,
    },
    AllocationApplied {
        payment_id: PaymentId,
        charge_id: ChargeId,
        applied_amount: Money,
        total_for_pair: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentVoided {
        payment_id: PaymentId,
        released_amount: Money,
        charges_affected: usize,
        timestamp: DateTime<Utc>,
    },

    // status change events
    StatusChanged {
        charge_id: ChargeId,
        old_status: ChargeStatus,
        new_status: ChargeStatus,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
