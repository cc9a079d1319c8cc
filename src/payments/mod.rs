pub mod allocation;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{AllocationId, ChargeId, CommunityId, ContractId, PaymentId, PaymentMethod};

pub use allocation::{AllocationEngine, AllocationPlan, ChargeState, StatusTransition, VoidPlan};

/// money received for a contract, independent of any charge until allocated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub contract_id: ContractId,
    pub community_id: CommunityId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub paid_on: NaiveDate,
    pub reference: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// optimistic row token, managed by the store
    pub version: u64,
}

/// payment request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub contract_id: ContractId,
    pub community_id: CommunityId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub paid_on: NaiveDate,
    pub reference: Option<String>,
}

impl Payment {
    /// build a new, unpersisted payment
    pub fn new(request: PaymentRequest, now: DateTime<Utc>) -> Result<Self> {
        if !request.amount.is_positive() {
            return Err(LedgerError::InvalidAmount {
                amount: request.amount,
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            contract_id: request.contract_id,
            community_id: request.community_id,
            amount: request.amount,
            method: request.method,
            paid_on: request.paid_on,
            reference: request.reference,
            is_active: true,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// portion of the payment not yet applied to any charge
    pub fn unallocated(&self, allocations: &[Allocation]) -> Money {
        self.amount.saturating_sub(allocated_total(self.id, allocations))
    }
}

/// how much of a payment was applied to one charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: AllocationId,
    pub payment_id: PaymentId,
    pub charge_id: ChargeId,
    pub applied_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Allocation {
    pub fn new(
        payment_id: PaymentId,
        charge_id: ChargeId,
        applied_amount: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id,
            charge_id,
            applied_amount,
            created_at: now,
            updated_at: now,
        }
    }
}

/// one requested (charge, amount) pair of an allocation call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub charge_id: ChargeId,
    pub applied_amount: Money,
}

impl AllocationLine {
    pub fn new(charge_id: ChargeId, applied_amount: Money) -> Self {
        Self {
            charge_id,
            applied_amount,
        }
    }
}

/// total applied by a payment across the given rows
pub fn allocated_total(payment_id: PaymentId, allocations: &[Allocation]) -> Money {
    allocations
        .iter()
        .filter(|a| a.payment_id == payment_id)
        .map(|a| a.applied_amount)
        .sum()
}

/// total received by a charge across the given rows
pub fn charge_allocated_total(charge_id: ChargeId, allocations: &[Allocation]) -> Money {
    allocations
        .iter()
        .filter(|a| a.charge_id == charge_id)
        .map(|a| a.applied_amount)
        .sum()
}

/// deterministic payment ordering: payment date, then creation time, then id
pub fn sort_payments(payments: &mut [Payment]) {
    payments.sort_by(|a, b| {
        a.paid_on
            .cmp(&b.paid_on)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}
