use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::charges::Charge;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{AllocationId, ChargeId, ChargeStatus, LedgerScope};

use super::{allocated_total, Allocation, AllocationLine, Payment};

/// a charge together with everything currently allocated to it
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeState {
    pub charge: Charge,
    pub total_allocated: Money,
}

impl ChargeState {
    pub fn new(charge: Charge, total_allocated: Money) -> Self {
        Self {
            charge,
            total_allocated,
        }
    }

    pub fn outstanding(&self) -> Money {
        self.charge.outstanding(self.total_allocated)
    }
}

/// status change produced while applying or unwinding allocations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub charge_id: ChargeId,
    pub from: ChargeStatus,
    pub to: ChargeStatus,
}

/// validated result of an allocation call, ready to be committed
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationPlan {
    pub payment: Payment,
    /// new or incremented rows, one per touched charge
    pub allocations: Vec<Allocation>,
    /// touched charges with recomputed status, in first-touch order
    pub charges: Vec<ChargeState>,
    pub transitions: Vec<StatusTransition>,
    pub applied_total: Money,
}

/// validated result of voiding a payment
#[derive(Debug, Clone, PartialEq)]
pub struct VoidPlan {
    pub payment: Payment,
    pub removed_allocations: Vec<AllocationId>,
    pub charges: Vec<ChargeState>,
    pub transitions: Vec<StatusTransition>,
    pub released_total: Money,
}

/// Validates and applies a payment's distribution across charges.
///
/// The engine is a pure function over the rows it is handed: it never reads
/// or writes storage and never picks charges on the caller's behalf. Lines are
/// processed in the order supplied.
pub struct AllocationEngine {
    today: NaiveDate,
    now: DateTime<Utc>,
}

impl AllocationEngine {
    pub fn new(today: NaiveDate, now: DateTime<Utc>) -> Self {
        Self { today, now }
    }

    /// plan an allocation; every precondition is checked before anything changes
    pub fn plan(
        &self,
        scope: &LedgerScope,
        payment: &Payment,
        payment_allocations: &[Allocation],
        charges: &HashMap<ChargeId, ChargeState>,
        lines: &[AllocationLine],
    ) -> Result<AllocationPlan> {
        // payment must be live and within its own amount
        if !payment.is_active {
            return Err(LedgerError::PaymentInactive {
                payment_id: payment.id,
            });
        }
        let already_allocated = allocated_total(payment.id, payment_allocations);
        if already_allocated > payment.amount {
            return Err(LedgerError::OverAllocated {
                payment_id: payment.id,
                payment_amount: payment.amount,
                requested: already_allocated,
            });
        }

        if lines.is_empty() {
            return Err(LedgerError::InvalidAmount { amount: Money::ZERO });
        }

        // every referenced charge exists, is in scope and payable
        for line in lines {
            let state = charges.get(&line.charge_id).ok_or(LedgerError::ChargeNotFound {
                charge_id: line.charge_id,
            })?;
            let charge = &state.charge;

            if !scope.contains(charge.community_id, charge.contract_id)
                || charge.community_id != payment.community_id
                || charge.contract_id != payment.contract_id
            {
                return Err(LedgerError::ScopeMismatch {
                    charge_id: charge.id,
                });
            }

            if !charge.status.is_payable() {
                return Err(LedgerError::ChargeNotPayable {
                    charge_id: charge.id,
                    status: charge.status,
                });
            }
        }

        // the payment cannot give away more than it holds
        let requested: Money = lines.iter().map(|line| line.applied_amount).sum();
        if already_allocated + requested > payment.amount {
            return Err(LedgerError::OverAllocated {
                payment_id: payment.id,
                payment_amount: payment.amount,
                requested: already_allocated + requested,
            });
        }

        // each line is positive and fits what the charge still owes
        let mut touched: Vec<ChargeId> = Vec::new();
        let mut pending: HashMap<ChargeId, Money> = HashMap::new();
        for line in lines {
            if !line.applied_amount.is_positive() {
                return Err(LedgerError::InvalidAmount {
                    amount: line.applied_amount,
                });
            }

            let state = &charges[&line.charge_id];
            let pending_for_charge = pending.entry(line.charge_id).or_insert_with(|| {
                touched.push(line.charge_id);
                Money::ZERO
            });
            let outstanding = state.outstanding().saturating_sub(*pending_for_charge);
            if line.applied_amount > outstanding {
                return Err(LedgerError::ChargeOverpaid {
                    charge_id: line.charge_id,
                    outstanding,
                    requested: line.applied_amount,
                });
            }
            *pending_for_charge += line.applied_amount;
        }

        // upsert allocation rows and recompute touched charges
        let mut allocations = Vec::with_capacity(touched.len());
        let mut updated_charges = Vec::with_capacity(touched.len());
        let mut transitions = Vec::new();

        for charge_id in &touched {
            let amount = pending[charge_id];

            let row = match payment_allocations
                .iter()
                .find(|a| a.payment_id == payment.id && a.charge_id == *charge_id)
            {
                Some(existing) => {
                    let mut row = existing.clone();
                    row.applied_amount += amount;
                    row.updated_at = self.now;
                    row
                }
                None => Allocation::new(payment.id, *charge_id, amount, self.now),
            };
            allocations.push(row);

            let mut state = charges[charge_id].clone();
            state.total_allocated += amount;
            if let Some(from) = state
                .charge
                .recompute_status(state.total_allocated, self.today, self.now)
            {
                transitions.push(StatusTransition {
                    charge_id: *charge_id,
                    from,
                    to: state.charge.status,
                });
            }
            updated_charges.push(state);
        }

        let mut payment = payment.clone();
        payment.updated_at = self.now;

        Ok(AllocationPlan {
            payment,
            allocations,
            charges: updated_charges,
            transitions,
            applied_total: requested,
        })
    }

    /// plan voiding a payment: drop its allocations and recompute what they touched
    pub fn plan_void(
        &self,
        payment: &Payment,
        payment_allocations: &[Allocation],
        charges: &HashMap<ChargeId, ChargeState>,
    ) -> Result<VoidPlan> {
        let mut updated_charges = Vec::new();
        let mut transitions = Vec::new();
        let mut removed_allocations = Vec::new();
        let mut released_total = Money::ZERO;

        for allocation in payment_allocations.iter().filter(|a| a.payment_id == payment.id) {
            let mut state = charges
                .get(&allocation.charge_id)
                .cloned()
                .ok_or(LedgerError::ChargeNotFound {
                    charge_id: allocation.charge_id,
                })?;

            state.total_allocated = state.total_allocated.saturating_sub(allocation.applied_amount);
            if let Some(from) = state
                .charge
                .recompute_status(state.total_allocated, self.today, self.now)
            {
                transitions.push(StatusTransition {
                    charge_id: state.charge.id,
                    from,
                    to: state.charge.status,
                });
            }

            removed_allocations.push(allocation.id);
            released_total += allocation.applied_amount;
            updated_charges.push(state);
        }

        let mut payment = payment.clone();
        payment.is_active = false;
        payment.updated_at = self.now;

        Ok(VoidPlan {
            payment,
            removed_allocations,
            charges: updated_charges,
            transitions,
            released_total,
        })
    }
}
