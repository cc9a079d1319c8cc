use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::charges::Charge;
use crate::errors::Result;
use crate::payments::{Allocation, Payment};
use crate::types::{AllocationId, ChargeId, PaymentId};

use super::{ChangeSet, CommitError, LedgerSnapshot, LedgerStore, RecordFilter, RowRef};

#[derive(Debug, Default)]
struct Tables {
    charges: HashMap<ChargeId, Charge>,
    payments: HashMap<PaymentId, Payment>,
    allocations: HashMap<AllocationId, Allocation>,
    /// unique (payment, charge) index
    allocation_pairs: HashMap<(PaymentId, ChargeId), AllocationId>,
}

impl Tables {
    fn check_version(
        row: RowRef,
        expected: u64,
        found: Option<u64>,
    ) -> std::result::Result<(), CommitError> {
        let ok = match (expected, found) {
            (0, None) => true,
            (expected, Some(found)) => expected != 0 && expected == found,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(CommitError::Conflict { row, expected, found })
        }
    }

    fn validate(&self, changes: &ChangeSet) -> std::result::Result<(), CommitError> {
        for charge in &changes.charges {
            let found = self.charges.get(&charge.id).map(|c| c.version);
            Self::check_version(RowRef::Charge(charge.id), charge.version, found)?;
        }
        for payment in &changes.payments {
            let found = self.payments.get(&payment.id).map(|p| p.version);
            Self::check_version(RowRef::Payment(payment.id), payment.version, found)?;
        }
        for (charge_id, version) in &changes.removed_charges {
            let found = self.charges.get(charge_id).map(|c| c.version);
            Self::check_version(RowRef::Charge(*charge_id), *version, found)?;
        }

        for allocation in &changes.allocations {
            let pair = (allocation.payment_id, allocation.charge_id);
            match self.allocation_pairs.get(&pair) {
                Some(existing)
                    if *existing != allocation.id
                        && !changes.removed_allocations.contains(existing) =>
                {
                    return Err(CommitError::DuplicateAllocation {
                        payment_id: allocation.payment_id,
                        charge_id: allocation.charge_id,
                    });
                }
                _ => {}
            }
            if let Some(stored) = self.allocations.get(&allocation.id) {
                if (stored.payment_id, stored.charge_id) != pair {
                    return Err(CommitError::Conflict {
                        row: RowRef::Allocation(allocation.id),
                        expected: 0,
                        found: None,
                    });
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, changes: ChangeSet) {
        for id in changes.removed_allocations {
            if let Some(removed) = self.allocations.remove(&id) {
                self.allocation_pairs.remove(&(removed.payment_id, removed.charge_id));
            }
        }
        for allocation in changes.allocations {
            self.allocation_pairs
                .insert((allocation.payment_id, allocation.charge_id), allocation.id);
            self.allocations.insert(allocation.id, allocation);
        }
        for mut charge in changes.charges {
            charge.version += 1;
            self.charges.insert(charge.id, charge);
        }
        for mut payment in changes.payments {
            payment.version += 1;
            self.payments.insert(payment.id, payment);
        }
        for (charge_id, _) in changes.removed_charges {
            self.charges.remove(&charge_id);
        }
    }
}

/// In-process store guarded by a single reader-writer lock.
///
/// Commits validate every row version before applying anything, so a refused
/// commit leaves the tables untouched.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// number of allocation rows, across all payments
    pub fn allocation_count(&self) -> usize {
        self.read().allocations.len()
    }
}

impl LedgerStore for MemoryStore {
    fn charge(&self, id: ChargeId) -> Result<Option<Charge>> {
        Ok(self.read().charges.get(&id).cloned())
    }

    fn payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.read().payments.get(&id).cloned())
    }

    fn allocations_for_charge(&self, charge_id: ChargeId) -> Result<Vec<Allocation>> {
        Ok(self
            .read()
            .allocations
            .values()
            .filter(|a| a.charge_id == charge_id)
            .cloned()
            .collect())
    }

    fn allocations_for_payment(&self, payment_id: PaymentId) -> Result<Vec<Allocation>> {
        Ok(self
            .read()
            .allocations
            .values()
            .filter(|a| a.payment_id == payment_id)
            .cloned()
            .collect())
    }

    fn charges(&self, filter: RecordFilter) -> Result<Vec<Charge>> {
        Ok(self
            .read()
            .charges
            .values()
            .filter(|c| filter.matches(c.community_id, c.contract_id))
            .cloned()
            .collect())
    }

    fn payments(&self, filter: RecordFilter) -> Result<Vec<Payment>> {
        Ok(self
            .read()
            .payments
            .values()
            .filter(|p| filter.matches(p.community_id, p.contract_id))
            .cloned()
            .collect())
    }

    fn snapshot(&self, filter: RecordFilter) -> Result<LedgerSnapshot> {
        let tables = self.read();
        let charges = tables
            .charges
            .values()
            .filter(|c| filter.matches(c.community_id, c.contract_id))
            .cloned()
            .collect();
        let payments = tables
            .payments
            .values()
            .filter(|p| filter.matches(p.community_id, p.contract_id))
            .cloned()
            .collect();
        Ok(LedgerSnapshot { charges, payments })
    }

    fn commit(&self, changes: ChangeSet) -> std::result::Result<(), CommitError> {
        let mut tables = self.write();
        tables.validate(&changes)?;
        tables.apply(changes);
        Ok(())
    }
}
