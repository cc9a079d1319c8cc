pub mod memory;

use thiserror::Error;

use crate::charges::Charge;
use crate::errors::Result;
use crate::payments::{Allocation, Payment};
use crate::types::{AllocationId, ChargeId, CommunityId, ContractId, PaymentId};

pub use memory::MemoryStore;

/// row a commit conflicted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRef {
    Charge(ChargeId),
    Payment(PaymentId),
    Allocation(AllocationId),
}

/// why a commit was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitError {
    /// a row changed (or appeared, or vanished) since it was read; retry from the read step
    #[error("stale row {row:?}: expected version {expected}, found {found:?}")]
    Conflict {
        row: RowRef,
        expected: u64,
        found: Option<u64>,
    },

    /// a (payment, charge) pair already has an allocation row
    #[error("duplicate allocation for payment {payment_id} and charge {charge_id}")]
    DuplicateAllocation {
        payment_id: PaymentId,
        charge_id: ChargeId,
    },

    #[error("storage failure: {0}")]
    Storage(String),
}

impl CommitError {
    /// whether re-reading and retrying the operation can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, CommitError::Conflict { .. } | CommitError::DuplicateAllocation { .. })
    }
}

/// writes of one atomic operation
///
/// Charge and payment rows carry the version they were read at; version 0
/// means insert. The store applies every write or none of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub charges: Vec<Charge>,
    pub payments: Vec<Payment>,
    /// allocation rows to insert or replace, keyed by id
    pub allocations: Vec<Allocation>,
    pub removed_allocations: Vec<AllocationId>,
    /// charges to delete with the version they were read at
    pub removed_charges: Vec<(ChargeId, u64)>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.charges.is_empty()
            && self.payments.is_empty()
            && self.allocations.is_empty()
            && self.removed_allocations.is_empty()
            && self.removed_charges.is_empty()
    }
}

/// charges and payments of a scope, read together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerSnapshot {
    pub charges: Vec<Charge>,
    pub payments: Vec<Payment>,
}

/// which records a snapshot or listing covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFilter {
    Contract(ContractId),
    Community(CommunityId),
    All,
}

impl RecordFilter {
    pub fn matches(&self, community_id: CommunityId, contract_id: ContractId) -> bool {
        match self {
            RecordFilter::Contract(id) => *id == contract_id,
            RecordFilter::Community(id) => *id == community_id,
            RecordFilter::All => true,
        }
    }
}

/// Transactional backing store for the ledger.
///
/// Reads are individually consistent; cross-row consistency of a mutating
/// operation comes from `commit` rejecting any row whose version moved since
/// it was read. A committed row's version becomes the version it was read at
/// plus one. Every write that changes a charge's or payment's allocations
/// must also write that charge or payment row so its version moves.
pub trait LedgerStore: Send + Sync {
    fn charge(&self, id: ChargeId) -> Result<Option<Charge>>;

    fn payment(&self, id: PaymentId) -> Result<Option<Payment>>;

    fn allocations_for_charge(&self, charge_id: ChargeId) -> Result<Vec<Allocation>>;

    fn allocations_for_payment(&self, payment_id: PaymentId) -> Result<Vec<Allocation>>;

    /// charges matching the filter, unordered
    fn charges(&self, filter: RecordFilter) -> Result<Vec<Charge>>;

    /// payments matching the filter, unordered
    fn payments(&self, filter: RecordFilter) -> Result<Vec<Payment>>;

    /// charges and payments for the filter, read as one snapshot
    fn snapshot(&self, filter: RecordFilter) -> Result<LedgerSnapshot>;

    /// apply a change set atomically
    fn commit(&self, changes: ChangeSet) -> std::result::Result<(), CommitError>;
}
