use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for a charge
pub type ChargeId = Uuid;
/// unique identifier for a payment
pub type PaymentId = Uuid;
/// unique identifier for an allocation row
pub type AllocationId = Uuid;
/// contract (unit lease or ownership agreement) a charge is billed against
pub type ContractId = Uuid;
/// community the contract belongs to
pub type CommunityId = Uuid;

/// charge lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChargeStatus {
    /// nothing allocated and due date not yet passed
    NotDue,
    /// nothing allocated and due date passed
    Overdue,
    /// fully covered by allocations
    Paid,
    /// some, but not all, of the amount due is allocated
    PartiallyPaid,
    /// withdrawn; terminal
    Cancelled,
}

impl ChargeStatus {
    /// whether the charge can still receive allocations
    pub fn is_payable(&self) -> bool {
        matches!(
            self,
            ChargeStatus::NotDue | ChargeStatus::Overdue | ChargeStatus::PartiallyPaid
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChargeStatus::Cancelled)
    }
}

/// how a payment was received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    Transfer,
    Card,
    Cash,
    Other,
}

/// explicit scope a ledger call operates within
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerScope {
    pub community_id: CommunityId,
    /// narrows the scope to a single contract when set
    pub contract_id: Option<ContractId>,
}

impl LedgerScope {
    pub fn community(community_id: CommunityId) -> Self {
        Self {
            community_id,
            contract_id: None,
        }
    }

    pub fn contract(community_id: CommunityId, contract_id: ContractId) -> Self {
        Self {
            community_id,
            contract_id: Some(contract_id),
        }
    }

    /// whether a record owned by (community, contract) falls inside this scope
    pub fn contains(&self, community_id: CommunityId, contract_id: ContractId) -> bool {
        self.community_id == community_id
            && self.contract_id.map_or(true, |scoped| scoped == contract_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payable_statuses() {
        assert!(ChargeStatus::NotDue.is_payable());
        assert!(ChargeStatus::Overdue.is_payable());
        assert!(ChargeStatus::PartiallyPaid.is_payable());
        assert!(!ChargeStatus::Paid.is_payable());
        assert!(!ChargeStatus::Cancelled.is_payable());
        assert!(ChargeStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_scope_contains() {
        let community = Uuid::new_v4();
        let contract = Uuid::new_v4();
        let other = Uuid::new_v4();

        let wide = LedgerScope::community(community);
        assert!(wide.contains(community, contract));
        assert!(wide.contains(community, other));
        assert!(!wide.contains(other, contract));

        let narrow = LedgerScope::contract(community, contract);
        assert!(narrow.contains(community, contract));
        assert!(!narrow.contains(community, other));
    }
}
