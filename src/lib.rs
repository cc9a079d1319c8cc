pub mod calendar;
pub mod charges;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod overdue;
pub mod payments;
pub mod statement;
pub mod store;
pub mod telemetry;
pub mod types;

// re-export key types
pub use charges::{BillingSchedule, Charge, ChargeBalance, ChargeRequest, ScheduledCharge};
pub use config::{ConcurrencyConfig, LedgerConfig, PricingConfig};
pub use decimal::{Money, Percentage};
pub use errors::{LedgerError, Result};
pub use events::{Event, EventStore};
pub use ledger::CommunityLedger;
pub use overdue::{NoSurcharge, OverdueSweeper, PricingLookup, SurchargePolicy, SweepReport};
pub use payments::{Allocation, AllocationEngine, AllocationLine, Payment, PaymentRequest};
pub use statement::{
    build_statement, Statement, StatementEntryKind, StatementLine, StatementSummary,
};
pub use store::{ChangeSet, CommitError, LedgerSnapshot, LedgerStore, MemoryStore, RecordFilter};
pub use telemetry::init_tracing;
pub use types::{
    AllocationId, ChargeId, ChargeStatus, CommunityId, ContractId, LedgerScope, PaymentId,
    PaymentMethod,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
