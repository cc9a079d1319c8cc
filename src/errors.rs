use thiserror::Error;

use crate::decimal::Money;
use crate::types::{ChargeId, ChargeStatus, PaymentId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("invalid amount: {amount}")]
    InvalidAmount {
        amount: Money,
    },

    #[error("charge {charge_id} not payable: current status is {status:?}")]
    ChargeNotPayable {
        charge_id: ChargeId,
        status: ChargeStatus,
    },

    #[error(
        "payment {payment_id} over-allocated: amount {payment_amount}, would allocate {requested}"
    )]
    OverAllocated {
        payment_id: PaymentId,
        payment_amount: Money,
        requested: Money,
    },

    #[error("charge {charge_id} overpaid: outstanding {outstanding}, requested {requested}")]
    ChargeOverpaid {
        charge_id: ChargeId,
        outstanding: Money,
        requested: Money,
    },

    #[error("charge {charge_id} has {count} active allocation(s)")]
    HasAllocations {
        charge_id: ChargeId,
        count: usize,
    },

    #[error("payment not found: {payment_id}")]
    PaymentNotFound {
        payment_id: PaymentId,
    },

    #[error("charge not found: {charge_id}")]
    ChargeNotFound {
        charge_id: ChargeId,
    },

    #[error("payment {payment_id} is void")]
    PaymentInactive {
        payment_id: PaymentId,
    },

    #[error("charge {charge_id} is outside the requested scope")]
    ScopeMismatch {
        charge_id: ChargeId,
    },

    #[error("charge {charge_id} is cancelled")]
    ChargeCancelled {
        charge_id: ChargeId,
    },

    #[error("concurrent update: gave up after {attempts} attempt(s)")]
    ConcurrentUpdate {
        attempts: u32,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("invalid date: {message}")]
    InvalidDate {
        message: String,
    },

    #[error("storage error: {message}")]
    Storage {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, LedgerError>;
