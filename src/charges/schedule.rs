use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar::add_months_clamped;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{CommunityId, ContractId};

use super::ChargeRequest;

/// one period of a billing schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledCharge {
    pub period_number: u32,
    pub due_date: NaiveDate,
    pub amount: Money,
}

/// Recurring charge schedule for a contract.
///
/// The schedule only produces charge requests; it is the external scheduler's
/// job to decide when to feed them to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingSchedule {
    pub contract_id: ContractId,
    pub community_id: CommunityId,
    pub amount: Money,
    pub first_due: NaiveDate,
    /// day of month each charge falls due, clamped to short months
    pub day_of_month: u32,
    pub notes: Option<String>,
}

impl BillingSchedule {
    /// monthly schedule due on the day of `first_due`
    pub fn monthly(
        contract_id: ContractId,
        community_id: CommunityId,
        amount: Money,
        first_due: NaiveDate,
    ) -> Result<Self> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount { amount });
        }
        Ok(Self {
            contract_id,
            community_id,
            amount,
            first_due,
            day_of_month: first_due.day(),
            notes: None,
        })
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// due date of the given zero-based period
    pub fn due_date(&self, period: u32) -> Result<NaiveDate> {
        add_months_clamped(self.first_due, period, self.day_of_month).ok_or_else(|| {
            LedgerError::InvalidDate {
                message: format!(
                    "period {} of schedule starting {} is out of range",
                    period, self.first_due
                ),
            }
        })
    }

    /// the first `periods` scheduled charges
    pub fn periods(&self, periods: u32) -> Result<Vec<ScheduledCharge>> {
        (0..periods)
            .map(|period| {
                Ok(ScheduledCharge {
                    period_number: period + 1,
                    due_date: self.due_date(period)?,
                    amount: self.amount,
                })
            })
            .collect()
    }

    /// charge requests for the periods whose due date falls in `[from, to]`
    pub fn requests_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<ChargeRequest>> {
        let mut requests = Vec::new();
        let mut period = 0;
        loop {
            let due_date = self.due_date(period)?;
            if due_date > to {
                break;
            }
            if due_date >= from {
                requests.push(self.request_for(due_date));
            }
            period += 1;
        }
        Ok(requests)
    }

    /// charge requests for the first `periods` periods
    pub fn requests(&self, periods: u32) -> Result<Vec<ChargeRequest>> {
        Ok(self
            .periods(periods)?
            .into_iter()
            .map(|scheduled| self.request_for(scheduled.due_date))
            .collect())
    }

    fn request_for(&self, due_date: NaiveDate) -> ChargeRequest {
        ChargeRequest {
            contract_id: self.contract_id,
            community_id: self.community_id,
            amount: self.amount,
            due_date,
            notes: self.notes.clone(),
        }
    }
}
