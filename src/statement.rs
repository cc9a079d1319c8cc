//! Chronological running-balance view over charges and payments.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::charges::Charge;
use crate::decimal::Money;
use crate::payments::Payment;

/// kind of statement line; declaration order is the same-day tie-break
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatementEntryKind {
    Charge,
    Payment,
}

/// one line of a statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLine {
    pub kind: StatementEntryKind,
    pub entity_id: Uuid,
    pub date: NaiveDate,
    /// positive amount of the line; its sign is given by `kind`
    pub amount: Money,
    /// balance owed after this line
    pub running_balance: Money,
    pub description: Option<String>,
}

impl StatementLine {
    fn ordering(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then(self.kind.cmp(&other.kind))
            .then(self.entity_id.cmp(&other.entity_id))
    }
}

/// Merge charges and payments into an ordered running-balance ledger.
///
/// Every charge becomes a line for `amount + surcharge` on its due date; every
/// active payment becomes a line for its amount on the date paid. Void
/// payments are dropped. Lines are ordered by date, charges before payments on
/// the same day, then by id; identical input always yields identical output.
pub fn build_statement(charges: &[Charge], payments: &[Payment]) -> Vec<StatementLine> {
    let mut lines: Vec<StatementLine> = charges
        .iter()
        .map(|charge| StatementLine {
            kind: StatementEntryKind::Charge,
            entity_id: charge.id,
            date: charge.due_date,
            amount: charge.total_due(),
            running_balance: Money::ZERO,
            description: charge.notes.clone(),
        })
        .chain(payments.iter().filter(|p| p.is_active).map(|payment| StatementLine {
            kind: StatementEntryKind::Payment,
            entity_id: payment.id,
            date: payment.paid_on,
            amount: payment.amount,
            running_balance: Money::ZERO,
            description: payment.reference.clone(),
        }))
        .collect();

    lines.sort_by(StatementLine::ordering);

    let mut balance = Money::ZERO;
    for line in &mut lines {
        match line.kind {
            StatementEntryKind::Charge => balance += line.amount,
            StatementEntryKind::Payment => balance -= line.amount,
        }
        line.running_balance = balance;
    }

    lines
}

/// totals over a built statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementSummary {
    pub total_charged: Money,
    pub total_paid: Money,
    /// positive when money is owed, negative when in credit
    pub closing_balance: Money,
    pub line_count: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

impl StatementSummary {
    pub fn of(lines: &[StatementLine]) -> Self {
        let total_charged = lines
            .iter()
            .filter(|l| l.kind == StatementEntryKind::Charge)
            .map(|l| l.amount)
            .sum();
        let total_paid = lines
            .iter()
            .filter(|l| l.kind == StatementEntryKind::Payment)
            .map(|l| l.amount)
            .sum();

        Self {
            total_charged,
            total_paid,
            closing_balance: lines.last().map_or(Money::ZERO, |l| l.running_balance),
            line_count: lines.len(),
            first_date: lines.first().map(|l| l.date),
            last_date: lines.last().map(|l| l.date),
        }
    }
}

/// a statement with its summary, as exported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub lines: Vec<StatementLine>,
    pub summary: StatementSummary,
}

impl Statement {
    pub fn build(charges: &[Charge], payments: &[Payment]) -> Self {
        let lines = build_statement(charges, payments);
        let summary = StatementSummary::of(&lines);
        Self { lines, summary }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
