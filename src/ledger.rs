use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use tracing::{debug, info, warn};

use crate::calendar::clock;
use crate::charges::{sort_charges, Charge, ChargeBalance, ChargeRequest};
use crate::config::LedgerConfig;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::events::{Event, EventStore};
use crate::overdue::{OverdueSweeper, OverdueTransition, PricingLookup, SweepReport};
use crate::payments::{
    charge_allocated_total, sort_payments, Allocation, AllocationEngine, AllocationLine,
    ChargeState, Payment, PaymentRequest, StatusTransition,
};
use crate::statement::Statement;
use crate::store::{ChangeSet, LedgerSnapshot, LedgerStore, MemoryStore, RecordFilter};
use crate::types::{ChargeId, ChargeStatus, CommunityId, ContractId, LedgerScope, PaymentId};

/// writes and events of one attempt, plus what the operation returns
struct Staged<T> {
    changes: ChangeSet,
    events: Vec<Event>,
    value: T,
}

impl<T> Staged<T> {
    fn new(changes: ChangeSet, events: Vec<Event>, value: T) -> Self {
        Self { changes, events, value }
    }

    /// nothing to write
    fn unchanged(value: T) -> Self {
        Self::new(ChangeSet::new(), Vec::new(), value)
    }
}

/// the row as the store holds it after a successful commit
fn committed_charge(charge: &Charge) -> Charge {
    let mut charge = charge.clone();
    charge.version += 1;
    charge
}

fn committed_payment(payment: &Payment) -> Payment {
    let mut payment = payment.clone();
    payment.version += 1;
    payment
}

fn status_events(transitions: &[StatusTransition], reason: &str, now: DateTime<Utc>) -> Vec<Event> {
    transitions
        .iter()
        .map(|t| Event::StatusChanged {
            charge_id: t.charge_id,
            old_status: t.from,
            new_status: t.to,
            reason: reason.to_string(),
            timestamp: now,
        })
        .collect()
}

/// Billing ledger for communities: charges, payments and their allocations.
///
/// Every mutating call reads the rows it needs, validates, and commits one
/// change set. A commit refused because a row moved underneath is retried from
/// the read step until the configured attempt budget runs out.
#[derive(Debug)]
pub struct CommunityLedger<S: LedgerStore> {
    store: S,
    config: LedgerConfig,
    events: Mutex<EventStore>,
}

impl CommunityLedger<MemoryStore> {
    /// ledger over a fresh in-process store
    pub fn in_memory(config: LedgerConfig) -> Result<Self> {
        Self::new(MemoryStore::new(), config)
    }
}

impl<S: LedgerStore> CommunityLedger<S> {
    pub fn new(store: S, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            events: Mutex::new(EventStore::new()),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// drain events emitted by committed operations
    pub fn take_events(&self) -> Vec<Event> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).take_events()
    }

    fn publish(&self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        self.events.lock().unwrap_or_else(PoisonError::into_inner).extend(events);
    }

    /// run `attempt` until its change set commits or the attempt budget is spent
    fn transact<T>(
        &self,
        operation: &'static str,
        mut attempt: impl FnMut() -> Result<Staged<T>>,
    ) -> Result<T> {
        let max_attempts = self.config.concurrency.max_commit_attempts.max(1);

        for attempt_number in 1..=max_attempts {
            let staged = attempt()?;
            if staged.changes.is_empty() {
                self.publish(staged.events);
                return Ok(staged.value);
            }

            match self.store.commit(staged.changes) {
                Ok(()) => {
                    self.publish(staged.events);
                    return Ok(staged.value);
                }
                Err(err) if err.is_retryable() => {
                    debug!(
                        operation,
                        attempt = attempt_number,
                        error = %err,
                        "commit refused, retrying"
                    );
                }
                Err(err) => {
                    return Err(LedgerError::Storage {
                        message: err.to_string(),
                    })
                }
            }
        }

        warn!(operation, attempts = max_attempts, "giving up after repeated commit conflicts");
        Err(LedgerError::ConcurrentUpdate {
            attempts: max_attempts,
        })
    }

    fn read_charge(&self, charge_id: ChargeId) -> Result<Charge> {
        self.store.charge(charge_id)?.ok_or(LedgerError::ChargeNotFound { charge_id })
    }

    fn read_payment(&self, payment_id: PaymentId) -> Result<Payment> {
        self.store
            .payment(payment_id)?
            .ok_or(LedgerError::PaymentNotFound { payment_id })
    }

    fn read_charge_state(&self, charge_id: ChargeId) -> Result<Option<ChargeState>> {
        let Some(charge) = self.store.charge(charge_id)? else {
            return Ok(None);
        };
        let allocations = self.store.allocations_for_charge(charge_id)?;
        let total = charge_allocated_total(charge_id, &allocations);
        Ok(Some(ChargeState::new(charge, total)))
    }

    // ---- charges ----

    /// create a charge; status starts `NotDue`, or `Overdue` when already past due
    pub fn create_charge(&self, request: ChargeRequest, time: &SafeTimeProvider) -> Result<Charge> {
        let (today, now) = clock(time);
        let charge = Charge::new(request, today, now)?;

        let created = self.transact("create_charge", || {
            let changes = ChangeSet {
                charges: vec![charge.clone()],
                ..ChangeSet::default()
            };
            let events = vec![Event::ChargeCreated {
                charge_id: charge.id,
                contract_id: charge.contract_id,
                community_id: charge.community_id,
                amount: charge.amount,
                due_date: charge.due_date,
                status: charge.status,
                timestamp: now,
            }];
            Ok(Staged::new(changes, events, committed_charge(&charge)))
        })?;

        info!(
            charge_id = %created.id,
            contract_id = %created.contract_id,
            amount = %created.amount,
            due_date = %created.due_date,
            status = ?created.status,
            "charge created"
        );
        Ok(created)
    }

    /// create several charges in one commit; any invalid request rejects the batch
    pub fn create_charges(
        &self,
        requests: Vec<ChargeRequest>,
        time: &SafeTimeProvider,
    ) -> Result<Vec<Charge>> {
        let (today, now) = clock(time);
        let charges = requests
            .into_iter()
            .map(|request| Charge::new(request, today, now))
            .collect::<Result<Vec<_>>>()?;
        if charges.is_empty() {
            return Ok(Vec::new());
        }

        let created = self.transact("create_charges", || {
            let events = charges
                .iter()
                .map(|charge| Event::ChargeCreated {
                    charge_id: charge.id,
                    contract_id: charge.contract_id,
                    community_id: charge.community_id,
                    amount: charge.amount,
                    due_date: charge.due_date,
                    status: charge.status,
                    timestamp: now,
                })
                .collect();
            let changes = ChangeSet {
                charges: charges.clone(),
                ..ChangeSet::default()
            };
            let value = charges.iter().map(committed_charge).collect::<Vec<_>>();
            Ok(Staged::new(changes, events, value))
        })?;

        info!(count = created.len(), "charges created");
        Ok(created)
    }

    /// Cancel a charge that has never received money.
    ///
    /// Cancelling twice is a no-op returning the cancelled charge.
    pub fn cancel_charge(&self, charge_id: ChargeId, time: &SafeTimeProvider) -> Result<Charge> {
        let (_, now) = clock(time);

        let cancelled = self.transact("cancel_charge", || {
            let mut charge = self.read_charge(charge_id)?;
            if charge.is_cancelled() {
                return Ok(Staged::unchanged(charge));
            }

            let allocations = self.store.allocations_for_charge(charge_id)?;
            if !allocations.is_empty() {
                return Err(LedgerError::HasAllocations {
                    charge_id,
                    count: allocations.len(),
                });
            }

            let mut events = Vec::new();
            if let Some(old_status) = charge.transition(ChargeStatus::Cancelled, now) {
                events.push(Event::StatusChanged {
                    charge_id,
                    old_status,
                    new_status: ChargeStatus::Cancelled,
                    reason: "charge cancelled".to_string(),
                    timestamp: now,
                });
            }
            events.push(Event::ChargeCancelled {
                charge_id,
                timestamp: now,
            });

            let value = committed_charge(&charge);
            let changes = ChangeSet {
                charges: vec![charge],
                ..ChangeSet::default()
            };
            Ok(Staged::new(changes, events, value))
        })?;

        info!(charge_id = %charge_id, "charge cancelled");
        Ok(cancelled)
    }

    /// remove a charge outright; refused while any allocation references it
    pub fn delete_charge(&self, charge_id: ChargeId, time: &SafeTimeProvider) -> Result<()> {
        let (_, now) = clock(time);

        self.transact("delete_charge", || {
            let charge = self.read_charge(charge_id)?;
            let allocations = self.store.allocations_for_charge(charge_id)?;
            if !allocations.is_empty() {
                return Err(LedgerError::HasAllocations {
                    charge_id,
                    count: allocations.len(),
                });
            }

            let changes = ChangeSet {
                removed_charges: vec![(charge.id, charge.version)],
                ..ChangeSet::default()
            };
            let events = vec![Event::ChargeDeleted {
                charge_id,
                timestamp: now,
            }];
            Ok(Staged::new(changes, events, ()))
        })?;

        info!(charge_id = %charge_id, "charge deleted");
        Ok(())
    }

    pub fn update_charge_notes(
        &self,
        charge_id: ChargeId,
        notes: Option<String>,
        time: &SafeTimeProvider,
    ) -> Result<Charge> {
        let (_, now) = clock(time);

        let updated = self.transact("update_charge_notes", || {
            let mut charge = self.read_charge(charge_id)?;
            if charge.is_cancelled() {
                return Err(LedgerError::ChargeCancelled { charge_id });
            }
            charge.notes = notes.clone();
            charge.updated_at = now;

            let value = committed_charge(&charge);
            let changes = ChangeSet {
                charges: vec![charge],
                ..ChangeSet::default()
            };
            Ok(Staged::new(changes, Vec::new(), value))
        })?;

        info!(charge_id = %charge_id, "charge notes updated");
        Ok(updated)
    }

    /// Manually set a charge's surcharge and recompute its status.
    ///
    /// The new total due may not drop below what is already allocated.
    pub fn adjust_surcharge(
        &self,
        charge_id: ChargeId,
        surcharge: Money,
        time: &SafeTimeProvider,
    ) -> Result<Charge> {
        if surcharge.is_negative() {
            return Err(LedgerError::InvalidAmount { amount: surcharge });
        }
        let (today, now) = clock(time);

        let adjusted = self.transact("adjust_surcharge", || {
            let Some(ChargeState {
                mut charge,
                total_allocated,
            }) = self.read_charge_state(charge_id)?
            else {
                return Err(LedgerError::ChargeNotFound { charge_id });
            };
            if charge.is_cancelled() {
                return Err(LedgerError::ChargeCancelled { charge_id });
            }

            let new_total_due = charge.amount + surcharge;
            if total_allocated > new_total_due {
                return Err(LedgerError::ChargeOverpaid {
                    charge_id,
                    outstanding: new_total_due,
                    requested: total_allocated,
                });
            }

            let old_amount = charge.surcharge_amount;
            charge.surcharge_amount = surcharge;
            let mut events = vec![Event::SurchargeAdjusted {
                charge_id,
                old_amount,
                new_amount: surcharge,
                timestamp: now,
            }];
            if let Some(old_status) = charge.recompute_status(total_allocated, today, now) {
                events.push(Event::StatusChanged {
                    charge_id,
                    old_status,
                    new_status: charge.status,
                    reason: "surcharge adjusted".to_string(),
                    timestamp: now,
                });
            }

            let value = committed_charge(&charge);
            let changes = ChangeSet {
                charges: vec![charge],
                ..ChangeSet::default()
            };
            Ok(Staged::new(changes, events, value))
        })?;

        info!(
            charge_id = %charge_id,
            surcharge = %surcharge,
            status = ?adjusted.status,
            "surcharge adjusted"
        );
        Ok(adjusted)
    }

    pub fn charge(&self, charge_id: ChargeId) -> Result<Charge> {
        self.read_charge(charge_id)
    }

    /// charges of a contract ordered by due date, creation time, then id
    pub fn charges_by_contract(&self, contract_id: ContractId) -> Result<Vec<Charge>> {
        let mut charges = self.store.charges(RecordFilter::Contract(contract_id))?;
        sort_charges(&mut charges);
        Ok(charges)
    }

    /// charges of a community ordered by due date, creation time, then id
    pub fn charges_by_community(&self, community_id: CommunityId) -> Result<Vec<Charge>> {
        let mut charges = self.store.charges(RecordFilter::Community(community_id))?;
        sort_charges(&mut charges);
        Ok(charges)
    }

    pub fn charge_balance(&self, charge_id: ChargeId) -> Result<ChargeBalance> {
        let state = self
            .read_charge_state(charge_id)?
            .ok_or(LedgerError::ChargeNotFound { charge_id })?;
        Ok(ChargeBalance::of(&state.charge, state.total_allocated))
    }

    // ---- payments ----

    pub fn record_payment(
        &self,
        request: PaymentRequest,
        time: &SafeTimeProvider,
    ) -> Result<Payment> {
        let (_, now) = clock(time);
        let payment = Payment::new(request, now)?;

        let recorded = self.transact("record_payment", || {
            let changes = ChangeSet {
                payments: vec![payment.clone()],
                ..ChangeSet::default()
            };
            let events = vec![Event::PaymentRecorded {
                payment_id: payment.id,
                contract_id: payment.contract_id,
                amount: payment.amount,
                paid_on: payment.paid_on,
                timestamp: now,
            }];
            Ok(Staged::new(changes, events, committed_payment(&payment)))
        })?;

        info!(
            payment_id = %recorded.id,
            contract_id = %recorded.contract_id,
            amount = %recorded.amount,
            "payment recorded"
        );
        Ok(recorded)
    }

    /// Apply parts of a payment to the listed charges, in the order given.
    ///
    /// All lines apply or none do. Repeating a (payment, charge) pair adds to
    /// the existing allocation row.
    pub fn allocate_payment(
        &self,
        scope: &LedgerScope,
        payment_id: PaymentId,
        lines: &[AllocationLine],
        time: &SafeTimeProvider,
    ) -> Result<Payment> {
        let (today, now) = clock(time);
        let engine = AllocationEngine::new(today, now);

        let (payment, applied_total) = self.transact("allocate_payment", || {
            let payment = self.read_payment(payment_id)?;
            let payment_allocations = self.store.allocations_for_payment(payment_id)?;

            let mut charges = HashMap::new();
            for line in lines {
                if charges.contains_key(&line.charge_id) {
                    continue;
                }
                if let Some(state) = self.read_charge_state(line.charge_id)? {
                    charges.insert(line.charge_id, state);
                }
            }

            let plan = engine.plan(scope, &payment, &payment_allocations, &charges, lines)?;

            let mut events: Vec<Event> = plan
                .allocations
                .iter()
                .map(|row| {
                    let previous = payment_allocations
                        .iter()
                        .find(|a| a.id == row.id)
                        .map_or(Money::ZERO, |a| a.applied_amount);
                    Event::AllocationApplied {
                        payment_id,
                        charge_id: row.charge_id,
                        applied_amount: row.applied_amount - previous,
                        total_for_pair: row.applied_amount,
                        timestamp: now,
                    }
                })
                .collect();
            events.extend(status_events(&plan.transitions, "payment allocated", now));

            let value = (committed_payment(&plan.payment), plan.applied_total);
            let changes = ChangeSet {
                payments: vec![plan.payment],
                charges: plan.charges.into_iter().map(|state| state.charge).collect(),
                allocations: plan.allocations,
                ..ChangeSet::default()
            };
            Ok(Staged::new(changes, events, value))
        })?;

        info!(
            payment_id = %payment_id,
            applied = %applied_total,
            lines = lines.len(),
            "payment allocated"
        );
        Ok(payment)
    }

    /// Void a payment and release everything it paid.
    ///
    /// Voiding an already void payment is a no-op.
    pub fn void_payment(&self, payment_id: PaymentId, time: &SafeTimeProvider) -> Result<Payment> {
        let (today, now) = clock(time);
        let engine = AllocationEngine::new(today, now);

        let (payment, released) = self.transact("void_payment", || {
            let payment = self.read_payment(payment_id)?;
            if !payment.is_active {
                return Ok(Staged::unchanged((payment, None)));
            }

            let allocations = self.store.allocations_for_payment(payment_id)?;
            let mut charges = HashMap::new();
            for allocation in &allocations {
                if let Some(state) = self.read_charge_state(allocation.charge_id)? {
                    charges.insert(allocation.charge_id, state);
                }
            }

            let plan = engine.plan_void(&payment, &allocations, &charges)?;

            let mut events = vec![Event::PaymentVoided {
                payment_id,
                released_amount: plan.released_total,
                charges_affected: plan.charges.len(),
                timestamp: now,
            }];
            events.extend(status_events(&plan.transitions, "payment voided", now));

            let value = (committed_payment(&plan.payment), Some(plan.released_total));
            let changes = ChangeSet {
                payments: vec![plan.payment],
                charges: plan.charges.into_iter().map(|state| state.charge).collect(),
                removed_allocations: plan.removed_allocations,
                ..ChangeSet::default()
            };
            Ok(Staged::new(changes, events, value))
        })?;

        match released {
            Some(released) => {
                info!(payment_id = %payment_id, released = %released, "payment voided")
            }
            None => debug!(payment_id = %payment_id, "payment already void"),
        }
        Ok(payment)
    }

    pub fn payment(&self, payment_id: PaymentId) -> Result<Payment> {
        self.read_payment(payment_id)
    }

    /// payments of a contract ordered by payment date, creation time, then id
    pub fn payments_by_contract(&self, contract_id: ContractId) -> Result<Vec<Payment>> {
        let mut payments = self.store.payments(RecordFilter::Contract(contract_id))?;
        sort_payments(&mut payments);
        Ok(payments)
    }

    /// payments of a community ordered by payment date, creation time, then id
    pub fn payments_by_community(&self, community_id: CommunityId) -> Result<Vec<Payment>> {
        let mut payments = self.store.payments(RecordFilter::Community(community_id))?;
        sort_payments(&mut payments);
        Ok(payments)
    }

    pub fn allocations_for_payment(&self, payment_id: PaymentId) -> Result<Vec<Allocation>> {
        self.read_payment(payment_id)?;
        let mut allocations = self.store.allocations_for_payment(payment_id)?;
        allocations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(allocations)
    }

    pub fn allocations_for_charge(&self, charge_id: ChargeId) -> Result<Vec<Allocation>> {
        self.read_charge(charge_id)?;
        let mut allocations = self.store.allocations_for_charge(charge_id)?;
        allocations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(allocations)
    }

    // ---- overdue sweep ----

    /// Move every past-due `NotDue` charge to `Overdue`, surcharging it once.
    ///
    /// Each charge commits on its own. A charge that left `NotDue` before its
    /// update landed, or kept conflicting past the retry budget, is reported as
    /// skipped; the next sweep picks up whatever is still a candidate.
    pub fn run_overdue_sweep<P: PricingLookup + ?Sized>(
        &self,
        pricing: &P,
        time: &SafeTimeProvider,
    ) -> Result<SweepReport> {
        let (today, now) = clock(time);
        let sweeper = OverdueSweeper::new(pricing, today, now);

        let mut candidates: Vec<Charge> = self
            .store
            .charges(RecordFilter::All)?
            .into_iter()
            .filter(|charge| sweeper.is_candidate(charge))
            .collect();
        sort_charges(&mut candidates);

        let mut report = SweepReport::new(today);
        report.examined = candidates.len();

        for candidate in &candidates {
            let outcome = self.transact("overdue_sweep", || {
                let Some(current) = self.store.charge(candidate.id)? else {
                    return Ok(Staged::unchanged(None));
                };
                let Some(transition) = sweeper.sweep_charge(&current) else {
                    return Ok(Staged::unchanged(None));
                };

                let mut events = vec![Event::StatusChanged {
                    charge_id: current.id,
                    old_status: current.status,
                    new_status: ChargeStatus::Overdue,
                    reason: "overdue sweep".to_string(),
                    timestamp: now,
                }];
                if transition.surcharge_applied.is_positive() {
                    events.push(Event::SurchargeApplied {
                        charge_id: current.id,
                        amount: transition.surcharge_applied,
                        days_overdue: transition.days_overdue,
                        timestamp: now,
                    });
                }

                let changes = ChangeSet {
                    charges: vec![transition.charge.clone()],
                    ..ChangeSet::default()
                };
                Ok(Staged::new(changes, events, Some(transition)))
            });

            match outcome {
                Ok(Some(OverdueTransition { charge, surcharge_applied, .. })) => {
                    report.transitioned.push(charge.id);
                    report.total_surcharge += surcharge_applied;
                }
                Ok(None) => report.skipped.push(candidate.id),
                Err(LedgerError::ConcurrentUpdate { attempts }) => {
                    warn!(
                        charge_id = %candidate.id,
                        attempts,
                        "overdue update kept conflicting, leaving for next sweep"
                    );
                    report.skipped.push(candidate.id);
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            as_of = %today,
            examined = report.examined,
            transitioned = report.transitioned.len(),
            skipped = report.skipped.len(),
            total_surcharge = %report.total_surcharge,
            "overdue sweep finished"
        );
        Ok(report)
    }

    // ---- statements ----

    /// running-balance statement for one contract
    pub fn contract_statement(&self, contract_id: ContractId) -> Result<Statement> {
        let snapshot = self.store.snapshot(RecordFilter::Contract(contract_id))?;
        Ok(statement_from(snapshot))
    }

    /// running-balance statement across a whole community
    pub fn community_statement(&self, community_id: CommunityId) -> Result<Statement> {
        let snapshot = self.store.snapshot(RecordFilter::Community(community_id))?;
        Ok(statement_from(snapshot))
    }
}

/// cancelled charges are withdrawn and never billed, so they stay off statements
fn statement_from(snapshot: LedgerSnapshot) -> Statement {
    let charges: Vec<Charge> = snapshot.charges.into_iter().filter(|c| !c.is_cancelled()).collect();
    Statement::build(&charges, &snapshot.payments)
}
