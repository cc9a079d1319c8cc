mod common;

use chrono::Duration;
use common::{clock, date, ledger, money, Household};
use community_ledger::{
    AllocationLine, ChargeStatus, CommunityLedger, LedgerConfig, LedgerError, LedgerScope,
    MemoryStore, Money, Percentage, SurchargePolicy, Uuid,
};

/// sum of allocations never exceeds a payment's amount nor a charge's total due
fn assert_bounds(ledger: &CommunityLedger<MemoryStore>, home: &Household) {
    for payment in ledger.payments_by_contract(home.contract_id).unwrap() {
        let allocated: Money = ledger
            .allocations_for_payment(payment.id)
            .unwrap()
            .iter()
            .map(|a| a.applied_amount)
            .sum();
        assert!(allocated <= payment.amount, "payment {} over-allocated", payment.id);
        if !payment.is_active {
            assert!(allocated.is_zero());
        }
    }
    for charge in ledger.charges_by_contract(home.contract_id).unwrap() {
        let balance = ledger.charge_balance(charge.id).unwrap();
        assert!(balance.total_allocated <= balance.total_due, "charge {} overpaid", charge.id);
        if charge.status != ChargeStatus::Cancelled {
            let expected = if balance.total_allocated.is_zero() {
                if charge.due_date >= date(2025, 1, 10) {
                    ChargeStatus::NotDue
                } else {
                    ChargeStatus::Overdue
                }
            } else if balance.total_allocated < balance.total_due {
                ChargeStatus::PartiallyPaid
            } else {
                ChargeStatus::Paid
            };
            assert_eq!(charge.status, expected);
        }
    }
}

#[test]
fn allocation_bounds_hold_through_a_busy_month() {
    let ledger = ledger();
    let home = Household::new();
    let time = clock(2025, 1, 10);

    let rent = ledger.create_charge(home.charge("800.00", date(2025, 1, 1)), &time).unwrap();
    let parking = ledger.create_charge(home.charge("75.50", date(2025, 1, 15)), &time).unwrap();
    let pool = ledger.create_charge(home.charge("20.00", date(2025, 2, 1)), &time).unwrap();

    let big = ledger.record_payment(home.payment("850.00", date(2025, 1, 10)), &time).unwrap();
    let small = ledger.record_payment(home.payment("100.00", date(2025, 1, 10)), &time).unwrap();

    ledger
        .allocate_payment(
            &home.scope(),
            big.id,
            &[
                AllocationLine::new(rent.id, money("800.00")),
                AllocationLine::new(parking.id, money("50.00")),
            ],
            &time,
        )
        .unwrap();
    assert_bounds(&ledger, &home);

    // would overpay parking by a cent
    let err = ledger
        .allocate_payment(
            &home.scope(),
            small.id,
            &[AllocationLine::new(parking.id, money("25.51"))],
            &time,
        )
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::ChargeOverpaid {
            charge_id: parking.id,
            outstanding: money("25.50"),
            requested: money("25.51"),
        }
    );

    // exact fit across two calls against the same pair
    ledger
        .allocate_payment(
            &home.scope(),
            small.id,
            &[AllocationLine::new(parking.id, money("20.50"))],
            &time,
        )
        .unwrap();
    ledger
        .allocate_payment(
            &home.scope(),
            small.id,
            &[
                AllocationLine::new(parking.id, money("5.00")),
                AllocationLine::new(pool.id, money("20.00")),
            ],
            &time,
        )
        .unwrap();
    let rows = ledger.allocations_for_charge(parking.id).unwrap();
    assert_eq!(rows.len(), 2);
    assert_bounds(&ledger, &home);

    ledger.void_payment(big.id, &time).unwrap();
    assert_bounds(&ledger, &home);
    assert_eq!(ledger.charge(rent.id).unwrap().status, ChargeStatus::Overdue);
    assert_eq!(ledger.charge(parking.id).unwrap().status, ChargeStatus::PartiallyPaid);
}

#[test]
fn failed_allocation_changes_nothing() {
    let ledger = ledger();
    let home = Household::new();
    let time = clock(2025, 1, 10);

    let first = ledger.create_charge(home.charge("100.00", date(2025, 2, 1)), &time).unwrap();
    let second = ledger.create_charge(home.charge("100.00", date(2025, 3, 1)), &time).unwrap();
    let payment = ledger.record_payment(home.payment("300.00", date(2025, 1, 10)), &time).unwrap();
    ledger.take_events();

    // the second line is invalid, so the first must not land either
    let err = ledger
        .allocate_payment(
            &home.scope(),
            payment.id,
            &[
                AllocationLine::new(first.id, money("100.00")),
                AllocationLine::new(second.id, money("150.00")),
            ],
            &time,
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::ChargeOverpaid { .. }));

    assert_eq!(ledger.charge(first.id).unwrap(), first);
    assert_eq!(ledger.payment(payment.id).unwrap(), payment);
    assert!(ledger.allocations_for_payment(payment.id).unwrap().is_empty());
    assert!(ledger.take_events().is_empty());
}

#[test]
fn scope_is_enforced() {
    let ledger = ledger();
    let home = Household::new();
    let neighbour = Household::in_community(home.community_id);
    let time = clock(2025, 1, 10);

    let theirs = ledger.create_charge(neighbour.charge("100.00", date(2025, 2, 1)), &time).unwrap();
    let mine = ledger.create_charge(home.charge("100.00", date(2025, 2, 1)), &time).unwrap();
    let payment = ledger.record_payment(home.payment("100.00", date(2025, 1, 10)), &time).unwrap();

    // a payment cannot pay another contract's charge, even inside a community scope
    let community_scope = LedgerScope::community(home.community_id);
    assert_eq!(
        ledger
            .allocate_payment(
                &community_scope,
                payment.id,
                &[AllocationLine::new(theirs.id, money("10.00"))],
                &time,
            )
            .unwrap_err(),
        LedgerError::ScopeMismatch { charge_id: theirs.id }
    );

    // the caller's scope must cover the charge too
    let elsewhere = LedgerScope::community(Uuid::new_v4());
    assert_eq!(
        ledger
            .allocate_payment(
                &elsewhere,
                payment.id,
                &[AllocationLine::new(mine.id, money("10.00"))],
                &time,
            )
            .unwrap_err(),
        LedgerError::ScopeMismatch { charge_id: mine.id }
    );

    ledger
        .allocate_payment(
            &community_scope,
            payment.id,
            &[AllocationLine::new(mine.id, money("10.00"))],
            &time,
        )
        .unwrap();
}

#[test]
fn void_is_idempotent_and_blocks_allocation() {
    let ledger = ledger();
    let home = Household::new();
    let time = clock(2025, 1, 10);

    let charge = ledger.create_charge(home.charge("100.00", date(2025, 2, 1)), &time).unwrap();
    let payment = ledger.record_payment(home.payment("100.00", date(2025, 1, 10)), &time).unwrap();

    let voided = ledger.void_payment(payment.id, &time).unwrap();
    let again = ledger.void_payment(payment.id, &time).unwrap();
    assert_eq!(voided, again);

    assert_eq!(
        ledger
            .allocate_payment(
                &home.scope(),
                payment.id,
                &[AllocationLine::new(charge.id, money("1.00"))],
                &time,
            )
            .unwrap_err(),
        LedgerError::PaymentInactive { payment_id: payment.id }
    );
    // void payments drop off statements
    assert_eq!(ledger.contract_statement(home.contract_id).unwrap().lines.len(), 1);
}

#[test]
fn sweep_is_idempotent_and_surcharges_once() {
    let home = Household::new();
    let policy = SurchargePolicy::Percentage(Percentage::from_whole(10));
    let config = LedgerConfig::with_default_surcharge(policy);
    let ledger = CommunityLedger::in_memory(config).unwrap();
    let time = clock(2024, 12, 1);

    let late = ledger.create_charge(home.charge("1000.00", date(2024, 12, 10)), &time).unwrap();
    let later = ledger.create_charge(home.charge("500.00", date(2024, 12, 20)), &time).unwrap();
    let paid = ledger.create_charge(home.charge("300.00", date(2024, 12, 5)), &time).unwrap();
    let payment = ledger.record_payment(home.payment("300.00", date(2024, 12, 1)), &time).unwrap();
    ledger
        .allocate_payment(
            &home.scope(),
            payment.id,
            &[AllocationLine::new(paid.id, money("300.00"))],
            &time,
        )
        .unwrap();

    time.test_control().unwrap().advance(Duration::days(15));
    let first = ledger.run_overdue_sweep(ledger.config(), &time).unwrap();
    assert_eq!(first.transitioned, vec![late.id]);
    assert_eq!(first.total_surcharge, money("100.00"));

    // a second pass the same day is a no-op
    let again = ledger.run_overdue_sweep(ledger.config(), &time).unwrap();
    assert!(again.is_noop());
    assert_eq!(ledger.charge(late.id).unwrap().surcharge_amount, money("100.00"));

    // later sweeps pick up only newly late charges
    time.test_control().unwrap().advance(Duration::days(10));
    let next = ledger.run_overdue_sweep(ledger.config(), &time).unwrap();
    assert_eq!(next.transitioned, vec![later.id]);
    assert_eq!(ledger.charge(late.id).unwrap().surcharge_amount, money("100.00"));
    assert_eq!(ledger.charge(later.id).unwrap().total_due(), money("550.00"));
    assert_eq!(ledger.charge(paid.id).unwrap().status, ChargeStatus::Paid);
}

#[test]
fn statement_is_deterministic_and_skips_cancelled() {
    let ledger = ledger();
    let home = Household::new();
    let time = clock(2025, 1, 1);

    ledger.create_charge(home.charge("100.00", date(2025, 2, 1)), &time).unwrap();
    ledger.create_charge(home.charge("100.00", date(2025, 2, 1)), &time).unwrap();
    let withdrawn = ledger.create_charge(home.charge("999.00", date(2025, 2, 1)), &time).unwrap();
    ledger.cancel_charge(withdrawn.id, &time).unwrap();
    ledger.record_payment(home.payment("150.00", date(2025, 2, 1)), &time).unwrap();

    let first = ledger.contract_statement(home.contract_id).unwrap();
    let second = ledger.contract_statement(home.contract_id).unwrap();
    assert_eq!(first.to_json_pretty().unwrap(), second.to_json_pretty().unwrap());

    assert_eq!(first.lines.len(), 3);
    assert!(first.lines.iter().all(|l| l.entity_id != withdrawn.id));
    assert_eq!(first.summary.closing_balance, money("50.00"));
    assert_eq!(
        ledger.community_statement(home.community_id).unwrap(),
        first
    );
}

// amounts and dates are typed values; parsing strings is only a test convenience
#[test]
fn money_is_fixed_two_decimal_places() {
    assert_eq!(money("10.005"), money("10.01"));
    assert_eq!(money("0.1") + money("0.2"), money("0.30"));
    assert_eq!(money("600").to_string(), "600.00");
}
