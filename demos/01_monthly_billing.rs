/// monthly billing - generate a year of dues from a schedule and settle them
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use community_ledger::{
    AllocationLine, BillingSchedule, CommunityLedger, LedgerConfig, LedgerScope, Money,
    PaymentMethod, PaymentRequest, SafeTimeProvider, TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== monthly billing ===\n");

    let start = Utc.with_ymd_and_hms(2024, 12, 1, 9, 0, 0).unwrap();
    let time = SafeTimeProvider::new(TimeSource::Test(start));
    let controller = time.test_control().unwrap();
    let ledger = CommunityLedger::in_memory(LedgerConfig::default())?;

    let community_id = Uuid::new_v4();
    let contract_id = Uuid::new_v4();

    // dues fall on the 31st, clamped to shorter months
    let schedule = BillingSchedule::monthly(
        contract_id,
        community_id,
        Money::from_major(250),
        NaiveDate::from_ymd_opt(2025, 1, 31).ok_or("bad date")?,
    )?
    .with_notes("maintenance dues");

    let charges = ledger.create_charges(schedule.requests(12)?, &time)?;
    println!("created {} charges", charges.len());
    for charge in charges.iter().take(3) {
        println!("  {} ${}", charge.due_date, charge.amount);
    }

    // pay the first quarter in one transfer, split across three charges
    controller.advance(Duration::days(45));
    let payment = ledger.record_payment(
        PaymentRequest {
            contract_id,
            community_id,
            amount: Money::from_major(750),
            method: PaymentMethod::Transfer,
            paid_on: community_ledger::calendar::clock(&time).0,
            reference: Some("Q1 dues".to_string()),
        },
        &time,
    )?;

    let lines: Vec<AllocationLine> = charges
        .iter()
        .take(3)
        .map(|charge| AllocationLine::new(charge.id, charge.amount))
        .collect();
    let scope = LedgerScope::contract(community_id, contract_id);
    ledger.allocate_payment(&scope, payment.id, &lines, &time)?;

    println!("\ncharge statuses on {}:", time.now().format("%Y-%m-%d"));
    for charge in ledger.charges_by_contract(contract_id)?.iter().take(4) {
        println!("  {} {:?}", charge.due_date, charge.status);
    }

    let statement = ledger.contract_statement(contract_id)?;
    println!(
        "\ncharged ${}, paid ${}, closing balance ${}",
        statement.summary.total_charged,
        statement.summary.total_paid,
        statement.summary.closing_balance
    );
    println!("\n{}", statement.to_json_pretty()?.lines().take(12).collect::<Vec<_>>().join("\n"));

    Ok(())
}
