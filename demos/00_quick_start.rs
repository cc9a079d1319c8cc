/// quick start - one charge, one payment, one statement
use chrono::{NaiveDate, TimeZone, Utc};
use community_ledger::{
    AllocationLine, ChargeRequest, CommunityLedger, LedgerConfig, LedgerScope, Money, PaymentMethod,
    PaymentRequest, SafeTimeProvider, TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    community_ledger::init_tracing();
    println!("=== quick start ===\n");

    let start = Utc.with_ymd_and_hms(2024, 12, 20, 9, 0, 0).unwrap();
    let time = SafeTimeProvider::new(TimeSource::Test(start));
    let ledger = CommunityLedger::in_memory(LedgerConfig::default())?;

    let community_id = Uuid::new_v4();
    let contract_id = Uuid::new_v4();

    // bill january dues
    let charge = ledger.create_charge(
        ChargeRequest {
            contract_id,
            community_id,
            amount: Money::from_major(1000),
            due_date: NaiveDate::from_ymd_opt(2025, 1, 1).ok_or("bad date")?,
            notes: Some("january dues".to_string()),
        },
        &time,
    )?;
    println!(
        "charge {} for ${} due {} ({:?})",
        charge.id, charge.amount, charge.due_date, charge.status
    );

    // resident pays part of it
    let payment = ledger.record_payment(
        PaymentRequest {
            contract_id,
            community_id,
            amount: Money::from_major(600),
            method: PaymentMethod::Transfer,
            paid_on: NaiveDate::from_ymd_opt(2024, 12, 20).ok_or("bad date")?,
            reference: Some("bank transfer 0042".to_string()),
        },
        &time,
    )?;
    println!("payment {} of ${}", payment.id, payment.amount);

    let scope = LedgerScope::contract(community_id, contract_id);
    ledger.allocate_payment(
        &scope,
        payment.id,
        &[AllocationLine::new(charge.id, Money::from_major(600))],
        &time,
    )?;

    let balance = ledger.charge_balance(charge.id)?;
    println!("\nafter allocation: {:?}, outstanding ${}", balance.status, balance.outstanding);

    let statement = ledger.contract_statement(contract_id)?;
    println!("\nstatement:");
    for line in &statement.lines {
        println!(
            "  {} {:?} ${} -> balance ${}",
            line.date, line.kind, line.amount, line.running_balance
        );
    }
    println!("closing balance: ${}", statement.summary.closing_balance);

    println!("\nevents emitted: {}", ledger.take_events().len());
    Ok(())
}
