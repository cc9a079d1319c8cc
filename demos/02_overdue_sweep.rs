/// overdue sweep - late charges pick up the community surcharge exactly once
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use community_ledger::{
    ChargeRequest, CommunityLedger, LedgerConfig, Money, Percentage, SafeTimeProvider,
    SurchargePolicy, TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    community_ledger::init_tracing();
    println!("=== overdue sweep ===\n");

    let start = Utc.with_ymd_and_hms(2024, 12, 15, 0, 0, 0).unwrap();
    let time = SafeTimeProvider::new(TimeSource::Test(start));
    let controller = time.test_control().unwrap();

    let lakeside = Uuid::new_v4();
    let hillcrest = Uuid::new_v4();

    // 10% late fee by default, flat $25 at hillcrest
    let late_fee = SurchargePolicy::Percentage(Percentage::from_whole(10));
    let config = LedgerConfig::with_default_surcharge(late_fee)
        .community_surcharge(hillcrest, SurchargePolicy::Flat(Money::from_major(25)));
    println!("config:\n{}\n", config.to_json_pretty()?);
    let ledger = CommunityLedger::in_memory(config)?;

    let due = NaiveDate::from_ymd_opt(2025, 1, 1).ok_or("bad date")?;
    for community_id in [lakeside, hillcrest] {
        ledger.create_charge(
            ChargeRequest {
                contract_id: Uuid::new_v4(),
                community_id,
                amount: Money::from_major(1000),
                due_date: due,
                notes: None,
            },
            &time,
        )?;
    }

    // nothing is late yet
    let report = ledger.run_overdue_sweep(ledger.config(), &time)?;
    println!(
        "sweep on {}: {} transitioned",
        time.now().format("%Y-%m-%d"),
        report.transitioned.len()
    );

    controller.advance(Duration::days(20));
    let report = ledger.run_overdue_sweep(ledger.config(), &time)?;
    println!(
        "sweep on {}: {} transitioned, surcharges ${}",
        time.now().format("%Y-%m-%d"),
        report.transitioned.len(),
        report.total_surcharge
    );

    for community_id in [lakeside, hillcrest] {
        for charge in ledger.charges_by_community(community_id)? {
            println!(
                "  {:?} surcharge ${} total due ${}",
                charge.status,
                charge.surcharge_amount,
                charge.total_due()
            );
        }
    }

    // running it again changes nothing
    let rerun = ledger.run_overdue_sweep(ledger.config(), &time)?;
    println!("\nrerun is a no-op: {}", rerun.is_noop());

    Ok(())
}
