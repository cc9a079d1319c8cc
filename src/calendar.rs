use chrono::{DateTime, Datelike, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;

/// read the clock once: the ledger's "today" (UTC calendar date) and the instant
pub fn clock(time_provider: &SafeTimeProvider) -> (NaiveDate, DateTime<Utc>) {
    let now = time_provider.now();
    (now.date_naive(), now)
}

/// days elapsed since `due_date`, zero when not yet past due
pub fn days_past_due(due_date: NaiveDate, today: NaiveDate) -> u32 {
    let days = (today - due_date).num_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}

/// number of days in the given month
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// move `months` calendar months forward from `start`, landing on
/// `day_of_month` clamped to the length of the target month
pub fn add_months_clamped(start: NaiveDate, months: u32, day_of_month: u32) -> Option<NaiveDate> {
    let zero_based = start.month0().checked_add(months)?;
    let year = start.year().checked_add(i32::try_from(zero_based / 12).ok()?)?;
    let month = zero_based % 12 + 1;
    let day = day_of_month.clamp(1, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}
