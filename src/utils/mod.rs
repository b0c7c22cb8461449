use chrono::{DateTime, Days, NaiveDate, Utc};
use rand::Rng;

/// Formats a date as "dd-mm-yyyy" for log lines and alerts.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// Builds an invoice number of the form `INV-YYYYMMDD-NNNN`, where the
/// suffix is random and zero padded.
pub fn generate_invoice_number(now: DateTime<Utc>) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("INV-{}-{:04}", now.format("%Y%m%d"), suffix)
}

/// Whole days from `today` until `date`; negative once the date has passed.
pub fn days_until(date: NaiveDate, today: NaiveDate) -> i64 {
    (date - today).num_days()
}

/// Longest look-ahead for expiry checks, about a century.
pub const MAX_EXPIRY_DAYS: i64 = 36_500;

/// Last date covered by an expiry window of `days` starting at `today`.
/// The window is clamped to `0..=MAX_EXPIRY_DAYS`.
pub fn expiry_cutoff(today: NaiveDate, days: i64) -> NaiveDate {
    let days = days.clamp(0, MAX_EXPIRY_DAYS) as u64;
    today.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}

/// Parses a positive integer query value, falling back to `default` for
/// anything missing, malformed, or not above zero.
pub fn positive_or(value: Option<&str>, default: i64) -> i64 {
    value
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|parsed| *parsed > 0)
        .unwrap_or(default)
}
