use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::models::{Invoice, MedicineFilter};
use crate::storage::{Storage, StorageResult};
use crate::utils::expiry_cutoff;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DailySales {
    pub date: NaiveDate,
    pub sales: Decimal,
    pub transactions: u32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GstReportRow {
    /// Calendar month as `YYYY-MM`.
    pub month: String,
    pub taxable_amount: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub total_tax: Decimal,
    pub total_amount: Decimal,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub total_medicines: usize,
    pub total_customers: usize,
    pub low_stock_count: usize,
    pub expiring_count: usize,
    pub today_sales: Decimal,
    pub today_transactions: u32,
}

/// Start of the UTC day `days - 1` days before `today`: the earliest instant
/// that falls in a `days`-long window ending today.
pub fn window_start(today: NaiveDate, days: i64) -> DateTime<Utc> {
    let first = today - Duration::days(days.max(1) - 1);
    Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Sales per day for the `days` days ending `today`, newest first. Days
/// without invoices are reported as zero.
pub fn daily_sales(invoices: &[Invoice], today: NaiveDate, days: i64) -> Vec<DailySales> {
    let mut by_day: HashMap<NaiveDate, (Decimal, u32)> = HashMap::new();
    for invoice in invoices {
        let entry = by_day.entry(invoice.created_at.date_naive()).or_default();
        entry.0 += invoice.total;
        entry.1 += 1;
    }

    (0..days.max(1))
        .map(|offset| {
            let date = today - Duration::days(offset);
            let (sales, transactions) = by_day.get(&date).copied().unwrap_or_default();
            DailySales {
                date,
                sales,
                transactions,
            }
        })
        .collect()
}

fn month_back(year: i32, month: u32, back: u32) -> (i32, u32) {
    let index = year * 12 + month as i32 - 1 - back as i32;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

/// First instant of the month `months - 1` months before the month of `today`.
pub fn report_start(today: NaiveDate, months: u32) -> DateTime<Utc> {
    let (year, month) = month_back(today.year(), today.month(), months.max(1) - 1);
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(today);
    Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Monthly GST summary, current month first. Tax is split evenly into the
/// central and state halves.
pub fn gst_report(invoices: &[Invoice], today: NaiveDate, months: u32) -> Vec<GstReportRow> {
    let mut by_month: HashMap<(i32, u32), (Decimal, Decimal)> = HashMap::new();
    for invoice in invoices {
        let created = invoice.created_at.date_naive();
        let entry = by_month
            .entry((created.year(), created.month()))
            .or_default();
        entry.0 += invoice.subtotal;
        entry.1 += invoice.gst_amount;
    }

    (0..months.max(1))
        .map(|back| {
            let (year, month) = month_back(today.year(), today.month(), back);
            let (taxable_amount, total_tax) =
                by_month.get(&(year, month)).copied().unwrap_or_default();
            let half = total_tax / Decimal::TWO;
            GstReportRow {
                month: format!("{:04}-{:02}", year, month),
                taxable_amount,
                cgst: half,
                sgst: half,
                total_tax,
                total_amount: taxable_amount + total_tax,
            }
        })
        .collect()
}

pub async fn dashboard(
    storage: &dyn Storage,
    today: NaiveDate,
    expiry_days: i64,
) -> StorageResult<DashboardSummary> {
    let everything = MedicineFilter::default();
    let (medicines, customers, low_stock, expiring, todays) = futures::try_join!(
        storage.list_medicines(&everything),
        storage.list_customers(),
        storage.low_stock_medicines(),
        storage.expiring_medicines(expiry_cutoff(today, expiry_days)),
        storage.invoices_since(window_start(today, 1)),
    )?;

    let today_sales = daily_sales(&todays, today, 1)
        .into_iter()
        .next()
        .unwrap_or(DailySales {
            date: today,
            sales: Decimal::ZERO,
            transactions: 0,
        });

    Ok(DashboardSummary {
        total_medicines: medicines.len(),
        total_customers: customers.len(),
        low_stock_count: low_stock.len(),
        expiring_count: expiring.len(),
        today_sales: today_sales.sales,
        today_transactions: today_sales.transactions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn invoice(id: i32, at: DateTime<Utc>, subtotal: Decimal, gst: Decimal) -> Invoice {
        Invoice {
            id,
            invoice_number: format!("INV-{}", id),
            customer_id: None,
            doctor_id: None,
            subtotal,
            gst_amount: gst,
            total: subtotal + gst,
            user_id: 1,
            created_at: at,
        }
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
    }

    #[test]
    fn daily_sales_fill_missing_days_newest_first() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let invoices = vec![
            invoice(1, at(2026, 10, 16), dec!(100), dec!(18)),
            invoice(2, at(2026, 10, 16), dec!(50), dec!(9)),
            invoice(3, at(2026, 10, 14), dec!(10), dec!(1.8)),
        ];
        let rows = daily_sales(&invoices, today, 3);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].date, today);
        assert_eq!(rows[0].sales, dec!(177));
        assert_eq!(rows[0].transactions, 2);
        assert_eq!(rows[1].sales, Decimal::ZERO);
        assert_eq!(rows[1].transactions, 0);
        assert_eq!(rows[2].sales, dec!(11.8));
    }

    #[test]
    fn gst_report_splits_tax_and_crosses_years() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 20).unwrap();
        let invoices = vec![
            invoice(1, at(2026, 1, 5), dec!(1000), dec!(180)),
            invoice(2, at(2025, 12, 24), dec!(500), dec!(60)),
        ];
        let rows = gst_report(&invoices, today, 3);
        assert_eq!(
            rows.iter().map(|r| r.month.as_str()).collect::<Vec<_>>(),
            vec!["2026-01", "2025-12", "2025-11"]
        );
        assert_eq!(rows[0].cgst, dec!(90));
        assert_eq!(rows[0].sgst, dec!(90));
        assert_eq!(rows[0].total_amount, dec!(1180));
        assert_eq!(rows[1].total_tax, dec!(60));
        assert_eq!(rows[2].taxable_amount, Decimal::ZERO);
    }

    #[test]
    fn window_and_report_start() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert_eq!(window_start(today, 7), at(2026, 3, 4) - Duration::hours(10));
        assert_eq!(report_start(today, 3), at(2026, 1, 1) - Duration::hours(10));
        assert_eq!(report_start(today, 1), at(2026, 3, 1) - Duration::hours(10));
    }
}
