use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::{
    auth::session::SessionStore,
    db::models::Medicine,
    storage::{Storage, StorageResult},
    utils::{days_until, expiry_cutoff, format_date},
};

pub mod analytics;
pub mod billing;
pub mod uploads;

/// What one inventory check found.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InventoryReport {
    pub low_stock: usize,
    pub expiring: usize,
    pub pruned_sessions: usize,
}

/// Schedules the inventory alert job.
///
/// The job runs on `schedule` (a six-field cron expression), logs a warning
/// for every low-stock medicine and every medicine expiring within
/// `expiry_days`, and drops expired sessions.
pub async fn schedule_inventory_alerts(
    storage: Arc<dyn Storage>,
    sessions: SessionStore,
    schedule: &str,
    expiry_days: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    let sched = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_uuid, _l| {
        let storage = storage.clone();
        let sessions = sessions.clone();
        Box::pin(async move {
            match check_inventory(storage.as_ref(), &sessions, Utc::now().date_naive(), expiry_days)
                .await
            {
                Ok(report) => log::info!(
                    "Inventory check completed: {} low on stock, {} expiring, {} sessions pruned",
                    report.low_stock,
                    report.expiring,
                    report.pruned_sessions
                ),
                Err(e) => log::error!("Error checking inventory: {}", e),
            }
        })
    })
    .map_err(|e| {
        log::error!("Failed to create job: {}", e);
        Box::new(e) as Box<dyn std::error::Error>
    })?;

    sched.add(job).await.map_err(|e| {
        log::error!("Failed to add job to scheduler: {}", e);
        Box::new(e) as Box<dyn std::error::Error>
    })?;

    tokio::spawn(async move {
        if let Err(e) = sched.start().await {
            log::error!("Scheduler error: {}", e);
        }
    });

    log::info!("Inventory alert scheduler started ({})", schedule);
    Ok(())
}

/// Runs one inventory check against `today`.
pub async fn check_inventory(
    storage: &dyn Storage,
    sessions: &SessionStore,
    today: NaiveDate,
    expiry_days: i64,
) -> StorageResult<InventoryReport> {
    let (low_stock, expiring) = futures::try_join!(
        storage.low_stock_medicines(),
        storage.expiring_medicines(expiry_cutoff(today, expiry_days)),
    )?;

    for medicine in &low_stock {
        log::warn!(
            "Low stock: {} (#{}) has {} left, threshold {}",
            medicine.name,
            medicine.id,
            medicine.stock,
            medicine.low_stock_threshold
        );
    }
    for medicine in &expiring {
        log::warn!("{}", expiry_alert(medicine, today));
    }

    Ok(InventoryReport {
        low_stock: low_stock.len(),
        expiring: expiring.len(),
        pruned_sessions: sessions.prune_expired(),
    })
}

fn expiry_alert(medicine: &Medicine, today: NaiveDate) -> String {
    let days = days_until(medicine.expiry_date, today);
    let when = if days < 0 {
        format!("expired {} days ago", -days)
    } else {
        format!("expires in {} days", days)
    };
    format!(
        "Expiry: {} batch {} {} ({}), {} in stock",
        medicine.name,
        medicine.batch_number,
        when,
        format_date(medicine.expiry_date),
        medicine.stock
    )
}
