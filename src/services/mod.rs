use std::sync::Arc;

use chrono::{NaiveDate, TimeDelta, Utc};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::{
    db::{models::Medication, Store, StoreError},
    utils::format_date,
};

/// Schedules the expiry watch.
///
/// Sets up a cron job that looks for medications expiring within
/// `window_days` and logs a warning for each one.
///
/// Parameters:
/// - `store`: Where medications are read from.
/// - `schedule`: A six-field cron expression (seconds first), e.g. `0 0 8 * * *`.
/// - `window_days`: How far ahead to look.
///
/// Returns an error if the schedule cannot be parsed or the scheduler fails
/// to start. Failures of individual runs are only logged.
pub async fn schedule_expiry_watch(
    store: Arc<dyn Store>,
    schedule: &str,
    window_days: i64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let today = Utc::now().date_naive();
    if expiry_cutoff(today, window_days).is_none() {
        return Err(format!("expiry window of {} days is out of range", window_days).into());
    }

    let sched = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_uuid, _l| {
        let store = store.clone();
        Box::pin(async move {
            let today = Utc::now().date_naive();
            match check_expiring_medications(store.as_ref(), today, window_days).await {
                Ok(count) => log::info!("Expiry check completed, {} medication(s) flagged", count),
                Err(e) => log::error!("Error checking expiring medications: {}", e),
            }
        })
    })
    .map_err(|e| {
        log::error!("Failed to create expiry job: {}", e);
        e
    })?;

    sched.add(job).await.map_err(|e| {
        log::error!("Failed to add expiry job to scheduler: {}", e);
        e
    })?;

    tokio::spawn(async move {
        if let Err(e) = sched.start().await {
            log::error!("Scheduler error: {}", e);
        }
    });

    log::info!("Expiry watch scheduled ({})", schedule);
    Ok(())
}

/// Logs every medication that expires on or before `today + window_days`,
/// including ones already past their date. Returns how many were flagged.
pub async fn check_expiring_medications(
    store: &dyn Store,
    today: NaiveDate,
    window_days: i64,
) -> Result<usize, StoreError> {
    let Some(cutoff) = expiry_cutoff(today, window_days) else {
        log::error!("Expiry window of {} days is out of range, skipping check", window_days);
        return Ok(0);
    };
    let medications = store.expiring_medications(cutoff).await?;

    for medication in &medications {
        if let Some(line) = expiry_warning(medication, today) {
            log::warn!("{}", line);
        }
    }

    Ok(medications.len())
}

/// Last date inside the window, or `None` when it falls outside the calendar.
fn expiry_cutoff(today: NaiveDate, window_days: i64) -> Option<NaiveDate> {
    TimeDelta::try_days(window_days).and_then(|window| today.checked_add_signed(window))
}

fn expiry_warning(medication: &Medication, today: NaiveDate) -> Option<String> {
    let expires = medication.expiration_date?;
    let days_left = (expires - today).num_days();

    let when = if days_left < 0 {
        format!("expired {} day(s) ago", -days_left)
    } else {
        format!("expires in {} day(s)", days_left)
    };

    Some(format!(
        "Medication expiry alert: {} [{}] {} on {}, {} unit(s) in stock",
        medication.name,
        medication.catalog_id,
        when,
        format_date(expires),
        medication.quantity
    ))
}
