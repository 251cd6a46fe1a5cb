// ── Enforcement scheduler ──
//
// The billing pass: for every subscriber, decide from the payment markers
// whether they should be suspended today, and reconcile devices where the
// decision changes the current status. Runs daily at the configured check
// time and on demand; both paths share run_once.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PolicySettings;
use crate::error::CoreError;
use crate::model::SubscriberStatus;
use crate::store::BillingStore;
use crate::syncer::DeviceSyncer;

/// Fallback wait when the check time cannot be read from settings.
const SETTINGS_RETRY: Duration = Duration::from_secs(3600);

/// Outcome of one enforcement pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnforcementReport {
    /// Transitions applied (suspensions plus reactivations).
    pub processed: usize,
    pub suspended: usize,
    pub reactivated: usize,
    /// Subscribers skipped (no device assigned, or payment lookup failed).
    pub skipped: usize,
}

/// Billing-driven suspend/reactivate loop.
pub struct EnforcementScheduler {
    store: Arc<dyn BillingStore>,
    syncer: DeviceSyncer,
}

impl EnforcementScheduler {
    pub fn new(store: Arc<dyn BillingStore>, syncer: DeviceSyncer) -> Self {
        Self { store, syncer }
    }

    /// One enforcement pass over all subscribers, evaluated against
    /// today's date.
    pub async fn run_once(&self) -> Result<EnforcementReport, CoreError> {
        self.run_for_date(Local::now().date_naive()).await
    }

    /// The pass itself, with the reference date injected. Only snapshot
    /// failures (settings, subscriber list) abort; everything scoped to
    /// one subscriber is contained and logged.
    pub async fn run_for_date(&self, today: NaiveDate) -> Result<EnforcementReport, CoreError> {
        let settings = PolicySettings::from_raw(&self.store.raw_settings().await?);
        let subscribers = self.store.subscribers().await?;
        let period = period_label(today);

        let mut report = EnforcementReport::default();

        for subscriber in &subscribers {
            let Some(device_id) = subscriber.device_id else {
                warn!(subscriber = %subscriber.name, "no device assigned, skipping");
                report.skipped += 1;
                continue;
            };

            let has_payment = match self.store.has_payment(subscriber.id, &period).await {
                Ok(paid) => paid,
                Err(e) => {
                    warn!(subscriber = %subscriber.name, error = %e, "payment lookup failed, skipping");
                    report.skipped += 1;
                    continue;
                }
            };

            let should = should_suspend(
                subscriber.billing_day,
                settings.grace_days,
                has_payment,
                today,
            );

            // Apply a transition only when it changes the current status.
            let transition = match (should, subscriber.status) {
                (true, SubscriberStatus::Active) => Some(SubscriberStatus::Suspended),
                (false, SubscriberStatus::Suspended) => Some(SubscriberStatus::Active),
                _ => None,
            };
            let Some(new_status) = transition else {
                continue;
            };

            let device = match self.store.device(device_id).await {
                Ok(Some(device)) => device,
                Ok(None) => {
                    warn!(subscriber = %subscriber.name, device = %device_id, "assigned device missing, skipping");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(subscriber = %subscriber.name, error = %e, "device lookup failed, skipping");
                    report.skipped += 1;
                    continue;
                }
            };

            // Persist first: reads reflect the decision even if the device
            // sync below fails and has to wait for the next cycle.
            if let Err(e) = self
                .store
                .set_subscriber_status(subscriber.id, new_status)
                .await
            {
                warn!(subscriber = %subscriber.name, error = %e, "status write failed, skipping");
                report.skipped += 1;
                continue;
            }

            let suspend = new_status == SubscriberStatus::Suspended;
            self.syncer
                .sync(subscriber, suspend, &settings, &device)
                .await;

            report.processed += 1;
            if suspend {
                report.suspended += 1;
                info!(
                    subscriber = %subscriber.name,
                    day = today.day(),
                    billing_day = subscriber.billing_day,
                    grace_days = settings.grace_days,
                    period = %period,
                    "subscriber suspended (no payment past grace deadline)"
                );
            } else {
                report.reactivated += 1;
                info!(
                    subscriber = %subscriber.name,
                    period = %period,
                    "subscriber reactivated"
                );
            }
        }

        debug!(
            processed = report.processed,
            skipped = report.skipped,
            total = subscribers.len(),
            "enforcement pass complete"
        );
        Ok(report)
    }

    /// Run the pass daily at the configured check time until cancelled.
    ///
    /// The check time is re-read from settings each iteration so operator
    /// changes take effect without a restart. Failing to read it falls
    /// back to retrying in one hour rather than killing the loop.
    pub async fn run_daily(&self, cancel: CancellationToken) {
        info!("enforcement scheduler started");
        loop {
            let wait = match self.store.raw_settings().await {
                Ok(raw) => {
                    let check_time = PolicySettings::from_raw(&raw).check_time;
                    let wait = time_until_next(Local::now().naive_local(), check_time);
                    debug!(
                        check_time = %check_time,
                        wait_secs = wait.as_secs(),
                        "next enforcement pass scheduled"
                    );
                    wait
                }
                Err(e) => {
                    warn!(error = %e, "cannot read check time, retrying in one hour");
                    SETTINGS_RETRY
                }
            };

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(wait) => {}
            }

            if let Err(e) = self.run_once().await {
                error!(error = %e, "enforcement pass failed");
            }
        }
        debug!("enforcement scheduler stopped");
    }
}

/// The suspension decision, pure.
///
/// A subscriber should be suspended exactly when no payment marker exists
/// for the current period and today's day of month has reached the grace
/// deadline (`billing_day + grace_days`). Monotonic non-decreasing in the
/// day for fixed other inputs.
pub fn should_suspend(
    billing_day: u8,
    grace_days: u8,
    has_payment: bool,
    today: NaiveDate,
) -> bool {
    let deadline = u32::from(billing_day) + u32::from(grace_days);
    !has_payment && today.day() >= deadline
}

/// Billing-period label for a date (`"%Y-%m"`).
pub fn period_label(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Wall-clock wait until the next occurrence of `check` strictly after
/// `now`: later today if the time has not passed yet, else tomorrow.
pub fn time_until_next(now: NaiveDateTime, check: NaiveTime) -> Duration {
    let today_at = now.date().and_time(check);
    let target = if today_at > now {
        today_at
    } else {
        (now.date() + chrono::Days::new(1)).and_time(check)
    };
    (target - now).to_std().unwrap_or(Duration::ZERO)
}
