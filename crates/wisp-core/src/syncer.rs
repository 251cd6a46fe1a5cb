// ── Device syncer ──
//
// Reconciles one subscriber's desired network state (queue limits plus
// address-list membership) against live device configuration. All resource
// calls of one attempt run under a single pool lease; the diff checks make
// repeated syncs idempotent. Failures invalidate the connection and retry
// once; an exhausted budget is logged and swallowed — the committed billing
// state stands and the device is reconciled again next cycle.

use std::sync::Arc;

use tracing::{error, info, warn};
use wisp_device::{resource, DeviceError, DeviceSession, Fields};

use crate::config::PolicySettings;
use crate::error::CoreError;
use crate::model::{DeviceDescriptor, Subscriber};
use crate::pool::ConnectionPool;

/// Attempts per sync/remove call. Each retry reconnects from scratch.
const SYNC_ATTEMPTS: u32 = 2;

/// Applies subscriber state to devices through the connection pool.
#[derive(Clone)]
pub struct DeviceSyncer {
    pool: Arc<ConnectionPool>,
}

/// Owned parameters for one reconciliation batch, movable onto the worker
/// thread.
#[derive(Clone)]
struct SyncPlan {
    name: String,
    address: String,
    max_limit: String,
    comment: String,
    manage_list: bool,
    list_name: String,
    /// Address-list `disabled` flag value: `"yes"` while suspended.
    disabled: &'static str,
}

impl DeviceSyncer {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Reconcile the subscriber's queue and address-list entries.
    ///
    /// `suspend` selects between the policy's suspension parameters and the
    /// subscriber's contracted limits. Exhausted retries are logged, never
    /// raised — see the module note.
    pub async fn sync(
        &self,
        subscriber: &Subscriber,
        suspend: bool,
        settings: &PolicySettings,
        device: &DeviceDescriptor,
    ) {
        let plan = build_plan(subscriber, suspend, settings);
        self.with_retries(device, &subscriber.name, move |session| {
            let plan = plan.clone();
            reconcile_queue(session, &plan)?;
            if plan.manage_list {
                reconcile_address_list(session, &plan)
            } else {
                Ok(())
            }
        })
        .await;
    }

    /// Delete the subscriber's queue and address-list entries.
    ///
    /// Entries already absent are treated as removed, not as errors.
    pub async fn remove(
        &self,
        name: &str,
        address: &str,
        settings: &PolicySettings,
        device: &DeviceDescriptor,
    ) {
        let name = name.to_owned();
        let address = address.to_owned();
        let list_name = settings.address_list.clone();
        let label = name.clone();
        self.with_retries(device, &label, move |session| {
            remove_entries(session, &name, &address, &list_name)
        })
        .await;
    }

    /// Run one reconciliation batch with the bounded-retry policy: on any
    /// failure, invalidate the device connection (forcing a reconnect) and
    /// try again; after the final attempt, log and return.
    async fn with_retries<F>(&self, device: &DeviceDescriptor, subscriber: &str, op: F)
    where
        F: Fn(&mut dyn DeviceSession) -> Result<(), DeviceError> + Clone + Send + 'static,
    {
        for attempt in 1..=SYNC_ATTEMPTS {
            let outcome = match self.pool.lease(device).await {
                Ok(lease) => lease.run(op.clone()).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => return,
                Err(e) => {
                    warn!(
                        subscriber,
                        device = %device.id,
                        attempt,
                        attempts = SYNC_ATTEMPTS,
                        error = %e,
                        "device sync attempt failed"
                    );
                    self.pool.invalidate(device.id).await;
                    if attempt == SYNC_ATTEMPTS {
                        let exhausted = CoreError::SyncExhausted {
                            subscriber: subscriber.to_owned(),
                            attempts: SYNC_ATTEMPTS,
                            reason: e.to_string(),
                        };
                        error!(
                            device = %device.id,
                            error = %exhausted,
                            "device sync failed definitively; will reconcile next cycle"
                        );
                    }
                }
            }
        }
    }
}

/// Resolve the desired queue parameters for a subscriber.
///
/// Suspending under a bandwidth-shaping method clamps the queue to the
/// suspension rate; under a pure address-list method the queue keeps the
/// contracted limits and only the list entry is disabled.
fn build_plan(subscriber: &Subscriber, suspend: bool, settings: &PolicySettings) -> SyncPlan {
    let (max_limit, comment) = if suspend && settings.method.shapes_bandwidth() {
        (
            settings.suspension_rate.clone(),
            format!("suspended - {}", subscriber.name),
        )
    } else {
        (
            subscriber.rate_limit(),
            format!("subscriber: {}", subscriber.name),
        )
    };

    SyncPlan {
        name: subscriber.name.clone(),
        address: subscriber.address.clone(),
        max_limit,
        comment,
        manage_list: settings.method.uses_address_list(),
        list_name: settings.address_list.clone(),
        disabled: if suspend { "yes" } else { "no" },
    }
}

/// Find the subscriber's queue entry: by name first, falling back to the
/// target address. Name-first tolerates address changes without creating
/// duplicate entries.
fn find_queue(
    session: &mut dyn DeviceSession,
    name: &str,
    target: &str,
) -> Result<Vec<Fields>, DeviceError> {
    let by_name = session.query(resource::SIMPLE_QUEUE, &[("name", name)])?;
    if by_name.is_empty() {
        session.query(resource::SIMPLE_QUEUE, &[("target", target)])
    } else {
        Ok(by_name)
    }
}

fn reconcile_queue(session: &mut dyn DeviceSession, plan: &SyncPlan) -> Result<(), DeviceError> {
    let target = format!("{}/32", plan.address);
    let existing = find_queue(session, &plan.name, &target)?;

    let desired = [
        ("max-limit", plan.max_limit.as_str()),
        ("target", plan.address.as_str()),
        ("comment", plan.comment.as_str()),
    ];

    match existing.first() {
        Some(entry) => {
            if fields_differ(entry, &desired) {
                let id = entry_id(entry)?;
                session.update(resource::SIMPLE_QUEUE, &id, &desired)?;
            }
        }
        None => {
            session.create(
                resource::SIMPLE_QUEUE,
                &[
                    ("name", plan.name.as_str()),
                    ("target", plan.address.as_str()),
                    ("max-limit", plan.max_limit.as_str()),
                    ("comment", plan.comment.as_str()),
                ],
            )?;
        }
    }
    Ok(())
}

fn reconcile_address_list(
    session: &mut dyn DeviceSession,
    plan: &SyncPlan,
) -> Result<(), DeviceError> {
    let existing = session.query(
        resource::ADDRESS_LIST,
        &[("address", plan.address.as_str()), ("list", plan.list_name.as_str())],
    )?;

    match existing.first() {
        Some(entry) => {
            // Only the disabled flag is diffed; comments are left alone on
            // entries the operator may have touched.
            if entry.get("disabled").map(String::as_str) != Some(plan.disabled) {
                let id = entry_id(entry)?;
                session.update(
                    resource::ADDRESS_LIST,
                    &id,
                    &[("disabled", plan.disabled), ("comment", plan.name.as_str())],
                )?;
            }
        }
        None => {
            session.create(
                resource::ADDRESS_LIST,
                &[
                    ("list", plan.list_name.as_str()),
                    ("address", plan.address.as_str()),
                    ("comment", plan.name.as_str()),
                    ("disabled", plan.disabled),
                ],
            )?;
        }
    }
    Ok(())
}

fn remove_entries(
    session: &mut dyn DeviceSession,
    name: &str,
    address: &str,
    list_name: &str,
) -> Result<(), DeviceError> {
    let target = format!("{address}/32");
    let queue = find_queue(session, name, &target)?;
    if let Some(entry) = queue.first() {
        let id = entry_id(entry)?;
        session.delete(resource::SIMPLE_QUEUE, &id)?;
        info!(subscriber = name, "queue entry removed");
    }

    let list = session.query(
        resource::ADDRESS_LIST,
        &[("address", address), ("list", list_name)],
    )?;
    if let Some(entry) = list.first() {
        let id = entry_id(entry)?;
        session.delete(resource::ADDRESS_LIST, &id)?;
        info!(subscriber = name, "address-list entry removed");
    }
    Ok(())
}

/// True when any desired pair is missing or different on the entry.
fn fields_differ(entry: &Fields, desired: &[(&str, &str)]) -> bool {
    desired
        .iter()
        .any(|(key, value)| entry.get(*key).map(String::as_str) != Some(*value))
}

fn entry_id(entry: &Fields) -> Result<String, DeviceError> {
    entry
        .get(resource::ID)
        .cloned()
        .ok_or_else(|| DeviceError::protocol("entry missing id field"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuspensionMethod;
    use crate::model::{SubscriberId, SubscriberStatus};

    fn subscriber() -> Subscriber {
        Subscriber {
            id: SubscriberId(1),
            name: "ana".into(),
            address: "10.0.0.7".into(),
            upload_limit: "5M".into(),
            download_limit: "10M".into(),
            billing_day: 5,
            status: SubscriberStatus::Active,
            device_id: None,
        }
    }

    #[test]
    fn suspended_plan_under_queue_method_clamps_rate() {
        let plan = build_plan(&subscriber(), true, &PolicySettings::default());
        assert_eq!(plan.max_limit, "1k/1k");
        assert_eq!(plan.comment, "suspended - ana");
        assert!(!plan.manage_list);
        assert_eq!(plan.disabled, "yes");
    }

    #[test]
    fn suspended_plan_under_address_list_method_keeps_contracted_rate() {
        let settings = PolicySettings {
            method: SuspensionMethod::AddressList,
            ..PolicySettings::default()
        };
        let plan = build_plan(&subscriber(), true, &settings);
        assert_eq!(plan.max_limit, "5M/10M");
        assert_eq!(plan.comment, "subscriber: ana");
        assert!(plan.manage_list);
    }

    #[test]
    fn active_plan_uses_contracted_rate() {
        let plan = build_plan(&subscriber(), false, &PolicySettings::default());
        assert_eq!(plan.max_limit, "5M/10M");
        assert_eq!(plan.disabled, "no");
    }

    #[test]
    fn exhausted_error_names_subscriber_and_attempts() {
        let err = CoreError::SyncExhausted {
            subscriber: "ana".into(),
            attempts: SYNC_ATTEMPTS,
            reason: "protocol error: dropped socket".into(),
        };
        assert_eq!(
            err.to_string(),
            "device sync for ana failed after 2 attempts: protocol error: dropped socket"
        );
    }

    #[test]
    fn fields_differ_detects_missing_and_changed_values() {
        let mut entry = Fields::new();
        entry.insert("max-limit".into(), "5M/10M".into());
        assert!(!fields_differ(&entry, &[("max-limit", "5M/10M")]));
        assert!(fields_differ(&entry, &[("max-limit", "1k/1k")]));
        assert!(fields_differ(&entry, &[("comment", "subscriber: ana")]));
    }
}
