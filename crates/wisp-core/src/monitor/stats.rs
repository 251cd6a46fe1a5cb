// ── Device statistics readers ──
//
// On-demand reads of device health counters and per-queue traffic, for
// dashboards. Both go through the pool like every other device call, so
// they serialize with syncs and probes against the same device.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use wisp_device::{resource, DeviceError, Fields};

use crate::error::CoreError;
use crate::model::DeviceDescriptor;
use crate::pool::ConnectionPool;

/// System resource counters of one device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceHealth {
    pub cpu_load: u8,
    /// Percent of memory in use.
    pub ram_usage: f64,
    /// Percent of storage in use.
    pub hdd_usage: f64,
    pub uptime: String,
    pub version: String,
    pub board: String,
    pub architecture: String,
}

/// Byte totals and current rates of one bandwidth queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueTraffic {
    pub upload_bytes: u64,
    pub download_bytes: u64,
    pub upload_rate: u64,
    pub download_rate: u64,
}

/// Read `/system/resource` from a device.
pub async fn device_health(
    pool: &Arc<ConnectionPool>,
    device: &DeviceDescriptor,
) -> Result<DeviceHealth, CoreError> {
    let lease = pool.lease(device).await?;
    let rows = lease
        .run(|session| session.query(resource::SYSTEM_RESOURCE, &[]))
        .await?;
    let row = rows
        .first()
        .ok_or_else(|| CoreError::from(DeviceError::protocol("no resource data returned")))?;
    Ok(parse_health(row))
}

/// Read per-queue traffic from a device, keyed by target address
/// (`/32` suffixes stripped).
pub async fn queue_traffic(
    pool: &Arc<ConnectionPool>,
    device: &DeviceDescriptor,
) -> Result<BTreeMap<String, QueueTraffic>, CoreError> {
    let lease = pool.lease(device).await?;
    let rows = lease
        .run(|session| session.query(resource::SIMPLE_QUEUE, &[]))
        .await?;

    let mut stats = BTreeMap::new();
    for row in &rows {
        let Some(target) = row.get("target") else {
            continue;
        };
        let target = target.strip_suffix("/32").unwrap_or(target).to_owned();
        stats.insert(target, parse_traffic(row));
    }
    Ok(stats)
}

fn parse_health(row: &Fields) -> DeviceHealth {
    let total_mem = field_u64(row, "total-memory").max(1);
    let free_mem = field_u64(row, "free-memory");
    let total_hdd = field_u64(row, "total-hdd-space");
    let free_hdd = field_u64(row, "free-hdd-space");

    DeviceHealth {
        cpu_load: u8::try_from(field_u64(row, "cpu-load")).unwrap_or(u8::MAX),
        ram_usage: used_percent(total_mem, free_mem),
        hdd_usage: if total_hdd > 0 {
            used_percent(total_hdd, free_hdd)
        } else {
            0.0
        },
        uptime: field_str(row, "uptime"),
        version: field_str(row, "version"),
        board: field_str(row, "board-name"),
        architecture: field_str(row, "architecture-name"),
    }
}

/// Parse a queue row's `"upload/download"` byte and rate pairs.
fn parse_traffic(row: &Fields) -> QueueTraffic {
    let (upload_bytes, download_bytes) = split_pair(row.get("bytes").map_or("", String::as_str));
    let (upload_rate, download_rate) = split_pair(row.get("rate").map_or("", String::as_str));
    QueueTraffic {
        upload_bytes,
        download_bytes,
        upload_rate,
        download_rate,
    }
}

/// Split a `"a/b"` counter pair; absent or malformed halves read as 0.
fn split_pair(value: &str) -> (u64, u64) {
    let mut parts = value.splitn(2, '/');
    let first = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let second = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (first, second)
}

fn field_u64(row: &Fields, key: &str) -> u64 {
    row.get(key).and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn field_str(row: &Fields, key: &str) -> String {
    row.get(key).cloned().unwrap_or_else(|| "N/A".into())
}

#[allow(clippy::cast_precision_loss)]
fn used_percent(total: u64, free: u64) -> f64 {
    let used = total.saturating_sub(free) as f64;
    (used / total as f64) * 100.0
}

// ── Human-readable formatting ────────────────────────────────────────

const BYTE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
const RATE_UNITS: [&str; 5] = ["bps", "Kbps", "Mbps", "Gbps", "Tbps"];

/// `1536` → `"1.5 KB"`.
pub fn format_bytes(bytes: u64) -> String {
    scale(bytes, 1024.0, &BYTE_UNITS)
}

/// `2_500_000` → `"2.5 Mbps"`.
pub fn format_rate(bits_per_sec: u64) -> String {
    scale(bits_per_sec, 1000.0, &RATE_UNITS)
}

#[allow(clippy::cast_precision_loss)]
fn scale(value: u64, step: f64, units: &[&str]) -> String {
    let mut value = value as f64;
    for unit in &units[..units.len() - 1] {
        if value < step {
            return format!("{value:.1} {unit}");
        }
        value /= step;
    }
    format!("{value:.1} {last}", last = units[units.len() - 1])
}
