// ── Enforcement policy settings ──
//
// Typed view over the operator's key/value settings table. Values are
// resolved against documented defaults once per read; malformed values log
// a warning and fall back rather than halting a cycle.

use std::collections::HashMap;

use chrono::NaiveTime;
use strum::{Display, EnumString};
use tracing::warn;

/// How a suspended subscriber is cut off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
#[strum(serialize_all = "snake_case")]
pub enum SuspensionMethod {
    /// Clamp the subscriber's queue to the suspension rate.
    #[default]
    Queue,
    /// Disable the subscriber's firewall address-list entry.
    AddressList,
    /// Both of the above.
    Both,
}

impl SuspensionMethod {
    /// Whether suspension clamps the bandwidth queue.
    pub fn shapes_bandwidth(self) -> bool {
        matches!(self, Self::Queue | Self::Both)
    }

    /// Whether suspension toggles the address-list entry.
    pub fn uses_address_list(self) -> bool {
        matches!(self, Self::AddressList | Self::Both)
    }
}

/// Resolved enforcement policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySettings {
    pub method: SuspensionMethod,
    /// Queue limit applied while suspended, device syntax (`"up/down"`).
    pub suspension_rate: String,
    /// Firewall address list holding subscriber entries.
    pub address_list: String,
    /// Days past the billing day before suspension may trigger.
    pub grace_days: u8,
    /// Local time of day the daily enforcement pass runs.
    pub check_time: NaiveTime,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            method: SuspensionMethod::Queue,
            suspension_rate: "1k/1k".into(),
            address_list: "clientes_activos".into(),
            grace_days: 3,
            check_time: default_check_time(),
        }
    }
}

fn default_check_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default()
}

impl PolicySettings {
    /// Resolve policy settings from the raw key/value table.
    ///
    /// Missing keys take their documented default. Malformed values are
    /// logged and replaced by the default, never propagated as errors.
    pub fn from_raw(raw: &HashMap<String, String>) -> Self {
        let defaults = Self::default();

        let method = match raw.get("suspension_method") {
            Some(s) => s.parse().unwrap_or_else(|_| {
                warn!(value = %s, "unknown suspension_method, using {}", defaults.method);
                defaults.method
            }),
            None => defaults.method,
        };

        let grace_days = match raw.get("grace_days") {
            Some(s) => s.parse().unwrap_or_else(|_| {
                warn!(value = %s, "unparsable grace_days, using {}", defaults.grace_days);
                defaults.grace_days
            }),
            None => defaults.grace_days,
        };

        let check_time = match raw.get("check_time") {
            Some(s) => NaiveTime::parse_from_str(s, "%H:%M").unwrap_or_else(|_| {
                warn!(value = %s, "unparsable check_time, using {}", defaults.check_time);
                defaults.check_time
            }),
            None => defaults.check_time,
        };

        Self {
            method,
            suspension_rate: raw
                .get("suspension_speed")
                .cloned()
                .unwrap_or(defaults.suspension_rate),
            address_list: raw
                .get("address_list_name")
                .cloned()
                .unwrap_or(defaults.address_list),
            grace_days,
            check_time,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn empty_table_resolves_to_documented_defaults() {
        let settings = PolicySettings::from_raw(&HashMap::new());
        assert_eq!(settings.method, SuspensionMethod::Queue);
        assert_eq!(settings.suspension_rate, "1k/1k");
        assert_eq!(settings.address_list, "clientes_activos");
        assert_eq!(settings.grace_days, 3);
        assert_eq!(settings.check_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let settings = PolicySettings::from_raw(&raw(&[
            ("suspension_method", "both"),
            ("suspension_speed", "2k/2k"),
            ("address_list_name", "subs"),
            ("grace_days", "5"),
            ("check_time", "23:30"),
        ]));
        assert_eq!(settings.method, SuspensionMethod::Both);
        assert_eq!(settings.suspension_rate, "2k/2k");
        assert_eq!(settings.address_list, "subs");
        assert_eq!(settings.grace_days, 5);
        assert_eq!(
            settings.check_time,
            NaiveTime::from_hms_opt(23, 30, 0).unwrap()
        );
    }

    #[test]
    fn malformed_values_fall_back_instead_of_failing() {
        let settings = PolicySettings::from_raw(&raw(&[
            ("suspension_method", "carrier-pigeon"),
            ("grace_days", "soon"),
            ("check_time", "9 o'clock"),
        ]));
        assert_eq!(settings.method, SuspensionMethod::Queue);
        assert_eq!(settings.grace_days, 3);
        assert_eq!(settings.check_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[test]
    fn method_string_forms_round_trip() {
        assert_eq!(
            "address_list".parse::<SuspensionMethod>().unwrap(),
            SuspensionMethod::AddressList
        );
        assert_eq!(SuspensionMethod::Both.to_string(), "both");
        assert!(SuspensionMethod::AddressList.uses_address_list());
        assert!(!SuspensionMethod::AddressList.shapes_bandwidth());
        assert!(SuspensionMethod::Both.shapes_bandwidth());
    }
}
