// ── Resource path and field-key conventions ──
//
// The subset of the device resource tree the enforcement core touches.

/// Per-subscriber bandwidth shaping rules.
pub const SIMPLE_QUEUE: &str = "/queue/simple";

/// Named firewall address lists (used for access suspension).
pub const ADDRESS_LIST: &str = "/ip/firewall/address-list";

/// Device identity; the cheapest round-trip, used as a liveness probe.
pub const SYSTEM_IDENTITY: &str = "/system/identity";

/// CPU / memory / storage / uptime counters.
pub const SYSTEM_RESOURCE: &str = "/system/resource";

/// Field key carrying an entry's identifier in query results.
pub const ID: &str = "id";
