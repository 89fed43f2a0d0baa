// ── Row-to-domain conversions ──
//
// Bridges raw reply rows (`BTreeMap<String, String>`) into the typed
// records of `crate::model`. Missing or unparseable attributes become
// `None` / zero rather than errors: devices omit unset fields and vary
// formats between firmware releases.

use std::time::Duration;

use tiklink_api::Row;

use crate::model::{
    ActiveSession, BoardInfo, HotspotAccount, HotspotProfile, Identity, SystemResources,
};

/// Value devices use for an unset limit.
pub(crate) const UNLIMITED: &str = "unlimited";

// ── Helpers ────────────────────────────────────────────────────────

fn text(row: &Row, key: &str) -> Option<String> {
    row.get(key).filter(|v| !v.is_empty()).cloned()
}

fn number<T: std::str::FromStr>(row: &Row, key: &str) -> Option<T> {
    row.get(key).and_then(|v| v.trim().parse().ok())
}

fn flag(row: &Row, key: &str) -> bool {
    row.get(key).is_some_and(|v| v == "true" || v == "yes")
}

/// A limit attribute, treating `unlimited` like absence.
fn limit(row: &Row, key: &str) -> Option<String> {
    text(row, key).filter(|v| v != UNLIMITED)
}

/// Parse a device uptime such as `5d 12h 30m 15s`, `1w2d3h` or `00:10:00`.
pub fn parse_uptime(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() || raw == UNLIMITED {
        return None;
    }
    if raw.contains(':') {
        return parse_clock(raw);
    }
    humantime::parse_duration(raw).ok()
}

/// `hh:mm:ss`, as older firmware prints short durations.
fn parse_clock(raw: &str) -> Option<Duration> {
    let mut secs = 0u64;
    for part in raw.split(':') {
        secs = secs.checked_mul(60)?.checked_add(part.parse().ok()?)?;
    }
    Some(Duration::from_secs(secs))
}

// ── Hotspot ────────────────────────────────────────────────────────

impl From<&Row> for HotspotAccount {
    fn from(row: &Row) -> Self {
        Self {
            id: text(row, ".id").unwrap_or_default(),
            name: text(row, "name").unwrap_or_default(),
            profile: text(row, "profile"),
            limit_uptime: limit(row, "limit-uptime"),
            limit_bytes_total: limit(row, "limit-bytes-total").and_then(|v| v.parse().ok()),
            uptime: text(row, "uptime"),
            bytes_in: number(row, "bytes-in").unwrap_or(0),
            bytes_out: number(row, "bytes-out").unwrap_or(0),
            comment: text(row, "comment"),
            disabled: flag(row, "disabled"),
        }
    }
}

impl From<&Row> for ActiveSession {
    fn from(row: &Row) -> Self {
        Self {
            id: text(row, ".id"),
            user: text(row, "user").unwrap_or_default(),
            address: number(row, "address"),
            mac_address: text(row, "mac-address"),
            uptime: text(row, "uptime"),
            bytes_in: number(row, "bytes-in").unwrap_or(0),
            bytes_out: number(row, "bytes-out").unwrap_or(0),
        }
    }
}

impl From<&Row> for HotspotProfile {
    fn from(row: &Row) -> Self {
        Self {
            id: text(row, ".id"),
            name: text(row, "name").unwrap_or_default(),
            shared_users: number(row, "shared-users"),
            rate_limit: text(row, "rate-limit"),
        }
    }
}

// ── System ─────────────────────────────────────────────────────────

impl From<&Row> for Identity {
    fn from(row: &Row) -> Self {
        Self {
            name: text(row, "name").unwrap_or_else(|| "Unknown".into()),
        }
    }
}

impl From<&Row> for BoardInfo {
    fn from(row: &Row) -> Self {
        Self {
            routerboard: flag(row, "routerboard"),
            model: text(row, "model"),
            serial_number: text(row, "serial-number"),
            firmware: text(row, "current-firmware"),
            upgrade_firmware: text(row, "upgrade-firmware"),
        }
    }
}

impl From<&Row> for SystemResources {
    fn from(row: &Row) -> Self {
        Self {
            uptime: text(row, "uptime"),
            version: text(row, "version"),
            board_name: text(row, "board-name"),
            // Older firmware reports `cpu` instead of `cpu-load`.
            cpu_load: number(row, "cpu-load").or_else(|| number(row, "cpu")),
            free_memory: number(row, "free-memory"),
            total_memory: number(row, "total-memory"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn account_from_row() {
        let account = HotspotAccount::from(&row(&[
            (".id", "*1A"),
            ("name", "V1"),
            ("password", "V1"),
            ("profile", "default"),
            ("limit-uptime", "1h"),
            ("limit-bytes-total", "1048576"),
            ("bytes-in", "1024"),
            ("bytes-out", "2048"),
            ("disabled", "false"),
        ]));
        assert_eq!(account.id, "*1A");
        assert_eq!(account.limit_uptime.as_deref(), Some("1h"));
        assert_eq!(account.limit_bytes_total, Some(1_048_576));
        assert_eq!(account.limit_uptime_duration(), Some(Duration::from_secs(3600)));
        assert_eq!(account.bytes_total(), 3072);
        assert!(!account.disabled);
        assert!(account.has_limits());
    }

    #[test]
    fn unlimited_is_none() {
        let account = HotspotAccount::from(&row(&[
            ("name", "staff"),
            ("limit-uptime", "unlimited"),
            ("limit-bytes-total", "unlimited"),
        ]));
        assert_eq!(account.limit_uptime, None);
        assert_eq!(account.limit_bytes_total, None);
        assert!(!account.has_limits());
    }

    #[test]
    fn active_session_parses_address() {
        let session = ActiveSession::from(&row(&[
            ("user", "V1"),
            ("address", "192.168.88.23"),
            ("mac-address", "AA:BB:CC:DD:EE:FF"),
            ("bytes-in", "not-a-number"),
        ]));
        assert_eq!(session.address, Some("192.168.88.23".parse().unwrap()));
        assert_eq!(session.bytes_in, 0);
        assert_eq!(session.id, None);
    }

    #[test]
    fn resources_accept_both_cpu_spellings() {
        let modern = SystemResources::from(&row(&[("cpu-load", "17")]));
        assert_eq!(modern.cpu_load, Some(17.0));
        let legacy = SystemResources::from(&row(&[("cpu", "15.5")]));
        assert_eq!(legacy.cpu_load, Some(15.5));
    }

    #[test]
    fn memory_usage_percent() {
        let resources = SystemResources::from(&row(&[
            ("total-memory", "262144000"),
            ("free-memory", "196608000"),
            ("uptime", "5d 12h 30m 15s"),
        ]));
        assert_eq!(resources.used_memory(), Some(65_536_000));
        assert_eq!(resources.memory_usage_percent(), Some(25.0));
        assert_eq!(
            resources.uptime_duration(),
            Some(Duration::from_secs(5 * 86_400 + 12 * 3_600 + 30 * 60 + 15))
        );
    }

    #[test]
    fn uptime_formats() {
        assert_eq!(parse_uptime("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_uptime("00:10:00"), Some(Duration::from_secs(600)));
        assert_eq!(parse_uptime("unlimited"), None);
        assert_eq!(parse_uptime(""), None);
        assert_eq!(parse_uptime("soon"), None);
    }

    #[test]
    fn board_info_from_row() {
        let board = BoardInfo::from(&row(&[
            ("routerboard", "true"),
            ("model", "RB750Gr3"),
            ("serial-number", "MOCK-12345678"),
            ("current-firmware", "6.49.7"),
        ]));
        assert!(board.routerboard);
        assert_eq!(board.model.as_deref(), Some("RB750Gr3"));
        assert_eq!(board.upgrade_firmware, None);
    }
}
