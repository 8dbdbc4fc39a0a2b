use std::fmt;
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Timestamp carried by a claim.
///
/// Claims are ordered by this value and a file's version history is keyed by
/// it. [`ClaimTime::render`] produces the fixed-width name used for version
/// entries, so lexical order of rendered names equals chronological order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimTime(DateTime<Utc>);

impl ClaimTime {
    /// Wrap a UTC instant.
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Build from milliseconds since the UNIX epoch.
    pub fn from_unix_millis(ms: i64) -> Result<Self, TypeError> {
        DateTime::from_timestamp_millis(ms)
            .map(Self)
            .ok_or_else(|| TypeError::InvalidTime(format!("{ms}ms out of range")))
    }

    /// Parse an RFC 3339 timestamp, normalizing to UTC.
    pub fn parse_rfc3339(s: &str) -> Result<Self, TypeError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| TypeError::InvalidTime(format!("{s}: {e}")))
    }

    /// The wrapped instant.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    pub fn to_system_time(&self) -> SystemTime {
        SystemTime::from(self.0)
    }

    /// Returns `true` if this time is strictly after `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    /// Returns `true` if this time is strictly before `other`.
    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }

    /// Fixed-width RFC 3339 rendering with nanosecond precision.
    ///
    /// `2020-01-01T00:00:00.000000000Z`
    pub fn render(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }
}

impl From<DateTime<Utc>> for ClaimTime {
    fn from(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}

impl fmt::Debug for ClaimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClaimTime({})", self.render())
    }
}

impl fmt::Display for ClaimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn render_is_fixed_width_utc() {
        let t = ClaimTime::parse_rfc3339("2020-01-01T00:00:00Z").unwrap();
        assert_eq!(t.render(), "2020-01-01T00:00:00.000000000Z");
    }

    #[test]
    fn parse_normalizes_offsets() {
        let a = ClaimTime::parse_rfc3339("2020-06-01T02:00:00+02:00").unwrap();
        let b = ClaimTime::parse_rfc3339("2020-06-01T00:00:00Z").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = ClaimTime::parse_rfc3339("yesterday").unwrap_err();
        assert!(matches!(err, TypeError::InvalidTime(_)));
    }

    #[test]
    fn ordering_is_chronological() {
        let a = ClaimTime::parse_rfc3339("2020-01-01T00:00:00Z").unwrap();
        let b = ClaimTime::parse_rfc3339("2020-06-01T00:00:00Z").unwrap();
        assert!(a.is_before(&b));
        assert!(b.is_after(&a));
        assert!(!a.is_after(&a));
    }

    #[test]
    fn system_time_matches_epoch_offset() {
        let t = ClaimTime::from_unix_millis(1_500).unwrap();
        let since = t
            .to_system_time()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap();
        assert_eq!(since.as_millis(), 1_500);
    }

    #[test]
    fn serde_uses_rfc3339() {
        let t = ClaimTime::parse_rfc3339("2020-01-01T00:00:00Z").unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("2020-01-01T00:00:00"));
        let back: ClaimTime = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }

    proptest! {
        #[test]
        fn rendered_names_sort_like_times(a in 0i64..4_000_000_000_000, b in 0i64..4_000_000_000_000) {
            let ta = ClaimTime::from_unix_millis(a).unwrap();
            let tb = ClaimTime::from_unix_millis(b).unwrap();
            prop_assert_eq!(ta.cmp(&tb), ta.render().cmp(&tb.render()));
        }
    }
}
