//! Minute-granular, UTC-normalized join key shared by every source.

use std::{fmt, str::FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const MS_PER_MINUTE: i64 = 60_000;

/// A UTC instant truncated to the minute.
///
/// Rendered as `YYYY-MM-DDTHH:MM:SS+00:00`. Ordering follows time, which for
/// this fixed-width form is also lexicographic ordering of the rendered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalTimestamp(DateTime<Utc>);

impl CanonicalTimestamp {
    /// Truncates an epoch-millisecond timestamp to its UTC minute.
    ///
    /// Returns `None` when the value is outside chrono's representable range.
    pub fn from_millis(ms: i64) -> Option<Self> {
        let floored = ms.div_euclid(MS_PER_MINUTE) * MS_PER_MINUTE;
        DateTime::<Utc>::from_timestamp_millis(floored).map(Self)
    }

    /// Truncates any UTC instant to its minute.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let floored = dt.timestamp_millis().div_euclid(MS_PER_MINUTE) * MS_PER_MINUTE;
        // Flooring an in-range instant towards the epoch cannot leave the range.
        Self(DateTime::<Utc>::from_timestamp_millis(floored).unwrap_or(dt))
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for CanonicalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Secs, false))
    }
}

impl FromStr for CanonicalTimestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dt = DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc);
        Ok(Self::from_datetime(dt))
    }
}

impl Serialize for CanonicalTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CanonicalTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
