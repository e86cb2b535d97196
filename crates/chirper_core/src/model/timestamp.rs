//! Millisecond-resolution instant used for tweet creation time.
//!
//! # Invariants
//! - External representation is a plain integer of epoch milliseconds.
//! - An unset instant serializes to `null`, never to epoch-zero.
//! - Epoch-zero input is treated as unset.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};

/// Instant in Unix epoch milliseconds, or unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(Option<i64>);

impl Timestamp {
    /// Unset instant. Serializes to `null`.
    pub const UNSET: Timestamp = Timestamp(None);

    /// Builds an instant from epoch milliseconds. `0` yields [`Timestamp::UNSET`].
    pub fn from_millis(millis: i64) -> Self {
        if millis == 0 {
            Self::UNSET
        } else {
            Self(Some(millis))
        }
    }

    /// Returns epoch milliseconds, or `None` when unset.
    pub fn as_millis(&self) -> Option<i64> {
        self.0
    }

    pub fn is_unset(&self) -> bool {
        self.0.is_none()
    }

    /// Converts to a UTC datetime. `None` when unset or out of chrono range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        self.0.and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self::from_millis(value.timestamp_millis())
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(datetime) => write!(
                f,
                "{}",
                datetime.to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
            None => match self.0 {
                Some(millis) => write!(f, "{millis}ms"),
                None => write!(f, "unset"),
            },
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(millis) => serializer.serialize_i64(millis),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TimestampVisitor)
    }
}

struct TimestampVisitor;

impl<'de> Visitor<'de> for TimestampVisitor {
    type Value = Timestamp;

    fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("epoch milliseconds as an integer, a quoted integer, or null")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Timestamp, E> {
        Ok(Timestamp::from_millis(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Timestamp, E> {
        i64::try_from(value)
            .map(Timestamp::from_millis)
            .map_err(|_| E::custom(format!("timestamp `{value}` out of range")))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Timestamp, E> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(Timestamp::UNSET);
        }
        trimmed
            .parse::<i64>()
            .map(Timestamp::from_millis)
            .map_err(|err| E::custom(format!("invalid timestamp `{trimmed}`: {err}")))
    }

    fn visit_none<E: de::Error>(self) -> Result<Timestamp, E> {
        Ok(Timestamp::UNSET)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Timestamp, E> {
        Ok(Timestamp::UNSET)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Timestamp, D::Error> {
        deserializer.deserialize_any(self)
    }
}
