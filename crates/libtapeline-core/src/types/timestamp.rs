use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Local, NaiveDateTime, SecondsFormat, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A point in time recorded in the project documents.
///
/// Stored with microsecond precision so that a value survives a write/read
/// cycle unchanged. Serialized as RFC 3339 in UTC. Parsing also accepts a
/// naive ISO-8601 date-time, which is interpreted in the local time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

#[derive(Debug, Error)]
pub enum TimestampParseError {
    #[error("unrecognised timestamp '{0}'")]
    Unrecognised(String),
    #[error("timestamp '{0}' does not exist in the local time zone")]
    NonexistentLocalTime(String),
}

impl Timestamp {
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.trunc_subsecs(6))
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// The smallest representable timestamp after this one
    pub fn succ(&self) -> Self {
        Self(self.0 + Duration::microseconds(1))
    }

    pub fn to_iso(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn parse(s: &str) -> Result<Self, TimestampParseError> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self::from_datetime(dt.with_timezone(&Utc)));
        }

        let naive: NaiveDateTime = s
            .parse()
            .map_err(|_| TimestampParseError::Unrecognised(s.to_string()))?;
        let local = Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| TimestampParseError::NonexistentLocalTime(s.to_string()))?;
        Ok(Self::from_datetime(local.with_timezone(&Utc)))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso())
    }
}

impl FromStr for Timestamp {
    type Err = TimestampParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_datetime(dt)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Timestamp::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let ts = Timestamp::parse("2024-03-01T12:00:00.250+02:00").unwrap();
        assert_eq!(ts.to_iso(), "2024-03-01T10:00:00.250000Z");
    }

    #[test]
    fn test_parse_naive_iso_is_local_time() {
        let ts = Timestamp::parse("2024-03-01T12:00:00.123456").unwrap();
        let expected = Local
            .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
            + Duration::microseconds(123_456);
        assert_eq!(ts.as_datetime(), expected);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Timestamp::parse("yesterday"),
            Err(TimestampParseError::Unrecognised(_))
        ));
        assert!(Timestamp::parse("").is_err());
    }

    #[test]
    fn test_nanoseconds_are_truncated() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::nanoseconds(1_999);
        let ts = Timestamp::from_datetime(dt);
        assert_eq!(ts.to_iso(), "2024-01-01T00:00:00.000001Z");
    }

    #[test]
    fn test_succ_is_strictly_later() {
        let ts = Timestamp::parse("2024-01-01T00:00:00Z").unwrap();
        assert!(ts.succ() > ts);
        assert_eq!(ts.succ().to_iso(), "2024-01-01T00:00:00.000001Z");
    }

    #[test]
    fn test_serde_survives_json() {
        let ts = Timestamp::parse("2024-05-06T07:08:09.101112Z").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2024-05-06T07:08:09.101112Z\"");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);

        let bad: Result<Timestamp, _> = serde_json::from_str("\"not a time\"");
        assert!(bad.is_err());
    }
}
