//! Serde helpers for durations written as plain integers in `app.yaml`
//! (seconds for the coarse intervals, milliseconds for retry backoff).

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Reads a `Duration` from an integer number of milliseconds.
pub fn deserialize_duration_from_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Duration::from_millis(u64::deserialize(deserializer)?))
}

/// Reads a `Duration` from an integer number of seconds.
pub fn deserialize_duration_from_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Duration::from_secs(u64::deserialize(deserializer)?))
}

/// Writes a `Duration` as an integer number of milliseconds.
pub fn serialize_duration_to_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Writes a `Duration` as an integer number of seconds.
pub fn serialize_duration_to_seconds<S>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_secs())
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct SecondsField {
        #[serde(
            deserialize_with = "deserialize_duration_from_seconds",
            serialize_with = "serialize_duration_to_seconds"
        )]
        duration: Duration,
    }

    #[test]
    fn seconds_round_trip() {
        let json = r#"{"duration":5}"#;
        let parsed: SecondsField = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.duration, Duration::from_secs(5));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), json);
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct MillisField {
        #[serde(deserialize_with = "deserialize_duration_from_ms")]
        duration: Duration,
    }

    #[test]
    fn milliseconds_deserialize() {
        let parsed: MillisField = serde_json::from_str(r#"{"duration":250}"#).unwrap();
        assert_eq!(parsed.duration, Duration::from_millis(250));
    }
}
