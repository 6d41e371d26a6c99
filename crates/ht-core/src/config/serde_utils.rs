//! Serde helpers for config fields

/// `Duration` stored as whole milliseconds, e.g. `resize_poll_interval_ms = 250`
pub mod duration_millis {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestConfig {
        #[serde(with = "duration_millis")]
        interval: Duration,
    }

    #[test]
    fn test_duration_millis_serialize() {
        let config = TestConfig {
            interval: Duration::from_millis(250),
        };
        let text = toml::to_string(&config).unwrap();
        assert_eq!(text.trim(), "interval = 250");
    }

    #[test]
    fn test_duration_millis_deserialize() {
        let config: TestConfig = toml::from_str("interval = 1500").unwrap();
        assert_eq!(config.interval, Duration::from_millis(1500));
    }
}
