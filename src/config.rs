use chrono::{DateTime, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Deserializer, Serialize};

/// Configuration of a simulated clock.
///
/// ```rust
/// use sim_timers::{ClockConfig, ClockConfigBuilder, TimeSource};
///
/// let config = ClockConfigBuilder::default()
///     .time_source(TimeSource::System)
///     .max_cycles_per_advance(Some(100))
///     .build()
///     .unwrap();
/// assert_eq!(config.max_cycles_per_advance, Some(100));
///
/// let config = ClockConfig::default();
/// assert_eq!(config.time_source, TimeSource::System);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[builder(pattern = "owned")]
pub struct ClockConfig {
    /// Where the real "host" time that simulated offsets are added to comes from.
    #[serde(default)]
    #[builder(default, setter(into))]
    pub time_source: TimeSource,
    /// Upper bound on consecutive re-collections at one simulated instant.
    /// The count starts over whenever execution moves to a later instant.
    /// `None` disables the guard.
    #[serde(default = "default_max_cycles")]
    #[builder(default = "default_max_cycles()")]
    pub max_cycles_per_advance: Option<u32>,
}

fn default_max_cycles() -> Option<u32> {
    Some(10_000)
}

/// Truncate a DateTime to millisecond precision.
/// Simulated offsets are whole milliseconds, so the host time is too.
fn truncate_to_millis(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(time.timestamp_millis()).unwrap_or(time)
}

fn deserialize_millis<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    DateTime::<Utc>::deserialize(deserializer).map(truncate_to_millis)
}

impl ClockConfig {
    /// Config whose host time is pinned at `at`, making every simulated
    /// date fully deterministic.
    pub fn fixed_at(at: DateTime<Utc>) -> Self {
        Self {
            time_source: TimeSource::fixed(at),
            ..Default::default()
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            time_source: TimeSource::default(),
            max_cycles_per_advance: default_max_cycles(),
        }
    }
}

/// Source of host time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimeSource {
    /// The system wall clock (`Utc::now()`).
    #[default]
    System,
    /// A fixed instant.
    Fixed {
        #[serde(deserialize_with = "deserialize_millis")]
        at: DateTime<Utc>,
    },
}

impl TimeSource {
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed {
            at: truncate_to_millis(at),
        }
    }

    pub fn host_now(&self) -> DateTime<Utc> {
        match self {
            TimeSource::System => Utc::now(),
            TimeSource::Fixed { at } => *at,
        }
    }
}

impl From<DateTime<Utc>> for TimeSource {
    fn from(at: DateTime<Utc>) -> Self {
        Self::fixed(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_source_is_truncated_to_millis() {
        let at = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let source = TimeSource::fixed(at);
        assert_eq!(source.host_now().timestamp_subsec_nanos(), 123_000_000);
    }

    #[test]
    fn deserialized_fixed_source_is_truncated_to_millis() {
        let source: TimeSource = serde_json::from_str(
            r#"{ "type": "fixed", "at": "2023-11-14T22:13:20.123456789Z" }"#,
        )
        .unwrap();
        let at = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        assert_eq!(source, TimeSource::fixed(at));
        assert_eq!(source.host_now().timestamp_subsec_nanos(), 123_000_000);
    }

    #[test]
    fn builder_applies_defaults() {
        let config = ClockConfigBuilder::default().build().unwrap();
        assert_eq!(config, ClockConfig::default());
        assert_eq!(config.max_cycles_per_advance, Some(10_000));
    }
}
