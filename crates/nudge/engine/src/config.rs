//! Pipeline configuration.

use serde::{Deserialize, Serialize};

/// Default cooldown ladder, in days, indexed by prior dismissals.
pub const DEFAULT_COOLDOWN_LADDER_DAYS: [u32; 4] = [1, 3, 7, 30];

/// Default maximum insights surfaced per session.
pub const DEFAULT_MAX_PER_SESSION: i64 = 3;

/// Default number of times one insight may show per UTC day.
pub const DEFAULT_DAILY_FREQUENCY_CAP: u32 = 1;

/// Tunables for the insight pipeline and cooldown state machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum insights returned by one run. Zero or negative yields none.
    pub max_per_session: i64,
    /// Shows per insight per UTC day before it is frequency capped.
    pub daily_frequency_cap: u32,
    /// Cooldown lengths in days applied on successive dismissals.
    pub cooldown_ladder_days: Vec<u32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_per_session: DEFAULT_MAX_PER_SESSION,
            daily_frequency_cap: DEFAULT_DAILY_FREQUENCY_CAP,
            cooldown_ladder_days: DEFAULT_COOLDOWN_LADDER_DAYS.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_per_session, 3);
        assert_eq!(config.daily_frequency_cap, 1);
        assert_eq!(config.cooldown_ladder_days, vec![1, 3, 7, 30]);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "max_per_session": 5 }"#).unwrap();
        assert_eq!(config.max_per_session, 5);
        assert_eq!(config.daily_frequency_cap, 1);
        assert_eq!(config.cooldown_ladder_days.len(), 4);
    }
}
