//! CLI configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nudge_cta::CtaTargets;
use nudge_diagnostics::DiagnosticsConfig;
use nudge_engine::PipelineConfig;
use serde::{Deserialize, Serialize};

/// Everything the `nudge` binary can be configured with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NudgeConfig {
    pub pipeline: PipelineConfig,
    pub cta: CtaTargets,
    pub diagnostics: DiagnosticsConfig,
}

impl NudgeConfig {
    /// Load from `path`, or the default location. A missing file yields
    /// defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => match Self::default_config_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !config_path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        Self::from_toml(&contents, &config_path)
    }

    fn from_toml(contents: &str, origin: &Path) -> Result<Self> {
        let config: NudgeConfig = toml::from_str(contents)
            .with_context(|| format!("parsing {}", origin.display()))?;
        config
            .cta
            .validate()
            .with_context(|| format!("invalid cta targets in {}", origin.display()))?;
        Ok(config)
    }

    /// `<config_dir>/nudge/config.toml`
    fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("nudge").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nudge_cta::ActionKind;

    #[test]
    fn missing_file_yields_defaults() {
        let config = NudgeConfig::load(Some("/nonexistent/nudge/config.toml")).unwrap();
        assert_eq!(config, NudgeConfig::default());
    }

    #[test]
    fn partial_toml() {
        let config = NudgeConfig::from_toml(
            r#"
            [pipeline]
            max_per_session = 5

            [cta.upgrade]
            kind = "route"
            target = "/pricing"

            [diagnostics.governance]
            excessive_exposure = 25
            "#,
            Path::new("test.toml"),
        )
        .unwrap();
        assert_eq!(config.pipeline.max_per_session, 5);
        assert_eq!(config.pipeline.cooldown_ladder_days, vec![1, 3, 7, 30]);
        assert_eq!(config.cta.upgrade.kind, ActionKind::Route);
        assert_eq!(config.diagnostics.governance.excessive_exposure, 25);
        assert_eq!(config.diagnostics.governance.fatigue_exposures_without_action, 5);
    }

    #[test]
    fn invalid_targets_are_rejected() {
        let err = NudgeConfig::from_toml(
            r#"
            [cta.pay_now]
            kind = "route"
            target = ""
            "#,
            Path::new("bad.toml"),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("invalid cta targets"));
    }
}
