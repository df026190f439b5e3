// src/config.rs - Layered service configuration
use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::analysis::AnalysisConfig;
use crate::pose_bridge::PoseSettings;
use crate::rules::FormThresholds;
use crate::squat::SquatTrackerConfig;
use crate::video::VideoSettings;

const DEFAULT_CONFIG_FILE: &str = "lift_coach.toml";
const CONFIG_PATH_VAR: &str = "LIFT_COACH_CONFIG";
const ENV_PREFIX: &str = "LIFT_COACH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
    /// Uploads are staged here for the duration of one request.
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub max_concurrent_analyses: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5001".to_string(),
            upload_dir: std::env::temp_dir().join("lift_coach_uploads"),
            max_upload_bytes: 256 * 1024 * 1024,
            max_concurrent_analyses: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub video: VideoSettings,
    pub pose: PoseSettings,
    pub rules: FormThresholds,
    pub squat: SquatTrackerConfig,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            video: VideoSettings::default(),
            pose: PoseSettings::default(),
            rules: FormThresholds::default(),
            squat: SquatTrackerConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Defaults, then the TOML file, then `LIFT_COACH__SECTION__KEY`
    /// environment variables. The file is only required when a path was
    /// given explicitly, either here or through `LIFT_COACH_CONFIG`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from));
        let required = explicit.is_some();
        let file = explicit.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        Self::build(Config::builder().add_source(File::from(file.as_path()).required(required)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            thresholds: self.rules,
            squat: self.squat,
        }
    }

    pub fn max_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::squat::CounterReset;
    use config::FileFormat;

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::load(Some(Path::new("/nonexistent/lift_coach.toml")));
        assert!(settings.is_err(), "explicit config path must exist");

        let settings = Settings::build(Config::builder()).unwrap();
        assert_eq!(settings.squat.min_frames_per_rep, 15);
        assert_eq!(settings.rules.deep_depth, 0.08);
        assert_eq!(settings.server.max_concurrent_analyses, 1);
        assert_eq!(settings.max_level(), Level::INFO);
    }

    #[test]
    fn test_file_overrides() {
        let toml = r#"
            log_level = "debug"

            [server]
            bind_addr = "127.0.0.1:8080"

            [pose]
            command = "python3"
            args = ["pose_sidecar.py", "--min-detection-confidence", "0.5"]

            [rules]
            knee_drift = 0.2

            [squat]
            min_frames_per_rep = 10
            counter_reset = "on_descent"
        "#;
        let settings =
            Settings::build(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
                .unwrap();

        assert_eq!(settings.server.bind_addr, "127.0.0.1:8080");
        assert_eq!(settings.pose.command, "python3");
        assert_eq!(settings.pose.args.len(), 3);
        assert_eq!(settings.rules.knee_drift, 0.2);
        assert_eq!(settings.rules.shallow_depth, 0.05);
        assert_eq!(settings.squat.min_frames_per_rep, 10);
        assert_eq!(settings.squat.counter_reset, CounterReset::OnDescent);
        assert_eq!(settings.max_level(), Level::DEBUG);

        let analysis = settings.analysis_config();
        assert_eq!(analysis.squat.min_frames_per_rep, 10);
    }
}
