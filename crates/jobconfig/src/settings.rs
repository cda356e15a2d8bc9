use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ParamValue, Params};

const DEFAULT_PROGRAM: &str = "lua";
const DEFAULT_SCRIPT: &str = "neural_style.lua";
const DEFAULT_BACKEND: &str = "cudnn";
const DEFAULT_OPTIMIZER: &str = "adam";

/// Tool-wide settings read from `settings.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub renderer: RendererSettings,
    pub planner: PlannerSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RendererSettings {
    pub program: String,
    pub script: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    pub backend: String,
    pub optimizer: String,
    pub tv_weight: f64,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            script: Some(PathBuf::from(DEFAULT_SCRIPT)),
            working_dir: None,
            backend: DEFAULT_BACKEND.to_string(),
            optimizer: DEFAULT_OPTIMIZER.to_string(),
            tv_weight: 0.0,
        }
    }
}

impl RendererSettings {
    /// Parameters applied to every render step unless an artwork overrides them.
    pub fn default_parameters(&self) -> Params {
        let mut params = Params::new();
        params.insert("backend".into(), ParamValue::from(self.backend.as_str()));
        params.insert(
            "optimizer".into(),
            ParamValue::from(self.optimizer.as_str()),
        );
        params.insert("tv_weight".into(), ParamValue::Float(self.tv_weight));
        params
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlannerSettings {
    pub base_resolution: u32,
    pub base_iterations: u32,
    pub min_iterations: u32,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            base_resolution: 512,
            base_iterations: 1000,
            min_iterations: 1,
        }
    }
}

impl Settings {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: Settings = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.renderer.program.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "renderer.program must not be empty".into(),
            ));
        }

        if !self.renderer.tv_weight.is_finite() || self.renderer.tv_weight < 0.0 {
            return Err(ConfigError::Invalid(
                "renderer.tv_weight must be a non-negative number".into(),
            ));
        }

        let planner = &self.planner;
        if planner.base_resolution == 0 {
            return Err(ConfigError::Invalid(
                "planner.base_resolution must be greater than zero".into(),
            ));
        }
        if planner.base_iterations == 0 {
            return Err(ConfigError::Invalid(
                "planner.base_iterations must be greater than zero".into(),
            ));
        }
        if planner.min_iterations == 0 || planner.min_iterations > planner.base_iterations {
            return Err(ConfigError::Invalid(format!(
                "planner.min_iterations must be between 1 and {}",
                planner.base_iterations
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_use_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.renderer.program, "lua");
        assert_eq!(settings.planner.base_resolution, 512);
        assert_eq!(settings.planner.base_iterations, 1000);
        assert_eq!(settings.planner.min_iterations, 1);
    }

    #[test]
    fn parses_partial_overrides() {
        let settings = Settings::from_toml_str(
            r#"
[renderer]
program = "th"
working_dir = "/opt/neural-style"
backend = "nn"

[planner]
base_iterations = 800
"#,
        )
        .unwrap();

        assert_eq!(settings.renderer.program, "th");
        assert_eq!(
            settings.renderer.working_dir.as_deref(),
            Some(Path::new("/opt/neural-style"))
        );
        assert_eq!(settings.renderer.optimizer, "adam");
        assert_eq!(settings.planner.base_iterations, 800);
        assert_eq!(settings.planner.base_resolution, 512);

        let params = settings.renderer.default_parameters();
        assert_eq!(params.get("backend"), Some(&ParamValue::from("nn")));
        assert_eq!(params.get("tv_weight"), Some(&ParamValue::Float(0.0)));
    }

    #[test]
    fn rejects_zero_planner_values() {
        let err = Settings::from_toml_str("[planner]\nmin_iterations = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = Settings::from_toml_str("[planner]\nbase_resolution = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_settings_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_or_default(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }
}
