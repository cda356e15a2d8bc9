mod settings;

pub use settings::{PlannerSettings, RendererSettings, Settings};

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Selection sentinel that expands to every image in the source directory.
pub const WILDCARD: &str = "*";

/// Parameter key carrying the target resolution of an artwork.
pub const IMAGE_SIZE: &str = "image_size";

/// Parameter key carrying the iteration count of the first render step.
pub const NUM_ITERATIONS: &str = "num_iterations";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse job description: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to parse settings: {0}")]
    ParseSettings(#[from] toml::de::Error),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A scalar renderer parameter as written in `job.json`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_positive_u32(&self) -> Option<u32> {
        match self {
            Self::Integer(value) if *value > 0 => u32::try_from(*value).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Renderer parameters keyed by flag name. Ordered so names derived from it
/// are stable.
pub type Params = BTreeMap<String, ParamValue>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Named(Vec<String>),
}

impl Selection {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Str(String),
            List(Vec<String>),
        }

        match Helper::deserialize(deserializer)? {
            Helper::Str(raw) if raw.trim() == WILDCARD => Ok(Selection::All),
            Helper::Str(raw) => Err(de::Error::custom(format!(
                "expected a list of identifiers or the wildcard \"{WILDCARD}\", found string '{raw}'"
            ))),
            Helper::List(names) => Ok(Selection::Named(names)),
        }
    }
}

impl Serialize for Selection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::All => serializer.serialize_str(WILDCARD),
            Self::Named(names) => names.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Artwork {
    pub contents: Selection,
    pub styles: Selection,
    #[serde(default)]
    pub args: Params,
}

impl Artwork {
    pub fn image_size(&self) -> Option<u32> {
        self.args.get(IMAGE_SIZE).and_then(ParamValue::as_positive_u32)
    }

    pub fn set_image_size(&mut self, size: u32) {
        self.args
            .insert(IMAGE_SIZE.to_string(), ParamValue::Integer(i64::from(size)));
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobSpec {
    pub artworks: Vec<Artwork>,
}

impl JobSpec {
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let raw: JobSpec = serde_json::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn to_pretty_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.artworks.is_empty() {
            return Err(ConfigError::Invalid(
                "job must define at least one artwork".into(),
            ));
        }

        for (index, artwork) in self.artworks.iter().enumerate() {
            validate_selection(index, "contents", &artwork.contents)?;
            validate_selection(index, "styles", &artwork.styles)?;

            for key in [IMAGE_SIZE, NUM_ITERATIONS] {
                if let Some(value) = artwork.args.get(key) {
                    if value.as_positive_u32().is_none() {
                        return Err(ConfigError::Invalid(format!(
                            "artwork {index} {key} must be a positive integer, found {value}"
                        )));
                    }
                }
            }

            if artwork.args.keys().any(|key| key.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "artwork {index} contains an argument with an empty name"
                )));
            }
        }

        Ok(())
    }
}

fn validate_selection(index: usize, field: &str, selection: &Selection) -> Result<(), ConfigError> {
    let Selection::Named(names) = selection else {
        return Ok(());
    };

    if names.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "artwork {index} {field} must not be empty"
        )));
    }

    for name in names {
        if name.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "artwork {index} {field} contains an empty identifier"
            )));
        }
        if name.contains(['/', '\\']) || name == ".." {
            return Err(ConfigError::Invalid(format!(
                "artwork {index} {field} identifier '{name}' must be a plain file name"
            )));
        }
    }

    Ok(())
}
