use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "STYLEJOB_CONFIG_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "stylejob";
const APPLICATION: &str = "stylejob";

const JOB_FILE: &str = "job.json";
const STYLES_DIR: &str = "styles";
const CONTENTS_DIR: &str = "contents";
const OUTPUT_DIR: &str = "output";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        if let Some(config_dir) = env_override(ENV_CONFIG_DIR) {
            return Ok(Self { config_dir });
        }

        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self {
            config_dir: project_dirs.config_dir().to_path_buf(),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.toml")
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

/// On-disk layout of one job: `job.json`, `styles/`, `contents/`, `output/`.
#[derive(Debug, Clone)]
pub struct JobLayout {
    root: PathBuf,
    name: String,
}

impl JobLayout {
    /// Resolves `directory` to an absolute path and checks the job file is present.
    pub fn open(directory: &Path) -> Result<Self> {
        if !directory.is_dir() {
            bail!("job directory does not exist: {}", directory.display());
        }
        let root = fs::canonicalize(directory)
            .with_context(|| format!("failed to resolve job directory {}", directory.display()))?;
        let layout = Self {
            name: root
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "job".to_string()),
            root,
        };
        if !layout.job_file().is_file() {
            bail!("{JOB_FILE} not found in {}", layout.root.display());
        }
        Ok(layout)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn job_file(&self) -> PathBuf {
        self.root.join(JOB_FILE)
    }

    pub fn styles_dir(&self) -> PathBuf {
        self.root.join(STYLES_DIR)
    }

    pub fn contents_dir(&self) -> PathBuf {
        self.root.join(CONTENTS_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    pub fn results_archive(&self) -> PathBuf {
        self.root.join(format!("{}-output.tar.gz", self.name))
    }
}
