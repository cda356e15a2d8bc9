mod pack;
mod remote;

pub use pack::{extract, package_dir};
pub use remote::JobClient;

use std::path::{Path, PathBuf};

use reqwest::Url;
use thiserror::Error;

/// Suffix every job archive URL must carry.
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid job url '{0}' (must end in {})", ARCHIVE_SUFFIX)]
    InvalidUrl(String),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("archive i/o failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive did not contain the job directory {}", .0.display())]
    MissingJobDir(PathBuf),
}

impl ArchiveError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A job archive location, `https://host/path/<job>.tar.gz`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUrl {
    url: Url,
    name: String,
}

impl JobUrl {
    pub fn parse(input: &str) -> Result<Self, ArchiveError> {
        let trimmed = input.trim();
        let url = Url::parse(trimmed).map_err(|_| ArchiveError::InvalidUrl(trimmed.into()))?;
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|file| file.strip_suffix(ARCHIVE_SUFFIX))
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ArchiveError::InvalidUrl(trimmed.into()))?
            .to_string();
        Ok(Self { url, name })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Job name, the archive file name without its suffix.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn archive_file_name(&self) -> String {
        format!("{}{ARCHIVE_SUFFIX}", self.name)
    }

    /// Directory the archive unpacks its job into below `root`.
    pub fn job_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_job_name_from_url() {
        let job = JobUrl::parse("https://jobs.example.com/queue/portraits-01.tar.gz").unwrap();
        assert_eq!(job.name(), "portraits-01");
        assert_eq!(job.archive_file_name(), "portraits-01.tar.gz");
        assert_eq!(
            job.job_dir(Path::new("/work")),
            PathBuf::from("/work/portraits-01")
        );
    }

    #[test]
    fn rejects_urls_without_archive_suffix() {
        for input in [
            "https://jobs.example.com/queue/portraits.zip",
            "https://jobs.example.com/queue/",
            "https://jobs.example.com/.tar.gz",
            "not a url.tar.gz",
        ] {
            assert!(
                matches!(JobUrl::parse(input), Err(ArchiveError::InvalidUrl(_))),
                "{input} should be rejected"
            );
        }
    }
}
