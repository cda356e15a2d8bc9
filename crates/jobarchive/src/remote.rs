use std::fs::{self, File};
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};

use crate::{ArchiveError, JobUrl};

/// Blocking HTTP client for job archives.
#[derive(Debug, Clone)]
pub struct JobClient {
    http: Client,
}

impl JobClient {
    pub fn new() -> Result<Self, ArchiveError> {
        let http = Client::builder()
            .build()
            .map_err(|source| ArchiveError::Http {
                url: "<client>".into(),
                source,
            })?;
        Ok(Self { http })
    }

    /// Downloads the archive into `dir`, replacing any stale copy, and
    /// returns its path.
    pub fn download(&self, job: &JobUrl, dir: &Path) -> Result<PathBuf, ArchiveError> {
        let url = job.url().clone();
        let http_err = |source| ArchiveError::Http {
            url: url.to_string(),
            source,
        };

        info!(%url, "downloading job archive");
        let mut response = self
            .http
            .get(url.clone())
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(http_err)?;

        fs::create_dir_all(dir).map_err(ArchiveError::io(dir))?;
        let destination = dir.join(job.archive_file_name());
        let mut file = File::create(&destination).map_err(ArchiveError::io(&destination))?;
        let bytes = response.copy_to(&mut file).map_err(http_err)?;
        debug!(path = %destination.display(), bytes, "job archive saved");
        Ok(destination)
    }

    /// Uploads `archive` with an HTTP PUT to `url`.
    pub fn upload(&self, archive: &Path, url: &str) -> Result<(), ArchiveError> {
        let http_err = |source| ArchiveError::Http {
            url: url.to_string(),
            source,
        };
        let file = File::open(archive).map_err(ArchiveError::io(archive))?;

        info!(url, archive = %archive.display(), "uploading results");
        self.http
            .put(url)
            .header(CONTENT_TYPE, "application/gzip")
            .body(file)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(http_err)?;
        Ok(())
    }
}
