use std::fs;

use anyhow::{bail, Context, Result};
use jobarchive::{extract, ArchiveError, JobClient, JobUrl};
use jobconfig::Settings;
use tracing::info;

use crate::cli::FetchArgs;
use crate::run::run_job;

/// Downloads and unpacks a job archive into the work directory, then runs it.
pub fn run_fetch(args: FetchArgs, settings: &Settings) -> Result<()> {
    let job = JobUrl::parse(&args.job_url)?;
    let job_dir = job.job_dir(&args.workdir);

    if args.options.dry_run {
        info!(url = %job.url(), dir = %job_dir.display(), "dry-run: skipping download");
        if !job_dir.is_dir() {
            bail!(
                "dry-run needs an already unpacked job at {}",
                job_dir.display()
            );
        }
        return run_job(&job_dir, &args.options, settings);
    }

    fs::create_dir_all(&args.workdir)
        .with_context(|| format!("failed to create {}", args.workdir.display()))?;

    let client = JobClient::new()?;
    let archive = client.download(&job, &args.workdir)?;
    extract(&archive, &args.workdir)
        .with_context(|| format!("failed to unpack {}", archive.display()))?;
    if !job_dir.is_dir() {
        return Err(ArchiveError::MissingJobDir(job_dir).into());
    }
    info!(job = job.name(), dir = %job_dir.display(), "job unpacked");

    run_job(&job_dir, &args.options, settings)
}
