use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use jobarchive::{package_dir, JobClient};
use jobconfig::{JobSpec, Settings};
use planner::{Planner, RenderTask};
use renderer::{execute_plan, DryRun, ExecuteError, NeuralStyleProcess, RenderBackend};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{JobOptions, RunArgs};
use crate::paths::{AppPaths, JobLayout};
use crate::resolve::resolve_selection;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Loads settings from `explicit` when given, otherwise from the config
/// directory (falling back to built-in defaults when that file is absent).
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let path = match explicit {
        Some(path) => {
            if !path.is_file() {
                bail!("settings file not found: {}", path.display());
            }
            path.to_path_buf()
        }
        None => AppPaths::discover()?.settings_file(),
    };
    let settings = Settings::load_or_default(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    tracing::debug!(path = %path.display(), ?settings, "resolved settings");
    Ok(settings)
}

pub fn run(args: RunArgs, settings: &Settings) -> Result<()> {
    run_job(&args.directory, &args.options, settings)
}

#[derive(Debug, Default)]
pub struct JobSummary {
    pub pairs: usize,
    pub rendered: usize,
    pub skipped: usize,
    pub failures: Vec<ExecuteError>,
}

pub fn run_job(directory: &Path, options: &JobOptions, settings: &Settings) -> Result<()> {
    let layout = JobLayout::open(directory)?;
    let mut job = JobSpec::load(&layout.job_file())
        .with_context(|| format!("failed to read {}", layout.job_file().display()))?;
    info!(
        job = layout.name(),
        dir = %layout.root().display(),
        "read configuration:\n{}",
        job.to_pretty_json()?
    );

    prepare_output_dir(&layout.output_dir(), options.overwrite)?;

    if let Some(size) = options.size {
        for artwork in &mut job.artworks {
            info!(size, "overriding image_size");
            artwork.set_image_size(size);
        }
    }

    let planner = Planner::new(settings);
    let process = NeuralStyleProcess::from_settings(&settings.renderer);
    let summary = if options.dry_run {
        let mut backend = DryRun::new(process);
        process_job(&layout, &job, &planner, &mut backend, options.keep_going)?
    } else {
        let mut backend = process;
        process_job(&layout, &job, &planner, &mut backend, options.keep_going)?
    };

    info!(
        job = layout.name(),
        pairs = summary.pairs,
        rendered = summary.rendered,
        skipped = summary.skipped,
        failed = summary.failures.len(),
        "job finished"
    );

    if let Some(url) = options.upload_url.as_deref() {
        upload_results(&layout, url, options.dry_run)?;
    }

    if options.shutdown {
        shutdown(options.dry_run)?;
    }

    if !summary.failures.is_empty() {
        for failure in &summary.failures {
            error!(error = %failure, "pair not completed");
        }
        bail!(
            "{} of {} style/content pairs failed; rerun the job to resume",
            summary.failures.len(),
            summary.pairs
        );
    }

    Ok(())
}

fn prepare_output_dir(output_dir: &Path, overwrite: bool) -> Result<()> {
    if output_dir.exists() {
        if !overwrite {
            bail!(
                "output directory exists (and no --overwrite): {}",
                output_dir.display()
            );
        }
        info!(path = %output_dir.display(), "output directory exists");
        return Ok(());
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    info!(path = %output_dir.display(), "created output directory");
    Ok(())
}

/// Renders every (content, style) pair of the job, contents outermost.
pub fn process_job(
    layout: &JobLayout,
    job: &JobSpec,
    planner: &Planner,
    backend: &mut dyn RenderBackend,
    keep_going: bool,
) -> Result<JobSummary> {
    let output_dir = layout.output_dir();
    let mut summary = JobSummary::default();

    for (index, artwork) in job.artworks.iter().enumerate() {
        let contents = resolve_selection(&artwork.contents, &layout.contents_dir())
            .with_context(|| format!("artwork {index}: failed to resolve contents"))?;
        let styles = resolve_selection(&artwork.styles, &layout.styles_dir())
            .with_context(|| format!("artwork {index}: failed to resolve styles"))?;

        for content in &contents {
            for style in &styles {
                info!(
                    style = %style.id,
                    content = %content.id,
                    artwork = index,
                    "transferring style"
                );
                summary.pairs += 1;

                let task = RenderTask {
                    style: style.id.clone(),
                    content: content.id.clone(),
                    style_path: style.path.clone(),
                    content_path: content.path.clone(),
                    params: artwork.args.clone(),
                };
                let plan = planner.plan(&task, &output_dir).with_context(|| {
                    format!(
                        "failed to plan style '{}' on content '{}'",
                        style.id, content.id
                    )
                })?;

                match execute_plan(&plan, backend) {
                    Ok(report) => {
                        summary.rendered += report.rendered;
                        summary.skipped += report.skipped;
                        info!(
                            output = %report.output.display(),
                            rendered = report.rendered,
                            skipped = report.skipped,
                            "pair complete"
                        );
                    }
                    Err(err) if keep_going => {
                        warn!(error = %err, "render failed; continuing with the next pair");
                        summary.failures.push(err);
                    }
                    Err(err) => {
                        return Err(err).context(
                            "render failed; rerun the job to resume from completed steps",
                        );
                    }
                }
            }
        }
    }

    Ok(summary)
}

fn upload_results(layout: &JobLayout, url: &str, dry_run: bool) -> Result<()> {
    let archive = layout.results_archive();
    if dry_run {
        info!(archive = %archive.display(), url, "dry-run: results not packaged or uploaded");
        return Ok(());
    }

    package_dir(&layout.output_dir(), &archive).context("failed to package results")?;
    let client = JobClient::new()?;
    client
        .upload(&archive, url)
        .context("failed to upload results")?;
    info!(archive = %archive.display(), url, "results uploaded");
    Ok(())
}

fn shutdown(dry_run: bool) -> Result<()> {
    if dry_run {
        info!("dry-run: skipping shutdown");
        return Ok(());
    }

    info!("shutting down");
    let status = Command::new("shutdown")
        .args(["-h", "now"])
        .status()
        .context("failed to invoke shutdown")?;
    if !status.success() {
        bail!("shutdown exited with {status}");
    }
    Ok(())
}
