use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "stylejob",
    author,
    version,
    about = "Batch neural style transfer job runner"
)]
pub struct Cli {
    /// Settings file; defaults to `settings.toml` in the config directory.
    #[arg(long, global = true, value_name = "FILE", env = "STYLEJOB_SETTINGS")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process a job directory containing `job.json`, `styles/` and `contents/`.
    Run(RunArgs),
    /// Download a `.tar.gz` job archive, unpack it and process it.
    Fetch(FetchArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory containing the job information, contents and styles.
    #[arg(value_name = "DIRECTORY")]
    pub directory: PathBuf,

    #[command(flatten)]
    pub options: JobOptions,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Full URL to the job archive (must end in `.tar.gz`).
    #[arg(value_name = "JOB_URL")]
    pub job_url: String,

    /// Directory the archive is downloaded to and unpacked in.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub workdir: PathBuf,

    #[command(flatten)]
    pub options: JobOptions,
}

#[derive(Args, Debug, Clone, Default)]
pub struct JobOptions {
    /// Log the renderer commands without executing them.
    #[arg(long = "test")]
    pub dry_run: bool,

    /// Override the target size of every output image in the job.
    #[arg(long, value_name = "PIXELS", value_parser = parse_size)]
    pub size: Option<u32>,

    /// Allow writing into an existing output directory.
    #[arg(long)]
    pub overwrite: bool,

    /// Continue with the next style/content pair after a render failure.
    #[arg(long)]
    pub keep_going: bool,

    /// Package the output directory and PUT it to this URL when done.
    #[arg(long, value_name = "URL")]
    pub upload_url: Option<String>,

    /// Power off the machine once the job has finished.
    #[arg(long)]
    pub shutdown: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<u32, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("size must not be empty".to_string());
    }
    let size: u32 = trimmed
        .parse()
        .map_err(|_| format!("invalid size '{trimmed}'; expected a pixel count"))?;
    if size == 0 {
        return Err("size must be greater than zero".to_string());
    }
    Ok(size)
}
