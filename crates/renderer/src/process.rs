use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use jobconfig::RendererSettings;
use tracing::info;

use crate::{RenderBackend, RenderError, RenderInvocation};

/// Runs the neural style engine as a child process, one render at a time.
#[derive(Debug, Clone)]
pub struct NeuralStyleProcess {
    program: String,
    script: Option<PathBuf>,
    working_dir: Option<PathBuf>,
}

impl NeuralStyleProcess {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            script: None,
            working_dir: None,
        }
    }

    pub fn from_settings(settings: &RendererSettings) -> Self {
        Self {
            program: settings.program.clone(),
            script: settings.script.clone(),
            working_dir: settings.working_dir.clone(),
        }
    }

    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn command(&self, invocation: &RenderInvocation) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(script) = &self.script {
            cmd.arg(script);
        }
        cmd.args(invocation.arguments());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Shell-like rendering of the command line, for logs only.
    pub fn describe(&self, invocation: &RenderInvocation) -> String {
        let mut parts = vec![self.program.clone()];
        if let Some(script) = &self.script {
            parts.push(script.display().to_string());
        }
        parts.extend(
            invocation
                .arguments()
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl RenderBackend for NeuralStyleProcess {
    /// The engine writes to a staging file next to the output; the image is
    /// moved into place only after a successful exit, so an interrupted render
    /// never leaves a truncated image under the output name.
    fn render(&mut self, invocation: &RenderInvocation) -> Result<(), RenderError> {
        let output = &invocation.output_image;
        let partial = partial_path(output);
        discard(&partial)?;

        let staged = RenderInvocation {
            output_image: partial.clone(),
            ..invocation.clone()
        };
        info!(command = %self.describe(&staged), "invoking renderer");
        let status = self
            .command(&staged)
            .status()
            .map_err(|source| RenderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            discard(&partial)?;
            return Err(RenderError::Failed {
                program: self.program.clone(),
                status: status.code(),
            });
        }

        if !partial.exists() {
            return Err(RenderError::MissingOutput(output.clone()));
        }

        fs::rename(&partial, output).map_err(|source| RenderError::Io {
            path: output.clone(),
            source,
        })
    }
}

/// Staging name for `output`: `name.png` becomes `name.partial.png`.
pub fn partial_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = output
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    output.with_file_name(format!("{stem}.partial.{extension}"))
}

fn discard(path: &Path) -> Result<(), RenderError> {
    if !path.exists() {
        return Ok(());
    }
    fs::remove_file(path).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Logs each command it would run without executing anything.
#[derive(Debug, Clone)]
pub struct DryRun {
    process: NeuralStyleProcess,
    invocations: usize,
}

impl DryRun {
    pub fn new(process: NeuralStyleProcess) -> Self {
        Self {
            process,
            invocations: 0,
        }
    }

    pub fn invocations(&self) -> usize {
        self.invocations
    }
}

impl RenderBackend for DryRun {
    fn render(&mut self, invocation: &RenderInvocation) -> Result<(), RenderError> {
        self.invocations += 1;
        info!(command = %self.process.describe(invocation), "dry-run: renderer not invoked");
        Ok(())
    }
}
