//! Renderer crate for stylejob.
//!
//! Turns planned render steps into invocations of the external neural style
//! engine and runs them one after another. The overall flow is:
//!
//! ```text
//!   planner::RenderPlan
//!          │ RenderStep
//!          ▼
//!   execute_plan ──▶ RenderInvocation::from_step ──▶ RenderBackend::render
//!          │                                               │
//!          └── satisfied intermediates skipped             ├─▶ NeuralStyleProcess (child process)
//!                                                          └─▶ DryRun (log only)
//! ```
//!
//! `RenderInvocation` is the structured descriptor crossing the process
//! boundary; only `NeuralStyleProcess` knows the engine's flag syntax.

mod execute;
mod invocation;
mod process;

pub use execute::{execute_plan, ExecuteError, PlanReport};
pub use invocation::RenderInvocation;
pub use process::{partial_path, DryRun, NeuralStyleProcess};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to launch renderer '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("renderer '{program}' exited with {}", describe_status(.status))]
    Failed { program: String, status: Option<i32> },
    #[error("renderer reported success but wrote no image to {}", .0.display())]
    MissingOutput(PathBuf),
    #[error("i/o on {} failed: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// Process boundary to the rendering engine. Implementations block until the
/// image for `invocation` is written or the render fails.
pub trait RenderBackend {
    fn render(&mut self, invocation: &RenderInvocation) -> Result<(), RenderError>;
}
