use std::fs;
use std::path::PathBuf;

use planner::RenderPlan;
use tracing::{debug, info};

use crate::{RenderBackend, RenderError, RenderInvocation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanReport {
    pub rendered: usize,
    pub skipped: usize,
    pub output: PathBuf,
}

/// A render failure with enough context to resume the job by hand.
#[derive(Debug, thiserror::Error)]
#[error(
    "style '{style}' on content '{content}' failed at step {step} of {steps} ({resolution}px)"
)]
pub struct ExecuteError {
    pub style: String,
    pub content: String,
    pub step: usize,
    pub steps: usize,
    pub resolution: u32,
    #[source]
    pub source: RenderError,
}

/// Runs the steps of `plan` in order. Intermediates already on disk are
/// reused; the first failure stops the plan.
pub fn execute_plan(
    plan: &RenderPlan,
    backend: &mut dyn RenderBackend,
) -> Result<PlanReport, ExecuteError> {
    let total = plan.steps().len();
    let mut rendered = 0;
    let mut skipped = 0;

    for step in plan.steps() {
        let fail = |source: RenderError| ExecuteError {
            style: plan.style().to_string(),
            content: plan.content().to_string(),
            step: step.index + 1,
            steps: total,
            resolution: step.resolution,
            source,
        };

        if step.satisfied && !step.is_final() {
            debug!(
                style = %plan.style(),
                content = %plan.content(),
                resolution = step.resolution,
                path = %step.output_path.display(),
                "reusing existing intermediate"
            );
            skipped += 1;
            continue;
        }

        if let Some(parent) = step.output_path.parent() {
            fs::create_dir_all(parent).map_err(|source| {
                fail(RenderError::Io {
                    path: parent.to_path_buf(),
                    source,
                })
            })?;
        }

        info!(
            style = %plan.style(),
            content = %plan.content(),
            step = step.index + 1,
            steps = total,
            resolution = step.resolution,
            iterations = step.iterations,
            init = step.init.as_str(),
            "rendering step"
        );
        backend
            .render(&RenderInvocation::from_step(step))
            .map_err(fail)?;
        rendered += 1;
    }

    Ok(PlanReport {
        rendered,
        skipped,
        output: plan.final_step().output_path.clone(),
    })
}
