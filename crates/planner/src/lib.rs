mod naming;

pub use naming::{
    final_output_path, intermediate_output_path, parameter_tag, StepIdentity, DIGEST_LEN, STEPS_DIR,
};

use std::path::{Path, PathBuf};

use jobconfig::{ParamValue, Params, PlannerSettings, Settings, IMAGE_SIZE, NUM_ITERATIONS};
use tracing::debug;

/// Parameter keys the planner sets itself on every step. Artwork values for
/// these keys never reach the renderer verbatim.
pub const PLANNER_KEYS: &[&str] = &[
    IMAGE_SIZE,
    NUM_ITERATIONS,
    "init",
    "init_image",
    "save_iter",
    "style_image",
    "content_image",
    "output_image",
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("target size {target} is below the base resolution {base}")]
    InvalidTarget { target: u32, base: u32 },
    #[error("parameter '{key}' must be a positive integer, found {value}")]
    InvalidParameter { key: String, value: String },
}

/// One (style, content) pair combined with its artwork parameters.
#[derive(Debug, Clone)]
pub struct RenderTask {
    pub style: String,
    pub content: String,
    pub style_path: PathBuf,
    pub content_path: PathBuf,
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitMode {
    Random,
    Image(PathBuf),
}

impl InitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Image(_) => "image",
        }
    }

    pub fn source(&self) -> Option<&Path> {
        match self {
            Self::Random => None,
            Self::Image(path) => Some(path.as_path()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Intermediate,
    Final,
}

#[derive(Debug, Clone)]
pub struct RenderStep {
    pub index: usize,
    pub kind: StepKind,
    pub resolution: u32,
    pub iterations: u32,
    pub init: InitMode,
    /// `Some(0)` disables the renderer's periodic checkpoint images.
    pub save_iter: Option<u32>,
    pub style_path: PathBuf,
    pub content_path: PathBuf,
    pub output_path: PathBuf,
    pub params: Params,
    /// The output of an intermediate step is already on disk.
    pub satisfied: bool,
}

impl RenderStep {
    pub fn is_final(&self) -> bool {
        self.kind == StepKind::Final
    }
}

/// Steps for one (style, content) pair. Only [`Planner`] builds plans, and
/// every plan ends with its final step.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    style: String,
    content: String,
    steps: Vec<RenderStep>,
}

impl RenderPlan {
    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn steps(&self) -> &[RenderStep] {
        &self.steps
    }

    pub fn final_step(&self) -> &RenderStep {
        &self.steps[self.steps.len() - 1]
    }

    pub fn intermediates(&self) -> impl Iterator<Item = &RenderStep> {
        self.steps.iter().filter(|step| !step.is_final())
    }

    pub fn pending(&self) -> usize {
        self.steps.iter().filter(|step| !step.satisfied).count()
    }
}

/// Expands render tasks into progressive-resolution plans.
#[derive(Debug, Clone)]
pub struct Planner {
    settings: PlannerSettings,
    defaults: Params,
}

impl Planner {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.planner,
            defaults: settings.renderer.default_parameters(),
        }
    }

    pub fn with_defaults(settings: PlannerSettings, defaults: Params) -> Self {
        Self { settings, defaults }
    }

    pub fn base_resolution(&self) -> u32 {
        self.settings.base_resolution
    }

    /// Target resolution of a task, falling back to the base resolution when
    /// the artwork does not name one.
    pub fn target_size(&self, task: &RenderTask) -> Result<u32, PlanError> {
        match task.params.get(IMAGE_SIZE) {
            Some(value) => positive(IMAGE_SIZE, value),
            None => Ok(self.settings.base_resolution),
        }
    }

    pub fn plan(&self, task: &RenderTask, output_dir: &Path) -> Result<RenderPlan, PlanError> {
        self.plan_with(task, output_dir, |path| path.exists())
    }

    /// Builds the plan, consulting `exists` for intermediate outputs left by
    /// an earlier run.
    pub fn plan_with<F>(
        &self,
        task: &RenderTask,
        output_dir: &Path,
        exists: F,
    ) -> Result<RenderPlan, PlanError>
    where
        F: Fn(&Path) -> bool,
    {
        let base = self.settings.base_resolution;
        let target = self.target_size(task)?;
        if target < base {
            return Err(PlanError::InvalidTarget { target, base });
        }

        let mut iterations = match task.params.get(NUM_ITERATIONS) {
            Some(value) => positive(NUM_ITERATIONS, value)?,
            None => self.settings.base_iterations,
        };
        let params = self.step_parameters(task);
        let tag = parameter_tag(&task.params);

        let mut steps = Vec::new();
        let mut resolution = base;
        let mut init = InitMode::Random;
        let mut previous: Option<String> = None;

        while target > resolution {
            let digest = StepIdentity {
                style: &task.style,
                content: &task.content,
                resolution,
                iterations,
                params: &params,
                init: previous.as_deref(),
            }
            .digest();
            let output_path = intermediate_output_path(
                output_dir,
                &task.style,
                &task.content,
                &tag,
                resolution,
                &digest,
            );
            let satisfied = exists(&output_path);
            if satisfied {
                debug!(
                    style = %task.style,
                    content = %task.content,
                    resolution,
                    path = %output_path.display(),
                    "intermediate output already present"
                );
            }

            steps.push(RenderStep {
                index: steps.len(),
                kind: StepKind::Intermediate,
                resolution,
                iterations,
                init: init.clone(),
                save_iter: Some(0),
                style_path: task.style_path.clone(),
                content_path: task.content_path.clone(),
                output_path: output_path.clone(),
                params: params.clone(),
                satisfied,
            });

            resolution = resolution.saturating_mul(2);
            iterations = (iterations / 2).max(self.settings.min_iterations);
            init = InitMode::Image(output_path);
            previous = Some(digest);
        }

        let digest = StepIdentity {
            style: &task.style,
            content: &task.content,
            resolution: target,
            iterations,
            params: &params,
            init: previous.as_deref(),
        }
        .digest();
        let output_path =
            final_output_path(output_dir, &task.style, &task.content, &tag, &digest);
        steps.push(RenderStep {
            index: steps.len(),
            kind: StepKind::Final,
            resolution: target,
            iterations,
            init,
            save_iter: None,
            style_path: task.style_path.clone(),
            content_path: task.content_path.clone(),
            output_path,
            params,
            satisfied: false,
        });

        Ok(RenderPlan {
            style: task.style.clone(),
            content: task.content.clone(),
            steps,
        })
    }

    fn step_parameters(&self, task: &RenderTask) -> Params {
        let mut params = self.defaults.clone();
        for (key, value) in &task.params {
            if PLANNER_KEYS.contains(&key.as_str()) {
                continue;
            }
            params.insert(key.clone(), value.clone());
        }
        params
    }
}

fn positive(key: &str, value: &ParamValue) -> Result<u32, PlanError> {
    value
        .as_positive_u32()
        .ok_or_else(|| PlanError::InvalidParameter {
            key: key.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn task(params: &[(&str, ParamValue)]) -> RenderTask {
        RenderTask {
            style: "starry_night".into(),
            content: "tubingen".into(),
            style_path: PathBuf::from("/job/styles/starry_night.jpg"),
            content_path: PathBuf::from("/job/contents/tubingen.jpg"),
            params: params
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect(),
        }
    }

    fn planner() -> Planner {
        Planner::new(&Settings::default())
    }

    fn plan(task: &RenderTask) -> RenderPlan {
        planner()
            .plan_with(task, Path::new("/job/output"), |_| false)
            .unwrap()
    }

    #[test]
    fn base_target_yields_single_step() {
        let plan = plan(&task(&[(IMAGE_SIZE, ParamValue::Integer(512))]));
        assert_eq!(plan.steps.len(), 1);

        let step = plan.final_step();
        assert!(step.is_final());
        assert_eq!(step.resolution, 512);
        assert_eq!(step.iterations, 1000);
        assert_eq!(step.init, InitMode::Random);
        assert_eq!(step.save_iter, None);
    }

    #[test]
    fn missing_image_size_targets_base_resolution() {
        let plan = plan(&task(&[]));
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.final_step().resolution, 512);
    }

    #[test]
    fn doubles_resolution_and_halves_iterations() {
        let plan = plan(&task(&[(IMAGE_SIZE, ParamValue::Integer(2048))]));
        let summary: Vec<_> = plan
            .steps
            .iter()
            .map(|step| (step.kind, step.resolution, step.iterations))
            .collect();
        assert_eq!(
            summary,
            vec![
                (StepKind::Intermediate, 512, 1000),
                (StepKind::Intermediate, 1024, 500),
                (StepKind::Final, 2048, 250),
            ]
        );

        for pair in plan.steps.windows(2) {
            assert_eq!(pair[1].resolution, pair[0].resolution * 2);
        }
        for step in plan.intermediates() {
            assert_eq!(step.save_iter, Some(0));
        }
    }

    #[test]
    fn chains_outputs_into_next_init() {
        let plan = plan(&task(&[(IMAGE_SIZE, ParamValue::Integer(4096))]));
        assert_eq!(plan.steps[0].init, InitMode::Random);
        for pair in plan.steps.windows(2) {
            assert_eq!(pair[1].init.source(), Some(pair[0].output_path.as_path()));
            assert_eq!(pair[1].init.as_str(), "image");
        }
    }

    #[test]
    fn non_power_of_two_target_ends_exactly_on_target() {
        let plan = plan(&task(&[(IMAGE_SIZE, ParamValue::Integer(1500))]));
        let resolutions: Vec<_> = plan.steps.iter().map(|step| step.resolution).collect();
        assert_eq!(resolutions, vec![512, 1024, 1500]);
        assert_eq!(plan.final_step().iterations, 250);
    }

    #[test]
    fn output_paths_are_unique() {
        let plan = plan(&task(&[
            (IMAGE_SIZE, ParamValue::Integer(8192)),
            ("style_weight", ParamValue::Float(100.0)),
        ]));
        let paths: HashSet<_> = plan.steps.iter().map(|step| &step.output_path).collect();
        assert_eq!(paths.len(), plan.steps.len());

        let final_path = &plan.final_step().output_path;
        assert!(plan
            .intermediates()
            .all(|step| &step.output_path != final_path));
    }

    #[test]
    fn iterations_floor_at_minimum() {
        let planner = Planner::with_defaults(
            PlannerSettings {
                base_resolution: 1,
                base_iterations: 8,
                min_iterations: 1,
            },
            Params::new(),
        );
        let plan = planner
            .plan_with(
                &task(&[(IMAGE_SIZE, ParamValue::Integer(1 << 12))]),
                Path::new("/out"),
                |_| false,
            )
            .unwrap();

        assert_eq!(plan.steps.len(), 13);
        assert!(plan.steps.iter().all(|step| step.iterations >= 1));
        assert_eq!(plan.final_step().iterations, 1);
        for pair in plan.steps.windows(2) {
            assert!(pair[1].iterations <= pair[0].iterations);
        }
    }

    #[test]
    fn artwork_iterations_replace_base_count() {
        let plan = plan(&task(&[
            (IMAGE_SIZE, ParamValue::Integer(1024)),
            (NUM_ITERATIONS, ParamValue::Integer(600)),
        ]));
        let iterations: Vec<_> = plan.steps.iter().map(|step| step.iterations).collect();
        assert_eq!(iterations, vec![600, 300]);
    }

    #[test]
    fn marks_existing_intermediates_satisfied() {
        let task = task(&[(IMAGE_SIZE, ParamValue::Integer(2048))]);
        let existing = plan(&task).steps()[0].output_path.clone();
        assert!(existing.starts_with("/job/output/steps"));

        let plan = planner()
            .plan_with(&task, Path::new("/job/output"), |path| {
                path == existing.as_path()
            })
            .unwrap();

        assert!(plan.steps[0].satisfied);
        assert!(!plan.steps[1].satisfied);
        assert_eq!(plan.steps[1].init.source(), Some(existing.as_path()));
        assert_eq!(plan.pending(), 2);
    }

    #[test]
    fn intermediates_are_shared_across_targets() {
        let small = plan(&task(&[(IMAGE_SIZE, ParamValue::Integer(1024))]));
        let large = plan(&task(&[(IMAGE_SIZE, ParamValue::Integer(2048))]));
        assert_eq!(small.steps()[0].output_path, large.steps()[0].output_path);
        assert_ne!(
            small.final_step().output_path,
            large.final_step().output_path
        );
    }

    #[test]
    fn lossy_tags_still_yield_distinct_paths() {
        let slash = plan(&task(&[
            (IMAGE_SIZE, ParamValue::Integer(1024)),
            ("model_file", ParamValue::from("models/vgg.t7")),
        ]));
        let dash = plan(&task(&[
            (IMAGE_SIZE, ParamValue::Integer(1024)),
            ("model_file", ParamValue::from("models-vgg.t7")),
        ]));
        for (a, b) in slash.steps().iter().zip(dash.steps()) {
            assert_ne!(a.output_path, b.output_path);
        }
    }

    #[test]
    fn renderer_settings_change_step_paths() {
        let task = task(&[(IMAGE_SIZE, ParamValue::Integer(1024))]);
        let default = plan(&task);

        let mut settings = Settings::default();
        settings.renderer.backend = "nn".into();
        settings.renderer.optimizer = "lbfgs".into();
        let tuned = Planner::new(&settings)
            .plan_with(&task, Path::new("/job/output"), |_| false)
            .unwrap();

        settings = Settings::default();
        settings.planner.base_iterations = 200;
        let shorter = Planner::new(&settings)
            .plan_with(&task, Path::new("/job/output"), |_| false)
            .unwrap();

        for other in [&tuned, &shorter] {
            assert_ne!(default.steps()[0].output_path, other.steps()[0].output_path);
            assert_ne!(
                default.final_step().output_path,
                other.final_step().output_path
            );
        }
    }

    #[test]
    fn artwork_iterations_change_every_path() {
        let base = plan(&task(&[(IMAGE_SIZE, ParamValue::Integer(1024))]));
        let longer = plan(&task(&[
            (IMAGE_SIZE, ParamValue::Integer(1024)),
            (NUM_ITERATIONS, ParamValue::Integer(1200)),
        ]));
        assert_ne!(base.steps()[0].output_path, longer.steps()[0].output_path);
        assert_ne!(
            base.final_step().output_path,
            longer.final_step().output_path
        );
    }

    #[test]
    fn final_step_is_never_satisfied() {
        let plan = planner()
            .plan_with(
                &task(&[(IMAGE_SIZE, ParamValue::Integer(1024))]),
                Path::new("/job/output"),
                |_| true,
            )
            .unwrap();
        assert!(plan.steps[0].satisfied);
        assert!(!plan.final_step().satisfied);
    }

    #[test]
    fn merges_defaults_and_drops_planner_keys() {
        let plan = plan(&task(&[
            (IMAGE_SIZE, ParamValue::Integer(512)),
            ("optimizer", ParamValue::from("lbfgs")),
            ("init", ParamValue::from("image")),
            ("content_weight", ParamValue::Integer(5)),
        ]));
        let params = &plan.final_step().params;
        assert_eq!(params.get("optimizer"), Some(&ParamValue::from("lbfgs")));
        assert_eq!(params.get("backend"), Some(&ParamValue::from("cudnn")));
        assert_eq!(params.get("tv_weight"), Some(&ParamValue::Float(0.0)));
        assert_eq!(params.get("content_weight"), Some(&ParamValue::Integer(5)));
        assert!(params.get("init").is_none());
        assert!(params.get(IMAGE_SIZE).is_none());
    }

    #[test]
    fn rejects_target_below_base() {
        let err = planner()
            .plan_with(
                &task(&[(IMAGE_SIZE, ParamValue::Integer(256))]),
                Path::new("/out"),
                |_| false,
            )
            .unwrap_err();
        assert_eq!(
            err,
            PlanError::InvalidTarget {
                target: 256,
                base: 512
            }
        );
    }

    #[test]
    fn rejects_non_integer_image_size() {
        let err = planner()
            .plan_with(
                &task(&[(IMAGE_SIZE, ParamValue::from("big"))]),
                Path::new("/out"),
                |_| false,
            )
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidParameter { ref key, .. } if key == IMAGE_SIZE));
    }
}
