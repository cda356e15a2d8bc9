use std::ffi::OsString;
use std::path::PathBuf;

use jobconfig::Params;
use planner::{InitMode, RenderStep};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderInvocation {
    pub style_image: PathBuf,
    pub content_image: PathBuf,
    pub output_image: PathBuf,
    pub image_size: u32,
    pub num_iterations: u32,
    pub init: InitMode,
    pub save_iter: Option<u32>,
    pub params: Params,
}

impl RenderInvocation {
    pub fn from_step(step: &RenderStep) -> Self {
        Self {
            style_image: step.style_path.clone(),
            content_image: step.content_path.clone(),
            output_image: step.output_path.clone(),
            image_size: step.resolution,
            num_iterations: step.iterations,
            init: step.init.clone(),
            save_iter: step.save_iter,
            params: step.params.clone(),
        }
    }

    /// Engine flags in the order the engine documents them, followed by the
    /// remaining parameters sorted by name.
    pub fn arguments(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        let mut flag = |name: &str, value: OsString| {
            args.push(format!("-{name}").into());
            args.push(value);
        };

        flag("style_image", self.style_image.clone().into_os_string());
        flag("content_image", self.content_image.clone().into_os_string());
        flag("output_image", self.output_image.clone().into_os_string());
        flag("image_size", self.image_size.to_string().into());
        flag("num_iterations", self.num_iterations.to_string().into());
        flag("init", self.init.as_str().into());
        if let Some(source) = self.init.source() {
            flag("init_image", source.as_os_str().to_os_string());
        }
        if let Some(save_iter) = self.save_iter {
            flag("save_iter", save_iter.to_string().into());
        }
        for (key, value) in &self.params {
            flag(key.as_str(), value.to_string().into());
        }

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobconfig::ParamValue;
    use std::path::Path;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    fn invocation() -> RenderInvocation {
        let mut params = Params::new();
        params.insert("backend".into(), ParamValue::from("cudnn"));
        params.insert("tv_weight".into(), ParamValue::Float(0.0));
        RenderInvocation {
            style_image: PathBuf::from("/job/styles/scream.jpg"),
            content_image: PathBuf::from("/job/contents/tubingen.jpg"),
            output_image: PathBuf::from("/job/output/steps/scream+tubingen@1024.png"),
            image_size: 1024,
            num_iterations: 500,
            init: InitMode::Image(PathBuf::from("/job/output/steps/scream+tubingen@512.png")),
            save_iter: Some(0),
            params,
        }
    }

    #[test]
    fn image_init_emits_source_and_checkpoint_flags() {
        let args = strings(&invocation().arguments());
        assert_eq!(
            args,
            vec![
                "-style_image",
                "/job/styles/scream.jpg",
                "-content_image",
                "/job/contents/tubingen.jpg",
                "-output_image",
                "/job/output/steps/scream+tubingen@1024.png",
                "-image_size",
                "1024",
                "-num_iterations",
                "500",
                "-init",
                "image",
                "-init_image",
                "/job/output/steps/scream+tubingen@512.png",
                "-save_iter",
                "0",
                "-backend",
                "cudnn",
                "-tv_weight",
                "0",
            ]
        );
    }

    #[test]
    fn random_init_omits_init_image() {
        let mut invocation = invocation();
        invocation.init = InitMode::Random;
        invocation.save_iter = None;
        let args = strings(&invocation.arguments());
        assert!(args
            .windows(2)
            .any(|pair| pair[0] == "-init" && pair[1] == "random"));
        assert!(!args.iter().any(|arg| arg == "-init_image"));
        assert!(!args.iter().any(|arg| arg == "-save_iter"));
        assert_eq!(invocation.init.source(), None::<&Path>);
    }
}
