//! Output naming for render steps. Names are derived only from what reaches
//! the renderer, so a rerun finds the files an earlier run left behind and
//! never picks up a file rendered from different inputs.
//!
//! - final outputs: `<output>/<style>+<content>[+<tag>].<digest>.png`
//! - intermediate outputs: `<output>/steps/<style>+<content>[+<tag>]@<resolution>.<digest>.png`
//!
//! The tag is a readable, lossy summary of the artwork parameters. The digest
//! identifies the step exactly.
use std::path::{Path, PathBuf};

use jobconfig::{Params, IMAGE_SIZE};
use sha2::{Digest, Sha256};

/// Subdirectory of the output directory holding intermediate renders.
pub const STEPS_DIR: &str = "steps";

/// Hex characters of the step digest kept in file names.
pub const DIGEST_LEN: usize = 16;

/// Everything that determines the pixels a render step produces.
#[derive(Debug, Clone, Copy)]
pub struct StepIdentity<'a> {
    pub style: &'a str,
    pub content: &'a str,
    pub resolution: u32,
    pub iterations: u32,
    /// Parameters passed to the renderer, defaults included.
    pub params: &'a Params,
    /// Digest of the step whose output seeds this one.
    pub init: Option<&'a str>,
}

impl StepIdentity<'_> {
    /// Truncated SHA-256 over a length-prefixed encoding of every field.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        field(&mut hasher, self.style.as_bytes());
        field(&mut hasher, self.content.as_bytes());
        field(&mut hasher, &self.resolution.to_le_bytes());
        field(&mut hasher, &self.iterations.to_le_bytes());
        field(&mut hasher, &(self.params.len() as u64).to_le_bytes());
        for (key, value) in self.params {
            field(&mut hasher, key.as_bytes());
            field(&mut hasher, value.to_string().as_bytes());
        }
        field(&mut hasher, self.init.unwrap_or_default().as_bytes());

        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(DIGEST_LEN);
        digest
    }
}

fn field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Encodes the artwork parameters (minus the target size) as a file name
/// fragment. Empty when the artwork has no parameters besides the size.
pub fn parameter_tag(params: &Params) -> String {
    params
        .iter()
        .filter(|(key, _)| key.as_str() != IMAGE_SIZE)
        .map(|(key, value)| format!("{}-{}", sanitize(key), sanitize(&value.to_string())))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn final_output_path(
    output_dir: &Path,
    style: &str,
    content: &str,
    tag: &str,
    digest: &str,
) -> PathBuf {
    output_dir.join(format!("{}.{digest}.png", stem(style, content, tag)))
}

pub fn intermediate_output_path(
    output_dir: &Path,
    style: &str,
    content: &str,
    tag: &str,
    resolution: u32,
    digest: &str,
) -> PathBuf {
    output_dir.join(STEPS_DIR).join(format!(
        "{}@{resolution}.{digest}.png",
        stem(style, content, tag)
    ))
}

fn stem(style: &str, content: &str, tag: &str) -> String {
    if tag.is_empty() {
        format!("{style}+{content}")
    } else {
        format!("{style}+{content}+{tag}")
    }
}

fn sanitize(input: &str) -> String {
    input
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '-'
            }
        })
        .collect()
}
