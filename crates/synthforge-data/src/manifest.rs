use crate::error::{PipelineError, PipelineResult};
use crate::render::{RenderFailure, RenderReport};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One generated variation and the files derived from it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariationEntry {
    pub variation_id: u32,
    pub randomization_seed: Option<u64>,
    pub document: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RejectedEntry {
    pub variation_id: u32,
    pub randomization_seed: u64,
    pub reason: String,
}

/// Run index - every file a run produced. Paths are relative to the output directory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub version: u32,
    pub video: Option<PathBuf>,
    pub analysis: Option<PathBuf>,
    pub base_script: Option<PathBuf>,
    pub seed: Option<u64>,
    pub variations: Vec<VariationEntry>,
    pub rejected: Vec<RejectedEntry>,
    pub render_failures: Vec<RenderFailure>,
}

impl RunManifest {
    pub fn new(video: Option<PathBuf>, seed: Option<u64>) -> Self {
        Self { version: 1, video, seed, ..Self::default() }
    }

    pub fn add_variation(&mut self, entry: VariationEntry) {
        self.variations.push(entry);
    }

    /// Attach rendered outputs to their variations and keep the failures
    pub fn record_renders(&mut self, report: &RenderReport, out_dir: &Path) {
        for rendered in &report.rendered {
            let rendered = relative_to(out_dir, rendered);
            let stem = rendered.file_stem();
            if let Some(entry) = self
                .variations
                .iter_mut()
                .find(|v| v.document.file_stem() == stem)
            {
                entry.render = Some(rendered.clone());
            }
        }
        self.render_failures.extend(report.failures.iter().map(|f| RenderFailure {
            script: relative_to(out_dir, &f.script),
            error: f.error.clone(),
        }));
    }

    pub fn rendered_count(&self) -> usize {
        self.variations.iter().filter(|v| v.render.is_some()).count()
    }

    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|source| PipelineError::Io { path: path.to_path_buf(), source })?;
        Ok(())
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|source| PipelineError::Io { path: path.to_path_buf(), source })?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// `path` relative to `base` when it lives underneath, otherwise unchanged
pub fn relative_to(base: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(base).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
}
