//! Video in, variation documents + Isaac Sim scripts (+ renders) out.
//!
//! Layout under the output directory:
//!
//! ```text
//! <stem>_analysis.json
//! index.json
//! variations/variation_NNN.json
//! usd_scenes/base_scene.py, usd_scenes/variation_NNN.py
//! renders/variation_NNN.mp4
//! ```
//!
//! Each stage is also callable on its own. Nothing is written
//! until extraction has produced a valid document.

use crate::emitter::ScriptEmitter;
use crate::error::{PipelineError, PipelineResult};
use crate::manifest::{relative_to, RejectedEntry, RunManifest, VariationEntry};
use crate::randomizer::{Randomizer, VariationBatch};
use crate::render::{RenderJob, RenderReport, Renderer};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use synthforge_core::constants::{
    variation_stem, BASE_SCRIPT_NAME, MANIFEST_FILE, RENDERS_DIR, SCRIPTS_DIR, VARIATIONS_DIR,
};
use synthforge_core::{AnalysisDocument, Settings};
use synthforge_vision::{extract_document, VideoAnalyzer, PHYSICS_ANALYSIS_PROMPT};

#[derive(Clone, Debug)]
pub struct RunRequest {
    pub video: PathBuf,
    pub count: u32,
    pub render: bool,
    pub seed: Option<u64>,
}

/// Validated base document and where it was saved
#[derive(Clone, Debug)]
pub struct Extracted {
    pub document: AnalysisDocument,
    pub path: PathBuf,
}

/// Variations that passed validation, with their document files
#[derive(Debug)]
pub struct WrittenBatch {
    pub batch: VariationBatch,
    pub files: Vec<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub analysis: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest: RunManifest,
}

pub struct Pipeline<A> {
    settings: Settings,
    analyzer: A,
}

impl<A: VideoAnalyzer> Pipeline<A> {
    pub fn new(settings: Settings, analyzer: A) -> Self {
        Self { settings, analyzer }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    /// Run every stage in order
    pub async fn run(&self, request: &RunRequest) -> PipelineResult<RunSummary> {
        let out = &self.settings.output_dir;
        tracing::info!(
            "Run: {} -> {} ({} variations, render: {})",
            request.video.display(),
            out.display(),
            request.count,
            request.render
        );

        tracing::info!("[1/5] Extracting physics");
        let extracted = extract(&self.analyzer, &request.video, &self.settings).await?;

        tracing::info!("[2/5] Emitting base scene script");
        let base_script = emit_base(&self.settings, &extracted.document)?;

        tracing::info!("[3/5] Generating variations");
        let written = randomize(&self.settings, &extracted.document, request.count, request.seed)?;

        tracing::info!("[4/5] Emitting variation scripts");
        let scripts = emit_all(&self.settings, &written.batch.variations)?;

        let mut manifest = RunManifest::new(Some(request.video.clone()), request.seed);
        manifest.analysis = Some(relative_to(out, &extracted.path));
        manifest.base_script = Some(relative_to(out, &base_script));
        for ((doc, file), script) in written.batch.variations.iter().zip(&written.files).zip(&scripts) {
            manifest.add_variation(VariationEntry {
                variation_id: doc.variation_id.unwrap_or_default(),
                randomization_seed: doc.randomization_seed,
                document: relative_to(out, file),
                script: Some(relative_to(out, script)),
                render: None,
            });
        }
        manifest.rejected = written
            .batch
            .rejected
            .iter()
            .map(|r| RejectedEntry {
                variation_id: r.variation_id,
                randomization_seed: r.seed,
                reason: r.reason.to_string(),
            })
            .collect();

        if request.render {
            tracing::info!("[5/5] Rendering");
            let report = render_all(&self.settings, &scripts).await;
            manifest.record_renders(&report, out);
        } else {
            tracing::info!("[5/5] Rendering skipped");
        }

        let manifest_path = out.join(MANIFEST_FILE);
        manifest.save(&manifest_path)?;
        tracing::info!(
            "Done: {} variations, {} scripts, {} renders ({} rejected, {} render failures)",
            manifest.variations.len(),
            scripts.len() + 1,
            manifest.rendered_count(),
            manifest.rejected.len(),
            manifest.render_failures.len()
        );

        Ok(RunSummary { analysis: extracted.path, manifest_path, manifest })
    }
}

/// `<out>/<video stem>_analysis.json`
pub fn analysis_path(out_dir: &Path, video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    out_dir.join(format!("{stem}_analysis.json"))
}

pub fn variation_path(out_dir: &Path, variation_id: u32) -> PathBuf {
    out_dir.join(VARIATIONS_DIR).join(format!("{}.json", variation_stem(variation_id)))
}

pub fn script_path(out_dir: &Path, name: &str) -> PathBuf {
    out_dir.join(SCRIPTS_DIR).join(format!("{name}.py"))
}

pub fn render_path(out_dir: &Path, script: &Path) -> PathBuf {
    let stem = script
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "render".to_string());
    out_dir.join(RENDERS_DIR).join(format!("{stem}.mp4"))
}

/// One remote analysis; the document is saved only once it validates
pub async fn extract<A: VideoAnalyzer>(
    analyzer: &A,
    video: &Path,
    settings: &Settings,
) -> PipelineResult<Extracted> {
    let document = extract_document(analyzer, video, PHYSICS_ANALYSIS_PROMPT).await?;
    let path = analysis_path(&settings.output_dir, video);
    document.save(&path)?;
    tracing::info!("Saved analysis to {}", path.display());
    Ok(Extracted { document, path })
}

pub fn emit_base(settings: &Settings, document: &AnalysisDocument) -> PipelineResult<PathBuf> {
    let emitter = ScriptEmitter::new(settings.script.clone());
    let path = script_path(&settings.output_dir, BASE_SCRIPT_NAME);
    emitter.write_script(&path, document)?;
    tracing::info!("Wrote {}", path.display());
    Ok(path)
}

/// Generate `count` variations and write each valid one to `variations/`
pub fn randomize(
    settings: &Settings,
    base: &AnalysisDocument,
    count: u32,
    seed: Option<u64>,
) -> PipelineResult<WrittenBatch> {
    let mut randomizer = Randomizer::new(settings.randomization.clone(), seed)?;
    let batch = randomizer.generate(base, count)?;

    let pb = ProgressBar::new(batch.variations.len() as u64);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40}] {pos}/{len} variations")
        .expect("template error"));

    let mut files = Vec::with_capacity(batch.variations.len());
    for (i, variation) in batch.variations.iter().enumerate() {
        let id = variation.variation_id.unwrap_or(i as u32);
        let path = variation_path(&settings.output_dir, id);
        variation.save(&path)?;
        files.push(path);
        pb.inc(1);
    }
    pb.finish_with_message("Variations written");

    Ok(WrittenBatch { batch, files })
}

/// One script per document, named after its variation id
pub fn emit_all(settings: &Settings, documents: &[AnalysisDocument]) -> PipelineResult<Vec<PathBuf>> {
    let emitter = ScriptEmitter::new(settings.script.clone());

    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40}] {pos}/{len} scripts")
        .expect("template error"));

    let mut scripts = Vec::with_capacity(documents.len());
    for (i, doc) in documents.iter().enumerate() {
        let id = doc.variation_id.unwrap_or(i as u32);
        let path = script_path(&settings.output_dir, &variation_stem(id));
        emitter.write_script(&path, doc)?;
        scripts.push(path);
        pb.inc(1);
    }
    pb.finish_with_message("Scripts written");

    tracing::info!("Wrote {} scripts", scripts.len());
    Ok(scripts)
}

/// Render each script to `renders/<stem>.mp4`. Never fails as a whole.
pub async fn render_all(settings: &Settings, scripts: &[PathBuf]) -> RenderReport {
    let jobs: Vec<RenderJob> = scripts
        .iter()
        .map(|script| RenderJob {
            script: script.clone(),
            output: render_path(&settings.output_dir, script),
        })
        .collect();
    Renderer::new(settings.render.clone()).render_batch(&jobs).await
}

/// Every `*.py` directly inside `dir`, sorted by name
pub fn list_scripts(dir: &Path) -> PipelineResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|source| PipelineError::Io { path: dir.to_path_buf(), source })?;
    let mut scripts: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "py"))
        .collect();
    scripts.sort();
    Ok(scripts)
}
