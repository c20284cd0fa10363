use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use synthforge_core::{AnalysisDocument, ConfigError, ForgeConfig, Settings, Vec3};
use synthforge_data::{Pipeline, PipelineError, RunManifest, RunRequest};
use synthforge_vision::{ExtractionError, VideoAnalyzer};

const ROLLING_BALL: &str = r#"{
  "scene_composition": {
    "objects": [
      {"id": "ball", "type": "sphere", "position": {"x": 0.0, "y": 0.1, "z": 0.0},
       "scale": {"x": 0.1, "y": 0.1, "z": 0.1}}
    ],
    "environment": {"surface_type": "floor", "material": "concrete"}
  },
  "physics_estimation": {
    "gravity": {"x": 0.0, "y": -9.81, "z": 0.0},
    "objects": [
      {"id": "ball", "mass": 0.5, "initial_velocity": {"x": 2.0, "y": 0.0, "z": 0.0},
       "restitution": 0.7, "static_friction": 0.3, "dynamic_friction": 0.25}
    ]
  },
  "event_timeline": [{"frame": 0, "event": "simulation_start", "object_id": "ball"}]
}"#;

struct StubAnalyzer {
    reply: String,
    calls: AtomicUsize,
}

impl StubAnalyzer {
    fn new(reply: &str) -> Self {
        Self { reply: reply.to_string(), calls: AtomicUsize::new(0) }
    }
}

impl VideoAnalyzer for StubAnalyzer {
    async fn analyze(&self, _video: &Path, _instruction: &str) -> Result<String, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

fn settings(out: &Path) -> Settings {
    Settings::from_lookup(|_| None, out.to_path_buf()).unwrap()
}

fn video(dir: &Path) -> PathBuf {
    let path = dir.join("ball.mp4");
    std::fs::write(&path, b"\x00\x00\x00\x18ftypmp42").unwrap();
    path
}

fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == ext))
        .collect();
    files.sort();
    files
}

fn request(video: PathBuf, count: u32, seed: Option<u64>) -> RunRequest {
    RunRequest { video, count, render: false, seed }
}

#[tokio::test]
async fn test_end_to_end_with_stub_analyzer() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("output");
    let pipeline = Pipeline::new(settings(&out), StubAnalyzer::new(ROLLING_BALL));

    let summary = pipeline.run(&request(video(dir.path()), 9, Some(2024))).await.unwrap();

    assert_eq!(summary.analysis, out.join("ball_analysis.json"));
    assert!(summary.analysis.is_file());

    let variations = files_with_extension(&out.join("variations"), "json");
    assert_eq!(variations.len(), 9);
    assert_eq!(variations[0].file_name().unwrap(), "variation_000.json");
    assert_eq!(variations[8].file_name().unwrap(), "variation_008.json");

    let scripts = files_with_extension(&out.join("usd_scenes"), "py");
    assert_eq!(scripts.len(), 10);
    assert!(out.join("usd_scenes/base_scene.py").is_file());
    assert!(!out.join("renders").exists());

    let docs: Vec<AnalysisDocument> =
        variations.iter().map(|p| AnalysisDocument::load(p).unwrap()).collect();
    for doc in &docs {
        let ball = &doc.physics_estimation.objects[0];
        assert_eq!(ball.mass, 0.5);
        assert_eq!(ball.initial_velocity, Vec3::new(2.0, 0.0, 0.0));
        doc.validate().unwrap();
    }
    let first = docs[0].physics_estimation.objects[0].static_friction;
    assert!(docs.iter().any(|d| d.physics_estimation.objects[0].static_friction != first));

    let manifest = RunManifest::load(&summary.manifest_path).unwrap();
    assert_eq!(manifest, summary.manifest);
    assert_eq!(manifest.variations.len(), 9);
    assert_eq!(manifest.analysis, Some(PathBuf::from("ball_analysis.json")));
    assert_eq!(manifest.seed, Some(2024));
    assert!(manifest.rejected.is_empty());

    assert_eq!(pipeline.analyzer().calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_analyzer_called_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("output");
    let analyzer = StubAnalyzer::new(ROLLING_BALL);

    let base = synthforge_data::pipeline::extract(&analyzer, &video(dir.path()), &settings(&out))
        .await
        .unwrap();
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(base.document.scene_composition.objects[0].id, "ball");
}

#[tokio::test]
async fn test_fenced_reply_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("output");
    let reply = format!("```json\n{ROLLING_BALL}\n```");
    let pipeline = Pipeline::new(settings(&out), StubAnalyzer::new(&reply));

    let summary = pipeline.run(&request(video(dir.path()), 1, None)).await.unwrap();
    assert_eq!(summary.manifest.variations.len(), 1);
}

#[tokio::test]
async fn test_malformed_reply_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("output");
    let pipeline = Pipeline::new(
        settings(&out),
        StubAnalyzer::new("I watched the video. The ball rolls to the right."),
    );

    let err = pipeline.run(&request(video(dir.path()), 9, None)).await.unwrap_err();
    assert!(matches!(err, PipelineError::Extraction(ExtractionError::MalformedJson { .. })));
    assert!(!out.exists());
}

#[tokio::test]
async fn test_invalid_document_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("output");
    let reply = ROLLING_BALL.replace("\"restitution\": 0.7", "\"restitution\": 1.4");
    let pipeline = Pipeline::new(settings(&out), StubAnalyzer::new(&reply));

    let err = pipeline.run(&request(video(dir.path()), 3, None)).await.unwrap_err();
    assert!(matches!(err, PipelineError::Extraction(ExtractionError::InvalidDocument(_))));
    assert!(!out.exists());
}

#[tokio::test]
async fn test_missing_video_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("output");
    let pipeline = Pipeline::new(settings(&out), StubAnalyzer::new(ROLLING_BALL));

    let err = pipeline
        .run(&request(dir.path().join("missing.mp4"), 3, None))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Extraction(ExtractionError::VideoNotFound(_))));
    assert!(!out.exists());
}

#[test]
fn test_missing_credential_fails_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("output");
    let err = ForgeConfig::from_lookup(|_| None, out.clone()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingCredential { var: "GEMINI_API_KEY" }));
    assert!(!out.exists());
}

#[tokio::test]
async fn test_render_failures_do_not_abort_run() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("output");
    let mut settings = settings(&out);
    settings.render.executable = Some(dir.path().join("no_isaac/python.sh"));
    let pipeline = Pipeline::new(settings, StubAnalyzer::new(ROLLING_BALL));

    let mut req = request(video(dir.path()), 3, Some(1));
    req.render = true;
    let summary = pipeline.run(&req).await.unwrap();

    assert_eq!(summary.manifest.variations.len(), 3);
    assert_eq!(summary.manifest.render_failures.len(), 3);
    assert_eq!(summary.manifest.rendered_count(), 0);
    assert_eq!(
        summary.manifest.render_failures[0].script,
        PathBuf::from("usd_scenes/variation_000.py")
    );
}

#[tokio::test]
async fn test_same_seed_same_variations() {
    let dir = tempfile::tempdir().unwrap();
    let clip = video(dir.path());
    let (a, b) = (dir.path().join("a"), dir.path().join("b"));

    for out in [&a, &b] {
        Pipeline::new(settings(out), StubAnalyzer::new(ROLLING_BALL))
            .run(&request(clip.clone(), 4, Some(77)))
            .await
            .unwrap();
    }

    for name in ["variations/variation_003.json", "usd_scenes/variation_003.py"] {
        assert_eq!(
            std::fs::read_to_string(a.join(name)).unwrap(),
            std::fs::read_to_string(b.join(name)).unwrap()
        );
    }
}
