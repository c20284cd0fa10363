use crate::error::ExtractionError;
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use synthforge_core::AnalysisDocument;

/// Remote (or stubbed) multimodal model.
///
/// Returns the model's raw text; decoding and validation happen in
/// [`extract_document`] for every back-end.
pub trait VideoAnalyzer {
    fn analyze(
        &self,
        video: &Path,
        instruction: &str,
    ) -> impl Future<Output = Result<String, ExtractionError>> + Send;
}

/// Run one extraction: exactly one analyzer call, then decode + validate
pub async fn extract_document<A: VideoAnalyzer>(
    analyzer: &A,
    video: &Path,
    instruction: &str,
) -> Result<AnalysisDocument, ExtractionError> {
    if !video.is_file() {
        return Err(ExtractionError::VideoNotFound(video.to_path_buf()));
    }

    tracing::info!("Analyzing video: {}", video.display());
    let raw = analyzer.analyze(video, instruction).await?;
    tracing::debug!("Model returned {} bytes", raw.len());

    match parse_response(&raw) {
        Ok(doc) => {
            tracing::info!(
                "Extracted {} objects, {} physics entries, {} events",
                doc.scene_composition.objects.len(),
                doc.physics_estimation.objects.len(),
                doc.event_timeline.len()
            );
            Ok(doc)
        }
        Err(e) => {
            if let Some(raw) = e.raw_response() {
                tracing::error!("Unparseable model response: {}", truncate(raw, 500));
            }
            Err(e)
        }
    }
}

/// Decode model text into a validated document
pub fn parse_response(raw: &str) -> Result<AnalysisDocument, ExtractionError> {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        return Err(ExtractionError::EmptyResponse { reason: None });
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|source| ExtractionError::MalformedJson { source, raw: raw.to_string() })?;
    let doc = AnalysisDocument::from_value(value).map_err(ExtractionError::Schema)?;
    doc.validate()?;
    Ok(doc)
}

/// Remove a surrounding ```json ... ``` fence if the model added one
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline
    let rest = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// MIME type for the video container, by extension
pub fn video_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        Some("mpeg") | Some("mpg") => "video/mpeg",
        Some("3gp") => "video/3gpp",
        _ => "video/mp4",
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MINIMAL: &str = r#"{
      "scene_composition": {"objects": [{"id": "ball", "type": "sphere", "position": {"x": 0, "y": 1, "z": 0}}]},
      "physics_estimation": {"objects": [{"id": "ball", "mass": 0.5, "restitution": 0.7, "static_friction": 0.3}]}
    }"#;

    struct Canned {
        reply: &'static str,
        calls: AtomicUsize,
    }

    impl VideoAnalyzer for Canned {
        async fn analyze(&self, _video: &Path, _instruction: &str) -> Result<String, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.to_string())
        }
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{}\n```\n"), "{}");
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_fenced_response() {
        let fenced = format!("```json\n{}\n```", MINIMAL);
        let doc = parse_response(&fenced).unwrap();
        assert_eq!(doc.scene_composition.objects[0].id, "ball");
    }

    #[test]
    fn test_non_json_is_malformed() {
        let err = parse_response("The ball rolls to the left.").unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedJson { .. }));
        assert_eq!(err.raw_response(), Some("The ball rolls to the left."));
    }

    #[test]
    fn test_blank_is_empty_response() {
        assert!(matches!(parse_response("  \n"), Err(ExtractionError::EmptyResponse { .. })));
    }

    #[test]
    fn test_missing_section_is_schema_error() {
        let err = parse_response(r#"{"scene_composition": {"objects": []}}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::Schema(_)));
    }

    #[test]
    fn test_loose_type_and_timeline_are_accepted() {
        let reply = MINIMAL.replace("\"sphere\"", "\"box\"").replace(
            "\n    }",
            r#",
      "event_timeline": [{"timestamp": 0.75, "event": "collision"}, {"frame": 45.5, "event": "rest"}]
    }"#,
        );
        let doc = parse_response(&reply).unwrap();
        assert_eq!(doc.scene_composition.objects[0].primitive, synthforge_core::Primitive::Cube);
        assert_eq!(doc.event_timeline[0].timestamp, Some(0.75));
        assert_eq!(doc.event_timeline[1].frame, Some(46));
    }

    #[test]
    fn test_out_of_range_is_invalid_document() {
        let reply = MINIMAL.replace("0.7", "1.7");
        let err = parse_response(&reply).unwrap_err();
        match err {
            ExtractionError::InvalidDocument(v) => {
                assert!(v.has_issue_at("physics_estimation.objects[0].restitution"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(video_mime_type(Path::new("clip.MOV")), "video/quicktime");
        assert_eq!(video_mime_type(Path::new("clip.webm")), "video/webm");
        assert_eq!(video_mime_type(Path::new("clip")), "video/mp4");
    }

    #[tokio::test]
    async fn test_extract_calls_analyzer_once() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("ball.mp4");
        std::fs::write(&video, b"not really a video").unwrap();

        let analyzer = Canned { reply: MINIMAL, calls: AtomicUsize::new(0) };
        let doc = extract_document(&analyzer, &video, "describe").await.unwrap();
        assert_eq!(doc.physics_estimation.objects[0].mass, 0.5);
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_video_skips_analyzer() {
        let analyzer = Canned { reply: MINIMAL, calls: AtomicUsize::new(0) };
        let err = extract_document(&analyzer, Path::new("/no/such/clip.mp4"), "describe")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::VideoNotFound(_)));
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
    }
}
