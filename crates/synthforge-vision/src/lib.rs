//! Physics Extraction Stage.
//!
//! One call to a multimodal model per video, no retry. The raw reply is
//! decoded into an [`AnalysisDocument`](synthforge_core::AnalysisDocument)
//! and validated before anything downstream sees it.

pub mod error;
pub mod extract;
pub mod gemini;
pub mod prompt;

pub use error::ExtractionError;
pub use extract::{extract_document, parse_response, strip_code_fences, video_mime_type, VideoAnalyzer};
pub use gemini::GeminiClient;
pub use prompt::PHYSICS_ANALYSIS_PROMPT;
