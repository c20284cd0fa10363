//! SynthForge generation stages: domain randomization, Isaac Sim script
//! emission, external rendering and the end-to-end run.

pub mod emitter;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod randomizer;
pub mod render;

pub use emitter::{prim_name, ScriptEmitter};
pub use error::{EmissionError, PipelineError, PipelineResult, RandomizeError, RenderInvocationError};
pub use manifest::{RejectedEntry, RunManifest, VariationEntry};
pub use pipeline::{Extracted, Pipeline, RunRequest, RunSummary, WrittenBatch};
pub use randomizer::{summarize, Randomizer, Rejected, VariationBatch};
pub use render::{RenderFailure, RenderJob, RenderReport, Renderer};
