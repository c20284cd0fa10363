pub mod color;
pub mod config;
pub mod constants;
pub mod document;
pub mod validation;


pub use config::{
    ApiKey, ConfigError, ForgeConfig, GeminiSettings, RandomizationConfig, Range, RenderConfig,
    ScriptOptions, Settings,
};
pub use document::{
    AnalysisDocument, CameraEstimation, DocumentError, DomeLight, KeyLight, LightingConditions,
    Material, PhysicsEstimation, PhysicsObject, Primitive, Rgb, SceneComposition, SceneObject,
    TimelineEvent, Vec3,
};
pub use validation::{ValidationError, ValidationIssue};
