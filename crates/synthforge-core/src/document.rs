//! Analysis document: scene composition, physics estimate, lighting, timeline.
//!
//! This is the JSON exchanged between every stage. Extraction produces it,
//! the randomizer copies and redraws it, the emitter reads it.

use crate::constants::GRAVITY_Y;
use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};
use std::fs;
use std::ops::{Add, Mul};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading or saving a document file
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },

    #[error("failed to parse {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },

    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const ONE: Vec3 = Vec3 { x: 1.0, y: 1.0, z: 1.0 };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn components(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn is_finite(&self) -> bool {
        self.components().iter().all(|c| c.is_finite())
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: f64) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }
}

/// Linear RGB, each channel in [0, 1]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb { r: 1.0, g: 1.0, b: 1.0 };

    pub fn channels(&self) -> [f64; 3] {
        [self.r, self.g, self.b]
    }
}

/// Geometric primitive recognised by the emitter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    #[default]
    Sphere,
    #[serde(alias = "box", alias = "cuboid")]
    Cube,
    Cylinder,
    Cone,
    Capsule,
    Mesh,
    /// Any type name not listed above
    #[serde(other)]
    Unknown,
}

/// Id fragments that suggest a round object when the type is unrecognised
const ROUND_HINTS: &[&str] = &["cup", "mug", "cylinder", "bottle", "can", "saucer", "plate", "disk"];
const BOX_HINTS: &[&str] = &["box", "cube", "table", "block", "brick", "monitor", "screen"];

impl Primitive {
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Sphere => "sphere",
            Primitive::Cube => "cube",
            Primitive::Cylinder => "cylinder",
            Primitive::Cone => "cone",
            Primitive::Capsule => "capsule",
            Primitive::Mesh => "mesh",
            Primitive::Unknown => "unknown",
        }
    }
}

/// Surface appearance written by the randomizer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub hue: f64,
    pub saturation: f64,
    pub value: f64,
    pub base_color: Rgb,
    pub roughness: f64,
    pub metallic: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: String,
    #[serde(rename = "type", default)]
    pub primitive: Primitive,
    pub position: Vec3,    // meters
    #[serde(default)]
    pub rotation: Vec3,    // degrees
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<Material>,
}

fn unit_scale() -> Vec3 {
    Vec3::ONE
}

impl SceneObject {
    /// Primitive to build. An unrecognised type is guessed from the id and
    /// otherwise falls back to the box proxy used for meshes.
    pub fn shape(&self) -> Primitive {
        if self.primitive != Primitive::Unknown {
            return self.primitive;
        }
        let id = self.id.to_lowercase();
        if ROUND_HINTS.iter().any(|h| id.contains(h)) {
            Primitive::Cylinder
        } else if BOX_HINTS.iter().any(|h| id.contains(h)) {
            Primitive::Cube
        } else {
            tracing::warn!("Unknown object type for '{}', using a box proxy", self.id);
            Primitive::Mesh
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

/// Supporting surface the objects rest on
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneComposition {
    pub objects: Vec<SceneObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
}

/// Per-object dynamics estimated from the video
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicsObject {
    pub id: String,
    pub mass: f64,                  // kg
    #[serde(default)]
    pub initial_velocity: Vec3,     // m/s
    #[serde(default)]
    pub initial_angular_velocity: Vec3,
    pub restitution: f64,
    #[serde(alias = "friction")]
    pub static_friction: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_friction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collision_shape: Option<String>,
}

impl PhysicsObject {
    /// Kinetic friction, falling back to the static coefficient when the model gave only one
    pub fn dynamic_friction(&self) -> f64 {
        self.dynamic_friction.unwrap_or(self.static_friction)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicsEstimation {
    #[serde(default = "default_gravity")]
    pub gravity: Vec3,
    pub objects: Vec<PhysicsObject>,
}

fn default_gravity() -> Vec3 {
    Vec3::new(0.0, GRAVITY_Y, 0.0)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomeLight {
    pub intensity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,  // degrees about +Y
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyLight {
    #[serde(rename = "type", default = "default_key_light_kind")]
    pub kind: String,
    #[serde(default = "default_key_light_position")]
    pub position: Vec3,
    pub intensity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_temperature: Option<f64>,  // Kelvin
}

impl KeyLight {
    pub fn with_intensity(intensity: f64) -> Self {
        Self {
            kind: default_key_light_kind(),
            position: default_key_light_position(),
            intensity,
            color: None,
            color_temperature: None,
        }
    }
}

fn default_key_light_kind() -> String {
    "sphere".to_string()
}

fn default_key_light_position() -> Vec3 {
    Vec3::new(5.0, 5.0, 5.0)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LightingConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dome_light: Option<DomeLight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_light: Option<KeyLight>,
}

/// Named moment in the clip. Order only matters for reading the log.
///
/// The timeline is informational, so a malformed `frame` is dropped with a
/// warning instead of failing the document. Events may give a `timestamp`
/// in seconds instead of (or next to) a frame number.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    #[serde(default, deserialize_with = "lenient_frame", skip_serializing_if = "Option::is_none")]
    pub frame: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,  // seconds
    #[serde(default)]
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub objects: Vec<String>,
}

fn lenient_frame<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let frame = match &value {
        Value::Null => None,
        Value::Number(n) => n
            .as_u64()
            .map(|f| f.min(u32::MAX as u64) as u32)
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f.round() as u32)),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f.round() as u32),
        _ => None,
    };
    if frame.is_none() && !value.is_null() {
        tracing::warn!("Ignoring unusable timeline frame {}", value);
    }
    Ok(frame)
}

impl TimelineEvent {
    /// Seconds from clip start: the frame at the given rate, else the
    /// event's own timestamp
    pub fn seconds(&self, fps: f64) -> Option<f64> {
        match self.frame {
            Some(frame) if fps > 0.0 => Some(frame as f64 / fps),
            _ => self.timestamp.filter(|t| t.is_finite()),
        }
    }

    /// Every object id this event refers to
    pub fn involved(&self) -> impl Iterator<Item = &str> {
        self.object_id.iter().chain(self.objects.iter()).map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraEstimation {
    pub position: Vec3,
    pub look_at: Vec3,
    pub focal_length: f64,  // mm
}

impl Default for CameraEstimation {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.5, 3.0),
            look_at: Vec3::new(0.0, 0.5, 0.0),
            focal_length: 50.0,
        }
    }
}

/// Scene + physics + lighting + timeline, as extracted or as a variation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDocument {
    pub scene_composition: SceneComposition,
    pub physics_estimation: PhysicsEstimation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighting_conditions: Option<LightingConditions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_timeline: Vec<TimelineEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_estimation: Option<CameraEstimation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub randomization_seed: Option<u64>,
    /// Keys the model emitted outside the schema, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnalysisDocument {
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let json = fs::read_to_string(path)
            .map_err(|source| DocumentError::Read { path: path.to_path_buf(), source })?;
        Self::from_json_str(&json)
            .map_err(|source| DocumentError::Parse { path: path.to_path_buf(), source })
    }

    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let json = self.to_json_pretty()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| DocumentError::Write { path: parent.to_path_buf(), source })?;
        }
        fs::write(path, json)
            .map_err(|source| DocumentError::Write { path: path.to_path_buf(), source })
    }

    pub fn physics_for(&self, id: &str) -> Option<&PhysicsObject> {
        self.physics_estimation.objects.iter().find(|p| p.id == id)
    }

    /// Camera from the document, or the default framing when the model gave none
    pub fn camera(&self) -> CameraEstimation {
        self.camera_estimation.clone().unwrap_or_default()
    }

    pub fn lighting(&self) -> LightingConditions {
        self.lighting_conditions.clone().unwrap_or_default()
    }

    pub fn is_variation(&self) -> bool {
        self.variation_id.is_some()
    }
}
