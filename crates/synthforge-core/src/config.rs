//! Run configuration, read once at startup and handed to each stage.
//!
//! Nothing below reads the process environment on its own: callers pass a
//! lookup function (`std::env::var` in the binary, a map in tests).

use crate::constants::*;
use serde::{Serialize, Deserialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing credential: set the {var} environment variable")]
    MissingCredential { var: &'static str },

    #[error("invalid value for {var}: '{value}' ({reason})")]
    InvalidValue { var: &'static str, value: String, reason: String },

    #[error("invalid range '{name}': [{min}, {max}]")]
    InvalidRange { name: String, min: f64, max: f64 },

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to parse {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

/// Remote service credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read the key through `lookup`; blank counts as missing
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(ENV_API_KEY) {
            Some(key) if !key.trim().is_empty() => Ok(Self(key.trim().to_string())),
            _ => Err(ConfigError::MissingCredential { var: ENV_API_KEY }),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Gemini request parameters
#[derive(Clone, Debug)]
pub struct GeminiSettings {
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub inline_limit_bytes: u64,
    pub request_timeout: Duration,
    pub processing_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            inline_limit_bytes: INLINE_VIDEO_LIMIT_BYTES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            processing_timeout: Duration::from_secs(DEFAULT_PROCESSING_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl GeminiSettings {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut s = Self::default();
        if let Some(model) = lookup(ENV_MODEL).filter(|m| !m.trim().is_empty()) {
            s.model = model.trim().to_string();
        }
        if let Some(base) = lookup(ENV_API_BASE).filter(|b| !b.trim().is_empty()) {
            s.api_base = base.trim().trim_end_matches('/').to_string();
        }
        if let Some(raw) = lookup(ENV_TEMPERATURE) {
            let t: f32 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: ENV_TEMPERATURE,
                value: raw.clone(),
                reason: "not a number".to_string(),
            })?;
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::InvalidValue {
                    var: ENV_TEMPERATURE,
                    value: raw,
                    reason: "expected 0.0 ..= 2.0".to_string(),
                });
            }
            s.temperature = t;
        }
        Ok(s)
    }
}

/// Closed interval sampled uniformly
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }

    fn check(&self, name: &str) -> Result<(), ConfigError> {
        // Uniform sampling needs a finite width, not just finite bounds
        let width = self.max - self.min;
        if !self.min.is_finite() || !self.max.is_finite() || !width.is_finite() || width < 0.0 {
            return Err(ConfigError::InvalidRange { name: name.to_string(), min: self.min, max: self.max });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialRanges {
    pub hue: Range,
    pub saturation: Range,
    pub value: Range,
    pub roughness: Range,
    pub metallic: Range,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightingRanges {
    pub dome_intensity: Range,
    pub dome_rotation: Range,  // degrees
    pub key_intensity: Range,
    pub key_position_x: Range,
    pub key_position_y: Range,
    pub key_position_z: Range,
    pub color_temperature: Range,  // Kelvin
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicsRanges {
    pub static_friction: Range,
    pub dynamic_friction: Range,
    pub restitution: Range,
    /// Off unless configured: mass is copied verbatim by default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass_multiplier: Option<Range>,
    /// Off unless configured: velocity is copied verbatim by default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_scale: Option<Range>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraRanges {
    pub offset_x: Range,
    pub offset_y: Range,
    pub offset_z: Range,
    pub focal_length: Range,  // mm
}

/// Domain randomization ranges
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomizationConfig {
    pub material: MaterialRanges,
    pub lighting: LightingRanges,
    pub physics: PhysicsRanges,
    pub camera: CameraRanges,
}

impl Default for RandomizationConfig {
    fn default() -> Self {
        Self {
            material: MaterialRanges {
                hue: Range::new(0.0, 1.0),
                saturation: Range::new(0.5, 1.0),
                value: Range::new(0.4, 1.0),
                roughness: Range::new(0.1, 0.9),
                metallic: Range::new(0.0, 0.8),
            },
            lighting: LightingRanges {
                dome_intensity: Range::new(500.0, 3000.0),
                dome_rotation: Range::new(0.0, 360.0),
                key_intensity: Range::new(3000.0, 10000.0),
                key_position_x: Range::new(-10.0, 10.0),
                key_position_y: Range::new(3.0, 10.0),
                key_position_z: Range::new(-10.0, 10.0),
                color_temperature: Range::new(2700.0, 6500.0),
            },
            physics: PhysicsRanges {
                static_friction: Range::new(0.1, 0.8),
                dynamic_friction: Range::new(0.05, 0.7),
                restitution: Range::new(0.2, 0.95),
                mass_multiplier: None,
                velocity_scale: None,
            },
            camera: CameraRanges {
                offset_x: Range::new(-2.0, 2.0),
                offset_y: Range::new(-1.0, 1.0),
                offset_z: Range::new(-2.0, 2.0),
                focal_length: Range::new(24.0, 85.0),
            },
        }
    }
}

impl RandomizationConfig {
    /// Load ranges from a JSON file and check them
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.material;
        let l = &self.lighting;
        let p = &self.physics;
        let c = &self.camera;
        let mut ranges = vec![
            ("material.hue", m.hue),
            ("material.saturation", m.saturation),
            ("material.value", m.value),
            ("material.roughness", m.roughness),
            ("material.metallic", m.metallic),
            ("lighting.dome_intensity", l.dome_intensity),
            ("lighting.dome_rotation", l.dome_rotation),
            ("lighting.key_intensity", l.key_intensity),
            ("lighting.key_position_x", l.key_position_x),
            ("lighting.key_position_y", l.key_position_y),
            ("lighting.key_position_z", l.key_position_z),
            ("lighting.color_temperature", l.color_temperature),
            ("physics.static_friction", p.static_friction),
            ("physics.dynamic_friction", p.dynamic_friction),
            ("physics.restitution", p.restitution),
            ("camera.offset_x", c.offset_x),
            ("camera.offset_y", c.offset_y),
            ("camera.offset_z", c.offset_z),
            ("camera.focal_length", c.focal_length),
        ];
        if let Some(r) = p.mass_multiplier {
            ranges.push(("physics.mass_multiplier", r));
        }
        if let Some(r) = p.velocity_scale {
            ranges.push(("physics.velocity_scale", r));
        }
        for (name, range) in ranges {
            range.check(name)?;
        }
        Ok(())
    }
}

/// Fixed parameters baked into every emitted script
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptOptions {
    pub headless: bool,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frames: u32,
    pub ground_size: f64,  // meters, square
    pub ground_static_friction: f64,
    pub ground_dynamic_friction: f64,
    pub ground_restitution: f64,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            headless: true,
            width: 1920,
            height: 1080,
            fps: 60,
            frames: 300,  // 5 s at 60 fps
            ground_size: 10.0,
            ground_static_friction: 0.5,
            ground_dynamic_friction: 0.4,
            ground_restitution: 0.3,
        }
    }
}

/// External renderer (Isaac Sim's bundled Python)
#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    pub executable: Option<PathBuf>,
    pub extra_args: Vec<String>,
    /// Per-script wall clock limit; the process is killed past it
    pub timeout: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            executable: None,
            extra_args: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_RENDER_TIMEOUT_SECS),
        }
    }
}

impl RenderConfig {
    /// `ISAAC_SIM_PYTHON` if set, otherwise the newest `isaac_sim-*` install under $HOME
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let executable = lookup(ENV_ISAAC_PYTHON)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| lookup("HOME").and_then(|home| detect_isaac_python(&Path::new(&home).join(ISAAC_PKG_DIR))));
        Self { executable, ..Self::default() }
    }
}

/// Find `python.sh` in the lexically newest `isaac_sim-*` directory
pub fn detect_isaac_python(pkg_dir: &Path) -> Option<PathBuf> {
    let mut installs: Vec<PathBuf> = std::fs::read_dir(pkg_dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_dir()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("isaac_sim-"))
        })
        .collect();
    installs.sort();
    let python = installs.pop()?.join("python.sh");
    python.exists().then_some(python)
}

/// Everything except the credential
#[derive(Clone, Debug)]
pub struct Settings {
    pub gemini: GeminiSettings,
    pub randomization: RandomizationConfig,
    pub render: RenderConfig,
    pub script: ScriptOptions,
    pub output_dir: PathBuf,
}

impl Settings {
    pub fn from_lookup<F>(lookup: F, output_dir: PathBuf) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            gemini: GeminiSettings::from_lookup(&lookup)?,
            randomization: RandomizationConfig::default(),
            render: RenderConfig::from_lookup(&lookup),
            script: ScriptOptions::default(),
            output_dir,
        })
    }

    pub fn from_env(output_dir: PathBuf) -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup, output_dir)
    }
}

/// Full configuration for a run that talks to the remote model
#[derive(Clone, Debug)]
pub struct ForgeConfig {
    pub api_key: ApiKey,
    pub settings: Settings,
}

impl ForgeConfig {
    /// Fails with `MissingCredential` before anything else is read
    pub fn from_lookup<F>(lookup: F, output_dir: PathBuf) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = ApiKey::from_lookup(&lookup)?;
        let settings = Settings::from_lookup(&lookup, output_dir)?;
        Ok(Self { api_key, settings })
    }

    pub fn from_env(output_dir: PathBuf) -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup, output_dir)
    }
}

/// Process environment as a lookup function
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
