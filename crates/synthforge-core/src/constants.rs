/// Environment variable holding the Gemini API key
pub const ENV_API_KEY: &str = "GEMINI_API_KEY";

/// Optional model override
pub const ENV_MODEL: &str = "SYNTHFORGE_MODEL";

/// Optional sampling temperature override
pub const ENV_TEMPERATURE: &str = "SYNTHFORGE_TEMPERATURE";

/// Optional API base URL override (used for proxies and tests)
pub const ENV_API_BASE: &str = "SYNTHFORGE_API_BASE";

/// Optional path to Isaac Sim's `python.sh`
pub const ENV_ISAAC_PYTHON: &str = "ISAAC_SIM_PYTHON";

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

/// Largest video sent inline (base64) instead of through the Files API
pub const INLINE_VIDEO_LIMIT_BYTES: u64 = 20 * 1024 * 1024;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_PROCESSING_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 300;

/// Standard gravity (m/s^2), pointing down the Y axis
pub const GRAVITY_Y: f64 = -9.81;

pub const DEFAULT_VARIATION_COUNT: u32 = 9;

/// Frame rate assumed when ordering timeline events given in frames
pub const TIMELINE_FPS: f64 = 30.0;

/// Output layout
pub const VARIATIONS_DIR: &str = "variations";
pub const SCRIPTS_DIR: &str = "usd_scenes";
pub const RENDERS_DIR: &str = "renders";
pub const MANIFEST_FILE: &str = "index.json";
pub const BASE_SCRIPT_NAME: &str = "base_scene";

/// Isaac Sim package root, relative to $HOME
pub const ISAAC_PKG_DIR: &str = ".local/share/ov/pkg";

/// File stem for the variation with the given index: "variation_007"
pub fn variation_stem(index: u32) -> String {
    format!("variation_{:03}", index)
}
