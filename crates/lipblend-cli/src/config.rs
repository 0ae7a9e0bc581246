//! CLI configuration.

use lipblend_models::OutputLayout;

/// Runtime configuration, env-overridable.
#[derive(Debug, Clone)]
pub struct LipblendConfig {
    /// Root of the output directory tree.
    pub output_dir: String,
    /// Heartbeat interval for per-frame progress logs.
    pub heartbeat_frames: u64,
}

impl Default for LipblendConfig {
    fn default() -> Self {
        Self {
            output_dir: "output".to_string(),
            heartbeat_frames: 25,
        }
    }
}

impl LipblendConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            output_dir: std::env::var("LIPBLEND_OUTPUT_DIR")
                .unwrap_or_else(|_| "output".to_string()),
            heartbeat_frames: std::env::var("LIPBLEND_HEARTBEAT_FRAMES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(25),
        }
    }

    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.output_dir)
    }
}
