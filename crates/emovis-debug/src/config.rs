use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_FPS: f32 = 30.0;

/// Renderer configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Message stream file; `None` reads stdin.
    pub input: Option<PathBuf>,
    /// PNG file the overlay is written to on every tick instead of opening
    /// a window.
    pub output: Option<PathBuf>,
    /// Render ticks per second.
    pub fps: f32,
}

impl Config {
    /// Load configuration from `EMOVIS_DEBUG_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            input: get("EMOVIS_DEBUG_INPUT").map(PathBuf::from),
            output: get("EMOVIS_DEBUG_OUTPUT").map(PathBuf::from),
            fps: get("EMOVIS_DEBUG_FPS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_FPS),
        }
    }

    /// Tick period; non-positive or non-finite rates fall back to the default.
    pub fn period(&self) -> Duration {
        let fps = if self.fps.is_finite() && self.fps > 0.0 { self.fps } else { DEFAULT_FPS };
        Duration::from_secs_f32(1.0 / fps)
    }
}
