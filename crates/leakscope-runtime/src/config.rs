/// Environment variable that disables spawn-site backtraces when set to `0`.
pub const BACKTRACE_ENV: &str = "LEAKSCOPE_BACKTRACE";

/// Environment variable overriding [`CaptureConfig::max_stack_depth`].
pub const MAX_FRAMES_ENV: &str = "LEAKSCOPE_MAX_FRAMES";

/// Controls what the recorder captures for each spawned task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Symbolicate the spawn-site backtrace. When disabled only the spawn
    /// call location is recorded.
    pub capture_backtraces: bool,
    /// Maximum number of frames recorded per spawn, including the spawn
    /// location itself.
    pub max_stack_depth: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_backtraces: true,
            max_stack_depth: 32,
        }
    }
}

impl CaptureConfig {
    /// Default configuration with `LEAKSCOPE_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_overrides(
            std::env::var(BACKTRACE_ENV).ok().as_deref(),
            std::env::var(MAX_FRAMES_ENV).ok().as_deref(),
        )
    }

    #[must_use]
    pub fn with_backtraces(mut self, enabled: bool) -> Self {
        self.capture_backtraces = enabled;
        self
    }

    #[must_use]
    pub fn with_max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth.max(1);
        self
    }

    fn with_overrides(mut self, backtrace: Option<&str>, max_frames: Option<&str>) -> Self {
        if let Some(value) = backtrace {
            self.capture_backtraces = !matches!(value.trim(), "0" | "false" | "off");
        }
        if let Some(value) = max_frames {
            match value.trim().parse::<usize>() {
                Ok(depth) => self = self.with_max_stack_depth(depth),
                Err(_) => tracing::warn!(value, "ignoring invalid {MAX_FRAMES_ENV}"),
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_disable_backtraces() {
        let config = CaptureConfig::default().with_overrides(Some("0"), None);
        assert!(!config.capture_backtraces);

        let config = CaptureConfig::default().with_overrides(Some("1"), None);
        assert!(config.capture_backtraces);
    }

    #[test]
    fn test_overrides_max_frames() {
        let config = CaptureConfig::default().with_overrides(None, Some("8"));
        assert_eq!(config.max_stack_depth, 8);

        let config = CaptureConfig::default().with_overrides(None, Some("0"));
        assert_eq!(config.max_stack_depth, 1);

        let config = CaptureConfig::default().with_overrides(None, Some("lots"));
        assert_eq!(config.max_stack_depth, 32);
    }
}
