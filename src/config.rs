use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// How the convenience layer surfaces errors. The core bridge and registries
/// never read this; they always return explicit results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    #[default]
    FailFast,
    Collect,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Overrides the platform cache directory used for runtime support files.
    #[serde(default)]
    pub cache_root: Option<PathBuf>,
    #[serde(default)]
    pub error_mode: ErrorMode,
    /// Name under which the dispatcher command is registered with the runtime.
    #[serde(default = "BridgeConfig::default_dispatch_command")]
    pub dispatch_command: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            cache_root: None,
            error_mode: ErrorMode::default(),
            dispatch_command: Self::default_dispatch_command(),
        }
    }
}

impl BridgeConfig {
    fn default_dispatch_command() -> String {
        "event_dispatch".to_string()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("[config] load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }
}
