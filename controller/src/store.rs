use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::Context;
use serde_json::{Map, Value};
use tracing::warn;

use irgate_common::GatewayConfig;

/// Where the gateway reads its configuration from on every event.
pub trait ConfigSource: Send + Sync {
    fn current(&self) -> GatewayConfig;
}

/// JSON configuration file, re-read on each call so edits apply to the next
/// event without a restart.
pub struct ConfigStore {
    path: PathBuf,
    last_good: Mutex<GatewayConfig>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_good: Mutex::new(GatewayConfig::default()),
        }
    }

    pub fn from_env() -> Self {
        let path = std::env::var("IRGATE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.irgate/config.json"));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<GatewayConfig> {
        let mut config = match std::fs::read(&self.path) {
            Ok(raw) => serde_json::from_slice::<GatewayConfig>(&raw)
                .with_context(|| format!("invalid config file {}", self.path.display()))?,
            Err(err) if err.kind() == ErrorKind::NotFound => GatewayConfig::default(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        config.sanitize();
        self.remember(&config);
        Ok(config)
    }

    /// Writes the gateway keys back, keeping any other keys already in the
    /// file (network credentials live in the same document).
    pub fn save(&self, config: &GatewayConfig) -> anyhow::Result<()> {
        let mut document = match std::fs::read(&self.path) {
            Ok(raw) => serde_json::from_slice::<Value>(&raw).unwrap_or_else(|err| {
                warn!("replacing unreadable config document: {err}");
                Value::Object(Map::new())
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Value::Object(Map::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        if !document.is_object() {
            document = Value::Object(Map::new());
        }

        if let (Some(existing), Value::Object(update)) =
            (document.as_object_mut(), serde_json::to_value(config)?)
        {
            existing.extend(update);
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_vec_pretty(&document)?;
        std::fs::write(&self.path, payload)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        self.remember(config);
        Ok(())
    }

    fn remember(&self, config: &GatewayConfig) {
        let mut last_good = self.last_good.lock().unwrap_or_else(|e| e.into_inner());
        *last_good = config.clone();
    }
}

impl ConfigSource for ConfigStore {
    fn current(&self) -> GatewayConfig {
        match self.load() {
            Ok(config) => config,
            Err(err) => {
                warn!("config reload failed, keeping last good config: {err:#}");
                self.last_good
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone()
            }
        }
    }
}
