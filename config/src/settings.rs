//! TOML settings document for file-based setup.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use cmpflow_types::PresentationConfig;

use crate::{CmpConfig, ConfigError};

/// Settings file layout:
///
/// ```toml
/// [cmp]
/// id = "abc123"
/// domain = "delivery.consentmanager.net"
/// language = "EN"
/// app_name = "Demo App"
/// app_id = "net.example.demo"
///
/// [presentation]
/// layout = "bottom_half"
/// dark_mode = true
///
/// [engine]
/// operation_timeout_secs = 10
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct CmpSettings {
    pub cmp: CmpSection,
    #[serde(default)]
    pub presentation: PresentationConfig,
    pub engine: Option<EngineSection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CmpSection {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub app_id: String,
    pub json_config: Option<String>,
    #[serde(default)]
    pub no_hash: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub tv_platform: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct EngineSection {
    pub operation_timeout_secs: Option<u64>,
}

impl CmpSettings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded cmp settings");
        Ok(settings)
    }

    /// Assemble the session configuration. The result still goes through
    /// [`CmpConfig::validate`] when the engine is constructed.
    #[must_use]
    pub fn to_config(&self) -> CmpConfig {
        let mut config = CmpConfig::new(
            self.cmp.id.clone(),
            self.cmp.domain.clone(),
            self.cmp.language.clone(),
            self.cmp.app_name.clone(),
            self.cmp.app_id.clone(),
        )
        .with_no_hash(self.cmp.no_hash)
        .with_debug(self.cmp.debug)
        .with_tv_platform(self.cmp.tv_platform);
        if let Some(json_config) = &self.cmp.json_config {
            config = config.with_json_config(json_config.clone());
        }
        config
    }

    #[must_use]
    pub fn presentation(&self) -> PresentationConfig {
        self.presentation
    }

    #[must_use]
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.engine
            .as_ref()
            .and_then(|engine| engine.operation_timeout_secs)
            .map(Duration::from_secs)
    }
}
