//! Configuration for the cmpflow engine.
//!
//! [`CmpConfig`] is the validated, immutable session configuration handed to
//! the engine at construction. [`CmpSettings`] is an optional TOML document
//! for hosts that prefer file-based setup over building the config in code.

mod settings;

pub use settings::{CmpSettings, CmpSection, EngineSection};

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration field `{0}` must not be empty")]
    MissingField(&'static str),
    #[error("`{domain}` is not a valid service domain")]
    InvalidDomain { domain: String },
    #[error("failed to read settings file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse settings file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Immutable session configuration for the consent service.
///
/// Invalid configurations never start an operation; [`CmpConfig::validate`]
/// is checked once when the engine is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmpConfig {
    /// Service id from the CMP dashboard (the `cdid` URL parameter).
    pub id: String,
    /// Service domain, e.g. `delivery.consentmanager.net`.
    pub domain: String,
    /// Language code for the consent layer, e.g. `EN`, `DE`.
    pub language: String,
    /// Application name for identification (`appname`).
    pub app_name: String,
    /// Bundle/package identifier of the embedding app (`appid`).
    pub app_id: String,
    /// Raw JSON sub-config forwarded to the page's `initCMP` hook.
    pub json_config: Option<String>,
    /// Suppress the `#cmpimport` hash fragment on built URLs.
    pub no_hash: bool,
    /// Append `cmpdebug` to built URLs.
    pub debug: bool,
    /// Append `tvsdk=1` to built URLs.
    pub tv_platform: bool,
}

impl CmpConfig {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        domain: impl Into<String>,
        language: impl Into<String>,
        app_name: impl Into<String>,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            domain: domain.into(),
            language: language.into(),
            app_name: app_name.into(),
            app_id: app_id.into(),
            json_config: None,
            no_hash: false,
            debug: false,
            tv_platform: false,
        }
    }

    #[must_use]
    pub fn with_json_config(mut self, json_config: impl Into<String>) -> Self {
        self.json_config = Some(json_config.into());
        self
    }

    #[must_use]
    pub fn with_no_hash(mut self, no_hash: bool) -> Self {
        self.no_hash = no_hash;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn with_tv_platform(mut self, tv_platform: bool) -> Self {
        self.tv_platform = tv_platform;
        self
    }

    /// Check that every required field is present and the domain is a plain
    /// host name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("id", &self.id),
            ("domain", &self.domain),
            ("language", &self.language),
            ("app_name", &self.app_name),
            ("app_id", &self.app_id),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(field));
            }
        }

        let probe = format!("https://{}/", self.domain);
        let host_matches = Url::parse(&probe)
            .ok()
            .and_then(|url| url.host_str().map(|host| host == self.domain))
            .unwrap_or(false);
        if !host_matches {
            return Err(ConfigError::InvalidDomain {
                domain: self.domain.clone(),
            });
        }

        Ok(())
    }
}
