//! Consent-acquisition protocol engine.
//!
//! # Architecture
//!
//! The engine drives one protocol exchange at a time against the remote
//! consent service, through a host-owned web surface:
//!
//! - [`url`] - pure, deterministic request URL construction per use case
//! - [`CmpEvent`] - passive event stream for observers
//! - [`CmpManager`] - dependency-injected service facade; spawns the
//!   operation coordinator task and exposes protocol operations plus
//!   offline-first snapshot queries
//!
//! A caller issues an intent, the coordinator builds the URL (carrying the
//! exported string of the latest snapshot for state continuity), loads it
//! into the surface, and suspends the caller until exactly one of three
//! signals arrives: a bridge message, an adapter-level error, or deadline
//! expiry. The first completing signal wins; later ones never re-resolve the
//! exchange. On success the new snapshot atomically supersedes the stored
//! one.

mod coordinator;
mod events;
mod manager;
pub mod url;

pub use events::CmpEvent;
pub use manager::{CmpManager, EngineOptions};

pub use cmpflow_config;
pub use cmpflow_consent;
pub use cmpflow_surface;
pub use cmpflow_types;

use std::time::Duration;

/// SDK version reported to the service (`sdkversion`).
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Platform identifier reported to the service (`cmpplatform`).
pub const PLATFORM: &str = "Rust";

/// API path of the consent delivery endpoint.
pub const API_PATH: &str = "/delivery/appsdk/v3/";

/// Deadline for one protocol exchange unless overridden via
/// [`EngineOptions`].
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);
