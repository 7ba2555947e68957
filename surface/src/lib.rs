//! Web surface contract and message bridge.
//!
//! The embedding host owns the actual page host (a webview or similar); the
//! engine drives it through [`WebSurface`] and receives everything back -
//! bridge messages, load errors, page lifecycle - as [`SurfaceSignal`]s
//! pushed into a [`SignalSink`]. The [`bridge`] module turns raw message text
//! into typed events; [`script`] holds the JavaScript injected into every
//! loaded page.

pub mod bridge;
pub mod script;

use thiserror::Error;
use tokio::sync::mpsc;

use cmpflow_types::Margins;

#[derive(Debug, Error)]
#[error("web surface error: {message}")]
pub struct SurfaceError {
    message: String,
}

impl SurfaceError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Embeddable page host, exclusively owned by the operation coordinator.
///
/// Calls are fire-and-forget towards the host's UI machinery; results and
/// page traffic come back asynchronously through the [`SignalSink`].
pub trait WebSurface: Send + Sync {
    /// Navigate the surface to `url`.
    fn load(&self, url: &str) -> Result<(), SurfaceError>;

    /// Evaluate JavaScript in the current page context.
    fn evaluate_script(&self, script: &str) -> Result<(), SurfaceError>;

    /// Show or hide the surface.
    fn set_visible(&self, visible: bool) -> Result<(), SurfaceError>;

    /// Position the surface within the host window.
    fn set_margins(&self, margins: Margins) -> Result<(), SurfaceError>;
}

/// One callback from the web surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceSignal {
    /// Raw text posted by the injected bridge script.
    Message(String),
    /// Load/navigation failure reported by the surface.
    LoadError(String),
    /// HTTP-level failure reported by the surface.
    HttpError(String),
    /// Navigation started.
    PageStarted(String),
    /// Page finished loading; the engine injects the bridge script now.
    PageLoaded(String),
}

/// The single callback channel from the host into the engine.
///
/// Clone it into every webview callback; sends after engine teardown are
/// silently dropped.
#[derive(Debug, Clone)]
pub struct SignalSink {
    tx: mpsc::UnboundedSender<SurfaceSignal>,
}

impl SignalSink {
    /// Create a sink and the receiving end the coordinator listens on.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SurfaceSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, signal: SurfaceSignal) {
        if self.tx.send(signal).is_err() {
            tracing::debug!("surface signal dropped, engine is gone");
        }
    }

    pub fn message(&self, text: impl Into<String>) {
        self.emit(SurfaceSignal::Message(text.into()));
    }

    pub fn load_error(&self, error: impl Into<String>) {
        self.emit(SurfaceSignal::LoadError(error.into()));
    }

    pub fn http_error(&self, error: impl Into<String>) {
        self.emit(SurfaceSignal::HttpError(error.into()));
    }

    pub fn page_started(&self, url: impl Into<String>) {
        self.emit(SurfaceSignal::PageStarted(url.into()));
    }

    pub fn page_loaded(&self, url: impl Into<String>) {
        self.emit(SurfaceSignal::PageLoaded(url.into()));
    }
}
