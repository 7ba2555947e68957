//! Core domain types for cmpflow.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies. Everything here can be used from any layer of the SDK.

mod flexible;
mod presentation;
mod request;
mod status;
mod use_case;

pub use flexible::FlexibleValue;
pub use presentation::{BackgroundStyle, LayoutStyle, Margins, PresentationConfig};
pub use request::{DisplayOptions, OperationRequest, RequestError, RequestParams};
pub use status::{ConsentStatus, UserChoiceStatus, UserStatus};
pub use use_case::{AutoChoice, UseCase};

use thiserror::Error;

/// How a completed protocol exchange resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    /// A consent payload was received and the layer was (or had been) shown.
    CompletedWithUi,
    /// A consent payload was received without any UI being shown (dry checks).
    CompletedSilently,
    /// The surface requested the layer; the verify/check exchange needs no
    /// further payload.
    LayerOpened,
}

/// Operation-level errors surfaced to callers.
///
/// Every variant except [`CmpError::Configuration`] and
/// [`CmpError::InvalidImport`] can also be observed as a passive
/// error event by subscribers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CmpError {
    /// The configuration is invalid; the operation never started.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// The web surface reported a load or page failure.
    #[error("web surface failure: {0}")]
    Adapter(String),
    /// The web surface delivered a malformed or incomplete bridge message.
    #[error("protocol violation: {0}")]
    Protocol(String),
    /// No signal arrived before the operation deadline.
    #[error("operation timed out")]
    Timeout,
    /// The operation was cancelled, or the engine was torn down.
    #[error("operation cancelled")]
    Cancelled,
    /// A prior operation is still in flight.
    #[error("an operation is already in progress")]
    OperationInProgress,
    /// The import payload is not a plausible consent string.
    #[error("import payload is not valid base64")]
    InvalidImport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_is_stable() {
        assert_eq!(CmpError::Timeout.to_string(), "operation timed out");
        assert_eq!(
            CmpError::OperationInProgress.to_string(),
            "an operation is already in progress"
        );
        assert_eq!(
            CmpError::Adapter("net::ERR_FAILED".into()).to_string(),
            "web surface failure: net::ERR_FAILED"
        );
    }
}
