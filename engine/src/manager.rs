//! Dependency-injected service façade.
//!
//! One [`CmpManager`] owns one coordinator task. Construction is explicit:
//! the host builds the configuration, picks a storage and a web surface, and
//! keeps the manager alive for as long as it wants the engine. Dropping the
//! manager (or calling [`CmpManager::shutdown`]) tears the coordinator down,
//! cancelling any live timer and failing any suspended caller.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::GeneralPurpose;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use cmpflow_config::CmpConfig;
use cmpflow_consent::{ConsentStorage, StorageError};
use cmpflow_surface::{SignalSink, WebSurface};
use cmpflow_types::{
    CmpError, ConsentStatus, DisplayOptions, FlexibleValue, OperationOutcome, OperationRequest,
    PresentationConfig, UserStatus,
};

use crate::DEFAULT_OPERATION_TIMEOUT;
use crate::coordinator::{Command, Coordinator, load_model};
use crate::events::{CmpEvent, EventBus};

/// Tunables for one engine instance.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Deadline for one protocol exchange.
    pub operation_timeout: Duration,
    /// Buffered events per subscriber before old events are dropped.
    pub event_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            event_capacity: 16,
        }
    }
}

/// Handle to a running consent engine.
pub struct CmpManager {
    commands: mpsc::UnboundedSender<Command>,
    storage: Arc<dyn ConsentStorage>,
    events: EventBus,
    sink: SignalSink,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for CmpManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmpManager")
            .field("commands", &self.commands)
            .field("events", &self.events)
            .field("sink", &self.sink)
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}

impl CmpManager {
    /// Validate the configuration and spawn the coordinator task.
    ///
    /// An invalid configuration is fatal at the call site: nothing is
    /// spawned and no operation ever starts.
    pub fn spawn(
        config: CmpConfig,
        presentation: PresentationConfig,
        storage: Arc<dyn ConsentStorage>,
        surface: Arc<dyn WebSurface>,
    ) -> Result<Self, CmpError> {
        Self::spawn_with_options(config, presentation, storage, surface, EngineOptions::default())
    }

    pub fn spawn_with_options(
        config: CmpConfig,
        presentation: PresentationConfig,
        storage: Arc<dyn ConsentStorage>,
        surface: Arc<dyn WebSurface>,
        options: EngineOptions,
    ) -> Result<Self, CmpError> {
        config
            .validate()
            .map_err(|error| CmpError::Configuration(error.to_string()))?;

        let events = EventBus::new(options.event_capacity);
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (sink, signals_rx) = SignalSink::channel();

        let coordinator = Coordinator::new(
            config,
            presentation,
            options.operation_timeout,
            Arc::clone(&storage),
            surface,
            events.clone(),
            commands_rx,
            signals_rx,
        );
        let task = tokio::spawn(coordinator.run());
        tracing::debug!("consent engine started");

        Ok(Self {
            commands,
            storage,
            events,
            sink,
            task,
        })
    }

    // ------------------------------------------------------------------
    // Protocol operations
    // ------------------------------------------------------------------

    /// Run any prepared request through the coordinator.
    pub async fn start_operation(
        &self,
        request: OperationRequest,
    ) -> Result<OperationOutcome, CmpError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Start { request, reply })
            .map_err(|_| CmpError::Cancelled)?;
        response.await.map_err(|_| CmpError::Cancelled)?
    }

    /// Check consent status and open the layer only if the service asks.
    pub async fn check_and_open(
        &self,
        jump_to_settings: bool,
    ) -> Result<OperationOutcome, CmpError> {
        self.start_operation(OperationRequest::verify_on_initialize(DisplayOptions {
            jump_to_settings,
            design_id: None,
        }))
        .await
    }

    /// Force the consent layer open.
    pub async fn force_open(&self, jump_to_settings: bool) -> Result<OperationOutcome, CmpError> {
        self.start_operation(OperationRequest::open(DisplayOptions {
            jump_to_settings,
            design_id: None,
        }))
        .await
    }

    /// Check consent status only.
    pub async fn check(&self, jump_to_settings: bool) -> Result<OperationOutcome, CmpError> {
        self.start_operation(OperationRequest::check(DisplayOptions {
            jump_to_settings,
            design_id: None,
        }))
        .await
    }

    /// Dry check without cookies.
    pub async fn dry_check(&self) -> Result<OperationOutcome, CmpError> {
        self.start_operation(OperationRequest::dry_check()).await
    }

    /// Dry check against the service-side cache.
    pub async fn dry_check_cached(&self) -> Result<OperationOutcome, CmpError> {
        self.start_operation(OperationRequest::dry_check_cached())
            .await
    }

    pub async fn accept_all(&self) -> Result<OperationOutcome, CmpError> {
        self.start_operation(OperationRequest::accept_all()).await
    }

    pub async fn reject_all(&self) -> Result<OperationOutcome, CmpError> {
        self.start_operation(OperationRequest::reject_all()).await
    }

    pub async fn accept_vendors(
        &self,
        vendors: Vec<String>,
    ) -> Result<OperationOutcome, CmpError> {
        let request = OperationRequest::enable_vendors(vendors)
            .map_err(|error| CmpError::Configuration(error.to_string()))?;
        self.start_operation(request).await
    }

    pub async fn reject_vendors(
        &self,
        vendors: Vec<String>,
    ) -> Result<OperationOutcome, CmpError> {
        let request = OperationRequest::disable_vendors(vendors)
            .map_err(|error| CmpError::Configuration(error.to_string()))?;
        self.start_operation(request).await
    }

    pub async fn accept_purposes(
        &self,
        purposes: Vec<String>,
        update_vendors: bool,
    ) -> Result<OperationOutcome, CmpError> {
        let request = OperationRequest::enable_purposes(purposes, update_vendors)
            .map_err(|error| CmpError::Configuration(error.to_string()))?;
        self.start_operation(request).await
    }

    pub async fn reject_purposes(
        &self,
        purposes: Vec<String>,
        update_vendors: bool,
    ) -> Result<OperationOutcome, CmpError> {
        let request = OperationRequest::disable_purposes(purposes, update_vendors)
            .map_err(|error| CmpError::Configuration(error.to_string()))?;
        self.start_operation(request).await
    }

    /// Import a previously exported consent string.
    ///
    /// The payload travels to the page via script injection; a string that
    /// is not plausible base64 is rejected before any exchange starts.
    pub async fn import_consent(
        &self,
        consent: impl Into<String>,
    ) -> Result<OperationOutcome, CmpError> {
        let consent = consent.into();
        if !is_plausible_base64(&consent) {
            return Err(CmpError::InvalidImport);
        }
        let request =
            OperationRequest::import(consent).map_err(|_| CmpError::InvalidImport)?;
        self.start_operation(request).await
    }

    /// Cancel the in-flight exchange, if any.
    pub fn cancel(&self) {
        let _ = self.commands.send(Command::Cancel);
    }

    /// Set the App Tracking Transparency status used on built URLs.
    /// Rejected while an operation is loading.
    pub async fn set_att_status(&self, status: u8) -> Result<(), CmpError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::SetAttStatus { status, reply })
            .map_err(|_| CmpError::Cancelled)?;
        response.await.map_err(|_| CmpError::Cancelled)?
    }

    /// Swap the presentation config. Rejected while an operation is loading.
    pub async fn update_presentation(
        &self,
        presentation: PresentationConfig,
    ) -> Result<(), CmpError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::SetPresentation {
                presentation,
                reply,
            })
            .map_err(|_| CmpError::Cancelled)?;
        response.await.map_err(|_| CmpError::Cancelled)?
    }

    /// Stop the coordinator and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        let _ = self.task.await;
    }

    // ------------------------------------------------------------------
    // Offline-first snapshot queries (no round trip)
    // ------------------------------------------------------------------

    #[must_use]
    pub fn status_for_purpose(&self, id: &str) -> ConsentStatus {
        load_model(&self.storage)
            .map_or(ConsentStatus::ChoiceDoesntExist, |model| {
                model.status_for_purpose(id)
            })
    }

    #[must_use]
    pub fn status_for_vendor(&self, id: &str) -> ConsentStatus {
        load_model(&self.storage)
            .map_or(ConsentStatus::ChoiceDoesntExist, |model| {
                model.status_for_vendor(id)
            })
    }

    /// Aggregate status over every vendor and purpose the snapshot knows.
    #[must_use]
    pub fn user_status(&self) -> UserStatus {
        load_model(&self.storage)
            .map(|model| model.user_status())
            .unwrap_or_default()
    }

    /// Google Consent Mode signals; the four baseline keys are always
    /// present, denied by default.
    #[must_use]
    pub fn google_consent_mode(&self) -> BTreeMap<String, String> {
        load_model(&self.storage)
            .unwrap_or_default()
            .google_consent_mode()
    }

    /// The exported base64 consent string, or empty if none was acquired.
    #[must_use]
    pub fn export_cmp_info(&self) -> String {
        load_model(&self.storage)
            .map(|model| model.export_cmp_info())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_user_choice(&self) -> bool {
        load_model(&self.storage).is_some_and(|model| model.has_user_choice())
    }

    /// Look up one stored metadata value by key.
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<FlexibleValue> {
        match self.storage.metadata_value(key) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(%error, key, "failed to read metadata value");
                None
            }
        }
    }

    /// Wipe the stored consent data. Local only; the service-side
    /// `ResetConsentSettings` exchange is available via
    /// [`Self::start_operation`].
    pub fn reset_consent_data(&self) -> Result<(), StorageError> {
        self.storage.reset()
    }

    // ------------------------------------------------------------------
    // Wiring
    // ------------------------------------------------------------------

    /// Register an observer. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CmpEvent> {
        self.events.subscribe()
    }

    /// The callback channel to wire into the host's webview.
    #[must_use]
    pub fn signal_sink(&self) -> SignalSink {
        self.sink.clone()
    }
}

const BASE64_ENGINES: [GeneralPurpose; 4] =
    [STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD];

fn is_plausible_base64(payload: &str) -> bool {
    let trimmed = payload.trim();
    !trimmed.is_empty()
        && BASE64_ENGINES
            .iter()
            .any(|engine| engine.decode(trimmed).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_shapes_are_recognized() {
        assert!(is_plausible_base64("Q0FCQQ=="));
        assert!(is_plausible_base64("Q0FCQQ"));
        assert!(is_plausible_base64("  Q0FCQQ==  "));
        assert!(!is_plausible_base64(""));
        assert!(!is_plausible_base64("not base64 at all!"));
    }
}
