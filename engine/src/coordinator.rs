//! The operation coordinator: one in-flight protocol exchange at a time.
//!
//! A single task owns the web surface and arbitrates, via one `select!`
//! loop, between caller commands, surface signals, and deadline expiry. The
//! first completing signal wins; anything arriving after the pending result
//! resolved is discarded without error. A late consent payload still
//! supersedes the stored snapshot and reaches observers, it just never
//! re-resolves the exchange.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use cmpflow_config::CmpConfig;
use cmpflow_consent::{ConsentModel, ConsentStorage, StoredSnapshot};
use cmpflow_surface::bridge::{self, BridgeEvent};
use cmpflow_surface::script;
use cmpflow_surface::{SurfaceSignal, WebSurface};
use cmpflow_types::{
    CmpError, OperationOutcome, OperationRequest, PresentationConfig, UseCase,
};

use crate::events::{CmpEvent, EventBus};
use crate::url::{self, UrlRequest};

pub(crate) enum Command {
    Start {
        request: OperationRequest,
        reply: oneshot::Sender<Result<OperationOutcome, CmpError>>,
    },
    Cancel,
    SetAttStatus {
        status: u8,
        reply: oneshot::Sender<Result<(), CmpError>>,
    },
    SetPresentation {
        presentation: PresentationConfig,
        reply: oneshot::Sender<Result<(), CmpError>>,
    },
    Shutdown,
}

/// The single in-flight exchange. Exactly one resolution: `finish` consumes
/// the pending result and stops the deadline timer.
struct PendingOperation {
    id: Uuid,
    use_case: UseCase,
    reply: oneshot::Sender<Result<OperationOutcome, CmpError>>,
    timer: JoinHandle<()>,
    generation: u64,
}

impl PendingOperation {
    fn finish(self, result: Result<OperationOutcome, CmpError>) {
        self.timer.abort();
        let _ = self.reply.send(result);
    }
}

/// Load and parse the latest stored snapshot. Storage trouble degrades to
/// "no snapshot" so offline reads and URL continuity never hard-fail.
pub(crate) fn load_model(storage: &Arc<dyn ConsentStorage>) -> Option<ConsentModel> {
    match storage.load() {
        Ok(Some(snapshot)) if !snapshot.raw_json.is_empty() => {
            Some(ConsentModel::from_json(&snapshot.raw_json))
        }
        Ok(_) => None,
        Err(error) => {
            tracing::warn!(%error, "failed to load consent snapshot");
            None
        }
    }
}

pub(crate) struct Coordinator {
    config: CmpConfig,
    presentation: PresentationConfig,
    att_status: u8,
    timeout: Duration,
    storage: Arc<dyn ConsentStorage>,
    surface: Arc<dyn WebSurface>,
    events: EventBus,
    commands: mpsc::UnboundedReceiver<Command>,
    signals: mpsc::UnboundedReceiver<SurfaceSignal>,
    deadline_tx: mpsc::UnboundedSender<u64>,
    deadline_rx: mpsc::UnboundedReceiver<u64>,
    pending: Option<PendingOperation>,
    /// Use case of the most recent exchange; retained after resolution so a
    /// late consent payload still closes the layer correctly.
    active_use_case: Option<UseCase>,
    generation: u64,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: CmpConfig,
        presentation: PresentationConfig,
        timeout: Duration,
        storage: Arc<dyn ConsentStorage>,
        surface: Arc<dyn WebSurface>,
        events: EventBus,
        commands: mpsc::UnboundedReceiver<Command>,
        signals: mpsc::UnboundedReceiver<SurfaceSignal>,
    ) -> Self {
        let (deadline_tx, deadline_rx) = mpsc::unbounded_channel();
        Self {
            config,
            presentation,
            att_status: 0,
            timeout,
            storage,
            surface,
            events,
            commands,
            signals,
            deadline_tx,
            deadline_rx,
            pending: None,
            active_use_case: None,
            generation: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(signal) = self.signals.recv() => self.handle_signal(signal),
                Some(generation) = self.deadline_rx.recv() => self.handle_deadline(generation),
            }
        }
        self.teardown();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { request, reply } => self.start(request, reply),
            Command::Cancel => {
                if self.pending.is_some() {
                    self.fail_pending(CmpError::Cancelled);
                }
            }
            Command::SetAttStatus { status, reply } => {
                let result = if self.pending.is_some() {
                    Err(CmpError::OperationInProgress)
                } else {
                    self.att_status = status;
                    Ok(())
                };
                let _ = reply.send(result);
            }
            Command::SetPresentation {
                presentation,
                reply,
            } => {
                let result = if self.pending.is_some() {
                    Err(CmpError::OperationInProgress)
                } else {
                    self.presentation = presentation;
                    Ok(())
                };
                let _ = reply.send(result);
            }
            Command::Shutdown => {}
        }
    }

    fn start(
        &mut self,
        request: OperationRequest,
        reply: oneshot::Sender<Result<OperationOutcome, CmpError>>,
    ) {
        if self.pending.is_some() {
            let _ = reply.send(Err(CmpError::OperationInProgress));
            return;
        }

        let use_case = request.use_case();
        let id = Uuid::new_v4();
        let exported = load_model(&self.storage)
            .map(|model| model.export_cmp_info())
            .unwrap_or_default();

        let url = url::build(&UrlRequest {
            config: &self.config,
            dark_mode: self.presentation.dark_mode,
            att_status: self.att_status,
            use_case,
            params: request.params(),
            exported_consent: (!exported.is_empty()).then_some(exported.as_str()),
        });

        tracing::debug!(operation = %id, use_case = %use_case, "starting consent exchange");

        // The import payload is handed to the page before the load; URLs
        // have length and escaping limits the script channel does not.
        if let Some(payload) = request.import_payload() {
            let injection = script::consent_import_script(payload);
            if let Err(error) = self.surface.evaluate_script(&injection) {
                let message = format!("import injection failed: {error}");
                self.events.emit(CmpEvent::Error {
                    message: message.clone(),
                });
                let _ = reply.send(Err(CmpError::Adapter(message)));
                return;
            }
        }

        self.generation += 1;
        let generation = self.generation;
        let deadline_tx = self.deadline_tx.clone();
        let timeout = self.timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = deadline_tx.send(generation);
        });

        if let Err(error) = self.surface.load(&url) {
            timer.abort();
            let message = format!("page load failed: {error}");
            self.events.emit(CmpEvent::Error {
                message: message.clone(),
            });
            let _ = reply.send(Err(CmpError::Adapter(message)));
            return;
        }

        self.active_use_case = Some(use_case);
        self.pending = Some(PendingOperation {
            id,
            use_case,
            reply,
            timer,
            generation,
        });
    }

    fn handle_signal(&mut self, signal: SurfaceSignal) {
        match signal {
            SurfaceSignal::Message(text) => match bridge::parse_message(&text) {
                Some(BridgeEvent::ConsentReceived {
                    consent_string,
                    payload,
                }) => self.on_consent(consent_string, payload),
                Some(BridgeEvent::OpenReceived) => self.on_open(),
                Some(BridgeEvent::ErrorReceived { message }) => {
                    self.fail_pending(CmpError::Adapter(message));
                }
                Some(BridgeEvent::ProtocolViolation { message }) => {
                    self.fail_pending(CmpError::Protocol(message));
                }
                None => {}
            },
            SurfaceSignal::LoadError(error) => {
                self.fail_pending(CmpError::Adapter(error));
            }
            SurfaceSignal::HttpError(error) => {
                self.fail_pending(CmpError::Adapter(format!("http error: {error}")));
            }
            SurfaceSignal::PageStarted(url) => {
                tracing::debug!(url, "page started");
            }
            SurfaceSignal::PageLoaded(url) => self.on_page_loaded(&url),
        }
    }

    fn on_page_loaded(&mut self, url: &str) {
        tracing::debug!(url, "page loaded, injecting bridge");
        if let Err(error) = self.surface.evaluate_script(script::BRIDGE_BOOTSTRAP) {
            self.fail_pending(CmpError::Adapter(format!(
                "bridge injection failed: {error}"
            )));
            return;
        }
        if self.config.json_config.is_some() {
            let init = script::init_cmp_script(self.config.json_config.as_deref());
            if let Err(error) = self.surface.evaluate_script(&init) {
                tracing::warn!(%error, "initCMP injection failed");
            }
        }
    }

    fn on_consent(&mut self, consent_string: String, payload: serde_json::Value) {
        // Only a successfully parsed payload may supersede the snapshot, and
        // it does so whole - never partially.
        match serde_json::from_value::<ConsentModel>(payload.clone()) {
            Ok(model) => {
                let snapshot = StoredSnapshot::new(
                    payload.to_string(),
                    consent_string.clone(),
                    model.metadata.unwrap_or_default(),
                );
                if let Err(error) = self.storage.save(&snapshot) {
                    tracing::error!(%error, "failed to persist consent snapshot");
                    self.events.emit(CmpEvent::Error {
                        message: format!("failed to persist consent snapshot: {error}"),
                    });
                }
            }
            Err(error) => {
                tracing::warn!(%error, "consent payload did not parse, keeping previous snapshot");
                self.events.emit(CmpEvent::Error {
                    message: format!("consent payload did not parse: {error}"),
                });
            }
        }

        self.events.emit(CmpEvent::ConsentReceived { consent_string });

        let use_case = self
            .pending
            .as_ref()
            .map(|pending| pending.use_case)
            .or(self.active_use_case);

        if let Some(pending) = self.pending.take() {
            let outcome = if pending.use_case.is_dry_check() {
                OperationOutcome::CompletedSilently
            } else {
                OperationOutcome::CompletedWithUi
            };
            tracing::debug!(operation = %pending.id, ?outcome, "consent exchange resolved");
            pending.finish(Ok(outcome));
        } else {
            tracing::debug!("consent payload arrived outside an exchange");
        }

        if use_case.is_some_and(|use_case| !use_case.is_dry_check()) {
            self.hide_layer();
        }
    }

    fn on_open(&mut self) {
        match self.pending.take() {
            Some(pending) if pending.use_case.resolves_on_open() => {
                tracing::debug!(operation = %pending.id, "open signal satisfied the exchange");
                pending.finish(Ok(OperationOutcome::LayerOpened));
            }
            Some(pending) => {
                // The exchange still awaits a consent payload; stop the
                // clock while the user interacts with the layer.
                pending.timer.abort();
                self.pending = Some(pending);
            }
            None => {}
        }
        self.show_layer();
    }

    fn handle_deadline(&mut self, generation: u64) {
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.generation == generation)
        {
            self.fail_pending(CmpError::Timeout);
        } else {
            tracing::debug!(generation, "stale deadline ignored");
        }
    }

    /// Fail the pending result (if any) and mirror the failure to observers.
    fn fail_pending(&mut self, error: CmpError) {
        self.events.emit(CmpEvent::Error {
            message: error.to_string(),
        });
        if let Some(pending) = self.pending.take() {
            tracing::warn!(operation = %pending.id, %error, "consent exchange failed");
            pending.finish(Err(error));
        }
    }

    fn show_layer(&self) {
        if let Err(error) = self.surface.set_visible(true) {
            tracing::warn!(%error, "failed to show consent layer");
        }
        self.events.emit(CmpEvent::LayerOpened);
    }

    fn hide_layer(&self) {
        if let Err(error) = self.surface.set_visible(false) {
            tracing::warn!(%error, "failed to hide consent layer");
        }
        self.events.emit(CmpEvent::LayerClosed);
    }

    /// Teardown must never leave a timer alive or a caller suspended.
    fn teardown(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::debug!(operation = %pending.id, "engine teardown cancelled the exchange");
            pending.finish(Err(CmpError::Cancelled));
        }
    }
}
