//! End-to-end exchanges against a scripted mock surface.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cmpflow_config::CmpConfig;
use cmpflow_consent::{ConsentStorage, MemoryStore, StoredSnapshot};
use cmpflow_engine::{CmpEvent, CmpManager};
use cmpflow_surface::{SurfaceError, WebSurface};
use cmpflow_types::{
    CmpError, ConsentStatus, Margins, OperationOutcome, PresentationConfig,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum SurfaceCall {
    Load(String),
    Script(String),
    Visible(bool),
    Margins(Margins),
}

#[derive(Default)]
struct MockSurface {
    calls: Mutex<Vec<SurfaceCall>>,
    refuse_loads: std::sync::atomic::AtomicBool,
}

impl MockSurface {
    fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().unwrap().clone()
    }

    fn refuse_loads(&self) {
        self.refuse_loads
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    async fn wait_for_load(&self) -> String {
        for _ in 0..500 {
            let load = self.calls().into_iter().rev().find_map(|call| match call {
                SurfaceCall::Load(url) => Some(url),
                _ => None,
            });
            if let Some(url) = load {
                return url;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("surface never saw a load");
    }

    async fn wait_for_script(&self, needle: &str) -> String {
        for _ in 0..500 {
            let script = self.calls().into_iter().find_map(|call| match call {
                SurfaceCall::Script(js) if js.contains(needle) => Some(js),
                _ => None,
            });
            if let Some(js) = script {
                return js;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("surface never saw a script containing {needle:?}");
    }
}

impl WebSurface for MockSurface {
    fn load(&self, url: &str) -> Result<(), SurfaceError> {
        if self.refuse_loads.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(SurfaceError::new("load refused"));
        }
        self.calls
            .lock()
            .unwrap()
            .push(SurfaceCall::Load(url.to_string()));
        Ok(())
    }

    fn evaluate_script(&self, script: &str) -> Result<(), SurfaceError> {
        self.calls
            .lock()
            .unwrap()
            .push(SurfaceCall::Script(script.to_string()));
        Ok(())
    }

    fn set_visible(&self, visible: bool) -> Result<(), SurfaceError> {
        self.calls.lock().unwrap().push(SurfaceCall::Visible(visible));
        Ok(())
    }

    fn set_margins(&self, margins: Margins) -> Result<(), SurfaceError> {
        self.calls.lock().unwrap().push(SurfaceCall::Margins(margins));
        Ok(())
    }
}

fn test_config() -> CmpConfig {
    CmpConfig::new(
        "abc123",
        "delivery.consentmanager.net",
        "EN",
        "Demo App",
        "net.example.demo",
    )
}

struct Harness {
    manager: Arc<CmpManager>,
    surface: Arc<MockSurface>,
    storage: Arc<MemoryStore>,
}

fn harness() -> Harness {
    let surface = Arc::new(MockSurface::default());
    let storage = Arc::new(MemoryStore::new());
    let manager = CmpManager::spawn(
        test_config(),
        PresentationConfig::default(),
        storage.clone(),
        surface.clone(),
    )
    .expect("valid config spawns");
    Harness {
        manager: Arc::new(manager),
        surface,
        storage,
    }
}

fn consent_envelope(cmp_string: &str) -> String {
    serde_json::json!({
        "type": "consent",
        "data": {
            "cmpString": cmp_string,
            "consentstring": "CPzExampleTC",
            "regulationKey": "gdpr",
            "vendorConsents": {"s1": true, "s2": false},
            "purposeConsents": {"c1": true},
            "metadata": [
                {"name": "IABTCF_CmpSdkID", "type": "int", "value": 31}
            ]
        }
    })
    .to_string()
}

const OPEN_ENVELOPE: &str = r#"{"type":"open","data":{"opened":true}}"#;

fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<CmpEvent>) -> Vec<CmpEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn accept_all_runs_end_to_end() {
    let Harness {
        manager,
        surface,
        storage,
    } = harness();
    let mut events = manager.subscribe();
    let sink = manager.signal_sink();

    let op = tokio::spawn({
        let manager = manager.clone();
        async move { manager.accept_all().await }
    });

    let url = surface.wait_for_load().await;
    assert!(url.contains("&cmpautoaccept=1&cmpscreen"), "{url}");

    sink.page_loaded(url.as_str());
    surface.wait_for_script("cmpToSDK_sendStatus").await;

    sink.message(consent_envelope("B64NEW"));
    let outcome = op.await.unwrap().unwrap();
    assert_eq!(outcome, OperationOutcome::CompletedWithUi);

    // The snapshot superseded the previous one atomically.
    let snapshot = storage.load().unwrap().expect("snapshot persisted");
    assert_eq!(snapshot.consent_string, "B64NEW");
    assert_eq!(snapshot.metadata.len(), 1);

    // Offline-first queries answer from the snapshot without a round trip.
    assert_eq!(manager.status_for_vendor("s1"), ConsentStatus::Granted);
    assert_eq!(manager.status_for_vendor("S2"), ConsentStatus::Denied);
    assert_eq!(
        manager.status_for_vendor("s999"),
        ConsentStatus::ChoiceDoesntExist
    );
    assert_eq!(manager.export_cmp_info(), "B64NEW");
    assert!(manager.has_user_choice());

    // The layer was closed and observers heard about everything once.
    assert!(surface.calls().contains(&SurfaceCall::Visible(false)));
    let seen = drain_events(&mut events);
    assert!(seen.contains(&CmpEvent::ConsentReceived {
        consent_string: "B64NEW".into()
    }));
    assert!(seen.contains(&CmpEvent::LayerClosed));
}

#[tokio::test]
async fn open_signal_satisfies_the_check_family() {
    let Harness {
        manager, surface, ..
    } = harness();
    let mut events = manager.subscribe();
    let sink = manager.signal_sink();

    let op = tokio::spawn({
        let manager = manager.clone();
        async move { manager.check_and_open(false).await }
    });

    let url = surface.wait_for_load().await;
    assert!(!url.contains("cmpscreen"), "{url}");

    sink.message(OPEN_ENVELOPE);
    let outcome = op.await.unwrap().unwrap();
    assert_eq!(outcome, OperationOutcome::LayerOpened);

    assert!(surface.calls().contains(&SurfaceCall::Visible(true)));
    let seen = drain_events(&mut events);
    assert!(seen.contains(&CmpEvent::LayerOpened));
}

#[tokio::test]
async fn a_second_start_is_rejected_while_loading() {
    let Harness {
        manager, surface, ..
    } = harness();

    let op = tokio::spawn({
        let manager = manager.clone();
        async move { manager.accept_all().await }
    });
    surface.wait_for_load().await;

    let second = manager.check(false).await;
    assert_eq!(second, Err(CmpError::OperationInProgress));

    // Mutating session state mid-exchange is rejected too.
    assert_eq!(
        manager.set_att_status(2).await,
        Err(CmpError::OperationInProgress)
    );

    manager.cancel();
    assert_eq!(op.await.unwrap(), Err(CmpError::Cancelled));

    // Back to idle: configuration changes apply again.
    assert_eq!(manager.set_att_status(2).await, Ok(()));
}

#[tokio::test(start_paused = true)]
async fn no_signal_before_the_deadline_times_out_exactly_once() {
    let Harness {
        manager,
        surface,
        storage,
    } = harness();
    let sink = manager.signal_sink();

    let op = tokio::spawn({
        let manager = manager.clone();
        async move { manager.accept_all().await }
    });

    // No bridge signal ever arrives; the deadline fires.
    assert_eq!(op.await.unwrap(), Err(CmpError::Timeout));
    assert_eq!(surface.calls().iter().filter(|c| matches!(c, SurfaceCall::Load(_))).count(), 1);

    // A message arriving after resolution has no effect on the (gone)
    // pending result, but the snapshot still updates.
    sink.message(consent_envelope("LATE"));
    tokio::time::sleep(Duration::from_millis(5)).await;
    let snapshot = storage.load().unwrap().expect("late consent persisted");
    assert_eq!(snapshot.consent_string, "LATE");

    // And the engine is idle again.
    let op = tokio::spawn({
        let manager = manager.clone();
        async move { manager.accept_all().await }
    });
    tokio::time::sleep(Duration::from_millis(5)).await;
    sink.message(consent_envelope("NEXT"));
    assert_eq!(
        op.await.unwrap(),
        Ok(OperationOutcome::CompletedWithUi)
    );
}

#[tokio::test(start_paused = true)]
async fn open_stops_the_clock_for_interactive_exchanges() {
    let Harness {
        manager, surface, ..
    } = harness();
    let sink = manager.signal_sink();

    let op = tokio::spawn({
        let manager = manager.clone();
        async move { manager.force_open(false).await }
    });
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(
        surface
            .calls()
            .iter()
            .filter(|c| matches!(c, SurfaceCall::Load(_)))
            .count(),
        1
    );

    // The layer opens; the exchange keeps waiting for the payload with the
    // deadline disarmed while the user reads the layer.
    sink.message(OPEN_ENVELOPE);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!op.is_finished());

    sink.message(consent_envelope("AFTERWHILE"));
    assert_eq!(
        op.await.unwrap(),
        Ok(OperationOutcome::CompletedWithUi)
    );
}

#[tokio::test]
async fn import_injects_the_payload_before_the_load() {
    let Harness {
        manager, surface, ..
    } = harness();
    let sink = manager.signal_sink();

    let op = tokio::spawn({
        let manager = manager.clone();
        async move { manager.import_consent("Q0FCQQ==").await }
    });

    let url = surface.wait_for_load().await;
    assert!(url.contains("&cmpskipcookies=1&zt="), "{url}");
    // No consent value in the URL for the import flow.
    assert!(!url.contains('#'), "{url}");
    assert!(!url.contains("cmpimport"), "{url}");

    // Script injection happened strictly before the page load.
    let calls = surface.calls();
    let script_index = calls
        .iter()
        .position(|call| {
            matches!(call, SurfaceCall::Script(js) if js.contains("cmp_importconsent"))
        })
        .expect("import script injected");
    let load_index = calls
        .iter()
        .position(|call| matches!(call, SurfaceCall::Load(_)))
        .expect("load issued");
    assert!(script_index < load_index);

    sink.message(consent_envelope("IMPORTED"));
    assert_eq!(
        op.await.unwrap(),
        Ok(OperationOutcome::CompletedWithUi)
    );
}

#[tokio::test]
async fn garbage_import_payloads_never_start_an_exchange() {
    let Harness {
        manager, surface, ..
    } = harness();

    assert_eq!(
        manager.import_consent("not base64 at all!").await,
        Err(CmpError::InvalidImport)
    );
    assert!(surface.calls().is_empty());
}

#[tokio::test]
async fn the_exported_string_rides_along_for_continuity() {
    let surface = Arc::new(MockSurface::default());
    let storage = Arc::new(MemoryStore::new());
    storage
        .save(&StoredSnapshot::new(
            r#"{"cmpString":"PREVIOUS","consentstring":"CPzOld"}"#,
            "PREVIOUS",
            vec![],
        ))
        .unwrap();

    let manager = Arc::new(
        CmpManager::spawn(
            test_config(),
            PresentationConfig::default(),
            storage,
            surface.clone(),
        )
        .unwrap(),
    );

    let _op = tokio::spawn({
        let manager = manager.clone();
        async move { manager.force_open(false).await }
    });

    let url = surface.wait_for_load().await;
    let (_, fragment) = url.split_once('#').expect("hash fragment present");
    assert!(fragment.starts_with("cmpimport=PREVIOUS&zt="), "{fragment}");
}

#[tokio::test]
async fn dry_checks_complete_without_ui() {
    let Harness {
        manager, surface, ..
    } = harness();
    let sink = manager.signal_sink();

    let op = tokio::spawn({
        let manager = manager.clone();
        async move { manager.dry_check().await }
    });
    surface.wait_for_load().await;

    sink.message(consent_envelope("DRY"));
    assert_eq!(
        op.await.unwrap(),
        Ok(OperationOutcome::CompletedSilently)
    );
    // The layer was never hidden or shown for a dry check.
    assert!(
        !surface
            .calls()
            .iter()
            .any(|call| matches!(call, SurfaceCall::Visible(_)))
    );
}

#[tokio::test]
async fn malformed_bridge_traffic_fails_the_exchange() {
    let Harness {
        manager, surface, ..
    } = harness();
    let sink = manager.signal_sink();

    let op = tokio::spawn({
        let manager = manager.clone();
        async move { manager.accept_all().await }
    });
    surface.wait_for_load().await;

    sink.message("certainly not an envelope");
    match op.await.unwrap() {
        Err(CmpError::Protocol(message)) => {
            assert!(message.contains("not valid JSON"), "{message}");
        }
        other => panic!("expected a protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn surface_errors_fail_the_exchange() {
    let Harness {
        manager, surface, ..
    } = harness();
    let mut events = manager.subscribe();
    let sink = manager.signal_sink();

    let op = tokio::spawn({
        let manager = manager.clone();
        async move { manager.accept_all().await }
    });
    surface.wait_for_load().await;

    sink.load_error("net::ERR_NAME_NOT_RESOLVED");
    match op.await.unwrap() {
        Err(CmpError::Adapter(message)) => {
            assert_eq!(message, "net::ERR_NAME_NOT_RESOLVED");
        }
        other => panic!("expected an adapter error, got {other:?}"),
    }

    let seen = drain_events(&mut events);
    assert!(
        seen.iter()
            .any(|event| matches!(event, CmpEvent::Error { .. }))
    );
}

#[tokio::test]
async fn a_refused_load_fails_immediately() {
    let Harness {
        manager, surface, ..
    } = harness();
    surface.refuse_loads();

    match manager.accept_all().await {
        Err(CmpError::Adapter(message)) => {
            assert!(message.contains("load refused"), "{message}");
        }
        other => panic!("expected an adapter error, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_configuration_is_fatal_at_the_call_site() {
    let surface = Arc::new(MockSurface::default());
    let storage = Arc::new(MemoryStore::new());
    let mut config = test_config();
    config.id = String::new();

    match CmpManager::spawn(
        config,
        PresentationConfig::default(),
        storage,
        surface,
    ) {
        Err(CmpError::Configuration(message)) => {
            assert!(message.contains("id"), "{message}");
        }
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[tokio::test]
async fn google_consent_mode_has_a_denied_baseline() {
    let Harness { manager, .. } = harness();

    let signals = manager.google_consent_mode();
    assert_eq!(signals.len(), 4);
    for key in [
        "analytics_storage",
        "ad_storage",
        "ad_user_data",
        "ad_personalization",
    ] {
        assert_eq!(signals.get(key).map(String::as_str), Some("denied"), "{key}");
    }
}
