//! Runs one accept-all exchange against a scripted in-process surface.
//!
//! ```sh
//! cargo run -p cmpflow-engine --example consent_flow
//! ```

use std::sync::{Arc, OnceLock};

use cmpflow_config::CmpConfig;
use cmpflow_consent::MemoryStore;
use cmpflow_engine::CmpManager;
use cmpflow_surface::{SignalSink, SurfaceError, WebSurface};
use cmpflow_types::{Margins, PresentationConfig};

/// A surface that plays the remote consent page: every load immediately
/// reports back an accepted-everything payload.
#[derive(Default)]
struct ScriptedSurface {
    sink: OnceLock<SignalSink>,
}

impl ScriptedSurface {
    fn payload() -> String {
        serde_json::json!({
            "type": "consent",
            "data": {
                "cmpString": "Q0FCQdemo",
                "consentstring": "CPzDemoTCString",
                "regulationKey": "gdpr",
                "vendorConsents": {"s7": true, "s26": true},
                "purposeConsents": {"c1": true, "c2": true},
                "consentmode": {"ad_storage": "granted", "analytics_storage": "granted"},
                "metadata": [
                    {"name": "IABTCF_CmpSdkID", "type": "int", "value": 31}
                ]
            }
        })
        .to_string()
    }
}

impl WebSurface for ScriptedSurface {
    fn load(&self, url: &str) -> Result<(), SurfaceError> {
        tracing::info!(url, "surface loading consent page");
        if let Some(sink) = self.sink.get() {
            sink.page_started(url);
            sink.page_loaded(url);
            sink.message(Self::payload());
        }
        Ok(())
    }

    fn evaluate_script(&self, script: &str) -> Result<(), SurfaceError> {
        tracing::debug!(bytes = script.len(), "surface evaluating script");
        Ok(())
    }

    fn set_visible(&self, visible: bool) -> Result<(), SurfaceError> {
        tracing::info!(visible, "surface visibility changed");
        Ok(())
    }

    fn set_margins(&self, margins: Margins) -> Result<(), SurfaceError> {
        tracing::debug!(?margins, "surface margins changed");
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cmpflow_engine=debug".into()),
        )
        .init();

    let config = CmpConfig::new(
        "demo-cmp-id",
        "delivery.consentmanager.net",
        "EN",
        "cmpflow demo",
        "net.example.cmpflow-demo",
    );

    let surface = Arc::new(ScriptedSurface::default());
    let storage = Arc::new(MemoryStore::new());
    let manager = CmpManager::spawn(
        config,
        PresentationConfig::default().with_dark_mode(true),
        storage,
        surface.clone(),
    )
    .expect("demo config is valid");

    surface
        .sink
        .set(manager.signal_sink())
        .expect("sink set once");

    let mut events = manager.subscribe();

    match manager.accept_all().await {
        Ok(outcome) => tracing::info!(?outcome, "exchange resolved"),
        Err(error) => tracing::error!(%error, "exchange failed"),
    }

    while let Ok(event) = events.try_recv() {
        tracing::info!(?event, "observed");
    }

    tracing::info!(
        vendor_s7 = ?manager.status_for_vendor("s7"),
        purpose_c1 = ?manager.status_for_purpose("c1"),
        export = %manager.export_cmp_info(),
        "offline snapshot queries"
    );
    for (key, value) in manager.google_consent_mode() {
        tracing::info!(key = %key, value = %value, "google consent mode");
    }

    manager.shutdown().await;
}
