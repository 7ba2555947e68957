//! Deterministic request URL construction.
//!
//! `Build` is a pure function of the configuration, the presentation flags,
//! and the request; the only nondeterminism is the `zt` cache-busting token
//! (wall clock + 4-digit nonce). Parameter names and their order are a fixed
//! wire contract with the consent service.

use chrono::Local;
use rand::RngExt;

use cmpflow_config::CmpConfig;
use cmpflow_types::{AutoChoice, DisplayOptions, RequestParams, UseCase};

use crate::{API_PATH, PLATFORM, SDK_VERSION};

/// Everything one URL is built from.
#[derive(Debug, Clone, Copy)]
pub struct UrlRequest<'a> {
    pub config: &'a CmpConfig,
    /// Current dark-mode flag from the presentation config.
    pub dark_mode: bool,
    /// Current App Tracking Transparency status (0 when unknown).
    pub att_status: u8,
    pub use_case: UseCase,
    pub params: &'a RequestParams,
    /// Exported consent string of the latest snapshot, for state continuity.
    pub exported_consent: Option<&'a str>,
}

/// Build the request URL for one exchange.
#[must_use]
pub fn build(request: &UrlRequest<'_>) -> String {
    let config = request.config;

    let mut url = format!(
        "https://{}{}?cdid={}",
        config.domain,
        API_PATH,
        escape(&config.id)
    );

    append_common(&mut url, request);
    append_use_case(&mut url, request);

    // The import payload travels via script injection, never via the URL.
    let consent = request.exported_consent.unwrap_or_default();
    if !consent.is_empty() && !config.no_hash && request.use_case != UseCase::ImportConsent {
        url.push_str("#cmpimport=");
        url.push_str(&escape(consent));
        url.push_str("&zt=");
        url.push_str(&zt_token());
    }

    url
}

fn append_common(url: &mut String, request: &UrlRequest<'_>) {
    let config = request.config;

    if !config.app_name.is_empty() {
        let app_name = config.app_name.replace(' ', "-");
        url.push_str("&appname=");
        url.push_str(&escape(&app_name));
    }

    if !config.language.is_empty() {
        url.push_str("&cmplang=");
        url.push_str(&escape(&config.language));
    }

    if !config.app_id.is_empty() {
        url.push_str("&appid=");
        url.push_str(&escape(&config.app_id));
    }

    url.push_str("&sdkversion=");
    url.push_str(SDK_VERSION);

    url.push_str("&cmpplatform=");
    url.push_str(PLATFORM);

    url.push_str("&cmpatt=");
    url.push_str(&request.att_status.to_string());

    url.push_str("&cmpdarkmode=");
    url.push_str(if request.dark_mode { "1" } else { "0" });

    if config.debug {
        url.push_str("&cmpdebug");
    }

    if config.tv_platform {
        url.push_str("&tvsdk=1");
    }
}

fn append_use_case(url: &mut String, request: &UrlRequest<'_>) {
    match request.use_case {
        UseCase::VerifyConsentOnInitialize | UseCase::CheckConsent => {
            append_display(url, display_options(request.params));
        }
        UseCase::OpenConsent => {
            append_display(url, display_options(request.params));
            url.push_str("&cmpscreen");
        }
        UseCase::PerformDryCheckConsent | UseCase::PerformDryCheckWithCache => {
            url.push_str("&cmpskipcookies=1");
        }
        UseCase::ImportConsent => {
            url.push_str("&cmpskipcookies=1");
            url.push_str("&zt=");
            url.push_str(&zt_token());
        }
        UseCase::EnableConsentPurposes | UseCase::DisableConsentPurposes => {
            append_purposes(url, request);
        }
        UseCase::EnableConsentVendors | UseCase::DisableConsentVendors => {
            append_vendors(url, request);
        }
        UseCase::AcceptAllConsent | UseCase::RejectAllConsent => {
            append_auto_choice(url, request.use_case);
            url.push_str("&cmpscreen");
        }
        UseCase::ResetConsentSettings => {}
    }
}

fn append_display(url: &mut String, options: DisplayOptions) {
    if let Some(design_id) = options.design_id {
        url.push_str("&usedesign=");
        url.push_str(&design_id.to_string());
    }
    if options.jump_to_settings {
        url.push_str("&cmpscreencustom");
    }
}

fn append_purposes(url: &mut String, request: &UrlRequest<'_>) {
    let RequestParams::Purposes { ids, update_vendors } = request.params else {
        return;
    };

    if !ids.is_empty() {
        url.push_str("&cmpsetpurposes=");
        url.push_str(&ids.join("_"));
    }
    if !*update_vendors {
        url.push_str("&cmpdontfixpurposes");
    }
    append_auto_choice(url, request.use_case);
    url.push_str("&cmpscreen");
}

fn append_vendors(url: &mut String, request: &UrlRequest<'_>) {
    let RequestParams::Vendors { ids } = request.params else {
        return;
    };
    if ids.is_empty() {
        return;
    }

    url.push_str("&cmpsetvendors=");
    url.push_str(&ids.join("_"));
    append_auto_choice(url, request.use_case);
    url.push_str("&cmpscreen");
}

fn append_auto_choice(url: &mut String, use_case: UseCase) {
    match use_case.auto_choice() {
        AutoChoice::AcceptAll => url.push_str("&cmpautoaccept=1"),
        AutoChoice::RejectAll => url.push_str("&cmpautoreject"),
        AutoChoice::None => {}
    }
}

fn display_options(params: &RequestParams) -> DisplayOptions {
    match params {
        RequestParams::Display(options) => *options,
        _ => DisplayOptions::default(),
    }
}

fn escape(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Cache-busting token: `ddMMyyyyHHmmss` local timestamp plus a 4-digit
/// nonce.
fn zt_token() -> String {
    let timestamp = Local::now().format("%d%m%Y%H%M%S");
    let nonce: u16 = rand::rng().random_range(0..10_000);
    format!("{timestamp}{nonce:04}")
}
