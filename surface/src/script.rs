//! JavaScript injected into the consent page.
//!
//! The page-side hook names (`cmpToSDK_sendStatus`,
//! `cmpToSDK_showConsentLayer`) are a fixed contract with the consent
//! service and must not be renamed. Each hook forwards a `{type, data}` JSON
//! envelope through `window.cmpflowNative.postMessage`; the host binds that
//! handler and feeds the text into [`crate::SignalSink::message`].

/// Bridge bootstrap, injected on every page load.
pub const BRIDGE_BOOTSTRAP: &str = r"
(function() {
    window.cmpToSDK_sendStatus = function(consent, jsonObject) {
        jsonObject.cmpString = consent;

        window.cmpflowNative.postMessage(JSON.stringify({
            type: 'consent',
            data: jsonObject
        }));
    };

    window.cmpToSDK_showConsentLayer = function() {
        window.cmpflowNative.postMessage(JSON.stringify({
            type: 'open',
            data: { opened: true }
        }));
    };

    window.onerror = function(message, source, lineno, colno, error) {
        window.cmpflowNative.postMessage(JSON.stringify({
            type: 'error',
            data: {
                message: message,
                source: source,
                lineno: lineno,
                colno: colno,
                error: error ? error.toString() : null
            }
        }));
    };
})();
";

/// `initCMP` invocation for hosts carrying a raw JSON sub-config.
#[must_use]
pub fn init_cmp_script(json_config: Option<&str>) -> String {
    match json_config {
        Some(config) if !config.trim().is_empty() => {
            format!("window.initCMP && window.initCMP({config});")
        }
        _ => "window.initCMP && window.initCMP();".to_string(),
    }
}

/// Pre-load injection carrying an import payload.
///
/// The payload travels via this script instead of the URL to dodge length
/// and escaping limits on URLs.
#[must_use]
pub fn consent_import_script(consent: &str) -> String {
    format!(
        "window.cmp_importconsent = '{}';",
        escape_single_quoted(consent)
    )
}

fn escape_single_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
