//! The closed set of protocol intents and their fixed wire semantics.
//!
//! Every use case carries three fixed properties: whether UI display is
//! expected, whether a consent payload is expected in return, and which
//! auto-accept/auto-reject flag (if any) accompanies it. The URL builder and
//! the operation coordinator both consume this table; neither re-encodes it.

/// Auto-choice flag a use case carries on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoChoice {
    /// No automatic choice; the user decides in the layer.
    None,
    /// `cmpautoaccept=1`
    AcceptAll,
    /// `cmpautoreject`
    RejectAll,
}

/// High-level protocol intent for one exchange with the consent service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseCase {
    /// Initial check; opens the consent layer only if the service asks for it.
    VerifyConsentOnInitialize,
    /// Force the consent layer open.
    OpenConsent,
    /// Check consent status only.
    CheckConsent,
    /// Dry check without cookies.
    PerformDryCheckConsent,
    /// Dry check against the service-side cache.
    PerformDryCheckWithCache,
    /// Import a previously exported consent string.
    ImportConsent,
    /// Enable specific purposes.
    EnableConsentPurposes,
    /// Disable specific purposes.
    DisableConsentPurposes,
    /// Enable specific vendors.
    EnableConsentVendors,
    /// Disable specific vendors.
    DisableConsentVendors,
    /// Accept everything.
    AcceptAllConsent,
    /// Reject everything.
    RejectAllConsent,
    /// Reset consent settings.
    ResetConsentSettings,
}

impl UseCase {
    /// Stable lowercase name used in logs and event payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            UseCase::VerifyConsentOnInitialize => "verify_consent_on_initialize",
            UseCase::OpenConsent => "open_consent",
            UseCase::CheckConsent => "check_consent",
            UseCase::PerformDryCheckConsent => "perform_dry_check_consent",
            UseCase::PerformDryCheckWithCache => "perform_dry_check_with_cache",
            UseCase::ImportConsent => "import_consent",
            UseCase::EnableConsentPurposes => "enable_consent_purposes",
            UseCase::DisableConsentPurposes => "disable_consent_purposes",
            UseCase::EnableConsentVendors => "enable_consent_vendors",
            UseCase::DisableConsentVendors => "disable_consent_vendors",
            UseCase::AcceptAllConsent => "accept_all_consent",
            UseCase::RejectAllConsent => "reject_all_consent",
            UseCase::ResetConsentSettings => "reset_consent_settings",
        }
    }

    /// The auto-choice flag this intent carries on the wire.
    #[must_use]
    pub fn auto_choice(self) -> AutoChoice {
        match self {
            UseCase::EnableConsentPurposes
            | UseCase::EnableConsentVendors
            | UseCase::AcceptAllConsent => AutoChoice::AcceptAll,
            UseCase::DisableConsentPurposes
            | UseCase::DisableConsentVendors
            | UseCase::RejectAllConsent => AutoChoice::RejectAll,
            _ => AutoChoice::None,
        }
    }

    /// Dry checks complete without showing UI and without touching cookies.
    #[must_use]
    pub fn is_dry_check(self) -> bool {
        matches!(
            self,
            UseCase::PerformDryCheckConsent | UseCase::PerformDryCheckWithCache
        )
    }

    /// Whether the request must carry `cmpskipcookies=1`.
    #[must_use]
    pub fn skips_cookies(self) -> bool {
        self.is_dry_check() || self == UseCase::ImportConsent
    }

    /// The verify/check family: an `open` signal alone satisfies the
    /// exchange, no consent payload needs to follow.
    #[must_use]
    pub fn resolves_on_open(self) -> bool {
        matches!(
            self,
            UseCase::VerifyConsentOnInitialize
                | UseCase::CheckConsent
                | UseCase::PerformDryCheckConsent
        )
    }

    /// Whether the request forces the layer open (`cmpscreen`).
    #[must_use]
    pub fn forces_layer(self) -> bool {
        matches!(
            self,
            UseCase::OpenConsent
                | UseCase::EnableConsentPurposes
                | UseCase::DisableConsentPurposes
                | UseCase::EnableConsentVendors
                | UseCase::DisableConsentVendors
                | UseCase::AcceptAllConsent
                | UseCase::RejectAllConsent
        )
    }

    /// Whether the intent may put UI on screen at all.
    #[must_use]
    pub fn expects_ui(self) -> bool {
        !matches!(
            self,
            UseCase::PerformDryCheckConsent
                | UseCase::PerformDryCheckWithCache
                | UseCase::ImportConsent
                | UseCase::ResetConsentSettings
        )
    }
}

impl std::fmt::Display for UseCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [UseCase; 13] = [
        UseCase::VerifyConsentOnInitialize,
        UseCase::OpenConsent,
        UseCase::CheckConsent,
        UseCase::PerformDryCheckConsent,
        UseCase::PerformDryCheckWithCache,
        UseCase::ImportConsent,
        UseCase::EnableConsentPurposes,
        UseCase::DisableConsentPurposes,
        UseCase::EnableConsentVendors,
        UseCase::DisableConsentVendors,
        UseCase::AcceptAllConsent,
        UseCase::RejectAllConsent,
        UseCase::ResetConsentSettings,
    ];

    #[test]
    fn auto_choice_matches_wire_table() {
        assert_eq!(UseCase::AcceptAllConsent.auto_choice(), AutoChoice::AcceptAll);
        assert_eq!(UseCase::RejectAllConsent.auto_choice(), AutoChoice::RejectAll);
        assert_eq!(
            UseCase::EnableConsentVendors.auto_choice(),
            AutoChoice::AcceptAll
        );
        assert_eq!(
            UseCase::DisableConsentPurposes.auto_choice(),
            AutoChoice::RejectAll
        );
        assert_eq!(UseCase::OpenConsent.auto_choice(), AutoChoice::None);
        assert_eq!(UseCase::ImportConsent.auto_choice(), AutoChoice::None);
    }

    #[test]
    fn only_the_verify_check_family_resolves_on_open() {
        let family: Vec<UseCase> = ALL.iter().copied().filter(|u| u.resolves_on_open()).collect();
        assert_eq!(
            family,
            vec![
                UseCase::VerifyConsentOnInitialize,
                UseCase::CheckConsent,
                UseCase::PerformDryCheckConsent,
            ]
        );
    }

    #[test]
    fn cookie_skipping_covers_dry_checks_and_import() {
        for use_case in ALL {
            let expected = matches!(
                use_case,
                UseCase::PerformDryCheckConsent
                    | UseCase::PerformDryCheckWithCache
                    | UseCase::ImportConsent
            );
            assert_eq!(use_case.skips_cookies(), expected, "{use_case}");
        }
    }

    #[test]
    fn silent_use_cases_expect_no_ui() {
        assert!(!UseCase::PerformDryCheckConsent.expects_ui());
        assert!(!UseCase::ImportConsent.expects_ui());
        assert!(!UseCase::ResetConsentSettings.expects_ui());
        assert!(UseCase::OpenConsent.expects_ui());
        assert!(UseCase::AcceptAllConsent.expects_ui());
    }
}
