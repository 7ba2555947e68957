//! Typed operation requests.
//!
//! A request pairs a [`UseCase`] with the parameter bundle that use case
//! actually takes. Constructors are the only way to build one, so a
//! mismatched pairing (vendor ids on an accept-all, say) is unrepresentable.

use thiserror::Error;

use crate::use_case::UseCase;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("id list must not be empty")]
    EmptyIdList,
    #[error("import payload must not be empty")]
    EmptyImport,
}

/// Presentation hints for the check/open family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayOptions {
    /// Jump straight to the settings page of the layer (`cmpscreencustom`).
    pub jump_to_settings: bool,
    /// Service-side design override (`usedesign=<id>`).
    pub design_id: Option<u32>,
}

/// Use-case-specific parameter bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestParams {
    /// No parameters beyond the use case itself.
    None,
    /// Check/open family.
    Display(DisplayOptions),
    /// Consent string to import via script injection.
    Import { consent: String },
    /// Purpose id list plus whether vendor choices follow along.
    Purposes {
        ids: Vec<String>,
        update_vendors: bool,
    },
    /// Vendor id list.
    Vendors { ids: Vec<String> },
}

/// One protocol exchange, built fresh per call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    use_case: UseCase,
    params: RequestParams,
}

impl OperationRequest {
    /// Initial check; opens the layer only if the service asks for it.
    #[must_use]
    pub fn verify_on_initialize(options: DisplayOptions) -> Self {
        Self {
            use_case: UseCase::VerifyConsentOnInitialize,
            params: RequestParams::Display(options),
        }
    }

    /// Check consent status only.
    #[must_use]
    pub fn check(options: DisplayOptions) -> Self {
        Self {
            use_case: UseCase::CheckConsent,
            params: RequestParams::Display(options),
        }
    }

    /// Force the consent layer open.
    #[must_use]
    pub fn open(options: DisplayOptions) -> Self {
        Self {
            use_case: UseCase::OpenConsent,
            params: RequestParams::Display(options),
        }
    }

    /// Dry check without cookies.
    #[must_use]
    pub fn dry_check() -> Self {
        Self {
            use_case: UseCase::PerformDryCheckConsent,
            params: RequestParams::None,
        }
    }

    /// Dry check against the service-side cache.
    #[must_use]
    pub fn dry_check_cached() -> Self {
        Self {
            use_case: UseCase::PerformDryCheckWithCache,
            params: RequestParams::None,
        }
    }

    /// Import a previously exported consent string.
    pub fn import(consent: impl Into<String>) -> Result<Self, RequestError> {
        let consent = consent.into();
        if consent.trim().is_empty() {
            return Err(RequestError::EmptyImport);
        }
        Ok(Self {
            use_case: UseCase::ImportConsent,
            params: RequestParams::Import { consent },
        })
    }

    pub fn enable_purposes(
        ids: Vec<String>,
        update_vendors: bool,
    ) -> Result<Self, RequestError> {
        Self::purposes(UseCase::EnableConsentPurposes, ids, update_vendors)
    }

    pub fn disable_purposes(
        ids: Vec<String>,
        update_vendors: bool,
    ) -> Result<Self, RequestError> {
        Self::purposes(UseCase::DisableConsentPurposes, ids, update_vendors)
    }

    pub fn enable_vendors(ids: Vec<String>) -> Result<Self, RequestError> {
        Self::vendors(UseCase::EnableConsentVendors, ids)
    }

    pub fn disable_vendors(ids: Vec<String>) -> Result<Self, RequestError> {
        Self::vendors(UseCase::DisableConsentVendors, ids)
    }

    #[must_use]
    pub fn accept_all() -> Self {
        Self {
            use_case: UseCase::AcceptAllConsent,
            params: RequestParams::None,
        }
    }

    #[must_use]
    pub fn reject_all() -> Self {
        Self {
            use_case: UseCase::RejectAllConsent,
            params: RequestParams::None,
        }
    }

    #[must_use]
    pub fn reset() -> Self {
        Self {
            use_case: UseCase::ResetConsentSettings,
            params: RequestParams::None,
        }
    }

    fn purposes(
        use_case: UseCase,
        ids: Vec<String>,
        update_vendors: bool,
    ) -> Result<Self, RequestError> {
        if ids.is_empty() {
            return Err(RequestError::EmptyIdList);
        }
        Ok(Self {
            use_case,
            params: RequestParams::Purposes { ids, update_vendors },
        })
    }

    fn vendors(use_case: UseCase, ids: Vec<String>) -> Result<Self, RequestError> {
        if ids.is_empty() {
            return Err(RequestError::EmptyIdList);
        }
        Ok(Self {
            use_case,
            params: RequestParams::Vendors { ids },
        })
    }

    #[must_use]
    pub fn use_case(&self) -> UseCase {
        self.use_case
    }

    #[must_use]
    pub fn params(&self) -> &RequestParams {
        &self.params
    }

    /// The consent string to inject for an import exchange, if any.
    #[must_use]
    pub fn import_payload(&self) -> Option<&str> {
        match &self.params {
            RequestParams::Import { consent } => Some(consent),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_fix_the_pairing() {
        let request = OperationRequest::accept_all();
        assert_eq!(request.use_case(), UseCase::AcceptAllConsent);
        assert_eq!(*request.params(), RequestParams::None);

        let request = OperationRequest::open(DisplayOptions {
            jump_to_settings: true,
            design_id: Some(7),
        });
        assert_eq!(request.use_case(), UseCase::OpenConsent);
    }

    #[test]
    fn empty_id_lists_are_rejected() {
        assert_eq!(
            OperationRequest::enable_vendors(vec![]),
            Err(RequestError::EmptyIdList)
        );
        assert_eq!(
            OperationRequest::disable_purposes(vec![], false),
            Err(RequestError::EmptyIdList)
        );
    }

    #[test]
    fn empty_import_is_rejected() {
        assert_eq!(
            OperationRequest::import("   "),
            Err(RequestError::EmptyImport)
        );
        let request = OperationRequest::import("Q0FCQQ==").unwrap();
        assert_eq!(request.import_payload(), Some("Q0FCQQ=="));
    }
}
