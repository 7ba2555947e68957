//! Parsed snapshot of the consent service payload.
//!
//! Field names are a fixed interoperability contract with the remote service
//! and must not be renamed. Every field is optional: unknown fields are
//! ignored, `null` fields are dropped, and `None` fields are skipped on
//! re-serialization so a parse/serialize round trip preserves exactly the
//! non-null subset that arrived.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cmpflow_types::{ConsentStatus, FlexibleValue, UserChoiceStatus, UserStatus};

/// Google Consent Mode keys that are always reported, denied by default.
pub const GOOGLE_CONSENT_BASELINE: [&str; 4] = [
    "analytics_storage",
    "ad_storage",
    "ad_user_data",
    "ad_personalization",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PurposeEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<FlexibleValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub googleid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iabid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<FlexibleValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purposes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub systemid: Option<String>,
}

/// One metadata entry: name, type tag, and a string-or-integer value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FlexibleValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TcfSection {
    #[serde(rename = "Version", skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(rename = "ConsentLanguage", skip_serializing_if = "Option::is_none")]
    pub consent_language: Option<String>,
    #[serde(rename = "PublisherCC", skip_serializing_if = "Option::is_none")]
    pub publisher_cc: Option<String>,
    #[serde(rename = "IsServiceSpecific", skip_serializing_if = "Option::is_none")]
    pub is_service_specific: Option<bool>,
    #[serde(rename = "VendorConsent", skip_serializing_if = "Option::is_none")]
    pub vendor_consent: Option<Vec<String>>,
    #[serde(rename = "TcfPolicyVersion", skip_serializing_if = "Option::is_none")]
    pub tcf_policy_version: Option<i64>,
    #[serde(rename = "CmpVersion", skip_serializing_if = "Option::is_none")]
    pub cmp_version: Option<i64>,
    #[serde(
        rename = "VendorLegitimateInterest",
        skip_serializing_if = "Option::is_none"
    )]
    pub vendor_legitimate_interest: Option<Vec<String>>,
    #[serde(rename = "CmpId", skip_serializing_if = "Option::is_none")]
    pub cmp_id: Option<i64>,
    #[serde(rename = "SpecialFeatureOptIns", skip_serializing_if = "Option::is_none")]
    pub special_feature_opt_ins: Option<Vec<String>>,
    #[serde(rename = "LastUpdated", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(rename = "Created", skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(rename = "VendorListVersion", skip_serializing_if = "Option::is_none")]
    pub vendor_list_version: Option<i64>,
    #[serde(rename = "PurposeOneTreatment", skip_serializing_if = "Option::is_none")]
    pub purpose_one_treatment: Option<bool>,
    #[serde(rename = "ConsentScreen", skip_serializing_if = "Option::is_none")]
    pub consent_screen: Option<i64>,
    #[serde(
        rename = "PurposesLITransparency",
        skip_serializing_if = "Option::is_none"
    )]
    pub purposes_li_transparency: Option<Vec<String>>,
    #[serde(rename = "PurposeConsent", skip_serializing_if = "Option::is_none")]
    pub purpose_consent: Option<Vec<String>>,
    #[serde(rename = "UseNonStandardStacks", skip_serializing_if = "Option::is_none")]
    pub use_non_standard_stacks: Option<bool>,
}

/// GPP (Global Privacy Platform) block of the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GppData {
    #[serde(rename = "applicableSections", skip_serializing_if = "Option::is_none")]
    pub applicable_sections: Option<Vec<i64>>,
    #[serde(rename = "cmpDisplayStatus", skip_serializing_if = "Option::is_none")]
    pub cmp_display_status: Option<String>,
    #[serde(rename = "cmpId", skip_serializing_if = "Option::is_none")]
    pub cmp_id: Option<i64>,
    #[serde(rename = "cmpStatus", skip_serializing_if = "Option::is_none")]
    pub cmp_status: Option<String>,
    #[serde(rename = "gppString", skip_serializing_if = "Option::is_none")]
    pub gpp_string: Option<String>,
    #[serde(rename = "gppVersion", skip_serializing_if = "Option::is_none")]
    pub gpp_version: Option<String>,
    #[serde(rename = "parsedSections", skip_serializing_if = "Option::is_none")]
    pub parsed_sections: Option<BTreeMap<String, Vec<TcfSection>>>,
    #[serde(rename = "sectionList", skip_serializing_if = "Option::is_none")]
    pub section_list: Option<Vec<i64>>,
    #[serde(rename = "signalStatus", skip_serializing_if = "Option::is_none")]
    pub signal_status: Option<String>,
    #[serde(rename = "supportedAPIs", skip_serializing_if = "Option::is_none")]
    pub supported_apis: Option<Vec<String>>,
}

/// Complete consent payload as sent by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsentModel {
    /// Base64-encoded export of the whole consent state.
    #[serde(rename = "cmpString", skip_serializing_if = "Option::is_none")]
    pub cmp_string: Option<String>,
    #[serde(rename = "addtlConsent", skip_serializing_if = "Option::is_none")]
    pub addtl_consent: Option<String>,
    /// Canonical TCF consent string.
    #[serde(rename = "consentstring", skip_serializing_if = "Option::is_none")]
    pub consent_string: Option<String>,
    #[serde(rename = "gdprApplies", skip_serializing_if = "Option::is_none")]
    pub gdpr_applies: Option<bool>,
    #[serde(
        rename = "googleVendorConsents",
        skip_serializing_if = "Option::is_none"
    )]
    pub google_vendor_consents: Option<BTreeMap<String, bool>>,
    #[serde(rename = "hasGlobalScope", skip_serializing_if = "Option::is_none")]
    pub has_global_scope: Option<bool>,
    #[serde(rename = "publisherCC", skip_serializing_if = "Option::is_none")]
    pub publisher_cc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regulation: Option<i64>,
    #[serde(rename = "regulationKey", skip_serializing_if = "Option::is_none")]
    pub regulation_key: Option<String>,
    #[serde(rename = "tcfcompliant", skip_serializing_if = "Option::is_none")]
    pub tcf_compliant: Option<bool>,
    #[serde(rename = "tcfversion", skip_serializing_if = "Option::is_none")]
    pub tcf_version: Option<i64>,
    #[serde(rename = "lastButtonEvent", skip_serializing_if = "Option::is_none")]
    pub last_button_event: Option<i64>,
    #[serde(rename = "tcfcaversion", skip_serializing_if = "Option::is_none")]
    pub tcfca_version: Option<i64>,
    #[serde(rename = "gppversions", skip_serializing_if = "Option::is_none")]
    pub gpp_versions: Option<Vec<String>>,
    #[serde(rename = "uspstring", skip_serializing_if = "Option::is_none")]
    pub usp_string: Option<String>,
    #[serde(rename = "vendorsList", skip_serializing_if = "Option::is_none")]
    pub vendors_list: Option<Vec<VendorEntry>>,
    #[serde(rename = "purposesList", skip_serializing_if = "Option::is_none")]
    pub purposes_list: Option<Vec<PurposeEntry>>,
    #[serde(rename = "purposeLI", skip_serializing_if = "Option::is_none")]
    pub purpose_li: Option<BTreeMap<String, bool>>,
    #[serde(rename = "vendorLI", skip_serializing_if = "Option::is_none")]
    pub vendor_li: Option<BTreeMap<String, bool>>,
    #[serde(rename = "vendorConsents", skip_serializing_if = "Option::is_none")]
    pub vendor_consents: Option<BTreeMap<String, bool>>,
    #[serde(rename = "purposeConsents", skip_serializing_if = "Option::is_none")]
    pub purpose_consents: Option<BTreeMap<String, bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Vec<MetadataEntry>>,
    #[serde(rename = "userChoiceExists", skip_serializing_if = "Option::is_none")]
    pub user_choice_exists: Option<bool>,
    #[serde(rename = "purModeActive", skip_serializing_if = "Option::is_none")]
    pub pur_mode_active: Option<bool>,
    #[serde(rename = "purModeLoggedIn", skip_serializing_if = "Option::is_none")]
    pub pur_mode_logged_in: Option<bool>,
    #[serde(rename = "purModeLogic", skip_serializing_if = "Option::is_none")]
    pub pur_mode_logic: Option<i64>,
    #[serde(rename = "consentExists", skip_serializing_if = "Option::is_none")]
    pub consent_exists: Option<bool>,
    /// Google Consent Mode map, values "granted"/"denied".
    #[serde(rename = "consentmode", skip_serializing_if = "Option::is_none")]
    pub consent_mode: Option<BTreeMap<String, String>>,
    #[serde(rename = "gppdata", skip_serializing_if = "Option::is_none")]
    pub gpp_data: Option<GppData>,
}

impl ConsentModel {
    /// Tolerant parse: malformed input yields an empty default model so
    /// offline reads stay resilient. Never fails.
    #[must_use]
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str(json) {
            Ok(model) => model,
            Err(error) => {
                tracing::warn!(%error, "failed to parse consent payload, using empty model");
                Self::default()
            }
        }
    }

    /// Serialize back to the wire shape, skipping absent fields.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|error| {
            tracing::error!(%error, "failed to serialize consent model");
            "{}".to_string()
        })
    }

    /// Status for one purpose id. Ids are matched case-insensitively; an
    /// unknown id means no choice has been made yet, not an error.
    #[must_use]
    pub fn status_for_purpose(&self, id: &str) -> ConsentStatus {
        Self::status_in(self.purpose_consents.as_ref(), id)
    }

    /// Status for one vendor id, same rules as [`Self::status_for_purpose`].
    #[must_use]
    pub fn status_for_vendor(&self, id: &str) -> ConsentStatus {
        Self::status_in(self.vendor_consents.as_ref(), id)
    }

    fn status_in(map: Option<&BTreeMap<String, bool>>, id: &str) -> ConsentStatus {
        let Some(map) = map else {
            return ConsentStatus::ChoiceDoesntExist;
        };
        match map.get(&id.to_lowercase()) {
            Some(granted) => ConsentStatus::from_flag(*granted),
            None => ConsentStatus::ChoiceDoesntExist,
        }
    }

    /// Google Consent Mode view: the four baseline keys are always present
    /// and denied by default; the payload's own map only adds or replaces.
    #[must_use]
    pub fn google_consent_mode(&self) -> BTreeMap<String, String> {
        let mut signals: BTreeMap<String, String> = GOOGLE_CONSENT_BASELINE
            .iter()
            .map(|key| ((*key).to_string(), "denied".to_string()))
            .collect();
        if let Some(consent_mode) = &self.consent_mode {
            for (key, value) in consent_mode {
                signals.insert(key.clone(), value.clone());
            }
        }
        signals
    }

    /// The stored base64 consent string, or empty if absent. Never fails.
    #[must_use]
    pub fn export_cmp_info(&self) -> String {
        self.cmp_string.clone().unwrap_or_default()
    }

    /// Whether the user has made any consent choice.
    #[must_use]
    pub fn has_user_choice(&self) -> bool {
        self.consent_string
            .as_ref()
            .is_some_and(|value| !value.is_empty())
    }

    #[must_use]
    pub fn all_purpose_ids(&self) -> Vec<String> {
        self.purposes_list
            .as_ref()
            .map(|purposes| {
                purposes
                    .iter()
                    .filter_map(|purpose| purpose.id.as_ref().map(FlexibleValue::to_text))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn all_vendor_ids(&self) -> Vec<String> {
        self.vendors_list
            .as_ref()
            .map(|vendors| {
                vendors
                    .iter()
                    .filter_map(|vendor| vendor.id.as_ref().map(FlexibleValue::to_text))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Aggregate status over every known vendor and purpose.
    #[must_use]
    pub fn user_status(&self) -> UserStatus {
        let status = if self.has_user_choice() {
            UserChoiceStatus::ChoiceExists
        } else {
            UserChoiceStatus::ChoiceDoesntExist
        };

        let vendors = self
            .all_vendor_ids()
            .into_iter()
            .map(|id| {
                let consent = self.status_for_vendor(&id);
                (id, consent)
            })
            .collect();
        let purposes = self
            .all_purpose_ids()
            .into_iter()
            .map(|id| {
                let consent = self.status_for_purpose(&id);
                (id, consent)
            })
            .collect();

        UserStatus {
            status,
            vendors,
            purposes,
            tcf: self.consent_string.clone().unwrap_or_default(),
            addtl_consent: self.addtl_consent.clone().unwrap_or_default(),
            regulation: self.regulation_key.clone().unwrap_or_default(),
        }
    }
}
