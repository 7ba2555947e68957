//! Consent status vocabulary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Status of one purpose or vendor.
///
/// Absence of an id from the consent maps is a real third state: the user has
/// not made a choice yet. Lookups never fail for unknown ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentStatus {
    /// No choice has been made for this id yet.
    ChoiceDoesntExist,
    Granted,
    Denied,
}

impl ConsentStatus {
    #[must_use]
    pub fn from_flag(granted: bool) -> Self {
        if granted {
            ConsentStatus::Granted
        } else {
            ConsentStatus::Denied
        }
    }
}

/// Whether the user has made any consent choice at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserChoiceStatus {
    ChoiceExists,
    ChoiceDoesntExist,
}

/// Aggregate view over the whole snapshot: every known vendor and purpose
/// with its status, plus the canonical strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatus {
    pub status: UserChoiceStatus,
    pub vendors: BTreeMap<String, ConsentStatus>,
    pub purposes: BTreeMap<String, ConsentStatus>,
    /// TCF consent string, empty if none.
    pub tcf: String,
    /// Google additional consent string, empty if none.
    pub addtl_consent: String,
    /// Regulation key (e.g. "gdpr", "ccpa"), empty if none.
    pub regulation: String,
}

impl Default for UserStatus {
    fn default() -> Self {
        Self {
            status: UserChoiceStatus::ChoiceDoesntExist,
            vendors: BTreeMap::new(),
            purposes: BTreeMap::new(),
            tcf: String::new(),
            addtl_consent: String::new(),
            regulation: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_flag_maps_booleans() {
        assert_eq!(ConsentStatus::from_flag(true), ConsentStatus::Granted);
        assert_eq!(ConsentStatus::from_flag(false), ConsentStatus::Denied);
    }

    #[test]
    fn default_user_status_is_empty() {
        let status = UserStatus::default();
        assert_eq!(status.status, UserChoiceStatus::ChoiceDoesntExist);
        assert!(status.vendors.is_empty());
        assert!(status.tcf.is_empty());
    }
}
