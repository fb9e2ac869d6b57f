//! Events delivered by the external credential source.

use serde::{Deserialize, Serialize};
use std::fmt;
use thermolog_core::{mask_secret, Credential};
use thermolog_fetch::RawSnapshot;

use crate::error::AgentError;

/// One observation from the credential source.
///
/// Every field is optional: an event may carry a credential, a snapshot the
/// source saw on its own, both, or neither.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialEvent {
    /// Session token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Vendor account id.
    #[serde(default, alias = "account_id", skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    /// Snapshot observed by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<RawSnapshot>,
}

impl CredentialEvent {
    /// Event carrying only a credential.
    pub fn credential_only(token: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            account_id: Some(account_id.into()),
            snapshot: None,
        }
    }

    /// Decodes one JSON event.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidEvent`] if the text is not an event object.
    pub fn from_json(json: &str) -> Result<Self, AgentError> {
        serde_json::from_str(json).map_err(|e| AgentError::InvalidEvent(e.to_string()))
    }

    /// The credential carried by this event, if both halves are present
    /// and non-blank.
    pub fn credential(&self) -> Option<Credential> {
        let token = self.token.as_deref()?;
        let account_id = self.account_id.as_deref()?;
        Credential::new(token, account_id).ok()
    }

    /// True if the event carries nothing the agent acts on.
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_none() && self.credential().is_none()
    }
}

impl fmt::Debug for CredentialEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialEvent")
            .field("token", &self.token.as_deref().map(mask_secret))
            .field("account_id", &self.account_id)
            .field("snapshot", &self.snapshot.as_ref().map(RawSnapshot::len))
            .finish()
    }
}
