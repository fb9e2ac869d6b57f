//! Captured session credential.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Number of leading characters kept visible when masking a secret.
const MASK_VISIBLE_CHARS: usize = 4;

/// Masks a secret for logs and terminal output.
///
/// Keeps the first few characters so two tokens can still be told apart.
pub fn mask_secret(secret: &str) -> String {
    if secret.chars().count() <= MASK_VISIBLE_CHARS * 2 {
        return "****".to_string();
    }
    let visible: String = secret.chars().take(MASK_VISIBLE_CHARS).collect();
    format!("{visible}****")
}

/// A token/account pair captured from a live vendor session.
///
/// At most one credential is live at a time; a newer one always replaces
/// the old one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Session token sent on every poll.
    pub token: String,
    /// Vendor account (user) id the token belongs to.
    pub account_id: String,
    /// When the credential source observed this token.
    pub captured_at: DateTime<Utc>,
}

impl Credential {
    /// Creates a credential captured now.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IncompleteCredential`] if either field is blank.
    pub fn new(token: impl Into<String>, account_id: impl Into<String>) -> Result<Self, CoreError> {
        Self::with_captured_at(token, account_id, Utc::now())
    }

    /// Creates a credential with an explicit capture time.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IncompleteCredential`] if either field is blank.
    pub fn with_captured_at(
        token: impl Into<String>,
        account_id: impl Into<String>,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        let token = token.into().trim().to_string();
        let account_id = account_id.into().trim().to_string();

        if token.is_empty() {
            return Err(CoreError::IncompleteCredential("token"));
        }
        if account_id.is_empty() {
            return Err(CoreError::IncompleteCredential("account id"));
        }

        Ok(Self {
            token,
            account_id,
            captured_at,
        })
    }

    /// Returns the token masked for display.
    pub fn masked_token(&self) -> String {
        mask_secret(&self.token)
    }

    /// Returns true if both credentials carry the same token and account.
    pub fn same_session(&self, other: &Credential) -> bool {
        self.token == other.token && self.account_id == other.account_id
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.masked_token())
            .field("account_id", &self.account_id)
            .field("captured_at", &self.captured_at)
            .finish()
    }
}
