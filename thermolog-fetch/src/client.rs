//! Vendor snapshot client.
//!
//! [`VendorClient`] issues the `app_launch` poll with the current credential
//! and classifies what came back. It never retries; the scheduler's next
//! tick is the retry.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;
use thermolog_core::Credential;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::api::{AppLaunchRequest, RawSnapshot};
use crate::error::{FetchError, HttpError};
use crate::host::HttpClient;

/// Default vendor API base URL.
pub const DEFAULT_BASE_URL: &str = "https://home.nest.com";

/// Default authorization scheme placed before the token.
pub const DEFAULT_AUTH_SCHEME: &str = "Basic";

/// Default bound on one poll, connect to last body byte.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

const USER_ID_HEADER: &str = "x-nl-user-id";
const PROTOCOL_VERSION_HEADER: &str = "x-nl-protocol-version";
const PROTOCOL_VERSION: &str = "1";

// ============================================================================
// Poll Outcome
// ============================================================================

/// Classified result of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// 2xx with a body that decoded as a bucket snapshot.
    Success(RawSnapshot),
    /// 401 or 403: the vendor rejected the token.
    AuthExpired,
    /// Anything else: network error, timeout, other status, bad body.
    TransientFailure(String),
}

impl PollOutcome {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::AuthExpired => "auth_expired",
            Self::TransientFailure(_) => "transient_failure",
        }
    }
}

impl fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(snapshot) => write!(f, "success ({} buckets)", snapshot.len()),
            Self::AuthExpired => f.write_str("auth expired"),
            Self::TransientFailure(reason) => write!(f, "transient failure: {reason}"),
        }
    }
}

/// How an HTTP status is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Decode the body.
    Success,
    /// Token rejected.
    AuthExpired,
    /// Try again next tick.
    Transient,
}

/// Classifies an HTTP status code.
pub fn classify_status(status: StatusCode) -> StatusClass {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        StatusClass::AuthExpired
    } else if status.is_success() {
        StatusClass::Success
    } else {
        StatusClass::Transient
    }
}

// ============================================================================
// Snapshot Poller Trait
// ============================================================================

/// Anything that can fetch a snapshot for a credential.
///
/// Implemented by [`VendorClient`]; the scheduler depends only on this.
#[async_trait]
pub trait SnapshotPoller: Send + Sync {
    /// Polls once. Never fails: every failure is a [`PollOutcome`].
    async fn poll(&self, credential: &Credential) -> PollOutcome;
}

// ============================================================================
// Vendor Client
// ============================================================================

/// Settings for [`VendorClient`].
#[derive(Debug, Clone)]
pub struct VendorSettings {
    /// API base URL, without the `/api/...` path.
    pub base_url: String,
    /// Scheme word for the `Authorization` header.
    pub auth_scheme: String,
    /// Bound on one poll.
    pub timeout: Duration,
    /// Hosts the token may be sent to. Empty means unrestricted.
    pub allowed_domains: Vec<String>,
}

impl Default for VendorSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_scheme: DEFAULT_AUTH_SCHEME.to_string(),
            timeout: DEFAULT_POLL_TIMEOUT,
            allowed_domains: vec!["nest.com".to_string()],
        }
    }
}

/// Client for the vendor's snapshot endpoint.
#[derive(Debug, Clone)]
pub struct VendorClient {
    http: HttpClient,
    base_url: Url,
    auth_scheme: String,
    timeout: Duration,
}

impl VendorClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidConfig`] for an unusable base URL, or
    /// [`FetchError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: VendorSettings) -> Result<Self, FetchError> {
        let base_url = Url::parse(&settings.base_url)
            .map_err(|e| FetchError::InvalidConfig(format!("base_url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidConfig(format!(
                "base_url cannot be a base: {}",
                settings.base_url
            )));
        }
        if settings.timeout.is_zero() {
            return Err(FetchError::InvalidConfig("poll timeout must be non-zero".to_string()));
        }

        let http = HttpClient::with_timeout(settings.timeout)?.allow_domains(settings.allowed_domains);
        http.is_domain_allowed(base_url.as_str())?;

        Ok(Self {
            http,
            base_url,
            auth_scheme: settings.auth_scheme,
            timeout: settings.timeout,
        })
    }

    /// Returns the `app_launch` URL for an account.
    pub fn endpoint(&self, account_id: &str) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| FetchError::InvalidConfig("base_url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["api", "0.1", "user", account_id, "app_launch"]);
        Ok(url)
    }

    /// Builds the request headers for a credential.
    fn headers(&self, credential: &Credential) -> Result<HeaderMap, HttpError> {
        let mut headers = HeaderMap::new();

        let auth = HeaderValue::from_str(&format!("{} {}", self.auth_scheme, credential.token))
            .map_err(|_| HttpError::InvalidHeader("authorization"))?;
        headers.insert(AUTHORIZATION, auth);

        let user_id = HeaderValue::from_str(&credential.account_id)
            .map_err(|_| HttpError::InvalidHeader(USER_ID_HEADER))?;
        headers.insert(HeaderName::from_static(USER_ID_HEADER), user_id);

        headers.insert(
            HeaderName::from_static(PROTOCOL_VERSION_HEADER),
            HeaderValue::from_static(PROTOCOL_VERSION),
        );

        Ok(headers)
    }

    async fn send(&self, credential: &Credential) -> Result<PollOutcome, FetchError> {
        let url = self.endpoint(&credential.account_id)?;
        let headers = self.headers(credential)?;
        let body = AppLaunchRequest::full_snapshot();

        let response = self
            .http
            .post_json_with_headers(url.as_str(), headers, &body)
            .await?;
        let status = response.status();

        match classify_status(status) {
            StatusClass::AuthExpired => {
                warn!(status = %status, "Vendor rejected credential");
                Ok(PollOutcome::AuthExpired)
            }
            StatusClass::Transient => Ok(PollOutcome::TransientFailure(format!("HTTP {status}"))),
            StatusClass::Success => {
                let text = response.text().await.map_err(HttpError::from)?;
                match serde_json::from_str::<RawSnapshot>(&text) {
                    Ok(snapshot) => Ok(PollOutcome::Success(snapshot)),
                    Err(e) => Ok(PollOutcome::TransientFailure(format!("malformed body: {e}"))),
                }
            }
        }
    }
}

#[async_trait]
impl SnapshotPoller for VendorClient {
    #[instrument(skip(self, credential), fields(account = %credential.account_id))]
    async fn poll(&self, credential: &Credential) -> PollOutcome {
        debug!(token = %credential.masked_token(), "Polling vendor snapshot");

        let outcome = match tokio::time::timeout(self.timeout, self.send(credential)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => PollOutcome::TransientFailure(e.to_string()),
            Err(_) => PollOutcome::TransientFailure(format!("timed out after {:?}", self.timeout)),
        };

        debug!(outcome = outcome.label(), "Poll finished");
        outcome
    }
}

// ============================================================================
// Tests
// ============================================================================
