//! HTTP reading sink.

use async_trait::async_trait;
use std::time::Duration;
use thermolog_core::{CoreError, Reading, ReadingSink};
use tracing::{debug, instrument};

use crate::error::FetchError;
use crate::host::HttpClient;

/// Default bound on one sink request.
const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(15);

/// Posts each new reading as JSON to an ingestion endpoint.
#[derive(Debug, Clone)]
pub struct HttpReadingSink {
    http: HttpClient,
    url: String,
}

impl HttpReadingSink {
    /// Creates a sink that posts to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self, FetchError> {
        let url = url.into();
        let http = HttpClient::with_timeout(DEFAULT_SINK_TIMEOUT)?;
        http.is_domain_allowed(&url)?;
        Ok(Self { http, url })
    }

    /// The ingestion URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReadingSink for HttpReadingSink {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, reading), fields(url = %self.url, timestamp = %reading.timestamp))]
    async fn emit(&self, reading: &Reading) -> Result<(), CoreError> {
        let response = self
            .http
            .post_json(&self.url, reading)
            .await
            .map_err(|e| CoreError::Sink(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Sink(format!("ingestion endpoint returned HTTP {status}")));
        }

        debug!(status = %status, "Reading delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;

    #[test]
    fn test_invalid_url_rejected() {
        let result = HttpReadingSink::new("::nope::");
        assert!(matches!(result, Err(FetchError::Http(HttpError::InvalidUrl(_)))));
    }

    #[test]
    fn test_keeps_url() {
        let sink = HttpReadingSink::new("http://127.0.0.1:9000/readings").unwrap();
        assert_eq!(sink.url(), "http://127.0.0.1:9000/readings");
        assert_eq!(sink.name(), "http");
    }
}
