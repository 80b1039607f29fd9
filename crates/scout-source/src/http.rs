//! Plain HTTP page fetching for `PageSource` implementations.

use crate::error::TransportError;
use crate::pagination::RawPage;
use reqwest::header::USER_AGENT;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use std::time::Duration;
use tracing::trace;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin wrapper over a shared `reqwest` client.
///
/// Any HTTP status is returned as a [`RawPage`]; only failures with no
/// usable response become a [`TransportError`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher with the given per-request timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::connection(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Build a fetcher around an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// `GET` a page presenting `identity` as the user agent.
    pub async fn get(&self, url: &str, identity: &str) -> Result<RawPage, TransportError> {
        trace!(url, "GET");
        Self::send(self.client.get(url).header(USER_AGENT, identity)).await
    }

    /// `POST` an urlencoded form, as directory search forms expect.
    pub async fn post_form<F>(
        &self,
        url: &str,
        form: &F,
        identity: &str,
    ) -> Result<RawPage, TransportError>
    where
        F: Serialize + ?Sized,
    {
        trace!(url, "POST");
        Self::send(self.client.post(url).header(USER_AGENT, identity).form(form)).await
    }

    async fn send(request: RequestBuilder) -> Result<RawPage, TransportError> {
        let response = request.send().await.map_err(|e| TransportError {
            status: e.status().map_or(0, |s| s.as_u16()),
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportError {
            status,
            message: format!("failed to read body: {e}"),
        })?;

        Ok(RawPage { status, body })
    }
}
