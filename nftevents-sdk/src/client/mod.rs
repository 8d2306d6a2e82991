//! HTTP client for the downstream event processor.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.

use reqwest::{Client, StatusCode};
use url::Url;

use crate::objects::push::{EventInput, PushResponse};

/// Errors produced by the SDK HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// Typed HTTP client for the event processor's push endpoint.
#[derive(Debug, Clone)]
pub struct ProcessorClient {
    http: Client,
    base_url: Url,
}

impl ProcessorClient {
    /// * `base_url` – root URL of the event processor (e.g. `http://processor:8087`).
    ///   A path prefix such as `http://gateway/processor` is kept.
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url: directory_url(base_url),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `POST /v1/events` – hand one event to the processor.
    ///
    /// The returned [`PushResponse`] still has to be checked: the processor
    /// reports rejections in the body with a 2xx HTTP status.
    pub async fn push_event(&self, input: &EventInput) -> Result<PushResponse, ClientError> {
        let url = self.endpoint("v1/events")?;

        let resp = self.http.post(url).json(input).send().await?;

        parse_response(resp).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }
}

/// Make `url` usable as a base for relative joins by ending its path with `/`.
pub fn directory_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
