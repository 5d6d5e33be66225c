use crate::error::{RemoteError, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Where a request goes and which bearer credential, if any, it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub credential: Option<String>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: Option<&str>) -> Self {
        self.credential = credential
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// POSTs a JSON document and hands back the raw status and body. Status
/// interpretation is left to the caller: a 404 means different things to
/// different services.
#[async_trait]
pub trait JsonTransport: Send + Sync {
    async fn post_json(&self, endpoint: &Endpoint, body: &Value) -> Result<TransportResponse>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// `timeout` is the client-level ceiling; callers add their own, shorter,
    /// deadlines on top.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fieldmatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl JsonTransport for ReqwestTransport {
    async fn post_json(&self, endpoint: &Endpoint, body: &Value) -> Result<TransportResponse> {
        let payload = serde_json::to_vec(body)
            .map_err(|err| RemoteError::Malformed(format!("request not serializable: {err}")))?;

        let mut request = self
            .client
            .post(&endpoint.url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload);
        if let Some(credential) = &endpoint.credential {
            request = request.header(AUTHORIZATION, format!("Bearer {credential}"));
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_credentials_are_dropped() {
        assert_eq!(Endpoint::new("http://x").with_credential(Some("  ")).credential, None);
        assert_eq!(
            Endpoint::new("http://x")
                .with_credential(Some(" k-1 "))
                .credential
                .as_deref(),
            Some("k-1")
        );
    }

    #[test]
    fn success_is_any_2xx() {
        let ok = TransportResponse {
            status: 204,
            body: String::new(),
        };
        let missing = TransportResponse {
            status: 404,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!missing.is_success());
    }
}
