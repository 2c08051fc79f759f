// src/core/scanner/http_client.rs

use crate::config::Settings;
use crate::core::error::{CollaboratorError, CollaboratorResult};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tracing::{debug, info};

/// What a web fetch returns: enough for fingerprinting and header inspection.
#[derive(Debug, Clone, Default)]
pub struct WebResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl WebResponse {
    /// A header as text. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All `set-cookie` values joined with `"; "`.
    pub fn cookies(&self) -> String {
        self.headers
            .get_all("set-cookie")
            .into_iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[async_trait]
pub trait WebFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> CollaboratorResult<WebResponse>;
}

/// Builds the shared `reqwest` client with the configured user agent.
pub fn build_client(settings: &Settings, timeout: Duration) -> CollaboratorResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(settings.http.user_agent.clone())
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?)
}

pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(settings: &Settings) -> CollaboratorResult<Self> {
        Ok(Self { client: build_client(settings, settings.http_timeout())? })
    }
}

#[async_trait]
impl WebFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> CollaboratorResult<WebResponse> {
        debug!(url, "Fetching page.");
        let response = self.client.get(url).send().await.map_err(CollaboratorError::from)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;
        info!(url, status, bytes = body.len(), "Received HTTP response.");
        Ok(WebResponse { status, headers, body })
    }
}
