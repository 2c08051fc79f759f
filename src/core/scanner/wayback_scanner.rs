// src/core/scanner/wayback_scanner.rs

use crate::config::Settings;
use crate::core::error::{CollaboratorError, CollaboratorResult};
use crate::core::models::ArchiveSnapshot;
use crate::core::scanner::http_client::build_client;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

const CDX_ENDPOINT: &str = "http://web.archive.org/cdx/search/cdx";
const SNAPSHOT_LIMIT: &str = "100";

/// Lists archived captures of a URL.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    async fn snapshots(&self, url: &str) -> CollaboratorResult<Vec<ArchiveSnapshot>>;
}

fn cell(row: &[Value], index: usize) -> Option<String> {
    row.get(index).and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Rows of a CDX JSON response: the first row is the header, then
/// `[urlkey, timestamp, original, mimetype, statuscode, digest, length]`.
pub fn parse_cdx(body: &str) -> CollaboratorResult<Vec<ArchiveSnapshot>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let rows: Vec<Vec<Value>> = serde_json::from_str(body)?;
    Ok(rows
        .iter()
        .skip(1)
        .filter_map(|row| {
            let timestamp = cell(row, 1)?;
            let original = cell(row, 2)?;
            Some(ArchiveSnapshot {
                url: format!("https://web.archive.org/web/{timestamp}/{original}"),
                timestamp,
                status: cell(row, 4).unwrap_or_else(|| "200".to_string()),
            })
        })
        .collect())
}

pub struct WaybackClient {
    client: reqwest::Client,
}

impl WaybackClient {
    pub fn new(settings: &Settings) -> CollaboratorResult<Self> {
        Ok(Self { client: build_client(settings, settings.http_timeout())? })
    }
}

#[async_trait]
impl ArchiveSource for WaybackClient {
    async fn snapshots(&self, url: &str) -> CollaboratorResult<Vec<ArchiveSnapshot>> {
        debug!(url, "Listing archived snapshots.");
        let response = self
            .client
            .get(CDX_ENDPOINT)
            .query(&[
                ("url", url),
                ("output", "json"),
                ("limit", SNAPSHOT_LIMIT),
                ("filter", "statuscode:200"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CollaboratorError::Status { service: "Wayback Machine", status: response.status().as_u16() });
        }
        let snapshots = parse_cdx(&response.text().await?)?;
        info!(url, count = snapshots.len(), "Received archived snapshots.");
        Ok(snapshots)
    }
}
