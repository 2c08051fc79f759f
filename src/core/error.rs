// src/core/error.rs

//! Error types shared by the scan pipeline.
//!
//! Collaborator errors never leave a stage: the orchestrator turns them into a
//! failed `StageOutcome`. Store errors are the only ones allowed to terminate a
//! scan.

use crate::core::models::ScanStatus;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Failure of an external collaborator (network service, resolver, API).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("DNS error: {0}")]
    Dns(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("unexpected HTTP status {status} from {service}")]
    Status { service: &'static str, status: u16 },
}

impl From<serde_json::Error> for CollaboratorError {
    fn from(e: serde_json::Error) -> Self {
        CollaboratorError::Parse(e.to_string())
    }
}

/// Failure of the scan store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("scan {0} not found")]
    NotFound(Uuid),

    #[error("scan {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: ScanStatus,
        to: ScanStatus,
    },

    #[error("scan {id} is {status} and no longer accepts changes")]
    Terminal { id: Uuid, status: ScanStatus },

    #[error("scan {id} progress cannot go from {current} back to {requested}")]
    ProgressRegression { id: Uuid, current: u8, requested: u8 },
}

/// Fault that ends a scan run.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("scan task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Error raised inside a stage body. Only the `Store` side escapes the stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
