// src/lib.rs

//! Domain reconnaissance pipeline.
//!
//! A scan walks a domain through registration lookup, DNS, subdomain
//! discovery, port probing with banner reading, fingerprinting, certificate
//! inspection, header and mail-posture checks, and historical enrichment.
//! Every result is stored as it is produced so observers can poll progress.

pub mod config;
pub mod core;
pub mod logging;

pub use crate::config::Settings;
pub use crate::core::models::{ScanOptions, ScanRecord, ScanSnapshot, ScanStatus};
pub use crate::core::orchestrator::{ScanOrchestrator, StageOutcome};
pub use crate::core::store::{MemoryScanStore, ScanStore};
