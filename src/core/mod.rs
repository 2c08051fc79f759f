// src/core/mod.rs

/// Scan records, options and every finding type.
pub mod models;

pub mod error;

/// Port-to-service table shared by the prober and the banner reader.
pub mod services;

pub mod store;

/// Collaborators: one module per external data source or probe.
pub mod scanner;

pub mod orchestrator;

/// Explanations and remediation advice for vulnerability codes.
pub mod knowledge_base;
