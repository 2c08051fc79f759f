// src/ui/widgets/mod.rs

pub mod analysis_view; // Vulnerability list with knowledge-base details, or live progress.
pub mod disclaimer_popup;
pub mod footer;
pub mod input;
pub mod log_view;
pub mod summary; // Score, checks and discovered assets.
