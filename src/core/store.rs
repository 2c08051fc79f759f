// src/core/store.rs

//! Append-only storage for scan records and their findings.
//!
//! The store enforces the scan state machine and monotonic progress, so every
//! observer sees a consistent history no matter who writes.

use crate::core::error::{StoreError, StoreResult};
use crate::core::models::{
    Finding, ScanFindings, ScanOptions, ScanRecord, ScanSnapshot, ScanStatus,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

#[async_trait]
pub trait ScanStore: Send + Sync {
    async fn create_scan(&self, domain: &str, options: ScanOptions) -> StoreResult<ScanRecord>;
    async fn get_scan(&self, id: Uuid) -> StoreResult<ScanRecord>;
    /// Most recent first.
    async fn list_scans(&self) -> Vec<ScanRecord>;
    async fn mark_running(&self, id: Uuid, progress: u8) -> StoreResult<ScanRecord>;
    async fn advance_progress(&self, id: Uuid, progress: u8) -> StoreResult<ScanRecord>;
    async fn complete_scan(&self, id: Uuid) -> StoreResult<ScanRecord>;
    async fn fail_scan(&self, id: Uuid, reason: &str) -> StoreResult<ScanRecord>;
    async fn append(&self, id: Uuid, finding: Finding) -> StoreResult<()>;
    async fn findings(&self, id: Uuid) -> StoreResult<ScanFindings>;
    async fn snapshot(&self, id: Uuid) -> StoreResult<ScanSnapshot>;
    /// Removes the record together with every finding it owns.
    async fn delete_scan(&self, id: Uuid) -> StoreResult<()>;
}

struct StoredScan {
    record: ScanRecord,
    findings: ScanFindings,
}

impl StoredScan {
    fn transition(&mut self, next: ScanStatus) -> StoreResult<()> {
        let current = self.record.status;
        if current.is_terminal() {
            return Err(StoreError::Terminal { id: self.record.id, status: current });
        }
        if !current.can_transition_to(next) {
            return Err(StoreError::InvalidTransition { id: self.record.id, from: current, to: next });
        }
        self.record.status = next;
        Ok(())
    }

    fn set_progress(&mut self, progress: u8) -> StoreResult<()> {
        let requested = progress.min(100);
        if requested < self.record.progress {
            return Err(StoreError::ProgressRegression {
                id: self.record.id,
                current: self.record.progress,
                requested,
            });
        }
        self.record.progress = requested;
        Ok(())
    }
}

/// Process-local store backing the CLI and the tests.
#[derive(Default)]
pub struct MemoryScanStore {
    scans: RwLock<HashMap<Uuid, StoredScan>>,
}

impl MemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScanStore for MemoryScanStore {
    async fn create_scan(&self, domain: &str, options: ScanOptions) -> StoreResult<ScanRecord> {
        let record = ScanRecord::new(domain, options);
        info!(scan_id = %record.id, domain, "Created scan record.");
        let mut scans = self.scans.write().await;
        scans.insert(
            record.id,
            StoredScan { record: record.clone(), findings: ScanFindings::default() },
        );
        Ok(record)
    }

    async fn get_scan(&self, id: Uuid) -> StoreResult<ScanRecord> {
        let scans = self.scans.read().await;
        scans.get(&id).map(|s| s.record.clone()).ok_or(StoreError::NotFound(id))
    }

    async fn list_scans(&self) -> Vec<ScanRecord> {
        let scans = self.scans.read().await;
        let mut records: Vec<ScanRecord> = scans.values().map(|s| s.record.clone()).collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    async fn mark_running(&self, id: Uuid, progress: u8) -> StoreResult<ScanRecord> {
        let mut scans = self.scans.write().await;
        let scan = scans.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        scan.transition(ScanStatus::Running)?;
        scan.set_progress(progress)?;
        debug!(scan_id = %id, progress, "Scan is running.");
        Ok(scan.record.clone())
    }

    async fn advance_progress(&self, id: Uuid, progress: u8) -> StoreResult<ScanRecord> {
        let mut scans = self.scans.write().await;
        let scan = scans.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if scan.record.status.is_terminal() {
            return Err(StoreError::Terminal { id, status: scan.record.status });
        }
        scan.set_progress(progress)?;
        debug!(scan_id = %id, progress, "Progress advanced.");
        Ok(scan.record.clone())
    }

    async fn complete_scan(&self, id: Uuid) -> StoreResult<ScanRecord> {
        let mut scans = self.scans.write().await;
        let scan = scans.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        scan.transition(ScanStatus::Completed)?;
        scan.set_progress(100)?;
        scan.record.completed_at = Some(Utc::now());
        Ok(scan.record.clone())
    }

    async fn fail_scan(&self, id: Uuid, reason: &str) -> StoreResult<ScanRecord> {
        let mut scans = self.scans.write().await;
        let scan = scans.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        scan.transition(ScanStatus::Failed)?;
        scan.record.failure = Some(reason.to_string());
        debug!(scan_id = %id, reason, "Failure recorded.");
        Ok(scan.record.clone())
    }

    async fn append(&self, id: Uuid, finding: Finding) -> StoreResult<()> {
        let mut scans = self.scans.write().await;
        let scan = scans.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if scan.record.status.is_terminal() {
            return Err(StoreError::Terminal { id, status: scan.record.status });
        }
        scan.findings.push(finding);
        Ok(())
    }

    async fn findings(&self, id: Uuid) -> StoreResult<ScanFindings> {
        let scans = self.scans.read().await;
        scans.get(&id).map(|s| s.findings.clone()).ok_or(StoreError::NotFound(id))
    }

    async fn snapshot(&self, id: Uuid) -> StoreResult<ScanSnapshot> {
        let scans = self.scans.read().await;
        let scan = scans.get(&id).ok_or(StoreError::NotFound(id))?;
        Ok(ScanSnapshot { record: scan.record.clone(), findings: scan.findings.clone() })
    }

    async fn delete_scan(&self, id: Uuid) -> StoreResult<()> {
        let mut scans = self.scans.write().await;
        scans.remove(&id).map(|_| ()).ok_or(StoreError::NotFound(id))?;
        info!(scan_id = %id, "Deleted scan and its findings.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{DnsFinding, RecordKind};

    fn dns(value: &str) -> Finding {
        Finding::Dns(DnsFinding { kind: RecordKind::A, value: value.to_string() })
    }

    #[tokio::test]
    async fn progress_never_goes_backwards() {
        let store = MemoryScanStore::new();
        let record = store.create_scan("example.com", ScanOptions::default()).await.unwrap();
        store.mark_running(record.id, 10).await.unwrap();
        store.advance_progress(record.id, 35).await.unwrap();

        let err = store.advance_progress(record.id, 20).await.unwrap_err();
        assert!(matches!(err, StoreError::ProgressRegression { current: 35, requested: 20, .. }));
        assert_eq!(store.get_scan(record.id).await.unwrap().progress, 35);
    }

    #[tokio::test]
    async fn terminal_scans_never_resume() {
        let store = MemoryScanStore::new();
        let record = store.create_scan("example.com", ScanOptions::default()).await.unwrap();
        store.mark_running(record.id, 10).await.unwrap();
        let done = store.complete_scan(record.id).await.unwrap();
        assert_eq!(done.status, ScanStatus::Completed);
        assert_eq!(done.progress, 100);
        assert!(done.completed_at.is_some());

        assert!(matches!(
            store.mark_running(record.id, 10).await,
            Err(StoreError::Terminal { .. })
        ));
        assert!(matches!(store.fail_scan(record.id, "late").await, Err(StoreError::Terminal { .. })));
        assert!(matches!(store.append(record.id, dns("192.0.2.1")).await, Err(StoreError::Terminal { .. })));
    }

    #[tokio::test]
    async fn pending_scans_cannot_complete_directly() {
        let store = MemoryScanStore::new();
        let record = store.create_scan("example.com", ScanOptions::default()).await.unwrap();
        assert!(matches!(
            store.complete_scan(record.id).await,
            Err(StoreError::InvalidTransition { from: ScanStatus::Pending, to: ScanStatus::Completed, .. })
        ));
    }

    #[tokio::test]
    async fn failed_scans_keep_their_findings() {
        let store = MemoryScanStore::new();
        let record = store.create_scan("example.com", ScanOptions::default()).await.unwrap();
        store.mark_running(record.id, 10).await.unwrap();
        store.append(record.id, dns("192.0.2.1")).await.unwrap();
        let failed = store.fail_scan(record.id, "disk full").await.unwrap();

        assert_eq!(failed.status, ScanStatus::Failed);
        assert_eq!(failed.failure.as_deref(), Some("disk full"));
        assert!(failed.completed_at.is_none());
        assert_eq!(store.findings(record.id).await.unwrap().dns.len(), 1);
    }

    #[tokio::test]
    async fn deleting_a_scan_drops_its_findings() {
        let store = MemoryScanStore::new();
        let record = store.create_scan("example.com", ScanOptions::default()).await.unwrap();
        store.mark_running(record.id, 10).await.unwrap();
        store.append(record.id, dns("192.0.2.1")).await.unwrap();
        store.delete_scan(record.id).await.unwrap();

        assert!(matches!(store.findings(record.id).await, Err(StoreError::NotFound(_))));
        assert!(store.list_scans().await.is_empty());
    }
}
