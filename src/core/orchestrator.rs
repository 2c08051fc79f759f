// src/core/orchestrator.rs

//! Drives one scan through its stages.
//!
//! Each stage is fault-isolated: collaborator errors end up as a failed
//! [`StageOutcome`] and the next stage runs anyway. Only a store fault stops
//! the run, and the record is then marked failed with the reason.

use crate::config::Settings;
use crate::core::error::{CollaboratorError, CollaboratorResult, ScanError, StageError};
use crate::core::models::{Finding, RecordKind, ScanOptions, ScanRecord};
use crate::core::scanner::Collaborators;
use crate::core::scanner::banner_scanner::read_banners;
use crate::core::scanner::dns_scanner::{resolve_ipv4, run_dns_scan, run_mail_posture_scan};
use crate::core::scanner::fingerprint_scanner::run_fingerprint_scan;
use crate::core::scanner::headers_scanner::run_headers_scan;
use crate::core::scanner::history_scanner::gather_history;
use crate::core::scanner::host_intel::choose_ports;
use crate::core::scanner::ssl_scanner::analyze_certificate;
use crate::core::scanner::subdomain_scanner::discover_subdomains;
use crate::core::scanner::whois_scanner::{parse_whois, unavailable_snapshot};
use crate::core::store::ScanStore;
use std::net::IpAddr;
use std::sync::Arc;
use strum::{Display, EnumIter, IntoEnumIterator};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Progress recorded when a scan starts running.
pub const START_PROGRESS: u8 = 10;

/// What a single stage did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Produced(usize),
    Empty,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Registration,
    NameResolution,
    Subdomains,
    Ports,
    Technologies,
    Certificate,
    Vulnerabilities,
    History,
}

impl Stage {
    /// Progress reached once the stage is over, whatever its outcome.
    pub fn checkpoint(self) -> u8 {
        match self {
            Stage::Registration => 20,
            Stage::NameResolution => 35,
            Stage::Subdomains => 50,
            Stage::Ports => 65,
            Stage::Technologies => 80,
            Stage::Certificate => 90,
            Stage::Vulnerabilities => 95,
            Stage::History => 100,
        }
    }

    pub fn enabled(self, options: &ScanOptions) -> bool {
        match self {
            Stage::Registration => options.whois,
            Stage::NameResolution => options.dns,
            Stage::Subdomains => options.subdomains,
            Stage::Ports => options.ports,
            Stage::Technologies => options.technologies,
            Stage::Certificate => options.ssl,
            Stage::Vulnerabilities => options.vulnerabilities,
            Stage::History => options.historical || options.wayback,
        }
    }
}

/// State handed from one stage to the next within a run.
#[derive(Debug, Default)]
struct RunContext {
    /// First A record seen by the name-resolution stage.
    address: Option<IpAddr>,
}

pub struct ScanOrchestrator {
    store: Arc<dyn ScanStore>,
    collaborators: Collaborators,
    brute_force_concurrency: usize,
}

impl ScanOrchestrator {
    pub fn new(store: Arc<dyn ScanStore>, collaborators: Collaborators, settings: &Settings) -> Self {
        Self {
            store,
            collaborators,
            brute_force_concurrency: settings.probing.brute_force_concurrency.max(1),
        }
    }

    /// Wires the network-backed collaborators from `settings`.
    pub fn from_settings(store: Arc<dyn ScanStore>, settings: &Settings) -> CollaboratorResult<Self> {
        Ok(Self::new(store, Collaborators::from_settings(settings)?, settings))
    }

    pub fn store(&self) -> Arc<dyn ScanStore> {
        self.store.clone()
    }

    /// Creates a pending scan and runs it in the background.
    ///
    /// The returned record is the pending one; poll the store for progress.
    pub async fn submit(
        self: &Arc<Self>,
        domain: &str,
        options: ScanOptions,
    ) -> Result<(ScanRecord, JoinHandle<Result<ScanRecord, ScanError>>), ScanError> {
        let record = self.store.create_scan(domain, options).await?;
        info!(scan_id = %record.id, target = %domain, "Scan submitted.");

        let orchestrator = Arc::clone(self);
        let store = self.store();
        let scan_id = record.id;
        let handle = tokio::spawn(async move {
            // A panicking stage kills only the inner task; the record is still failed.
            match tokio::spawn(async move { orchestrator.run(scan_id).await }).await {
                Ok(result) => result,
                Err(e) => {
                    error!(scan_id = %scan_id, error = %e, "Scan task aborted.");
                    if let Err(mark) = store.fail_scan(scan_id, &format!("scan task aborted: {e}")).await {
                        error!(scan_id = %scan_id, error = %mark, "Could not mark scan as failed.");
                    }
                    Err(ScanError::Join(e))
                }
            }
        });

        Ok((record, handle))
    }

    /// Drives a pending scan to a terminal state and returns the final record.
    pub async fn run(&self, scan_id: Uuid) -> Result<ScanRecord, ScanError> {
        let record = self.store.mark_running(scan_id, START_PROGRESS).await?;
        info!(scan_id = %scan_id, target = %record.domain, "Scan started.");

        let result = match self.run_stages(&record).await {
            Ok(()) => self.store.complete_scan(scan_id).await.map_err(ScanError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(done) => {
                let findings = self.finding_count(scan_id).await;
                info!(scan_id = %scan_id, findings, "Scan completed.");
                Ok(done)
            }
            Err(e) => {
                error!(scan_id = %scan_id, error = %e, "Scan failed.");
                if let Err(mark) = self.store.fail_scan(scan_id, &e.to_string()).await {
                    error!(scan_id = %scan_id, error = %mark, "Could not mark scan as failed.");
                }
                Err(e)
            }
        }
    }

    async fn finding_count(&self, scan_id: Uuid) -> usize {
        self.store.findings(scan_id).await.map(|f| f.total()).unwrap_or_default()
    }

    async fn run_stages(&self, record: &ScanRecord) -> Result<(), ScanError> {
        let mut ctx = RunContext::default();

        for stage in Stage::iter() {
            let outcome = if stage.enabled(&record.options) {
                debug!(scan_id = %record.id, stage = %stage, "Running stage.");
                settle(stage, self.run_stage(stage, record, &mut ctx).await)?
            } else {
                StageOutcome::Skipped
            };
            info!(scan_id = %record.id, stage = %stage, outcome = ?outcome, "Stage finished.");

            // The last checkpoint is reached by completing the scan.
            if stage != Stage::History {
                self.store.advance_progress(record.id, stage.checkpoint()).await?;
            }
        }

        Ok(())
    }

    async fn run_stage(&self, stage: Stage, record: &ScanRecord, ctx: &mut RunContext) -> Result<usize, StageError> {
        match stage {
            Stage::Registration => self.registration(record).await,
            Stage::NameResolution => self.name_resolution(record, ctx).await,
            Stage::Subdomains => self.subdomains(record).await,
            Stage::Ports => self.ports(record, ctx).await,
            Stage::Technologies => self.technologies(record).await,
            Stage::Certificate => self.certificate(record).await,
            Stage::Vulnerabilities => self.vulnerabilities(record).await,
            Stage::History => self.history(record).await,
        }
    }

    async fn persist(&self, scan_id: Uuid, finding: Finding) -> Result<(), StageError> {
        Ok(self.store.append(scan_id, finding).await?)
    }

    async fn registration(&self, record: &ScanRecord) -> Result<usize, StageError> {
        let snapshot = match self.collaborators.registration.lookup(&record.domain).await {
            Ok(raw) => parse_whois(&raw),
            Err(e) => {
                warn!(target = %record.domain, error = %e, "WHOIS lookup failed, storing placeholder.");
                unavailable_snapshot()
            }
        };
        self.persist(record.id, Finding::Whois(snapshot)).await?;
        Ok(1)
    }

    async fn name_resolution(&self, record: &ScanRecord, ctx: &mut RunContext) -> Result<usize, StageError> {
        let findings = run_dns_scan(self.collaborators.resolver.as_ref(), &record.domain).await?;
        let count = findings.len();
        for finding in findings {
            if ctx.address.is_none() && finding.kind == RecordKind::A {
                ctx.address = finding.value.parse().ok();
            }
            self.persist(record.id, Finding::Dns(finding)).await?;
        }
        Ok(count)
    }

    async fn subdomains(&self, record: &ScanRecord) -> Result<usize, StageError> {
        let findings = discover_subdomains(
            self.collaborators.resolver.clone(),
            &self.collaborators.subdomain_sources,
            &record.domain,
            self.brute_force_concurrency,
        )
        .await;
        let count = findings.len();
        for finding in findings {
            self.persist(record.id, Finding::Subdomain(finding)).await?;
        }
        Ok(count)
    }

    async fn ports(&self, record: &ScanRecord, ctx: &RunContext) -> Result<usize, StageError> {
        let address = match ctx.address {
            Some(address) => Some(address),
            None => resolve_ipv4(self.collaborators.resolver.as_ref(), &record.domain).await?,
        };
        let Some(address) = address else {
            info!(target = %record.domain, "No IPv4 address, nothing to probe.");
            return Ok(0);
        };

        let selection = choose_ports(
            self.collaborators.host_intel.as_ref(),
            self.collaborators.ports.as_ref(),
            address,
        )
        .await;
        info!(%address, source = ?selection.source, open = selection.ports.len(), "Ports selected.");

        let mut count = 0;
        if let Some(intel) = selection.intel {
            self.persist(record.id, Finding::HostIntel(intel)).await?;
            count += 1;
        }

        let samples = read_banners(self.collaborators.banners.as_ref(), &record.domain, &selection.ports).await;
        for (mut port, sample) in selection.ports.into_iter().zip(samples) {
            port.version = sample.version.clone();
            self.persist(record.id, Finding::Port(port)).await?;
            self.persist(record.id, Finding::Banner(sample)).await?;
            count += 2;
        }
        Ok(count)
    }

    async fn technologies(&self, record: &ScanRecord) -> Result<usize, StageError> {
        let findings = run_fingerprint_scan(self.collaborators.web.as_ref(), &record.domain).await?;
        let count = findings.len();
        for finding in findings {
            self.persist(record.id, Finding::Technology(finding)).await?;
        }
        Ok(count)
    }

    async fn certificate(&self, record: &ScanRecord) -> Result<usize, StageError> {
        match self.collaborators.certificates.inspect(&record.domain).await? {
            Some(cert) => {
                self.persist(record.id, Finding::Certificate(cert)).await?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn vulnerabilities(&self, record: &ScanRecord) -> Result<usize, StageError> {
        let mut findings = Vec::new();
        let mut errors: Vec<CollaboratorError> = Vec::new();

        match run_headers_scan(self.collaborators.web.as_ref(), &record.domain).await {
            Ok(found) => findings.extend(found),
            Err(e) => {
                warn!(target = %record.domain, error = %e, "Header inspection failed.");
                errors.push(e);
            }
        }
        match run_mail_posture_scan(self.collaborators.resolver.as_ref(), &record.domain).await {
            Ok(found) => findings.extend(found),
            Err(e) => {
                warn!(target = %record.domain, error = %e, "Mail posture inspection failed.");
                errors.push(e);
            }
        }
        let certificate = self.store.findings(record.id).await?.certificate;
        if let Some(cert) = &certificate {
            findings.extend(analyze_certificate(cert));
        }

        // Both network checks failed and there was nothing else to inspect.
        if errors.len() == 2 && certificate.is_none() {
            return Err(errors.swap_remove(0).into());
        }

        let count = findings.len();
        for finding in findings {
            self.persist(record.id, Finding::Vulnerability(finding)).await?;
        }
        Ok(count)
    }

    async fn history(&self, record: &ScanRecord) -> Result<usize, StageError> {
        let mut count = 0;

        if record.options.historical {
            let data = gather_history(self.collaborators.history.as_ref(), &record.domain).await;
            for finding in data.dns {
                self.persist(record.id, Finding::HistoricalDns(finding)).await?;
                count += 1;
            }
            for finding in data.whois {
                self.persist(record.id, Finding::HistoricalWhois(finding)).await?;
                count += 1;
            }
            for finding in data.ips {
                self.persist(record.id, Finding::HistoricalIp(finding)).await?;
                count += 1;
            }
        }

        if record.options.wayback {
            let url = format!("https://{}", record.domain);
            match self.collaborators.archive.snapshots(&url).await {
                Ok(snapshots) => {
                    for snapshot in snapshots {
                        self.persist(record.id, Finding::Archive(snapshot)).await?;
                        count += 1;
                    }
                }
                // The archive is the only part when history is off.
                Err(e) if !record.options.historical => return Err(e.into()),
                Err(e) => warn!(%url, error = %e, "Archive lookup failed."),
            }
        }

        Ok(count)
    }
}

/// Turns a stage body's result into its outcome. Store faults escape.
fn settle(stage: Stage, result: Result<usize, StageError>) -> Result<StageOutcome, ScanError> {
    match result {
        Ok(0) => Ok(StageOutcome::Empty),
        Ok(n) => Ok(StageOutcome::Produced(n)),
        Err(StageError::Collaborator(e)) => {
            warn!(stage = %stage, error = %e, "Stage failed, continuing.");
            Ok(StageOutcome::Failed(e.to_string()))
        }
        Err(StageError::Store(e)) => Err(ScanError::Store(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::StoreError;

    #[test]
    fn checkpoints_increase_in_stage_order() {
        let checkpoints: Vec<u8> = Stage::iter().map(Stage::checkpoint).collect();
        assert_eq!(checkpoints, vec![20, 35, 50, 65, 80, 90, 95, 100]);
        assert!(START_PROGRESS < checkpoints[0]);
    }

    #[test]
    fn history_runs_when_either_flag_is_set() {
        let mut options = ScanOptions { historical: false, ..ScanOptions::default() };
        assert!(Stage::History.enabled(&options));
        options.wayback = false;
        assert!(!Stage::History.enabled(&options));
    }

    #[test]
    fn collaborator_errors_become_failed_outcomes() {
        let outcome = settle(Stage::Ports, Err(CollaboratorError::Dns("SERVFAIL".into()).into())).unwrap();
        assert_eq!(outcome, StageOutcome::Failed("DNS error: SERVFAIL".into()));
        assert_eq!(settle(Stage::Ports, Ok(0)).unwrap(), StageOutcome::Empty);
        assert_eq!(settle(Stage::Ports, Ok(3)).unwrap(), StageOutcome::Produced(3));
    }

    #[test]
    fn store_errors_escape() {
        let result = settle(Stage::NameResolution, Err(StoreError::NotFound(Uuid::nil()).into()));
        assert!(matches!(result, Err(ScanError::Store(StoreError::NotFound(_)))));
    }
}
