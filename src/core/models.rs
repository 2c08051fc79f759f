// src/core/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

// --- Scan Lifecycle ---

/// Lifecycle of a scan. `Completed` and `Failed` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: ScanStatus) -> bool {
        matches!(
            (self, next),
            (ScanStatus::Pending, ScanStatus::Running)
                | (ScanStatus::Running, ScanStatus::Completed)
                | (ScanStatus::Running, ScanStatus::Failed)
        )
    }
}

/// Which stages a scan should run. Disabled stages are skipped but still
/// advance progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    pub whois: bool,
    pub dns: bool,
    pub subdomains: bool,
    pub ports: bool,
    pub technologies: bool,
    pub ssl: bool,
    pub vulnerabilities: bool,
    pub historical: bool,
    pub wayback: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            whois: true,
            dns: true,
            subdomains: true,
            ports: true,
            technologies: true,
            ssl: true,
            vulnerabilities: true,
            historical: true,
            wayback: true,
        }
    }
}

/// The single source of truth for observers polling a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: Uuid,
    pub domain: String,
    pub status: ScanStatus,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure: Option<String>,
    pub options: ScanOptions,
}

impl ScanRecord {
    pub fn new(domain: &str, options: ScanOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            domain: domain.to_string(),
            status: ScanStatus::Pending,
            progress: 0,
            created_at: Utc::now(),
            completed_at: None,
            failure: None,
            options,
        }
    }
}

// --- Severity ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

// --- Registration & DNS ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WhoisSnapshot {
    pub registrar: Option<String>,
    pub creation_date: Option<String>,
    pub expiration_date: Option<String>,
    pub name_servers: Vec<String>,
    pub status: Vec<String>,
    pub raw: String,
}

/// Record types queried during the name-resolution stage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, AsRefStr,
)]
pub enum RecordKind {
    A,
    #[strum(serialize = "AAAA")]
    Aaaa,
    #[strum(serialize = "MX")]
    Mx,
    #[strum(serialize = "NS")]
    Ns,
    #[strum(serialize = "TXT")]
    Txt,
    #[strum(serialize = "CNAME")]
    Cname,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DnsFinding {
    pub kind: RecordKind,
    pub value: String,
}

// --- Subdomains ---

/// Which source first reported a subdomain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum SubdomainOrigin {
    #[strum(serialize = "dns")]
    Dns,
    #[strum(serialize = "crt.sh")]
    CrtSh,
    #[strum(serialize = "securitytrails")]
    SecurityTrails,
    #[strum(serialize = "c99")]
    C99,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubdomainFinding {
    pub subdomain: String,
    pub address: Option<IpAddr>,
    pub is_alive: bool,
    pub origin: Option<SubdomainOrigin>,
}

// --- Ports & Banners ---

/// Only open ports are ever recorded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PortState {
    Open,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortFinding {
    pub host: IpAddr,
    pub port: u16,
    pub service: String,
    pub version: Option<String>,
    pub state: PortState,
}

impl PortFinding {
    pub fn open(host: IpAddr, port: u16) -> Self {
        Self {
            host,
            port,
            service: crate::core::services::service_name(port).to_string(),
            version: None,
            state: PortState::Open,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BannerSample {
    pub port: u16,
    pub service: String,
    pub banner: Option<String>,
    pub version: Option<String>,
}

/// Passive data about an address, as returned by a host-intelligence database.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostIntel {
    pub address: Option<IpAddr>,
    pub ports: Vec<u16>,
    pub hostnames: Vec<String>,
    pub organization: Option<String>,
    pub isp: Option<String>,
    pub asn: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub os: Option<String>,
    pub vulns: Vec<String>,
}

// --- Web ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TechnologyFinding {
    pub name: String,
    pub category: String,
    pub version: Option<String>,
    pub confidence: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VulnerabilityFinding {
    pub severity: Severity,
    pub code: String,
    pub detail: Option<String>,
    pub affected_url: Option<String>,
}

impl VulnerabilityFinding {
    pub fn new(severity: Severity, code: &str) -> Self {
        Self {
            severity,
            code: code.to_string(),
            detail: None,
            affected_url: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn at(mut self, url: &str) -> Self {
        self.affected_url = Some(url.to_string());
        self
    }
}

// --- Certificates ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CertificateSnapshot {
    pub issuer: String,
    pub subject: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub serial_number: String,
    pub signature_algorithm: String,
    pub is_valid: bool,
    pub days_until_expiry: i64,
}

// --- History ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoricalDnsFinding {
    pub kind: String,
    pub value: String,
    pub first_seen: Option<String>,
    pub last_seen: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoricalWhoisFinding {
    pub registrar: Option<String>,
    pub created: Option<String>,
    pub expires: Option<String>,
    pub updated: Option<String>,
    pub name_servers: Vec<String>,
    pub registrant_name: Option<String>,
    pub registrant_org: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoricalIpFinding {
    pub address: String,
    pub first_seen: Option<String>,
    pub last_seen: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveSnapshot {
    /// `YYYYMMDDhhmmss`
    pub timestamp: String,
    pub url: String,
    pub status: String,
}

// --- Findings ---

/// One immutable fact recorded against a scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Finding {
    Whois(WhoisSnapshot),
    Dns(DnsFinding),
    Subdomain(SubdomainFinding),
    Port(PortFinding),
    Banner(BannerSample),
    HostIntel(HostIntel),
    Technology(TechnologyFinding),
    Certificate(CertificateSnapshot),
    Vulnerability(VulnerabilityFinding),
    HistoricalDns(HistoricalDnsFinding),
    HistoricalWhois(HistoricalWhoisFinding),
    HistoricalIp(HistoricalIpFinding),
    Archive(ArchiveSnapshot),
}

/// Everything collected for one scan, grouped by kind in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanFindings {
    pub whois: Option<WhoisSnapshot>,
    pub dns: Vec<DnsFinding>,
    pub subdomains: Vec<SubdomainFinding>,
    pub ports: Vec<PortFinding>,
    pub banners: Vec<BannerSample>,
    pub host_intel: Option<HostIntel>,
    pub technologies: Vec<TechnologyFinding>,
    pub certificate: Option<CertificateSnapshot>,
    pub vulnerabilities: Vec<VulnerabilityFinding>,
    pub historical_dns: Vec<HistoricalDnsFinding>,
    pub historical_whois: Vec<HistoricalWhoisFinding>,
    pub historical_ips: Vec<HistoricalIpFinding>,
    pub archive_snapshots: Vec<ArchiveSnapshot>,
}

impl ScanFindings {
    /// Files a finding under its kind. Single-valued kinds keep the first value.
    pub fn push(&mut self, finding: Finding) {
        match finding {
            Finding::Whois(w) => {
                self.whois.get_or_insert(w);
            }
            Finding::Dns(d) => self.dns.push(d),
            Finding::Subdomain(s) => self.subdomains.push(s),
            Finding::Port(p) => self.ports.push(p),
            Finding::Banner(b) => self.banners.push(b),
            Finding::HostIntel(h) => {
                self.host_intel.get_or_insert(h);
            }
            Finding::Technology(t) => self.technologies.push(t),
            Finding::Certificate(c) => {
                self.certificate.get_or_insert(c);
            }
            Finding::Vulnerability(v) => self.vulnerabilities.push(v),
            Finding::HistoricalDns(h) => self.historical_dns.push(h),
            Finding::HistoricalWhois(h) => self.historical_whois.push(h),
            Finding::HistoricalIp(h) => self.historical_ips.push(h),
            Finding::Archive(a) => self.archive_snapshots.push(a),
        }
    }

    pub fn total(&self) -> usize {
        usize::from(self.whois.is_some())
            + self.dns.len()
            + self.subdomains.len()
            + self.ports.len()
            + self.banners.len()
            + usize::from(self.host_intel.is_some())
            + self.technologies.len()
            + usize::from(self.certificate.is_some())
            + self.vulnerabilities.len()
            + self.historical_dns.len()
            + self.historical_whois.len()
            + self.historical_ips.len()
            + self.archive_snapshots.len()
    }
}

/// A record together with its findings, as seen by an observer at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub record: ScanRecord,
    pub findings: ScanFindings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn only_documented_transitions_are_allowed() {
        use ScanStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Running));
        assert!(!Running.can_transition_to(Pending));
    }

    #[test]
    fn status_round_trips_through_strum() {
        assert_eq!(ScanStatus::Completed.to_string(), "completed");
        assert_eq!(ScanStatus::from_str("failed").unwrap(), ScanStatus::Failed);
    }

    #[test]
    fn single_valued_findings_keep_the_first_value() {
        let mut findings = ScanFindings::default();
        let first = WhoisSnapshot { registrar: Some("First".into()), ..Default::default() };
        let second = WhoisSnapshot { registrar: Some("Second".into()), ..Default::default() };
        findings.push(Finding::Whois(first));
        findings.push(Finding::Whois(second));
        assert_eq!(findings.whois.unwrap().registrar.as_deref(), Some("First"));
    }

    #[test]
    fn record_kind_display_matches_dns_names() {
        assert_eq!(RecordKind::Aaaa.to_string(), "AAAA");
        assert_eq!(RecordKind::Cname.to_string(), "CNAME");
        assert_eq!(RecordKind::A.to_string(), "A");
    }
}
