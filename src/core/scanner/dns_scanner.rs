// src/core/scanner/dns_scanner.rs

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::core::error::{CollaboratorError, CollaboratorResult};
use crate::core::models::{DnsFinding, RecordKind, Severity, VulnerabilityFinding};
use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;
use strum::IntoEnumIterator;

/// A list of common DKIM selectors to check for when a specific one is not known.
const COMMON_DKIM_SELECTORS: &[&str] = &["google", "selector1", "selector2", "default", "dkim"];

/// Answers name queries. "No records" is an empty list, not an error.
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn resolve(&self, name: &str, kind: RecordKind) -> CollaboratorResult<Vec<String>>;
}

/// First IPv4 address for a name, if any.
pub async fn resolve_ipv4(resolver: &dyn NameResolver, name: &str) -> CollaboratorResult<Option<IpAddr>> {
    let answers = resolver.resolve(name, RecordKind::A).await?;
    Ok(answers.iter().find_map(|a| a.parse::<IpAddr>().ok()))
}

pub struct HickoryNameResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryNameResolver {
    pub fn new(settings: &Settings) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = settings.probe_timeout();
        Self { resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), opts) }
    }
}

fn record_type(kind: RecordKind) -> RecordType {
    match kind {
        RecordKind::A => RecordType::A,
        RecordKind::Aaaa => RecordType::AAAA,
        RecordKind::Mx => RecordType::MX,
        RecordKind::Ns => RecordType::NS,
        RecordKind::Txt => RecordType::TXT,
        RecordKind::Cname => RecordType::CNAME,
    }
}

/// Text form of one answer: MX as `"<priority> <exchange>"`, TXT strings
/// joined by a space, names without the trailing dot.
fn render(rdata: &RData) -> String {
    match rdata {
        RData::MX(mx) => format!("{} {}", mx.preference(), mx.exchange()).trim_end_matches('.').to_string(),
        RData::TXT(txt) => txt
            .txt_data()
            .iter()
            .map(|part| String::from_utf8_lossy(part).into_owned())
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string().trim_end_matches('.').to_string(),
    }
}

#[async_trait]
impl NameResolver for HickoryNameResolver {
    async fn resolve(&self, name: &str, kind: RecordKind) -> CollaboratorResult<Vec<String>> {
        let rtype = record_type(kind);
        match self.resolver.lookup(name, rtype).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .filter(|rdata| rdata.record_type() == rtype)
                .map(render)
                .collect()),
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => {
                debug!(name, kind = %kind, "No records.");
                Ok(Vec::new())
            }
            Err(e) => Err(CollaboratorError::Dns(e.to_string())),
        }
    }
}

/// Queries every record kind for the domain.
///
/// A failed query for one kind is logged and contributes nothing; the other
/// kinds are still collected. Only when every query fails is the last error
/// returned.
pub async fn run_dns_scan(resolver: &dyn NameResolver, domain: &str) -> CollaboratorResult<Vec<DnsFinding>> {
    info!(target = %domain, "Starting DNS scan.");
    let mut findings = Vec::new();
    let mut answered = false;
    let mut last_error = None;
    for kind in RecordKind::iter() {
        match resolver.resolve(domain, kind).await {
            Ok(values) => {
                debug!(kind = %kind, count = values.len(), "DNS answers received.");
                answered = true;
                findings.extend(values.into_iter().map(|value| DnsFinding { kind, value }));
            }
            Err(e) => {
                warn!(kind = %kind, error = %e, "DNS lookup failed.");
                last_error = Some(e);
            }
        }
    }
    match last_error {
        Some(e) if !answered => Err(e),
        _ => {
            info!(records = findings.len(), "DNS scan finished.");
            Ok(findings)
        }
    }
}

// --- Mail posture ---

/// Looks up SPF, DMARC and DKIM and reports weaknesses.
///
/// Returns an error only when the SPF lookup itself fails, so a dead resolver
/// does not read as "SPF missing".
pub async fn run_mail_posture_scan(
    resolver: &dyn NameResolver,
    domain: &str,
) -> CollaboratorResult<Vec<VulnerabilityFinding>> {
    // Strip "www." prefix to query the root domain, which is standard for these record types.
    let root = domain.strip_prefix("www.").unwrap_or(domain);
    debug!(target = %root, "Looking up mail authentication records.");

    let txt = resolver.resolve(root, RecordKind::Txt).await?;
    let spf = txt.into_iter().find(|r| r.starts_with("v=spf1"));

    let dmarc_target = format!("_dmarc.{root}");
    let dmarc = match resolver.resolve(&dmarc_target, RecordKind::Txt).await {
        Ok(records) => records.into_iter().find(|r| r.starts_with("v=DMARC1")),
        Err(e) => {
            warn!(target = %dmarc_target, error = %e, "DMARC lookup failed.");
            None
        }
    };

    let mut dkim_found = false;
    for selector in COMMON_DKIM_SELECTORS {
        let dkim_target = format!("{selector}._domainkey.{root}");
        match resolver.resolve(&dkim_target, RecordKind::Txt).await {
            Ok(records) if records.iter().any(|r| r.starts_with("v=DKIM1")) => {
                debug!(selector, "Found valid DKIM record.");
                dkim_found = true;
                break;
            }
            Ok(_) => {}
            // It's common for some selectors not to exist.
            Err(e) => debug!(selector, error = %e, "DKIM lookup for this selector failed."),
        }
    }

    Ok(analyze_mail_records(spf.as_deref(), dmarc.as_deref(), dkim_found))
}

/// Value of the DMARC `p=` tag.
fn dmarc_policy(record: &str) -> Option<&str> {
    record
        .split(';')
        .find_map(|tag| tag.trim().strip_prefix("p="))
        .map(str::trim)
}

pub fn analyze_mail_records(
    spf: Option<&str>,
    dmarc: Option<&str>,
    dkim_found: bool,
) -> Vec<VulnerabilityFinding> {
    let mut findings = Vec::new();

    match dmarc {
        Some(record) if dmarc_policy(record) == Some("none") => {
            findings.push(VulnerabilityFinding::new(Severity::Warning, "DNS_DMARC_POLICY_NONE").with_detail(record));
        }
        Some(_) => {}
        None => findings.push(VulnerabilityFinding::new(Severity::Critical, "DNS_DMARC_MISSING")),
    }

    match spf {
        Some(record) if record.ends_with("~all") => {
            findings.push(VulnerabilityFinding::new(Severity::Info, "DNS_SPF_POLICY_SOFTFAIL").with_detail(record));
        }
        Some(record) if record.ends_with("?all") => {
            findings.push(VulnerabilityFinding::new(Severity::Info, "DNS_SPF_POLICY_NEUTRAL").with_detail(record));
        }
        Some(_) => {}
        None => findings.push(VulnerabilityFinding::new(Severity::Warning, "DNS_SPF_MISSING")),
    }

    if !dkim_found {
        findings.push(VulnerabilityFinding::new(Severity::Info, "DNS_DKIM_MISSING"));
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FixedResolver(HashMap<(String, RecordKind), Vec<String>>);

    impl FixedResolver {
        fn new(entries: &[(&str, RecordKind, &str)]) -> Self {
            let mut map: HashMap<(String, RecordKind), Vec<String>> = HashMap::new();
            for (name, kind, value) in entries {
                map.entry((name.to_string(), *kind)).or_default().push(value.to_string());
            }
            Self(map)
        }
    }

    #[async_trait]
    impl NameResolver for FixedResolver {
        async fn resolve(&self, name: &str, kind: RecordKind) -> CollaboratorResult<Vec<String>> {
            if kind == RecordKind::Cname {
                return Err(CollaboratorError::Dns("SERVFAIL".into()));
            }
            Ok(self.0.get(&(name.to_string(), kind)).cloned().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn collects_every_kind_and_tolerates_one_failure() {
        let resolver = FixedResolver::new(&[
            ("example.com", RecordKind::A, "192.0.2.10"),
            ("example.com", RecordKind::Mx, "10 mail.example.com"),
            ("example.com", RecordKind::Ns, "ns1.example.com"),
            ("example.com", RecordKind::Ns, "ns2.example.com"),
        ]);
        let findings = run_dns_scan(&resolver, "example.com").await.unwrap();
        assert_eq!(findings.len(), 4);
        assert_eq!(findings[0], DnsFinding { kind: RecordKind::A, value: "192.0.2.10".into() });
        assert!(findings.iter().all(|f| f.kind != RecordKind::Cname));
    }

    struct DeadResolver;

    #[async_trait]
    impl NameResolver for DeadResolver {
        async fn resolve(&self, _name: &str, _kind: RecordKind) -> CollaboratorResult<Vec<String>> {
            Err(CollaboratorError::Dns("no nameservers reachable".into()))
        }
    }

    #[tokio::test]
    async fn dead_resolver_is_an_error() {
        assert!(matches!(run_dns_scan(&DeadResolver, "example.com").await, Err(CollaboratorError::Dns(_))));
        assert!(run_mail_posture_scan(&DeadResolver, "example.com").await.is_err());
    }

    #[tokio::test]
    async fn first_ipv4_is_parsed() {
        let resolver = FixedResolver::new(&[("example.com", RecordKind::A, "192.0.2.10")]);
        let ip = resolve_ipv4(&resolver, "example.com").await.unwrap();
        assert_eq!(ip, Some("192.0.2.10".parse().unwrap()));
        assert_eq!(resolve_ipv4(&resolver, "nothing.example.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn reports_missing_mail_records() {
        let resolver = FixedResolver::new(&[("example.com", RecordKind::Txt, "v=spf1 include:_spf.example.net ~all")]);
        let findings = run_mail_posture_scan(&resolver, "www.example.com").await.unwrap();
        let codes: Vec<&str> = findings.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, vec!["DNS_DMARC_MISSING", "DNS_SPF_POLICY_SOFTFAIL", "DNS_DKIM_MISSING"]);
    }

    #[test]
    fn strict_configuration_has_no_findings() {
        let findings = analyze_mail_records(
            Some("v=spf1 mx -all"),
            Some("v=DMARC1; p=reject; rua=mailto:d@example.com"),
            true,
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn dmarc_policy_none_is_a_warning() {
        let findings = analyze_mail_records(Some("v=spf1 -all"), Some("v=DMARC1; p=none"), true);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[0].code, "DNS_DMARC_POLICY_NONE");
    }
}
