// src/core/scanner/history_scanner.rs

//! Historical DNS, WHOIS and IP data from a passive intelligence archive.

use crate::config::Settings;
use crate::core::error::{CollaboratorError, CollaboratorResult};
use crate::core::models::{
    HistoricalDnsFinding, HistoricalIpFinding, HistoricalWhoisFinding, SubdomainOrigin,
};
use crate::core::scanner::http_client::build_client;
use crate::core::scanner::subdomain_scanner::SubdomainSource;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SECURITYTRAILS_API_BASE: &str = "https://api.securitytrails.com/v1";

/// Record types whose history is requested.
pub const HISTORY_RECORD_TYPES: &[&str] = &["a", "aaaa", "mx", "ns", "txt", "soa"];

#[async_trait]
pub trait HistoricalIntelSource: Send + Sync {
    async fn dns_history(&self, domain: &str, record_type: &str) -> CollaboratorResult<Vec<HistoricalDnsFinding>>;
    async fn whois_history(&self, domain: &str) -> CollaboratorResult<Vec<HistoricalWhoisFinding>>;
    /// Fully-qualified subdomain names.
    async fn subdomains(&self, domain: &str) -> CollaboratorResult<Vec<String>>;
    async fn ip_history(&self, domain: &str) -> CollaboratorResult<Vec<HistoricalIpFinding>>;
}

/// Everything the archive knows about a domain. A failed sub-query leaves its part empty.
#[derive(Debug, Clone, Default)]
pub struct HistoricalData {
    pub dns: Vec<HistoricalDnsFinding>,
    pub whois: Vec<HistoricalWhoisFinding>,
    pub ips: Vec<HistoricalIpFinding>,
}

/// A failed sub-query empties its part. `Err` carries the name of an
/// unconfigured service, which makes every further sub-query pointless.
fn or_empty<T>(what: &str, result: CollaboratorResult<Vec<T>>) -> Result<Vec<T>, String> {
    match result {
        Ok(items) => Ok(items),
        Err(CollaboratorError::NotConfigured(service)) => Err(service.to_string()),
        Err(e) => {
            warn!(query = what, error = %e, "Historical sub-query failed.");
            Ok(Vec::new())
        }
    }
}

async fn collect(source: &dyn HistoricalIntelSource, domain: &str, data: &mut HistoricalData) -> Result<(), String> {
    for record_type in HISTORY_RECORD_TYPES {
        data.dns.extend(or_empty(record_type, source.dns_history(domain, record_type).await)?);
    }
    data.whois = or_empty("whois", source.whois_history(domain).await)?;
    data.ips = or_empty("ip", source.ip_history(domain).await)?;
    Ok(())
}

pub async fn gather_history(source: &dyn HistoricalIntelSource, domain: &str) -> HistoricalData {
    let mut data = HistoricalData::default();
    match collect(source, domain, &mut data).await {
        Ok(()) => info!(
            dns = data.dns.len(),
            whois = data.whois.len(),
            ips = data.ips.len(),
            "Historical enrichment gathered."
        ),
        Err(service) => warn!("{service} is not configured, skipping historical enrichment."),
    }
    data
}

/// Exposes the archive's subdomain list as a discovery source, capped at `limit` names.
pub struct HistorySubdomains {
    source: Arc<dyn HistoricalIntelSource>,
    limit: usize,
}

impl HistorySubdomains {
    pub fn new(source: Arc<dyn HistoricalIntelSource>, limit: usize) -> Self {
        Self { source, limit }
    }
}

#[async_trait]
impl SubdomainSource for HistorySubdomains {
    fn origin(&self) -> SubdomainOrigin {
        SubdomainOrigin::SecurityTrails
    }

    async fn candidates(&self, domain: &str) -> CollaboratorResult<Vec<String>> {
        let mut names = self.source.subdomains(domain).await?;
        names.truncate(self.limit);
        Ok(names)
    }
}

// --- SecurityTrails wire format ---

#[derive(Debug, Deserialize)]
struct DnsHistoryPage {
    #[serde(default)]
    records: Vec<DnsHistoryRecord>,
}

#[derive(Debug, Deserialize)]
struct DnsHistoryRecord {
    #[serde(default)]
    values: Vec<DnsHistoryValue>,
    first_seen: Option<String>,
    last_seen: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DnsHistoryValue {
    ip: Option<String>,
    value: Option<String>,
    host: Option<String>,
    nameserver: Option<String>,
    email: Option<String>,
    first_seen: Option<String>,
    last_seen: Option<String>,
}

impl DnsHistoryValue {
    fn text(&self) -> Option<&str> {
        [&self.ip, &self.value, &self.host, &self.nameserver, &self.email]
            .into_iter()
            .find_map(|v| v.as_deref())
    }
}

/// Flattens a DNS history page. Value-level dates win over record-level ones.
pub fn parse_dns_history(body: &str, record_type: &str) -> CollaboratorResult<Vec<HistoricalDnsFinding>> {
    let page: DnsHistoryPage = serde_json::from_str(body)?;
    let kind = record_type.to_ascii_uppercase();
    let kind = kind.as_str();
    Ok(page
        .records
        .iter()
        .flat_map(|record| {
            record.values.iter().filter_map(move |v| {
                Some(HistoricalDnsFinding {
                    kind: kind.to_string(),
                    value: v.text()?.to_string(),
                    first_seen: v.first_seen.clone().or_else(|| record.first_seen.clone()),
                    last_seen: v.last_seen.clone().or_else(|| record.last_seen.clone()),
                })
            })
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct WhoisHistoryPage {
    result: Option<WhoisHistoryResult>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WhoisHistoryResult {
    List(Vec<WhoisHistoryItem>),
    Paged {
        #[serde(default)]
        items: Vec<WhoisHistoryItem>,
    },
}

#[derive(Debug, Deserialize)]
struct WhoisHistoryItem {
    registrar: Option<Value>,
    #[serde(alias = "createdDate")]
    created: Option<Value>,
    #[serde(alias = "expiresDate")]
    expires: Option<Value>,
    #[serde(alias = "updatedDate")]
    updated: Option<Value>,
    #[serde(default, alias = "nameServers")]
    nameservers: Vec<String>,
    contacts: Option<WhoisContacts>,
}

#[derive(Debug, Deserialize)]
struct WhoisContacts {
    registrant: Option<WhoisContact>,
}

#[derive(Debug, Deserialize)]
struct WhoisContact {
    name: Option<String>,
    organization: Option<String>,
}

/// Strings stay as they are; numbers (epoch millis) are kept in decimal.
fn scalar_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn parse_whois_history(body: &str) -> CollaboratorResult<Vec<HistoricalWhoisFinding>> {
    let page: WhoisHistoryPage = serde_json::from_str(body)?;
    let items = match page.result {
        Some(WhoisHistoryResult::List(items)) | Some(WhoisHistoryResult::Paged { items }) => items,
        None => Vec::new(),
    };
    Ok(items
        .into_iter()
        .map(|item| {
            let registrant = item.contacts.and_then(|c| c.registrant);
            HistoricalWhoisFinding {
                registrar: scalar_text(item.registrar),
                created: scalar_text(item.created),
                expires: scalar_text(item.expires),
                updated: scalar_text(item.updated),
                name_servers: item.nameservers,
                registrant_name: registrant.as_ref().and_then(|r| r.name.clone()),
                registrant_org: registrant.and_then(|r| r.organization),
            }
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct SubdomainPage {
    #[serde(default)]
    subdomains: Vec<String>,
}

/// Labels from the archive, qualified with the domain.
pub fn parse_subdomains(body: &str, domain: &str) -> CollaboratorResult<Vec<String>> {
    let page: SubdomainPage = serde_json::from_str(body)?;
    Ok(page
        .subdomains
        .into_iter()
        .filter(|label| !label.is_empty())
        .map(|label| format!("{label}.{domain}"))
        .collect())
}

pub struct SecurityTrailsClient {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl SecurityTrailsClient {
    pub fn new(settings: &Settings) -> CollaboratorResult<Self> {
        Ok(Self {
            client: build_client(settings, settings.http_timeout())?,
            api_key: settings.api.securitytrails_api_key.clone(),
        })
    }

    async fn get_text(&self, endpoint: &str) -> CollaboratorResult<String> {
        let key = self.api_key.as_deref().ok_or(CollaboratorError::NotConfigured("SecurityTrails"))?;
        let url = format!("{SECURITYTRAILS_API_BASE}{endpoint}");
        debug!(url = %url, "Querying SecurityTrails.");
        let response = self
            .client
            .get(&url)
            .header("APIKEY", key)
            .header("Accept", "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CollaboratorError::Status {
                service: "SecurityTrails",
                status: response.status().as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl HistoricalIntelSource for SecurityTrailsClient {
    async fn dns_history(&self, domain: &str, record_type: &str) -> CollaboratorResult<Vec<HistoricalDnsFinding>> {
        parse_dns_history(&self.get_text(&format!("/history/{domain}/dns/{record_type}")).await?, record_type)
    }

    async fn whois_history(&self, domain: &str) -> CollaboratorResult<Vec<HistoricalWhoisFinding>> {
        parse_whois_history(&self.get_text(&format!("/history/{domain}/whois")).await?)
    }

    async fn subdomains(&self, domain: &str) -> CollaboratorResult<Vec<String>> {
        parse_subdomains(&self.get_text(&format!("/domain/{domain}/subdomains")).await?, domain)
    }

    async fn ip_history(&self, domain: &str) -> CollaboratorResult<Vec<HistoricalIpFinding>> {
        let records = self.dns_history(domain, "a").await?;
        Ok(records
            .into_iter()
            .map(|r| HistoricalIpFinding { address: r.value, first_seen: r.first_seen, last_seen: r.last_seen })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dns_history_uses_the_right_value_field() {
        let body = r#"{"records":[
            {"type":"a","first_seen":"2019-01-01","last_seen":"2021-06-30",
             "values":[{"ip":"192.0.2.1","ip_count":4},{"ip":"192.0.2.2","first_seen":"2020-02-02"}]},
            {"type":"mx","values":[{"host":"mx1.example.com","mx_count":1}]},
            {"values":[{"unknown":"x"}]}
        ]}"#;
        let records = parse_dns_history(body, "a").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].kind, "A");
        assert_eq!(records[0].value, "192.0.2.1");
        assert_eq!(records[0].first_seen.as_deref(), Some("2019-01-01"));
        assert_eq!(records[1].first_seen.as_deref(), Some("2020-02-02"));
        assert_eq!(records[1].last_seen.as_deref(), Some("2021-06-30"));
        assert_eq!(records[2].value, "mx1.example.com");
    }

    #[test]
    fn whois_history_accepts_both_result_shapes() {
        let list = r#"{"result":[{"registrar":"Example Registrar","created":"2001-01-01",
            "nameservers":["ns1.example.com"],"contacts":{"registrant":{"name":"J. Doe","organization":"Example Ltd"}}}]}"#;
        let items = parse_whois_history(list).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].registrar.as_deref(), Some("Example Registrar"));
        assert_eq!(items[0].registrant_org.as_deref(), Some("Example Ltd"));
        assert_eq!(items[0].name_servers, vec!["ns1.example.com"]);

        let paged = r#"{"result":{"count":1,"items":[{"createdDate":981072000000,"nameServers":[]}]}}"#;
        let items = parse_whois_history(paged).unwrap();
        assert_eq!(items[0].created.as_deref(), Some("981072000000"));
        assert!(items[0].registrar.is_none());

        assert!(parse_whois_history(r#"{"endpoint":"/v1/history/x/whois"}"#).unwrap().is_empty());
    }

    #[test]
    fn subdomain_labels_are_qualified() {
        let body = r#"{"subdomains":["www","mail",""],"subdomain_count":3}"#;
        assert_eq!(
            parse_subdomains(body, "example.com").unwrap(),
            vec!["www.example.com", "mail.example.com"]
        );
    }

    struct PartlyBroken;

    #[async_trait]
    impl HistoricalIntelSource for PartlyBroken {
        async fn dns_history(&self, _d: &str, record_type: &str) -> CollaboratorResult<Vec<HistoricalDnsFinding>> {
            if record_type == "mx" {
                return Err(CollaboratorError::Status { service: "SecurityTrails", status: 429 });
            }
            Ok(vec![HistoricalDnsFinding {
                kind: record_type.to_ascii_uppercase(),
                value: "v".into(),
                first_seen: None,
                last_seen: None,
            }])
        }
        async fn whois_history(&self, _d: &str) -> CollaboratorResult<Vec<HistoricalWhoisFinding>> {
            Err(CollaboratorError::Parse("bad".into()))
        }
        async fn subdomains(&self, d: &str) -> CollaboratorResult<Vec<String>> {
            Ok((0..150).map(|i| format!("h{i}.{d}")).collect())
        }
        async fn ip_history(&self, _d: &str) -> CollaboratorResult<Vec<HistoricalIpFinding>> {
            Ok(vec![HistoricalIpFinding { address: "192.0.2.9".into(), first_seen: None, last_seen: None }])
        }
    }

    #[derive(Default)]
    struct Unconfigured {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl Unconfigured {
        fn missing<T>(&self) -> CollaboratorResult<Vec<T>> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(CollaboratorError::NotConfigured("SecurityTrails API key"))
        }
    }

    #[async_trait]
    impl HistoricalIntelSource for Unconfigured {
        async fn dns_history(&self, _d: &str, _t: &str) -> CollaboratorResult<Vec<HistoricalDnsFinding>> {
            self.missing()
        }
        async fn whois_history(&self, _d: &str) -> CollaboratorResult<Vec<HistoricalWhoisFinding>> {
            self.missing()
        }
        async fn subdomains(&self, _d: &str) -> CollaboratorResult<Vec<String>> {
            self.missing()
        }
        async fn ip_history(&self, _d: &str) -> CollaboratorResult<Vec<HistoricalIpFinding>> {
            self.missing()
        }
    }

    #[tokio::test]
    async fn missing_key_stops_after_first_query() {
        let source = Unconfigured::default();
        let data = gather_history(&source, "example.com").await;
        assert_eq!(source.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(data.dns.is_empty() && data.whois.is_empty() && data.ips.is_empty());
    }

    #[tokio::test]
    async fn failed_sub_queries_only_empty_their_part() {
        let data = gather_history(&PartlyBroken, "example.com").await;
        assert_eq!(data.dns.len(), HISTORY_RECORD_TYPES.len() - 1);
        assert!(data.whois.is_empty());
        assert_eq!(data.ips.len(), 1);
    }

    #[tokio::test]
    async fn subdomain_source_is_capped() {
        let source = HistorySubdomains::new(Arc::new(PartlyBroken), 100);
        assert_eq!(source.candidates("example.com").await.unwrap().len(), 100);
    }
}
