// src/core/scanner/subdomain_scanner.rs

//! Subdomain discovery: brute-force resolution plus passive sources, merged
//! into one validated, sorted list.

use crate::config::Settings;
use crate::core::error::{CollaboratorError, CollaboratorResult};
use crate::core::models::{SubdomainFinding, SubdomainOrigin};
use crate::core::scanner::dns_scanner::{resolve_ipv4, NameResolver};
use crate::core::scanner::http_client::build_client;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Labels tried during brute-force resolution.
pub const COMMON_SUBDOMAINS: &[&str] = &[
    "www", "mail", "ftp", "localhost", "webmail", "smtp", "pop", "ns1", "webdisk", "ns2",
    "cpanel", "whm", "autodiscover", "autoconfig", "test", "dev", "staging", "api", "admin",
    "blog", "shop", "forum", "support", "portal", "cdn", "static", "assets", "images", "img",
    "js", "css", "app", "mobile", "m", "vpn", "remote", "git", "jenkins", "gitlab", "github",
    "bitbucket", "jira", "confluence",
];

const MAX_HOSTNAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// A passive source of subdomain names for a domain.
#[async_trait]
pub trait SubdomainSource: Send + Sync {
    fn origin(&self) -> SubdomainOrigin;
    async fn candidates(&self, domain: &str) -> CollaboratorResult<Vec<String>>;
}

// --- Validation & merging ---

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// RFC-1123 style host name with at least two labels.
pub fn is_valid_hostname(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_HOSTNAME_LEN {
        return false;
    }
    if name.contains(char::is_whitespace) || name.contains('*') || name.contains('@') {
        return false;
    }
    let labels: Vec<&str> = name.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| is_valid_label(l))
}

/// Collects candidates from any number of sources for one target domain.
///
/// Names are lower-cased and deduplicated. A name keeps the origin and
/// resolution data of the first source that reported it.
pub struct SubdomainAggregator {
    target: String,
    entries: BTreeMap<String, SubdomainFinding>,
}

impl SubdomainAggregator {
    pub fn new(target: &str) -> Self {
        Self { target: target.trim().to_ascii_lowercase(), entries: BTreeMap::new() }
    }

    fn accepts(&self, name: &str) -> bool {
        let in_scope = name == self.target
            || name
                .strip_suffix(self.target.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'));
        in_scope && is_valid_hostname(name)
    }

    /// Adds one finding; returns whether it was new and in scope.
    pub fn add(&mut self, mut finding: SubdomainFinding) -> bool {
        finding.subdomain = finding.subdomain.trim().to_ascii_lowercase();
        if !self.accepts(&finding.subdomain) || self.entries.contains_key(&finding.subdomain) {
            return false;
        }
        self.entries.insert(finding.subdomain.clone(), finding);
        true
    }

    /// Adds bare names from a passive source; returns how many were new.
    pub fn add_candidates<I, S>(&mut self, origin: Option<SubdomainOrigin>, candidates: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        candidates
            .into_iter()
            .filter(|name| {
                self.add(SubdomainFinding {
                    subdomain: name.as_ref().to_string(),
                    address: None,
                    is_alive: false,
                    origin,
                })
            })
            .count()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    /// Findings sorted ascending by name.
    pub fn into_findings(self) -> Vec<SubdomainFinding> {
        self.entries.into_values().collect()
    }
}

/// Merges bare candidate names against a target domain.
pub fn merge_candidates<S: AsRef<str>>(target: &str, candidates: &[S]) -> Vec<String> {
    let mut aggregator = SubdomainAggregator::new(target);
    aggregator.add_candidates(None, candidates);
    aggregator.into_findings().into_iter().map(|f| f.subdomain).collect()
}

// --- Brute force ---

/// Resolves every common label under `domain`, at most `concurrency` at a time.
pub async fn brute_force(
    resolver: Arc<dyn NameResolver>,
    domain: &str,
    concurrency: usize,
) -> Vec<SubdomainFinding> {
    info!(target = %domain, words = COMMON_SUBDOMAINS.len(), "Starting subdomain brute force.");
    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set = JoinSet::new();

    for label in COMMON_SUBDOMAINS {
        let candidate = format!("{label}.{domain}");
        let resolver = resolver.clone();
        let sem = sem.clone();
        set.spawn(async move {
            // The semaphore is never closed.
            let _permit = sem.acquire_owned().await.ok()?;
            match resolve_ipv4(resolver.as_ref(), &candidate).await {
                Ok(Some(address)) => Some(SubdomainFinding {
                    subdomain: candidate,
                    address: Some(address),
                    is_alive: true,
                    origin: Some(SubdomainOrigin::Dns),
                }),
                Ok(None) => None,
                Err(e) => {
                    debug!(candidate = %candidate, error = %e, "Candidate did not resolve.");
                    None
                }
            }
        });
    }

    let mut found = Vec::new();
    while let Some(res) = set.join_next().await {
        match res {
            Ok(Some(finding)) => found.push(finding),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Brute-force task failed."),
        }
    }
    found.sort_by(|a, b| a.subdomain.cmp(&b.subdomain));
    info!(found = found.len(), "Subdomain brute force finished.");
    found
}

/// Brute force first, then every passive source in order. A failing source
/// contributes nothing.
pub async fn discover_subdomains(
    resolver: Arc<dyn NameResolver>,
    sources: &[Arc<dyn SubdomainSource>],
    domain: &str,
    concurrency: usize,
) -> Vec<SubdomainFinding> {
    let mut aggregator = SubdomainAggregator::new(domain);
    for finding in brute_force(resolver, domain, concurrency).await {
        aggregator.add(finding);
    }

    for source in sources {
        let origin = source.origin();
        match source.candidates(domain).await {
            Ok(names) => {
                let added = aggregator.add_candidates(Some(origin), &names);
                info!(source = %origin, reported = names.len(), added, total = aggregator.len(), "Merged passive subdomains.");
            }
            Err(CollaboratorError::NotConfigured(what)) => {
                warn!(source = %origin, "{what} is not configured, skipping.");
            }
            Err(e) => warn!(source = %origin, error = %e, "Subdomain source failed."),
        }
    }

    aggregator.into_findings()
}

// --- Certificate transparency ---

#[derive(Debug, Deserialize)]
struct CrtShEntry {
    name_value: Option<String>,
}

/// Names from a crt.sh JSON response. `name_value` may hold several names, one per line.
pub fn parse_crtsh(body: &str) -> CollaboratorResult<Vec<String>> {
    let entries: Vec<CrtShEntry> = serde_json::from_str(body)?;
    Ok(entries
        .into_iter()
        .filter_map(|e| e.name_value)
        .flat_map(|v| v.lines().map(|l| l.trim().to_ascii_lowercase()).collect::<Vec<_>>())
        .filter(|name| !name.is_empty())
        .collect())
}

pub struct CrtShSource {
    client: reqwest::Client,
}

impl CrtShSource {
    pub fn new(settings: &Settings) -> CollaboratorResult<Self> {
        let timeout = Duration::from_secs(settings.discovery.crtsh_timeout_secs);
        Ok(Self { client: build_client(settings, timeout)? })
    }
}

#[async_trait]
impl SubdomainSource for CrtShSource {
    fn origin(&self) -> SubdomainOrigin {
        SubdomainOrigin::CrtSh
    }

    async fn candidates(&self, domain: &str) -> CollaboratorResult<Vec<String>> {
        let url = format!("https://crt.sh/?q=%25.{domain}&output=json");
        debug!(url = %url, "Querying certificate transparency logs.");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(CollaboratorError::Status { service: "crt.sh", status: response.status().as_u16() });
        }
        parse_crtsh(&response.text().await?)
    }
}

// --- Scraped source ---

static SCRIPT_LIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"var\s+subdomains\s*=\s*(\[.*?\])").unwrap());

/// Names from the finder's result table and from any inline `var subdomains = [...]`.
pub fn parse_c99_page(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut names = Vec::new();

    if let (Ok(rows), Ok(cell)) = (Selector::parse("table tr"), Selector::parse("td")) {
        for row in document.select(&rows) {
            if let Some(td) = row.select(&cell).next() {
                let text = td.text().collect::<String>().trim().to_string();
                if text.contains('.') && !text.contains(' ') {
                    names.push(text);
                }
            }
        }
    }

    if let Ok(scripts) = Selector::parse("script") {
        for script in document.select(&scripts) {
            let content = script.inner_html();
            if let Some(list) = SCRIPT_LIST_RE.captures(&content).and_then(|c| c.get(1)) {
                match serde_json::from_str::<Vec<String>>(list.as_str()) {
                    Ok(parsed) => names.extend(parsed),
                    Err(e) => debug!(error = %e, "Ignoring malformed inline subdomain list."),
                }
            }
        }
    }

    names
}

pub struct C99Source {
    client: reqwest::Client,
}

impl C99Source {
    pub fn new(settings: &Settings) -> CollaboratorResult<Self> {
        let timeout = Duration::from_secs(settings.discovery.scrape_timeout_secs);
        Ok(Self { client: build_client(settings, timeout)? })
    }
}

#[async_trait]
impl SubdomainSource for C99Source {
    fn origin(&self) -> SubdomainOrigin {
        SubdomainOrigin::C99
    }

    async fn candidates(&self, domain: &str) -> CollaboratorResult<Vec<String>> {
        let url = format!("https://subdomainfinder.c99.nl/scans.php?method=subdomain&domain={domain}");
        debug!(url = %url, "Scraping subdomain finder.");
        let response = self
            .client
            .get(&url)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Referer", "https://subdomainfinder.c99.nl/")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CollaboratorError::Status { service: "c99", status: response.status().as_u16() });
        }
        Ok(parse_c99_page(&response.text().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::RecordKind;

    #[test]
    fn merge_dedupes_filters_and_sorts() {
        let merged = merge_candidates(
            "example.com",
            &["Www.Example.com", "www.example.com", "mail.example.com", "not-this.other.com"],
        );
        assert_eq!(merged, vec!["mail.example.com", "www.example.com"]);
    }

    #[test]
    fn suffix_must_be_a_label_boundary() {
        let merged = merge_candidates("example.com", &["badexample.com", "a.example.com.evil.net", "b.example.com"]);
        assert_eq!(merged, vec!["b.example.com"]);
    }

    #[test]
    fn hostname_validation() {
        assert!(is_valid_hostname("api-v2.example.com"));
        assert!(!is_valid_hostname("*.example.com"));
        assert!(!is_valid_hostname("admin@example.com"));
        assert!(!is_valid_hostname("bad name.example.com"));
        assert!(!is_valid_hostname("-lead.example.com"));
        assert!(!is_valid_hostname("double..example.com"));
        assert!(!is_valid_hostname("localhost"));
        assert!(!is_valid_hostname(&format!("{}.example.com", "a".repeat(64))));
    }

    #[test]
    fn first_source_keeps_its_origin() {
        let mut aggregator = SubdomainAggregator::new("example.com");
        aggregator.add(SubdomainFinding {
            subdomain: "www.example.com".into(),
            address: Some("192.0.2.1".parse().unwrap()),
            is_alive: true,
            origin: Some(SubdomainOrigin::Dns),
        });
        let added = aggregator.add_candidates(Some(SubdomainOrigin::CrtSh), ["WWW.example.com", "dev.example.com"]);
        assert_eq!(added, 1);

        let findings = aggregator.into_findings();
        assert_eq!(findings[0].subdomain, "dev.example.com");
        assert_eq!(findings[0].origin, Some(SubdomainOrigin::CrtSh));
        assert!(!findings[0].is_alive);
        assert_eq!(findings[1].origin, Some(SubdomainOrigin::Dns));
        assert!(findings[1].is_alive);
    }

    #[test]
    fn crtsh_names_are_split_per_line() {
        let body = r#"[
            {"issuer_name":"R3","name_value":"example.com\nwww.example.com"},
            {"issuer_name":"R3","name_value":"*.example.com"},
            {"issuer_name":"R3"}
        ]"#;
        let names = parse_crtsh(body).unwrap();
        assert_eq!(names, vec!["example.com", "www.example.com", "*.example.com"]);
        assert!(parse_crtsh("<html>").is_err());
    }

    #[test]
    fn c99_page_table_and_inline_list() {
        let html = r#"
            <html><body>
            <table>
              <tr><th>Subdomain</th></tr>
              <tr><td>shop.example.com</td><td>192.0.2.4</td></tr>
              <tr><td>no results found</td></tr>
            </table>
            <script>var subdomains = ["cdn.example.com","vpn.example.com"];</script>
            </body></html>
        "#;
        let names = parse_c99_page(html);
        assert_eq!(names, vec!["shop.example.com", "cdn.example.com", "vpn.example.com"]);
    }

    struct OnlyWww;

    #[async_trait]
    impl NameResolver for OnlyWww {
        async fn resolve(&self, name: &str, kind: RecordKind) -> CollaboratorResult<Vec<String>> {
            match (name, kind) {
                ("www.example.com", RecordKind::A) => Ok(vec!["192.0.2.80".into()]),
                ("api.example.com", RecordKind::A) => Err(CollaboratorError::Dns("SERVFAIL".into())),
                _ => Ok(Vec::new()),
            }
        }
    }

    struct Listed(SubdomainOrigin, Vec<&'static str>);

    #[async_trait]
    impl SubdomainSource for Listed {
        fn origin(&self) -> SubdomainOrigin {
            self.0
        }
        async fn candidates(&self, _domain: &str) -> CollaboratorResult<Vec<String>> {
            Ok(self.1.iter().map(|s| s.to_string()).collect())
        }
    }

    struct Broken;

    #[async_trait]
    impl SubdomainSource for Broken {
        fn origin(&self) -> SubdomainOrigin {
            SubdomainOrigin::C99
        }
        async fn candidates(&self, _domain: &str) -> CollaboratorResult<Vec<String>> {
            Err(CollaboratorError::Parse("captcha".into()))
        }
    }

    #[tokio::test]
    async fn discovery_merges_brute_force_and_sources() {
        let sources: Vec<Arc<dyn SubdomainSource>> = vec![
            Arc::new(Listed(SubdomainOrigin::CrtSh, vec!["www.example.com", "legacy.example.com", "*.example.com"])),
            Arc::new(Broken),
        ];
        let findings = discover_subdomains(Arc::new(OnlyWww), &sources, "example.com", 4).await;

        let names: Vec<&str> = findings.iter().map(|f| f.subdomain.as_str()).collect();
        assert_eq!(names, vec!["legacy.example.com", "www.example.com"]);
        assert_eq!(findings[1].address, Some("192.0.2.80".parse().unwrap()));
        assert_eq!(findings[1].origin, Some(SubdomainOrigin::Dns));
    }
}
