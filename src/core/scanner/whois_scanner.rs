// src/core/scanner/whois_scanner.rs

use crate::core::error::{CollaboratorError, CollaboratorResult};
use crate::core::models::WhoisSnapshot;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

/// Raw text stored when no registration data could be obtained.
pub const WHOIS_UNAVAILABLE: &str = "WHOIS lookup not available for this domain";

const IANA_WHOIS_SERVER: &str = "whois.iana.org";
const WHOIS_PORT: u16 = 43;
const WHOIS_TIMEOUT: Duration = Duration::from_secs(10);

/// Returns unstructured registration text for a domain.
#[async_trait]
pub trait RegistrationLookup: Send + Sync {
    async fn lookup(&self, domain: &str) -> CollaboratorResult<String>;
}

/// Plain port-43 WHOIS: ask IANA for the registry server, then ask the registry.
pub struct WhoisClient {
    timeout: Duration,
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self { timeout: WHOIS_TIMEOUT }
    }
}

impl WhoisClient {
    async fn query(&self, server: &str, domain: &str) -> CollaboratorResult<String> {
        debug!(server, domain, "Sending WHOIS query.");
        let exchange = async {
            let mut stream = TcpStream::connect((server, WHOIS_PORT)).await?;
            stream.write_all(format!("{domain}\r\n").as_bytes()).await?;
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await?;
            Ok::<_, std::io::Error>(String::from_utf8_lossy(&buf).into_owned())
        };
        timeout(self.timeout, exchange)
            .await
            .map_err(|_| CollaboratorError::Timeout(self.timeout))?
            .map_err(CollaboratorError::from)
    }
}

#[async_trait]
impl RegistrationLookup for WhoisClient {
    async fn lookup(&self, domain: &str) -> CollaboratorResult<String> {
        let iana = self.query(IANA_WHOIS_SERVER, domain).await?;
        match referral_server(&iana) {
            Some(server) => {
                info!(domain, server = %server, "Following WHOIS referral.");
                self.query(&server, domain).await
            }
            None => Ok(iana),
        }
    }
}

/// The `refer:` / `whois:` server named in an IANA response.
fn referral_server(raw: &str) -> Option<String> {
    raw.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        ((key == "refer" || key == "whois") && !value.is_empty()).then(|| value.to_string())
    })
}

/// Extracts registrar, dates, name servers and status tokens line by line.
///
/// Unknown formats simply leave fields empty; the raw text is always kept.
pub fn parse_whois(raw: &str) -> WhoisSnapshot {
    let mut snapshot = WhoisSnapshot { raw: raw.to_string(), ..Default::default() };

    for line in raw.lines() {
        let lower = line.to_ascii_lowercase();
        let Some((_, value)) = line.split_once(':') else { continue };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        if lower.contains("registrar:") {
            snapshot.registrar.get_or_insert_with(|| value.to_string());
        } else if lower.contains("creation date:") || lower.contains("created:") {
            snapshot.creation_date.get_or_insert_with(|| value.to_string());
        } else if lower.contains("expiration date:")
            || lower.contains("expires:")
            || lower.contains("registry expiry date:")
        {
            snapshot.expiration_date.get_or_insert_with(|| value.to_string());
        } else if lower.contains("name server:") || lower.contains("nserver:") {
            let ns = value.split_whitespace().next().unwrap_or(value).to_ascii_lowercase();
            if !snapshot.name_servers.contains(&ns) {
                snapshot.name_servers.push(ns);
            }
        } else if lower.contains("status:") {
            if let Some(token) = value.split_whitespace().next() {
                if !snapshot.status.iter().any(|s| s == token) {
                    snapshot.status.push(token.to_string());
                }
            }
        }
    }

    snapshot
}

/// Snapshot recorded when the lookup itself failed.
pub fn unavailable_snapshot() -> WhoisSnapshot {
    WhoisSnapshot { raw: WHOIS_UNAVAILABLE.to_string(), ..Default::default() }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERISIGN_STYLE: &str = "\
   Domain Name: EXAMPLE.COM\r
   Registry Domain ID: 2336799_DOMAIN_COM-VRSN\r
   Registrar WHOIS Server: whois.iana.org\r
   Updated Date: 2024-08-14T07:01:34Z\r
   Creation Date: 1995-08-14T04:00:00Z\r
   Registry Expiry Date: 2025-08-13T04:00:00Z\r
   Registrar: RESERVED-Internet Assigned Numbers Authority\r
   Domain Status: clientDeleteProhibited https://icann.org/epp#clientDeleteProhibited\r
   Domain Status: clientTransferProhibited https://icann.org/epp#clientTransferProhibited\r
   Name Server: A.IANA-SERVERS.NET\r
   Name Server: B.IANA-SERVERS.NET\r
";

    #[test]
    fn parses_registry_response() {
        let snapshot = parse_whois(VERISIGN_STYLE);
        assert_eq!(
            snapshot.registrar.as_deref(),
            Some("RESERVED-Internet Assigned Numbers Authority")
        );
        assert_eq!(snapshot.creation_date.as_deref(), Some("1995-08-14T04:00:00Z"));
        assert_eq!(snapshot.expiration_date.as_deref(), Some("2025-08-13T04:00:00Z"));
        assert_eq!(snapshot.name_servers, vec!["a.iana-servers.net", "b.iana-servers.net"]);
        assert_eq!(snapshot.status, vec!["clientDeleteProhibited", "clientTransferProhibited"]);
        assert_eq!(snapshot.raw, VERISIGN_STYLE);
    }

    #[test]
    fn accepts_ripe_style_keys() {
        let raw = "domain: example.nl\ncreated: 2001-02-03\nexpires: 2030-02-03\nnserver: ns1.example.nl\nnserver: ns2.example.nl\n";
        let snapshot = parse_whois(raw);
        assert_eq!(snapshot.creation_date.as_deref(), Some("2001-02-03"));
        assert_eq!(snapshot.expiration_date.as_deref(), Some("2030-02-03"));
        assert_eq!(snapshot.name_servers.len(), 2);
        assert!(snapshot.registrar.is_none());
    }

    #[test]
    fn empty_text_yields_empty_snapshot() {
        let snapshot = parse_whois("");
        assert_eq!(snapshot, WhoisSnapshot::default());
    }

    #[test]
    fn finds_iana_referral() {
        let raw = "% IANA WHOIS server\n\nrefer:        whois.verisign-grs.com\n\ndomain:       COM\n";
        assert_eq!(referral_server(raw).as_deref(), Some("whois.verisign-grs.com"));
        assert_eq!(referral_server("domain: COM\n"), None);
    }
}
