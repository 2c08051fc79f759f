// src/core/scanner/host_intel.rs

//! Passive host intelligence, and the choice between it and active probing.

use crate::config::Settings;
use crate::core::error::{CollaboratorError, CollaboratorResult};
use crate::core::models::{HostIntel, PortFinding};
use crate::core::scanner::http_client::build_client;
use crate::core::scanner::port_scanner::PortProbe;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::net::IpAddr;
use tracing::{debug, info, warn};

const SHODAN_API_BASE: &str = "https://api.shodan.io";

/// Previously collected data about an address. `Ok(None)` means "nothing known".
#[async_trait]
pub trait HostIntelSource: Send + Sync {
    async fn host(&self, address: IpAddr) -> CollaboratorResult<Option<HostIntel>>;
}

#[derive(Debug, Deserialize)]
struct ShodanHost {
    #[serde(default)]
    ports: Vec<u16>,
    #[serde(default)]
    hostnames: Vec<String>,
    org: Option<String>,
    isp: Option<String>,
    asn: Option<String>,
    country_name: Option<String>,
    city: Option<String>,
    os: Option<String>,
    #[serde(default)]
    vulns: Vec<String>,
}

impl ShodanHost {
    fn into_intel(self, address: IpAddr) -> HostIntel {
        HostIntel {
            address: Some(address),
            ports: self.ports,
            hostnames: self.hostnames,
            organization: self.org,
            isp: self.isp,
            asn: self.asn,
            country: self.country_name,
            city: self.city,
            os: self.os,
            vulns: self.vulns,
        }
    }
}

pub fn parse_shodan_host(body: &str, address: IpAddr) -> CollaboratorResult<HostIntel> {
    let host: ShodanHost = serde_json::from_str(body)?;
    Ok(host.into_intel(address))
}

pub struct ShodanClient {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl ShodanClient {
    pub fn new(settings: &Settings) -> CollaboratorResult<Self> {
        Ok(Self {
            client: build_client(settings, settings.http_timeout())?,
            api_key: settings.api.shodan_api_key.clone(),
        })
    }
}

#[async_trait]
impl HostIntelSource for ShodanClient {
    async fn host(&self, address: IpAddr) -> CollaboratorResult<Option<HostIntel>> {
        let key = self.api_key.as_deref().ok_or(CollaboratorError::NotConfigured("Shodan"))?;
        let url = format!("{SHODAN_API_BASE}/shodan/host/{address}");
        let response = self.client.get(&url).query(&[("key", key)]).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(%address, "Shodan has no data for this address.");
                Ok(None)
            }
            status if status.is_success() => {
                let intel = parse_shodan_host(&response.text().await?, address)?;
                info!(%address, ports = intel.ports.len(), "Received Shodan host data.");
                Ok(Some(intel))
            }
            status => Err(CollaboratorError::Status { service: "Shodan", status: status.as_u16() }),
        }
    }
}

// --- Fallback ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSource {
    Passive,
    Active,
}

#[derive(Debug, Clone)]
pub struct PortSelection {
    pub source: PortSource,
    pub ports: Vec<PortFinding>,
    /// Whatever the passive source returned, even if it listed no ports.
    pub intel: Option<HostIntel>,
}

/// Uses the passive port list when it is non-empty, otherwise probes actively.
///
/// Decided once per scan. Passive failures of any kind fall back to probing.
pub async fn choose_ports(
    intel_source: &dyn HostIntelSource,
    prober: &dyn PortProbe,
    address: IpAddr,
) -> PortSelection {
    let intel = match intel_source.host(address).await {
        Ok(intel) => intel,
        Err(CollaboratorError::NotConfigured(what)) => {
            warn!("{what} is not configured, using active probing.");
            None
        }
        Err(e) => {
            warn!(%address, error = %e, "Host intelligence lookup failed, using active probing.");
            None
        }
    };

    if let Some(found) = intel.as_ref().filter(|i| !i.ports.is_empty()) {
        let mut ports = found.ports.clone();
        ports.sort_unstable();
        ports.dedup();
        info!(%address, ports = ports.len(), "Using passive port data.");
        return PortSelection {
            source: PortSource::Passive,
            ports: ports.into_iter().map(|p| PortFinding::open(address, p)).collect(),
            intel,
        };
    }

    PortSelection { source: PortSource::Active, ports: prober.probe(address).await, intel }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProber(AtomicUsize);

    #[async_trait]
    impl PortProbe for CountingProber {
        async fn probe(&self, host: IpAddr) -> Vec<PortFinding> {
            self.0.fetch_add(1, Ordering::SeqCst);
            vec![PortFinding::open(host, 22)]
        }
    }

    struct FixedIntel(Option<Vec<u16>>);

    #[async_trait]
    impl HostIntelSource for FixedIntel {
        async fn host(&self, address: IpAddr) -> CollaboratorResult<Option<HostIntel>> {
            Ok(self.0.clone().map(|ports| HostIntel { address: Some(address), ports, ..Default::default() }))
        }
    }

    struct Unconfigured;

    #[async_trait]
    impl HostIntelSource for Unconfigured {
        async fn host(&self, _address: IpAddr) -> CollaboratorResult<Option<HostIntel>> {
            Err(CollaboratorError::NotConfigured("Shodan"))
        }
    }

    fn addr() -> IpAddr {
        "192.0.2.7".parse().unwrap()
    }

    #[tokio::test]
    async fn passive_ports_skip_active_probing() {
        let prober = CountingProber(AtomicUsize::new(0));
        let selection = choose_ports(&FixedIntel(Some(vec![443, 80, 443, 9999])), &prober, addr()).await;

        assert_eq!(prober.0.load(Ordering::SeqCst), 0);
        assert_eq!(selection.source, PortSource::Passive);
        let ports: Vec<(u16, &str)> = selection.ports.iter().map(|p| (p.port, p.service.as_str())).collect();
        assert_eq!(ports, vec![(80, "HTTP"), (443, "HTTPS"), (9999, "Unknown")]);
    }

    #[tokio::test]
    async fn empty_passive_data_falls_back() {
        let prober = CountingProber(AtomicUsize::new(0));
        let selection = choose_ports(&FixedIntel(Some(vec![])), &prober, addr()).await;
        assert_eq!(prober.0.load(Ordering::SeqCst), 1);
        assert_eq!(selection.source, PortSource::Active);
        assert!(selection.intel.is_some());

        let selection = choose_ports(&FixedIntel(None), &prober, addr()).await;
        assert_eq!(selection.source, PortSource::Active);
        assert!(selection.intel.is_none());
    }

    #[tokio::test]
    async fn unconfigured_source_falls_back() {
        let prober = CountingProber(AtomicUsize::new(0));
        let selection = choose_ports(&Unconfigured, &prober, addr()).await;
        assert_eq!(prober.0.load(Ordering::SeqCst), 1);
        assert_eq!(selection.ports[0].port, 22);
    }

    #[test]
    fn parses_shodan_host_payload() {
        let body = r#"{"ip_str":"192.0.2.7","ports":[22,80],"hostnames":["web.example.com"],
            "org":"Example Org","isp":"Example ISP","asn":"AS64500","country_name":"Netherlands",
            "city":"Amsterdam","os":null,"vulns":["CVE-2023-0001"]}"#;
        let intel = parse_shodan_host(body, addr()).unwrap();
        assert_eq!(intel.ports, vec![22, 80]);
        assert_eq!(intel.organization.as_deref(), Some("Example Org"));
        assert_eq!(intel.asn.as_deref(), Some("AS64500"));
        assert_eq!(intel.country.as_deref(), Some("Netherlands"));
        assert!(intel.os.is_none());
        assert_eq!(intel.vulns, vec!["CVE-2023-0001"]);
    }
}
