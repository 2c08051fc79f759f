// src/core/scanner/mod.rs

// One module per collaborator. Each exposes a trait the orchestrator depends
// on and a production implementation of it.
pub mod banner_scanner;
pub mod dns_scanner;
pub mod fingerprint_scanner;
pub mod headers_scanner;
pub mod history_scanner;
pub mod host_intel;
pub mod http_client;
pub mod port_scanner;
pub mod ssl_scanner;
pub mod subdomain_scanner;
pub mod wayback_scanner;
pub mod whois_scanner;

use crate::config::Settings;
use crate::core::error::CollaboratorResult;
use std::sync::Arc;

use self::banner_scanner::{BannerProbe, BannerReader};
use self::dns_scanner::{HickoryNameResolver, NameResolver};
use self::history_scanner::{HistoricalIntelSource, HistorySubdomains, SecurityTrailsClient};
use self::host_intel::{HostIntelSource, ShodanClient};
use self::http_client::{ReqwestFetcher, WebFetcher};
use self::port_scanner::{PortProbe, PortProber};
use self::ssl_scanner::{CertificateInspector, NativeTlsInspector};
use self::subdomain_scanner::{C99Source, CrtShSource, SubdomainSource};
use self::wayback_scanner::{ArchiveSource, WaybackClient};
use self::whois_scanner::{RegistrationLookup, WhoisClient};

/// Every external dependency of a scan, behind its trait.
#[derive(Clone)]
pub struct Collaborators {
    pub registration: Arc<dyn RegistrationLookup>,
    pub resolver: Arc<dyn NameResolver>,
    /// Passive subdomain sources, queried in order after brute force.
    pub subdomain_sources: Vec<Arc<dyn SubdomainSource>>,
    pub host_intel: Arc<dyn HostIntelSource>,
    pub ports: Arc<dyn PortProbe>,
    pub banners: Arc<dyn BannerProbe>,
    pub web: Arc<dyn WebFetcher>,
    pub certificates: Arc<dyn CertificateInspector>,
    pub history: Arc<dyn HistoricalIntelSource>,
    pub archive: Arc<dyn ArchiveSource>,
}

impl Collaborators {
    /// The real network-backed implementations.
    pub fn from_settings(settings: &Settings) -> CollaboratorResult<Self> {
        let history: Arc<dyn HistoricalIntelSource> = Arc::new(SecurityTrailsClient::new(settings)?);
        let subdomain_sources: Vec<Arc<dyn SubdomainSource>> = vec![
            Arc::new(CrtShSource::new(settings)?),
            Arc::new(HistorySubdomains::new(history.clone(), settings.discovery.max_passive_subdomains)),
            Arc::new(C99Source::new(settings)?),
        ];

        Ok(Self {
            registration: Arc::new(WhoisClient::default()),
            resolver: Arc::new(HickoryNameResolver::new(settings)),
            subdomain_sources,
            host_intel: Arc::new(ShodanClient::new(settings)?),
            ports: Arc::new(PortProber::new(settings.probe_timeout())),
            banners: Arc::new(BannerReader::new(settings.probe_timeout())),
            web: Arc::new(ReqwestFetcher::new(settings)?),
            certificates: Arc::new(NativeTlsInspector::new(settings.http_timeout())),
            history,
            archive: Arc::new(WaybackClient::new(settings)?),
        })
    }
}
