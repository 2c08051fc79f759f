// src/core/scanner/ssl_scanner.rs

use tracing::{debug, info};

use crate::core::error::{CollaboratorError, CollaboratorResult};
use crate::core::models::{CertificateSnapshot, Severity, VulnerabilityFinding};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use native_tls::TlsConnector;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tokio::task::spawn_blocking;
use x509_parser::objects::{oid2sn, oid_registry};
use x509_parser::prelude::*;

const HTTPS_PORT: u16 = 443;
const UNKNOWN: &str = "Unknown";

/// Reads the certificate a host presents on port 443.
///
/// `Ok(None)` means the handshake completed without a peer certificate.
#[async_trait]
pub trait CertificateInspector: Send + Sync {
    async fn inspect(&self, domain: &str) -> CollaboratorResult<Option<CertificateSnapshot>>;
}

/// Blocking `native-tls` handshake on the blocking pool. Invalid and
/// mismatched certificates are accepted so they can be reported.
pub struct NativeTlsInspector {
    timeout: Duration,
}

impl NativeTlsInspector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CertificateInspector for NativeTlsInspector {
    async fn inspect(&self, domain: &str) -> CollaboratorResult<Option<CertificateSnapshot>> {
        info!(target = %domain, "Starting SSL/TLS scan.");
        let target = domain.to_string();
        let timeout = self.timeout;

        debug!("Spawning blocking task for TLS connection.");
        let snapshot = spawn_blocking(move || perform_tls_scan(&target, timeout))
            .await
            .map_err(|e| CollaboratorError::Tls(format!("TLS task panicked: {e}")))??;

        if let Some(cert) = &snapshot {
            info!(subject = %cert.subject, issuer = %cert.issuer, days_left = cert.days_until_expiry, "Certificate read.");
        }
        Ok(snapshot)
    }
}

fn perform_tls_scan(target: &str, timeout: Duration) -> CollaboratorResult<Option<CertificateSnapshot>> {
    let connector = TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map_err(|e| CollaboratorError::Tls(e.to_string()))?;

    debug!(target, "Connecting TCP stream to port 443.");
    let addr = (target, HTTPS_PORT)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| CollaboratorError::Dns(format!("{target} has no address")))?;
    let stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    debug!(target, "Performing TLS handshake.");
    let stream = connector
        .connect(target, stream)
        .map_err(|e| CollaboratorError::Tls(format!("handshake failed: {e}")))?;

    let Some(cert) = stream
        .peer_certificate()
        .map_err(|e| CollaboratorError::Tls(e.to_string()))?
    else {
        debug!("TLS connection successful, but no peer certificate provided.");
        return Ok(None);
    };

    let der = cert.to_der().map_err(|e| CollaboratorError::Tls(e.to_string()))?;
    parse_certificate(&der, Utc::now()).map(Some)
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or_default()
}

/// First attribute value of a name, or `None` when absent or not a string.
fn first_str<'a, 'b: 'a>(mut attrs: impl Iterator<Item = &'a AttributeTypeAndValue<'b>>) -> Option<String> {
    attrs.next().and_then(|a| a.as_str().ok()).map(str::to_string)
}

/// Builds a snapshot from a DER certificate, judging validity at `now`.
pub fn parse_certificate(der: &[u8], now: DateTime<Utc>) -> CollaboratorResult<CertificateSnapshot> {
    let (_, x509) = parse_x509_certificate(der).map_err(|e| CollaboratorError::Parse(format!("X.509: {e}")))?;

    let issuer = first_str(x509.issuer().iter_organization())
        .or_else(|| first_str(x509.issuer().iter_common_name()))
        .unwrap_or_else(|| UNKNOWN.to_string());
    let subject = first_str(x509.subject().iter_common_name()).unwrap_or_else(|| UNKNOWN.to_string());

    let validity = x509.validity();
    let valid_from = asn1_time_to_chrono_utc(&validity.not_before);
    let valid_to = asn1_time_to_chrono_utc(&validity.not_after);

    let sig_oid = &x509.signature_algorithm.algorithm;
    let signature_algorithm = oid2sn(sig_oid, oid_registry())
        .map(str::to_string)
        .unwrap_or_else(|_| sig_oid.to_id_string());

    Ok(CertificateSnapshot {
        issuer,
        subject,
        valid_from,
        valid_to,
        serial_number: x509.raw_serial_as_string(),
        signature_algorithm,
        is_valid: now >= valid_from && now <= valid_to,
        days_until_expiry: valid_to.signed_duration_since(now).num_days(),
    })
}

/// Expired and soon-to-expire certificates.
pub fn analyze_certificate(cert: &CertificateSnapshot) -> Vec<VulnerabilityFinding> {
    let mut findings = Vec::new();

    if !cert.is_valid {
        debug!(expiry_date = %cert.valid_to, "Certificate is outside its validity window.");
        findings.push(
            VulnerabilityFinding::new(Severity::Critical, "SSL_EXPIRED")
                .with_detail(format!("valid {} to {}", cert.valid_from, cert.valid_to)),
        );
    }

    let days_left = cert.days_until_expiry;
    if (0..=30).contains(&days_left) {
        debug!(days_left, "Certificate is expiring soon.");
        findings.push(
            VulnerabilityFinding::new(Severity::Warning, "SSL_EXPIRING_SOON")
                .with_detail(format!("{days_left} days left")),
        );
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn snapshot(from_days: i64, to_days: i64) -> CertificateSnapshot {
        let now = Utc::now();
        let valid_to = now + ChronoDuration::days(to_days);
        CertificateSnapshot {
            issuer: "Example CA".into(),
            subject: "example.com".into(),
            valid_from: now + ChronoDuration::days(from_days),
            valid_to,
            serial_number: "01".into(),
            signature_algorithm: "sha256WithRSAEncryption".into(),
            is_valid: from_days <= 0 && to_days >= 0,
            days_until_expiry: valid_to.signed_duration_since(now).num_days(),
        }
    }

    #[test]
    fn healthy_certificate_has_no_findings() {
        assert!(analyze_certificate(&snapshot(-30, 200)).is_empty());
    }

    #[test]
    fn expiring_certificate_is_a_warning() {
        let findings = analyze_certificate(&snapshot(-300, 10));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, "SSL_EXPIRING_SOON");
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn expired_certificate_is_critical() {
        let findings = analyze_certificate(&snapshot(-400, -5));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, "SSL_EXPIRED");
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[test]
    fn garbage_der_is_a_parse_error() {
        assert!(matches!(parse_certificate(b"not a certificate", Utc::now()), Err(CollaboratorError::Parse(_))));
    }
}
