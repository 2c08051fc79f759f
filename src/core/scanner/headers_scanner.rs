// src/core/scanner/headers_scanner.rs

use tracing::{debug, info};
use crate::core::error::CollaboratorResult;
use crate::core::models::{Severity, VulnerabilityFinding};
use crate::core::scanner::http_client::{WebFetcher, WebResponse};

/// Fetches `https://<domain>` and checks its security headers.
pub async fn run_headers_scan(
    fetcher: &dyn WebFetcher,
    domain: &str,
) -> CollaboratorResult<Vec<VulnerabilityFinding>> {
    let url = format!("https://{domain}");
    info!(target = %domain, "Starting headers scan.");
    let response = fetcher.fetch(&url).await?;
    let findings = analyze_headers(&response, &url);
    info!(findings = %findings.len(), "Headers scan finished.");
    Ok(findings)
}

fn present(response: &WebResponse, name: &str) -> bool {
    let found = response.headers.contains_key(name);
    debug!(header_name = name, found, "Checked header.");
    found
}

/// Missing hardening headers, and version disclosure in `Server`.
pub fn analyze_headers(response: &WebResponse, url: &str) -> Vec<VulnerabilityFinding> {
    let mut findings = Vec::new();
    let mut flag = |severity, code: &str| findings.push(VulnerabilityFinding::new(severity, code).at(url));

    if !present(response, "strict-transport-security") {
        flag(Severity::Warning, "HEADERS_HSTS_MISSING");
    }

    let has_csp = present(response, "content-security-policy");
    if !has_csp {
        flag(Severity::Warning, "HEADERS_CSP_MISSING");
    }

    // Either header stops framing.
    if !present(response, "x-frame-options") && !has_csp {
        flag(Severity::Warning, "HEADERS_CLICKJACKING_UNPROTECTED");
    }

    if !present(response, "x-content-type-options") {
        flag(Severity::Info, "HEADERS_X_CONTENT_TYPE_OPTIONS_MISSING");
    }

    if !present(response, "x-xss-protection") {
        flag(Severity::Info, "HEADERS_X_XSS_PROTECTION_MISSING");
    }

    if let Some(server) = response.header("server").filter(|s| s.contains('/')) {
        debug!(server, "Server header discloses a version.");
        findings.push(
            VulnerabilityFinding::new(Severity::Info, "SERVER_VERSION_DISCLOSURE")
                .with_detail(server)
                .at(url),
        );
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn response(headers: &[(&'static str, &'static str)]) -> WebResponse {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        WebResponse { status: 200, headers: map, body: String::new() }
    }

    fn codes(findings: &[VulnerabilityFinding]) -> Vec<&str> {
        findings.iter().map(|f| f.code.as_str()).collect()
    }

    #[test]
    fn bare_response_misses_everything() {
        let findings = analyze_headers(&response(&[("server", "Apache/2.4.58")]), "https://example.com");
        assert_eq!(
            codes(&findings),
            vec![
                "HEADERS_HSTS_MISSING",
                "HEADERS_CSP_MISSING",
                "HEADERS_CLICKJACKING_UNPROTECTED",
                "HEADERS_X_CONTENT_TYPE_OPTIONS_MISSING",
                "HEADERS_X_XSS_PROTECTION_MISSING",
                "SERVER_VERSION_DISCLOSURE",
            ]
        );
        assert!(findings.iter().all(|f| f.affected_url.as_deref() == Some("https://example.com")));
        assert_eq!(findings[5].detail.as_deref(), Some("Apache/2.4.58"));
    }

    #[test]
    fn frame_options_alone_prevents_clickjacking() {
        let findings = analyze_headers(
            &response(&[
                ("strict-transport-security", "max-age=31536000"),
                ("x-frame-options", "DENY"),
                ("x-content-type-options", "nosniff"),
                ("x-xss-protection", "1; mode=block"),
                ("server", "cloudflare"),
            ]),
            "https://example.com",
        );
        assert_eq!(codes(&findings), vec!["HEADERS_CSP_MISSING"]);
    }

    #[test]
    fn csp_alone_prevents_clickjacking() {
        let findings = analyze_headers(
            &response(&[("content-security-policy", "frame-ancestors 'none'")]),
            "https://example.com",
        );
        assert!(!codes(&findings).contains(&"HEADERS_CLICKJACKING_UNPROTECTED"));
    }
}
