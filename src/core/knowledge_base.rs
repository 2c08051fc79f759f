//! Static explanations for every vulnerability code the pipeline emits.
//!
//! Findings only carry a code; titles, descriptions and remediation advice
//! live here so reports can be rendered without touching the scanners.

use crate::core::models::Severity;
use std::fmt;

/// Groups related codes in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FindingCategory {
    /// Mail authentication records (SPF, DMARC, DKIM).
    Dns,
    Ssl,
    Http,
}

impl fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingCategory::Dns => write!(f, "DNS Configuration"),
            FindingCategory::Ssl => write!(f, "SSL/TLS Certificate"),
            FindingCategory::Http => write!(f, "HTTP Security Headers"),
        }
    }
}

impl FindingCategory {
    /// Short tag shown in front of list entries.
    pub fn prefix(self) -> &'static str {
        match self {
            FindingCategory::Dns => "[DNS] ",
            FindingCategory::Ssl => "[SSL/TLS] ",
            FindingCategory::Http => "[HTTP] ",
        }
    }
}

/// Human-readable context for one finding code.
pub struct FindingDetail {
    /// Machine-readable identifier, e.g. `DNS_DMARC_MISSING`.
    pub code: &'static str,
    pub title: &'static str,
    pub category: FindingCategory,
    pub severity: Severity,
    pub description: &'static str,
    pub remediation: &'static str,
}

static FINDINGS: &[FindingDetail] = &[
    // --- DNS: mail authentication ---
    FindingDetail {
        code: "DNS_DMARC_MISSING",
        title: "DMARC Record Missing",
        category: FindingCategory::Dns,
        severity: Severity::Critical,
        description: "DMARC is an email authentication policy that protects your domain from being used for email spoofing and phishing. It tells receiving mail servers how to handle emails that fail authentication checks.",
        remediation: "Add a DMARC record to your domain's DNS settings. Start with a monitoring policy like 'v=DMARC1; p=none;' and gradually move to 'p=quarantine' or 'p=reject' after analyzing reports."
    },
    FindingDetail {
        code: "DNS_DMARC_POLICY_NONE",
        title: "DMARC Policy is 'none'",
        category: FindingCategory::Dns,
        severity: Severity::Warning,
        description: "Your DMARC policy is in 'monitoring only' mode. It reports fraudulent emails but does not instruct receivers to block or quarantine them, offering no active protection against spoofing.",
        remediation: "After ensuring your legitimate emails pass SPF/DKIM, update your DMARC policy to 'p=quarantine' (sends to spam) or 'p=reject' (blocks delivery) to actively protect your domain."
    },
    FindingDetail {
        code: "DNS_SPF_MISSING",
        title: "SPF Record Missing",
        category: FindingCategory::Dns,
        severity: Severity::Warning,
        description: "Sender Policy Framework (SPF) is a DNS record that lists all the servers authorized to send email on behalf of your domain. Without it, attackers can more easily spoof emails from your domain.",
        remediation: "Create a TXT record for your domain that defines your authorized mail servers. A simple example for Google Workspace is 'v=spf1 include:_spf.google.com ~all'."
    },
    FindingDetail {
        code: "DNS_SPF_POLICY_SOFTFAIL",
        title: "SPF Policy is 'Softfail'",
        category: FindingCategory::Dns,
        severity: Severity::Info,
        description: "Your SPF record uses '~all' (softfail), which suggests that receiving servers should accept but mark suspicious mail. This is less secure than '-all' (fail), which instructs servers to reject the mail.",
        remediation: "If you are confident your SPF record lists all legitimate mail sources, consider changing the ending from '~all' to '-all' for stricter enforcement."
    },
    FindingDetail {
        code: "DNS_SPF_POLICY_NEUTRAL",
        title: "SPF Policy is 'Neutral'",
        category: FindingCategory::Dns,
        severity: Severity::Info,
        description: "Your SPF record uses '?all' (neutral), which provides no definitive policy on the mail's legitimacy. It essentially tells receivers 'I don't know if this is valid,' offering no protection.",
        remediation: "Change '?all' to '~all' (softfail) or, preferably, '-all' (fail) to provide a clear policy to receiving mail servers."
    },
    FindingDetail {
        code: "DNS_DKIM_MISSING",
        title: "DKIM Record Missing",
        category: FindingCategory::Dns,
        severity: Severity::Info,
        description: "No DKIM key was found under the common selectors. DKIM adds a signature to outgoing mail that proves it came from your domain and was not altered in transit.",
        remediation: "Enable DKIM signing in your email service provider's control panel. This typically involves generating a key and adding the public part as a TXT record to your DNS."
    },

    // --- SSL/TLS ---
    FindingDetail {
        code: "SSL_EXPIRED",
        title: "SSL Certificate Not Valid",
        category: FindingCategory::Ssl,
        severity: Severity::Critical,
        description: "The certificate presented on port 443 is outside its validity window. Browsers show prominent security warnings, block access and destroy user trust.",
        remediation: "Renew the SSL certificate immediately. Automate renewal (for example with Let's Encrypt / Certbot) to prevent this from happening again."
    },
    FindingDetail {
        code: "SSL_EXPIRING_SOON",
        title: "SSL Certificate Expiring Soon",
        category: FindingCategory::Ssl,
        severity: Severity::Warning,
        description: "The SSL certificate will expire in 30 days or less. This is an early warning to prevent service disruption and loss of trust.",
        remediation: "Renew the SSL certificate before it expires. If you have automated renewals, verify that the system is functioning correctly."
    },

    // --- HTTP headers ---
    FindingDetail {
        code: "HEADERS_HSTS_MISSING",
        title: "HSTS Header Missing",
        category: FindingCategory::Http,
        severity: Severity::Warning,
        description: "The HTTP Strict-Transport-Security (HSTS) header instructs browsers to only communicate with your site over HTTPS. It protects against protocol downgrade attacks and cookie hijacking.",
        remediation: "Add the 'Strict-Transport-Security' header to your web server responses. A strong value is 'max-age=31536000; includeSubDomains; preload'."
    },
    FindingDetail {
        code: "HEADERS_CSP_MISSING",
        title: "CSP Header Missing",
        category: FindingCategory::Http,
        severity: Severity::Warning,
        description: "Content-Security-Policy (CSP) helps prevent attacks like Cross-Site Scripting (XSS) and data injection by defining which resources a browser is allowed to load.",
        remediation: "Implement a Content-Security-Policy header that defines trusted sources for scripts, styles, and other assets. Start with a restrictive policy and open it up as needed."
    },
    FindingDetail {
        code: "HEADERS_CLICKJACKING_UNPROTECTED",
        title: "Clickjacking Protection Missing",
        category: FindingCategory::Http,
        severity: Severity::Warning,
        description: "Neither X-Frame-Options nor a Content-Security-Policy is set, so any site can load yours in an invisible iframe and trick visitors into clicking on it.",
        remediation: "Add 'X-Frame-Options: DENY' (or 'SAMEORIGIN'), or a CSP with a 'frame-ancestors' directive."
    },
    FindingDetail {
        code: "HEADERS_X_CONTENT_TYPE_OPTIONS_MISSING",
        title: "X-Content-Type-Options Missing",
        category: FindingCategory::Http,
        severity: Severity::Info,
        description: "This header prevents browsers from trying to guess the content type of a file (MIME sniffing). This mitigates attacks where a file disguised as an image could be executed as a script.",
        remediation: "Add the 'X-Content-Type-Options' header and set its value to 'nosniff'."
    },
    FindingDetail {
        code: "HEADERS_X_XSS_PROTECTION_MISSING",
        title: "X-XSS-Protection Missing",
        category: FindingCategory::Http,
        severity: Severity::Info,
        description: "Older browsers use this header to enable their built-in cross-site scripting filter. Modern browsers rely on CSP instead.",
        remediation: "Set 'X-XSS-Protection: 1; mode=block' for legacy clients, and rely on a Content-Security-Policy for modern ones."
    },
    FindingDetail {
        code: "SERVER_VERSION_DISCLOSURE",
        title: "Server Version Disclosed",
        category: FindingCategory::Http,
        severity: Severity::Info,
        description: "The Server header reveals the software name and version. Attackers use this to look up known vulnerabilities for that exact release.",
        remediation: "Configure the web server to send a generic Server header (for example 'ServerTokens Prod' in Apache or 'server_tokens off' in nginx)."
    },
];

/// Looks up the explanation for `code`.
pub fn get_finding_detail(code: &str) -> Option<&'static FindingDetail> {
    FINDINGS.iter().find(|f| f.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn codes_are_unique() {
        let mut seen = HashSet::new();
        assert!(FINDINGS.iter().all(|f| seen.insert(f.code)));
    }

    #[test]
    fn emitted_codes_are_explained() {
        for code in [
            "DNS_DMARC_MISSING",
            "DNS_SPF_POLICY_SOFTFAIL",
            "DNS_DKIM_MISSING",
            "SSL_EXPIRED",
            "SSL_EXPIRING_SOON",
            "HEADERS_CLICKJACKING_UNPROTECTED",
            "HEADERS_X_XSS_PROTECTION_MISSING",
            "SERVER_VERSION_DISCLOSURE",
        ] {
            assert!(get_finding_detail(code).is_some(), "{code} has no entry");
        }
        assert!(get_finding_detail("NOT_A_CODE").is_none());
    }

    #[test]
    fn category_follows_code_prefix() {
        assert_eq!(get_finding_detail("SSL_EXPIRED").map(|d| d.category), Some(FindingCategory::Ssl));
        assert_eq!(get_finding_detail("SERVER_VERSION_DISCLOSURE").map(|d| d.category), Some(FindingCategory::Http));
    }
}
