// src/core/services.rs

//! Static port → service table, built once on first use.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Well-known TCP ports probed when no passive data is available, in probe order.
pub const CANDIDATE_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 143, 443, 465, 587, 993, 995, 1433, 3306, 3389, 5432, 5900,
    6379, 8000, 8080, 8443, 8888, 9000, 27017,
];

pub const UNKNOWN_SERVICE: &str = "Unknown";

static SERVICE_TABLE: Lazy<BTreeMap<u16, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        (21, "FTP"),
        (22, "SSH"),
        (23, "Telnet"),
        (25, "SMTP"),
        (53, "DNS"),
        (80, "HTTP"),
        (110, "POP3"),
        (143, "IMAP"),
        (443, "HTTPS"),
        (465, "SMTPS"),
        (587, "SMTP (Submission)"),
        (993, "IMAPS"),
        (995, "POP3S"),
        (1433, "MSSQL"),
        (3306, "MySQL"),
        (3389, "RDP"),
        (5432, "PostgreSQL"),
        (5900, "VNC"),
        (6379, "Redis"),
        (8000, "HTTP-Alt"),
        (8080, "HTTP-Proxy"),
        (8443, "HTTPS-Alt"),
        (8888, "HTTP-Alt"),
        (9000, "SonarQube"),
        (27017, "MongoDB"),
    ])
});

/// Service label for a port, `"Unknown"` when the port is not in the table.
pub fn service_name(port: u16) -> &'static str {
    SERVICE_TABLE.get(&port).copied().unwrap_or(UNKNOWN_SERVICE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_candidate_port_has_a_label() {
        assert_eq!(CANDIDATE_PORTS.len(), 25);
        for port in CANDIDATE_PORTS {
            assert_ne!(service_name(*port), UNKNOWN_SERVICE, "port {port}");
        }
    }

    #[test]
    fn unlisted_ports_are_unknown() {
        assert_eq!(service_name(22), "SSH");
        assert_eq!(service_name(587), "SMTP (Submission)");
        assert_eq!(service_name(31337), "Unknown");
    }
}
