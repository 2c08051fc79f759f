// src/core/scanner/banner_scanner.rs

use crate::core::models::{BannerSample, PortFinding};
use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, info};

/// A banner is considered captured once more than this many bytes arrived.
const MIN_BANNER_LEN: usize = 10;

/// How a port is approached when reading its banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStyle {
    /// Send a minimal `HEAD` request on connect.
    HttpHead,
    /// Send the read-only `INFO` command on connect.
    RedisInfo,
    /// Plaintext capture is impossible (TLS or binary handshake); no connection is made.
    Skip,
    /// Wait for the service to speak first.
    Passive,
}

impl ProbeStyle {
    pub fn for_port(port: u16) -> Self {
        match port {
            80 | 8000 | 8080 | 8888 => ProbeStyle::HttpHead,
            6379 => ProbeStyle::RedisInfo,
            443 | 8443 | 5432 | 27017 => ProbeStyle::Skip,
            _ => ProbeStyle::Passive,
        }
    }

    fn request(self, host: &str) -> Option<String> {
        match self {
            ProbeStyle::HttpHead => Some(format!("HEAD / HTTP/1.0\r\nHost: {host}\r\n\r\n")),
            ProbeStyle::RedisInfo => Some("INFO\r\n".to_string()),
            ProbeStyle::Skip | ProbeStyle::Passive => None,
        }
    }
}

/// Captures the first response fragment from an open port.
#[async_trait]
pub trait BannerProbe: Send + Sync {
    /// `hostname` is used for the HTTP `Host` header.
    async fn read_banner(&self, host: IpAddr, hostname: &str, port: u16) -> Option<String>;
}

pub struct BannerReader {
    timeout: Duration,
}

impl BannerReader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn grab(&self, addr: SocketAddr, style: ProbeStyle, hostname: &str) -> Option<String> {
        if style == ProbeStyle::Skip {
            debug!(%addr, "Port does not allow plaintext banner capture.");
            return None;
        }

        let mut captured = Vec::new();
        let outcome = time::timeout(self.timeout, exchange(addr, style, hostname, &mut captured)).await;
        match outcome {
            Ok(Err(e)) => {
                debug!(%addr, error = %e, "Banner read failed.");
                None
            }
            // Complete, closed by peer, or timed out: keep whatever arrived.
            _ if captured.is_empty() => None,
            _ => Some(String::from_utf8_lossy(&captured).into_owned()),
        }
    }
}

async fn exchange(
    addr: SocketAddr,
    style: ProbeStyle,
    hostname: &str,
    captured: &mut Vec<u8>,
) -> std::io::Result<()> {
    let mut stream = TcpStream::connect(addr).await?;
    if let Some(request) = style.request(hostname) {
        stream.write_all(request.as_bytes()).await?;
    }
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        captured.extend_from_slice(&chunk[..n]);
        if captured.len() > MIN_BANNER_LEN {
            return Ok(());
        }
    }
}

#[async_trait]
impl BannerProbe for BannerReader {
    async fn read_banner(&self, host: IpAddr, hostname: &str, port: u16) -> Option<String> {
        self.grab(SocketAddr::new(host, port), ProbeStyle::for_port(port), hostname).await
    }
}

/// Reads banners for all ports concurrently and extracts versions.
///
/// Returns one sample per port, in the order of `ports`.
pub async fn read_banners(
    probe: &dyn BannerProbe,
    hostname: &str,
    ports: &[PortFinding],
) -> Vec<BannerSample> {
    let reads = ports.iter().map(|finding| async move {
        let banner = probe.read_banner(finding.host, hostname, finding.port).await;
        let version = banner.as_deref().and_then(|b| extract_version(b, &finding.service));
        BannerSample { port: finding.port, service: finding.service.clone(), banner, version }
    });
    let samples = join_all(reads).await;
    info!(
        ports = ports.len(),
        banners = samples.iter().filter(|s| s.banner.is_some()).count(),
        "Banner reading finished."
    );
    samples
}

// --- Version extraction ---

static SSH_VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"SSH-[\d.]+-(.+)").unwrap());
static GREETING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"220[- ](.+)").unwrap());
static SERVER_HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Server:\s*(.+)").unwrap());
static DOTTED_VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.\d+\.\d+)").unwrap());
static REDIS_VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"redis_version:(\S+)").unwrap());

fn first_capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str().trim())
}

/// Maps a raw banner and its service label to a version string.
pub fn extract_version(banner: &str, service: &str) -> Option<String> {
    if banner.is_empty() {
        return None;
    }
    let first_line = banner.split('\n').next().unwrap_or_default().trim();

    match service {
        "SSH" if first_line.starts_with("SSH") => {
            return Some(first_capture(&SSH_VERSION_RE, first_line).unwrap_or(first_line).to_string());
        }
        "FTP" | "SMTP" | "SMTP (Submission)" => {
            return first_capture(&GREETING_RE, first_line).map(str::to_string);
        }
        _ => {}
    }

    if service.contains("HTTP") {
        if let Some(server) = first_capture(&SERVER_HEADER_RE, banner) {
            return Some(server.to_string());
        }
    }

    match service {
        "MySQL" => first_capture(&DOTTED_VERSION_RE, banner).map(|v| format!("MySQL {v}")),
        "Redis" => first_capture(&REDIS_VERSION_RE, banner).map(|v| format!("Redis {v}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn ftp_greeting_yields_server_text() {
        assert_eq!(
            extract_version("220 myftp.example FTP server ready", "FTP").as_deref(),
            Some("myftp.example FTP server ready")
        );
    }

    #[test]
    fn version_rules_per_service() {
        assert_eq!(
            extract_version("SSH-2.0-OpenSSH_8.9p1 Ubuntu-3\r\n", "SSH").as_deref(),
            Some("OpenSSH_8.9p1 Ubuntu-3")
        );
        assert_eq!(
            extract_version("220-mail.example.com ESMTP Postfix\r\n", "SMTP (Submission)").as_deref(),
            Some("mail.example.com ESMTP Postfix")
        );
        assert_eq!(
            extract_version("HTTP/1.0 200 OK\r\nserver: nginx/1.25.3\r\n\r\n", "HTTP-Proxy").as_deref(),
            Some("nginx/1.25.3")
        );
        assert_eq!(extract_version("J\0\0\0\n8.0.36\0", "MySQL").as_deref(), Some("MySQL 8.0.36"));
        assert_eq!(
            extract_version("$3000\r\n# Server\r\nredis_version:7.2.4\r\n", "Redis").as_deref(),
            Some("Redis 7.2.4")
        );
    }

    #[test]
    fn unmatched_banners_have_no_version() {
        assert_eq!(extract_version("", "FTP"), None);
        assert_eq!(extract_version("hello there", "FTP"), None);
        assert_eq!(extract_version("HTTP/1.0 200 OK\r\n\r\n", "HTTP"), None);
        assert_eq!(extract_version("+OK POP3 ready", "POP3"), None);
    }

    #[test]
    fn probe_style_by_port() {
        assert_eq!(ProbeStyle::for_port(8080), ProbeStyle::HttpHead);
        assert_eq!(ProbeStyle::for_port(6379), ProbeStyle::RedisInfo);
        assert_eq!(ProbeStyle::for_port(443), ProbeStyle::Skip);
        assert_eq!(ProbeStyle::for_port(27017), ProbeStyle::Skip);
        assert_eq!(ProbeStyle::for_port(22), ProbeStyle::Passive);
    }

    #[tokio::test]
    async fn captures_a_greeting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"220 myftp.example FTP server ready\r\n").await.unwrap();
        });

        let reader = BannerReader::new(Duration::from_secs(2));
        let banner = reader.grab(addr, ProbeStyle::Passive, "localhost").await;
        assert!(banner.unwrap().starts_with("220 myftp.example"));
    }

    #[tokio::test]
    async fn sends_head_request_for_web_ports() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 256];
            let n = socket.read(&mut buf).await.unwrap();
            assert!(buf[..n].starts_with(b"HEAD / HTTP/1.0\r\nHost: example.com"));
            socket.write_all(b"HTTP/1.0 200 OK\r\nServer: Apache/2.4.58\r\n\r\n").await.unwrap();
        });

        let reader = BannerReader::new(Duration::from_secs(2));
        let banner = reader.grab(addr, ProbeStyle::HttpHead, "example.com").await.unwrap();
        assert_eq!(extract_version(&banner, "HTTP").as_deref(), Some("Apache/2.4.58"));
    }

    #[tokio::test]
    async fn skipped_ports_yield_nothing_even_when_listening() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket.write_all(b"this would have been a banner").await;
            }
        });

        let reader = BannerReader::new(Duration::from_secs(1));
        assert_eq!(reader.grab(addr, ProbeStyle::Skip, "localhost").await, None);
    }

    #[tokio::test]
    async fn silent_service_times_out_without_banner() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            time::sleep(Duration::from_secs(2)).await;
        });

        let reader = BannerReader::new(Duration::from_millis(200));
        assert_eq!(reader.grab(addr, ProbeStyle::Passive, "localhost").await, None);
    }
}
