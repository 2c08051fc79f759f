// src/app.rs

use ratatui::widgets::{ListState, ScrollbarState};
use std::fs;
use url::Url;
use uuid::Uuid;
use vanguard_recon::core::models::{ScanSnapshot, ScanStatus, Severity};
use vanguard_recon::logging;

pub const SPINNER_CHARS: [char; 4] = ['|', '/', '-', '\\'];

/// Lines of the log file kept for the log panel.
const LOG_TAIL: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Disclaimer,
    Idle,
    Scanning,
    Finished,
}

#[derive(Debug, Default)]
pub struct ScanSummary {
    pub score: u8,
    pub critical_issues: usize,
    pub warning_issues: usize,
    pub dns_check_passed: bool,
    pub ssl_check_passed: bool,
    pub headers_check_passed: bool,
}

pub struct App {
    pub should_quit: bool,
    pub state: AppState,
    pub input: String,
    pub scan_id: Option<Uuid>,
    /// Latest snapshot polled from the store.
    pub snapshot: Option<ScanSnapshot>,
    pub summary: ScanSummary,
    pub analysis_list_state: ListState,
    pub spinner_frame: usize,
    pub show_logs: bool,
    pub log_content: Vec<String>,
    pub log_horizontal_scroll: usize,
    pub log_horizontal_scroll_state: ScrollbarState,
}

impl App {
    pub fn new() -> Self {
        Self {
            should_quit: false,
            state: AppState::Disclaimer,
            input: String::new(),
            scan_id: None,
            snapshot: None,
            summary: ScanSummary::default(),
            analysis_list_state: ListState::default(),
            spinner_frame: 0,
            show_logs: false,
            log_content: Vec::new(),
            log_horizontal_scroll: 0,
            log_horizontal_scroll_state: ScrollbarState::default(),
        }
    }

    pub fn start_scan(&mut self, scan_id: Uuid) {
        self.scan_id = Some(scan_id);
        self.snapshot = None;
        self.state = AppState::Scanning;
    }

    /// Stores a polled snapshot; a terminal record ends the scanning state.
    pub fn update_snapshot(&mut self, snapshot: ScanSnapshot) {
        let terminal = snapshot.record.status.is_terminal();
        self.snapshot = Some(snapshot);
        self.update_summary();
        if terminal {
            self.state = AppState::Finished;
            if self.vulnerability_count() > 0 {
                self.analysis_list_state.select(Some(0));
            }
        }
    }

    pub fn progress(&self) -> u8 {
        self.snapshot.as_ref().map(|s| s.record.progress).unwrap_or_default()
    }

    pub fn scan_failed(&self) -> Option<&str> {
        self.snapshot
            .as_ref()
            .filter(|s| s.record.status == ScanStatus::Failed)
            .map(|s| s.record.failure.as_deref().unwrap_or("unknown error"))
    }

    fn vulnerability_count(&self) -> usize {
        self.snapshot.as_ref().map(|s| s.findings.vulnerabilities.len()).unwrap_or_default()
    }

    pub fn select_next(&mut self) {
        let count = self.vulnerability_count();
        if count == 0 {
            return;
        }
        let next = self.analysis_list_state.selected().map_or(0, |i| (i + 1).min(count - 1));
        self.analysis_list_state.select(Some(next));
    }

    pub fn select_previous(&mut self) {
        let previous = self.analysis_list_state.selected().map_or(0, |i| i.saturating_sub(1));
        if self.vulnerability_count() > 0 {
            self.analysis_list_state.select(Some(previous));
        }
    }

    pub fn update_summary(&mut self) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        let vulnerabilities = &snapshot.findings.vulnerabilities;

        let criticals = vulnerabilities.iter().filter(|v| v.severity == Severity::Critical).count();
        let warnings = vulnerabilities.iter().filter(|v| v.severity == Severity::Warning).count();
        let passed = |prefixes: &[&str]| {
            !vulnerabilities
                .iter()
                .any(|v| v.severity != Severity::Info && prefixes.iter().any(|p| v.code.starts_with(p)))
        };

        let score = 100_i16
            .saturating_sub((criticals * 15) as i16)
            .saturating_sub((warnings * 5) as i16);

        self.summary = ScanSummary {
            score: score.max(0) as u8,
            critical_issues: criticals,
            warning_issues: warnings,
            dns_check_passed: passed(&["DNS_"]),
            ssl_check_passed: passed(&["SSL_"]) && snapshot.findings.certificate.is_some(),
            headers_check_passed: passed(&["HEADERS_", "SERVER_"]),
        };
    }

    pub fn on_tick(&mut self) {
        if self.state == AppState::Scanning {
            self.spinner_frame = (self.spinner_frame + 1) % SPINNER_CHARS.len();
        }
        if self.show_logs {
            self.refresh_logs();
        }
    }

    fn refresh_logs(&mut self) {
        let Ok(content) = fs::read_to_string(logging::log_file_path()) else {
            return;
        };
        let lines: Vec<&str> = content.lines().collect();
        let start = lines.len().saturating_sub(LOG_TAIL);
        self.log_content = lines[start..].iter().map(|l| l.to_string()).collect();
    }

    pub fn toggle_logs(&mut self) {
        self.show_logs = !self.show_logs;
        if self.show_logs {
            self.refresh_logs();
        }
    }

    pub fn scroll_logs_left(&mut self) {
        self.log_horizontal_scroll = self.log_horizontal_scroll.saturating_sub(4);
        self.log_horizontal_scroll_state = self.log_horizontal_scroll_state.position(self.log_horizontal_scroll);
    }

    pub fn scroll_logs_right(&mut self) {
        self.log_horizontal_scroll = self.log_horizontal_scroll.saturating_add(4);
        self.log_horizontal_scroll_state = self.log_horizontal_scroll_state.position(self.log_horizontal_scroll);
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn reset(&mut self) {
        self.state = AppState::Idle;
        self.input = String::new();
        self.scan_id = None;
        self.snapshot = None;
        self.summary = ScanSummary::default();
        self.analysis_list_state = ListState::default();
        self.spinner_frame = 0;
    }
}

/// Reduces user input (`example.com`, `https://example.com/path`) to a bare
/// lowercase host name.
pub fn normalize_target(raw: &str) -> String {
    let raw = raw.trim();
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    Url::parse(&with_scheme)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| raw.to_string())
        .trim_end_matches('.')
        .to_lowercase()
}

/// The normalized target, or `None` when nothing usable was typed.
pub fn target_from_input(raw: &str) -> Option<String> {
    let domain = normalize_target(raw);
    (!domain.is_empty()).then_some(domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanguard_recon::core::models::{ScanOptions, ScanRecord, VulnerabilityFinding};

    #[test]
    fn targets_are_reduced_to_host() {
        assert_eq!(normalize_target("example.com"), "example.com");
        assert_eq!(normalize_target(" https://Example.com/login?x=1 "), "example.com");
        assert_eq!(normalize_target("http://www.example.com:8080"), "www.example.com");
    }

    #[test]
    fn blank_input_is_no_target() {
        assert_eq!(target_from_input(""), None);
        assert_eq!(target_from_input("   "), None);
        assert_eq!(target_from_input(" Example.com. ").as_deref(), Some("example.com"));
    }

    #[test]
    fn terminal_snapshot_finishes_and_scores() {
        let mut app = App::new();
        let mut record = ScanRecord::new("example.com", ScanOptions::default());
        app.start_scan(record.id);

        record.status = ScanStatus::Completed;
        record.progress = 100;
        let mut snapshot = ScanSnapshot { record, findings: Default::default() };
        snapshot.findings.vulnerabilities = vec![
            VulnerabilityFinding::new(Severity::Critical, "DNS_DMARC_MISSING"),
            VulnerabilityFinding::new(Severity::Warning, "HEADERS_HSTS_MISSING"),
            VulnerabilityFinding::new(Severity::Info, "SERVER_VERSION_DISCLOSURE"),
        ];
        app.update_snapshot(snapshot);

        assert_eq!(app.state, AppState::Finished);
        assert_eq!(app.summary.score, 80);
        assert!(!app.summary.dns_check_passed);
        assert!(!app.summary.headers_check_passed);
        assert_eq!(app.analysis_list_state.selected(), Some(0));

        app.select_next();
        app.select_next();
        app.select_next();
        assert_eq!(app.analysis_list_state.selected(), Some(2));
    }
}
