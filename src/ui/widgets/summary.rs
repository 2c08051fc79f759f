// src/ui/widgets/summary.rs

use crate::app::{App, AppState};
use ratatui::{
    prelude::*,
    text::Line,
    widgets::{Block, Borders, Gauge, Paragraph},
};

/// Renders the summary: score, security checks, issue counts and the assets
/// found (address, ports, subdomains, technologies, certificate).
///
/// Only drawn once the scan has finished.
pub fn render_summary(frame: &mut Frame, app: &App, area: Rect) {
    let summary_container = Block::default().borders(Borders::ALL).title("Summary");
    frame.render_widget(summary_container, area);

    let summary_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Score & Rating section
            Constraint::Length(1), // Gauge chart
            Constraint::Length(1), // Spacer
            Constraint::Length(4), // Security Checks section
            Constraint::Length(1), // Spacer
            Constraint::Length(3), // Issues Found section
            Constraint::Length(1), // Spacer
            Constraint::Min(0),    // Assets section
        ])
        .split(area);

    if app.state != AppState::Finished {
        return;
    }
    let Some(snapshot) = &app.snapshot else {
        return;
    };

    // --- Score & Rating Section ---
    let (rating_text, rating_style) = match app.summary.score {
        90..=100 => ("Excellent", Style::default().fg(Color::Green)),
        75..=89 => ("Good", Style::default().fg(Color::Cyan)),
        50..=74 => ("Needs Improvement", Style::default().fg(Color::Yellow)),
        _ => ("Poor", Style::default().fg(Color::Red)),
    };
    let score_line = Line::from(format!("{}/100 ({})", app.summary.score, rating_text)).style(rating_style);
    let score_text = Text::from(vec![Line::from("Overall Score".bold()), score_line]);
    frame.render_widget(Paragraph::new(score_text).alignment(Alignment::Center), summary_chunks[0]);

    let score = app.summary.score;
    let score_gauge = Gauge::default()
        .percent(u16::from(score))
        .label("")
        .gauge_style(Style::default().fg(if score >= 80 {
            Color::Green
        } else if score >= 50 {
            Color::Yellow
        } else {
            Color::Red
        }));
    frame.render_widget(score_gauge, summary_chunks[1]);

    // --- Security Checks Section ---
    let checks_block = Block::default().title("SECURITY CHECKS".bold());
    let checks_to_render = [
        ("DNS Configuration", app.summary.dns_check_passed),
        ("SSL/TLS Certificate", app.summary.ssl_check_passed),
        ("HTTP Security Headers", app.summary.headers_check_passed),
    ];
    let checks_lines: Vec<Line> = checks_to_render
        .into_iter()
        .map(|(name, passed)| {
            let (icon, style) = if passed {
                ("✓", Style::default().fg(Color::Green))
            } else {
                ("✗", Style::default().fg(Color::Red))
            };
            Line::from(vec![Span::styled(format!("{icon} "), style), Span::raw(name)])
        })
        .collect();
    frame.render_widget(Paragraph::new(checks_lines).block(checks_block), summary_chunks[3]);

    // --- Issue Details Section ---
    let issues_block = Block::default().title("ISSUES FOUND".bold());
    let details_text = Text::from(vec![
        Line::from(vec![
            Span::raw("Critical: "),
            Span::styled(app.summary.critical_issues.to_string(), Style::default().fg(Color::Red)),
        ]),
        Line::from(vec![
            Span::raw("Warnings: "),
            Span::styled(app.summary.warning_issues.to_string(), Style::default().fg(Color::Yellow)),
        ]),
    ]);
    frame.render_widget(Paragraph::new(details_text).block(issues_block), summary_chunks[5]);

    // --- Assets Section ---
    let findings = &snapshot.findings;
    let assets_block = Block::default().title("ASSETS".bold());
    let mut asset_lines = Vec::new();

    if let Some(address) = findings.ports.first().map(|p| p.host) {
        asset_lines.push(Line::from(format!("Address: {address}")));
    }
    let ports: Vec<String> = findings
        .ports
        .iter()
        .map(|p| match &p.version {
            Some(version) => format!("{}/{} ({version})", p.port, p.service),
            None => format!("{}/{}", p.port, p.service),
        })
        .collect();
    asset_lines.push(Line::from(format!(
        "Open ports: {}",
        if ports.is_empty() { "none".to_string() } else { ports.join(", ") }
    )));
    asset_lines.push(Line::from(format!(
        "Subdomains: {} ({} alive)",
        findings.subdomains.len(),
        findings.subdomains.iter().filter(|s| s.is_alive).count()
    )));
    if let Some(cert) = &findings.certificate {
        asset_lines.push(Line::from(format!("Certificate: {} ({} days left)", cert.issuer, cert.days_until_expiry)));
    }
    if let Some(registrar) = findings.whois.as_ref().and_then(|w| w.registrar.as_ref()) {
        asset_lines.push(Line::from(format!("Registrar: {registrar}")));
    }
    asset_lines.push(Line::from(format!("Archived snapshots: {}", findings.archive_snapshots.len())));

    if findings.technologies.is_empty() {
        asset_lines.push(Line::from("Technologies: not identified."));
    } else {
        asset_lines.push(Line::from("Technologies:"));
        for tech in &findings.technologies {
            let label = match &tech.version {
                Some(version) => format!("{} {version}", tech.name),
                None => tech.name.clone(),
            };
            asset_lines.push(Line::from(vec![Span::raw("- "), Span::styled(label, Style::default().fg(Color::Cyan))]));
        }
    }
    frame.render_widget(Paragraph::new(asset_lines).block(assets_block), summary_chunks[7]);
}
