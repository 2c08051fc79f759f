// src/ui/widgets/analysis_view.rs

use crate::app::{App, AppState, SPINNER_CHARS};
use ratatui::{
    prelude::*,
    text::Line,
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Wrap},
};
use vanguard_recon::core::knowledge_base::{self, FindingCategory};
use vanguard_recon::core::models::{Severity, VulnerabilityFinding};

fn severity_style(severity: Severity) -> Style {
    match severity {
        Severity::Critical => Style::default().fg(Color::Red),
        Severity::Warning => Style::default().fg(Color::Yellow),
        Severity::Info => Style::default().fg(Color::Cyan),
    }
}

pub fn render_analysis_view(frame: &mut Frame, app: &mut App, area: Rect) {
    let main_block = Block::default()
        .borders(Borders::ALL)
        .title("Analysis Report (Navigate with ↑ ↓)");

    match app.state {
        AppState::Disclaimer | AppState::Idle => {
            let content = Paragraph::new("Scan results will appear here...").alignment(Alignment::Center);
            frame.render_widget(content.block(main_block), area);
        }
        AppState::Scanning => {
            let inner_area = main_block.inner(area);
            frame.render_widget(main_block, area);
            render_progress(frame, app, inner_area);
        }
        AppState::Finished => {
            let inner_area = main_block.inner(area);
            frame.render_widget(main_block, area);
            render_report(frame, app, inner_area);
        }
    }
}

fn render_progress(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Length(1), Constraint::Min(0)])
        .split(area);

    let spinner_char = SPINNER_CHARS[app.spinner_frame];
    let status = Paragraph::new(Line::from(vec![
        Span::styled(format!("{spinner_char} "), Style::default().fg(Color::Cyan)),
        Span::raw("Scanning... Findings are listed as they arrive."),
    ]))
    .alignment(Alignment::Center);
    frame.render_widget(status, chunks[0]);

    let progress = app.progress();
    let gauge = Gauge::default()
        .percent(u16::from(progress))
        .label(format!("{progress}%"))
        .gauge_style(Style::default().fg(Color::Cyan));
    frame.render_widget(gauge, chunks[1]);

    if let Some(snapshot) = &app.snapshot {
        let findings = &snapshot.findings;
        let lines = vec![
            Line::from(""),
            Line::from(format!("DNS records:     {}", findings.dns.len())),
            Line::from(format!("Subdomains:      {}", findings.subdomains.len())),
            Line::from(format!("Open ports:      {}", findings.ports.len())),
            Line::from(format!("Technologies:    {}", findings.technologies.len())),
            Line::from(format!("Vulnerabilities: {}", findings.vulnerabilities.len())),
        ];
        frame.render_widget(Paragraph::new(lines), chunks[2]);
    }
}

fn finding_item(finding: &VulnerabilityFinding) -> ListItem<'static> {
    let (prefix, title) = match knowledge_base::get_finding_detail(&finding.code) {
        Some(detail) => (detail.category.prefix(), detail.title.to_string()),
        None => ("", finding.code.clone()),
    };
    ListItem::new(Line::from(vec![
        Span::styled(prefix, Style::default().fg(Color::DarkGray)),
        Span::styled(title, severity_style(finding.severity)),
    ]))
}

fn render_report(frame: &mut Frame, app: &mut App, area: Rect) {
    if let Some(reason) = app.scan_failed() {
        let text = Text::from(vec![
            Line::from(""),
            Line::from("SCAN FAILED".bold().fg(Color::Red)),
            Line::from(""),
            Line::from(reason.to_string()),
            Line::from(""),
            Line::from("Findings collected before the failure are kept."),
        ]);
        frame.render_widget(Paragraph::new(text).alignment(Alignment::Center).wrap(Wrap { trim: true }), area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Min(0)])
        .split(area);

    let vulnerabilities: Vec<VulnerabilityFinding> = app
        .snapshot
        .as_ref()
        .map(|s| s.findings.vulnerabilities.clone())
        .unwrap_or_default();

    let items: Vec<ListItem> = vulnerabilities.iter().map(finding_item).collect();
    let findings_list = List::new(items)
        .block(Block::default())
        .highlight_style(Style::new().bg(Color::DarkGray).add_modifier(Modifier::BOLD));
    frame.render_stateful_widget(findings_list, chunks[0], &mut app.analysis_list_state);

    let detail_block = Block::default().borders(Borders::TOP).title("Details");
    let selected = app.analysis_list_state.selected().and_then(|i| vulnerabilities.get(i));
    match selected {
        Some(finding) => render_details(frame, finding, detail_block, chunks[1]),
        None => render_placeholder_details(frame, app, detail_block, chunks[1]),
    }
}

fn render_details(frame: &mut Frame, finding: &VulnerabilityFinding, block: Block, area: Rect) {
    let mut text = Vec::new();
    if let Some(detail) = knowledge_base::get_finding_detail(&finding.code) {
        text.push(Line::from(format!("{} | {}", detail.category, finding.code)).fg(Color::DarkGray));
        text.push(Line::from(""));
        text.push(Line::from("WHAT IT IS:".yellow().bold()));
        text.push(Line::from(detail.description));
        text.push(Line::from(""));
        text.push(Line::from("HOW TO FIX:".yellow().bold()));
        text.push(Line::from(detail.remediation));
    } else {
        text.push(Line::from(finding.code.clone()));
    }
    if let Some(observed) = &finding.detail {
        text.push(Line::from(""));
        text.push(Line::from(vec![Span::raw("Observed: ").bold(), Span::raw(observed.clone())]));
    }
    if let Some(url) = &finding.affected_url {
        text.push(Line::from(vec![Span::raw("Affected: ").bold(), Span::raw(url.clone())]));
    }
    frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }).block(block), area);
}

fn render_placeholder_details(frame: &mut Frame, app: &App, block: Block, area: Rect) {
    let total_issues = app.summary.critical_issues + app.summary.warning_issues;

    let placeholder_text = if total_issues == 0 {
        Text::from(vec![
            Line::from(""),
            Line::from("✓ NO CRITICAL OR WARNING ISSUES".bold().fg(Color::Green)),
            Line::from(""),
            Line::from("Checked categories:"),
            Line::from(format!("{}, {}, {}", FindingCategory::Dns, FindingCategory::Ssl, FindingCategory::Http)),
        ])
    } else {
        Text::from("Select an item above to see details.")
    };

    let p = Paragraph::new(placeholder_text).alignment(Alignment::Center).block(block);
    frame.render_widget(p, area);
}
