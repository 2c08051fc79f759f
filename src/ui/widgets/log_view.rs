// src/ui/widgets/log_view.rs

use crate::app::App;
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation},
};

/// Greys out the `date time` prefix written by the file logger and colours
/// the level. Lines of any other shape are shown as they are.
fn style_log_line(line: &str) -> Line<'_> {
    let mut parts = line.splitn(3, ' ');
    let (Some(date), Some(time), Some(rest)) = (parts.next(), parts.next(), parts.next()) else {
        return Line::from(line);
    };
    // Levels are right-aligned, so INFO and WARN carry an extra space.
    let rest = rest.trim_start();
    let (level, message) = rest.split_once(' ').unwrap_or((rest, ""));
    let level_style = match level {
        "ERROR" => Style::default().fg(Color::Red),
        "WARN" => Style::default().fg(Color::Yellow),
        "INFO" => Style::default().fg(Color::Green),
        _ => Style::default().fg(Color::Blue),
    };
    Line::from(vec![
        Span::styled(format!("{date} {time} "), Style::default().fg(Color::DarkGray)),
        Span::styled(level, level_style),
        Span::raw(format!(" {message}")),
    ])
}

/// Tail of the log file, scrollable sideways for long lines.
pub fn render_log_view(frame: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default().title("Logs (scroll with ← →)").borders(Borders::ALL);
    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let max_width = app.log_content.iter().map(|line| line.chars().count()).max().unwrap_or(0);
    app.log_horizontal_scroll_state = app.log_horizontal_scroll_state.content_length(max_width);

    // Newest lines at the bottom of the panel.
    let visible = inner_area.height.saturating_sub(1) as usize;
    let start = app.log_content.len().saturating_sub(visible);
    let log_lines: Vec<Line> = app.log_content[start..].iter().map(|l| style_log_line(l)).collect();

    let log_paragraph = Paragraph::new(log_lines).scroll((0, app.log_horizontal_scroll as u16));
    frame.render_widget(log_paragraph, inner_area);

    let scrollbar = Scrollbar::new(ScrollbarOrientation::HorizontalBottom).thumb_symbol("■");
    let scrollbar_area = Rect {
        x: inner_area.x,
        y: inner_area.y + inner_area.height.saturating_sub(1),
        width: inner_area.width,
        height: 1,
    };
    frame.render_stateful_widget(scrollbar, scrollbar_area, &mut app.log_horizontal_scroll_state);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_and_level_are_split_out() {
        let line = style_log_line("2026-01-02 10:11:12  INFO Scan started.");
        assert_eq!(line.spans[0].content, "2026-01-02 10:11:12 ");
        assert_eq!(line.spans[1].content, "INFO");
        assert_eq!(line.spans[2].content, " Scan started.");
    }

    #[test]
    fn short_lines_are_kept_whole() {
        assert_eq!(style_log_line("panic").spans.len(), 1);
    }
}
