// src/ui/widgets/input.rs
use crate::app::{App, AppState};
use ratatui::{
    layout::Position,
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

/// Renders the input box widget.
pub fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let title = match (&app.state, &app.snapshot) {
        (AppState::Scanning | AppState::Finished, Some(snapshot)) => {
            format!("Target Domain ({})", snapshot.record.status)
        }
        _ => "Target Domain".to_string(),
    };
    let input_block = Block::default().borders(Borders::ALL).title(title);
    let input_paragraph = Paragraph::new(app.input.as_str())
        .block(input_block)
        .style(Style::default().fg(Color::Yellow));
    frame.render_widget(input_paragraph, area);

    // Show the cursor only when in the Idle state.
    if app.state == AppState::Idle {
        frame.set_cursor_position(Position::new(area.x + app.input.len() as u16 + 1, area.y + 1));
    }
}
