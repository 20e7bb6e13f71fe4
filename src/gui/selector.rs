use std::{fmt::Display, time::Duration};

use crate::gui::error::GuiError;

use crossterm::event::{self, KeyCode, KeyEventKind};
use ratatui::{
    prelude::*,
    widgets::{
        block::{Position, Title},
        *,
    },
    Terminal,
};

/// Move `cursor` one step through `len` entries, wrapping at both ends.
fn step(cursor: usize, len: usize, forward: bool) -> usize {
    if len == 0 {
        0
    } else if forward {
        (cursor + 1) % len
    } else {
        (cursor + len - 1) % len
    }
}

/// A `width` x `height` rectangle in the middle of `area`, clipped to it.
fn centered(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Pop up a list of `options` over whatever is on screen and let the user
/// pick one. Returns the chosen index, or `None` if the user backed out.
pub fn select_option<B: Backend, T: Display>(
    terminal: &mut Terminal<B>,
    title: &str,
    options: &[T],
    current: usize,
) -> Result<Option<usize>, GuiError> {
    if options.is_empty() {
        return Ok(None);
    }
    let n_options = options.len();
    let mut cursor = current.min(n_options - 1);
    let mut list_state = ListState::default().with_selected(Some(cursor));
    let labels: Vec<String> = options.iter().map(|o| o.to_string()).collect();
    let width = labels.iter().map(|l| l.len()).max().unwrap_or(0).max(title.len()) as u16 + 8;
    let height = n_options as u16 + 2;

    loop {
        let heading = Title::from(Span::from(format!(" {title} ")).magenta().bold());
        let instructions = Title::from(Line::from(vec![
            " Select ".into(),
            "<Enter>".magenta().bold(),
            " Back ".into(),
            "<Esc> ".magenta().bold(),
        ]));
        let block = Block::default()
            .title(heading.alignment(Alignment::Center))
            .title(
                instructions
                    .alignment(Alignment::Center)
                    .position(Position::Bottom),
            )
            .borders(Borders::ALL);
        let list = List::new(labels.iter().map(String::as_str))
            .style(Style::default().fg(Color::White))
            .highlight_symbol(">>")
            .highlight_style(Style::default().fg(Color::Magenta))
            .block(block);
        list_state.select(Some(cursor));
        terminal.draw(|frame| {
            let area = centered(width.max(24), height, frame.size());
            frame.render_widget(Clear, area);
            frame.render_stateful_widget(list, area, &mut list_state);
        })?;

        if event::poll(Duration::from_millis(16))? {
            if let event::Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Down => cursor = step(cursor, n_options, true),
                        KeyCode::Up => cursor = step(cursor, n_options, false),
                        KeyCode::Enter => return Ok(Some(cursor)),
                        KeyCode::Esc | KeyCode::Char('q') => return Ok(None),
                        _ => {}
                    }
                }
            }
        }
    }
}
