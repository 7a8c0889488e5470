use std::borrow::Cow;

use ratatui::style::{Color, Modifier, Style};
use ratatui::DefaultTerminal;

use crate::error::Result;

pub const HEADER_STYLE: Style = Style::new().fg(Color::Cyan).add_modifier(Modifier::BOLD);
pub const FOOTER_STYLE: Style = Style::new().fg(Color::Gray);
pub const SELECTED_STYLE: Style = Style::new().bg(Color::Rgb(30, 50, 70));
pub const CHECKED_STYLE: Style = Style::new().fg(Color::Green).add_modifier(Modifier::BOLD);
pub const ACTIVE_TAB_STYLE: Style = Style::new()
    .fg(Color::Black)
    .bg(Color::Cyan)
    .add_modifier(Modifier::BOLD);
pub const WARNING_STYLE: Style = Style::new().fg(Color::LightRed);

/// Cell text wrapped to `width` columns, with the row height it needs.
pub fn wrap_text(text: &str, width: usize) -> (String, u16) {
    let lines = if width == 0 {
        vec![Cow::Borrowed(text)]
    } else {
        textwrap::wrap(text, width)
    };
    let height = lines.len().clamp(1, u16::MAX as usize) as u16;
    (lines.join("\n"), height)
}

/// Run `app` on a fresh full-screen terminal, restoring it afterwards even
/// when the app panics.
pub fn run_terminal<F>(app: F) -> Result<()>
where
    F: FnOnce(&mut DefaultTerminal) -> Result<()>,
{
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        ratatui::restore();
        previous(panic);
    }));

    let mut terminal = ratatui::init();
    let outcome = app(&mut terminal);
    ratatui::restore();
    outcome
}
