use ratatui::style::{Color, Modifier, Style};
use ratatui::DefaultTerminal;

use crate::table::CellStyle;

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Yellow)
    .add_modifier(Modifier::BOLD);

pub const FOOTER_STYLE: Style = Style::new().fg(Color::DarkGray);

pub const AMOUNT_POS_STYLE: Style = Style::new().fg(Color::Rgb(80, 220, 100));
pub const AMOUNT_NEG_STYLE: Style = Style::new().fg(Color::Red);

pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(40, 40, 60))
    .add_modifier(Modifier::BOLD);

pub const SUCCESS_STYLE: Style = Style::new().fg(Color::Green);
pub const ERROR_STYLE: Style = Style::new().fg(Color::Red);

pub const BADGE_ACTIVE_STYLE: Style = Style::new()
    .fg(Color::Rgb(80, 220, 100))
    .add_modifier(Modifier::BOLD);
pub const BADGE_INACTIVE_STYLE: Style = Style::new().fg(Color::Gray);

/// Terminal style for a rendered table cell.
pub fn cell_style(style: CellStyle) -> Style {
    match style {
        CellStyle::Plain => Style::new(),
        CellStyle::Placeholder => FOOTER_STYLE,
        CellStyle::Positive => AMOUNT_POS_STYLE,
        CellStyle::Negative => AMOUNT_NEG_STYLE,
        CellStyle::Badge { active: true } => BADGE_ACTIVE_STYLE,
        CellStyle::Badge { active: false } => BADGE_INACTIVE_STYLE,
    }
}

/// Wrap text to a given width. Returns (wrapped_string, line_count).
pub fn wrap_text(text: &str, width: usize) -> (String, u16) {
    if width == 0 {
        return (text.to_string(), 1);
    }
    let wrapped = textwrap::fill(text, width);
    let lines = wrapped.lines().count().max(1) as u16;
    (wrapped, lines)
}

/// Run `body` on the alternate screen. Installs a panic hook that restores
/// the terminal first, and restores it again on the way out.
pub fn with_terminal<T>(body: impl FnOnce(&mut DefaultTerminal) -> T) -> T {
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        ratatui::restore();
        hook(info);
    }));

    let mut terminal = ratatui::init();
    let result = body(&mut terminal);
    drop(terminal);
    ratatui::restore();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text() {
        let (wrapped, lines) = wrap_text("aporte mensal do cliente", 10);
        assert_eq!(lines, 3);
        assert!(wrapped.lines().all(|l| l.chars().count() <= 10));
        assert_eq!(wrap_text("abc", 0), ("abc".to_string(), 1));
    }

    #[test]
    fn test_cell_styles() {
        assert_eq!(cell_style(CellStyle::Negative), AMOUNT_NEG_STYLE);
        assert_eq!(cell_style(CellStyle::Badge { active: true }), BADGE_ACTIVE_STYLE);
        assert_eq!(cell_style(CellStyle::Plain), Style::new());
    }
}
