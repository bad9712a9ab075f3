use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::api::FetchError;

/// Staff lines drawn inside the image preview panel.
const STAFF_PATTERN: &[&str] = &["-=-=-=-=", "        ", "  o   ♪ ", "        "];

/// Repeat a short ASCII motif until it fills the requested width.
pub(crate) fn repeat_pattern_row(row: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    if row.is_empty() {
        return " ".repeat(width);
    }
    let chars: Vec<char> = row.chars().collect();
    (0..width).map(|idx| chars[idx % chars.len()]).collect()
}

/// Build the preview shown in place of the sheet image, with the download
/// hint centered on the last row.
pub(crate) fn image_preview_lines(inner_width: u16, inner_height: u16) -> Vec<Line<'static>> {
    let width = inner_width as usize;
    let height = inner_height as usize;
    if width == 0 || height == 0 {
        return vec![Line::from("")];
    }

    let staff_style = Style::default().fg(Color::DarkGray);
    let mut lines: Vec<Line<'static>> = (0..height.saturating_sub(1))
        .map(|row| {
            let base = STAFF_PATTERN[row % STAFF_PATTERN.len()];
            Line::from(Span::styled(repeat_pattern_row(base, width), staff_style))
        })
        .collect();

    lines.push(Line::from(Span::styled(
        centered_label("[d] Descargar", width),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines
}

/// Center `label` inside `width` columns, truncating when it does not fit.
pub(crate) fn centered_label(label: &str, width: usize) -> String {
    let label: String = label.chars().take(width).collect();
    let padding = width.saturating_sub(label.chars().count());
    let left = padding / 2;
    format!("{}{}{}", " ".repeat(left), label, " ".repeat(padding - left))
}

/// `Label: value`, with a dash standing in for blank values.
pub(crate) fn attribute_line(label: &str, value: &str) -> Line<'static> {
    let value = if value.trim().is_empty() {
        "-".to_string()
    } else {
        value.trim().to_string()
    };
    Line::from(vec![
        Span::styled(
            format!("{label}: "),
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(value),
    ])
}

/// `Página X de Y`. Y never drops below one so an empty listing reads
/// "Página 1 de 1".
pub(crate) fn page_indicator(current: usize, total: usize) -> String {
    format!("Página {} de {}", current, total.max(1))
}

/// Short, user-facing description of a fetch failure.
pub(crate) fn describe_fetch_error(err: &FetchError) -> String {
    match err {
        FetchError::NotFound(id) => format!("No se encontró la partitura {id}."),
        FetchError::Status(code) => format!("El servidor respondió con HTTP {code}."),
        FetchError::Network(_) => "No se pudo conectar con el servidor.".to_string(),
        FetchError::Decode(_) => "El servidor envió datos que no se pudieron leer.".to_string(),
    }
}

/// Produce a rectangle centered within `area` that spans the requested percent
/// of the width and height. Used for modal dialogs.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1]);

    vertical[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_pattern_row_fills_width() {
        assert_eq!(repeat_pattern_row("ab", 5), "ababa");
        assert_eq!(repeat_pattern_row("", 3), "   ");
        assert_eq!(repeat_pattern_row("ab", 0), "");
    }

    #[test]
    fn test_centered_label_pads_and_truncates() {
        assert_eq!(centered_label("ab", 6), "  ab  ");
        assert_eq!(centered_label("abcdef", 3), "abc");
    }

    #[test]
    fn test_page_indicator_never_shows_zero_pages() {
        assert_eq!(page_indicator(1, 0), "Página 1 de 1");
        assert_eq!(page_indicator(2, 3), "Página 2 de 3");
    }

    #[test]
    fn test_image_preview_has_requested_height() {
        let lines = image_preview_lines(12, 6);
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0].width(), 12);
    }
}
