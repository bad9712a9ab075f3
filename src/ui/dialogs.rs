use ratatui::style::{Color, Style};

/// Severity of a footer status line or alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    pub(crate) fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Holds the footer message text plus its severity.
#[derive(Debug, Clone)]
pub(crate) struct StatusMessage {
    pub(crate) text: String,
    pub(crate) kind: StatusKind,
}

/// Modal alert shown after the image download. It swallows every key until
/// dismissed.
#[derive(Debug, Clone)]
pub(crate) struct AlertDialog {
    pub(crate) title: &'static str,
    pub(crate) message: String,
    pub(crate) kind: StatusKind,
}

impl AlertDialog {
    pub(crate) fn info(title: &'static str, message: impl Into<String>) -> Self {
        Self {
            title,
            message: message.into(),
            kind: StatusKind::Info,
        }
    }

    pub(crate) fn error(title: &'static str, message: impl Into<String>) -> Self {
        Self {
            title,
            message: message.into(),
            kind: StatusKind::Error,
        }
    }
}
