//! Collaborators the stores talk to without knowing what renders them.

use crate::core::preferences::{Language, ResolvedTheme};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A short user-visible message, the toast of a graphical front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log instead of showing them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => log::error!("{}", notice.message),
            NoticeLevel::Warning => log::warn!("{}", notice.message),
            NoticeLevel::Info | NoticeLevel::Success => log::info!("{}", notice.message),
        }
    }
}

/// Side effects the preference and session stores push to whatever renders the app.
pub trait Presentation: Send + Sync {
    fn apply_theme(&self, theme: ResolvedTheme);
    fn apply_language(&self, language: Language);
    fn set_title(&self, title: &str);
    /// Full navigation to an application route, e.g. `/login`.
    fn navigate(&self, route: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresentation;

impl Presentation for LogPresentation {
    fn apply_theme(&self, theme: ResolvedTheme) {
        log::debug!("Applying theme: {}", theme.as_str());
    }

    fn apply_language(&self, language: Language) {
        log::debug!("Applying language: {}", language.as_tag());
    }

    fn set_title(&self, title: &str) {
        log::debug!("Title: {}", title);
    }

    fn navigate(&self, route: &str) {
        log::info!("Navigate to {}", route);
    }
}
