use std::{fmt, str::FromStr};

use super::{ClientError, storage::LocalStorage};

pub const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// ANSI colour used for headings in terminal output.
    pub fn accent_code(self) -> &'static str {
        match self {
            Theme::Light => "34",
            Theme::Dark => "96",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme {other:?}")),
        }
    }
}

/// Terminal background preference, read from `COLORFGBG`.
pub fn system_theme() -> Theme {
    system_theme_from(std::env::var("COLORFGBG").ok().as_deref())
}

pub fn system_theme_from(colorfgbg: Option<&str>) -> Theme {
    let background = colorfgbg
        .and_then(|value| value.rsplit(';').next())
        .and_then(|value| value.trim().parse::<u8>().ok());

    match background {
        Some(0..=6 | 8) => Theme::Dark,
        _ => Theme::Light,
    }
}

pub fn stored_theme(storage: &dyn LocalStorage) -> Option<Theme> {
    storage.get(THEME_KEY)?.parse().ok()
}

pub fn resolve_theme(storage: &dyn LocalStorage, system: Theme) -> Theme {
    stored_theme(storage).unwrap_or(system)
}

pub fn toggle_theme(storage: &mut dyn LocalStorage, system: Theme) -> Result<Theme, ClientError> {
    let next = resolve_theme(storage, system).toggled();
    storage.set(THEME_KEY, next.as_str().to_string())?;
    Ok(next)
}
