use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platform-wide presentation theme.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    name: String,
    primary_color: String,
    accent_color: String,
    background_color: String,
    font_family: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeDraft {
    pub name: Option<String>,
    pub primary_color: Option<String>,
    pub accent_color: Option<String>,
    pub background_color: Option<String>,
    pub font_family: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ThemeError {
    #[error("invalid {field} color: {value}")]
    InvalidColor { field: &'static str, value: String },
}

const DEFAULT_NAME: &str = "compagnon";
const DEFAULT_PRIMARY: &str = "#1F4E79";
const DEFAULT_ACCENT: &str = "#F2A541";
const DEFAULT_BACKGROUND: &str = "#FFFFFF";

impl ThemeDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and normalize the draft; missing fields take default values.
    ///
    /// # Errors
    ///
    /// Returns `ThemeError` for colors that are not `#RRGGBB`.
    pub fn validate(self) -> Result<Theme, ThemeError> {
        let name = normalize_optional(self.name).unwrap_or_else(|| DEFAULT_NAME.to_string());
        let primary_color = color("primary", self.primary_color, DEFAULT_PRIMARY)?;
        let accent_color = color("accent", self.accent_color, DEFAULT_ACCENT)?;
        let background_color = color("background", self.background_color, DEFAULT_BACKGROUND)?;

        Ok(Theme {
            name,
            primary_color,
            accent_color,
            background_color,
            font_family: normalize_optional(self.font_family),
        })
    }
}

impl Theme {
    /// # Errors
    ///
    /// Returns `ThemeError` if the persisted values no longer validate.
    pub fn from_persisted(draft: ThemeDraft) -> Result<Self, ThemeError> {
        draft.validate()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn primary_color(&self) -> &str {
        &self.primary_color
    }

    #[must_use]
    pub fn accent_color(&self) -> &str {
        &self.accent_color
    }

    #[must_use]
    pub fn background_color(&self) -> &str {
        &self.background_color
    }

    #[must_use]
    pub fn font_family(&self) -> Option<&str> {
        self.font_family.as_deref()
    }

    /// Same palette shown under another name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            primary_color: DEFAULT_PRIMARY.to_string(),
            accent_color: DEFAULT_ACCENT.to_string(),
            background_color: DEFAULT_BACKGROUND.to_string(),
            font_family: None,
        }
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

fn color(field: &'static str, value: Option<String>, default: &str) -> Result<String, ThemeError> {
    let Some(value) = normalize_optional(value) else {
        return Ok(default.to_string());
    };
    let hex = value.strip_prefix('#').unwrap_or_default();
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(value.to_ascii_uppercase())
    } else {
        Err(ThemeError::InvalidColor { field, value })
    }
}
