use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{ModuleId, SessionCode};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("a session needs at least one module")]
    NoModules,

    #[error("session {0} has already ended")]
    AlreadyEnded(SessionCode),

    #[error("ended_at is before started_at")]
    InvalidTimeRange,

    #[error("module {module_id} is not part of session {code}")]
    UnknownModule {
        code: SessionCode,
        module_id: ModuleId,
    },

    #[error("unknown presentation mode: {0}")]
    UnknownMode(String),
}

/// How slides move during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresentationMode {
    /// Facilitator steers every slide change.
    #[default]
    Manual,
    /// Slides advance on their duration estimate.
    Auto,
    /// Participants move on their own, gates still apply.
    SelfPaced,
    /// Facilitator steers, participants may review earlier slides.
    Hybrid,
}

impl PresentationMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PresentationMode::Manual => "manual",
            PresentationMode::Auto => "auto",
            PresentationMode::SelfPaced => "self-paced",
            PresentationMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for PresentationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresentationMode {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "manual" => Ok(PresentationMode::Manual),
            "auto" => Ok(PresentationMode::Auto),
            "self-paced" | "self_paced" | "selfpaced" => Ok(PresentationMode::SelfPaced),
            "hybrid" => Ok(PresentationMode::Hybrid),
            other => Err(SessionError::UnknownMode(other.to_string())),
        }
    }
}

/// Slide the facilitator last steered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPosition {
    pub module_id: ModuleId,
    pub submodule_index: u32,
}

/// A live facilitated run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    code: SessionCode,
    module_ids: Vec<ModuleId>,
    mode: PresentationMode,
    theme_override: Option<String>,
    position: Option<SessionPosition>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Start a new session over the given modules.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoModules` if `module_ids` is empty.
    pub fn start(
        code: SessionCode,
        module_ids: Vec<ModuleId>,
        mode: PresentationMode,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if module_ids.is_empty() {
            return Err(SessionError::NoModules);
        }
        let mut module_ids = module_ids;
        let mut seen = Vec::with_capacity(module_ids.len());
        module_ids.retain(|id| {
            if seen.contains(id) {
                false
            } else {
                seen.push(*id);
                true
            }
        });

        Ok(Self {
            code,
            module_ids,
            mode,
            theme_override: None,
            position: None,
            started_at,
            ended_at: None,
        })
    }

    /// Rehydrate a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if modules are missing or timestamps are inverted.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        code: SessionCode,
        module_ids: Vec<ModuleId>,
        mode: PresentationMode,
        theme_override: Option<String>,
        position: Option<SessionPosition>,
        started_at: DateTime<Utc>,
        ended_at: Option<DateTime<Utc>>,
    ) -> Result<Self, SessionError> {
        if module_ids.is_empty() {
            return Err(SessionError::NoModules);
        }
        if ended_at.is_some_and(|ended| ended < started_at) {
            return Err(SessionError::InvalidTimeRange);
        }
        Ok(Self {
            code,
            module_ids,
            mode,
            theme_override,
            position,
            started_at,
            ended_at,
        })
    }

    #[must_use]
    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    #[must_use]
    pub fn module_ids(&self) -> &[ModuleId] {
        &self.module_ids
    }

    #[must_use]
    pub fn includes_module(&self, module_id: ModuleId) -> bool {
        self.module_ids.contains(&module_id)
    }

    #[must_use]
    pub fn mode(&self) -> PresentationMode {
        self.mode
    }

    #[must_use]
    pub fn theme_override(&self) -> Option<&str> {
        self.theme_override.as_deref()
    }

    #[must_use]
    pub fn position(&self) -> Option<SessionPosition> {
        self.position
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Index the facilitator last showed for `module_id`, or 0.
    #[must_use]
    pub fn initial_index(&self, module_id: ModuleId) -> u32 {
        self.position
            .filter(|pos| pos.module_id == module_id)
            .map_or(0, |pos| pos.submodule_index)
    }

    /// Check that `module_id` belongs to this session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownModule` otherwise.
    pub fn ensure_module(&self, module_id: ModuleId) -> Result<(), SessionError> {
        if self.includes_module(module_id) {
            Ok(())
        } else {
            Err(SessionError::UnknownModule {
                code: self.code.clone(),
                module_id,
            })
        }
    }

    /// # Errors
    ///
    /// Returns `SessionError::AlreadyEnded` for ended sessions.
    pub fn set_mode(&mut self, mode: PresentationMode) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.mode = mode;
        Ok(())
    }

    /// Set or clear the theme name; blank names clear it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyEnded` once the session is over.
    pub fn set_theme_override(&mut self, theme: Option<String>) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.theme_override = theme
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError` if the session ended or the module is foreign.
    pub fn record_position(&mut self, position: SessionPosition) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.ensure_module(position.module_id)?;
        self.position = Some(position);
        Ok(())
    }

    /// Mark the session as ended.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyEnded` if called twice, and
    /// `SessionError::InvalidTimeRange` if `now` predates the start.
    pub fn end(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.ensure_active()?;
        if now < self.started_at {
            return Err(SessionError::InvalidTimeRange);
        }
        self.ended_at = Some(now);
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(SessionError::AlreadyEnded(self.code.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn build_session() -> Session {
        Session::start(
            SessionCode::new("ABCD23").unwrap(),
            vec![ModuleId::new(1), ModuleId::new(2), ModuleId::new(1)],
            PresentationMode::Manual,
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn start_deduplicates_modules() {
        let session = build_session();
        assert_eq!(session.module_ids(), &[ModuleId::new(1), ModuleId::new(2)]);
        assert!(session.is_active());
    }

    #[test]
    fn start_requires_modules() {
        let err = Session::start(
            SessionCode::new("ABCD23").unwrap(),
            Vec::new(),
            PresentationMode::Manual,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, SessionError::NoModules);
    }

    #[test]
    fn initial_index_follows_recorded_position() {
        let mut session = build_session();
        assert_eq!(session.initial_index(ModuleId::new(1)), 0);

        session
            .record_position(SessionPosition {
                module_id: ModuleId::new(2),
                submodule_index: 4,
            })
            .unwrap();

        assert_eq!(session.initial_index(ModuleId::new(2)), 4);
        assert_eq!(session.initial_index(ModuleId::new(1)), 0);
    }

    #[test]
    fn record_position_rejects_foreign_module() {
        let mut session = build_session();
        let err = session
            .record_position(SessionPosition {
                module_id: ModuleId::new(9),
                submodule_index: 0,
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::UnknownModule { .. }));
    }

    #[test]
    fn ended_session_rejects_changes() {
        let mut session = build_session();
        session.end(fixed_now()).unwrap();

        assert!(!session.is_active());
        assert!(matches!(
            session.set_mode(PresentationMode::Auto),
            Err(SessionError::AlreadyEnded(_))
        ));
        assert!(matches!(
            session.set_theme_override(Some("dark".into())),
            Err(SessionError::AlreadyEnded(_))
        ));
        assert_eq!(session.theme_override(), None);
        assert!(matches!(
            session.end(fixed_now()),
            Err(SessionError::AlreadyEnded(_))
        ));
    }

    #[test]
    fn mode_parses_kebab_case() {
        assert_eq!(
            "self-paced".parse::<PresentationMode>().unwrap(),
            PresentationMode::SelfPaced
        );
        assert!("turbo".parse::<PresentationMode>().is_err());
    }
}
