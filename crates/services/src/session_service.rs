use std::sync::Arc;

use compagnon_core::model::{
    ModuleId, PresentationMode, SESSION_CODE_ALPHABET, SESSION_CODE_LEN, Session, SessionCode,
    SessionCodeError, SessionError, SyncEvent, TemplateKind,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use storage::repository::{
    ModuleRepository, NavigationStateRepository, SessionRepository, StorageError,
};
use tracing::{info, warn};

use crate::Clock;
use crate::bus::EventPublisher;
use crate::error::SessionServiceError;

const CODE_ATTEMPTS: usize = 8;

/// What a client needs to mount a module view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleOutline {
    pub module_id: ModuleId,
    pub title: String,
    pub templates: Vec<TemplateKind>,
    /// Facilitator's last known slide in this module, for late joiners.
    pub initial_index: u32,
}

/// Session lifecycle: start, look up, change mode, end.
#[derive(Clone)]
pub struct SessionService {
    clock: Clock,
    sessions: Arc<dyn SessionRepository>,
    modules: Arc<dyn ModuleRepository>,
    navigation: Arc<dyn NavigationStateRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl SessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        sessions: Arc<dyn SessionRepository>,
        modules: Arc<dyn ModuleRepository>,
        navigation: Arc<dyn NavigationStateRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            clock,
            sessions,
            modules,
            navigation,
            publisher,
        }
    }

    /// Start a session over existing modules under a fresh random code.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError` if a module is missing, the list is
    /// empty, no free code is found, or storage fails.
    pub async fn start(
        &self,
        module_ids: Vec<ModuleId>,
        mode: PresentationMode,
    ) -> Result<Session, SessionServiceError> {
        for module_id in &module_ids {
            if self.modules.get_module(*module_id).await?.is_none() {
                return Err(SessionServiceError::ModuleNotFound(*module_id));
            }
        }

        for _ in 0..CODE_ATTEMPTS {
            let session = Session::start(
                generate_code()?,
                module_ids.clone(),
                mode,
                self.clock.now(),
            )?;
            match self.sessions.insert_session(&session).await {
                Ok(()) => {
                    info!(session = %session.code(), modules = session.module_ids().len(), mode = %mode, "session started");
                    return Ok(session);
                }
                Err(StorageError::Conflict) => {
                    warn!(session = %session.code(), "session code taken, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(SessionServiceError::CodeSpaceExhausted)
    }

    /// # Errors
    ///
    /// Returns `SessionServiceError::NotFound` for unknown codes.
    pub async fn get(&self, code: &SessionCode) -> Result<Session, SessionServiceError> {
        self.sessions
            .get_session(code)
            .await?
            .ok_or_else(|| SessionServiceError::NotFound(code.clone()))
    }

    /// End the session, drop its navigation state and notify peers.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError` if the session is unknown or already
    /// ended, or storage fails.
    pub async fn end(&self, code: &SessionCode) -> Result<Session, SessionServiceError> {
        let mut session = self.get(code).await?;
        session.end(self.clock.now())?;
        self.store(&session).await?;
        let cleared = self.navigation.clear_session(code).await?;

        self.publisher.publish(code, SyncEvent::SessionEnded);
        info!(session = %code, cleared, "session ended");
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns `SessionServiceError` if the session is unknown or ended.
    pub async fn set_mode(
        &self,
        code: &SessionCode,
        mode: PresentationMode,
    ) -> Result<Session, SessionServiceError> {
        let mut session = self.get(code).await?;
        if session.mode() == mode {
            return Ok(session);
        }
        session.set_mode(mode)?;
        self.store(&session).await?;

        self.publisher.publish(code, SyncEvent::ModeChanged { mode });
        info!(session = %code, mode = %mode, "presentation mode changed");
        Ok(session)
    }

    /// Set or clear the per-session theme name.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError` if the session is unknown or ended, or
    /// storage fails.
    pub async fn set_theme_override(
        &self,
        code: &SessionCode,
        theme: Option<String>,
    ) -> Result<Session, SessionServiceError> {
        let mut session = self.get(code).await?;
        session.set_theme_override(theme)?;
        self.store(&session).await?;
        Ok(session)
    }

    /// Template kinds of a module in this session, plus the join snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError` if the session or module is unknown or
    /// the module is not part of the session.
    pub async fn outline(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
    ) -> Result<ModuleOutline, SessionServiceError> {
        let session = self.get(code).await?;
        session.ensure_module(module_id)?;
        let module = self
            .modules
            .get_module(module_id)
            .await?
            .ok_or(SessionServiceError::ModuleNotFound(module_id))?;

        let last = u32::try_from(module.submodules().len().saturating_sub(1)).unwrap_or(u32::MAX);
        Ok(ModuleOutline {
            module_id,
            title: module.title().to_string(),
            templates: module.outline(),
            initial_index: session.initial_index(module_id).min(last),
        })
    }

    /// Write back a session read earlier; an end that landed in between
    /// wins.
    async fn store(&self, session: &Session) -> Result<(), SessionServiceError> {
        match self.sessions.update_session(session).await {
            Err(StorageError::Conflict) => {
                Err(SessionError::AlreadyEnded(session.code().clone()).into())
            }
            other => Ok(other?),
        }
    }
}

fn generate_code() -> Result<SessionCode, SessionCodeError> {
    let mut rng = rand::rng();
    let raw: String = (0..SESSION_CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..SESSION_CODE_ALPHABET.len());
            char::from(SESSION_CODE_ALPHABET[idx])
        })
        .collect();
    SessionCode::new(raw)
}
