//! Facilitator-side gate: turns slide moves into stored allowed-index
//! updates and broadcast events.

use std::sync::Arc;

use compagnon_core::model::{
    GateClass, ModuleId, NavigationState, Session, SessionCode, SessionError,
    SessionPosition, SubmoduleId, SyncEvent, TemplateKind,
};
use serde::{Deserialize, Serialize};
use storage::repository::{ModuleRepository, NavigationStateRepository, SessionRepository};
use tracing::{debug, info, warn};

use crate::bus::EventPublisher;
use crate::error::GateError;

/// Whether a slide of this template holds participants back.
#[must_use]
pub fn classify(template: TemplateKind) -> GateClass {
    template.classify()
}

/// Result of a facilitator advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceOutcome {
    /// Stored allowed index after the call.
    pub allowed_index: u32,
    /// Whether the stored value was raised (and an event published).
    pub changed: bool,
}

/// A facilitator "go to slide" instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateRequest {
    pub module_id: Option<ModuleId>,
    pub submodule_index: u32,
    pub submodule_id: Option<SubmoduleId>,
}

#[derive(Clone)]
pub struct NavigationGate {
    navigation: Arc<dyn NavigationStateRepository>,
    sessions: Arc<dyn SessionRepository>,
    modules: Arc<dyn ModuleRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl NavigationGate {
    #[must_use]
    pub fn new(
        navigation: Arc<dyn NavigationStateRepository>,
        sessions: Arc<dyn SessionRepository>,
        modules: Arc<dyn ModuleRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            navigation,
            sessions,
            modules,
            publisher,
        }
    }

    /// Authoritative allowed index for a key; 0 when never advanced.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Storage` if the store cannot be read.
    pub async fn allowed_index(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
    ) -> Result<u32, GateError> {
        Ok(self.navigation.fetch_allowed_index(code, module_id).await?)
    }

    /// Facilitator moved to `new_index`; raise the stored allowed index if
    /// that passes it and tell everyone.
    ///
    /// A lower or equal index changes nothing and publishes nothing.
    ///
    /// # Errors
    ///
    /// Returns `GateError` if the session or module is unknown, the index is
    /// outside the module, the session ends before the new value is
    /// published, or persistence fails. A persistence failure is not rolled
    /// back anywhere: the caller's own view has already moved.
    pub async fn advance(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
        new_index: u32,
    ) -> Result<AdvanceOutcome, GateError> {
        let session = self.resolve(code, module_id, new_index).await?;
        self.record_position(&session, module_id, new_index).await;

        let stored = self
            .navigation
            .fetch_allowed_index(code, module_id)
            .await
            .inspect_err(|err| {
                warn!(session = %code, module_id = %module_id, error = %err, "allowed index read failed");
            })?;
        let state = NavigationState::from_persisted(code.clone(), module_id, stored);

        let Some(proposed) = state.propose(new_index) else {
            debug!(session = %code, module_id = %module_id, new_index, stored, "advance below allowed index");
            return Ok(AdvanceOutcome {
                allowed_index: stored,
                changed: false,
            });
        };

        let allowed_index = self
            .navigation
            .persist_allowed_index(code, module_id, proposed)
            .await
            .inspect_err(|err| {
                warn!(session = %code, module_id = %module_id, proposed, error = %err, "allowed index persist failed");
            })?;

        // The session may have ended while this call was in flight; its
        // navigation state must not outlive it.
        match self.active_session(code).await {
            Ok(_) => {}
            Err(
                err @ (GateError::Session(SessionError::AlreadyEnded(_))
                | GateError::SessionNotFound(_)),
            ) => {
                let cleared = self.navigation.clear_session(code).await?;
                info!(session = %code, module_id = %module_id, cleared, "advance raced session end");
                return Err(err);
            }
            Err(err) => return Err(err),
        }

        self.publisher.publish(
            code,
            SyncEvent::ModuleAdvance {
                module_id,
                allowed_index,
            },
        );
        info!(session = %code, module_id = %module_id, allowed_index, "allowed index raised");

        Ok(AdvanceOutcome {
            allowed_index,
            changed: true,
        })
    }

    /// Move every participant view of a module to `target_index`.
    ///
    /// The stored allowed index is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `GateError` if the session or module is unknown or the index
    /// is outside the module.
    pub async fn force_sync(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
        target_index: u32,
    ) -> Result<(), GateError> {
        let session = self.resolve(code, module_id, target_index).await?;
        self.record_position(&session, module_id, target_index).await;

        self.publisher.publish(
            code,
            SyncEvent::ForceSync {
                module_id,
                target_index,
            },
        );
        info!(session = %code, module_id = %module_id, target_index, "force sync");
        Ok(())
    }

    /// Broadcast a direct navigation instruction.
    ///
    /// Without a module id the event addresses every view of the session.
    ///
    /// # Errors
    ///
    /// Returns `GateError` if the session is unknown or ended, or a given
    /// module is unknown or too short for the index.
    pub async fn navigate(
        &self,
        code: &SessionCode,
        request: NavigateRequest,
    ) -> Result<(), GateError> {
        match request.module_id {
            Some(module_id) => {
                let session = self
                    .resolve(code, module_id, request.submodule_index)
                    .await?;
                self.record_position(&session, module_id, request.submodule_index)
                    .await;
            }
            None => {
                self.active_session(code).await?;
            }
        }

        self.publisher.publish(
            code,
            SyncEvent::Navigate {
                module_id: request.module_id,
                session_id: Some(code.clone()),
                submodule_index: request.submodule_index,
                submodule_id: request.submodule_id,
            },
        );
        debug!(session = %code, index = request.submodule_index, "navigate");
        Ok(())
    }

    async fn active_session(&self, code: &SessionCode) -> Result<Session, GateError> {
        let session = self
            .sessions
            .get_session(code)
            .await?
            .ok_or_else(|| GateError::SessionNotFound(code.clone()))?;
        if !session.is_active() {
            return Err(SessionError::AlreadyEnded(code.clone()).into());
        }
        Ok(session)
    }

    async fn resolve(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
        index: u32,
    ) -> Result<Session, GateError> {
        let session = self.active_session(code).await?;
        session.ensure_module(module_id)?;
        let module = self
            .modules
            .get_module(module_id)
            .await?
            .ok_or(GateError::ModuleNotFound(module_id))?;
        if module.submodule(index).is_none() {
            return Err(GateError::IndexOutOfRange {
                index,
                len: module.submodules().len(),
            });
        }
        Ok(session)
    }

    /// Best-effort join snapshot for late participants.
    ///
    /// Only the position columns are written, and only while the session is
    /// active, so a concurrent mode change or end is never overwritten.
    async fn record_position(&self, session: &Session, module_id: ModuleId, index: u32) {
        let position = SessionPosition {
            module_id,
            submodule_index: index,
        };
        if session.position() == Some(position) {
            return;
        }
        match self.sessions.update_position(session.code(), position).await {
            Ok(true) => {}
            Ok(false) => debug!(session = %session.code(), "position skipped for inactive session"),
            Err(err) => warn!(session = %session.code(), error = %err, "position not persisted"),
        }
    }
}
