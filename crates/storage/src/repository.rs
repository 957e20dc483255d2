use async_trait::async_trait;
use compagnon_core::model::{Module, ModuleId, Session, SessionCode, SessionPosition, Theme};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persistence contract for the per-(session, module) allowed index.
#[async_trait]
pub trait NavigationStateRepository: Send + Sync {
    /// Upsert the allowed index for a key, max-merged with any prior value.
    ///
    /// Returns the value actually stored, which is never lower than what was
    /// stored before.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be written.
    async fn persist_allowed_index(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
        allowed_index: u32,
    ) -> Result<u32, StorageError>;

    /// Read the allowed index for a key, defaulting to 0 when no record exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn fetch_allowed_index(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
    ) -> Result<u32, StorageError>;

    /// Drop every navigation record for a session. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on write failures.
    async fn clear_session(&self, code: &SessionCode) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a freshly started session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the code is already taken.
    async fn insert_session(&self, session: &Session) -> Result<(), StorageError>;

    /// Fetch a session by code.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get_session(&self, code: &SessionCode) -> Result<Option<Session>, StorageError>;

    /// Overwrite mode, theme, position and end time of a session that is
    /// still active.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist and
    /// `StorageError::Conflict` if it has already ended.
    async fn update_session(&self, session: &Session) -> Result<(), StorageError>;

    /// Record the facilitator position of an active session, leaving every
    /// other column alone. Returns `false` if no active session matched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on write failures.
    async fn update_position(
        &self,
        code: &SessionCode,
        position: SessionPosition,
    ) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait ModuleRepository: Send + Sync {
    /// Persist or replace a module together with its submodules.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the module cannot be stored.
    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get_module(&self, id: ModuleId) -> Result<Option<Module>, StorageError>;
}

#[async_trait]
pub trait ThemeRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get_theme(&self) -> Result<Option<Theme>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on write failures.
    async fn save_theme(&self, theme: &Theme) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    navigation: Arc<Mutex<HashMap<(SessionCode, ModuleId), u32>>>,
    sessions: Arc<Mutex<HashMap<SessionCode, Session>>>,
    modules: Arc<Mutex<HashMap<ModuleId, Module>>>,
    theme: Arc<Mutex<Option<Theme>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl NavigationStateRepository for InMemoryRepository {
    async fn persist_allowed_index(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
        allowed_index: u32,
    ) -> Result<u32, StorageError> {
        let mut guard = self.navigation.lock().map_err(poisoned)?;
        let stored = guard.entry((code.clone(), module_id)).or_insert(0);
        *stored = (*stored).max(allowed_index);
        Ok(*stored)
    }

    async fn fetch_allowed_index(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
    ) -> Result<u32, StorageError> {
        let guard = self.navigation.lock().map_err(poisoned)?;
        Ok(guard
            .get(&(code.clone(), module_id))
            .copied()
            .unwrap_or_default())
    }

    async fn clear_session(&self, code: &SessionCode) -> Result<u64, StorageError> {
        let mut guard = self.navigation.lock().map_err(poisoned)?;
        let before = guard.len();
        guard.retain(|(session, _), _| session != code);
        Ok(u64::try_from(before - guard.len()).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn insert_session(&self, session: &Session) -> Result<(), StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        if guard.contains_key(session.code()) {
            return Err(StorageError::Conflict);
        }
        guard.insert(session.code().clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, code: &SessionCode) -> Result<Option<Session>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        Ok(guard.get(code).cloned())
    }

    async fn update_session(&self, session: &Session) -> Result<(), StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        let slot = guard.get_mut(session.code()).ok_or(StorageError::NotFound)?;
        if !slot.is_active() {
            return Err(StorageError::Conflict);
        }
        *slot = session.clone();
        Ok(())
    }

    async fn update_position(
        &self,
        code: &SessionCode,
        position: SessionPosition,
    ) -> Result<bool, StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        match guard.get_mut(code) {
            Some(session) => Ok(session.record_position(position).is_ok()),
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ModuleRepository for InMemoryRepository {
    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError> {
        let mut guard = self.modules.lock().map_err(poisoned)?;
        guard.insert(module.id(), module.clone());
        Ok(())
    }

    async fn get_module(&self, id: ModuleId) -> Result<Option<Module>, StorageError> {
        let guard = self.modules.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }
}

#[async_trait]
impl ThemeRepository for InMemoryRepository {
    async fn get_theme(&self) -> Result<Option<Theme>, StorageError> {
        let guard = self.theme.lock().map_err(poisoned)?;
        Ok(guard.clone())
    }

    async fn save_theme(&self, theme: &Theme) -> Result<(), StorageError> {
        let mut guard = self.theme.lock().map_err(poisoned)?;
        *guard = Some(theme.clone());
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub navigation: Arc<dyn NavigationStateRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub modules: Arc<dyn ModuleRepository>,
    pub themes: Arc<dyn ThemeRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repo(InMemoryRepository::new())
    }

    /// Share one repository value across every trait object.
    pub fn from_repo<R>(repo: R) -> Self
    where
        R: NavigationStateRepository
            + SessionRepository
            + ModuleRepository
            + ThemeRepository
            + Clone
            + 'static,
    {
        Self {
            navigation: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            modules: Arc::new(repo.clone()),
            themes: Arc::new(repo),
        }
    }
}
