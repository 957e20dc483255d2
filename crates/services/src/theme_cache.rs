use std::sync::Arc;

use compagnon_core::model::{Session, Theme, ThemeDraft};
use storage::repository::ThemeRepository;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::ThemeServiceError;

/// Platform theme held in memory, loaded once and written through on
/// update.
pub struct ThemeCache {
    repo: Arc<dyn ThemeRepository>,
    current: RwLock<Theme>,
}

impl ThemeCache {
    /// Load the persisted theme (or defaults if none was saved).
    ///
    /// # Errors
    ///
    /// Returns `ThemeServiceError` on storage failures.
    pub async fn load(repo: Arc<dyn ThemeRepository>) -> Result<Self, ThemeServiceError> {
        let theme = repo.get_theme().await?.unwrap_or_default();
        info!(theme = theme.name(), "theme loaded");
        Ok(Self {
            repo,
            current: RwLock::new(theme),
        })
    }

    pub async fn current(&self) -> Theme {
        self.current.read().await.clone()
    }

    /// Theme a session presents with: its override name, if any, over the
    /// platform palette.
    pub async fn for_session(&self, session: &Session) -> Theme {
        let theme = self.current().await;
        match session.theme_override() {
            Some(name) => theme.with_name(name),
            None => theme,
        }
    }

    /// Validate, persist, then swap the cached theme.
    ///
    /// The cache is left untouched if validation or persistence fails.
    ///
    /// # Errors
    ///
    /// Returns `ThemeServiceError` for invalid colors or storage failures.
    pub async fn update(&self, draft: ThemeDraft) -> Result<Theme, ThemeServiceError> {
        let theme = draft.validate()?;
        let mut current = self.current.write().await;
        self.repo.save_theme(&theme).await?;
        *current = theme.clone();
        info!(theme = theme.name(), "theme updated");
        Ok(theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compagnon_core::model::{ModuleId, PresentationMode, SessionCode};
    use compagnon_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn load_falls_back_to_default() {
        let cache = ThemeCache::load(Arc::new(InMemoryRepository::new()))
            .await
            .unwrap();
        assert_eq!(cache.current().await, Theme::default());
    }

    #[tokio::test]
    async fn update_writes_through() {
        let repo = InMemoryRepository::new();
        let cache = ThemeCache::load(Arc::new(repo.clone())).await.unwrap();

        let saved = cache
            .update(ThemeDraft {
                name: Some("Night".into()),
                background_color: Some("#101010".into()),
                ..ThemeDraft::default()
            })
            .await
            .unwrap();

        assert_eq!(cache.current().await, saved);
        assert_eq!(repo.get_theme().await.unwrap(), Some(saved.clone()));

        let reloaded = ThemeCache::load(Arc::new(repo)).await.unwrap();
        assert_eq!(reloaded.current().await.name(), "Night");
    }

    #[tokio::test]
    async fn invalid_update_keeps_cached_theme() {
        let cache = ThemeCache::load(Arc::new(InMemoryRepository::new()))
            .await
            .unwrap();
        let err = cache
            .update(ThemeDraft {
                primary_color: Some("blue".into()),
                ..ThemeDraft::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ThemeServiceError::Theme(_)));
        assert_eq!(cache.current().await, Theme::default());
    }

    #[tokio::test]
    async fn session_override_names_the_platform_palette() {
        let cache = ThemeCache::load(Arc::new(InMemoryRepository::new()))
            .await
            .unwrap();
        let platform = cache
            .update(ThemeDraft {
                name: Some("Harbour".into()),
                primary_color: Some("#003366".into()),
                ..ThemeDraft::default()
            })
            .await
            .unwrap();
        let mut session = Session::start(
            SessionCode::new("ROOM42").unwrap(),
            vec![ModuleId::new(1)],
            PresentationMode::Manual,
            fixed_now(),
        )
        .unwrap();

        assert_eq!(cache.for_session(&session).await, platform);

        session.set_theme_override(Some("Night".into())).unwrap();
        let themed = cache.for_session(&session).await;
        assert_eq!(themed.name(), "Night");
        assert_eq!(themed.primary_color(), "#003366");
        assert_eq!(cache.current().await.name(), "Harbour");
    }
}
