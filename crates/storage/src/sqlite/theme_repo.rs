use async_trait::async_trait;
use compagnon_core::model::{Theme, ThemeDraft};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser};
use crate::repository::{StorageError, ThemeRepository};

#[async_trait]
impl ThemeRepository for SqliteRepository {
    async fn get_theme(&self) -> Result<Option<Theme>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT name, primary_color, accent_color, background_color, font_family
            FROM theme_settings
            WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        Theme::from_persisted(ThemeDraft {
            name: row.try_get("name").map_err(ser)?,
            primary_color: row.try_get("primary_color").map_err(ser)?,
            accent_color: row.try_get("accent_color").map_err(ser)?,
            background_color: row.try_get("background_color").map_err(ser)?,
            font_family: row.try_get("font_family").map_err(ser)?,
        })
        .map(Some)
        .map_err(ser)
    }

    async fn save_theme(&self, theme: &Theme) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO theme_settings (id, name, primary_color, accent_color, background_color, font_family)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                primary_color = excluded.primary_color,
                accent_color = excluded.accent_color,
                background_color = excluded.background_color,
                font_family = excluded.font_family
            ",
        )
        .bind(1_i64)
        .bind(theme.name())
        .bind(theme.primary_color())
        .bind(theme.accent_color())
        .bind(theme.background_color())
        .bind(theme.font_family())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
