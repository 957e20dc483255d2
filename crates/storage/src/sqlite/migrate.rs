use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned schema migrations.
///
/// Version 1 creates modules, sessions, navigation states and the theme row.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS modules (
                    id INTEGER PRIMARY KEY,
                    title TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS submodules (
                    module_id INTEGER NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    id INTEGER NOT NULL,
                    title TEXT NOT NULL,
                    template TEXT NOT NULL,
                    duration_secs INTEGER NOT NULL CHECK (duration_secs >= 0),
                    PRIMARY KEY (module_id, position),
                    UNIQUE (module_id, id),
                    FOREIGN KEY (module_id) REFERENCES modules(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sessions (
                    code TEXT PRIMARY KEY,
                    mode TEXT NOT NULL,
                    theme_override TEXT,
                    position_module_id INTEGER,
                    position_index INTEGER CHECK (position_index >= 0),
                    started_at TEXT NOT NULL,
                    ended_at TEXT
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS session_modules (
                    session_code TEXT NOT NULL,
                    ordinal INTEGER NOT NULL,
                    module_id INTEGER NOT NULL,
                    PRIMARY KEY (session_code, module_id),
                    FOREIGN KEY (session_code) REFERENCES sessions(code) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS navigation_states (
                    session_code TEXT NOT NULL,
                    module_id INTEGER NOT NULL,
                    allowed_index INTEGER NOT NULL CHECK (allowed_index >= 0),
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (session_code, module_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS theme_settings (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    name TEXT NOT NULL,
                    primary_color TEXT NOT NULL,
                    accent_color TEXT NOT NULL,
                    background_color TEXT NOT NULL,
                    font_family TEXT
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_session_modules_ordinal
                    ON session_modules (session_code, ordinal);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
