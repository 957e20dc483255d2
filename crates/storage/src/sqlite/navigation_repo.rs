use async_trait::async_trait;
use chrono::Utc;
use compagnon_core::model::{ModuleId, SessionCode};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, index_from_i64, module_id_to_i64, ser};
use crate::repository::{NavigationStateRepository, StorageError};

#[async_trait]
impl NavigationStateRepository for SqliteRepository {
    async fn persist_allowed_index(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
        allowed_index: u32,
    ) -> Result<u32, StorageError> {
        // Max-merge happens inside the upsert so a lower value can never win.
        let row = sqlx::query(
            r"
            INSERT INTO navigation_states (session_code, module_id, allowed_index, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(session_code, module_id) DO UPDATE SET
                allowed_index = MAX(navigation_states.allowed_index, excluded.allowed_index),
                updated_at = CASE
                    WHEN excluded.allowed_index > navigation_states.allowed_index
                        THEN excluded.updated_at
                    ELSE navigation_states.updated_at
                END
            RETURNING allowed_index
            ",
        )
        .bind(code.as_str())
        .bind(module_id_to_i64(module_id)?)
        .bind(i64::from(allowed_index))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        index_from_i64("allowed_index", row.try_get("allowed_index").map_err(ser)?)
    }

    async fn fetch_allowed_index(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
    ) -> Result<u32, StorageError> {
        let row = sqlx::query(
            r"
            SELECT allowed_index
            FROM navigation_states
            WHERE session_code = ?1 AND module_id = ?2
            ",
        )
        .bind(code.as_str())
        .bind(module_id_to_i64(module_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => index_from_i64("allowed_index", row.try_get("allowed_index").map_err(ser)?),
            None => Ok(0),
        }
    }

    async fn clear_session(&self, code: &SessionCode) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM navigation_states WHERE session_code = ?1")
            .bind(code.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(res.rows_affected())
    }
}
