use async_trait::async_trait;
use compagnon_core::model::{Session, SessionCode, SessionPosition};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    conn, index_from_i64, module_id_from_i64, module_id_to_i64, parse_mode, ser,
    session_code_from_str,
};
use crate::repository::{SessionRepository, StorageError};

fn position_columns(session: &Session) -> Result<(Option<i64>, Option<i64>), StorageError> {
    match session.position() {
        Some(pos) => Ok((
            Some(module_id_to_i64(pos.module_id)?),
            Some(i64::from(pos.submodule_index)),
        )),
        None => Ok((None, None)),
    }
}

#[async_trait]
impl SessionRepository for SqliteRepository {
    async fn insert_session(&self, session: &Session) -> Result<(), StorageError> {
        let (position_module, position_index) = position_columns(session)?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
            INSERT INTO sessions (code, mode, theme_override, position_module_id, position_index, started_at, ended_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(code) DO NOTHING
            ",
        )
        .bind(session.code().as_str())
        .bind(session.mode().as_str())
        .bind(session.theme_override())
        .bind(position_module)
        .bind(position_index)
        .bind(session.started_at())
        .bind(session.ended_at())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        for (ordinal, module_id) in session.module_ids().iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO session_modules (session_code, ordinal, module_id)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(session.code().as_str())
            .bind(i64::try_from(ordinal).map_err(ser)?)
            .bind(module_id_to_i64(*module_id)?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_session(&self, code: &SessionCode) -> Result<Option<Session>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT code, mode, theme_override, position_module_id, position_index, started_at, ended_at
            FROM sessions WHERE code = ?1
            ",
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let module_rows = sqlx::query(
            r"
            SELECT module_id FROM session_modules
            WHERE session_code = ?1
            ORDER BY ordinal ASC
            ",
        )
        .bind(code.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut module_ids = Vec::with_capacity(module_rows.len());
        for module_row in module_rows {
            module_ids.push(module_id_from_i64(
                module_row.try_get::<i64, _>("module_id").map_err(ser)?,
            )?);
        }

        let position_module: Option<i64> = row.try_get("position_module_id").map_err(ser)?;
        let position_index: Option<i64> = row.try_get("position_index").map_err(ser)?;
        let position = match (position_module, position_index) {
            (Some(module_id), Some(index)) => Some(SessionPosition {
                module_id: module_id_from_i64(module_id)?,
                submodule_index: index_from_i64("position_index", index)?,
            }),
            _ => None,
        };

        let mode: String = row.try_get("mode").map_err(ser)?;
        let stored_code: String = row.try_get("code").map_err(ser)?;

        Session::from_persisted(
            session_code_from_str(&stored_code)?,
            module_ids,
            parse_mode(&mode)?,
            row.try_get("theme_override").map_err(ser)?,
            position,
            row.try_get("started_at").map_err(ser)?,
            row.try_get("ended_at").map_err(ser)?,
        )
        .map(Some)
        .map_err(ser)
    }

    async fn update_session(&self, session: &Session) -> Result<(), StorageError> {
        let (position_module, position_index) = position_columns(session)?;
        let res = sqlx::query(
            r"
            UPDATE sessions SET
                mode = ?2,
                theme_override = ?3,
                position_module_id = ?4,
                position_index = ?5,
                ended_at = ?6
            WHERE code = ?1 AND ended_at IS NULL
            ",
        )
        .bind(session.code().as_str())
        .bind(session.mode().as_str())
        .bind(session.theme_override())
        .bind(position_module)
        .bind(position_index)
        .bind(session.ended_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() > 0 {
            return Ok(());
        }
        let exists = sqlx::query("SELECT 1 FROM sessions WHERE code = ?1")
            .bind(session.code().as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        match exists {
            Some(_) => Err(StorageError::Conflict),
            None => Err(StorageError::NotFound),
        }
    }

    async fn update_position(
        &self,
        code: &SessionCode,
        position: SessionPosition,
    ) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
            UPDATE sessions SET
                position_module_id = ?2,
                position_index = ?3
            WHERE code = ?1
              AND ended_at IS NULL
              AND EXISTS (
                  SELECT 1 FROM session_modules
                  WHERE session_code = ?1 AND module_id = ?2
              )
            ",
        )
        .bind(code.as_str())
        .bind(module_id_to_i64(position.module_id)?)
        .bind(i64::from(position.submodule_index))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.rows_affected() > 0)
    }
}
