use async_trait::async_trait;
use compagnon_core::model::{Module, ModuleId, Submodule};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    conn, index_from_i64, module_id_from_i64, module_id_to_i64, parse_template, ser,
    submodule_id_from_i64, submodule_id_to_i64,
};
use crate::repository::{ModuleRepository, StorageError};

#[async_trait]
impl ModuleRepository for SqliteRepository {
    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError> {
        let module_id = module_id_to_i64(module.id())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO modules (id, title)
            VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET title = excluded.title
            ",
        )
        .bind(module_id)
        .bind(module.title())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("DELETE FROM submodules WHERE module_id = ?1")
            .bind(module_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, sub) in module.submodules().iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO submodules (module_id, position, id, title, template, duration_secs)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(module_id)
            .bind(i64::try_from(position).map_err(ser)?)
            .bind(submodule_id_to_i64(sub.id)?)
            .bind(sub.title.as_str())
            .bind(sub.template.as_str())
            .bind(i64::from(sub.duration_secs))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_module(&self, id: ModuleId) -> Result<Option<Module>, StorageError> {
        let row = sqlx::query("SELECT id, title FROM modules WHERE id = ?1")
            .bind(module_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        match row {
            Some(row) => self.module_from_row(&row).await.map(Some),
            None => Ok(None),
        }
    }

}

impl SqliteRepository {
    async fn module_from_row(&self, row: &SqliteRow) -> Result<Module, StorageError> {
        let id: i64 = row.try_get("id").map_err(ser)?;
        let sub_rows = sqlx::query(
            r"
            SELECT id, title, template, duration_secs
            FROM submodules
            WHERE module_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut submodules = Vec::with_capacity(sub_rows.len());
        for sub in &sub_rows {
            let template: String = sub.try_get("template").map_err(ser)?;
            submodules.push(Submodule::new(
                submodule_id_from_i64(sub.try_get::<i64, _>("id").map_err(ser)?)?,
                sub.try_get::<String, _>("title").map_err(ser)?,
                parse_template(&template)?,
                index_from_i64(
                    "duration_secs",
                    sub.try_get::<i64, _>("duration_secs").map_err(ser)?,
                )?,
            ));
        }

        Module::new(
            module_id_from_i64(id)?,
            row.try_get::<String, _>("title").map_err(ser)?,
            submodules,
        )
        .map_err(ser)
    }
}
