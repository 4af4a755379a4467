use tracing::info;

use super::core::EventStore;
use crate::error::Result;
use crate::TARGET_DB;

pub(crate) const PROCESSED_AT_COLUMN: &str = "processed_at";

impl EventStore {
    /// Create the event table when it does not exist yet, and add the
    /// bookkeeping columns an older table may lack. Existing data is never
    /// touched.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        let table = self.table();
        let mut conn = self.pool().acquire().await?;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                {id} TEXT PRIMARY KEY,
                date TEXT,
                city TEXT,
                province TEXT,
                country TEXT,
                latitude REAL,
                longitude REAL,
                value REAL,
                severity_level TEXT,
                file_name TEXT,
                threshold REAL,
                seq INTEGER,
                {flag} INTEGER DEFAULT 0,
                {processed_at} TEXT
            );
            "#,
            table = table.name,
            id = table.id_column,
            flag = table.flag_column,
            processed_at = PROCESSED_AT_COLUMN,
        ))
        .execute(&mut *conn)
        .await?;
        drop(conn);

        let columns = self.columns().await?;
        for (column, ty) in [
            (table.flag_column.as_str(), "INTEGER DEFAULT 0"),
            (PROCESSED_AT_COLUMN, "TEXT"),
        ] {
            if !columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                info!(target: TARGET_DB, "Adding column {}.{}", table.name, column);
                sqlx::query(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    table.name, column, ty
                ))
                .execute(self.pool())
                .await?;
            }
        }
        Ok(())
    }

    /// Column names of the event table, in declaration order.
    pub(crate) async fn columns(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>("SELECT name FROM pragma_table_info(?)")
            .bind(&self.table().name)
            .fetch_all(self.pool())
            .await?;
        Ok(names)
    }
}
