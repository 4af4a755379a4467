use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Pool, Sqlite,
};
use std::str::FromStr;
use tokio::time::Duration;
use tracing::{info, instrument};

use crate::config::Settings;
use crate::error::Result;
use crate::TARGET_DB;

/// Where rain events live. Names come from settings and are validated as
/// plain identifiers before they reach SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTable {
    pub name: String,
    pub id_column: String,
    pub flag_column: String,
}

impl EventTable {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            name: settings.events_table.clone(),
            id_column: settings.id_column.clone(),
            flag_column: settings.flag_column.clone(),
        }
    }
}

impl Default for EventTable {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

#[derive(Clone)]
pub struct EventStore {
    pool: Pool<Sqlite>,
    table: EventTable,
}

impl EventStore {
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub fn table(&self) -> &EventTable {
        &self.table
    }

    #[instrument(target = "db_query", level = "info", skip(table))]
    pub async fn connect(database_path: &str, table: EventTable) -> Result<Self> {
        info!(target: TARGET_DB, "Opening event store: {}", database_path);

        let connect_options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", database_path))?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_secs(5))
                .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;

        let store = EventStore { pool, table };
        store.ensure_schema().await?;
        info!(target: TARGET_DB, "Event store ready (table {})", store.table.name);
        Ok(store)
    }

    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        Self::connect(&settings.database_path, EventTable::from_settings(settings)).await
    }
}
