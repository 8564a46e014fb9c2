use super::SqliteRepository;
use super::queries::{
    SELECT_EVENT_LAST_SYNCED, SELECT_LISTING_LAST_SYNCED, SELECT_SYNC_MARKER,
    SELECT_TICKET_LAST_SYNCED, UPSERT_SYNC_MARKER,
};
use crate::application::ports::repositories::SyncStateRepository;
use crate::domain::value_objects::EntityTable;
use crate::infrastructure::database::SqlValue;
use crate::params;
use crate::shared::error::AppError;
use async_trait::async_trait;
use sqlx::Row;

/// テーブル全体取得（fetch_all / fetch_active）のマーカーキー
const TABLE_SCOPE: &str = "*";

fn parse_numeric_key(table: EntityTable, key: &str) -> Result<i64, AppError> {
    key.trim()
        .parse::<i64>()
        .map_err(|_| AppError::invalid_input(format!("Invalid {table} key: {key}")))
}

fn marker_lookup(table: EntityTable, scope: &str) -> (&'static str, Vec<SqlValue>) {
    (SELECT_SYNC_MARKER, params![table.as_str(), scope])
}

/// キーの解釈:
/// - events: event_id（行）
/// - tickets: `contract:token_id`（行）、または所有者アドレス（fetch_user のマーカー）
/// - marketplace_listings: listing_id（行）
/// - users: アドレス（fetch_one のマーカー。台帳に存在しない場合も記録される）
fn key_lookup(table: EntityTable, key: &str) -> Result<(&'static str, Vec<SqlValue>), AppError> {
    let lookup = match table {
        EntityTable::Events => (
            SELECT_EVENT_LAST_SYNCED,
            params![parse_numeric_key(table, key)?],
        ),
        EntityTable::Tickets => match key.split_once(':') {
            Some((contract, token_id)) => (SELECT_TICKET_LAST_SYNCED, params![contract, token_id]),
            None => marker_lookup(table, key),
        },
        EntityTable::MarketplaceListings => (
            SELECT_LISTING_LAST_SYNCED,
            params![parse_numeric_key(table, key)?],
        ),
        EntityTable::Users => marker_lookup(table, key),
    };
    Ok(lookup)
}

#[async_trait]
impl SyncStateRepository for SqliteRepository {
    async fn last_synced(
        &self,
        table: EntityTable,
        key: Option<&str>,
    ) -> Result<Option<i64>, AppError> {
        let (sql, params) = match key {
            Some(key) => key_lookup(table, key)?,
            None => marker_lookup(table, TABLE_SCOPE),
        };

        match self.store.query_optional(sql, &params).await? {
            Some(row) => Ok(row.try_get::<Option<i64>, _>("last_synced")?),
            None => Ok(None),
        }
    }

    async fn mark_synced(
        &self,
        table: EntityTable,
        scope: Option<&str>,
        synced_at: i64,
    ) -> Result<(), AppError> {
        let scope = scope.unwrap_or(TABLE_SCOPE);
        self.store
            .exec(UPSERT_SYNC_MARKER, &params![table.as_str(), scope, synced_at])
            .await?;
        Ok(())
    }
}
