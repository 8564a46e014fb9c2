use crate::domain::entities::{
    Event, MarketplaceListing, SyncAuditRecord, SyncTaskStatus, Ticket, User,
};
use crate::domain::value_objects::{EntityTable, SyncTaskId};
use crate::shared::error::AppError;
use sqlx::{Row, sqlite::SqliteRow};

fn get_u64(row: &SqliteRow, column: &str) -> Result<u64, AppError> {
    let value: i64 = row.try_get(column)?;
    Ok(value.max(0) as u64)
}

fn get_bool(row: &SqliteRow, column: &str) -> Result<bool, AppError> {
    let value: i64 = row.try_get(column)?;
    Ok(value != 0)
}

pub(super) fn map_event_row(row: &SqliteRow) -> Result<Event, AppError> {
    Ok(Event {
        event_id: get_u64(row, "event_id")?,
        organizer: row.try_get("organizer")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        venue: row.try_get("venue")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        ticket_price: row.try_get("ticket_price")?,
        total_tickets: get_u64(row, "total_tickets")?,
        tickets_sold: get_u64(row, "tickets_sold")?,
        is_active: get_bool(row, "is_active")?,
        metadata_uri: row.try_get("metadata_uri")?,
        image_uri: row.try_get("image_uri")?,
        last_synced: row.try_get("last_synced")?,
    })
}

pub(super) fn map_ticket_row(row: &SqliteRow) -> Result<Ticket, AppError> {
    Ok(Ticket {
        contract_address: row.try_get("contract_address")?,
        token_id: row.try_get("token_id")?,
        event_id: get_u64(row, "event_id")?,
        owner: row.try_get("owner")?,
        purchase_price: row.try_get("purchase_price")?,
        is_used: get_bool(row, "is_used")?,
        is_listed: get_bool(row, "is_listed")?,
        metadata_uri: row.try_get("metadata_uri")?,
        image_uri: row.try_get("image_uri")?,
        last_synced: row.try_get("last_synced")?,
    })
}

pub(super) fn map_listing_row(row: &SqliteRow) -> Result<MarketplaceListing, AppError> {
    Ok(MarketplaceListing {
        listing_id: get_u64(row, "listing_id")?,
        contract_address: row.try_get("contract_address")?,
        token_id: row.try_get("token_id")?,
        event_id: get_u64(row, "event_id")?,
        seller: row.try_get("seller")?,
        price: row.try_get("price")?,
        is_active: get_bool(row, "is_active")?,
        listed_at: row.try_get("listed_at")?,
        last_synced: row.try_get("last_synced")?,
    })
}

pub(super) fn map_user_row(row: &SqliteRow) -> Result<User, AppError> {
    Ok(User {
        address: row.try_get("address")?,
        display_name: row.try_get("display_name")?,
        avatar_uri: row.try_get("avatar_uri")?,
        bio: row.try_get("bio")?,
        tickets_owned: get_u64(row, "tickets_owned")?,
        events_organized: get_u64(row, "events_organized")?,
        last_synced: row.try_get("last_synced")?,
    })
}

pub(super) fn map_sync_audit_row(row: &SqliteRow) -> Result<SyncAuditRecord, AppError> {
    let task_id: String = row.try_get("task_id")?;
    let table_name: String = row.try_get("table_name")?;
    let status: String = row.try_get("status")?;
    let attempts: i64 = row.try_get("attempts")?;
    let priority: i64 = row.try_get("priority")?;

    Ok(SyncAuditRecord {
        task_id: SyncTaskId::new(task_id).map_err(AppError::Database)?,
        table: table_name
            .parse::<EntityTable>()
            .map_err(AppError::Database)?,
        operation: row.try_get("operation")?,
        priority: i32::try_from(priority).unwrap_or(i32::MAX),
        status: parse_status(&status)?,
        attempts: u32::try_from(attempts.max(0)).unwrap_or(u32::MAX),
        error_message: row.try_get("error_message")?,
        enqueued_at: row.try_get("enqueued_at")?,
        finished_at: row.try_get("finished_at")?,
    })
}

fn parse_status(value: &str) -> Result<SyncTaskStatus, AppError> {
    match value {
        "pending" => Ok(SyncTaskStatus::Pending),
        "processing" => Ok(SyncTaskStatus::Processing),
        "completed" => Ok(SyncTaskStatus::Completed),
        "failed" => Ok(SyncTaskStatus::Failed),
        other => Err(AppError::Database(format!("Unknown sync status: {other}"))),
    }
}
