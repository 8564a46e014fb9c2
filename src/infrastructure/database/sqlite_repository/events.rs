use super::SqliteRepository;
use super::mapper::map_event_row;
use super::queries::{SEARCH_EVENTS, SELECT_EVENT_BY_ID, SELECT_EVENTS_BASE, UPSERT_EVENT};
use crate::application::ports::repositories::EventRepository;
use crate::domain::entities::{Event, EventFilter, EventSort};
use crate::infrastructure::database::{SqlValue, Statement};
use crate::params;
use crate::shared::error::AppError;
use crate::shared::validation::{clamp_limit, like_pattern};
use async_trait::async_trait;

fn upsert_statement(event: &Event) -> Statement {
    (
        UPSERT_EVENT.to_string(),
        params![
            event.event_id,
            event.organizer.as_str(),
            event.name.as_str(),
            event.description.as_deref(),
            event.venue.as_deref(),
            event.start_time,
            event.end_time,
            event.ticket_price.as_str(),
            event.total_tickets,
            event.tickets_sold,
            event.is_active,
            event.metadata_uri.as_deref(),
            event.image_uri.as_deref(),
            event.last_synced,
        ],
    )
}

fn build_list_query(filter: &EventFilter) -> Result<(String, Vec<SqlValue>), AppError> {
    let mut sql = String::from(SELECT_EVENTS_BASE);
    let mut params: Vec<SqlValue> = Vec::new();

    if let Some(active) = filter.active_only {
        if active {
            sql.push_str(" AND is_active = 1");
        }
    }
    if let Some(organizer) = &filter.organizer {
        sql.push_str(" AND organizer = ?");
        params.push(organizer.to_ascii_lowercase().into());
    }
    if let Some(after) = filter.starts_after {
        sql.push_str(" AND start_time >= ?");
        params.push(after.into());
    }
    if let Some(before) = filter.starts_before {
        sql.push_str(" AND start_time <= ?");
        params.push(before.into());
    }
    if let Some(text) = filter.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = like_pattern(text);
        sql.push_str(
            " AND (name LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\' OR venue LIKE ? ESCAPE '\\')",
        );
        params.push(pattern.clone().into());
        params.push(pattern.clone().into());
        params.push(pattern.into());
    }

    sql.push_str(match filter.sort {
        EventSort::StartTimeAsc => " ORDER BY start_time ASC, event_id ASC",
        EventSort::StartTimeDesc => " ORDER BY start_time DESC, event_id DESC",
        EventSort::Newest => " ORDER BY event_id DESC",
    });

    sql.push_str(" LIMIT ? OFFSET ?");
    params.push(clamp_limit(filter.limit)?.into());
    params.push(filter.offset.unwrap_or(0).into());

    Ok((sql, params))
}

#[async_trait]
impl EventRepository for SqliteRepository {
    async fn upsert_events(&self, events: &[Event]) -> Result<u64, AppError> {
        let statements: Vec<Statement> = events.iter().map(upsert_statement).collect();
        self.store.exec_batch(&statements).await
    }

    async fn get_event(&self, event_id: u64) -> Result<Option<Event>, AppError> {
        let row = self
            .store
            .query_optional(SELECT_EVENT_BY_ID, &params![event_id])
            .await?;

        match row {
            Some(row) => Ok(Some(map_event_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, AppError> {
        let (sql, params) = build_list_query(filter)?;
        let rows = self.store.query(&sql, &params).await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(map_event_row(&row)?);
        }
        Ok(events)
    }

    async fn search_events(&self, query: &str, limit: u32) -> Result<Vec<Event>, AppError> {
        if query.trim().is_empty() {
            return Ok(vec![]);
        }

        let pattern = like_pattern(query.trim());
        let rows = self
            .store
            .query(
                SEARCH_EVENTS,
                &params![pattern.as_str(), pattern.as_str(), pattern.as_str(), limit],
            )
            .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(map_event_row(&row)?);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{event, repository};
    use super::*;

    #[tokio::test]
    async fn upsert_keeps_last_synced_monotonic() {
        let repo = repository().await;
        repo.upsert_events(&[event(1, "Launch", 1_000, 500)])
            .await
            .unwrap();

        let mut older = event(1, "Launch (renamed)", 1_000, 100);
        older.tickets_sold = 3;
        repo.upsert_events(&[older]).await.unwrap();

        let stored = repo.get_event(1).await.unwrap().unwrap();
        assert_eq!(stored.name, "Launch (renamed)");
        assert_eq!(stored.tickets_sold, 3);
        assert_eq!(stored.last_synced, 500);
    }

    #[tokio::test]
    async fn list_applies_filters_sort_and_paging() {
        let repo = repository().await;
        let mut inactive = event(3, "Closed", 3_000, 1);
        inactive.is_active = false;
        repo.upsert_events(&[
            event(1, "Rust Meetup", 1_000, 1),
            event(2, "Jazz Night", 2_000, 1),
            inactive,
            event(4, "Rust Conf", 4_000, 1),
        ])
        .await
        .unwrap();

        let active = repo
            .list_events(&EventFilter {
                active_only: Some(true),
                sort: EventSort::StartTimeDesc,
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<u64> = active.iter().map(|e| e.event_id).collect();
        assert_eq!(ids, vec![4, 2, 1]);

        let rust = repo
            .list_events(&EventFilter {
                text: Some("rust".into()),
                starts_after: Some(2_000),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rust.len(), 1);
        assert_eq!(rust[0].event_id, 4);

        let page = repo
            .list_events(&EventFilter {
                limit: Some(2),
                offset: Some(1),
                sort: EventSort::Newest,
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<u64> = page.iter().map(|e| e.event_id).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let repo = repository().await;
        repo.upsert_events(&[
            event(1, "50% off night", 1_000, 1),
            event(2, "500 people", 2_000, 1),
        ])
        .await
        .unwrap();

        let hits = repo.search_events("50%", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].event_id, 1);
    }

    #[tokio::test]
    async fn zero_limit_is_rejected() {
        let repo = repository().await;
        let err = repo
            .list_events(&EventFilter {
                limit: Some(0),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
