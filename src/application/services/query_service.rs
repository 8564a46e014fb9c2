use crate::application::ports::repositories::{
    EventRepository, ListingRepository, TicketRepository, UserRepository,
};
use crate::application::services::content_service::ContentService;
use crate::application::services::sync_orchestrator::SyncOrchestrator;
use crate::domain::entities::{
    ContentLinked, Enhanced, Event, EventFilter, ListingFilter, MarketplaceListing,
    PRIORITY_DEFAULT, PRIORITY_URGENT, SearchScope, Ticket, User,
};
use crate::domain::value_objects::EntityTable;
use crate::shared::error::AppError;
use crate::shared::unix_now;
use crate::shared::validation::{clamp_limit, normalize_address};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    pub events: Vec<Enhanced<Event>>,
    pub users: Vec<Enhanced<User>>,
}

/// キャッシュから即座に返し、必要なら裏で同期を積む読み取り層
pub struct QueryService {
    events: Arc<dyn EventRepository>,
    tickets: Arc<dyn TicketRepository>,
    listings: Arc<dyn ListingRepository>,
    users: Arc<dyn UserRepository>,
    orchestrator: Arc<SyncOrchestrator>,
    content: Arc<ContentService>,
}

impl QueryService {
    pub fn new(
        events: Arc<dyn EventRepository>,
        tickets: Arc<dyn TicketRepository>,
        listings: Arc<dyn ListingRepository>,
        users: Arc<dyn UserRepository>,
        orchestrator: Arc<SyncOrchestrator>,
        content: Arc<ContentService>,
    ) -> Self {
        Self {
            events,
            tickets,
            listings,
            users,
            orchestrator,
            content,
        }
    }

    pub async fn get_events(&self, filter: &EventFilter) -> Result<Vec<Enhanced<Event>>, AppError> {
        clamp_limit(filter.limit)?;
        let mut filter = filter.clone();
        if let Some(organizer) = &filter.organizer {
            filter.organizer = Some(normalize_address(organizer)?);
        }

        let events = self.events.list_events(&filter).await?;
        self.refresh_table_if_stale(EntityTable::Events, "fetch_all").await;
        Ok(self.enhance_all(events).await)
    }

    pub async fn get_event(
        &self,
        event_id: u64,
        force_refresh: bool,
    ) -> Result<Option<Enhanced<Event>>, AppError> {
        let event = self.events.get_event(event_id).await?;
        let last_synced = event.as_ref().map(|e| e.last_synced);
        self.refresh_row(
            EntityTable::Events,
            "fetch_one",
            json!({"event_id": event_id}),
            last_synced,
            force_refresh,
        )
        .await;

        match event {
            Some(event) => Ok(Some(self.enhance(event).await)),
            None => Ok(None),
        }
    }

    /// 鮮度は所有者単位の最終 fetch_user で判定する。0件の所有者も同期済みになる
    pub async fn get_user_tickets(
        &self,
        owner: &str,
        force_refresh: bool,
    ) -> Result<Vec<Enhanced<Ticket>>, AppError> {
        let owner = normalize_address(owner)?;
        let tickets = self.tickets.tickets_by_owner(&owner).await?;
        let last_synced = self.scope_last_synced(EntityTable::Tickets, &owner).await;
        self.refresh_row(
            EntityTable::Tickets,
            "fetch_user",
            json!({"owner": owner}),
            last_synced,
            force_refresh,
        )
        .await;

        Ok(self.enhance_all(tickets).await)
    }

    pub async fn get_marketplace_listings(
        &self,
        filter: &ListingFilter,
    ) -> Result<Vec<MarketplaceListing>, AppError> {
        clamp_limit(filter.limit)?;
        let mut filter = filter.clone();
        if let Some(seller) = &filter.seller {
            filter.seller = Some(normalize_address(seller)?);
        }

        let listings = self.listings.list_listings(&filter).await?;
        self.refresh_table_if_stale(EntityTable::MarketplaceListings, "fetch_active")
            .await;
        Ok(listings)
    }

    pub async fn get_user(
        &self,
        address: &str,
        force_refresh: bool,
    ) -> Result<Option<Enhanced<User>>, AppError> {
        let address = normalize_address(address)?;
        let user = self.users.get_user(&address).await?;
        let last_synced = self.scope_last_synced(EntityTable::Users, &address).await;
        self.refresh_row(
            EntityTable::Users,
            "fetch_one",
            json!({"address": address}),
            last_synced,
            force_refresh,
        )
        .await;

        match user {
            Some(user) => Ok(Some(self.enhance(user).await)),
            None => Ok(None),
        }
    }

    /// キャッシュ内のみを検索する。同期は発生しない
    pub async fn search(
        &self,
        query: &str,
        scope: SearchScope,
        limit: Option<u32>,
    ) -> Result<SearchResults, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::invalid_input("Search query cannot be empty"));
        }
        let limit = clamp_limit(limit)?;

        let mut results = SearchResults::default();
        if matches!(scope, SearchScope::All | SearchScope::Events) {
            let events = self.events.search_events(query, limit).await?;
            results.events = self.enhance_all(events).await;
        }
        if matches!(scope, SearchScope::All | SearchScope::Users) {
            let users = self.users.search_users(query, limit).await?;
            results.users = self.enhance_all(users).await;
        }

        tracing::debug!(
            target: "query",
            query,
            events = results.events.len(),
            users = results.users.len(),
            "search completed"
        );
        Ok(results)
    }

    /// 取得できない場合は未同期として扱う
    async fn scope_last_synced(&self, table: EntityTable, key: &str) -> Option<i64> {
        match self.orchestrator.last_synced(table, Some(key)).await {
            Ok(last_synced) => last_synced,
            Err(err) => {
                tracing::warn!(
                    target: "query",
                    table = %table,
                    key,
                    error = %err,
                    "failed to read sync marker"
                );
                None
            }
        }
    }

    /// 強制または未同期は緊急、期限切れは通常優先度で積む
    async fn refresh_row(
        &self,
        table: EntityTable,
        operation: &str,
        payload: Value,
        last_synced: Option<i64>,
        force_refresh: bool,
    ) {
        let priority = if force_refresh || last_synced.is_none() {
            PRIORITY_URGENT
        } else if self.orchestrator.staleness().is_stale(last_synced, unix_now()) {
            PRIORITY_DEFAULT
        } else {
            return;
        };
        self.request_refresh(table, operation, payload, priority)
            .await;
    }

    async fn refresh_table_if_stale(&self, table: EntityTable, operation: &str) {
        match self.orchestrator.should_sync(table, None).await {
            Ok(true) => {
                self.request_refresh(table, operation, json!({}), PRIORITY_DEFAULT)
                    .await
            }
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(
                    target: "query",
                    table = %table,
                    error = %err,
                    "failed to check staleness"
                );
            }
        }
    }

    async fn request_refresh(&self, table: EntityTable, operation: &str, payload: Value, priority: i32) {
        match self
            .orchestrator
            .queue_sync_once(table, operation, payload, priority)
            .await
        {
            Ok(Some(task_id)) => {
                tracing::debug!(
                    target: "query",
                    table = %table,
                    operation,
                    priority,
                    task_id = %task_id,
                    "queued background refresh"
                );
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(
                    target: "query",
                    table = %table,
                    operation,
                    error = %err,
                    "failed to queue background refresh"
                );
            }
        }
    }

    async fn enhance_all<T: ContentLinked>(&self, records: Vec<T>) -> Vec<Enhanced<T>> {
        let mut enhanced = Vec::with_capacity(records.len());
        for record in records {
            enhanced.push(self.enhance(record).await);
        }
        enhanced
    }

    async fn enhance<T: ContentLinked>(&self, record: T) -> Enhanced<T> {
        let metadata = match record.metadata_uri() {
            Some(uri) => match self.content.resolve_metadata(uri).await {
                Ok(metadata) => metadata,
                Err(err) => {
                    tracing::warn!(
                        target: "query",
                        uri,
                        error = %err,
                        "failed to resolve metadata"
                    );
                    None
                }
            },
            None => None,
        };

        let image_url = record
            .image_uri()
            .and_then(|uri| self.content.image_url(uri))
            .or_else(|| {
                metadata
                    .as_ref()
                    .and_then(|m| m.get("image"))
                    .and_then(Value::as_str)
                    .and_then(|uri| self.content.image_url(uri))
            });

        Enhanced {
            record,
            metadata,
            image_url,
        }
    }
}
