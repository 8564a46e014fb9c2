use crate::application::ports::ledger_client::{LedgerCall, LedgerClient, TxReceipt};
use crate::application::ports::repositories::{
    EventRepository, ListingRepository, SyncStateRepository, TicketRepository, UserRepository,
};
use crate::application::ports::sync_task_handler::SyncTaskHandler;
use crate::application::services::notification_bus::NotificationBus;
use crate::domain::entities::notification::created_event;
use crate::domain::entities::{Event, MarketplaceListing, SyncOutcome, SyncTask, Ticket};
use crate::domain::value_objects::EntityTable;
use crate::shared::error::AppError;
use crate::shared::unix_now;
use crate::shared::validation::{normalize_address, normalize_uint};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;

const CREATE_EVENT_METHOD: &str = "createEvent";
const PURCHASE_TICKET_METHOD: &str = "purchaseTicket";
const LIST_TICKET_METHOD: &str = "listTicket";
const EVENT_CREATED_LOG: &str = "EventCreated";
const TICKET_LISTED_LOG: &str = "TicketListed";

#[derive(Debug, Deserialize)]
struct EventIdPayload {
    event_id: u64,
}

#[derive(Debug, Deserialize)]
struct OwnerPayload {
    owner: String,
}

#[derive(Debug, Deserialize)]
struct TicketKeyPayload {
    contract_address: String,
    token_id: String,
}

#[derive(Debug, Deserialize)]
struct AddressPayload {
    address: String,
}

#[derive(Debug, Deserialize)]
struct CreateEventPayload {
    name: String,
    description: Option<String>,
    venue: Option<String>,
    start_time: i64,
    end_time: Option<i64>,
    ticket_price: String,
    total_tickets: u64,
    metadata_uri: Option<String>,
    image_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PurchasePayload {
    event_id: u64,
    buyer: String,
    value_wei: String,
}

#[derive(Debug, Deserialize)]
struct ListPayload {
    contract_address: String,
    token_id: String,
    price: String,
}

fn parse_payload<T: DeserializeOwned>(task: &SyncTask) -> Result<T, AppError> {
    serde_json::from_value(task.payload.clone()).map_err(|err| {
        AppError::invalid_input(format!(
            "Invalid payload for {}/{}: {err}",
            task.table, task.operation
        ))
    })
}

fn stamp_event(mut event: Event, now: i64) -> Event {
    event.organizer = event.organizer.to_ascii_lowercase();
    event.last_synced = now;
    event
}

fn stamp_ticket(mut ticket: Ticket, now: i64) -> Ticket {
    ticket.contract_address = ticket.contract_address.to_ascii_lowercase();
    ticket.owner = ticket.owner.to_ascii_lowercase();
    ticket.last_synced = now;
    ticket
}

fn stamp_listing(mut listing: MarketplaceListing, now: i64) -> MarketplaceListing {
    listing.contract_address = listing.contract_address.to_ascii_lowercase();
    listing.seller = listing.seller.to_ascii_lowercase();
    listing.last_synced = now;
    listing
}

fn log_u64(receipt: &TxReceipt, log: &str, field: &str) -> Option<u64> {
    let value = receipt.find_event(log)?.args.get(field)?;
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

/// 台帳を読み、キャッシュへ upsert する同期ハンドラー
pub struct LedgerSyncHandler {
    ledger: Arc<dyn LedgerClient>,
    events: Arc<dyn EventRepository>,
    tickets: Arc<dyn TicketRepository>,
    listings: Arc<dyn ListingRepository>,
    users: Arc<dyn UserRepository>,
    sync_state: Arc<dyn SyncStateRepository>,
    bus: NotificationBus,
}

impl LedgerSyncHandler {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        events: Arc<dyn EventRepository>,
        tickets: Arc<dyn TicketRepository>,
        listings: Arc<dyn ListingRepository>,
        users: Arc<dyn UserRepository>,
        sync_state: Arc<dyn SyncStateRepository>,
        bus: NotificationBus,
    ) -> Self {
        Self {
            ledger,
            events,
            tickets,
            listings,
            users,
            sync_state,
            bus,
        }
    }

    async fn fetch_all_events(&self) -> Result<SyncOutcome, AppError> {
        let count = self.ledger.event_count().await?;
        let mut events = Vec::new();
        for event_id in 1..=count {
            match self.ledger.get_event(event_id).await {
                Ok(event) => events.push(event),
                Err(AppError::LedgerReverted(reason)) => {
                    tracing::debug!(
                        target: "sync::orchestrator",
                        event_id,
                        reason = %reason,
                        "skipping reverted event"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        let now = unix_now();
        let events: Vec<Event> = events.into_iter().map(|e| stamp_event(e, now)).collect();
        self.events.upsert_events(&events).await?;
        self.sync_state.mark_synced(EntityTable::Events, None, now).await?;
        Ok(SyncOutcome::upserted(events.len() as u64))
    }

    async fn fetch_event(&self, event_id: u64) -> Result<Event, AppError> {
        let event = self.ledger.get_event(event_id).await?;
        let event = stamp_event(event, unix_now());
        self.events.upsert_events(std::slice::from_ref(&event)).await?;
        Ok(event)
    }

    async fn create_event(&self, task: &SyncTask) -> Result<SyncOutcome, AppError> {
        let payload: CreateEventPayload = parse_payload(task)?;
        if payload.name.trim().is_empty() {
            return Err(AppError::invalid_input("Event name cannot be empty"));
        }
        if payload.total_tickets == 0 {
            return Err(AppError::invalid_input("total_tickets must be greater than 0"));
        }
        let ticket_price = normalize_uint(&payload.ticket_price, "ticket_price")?;

        let receipt = self
            .ledger
            .mutate(LedgerCall {
                method: CREATE_EVENT_METHOD.to_string(),
                args: json!({
                    "name": payload.name,
                    "description": payload.description,
                    "venue": payload.venue,
                    "start_time": payload.start_time,
                    "end_time": payload.end_time,
                    "ticket_price": ticket_price,
                    "total_tickets": payload.total_tickets,
                    "metadata_uri": payload.metadata_uri,
                    "image_uri": payload.image_uri,
                }),
                value_wei: None,
            })
            .await?;

        let event_id = match log_u64(&receipt, EVENT_CREATED_LOG, "event_id") {
            Some(id) => id,
            None => self.ledger.event_count().await?,
        };
        let event = self.fetch_event(event_id).await?;

        self.bus.emit(
            &created_event(EntityTable::Events),
            json!({"event_id": event.event_id, "tx_hash": receipt.tx_hash}),
        );
        Ok(SyncOutcome {
            upserted: 1,
            tx_hash: Some(receipt.tx_hash),
        })
    }

    /// 所有者のチケットを取り直す。キャッシュ上だけに残るチケットは個別に再取得して移転を反映する
    async fn fetch_user_tickets(&self, owner: &str) -> Result<u64, AppError> {
        let now = unix_now();
        let fresh: Vec<Ticket> = self
            .ledger
            .tickets_of(owner)
            .await?
            .into_iter()
            .map(|t| stamp_ticket(t, now))
            .collect();
        let fresh_keys: HashSet<String> = fresh.iter().map(Ticket::key).collect();

        let mut updates = fresh;
        for cached in self.tickets.tickets_by_owner(owner).await? {
            if fresh_keys.contains(&cached.key()) {
                continue;
            }
            match self
                .ledger
                .get_ticket(&cached.contract_address, &cached.token_id)
                .await
            {
                Ok(ticket) => updates.push(stamp_ticket(ticket, now)),
                Err(AppError::LedgerReverted(reason)) => {
                    tracing::debug!(
                        target: "sync::orchestrator",
                        ticket = %cached.key(),
                        reason = %reason,
                        "skipping reverted ticket refresh"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        self.tickets.upsert_tickets(&updates).await?;
        self.sync_state
            .mark_synced(EntityTable::Tickets, Some(owner), now)
            .await?;
        Ok(updates.len() as u64)
    }

    async fn fetch_ticket(&self, contract_address: &str, token_id: &str) -> Result<u64, AppError> {
        let ticket = self.ledger.get_ticket(contract_address, token_id).await?;
        let ticket = stamp_ticket(ticket, unix_now());
        self.tickets.upsert_tickets(std::slice::from_ref(&ticket)).await
    }

    async fn purchase_ticket(&self, task: &SyncTask) -> Result<SyncOutcome, AppError> {
        let payload: PurchasePayload = parse_payload(task)?;
        let buyer = normalize_address(&payload.buyer)?;
        let value_wei = normalize_uint(&payload.value_wei, "value_wei")?;

        let receipt = self
            .ledger
            .mutate(LedgerCall {
                method: PURCHASE_TICKET_METHOD.to_string(),
                args: json!({"event_id": payload.event_id, "buyer": buyer}),
                value_wei: Some(value_wei),
            })
            .await?;

        let upserted = self.fetch_user_tickets(&buyer).await?;
        self.fetch_event(payload.event_id).await?;

        self.bus.emit(
            &created_event(EntityTable::Tickets),
            json!({
                "event_id": payload.event_id,
                "buyer": buyer,
                "tx_hash": receipt.tx_hash,
            }),
        );
        Ok(SyncOutcome {
            upserted: upserted + 1,
            tx_hash: Some(receipt.tx_hash),
        })
    }

    async fn fetch_active_listings(&self) -> Result<u64, AppError> {
        let now = unix_now();
        let active: Vec<MarketplaceListing> = self
            .ledger
            .active_listings()
            .await?
            .into_iter()
            .map(|l| stamp_listing(l, now))
            .collect();
        let active_ids: Vec<u64> = active.iter().map(|l| l.listing_id).collect();

        self.listings.upsert_listings(&active).await?;
        let deactivated = self.listings.deactivate_missing(&active_ids, now).await?;
        self.sync_state
            .mark_synced(EntityTable::MarketplaceListings, None, now)
            .await?;
        if deactivated > 0 {
            tracing::debug!(
                target: "sync::orchestrator",
                deactivated,
                "deactivated listings missing from ledger"
            );
        }
        Ok(active.len() as u64)
    }

    async fn list_ticket(&self, task: &SyncTask) -> Result<SyncOutcome, AppError> {
        let payload: ListPayload = parse_payload(task)?;
        let contract_address = normalize_address(&payload.contract_address)?;
        let token_id = normalize_uint(&payload.token_id, "token_id")?;
        let price = normalize_uint(&payload.price, "price")?;

        let receipt = self
            .ledger
            .mutate(LedgerCall {
                method: LIST_TICKET_METHOD.to_string(),
                args: json!({
                    "contract_address": contract_address,
                    "token_id": token_id,
                    "price": price,
                }),
                value_wei: None,
            })
            .await?;

        let listings = self.fetch_active_listings().await?;
        let tickets = self.fetch_ticket(&contract_address, &token_id).await?;

        self.bus.emit(
            &created_event(EntityTable::MarketplaceListings),
            json!({
                "listing_id": log_u64(&receipt, TICKET_LISTED_LOG, "listing_id"),
                "contract_address": contract_address,
                "token_id": token_id,
                "tx_hash": receipt.tx_hash,
            }),
        );
        Ok(SyncOutcome {
            upserted: listings + tickets,
            tx_hash: Some(receipt.tx_hash),
        })
    }

    /// 台帳に存在しないアドレスも同期済みとして記録する
    async fn fetch_user(&self, address: &str) -> Result<u64, AppError> {
        let now = unix_now();
        let upserted = match self.ledger.get_user(address).await? {
            Some(mut user) => {
                user.address = user.address.to_ascii_lowercase();
                user.last_synced = now;
                self.users.upsert_user(&user).await?
            }
            None => {
                tracing::debug!(target: "sync::orchestrator", address, "user not found on ledger");
                0
            }
        };
        self.sync_state
            .mark_synced(EntityTable::Users, Some(address), now)
            .await?;
        Ok(upserted)
    }
}

#[async_trait]
impl SyncTaskHandler for LedgerSyncHandler {
    async fn handle(&self, task: &SyncTask) -> Result<SyncOutcome, AppError> {
        match (task.table, task.operation.as_str()) {
            (EntityTable::Events, "fetch_all") => self.fetch_all_events().await,
            (EntityTable::Events, "fetch_one") => {
                let payload: EventIdPayload = parse_payload(task)?;
                self.fetch_event(payload.event_id).await?;
                Ok(SyncOutcome::upserted(1))
            }
            (EntityTable::Events, "create") => self.create_event(task).await,
            (EntityTable::Tickets, "fetch_user") => {
                let payload: OwnerPayload = parse_payload(task)?;
                let owner = normalize_address(&payload.owner)?;
                Ok(SyncOutcome::upserted(self.fetch_user_tickets(&owner).await?))
            }
            (EntityTable::Tickets, "fetch_one") => {
                let payload: TicketKeyPayload = parse_payload(task)?;
                let contract_address = normalize_address(&payload.contract_address)?;
                let token_id = normalize_uint(&payload.token_id, "token_id")?;
                Ok(SyncOutcome::upserted(
                    self.fetch_ticket(&contract_address, &token_id).await?,
                ))
            }
            (EntityTable::Tickets, "purchase") => self.purchase_ticket(task).await,
            (EntityTable::MarketplaceListings, "fetch_active") => {
                Ok(SyncOutcome::upserted(self.fetch_active_listings().await?))
            }
            (EntityTable::MarketplaceListings, "list") => self.list_ticket(task).await,
            (EntityTable::Users, "fetch_one") => {
                let payload: AddressPayload = parse_payload(task)?;
                let address = normalize_address(&payload.address)?;
                Ok(SyncOutcome::upserted(self.fetch_user(&address).await?))
            }
            (table, operation) => Err(AppError::UnsupportedOperation {
                table: table.to_string(),
                operation: operation.to_string(),
            }),
        }
    }
}
