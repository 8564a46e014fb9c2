#![allow(dead_code)]

use async_trait::async_trait;
use ledger_cache::domain::entities::{Event, MarketplaceListing, Notification, Ticket, User};
use ledger_cache::infrastructure::content::MemoryContentNetwork;
use ledger_cache::infrastructure::storage::MemorySnapshotStore;
use ledger_cache::{
    AppConfig, AppError, AppState, EmittedEvent, LedgerCall, LedgerClient, SnapshotStore,
    TxReceipt,
};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, broadcast};

pub const CONTRACT: &str = "0x00000000000000000000000000000000000000cc";
pub const ORGANIZER: &str = "0x00000000000000000000000000000000000000aa";
pub const ALICE: &str = "0x00000000000000000000000000000000000000a1";
pub const BOB: &str = "0x00000000000000000000000000000000000000b0";

const GATE_PERMITS: u32 = 1_000_000;

pub fn sample_event(event_id: u64, name: &str) -> Event {
    Event {
        event_id,
        organizer: ORGANIZER.to_string(),
        name: name.to_string(),
        description: Some(format!("{name} on the main stage")),
        venue: Some("Hall A".to_string()),
        start_time: 1_900_000_000 + event_id as i64,
        end_time: None,
        ticket_price: "1000".to_string(),
        total_tickets: 100,
        tickets_sold: 0,
        is_active: true,
        metadata_uri: None,
        image_uri: None,
        last_synced: 0,
    }
}

pub fn sample_user(address: &str, display_name: &str) -> User {
    User {
        address: address.to_string(),
        display_name: Some(display_name.to_string()),
        avatar_uri: None,
        bio: None,
        tickets_owned: 0,
        events_organized: 0,
        last_synced: 0,
    }
}

#[derive(Default)]
struct LedgerBook {
    events: BTreeMap<u64, Event>,
    tickets: Vec<Ticket>,
    listings: Vec<MarketplaceListing>,
    users: HashMap<String, User>,
    reverting: HashSet<String>,
    unreachable: bool,
    tx_counter: u64,
}

/// テスト用の台帳。呼び出しを記録し、ゲートで処理を止められる
pub struct InMemoryLedger {
    book: Mutex<LedgerBook>,
    calls: Mutex<Vec<String>>,
    gate: Arc<Semaphore>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            book: Mutex::new(LedgerBook::default()),
            calls: Mutex::new(Vec::new()),
            gate: Arc::new(Semaphore::new(GATE_PERMITS as usize)),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn with_events(count: u64) -> Arc<Self> {
        let ledger = Self::new();
        for event_id in 1..=count {
            ledger.add_event(sample_event(event_id, &format!("Event {event_id}")));
        }
        ledger
    }

    pub fn add_event(&self, event: Event) {
        self.book.lock().unwrap().events.insert(event.event_id, event);
    }

    pub fn add_user(&self, user: User) {
        self.book
            .lock()
            .unwrap()
            .users
            .insert(user.address.clone(), user);
    }

    /// `get_event:7` や `mutate:purchaseTicket` の形式で指定した呼び出しをリバートさせる
    pub fn revert_on(&self, call: &str) {
        self.book.lock().unwrap().reverting.insert(call.to_string());
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.book.lock().unwrap().unreachable = unreachable;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// 返された permit を drop するまで台帳呼び出しを止める
    pub async fn hold(&self) -> OwnedSemaphorePermit {
        Arc::clone(&self.gate)
            .acquire_many_owned(GATE_PERMITS)
            .await
            .expect("ledger gate")
    }

    async fn enter(&self, call: String) -> Result<InFlight<'_>, AppError> {
        let permit = self.gate.acquire().await.expect("ledger gate");
        drop(permit);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        self.calls.lock().unwrap().push(call.clone());
        let book = self.book.lock().unwrap();
        if book.unreachable {
            return Err(AppError::Network("ledger rpc unreachable".into()));
        }
        if book.reverting.contains(&call) {
            return Err(AppError::LedgerReverted(format!("{call} reverted")));
        }
        Ok(guard)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn event_count(&self) -> Result<u64, AppError> {
        let _guard = self.enter("event_count".into()).await?;
        tokio::task::yield_now().await;
        Ok(self.book.lock().unwrap().events.len() as u64)
    }

    async fn get_event(&self, event_id: u64) -> Result<Event, AppError> {
        let _guard = self.enter(format!("get_event:{event_id}")).await?;
        tokio::task::yield_now().await;
        self.book
            .lock()
            .unwrap()
            .events
            .get(&event_id)
            .cloned()
            .ok_or_else(|| AppError::LedgerReverted(format!("event {event_id} does not exist")))
    }

    async fn tickets_of(&self, owner: &str) -> Result<Vec<Ticket>, AppError> {
        let _guard = self.enter(format!("tickets_of:{owner}")).await?;
        Ok(self
            .book
            .lock()
            .unwrap()
            .tickets
            .iter()
            .filter(|t| t.owner == owner)
            .cloned()
            .collect())
    }

    async fn get_ticket(&self, contract_address: &str, token_id: &str) -> Result<Ticket, AppError> {
        let _guard = self
            .enter(format!("get_ticket:{contract_address}:{token_id}"))
            .await?;
        self.book
            .lock()
            .unwrap()
            .tickets
            .iter()
            .find(|t| t.contract_address == contract_address && t.token_id == token_id)
            .cloned()
            .ok_or_else(|| AppError::LedgerReverted("invalid token".into()))
    }

    async fn active_listings(&self) -> Result<Vec<MarketplaceListing>, AppError> {
        let _guard = self.enter("active_listings".into()).await?;
        Ok(self
            .book
            .lock()
            .unwrap()
            .listings
            .iter()
            .filter(|l| l.is_active)
            .cloned()
            .collect())
    }

    async fn get_user(&self, address: &str) -> Result<Option<User>, AppError> {
        let _guard = self.enter(format!("get_user:{address}")).await?;
        Ok(self.book.lock().unwrap().users.get(address).cloned())
    }

    async fn mutate(&self, call: LedgerCall) -> Result<TxReceipt, AppError> {
        let _guard = self.enter(format!("mutate:{}", call.method)).await?;
        let mut book = self.book.lock().unwrap();
        book.tx_counter += 1;
        let tx_hash = format!("0x{:064x}", book.tx_counter);
        let args = &call.args;

        let emitted = match call.method.as_str() {
            "createEvent" => {
                let event_id = book.events.len() as u64 + 1;
                let mut event = sample_event(event_id, args["name"].as_str().unwrap_or_default());
                event.ticket_price = args["ticket_price"].as_str().unwrap_or("0").to_string();
                event.total_tickets = args["total_tickets"].as_u64().unwrap_or_default();
                event.start_time = args["start_time"].as_i64().unwrap_or_default();
                book.events.insert(event_id, event);
                EmittedEvent {
                    name: "EventCreated".into(),
                    args: json!({"event_id": event_id}),
                }
            }
            "purchaseTicket" => {
                let event_id = args["event_id"].as_u64().unwrap_or_default();
                let buyer = args["buyer"].as_str().unwrap_or_default().to_string();
                let price = match book.events.get(&event_id) {
                    Some(event) => event.ticket_price.clone(),
                    None => return Err(AppError::LedgerReverted("event does not exist".into())),
                };
                if call.value_wei.as_deref() != Some(price.as_str()) {
                    return Err(AppError::LedgerReverted("incorrect payment".into()));
                }
                let token_id = (book.tickets.len() + 1).to_string();
                book.tickets.push(Ticket {
                    contract_address: CONTRACT.to_string(),
                    token_id: token_id.clone(),
                    event_id,
                    owner: buyer,
                    purchase_price: price,
                    is_used: false,
                    is_listed: false,
                    metadata_uri: None,
                    image_uri: None,
                    last_synced: 0,
                });
                if let Some(event) = book.events.get_mut(&event_id) {
                    event.tickets_sold += 1;
                }
                EmittedEvent {
                    name: "TicketPurchased".into(),
                    args: json!({"event_id": event_id, "token_id": token_id}),
                }
            }
            "listTicket" => {
                let contract_address = args["contract_address"].as_str().unwrap_or_default();
                let token_id = args["token_id"].as_str().unwrap_or_default();
                let price = args["price"].as_str().unwrap_or("0").to_string();
                let listing_id = book.listings.len() as u64 + 1;
                let Some(ticket) = book
                    .tickets
                    .iter_mut()
                    .find(|t| t.contract_address == contract_address && t.token_id == token_id)
                else {
                    return Err(AppError::LedgerReverted("invalid token".into()));
                };
                ticket.is_listed = true;
                let listing = MarketplaceListing {
                    listing_id,
                    contract_address: ticket.contract_address.clone(),
                    token_id: ticket.token_id.clone(),
                    event_id: ticket.event_id,
                    seller: ticket.owner.clone(),
                    price,
                    is_active: true,
                    listed_at: 1_900_000_000,
                    last_synced: 0,
                };
                book.listings.push(listing);
                EmittedEvent {
                    name: "TicketListed".into(),
                    args: json!({"listing_id": listing_id}),
                }
            }
            other => return Err(AppError::LedgerReverted(format!("unknown method {other}"))),
        };

        Ok(TxReceipt {
            tx_hash,
            emitted_events: vec![emitted],
        })
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.ledger.contract_address = CONTRACT.to_string();
    config.content.gateways = vec!["https://gateway.test".to_string()];
    config.sync.watchdog_interval_ms = 50;
    config.sync.task_timeout_secs = 5;
    config
}

pub struct Harness {
    pub state: AppState,
    pub ledger: Arc<InMemoryLedger>,
    pub network: Arc<MemoryContentNetwork>,
    pub notifications: broadcast::Receiver<Notification>,
}

impl Harness {
    pub async fn start(ledger: Arc<InMemoryLedger>) -> Self {
        Self::start_with(ledger, Arc::new(MemorySnapshotStore::new())).await
    }

    pub async fn start_with(
        ledger: Arc<InMemoryLedger>,
        snapshot_store: Arc<dyn SnapshotStore>,
    ) -> Self {
        let network = Arc::new(MemoryContentNetwork::default());
        let state = AppState::new(
            test_config(),
            ledger.clone(),
            network.clone(),
            snapshot_store,
        )
        .await
        .expect("app state");
        let notifications = state.bus.subscribe_stream();
        Self {
            state,
            ledger,
            network,
            notifications,
        }
    }

    pub async fn settle(&self) {
        self.state
            .wait_for_sync(Some(Duration::from_secs(5)))
            .await
            .expect("sync queue drained");
    }

    /// これまでに受け取った通知名を順に返す
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut received = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            received.push(notification);
        }
        received
    }

    /// ドレインループが先頭タスクで止まるまで待つ
    pub async fn wait_until_busy(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.state.sync_status().current_task.is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("drain loop picked up a task");
    }
}
