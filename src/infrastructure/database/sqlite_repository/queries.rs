// last_synced は MAX(既存, 新規) で単調増加を保つ

pub(super) const UPSERT_EVENT: &str = r#"
    INSERT INTO events (
        event_id, organizer, name, description, venue, start_time, end_time,
        ticket_price, total_tickets, tickets_sold, is_active, metadata_uri, image_uri,
        last_synced
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(event_id) DO UPDATE SET
        organizer = excluded.organizer,
        name = excluded.name,
        description = excluded.description,
        venue = excluded.venue,
        start_time = excluded.start_time,
        end_time = excluded.end_time,
        ticket_price = excluded.ticket_price,
        total_tickets = excluded.total_tickets,
        tickets_sold = excluded.tickets_sold,
        is_active = excluded.is_active,
        metadata_uri = excluded.metadata_uri,
        image_uri = excluded.image_uri,
        last_synced = MAX(events.last_synced, excluded.last_synced)
"#;

pub(super) const SELECT_EVENT_BY_ID: &str = r#"
    SELECT * FROM events WHERE event_id = ?
"#;

pub(super) const SELECT_EVENTS_BASE: &str = "SELECT * FROM events WHERE 1 = 1";

pub(super) const SEARCH_EVENTS: &str = r#"
    SELECT * FROM events
    WHERE name LIKE ? ESCAPE '\'
       OR description LIKE ? ESCAPE '\'
       OR venue LIKE ? ESCAPE '\'
    ORDER BY start_time ASC, event_id ASC
    LIMIT ?
"#;

pub(super) const UPSERT_TICKET: &str = r#"
    INSERT INTO tickets (
        contract_address, token_id, event_id, owner, purchase_price, is_used, is_listed,
        metadata_uri, image_uri, last_synced
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(contract_address, token_id) DO UPDATE SET
        event_id = excluded.event_id,
        owner = excluded.owner,
        purchase_price = excluded.purchase_price,
        is_used = excluded.is_used,
        is_listed = excluded.is_listed,
        metadata_uri = excluded.metadata_uri,
        image_uri = excluded.image_uri,
        last_synced = MAX(tickets.last_synced, excluded.last_synced)
"#;

pub(super) const SELECT_TICKET: &str = r#"
    SELECT * FROM tickets WHERE contract_address = ? AND token_id = ?
"#;

pub(super) const SELECT_TICKETS_BY_OWNER: &str = r#"
    SELECT * FROM tickets
    WHERE owner = ?
    ORDER BY event_id ASC, CAST(token_id AS INTEGER) ASC
"#;

pub(super) const UPSERT_LISTING: &str = r#"
    INSERT INTO marketplace_listings (
        listing_id, contract_address, token_id, event_id, seller, price, is_active,
        listed_at, last_synced
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(listing_id) DO UPDATE SET
        contract_address = excluded.contract_address,
        token_id = excluded.token_id,
        event_id = excluded.event_id,
        seller = excluded.seller,
        price = excluded.price,
        is_active = excluded.is_active,
        listed_at = excluded.listed_at,
        last_synced = MAX(marketplace_listings.last_synced, excluded.last_synced)
"#;

pub(super) const SELECT_LISTINGS_BASE: &str = "SELECT * FROM marketplace_listings WHERE 1 = 1";

pub(super) const DEACTIVATE_ALL_LISTINGS: &str = r#"
    UPDATE marketplace_listings
    SET is_active = 0, last_synced = MAX(last_synced, ?)
    WHERE is_active = 1
"#;

pub(super) const UPSERT_USER: &str = r#"
    INSERT INTO users (
        address, display_name, avatar_uri, bio, tickets_owned, events_organized, last_synced
    )
    VALUES (?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(address) DO UPDATE SET
        display_name = excluded.display_name,
        avatar_uri = excluded.avatar_uri,
        bio = excluded.bio,
        tickets_owned = excluded.tickets_owned,
        events_organized = excluded.events_organized,
        last_synced = MAX(users.last_synced, excluded.last_synced)
"#;

pub(super) const SELECT_USER: &str = r#"
    SELECT * FROM users WHERE address = ?
"#;

pub(super) const SEARCH_USERS: &str = r#"
    SELECT * FROM users
    WHERE address LIKE ? ESCAPE '\'
       OR display_name LIKE ? ESCAPE '\'
       OR bio LIKE ? ESCAPE '\'
    ORDER BY display_name ASC, address ASC
    LIMIT ?
"#;

pub(super) const SELECT_EVENT_LAST_SYNCED: &str =
    "SELECT last_synced FROM events WHERE event_id = ?";
pub(super) const SELECT_TICKET_LAST_SYNCED: &str =
    "SELECT last_synced FROM tickets WHERE contract_address = ? AND token_id = ?";
pub(super) const SELECT_LISTING_LAST_SYNCED: &str =
    "SELECT last_synced FROM marketplace_listings WHERE listing_id = ?";
pub(super) const SELECT_SYNC_MARKER: &str =
    "SELECT last_synced FROM sync_markers WHERE table_name = ? AND scope_key = ?";

pub(super) const UPSERT_SYNC_MARKER: &str = r#"
    INSERT INTO sync_markers (table_name, scope_key, last_synced)
    VALUES (?, ?, ?)
    ON CONFLICT(table_name, scope_key) DO UPDATE SET
        last_synced = MAX(sync_markers.last_synced, excluded.last_synced)
"#;

pub(super) const INSERT_SYNC_AUDIT: &str = r#"
    INSERT INTO sync_queue (
        task_id, table_name, operation, payload, priority, status, attempts, enqueued_at
    )
    VALUES (?, ?, ?, ?, ?, 'pending', 0, ?)
"#;

pub(super) const MARK_SYNC_STARTED: &str = r#"
    UPDATE sync_queue
    SET status = 'processing', attempts = ?, started_at = ?
    WHERE task_id = ?
"#;

pub(super) const MARK_SYNC_FINISHED: &str = r#"
    UPDATE sync_queue
    SET status = ?, error_message = ?, finished_at = ?
    WHERE task_id = ?
"#;

pub(super) const SELECT_RECENT_SYNC_AUDIT: &str = r#"
    SELECT * FROM sync_queue
    ORDER BY enqueued_at DESC, rowid DESC
    LIMIT ?
"#;

pub(super) const PRUNE_SYNC_AUDIT: &str = r#"
    DELETE FROM sync_queue
    WHERE enqueued_at < ? AND status IN ('completed', 'failed')
"#;
