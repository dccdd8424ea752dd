// 🗄️ Storage - SQLite persistence for a Book plus an audit trail
//
// The whole book is written as a snapshot inside one SQLite transaction.
// Changes made through the account editor are also appended to the events
// table so there is a history of who changed which account and how.

use crate::book::{Book, EditEvent, EditTarget};
use crate::entities::{
    Account, AccountId, AccountType, Commodity, ReconcileState, Split, SplitId, Transaction,
    TransactionId,
};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use uuid::Uuid;

/// Event for the audit trail
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn open_database<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open(path.as_ref())
        .with_context(|| format!("Failed to open database: {:?}", path.as_ref()))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS commodities (
            namespace TEXT NOT NULL,
            mnemonic TEXT NOT NULL,
            fullname TEXT NOT NULL,
            PRIMARY KEY (namespace, mnemonic)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            parent_id TEXT,
            position INTEGER NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            code TEXT NOT NULL,
            notes TEXT NOT NULL,
            account_type TEXT NOT NULL,
            currency TEXT,
            security TEXT,
            price_source TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            num TEXT NOT NULL,
            description TEXT NOT NULL,
            date_posted TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS splits (
            id TEXT PRIMARY KEY,
            transaction_id TEXT NOT NULL REFERENCES transactions(id),
            position INTEGER NOT NULL,
            account_id TEXT,
            memo TEXT NOT NULL,
            value REAL NOT NULL,
            quantity REAL NOT NULL,
            reconcile_state TEXT NOT NULL,
            reconcile_date TEXT,
            ledger_position INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // Snapshots written before ledger order was stored lack the column
    let has_ledger_position = conn
        .prepare("SELECT 1 FROM pragma_table_info('splits') WHERE name = 'ledger_position'")?
        .exists([])?;
    if !has_ledger_position {
        conn.execute(
            "ALTER TABLE splits ADD COLUMN ledger_position INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
    }

    // Idempotency hashes of imported CSV rows
    conn.execute(
        "CREATE TABLE IF NOT EXISTS import_hashes (
            hash TEXT PRIMARY KEY,
            imported_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_splits_account ON splits(account_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// SAVE
// ============================================================================

fn commodity_key(commodity: Option<&Commodity>) -> Option<String> {
    commodity.map(|c| c.unique_name())
}

/// Replace the stored snapshot with the book's current contents
pub fn save_book(conn: &mut Connection, book: &Book) -> Result<()> {
    let tx = conn.transaction().context("Failed to start save transaction")?;

    tx.execute("DELETE FROM splits", [])?;
    tx.execute("DELETE FROM transactions", [])?;
    tx.execute("DELETE FROM accounts", [])?;
    tx.execute("DELETE FROM commodities", [])?;

    for commodity in book.commodities().all() {
        tx.execute(
            "INSERT INTO commodities (namespace, mnemonic, fullname) VALUES (?1, ?2, ?3)",
            params![commodity.namespace, commodity.mnemonic, commodity.fullname],
        )?;
    }

    // Parents before children, keeping sibling order
    let mut stack: Vec<(Option<AccountId>, usize, AccountId)> = book
        .top_level_accounts()
        .iter()
        .enumerate()
        .rev()
        .map(|(i, id)| (None, i, *id))
        .collect();
    let mut account_count = 0;
    while let Some((parent, position, id)) = stack.pop() {
        let account = match book.account(id) {
            Some(a) => a,
            None => continue,
        };
        tx.execute(
            "INSERT INTO accounts (
                id, parent_id, position, name, description, code, notes,
                account_type, currency, security, price_source
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id.to_string(),
                parent.map(|p| p.to_string()),
                position as i64,
                account.name,
                account.description,
                account.code,
                account.notes,
                account.account_type.as_str(),
                commodity_key(account.currency.as_ref()),
                commodity_key(account.security.as_ref()),
                account.price_source,
            ],
        )?;
        account_count += 1;
        for (i, child) in account.children().iter().enumerate().rev() {
            stack.push((Some(id), i, *child));
        }
    }

    // Index of each split in its account's ledger
    let ledger_positions: HashMap<SplitId, usize> = book
        .accounts()
        .flat_map(|a| a.splits().iter().enumerate().map(|(i, s)| (*s, i)))
        .collect();

    let mut split_count = 0;
    for transaction in book.transactions() {
        tx.execute(
            "INSERT INTO transactions (id, num, description, date_posted) VALUES (?1, ?2, ?3, ?4)",
            params![
                transaction.id.to_string(),
                transaction.num,
                transaction.description,
                transaction.date_posted.to_string(),
            ],
        )?;

        for (position, split_id) in transaction.splits().iter().enumerate() {
            let split = match book.split(*split_id) {
                Some(s) => s,
                None => continue,
            };
            tx.execute(
                "INSERT INTO splits (
                    id, transaction_id, position, account_id, memo, value, quantity,
                    reconcile_state, reconcile_date, ledger_position
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    split.id.to_string(),
                    transaction.id.to_string(),
                    position as i64,
                    split.account.map(|a| a.to_string()),
                    split.memo,
                    split.value,
                    split.quantity,
                    split.reconcile_state.as_char().to_string(),
                    split.reconcile_date.map(|d| d.to_string()),
                    ledger_positions.get(split_id).copied().unwrap_or(0) as i64,
                ],
            )?;
            split_count += 1;
        }
    }

    tx.commit().context("Failed to commit book snapshot")?;
    tracing::info!(accounts = account_count, splits = split_count, "book saved");
    Ok(())
}

// ============================================================================
// LOAD
// ============================================================================

fn parse_uuid(text: &str) -> Result<Uuid> {
    Uuid::parse_str(text).with_context(|| format!("Invalid id in database: {}", text))
}

fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").with_context(|| format!("Invalid date in database: {}", text))
}

struct AccountRow {
    parent: Option<AccountId>,
    position: i64,
    account: Account,
}

/// Rebuild a Book from the stored snapshot
pub fn load_book(conn: &Connection) -> Result<Book> {
    let mut book = Book::new();

    {
        let mut stmt = conn.prepare("SELECT namespace, mnemonic, fullname FROM commodities")?;
        let rows = stmt.query_map([], |row| {
            Ok(Commodity::new(
                &row.get::<_, String>(0)?,
                &row.get::<_, String>(1)?,
                &row.get::<_, String>(2)?,
            ))
        })?;
        for commodity in rows {
            book.commodities_mut().insert(commodity?);
        }
    }

    let lookup = |book: &Book, key: Option<String>| -> Result<Option<Commodity>> {
        match key {
            None => Ok(None),
            Some(k) => book
                .commodities()
                .find(&k)
                .cloned()
                .map(Some)
                .ok_or_else(|| anyhow!("Unknown commodity in database: {}", k)),
        }
    };

    let mut rows: Vec<AccountRow> = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT id, parent_id, position, name, description, code, notes,
                    account_type, currency, security, price_source
             FROM accounts",
        )?;
        let raw = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, Option<String>>(8)?,
                row.get::<_, Option<String>>(9)?,
                row.get::<_, Option<String>>(10)?,
            ))
        })?;

        for r in raw {
            let (id, parent, position, name, description, code, notes, kind, currency, security, price_source) = r?;
            let account_type: AccountType = kind.parse()?;
            let mut account = Account::new(&name, account_type);
            account.id = AccountId(parse_uuid(&id)?);
            account.description = description;
            account.code = code;
            account.notes = notes;
            account.currency = lookup(&book, currency)?;
            account.security = lookup(&book, security)?;
            account.price_source = price_source;
            rows.push(AccountRow {
                parent: parent.map(|p| parse_uuid(&p).map(AccountId)).transpose()?,
                position,
                account,
            });
        }
    }

    // Attach parents first: repeat until no row can be placed
    rows.sort_by_key(|r| r.position);
    let mut pending = rows;
    loop {
        let before = pending.len();
        let mut waiting = Vec::new();
        for row in pending {
            match row.parent {
                Some(p) if !book.contains_account(p) => waiting.push(row),
                parent => {
                    book.insert_account(row.account, parent);
                }
            }
        }
        pending = waiting;
        if pending.is_empty() {
            break;
        }
        if pending.len() == before {
            return Err(anyhow!("{} accounts reference missing parents", pending.len()));
        }
    }

    {
        let mut stmt = conn.prepare("SELECT id, num, description, date_posted FROM transactions")?;
        let raw = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        for r in raw {
            let (id, num, description, date) = r?;
            let mut transaction = Transaction::new(parse_date(&date)?, &num, &description);
            transaction.id = TransactionId(parse_uuid(&id)?);
            book.insert_transaction(transaction);
        }
    }

    let mut ledger_positions: HashMap<SplitId, i64> = HashMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT id, transaction_id, account_id, memo, value, quantity,
                    reconcile_state, reconcile_date, ledger_position
             FROM splits
             ORDER BY transaction_id, position",
        )?;
        let raw = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, i64>(8)?,
            ))
        })?;
        for r in raw {
            let (id, transaction, account, memo, value, quantity, state, date, ledger_position) = r?;
            let split = Split {
                id: SplitId(parse_uuid(&id)?),
                transaction: TransactionId(parse_uuid(&transaction)?),
                account: account.map(|a| parse_uuid(&a).map(AccountId)).transpose()?,
                memo,
                value,
                quantity,
                reconcile_state: ReconcileState::from_char(state.chars().next().unwrap_or('n')),
                reconcile_date: date.map(|d| parse_date(&d)).transpose()?,
            };
            let split_id = split.id;
            match book.insert_split(split) {
                Some(_) => {
                    ledger_positions.insert(split_id, ledger_position);
                }
                None => {
                    tracing::warn!(split = %id, "split references a missing transaction or account");
                }
            }
        }
    }

    // Same-day splits go back to the order they were saved in
    let account_ids: Vec<AccountId> = book.accounts().map(|a| a.id).collect();
    for account in account_ids {
        book.restore_split_order(account, &ledger_positions);
    }

    book.clear_edit_log();
    tracing::info!(accounts = book.account_count(), "book loaded");
    Ok(book)
}

// ============================================================================
// IMPORT HASHES
// ============================================================================

pub fn load_import_hashes(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT hash FROM import_hashes")?;
    let hashes = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(hashes)
}

/// Returns how many hashes were new
pub fn save_import_hashes<'a, I>(conn: &Connection, hashes: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut inserted = 0;
    for hash in hashes {
        inserted += conn.execute(
            "INSERT OR IGNORE INTO import_hashes (hash) VALUES (?1)",
            params![hash],
        )?;
    }
    Ok(inserted)
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

/// One "account_committed" event per account whose edit bracket closed
/// since the book's edit log was last cleared. The event carries the
/// account's state after the commit.
pub fn log_committed_accounts(conn: &Connection, book: &Book, separator: char, actor: &str) -> Result<usize> {
    let mut seen = HashSet::new();
    let mut logged = 0;

    for entry in book.edit_log() {
        let id = match entry {
            EditEvent::Commit(EditTarget::Account(id)) => *id,
            _ => continue,
        };
        if !seen.insert(id) {
            continue;
        }
        let account = match book.account(id) {
            Some(a) => a,
            None => continue,
        };

        let event = Event::new(
            "account_committed",
            "account",
            &id.to_string(),
            serde_json::json!({
                "account": book.full_name(id, separator),
                "type": account.account_type.as_str(),
                "currency": commodity_key(account.currency.as_ref()),
                "security": commodity_key(account.security.as_ref()),
            }),
            actor,
        );
        insert_event(conn, &event)?;
        logged += 1;
    }

    tracing::debug!(logged, "account commits written to audit trail");
    Ok(logged)
}

pub fn count_accounts(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
    Ok(count)
}

/// Whether a snapshot has been saved at least once
pub fn has_snapshot(conn: &Connection) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM commodities LIMIT 1", [], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

/// Load the stored book, or an empty one for a fresh database
pub fn load_or_new(conn: &Connection) -> Result<Book> {
    if has_snapshot(conn)? {
        load_book(conn)
    } else {
        Ok(Book::new())
    }
}

// ============================================================================
// TESTS
// ============================================================================
