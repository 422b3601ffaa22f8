use rusqlite::types::Type;
use rusqlite::Row;
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

mod holdings;
mod transactions;
mod users;
mod watchlist;

/// Which set of tables a database file carries. The public API only owns
/// users; everything portfolio-related lives behind the data service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    Accounts,
    Portfolio,
}

const ACCOUNTS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE COLLATE NOCASE,
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
";

// Quantities and prices are stored as decimal TEXT to stay exact.
const PORTFOLIO_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS portfolios (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        crypto_id TEXT NOT NULL,
        quantity TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (user_id, crypto_id)
    );

    CREATE TABLE IF NOT EXISTS transactions (
        id TEXT PRIMARY KEY,
        portfolio_id TEXT NOT NULL,
        type TEXT NOT NULL CHECK (type IN ('BUY', 'SELL')),
        quantity TEXT NOT NULL,
        price_eur TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS transactions_by_portfolio
        ON transactions (portfolio_id, created_at);

    CREATE TABLE IF NOT EXISTS watchlists (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        crypto_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (user_id, crypto_id)
    );
";

#[derive(Clone)]
pub struct DatabasePool(pub Arc<Mutex<rusqlite::Connection>>);

impl DatabasePool {
    /// Open (or create) a database file and make sure its tables exist.
    pub fn open(path: impl AsRef<Path>, schema: Schema) -> Result<Self, rusqlite::Error> {
        let conn = rusqlite::Connection::open(path)?;
        Self::init(conn, schema)
    }

    /// A private in-memory database, used by tests and throwaway runs.
    pub fn open_in_memory(schema: Schema) -> Result<Self, rusqlite::Error> {
        let conn = rusqlite::Connection::open_in_memory()?;
        Self::init(conn, schema)
    }

    fn init(conn: rusqlite::Connection, schema: Schema) -> Result<Self, rusqlite::Error> {
        match schema {
            Schema::Accounts => conn.execute_batch(ACCOUNTS_SCHEMA)?,
            Schema::Portfolio => conn.execute_batch(PORTFOLIO_SCHEMA)?,
        }

        Ok(Self(Arc::new(Mutex::new(conn))))
    }
}

/// True when the error is SQLite refusing a row because of a UNIQUE or CHECK
/// constraint.
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

pub(crate) fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
