use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A registered user of the public API.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A user's recorded quantity of one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub id: Uuid,
    pub user_id: Uuid,
    pub crypto_id: String,
    pub quantity: Decimal,
}

/// An immutable ledger entry recording a buy or sell event against a holding.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub holding_id: Uuid,
    pub side: TransactionSide,
    pub quantity: Decimal,
    pub price_eur: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionSide {
    Buy,
    Sell,
}

impl fmt::Display for TransactionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionSide::Buy => f.write_str("BUY"),
            TransactionSide::Sell => f.write_str("SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("type must be BUY or SELL, got '{0}'")]
pub struct UnknownSide(pub String);

impl FromStr for TransactionSide {
    type Err = UnknownSide;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(TransactionSide::Buy),
            "SELL" => Ok(TransactionSide::Sell),
            other => Err(UnknownSide(other.to_string())),
        }
    }
}

/// What has to happen to a holding after a trade is applied to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceChange {
    /// Store the new, strictly positive quantity.
    Set(Decimal),
    /// The position is closed; the holding row goes away.
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TradeError {
    #[error("insufficient quantity: holding {held}, selling {requested}")]
    InsufficientQuantity { held: Decimal, requested: Decimal },

    #[error("quantity out of range: holding {held}, trading {requested}")]
    Overflow { held: Decimal, requested: Decimal },
}

impl TransactionSide {
    /// Applies a trade of `quantity` units to a holding currently at `current`.
    ///
    /// Selling more than is held is rejected, as is a balance that no longer
    /// fits a `Decimal`; landing exactly on zero removes the holding.
    pub fn apply(self, current: Decimal, quantity: Decimal) -> Result<BalanceChange, TradeError> {
        let new_quantity = match self {
            TransactionSide::Buy => current.checked_add(quantity),
            TransactionSide::Sell => current.checked_sub(quantity),
        }
        .ok_or(TradeError::Overflow {
            held: current,
            requested: quantity,
        })?;

        if new_quantity < Decimal::ZERO {
            return Err(TradeError::InsufficientQuantity {
                held: current,
                requested: quantity,
            });
        }

        if new_quantity.is_zero() {
            Ok(BalanceChange::Remove)
        } else {
            Ok(BalanceChange::Set(new_quantity))
        }
    }
}

/// Normalizes a CoinGecko asset id as typed by a client.
pub fn normalize_crypto_id(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A normalized id that names exactly one coin. CoinGecko treats `,` in
/// `ids` as a list separator.
pub fn is_single_crypto_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(',')
}

/// Live market numbers for one asset, in EUR.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CryptoMarketData {
    pub id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_price_eur: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub change_1h: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub change_24h: Decimal,
}

#[derive(Deserialize, Debug)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub token: String,
    pub email: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /api/portfolio/transaction`. Fields default so that missing
/// values surface as validation messages instead of decode errors.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AddTransactionRequest {
    #[serde(default)]
    pub crypto_id: String,
    #[serde(default, rename = "type")]
    pub side: String,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub price_eur: Decimal,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecorded {
    pub message: String,
    pub transaction_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioItem {
    pub crypto_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_price_eur: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_value_eur: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub change_24h: Decimal,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_value_eur: Decimal,
    #[serde(rename = "change24hEur", with = "rust_decimal::serde::float")]
    pub change_24h_eur: Decimal,
    pub holdings: usize,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEntry {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub side: TransactionSide,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_eur: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionEntry {
    fn from(tx: Transaction) -> Self {
        TransactionEntry {
            id: tx.id,
            side: tx.side,
            quantity: tx.quantity,
            price_eur: tx.price_eur,
            created_at: tx.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistItem {
    pub crypto_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_price_eur: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub change_1h: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub change_24h: Decimal,
}
