//! XML documents exchanged between the public API and the data service.
//!
//! Element names follow the data service's historical wire format: PascalCase
//! fields, `ArrayOf*` list roots, and bare `<guid>`/`<decimal>` scalars.
//! Decimals travel as text so they keep their exact scale.

use crate::models::{Holding, Transaction};
use axum::async_trait;
use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename = "Portfolio", rename_all = "PascalCase")]
pub struct HoldingXml {
    pub id: Uuid,
    pub user_id: Uuid,
    pub crypto_id: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub quantity: Decimal,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename = "ArrayOfPortfolio")]
pub struct HoldingListXml {
    #[serde(rename = "Portfolio", default)]
    pub items: Vec<HoldingXml>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename = "Transaction", rename_all = "PascalCase")]
pub struct TransactionXml {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    #[serde(rename = "Type")]
    pub side: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub price_eur: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename = "ArrayOfTransaction")]
pub struct TransactionListXml {
    #[serde(rename = "Transaction", default)]
    pub items: Vec<TransactionXml>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename = "ArrayOfString")]
pub struct CryptoIdListXml {
    #[serde(rename = "string", default)]
    pub items: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename = "CreatePortfolioRequest", rename_all = "PascalCase")]
pub struct CreateHoldingXml {
    pub user_id: Uuid,
    pub crypto_id: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub quantity: Decimal,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename = "WatchlistRequest", rename_all = "PascalCase")]
pub struct WatchlistXml {
    pub user_id: Uuid,
    pub crypto_id: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename = "CreateTransactionRequest", rename_all = "PascalCase")]
pub struct CreateTransactionXml {
    pub portfolio_id: Uuid,
    #[serde(rename = "Type")]
    pub side: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub price_eur: Decimal,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename = "guid")]
pub struct GuidXml {
    #[serde(rename = "$text")]
    pub value: Uuid,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename = "decimal")]
pub struct DecimalXml {
    #[serde(rename = "$text", with = "rust_decimal::serde::str")]
    pub value: Decimal,
}

impl From<Holding> for HoldingXml {
    fn from(h: Holding) -> Self {
        HoldingXml {
            id: h.id,
            user_id: h.user_id,
            crypto_id: h.crypto_id,
            quantity: h.quantity,
        }
    }
}

impl From<HoldingXml> for Holding {
    fn from(h: HoldingXml) -> Self {
        Holding {
            id: h.id,
            user_id: h.user_id,
            crypto_id: h.crypto_id,
            quantity: h.quantity,
        }
    }
}

impl From<Transaction> for TransactionXml {
    fn from(tx: Transaction) -> Self {
        TransactionXml {
            id: tx.id,
            portfolio_id: tx.holding_id,
            side: tx.side.to_string(),
            quantity: tx.quantity,
            price_eur: tx.price_eur,
            created_at: tx.created_at,
        }
    }
}

impl TryFrom<TransactionXml> for Transaction {
    type Error = crate::models::UnknownSide;

    fn try_from(tx: TransactionXml) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: tx.id,
            holding_id: tx.portfolio_id,
            side: tx.side.parse()?,
            quantity: tx.quantity,
            price_eur: tx.price_eur,
            created_at: tx.created_at,
        })
    }
}

pub fn to_xml<T: Serialize>(value: &T) -> Result<String, String> {
    quick_xml::se::to_string(value).map_err(|e| e.to_string())
}

pub fn from_xml<T: DeserializeOwned>(xml: &str) -> Result<T, String> {
    quick_xml::de::from_str(xml).map_err(|e| e.to_string())
}

/// XML body extractor and responder, the XML counterpart of `axum::Json`.
#[derive(Debug)]
pub struct Xml<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Xml<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = String::from_request(req, state)
            .await
            .map_err(|e| (e.status(), e.body_text()))?;

        from_xml(&body)
            .map(Xml)
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("Malformed XML body: {e}")))
    }
}

impl<T: Serialize> IntoResponse for Xml<T> {
    fn into_response(self) -> Response {
        match to_xml(&self.0) {
            Ok(body) => ([(CONTENT_TYPE, XML_CONTENT_TYPE)], body).into_response(),
            Err(e) => {
                tracing::error!("Failed to encode XML response: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
