//! Legacy SOAP 1.1 market service. Only `GetMarketSummary` is offered; the
//! envelope is written by hand and the payload serialized with quick-xml.

use crate::coingecko::{CoinMarket, MarketError, PriceFeed};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use chrono::{DateTime, Utc};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use rust_decimal::Decimal;
use serde::Serialize;

pub const SERVICE_NAMESPACE: &str = "http://cryptoplatform.com/";
const ENVELOPE_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";
const TOP_LIMIT: u32 = 10;

pub const GET_MARKET_SUMMARY: &str = "GetMarketSummary";

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct MarketSummary {
    pub generated_at: DateTime<Utc>,
    pub top_cryptos: TopCryptos,
    pub total_market_cap_eur: Decimal,
}

#[derive(Serialize, Debug, Clone)]
pub struct TopCryptos {
    #[serde(rename = "CryptoInfo")]
    pub items: Vec<CryptoInfo>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CryptoInfo {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub price_eur: Decimal,
    #[serde(rename = "Change24h")]
    pub change_24h: Decimal,
    pub market_cap_eur: Decimal,
}

impl From<CoinMarket> for CryptoInfo {
    fn from(coin: CoinMarket) -> Self {
        CryptoInfo {
            symbol: coin.symbol.to_uppercase(),
            id: coin.id,
            name: coin.name,
            price_eur: coin.current_price.unwrap_or_default(),
            change_24h: coin.price_change_percentage_24h.unwrap_or_default(),
            market_cap_eur: coin.market_cap.unwrap_or_default(),
        }
    }
}

/// Top ten coins by market cap and their combined capitalisation.
pub async fn market_summary(feed: &PriceFeed) -> Result<MarketSummary, MarketError> {
    let coins = feed.top_by_market_cap(TOP_LIMIT).await?;
    let items: Vec<CryptoInfo> = coins.into_iter().map(CryptoInfo::from).collect();
    let total_market_cap_eur = items
        .iter()
        .fold(Decimal::ZERO, |total, c| total.saturating_add(c.market_cap_eur));

    Ok(MarketSummary {
        generated_at: Utc::now(),
        top_cryptos: TopCryptos { items },
        total_market_cap_eur,
    })
}

pub fn router(feed: PriceFeed) -> Router {
    Router::new()
        .route("/MarketService.asmx", post(handle_envelope))
        .with_state(feed)
}

async fn handle_envelope(
    State(feed): State<PriceFeed>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let operation = match requested_operation(&headers, &body) {
        Some(op) => op,
        None => return fault("soap:Client", "No SOAP operation found in request"),
    };

    if operation != GET_MARKET_SUMMARY {
        tracing::warn!(%operation, "Unknown SOAP operation");
        return fault("soap:Client", &format!("Unknown operation: {operation}"));
    }

    let summary = match market_summary(&feed).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("GetMarketSummary failed: {}", e);
            return fault("soap:Server", &format!("Error fetching market data: {e}"));
        }
    };

    match quick_xml::se::to_string_with_root("GetMarketSummaryResult", &summary) {
        Ok(result) => envelope(
            StatusCode::OK,
            &format!(
                r#"<GetMarketSummaryResponse xmlns="{SERVICE_NAMESPACE}">{result}</GetMarketSummaryResponse>"#
            ),
        ),
        Err(e) => {
            tracing::error!("Failed to encode market summary: {}", e);
            fault("soap:Server", "Error encoding market data")
        }
    }
}

/// The operation a request asks for: the last segment of the `SOAPAction`
/// header, or else the first element inside `soap:Body`.
pub fn requested_operation(headers: &HeaderMap, body: &str) -> Option<String> {
    let from_header = headers
        .get("SOAPAction")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().trim_matches('"'))
        .and_then(|v| v.rsplit('/').next())
        .filter(|op| !op.is_empty());

    match from_header {
        Some(op) => Some(op.to_string()),
        None => first_body_element(body),
    }
}

fn first_body_element(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut in_body = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.local_name();
                if in_body {
                    return std::str::from_utf8(name.as_ref()).ok().map(str::to_string);
                }
                if name.as_ref() == b"Body" {
                    in_body = true;
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"Body" => return None,
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

fn envelope(status: StatusCode, body_content: &str) -> Response {
    let xml = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:soap="{ENVELOPE_NAMESPACE}" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema"><soap:Body>{body_content}</soap:Body></soap:Envelope>"#
    );
    (status, [(CONTENT_TYPE, SOAP_CONTENT_TYPE)], xml).into_response()
}

fn fault(code: &str, message: &str) -> Response {
    envelope(
        StatusCode::INTERNAL_SERVER_ERROR,
        &format!(
            "<soap:Fault><faultcode>{code}</faultcode><faultstring>{}</faultstring></soap:Fault>",
            escape(message)
        ),
    )
}
