use super::server::API_KEY_HEADER;
use super::xml::{
    from_xml, to_xml, CreateHoldingXml, CreateTransactionXml, CryptoIdListXml, DecimalXml,
    GuidXml, HoldingListXml, HoldingXml, TransactionListXml, WatchlistXml, XML_CONTENT_TYPE,
};
use crate::models::{Holding, Transaction, TransactionSide};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum DataClientError {
    #[error("invalid data service URL: {0}")]
    InvalidUrl(String),

    #[error("{op}: data service unreachable: {source}")]
    Request {
        op: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{op}: data service answered {status}: {body}")]
    Rejected {
        op: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("{op}: unreadable XML from data service: {message}")]
    Xml { op: &'static str, message: String },
}

/// HTTP client for the internal data service. Every request carries the
/// shared API key.
#[derive(Clone)]
pub struct DataClient {
    http: reqwest::Client,
    base_url: Url,
}

impl DataClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, DataClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| DataClientError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(DataClientError::InvalidUrl(base_url.to_string()));
        }

        let key = HeaderValue::from_str(api_key)
            .map_err(|_| DataClientError::InvalidUrl("API key is not a valid header value".into()))?;
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(API_KEY_HEADER), key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/xml"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|source| DataClientError::Request {
                op: "build client",
                source,
            })?;

        Ok(DataClient { http, base_url })
    }

    // ============ HOLDINGS ============

    pub async fn list_holdings(&self, user_id: Uuid) -> Result<Vec<Holding>, DataClientError> {
        const OP: &str = "list holdings";
        let url = self.url(&["data", "portfolio", &user_id.to_string()]);
        let body = self.send(OP, Method::GET, url, None).await?;
        let list: HoldingListXml = decode(OP, &body)?;
        Ok(list.items.into_iter().map(Holding::from).collect())
    }

    /// The user's holding of `crypto_id`, or `None` if the data service has none.
    pub async fn get_holding(
        &self,
        user_id: Uuid,
        crypto_id: &str,
    ) -> Result<Option<Holding>, DataClientError> {
        const OP: &str = "get holding";
        let url = self.url(&["data", "portfolio", &user_id.to_string(), crypto_id]);
        match self.send(OP, Method::GET, url, None).await {
            Ok(body) => Ok(Some(decode::<HoldingXml>(OP, &body)?.into())),
            Err(DataClientError::Rejected { status, .. }) if status == StatusCode::NOT_FOUND => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn create_holding(
        &self,
        user_id: Uuid,
        crypto_id: &str,
        quantity: Decimal,
    ) -> Result<Uuid, DataClientError> {
        const OP: &str = "create holding";
        let request = CreateHoldingXml {
            user_id,
            crypto_id: crypto_id.to_string(),
            quantity,
        };
        let url = self.url(&["data", "portfolio"]);
        let body = self
            .send(OP, Method::POST, url, Some(encode(OP, &request)?))
            .await?;
        Ok(decode::<GuidXml>(OP, &body)?.value)
    }

    pub async fn update_holding_quantity(
        &self,
        holding_id: Uuid,
        quantity: Decimal,
    ) -> Result<(), DataClientError> {
        const OP: &str = "update holding";
        let url = self.url(&["data", "portfolio", &holding_id.to_string()]);
        let payload = encode(OP, &DecimalXml { value: quantity })?;
        self.send(OP, Method::PUT, url, Some(payload)).await?;
        Ok(())
    }

    pub async fn delete_holding(&self, holding_id: Uuid) -> Result<(), DataClientError> {
        const OP: &str = "delete holding";
        let url = self.url(&["data", "portfolio", &holding_id.to_string()]);
        self.send(OP, Method::DELETE, url, None).await?;
        Ok(())
    }

    // ============ WATCHLIST ============

    pub async fn list_watchlist(&self, user_id: Uuid) -> Result<Vec<String>, DataClientError> {
        const OP: &str = "list watchlist";
        let url = self.url(&["data", "watchlist", &user_id.to_string()]);
        let body = self.send(OP, Method::GET, url, None).await?;
        Ok(decode::<CryptoIdListXml>(OP, &body)?.items)
    }

    pub async fn add_to_watchlist(
        &self,
        user_id: Uuid,
        crypto_id: &str,
    ) -> Result<(), DataClientError> {
        self.watch("add to watchlist", Method::POST, user_id, crypto_id)
            .await
    }

    pub async fn remove_from_watchlist(
        &self,
        user_id: Uuid,
        crypto_id: &str,
    ) -> Result<(), DataClientError> {
        self.watch("remove from watchlist", Method::DELETE, user_id, crypto_id)
            .await
    }

    async fn watch(
        &self,
        op: &'static str,
        method: Method,
        user_id: Uuid,
        crypto_id: &str,
    ) -> Result<(), DataClientError> {
        let request = WatchlistXml {
            user_id,
            crypto_id: crypto_id.to_string(),
        };
        let url = self.url(&["data", "watchlist"]);
        self.send(op, method, url, Some(encode(op, &request)?))
            .await?;
        Ok(())
    }

    // ============ TRANSACTIONS ============

    pub async fn create_transaction(
        &self,
        holding_id: Uuid,
        side: TransactionSide,
        quantity: Decimal,
        price_eur: Decimal,
    ) -> Result<Uuid, DataClientError> {
        const OP: &str = "create transaction";
        let request = CreateTransactionXml {
            portfolio_id: holding_id,
            side: side.to_string(),
            quantity,
            price_eur,
        };
        let url = self.url(&["data", "transaction"]);
        let body = self
            .send(OP, Method::POST, url, Some(encode(OP, &request)?))
            .await?;
        Ok(decode::<GuidXml>(OP, &body)?.value)
    }

    /// Ledger of one holding, newest first.
    pub async fn list_transactions(
        &self,
        holding_id: Uuid,
    ) -> Result<Vec<Transaction>, DataClientError> {
        const OP: &str = "list transactions";
        let url = self.url(&["data", "transaction", &holding_id.to_string()]);
        let body = self.send(OP, Method::GET, url, None).await?;
        decode::<TransactionListXml>(OP, &body)?
            .items
            .into_iter()
            .map(|tx| {
                Transaction::try_from(tx).map_err(|e| DataClientError::Xml {
                    op: OP,
                    message: e.to_string(),
                })
            })
            .collect()
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base can carry path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(
        &self,
        op: &'static str,
        method: Method,
        url: Url,
        payload: Option<String>,
    ) -> Result<String, DataClientError> {
        tracing::debug!(%method, %url, "data service call: {}", op);

        let mut request = self.http.request(method, url);
        if let Some(payload) = payload {
            request = request.header(CONTENT_TYPE, XML_CONTENT_TYPE).body(payload);
        }

        let response = request
            .send()
            .await
            .map_err(|source| DataClientError::Request { op, source })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| DataClientError::Request { op, source })?;

        if !status.is_success() {
            return Err(DataClientError::Rejected { op, status, body });
        }
        Ok(body)
    }
}

fn encode<T: Serialize>(op: &'static str, value: &T) -> Result<String, DataClientError> {
    to_xml(value).map_err(|message| DataClientError::Xml { op, message })
}

fn decode<T: DeserializeOwned>(op: &'static str, body: &str) -> Result<T, DataClientError> {
    from_xml(body).map_err(|message| DataClientError::Xml { op, message })
}
