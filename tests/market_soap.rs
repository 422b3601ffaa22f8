mod common;

use common::{spawn, spawn_failing_coingecko, spawn_fake_coingecko};
use cryptofolio_backend::coingecko::PriceFeed;
use cryptofolio_backend::soap;
use reqwest::StatusCode;
use std::time::Duration;

const ENVELOPE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <GetMarketSummary xmlns="http://cryptoplatform.com/" />
  </soap:Body>
</soap:Envelope>"#;

async fn spawn_soap(coingecko: &str) -> String {
    let feed = PriceFeed::new(coingecko, Duration::ZERO).unwrap();
    format!("{}/MarketService.asmx", spawn(soap::router(feed)).await)
}

async fn call(url: &str, action: Option<&str>, body: &str) -> (StatusCode, String) {
    let mut request = reqwest::Client::new()
        .post(url)
        .header("Content-Type", "text/xml; charset=utf-8")
        .body(body.to_string());
    if let Some(action) = action {
        request = request.header("SOAPAction", action);
    }
    let response = request.send().await.unwrap();
    let status = response.status();
    (status, response.text().await.unwrap())
}

#[tokio::test]
async fn market_summary_lists_top_coins() {
    let (coingecko, _) = spawn_fake_coingecko().await;
    let url = spawn_soap(&coingecko).await;

    let (status, body) = call(
        &url,
        Some("\"http://cryptoplatform.com/GetMarketSummary\""),
        ENVELOPE,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<soap:Body><GetMarketSummaryResponse xmlns=\"http://cryptoplatform.com/\"><GetMarketSummaryResult>"));
    assert!(body.contains("<Id>bitcoin</Id><Name>Bitcoin</Name><Symbol>BTC</Symbol><PriceEur>50000</PriceEur>"));
    assert!(body.contains("<Symbol>ETH</Symbol><PriceEur>2500.5</PriceEur><Change24h>-1.25</Change24h>"));
    assert!(body.contains("<TotalMarketCapEur>1200000000000</TotalMarketCapEur>"));
}

#[tokio::test]
async fn operation_is_read_from_the_body_without_soap_action() {
    let (coingecko, _) = spawn_fake_coingecko().await;
    let url = spawn_soap(&coingecko).await;

    let (status, body) = call(&url, None, ENVELOPE).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<GetMarketSummaryResult>"));
}

#[tokio::test]
async fn unknown_operations_fault_as_client_errors() {
    let (coingecko, hits) = spawn_fake_coingecko().await;
    let url = spawn_soap(&coingecko).await;

    let (status, body) = call(
        &url,
        Some("\"http://cryptoplatform.com/GetEverything\""),
        ENVELOPE,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("<faultcode>soap:Client</faultcode>"));
    assert!(body.contains("GetEverything"));
    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn feed_failures_fault_as_server_errors() {
    let url = spawn_soap(&spawn_failing_coingecko().await).await;

    let (status, body) = call(&url, None, ENVELOPE).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("<faultcode>soap:Server</faultcode>"));
    assert!(body.contains("Error fetching market data: "));
}
