//! Binance adapter against a mock HTTP server

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use market_bots::exchange::{
    BinanceExchange, BinanceMarket, ClientConfig, Credentials, Exchange, ExchangeError,
};
use market_bots::types::{OrderRequest, OrderStatus, Side};

// =============================================================================
// Test Utilities
// =============================================================================

fn client(server: &MockServer, market: BinanceMarket, creds: Credentials) -> BinanceExchange {
    let config = ClientConfig::default()
        .with_rate_limit(1000)
        .with_base_url(server.uri());
    BinanceExchange::new(market, creds, config).unwrap()
}

fn spot(server: &MockServer) -> BinanceExchange {
    client(server, BinanceMarket::Spot, Credentials::new("key", "secret"))
}

fn symbol_info(symbol: &str, tick_size: &str, step_size: &str) -> serde_json::Value {
    json!({
        "symbol": symbol,
        "status": "TRADING",
        "filters": [
            {"filterType": "PRICE_FILTER", "minPrice": "0.01", "tickSize": tick_size},
            {"filterType": "LOT_SIZE", "minQty": step_size, "stepSize": step_size},
            {"filterType": "NOTIONAL", "minNotional": "5.00000000"}
        ]
    })
}

/// Serve `exchangeInfo` for one spot symbol; it must be requested exactly once
async fn mount_spot_filters(server: &MockServer, symbol: &str, tick_size: &str, step_size: &str) {
    Mock::given(method("GET"))
        .and(path("/api/v3/exchangeInfo"))
        .and(query_param("symbol", symbol))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "timezone": "UTC",
            "symbols": [symbol_info(symbol, tick_size, step_size)]
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn order_ack(id: i64, side: &str, price: &str, qty: &str) -> serde_json::Value {
    json!({
        "orderId": id,
        "price": price,
        "origQty": qty,
        "side": side,
        "type": "LIMIT",
        "status": "NEW"
    })
}

// =============================================================================
// Public endpoints
// =============================================================================

#[tokio::test]
async fn test_fetch_ticker() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/bookTicker"))
        .and(query_param("symbol", "BTCUSDT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "symbol": "BTCUSDT",
            "bidPrice": "64000.10",
            "bidQty": "1.0",
            "askPrice": "64000.30",
            "askQty": "2.0"
        })))
        .mount(&server)
        .await;

    let ticker = spot(&server).fetch_ticker("BTC/USDT").await.unwrap();

    assert_eq!(ticker.bid, Some(64000.10));
    assert_eq!(ticker.ask, Some(64000.30));
    assert!((ticker.mid_price().unwrap() - 64000.20).abs() < 1e-6);
}

#[tokio::test]
async fn test_fetch_ohlcv() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fapi/v1/klines"))
        .and(query_param("interval", "15m"))
        .and(query_param("limit", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            [1704067200000i64, "100.0", "101.0", "99.0", "100.5", "12.5", 1704068099999i64],
            [1704068100000i64, "100.5", "102.0", "100.0", "101.5", "8.0", 1704068999999i64]
        ])))
        .mount(&server)
        .await;

    let futures = client(&server, BinanceMarket::UsdM, Credentials::new("", ""));
    let candles = futures
        .fetch_ohlcv("BTC/USDT", "15m", None, Some(200))
        .await
        .unwrap();

    assert_eq!(candles.len(), 2);
    assert_eq!(candles[0].datetime.timestamp_millis(), 1704067200000);
    assert_eq!(candles[1].close, 101.5);
    assert_eq!(candles[0].volume, 12.5);
}

#[tokio::test]
async fn test_http_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/bookTicker"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"code":-1121,"msg":"Invalid symbol."}"#),
        )
        .mount(&server)
        .await;

    let err = spot(&server).fetch_ticker("NOPE/USDT").await.unwrap_err();

    match err {
        ExchangeError::Api { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("Invalid symbol"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

// =============================================================================
// Signed endpoints
// =============================================================================

#[tokio::test]
async fn test_signed_request_carries_key_and_signature() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/openOrders"))
        .and(header("X-MBX-APIKEY", "key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "orderId": 11,
                "price": "99.00",
                "origQty": "10.0",
                "side": "BUY",
                "type": "LIMIT",
                "status": "NEW"
            }
        ])))
        .mount(&server)
        .await;

    let orders = spot(&server).fetch_open_orders("TOAD/USDT").await.unwrap();

    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, "11");
    assert_eq!(orders[0].side, Side::Buy);
    assert_eq!(orders[0].price, Some(99.0));
    assert_eq!(orders[0].status, OrderStatus::Open);

    let requests = server.received_requests().await.unwrap();
    let params: Vec<(String, String)> = requests[0]
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["symbol", "recvWindow", "timestamp", "signature"]);
    assert_eq!(params[0].1, "TOADUSDT");
    assert_eq!(params[3].1.len(), 64);
}

#[tokio::test]
async fn test_limit_order_parameters() {
    let server = MockServer::start().await;
    mount_spot_filters(&server, "TOADUSDT", "0.01000000", "0.10000000").await;
    Mock::given(method("POST"))
        .and(path("/api/v3/order"))
        .and(query_param("type", "LIMIT"))
        .and(query_param("timeInForce", "GTC"))
        .and(query_param("side", "SELL"))
        .and(query_param("quantity", "1.5"))
        .and(query_param("price", "101"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(order_ack(77, "SELL", "101.00", "1.5")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let order = spot(&server)
        .create_limit_sell_order("TOAD/USDT", 1.5, 101.0)
        .await
        .unwrap();

    assert_eq!(order.id, "77");
    assert_eq!(order.amount, 1.5);
}

#[tokio::test]
async fn test_ladder_prices_align_to_market_filters() {
    let server = MockServer::start().await;
    mount_spot_filters(&server, "BTCUSDT", "0.01000000", "0.00100000").await;
    Mock::given(method("POST"))
        .and(path("/api/v3/order"))
        .and(query_param("price", "99.33"))
        .and(query_param("quantity", "0.123"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(order_ack(1, "BUY", "99.33", "0.123")),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v3/order"))
        .and(query_param("price", "98.67"))
        .and(query_param("quantity", "0.123"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(order_ack(2, "BUY", "98.67", "0.123")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let exchange = spot(&server);
    let amount = 0.123456789;
    let first = exchange
        .create_limit_buy_order("BTC/USDT", amount, 100.0 * (1.0 - 0.02 / 3.0))
        .await
        .unwrap();
    let second = exchange
        .create_limit_buy_order("BTC/USDT", amount, 100.0 * (1.0 - 2.0 * 0.02 / 3.0))
        .await
        .unwrap();

    assert_eq!(first.price, Some(99.33));
    assert_eq!(second.amount, 0.123);
}

#[tokio::test]
async fn test_amount_below_lot_step_is_not_sent() {
    let server = MockServer::start().await;
    mount_spot_filters(&server, "BTCUSDT", "0.01000000", "0.00100000").await;

    let err = spot(&server)
        .create_limit_buy_order("BTC/USDT", 0.0004, 100.0)
        .await
        .unwrap_err();

    assert!(matches!(err, ExchangeError::BelowLotStep { .. }));
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.method.as_str() != "POST"));
}

#[tokio::test]
async fn test_futures_filters_cover_every_contract() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fapi/v1/exchangeInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "symbols": [
                symbol_info("BTCUSDT", "0.10", "0.001"),
                symbol_info("ETHUSDT", "0.01", "0.001")
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/fapi/v1/order"))
        .and(query_param("type", "MARKET"))
        .and(query_param("quantity", "0.012"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orderId": 5,
            "price": "0",
            "origQty": "0.012",
            "side": "SELL",
            "type": "MARKET",
            "status": "FILLED"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let futures = client(&server, BinanceMarket::UsdM, Credentials::new("key", "secret"));
    for symbol in ["BTC/USDT", "ETH/USDT"] {
        let request = OrderRequest::market(symbol, Side::Sell, 0.0125);
        futures.create_order(&request).await.unwrap();
    }
}

#[tokio::test]
async fn test_missing_credentials_fail_before_sending() {
    let server = MockServer::start().await;
    let anonymous = client(&server, BinanceMarket::Spot, Credentials::new("", ""));

    let err = anonymous.fetch_balance().await.unwrap_err();

    assert!(matches!(err, ExchangeError::MissingCredential(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_futures_position_for_symbol() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fapi/v2/positionRisk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"symbol": "BTCUSDT", "positionAmt": "-0.004", "entryPrice": "64000"}
        ])))
        .mount(&server)
        .await;

    let futures = client(&server, BinanceMarket::UsdM, Credentials::new("key", "secret"));
    let position = futures.fetch_position("BTC/USDT").await.unwrap();

    assert!((position + 0.004).abs() < 1e-12);
}

#[tokio::test]
async fn test_spot_has_no_positions() {
    let server = MockServer::start().await;
    let err = spot(&server).fetch_position("BTC/USDT").await.unwrap_err();
    assert!(matches!(err, ExchangeError::NotSupported { .. }));
}
