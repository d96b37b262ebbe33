use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use team_market::gateway;
use team_market::service::MarketService;
use team_market::state::SessionRegistry;

use crate::common::{Harness, id, row};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start(h: Harness) -> (Client, Arc<SessionRegistry>) {
    let Harness { service, registry, .. } = h;
    let service: Arc<MarketService> = Arc::new(service);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(gateway::serve(listener, service));

    let (ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    (ws, registry)
}

async fn call(ws: &mut Client, body: Value) -> Value {
    ws.send(Message::text(body.to_string())).await.unwrap();
    next_json(ws).await
}

async fn next_json(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(t) = msg {
            return serde_json::from_str(t.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_trade_over_websocket() {
    let (mut ws, _registry) = start(Harness::new(vec![])).await;

    let reply = call(
        &mut ws,
        json!({
            "type": "buyAsset",
            "teamId": id(),
            "assetId": id(),
            "userId": id(),
            "quantity": 2.5,
            "price": 10.0
        }),
    )
    .await;

    assert_eq!(reply["type"], "tradeResult");
    assert_eq!(reply["transactionPrice"], -10.0);
    assert_eq!(reply["quantity"], 2.5);
    assert!(reply["movementPublicId"].as_str().is_some_and(|s| !s.is_empty()));
}

#[tokio::test]
async fn test_bad_requests_get_error_frames() {
    let (mut ws, _registry) = start(Harness::new(vec![])).await;

    ws.send(Message::text("{not json")).await.unwrap();
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "invalid_argument");

    let reply = call(
        &mut ws,
        json!({
            "type": "sellAsset",
            "teamId": id(),
            "assetId": id(),
            "userId": id(),
            "quantity": 0,
            "price": 10.0
        }),
    )
    .await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "invalid_argument");

    let reply = call(&mut ws, json!({"type": "checkMarket", "teamId": "", "userId": "u"})).await;
    assert_eq!(reply["code"], "invalid_argument");
}

#[tokio::test]
async fn test_check_market_streams_until_close() {
    let h = Harness::with_tick(vec![row(1, 100.0, 100.0, 0.1, 50.0, 200.0)], Duration::from_millis(20));
    let (mut ws, registry) = start(h).await;
    let team = id();

    let first = call(&mut ws, json!({"type": "checkMarket", "teamId": team, "userId": id()})).await;
    assert_eq!(first["type"], "snapshot");
    assert_eq!(first["assets"].as_array().unwrap().len(), 1);
    assert!(first["timestampMillis"].as_i64().unwrap() > 0);
    assert_eq!(registry.subscriber_count(&team), 1);

    // A second subscribe on the same socket is refused; the stream continues.
    ws.send(Message::text(json!({"type": "checkMarket", "teamId": team, "userId": id()}).to_string()))
        .await
        .unwrap();
    let mut saw_error = false;
    for _ in 0..20 {
        let v = next_json(&mut ws).await;
        if v["type"] == "error" {
            saw_error = true;
            break;
        }
        assert_eq!(v["type"], "snapshot");
    }
    assert!(saw_error);

    ws.close(None).await.unwrap();
    for _ in 0..100 {
        if registry.session_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(registry.session_count(), 0);
}
