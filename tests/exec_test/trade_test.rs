use std::sync::Arc;

use team_market::config::FanoutPolicy;
use team_market::errors::MarketError;
use team_market::exec::TradeProcessor;
use team_market::state::{SessionRegistry, SubscriberHandle};
use team_market::store::memory::MemoryStore;
use team_market::types::{TradeRequest, TradeSide};

use crate::common::{FailingTradeStore, Harness, RecordingPortfolio, StaticCatalog, StaticMembers, TICK, id, row};

fn request(team: &str, user: &str, quantity: f64, price: f64) -> TradeRequest {
    TradeRequest {
        team_id: team.to_string(),
        asset_id: id(),
        user_id: user.to_string(),
        quantity,
        price,
    }
}

#[tokio::test]
async fn test_buy_records_negative_price() {
    let mut h = Harness::new(vec![]);
    let req = request(&id(), &id(), 2.5, 100.0);

    let res = h.service.buy_asset(&req).await.unwrap();

    assert_eq!(res.transaction_price, -100.0);
    assert_eq!(res.quantity, 2.5);
    assert_eq!(res.team_id, req.team_id);
    assert!(res.notifications.is_empty());

    let movements = h.store.movements();
    let transactions = h.store.transactions();
    assert_eq!(movements.len(), 1);
    assert_eq!(transactions.len(), 1);
    assert_eq!(movements[0].quantity, 2.5);
    assert_eq!(movements[0].user_id.to_string(), req.user_id);
    assert_eq!(movements[0].public_id.to_string(), res.movement_public_id);
    assert_eq!(transactions[0].movement_id, movements[0].movement_id);
    assert_eq!(transactions[0].public_id.to_string(), res.transaction_public_id);
    assert_eq!(transactions[0].transaction_price, -100.0);
    assert!(transactions[0].is_buy);

    let fwd = h.forwarded.recv().await.unwrap();
    assert_eq!(fwd.price, 100.0);
    assert!(fwd.is_buy);
    assert_eq!(fwd.quantity, 2.5);
    assert_eq!(fwd.asset_id, req.asset_id);
}

#[tokio::test]
async fn test_sell_records_positive_price() {
    let mut h = Harness::new(vec![]);
    let req = request(&id(), &id(), 2.5, 100.0);

    let res = h.service.sell_asset(&req).await.unwrap();

    assert_eq!(res.transaction_price, 100.0);
    let txs = h.store.transactions();
    let tx = &txs[0];
    assert_eq!(tx.transaction_price, 100.0);
    assert!(!tx.is_buy);

    let fwd = h.forwarded.recv().await.unwrap();
    assert_eq!(fwd.price, 100.0);
    assert!(!fwd.is_buy);
}

#[tokio::test]
async fn test_invalid_trades_have_no_side_effects() {
    let mut h = Harness::new(vec![]);
    let bad = [
        request(&id(), &id(), 0.0, 100.0),
        request(&id(), &id(), 1.0, 0.0),
        request(&id(), &id(), -2.0, 100.0),
        request("", &id(), 1.0, 1.0),
        request(&id(), "not-a-user", 1.0, 1.0),
    ];

    for req in &bad {
        let err = h.service.buy_asset(req).await.unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)), "{req:?} -> {err}");
        assert_eq!(err.code(), "invalid_argument");
    }

    assert!(h.store.movements().is_empty());
    assert!(h.store.transactions().is_empty());
    tokio::task::yield_now().await;
    assert!(h.forwarded.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_commit_failure_enqueues_and_forwards_nothing() {
    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(SessionRegistry::new(
        Arc::new(StaticCatalog::new(vec![row(1, 10.0, 10.0, 0.1, 0.0, 0.0)])),
        store,
        TICK,
    ));
    let (portfolio, mut forwarded) = RecordingPortfolio::new(false);
    let processor = TradeProcessor::new(
        Arc::new(FailingTradeStore),
        registry.clone(),
        Arc::new(portfolio),
        Arc::new(StaticMembers::new(&[])),
        FanoutPolicy::LiveSubscribers,
    );

    let team = id();
    let (actor, other) = (id(), id());
    let (h1, _rx1) = SubscriberHandle::channel(8);
    let (h2, _rx2) = SubscriberHandle::channel(8);
    let session = registry.subscribe(&team, h1, &actor).await.unwrap();
    registry.subscribe(&team, h2, &other).await.unwrap();

    let err = processor
        .record_trade(TradeSide::Buy, &request(&team, &actor, 1.0, 10.0))
        .await
        .unwrap_err();

    assert!(matches!(err, MarketError::Persistence(_)));
    assert!(!err.is_client_fault());
    assert!(err.to_string().contains("deadlock"));
    assert_eq!(session.pending_count(), 0);
    tokio::task::yield_now().await;
    assert!(forwarded.try_recv().is_err());

    registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_live_policy_alerts_other_subscribers() {
    let h = Harness::new(vec![row(1, 10.0, 10.0, 0.1, 0.0, 0.0)]);
    let team = id();
    let (alice, bob, carol) = (id(), id(), id());

    let _a = h.service.check_market(&team, &alice).await.unwrap();
    let _b = h.service.check_market(&team, &bob).await.unwrap();
    let _c = h.service.check_market(&team, &carol).await.unwrap();

    let req = request(&team, &alice, 1.0, 10.0);
    let res = h.service.buy_asset(&req).await.unwrap();

    let mut targets: Vec<_> = res.notifications.iter().map(|n| n.user_id.clone()).collect();
    targets.sort();
    let mut expected = vec![bob, carol];
    expected.sort();
    assert_eq!(targets, expected);

    let msg = format!("user {alice} bought asset {}", req.asset_id);
    assert!(res.notifications.iter().all(|n| n.message == msg));

    // Same list is queued for the stream.
    let session = h.registry.session(&team).unwrap();
    assert_eq!(session.pending_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_trade_with_padded_uppercase_team_reaches_session() {
    let h = Harness::new(vec![row(1, 10.0, 10.0, 0.1, 0.0, 0.0)]);
    let team = id();
    let (alice, bob) = (id(), id());

    let _a = h.service.check_market(&team, &alice).await.unwrap();
    let _b = h.service.check_market(&team, &bob).await.unwrap();

    let req = request(&format!("  {} ", team.to_uppercase()), &alice.to_uppercase(), 1.0, 10.0);
    let res = h.service.buy_asset(&req).await.unwrap();

    assert_eq!(res.team_id, team);
    let targets: Vec<_> = res.notifications.iter().map(|n| n.user_id.as_str()).collect();
    assert_eq!(targets, vec![bob.as_str()]);
    assert_eq!(h.registry.session(&team).unwrap().pending_count(), 1);
    assert_eq!(h.registry.session_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_check_market_normalizes_team_key() {
    let h = Harness::new(vec![row(1, 10.0, 10.0, 0.1, 0.0, 0.0)]);
    let team = id();

    let a = h.service.check_market(&format!(" {team}\n"), &id()).await.unwrap();
    let _b = h.service.check_market(&team.to_uppercase(), &id()).await.unwrap();

    assert_eq!(a.team_id(), team);
    assert_eq!(h.registry.session_count(), 1);
    assert_eq!(h.registry.subscriber_count(&team), 2);
}

#[tokio::test(start_paused = true)]
async fn test_member_policy_includes_offline_members() {
    let team = id();
    let (alice, bob, dave) = (id(), id(), id());
    let h = Harness::with_members(
        vec![row(1, 10.0, 10.0, 0.1, 0.0, 0.0)],
        StaticMembers::new(&[alice.as_str(), bob.as_str(), dave.as_str()]),
    );

    let _a = h.service.check_market(&team, &alice).await.unwrap();
    let _b = h.service.check_market(&team, &bob).await.unwrap();

    let res = h.service.sell_asset(&request(&team, &alice, 1.0, 10.0)).await.unwrap();

    let mut targets: Vec<_> = res.notifications.iter().map(|n| n.user_id.clone()).collect();
    targets.sort();
    let mut expected = vec![bob, dave];
    expected.sort();
    assert_eq!(targets, expected);
}

#[tokio::test]
async fn test_member_lookup_failure_still_records_trade() {
    let h = Harness::with_members(vec![], StaticMembers::failing());
    let res = h.service.buy_asset(&request(&id(), &id(), 1.0, 5.0)).await.unwrap();
    assert!(res.notifications.is_empty());
    assert_eq!(h.store.transactions().len(), 1);
}

#[tokio::test]
async fn test_portfolio_failure_does_not_fail_trade() {
    let mut h = Harness::with_failing_portfolio(vec![]);
    let res = h.service.buy_asset(&request(&id(), &id(), 3.0, 7.5)).await;

    assert!(res.is_ok());
    assert_eq!(h.store.movements().len(), 1);
    // The forward was attempted.
    assert!(h.forwarded.recv().await.is_some());
}
