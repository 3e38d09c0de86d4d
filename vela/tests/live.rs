use chrono::TimeDelta;
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use vela::{
    VelaError,
    config::Config,
    live::ControlPlane,
};
use vela_execution::{
    algo::twap::TwapConfig,
    mock::MockExchange,
    order::{OrderRequest, OrderStatus, StrategyId},
};
use vela_instrument::{ExchangeId, PositionSide, Side, Symbol};
use vela_risk::{
    RiskLevel, UserId,
    alert::AlertType,
    limits::MonitorConfig,
    monitor::pnl::PnlMonitor,
    repository::{PositionSnapshot, RiskRepository, in_memory::InMemoryRepository},
};

fn btc() -> Symbol {
    Symbol::new("btc_usdt")
}

fn market_buy(quantity: Decimal) -> OrderRequest {
    OrderRequest::market(
        StrategyId::new("strat_a"),
        ExchangeId::Mock,
        btc(),
        Side::Buy,
        quantity,
    )
}

fn seeded_user(repository: &InMemoryRepository, equity: Decimal) -> UserId {
    let user = UserId::new("user_1");
    repository.set_equity(&user, equity).unwrap();
    repository.set_day_start_equity(&user, equity).unwrap();
    repository.set_peak_equity(&user, equity).unwrap();
    user
}

async fn wait_for_status<F>(mut poll: F, expected: OrderStatus)
where
    F: FnMut() -> Option<OrderStatus>,
{
    for _ in 0..100 {
        if poll() == Some(expected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("order never reached {expected}");
}

#[tokio::test]
async fn test_oversized_order_is_rejected_by_rule_engine() {
    let client = Arc::new(MockExchange::new());
    client.set_price(btc(), dec!(60_000));

    let repository = Arc::new(InMemoryRepository::new());
    let user = seeded_user(&repository, dec!(100_000));

    let (control_plane, _worker) =
        ControlPlane::new(Config::default(), Arc::clone(&client), repository).unwrap();

    // validation alone reports the rejection
    let validation = control_plane
        .validate_order(&user, &btc(), dec!(1), None, None)
        .await
        .unwrap();
    assert!(!validation.valid);
    assert!(
        validation
            .reason
            .as_deref()
            .unwrap()
            .contains("Order size too large")
    );
    assert_eq!(validation.level, RiskLevel::High);

    // submission is refused and nothing reaches the venue
    let result = control_plane.submit_order(&user, market_buy(dec!(1))).await;
    assert!(matches!(result, Err(VelaError::RuleViolation { .. })));
    assert!(client.submissions().is_empty());
}

#[tokio::test]
async fn test_accepted_order_executes_through_worker() {
    let client = Arc::new(MockExchange::new());
    client.set_price(btc(), dec!(10_000));

    let repository = Arc::new(InMemoryRepository::new());
    let user = seeded_user(&repository, dec!(100_000));

    let (control_plane, worker) =
        ControlPlane::new(Config::default(), Arc::clone(&client), repository).unwrap();
    tokio::spawn(worker.run());

    let order_id = control_plane
        .submit_order(&user, market_buy(dec!(1)))
        .await
        .unwrap();

    wait_for_status(
        || control_plane.order(&order_id).map(|order| order.status),
        OrderStatus::Filled,
    )
    .await;

    let order = control_plane.order(&order_id).unwrap();
    assert_eq!(order.filled_quantity, dec!(1));
    assert_eq!(order.average_fill_price, dec!(10_000));
    assert_eq!(client.submissions().len(), 1);
}

#[tokio::test]
async fn test_live_oversell_surfaces_insufficient_position() {
    let client = Arc::new(MockExchange::new());
    client.set_price(btc(), dec!(10_000));

    let repository = Arc::new(InMemoryRepository::new());
    let user = seeded_user(&repository, dec!(100_000));

    let (control_plane, _worker) =
        ControlPlane::new(Config::default(), Arc::clone(&client), repository).unwrap();

    let request = OrderRequest::market(
        StrategyId::new("strat_a"),
        ExchangeId::Mock,
        btc(),
        Side::Sell,
        dec!(1),
    );

    let result = control_plane.submit_order(&user, request).await;
    let Err(error) = result else {
        panic!("oversell must be refused")
    };
    assert_eq!(error.kind(), vela::ErrorKind::InsufficientPosition);
}

#[tokio::test]
async fn test_daily_loss_breach_flattens_positions_via_monitor() {
    let client = Arc::new(MockExchange::new());
    client.set_price(btc(), dec!(50_000));

    let repository = Arc::new(InMemoryRepository::new());
    let user = UserId::new("user_1");

    // one BTC long, marked at 50k
    let positions: FnvHashMap<Symbol, PositionSnapshot> = [(
        btc(),
        PositionSnapshot {
            symbol: btc(),
            side: PositionSide::Long,
            quantity: dec!(1),
            average_price: dec!(50_000),
            current_price: dec!(50_000),
            unrealized_pnl: dec!(-6_000),
            realized_pnl: dec!(-6_000),
        },
    )]
    .into_iter()
    .collect();
    repository.set_positions(&user, &positions).unwrap();

    // down 12k on the day against the 10k emergency threshold
    repository.set_day_start_equity(&user, dec!(100_000)).unwrap();
    repository.set_peak_equity(&user, dec!(100_000)).unwrap();
    repository.set_equity(&user, dec!(88_000)).unwrap();

    let mut config = Config::default();
    config.risk.emergency_stop_daily_loss = dec!(10_000);
    config.risk.emergency_stop_drawdown = dec!(0.15);

    let (control_plane, _worker) =
        ControlPlane::new(config, Arc::clone(&client), Arc::clone(&repository)).unwrap();

    let (_command_tx, command_rx) = mpsc::channel(1);
    let monitor = PnlMonitor::new(
        Arc::clone(&repository),
        control_plane.alerts(),
        Arc::new(control_plane.gateway()),
        control_plane.limits(),
        MonitorConfig::default(),
        command_rx,
    );

    monitor.check_all().await;

    // the long was flattened at market on the venue
    let submissions = client.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].side, Side::Sell);
    assert_eq!(submissions[0].quantity, dec!(1));

    // position snapshot is flat
    assert!(control_plane.get_position(&user, None).unwrap().is_empty());

    // one critical emergency-stop alert persisted
    let alerts = control_plane.list_alerts(&user, 1, 10, None).unwrap();
    let emergency: Vec<_> = alerts
        .alerts
        .iter()
        .filter(|alert| alert.alert_type == AlertType::EmergencyStop)
        .collect();
    assert_eq!(emergency.len(), 1);
    assert_eq!(emergency[0].level, RiskLevel::Critical);
}

#[tokio::test]
async fn test_live_twap_decomposes_into_child_submissions() {
    let client = Arc::new(MockExchange::new());
    client.set_price(btc(), dec!(10_000));

    let repository = Arc::new(InMemoryRepository::new());
    let user = seeded_user(&repository, dec!(100_000));

    let (control_plane, _worker) =
        ControlPlane::new(Config::default(), Arc::clone(&client), repository).unwrap();

    let request = OrderRequest::new(
        StrategyId::new("strat_a"),
        ExchangeId::Mock,
        btc(),
        Side::Buy,
        vela_execution::order::OrderKind::Twap,
        dec!(1.0),
        None,
        None,
        vela_execution::order::TimeInForce::GoodUntilCancelled,
    );

    // zero interval: every slice is due immediately
    let parent_id = control_plane
        .submit_twap(
            &user,
            request,
            TwapConfig {
                slices: 4,
                interval: TimeDelta::zero(),
            },
        )
        .await
        .unwrap();

    wait_for_status(
        || control_plane.order(&parent_id).map(|order| order.status),
        OrderStatus::Filled,
    )
    .await;

    let parent = control_plane.order(&parent_id).unwrap();
    assert_eq!(parent.filled_quantity, dec!(1.0));

    let submissions = client.submissions();
    assert_eq!(submissions.len(), 4);
    assert!(
        submissions
            .iter()
            .all(|submission| submission.quantity == dec!(0.25))
    );
    // deterministic, idempotent child client order ids
    assert_eq!(
        submissions[0].cid.0.as_str(),
        format!("strat_a:{parent_id}:0")
    );
}
