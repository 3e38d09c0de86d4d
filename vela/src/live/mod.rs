use crate::{
    VelaError,
    config::Config,
    live::{
        lock::KeyedMutex,
        worker::{ExecutionRequest, ExecutionWorker, OrderRecord, OrderStore},
    },
};
use async_trait::async_trait;
use chrono::Utc;
use fnv::FnvHashMap;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use vela_execution::{
    ExecutionError,
    client::ExchangeClient,
    live::{LiveExecution, RetryConfig},
    order::{Order, OrderId, OrderRequest, StrategyId},
};
use vela_instrument::{Side, Symbol};
use vela_risk::{
    RiskError, UserId,
    alert::{AlertId, AlertPage, AlertStore, AlertType, RiskAlert, WebhookPublisher},
    context::RiskContext,
    emergency::{EmergencyStopOutcome, OrderGateway, emergency_stop},
    limits::RiskLimits,
    report::{RiskReport, build_report},
    repository::{PositionSnapshot, RiskRepository},
    rule::{RuleEngine, Validation},
};

/// Live TWAP and iceberg schedule runners.
pub mod algo;

/// Per-user serialisation of validate-then-commit sequences.
pub mod lock;

/// Per-exchange execution workers and the shared order registry.
pub mod worker;

/// Capacity of each per-exchange execution worker queue.
const WORKER_QUEUE_CAPACITY: usize = 256;

/// Order operations backing the emergency stop, implemented over the live execution
/// path.
pub struct LiveGateway<Client, Repository> {
    execution: LiveExecution<Client>,
    orders: Arc<Mutex<OrderStore>>,
    repository: Arc<Repository>,
}

impl<Client, Repository> LiveGateway<Client, Repository>
where
    Client: ExchangeClient,
    Repository: RiskRepository,
{
    pub fn new(
        execution: LiveExecution<Client>,
        orders: Arc<Mutex<OrderStore>>,
        repository: Arc<Repository>,
    ) -> Self {
        Self {
            execution,
            orders,
            repository,
        }
    }
}

#[async_trait]
impl<Client, Repository> OrderGateway for LiveGateway<Client, Repository>
where
    Client: ExchangeClient,
    Repository: RiskRepository,
{
    async fn cancel_all_orders(&self, user: &UserId) -> Result<Vec<String>, RiskError> {
        let open = self.orders.lock().open_for_user(user);
        let mut cancelled = Vec::with_capacity(open.len());

        for record in open {
            let mut order = record.order;

            match record.venue_order {
                Some(venue_order) => {
                    self.execution
                        .cancel_order(&mut order, &venue_order.id)
                        .await
                        .map_err(|error| RiskError::Gateway(error.to_string()))?;
                }
                // never reached the venue: cancel locally
                None => {
                    if order.begin_cancel() {
                        order
                            .complete_cancel()
                            .map_err(|error| RiskError::Gateway(error.to_string()))?;
                    }
                }
            }

            cancelled.push(order.id.to_string());
            if let Some(record) = self.orders.lock().get_mut(&order.id) {
                record.order = order;
            }
        }

        Ok(cancelled)
    }

    async fn close_position(
        &self,
        user: &UserId,
        symbol: &Symbol,
        side: Side,
        quantity: Decimal,
    ) -> Result<(), RiskError> {
        let request = OrderRequest::market(
            StrategyId::system(),
            self.execution.client().exchange(),
            symbol.clone(),
            side,
            quantity,
        );

        let mut order = Order::open(request, Utc::now())
            .map_err(|error| RiskError::Gateway(error.to_string()))?;

        self.execution
            .open_order(&mut order)
            .await
            .map_err(|error| RiskError::Gateway(error.to_string()))?;

        self.orders.lock().insert(OrderRecord {
            user: user.clone(),
            order,
            venue_order: None,
        });

        // the position is flat once the close fills; refresh the persisted snapshot
        let mut positions = self.repository.get_positions(user)?;
        positions.remove(symbol);
        self.repository.set_positions(user, &positions)?;

        Ok(())
    }
}

/// Risk-gated order entry and account operations for live trading.
///
/// Construction returns the per-exchange [`ExecutionWorker`] alongside; the caller
/// spawns it. All order submissions pass `validate -> create -> enqueue`; per-user
/// sequences serialise through a keyed mutex so no two orders of one user interleave
/// their validate-commit windows.
pub struct ControlPlane<Client, Repository> {
    client: Arc<Client>,
    execution: LiveExecution<Client>,
    repository: Arc<Repository>,
    alerts: Arc<AlertStore<Repository>>,
    limits: Arc<RwLock<RiskLimits>>,
    rule_engine: RuleEngine,
    orders: Arc<Mutex<OrderStore>>,
    user_locks: KeyedMutex<UserId>,
    request_tx: mpsc::Sender<ExecutionRequest>,
}

impl<Client, Repository> ControlPlane<Client, Repository>
where
    Client: ExchangeClient + 'static,
    Repository: RiskRepository,
{
    /// Construct the control plane and its execution worker.
    pub fn new(
        config: Config,
        client: Arc<Client>,
        repository: Arc<Repository>,
    ) -> Result<(Self, ExecutionWorker<Client>), VelaError> {
        let limits = Arc::new(RwLock::new(config.risk.clone()));
        limits.read().validate()?;

        let mut alerts = AlertStore::new(Arc::clone(&repository));
        if let Some(url) = &config.alert_webhook_url {
            alerts = alerts.with_publisher(WebhookPublisher::new(url.clone())?);
        }
        let alerts = Arc::new(alerts);

        let execution = LiveExecution::new(Arc::clone(&client), RetryConfig::default());
        let orders = Arc::new(Mutex::new(OrderStore::default()));

        let (request_tx, request_rx) = mpsc::channel(WORKER_QUEUE_CAPACITY);
        let worker = ExecutionWorker::new(execution.clone(), Arc::clone(&orders), request_rx);

        let control_plane = Self {
            client,
            execution,
            repository,
            alerts,
            rule_engine: RuleEngine::with_default_rules(Arc::clone(&limits)),
            limits,
            orders,
            user_locks: KeyedMutex::new(),
            request_tx,
        };

        Ok((control_plane, worker))
    }

    /// Shared limit handle for monitors and runtime reconfiguration.
    pub fn limits(&self) -> Arc<RwLock<RiskLimits>> {
        Arc::clone(&self.limits)
    }

    pub fn alerts(&self) -> Arc<AlertStore<Repository>> {
        Arc::clone(&self.alerts)
    }

    /// Gateway over this control plane's execution path, as consumed by the PnL monitor.
    pub fn gateway(&self) -> LiveGateway<Client, Repository> {
        LiveGateway::new(
            self.execution.clone(),
            Arc::clone(&self.orders),
            Arc::clone(&self.repository),
        )
    }

    /// Evaluate the rule engine against an order intent without creating anything.
    pub async fn validate_order(
        &self,
        user: &UserId,
        symbol: &Symbol,
        quantity: Decimal,
        price: Option<Decimal>,
        leverage: Option<Decimal>,
    ) -> Result<Validation, VelaError> {
        let context = self.build_context(user, symbol, quantity, price, leverage).await?;
        Ok(self.rule_engine.evaluate(&context))
    }

    /// Validate and enqueue an order. Returns its id once accepted for execution.
    pub async fn submit_order(
        &self,
        user: &UserId,
        request: OrderRequest,
    ) -> Result<OrderId, VelaError> {
        request.validate().map_err(VelaError::from)?;

        let _guard = self.user_locks.lock(user.clone()).await;

        // live oversell is an error, unlike the clipping simulator
        if request.side == Side::Sell {
            let held = self
                .repository
                .get_positions(user)
                .map_err(VelaError::from)?
                .get(&request.symbol)
                .map(|position| position.quantity)
                .unwrap_or(Decimal::ZERO);

            if request.quantity > held {
                return Err(VelaError::Execution(ExecutionError::InsufficientPosition {
                    requested: request.quantity.to_string(),
                    held: held.to_string(),
                }));
            }
        }

        let validation = self
            .validate_order(
                user,
                &request.symbol,
                request.quantity,
                request.price,
                None,
            )
            .await?;

        if !validation.valid {
            return Err(VelaError::RuleViolation {
                rule: validation.rejected_by.unwrap_or_default(),
                reason: validation.reason.unwrap_or_default(),
            });
        }

        let order = Order::open(request, Utc::now())?;
        let order_id = order.id.clone();

        self.repository
            .record_order(user, &order.symbol, Utc::now())
            .map_err(VelaError::from)?;

        self.orders.lock().insert(OrderRecord {
            user: user.clone(),
            order,
            venue_order: None,
        });

        self.request_tx
            .send(ExecutionRequest::Open(order_id.clone()))
            .await
            .map_err(|_| {
                VelaError::Execution(ExecutionError::Network(String::from(
                    "execution worker unavailable",
                )))
            })?;

        info!(order = %order_id, %user, level = %validation.level, "order accepted");
        Ok(order_id)
    }

    /// Request cancellation of an order. Unknown ids error; duplicate cancels are no-ops
    /// downstream.
    pub async fn cancel_order(&self, id: &OrderId) -> Result<(), VelaError> {
        {
            let mut orders = self.orders.lock();
            let Some(record) = orders.get_mut(id) else {
                return Err(VelaError::InvalidInput(format!("unknown order {id}")));
            };

            // algorithm parents cancel in-process: the schedule runner observes the
            // transition and stops firing children
            if record.order.kind.is_algorithm() {
                record.order.begin_cancel();
                return Ok(());
            }
        }

        self.request_tx
            .send(ExecutionRequest::Cancel(id.clone()))
            .await
            .map_err(|_| {
                VelaError::Execution(ExecutionError::Network(String::from(
                    "execution worker unavailable",
                )))
            })
    }

    /// Current view of an order.
    pub fn order(&self, id: &OrderId) -> Option<Order> {
        self.orders.lock().get(id).map(|record| record.order.clone())
    }

    /// Position snapshots of a user, optionally narrowed to one symbol.
    pub fn get_position(
        &self,
        user: &UserId,
        symbol: Option<&Symbol>,
    ) -> Result<FnvHashMap<Symbol, PositionSnapshot>, VelaError> {
        let mut positions = self.repository.get_positions(user).map_err(VelaError::from)?;

        if let Some(symbol) = symbol {
            positions.retain(|position_symbol, _| position_symbol == symbol);
        }

        Ok(positions)
    }

    /// Assemble the point-in-time risk report of a user.
    pub fn risk_report(&self, user: &UserId) -> Result<RiskReport, VelaError> {
        let limits = self.limits.read().clone();
        build_report(self.repository.as_ref(), &self.alerts, &limits, user)
            .map_err(VelaError::from)
    }

    /// Cancel all open orders and flatten all positions of a user.
    ///
    /// `force` overrides a disabled emergency stop.
    pub async fn emergency_stop(
        &self,
        user: &UserId,
        reason: &str,
        force: bool,
    ) -> Result<EmergencyStopOutcome, VelaError> {
        if !force && !self.limits.read().emergency_stop_enabled {
            return Err(VelaError::InvalidInput(String::from(
                "emergency stop is disabled",
            )));
        }

        let _guard = self.user_locks.lock(user.clone()).await;
        let gateway = self.gateway();

        emergency_stop(self.repository.as_ref(), &gateway, &self.alerts, user, reason)
            .await
            .map_err(VelaError::from)
    }

    /// Validate and start a TWAP parent. Slices execute on their own task; progress is
    /// visible through [`ControlPlane::order`].
    pub async fn submit_twap(
        &self,
        user: &UserId,
        request: OrderRequest,
        config: vela_execution::algo::twap::TwapConfig,
    ) -> Result<OrderId, VelaError> {
        let parent_id = self.accept_algo_parent(user, request).await?;

        let parent = self
            .order(&parent_id)
            .ok_or_else(|| VelaError::InvalidInput(format!("unknown order {parent_id}")))?;
        let twap = vela_execution::algo::twap::Twap::new(&parent, config, Utc::now())?;

        tokio::spawn(algo::run_twap(
            self.execution.clone(),
            Arc::clone(&self.orders),
            user.clone(),
            parent_id.clone(),
            twap,
        ));

        Ok(parent_id)
    }

    /// Validate and start an iceberg parent.
    pub async fn submit_iceberg(
        &self,
        user: &UserId,
        request: OrderRequest,
        config: vela_execution::algo::iceberg::IcebergConfig,
    ) -> Result<OrderId, VelaError> {
        let parent_id = self.accept_algo_parent(user, request).await?;

        let parent = self
            .order(&parent_id)
            .ok_or_else(|| VelaError::InvalidInput(format!("unknown order {parent_id}")))?;
        let iceberg = vela_execution::algo::iceberg::Iceberg::new(&parent, config)?;

        tokio::spawn(algo::run_iceberg(
            self.execution.clone(),
            Arc::clone(&self.orders),
            user.clone(),
            parent_id.clone(),
            iceberg,
        ));

        Ok(parent_id)
    }

    /// Shared validate-and-store path for algorithm parents.
    async fn accept_algo_parent(
        &self,
        user: &UserId,
        request: OrderRequest,
    ) -> Result<OrderId, VelaError> {
        request.validate().map_err(VelaError::from)?;

        let _guard = self.user_locks.lock(user.clone()).await;

        let validation = self
            .validate_order(
                user,
                &request.symbol,
                request.quantity,
                request.price,
                None,
            )
            .await?;

        if !validation.valid {
            return Err(VelaError::RuleViolation {
                rule: validation.rejected_by.unwrap_or_default(),
                reason: validation.reason.unwrap_or_default(),
            });
        }

        let mut order = Order::open(request, Utc::now())?;
        order.submit()?;
        let order_id = order.id.clone();

        self.repository
            .record_order(user, &order.symbol, Utc::now())
            .map_err(VelaError::from)?;

        self.orders.lock().insert(OrderRecord {
            user: user.clone(),
            order,
            venue_order: None,
        });

        info!(order = %order_id, %user, "algorithm parent accepted");
        Ok(order_id)
    }

    pub fn create_alert(
        &self,
        user: UserId,
        alert_type: AlertType,
        level: vela_risk::RiskLevel,
        message: String,
        details: serde_json::Map<String, serde_json::Value>,
    ) -> Result<RiskAlert, VelaError> {
        self.alerts
            .create(user, alert_type, level, message, details)
            .map_err(VelaError::from)
    }

    pub fn list_alerts(
        &self,
        user: &UserId,
        page: usize,
        page_size: usize,
        acknowledged: Option<bool>,
    ) -> Result<AlertPage, VelaError> {
        self.alerts
            .list(user, page, page_size, acknowledged)
            .map_err(VelaError::from)
    }

    pub fn acknowledge_alert(&self, user: &UserId, id: &AlertId) -> Result<bool, VelaError> {
        self.alerts.acknowledge(user, id).map_err(VelaError::from)
    }

    /// Assemble the [`RiskContext`] for an order intent from persisted state and, when
    /// no price is provided, the venue ticker.
    async fn build_context(
        &self,
        user: &UserId,
        symbol: &Symbol,
        quantity: Decimal,
        price: Option<Decimal>,
        leverage: Option<Decimal>,
    ) -> Result<RiskContext, VelaError> {
        let reference_price = match price {
            Some(price) => price,
            None => {
                let ticker = self.client.fetch_ticker(symbol).await?;
                ticker.last
            }
        };

        let positions = self.repository.get_positions(user).map_err(VelaError::from)?;
        let current_position_notional = positions
            .get(symbol)
            .map(PositionSnapshot::notional)
            .unwrap_or(Decimal::ZERO);
        let total_position_notional = positions
            .values()
            .map(PositionSnapshot::notional)
            .sum::<Decimal>();

        let equity = self
            .repository
            .get_equity(user)
            .map_err(VelaError::from)?
            .unwrap_or(Decimal::ZERO);
        let day_start = self
            .repository
            .get_day_start_equity(user)
            .map_err(VelaError::from)?
            .unwrap_or(equity);
        let peak = self
            .repository
            .get_peak_equity(user)
            .map_err(VelaError::from)?
            .unwrap_or(equity);

        let (orders_last_minute, symbol_orders_last_minute) = self
            .repository
            .order_counts(user, symbol, Utc::now())
            .map_err(VelaError::from)?;

        if equity.is_zero() {
            warn!(%user, "no persisted equity; loss and drawdown rules see zero baselines");
        }

        Ok(RiskContext {
            user: Some(user.clone()),
            symbol: Some(symbol.clone()),
            side: None,
            order_notional: Some(quantity * reference_price),
            current_position_notional: Some(current_position_notional),
            total_position_notional: Some(total_position_notional),
            daily_pnl: Some(equity - day_start),
            initial_equity: Some(day_start),
            current_equity: Some(equity),
            peak_equity: Some(peak),
            leverage: Some(leverage.unwrap_or(self.limits.read().default_leverage)),
            orders_last_minute: Some(orders_last_minute),
            symbol_orders_last_minute: Some(symbol_orders_last_minute),
        })
    }
}
