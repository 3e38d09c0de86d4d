use crate::{config::SimConfig, engine::error::EngineError};
use chrono::{DateTime, Utc};
use fnv::{FnvHashMap, FnvHashSet};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use vela_data::{bar::Bar, event::MarketEvent};
use vela_execution::{
    algo::{
        ChildRequest,
        iceberg::{Iceberg, IcebergConfig},
        twap::{Twap, TwapConfig},
    },
    fill::Fill,
    order::{Order, OrderId, OrderKind, OrderRequest, TimeInForce},
};
use vela_instrument::Side;

/// Decimal places fill quantities are truncated to.
const FILL_QUANTITY_SCALE: u32 = 8;

/// Simulated execution engine converting orders into fills against replayed bars.
///
/// Fill semantics:
/// - **Market**: fills at `close * (1 +/- slippage_rate)`; the slippage cost
///   `quantity * close * slippage_rate` is charged alongside commission.
/// - **Limit**: a buy fills when the bar's `low <= limit` at `min(limit, open)`; a sell
///   when `high >= limit` at `max(limit, open)`. No slippage on limit fills.
/// - **Stop / StopLimit**: armed until the bar crosses the stop price; a triggered stop
///   fills like a market order from the trigger reference, a triggered stop-limit behaves
///   like a limit order from that bar onward.
/// - **Partial fills**: a single step consumes at most
///   `max_participation_rate * bar.volume`; the remainder rests.
/// - **TIF**: `GoodUntilCancelled` rests, `ImmediateOrCancel` cancels the remainder after
///   the submission step, `FillOrKill` rejects unless the full quantity fills at once.
///
/// TWAP and iceberg parents are decomposed by their state machines; children execute
/// through the same fill path and roll their fills up into the parent order.
#[derive(Debug)]
pub struct SimulatedExecution {
    config: SimConfig,
    orders: IndexMap<OrderId, Order>,
    resting: Vec<OrderId>,
    twaps: IndexMap<OrderId, Twap>,
    icebergs: IndexMap<OrderId, Iceberg>,
    /// child order id -> algorithm parent order id
    algo_children: FnvHashMap<OrderId, OrderId>,
    /// stop / stop-limit orders whose trigger has been crossed
    triggered: FnvHashSet<OrderId>,
}

impl SimulatedExecution {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            orders: IndexMap::new(),
            resting: Vec::new(),
            twaps: IndexMap::new(),
            icebergs: IndexMap::new(),
            algo_children: FnvHashMap::default(),
            triggered: FnvHashSet::default(),
        }
    }

    pub fn order(&self, id: &OrderId) -> Option<&Order> {
        self.orders.get(id)
    }

    /// Orders not yet in a terminal status.
    pub fn open_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values().filter(|order| !order.is_terminal())
    }

    /// Submit a market, limit, stop or stop-limit order, evaluating it against the
    /// current bar.
    pub fn submit(
        &mut self,
        request: OrderRequest,
        event: &MarketEvent,
    ) -> Result<(Order, Vec<Fill>), EngineError> {
        if request.kind.is_algorithm() {
            return Err(EngineError::Execution(format!(
                "{} orders require their algorithm configuration",
                request.kind
            )));
        }

        let mut order = Order::open(request, event.time)?;
        order.submit()?;

        let fills = self.evaluate_new_order(&mut order, event)?;

        let snapshot = order.clone();
        self.orders.insert(order.id.clone(), order);
        Ok((snapshot, fills))
    }

    /// Submit a TWAP parent. Slices are scheduled from the current event time; any due
    /// children execute immediately.
    pub fn submit_twap(
        &mut self,
        request: OrderRequest,
        config: TwapConfig,
        event: &MarketEvent,
    ) -> Result<(Order, Vec<Fill>), EngineError> {
        let mut parent = Order::open(request, event.time)?;
        parent.submit()?;

        let twap = Twap::new(&parent, config, event.time)?;
        let parent_id = parent.id.clone();
        self.orders.insert(parent_id.clone(), parent);
        self.twaps.insert(parent_id.clone(), twap);

        let fills = self.tick_twaps(event);
        let snapshot = self.orders.get(&parent_id).cloned().ok_or_else(|| {
            EngineError::UnknownOrder(parent_id.to_string())
        })?;

        Ok((snapshot, fills))
    }

    /// Submit an iceberg parent. The first visible child posts immediately and fills on
    /// subsequent steps when the book crosses its limit.
    pub fn submit_iceberg(
        &mut self,
        request: OrderRequest,
        config: IcebergConfig,
        event: &MarketEvent,
    ) -> Result<Order, EngineError> {
        let mut parent = Order::open(request, event.time)?;
        parent.submit()?;

        let mut iceberg = Iceberg::new(&parent, config)?;
        let parent_id = parent.id.clone();

        let first_child = iceberg.poll();
        self.orders.insert(parent_id.clone(), parent);
        self.icebergs.insert(parent_id.clone(), iceberg);

        if let Some(child) = first_child {
            self.post_child(&parent_id, child, event.time)?;
        }

        self.orders
            .get(&parent_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownOrder(parent_id.to_string()))
    }

    /// Cancel an order (or an algorithm parent and its resting children). Idempotent.
    pub fn cancel(&mut self, id: &OrderId) -> Result<Order, EngineError> {
        if !self.orders.contains_key(id) {
            return Err(EngineError::UnknownOrder(id.to_string()));
        }

        if let Some(twap) = self.twaps.get_mut(id) {
            twap.cancel();
        }
        if let Some(iceberg) = self.icebergs.get_mut(id) {
            iceberg.cancel();
        }

        // best-effort cancel of resting children belonging to this parent
        let children: Vec<OrderId> = self
            .algo_children
            .iter()
            .filter(|(_, parent)| *parent == id)
            .map(|(child, _)| child.clone())
            .collect();
        for child in children {
            if let Some(order) = self.orders.get_mut(&child)
                && order.begin_cancel()
            {
                order.complete_cancel()?;
            }
        }

        let order = self
            .orders
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownOrder(id.to_string()))?;
        if order.begin_cancel() {
            order.complete_cancel()?;
        }

        Ok(order.clone())
    }

    /// Advance the simulation one market event: tick TWAP schedules, then evaluate every
    /// resting order whose symbol has a bar in this event.
    pub fn on_market(&mut self, event: &MarketEvent) -> Vec<Fill> {
        let mut fills = self.tick_twaps(event);

        let resting: Vec<OrderId> = std::mem::take(&mut self.resting);
        for id in resting {
            let Some(order) = self.orders.get(&id) else {
                continue;
            };
            if order.is_terminal() {
                continue;
            }

            let Some(bar) = event.bar(&order.symbol).copied() else {
                self.resting.push(id);
                continue;
            };

            fills.extend(self.execute_against_bar(&id, &bar, event.time));

            if self
                .orders
                .get(&id)
                .is_some_and(|order| !order.is_terminal())
            {
                self.resting.push(id);
            }
        }

        fills
    }

    /// Evaluate a newly submitted non-algorithm order against the current bar, applying
    /// its time-in-force.
    fn evaluate_new_order(
        &mut self,
        order: &mut Order,
        event: &MarketEvent,
    ) -> Result<Vec<Fill>, EngineError> {
        let bar = event.bar(&order.symbol).copied();

        // FillOrKill requires the entire quantity to be fillable in this step
        if order.time_in_force == TimeInForce::FillOrKill {
            let fillable = bar
                .and_then(|bar| self.decide(order, &bar))
                .map(|(quantity, _)| quantity)
                .unwrap_or(Decimal::ZERO);

            if fillable < order.quantity {
                order.reject()?;
                debug!(order = %order.id, "FillOrKill order rejected: cannot fill in full");
                return Ok(Vec::new());
            }
        }

        let mut fills = Vec::new();
        if let Some(bar) = bar
            && let Some(fill) = self.fill_order(order, &bar, event.time)?
        {
            fills.push(fill);
        }

        if !order.is_terminal() {
            match order.time_in_force {
                TimeInForce::ImmediateOrCancel => {
                    if order.begin_cancel() {
                        order.complete_cancel()?;
                    }
                }
                TimeInForce::FillOrKill | TimeInForce::GoodUntilCancelled => {
                    self.resting.push(order.id.clone());
                }
            }
        }

        Ok(fills)
    }

    /// Fire every due TWAP slice as a child market order.
    fn tick_twaps(&mut self, event: &MarketEvent) -> Vec<Fill> {
        let mut due: Vec<(OrderId, Vec<ChildRequest>)> = Vec::new();
        for (parent_id, twap) in self.twaps.iter_mut() {
            let children = twap.on_tick(event.time);
            if !children.is_empty() {
                due.push((parent_id.clone(), children));
            }
        }

        let mut fills = Vec::new();
        for (parent_id, children) in due {
            for child in children {
                match self.post_child(&parent_id, child, event.time) {
                    Ok(child_id) => {
                        let Some(order) = self.orders.get(&child_id) else {
                            continue;
                        };
                        if let Some(bar) = event.bar(&order.symbol).copied() {
                            fills.extend(self.execute_against_bar(&child_id, &bar, event.time));
                        }
                        if self
                            .orders
                            .get(&child_id)
                            .is_some_and(|order| !order.is_terminal())
                        {
                            self.resting.push(child_id);
                        }
                    }
                    Err(error) => {
                        warn!(parent = %parent_id, %error, "failed to post algorithm child")
                    }
                }
            }
        }

        fills
    }

    /// Create and register a child order for an algorithm parent.
    fn post_child(
        &mut self,
        parent_id: &OrderId,
        child: ChildRequest,
        time: DateTime<Utc>,
    ) -> Result<OrderId, EngineError> {
        let parent = self
            .orders
            .get(parent_id)
            .ok_or_else(|| EngineError::UnknownOrder(parent_id.to_string()))?;

        let request = OrderRequest::new(
            parent.strategy.clone(),
            parent.exchange,
            child.symbol,
            child.side,
            child.kind,
            child.quantity,
            child.price,
            None,
            child.time_in_force,
        );

        let mut order = Order::open_child(request, parent_id.clone(), child.sequence, time)?;
        order.submit()?;

        let child_id = order.id.clone();
        self.algo_children
            .insert(child_id.clone(), parent_id.clone());
        self.orders.insert(child_id.clone(), order);

        // iceberg children rest on the book; twap children execute on their tick
        if self.icebergs.contains_key(parent_id) {
            self.resting.push(child_id.clone());
        }

        Ok(child_id)
    }

    /// Execute one stored order against a bar, rolling any fill up into an algorithm
    /// parent.
    fn execute_against_bar(
        &mut self,
        id: &OrderId,
        bar: &Bar,
        time: DateTime<Utc>,
    ) -> Vec<Fill> {
        let Some(order) = self.orders.get(id) else {
            return Vec::new();
        };

        let Some((quantity, price)) = self.decide(order, bar) else {
            self.arm_stop_limit(id, bar);
            return Vec::new();
        };

        let config = self.config;
        let order = self
            .orders
            .get_mut(id)
            .expect("order presence checked above");

        let fill = match Self::build_fill(&config, order, quantity, price, bar, time) {
            Ok(fill) => fill,
            Err(error) => {
                warn!(order = %id, %error, "fill application failed");
                return Vec::new();
            }
        };

        self.roll_up_to_parent(id, quantity, price, time);

        vec![fill]
    }

    /// Persist a stop-limit trigger crossing so later bars evaluate the limit leg even
    /// if price moves back through the stop.
    fn arm_stop_limit(&mut self, id: &OrderId, bar: &Bar) {
        let Some(order) = self.orders.get(id) else {
            return;
        };

        if order.kind == OrderKind::StopLimit
            && let Some(stop) = order.stop_price
            && self.stop_trigger(order.side, stop, bar).is_some()
        {
            self.triggered.insert(id.clone());
        }
    }

    /// Record a child's fill against its algorithm parent, replenishing iceberg slices.
    fn roll_up_to_parent(
        &mut self,
        child_id: &OrderId,
        quantity: Decimal,
        price: Decimal,
        time: DateTime<Utc>,
    ) {
        let Some(parent_id) = self.algo_children.get(child_id).cloned() else {
            return;
        };

        if let Some(parent) = self.orders.get_mut(&parent_id)
            && let Err(error) = parent.apply_fill(quantity, price)
        {
            warn!(parent = %parent_id, %error, "parent fill roll-up failed");
        }

        if let Some(twap) = self.twaps.get_mut(&parent_id) {
            twap.record_fill(quantity);
        }

        let child_complete = self
            .orders
            .get(child_id)
            .is_some_and(|child| child.is_terminal());

        let next_child = match self.icebergs.get_mut(&parent_id) {
            Some(iceberg) => {
                if let Err(error) = iceberg.record_fill(quantity) {
                    warn!(parent = %parent_id, %error, "iceberg fill bookkeeping failed");
                }
                if child_complete { iceberg.poll() } else { None }
            }
            None => None,
        };

        if let Some(child) = next_child
            && let Err(error) = self.post_child(&parent_id, child, time)
        {
            warn!(parent = %parent_id, %error, "iceberg replenishment failed");
        }
    }

    /// Decide `(quantity, price)` for executing `order` against `bar`, or `None` if it
    /// does not fill this step.
    fn decide(&self, order: &Order, bar: &Bar) -> Option<(Decimal, Decimal)> {
        let remaining = order.remaining_quantity();
        if remaining <= Decimal::ZERO || order.is_terminal() {
            return None;
        }

        let participation_cap = (self.config.max_participation_rate * bar.volume)
            .trunc_with_scale(FILL_QUANTITY_SCALE);
        let quantity = remaining.min(participation_cap);
        if quantity <= Decimal::ZERO {
            return None;
        }

        let price = match order.kind {
            OrderKind::Market => Some(self.market_price(order.side, bar.close)),
            OrderKind::Limit | OrderKind::Iceberg => {
                self.limit_price(order.side, order.price?, bar)
            }
            OrderKind::Stop => self
                .stop_trigger(order.side, order.stop_price?, bar)
                .map(|reference| self.market_price(order.side, reference)),
            OrderKind::StopLimit => {
                let armed = self.triggered.contains(&order.id)
                    || self
                        .stop_trigger(order.side, order.stop_price?, bar)
                        .is_some();
                if !armed {
                    return None;
                }
                self.limit_price(order.side, order.price?, bar)
            }
            OrderKind::Twap => None,
        }?;

        Some((quantity, price))
    }

    fn market_price(&self, side: Side, reference: Decimal) -> Decimal {
        match side {
            Side::Buy => reference * (Decimal::ONE + self.config.slippage_rate),
            Side::Sell => reference * (Decimal::ONE - self.config.slippage_rate),
        }
    }

    fn limit_price(&self, side: Side, limit: Decimal, bar: &Bar) -> Option<Decimal> {
        match side {
            Side::Buy if bar.low <= limit => Some(limit.min(bar.open)),
            Side::Sell if bar.high >= limit => Some(limit.max(bar.open)),
            _ => None,
        }
    }

    fn stop_trigger(&self, side: Side, stop: Decimal, bar: &Bar) -> Option<Decimal> {
        match side {
            Side::Buy if bar.high >= stop => Some(stop.max(bar.open)),
            Side::Sell if bar.low <= stop => Some(stop.min(bar.open)),
            _ => None,
        }
    }

    /// Evaluate and apply a fill for a freshly submitted order.
    fn fill_order(
        &mut self,
        order: &mut Order,
        bar: &Bar,
        time: DateTime<Utc>,
    ) -> Result<Option<Fill>, EngineError> {
        let Some((quantity, price)) = self.decide(order, bar) else {
            // arm stop-limits whose trigger crossed without a limit fill
            if order.kind == OrderKind::StopLimit
                && let Some(stop) = order.stop_price
                && self.stop_trigger(order.side, stop, bar).is_some()
            {
                self.triggered.insert(order.id.clone());
            }
            return Ok(None);
        };

        Self::build_fill(&self.config, order, quantity, price, bar, time).map(Some)
    }

    /// Apply `(quantity, price)` to the order and produce the corresponding [`Fill`].
    fn build_fill(
        config: &SimConfig,
        order: &mut Order,
        quantity: Decimal,
        price: Decimal,
        bar: &Bar,
        time: DateTime<Utc>,
    ) -> Result<Fill, EngineError> {
        let commission = quantity * price * config.commission_rate;
        let slippage = match order.kind {
            OrderKind::Market | OrderKind::Stop => quantity * bar.close * config.slippage_rate,
            _ => Decimal::ZERO,
        };

        order.apply_fill(quantity, price)?;

        debug!(
            order = %order.id,
            symbol = %order.symbol,
            side = %order.side,
            %quantity,
            %price,
            %commission,
            %slippage,
            "simulated fill"
        );

        Fill::new(
            order.id.clone(),
            order.exchange,
            order.symbol.clone(),
            order.side,
            quantity,
            price,
            commission,
            slippage,
            time,
        )
        .map_err(EngineError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{bar_at, market_event_at, time_base};
    use chrono::TimeDelta;
    use indexmap::IndexMap;
    use rust_decimal_macros::dec;
    use vela_execution::order::{OrderStatus, StrategyId};
    use vela_instrument::{ExchangeId, Symbol};

    fn execution() -> SimulatedExecution {
        SimulatedExecution::new(SimConfig::default())
    }

    fn market_request(side: Side, quantity: Decimal) -> OrderRequest {
        OrderRequest::market(
            StrategyId::new("strat_a"),
            ExchangeId::Simulated,
            Symbol::new("btc_usdt"),
            side,
            quantity,
        )
    }

    fn limit_request(side: Side, quantity: Decimal, price: Decimal) -> OrderRequest {
        OrderRequest::limit(
            StrategyId::new("strat_a"),
            ExchangeId::Simulated,
            Symbol::new("btc_usdt"),
            side,
            quantity,
            price,
        )
    }

    #[test]
    fn test_market_buy_applies_slippage_and_commission() {
        let mut execution = execution();
        let event = market_event_at("btc_usdt", 0, 100);

        let (order, fills) = execution
            .submit(market_request(Side::Buy, dec!(1)), &event)
            .unwrap();

        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(fills.len(), 1);
        // close 100 * (1 + 0.0005)
        assert_eq!(fills[0].price, dec!(100.05));
        // quantity * price * commission_rate
        assert_eq!(fills[0].commission, dec!(0.10005));
        // quantity * close * slippage_rate
        assert_eq!(fills[0].slippage, dec!(0.05));
    }

    #[test]
    fn test_market_sell_slips_down() {
        let mut execution = execution();
        let event = market_event_at("btc_usdt", 0, 100);

        let (_, fills) = execution
            .submit(market_request(Side::Sell, dec!(1)), &event)
            .unwrap();
        assert_eq!(fills[0].price, dec!(99.95));
    }

    #[test]
    fn test_limit_buy_fills_inside_bar_window() {
        let mut execution = execution();
        // bar: open 100, high 101, low 99
        let event = market_event_at("btc_usdt", 0, 100);

        // crossing limit above the open fills at the open
        let (order, fills) = execution
            .submit(limit_request(Side::Buy, dec!(1), dec!(100.5)), &event)
            .unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(fills[0].price, dec!(100));
        assert_eq!(fills[0].slippage, dec!(0));

        // limit below the low does not fill and rests
        let (order, fills) = execution
            .submit(limit_request(Side::Buy, dec!(1), dec!(98)), &event)
            .unwrap();
        assert!(fills.is_empty());
        assert_eq!(order.status, OrderStatus::Submitted);

        // limit inside the bar window fills at the limit
        let (_, fills) = execution
            .submit(limit_request(Side::Buy, dec!(1), dec!(99.5)), &event)
            .unwrap();
        assert_eq!(fills[0].price, dec!(99.5));
    }

    #[test]
    fn test_resting_limit_fills_on_later_bar() {
        let mut execution = execution();

        let (order, fills) = execution
            .submit(
                limit_request(Side::Buy, dec!(1), dec!(95)),
                &market_event_at("btc_usdt", 0, 100),
            )
            .unwrap();
        assert!(fills.is_empty());

        // next bar does not reach the limit
        assert!(execution
            .on_market(&market_event_at("btc_usdt", 1, 98))
            .is_empty());

        // bar with low 94 crosses: fill at min(limit, open) = min(95, 95) = 95
        let fills = execution.on_market(&market_event_at("btc_usdt", 2, 95));
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, dec!(95));
        assert_eq!(
            execution.order(&order.id).unwrap().status,
            OrderStatus::Filled
        );
    }

    #[test]
    fn test_ioc_cancels_unfilled_remainder() {
        let mut execution = execution();
        let mut request = limit_request(Side::Buy, dec!(1), dec!(98));
        request.time_in_force = TimeInForce::ImmediateOrCancel;

        let (order, fills) = execution
            .submit(request, &market_event_at("btc_usdt", 0, 100))
            .unwrap();

        assert!(fills.is_empty());
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_fok_rejects_when_full_quantity_unavailable() {
        let mut execution = execution();

        // bar volume is 1000: a 1500-unit FillOrKill cannot fill in full
        let mut request = market_request(Side::Buy, dec!(1500));
        request.time_in_force = TimeInForce::FillOrKill;

        let (order, fills) = execution
            .submit(request, &market_event_at("btc_usdt", 0, 100))
            .unwrap();
        assert!(fills.is_empty());
        assert_eq!(order.status, OrderStatus::Rejected);

        // a fillable FillOrKill executes in full
        let mut request = market_request(Side::Buy, dec!(500));
        request.time_in_force = TimeInForce::FillOrKill;
        let (order, fills) = execution
            .submit(request, &market_event_at("btc_usdt", 0, 100))
            .unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(fills[0].quantity, dec!(500));
    }

    #[test]
    fn test_participation_cap_leaves_remainder_open() {
        let mut execution = SimulatedExecution::new(SimConfig {
            max_participation_rate: dec!(0.1),
            ..SimConfig::default()
        });

        // cap = 0.1 * 1000 = 100 per bar
        let (order, fills) = execution
            .submit(
                market_request(Side::Buy, dec!(250)),
                &market_event_at("btc_usdt", 0, 100),
            )
            .unwrap();

        assert_eq!(fills[0].quantity, dec!(100));
        assert_eq!(order.status, OrderStatus::PartiallyFilled);

        let fills = execution.on_market(&market_event_at("btc_usdt", 1, 100));
        assert_eq!(fills[0].quantity, dec!(100));

        let fills = execution.on_market(&market_event_at("btc_usdt", 2, 100));
        assert_eq!(fills[0].quantity, dec!(50));
        assert_eq!(
            execution.order(&order.id).unwrap().status,
            OrderStatus::Filled
        );
        assert_eq!(
            execution.order(&order.id).unwrap().filled_quantity,
            dec!(250)
        );
    }

    #[test]
    fn test_twap_children_fire_on_schedule() {
        let mut execution = execution();
        let request = OrderRequest::new(
            StrategyId::new("strat_a"),
            ExchangeId::Simulated,
            Symbol::new("btc_usdt"),
            Side::Buy,
            OrderKind::Twap,
            dec!(1.0),
            None,
            None,
            TimeInForce::GoodUntilCancelled,
        );

        let base = time_base();
        let bars = |hours: i64| {
            let bar = bar_at(hours, 100);
            MarketEvent::new(
                base + TimeDelta::hours(hours),
                ExchangeId::Simulated,
                IndexMap::from([(Symbol::new("btc_usdt"), bar)]),
            )
        };

        // hourly bars, 4 slices at 1h interval
        let (parent, fills) = execution
            .submit_twap(
                request,
                TwapConfig {
                    slices: 4,
                    interval: TimeDelta::hours(1),
                },
                &bars(0),
            )
            .unwrap();

        // first slice fires at submission
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].quantity, dec!(0.25));

        let mut total = fills[0].quantity;
        for hour in 1..4 {
            let fills = execution.on_market(&bars(hour));
            assert_eq!(fills.len(), 1);
            total += fills[0].quantity;
        }

        assert_eq!(total, dec!(1.0));
        let parent = execution.order(&parent.id).unwrap();
        assert_eq!(parent.status, OrderStatus::Filled);
        assert_eq!(parent.filled_quantity, dec!(1.0));

        // no further children
        assert!(execution.on_market(&bars(4)).is_empty());
    }

    #[test]
    fn test_iceberg_keeps_one_child_and_replenishes() {
        let mut execution = execution();
        let request = OrderRequest::new(
            StrategyId::new("strat_a"),
            ExchangeId::Simulated,
            Symbol::new("btc_usdt"),
            Side::Buy,
            OrderKind::Iceberg,
            dec!(1.0),
            Some(dec!(101)),
            None,
            TimeInForce::GoodUntilCancelled,
        );

        let parent = execution
            .submit_iceberg(
                request,
                IcebergConfig {
                    visible_ratio: dec!(0.2),
                },
                &market_event_at("btc_usdt", 0, 100),
            )
            .unwrap();

        // each bar crosses the limit, filling the visible child and posting the next
        for hour in 1..=5 {
            let open_children = execution
                .open_orders()
                .filter(|order| order.parent.as_ref() == Some(&parent.id))
                .count();
            assert_eq!(open_children, 1, "hour {hour}: one visible child");

            let fills = execution.on_market(&market_event_at("btc_usdt", hour, 100));
            assert_eq!(fills.len(), 1);
            assert_eq!(fills[0].quantity, dec!(0.2));
        }

        let parent = execution.order(&parent.id).unwrap();
        assert_eq!(parent.status, OrderStatus::Filled);
        assert_eq!(parent.filled_quantity, dec!(1.0));
        assert!(execution
            .on_market(&market_event_at("btc_usdt", 6, 100))
            .is_empty());
    }

    #[test]
    fn test_cancel_twap_parent_stops_children() {
        let mut execution = execution();
        let request = OrderRequest::new(
            StrategyId::new("strat_a"),
            ExchangeId::Simulated,
            Symbol::new("btc_usdt"),
            Side::Buy,
            OrderKind::Twap,
            dec!(1.0),
            None,
            None,
            TimeInForce::GoodUntilCancelled,
        );

        let (parent, _) = execution
            .submit_twap(
                request,
                TwapConfig {
                    slices: 4,
                    interval: TimeDelta::hours(1),
                },
                &market_event_at("btc_usdt", 0, 100),
            )
            .unwrap();

        let cancelled = execution.cancel(&parent.id).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.filled_quantity, dec!(0.25));

        // cancelled schedule fires nothing further
        for hour in 1..6 {
            assert!(execution
                .on_market(&market_event_at("btc_usdt", hour, 100))
                .is_empty());
        }

        // duplicate cancel is a no-op
        let again = execution.cancel(&parent.id).unwrap();
        assert_eq!(again.status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_stop_buy_triggers_above_stop() {
        let mut execution = execution();
        let request = OrderRequest::new(
            StrategyId::new("strat_a"),
            ExchangeId::Simulated,
            Symbol::new("btc_usdt"),
            Side::Buy,
            OrderKind::Stop,
            dec!(1),
            None,
            Some(dec!(105)),
            TimeInForce::GoodUntilCancelled,
        );

        let (order, fills) = execution
            .submit(request, &market_event_at("btc_usdt", 0, 100))
            .unwrap();
        assert!(fills.is_empty());

        // bar reaching 106 crosses the stop: fill from max(stop, open) with slippage
        let fills = execution.on_market(&market_event_at("btc_usdt", 1, 105));
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, dec!(105) * dec!(1.0005));
        assert_eq!(
            execution.order(&order.id).unwrap().status,
            OrderStatus::Filled
        );
    }
}
