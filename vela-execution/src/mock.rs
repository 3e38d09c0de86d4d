use crate::{
    ExecutionError,
    client::{
        ExchangeClient, OrderBook, OrderBookLevel, PublicTrade, Ticker, VenueOrder,
        VenueOrderRequest,
    },
    order::{OrderId, OrderStatus},
};
use async_trait::async_trait;
use chrono::Utc;
use fnv::FnvHashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use tokio::sync::mpsc;
use vela_data::{bar::Bar, store::Timeframe};
use vela_instrument::{ExchangeId, Market, Symbol};

/// In-memory [`ExchangeClient`] used in tests and dry-runs.
///
/// Orders fill immediately and entirely at the configured last price. Failures can be
/// scripted per `create_order` call to exercise the retry policy, and submissions are
/// idempotent on [`ClientOrderId`](crate::order::ClientOrderId) like a real venue.
#[derive(Debug, Default)]
pub struct MockExchange {
    prices: Mutex<FnvHashMap<Symbol, Decimal>>,
    markets: Mutex<FnvHashMap<Symbol, Market>>,
    scripted_failures: Mutex<VecDeque<ExecutionError>>,
    orders: Mutex<FnvHashMap<OrderId, VenueOrder>>,
    orders_by_cid: Mutex<FnvHashMap<smol_str::SmolStr, VenueOrder>>,
    submissions: Mutex<Vec<VenueOrderRequest>>,
    cancellations: Mutex<Vec<OrderId>>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the last traded price for a symbol.
    pub fn set_price(&self, symbol: Symbol, price: Decimal) {
        self.prices.lock().insert(symbol, price);
    }

    /// Register a market's trading constraints.
    pub fn set_market(&self, market: Market) {
        self.markets.lock().insert(market.symbol.clone(), market);
    }

    /// Script an error to be returned by the next `create_order` call.
    pub fn push_failure(&self, error: ExecutionError) {
        self.scripted_failures.lock().push_back(error);
    }

    /// Every submission received, in arrival order.
    pub fn submissions(&self) -> Vec<VenueOrderRequest> {
        self.submissions.lock().clone()
    }

    /// Every cancellation received, in arrival order.
    pub fn cancellations(&self) -> Vec<OrderId> {
        self.cancellations.lock().clone()
    }

    fn price(&self, symbol: &Symbol) -> Result<Decimal, ExecutionError> {
        self.prices
            .lock()
            .get(symbol)
            .copied()
            .ok_or_else(|| ExecutionError::MarketDataUnavailable(symbol.to_string()))
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Mock
    }

    async fn connect(&self) -> Result<(), ExecutionError> {
        Ok(())
    }

    async fn load_markets(&self) -> Result<FnvHashMap<Symbol, Market>, ExecutionError> {
        Ok(self.markets.lock().clone())
    }

    async fn fetch_ticker(&self, symbol: &Symbol) -> Result<Ticker, ExecutionError> {
        let last = self.price(symbol)?;
        Ok(Ticker::new(last, last, last, Decimal::ZERO, Utc::now()))
    }

    async fn fetch_order_book(
        &self,
        symbol: &Symbol,
        _: usize,
    ) -> Result<OrderBook, ExecutionError> {
        let last = self.price(symbol)?;
        Ok(OrderBook::new(
            vec![OrderBookLevel::new(last, Decimal::ONE_HUNDRED)],
            vec![OrderBookLevel::new(last, Decimal::ONE_HUNDRED)],
            Utc::now(),
        ))
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &Symbol,
        _: Timeframe,
        _: usize,
    ) -> Result<Vec<Bar>, ExecutionError> {
        Err(ExecutionError::MarketDataUnavailable(symbol.to_string()))
    }

    async fn create_order(
        &self,
        request: &VenueOrderRequest,
    ) -> Result<VenueOrder, ExecutionError> {
        if let Some(error) = self.scripted_failures.lock().pop_front() {
            return Err(error);
        }

        // idempotent on cid: a retried submission returns the original order
        if let Some(existing) = self.orders_by_cid.lock().get(&request.cid.0) {
            return Ok(existing.clone());
        }

        self.submissions.lock().push(request.clone());

        let price = match request.price {
            Some(limit) => limit,
            None => self.price(&request.symbol)?,
        };

        let order = VenueOrder::new(
            OrderId::random(),
            request.cid.clone(),
            OrderStatus::Filled,
            request.quantity,
            price,
        );

        self.orders.lock().insert(order.id.clone(), order.clone());
        self.orders_by_cid
            .lock()
            .insert(request.cid.0.clone(), order.clone());

        Ok(order)
    }

    async fn cancel_order(&self, id: &OrderId, _: &Symbol) -> Result<(), ExecutionError> {
        self.cancellations.lock().push(id.clone());

        let mut orders = self.orders.lock();
        let order = orders
            .get_mut(id)
            .ok_or_else(|| ExecutionError::OrderNotFound(id.to_string()))?;

        if !order.status.is_terminal() {
            order.status = OrderStatus::Cancelled;
        }

        Ok(())
    }

    async fn fetch_order(&self, id: &OrderId, _: &Symbol) -> Result<VenueOrder, ExecutionError> {
        self.orders
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| ExecutionError::OrderNotFound(id.to_string()))
    }

    async fn watch_ticker(
        &self,
        symbol: &Symbol,
    ) -> Result<mpsc::UnboundedReceiver<Ticker>, ExecutionError> {
        let (ticker_tx, ticker_rx) = mpsc::unbounded_channel();
        if let Ok(ticker) = self.fetch_ticker(symbol).await {
            let _ = ticker_tx.send(ticker);
        }
        Ok(ticker_rx)
    }

    async fn watch_order_book(
        &self,
        symbol: &Symbol,
        depth: usize,
    ) -> Result<mpsc::UnboundedReceiver<OrderBook>, ExecutionError> {
        let (book_tx, book_rx) = mpsc::unbounded_channel();
        if let Ok(book) = self.fetch_order_book(symbol, depth).await {
            let _ = book_tx.send(book);
        }
        Ok(book_rx)
    }

    async fn watch_trades(
        &self,
        _: &Symbol,
    ) -> Result<mpsc::UnboundedReceiver<PublicTrade>, ExecutionError> {
        let (_, trade_rx) = mpsc::unbounded_channel();
        Ok(trade_rx)
    }

    async fn watch_ohlcv(
        &self,
        _: &Symbol,
        _: Timeframe,
    ) -> Result<mpsc::UnboundedReceiver<Bar>, ExecutionError> {
        let (_, bar_rx) = mpsc::unbounded_channel();
        Ok(bar_rx)
    }
}
