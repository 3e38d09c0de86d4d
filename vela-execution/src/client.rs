use crate::{
    ExecutionError,
    order::{ClientOrderId, OrderId, OrderKind, OrderStatus, TimeInForce},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::Constructor;
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use vela_data::{bar::Bar, store::Timeframe};
use vela_instrument::{ExchangeId, Market, Side, Symbol};

/// Default deadline for venue REST calls.
pub const REST_DEADLINE: std::time::Duration = std::time::Duration::from_secs(10);

/// Default deadline for venue stream (re)connection.
pub const STREAM_DEADLINE: std::time::Duration = std::time::Duration::from_secs(30);

/// Level-1 snapshot of a venue ticker.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Ticker {
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    pub volume: Decimal,
    pub time: DateTime<Utc>,
}

/// Single price level of an [`OrderBook`].
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct OrderBookLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Depth-limited venue order book snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct OrderBook {
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
    pub time: DateTime<Utc>,
}

/// Public trade print from a venue trade stream.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct PublicTrade {
    pub price: Decimal,
    pub quantity: Decimal,
    pub side: Side,
    pub time: DateTime<Utc>,
}

/// Venue-facing order submission, keyed by our idempotent [`ClientOrderId`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct VenueOrderRequest {
    pub cid: ClientOrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub kind: OrderKind,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub time_in_force: TimeInForce,
}

/// Venue view of an order, as returned by `create_order` / `fetch_order`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct VenueOrder {
    pub id: OrderId,
    pub cid: ClientOrderId,
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    pub average_fill_price: Decimal,
}

/// Capability a live trading venue must provide.
///
/// All methods observe the [`REST_DEADLINE`] / [`STREAM_DEADLINE`] contract; implementations
/// translate venue wire errors into [`ExecutionError`] kinds so the retry policy in
/// [`live`](crate::live) can distinguish retryable failures.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    fn exchange(&self) -> ExchangeId;

    async fn connect(&self) -> Result<(), ExecutionError>;

    async fn load_markets(&self) -> Result<FnvHashMap<Symbol, Market>, ExecutionError>;

    async fn fetch_ticker(&self, symbol: &Symbol) -> Result<Ticker, ExecutionError>;

    async fn fetch_order_book(
        &self,
        symbol: &Symbol,
        depth: usize,
    ) -> Result<OrderBook, ExecutionError>;

    async fn fetch_ohlcv(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, ExecutionError>;

    async fn create_order(&self, request: &VenueOrderRequest)
    -> Result<VenueOrder, ExecutionError>;

    async fn cancel_order(&self, id: &OrderId, symbol: &Symbol) -> Result<(), ExecutionError>;

    async fn fetch_order(
        &self,
        id: &OrderId,
        symbol: &Symbol,
    ) -> Result<VenueOrder, ExecutionError>;

    /// Stream ticker updates until the receiver is dropped.
    async fn watch_ticker(
        &self,
        symbol: &Symbol,
    ) -> Result<mpsc::UnboundedReceiver<Ticker>, ExecutionError>;

    /// Stream depth-limited order book snapshots until the receiver is dropped.
    async fn watch_order_book(
        &self,
        symbol: &Symbol,
        depth: usize,
    ) -> Result<mpsc::UnboundedReceiver<OrderBook>, ExecutionError>;

    /// Stream public trades until the receiver is dropped.
    async fn watch_trades(
        &self,
        symbol: &Symbol,
    ) -> Result<mpsc::UnboundedReceiver<PublicTrade>, ExecutionError>;

    /// Stream closed bars until the receiver is dropped.
    async fn watch_ohlcv(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
    ) -> Result<mpsc::UnboundedReceiver<Bar>, ExecutionError>;
}
