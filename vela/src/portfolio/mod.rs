use crate::{
    engine::error::EngineError,
    portfolio::{allocator::DefaultAllocator, position::Position},
    strategy::{Signal, SignalKind},
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;
use vela_data::event::MarketEvent;
use vela_execution::{
    fill::Fill,
    order::{OrderRequest, StrategyId},
};
use vela_instrument::{ExchangeId, Side, Symbol};

/// Position sizing for signal-to-order conversion.
pub mod allocator;

/// Long-only [`Position`] bookkeeping.
pub mod position;

/// Tolerance for the portfolio accounting identity, absorbing the rounding of
/// weighted-average entry prices.
const IDENTITY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// Snapshot of portfolio balances appended to the equity curve.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct EquityPoint {
    pub time: DateTime<Utc>,
    pub equity: Decimal,
    pub cash: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
}

/// Read-only copy of portfolio state handed to strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioView {
    pub cash: Decimal,
    pub equity: Decimal,
    pub positions: FnvHashMap<Symbol, Position>,
}

impl PortfolioView {
    pub fn position(&self, symbol: &Symbol) -> Option<&Position> {
        self.positions.get(symbol)
    }
}

/// Updates portfolio state from new market events.
pub trait MarketUpdater {
    /// Mark open positions against the event's closes.
    fn update_from_market(&mut self, market: &MarketEvent) -> Result<(), EngineError>;
}

/// May generate an [`OrderRequest`] from an advisory [`Signal`].
pub trait OrderGenerator {
    /// Convert the signal into an order request using the current reference price, or
    /// drop it.
    fn generate_order(
        &mut self,
        signal: &Signal,
        reference_price: Decimal,
    ) -> Result<Option<OrderRequest>, EngineError>;
}

/// Updates portfolio state from execution fills.
pub trait FillUpdater {
    fn update_from_fill(&mut self, fill: &Fill) -> Result<(), EngineError>;
}

/// Cash, positions and the append-only equity curve of one trading run.
///
/// Accounting identity, checked after every fill:
/// `cash + market_value == initial_capital + realized + unrealized - total_costs`.
/// Violation is state corruption and halts the component.
#[derive(Debug, Clone)]
pub struct Portfolio {
    strategy: StrategyId,
    exchange: ExchangeId,
    allocator: DefaultAllocator,
    initial_capital: Decimal,
    cash: Decimal,
    realized_pnl: Decimal,
    total_commission: Decimal,
    total_slippage: Decimal,
    positions: FnvHashMap<Symbol, Position>,
    equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(
        strategy: StrategyId,
        exchange: ExchangeId,
        allocator: DefaultAllocator,
        initial_capital: Decimal,
    ) -> Self {
        Self {
            strategy,
            exchange,
            allocator,
            initial_capital,
            cash: initial_capital,
            realized_pnl: Decimal::ZERO,
            total_commission: Decimal::ZERO,
            total_slippage: Decimal::ZERO,
            positions: FnvHashMap::default(),
            equity_curve: Vec::new(),
        }
    }

    /// Current equity: cash plus the mark-to-market value of all positions.
    pub fn equity(&self) -> Decimal {
        self.cash
            + self
                .positions
                .values()
                .map(Position::notional)
                .sum::<Decimal>()
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.positions
            .values()
            .map(|position| position.unrealized_pnl)
            .sum()
    }

    pub fn total_costs(&self) -> Decimal {
        self.total_commission + self.total_slippage
    }

    pub fn position(&self, symbol: &Symbol) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> &FnvHashMap<Symbol, Position> {
        &self.positions
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    /// Read-only copy for strategies.
    pub fn view(&self) -> PortfolioView {
        PortfolioView {
            cash: self.cash,
            equity: self.equity(),
            positions: self.positions.clone(),
        }
    }

    /// Append the current balances to the equity curve.
    pub fn record_equity(&mut self, time: DateTime<Utc>) -> EquityPoint {
        let point = EquityPoint {
            time,
            equity: self.equity(),
            cash: self.cash,
            realized_pnl: self.realized_pnl,
            unrealized_pnl: self.unrealized_pnl(),
        };
        self.equity_curve.push(point);
        point
    }

    fn check_identity(&self) -> Result<(), EngineError> {
        let lhs = self.equity();
        let rhs = self.initial_capital + self.realized_pnl + self.unrealized_pnl()
            - self.total_costs();

        if (lhs - rhs).abs() > IDENTITY_TOLERANCE {
            return Err(EngineError::StateCorruption(format!(
                "equity {lhs} != capital + pnl - costs {rhs}"
            )));
        }

        Ok(())
    }
}

impl MarketUpdater for Portfolio {
    fn update_from_market(&mut self, market: &MarketEvent) -> Result<(), EngineError> {
        for (symbol, bar) in &market.bars {
            if let Some(position) = self.positions.get_mut(symbol) {
                position.mark(bar.close);
            }
        }
        Ok(())
    }
}

impl OrderGenerator for Portfolio {
    fn generate_order(
        &mut self,
        signal: &Signal,
        reference_price: Decimal,
    ) -> Result<Option<OrderRequest>, EngineError> {
        let position = self.positions.get(&signal.symbol);
        let quantity = self
            .allocator
            .allocate(signal, reference_price, self.equity(), position);

        if quantity.is_zero() {
            return Ok(None);
        }

        if quantity < self.allocator.min_quantity {
            warn!(
                symbol = %signal.symbol,
                %quantity,
                min = %self.allocator.min_quantity,
                "dropping signal: allocated quantity below exchange minimum"
            );
            return Ok(None);
        }

        let side = match signal.kind {
            SignalKind::Buy => Side::Buy,
            SignalKind::Sell => Side::Sell,
            SignalKind::Hold => return Ok(None),
        };

        Ok(Some(OrderRequest::market(
            self.strategy.clone(),
            self.exchange,
            signal.symbol.clone(),
            side,
            quantity,
        )))
    }
}

impl FillUpdater for Portfolio {
    fn update_from_fill(&mut self, fill: &Fill) -> Result<(), EngineError> {
        self.total_commission += fill.commission;
        self.total_slippage += fill.slippage;

        match fill.side {
            Side::Buy => {
                match self.positions.get_mut(&fill.symbol) {
                    Some(position) => position.add(fill.quantity, fill.price),
                    None => {
                        self.positions.insert(
                            fill.symbol.clone(),
                            Position::enter(fill.symbol.clone(), fill.quantity, fill.price),
                        );
                    }
                }
                self.cash -= fill.quantity * fill.price + fill.cost();
            }
            Side::Sell => {
                let Some(position) = self.positions.get_mut(&fill.symbol) else {
                    warn!(symbol = %fill.symbol, "sell fill with no open position, ignoring");
                    return Ok(());
                };

                let mut quantity = fill.quantity;
                if quantity > position.quantity {
                    warn!(
                        symbol = %fill.symbol,
                        fill_quantity = %quantity,
                        held = %position.quantity,
                        "sell fill exceeds held quantity, clipping"
                    );
                    quantity = position.quantity;
                }

                let realized = position.reduce(quantity, fill.price);
                self.realized_pnl += realized;
                self.cash += quantity * fill.price - fill.cost();

                if position.quantity.is_zero() {
                    self.positions.remove(&fill.symbol);
                }
            }
        }

        self.check_identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::allocator::PositionSizing;
    use crate::test_utils::fill;
    use rust_decimal_macros::dec;

    fn portfolio(initial: Decimal) -> Portfolio {
        Portfolio::new(
            StrategyId::new("strat_a"),
            ExchangeId::Simulated,
            DefaultAllocator::new(PositionSizing::PercentOfEquity(dec!(1.0)), dec!(0.0015)),
            initial,
        )
    }

    #[test]
    fn test_buy_fill_updates_cash_and_position() {
        let mut portfolio = portfolio(dec!(10_000));

        portfolio
            .update_from_fill(&fill("btc_usdt", Side::Buy, dec!(1), dec!(100.05), dec!(0.10005), dec!(0.05)))
            .unwrap();

        let position = portfolio.position(&Symbol::new("btc_usdt")).unwrap();
        assert_eq!(position.quantity, dec!(1));
        assert_eq!(position.average_price, dec!(100.05));
        // cash debited by fill value + commission + slippage
        assert_eq!(portfolio.cash(), dec!(10_000) - dec!(100.05) - dec!(0.10005) - dec!(0.05));
        assert_eq!(portfolio.total_costs(), dec!(0.15005));
    }

    #[test]
    fn test_sell_realizes_pnl_and_removes_flat_position() {
        let mut portfolio = portfolio(dec!(10_000));

        portfolio
            .update_from_fill(&fill("btc_usdt", Side::Buy, dec!(2), dec!(100), dec!(0), dec!(0)))
            .unwrap();
        portfolio
            .update_from_fill(&fill("btc_usdt", Side::Sell, dec!(2), dec!(120), dec!(0), dec!(0)))
            .unwrap();

        assert_eq!(portfolio.realized_pnl(), dec!(40));
        assert!(portfolio.position(&Symbol::new("btc_usdt")).is_none());
        assert_eq!(portfolio.cash(), dec!(10_040));
        assert_eq!(portfolio.equity(), dec!(10_040));
    }

    #[test]
    fn test_oversell_clips_to_held() {
        let mut portfolio = portfolio(dec!(10_000));

        portfolio
            .update_from_fill(&fill("btc_usdt", Side::Buy, dec!(1), dec!(100), dec!(0), dec!(0)))
            .unwrap();
        portfolio
            .update_from_fill(&fill("btc_usdt", Side::Sell, dec!(5), dec!(110), dec!(0), dec!(0)))
            .unwrap();

        // only the held unit was sold
        assert_eq!(portfolio.realized_pnl(), dec!(10));
        assert_eq!(portfolio.cash(), dec!(10_010));
        assert!(portfolio.position(&Symbol::new("btc_usdt")).is_none());
    }

    #[test]
    fn test_equity_identity_after_mark() {
        let mut portfolio = portfolio(dec!(10_000));

        portfolio
            .update_from_fill(&fill("btc_usdt", Side::Buy, dec!(2), dec!(100), dec!(0.2), dec!(0.1)))
            .unwrap();

        let event = crate::test_utils::market_event_at("btc_usdt", 0, 150);
        portfolio.update_from_market(&event).unwrap();

        // equity = cash + qty * mark
        assert_eq!(portfolio.equity(), portfolio.cash() + dec!(2) * dec!(150));
        assert_eq!(portfolio.unrealized_pnl(), dec!(100));

        let point = portfolio.record_equity(event.time);
        assert_eq!(point.equity, portfolio.equity());
        assert_eq!(portfolio.equity_curve().len(), 1);
    }
}
