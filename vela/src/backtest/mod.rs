use crate::{
    VelaError,
    config::SimConfig,
    engine::BacktestEngine,
    execution::SimulatedExecution,
    portfolio::{
        EquityPoint, Portfolio,
        allocator::{DefaultAllocator, PositionSizing},
    },
    statistic::summary::TradingSummary,
    strategy::Strategy,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vela_data::{
    historical::{Config as FeedConfig, HistoricalFeed},
    store::{HistoricalStore, Timeframe},
};
use vela_execution::{fill::Fill, order::StrategyId};
use vela_instrument::{ExchangeId, Symbol};

/// Configuration of a single backtest run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BacktestConfig {
    pub exchange: ExchangeId,
    pub symbols: Vec<Symbol>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timeframe: Timeframe,
    pub initial_capital: Decimal,
    pub sizing: PositionSizing,
    pub sim: SimConfig,
    /// Per-period risk-free rate used in risk-adjusted metrics.
    pub risk_free_return: f64,
}

/// Results of a completed backtest.
#[derive(Debug)]
pub struct BacktestSummary {
    pub trading_summary: TradingSummary,
    pub equity_curve: Vec<EquityPoint>,
    pub fills: Vec<Fill>,
    pub events_processed: u64,
}

/// Run `strategy` over historical bars from `store` and summarise its performance.
///
/// Strictly deterministic: identical inputs produce an identical summary.
pub fn backtest<Store, S>(
    store: &Store,
    strategy: S,
    config: BacktestConfig,
) -> Result<BacktestSummary, VelaError>
where
    Store: HistoricalStore,
    S: Strategy,
{
    let feed = HistoricalFeed::new(
        store,
        FeedConfig {
            exchange: config.exchange,
            symbols: config.symbols.clone(),
            start: config.start,
            end: config.end,
            timeframe: config.timeframe,
        },
    )?;

    let cost_buffer = config.sim.commission_rate + config.sim.slippage_rate;
    let portfolio = Portfolio::new(
        StrategyId::new(strategy.id().to_string()),
        config.exchange,
        DefaultAllocator::new(config.sizing, cost_buffer),
        config.initial_capital,
    );

    let execution = SimulatedExecution::new(config.sim);

    let output = BacktestEngine::new(feed, strategy, portfolio, execution).run()?;

    let trading_summary = TradingSummary::generate(
        output.portfolio.equity_curve(),
        &output.fills,
        config.initial_capital,
        config.risk_free_return,
    );

    Ok(BacktestSummary {
        equity_curve: output.portfolio.equity_curve().to_vec(),
        fills: output.fills,
        events_processed: output.events_processed,
        trading_summary,
    })
}
