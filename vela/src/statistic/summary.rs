use crate::{
    portfolio::EquityPoint,
    statistic::{
        dispersion::DataSummary,
        metric::{
            calmar::CalmarRatio, drawdown::MaxDrawdown, profit_factor::ProfitFactor,
            sharpe::SharpeRatio, sortino::SortinoRatio, win_rate::WinRate,
        },
        time::Annual365,
        trade::{RoundTrip, fifo_round_trips},
    },
};
use chrono::TimeDelta;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use vela_execution::fill::Fill;

/// Aggregated performance of one trading run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradingSummary {
    pub initial_capital: Decimal,
    pub final_equity: Decimal,

    pub total_return: f64,
    pub annual_return: f64,
    /// Annualised standard deviation of period returns.
    pub volatility: f64,
    pub sharpe_annual: f64,
    pub sortino_annual: f64,
    pub calmar: f64,
    pub max_drawdown: f64,

    pub total_fills: usize,
    pub total_round_trips: usize,
    pub win_rate: Decimal,
    /// `None` when no round-trip produced a non-zero PnL.
    pub profit_factor: Option<Decimal>,
    pub average_win: Decimal,
    pub average_loss: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,

    pub total_commission: Decimal,
    pub total_slippage: Decimal,
}

impl TradingSummary {
    /// Compute the summary from an equity curve, the fill log, and the starting capital.
    ///
    /// `risk_free_return` is a per-period rate (usually zero for crypto).
    pub fn generate(
        equity_curve: &[EquityPoint],
        fills: &[Fill],
        initial_capital: Decimal,
        risk_free_return: f64,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|point| point.equity)
            .unwrap_or(initial_capital);

        let total_return = if initial_capital > Decimal::ZERO {
            ((final_equity - initial_capital) / initial_capital)
                .to_f64()
                .unwrap_or(0.0)
        } else {
            0.0
        };

        let elapsed_days = match (equity_curve.first(), equity_curve.last()) {
            (Some(first), Some(last)) => {
                last.time.signed_duration_since(first.time).num_seconds() as f64 / 86_400.0
            }
            _ => 0.0,
        };

        let annual_return = if elapsed_days >= 1.0 {
            (1.0 + total_return).powf(365.25 / elapsed_days) - 1.0
        } else {
            0.0
        };

        // one-pass statistics over period returns
        let mut returns = DataSummary::default();
        let mut loss_returns = DataSummary::default();
        for window in equity_curve.windows(2) {
            let previous = window[0].equity.to_f64().unwrap_or(0.0);
            let current = window[1].equity.to_f64().unwrap_or(0.0);
            if previous == 0.0 {
                continue;
            }

            let period_return = current / previous - 1.0;
            returns.update(period_return);
            if period_return < 0.0 {
                loss_returns.update(period_return);
            }
        }

        let period = if equity_curve.len() > 1 {
            let span = equity_curve[equity_curve.len() - 1]
                .time
                .signed_duration_since(equity_curve[0].time);
            span / (equity_curve.len() as i32 - 1)
        } else {
            TimeDelta::days(1)
        };
        let period = if period.num_seconds() > 0 {
            period
        } else {
            TimeDelta::days(1)
        };

        let periods_per_year =
            TimeDelta::days(365).num_seconds() as f64 / period.num_seconds() as f64;
        let volatility = returns.std_dev() * periods_per_year.sqrt();

        let sharpe_annual =
            SharpeRatio::calculate(risk_free_return, returns.mean, returns.std_dev(), period)
                .scale(Annual365)
                .value;
        let sortino_annual = SortinoRatio::calculate(
            risk_free_return,
            returns.mean,
            loss_returns.std_dev(),
            period,
        )
        .scale(Annual365)
        .value;

        let max_drawdown = MaxDrawdown::calculate(equity_curve)
            .map(|max_drawdown| max_drawdown.0.value)
            .unwrap_or(0.0);

        // annual return against maximum drawdown risk
        let calmar = CalmarRatio::calculate(0.0, annual_return, max_drawdown, Annual365).value;

        let round_trips = fifo_round_trips(fills);
        let trade_stats = TradeStats::from_round_trips(&round_trips);

        Self {
            initial_capital,
            final_equity,
            total_return,
            annual_return,
            volatility,
            sharpe_annual,
            sortino_annual,
            calmar,
            max_drawdown,
            total_fills: fills.len(),
            total_round_trips: round_trips.len(),
            win_rate: trade_stats.win_rate,
            profit_factor: trade_stats.profit_factor,
            average_win: trade_stats.average_win,
            average_loss: trade_stats.average_loss,
            largest_win: trade_stats.largest_win,
            largest_loss: trade_stats.largest_loss,
            total_commission: fills.iter().map(|fill| fill.commission).sum(),
            total_slippage: fills.iter().map(|fill| fill.slippage).sum(),
        }
    }
}

#[derive(Debug, Default)]
struct TradeStats {
    win_rate: Decimal,
    profit_factor: Option<Decimal>,
    average_win: Decimal,
    average_loss: Decimal,
    largest_win: Decimal,
    largest_loss: Decimal,
}

impl TradeStats {
    fn from_round_trips(round_trips: &[RoundTrip]) -> Self {
        if round_trips.is_empty() {
            return Self::default();
        }

        let wins: Vec<Decimal> = round_trips
            .iter()
            .filter(|trip| trip.pnl > Decimal::ZERO)
            .map(|trip| trip.pnl)
            .collect();
        let losses: Vec<Decimal> = round_trips
            .iter()
            .filter(|trip| trip.pnl < Decimal::ZERO)
            .map(|trip| trip.pnl)
            .collect();

        let gross_profit: Decimal = wins.iter().sum();
        let gross_loss: Decimal = losses.iter().sum();

        Self {
            win_rate: WinRate::calculate(
                Decimal::from(wins.len() as u64),
                Decimal::from(round_trips.len() as u64),
            )
            .map(|win_rate| win_rate.value)
            .unwrap_or(Decimal::ZERO),
            profit_factor: ProfitFactor::calculate(gross_profit, gross_loss)
                .map(|profit_factor| profit_factor.value),
            average_win: if wins.is_empty() {
                Decimal::ZERO
            } else {
                gross_profit / Decimal::from(wins.len() as u64)
            },
            average_loss: if losses.is_empty() {
                Decimal::ZERO
            } else {
                gross_loss / Decimal::from(losses.len() as u64)
            },
            largest_win: wins.iter().copied().max().unwrap_or(Decimal::ZERO),
            largest_loss: losses.iter().copied().min().unwrap_or(Decimal::ZERO),
        }
    }
}
