/// Calmar ratio.
pub mod calmar;

/// Drawdown and maximum drawdown over an equity series.
pub mod drawdown;

/// Profit factor.
pub mod profit_factor;

/// Sharpe ratio.
pub mod sharpe;

/// Sortino ratio.
pub mod sortino;

/// Win rate.
pub mod win_rate;
