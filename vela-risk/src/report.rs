use crate::{
    RiskError, RiskLevel, UserId,
    alert::AlertStore,
    limits::{RiskLimits, utilization},
    repository::RiskRepository,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vela_instrument::Symbol;

/// Position-side metrics of a [`RiskReport`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PositionMetrics {
    pub total_notional: Decimal,
    pub largest_symbol: Option<Symbol>,
    pub largest_notional: Decimal,
    pub concentration: Decimal,
}

/// PnL-side metrics of a [`RiskReport`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PnlMetrics {
    pub equity: Decimal,
    pub peak_equity: Decimal,
    pub daily_pnl: Decimal,
    pub drawdown_pct: Decimal,
}

/// Point-in-time risk assessment of one user.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RiskReport {
    pub user: UserId,
    pub level: RiskLevel,
    pub position_metrics: PositionMetrics,
    pub pnl_metrics: PnlMetrics,
    pub active_alerts: usize,
    pub violations: Vec<String>,
    pub recommendations: Vec<String>,
    pub time: DateTime<Utc>,
}

/// Assemble a [`RiskReport`] for the user from the current repository state.
pub fn build_report<Repository>(
    repository: &Repository,
    alerts: &AlertStore<Repository>,
    limits: &RiskLimits,
    user: &UserId,
) -> Result<RiskReport, RiskError>
where
    Repository: RiskRepository,
{
    let positions = repository.get_positions(user)?;

    let mut total_notional = Decimal::ZERO;
    let mut largest: Option<(Symbol, Decimal)> = None;
    for (symbol, position) in &positions {
        let notional = position.notional();
        total_notional += notional;
        if largest
            .as_ref()
            .is_none_or(|(_, current_max)| notional > *current_max)
        {
            largest = Some((symbol.clone(), notional));
        }
    }
    let (largest_symbol, largest_notional) = largest
        .map(|(symbol, notional)| (Some(symbol), notional))
        .unwrap_or((None, Decimal::ZERO));

    let concentration = if total_notional > Decimal::ZERO {
        largest_notional / total_notional
    } else {
        Decimal::ZERO
    };

    let equity = repository.get_equity(user)?.unwrap_or(Decimal::ZERO);
    let peak_equity = repository.get_peak_equity(user)?.unwrap_or(equity);
    let day_start = repository.get_day_start_equity(user)?.unwrap_or(equity);
    let daily_pnl = equity - day_start;

    let drawdown_pct = if peak_equity > Decimal::ZERO && equity < peak_equity {
        (peak_equity - equity) / peak_equity
    } else {
        Decimal::ZERO
    };

    let daily_loss = if daily_pnl < Decimal::ZERO {
        daily_pnl.abs()
    } else {
        Decimal::ZERO
    };

    let mut level = RiskLevel::Low;
    let mut violations = Vec::new();
    let mut recommendations = Vec::new();

    let checks = [
        (
            utilization(largest_notional, limits.max_position_per_symbol),
            format!("position size {largest_notional} of limit {}", limits.max_position_per_symbol),
            "Reduce the largest position",
        ),
        (
            utilization(total_notional, limits.max_total_position),
            format!("total position {total_notional} of limit {}", limits.max_total_position),
            "Reduce total exposure",
        ),
        (
            utilization(concentration, limits.max_concentration),
            format!("concentration {concentration:.4} of limit {}", limits.max_concentration),
            "Diversify across more symbols",
        ),
        (
            utilization(daily_loss, limits.max_daily_loss),
            format!("daily loss {daily_loss} of limit {}", limits.max_daily_loss),
            "Pause trading for the day",
        ),
        (
            utilization(drawdown_pct, limits.max_drawdown_pct),
            format!("drawdown {drawdown_pct:.4} of limit {}", limits.max_drawdown_pct),
            "De-risk until equity recovers",
        ),
    ];

    for (metric_utilization, description, recommendation) in checks {
        let metric_level = RiskLevel::from_utilization(metric_utilization);
        level = level.max(metric_level);

        if metric_utilization >= 1.0 {
            violations.push(description);
        }
        if metric_level >= RiskLevel::High {
            recommendations.push(recommendation.to_string());
        }
    }

    let active_alerts = alerts.list(user, 1, 100, Some(false))?.alerts.len();

    Ok(RiskReport {
        user: user.clone(),
        level,
        position_metrics: PositionMetrics {
            total_notional,
            largest_symbol,
            largest_notional,
            concentration,
        },
        pnl_metrics: PnlMetrics {
            equity,
            peak_equity,
            daily_pnl,
            drawdown_pct,
        },
        active_alerts,
        violations,
        recommendations,
        time: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{PositionSnapshot, in_memory::InMemoryRepository};
    use fnv::FnvHashMap;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use vela_instrument::PositionSide;

    #[test]
    fn test_report_flags_violations_and_level() {
        let repository = Arc::new(InMemoryRepository::new());
        let alerts = AlertStore::new(Arc::clone(&repository));
        let user = UserId::new("user_1");

        let btc = Symbol::new("btc_usdt");
        let positions: FnvHashMap<_, _> = [(
            btc.clone(),
            PositionSnapshot {
                symbol: btc.clone(),
                side: PositionSide::Long,
                quantity: dec!(2.5),
                average_price: dec!(50_000),
                current_price: dec!(48_000),
                unrealized_pnl: dec!(-5_000),
                realized_pnl: dec!(0),
            },
        )]
        .into_iter()
        .collect();
        repository.set_positions(&user, &positions).unwrap();

        repository.set_equity(&user, dec!(95_000)).unwrap();
        repository.set_peak_equity(&user, dec!(100_000)).unwrap();
        repository
            .set_day_start_equity(&user, dec!(100_000))
            .unwrap();

        let report =
            build_report(repository.as_ref(), &alerts, &RiskLimits::default(), &user).unwrap();

        // 120k position breaches the 100k per-symbol limit
        assert!(!report.violations.is_empty());
        assert_eq!(report.level, RiskLevel::Critical);
        assert_eq!(report.position_metrics.largest_symbol, Some(btc));
        assert_eq!(report.position_metrics.total_notional, dec!(120_000));
        assert_eq!(report.pnl_metrics.daily_pnl, dec!(-5_000));
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn test_report_for_flat_user_is_low() {
        let repository = Arc::new(InMemoryRepository::new());
        let alerts = AlertStore::new(Arc::clone(&repository));
        let user = UserId::new("user_1");

        repository.set_equity(&user, dec!(100_000)).unwrap();

        let report =
            build_report(repository.as_ref(), &alerts, &RiskLimits::default(), &user).unwrap();

        assert_eq!(report.level, RiskLevel::Low);
        assert!(report.violations.is_empty());
        assert_eq!(report.position_metrics.total_notional, dec!(0));
    }
}
