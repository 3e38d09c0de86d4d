use crate::{
    RiskError, RiskLevel, UserId,
    alert::{AlertStore, AlertType},
    limits::{MonitorConfig, RiskLimits, utilization},
    monitor::{AlertDeduper, MonitorCommand},
    repository::RiskRepository,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Periodic scan of every user's position snapshot, raising warning alerts as limits are
/// approached.
///
/// Read-only over portfolio state: the loop publishes alerts and nothing else. Errors in a
/// single iteration are logged and the loop continues.
#[derive(Debug)]
pub struct PositionMonitor<Repository> {
    repository: Arc<Repository>,
    alerts: Arc<AlertStore<Repository>>,
    limits: Arc<RwLock<RiskLimits>>,
    config: MonitorConfig,
    deduper: AlertDeduper,
    command_rx: mpsc::Receiver<MonitorCommand>,
}

impl<Repository> PositionMonitor<Repository>
where
    Repository: RiskRepository,
{
    pub fn new(
        repository: Arc<Repository>,
        alerts: Arc<AlertStore<Repository>>,
        limits: Arc<RwLock<RiskLimits>>,
        config: MonitorConfig,
        command_rx: mpsc::Receiver<MonitorCommand>,
    ) -> Self {
        let deduper = AlertDeduper::new(config.alert_cooldown);
        Self {
            repository,
            alerts,
            limits,
            config,
            deduper,
            command_rx,
        }
    }

    /// Run the scan loop until a [`MonitorCommand::Terminate`] arrives or the command
    /// transmitter is dropped.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.config.position_check_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            interval = ?self.config.position_check_interval,
            "position monitor started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.check_all();
                }
                command = self.command_rx.recv() => {
                    info!(?command, "position monitor stopped");
                    break;
                }
            }
        }
    }

    /// Scan every known user once. Per-user failures are logged, never propagated.
    pub fn check_all(&self) {
        let users = match self.repository.users() {
            Ok(users) => users,
            Err(error) => {
                error!(%error, "position monitor failed to enumerate users");
                return;
            }
        };

        for user in users {
            if let Err(error) = self.check_user(&user) {
                error!(%user, %error, "position check failed");
            }
        }
    }

    fn check_user(&self, user: &UserId) -> Result<(), RiskError> {
        let positions = self.repository.get_positions(user)?;
        if positions.is_empty() {
            return Ok(());
        }

        let limits = self.limits.read().clone();

        let mut total_notional = Decimal::ZERO;
        let mut max_position: Option<(vela_instrument::Symbol, Decimal)> = None;

        for (symbol, position) in &positions {
            let notional = position.notional();
            total_notional += notional;

            if max_position
                .as_ref()
                .is_none_or(|(_, current_max)| notional > *current_max)
            {
                max_position = Some((symbol.clone(), notional));
            }
        }

        let Some((max_symbol, max_notional)) = max_position else {
            return Ok(());
        };

        let symbol_utilization = utilization(max_notional, limits.max_position_per_symbol);
        if symbol_utilization >= self.config.warn_utilization
            && self
                .deduper
                .should_emit(user, AlertType::PositionLimit, RiskLevel::High)
        {
            self.alerts.create(
                user.clone(),
                AlertType::PositionLimit,
                RiskLevel::High,
                format!("Position size warning for {max_symbol}"),
                details(&[
                    ("symbol", json!(max_symbol.as_str())),
                    ("position_value", json!(max_notional.to_string())),
                    ("limit", json!(limits.max_position_per_symbol.to_string())),
                    ("utilization", json!(symbol_utilization)),
                ]),
            )?;
        }

        let total_utilization = utilization(total_notional, limits.max_total_position);
        if total_utilization >= self.config.warn_utilization
            && self
                .deduper
                .should_emit(user, AlertType::PositionLimit, RiskLevel::Critical)
        {
            self.alerts.create(
                user.clone(),
                AlertType::PositionLimit,
                RiskLevel::Critical,
                String::from("Total position limit warning"),
                details(&[
                    ("total_position", json!(total_notional.to_string())),
                    ("limit", json!(limits.max_total_position.to_string())),
                    ("utilization", json!(total_utilization)),
                ]),
            )?;
        }

        if total_notional > Decimal::ZERO {
            let concentration = max_notional / total_notional;
            if utilization(concentration, limits.max_concentration) >= self.config.warn_utilization
                && self
                    .deduper
                    .should_emit(user, AlertType::PositionLimit, RiskLevel::Medium)
            {
                self.alerts.create(
                    user.clone(),
                    AlertType::PositionLimit,
                    RiskLevel::Medium,
                    format!("Position concentration warning for {max_symbol}"),
                    details(&[
                        ("symbol", json!(max_symbol.as_str())),
                        ("concentration", json!(concentration.to_string())),
                        ("max_concentration", json!(limits.max_concentration.to_string())),
                    ]),
                )?;
            }
        }

        Ok(())
    }
}

pub(crate) fn details(
    entries: &[(&str, serde_json::Value)],
) -> serde_json::Map<String, serde_json::Value> {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{PositionSnapshot, in_memory::InMemoryRepository};
    use fnv::FnvHashMap;
    use rust_decimal_macros::dec;
    use vela_instrument::{PositionSide, Symbol};

    fn snapshot(symbol: &str, quantity: Decimal, price: Decimal) -> (Symbol, PositionSnapshot) {
        let symbol = Symbol::new(symbol);
        (
            symbol.clone(),
            PositionSnapshot {
                symbol,
                side: PositionSide::Long,
                quantity,
                average_price: price,
                current_price: price,
                unrealized_pnl: dec!(0),
                realized_pnl: dec!(0),
            },
        )
    }

    fn monitor(
        repository: Arc<InMemoryRepository>,
        alerts: Arc<AlertStore<InMemoryRepository>>,
    ) -> PositionMonitor<InMemoryRepository> {
        let (_, command_rx) = mpsc::channel(1);
        PositionMonitor::new(
            repository,
            alerts,
            Arc::new(RwLock::new(RiskLimits::default())),
            MonitorConfig::default(),
            command_rx,
        )
    }

    #[tokio::test]
    async fn test_warning_emitted_at_ninety_percent_utilization() {
        let repository = Arc::new(InMemoryRepository::new());
        let alerts = Arc::new(AlertStore::new(Arc::clone(&repository)));
        let user = UserId::new("user_1");

        // 95k of the 100k per-symbol limit
        let positions: FnvHashMap<_, _> = [snapshot("btc_usdt", dec!(1.9), dec!(50_000))]
            .into_iter()
            .collect();
        repository.set_positions(&user, &positions).unwrap();

        let monitor = monitor(Arc::clone(&repository), Arc::clone(&alerts));
        monitor.check_all();

        let page = alerts.list(&user, 1, 10, None).unwrap();
        assert_eq!(page.alerts.len(), 1);
        assert_eq!(page.alerts[0].alert_type, AlertType::PositionLimit);
        assert_eq!(page.alerts[0].level, RiskLevel::High);

        // second scan within the cooldown is deduplicated
        monitor.check_all();
        assert_eq!(alerts.list(&user, 1, 10, None).unwrap().alerts.len(), 1);
    }

    #[tokio::test]
    async fn test_healthy_positions_raise_nothing() {
        let repository = Arc::new(InMemoryRepository::new());
        let alerts = Arc::new(AlertStore::new(Arc::clone(&repository)));
        let user = UserId::new("user_1");

        let positions: FnvHashMap<_, _> = [
            snapshot("btc_usdt", dec!(0.5), dec!(50_000)),
            snapshot("eth_usdt", dec!(8), dec!(3_000)),
            snapshot("sol_usdt", dec!(100), dec!(250)),
            snapshot("ada_usdt", dec!(50_000), dec!(0.5)),
        ]
        .into_iter()
        .collect();
        repository.set_positions(&user, &positions).unwrap();

        monitor(Arc::clone(&repository), Arc::clone(&alerts)).check_all();

        assert!(alerts.list(&user, 1, 10, None).unwrap().alerts.is_empty());
    }
}
