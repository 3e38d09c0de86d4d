use crate::{
    RiskError, RiskLevel, UserId,
    alert::{AlertStore, AlertType},
    emergency::{OrderGateway, emergency_stop},
    limits::{MonitorConfig, RiskLimits, utilization},
    monitor::{AlertDeduper, MonitorCommand},
    monitor::position::details,
    repository::RiskRepository,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Periodic scan of every user's equity marks: maintains the stored peak, raises daily
/// loss and drawdown warnings, and dispatches the emergency stop when a critical
/// threshold is crossed.
///
/// Like the position monitor, the loop itself never crashes: per-user failures are
/// logged and scanning continues.
#[derive(Debug)]
pub struct PnlMonitor<Repository, Gateway> {
    repository: Arc<Repository>,
    alerts: Arc<AlertStore<Repository>>,
    gateway: Arc<Gateway>,
    limits: Arc<RwLock<RiskLimits>>,
    config: MonitorConfig,
    deduper: AlertDeduper,
    command_rx: mpsc::Receiver<MonitorCommand>,
}

impl<Repository, Gateway> PnlMonitor<Repository, Gateway>
where
    Repository: RiskRepository,
    Gateway: OrderGateway,
{
    pub fn new(
        repository: Arc<Repository>,
        alerts: Arc<AlertStore<Repository>>,
        gateway: Arc<Gateway>,
        limits: Arc<RwLock<RiskLimits>>,
        config: MonitorConfig,
        command_rx: mpsc::Receiver<MonitorCommand>,
    ) -> Self {
        let deduper = AlertDeduper::new(config.alert_cooldown);
        Self {
            repository,
            alerts,
            gateway,
            limits,
            config,
            deduper,
            command_rx,
        }
    }

    /// Run the scan loop until a [`MonitorCommand::Terminate`] arrives or the command
    /// transmitter is dropped.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.config.pnl_check_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(interval = ?self.config.pnl_check_interval, "pnl monitor started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.check_all().await;
                }
                command = self.command_rx.recv() => {
                    info!(?command, "pnl monitor stopped");
                    break;
                }
            }
        }
    }

    /// Scan every known user once. Per-user failures are logged, never propagated.
    pub async fn check_all(&self) {
        let users = match self.repository.users() {
            Ok(users) => users,
            Err(error) => {
                error!(%error, "pnl monitor failed to enumerate users");
                return;
            }
        };

        for user in users {
            if let Err(error) = self.check_user(&user).await {
                error!(%user, %error, "pnl check failed");
            }
        }
    }

    async fn check_user(&self, user: &UserId) -> Result<(), RiskError> {
        let Some(equity) = self.repository.get_equity(user)? else {
            return Ok(());
        };

        let limits = self.limits.read().clone();

        // maintain the stored peak
        let peak = match self.repository.get_peak_equity(user)? {
            Some(peak) if peak >= equity => peak,
            _ => {
                self.repository.set_peak_equity(user, equity)?;
                equity
            }
        };

        // first sighting of the day seeds the daily baseline
        let day_start = match self.repository.get_day_start_equity(user)? {
            Some(day_start) => day_start,
            None => {
                self.repository.set_day_start_equity(user, equity)?;
                equity
            }
        };

        let daily_pnl = equity - day_start;
        let daily_loss = if daily_pnl < Decimal::ZERO {
            daily_pnl.abs()
        } else {
            Decimal::ZERO
        };

        let drawdown = if peak > Decimal::ZERO && equity < peak {
            (peak - equity) / peak
        } else {
            Decimal::ZERO
        };

        let loss_utilization = utilization(daily_loss, limits.max_daily_loss);
        if loss_utilization >= self.config.warn_utilization {
            let level = if loss_utilization >= 1.0 {
                RiskLevel::Critical
            } else {
                RiskLevel::High
            };

            if self.deduper.should_emit(user, AlertType::DailyLossLimit, level) {
                self.alerts.create(
                    user.clone(),
                    AlertType::DailyLossLimit,
                    level,
                    format!("Daily loss warning: {daily_loss}"),
                    details(&[
                        ("daily_pnl", json!(daily_pnl.to_string())),
                        ("limit", json!(limits.max_daily_loss.to_string())),
                        ("utilization", json!(loss_utilization)),
                    ]),
                )?;
            }
        }

        let drawdown_utilization = utilization(drawdown, limits.max_drawdown_pct);
        if drawdown_utilization >= self.config.warn_utilization {
            let level = if drawdown_utilization >= 1.0 {
                RiskLevel::Critical
            } else {
                RiskLevel::High
            };

            if self.deduper.should_emit(user, AlertType::DrawdownLimit, level) {
                self.alerts.create(
                    user.clone(),
                    AlertType::DrawdownLimit,
                    level,
                    format!("Drawdown warning: {drawdown:.4}"),
                    details(&[
                        ("drawdown", json!(drawdown.to_string())),
                        ("peak_equity", json!(peak.to_string())),
                        ("limit", json!(limits.max_drawdown_pct.to_string())),
                        ("utilization", json!(drawdown_utilization)),
                    ]),
                )?;
            }
        }

        let emergency_due = limits.emergency_stop_enabled
            && (drawdown >= limits.emergency_stop_drawdown
                || daily_loss >= limits.emergency_stop_daily_loss);

        if emergency_due
            && self
                .deduper
                .should_emit(user, AlertType::EmergencyStop, RiskLevel::Critical)
        {
            let reason = if drawdown >= limits.emergency_stop_drawdown {
                format!("drawdown {drawdown:.4} breached emergency threshold")
            } else {
                format!("daily loss {daily_loss} breached emergency threshold")
            };

            emergency_stop(
                self.repository.as_ref(),
                self.gateway.as_ref(),
                self.alerts.as_ref(),
                user,
                &reason,
            )
            .await?;
        }

        Ok(())
    }
}
