use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;
use vela_risk::limits::{MonitorConfig, RiskLimits};

/// Simulated execution costs.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimConfig {
    /// Commission charged per fill, as a fraction of fill value.
    pub commission_rate: Decimal,
    /// Adverse price adjustment applied to market fills, as a fraction of the close.
    pub slippage_rate: Decimal,
    /// Share of a bar's volume a single order may consume per step.
    pub max_participation_rate: Decimal,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            commission_rate: Decimal::new(1, 3),  // 0.001
            slippage_rate: Decimal::new(5, 4),    // 0.0005
            max_participation_rate: Decimal::ONE, // whole bar volume
        }
    }
}

/// Top-level runtime configuration. Defaults boot a sim deployment; every field can be
/// overridden from the environment via [`Config::from_env`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    pub sim: SimConfig,
    pub risk: RiskLimits,
    pub monitor: MonitorConfig,
    /// Redis connection string. `None` keeps state in process memory.
    pub cache_uri: Option<String>,
    /// Webhook sink for risk alerts. `None` disables publishing.
    pub alert_webhook_url: Option<String>,
}

impl Config {
    /// Defaults overlaid with any `VELA_*` environment variables present.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(rate) = env_decimal("VELA_COMMISSION_RATE") {
            config.sim.commission_rate = rate;
        }
        if let Some(rate) = env_decimal("VELA_SLIPPAGE_RATE") {
            config.sim.slippage_rate = rate;
        }
        if let Some(limit) = env_decimal("VELA_MAX_ORDER_SIZE") {
            config.risk.max_order_size = limit;
        }
        if let Some(limit) = env_decimal("VELA_MAX_DAILY_LOSS") {
            config.risk.max_daily_loss = limit;
        }
        if let Ok(enabled) = std::env::var("VELA_EMERGENCY_STOP_ENABLED") {
            config.risk.emergency_stop_enabled = enabled == "1" || enabled == "true";
        }
        if let Ok(uri) = std::env::var("VELA_CACHE_URI") {
            config.cache_uri = Some(uri);
        }
        if let Ok(url) = std::env::var("VELA_ALERT_WEBHOOK_URL") {
            config.alert_webhook_url = Some(url);
        }

        config
    }
}

fn env_decimal(key: &str) -> Option<Decimal> {
    let value = std::env::var(key).ok()?;
    match Decimal::from_str(&value) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(key, %error, "ignoring malformed decimal environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_costs() {
        let config = Config::default();
        assert_eq!(config.sim.commission_rate, dec!(0.001));
        assert_eq!(config.sim.slippage_rate, dec!(0.0005));
        assert!(config.risk.emergency_stop_enabled);
        assert!(config.cache_uri.is_none());
    }
}
