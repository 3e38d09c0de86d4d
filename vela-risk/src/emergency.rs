use crate::{
    RiskError, RiskLevel, UserId,
    alert::{AlertStore, AlertType},
    repository::RiskRepository,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use vela_instrument::{Side, Symbol};

/// Order operations the emergency stop needs from the execution side.
///
/// Implemented by the control plane; kept abstract so the risk subsystem can be tested
/// against fakes.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Cancel every open order of the user, returning the cancelled order ids.
    async fn cancel_all_orders(&self, user: &UserId) -> Result<Vec<String>, RiskError>;

    /// Submit a market order closing `quantity` of the user's position in `symbol`.
    async fn close_position(
        &self,
        user: &UserId,
        symbol: &Symbol,
        side: Side,
        quantity: Decimal,
    ) -> Result<(), RiskError>;
}

/// What an [`emergency_stop`] accomplished.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EmergencyStopOutcome {
    pub closed: Vec<Symbol>,
    pub cancelled: Vec<String>,
}

/// Cancel all open orders, flatten every non-flat position at market, and persist one
/// critical alert recording the stop.
pub async fn emergency_stop<Repository, Gateway>(
    repository: &Repository,
    gateway: &Gateway,
    alerts: &AlertStore<Repository>,
    user: &UserId,
    reason: &str,
) -> Result<EmergencyStopOutcome, RiskError>
where
    Repository: RiskRepository,
    Gateway: OrderGateway,
{
    warn!(%user, reason, "emergency stop triggered");

    let cancelled = gateway.cancel_all_orders(user).await?;

    let positions = repository.get_positions(user)?;
    let mut closed = Vec::new();

    for (symbol, position) in positions {
        let Some(close_side) = position.side.exit_side() else {
            continue;
        };
        if position.quantity <= Decimal::ZERO {
            continue;
        }

        gateway
            .close_position(user, &symbol, close_side, position.quantity)
            .await?;
        closed.push(symbol);
    }

    closed.sort();

    let mut details = serde_json::Map::new();
    details.insert(String::from("reason"), json!(reason));
    details.insert(
        String::from("closed"),
        json!(closed.iter().map(Symbol::as_str).collect::<Vec<_>>()),
    );
    details.insert(String::from("cancelled_orders"), json!(cancelled.len()));

    alerts.create(
        user.clone(),
        AlertType::EmergencyStop,
        RiskLevel::Critical,
        format!("Emergency stop executed: {reason}"),
        details,
    )?;

    info!(
        %user,
        closed = closed.len(),
        cancelled = cancelled.len(),
        "emergency stop complete"
    );

    Ok(EmergencyStopOutcome { closed, cancelled })
}
