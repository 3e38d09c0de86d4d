use crate::{
    RiskError, UserId,
    alert::{AlertId, RiskAlert},
    repository::{PositionSnapshot, RiskRepository},
};
use chrono::{DateTime, TimeDelta, Utc};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;
use vela_instrument::Symbol;

#[derive(Debug, Default)]
struct UserState {
    positions: FnvHashMap<Symbol, PositionSnapshot>,
    equity: Option<Decimal>,
    peak_equity: Option<Decimal>,
    day_start_equity: Option<Decimal>,
    recent_orders: VecDeque<(DateTime<Utc>, Symbol)>,
    alerts: FnvHashMap<AlertId, RiskAlert>,
    // newest-first index of (time, id)
    alert_index: Vec<(DateTime<Utc>, AlertId)>,
}

/// [`RiskRepository`] backed by process memory. The default for backtests and tests;
/// state-compatible with the Redis implementation.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    users: Mutex<BTreeSet<UserId>>,
    state: Mutex<FnvHashMap<UserId, UserState>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_user<T>(&self, user: &UserId, action: impl FnOnce(&mut UserState) -> T) -> T {
        let mut state = self.state.lock();
        let user_state = state.entry(user.clone()).or_default();
        action(user_state)
    }
}

impl RiskRepository for InMemoryRepository {
    fn register_user(&self, user: &UserId) -> Result<(), RiskError> {
        self.users.lock().insert(user.clone());
        Ok(())
    }

    fn users(&self) -> Result<Vec<UserId>, RiskError> {
        Ok(self.users.lock().iter().cloned().collect())
    }

    fn get_positions(
        &self,
        user: &UserId,
    ) -> Result<FnvHashMap<Symbol, PositionSnapshot>, RiskError> {
        Ok(self.with_user(user, |state| state.positions.clone()))
    }

    fn set_positions(
        &self,
        user: &UserId,
        positions: &FnvHashMap<Symbol, PositionSnapshot>,
    ) -> Result<(), RiskError> {
        self.register_user(user)?;
        self.with_user(user, |state| state.positions = positions.clone());
        Ok(())
    }

    fn get_equity(&self, user: &UserId) -> Result<Option<Decimal>, RiskError> {
        Ok(self.with_user(user, |state| state.equity))
    }

    fn set_equity(&self, user: &UserId, equity: Decimal) -> Result<(), RiskError> {
        self.register_user(user)?;
        self.with_user(user, |state| state.equity = Some(equity));
        Ok(())
    }

    fn get_peak_equity(&self, user: &UserId) -> Result<Option<Decimal>, RiskError> {
        Ok(self.with_user(user, |state| state.peak_equity))
    }

    fn set_peak_equity(&self, user: &UserId, equity: Decimal) -> Result<(), RiskError> {
        self.with_user(user, |state| state.peak_equity = Some(equity));
        Ok(())
    }

    fn get_day_start_equity(&self, user: &UserId) -> Result<Option<Decimal>, RiskError> {
        Ok(self.with_user(user, |state| state.day_start_equity))
    }

    fn set_day_start_equity(&self, user: &UserId, equity: Decimal) -> Result<(), RiskError> {
        self.with_user(user, |state| state.day_start_equity = Some(equity));
        Ok(())
    }

    fn record_order(
        &self,
        user: &UserId,
        symbol: &Symbol,
        time: DateTime<Utc>,
    ) -> Result<(), RiskError> {
        self.with_user(user, |state| {
            state.recent_orders.push_back((time, symbol.clone()));
        });
        Ok(())
    }

    fn order_counts(
        &self,
        user: &UserId,
        symbol: &Symbol,
        time: DateTime<Utc>,
    ) -> Result<(u32, u32), RiskError> {
        let cutoff = time - TimeDelta::seconds(60);
        Ok(self.with_user(user, |state| {
            while state
                .recent_orders
                .front()
                .is_some_and(|(order_time, _)| *order_time <= cutoff)
            {
                state.recent_orders.pop_front();
            }

            let global = state.recent_orders.len() as u32;
            let per_symbol = state
                .recent_orders
                .iter()
                .filter(|(_, order_symbol)| order_symbol == symbol)
                .count() as u32;
            (global, per_symbol)
        }))
    }

    fn push_alert(&self, alert: &RiskAlert, _: Duration) -> Result<(), RiskError> {
        self.register_user(&alert.user)?;
        self.with_user(&alert.user, |state| {
            state.alerts.insert(alert.id.clone(), alert.clone());
            state.alert_index.push((alert.time, alert.id.clone()));
        });
        Ok(())
    }

    fn update_alert(&self, alert: &RiskAlert, _: Duration) -> Result<(), RiskError> {
        self.with_user(&alert.user, |state| {
            state.alerts.insert(alert.id.clone(), alert.clone());
        });
        Ok(())
    }

    fn get_alert(&self, user: &UserId, id: &AlertId) -> Result<Option<RiskAlert>, RiskError> {
        Ok(self.with_user(user, |state| state.alerts.get(id).cloned()))
    }

    fn alert_page(
        &self,
        user: &UserId,
        page: usize,
        page_size: usize,
    ) -> Result<(usize, Vec<RiskAlert>), RiskError> {
        Ok(self.with_user(user, |state| {
            let total = state.alert_index.len();

            // index is append-ordered: walk newest first
            let alerts = state
                .alert_index
                .iter()
                .rev()
                .skip(page.saturating_sub(1) * page_size)
                .take(page_size)
                .filter_map(|(_, id)| state.alerts.get(id).cloned())
                .collect();

            (total, alerts)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_counts_trailing_window() {
        let repository = InMemoryRepository::new();
        let user = UserId::new("user_1");
        let btc = Symbol::new("btc_usdt");
        let eth = Symbol::new("eth_usdt");
        let base = Utc::now();

        repository
            .record_order(&user, &btc, base - TimeDelta::seconds(90))
            .unwrap();
        repository.record_order(&user, &btc, base).unwrap();
        repository.record_order(&user, &eth, base).unwrap();

        let (global, per_symbol) = repository.order_counts(&user, &btc, base).unwrap();
        assert_eq!(global, 2);
        assert_eq!(per_symbol, 1);
    }

    #[test]
    fn test_equity_marks_round_trip() {
        let repository = InMemoryRepository::new();
        let user = UserId::new("user_1");

        assert_eq!(repository.get_peak_equity(&user).unwrap(), None);

        repository.set_equity(&user, dec!(100_000)).unwrap();
        repository.set_peak_equity(&user, dec!(105_000)).unwrap();
        repository
            .set_day_start_equity(&user, dec!(98_000))
            .unwrap();

        assert_eq!(repository.get_equity(&user).unwrap(), Some(dec!(100_000)));
        assert_eq!(
            repository.get_peak_equity(&user).unwrap(),
            Some(dec!(105_000))
        );
        assert_eq!(
            repository.get_day_start_equity(&user).unwrap(),
            Some(dec!(98_000))
        );
        assert_eq!(repository.users().unwrap(), vec![user]);
    }
}
