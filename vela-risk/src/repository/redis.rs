use crate::{
    RiskError, UserId,
    alert::{AlertId, RiskAlert},
    repository::{PositionSnapshot, RiskRepository},
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use redis::{Commands, Connection};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::{str::FromStr, time::Duration};
use vela_instrument::Symbol;

/// Configuration for constructing a [`RedisRepository`] via the new() constructor method.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub uri: String,
    pub prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            uri: String::from("redis://localhost:6379/0"),
            prefix: String::from("risk:"),
        }
    }
}

/// Redis persisted [`RiskRepository`].
///
/// Key layout under the configured prefix:
/// - `users` - set of known user ids
/// - `positions:{user}` - JSON map of [`PositionSnapshot`]s
/// - `equity:{user}` / `peak_equity:{user}` / `day_start_equity:{user}` - scalars
/// - `alerts:{user}:{alert_id}` - JSON alert with TTL
/// - `alerts:list:{user}` - sorted set of alert ids, score = unix timestamp
/// - `rl:{user}:{minute}` / `rl:{user}:{symbol}:{minute}` - counters with 60s expiry
pub struct RedisRepository {
    conn: Mutex<Connection>,
    prefix: String,
}

impl std::fmt::Debug for RedisRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRepository")
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl RedisRepository {
    /// Construct a [`RedisRepository`] by connecting to the configured server.
    pub fn new(config: Config) -> Result<Self, RiskError> {
        let client = redis::Client::open(config.uri.as_str())
            .map_err(|error| RiskError::ConfigError(error.to_string()))?;
        let conn = client.get_connection()?;

        Ok(Self {
            conn: Mutex::new(conn),
            prefix: config.prefix,
        })
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}{}", self.prefix, suffix)
    }

    fn get_decimal(&self, key: String) -> Result<Option<Decimal>, RiskError> {
        let value: Option<String> = self.conn.lock().get(key)?;
        value
            .map(|value| {
                Decimal::from_str(&value).map_err(|error| RiskError::Repository(error.to_string()))
            })
            .transpose()
    }

    fn set_decimal(&self, key: String, value: Decimal) -> Result<(), RiskError> {
        let _: () = self.conn.lock().set(key, value.to_string())?;
        Ok(())
    }
}

impl RiskRepository for RedisRepository {
    fn register_user(&self, user: &UserId) -> Result<(), RiskError> {
        let _: () = self.conn.lock().sadd(self.key("users"), user.to_string())?;
        Ok(())
    }

    fn users(&self) -> Result<Vec<UserId>, RiskError> {
        let users: Vec<String> = self.conn.lock().smembers(self.key("users"))?;
        Ok(users.into_iter().map(UserId::new).collect())
    }

    fn get_positions(
        &self,
        user: &UserId,
    ) -> Result<FnvHashMap<Symbol, PositionSnapshot>, RiskError> {
        let value: Option<String> = self
            .conn
            .lock()
            .get(self.key(&format!("positions:{user}")))?;

        match value {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(FnvHashMap::default()),
        }
    }

    fn set_positions(
        &self,
        user: &UserId,
        positions: &FnvHashMap<Symbol, PositionSnapshot>,
    ) -> Result<(), RiskError> {
        self.register_user(user)?;
        let json = serde_json::to_string(positions)?;
        let _: () = self
            .conn
            .lock()
            .set(self.key(&format!("positions:{user}")), json)?;
        Ok(())
    }

    fn get_equity(&self, user: &UserId) -> Result<Option<Decimal>, RiskError> {
        self.get_decimal(self.key(&format!("equity:{user}")))
    }

    fn set_equity(&self, user: &UserId, equity: Decimal) -> Result<(), RiskError> {
        self.register_user(user)?;
        self.set_decimal(self.key(&format!("equity:{user}")), equity)
    }

    fn get_peak_equity(&self, user: &UserId) -> Result<Option<Decimal>, RiskError> {
        self.get_decimal(self.key(&format!("peak_equity:{user}")))
    }

    fn set_peak_equity(&self, user: &UserId, equity: Decimal) -> Result<(), RiskError> {
        self.set_decimal(self.key(&format!("peak_equity:{user}")), equity)
    }

    fn get_day_start_equity(&self, user: &UserId) -> Result<Option<Decimal>, RiskError> {
        self.get_decimal(self.key(&format!("day_start_equity:{user}")))
    }

    fn set_day_start_equity(&self, user: &UserId, equity: Decimal) -> Result<(), RiskError> {
        self.set_decimal(self.key(&format!("day_start_equity:{user}")), equity)
    }

    fn record_order(
        &self,
        user: &UserId,
        symbol: &Symbol,
        time: DateTime<Utc>,
    ) -> Result<(), RiskError> {
        let minute = time.timestamp() / 60;
        let global_key = self.key(&format!("rl:{user}:{minute}"));
        let symbol_key = self.key(&format!("rl:{user}:{symbol}:{minute}"));

        let mut conn = self.conn.lock();
        let _: u32 = conn.incr(&global_key, 1u32)?;
        let _: () = conn.expire(&global_key, 60)?;
        let _: u32 = conn.incr(&symbol_key, 1u32)?;
        let _: () = conn.expire(&symbol_key, 60)?;
        Ok(())
    }

    fn order_counts(
        &self,
        user: &UserId,
        symbol: &Symbol,
        time: DateTime<Utc>,
    ) -> Result<(u32, u32), RiskError> {
        let minute = time.timestamp() / 60;
        let mut conn = self.conn.lock();
        let global: Option<u32> = conn.get(self.key(&format!("rl:{user}:{minute}")))?;
        let per_symbol: Option<u32> = conn.get(self.key(&format!("rl:{user}:{symbol}:{minute}")))?;
        Ok((global.unwrap_or(0), per_symbol.unwrap_or(0)))
    }

    fn push_alert(&self, alert: &RiskAlert, ttl: Duration) -> Result<(), RiskError> {
        self.register_user(&alert.user)?;

        let json = serde_json::to_string(alert)?;
        let alert_key = self.key(&format!("alerts:{}:{}", alert.user, alert.id));
        let index_key = self.key(&format!("alerts:list:{}", alert.user));
        let ttl_secs = ttl.as_secs();

        let mut conn = self.conn.lock();
        let _: () = conn.set_ex(alert_key, json.clone(), ttl_secs)?;
        let _: () = conn.zadd(&index_key, alert.id.to_string(), alert.time.timestamp())?;
        let _: () = conn.expire(&index_key, ttl_secs as i64)?;
        // fan out on the per-user channel for streaming consumers
        let _: () = conn.publish(self.key(&format!("alerts:{}", alert.user)), json)?;
        Ok(())
    }

    fn update_alert(&self, alert: &RiskAlert, ttl: Duration) -> Result<(), RiskError> {
        let json = serde_json::to_string(alert)?;
        let alert_key = self.key(&format!("alerts:{}:{}", alert.user, alert.id));
        let _: () = self
            .conn
            .lock()
            .set_ex(alert_key, json, ttl.as_secs())?;
        Ok(())
    }

    fn get_alert(&self, user: &UserId, id: &AlertId) -> Result<Option<RiskAlert>, RiskError> {
        let value: Option<String> = self
            .conn
            .lock()
            .get(self.key(&format!("alerts:{user}:{id}")))?;

        value
            .map(|json| serde_json::from_str(&json).map_err(RiskError::from))
            .transpose()
    }

    fn alert_page(
        &self,
        user: &UserId,
        page: usize,
        page_size: usize,
    ) -> Result<(usize, Vec<RiskAlert>), RiskError> {
        let index_key = self.key(&format!("alerts:list:{user}"));

        let (total, ids): (usize, Vec<String>) = {
            let mut conn = self.conn.lock();
            let total: usize = conn.zcard(&index_key)?;
            let start = (page.saturating_sub(1) * page_size) as isize;
            let stop = start + page_size as isize - 1;
            let ids: Vec<String> = conn.zrevrange(&index_key, start, stop)?;
            (total, ids)
        };

        let mut alerts = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(alert) = self.get_alert(user, &AlertId(smol_str::SmolStr::new(id)))? {
                alerts.push(alert);
            }
        }

        Ok((total, alerts))
    }
}
