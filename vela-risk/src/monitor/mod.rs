use crate::{RiskLevel, UserId, alert::AlertType};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Periodic PnL scan loop, including the emergency-stop trigger.
pub mod pnl;

/// Periodic position scan loop.
pub mod position;

/// Remote command consumed by a monitor loop.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MonitorCommand {
    Terminate(String),
}

/// Suppresses duplicate alerts of identical `(user, type, level)` within a cooldown
/// window.
#[derive(Debug)]
pub struct AlertDeduper {
    cooldown: Duration,
    last_emitted: Mutex<FnvHashMap<(UserId, AlertType, RiskLevel), Instant>>,
}

impl AlertDeduper {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_emitted: Mutex::new(FnvHashMap::default()),
        }
    }

    /// Returns `true` if this `(user, type, level)` has not fired within the cooldown,
    /// recording the emission.
    pub fn should_emit(&self, user: &UserId, alert_type: AlertType, level: RiskLevel) -> bool {
        let mut last_emitted = self.last_emitted.lock();
        let key = (user.clone(), alert_type, level);
        let now = Instant::now();

        match last_emitted.get(&key) {
            Some(last) if now.duration_since(*last) < self.cooldown => false,
            _ => {
                last_emitted.insert(key, now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deduper_suppresses_within_cooldown() {
        let deduper = AlertDeduper::new(Duration::from_secs(60));
        let user = UserId::new("user_1");

        assert!(deduper.should_emit(&user, AlertType::PositionLimit, RiskLevel::High));
        assert!(!deduper.should_emit(&user, AlertType::PositionLimit, RiskLevel::High));

        // different severity of the same metric is tracked separately
        assert!(deduper.should_emit(&user, AlertType::PositionLimit, RiskLevel::Critical));

        // different user is tracked separately
        let other = UserId::new("user_2");
        assert!(deduper.should_emit(&other, AlertType::PositionLimit, RiskLevel::High));
    }

    #[test]
    fn test_deduper_allows_after_cooldown() {
        let deduper = AlertDeduper::new(Duration::from_millis(0));
        let user = UserId::new("user_1");

        assert!(deduper.should_emit(&user, AlertType::DrawdownLimit, RiskLevel::High));
        assert!(deduper.should_emit(&user, AlertType::DrawdownLimit, RiskLevel::High));
    }
}
