use crate::{RiskError, RiskLevel, UserId, repository::RiskRepository};
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};
use uuid::Uuid;

/// Alert retention period.
pub const DEFAULT_ALERT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Deadline for a webhook delivery attempt.
pub const WEBHOOK_DEADLINE: Duration = Duration::from_secs(5);

/// Unique identifier for a [`RiskAlert`].
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
pub struct AlertId(pub SmolStr);

impl AlertId {
    pub fn random() -> Self {
        Self(SmolStr::new(Uuid::new_v4().to_string()))
    }
}

/// Category of a [`RiskAlert`].
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    PositionLimit,
    OrderSizeLimit,
    DailyLossLimit,
    DrawdownLimit,
    ConsecutiveLosses,
    LeverageLimit,
    OrderFrequency,
    EmergencyStop,
}

/// Risk alert persisted per user and fanned out to the notification sink.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RiskAlert {
    pub id: AlertId,
    pub user: UserId,
    pub alert_type: AlertType,
    pub level: RiskLevel,
    pub message: String,
    pub details: serde_json::Map<String, serde_json::Value>,
    pub time: DateTime<Utc>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl RiskAlert {
    pub fn new(
        user: UserId,
        alert_type: AlertType,
        level: RiskLevel,
        message: String,
        details: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: AlertId::random(),
            user,
            alert_type,
            level,
            message,
            details,
            time: Utc::now(),
            acknowledged: false,
            acknowledged_at: None,
        }
    }
}

/// One page of a user's alert log, newest first.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AlertPage {
    pub alerts: Vec<RiskAlert>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

/// Pushes alerts to a configured webhook sink with a bounded deadline.
///
/// Delivery is best-effort: failures are logged and never surfaced to the caller.
#[derive(Debug, Clone)]
pub struct WebhookPublisher {
    client: reqwest::Client,
    url: String,
}

impl WebhookPublisher {
    pub fn new(url: String) -> Result<Self, RiskError> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_DEADLINE)
            .build()
            .map_err(|error| RiskError::ConfigError(error.to_string()))?;

        Ok(Self { client, url })
    }

    pub async fn publish(&self, alert: &RiskAlert) {
        let result = self
            .client
            .post(&self.url)
            .json(alert)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        match result {
            Ok(_) => info!(alert = %alert.id, "webhook notification sent"),
            Err(error) => error!(alert = %alert.id, %error, "webhook notification failed"),
        }
    }
}

/// Append-indexed per-user alert log over a [`RiskRepository`], with out-of-band webhook
/// fan-out on creation.
#[derive(Debug)]
pub struct AlertStore<Repository> {
    repository: Arc<Repository>,
    publisher: Option<Arc<WebhookPublisher>>,
    ttl: Duration,
}

impl<Repository> AlertStore<Repository>
where
    Repository: RiskRepository,
{
    pub fn new(repository: Arc<Repository>) -> Self {
        Self {
            repository,
            publisher: None,
            ttl: DEFAULT_ALERT_TTL,
        }
    }

    /// Attach a webhook publisher. Creation then requires a Tokio runtime, since delivery
    /// is spawned out-of-band.
    pub fn with_publisher(mut self, publisher: WebhookPublisher) -> Self {
        self.publisher = Some(Arc::new(publisher));
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Persist a new alert and fan it out to the notification sink without blocking the
    /// caller.
    pub fn create(
        &self,
        user: UserId,
        alert_type: AlertType,
        level: RiskLevel,
        message: String,
        details: serde_json::Map<String, serde_json::Value>,
    ) -> Result<RiskAlert, RiskError> {
        let alert = RiskAlert::new(user, alert_type, level, message, details);
        self.repository.push_alert(&alert, self.ttl)?;

        info!(
            alert = %alert.id,
            user = %alert.user,
            alert_type = %alert.alert_type,
            level = %alert.level,
            "alert created"
        );

        if let Some(publisher) = &self.publisher {
            let publisher = Arc::clone(publisher);
            let published = alert.clone();
            tokio::spawn(async move { publisher.publish(&published).await });
        }

        Ok(alert)
    }

    pub fn get(&self, user: &UserId, id: &AlertId) -> Result<Option<RiskAlert>, RiskError> {
        self.repository.get_alert(user, id)
    }

    /// Page through a user's alerts, newest first, optionally filtered by acknowledgment
    /// state.
    pub fn list(
        &self,
        user: &UserId,
        page: usize,
        page_size: usize,
        acknowledged: Option<bool>,
    ) -> Result<AlertPage, RiskError> {
        let page = page.max(1);
        let (total, alerts) = self.repository.alert_page(user, page, page_size)?;

        let alerts = match acknowledged {
            Some(acknowledged) => alerts
                .into_iter()
                .filter(|alert| alert.acknowledged == acknowledged)
                .collect(),
            None => alerts,
        };

        Ok(AlertPage {
            alerts,
            total,
            page,
            page_size,
        })
    }

    /// Acknowledge an alert. Returns `false` when the alert does not exist; acknowledging
    /// twice is a no-op.
    pub fn acknowledge(&self, user: &UserId, id: &AlertId) -> Result<bool, RiskError> {
        let Some(mut alert) = self.repository.get_alert(user, id)? else {
            return Ok(false);
        };

        if !alert.acknowledged {
            alert.acknowledged = true;
            alert.acknowledged_at = Some(Utc::now());
            self.repository.update_alert(&alert, self.ttl)?;
        }

        Ok(true)
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }
}
