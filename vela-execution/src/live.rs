use crate::{
    ExecutionError,
    client::{ExchangeClient, VenueOrder, VenueOrderRequest},
    order::Order,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

/// Retry policy for venue requests.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 250,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryConfig {
    /// Jittered exponential backoff delay before the provided attempt (1-indexed).
    fn delay(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(16))
            .min(self.max_delay_ms);
        let jitter = rand::rng().random_range(0..=exponential / 2);
        Duration::from_millis(exponential + jitter)
    }
}

/// Live execution handler delegating to an [`ExchangeClient`].
///
/// Submissions carry the order's idempotent [`ClientOrderId`](crate::order::ClientOrderId),
/// so a retry after a network failure cannot double-execute. Retryable errors back off
/// exponentially with jitter; non-retryable venue rejections surface immediately.
#[derive(Debug)]
pub struct LiveExecution<Client> {
    client: Arc<Client>,
    retry: RetryConfig,
}

impl<Client> Clone for LiveExecution<Client> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            retry: self.retry,
        }
    }
}

impl<Client> LiveExecution<Client>
where
    Client: ExchangeClient,
{
    pub fn new(client: Arc<Client>, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    /// Submit the provided [`Order`] to the venue, driving `Pending -> Submitted` and
    /// applying any immediately reported fill.
    pub async fn open_order(&self, order: &mut Order) -> Result<VenueOrder, ExecutionError> {
        let request = VenueOrderRequest::new(
            order.cid.clone(),
            order.symbol.clone(),
            order.side,
            order.kind,
            order.quantity,
            order.price,
            order.time_in_force,
        );

        order.submit()?;

        let venue_order = match self.submit_with_retry(&request).await {
            Ok(venue_order) => venue_order,
            Err(error @ ExecutionError::Rejected(_)) => {
                order.reject()?;
                return Err(error);
            }
            // retry budget exhausted: order state is unknown until reconciled
            Err(error) => return Err(error),
        };

        if venue_order.filled_quantity > rust_decimal::Decimal::ZERO {
            order.apply_fill(venue_order.filled_quantity, venue_order.average_fill_price)?;
        }

        info!(
            order = %order.id,
            cid = %order.cid,
            venue_order = %venue_order.id,
            status = %order.status,
            "opened order on venue"
        );

        Ok(venue_order)
    }

    /// Cancel the provided order on the venue. Duplicate cancels are no-ops.
    pub async fn cancel_order(
        &self,
        order: &mut Order,
        venue_order_id: &crate::order::OrderId,
    ) -> Result<(), ExecutionError> {
        if !order.begin_cancel() {
            return Ok(());
        }

        self.client
            .cancel_order(venue_order_id, &order.symbol)
            .await?;
        order.complete_cancel()
    }

    /// Resolve an order whose submission timed out by querying the venue.
    pub async fn reconcile(
        &self,
        order: &mut Order,
        venue_order_id: &crate::order::OrderId,
    ) -> Result<VenueOrder, ExecutionError> {
        let venue_order = self.client.fetch_order(venue_order_id, &order.symbol).await?;

        let outstanding = venue_order.filled_quantity - order.filled_quantity;
        if outstanding > rust_decimal::Decimal::ZERO {
            order.apply_fill(outstanding, venue_order.average_fill_price)?;
        }

        Ok(venue_order)
    }

    async fn submit_with_retry(
        &self,
        request: &VenueOrderRequest,
    ) -> Result<VenueOrder, ExecutionError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.client.create_order(request).await {
                Ok(venue_order) => return Ok(venue_order),
                Err(error) if error.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        cid = %request.cid,
                        attempt,
                        ?delay,
                        %error,
                        "venue submission failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) if error.is_retryable() => {
                    return Err(ExecutionError::Timeout { attempts: attempt });
                }
                Err(error) => return Err(error),
            }
        }
    }
}
