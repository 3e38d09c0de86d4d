use fnv::FnvHashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use vela_execution::{
    client::{ExchangeClient, VenueOrder},
    live::LiveExecution,
    order::{Order, OrderId},
};
use vela_risk::UserId;

/// An order tracked by the control plane, with its venue-side counterpart once known.
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub user: UserId,
    pub order: Order,
    pub venue_order: Option<VenueOrder>,
}

/// Shared registry of every order the control plane has accepted.
#[derive(Debug, Default)]
pub struct OrderStore {
    orders: FnvHashMap<OrderId, OrderRecord>,
}

impl OrderStore {
    pub fn insert(&mut self, record: OrderRecord) {
        self.orders.insert(record.order.id.clone(), record);
    }

    pub fn get(&self, id: &OrderId) -> Option<&OrderRecord> {
        self.orders.get(id)
    }

    pub fn get_mut(&mut self, id: &OrderId) -> Option<&mut OrderRecord> {
        self.orders.get_mut(id)
    }

    /// Look an order up by its venue-facing client order id.
    pub fn find_by_cid(
        &self,
        cid: &vela_execution::order::ClientOrderId,
    ) -> Option<&OrderRecord> {
        self.orders.values().find(|record| &record.order.cid == cid)
    }

    /// Non-terminal orders belonging to `user`.
    pub fn open_for_user(&self, user: &UserId) -> Vec<OrderRecord> {
        self.orders
            .values()
            .filter(|record| &record.user == user && !record.order.is_terminal())
            .cloned()
            .collect()
    }
}

/// Request consumed by an [`ExecutionWorker`].
#[derive(Debug)]
pub enum ExecutionRequest {
    Open(OrderId),
    Cancel(OrderId),
}

/// Per-exchange submission worker.
///
/// A single consumer per venue serialises outgoing requests, respecting venue rate
/// limits and guaranteeing FIFO processing of each (strategy, symbol) order stream.
pub struct ExecutionWorker<Client> {
    execution: LiveExecution<Client>,
    orders: Arc<Mutex<OrderStore>>,
    request_rx: mpsc::Receiver<ExecutionRequest>,
}

impl<Client> ExecutionWorker<Client>
where
    Client: ExchangeClient,
{
    pub fn new(
        execution: LiveExecution<Client>,
        orders: Arc<Mutex<OrderStore>>,
        request_rx: mpsc::Receiver<ExecutionRequest>,
    ) -> Self {
        Self {
            execution,
            orders,
            request_rx,
        }
    }

    /// Drain requests until every transmitter is dropped.
    pub async fn run(mut self) {
        info!(
            exchange = %self.execution.client().exchange(),
            "execution worker started"
        );

        while let Some(request) = self.request_rx.recv().await {
            match request {
                ExecutionRequest::Open(id) => self.open(&id).await,
                ExecutionRequest::Cancel(id) => self.cancel(&id).await,
            }
        }

        info!(
            exchange = %self.execution.client().exchange(),
            "execution worker stopped"
        );
    }

    async fn open(&mut self, id: &OrderId) {
        let Some(mut order) = self
            .orders
            .lock()
            .get(id)
            .map(|record| record.order.clone())
        else {
            warn!(order = %id, "open request for unknown order");
            return;
        };

        match self.execution.open_order(&mut order).await {
            Ok(venue_order) => {
                let mut orders = self.orders.lock();
                if let Some(record) = orders.get_mut(id) {
                    record.order = order;
                    record.venue_order = Some(venue_order);
                }
            }
            Err(error) => {
                error!(order = %id, %error, "venue submission failed");
                let mut orders = self.orders.lock();
                if let Some(record) = orders.get_mut(id) {
                    // order carries the terminal/unknown status set by the executor
                    record.order = order;
                }
            }
        }
    }

    async fn cancel(&mut self, id: &OrderId) {
        let record = self.orders.lock().get(id).cloned();
        let Some(record) = record else {
            warn!(order = %id, "cancel request for unknown order");
            return;
        };

        let Some(venue_order) = record.venue_order else {
            warn!(order = %id, "cancel before venue ack, dropping");
            return;
        };

        let mut order = record.order;
        if let Err(error) = self.execution.cancel_order(&mut order, &venue_order.id).await {
            error!(order = %id, %error, "venue cancellation failed");
        }

        if let Some(record) = self.orders.lock().get_mut(id) {
            record.order = order;
        }
    }
}
