use crate::live::worker::{OrderRecord, OrderStore};
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{error, info, warn};
use vela_execution::{
    algo::{ChildRequest, iceberg::Iceberg, twap::Twap},
    client::ExchangeClient,
    live::LiveExecution,
    order::{Order, OrderId, OrderStatus},
};
use vela_risk::UserId;

/// How often a resting iceberg child is reconciled against the venue.
const ICEBERG_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Drive a TWAP schedule to completion over the live execution path.
///
/// Sleeps until each slice is due, submits the child market order, and rolls fills up
/// into the parent record. A cancelled parent stops the schedule at the next wakeup.
pub async fn run_twap<Client>(
    execution: LiveExecution<Client>,
    orders: Arc<Mutex<OrderStore>>,
    user: UserId,
    parent_id: OrderId,
    mut twap: Twap,
) where
    Client: ExchangeClient,
{
    info!(parent = %parent_id, "live TWAP schedule started");

    while let Some(due) = twap.next_fire_time() {
        let now = Utc::now();
        if due > now
            && let Ok(wait) = (due - now).to_std()
        {
            sleep(wait).await;
        }

        if parent_cancelled(&orders, &parent_id) {
            twap.cancel();
            break;
        }

        for child in twap.on_tick(Utc::now()) {
            match submit_child(&execution, &orders, &user, &parent_id, child).await {
                Ok(Some((quantity, price))) => {
                    twap.record_fill(quantity);
                    roll_up(&orders, &parent_id, quantity, price);
                }
                Ok(None) => {}
                Err(error) => {
                    error!(parent = %parent_id, %error, "TWAP child submission failed");
                }
            }
        }
    }

    complete_parent_cancel(&orders, &parent_id);
    info!(
        parent = %parent_id,
        progress = twap.progress(),
        "live TWAP schedule finished"
    );
}

/// Drive an iceberg to completion over the live execution path.
///
/// Keeps one visible child resting on the venue, polling its state and replenishing at
/// the same limit price as slices complete.
pub async fn run_iceberg<Client>(
    execution: LiveExecution<Client>,
    orders: Arc<Mutex<OrderStore>>,
    user: UserId,
    parent_id: OrderId,
    mut iceberg: Iceberg,
) where
    Client: ExchangeClient,
{
    info!(parent = %parent_id, "live iceberg started");

    while !iceberg.is_complete() && !iceberg.is_cancelled() {
        if parent_cancelled(&orders, &parent_id) {
            iceberg.cancel();
            break;
        }

        let Some(child) = iceberg.poll() else {
            // child resting: reconcile it against the venue and wait for progress
            match reconcile_resting_child(&execution, &orders, iceberg.active_child()).await {
                Some((quantity, price)) if quantity > Decimal::ZERO => {
                    if let Err(error) = iceberg.record_fill(quantity) {
                        warn!(parent = %parent_id, %error, "iceberg bookkeeping failed");
                        break;
                    }
                    roll_up(&orders, &parent_id, quantity, price);
                }
                _ => sleep(ICEBERG_POLL_INTERVAL).await,
            }
            continue;
        };

        match submit_child(&execution, &orders, &user, &parent_id, child).await {
            Ok(Some((quantity, price))) => {
                if let Err(error) = iceberg.record_fill(quantity) {
                    warn!(parent = %parent_id, %error, "iceberg bookkeeping failed");
                    break;
                }
                roll_up(&orders, &parent_id, quantity, price);
            }
            Ok(None) => sleep(ICEBERG_POLL_INTERVAL).await,
            Err(error) => {
                error!(parent = %parent_id, %error, "iceberg child submission failed");
                break;
            }
        }
    }

    complete_parent_cancel(&orders, &parent_id);
    info!(
        parent = %parent_id,
        remaining = %iceberg.remaining(),
        "live iceberg finished"
    );
}

/// Finalise a parent whose cancellation the runner has honoured.
fn complete_parent_cancel(orders: &Arc<Mutex<OrderStore>>, parent_id: &OrderId) {
    let mut orders = orders.lock();
    if let Some(record) = orders.get_mut(parent_id)
        && record.order.status == OrderStatus::Cancelling
        && let Err(error) = record.order.complete_cancel()
    {
        warn!(parent = %parent_id, %error, "parent cancel completion failed");
    }
}

/// Fetch venue progress on the resting child, returning any newly observed
/// `(quantity, price)` fill delta.
async fn reconcile_resting_child<Client>(
    execution: &LiveExecution<Client>,
    orders: &Arc<Mutex<OrderStore>>,
    active_cid: Option<&vela_execution::order::ClientOrderId>,
) -> Option<(Decimal, Decimal)>
where
    Client: ExchangeClient,
{
    let active_cid = active_cid?;

    let (mut order, venue_order) = {
        let orders = orders.lock();
        let record = orders.find_by_cid(active_cid)?;
        (record.order.clone(), record.venue_order.clone()?)
    };

    let already_filled = order.filled_quantity;

    match execution.reconcile(&mut order, &venue_order.id).await {
        Ok(_) => {
            let delta = order.filled_quantity - already_filled;
            let price = order.average_fill_price;

            let mut orders = orders.lock();
            if let Some(record) = orders.get_mut(&order.id) {
                record.order = order;
            }

            (delta > Decimal::ZERO).then_some((delta, price))
        }
        Err(error) => {
            warn!(cid = %active_cid, %error, "iceberg child reconciliation failed");
            None
        }
    }
}

fn parent_cancelled(orders: &Arc<Mutex<OrderStore>>, parent_id: &OrderId) -> bool {
    orders.lock().get(parent_id).is_some_and(|record| {
        matches!(
            record.order.status,
            OrderStatus::Cancelling | OrderStatus::Cancelled
        )
    })
}

/// Submit one child order, returning `(quantity, price)` of any immediately reported
/// fill.
async fn submit_child<Client>(
    execution: &LiveExecution<Client>,
    orders: &Arc<Mutex<OrderStore>>,
    user: &UserId,
    parent_id: &OrderId,
    child: ChildRequest,
) -> Result<Option<(Decimal, Decimal)>, vela_execution::ExecutionError>
where
    Client: ExchangeClient,
{
    let parent = orders
        .lock()
        .get(parent_id)
        .map(|record| record.order.clone())
        .ok_or_else(|| {
            vela_execution::ExecutionError::InvalidRequest(format!(
                "unknown algorithm parent {parent_id}"
            ))
        })?;

    let request = vela_execution::order::OrderRequest::new(
        parent.strategy.clone(),
        parent.exchange,
        child.symbol,
        child.side,
        child.kind,
        child.quantity,
        child.price,
        None,
        child.time_in_force,
    );

    let mut order = Order::open_child(request, parent_id.clone(), child.sequence, Utc::now())?;
    let venue_order = execution.open_order(&mut order).await?;

    let filled = (order.filled_quantity > Decimal::ZERO)
        .then(|| (order.filled_quantity, order.average_fill_price));

    orders.lock().insert(OrderRecord {
        user: user.clone(),
        order,
        venue_order: Some(venue_order),
    });

    Ok(filled)
}

fn roll_up(
    orders: &Arc<Mutex<OrderStore>>,
    parent_id: &OrderId,
    quantity: Decimal,
    price: Decimal,
) {
    let mut orders = orders.lock();
    if let Some(record) = orders.get_mut(parent_id)
        && let Err(error) = record.order.apply_fill(quantity, price)
    {
        warn!(parent = %parent_id, %error, "parent fill roll-up failed");
    }
}
