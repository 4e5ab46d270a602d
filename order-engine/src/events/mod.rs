//! Lifecycle event delivery.
//!
//! Every applied transition produces one [`OrderEvent`]. The engine hands it
//! to an injected [`EventPublisher`]; the [`EventBus`] here is the in-process
//! one, fanning events out to any number of subscribers.

use log::{info, warn};
use oms::{EventPublisher, OrderEvent};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// A broadcast channel of order events.
///
/// Slow subscribers skip the oldest events (`Lagged`) rather than blocking
/// the engine.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<OrderEvent>,
}

impl EventBus {
    /// See [`tokio::sync::broadcast::channel`].
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: OrderEvent) -> anyhow::Result<()> {
        // No subscriber is not a delivery failure.
        let _ = self.sender.send(event);
        Ok(())
    }
}

/// Logs every event seen on `receiver` until the bus is dropped.
pub fn spawn_event_logger(mut receiver: broadcast::Receiver<OrderEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => info!(
                    "[event] {} order={} client_order_id={} version={}",
                    event.name(),
                    event.order_id,
                    event.client_order_id,
                    event.version
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("[event] logger lagged, skipped {} events", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
