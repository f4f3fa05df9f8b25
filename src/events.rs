use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the command pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    SaleCompleted(Uuid),
    SaleVoided(Uuid),
    StockMovementRecorded {
        movement_id: Uuid,
        product_id: Uuid,
        store_id: Uuid,
        movement_type: String,
        quantity: i32,
        new_stock: i32,
    },
    StockTransferred {
        product_id: Uuid,
        from_store_id: Uuid,
        to_store_id: Uuid,
        quantity: i32,
    },
    ReturnProcessed(Uuid),
    LowStock {
        product_id: Uuid,
        store_id: Uuid,
        stock: i32,
        threshold: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Consumes events from the channel and logs them.
///
/// Runs as a detached task for the lifetime of the process; downstream
/// consumers (alerting, sync) hang off this loop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::SaleCompleted(id) => info!(sale_id = %id, "Sale completed"),
            Event::SaleVoided(id) => info!(sale_id = %id, "Sale voided"),
            Event::StockMovementRecorded {
                movement_id,
                product_id,
                store_id,
                movement_type,
                quantity,
                new_stock,
            } => info!(
                movement_id = %movement_id,
                product_id = %product_id,
                store_id = %store_id,
                movement_type = %movement_type,
                quantity = %quantity,
                new_stock = %new_stock,
                "Stock movement recorded"
            ),
            Event::StockTransferred {
                product_id,
                from_store_id,
                to_store_id,
                quantity,
            } => info!(
                product_id = %product_id,
                from_store_id = %from_store_id,
                to_store_id = %to_store_id,
                quantity = %quantity,
                "Stock transferred"
            ),
            Event::ReturnProcessed(id) => info!(return_id = %id, "Return processed"),
            Event::LowStock {
                product_id,
                store_id,
                stock,
                threshold,
            } => warn!(
                product_id = %product_id,
                store_id = %store_id,
                stock = %stock,
                threshold = %threshold,
                "Stock at or below reorder threshold"
            ),
        }
    }
}
