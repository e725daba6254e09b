use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// Domain events emitted by the transfer engine.
///
/// Events are only sent after the surrounding transaction commits; a rolled
/// back operation emits nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    TransferCreated {
        transfer_id: i64,
        reference_code: String,
    },
    TransferUpdated {
        transfer_id: i64,
    },
    TransferDeleted {
        transfer_id: i64,
    },
    StockMoved {
        warehouse_id: i64,
        product_id: i64,
        delta: Decimal,
        new_quantity: Decimal,
    },
    ProductCostRevalued {
        product_id: i64,
        old_cost: i64,
        new_cost: i64,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging a warning instead of failing the caller when
    /// the receiving side has gone away.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping domain event: {}", e);
        }
    }
}

/// Creates a bounded event channel with the given capacity.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}
