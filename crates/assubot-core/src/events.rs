use serde::Serialize;
use tokio::sync::broadcast;

use crate::constants::BROADCAST_CAPACITY;
use crate::realtime::{ConnectionStatus, ProcessedStatus};

/// Name of the in-process broadcast fired when a summary job finishes
pub const CONTRACT_PROCESSED: &str = "contract_processed";

/// Payload of the `contract_processed` broadcast
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractProcessedNotice {
    pub contract_id: String,
    pub status: ProcessedStatus,
    pub credits: Option<u64>,
    pub error: Option<String>,
}

/// Notifications for front-ends, fanned out after the store has been updated
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    ContractProcessed(ContractProcessedNotice),
    CreditBalanceChanged { balance: u64 },
    ConnectionChanged(ConnectionStatus),
}

impl CoreEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CoreEvent::ContractProcessed(_) => CONTRACT_PROCESSED,
            CoreEvent::CreditBalanceChanged { .. } => "credit_balance_changed",
            CoreEvent::ConnectionChanged(_) => "connection_changed",
        }
    }
}

/// In-process broadcast of [`CoreEvent`]s. Slow receivers lag instead of
/// blocking the sender.
#[derive(Clone)]
pub struct LocalBroadcast {
    tx: broadcast::Sender<CoreEvent>,
}

impl LocalBroadcast {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.tx.subscribe()
    }

    /// Returns how many receivers got the event
    pub fn send(&self, event: CoreEvent) -> usize {
        let name = event.name();
        match self.tx.send(event) {
            Ok(count) => count,
            Err(_) => {
                tracing::trace!(event = name, "no local listeners");
                0
            }
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LocalBroadcast {
    fn default() -> Self {
        Self::new()
    }
}
