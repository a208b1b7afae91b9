use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::socket_events;

/// Outcome of a background summary job as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessedStatus {
    Success,
    Error,
}

/// Payload of `contract_summarized`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractProcessed {
    pub contract_id: String,
    pub status: ProcessedStatus,
    #[serde(default)]
    pub credits: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditOperation {
    Consumed,
    Purchased,
    Refunded,
}

/// Payload of `credit_updated`.
///
/// The channel is not scoped per user from the client's point of view;
/// consumers must compare `user_id` with the session before applying it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditUpdate {
    pub user_id: String,
    pub new_balance: u64,
    pub operation: CreditOperation,
    #[serde(default)]
    pub amount: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ContractProcessed,
    CreditUpdate,
    ConnectionChanged,
    ServerError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    ContractProcessed(ContractProcessed),
    CreditUpdate(CreditUpdate),
    ConnectionChanged(ConnectionStatus),
    ServerError(String),
}

impl RealtimeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RealtimeEvent::ContractProcessed(_) => EventKind::ContractProcessed,
            RealtimeEvent::CreditUpdate(_) => EventKind::CreditUpdate,
            RealtimeEvent::ConnectionChanged(_) => EventKind::ConnectionChanged,
            RealtimeEvent::ServerError(_) => EventKind::ServerError,
        }
    }

    /// Typed event for a Socket.IO event name, `Ok(None)` for names we do not handle
    pub fn from_wire(name: &str, data: Value) -> Result<Option<Self>, serde_json::Error> {
        match name {
            socket_events::CONTRACT_SUMMARIZED => {
                Ok(Some(RealtimeEvent::ContractProcessed(serde_json::from_value(data)?)))
            }
            socket_events::CREDIT_UPDATED => {
                Ok(Some(RealtimeEvent::CreditUpdate(serde_json::from_value(data)?)))
            }
            socket_events::ERROR => {
                let message = match data {
                    Value::String(s) => s,
                    Value::Object(obj) => obj
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string(),
                    other => other.to_string(),
                };
                Ok(Some(RealtimeEvent::ServerError(message)))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contract_processed_from_wire() {
        let event = RealtimeEvent::from_wire(
            "contract_summarized",
            json!({"contractId": "c42", "status": "success", "credits": 87}),
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            event,
            RealtimeEvent::ContractProcessed(ContractProcessed {
                contract_id: "c42".to_string(),
                status: ProcessedStatus::Success,
                credits: Some(87),
                error: None,
            })
        );
        assert_eq!(event.kind(), EventKind::ContractProcessed);
    }

    #[test]
    fn test_credit_update_from_wire() {
        let event = RealtimeEvent::from_wire(
            "credit_updated",
            json!({"userId": "u1", "newBalance": 40, "operation": "purchased", "amount": 30}),
        )
        .unwrap()
        .unwrap();
        match event {
            RealtimeEvent::CreditUpdate(update) => {
                assert_eq!(update.operation, CreditOperation::Purchased);
                assert_eq!(update.new_balance, 40);
            }
            other => panic!("Expected credit update, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_and_malformed() {
        assert_eq!(RealtimeEvent::from_wire("typing", json!({})).unwrap(), None);
        assert!(RealtimeEvent::from_wire("credit_updated", json!({"userId": 3})).is_err());
    }

    #[test]
    fn test_server_error_message() {
        assert_eq!(
            RealtimeEvent::from_wire("error", json!({"message": "rate limited"})).unwrap(),
            Some(RealtimeEvent::ServerError("rate limited".to_string()))
        );
    }
}
