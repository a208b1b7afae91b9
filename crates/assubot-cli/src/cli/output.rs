use anyhow::{Context, Result};
use assubot_core::CoreEvent;
use serde::Serialize;
use serde_json::{json, Value};

/// Print a value as JSON on stdout
pub fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

/// JSON line for a core event, as printed by `watch`
pub fn event_json(event: &CoreEvent) -> Value {
    match event {
        CoreEvent::ContractProcessed(notice) => json!({
            "event": event.name(),
            "payload": notice,
        }),
        CoreEvent::CreditBalanceChanged { balance } => json!({
            "event": event.name(),
            "payload": {"balance": balance},
        }),
        CoreEvent::ConnectionChanged(status) => json!({
            "event": event.name(),
            "payload": {"status": status},
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assubot_core::events::ContractProcessedNotice;
    use assubot_core::realtime::{ConnectionStatus, ProcessedStatus};

    #[test]
    fn test_event_json_shapes() {
        let notice = CoreEvent::ContractProcessed(ContractProcessedNotice {
            contract_id: "c42".to_string(),
            status: ProcessedStatus::Error,
            credits: None,
            error: Some("quota exceeded".to_string()),
        });
        assert_eq!(
            event_json(&notice),
            json!({
                "event": "contract_processed",
                "payload": {"contractId": "c42", "status": "error", "credits": null, "error": "quota exceeded"}
            })
        );

        let status = CoreEvent::ConnectionChanged(ConnectionStatus::Connected);
        assert_eq!(event_json(&status)["payload"]["status"], "connected");
    }
}
