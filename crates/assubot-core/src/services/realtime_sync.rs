//! Applies push events to the local state.
//!
//! Every handler runs synchronously on the socket listener task: it updates
//! the store first, then the cache, then tells front-ends through the local
//! broadcast.

use crate::cache::Tag;
use crate::cache::TagKind;
use crate::events::{ContractProcessedNotice, CoreEvent, LocalBroadcast};
use crate::models::SummarizeStatus;
use crate::realtime::{
    ContractProcessed, CreditOperation, CreditUpdate, EventBus, EventKind, ProcessedStatus,
    RealtimeEvent, Subscription,
};
use crate::store::{ProcessingRegistry, SharedStore};

use super::contracts::ContractsService;

/// Everything the dispatcher writes to
#[derive(Clone)]
pub struct SyncContext {
    pub store: SharedStore,
    pub processing: ProcessingRegistry,
    pub contracts: ContractsService,
    pub broadcast: LocalBroadcast,
}

/// Live registrations of the dispatcher on a realtime bus; dropping it
/// detaches every handler.
pub struct RealtimeSync {
    _subscriptions: Vec<Subscription>,
}

impl RealtimeSync {
    pub fn install(bus: &EventBus, ctx: SyncContext) -> Self {
        let kinds = [
            EventKind::ContractProcessed,
            EventKind::CreditUpdate,
            EventKind::ConnectionChanged,
        ];
        let subscriptions = kinds
            .into_iter()
            .map(|kind| {
                let ctx = ctx.clone();
                bus.subscribe(kind, move |event| dispatch(&ctx, event))
            })
            .collect();
        Self {
            _subscriptions: subscriptions,
        }
    }
}

pub(crate) fn dispatch(ctx: &SyncContext, event: &RealtimeEvent) {
    match event {
        RealtimeEvent::ContractProcessed(processed) => on_contract_processed(ctx, processed),
        RealtimeEvent::CreditUpdate(update) => on_credit_update(ctx, update),
        RealtimeEvent::ConnectionChanged(status) => {
            ctx.broadcast.send(CoreEvent::ConnectionChanged(*status));
        }
        RealtimeEvent::ServerError(_) => {}
    }
}

fn on_contract_processed(ctx: &SyncContext, event: &ContractProcessed) {
    let id = event.contract_id.as_str();

    let balance_changed = {
        let mut store = ctx.store.write();
        match event.status {
            ProcessedStatus::Success => {
                ctx.processing.mark_completed(id);
                store.notifications.success("Contract summary is ready");
                event
                    .credits
                    .filter(|&credits| store.session.set_credit_balance(credits))
            }
            ProcessedStatus::Error => {
                ctx.processing.mark_failed(id);
                let reason = event.error.as_deref().unwrap_or("unknown error");
                store
                    .notifications
                    .error(format!("Contract summary failed: {}", reason));
                None
            }
        }
    };

    match event.status {
        ProcessedStatus::Success => tracing::info!(contract_id = id, "Contract summary completed"),
        ProcessedStatus::Error => {
            tracing::error!(contract_id = id, error = ?event.error, "Contract summary failed")
        }
    }

    let outcome = match event.status {
        ProcessedStatus::Success => SummarizeStatus::Success,
        ProcessedStatus::Error => SummarizeStatus::Failed,
    };
    ctx.contracts.apply_summarize_outcome(id, outcome);

    if let Some(balance) = balance_changed {
        ctx.broadcast.send(CoreEvent::CreditBalanceChanged { balance });
    }
    ctx.broadcast
        .send(CoreEvent::ContractProcessed(ContractProcessedNotice {
            contract_id: event.contract_id.clone(),
            status: event.status,
            credits: event.credits,
            error: event.error.clone(),
        }));
}

fn on_credit_update(ctx: &SyncContext, update: &CreditUpdate) {
    let applied = {
        let mut store = ctx.store.write();
        if !store.session.apply_credit_update(update) {
            return;
        }
        match update.operation {
            CreditOperation::Purchased => {
                store
                    .notifications
                    .success(format!("{} credits added to your balance", update.amount));
            }
            CreditOperation::Refunded => {
                store
                    .notifications
                    .info(format!("{} credits refunded", update.amount));
            }
            CreditOperation::Consumed => {}
        }
        update.new_balance
    };

    tracing::info!(balance = applied, operation = ?update.operation, "Credit balance updated");
    ctx.contracts
        .cache()
        .invalidate_tags(&[Tag::list(TagKind::Dashboard)]);
    ctx.broadcast
        .send(CoreEvent::CreditBalanceChanged { balance: applied });
}
