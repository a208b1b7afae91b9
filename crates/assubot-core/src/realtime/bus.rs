use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::events::{EventKind, RealtimeEvent};

type Handler = Arc<dyn Fn(&RealtimeEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<(u64, Handler)>>,
}

impl Registry {
    fn remove(&mut self, kind: EventKind, id: u64) {
        if let Some(list) = self.handlers.get_mut(&kind) {
            list.retain(|(handler_id, _)| *handler_id != id);
            if list.is_empty() {
                self.handlers.remove(&kind);
            }
        }
    }
}

/// Publish/subscribe registry for realtime events.
///
/// Any number of handlers may listen to the same kind; each registration
/// is removed only through its own [`Subscription`].
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            id,
            kind,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `event` to every handler of its kind. Returns how many ran.
    pub fn publish(&self, event: &RealtimeEvent) -> usize {
        // Handlers run without the lock so they may subscribe or unsubscribe
        let handlers: Vec<Handler> = self
            .registry
            .lock()
            .handlers
            .get(&event.kind())
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.registry
            .lock()
            .handlers
            .get(&kind)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Handle of one registration; dropping it unregisters the handler
#[must_use = "dropping a Subscription immediately unregisters its handler"]
pub struct Subscription {
    id: u64,
    kind: EventKind,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().remove(self.kind, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::events::ConnectionStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&RealtimeEvent) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, move |_: &RealtimeEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_second_subscriber_does_not_replace_first() {
        let bus = EventBus::new();
        let (first, h1) = counter();
        let (second, h2) = counter();
        let _s1 = bus.subscribe(EventKind::ConnectionChanged, h1);
        let _s2 = bus.subscribe(EventKind::ConnectionChanged, h2);

        let delivered = bus.publish(&RealtimeEvent::ConnectionChanged(ConnectionStatus::Connected));
        assert_eq!(delivered, 2);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_handler() {
        let bus = EventBus::new();
        let (first, h1) = counter();
        let (second, h2) = counter();
        let s1 = bus.subscribe(EventKind::ServerError, h1);
        let _s2 = bus.subscribe(EventKind::ServerError, h2);

        s1.unsubscribe();
        bus.publish(&RealtimeEvent::ServerError("x".to_string()));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(bus.handler_count(EventKind::ServerError), 1);
    }

    #[test]
    fn test_kinds_are_isolated() {
        let bus = EventBus::new();
        let (count, handler) = counter();
        let _s = bus.subscribe(EventKind::CreditUpdate, handler);

        assert_eq!(bus.publish(&RealtimeEvent::ServerError("x".to_string())), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_may_unsubscribe_during_publish() {
        let bus = EventBus::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot_in_handler = slot.clone();
        let sub = bus.subscribe(EventKind::ServerError, move |_| {
            slot_in_handler.lock().take();
        });
        *slot.lock() = Some(sub);

        assert_eq!(bus.publish(&RealtimeEvent::ServerError("x".to_string())), 1);
        assert_eq!(bus.handler_count(EventKind::ServerError), 0);
    }
}
