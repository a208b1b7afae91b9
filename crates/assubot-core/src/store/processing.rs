//! Transient per-contract processing state.
//!
//! Entries live only in memory. Terminal states stay readable for a short
//! grace period so a front-end can render the outcome, then disappear.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessingStatus::Processing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingEntry {
    pub status: ProcessingStatus,
    pub start_time: Instant,
    /// Changes on every write; a prune only removes the revision it was scheduled for
    revision: u64,
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<String, ProcessingEntry>,
    next_revision: u64,
}

impl RegistryState {
    fn bump(&mut self) -> u64 {
        self.next_revision += 1;
        self.next_revision
    }
}

/// Map of contract id to processing state. Clones share the same map.
#[derive(Clone)]
pub struct ProcessingRegistry {
    state: Arc<Mutex<RegistryState>>,
    prune_delay: Duration,
}

impl ProcessingRegistry {
    pub fn new(prune_delay: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState::default())),
            prune_delay,
        }
    }

    pub fn prune_delay(&self) -> Duration {
        self.prune_delay
    }

    /// Mark `id` as processing. A no-op if it already is; restarting a
    /// terminal entry cancels its pending prune.
    pub fn start_processing(&self, id: &str) {
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.get(id) {
            if entry.status == ProcessingStatus::Processing {
                return;
            }
        }
        let revision = state.bump();
        state.entries.insert(
            id.to_string(),
            ProcessingEntry {
                status: ProcessingStatus::Processing,
                start_time: Instant::now(),
                revision,
            },
        );
        tracing::debug!(contract_id = id, "processing started");
    }

    /// Remove `id` whatever its state, typically after the request that
    /// started it failed. A pending prune for it becomes a no-op.
    pub fn stop_processing(&self, id: &str) {
        if self.state.lock().entries.remove(id).is_some() {
            tracing::debug!(contract_id = id, "processing stopped");
        }
    }

    pub fn mark_completed(&self, id: &str) {
        self.finish(id, ProcessingStatus::Completed);
    }

    pub fn mark_failed(&self, id: &str) {
        self.finish(id, ProcessingStatus::Failed);
    }

    pub fn get_status(&self, id: &str) -> Option<ProcessingStatus> {
        self.state.lock().entries.get(id).map(|e| e.status)
    }

    pub fn get(&self, id: &str) -> Option<ProcessingEntry> {
        self.state.lock().entries.get(id).copied()
    }

    pub fn is_processing(&self, id: &str) -> bool {
        self.get_status(id) == Some(ProcessingStatus::Processing)
    }

    pub fn clear(&self, id: &str) {
        self.state.lock().entries.remove(id);
    }

    pub fn clear_all(&self) {
        self.state.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids currently processing, for front-ends showing spinners
    pub fn processing_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|(_, e)| e.status == ProcessingStatus::Processing)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn finish(&self, id: &str, status: ProcessingStatus) {
        let revision = {
            let mut state = self.state.lock();
            let revision = state.bump();
            let start_time = state
                .entries
                .get(id)
                .map(|e| e.start_time)
                .unwrap_or_else(Instant::now);
            state.entries.insert(
                id.to_string(),
                ProcessingEntry {
                    status,
                    start_time,
                    revision,
                },
            );
            revision
        };
        tracing::debug!(contract_id = id, ?status, "processing finished");

        let state = Arc::downgrade(&self.state);
        let delay = self.prune_delay;
        let id = id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(state) = state.upgrade() else {
                return;
            };
            let mut state = state.lock();
            if state.entries.get(&id).is_some_and(|e| e.revision == revision) {
                state.entries.remove(&id);
                tracing::trace!(contract_id = %id, "processing entry pruned");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ProcessingRegistry {
        ProcessingRegistry::new(Duration::from_millis(3000))
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let registry = registry();
        registry.start_processing("c1");
        let first = registry.get("c1").unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        registry.start_processing("c1");
        assert_eq!(registry.get("c1").unwrap(), first);
        assert!(registry.is_processing("c1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_state_is_pruned_after_delay() {
        let registry = registry();
        registry.start_processing("c1");
        registry.mark_completed("c1");

        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert_eq!(registry.get_status("c1"), Some(ProcessingStatus::Completed));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(registry.get_status("c1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_cancels_pending_prune() {
        let registry = registry();
        registry.mark_failed("c1");
        tokio::time::sleep(Duration::from_millis(1000)).await;

        registry.start_processing("c1");
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(registry.get_status("c1"), Some(ProcessingStatus::Processing));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_removes_entry_in_any_state() {
        let registry = registry();
        registry.start_processing("c1");
        registry.stop_processing("c1");
        assert_eq!(registry.get_status("c1"), None);

        registry.start_processing("c2");
        registry.mark_failed("c2");
        registry.stop_processing("c2");
        assert_eq!(registry.get_status("c2"), None);

        // The stale prune must not touch a later entry for the same id
        registry.start_processing("c2");
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(registry.get_status("c2"), Some(ProcessingStatus::Processing));
    }

    #[tokio::test]
    async fn test_clear_and_clear_all() {
        let registry = registry();
        registry.start_processing("a");
        registry.start_processing("b");
        assert_eq!(registry.processing_ids().len(), 2);

        registry.clear("a");
        assert!(!registry.is_processing("a"));
        assert_eq!(registry.len(), 1);

        registry.clear_all();
        assert!(registry.is_empty());
    }
}
