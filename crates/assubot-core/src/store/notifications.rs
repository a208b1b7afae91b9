use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: Uuid,
    pub level: ToastLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Pending user-visible notifications, oldest first
#[derive(Debug, Default)]
pub struct NotificationStore {
    toasts: Vec<Toast>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, level: ToastLevel, message: impl Into<String>) -> Uuid {
        let toast = Toast {
            id: Uuid::new_v4(),
            level,
            message: message.into(),
            created_at: Utc::now(),
        };
        let id = toast.id;
        self.toasts.push(toast);
        id
    }

    pub fn success(&mut self, message: impl Into<String>) -> Uuid {
        self.push(ToastLevel::Success, message)
    }

    pub fn error(&mut self, message: impl Into<String>) -> Uuid {
        self.push(ToastLevel::Error, message)
    }

    pub fn info(&mut self, message: impl Into<String>) -> Uuid {
        self.push(ToastLevel::Info, message)
    }

    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }

    /// Take every pending toast
    pub fn drain(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.toasts)
    }

    pub fn dismiss(&mut self, id: Uuid) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|t| t.id != id);
        self.toasts.len() != before
    }

    pub fn clear(&mut self) {
        self.toasts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_dismiss_drain() {
        let mut store = NotificationStore::new();
        let first = store.success("Résumé prêt");
        store.error("quota exceeded");
        assert_eq!(store.toasts().len(), 2);

        assert!(store.dismiss(first));
        assert!(!store.dismiss(first));

        let drained = store.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].level, ToastLevel::Error);
        assert!(store.toasts().is_empty());
    }
}
