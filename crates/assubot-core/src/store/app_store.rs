use std::sync::Arc;

use parking_lot::RwLock;

use super::notifications::NotificationStore;
use super::session::SessionStore;

/// Client-side application state. The processing registry lives beside it
/// because its prune timers need shared ownership of their own map.
#[derive(Debug, Default)]
pub struct AppStore {
    pub session: SessionStore,
    pub notifications: NotificationStore,
}

impl AppStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything tied to the signed-in user
    pub fn clear(&mut self) {
        self.session.logout();
        self.notifications.clear();
    }
}

pub type SharedStore = Arc<RwLock<AppStore>>;

pub fn shared() -> SharedStore {
    Arc::new(RwLock::new(AppStore::new()))
}
