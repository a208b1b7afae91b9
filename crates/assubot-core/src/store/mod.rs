pub mod app_store;
pub mod notifications;
pub mod processing;
pub mod session;

pub use app_store::{AppStore, SharedStore};
pub use notifications::{NotificationStore, Toast, ToastLevel};
pub use processing::{ProcessingEntry, ProcessingRegistry, ProcessingStatus};
pub use session::SessionStore;
