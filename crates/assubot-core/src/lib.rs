pub mod api;
pub mod cache;
pub mod config;
pub mod constants;
pub mod events;
pub mod guards;
pub mod models;
pub mod realtime;
pub mod runtime;
pub mod secure_storage;
pub mod services;
pub mod store;
pub mod tracing_setup;

// Re-export the types most callers need at crate root
pub use api::{ApiClient, ApiError};
pub use config::CoreConfig;
pub use events::{ContractProcessedNotice, CoreEvent};
pub use runtime::CoreRuntime;
