pub mod auth;
pub mod contracts;
pub mod realtime_sync;

pub use auth::AuthService;
pub use contracts::{ContractScope, ContractsBackend, ContractsService};
pub use realtime_sync::{RealtimeSync, SyncContext};
