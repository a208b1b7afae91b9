//! Application-wide constants
//!
//! Centralized location for wire names, endpoint names and default timings
//! that are shared between the cache layer, the realtime client and the CLI.

/// Default REST base URL of the AssuBot backend
pub const API_BASE_URL: &str = "https://api.assubot.fr/api/v1";

/// Path under the backend origin where the Socket.IO server listens
pub const SOCKET_IO_PATH: &str = "/socket.io/";

/// Default Socket.IO namespace
pub const DEFAULT_NAMESPACE: &str = "/";

/// First reconnect delay; each further attempt doubles it
pub const RECONNECT_BASE_DELAY_MS: u64 = 1000;

/// Automatic reconnect attempts before giving up
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// How long a terminal processing state stays visible before it is pruned
pub const PROCESSING_PRUNE_DELAY_MS: u64 = 3000;

/// Cached queries without subscribers are kept this long before eviction
pub const CACHE_KEEP_UNUSED_SECS: u64 = 60;

/// Capacity of the in-process broadcast channel
pub const BROADCAST_CAPACITY: usize = 64;

/// Socket.IO event names received from the backend
pub mod socket_events {
    pub const CONTRACT_SUMMARIZED: &str = "contract_summarized";
    pub const CREDIT_UPDATED: &str = "credit_updated";
    pub const ERROR: &str = "error";
}

/// Query cache endpoint names. List endpoints are recognized by name when
/// optimistic patches fan out to every cached page.
pub mod endpoints {
    pub const GET_CONTRACT: &str = "getContract";
    pub const GET_CONTRACTS: &str = "getContracts";
    pub const GET_TEMPLATE: &str = "getTemplate";
    pub const GET_TEMPLATES: &str = "getTemplates";
    pub const GET_DASHBOARD_STATS: &str = "getDashboardStats";
}
