pub mod key;
pub mod optimistic;
pub mod query_cache;

pub use key::{CacheKey, EntityArgs, Tag, TagKind};
pub use optimistic::{run_optimistic, PatchHandle, PatchSet};
pub use query_cache::{QueryCache, QuerySubscription};
