pub mod routing;
pub mod smart;

pub use routing::AccountAgentMap;
pub use smart::{CacheStats, SmartCache, SnapshotField};
