//! # COGS Cache
//!
//! 跨請求的成本快取與增量失效

pub mod dirty_tracking;
pub mod incremental;

// Re-export 主要類型
pub use dirty_tracking::DirtyTracker;
pub use incremental::{CacheStats, IncrementalCostCache};
