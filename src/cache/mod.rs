//! Timetable Cache System
//!
//! Cache-aside retrieval in front of the upstream timetable sources:
//!
//! - **Store**: an external, TTL-capable key-value backend (`KeyValueStore`)
//! - **Fetcher**: consults the store, falls through to the producer on miss, and repopulates
//!   the store without holding up the response
//!
//! When the store is down every lookup degrades to a direct producer call.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! catalog_ttl_seconds = 1814400   # 3 weeks
//! schedule_ttl_seconds = 259200   # 3 days
//! ```

mod config;
mod fetcher;
mod keys;
mod store;

pub use config::CacheConfig;
pub use fetcher::{CacheAsideFetcher, Lookup};
pub use keys::{LookupKind, VolatilityClass, cache_key, fingerprint};
pub use store::{KeyValueStore, StoreError};
