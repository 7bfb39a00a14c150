// SunHotels static data synchronization and caching

pub mod config;
pub mod engine;
pub mod history;
pub mod model;
pub mod provider;
pub mod read_cache;
pub mod sqlite;
pub mod store;
pub mod sunhotels;

// Re-export key types for convenience
pub use config::SyncConfig;
pub use engine::{reconcile, ChangeSet, SyncEngine, SyncError, SyncSummary};
pub use history::{RunHistory, JOB_BASIC_SYNC, JOB_FULL_SYNC};
pub use model::{
    Destination, Hotel, JobRun, JobStatus, Language, LookupKind, NoteCategory, NoteType, Resort,
    Room, StaticLookup, Theme,
};
pub use provider::{InventoryProvider, ProviderError};
pub use read_cache::StaticDataCache;
pub use sqlite::SqliteCacheStore;
pub use store::{
    CacheStatistics, CacheStore, HotelSearchFilter, StoreError, MAX_HOTEL_RESULTS,
};
pub use sunhotels::{SunHotelsClient, SunHotelsConfig};
