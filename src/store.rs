// Cache Store contract: the persistent reconciliation target, one table per
// resource type. The engine writes through it in batches; the read-side
// cache reads through it. Rows are never deleted except for the room-set
// replacement under a changed hotel.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    Destination, Hotel, JobRun, Language, LookupKind, NoteType, Resort, Room, StaticLookup, Theme,
};

/// Hard cap on hotel search results; hotel volume is too large to hand out
/// unbounded result sets.
pub const MAX_HOTEL_RESULTS: usize = 100;

// Error types for store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

/// Filters for direct hotel reads. All fields are optional and combined
/// with AND; `name_contains` is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct HotelSearchFilter {
    pub language: Option<String>,
    pub destination_id: Option<String>,
    pub resort_id: Option<i32>,
    pub min_category: Option<f64>,
    pub name_contains: Option<String>,
    pub limit: Option<usize>,
}

/// Row counts per resource table plus the most recent completed sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub destinations: u64,
    pub resorts: u64,
    pub meals: u64,
    pub room_types: u64,
    pub features: u64,
    pub transfer_types: u64,
    pub note_types: u64,
    pub themes: u64,
    pub languages: u64,
    pub hotels: u64,
    pub rooms: u64,
    pub last_completed_sync: Option<DateTime<Utc>>,
}

/// Narrow persistence contract consumed by the engine, the run history
/// recorder and the read-side cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_destinations(&self) -> Result<Vec<Destination>, StoreError>;
    async fn add_destinations(&self, rows: &[Destination]) -> Result<usize, StoreError>;
    async fn update_destinations(&self, rows: &[Destination]) -> Result<usize, StoreError>;

    async fn get_resorts(&self, language: &str) -> Result<Vec<Resort>, StoreError>;
    async fn add_resorts(&self, rows: &[Resort]) -> Result<usize, StoreError>;
    async fn update_resorts(&self, rows: &[Resort]) -> Result<usize, StoreError>;

    async fn get_lookups(
        &self,
        kind: LookupKind,
        language: &str,
    ) -> Result<Vec<StaticLookup>, StoreError>;
    async fn add_lookups(&self, kind: LookupKind, rows: &[StaticLookup])
        -> Result<usize, StoreError>;
    async fn update_lookups(
        &self,
        kind: LookupKind,
        rows: &[StaticLookup],
    ) -> Result<usize, StoreError>;

    async fn get_note_types(&self, language: &str) -> Result<Vec<NoteType>, StoreError>;
    async fn add_note_types(&self, rows: &[NoteType]) -> Result<usize, StoreError>;
    async fn update_note_types(&self, rows: &[NoteType]) -> Result<usize, StoreError>;

    async fn get_themes(&self) -> Result<Vec<Theme>, StoreError>;
    async fn add_themes(&self, rows: &[Theme]) -> Result<usize, StoreError>;
    async fn update_themes(&self, rows: &[Theme]) -> Result<usize, StoreError>;

    async fn get_languages(&self) -> Result<Vec<Language>, StoreError>;
    async fn add_languages(&self, rows: &[Language]) -> Result<usize, StoreError>;
    async fn update_languages(&self, rows: &[Language]) -> Result<usize, StoreError>;

    async fn get_hotel(
        &self,
        external_id: i32,
        language: &str,
    ) -> Result<Option<Hotel>, StoreError>;
    /// Insert a hotel and its rooms as one graph; returns the hotel row id.
    async fn insert_hotel(&self, hotel: &Hotel, rooms: &[Room]) -> Result<i64, StoreError>;
    async fn update_hotel(&self, hotel: &Hotel) -> Result<(), StoreError>;
    /// Bulk-delete the hotel's room set and insert the replacement.
    async fn replace_rooms(&self, hotel_id: i64, rooms: &[Room]) -> Result<(), StoreError>;
    async fn get_rooms(&self, hotel_id: i64) -> Result<Vec<Room>, StoreError>;
    async fn search_hotels(&self, filter: &HotelSearchFilter) -> Result<Vec<Hotel>, StoreError>;

    async fn insert_job_run(&self, run: &JobRun) -> Result<i64, StoreError>;
    async fn update_job_run(&self, run: &JobRun) -> Result<(), StoreError>;
    async fn recent_job_runs(&self, limit: usize) -> Result<Vec<JobRun>, StoreError>;

    async fn statistics(&self) -> Result<CacheStatistics, StoreError>;
}
