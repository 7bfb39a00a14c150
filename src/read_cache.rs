// Read-side cache over the store. Low-cardinality reference data is held
// in process behind a TTL; hotel reads always go to the store because the
// hotel tables are too large to pin in memory.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::model::{
    Destination, Hotel, Language, LookupKind, NoteCategory, NoteType, Resort, Room, StaticLookup,
    Theme,
};
use crate::store::{CacheStatistics, CacheStore, HotelSearchFilter, StoreError};

/// Reference data changes on provider sync cadence, so entries can live long.
pub const REFERENCE_TTL: Duration = Duration::from_secs(6 * 60 * 60);
/// Statistics are cheap but hit on every dashboard refresh.
pub const STATISTICS_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone)]
enum CachedValue {
    Destinations(Arc<Vec<Destination>>),
    Resorts(Arc<Vec<Resort>>),
    Lookups(Arc<Vec<StaticLookup>>),
    NoteTypes(Arc<Vec<NoteType>>),
    Themes(Arc<Vec<Theme>>),
    Languages(Arc<Vec<Language>>),
    Statistics(CacheStatistics),
}

struct CacheEntry {
    stored_at: Instant,
    ttl: Duration,
    value: CachedValue,
}

impl CacheEntry {
    fn new(ttl: Duration, value: CachedValue) -> Self {
        Self {
            stored_at: Instant::now(),
            ttl,
            value,
        }
    }

    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() > self.ttl
    }
}

/// Shared read service over the cache store. Cheap to clone via `Arc`;
/// entries are refreshed lazily on first read after expiry.
pub struct StaticDataCache<S: CacheStore> {
    store: Arc<S>,
    entries: DashMap<String, CacheEntry>,
    reference_ttl: Duration,
    statistics_ttl: Duration,
}

impl<S: CacheStore> StaticDataCache<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_ttls(store, REFERENCE_TTL, STATISTICS_TTL)
    }

    pub fn with_ttls(store: Arc<S>, reference_ttl: Duration, statistics_ttl: Duration) -> Self {
        Self {
            store,
            entries: DashMap::new(),
            reference_ttl,
            statistics_ttl,
        }
    }

    /// Drop every cached entry; the next read of each resource goes to the
    /// store. Called after a sync run lands fresh data.
    pub fn clear(&self) {
        self.entries.clear();
    }

    fn fresh(&self, key: &str) -> Option<CachedValue> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            return None;
        }
        Some(entry.value.clone())
    }

    fn put(&self, key: String, value: CachedValue) {
        self.entries
            .insert(key, CacheEntry::new(self.reference_ttl, value));
    }

    pub async fn destinations(&self) -> Result<Arc<Vec<Destination>>, StoreError> {
        if let Some(CachedValue::Destinations(rows)) = self.fresh("destinations") {
            return Ok(rows);
        }
        let rows = Arc::new(self.store.get_destinations().await?);
        self.put(
            "destinations".to_string(),
            CachedValue::Destinations(Arc::clone(&rows)),
        );
        Ok(rows)
    }

    pub async fn destination(&self, external_id: &str) -> Result<Option<Destination>, StoreError> {
        Ok(self
            .destinations()
            .await?
            .iter()
            .find(|row| row.external_id == external_id)
            .cloned())
    }

    pub async fn resorts(&self, language: &str) -> Result<Arc<Vec<Resort>>, StoreError> {
        let key = format!("resorts:{language}");
        if let Some(CachedValue::Resorts(rows)) = self.fresh(&key) {
            return Ok(rows);
        }
        let rows = Arc::new(self.store.get_resorts(language).await?);
        self.put(key, CachedValue::Resorts(Arc::clone(&rows)));
        Ok(rows)
    }

    pub async fn resort(
        &self,
        external_id: i32,
        language: &str,
    ) -> Result<Option<Resort>, StoreError> {
        Ok(self
            .resorts(language)
            .await?
            .iter()
            .find(|row| row.external_id == external_id)
            .cloned())
    }

    pub async fn lookups(
        &self,
        kind: LookupKind,
        language: &str,
    ) -> Result<Arc<Vec<StaticLookup>>, StoreError> {
        let key = format!("{}:{language}", kind.as_str());
        if let Some(CachedValue::Lookups(rows)) = self.fresh(&key) {
            return Ok(rows);
        }
        let rows = Arc::new(self.store.get_lookups(kind, language).await?);
        self.put(key, CachedValue::Lookups(Arc::clone(&rows)));
        Ok(rows)
    }

    pub async fn lookup(
        &self,
        kind: LookupKind,
        external_id: i32,
        language: &str,
    ) -> Result<Option<StaticLookup>, StoreError> {
        Ok(self
            .lookups(kind, language)
            .await?
            .iter()
            .find(|row| row.external_id == external_id)
            .cloned())
    }

    pub async fn note_types(&self, language: &str) -> Result<Arc<Vec<NoteType>>, StoreError> {
        let key = format!("note_types:{language}");
        if let Some(CachedValue::NoteTypes(rows)) = self.fresh(&key) {
            return Ok(rows);
        }
        let rows = Arc::new(self.store.get_note_types(language).await?);
        self.put(key, CachedValue::NoteTypes(Arc::clone(&rows)));
        Ok(rows)
    }

    pub async fn note_type(
        &self,
        external_id: i32,
        category: NoteCategory,
        language: &str,
    ) -> Result<Option<NoteType>, StoreError> {
        Ok(self
            .note_types(language)
            .await?
            .iter()
            .find(|row| row.external_id == external_id && row.category == category)
            .cloned())
    }

    pub async fn themes(&self) -> Result<Arc<Vec<Theme>>, StoreError> {
        if let Some(CachedValue::Themes(rows)) = self.fresh("themes") {
            return Ok(rows);
        }
        let rows = Arc::new(self.store.get_themes().await?);
        self.put("themes".to_string(), CachedValue::Themes(Arc::clone(&rows)));
        Ok(rows)
    }

    pub async fn theme(&self, external_id: i32) -> Result<Option<Theme>, StoreError> {
        Ok(self
            .themes()
            .await?
            .iter()
            .find(|row| row.external_id == external_id)
            .cloned())
    }

    pub async fn languages(&self) -> Result<Arc<Vec<Language>>, StoreError> {
        if let Some(CachedValue::Languages(rows)) = self.fresh("languages") {
            return Ok(rows);
        }
        let rows = Arc::new(self.store.get_languages().await?);
        self.put(
            "languages".to_string(),
            CachedValue::Languages(Arc::clone(&rows)),
        );
        Ok(rows)
    }

    pub async fn language(&self, code: &str) -> Result<Option<Language>, StoreError> {
        Ok(self
            .languages()
            .await?
            .iter()
            .find(|row| row.code == code)
            .cloned())
    }

    /// Hotels bypass the in-process cache entirely; results are capped by
    /// the store.
    pub async fn search_hotels(&self, filter: &HotelSearchFilter) -> Result<Vec<Hotel>, StoreError> {
        self.store.search_hotels(filter).await
    }

    pub async fn hotel(
        &self,
        external_id: i32,
        language: &str,
    ) -> Result<Option<Hotel>, StoreError> {
        self.store.get_hotel(external_id, language).await
    }

    pub async fn rooms_for_hotel(&self, hotel_id: i64) -> Result<Vec<Room>, StoreError> {
        self.store.get_rooms(hotel_id).await
    }

    pub async fn statistics(&self) -> Result<CacheStatistics, StoreError> {
        if let Some(CachedValue::Statistics(stats)) = self.fresh("statistics") {
            return Ok(stats);
        }
        let stats = self.store.statistics().await?;
        self.entries.insert(
            "statistics".to_string(),
            CacheEntry::new(self.statistics_ttl, CachedValue::Statistics(stats.clone())),
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteCacheStore;
    use chrono::Utc;

    fn theme(id: i32, name: &str) -> Theme {
        let now = Utc::now();
        Theme {
            id: 0,
            external_id: id,
            name: name.to_string(),
            created_at: now,
            last_synced_at: now,
        }
    }

    fn hotel(external_id: i32, name: &str) -> crate::model::Hotel {
        let now = Utc::now();
        crate::model::Hotel {
            id: 0,
            external_id,
            language: "en".to_string(),
            name: name.to_string(),
            address: "1 Main St".to_string(),
            city: "Palma".to_string(),
            country: "Spain".to_string(),
            resort_id: None,
            destination_id: Some("PMI".to_string()),
            category: None,
            latitude: None,
            longitude: None,
            phone: None,
            email: None,
            feature_ids: vec![],
            theme_ids: vec![],
            image_urls: vec![],
            notes: vec![],
            created_at: now,
            last_synced_at: now,
        }
    }

    #[tokio::test]
    async fn reference_reads_are_served_from_cache_until_cleared() {
        let store = Arc::new(SqliteCacheStore::open_in_memory().unwrap());
        store.add_themes(&[theme(1, "Beach")]).await.unwrap();
        let cache = StaticDataCache::new(Arc::clone(&store));

        assert_eq!(cache.themes().await.unwrap().len(), 1);

        // A store write behind the cache is not visible until the cache is
        // cleared.
        store.add_themes(&[theme(2, "City break")]).await.unwrap();
        assert_eq!(cache.themes().await.unwrap().len(), 1);

        cache.clear();
        assert_eq!(cache.themes().await.unwrap().len(), 2);
        assert_eq!(cache.theme(2).await.unwrap().unwrap().name, "City break");
    }

    #[tokio::test]
    async fn expired_entries_are_refreshed_on_next_read() {
        let store = Arc::new(SqliteCacheStore::open_in_memory().unwrap());
        store.add_themes(&[theme(1, "Beach")]).await.unwrap();
        let cache = StaticDataCache::with_ttls(
            Arc::clone(&store),
            Duration::from_millis(10),
            Duration::from_millis(10),
        );

        assert_eq!(cache.themes().await.unwrap().len(), 1);
        store.add_themes(&[theme(2, "City break")]).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.themes().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn note_type_lookup_distinguishes_categories() {
        let now = Utc::now();
        let store = Arc::new(SqliteCacheStore::open_in_memory().unwrap());
        store
            .add_note_types(&[
                NoteType {
                    id: 0,
                    external_id: 1,
                    category: NoteCategory::Hotel,
                    language: "en".to_string(),
                    name: "Check-in information".to_string(),
                    created_at: now,
                    last_synced_at: now,
                },
                NoteType {
                    id: 0,
                    external_id: 1,
                    category: NoteCategory::Room,
                    language: "en".to_string(),
                    name: "Bedding note".to_string(),
                    created_at: now,
                    last_synced_at: now,
                },
            ])
            .await
            .unwrap();
        let cache = StaticDataCache::new(Arc::clone(&store));

        let hotel_note = cache
            .note_type(1, NoteCategory::Hotel, "en")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hotel_note.name, "Check-in information");
        let room_note = cache
            .note_type(1, NoteCategory::Room, "en")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(room_note.name, "Bedding note");
        assert!(cache
            .note_type(1, NoteCategory::Hotel, "de")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn language_lookup_by_code() {
        let now = Utc::now();
        let store = Arc::new(SqliteCacheStore::open_in_memory().unwrap());
        store
            .add_languages(&[Language {
                id: 0,
                code: "en".to_string(),
                name: "English".to_string(),
                created_at: now,
                last_synced_at: now,
            }])
            .await
            .unwrap();
        let cache = StaticDataCache::new(Arc::clone(&store));

        assert_eq!(
            cache.language("en").await.unwrap().unwrap().name,
            "English"
        );
        assert!(cache.language("sv").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn statistics_are_cached_separately() {
        let store = Arc::new(SqliteCacheStore::open_in_memory().unwrap());
        let cache = StaticDataCache::new(Arc::clone(&store));

        assert_eq!(cache.statistics().await.unwrap().themes, 0);
        store.add_themes(&[theme(1, "Beach")]).await.unwrap();
        assert_eq!(cache.statistics().await.unwrap().themes, 0);

        cache.clear();
        assert_eq!(cache.statistics().await.unwrap().themes, 1);
    }

    #[tokio::test]
    async fn hotel_reads_bypass_the_cache_and_stay_capped() {
        let store = Arc::new(SqliteCacheStore::open_in_memory().unwrap());
        let cache = StaticDataCache::new(Arc::clone(&store));

        for i in 0..120 {
            store
                .insert_hotel(&hotel(1000 + i, &format!("Hotel {i}")), &[])
                .await
                .unwrap();
        }

        let results = cache
            .search_hotels(&HotelSearchFilter::default())
            .await
            .unwrap();
        assert_eq!(results.len(), crate::store::MAX_HOTEL_RESULTS);

        // A fresh insert is visible immediately, unlike reference data.
        store.insert_hotel(&hotel(9000, "Brand New"), &[]).await.unwrap();
        let found = cache.hotel(9000, "en").await.unwrap();
        assert!(found.is_some());
    }
}
