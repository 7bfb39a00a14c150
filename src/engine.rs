// Reconciliation engine: fetches provider snapshots, diffs them against the
// store by natural key and applies only the rows that actually changed.
// Failures are contained at the smallest useful granularity; only a failure
// of the sync skeleton itself (language list, canonical resources, store
// writes) aborts a run.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::config::SyncConfig;
use crate::history::{RunHistory, JOB_BASIC_SYNC, JOB_FULL_SYNC};
use crate::model::{
    CacheRow, Destination, Hotel, Language, LookupKind, NoteCategory, NoteType, Resort, Room,
    StaticLookup, Theme,
};
use crate::provider::{InventoryProvider, ProviderError, ProviderHotel};
use crate::store::{CacheStore, StoreError};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("a sync run is already in progress")]
    AlreadyRunning,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of diffing a fetched snapshot against the stored rows.
/// Updates have already adopted the stored row's identity.
#[derive(Debug)]
pub struct ChangeSet<T> {
    pub inserts: Vec<T>,
    pub updates: Vec<T>,
    pub unchanged: usize,
}

impl<T> Default for ChangeSet<T> {
    fn default() -> Self {
        Self {
            inserts: Vec::new(),
            updates: Vec::new(),
            unchanged: 0,
        }
    }
}

/// Diff `fetched` against `existing` by natural key. Rows absent upstream are
/// left alone; the cache never deletes on the provider's behalf.
pub fn reconcile<T: CacheRow>(existing: Vec<T>, fetched: Vec<T>) -> ChangeSet<T> {
    let mut index: HashMap<T::Key, T> = existing
        .into_iter()
        .map(|row| (row.natural_key(), row))
        .collect();
    let mut set = ChangeSet::default();
    for mut row in fetched {
        match index.remove(&row.natural_key()) {
            Some(stored) => {
                if stored.content_eq(&row) {
                    set.unchanged += 1;
                } else {
                    row.adopt_identity(&stored);
                    set.updates.push(row);
                }
            }
            None => set.inserts.push(row),
        }
    }
    set
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResourceCounts {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl ResourceCounts {
    fn record<T>(&mut self, set: &ChangeSet<T>) {
        self.inserted += set.inserts.len();
        self.updated += set.updates.len();
        self.unchanged += set.unchanged;
    }

    fn writes(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Hotel and room outcome for one language across all destinations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageHotelCounts {
    pub language: String,
    pub hotels_inserted: usize,
    pub hotels_updated: usize,
    pub hotels_unchanged: usize,
    pub rooms_written: usize,
}

impl LanguageHotelCounts {
    fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            hotels_inserted: 0,
            hotels_updated: 0,
            hotels_unchanged: 0,
            rooms_written: 0,
        }
    }
}

/// What one sync run did, persisted as the run's details.
#[derive(Debug, Default, Serialize)]
pub struct SyncSummary {
    pub languages_synced: Vec<String>,
    pub languages_failed: Vec<String>,
    pub language_rows: ResourceCounts,
    pub themes: ResourceCounts,
    pub destinations: ResourceCounts,
    pub resorts: ResourceCounts,
    pub meals: ResourceCounts,
    pub room_types: ResourceCounts,
    pub features: ResourceCounts,
    pub transfer_types: ResourceCounts,
    pub note_types: ResourceCounts,
    pub hotel_languages: Vec<LanguageHotelCounts>,
}

impl SyncSummary {
    fn lookup_counts_mut(&mut self, kind: LookupKind) -> &mut ResourceCounts {
        match kind {
            LookupKind::Meal => &mut self.meals,
            LookupKind::RoomType => &mut self.room_types,
            LookupKind::Feature => &mut self.features,
            LookupKind::TransferType => &mut self.transfer_types,
        }
    }

    /// Total rows written, in any table. Zero for a no-op re-sync.
    pub fn total_writes(&self) -> usize {
        let resource_writes: usize = [
            &self.language_rows,
            &self.themes,
            &self.destinations,
            &self.resorts,
            &self.meals,
            &self.room_types,
            &self.features,
            &self.transfer_types,
            &self.note_types,
        ]
        .iter()
        .map(|counts| counts.writes())
        .sum();
        let hotel_writes: usize = self
            .hotel_languages
            .iter()
            .map(|counts| counts.hotels_inserted + counts.hotels_updated + counts.rooms_written)
            .sum();
        resource_writes + hotel_writes
    }
}

#[derive(Clone, Copy, PartialEq)]
enum SyncScope {
    Full,
    Basic,
}

// The basic job refreshes only the lookups the booking flow depends on.
const BASIC_LOOKUPS: [LookupKind; 3] =
    [LookupKind::Meal, LookupKind::RoomType, LookupKind::Feature];

pub struct SyncEngine<P, S>
where
    P: InventoryProvider,
    S: CacheStore,
{
    provider: Arc<P>,
    store: Arc<S>,
    history: RunHistory<S>,
    config: SyncConfig,
    // Held for the duration of a run; concurrent runs are rejected, not queued.
    run_lock: Mutex<()>,
}

impl<P, S> SyncEngine<P, S>
where
    P: InventoryProvider,
    S: CacheStore,
{
    pub fn new(provider: Arc<P>, store: Arc<S>, config: SyncConfig) -> Self {
        let history = RunHistory::new(Arc::clone(&store));
        Self {
            provider,
            store,
            history,
            config,
            run_lock: Mutex::new(()),
        }
    }

    pub fn history(&self) -> &RunHistory<S> {
        &self.history
    }

    /// Full synchronization: every resource, every language, hotels and rooms
    /// for every known destination.
    pub async fn sync_all_static_data(&self) -> Result<SyncSummary, SyncError> {
        self.run(JOB_FULL_SYNC, SyncScope::Full).await
    }

    /// Lightweight refresh of languages, themes, destinations and the
    /// booking-critical lookups. Never touches hotels or rooms.
    pub async fn sync_basic_data(&self) -> Result<SyncSummary, SyncError> {
        self.run(JOB_BASIC_SYNC, SyncScope::Basic).await
    }

    async fn run(&self, job_type: &str, scope: SyncScope) -> Result<SyncSummary, SyncError> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| SyncError::AlreadyRunning)?;

        let mut run = self.history.begin(job_type).await?;
        match self.run_scoped(scope).await {
            Ok(summary) => {
                let message = format!(
                    "synced {} languages, {} failed, {} rows written",
                    summary.languages_synced.len(),
                    summary.languages_failed.len(),
                    summary.total_writes()
                );
                let details = serde_json::to_value(&summary).ok();
                self.history.complete(&mut run, &message, details).await?;
                Ok(summary)
            }
            Err(sync_error) => {
                // The original failure is what the caller needs to see, even
                // if recording it fails too.
                if let Err(history_error) =
                    self.history.fail(&mut run, &sync_error.to_string()).await
                {
                    error!(
                        run_id = run.id,
                        error = %history_error,
                        "failed to record sync run failure"
                    );
                }
                Err(sync_error)
            }
        }
    }

    async fn run_scoped(&self, scope: SyncScope) -> Result<SyncSummary, SyncError> {
        let mut summary = SyncSummary::default();
        let languages = self.sync_languages(&mut summary).await?;
        self.sync_themes(&mut summary).await?;

        for language in &languages {
            match self.sync_language(language, scope, &mut summary).await {
                Ok(()) => summary.languages_synced.push(language.clone()),
                Err(sync_error) => {
                    error!(
                        language,
                        error = %sync_error,
                        "language sync failed, continuing with remaining languages"
                    );
                    summary.languages_failed.push(language.clone());
                }
            }
        }
        Ok(summary)
    }

    /// Reconcile the language table and return the codes to sync, canonical
    /// language first so destinations exist before any hotel crawl.
    async fn sync_languages(&self, summary: &mut SyncSummary) -> Result<Vec<String>, SyncError> {
        let now = Utc::now();
        let fetched: Vec<Language> = self
            .provider
            .languages()
            .await?
            .iter()
            .map(|rec| Language::from_provider(rec, now))
            .collect();

        let mut codes: Vec<String> = fetched.iter().map(|row| row.code.clone()).collect();
        if codes.is_empty() {
            warn!(
                fallback = %self.config.fallback_language,
                "provider returned no languages, using fallback"
            );
            return Ok(vec![self.config.fallback_language.clone()]);
        }
        codes.sort_by_key(|code| *code != self.config.canonical_language);

        let set = reconcile(self.store.get_languages().await?, fetched);
        for chunk in set.inserts.chunks(self.config.batch_size) {
            self.store.add_languages(chunk).await?;
        }
        for chunk in set.updates.chunks(self.config.batch_size) {
            self.store.update_languages(chunk).await?;
        }
        summary.language_rows.record(&set);
        Ok(codes)
    }

    async fn sync_themes(&self, summary: &mut SyncSummary) -> Result<(), SyncError> {
        let now = Utc::now();
        let fetched: Vec<Theme> = self
            .provider
            .themes()
            .await?
            .iter()
            .map(|rec| Theme::from_provider(rec, now))
            .collect();
        let set = reconcile(self.store.get_themes().await?, fetched);
        for chunk in set.inserts.chunks(self.config.batch_size) {
            self.store.add_themes(chunk).await?;
        }
        for chunk in set.updates.chunks(self.config.batch_size) {
            self.store.update_themes(chunk).await?;
        }
        summary.themes.record(&set);
        Ok(())
    }

    async fn sync_language(
        &self,
        language: &str,
        scope: SyncScope,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        // Destinations are language-independent and crawled exactly once,
        // under the canonical language.
        if language == self.config.canonical_language {
            self.sync_destinations(summary).await?;
        }

        match scope {
            SyncScope::Basic => {
                for kind in BASIC_LOOKUPS {
                    self.sync_lookups(kind, language, summary).await?;
                }
            }
            SyncScope::Full => {
                self.sync_resorts(language, summary).await?;
                for kind in LookupKind::ALL {
                    self.sync_lookups(kind, language, summary).await?;
                }
                self.sync_note_types(language, summary).await?;
                self.sync_hotels_for_language(language, summary).await?;
            }
        }
        Ok(())
    }

    async fn sync_destinations(&self, summary: &mut SyncSummary) -> Result<(), SyncError> {
        let now = Utc::now();
        let fetched: Vec<Destination> = self
            .provider
            .destinations(&self.config.canonical_language)
            .await?
            .iter()
            .map(|rec| Destination::from_provider(rec, now))
            .collect();
        let set = reconcile(self.store.get_destinations().await?, fetched);
        for chunk in set.inserts.chunks(self.config.batch_size) {
            self.store.add_destinations(chunk).await?;
        }
        for chunk in set.updates.chunks(self.config.batch_size) {
            self.store.update_destinations(chunk).await?;
        }
        summary.destinations.record(&set);
        Ok(())
    }

    async fn sync_resorts(
        &self,
        language: &str,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        let now = Utc::now();
        let fetched: Vec<Resort> = self
            .provider
            .resorts(language)
            .await?
            .iter()
            .map(|rec| Resort::from_provider(rec, language, now))
            .collect();
        let set = reconcile(self.store.get_resorts(language).await?, fetched);
        for chunk in set.inserts.chunks(self.config.batch_size) {
            self.store.add_resorts(chunk).await?;
        }
        for chunk in set.updates.chunks(self.config.batch_size) {
            self.store.update_resorts(chunk).await?;
        }
        summary.resorts.record(&set);
        Ok(())
    }

    async fn sync_lookups(
        &self,
        kind: LookupKind,
        language: &str,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        let now = Utc::now();
        let fetched: Vec<StaticLookup> = self
            .provider
            .lookup_items(kind, language)
            .await?
            .iter()
            .map(|rec| StaticLookup::from_provider(rec, language, now))
            .collect();
        let set = reconcile(self.store.get_lookups(kind, language).await?, fetched);
        for chunk in set.inserts.chunks(self.config.batch_size) {
            self.store.add_lookups(kind, chunk).await?;
        }
        for chunk in set.updates.chunks(self.config.batch_size) {
            self.store.update_lookups(kind, chunk).await?;
        }
        summary.lookup_counts_mut(kind).record(&set);
        Ok(())
    }

    /// Hotel and room note types share one table; both categories are fetched
    /// and reconciled together so the category is part of the key.
    async fn sync_note_types(
        &self,
        language: &str,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        let now = Utc::now();
        let mut fetched: Vec<NoteType> = Vec::new();
        for category in [NoteCategory::Hotel, NoteCategory::Room] {
            fetched.extend(
                self.provider
                    .note_types(category, language)
                    .await?
                    .iter()
                    .map(|rec| NoteType::from_provider(rec, category, language, now)),
            );
        }
        let set = reconcile(self.store.get_note_types(language).await?, fetched);
        for chunk in set.inserts.chunks(self.config.batch_size) {
            self.store.add_note_types(chunk).await?;
        }
        for chunk in set.updates.chunks(self.config.batch_size) {
            self.store.update_note_types(chunk).await?;
        }
        summary.note_types.record(&set);
        Ok(())
    }

    async fn sync_hotels_for_language(
        &self,
        language: &str,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        let destinations = self.store.get_destinations().await?;
        let mut counts = LanguageHotelCounts::new(language);
        for destination in &destinations {
            if let Err(sync_error) = self
                .sync_hotels_for_destination(&destination.external_id, language, &mut counts)
                .await
            {
                warn!(
                    destination = %destination.external_id,
                    language,
                    error = %sync_error,
                    "destination hotel sync failed, continuing with remaining destinations"
                );
            }
        }
        summary.hotel_languages.push(counts);
        Ok(())
    }

    async fn sync_hotels_for_destination(
        &self,
        destination_id: &str,
        language: &str,
        counts: &mut LanguageHotelCounts,
    ) -> Result<(), SyncError> {
        let hotels = self.provider.static_hotels(destination_id, language).await?;
        for hotel in &hotels {
            if let Err(store_error) = self
                .apply_hotel(hotel, destination_id, language, counts)
                .await
            {
                debug!(
                    hotel = hotel.id,
                    language,
                    error = %store_error,
                    "skipping hotel after write conflict"
                );
            }
        }
        Ok(())
    }

    async fn apply_hotel(
        &self,
        rec: &ProviderHotel,
        destination_id: &str,
        language: &str,
        counts: &mut LanguageHotelCounts,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut incoming = Hotel::from_provider(rec, destination_id, language, now);
        let rooms: Vec<Room> = rec
            .rooms
            .iter()
            .map(|room| Room::from_provider(room, language, now))
            .collect();

        match self.store.get_hotel(rec.id, language).await? {
            None => {
                self.store.insert_hotel(&incoming, &rooms).await?;
                counts.hotels_inserted += 1;
                counts.rooms_written += rooms.len();
            }
            Some(stored) => {
                let stored_rooms = self.store.get_rooms(stored.id).await?;
                if stored.content_eq(&incoming) && rooms_match(&stored_rooms, &rooms) {
                    counts.hotels_unchanged += 1;
                } else {
                    // Any change to the hotel or its room composition rewrites
                    // the hotel row and replaces the whole room set.
                    incoming.adopt_identity(&stored);
                    self.store.update_hotel(&incoming).await?;
                    self.store.replace_rooms(stored.id, &rooms).await?;
                    counts.hotels_updated += 1;
                    counts.rooms_written += rooms.len();
                }
            }
        }
        Ok(())
    }
}

fn rooms_match(stored: &[Room], incoming: &[Room]) -> bool {
    if stored.len() != incoming.len() {
        return false;
    }
    let mut stored: Vec<&Room> = stored.iter().collect();
    stored.sort_by_key(|room| room.external_id);
    let mut incoming: Vec<&Room> = incoming.iter().collect();
    incoming.sort_by_key(|room| room.external_id);
    stored
        .iter()
        .zip(&incoming)
        .all(|(a, b)| a.content_eq(b))
}
