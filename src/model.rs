// Cache-row model for the SunHotels static data mirror.
//
// Every struct here is a locally persisted copy of provider-owned data. The
// provider's own identifier is kept as `external_id`; `id` is the storage key
// and the only stable reference for child rows (a hotel has one row per
// language, all sharing the same external id).

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::{
    ProviderDestination, ProviderHotel, ProviderLanguage, ProviderLookupItem, ProviderNoteType,
    ProviderResort, ProviderRoom, ProviderTheme,
};

/// Natural-key identity and content comparison used by reconciliation.
///
/// `content_eq` compares provider-tracked fields only; internal id and
/// timestamps are excluded so an unchanged upstream row produces zero writes.
pub trait CacheRow {
    type Key: Eq + std::hash::Hash;

    fn natural_key(&self) -> Self::Key;
    fn content_eq(&self, other: &Self) -> bool;

    /// Take over the stored row's identity so an update keeps the internal
    /// id and the original creation timestamp.
    fn adopt_identity(&mut self, existing: &Self);
}

/// Language-independent destination row. Only ever written under the
/// canonical sync language; the table deliberately has no language column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub id: i64,
    pub external_id: String,
    pub name: String,
    pub country: String,
    pub country_code: String,
    pub timezone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

impl Destination {
    pub fn from_provider(rec: &ProviderDestination, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            external_id: rec.id.clone(),
            name: rec.name.clone(),
            country: rec.country.clone(),
            country_code: rec.country_code.clone(),
            timezone: rec.timezone.clone(),
            created_at: now,
            last_synced_at: now,
        }
    }
}

impl CacheRow for Destination {
    type Key = String;

    fn natural_key(&self) -> String {
        self.external_id.clone()
    }

    fn content_eq(&self, other: &Self) -> bool {
        self.external_id == other.external_id
            && self.name == other.name
            && self.country == other.country
            && self.country_code == other.country_code
            && self.timezone == other.timezone
    }

    fn adopt_identity(&mut self, existing: &Self) {
        self.id = existing.id;
        self.created_at = existing.created_at;
    }
}

/// Language-variant resort row, unique on (external id, language).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resort {
    pub id: i64,
    pub external_id: i32,
    pub language: String,
    pub name: String,
    pub destination_id: String,
    pub country: String,
    pub country_code: String,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

impl Resort {
    pub fn from_provider(rec: &ProviderResort, language: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            external_id: rec.id,
            language: language.to_string(),
            name: rec.name.clone(),
            destination_id: rec.destination_id.clone(),
            country: rec.country.clone(),
            country_code: rec.country_code.clone(),
            created_at: now,
            last_synced_at: now,
        }
    }
}

impl CacheRow for Resort {
    type Key = (i32, String);

    fn natural_key(&self) -> (i32, String) {
        (self.external_id, self.language.clone())
    }

    fn content_eq(&self, other: &Self) -> bool {
        self.external_id == other.external_id
            && self.language == other.language
            && self.name == other.name
            && self.destination_id == other.destination_id
            && self.country == other.country
            && self.country_code == other.country_code
    }

    fn adopt_identity(&mut self, existing: &Self) {
        self.id = existing.id;
        self.created_at = existing.created_at;
    }
}

/// The four same-shaped language-variant lookup tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookupKind {
    Meal,
    RoomType,
    Feature,
    TransferType,
}

impl LookupKind {
    pub const ALL: [LookupKind; 4] = [
        LookupKind::Meal,
        LookupKind::RoomType,
        LookupKind::Feature,
        LookupKind::TransferType,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LookupKind::Meal => "meals",
            LookupKind::RoomType => "room_types",
            LookupKind::Feature => "features",
            LookupKind::TransferType => "transfer_types",
        }
    }
}

impl std::fmt::Display for LookupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row in one of the lookup tables (meal, room type, feature, transfer
/// type). Unique on (external id, language) within its table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticLookup {
    pub id: i64,
    pub external_id: i32,
    pub language: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

impl StaticLookup {
    pub fn from_provider(rec: &ProviderLookupItem, language: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            external_id: rec.id,
            language: language.to_string(),
            name: rec.name.clone(),
            created_at: now,
            last_synced_at: now,
        }
    }
}

impl CacheRow for StaticLookup {
    type Key = (i32, String);

    fn natural_key(&self) -> (i32, String) {
        (self.external_id, self.language.clone())
    }

    fn content_eq(&self, other: &Self) -> bool {
        self.external_id == other.external_id
            && self.language == other.language
            && self.name == other.name
    }

    fn adopt_identity(&mut self, existing: &Self) {
        self.id = existing.id;
        self.created_at = existing.created_at;
    }
}

/// Whether a note type applies to hotels or to rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteCategory {
    Hotel,
    Room,
}

impl NoteCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            NoteCategory::Hotel => "hotel",
            NoteCategory::Room => "room",
        }
    }
}

impl std::fmt::Display for NoteCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown note category: {0}")]
pub struct UnknownNoteCategory(String);

impl FromStr for NoteCategory {
    type Err = UnknownNoteCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hotel" => Ok(NoteCategory::Hotel),
            "room" => Ok(NoteCategory::Room),
            other => Err(UnknownNoteCategory(other.to_string())),
        }
    }
}

/// Note-type row, unique on (external id, category, language). The same
/// external id may exist once for hotels and once for rooms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteType {
    pub id: i64,
    pub external_id: i32,
    pub category: NoteCategory,
    pub language: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

impl NoteType {
    pub fn from_provider(
        rec: &ProviderNoteType,
        category: NoteCategory,
        language: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            external_id: rec.id,
            category,
            language: language.to_string(),
            name: rec.name.clone(),
            created_at: now,
            last_synced_at: now,
        }
    }
}

impl CacheRow for NoteType {
    type Key = (i32, NoteCategory, String);

    fn natural_key(&self) -> (i32, NoteCategory, String) {
        (self.external_id, self.category, self.language.clone())
    }

    fn content_eq(&self, other: &Self) -> bool {
        self.external_id == other.external_id
            && self.category == other.category
            && self.language == other.language
            && self.name == other.name
    }

    fn adopt_identity(&mut self, existing: &Self) {
        self.id = existing.id;
        self.created_at = existing.created_at;
    }
}

/// Language-independent theme row, unique on external id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub id: i64,
    pub external_id: i32,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

impl Theme {
    pub fn from_provider(rec: &ProviderTheme, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            external_id: rec.id,
            name: rec.name.clone(),
            created_at: now,
            last_synced_at: now,
        }
    }
}

impl CacheRow for Theme {
    type Key = i32;

    fn natural_key(&self) -> i32 {
        self.external_id
    }

    fn content_eq(&self, other: &Self) -> bool {
        self.external_id == other.external_id && self.name == other.name
    }

    fn adopt_identity(&mut self, existing: &Self) {
        self.id = existing.id;
        self.created_at = existing.created_at;
    }
}

/// Supported display language, unique on ISO code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Language {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

impl Language {
    pub fn from_provider(rec: &ProviderLanguage, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            code: rec.code.clone(),
            name: rec.name.clone(),
            created_at: now,
            last_synced_at: now,
        }
    }
}

impl CacheRow for Language {
    type Key = String;

    fn natural_key(&self) -> String {
        self.code.clone()
    }

    fn content_eq(&self, other: &Self) -> bool {
        self.code == other.code && self.name == other.name
    }

    fn adopt_identity(&mut self, existing: &Self) {
        self.id = existing.id;
        self.created_at = existing.created_at;
    }
}

/// A note attached to a hotel, stored as part of the hotel row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelNote {
    pub note_type_id: i32,
    pub text: String,
}

/// Denormalized hotel row, unique on (external id, language). Array-valued
/// attributes are typed vectors in memory and JSON text in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotel {
    pub id: i64,
    pub external_id: i32,
    pub language: String,
    pub name: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub resort_id: Option<i32>,
    pub destination_id: Option<String>,
    pub category: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub feature_ids: Vec<i32>,
    pub theme_ids: Vec<i32>,
    pub image_urls: Vec<String>,
    pub notes: Vec<HotelNote>,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

impl Hotel {
    pub fn from_provider(
        rec: &ProviderHotel,
        destination_id: &str,
        language: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            external_id: rec.id,
            language: language.to_string(),
            name: rec.name.clone(),
            address: rec.address.clone(),
            city: rec.city.clone(),
            country: rec.country.clone(),
            resort_id: rec.resort_id,
            destination_id: Some(destination_id.to_string()),
            category: rec.category,
            latitude: rec.latitude,
            longitude: rec.longitude,
            phone: rec.phone.clone(),
            email: rec.email.clone(),
            feature_ids: rec.feature_ids.clone(),
            theme_ids: rec.theme_ids.clone(),
            image_urls: rec.image_urls.clone(),
            notes: rec
                .notes
                .iter()
                .map(|note| HotelNote {
                    note_type_id: note.note_type_id,
                    text: note.text.clone(),
                })
                .collect(),
            created_at: now,
            last_synced_at: now,
        }
    }

    /// Field equality over provider-tracked content. `destination_id` is
    /// excluded: a hotel reachable from several destinations keeps whichever
    /// destination first inserted it instead of ping-ponging between crawls.
    pub fn content_eq(&self, other: &Self) -> bool {
        self.external_id == other.external_id
            && self.language == other.language
            && self.name == other.name
            && self.address == other.address
            && self.city == other.city
            && self.country == other.country
            && self.resort_id == other.resort_id
            && self.category == other.category
            && self.latitude == other.latitude
            && self.longitude == other.longitude
            && self.phone == other.phone
            && self.email == other.email
            && self.feature_ids == other.feature_ids
            && self.theme_ids == other.theme_ids
            && self.image_urls == other.image_urls
            && self.notes == other.notes
    }

    pub fn adopt_identity(&mut self, existing: &Self) {
        self.id = existing.id;
        self.created_at = existing.created_at;
        // Keep the first crawl's destination assignment stable.
        self.destination_id = existing.destination_id.clone();
    }
}

/// Room row owned by exactly one hotel row via the hotel's internal id.
/// Rooms are never diffed in place; the whole set is replaced when the
/// owning hotel changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub hotel_id: i64,
    pub external_id: i64,
    pub language: String,
    pub room_type_id: i32,
    pub beds: i32,
    pub extra_beds: i32,
    pub feature_ids: Vec<i32>,
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

impl Room {
    pub fn from_provider(rec: &ProviderRoom, language: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            hotel_id: 0,
            external_id: rec.id,
            language: language.to_string(),
            room_type_id: rec.room_type_id,
            beds: rec.beds,
            extra_beds: rec.extra_beds,
            feature_ids: rec.feature_ids.clone(),
            image_urls: rec.image_urls.clone(),
            created_at: now,
            last_synced_at: now,
        }
    }

    pub fn content_eq(&self, other: &Self) -> bool {
        self.external_id == other.external_id
            && self.language == other.language
            && self.room_type_id == other.room_type_id
            && self.beds == other.beds
            && self.extra_beds == other.extra_beds
            && self.feature_ids == other.feature_ids
            && self.image_urls == other.image_urls
    }
}

/// Lifecycle state of a sync job invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown job status: {0}")]
pub struct UnknownJobStatus(String);

impl FromStr for JobStatus {
    type Err = UnknownJobStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(UnknownJobStatus(other.to_string())),
        }
    }
}

/// Durable record of one sync job invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRun {
    pub id: i64,
    pub job_type: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub message: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl JobRun {
    pub fn started(job_type: &str) -> Self {
        Self {
            id: 0,
            job_type: job_type.to_string(),
            status: JobStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            duration_secs: None,
            message: None,
            details: None,
        }
    }

    /// Move to a terminal state, recording end time and duration.
    pub fn finish(&mut self, status: JobStatus, message: &str) {
        let now = Utc::now();
        self.status = status;
        self.finished_at = Some(now);
        self.duration_secs = Some((now - self.started_at).num_seconds());
        self.message = Some(message.to_string());
    }
}
