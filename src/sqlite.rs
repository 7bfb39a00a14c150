// SQLite-backed Cache Store. A single connection guarded by a mutex; every
// call runs on the blocking pool so the async engine never parks a worker
// thread on database I/O. Each add/update range is one transaction, which
// is what bounds transaction size when the engine writes in batches.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::model::{
    Destination, Hotel, JobRun, JobStatus, Language, LookupKind, NoteCategory, NoteType, Resort,
    Room, StaticLookup, Theme,
};
use crate::store::{CacheStatistics, CacheStore, HotelSearchFilter, StoreError, MAX_HOTEL_RESULTS};

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS destinations (
    id INTEGER PRIMARY KEY,
    external_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    country TEXT NOT NULL,
    country_code TEXT NOT NULL,
    timezone TEXT,
    created_at TEXT NOT NULL,
    last_synced_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS resorts (
    id INTEGER PRIMARY KEY,
    external_id INTEGER NOT NULL,
    language TEXT NOT NULL,
    name TEXT NOT NULL,
    destination_id TEXT NOT NULL,
    country TEXT NOT NULL,
    country_code TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_synced_at TEXT NOT NULL,
    UNIQUE (external_id, language)
);

CREATE TABLE IF NOT EXISTS meals (
    id INTEGER PRIMARY KEY,
    external_id INTEGER NOT NULL,
    language TEXT NOT NULL,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_synced_at TEXT NOT NULL,
    UNIQUE (external_id, language)
);

CREATE TABLE IF NOT EXISTS room_types (
    id INTEGER PRIMARY KEY,
    external_id INTEGER NOT NULL,
    language TEXT NOT NULL,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_synced_at TEXT NOT NULL,
    UNIQUE (external_id, language)
);

CREATE TABLE IF NOT EXISTS features (
    id INTEGER PRIMARY KEY,
    external_id INTEGER NOT NULL,
    language TEXT NOT NULL,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_synced_at TEXT NOT NULL,
    UNIQUE (external_id, language)
);

CREATE TABLE IF NOT EXISTS transfer_types (
    id INTEGER PRIMARY KEY,
    external_id INTEGER NOT NULL,
    language TEXT NOT NULL,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_synced_at TEXT NOT NULL,
    UNIQUE (external_id, language)
);

CREATE TABLE IF NOT EXISTS note_types (
    id INTEGER PRIMARY KEY,
    external_id INTEGER NOT NULL,
    category TEXT NOT NULL,
    language TEXT NOT NULL,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_synced_at TEXT NOT NULL,
    UNIQUE (external_id, category, language)
);

CREATE TABLE IF NOT EXISTS themes (
    id INTEGER PRIMARY KEY,
    external_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_synced_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS languages (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_synced_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS hotels (
    id INTEGER PRIMARY KEY,
    external_id INTEGER NOT NULL,
    language TEXT NOT NULL,
    name TEXT NOT NULL,
    address TEXT NOT NULL,
    city TEXT NOT NULL,
    country TEXT NOT NULL,
    resort_id INTEGER,
    destination_id TEXT,
    category REAL,
    latitude REAL,
    longitude REAL,
    phone TEXT,
    email TEXT,
    feature_ids TEXT NOT NULL,
    theme_ids TEXT NOT NULL,
    image_urls TEXT NOT NULL,
    notes TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_synced_at TEXT NOT NULL,
    UNIQUE (external_id, language)
);

CREATE TABLE IF NOT EXISTS rooms (
    id INTEGER PRIMARY KEY,
    hotel_id INTEGER NOT NULL REFERENCES hotels (id) ON DELETE CASCADE,
    external_id INTEGER NOT NULL,
    language TEXT NOT NULL,
    room_type_id INTEGER NOT NULL,
    beds INTEGER NOT NULL,
    extra_beds INTEGER NOT NULL,
    feature_ids TEXT NOT NULL,
    image_urls TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_synced_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_rooms_hotel ON rooms (hotel_id);
CREATE INDEX IF NOT EXISTS idx_hotels_destination ON hotels (destination_id);

CREATE TABLE IF NOT EXISTS job_runs (
    id INTEGER PRIMARY KEY,
    job_type TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    duration_secs INTEGER,
    message TEXT,
    details TEXT
);
"#;

pub struct SqliteCacheStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCacheStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || op(&mut conn.lock()))
            .await
            .map_err(|join_error| StoreError::Task(join_error.to_string()))?
    }
}

fn json_column<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(error))
    })
}

fn parsed_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(error))
    })
}

fn destination_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Destination> {
    Ok(Destination {
        id: row.get(0)?,
        external_id: row.get(1)?,
        name: row.get(2)?,
        country: row.get(3)?,
        country_code: row.get(4)?,
        timezone: row.get(5)?,
        created_at: row.get(6)?,
        last_synced_at: row.get(7)?,
    })
}

fn resort_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Resort> {
    Ok(Resort {
        id: row.get(0)?,
        external_id: row.get(1)?,
        language: row.get(2)?,
        name: row.get(3)?,
        destination_id: row.get(4)?,
        country: row.get(5)?,
        country_code: row.get(6)?,
        created_at: row.get(7)?,
        last_synced_at: row.get(8)?,
    })
}

fn lookup_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StaticLookup> {
    Ok(StaticLookup {
        id: row.get(0)?,
        external_id: row.get(1)?,
        language: row.get(2)?,
        name: row.get(3)?,
        created_at: row.get(4)?,
        last_synced_at: row.get(5)?,
    })
}

fn note_type_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NoteType> {
    Ok(NoteType {
        id: row.get(0)?,
        external_id: row.get(1)?,
        category: parsed_column::<NoteCategory>(row, 2)?,
        language: row.get(3)?,
        name: row.get(4)?,
        created_at: row.get(5)?,
        last_synced_at: row.get(6)?,
    })
}

fn theme_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Theme> {
    Ok(Theme {
        id: row.get(0)?,
        external_id: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
        last_synced_at: row.get(4)?,
    })
}

fn language_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Language> {
    Ok(Language {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
        last_synced_at: row.get(4)?,
    })
}

const HOTEL_COLUMNS: &str = "id, external_id, language, name, address, city, country, resort_id, \
     destination_id, category, latitude, longitude, phone, email, feature_ids, theme_ids, \
     image_urls, notes, created_at, last_synced_at";

fn hotel_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Hotel> {
    Ok(Hotel {
        id: row.get(0)?,
        external_id: row.get(1)?,
        language: row.get(2)?,
        name: row.get(3)?,
        address: row.get(4)?,
        city: row.get(5)?,
        country: row.get(6)?,
        resort_id: row.get(7)?,
        destination_id: row.get(8)?,
        category: row.get(9)?,
        latitude: row.get(10)?,
        longitude: row.get(11)?,
        phone: row.get(12)?,
        email: row.get(13)?,
        feature_ids: json_column(row, 14)?,
        theme_ids: json_column(row, 15)?,
        image_urls: json_column(row, 16)?,
        notes: json_column(row, 17)?,
        created_at: row.get(18)?,
        last_synced_at: row.get(19)?,
    })
}

fn room_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: row.get(0)?,
        hotel_id: row.get(1)?,
        external_id: row.get(2)?,
        language: row.get(3)?,
        room_type_id: row.get(4)?,
        beds: row.get(5)?,
        extra_beds: row.get(6)?,
        feature_ids: json_column(row, 7)?,
        image_urls: json_column(row, 8)?,
        created_at: row.get(9)?,
        last_synced_at: row.get(10)?,
    })
}

fn job_run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobRun> {
    let details: Option<String> = row.get(7)?;
    let details = match details {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(error))
        })?),
        None => None,
    };
    Ok(JobRun {
        id: row.get(0)?,
        job_type: row.get(1)?,
        status: parsed_column::<JobStatus>(row, 2)?,
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        duration_secs: row.get(5)?,
        message: row.get(6)?,
        details,
    })
}

fn lookup_table(kind: LookupKind) -> &'static str {
    match kind {
        LookupKind::Meal => "meals",
        LookupKind::RoomType => "room_types",
        LookupKind::Feature => "features",
        LookupKind::TransferType => "transfer_types",
    }
}

fn select_lookups(
    conn: &Connection,
    table: &str,
    language: &str,
) -> Result<Vec<StaticLookup>, StoreError> {
    let sql = format!(
        "SELECT id, external_id, language, name, created_at, last_synced_at \
         FROM {table} WHERE language = ?1 ORDER BY external_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([language], lookup_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn insert_lookups(
    conn: &mut Connection,
    table: &str,
    rows: &[StaticLookup],
) -> Result<usize, StoreError> {
    let tx = conn.transaction()?;
    {
        let sql = format!(
            "INSERT INTO {table} (external_id, language, name, created_at, last_synced_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)"
        );
        let mut stmt = tx.prepare(&sql)?;
        for row in rows {
            stmt.execute(params![
                row.external_id,
                row.language,
                row.name,
                row.created_at,
                row.last_synced_at
            ])?;
        }
    }
    tx.commit()?;
    Ok(rows.len())
}

fn update_lookup_rows(
    conn: &mut Connection,
    table: &str,
    rows: &[StaticLookup],
) -> Result<usize, StoreError> {
    let tx = conn.transaction()?;
    {
        let sql = format!("UPDATE {table} SET name = ?1, last_synced_at = ?2 WHERE id = ?3");
        let mut stmt = tx.prepare(&sql)?;
        for row in rows {
            stmt.execute(params![row.name, row.last_synced_at, row.id])?;
        }
    }
    tx.commit()?;
    Ok(rows.len())
}

fn insert_rooms(tx: &rusqlite::Transaction<'_>, hotel_id: i64, rooms: &[Room]) -> Result<(), StoreError> {
    let mut stmt = tx.prepare(
        "INSERT INTO rooms (hotel_id, external_id, language, room_type_id, beds, extra_beds, \
         feature_ids, image_urls, created_at, last_synced_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    for room in rooms {
        stmt.execute(params![
            hotel_id,
            room.external_id,
            room.language,
            room.room_type_id,
            room.beds,
            room.extra_beds,
            serde_json::to_string(&room.feature_ids)?,
            serde_json::to_string(&room.image_urls)?,
            room.created_at,
            room.last_synced_at
        ])?;
    }
    Ok(())
}

fn count_rows(conn: &Connection, table: &str) -> Result<u64, StoreError> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(count as u64)
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get_destinations(&self) -> Result<Vec<Destination>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, external_id, name, country, country_code, timezone, created_at, \
                 last_synced_at FROM destinations ORDER BY external_id",
            )?;
            let rows = stmt
                .query_map([], destination_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn add_destinations(&self, rows: &[Destination]) -> Result<usize, StoreError> {
        let rows = rows.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO destinations (external_id, name, country, country_code, \
                     timezone, created_at, last_synced_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for row in &rows {
                    stmt.execute(params![
                        row.external_id,
                        row.name,
                        row.country,
                        row.country_code,
                        row.timezone,
                        row.created_at,
                        row.last_synced_at
                    ])?;
                }
            }
            tx.commit()?;
            Ok(rows.len())
        })
        .await
    }

    async fn update_destinations(&self, rows: &[Destination]) -> Result<usize, StoreError> {
        let rows = rows.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "UPDATE destinations SET name = ?1, country = ?2, country_code = ?3, \
                     timezone = ?4, last_synced_at = ?5 WHERE id = ?6",
                )?;
                for row in &rows {
                    stmt.execute(params![
                        row.name,
                        row.country,
                        row.country_code,
                        row.timezone,
                        row.last_synced_at,
                        row.id
                    ])?;
                }
            }
            tx.commit()?;
            Ok(rows.len())
        })
        .await
    }

    async fn get_resorts(&self, language: &str) -> Result<Vec<Resort>, StoreError> {
        let language = language.to_owned();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, external_id, language, name, destination_id, country, country_code, \
                 created_at, last_synced_at FROM resorts WHERE language = ?1 ORDER BY external_id",
            )?;
            let rows = stmt
                .query_map([language], resort_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn add_resorts(&self, rows: &[Resort]) -> Result<usize, StoreError> {
        let rows = rows.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO resorts (external_id, language, name, destination_id, country, \
                     country_code, created_at, last_synced_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )?;
                for row in &rows {
                    stmt.execute(params![
                        row.external_id,
                        row.language,
                        row.name,
                        row.destination_id,
                        row.country,
                        row.country_code,
                        row.created_at,
                        row.last_synced_at
                    ])?;
                }
            }
            tx.commit()?;
            Ok(rows.len())
        })
        .await
    }

    async fn update_resorts(&self, rows: &[Resort]) -> Result<usize, StoreError> {
        let rows = rows.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "UPDATE resorts SET name = ?1, destination_id = ?2, country = ?3, \
                     country_code = ?4, last_synced_at = ?5 WHERE id = ?6",
                )?;
                for row in &rows {
                    stmt.execute(params![
                        row.name,
                        row.destination_id,
                        row.country,
                        row.country_code,
                        row.last_synced_at,
                        row.id
                    ])?;
                }
            }
            tx.commit()?;
            Ok(rows.len())
        })
        .await
    }

    async fn get_lookups(
        &self,
        kind: LookupKind,
        language: &str,
    ) -> Result<Vec<StaticLookup>, StoreError> {
        let language = language.to_owned();
        self.with_conn(move |conn| select_lookups(conn, lookup_table(kind), &language))
            .await
    }

    async fn add_lookups(
        &self,
        kind: LookupKind,
        rows: &[StaticLookup],
    ) -> Result<usize, StoreError> {
        let rows = rows.to_vec();
        self.with_conn(move |conn| insert_lookups(conn, lookup_table(kind), &rows))
            .await
    }

    async fn update_lookups(
        &self,
        kind: LookupKind,
        rows: &[StaticLookup],
    ) -> Result<usize, StoreError> {
        let rows = rows.to_vec();
        self.with_conn(move |conn| update_lookup_rows(conn, lookup_table(kind), &rows))
            .await
    }

    async fn get_note_types(&self, language: &str) -> Result<Vec<NoteType>, StoreError> {
        let language = language.to_owned();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, external_id, category, language, name, created_at, last_synced_at \
                 FROM note_types WHERE language = ?1 ORDER BY external_id, category",
            )?;
            let rows = stmt
                .query_map([language], note_type_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn add_note_types(&self, rows: &[NoteType]) -> Result<usize, StoreError> {
        let rows = rows.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO note_types (external_id, category, language, name, created_at, \
                     last_synced_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for row in &rows {
                    stmt.execute(params![
                        row.external_id,
                        row.category.as_str(),
                        row.language,
                        row.name,
                        row.created_at,
                        row.last_synced_at
                    ])?;
                }
            }
            tx.commit()?;
            Ok(rows.len())
        })
        .await
    }

    async fn update_note_types(&self, rows: &[NoteType]) -> Result<usize, StoreError> {
        let rows = rows.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "UPDATE note_types SET name = ?1, last_synced_at = ?2 WHERE id = ?3",
                )?;
                for row in &rows {
                    stmt.execute(params![row.name, row.last_synced_at, row.id])?;
                }
            }
            tx.commit()?;
            Ok(rows.len())
        })
        .await
    }

    async fn get_themes(&self) -> Result<Vec<Theme>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, external_id, name, created_at, last_synced_at FROM themes \
                 ORDER BY external_id",
            )?;
            let rows = stmt
                .query_map([], theme_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn add_themes(&self, rows: &[Theme]) -> Result<usize, StoreError> {
        let rows = rows.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO themes (external_id, name, created_at, last_synced_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for row in &rows {
                    stmt.execute(params![
                        row.external_id,
                        row.name,
                        row.created_at,
                        row.last_synced_at
                    ])?;
                }
            }
            tx.commit()?;
            Ok(rows.len())
        })
        .await
    }

    async fn update_themes(&self, rows: &[Theme]) -> Result<usize, StoreError> {
        let rows = rows.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare("UPDATE themes SET name = ?1, last_synced_at = ?2 WHERE id = ?3")?;
                for row in &rows {
                    stmt.execute(params![row.name, row.last_synced_at, row.id])?;
                }
            }
            tx.commit()?;
            Ok(rows.len())
        })
        .await
    }

    async fn get_languages(&self) -> Result<Vec<Language>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, code, name, created_at, last_synced_at FROM languages ORDER BY code",
            )?;
            let rows = stmt
                .query_map([], language_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn add_languages(&self, rows: &[Language]) -> Result<usize, StoreError> {
        let rows = rows.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO languages (code, name, created_at, last_synced_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for row in &rows {
                    stmt.execute(params![row.code, row.name, row.created_at, row.last_synced_at])?;
                }
            }
            tx.commit()?;
            Ok(rows.len())
        })
        .await
    }

    async fn update_languages(&self, rows: &[Language]) -> Result<usize, StoreError> {
        let rows = rows.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx
                    .prepare("UPDATE languages SET name = ?1, last_synced_at = ?2 WHERE id = ?3")?;
                for row in &rows {
                    stmt.execute(params![row.name, row.last_synced_at, row.id])?;
                }
            }
            tx.commit()?;
            Ok(rows.len())
        })
        .await
    }

    async fn get_hotel(
        &self,
        external_id: i32,
        language: &str,
    ) -> Result<Option<Hotel>, StoreError> {
        let language = language.to_owned();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {HOTEL_COLUMNS} FROM hotels WHERE external_id = ?1 AND language = ?2"
            );
            let hotel = conn
                .query_row(&sql, params![external_id, language], hotel_from_row)
                .optional()?;
            Ok(hotel)
        })
        .await
    }

    async fn insert_hotel(&self, hotel: &Hotel, rooms: &[Room]) -> Result<i64, StoreError> {
        let hotel = hotel.clone();
        let rooms = rooms.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO hotels (external_id, language, name, address, city, country, \
                 resort_id, destination_id, category, latitude, longitude, phone, email, \
                 feature_ids, theme_ids, image_urls, notes, created_at, last_synced_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                 ?16, ?17, ?18, ?19)",
                params![
                    hotel.external_id,
                    hotel.language,
                    hotel.name,
                    hotel.address,
                    hotel.city,
                    hotel.country,
                    hotel.resort_id,
                    hotel.destination_id,
                    hotel.category,
                    hotel.latitude,
                    hotel.longitude,
                    hotel.phone,
                    hotel.email,
                    serde_json::to_string(&hotel.feature_ids)?,
                    serde_json::to_string(&hotel.theme_ids)?,
                    serde_json::to_string(&hotel.image_urls)?,
                    serde_json::to_string(&hotel.notes)?,
                    hotel.created_at,
                    hotel.last_synced_at
                ],
            )?;
            let hotel_id = tx.last_insert_rowid();
            insert_rooms(&tx, hotel_id, &rooms)?;
            tx.commit()?;
            Ok(hotel_id)
        })
        .await
    }

    async fn update_hotel(&self, hotel: &Hotel) -> Result<(), StoreError> {
        let hotel = hotel.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE hotels SET name = ?1, address = ?2, city = ?3, country = ?4, \
                 resort_id = ?5, destination_id = ?6, category = ?7, latitude = ?8, \
                 longitude = ?9, phone = ?10, email = ?11, feature_ids = ?12, theme_ids = ?13, \
                 image_urls = ?14, notes = ?15, last_synced_at = ?16 WHERE id = ?17",
                params![
                    hotel.name,
                    hotel.address,
                    hotel.city,
                    hotel.country,
                    hotel.resort_id,
                    hotel.destination_id,
                    hotel.category,
                    hotel.latitude,
                    hotel.longitude,
                    hotel.phone,
                    hotel.email,
                    serde_json::to_string(&hotel.feature_ids)?,
                    serde_json::to_string(&hotel.theme_ids)?,
                    serde_json::to_string(&hotel.image_urls)?,
                    serde_json::to_string(&hotel.notes)?,
                    hotel.last_synced_at,
                    hotel.id
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn replace_rooms(&self, hotel_id: i64, rooms: &[Room]) -> Result<(), StoreError> {
        let rooms = rooms.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM rooms WHERE hotel_id = ?1", params![hotel_id])?;
            insert_rooms(&tx, hotel_id, &rooms)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_rooms(&self, hotel_id: i64) -> Result<Vec<Room>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, hotel_id, external_id, language, room_type_id, beds, extra_beds, \
                 feature_ids, image_urls, created_at, last_synced_at FROM rooms \
                 WHERE hotel_id = ?1 ORDER BY external_id",
            )?;
            let rows = stmt
                .query_map([hotel_id], room_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn search_hotels(&self, filter: &HotelSearchFilter) -> Result<Vec<Hotel>, StoreError> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let mut sql = format!("SELECT {HOTEL_COLUMNS} FROM hotels WHERE 1 = 1");
            let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
            if let Some(language) = &filter.language {
                sql.push_str(" AND language = ?");
                values.push(Box::new(language.clone()));
            }
            if let Some(destination_id) = &filter.destination_id {
                sql.push_str(" AND destination_id = ?");
                values.push(Box::new(destination_id.clone()));
            }
            if let Some(resort_id) = filter.resort_id {
                sql.push_str(" AND resort_id = ?");
                values.push(Box::new(resort_id));
            }
            if let Some(min_category) = filter.min_category {
                sql.push_str(" AND category >= ?");
                values.push(Box::new(min_category));
            }
            if let Some(needle) = &filter.name_contains {
                // LIKE metacharacters in the needle must match literally.
                let escaped = needle
                    .replace('\\', "\\\\")
                    .replace('%', "\\%")
                    .replace('_', "\\_");
                sql.push_str(" AND lower(name) LIKE '%' || lower(?) || '%' ESCAPE '\\'");
                values.push(Box::new(escaped));
            }
            let limit = filter
                .limit
                .unwrap_or(MAX_HOTEL_RESULTS)
                .min(MAX_HOTEL_RESULTS);
            sql.push_str(" ORDER BY name LIMIT ?");
            values.push(Box::new(limit as i64));

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> =
                values.iter().map(|value| value.as_ref()).collect();
            let rows = stmt
                .query_map(&params[..], hotel_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn insert_job_run(&self, run: &JobRun) -> Result<i64, StoreError> {
        let run = run.clone();
        self.with_conn(move |conn| {
            let details = run
                .details
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            conn.execute(
                "INSERT INTO job_runs (job_type, status, started_at, finished_at, duration_secs, \
                 message, details) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    run.job_type,
                    run.status.as_str(),
                    run.started_at,
                    run.finished_at,
                    run.duration_secs,
                    run.message,
                    details
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn update_job_run(&self, run: &JobRun) -> Result<(), StoreError> {
        let run = run.clone();
        self.with_conn(move |conn| {
            let details = run
                .details
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            conn.execute(
                "UPDATE job_runs SET status = ?1, finished_at = ?2, duration_secs = ?3, \
                 message = ?4, details = ?5 WHERE id = ?6",
                params![
                    run.status.as_str(),
                    run.finished_at,
                    run.duration_secs,
                    run.message,
                    details,
                    run.id
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn recent_job_runs(&self, limit: usize) -> Result<Vec<JobRun>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, job_type, status, started_at, finished_at, duration_secs, message, \
                 details FROM job_runs ORDER BY started_at DESC, id DESC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit as i64], job_run_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn statistics(&self) -> Result<CacheStatistics, StoreError> {
        self.with_conn(|conn| {
            let last_completed_sync: Option<DateTime<Utc>> = conn
                .query_row(
                    "SELECT finished_at FROM job_runs WHERE status = 'completed' \
                     ORDER BY finished_at DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(CacheStatistics {
                destinations: count_rows(conn, "destinations")?,
                resorts: count_rows(conn, "resorts")?,
                meals: count_rows(conn, "meals")?,
                room_types: count_rows(conn, "room_types")?,
                features: count_rows(conn, "features")?,
                transfer_types: count_rows(conn, "transfer_types")?,
                note_types: count_rows(conn, "note_types")?,
                themes: count_rows(conn, "themes")?,
                languages: count_rows(conn, "languages")?,
                hotels: count_rows(conn, "hotels")?,
                rooms: count_rows(conn, "rooms")?,
                last_completed_sync,
            })
        })
        .await
    }
}
