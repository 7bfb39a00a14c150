// Provider-side contract: typed fetch operations against the remote
// inventory API. The engine only ever sees these records; the XML transport
// behind them lives in `sunhotels`.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{LookupKind, NoteCategory};

// Error types for provider calls
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed provider response: {0}")]
    Decode(String),

    #[error("provider rejected the request: {0}")]
    Api(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderLanguage {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderTheme {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderDestination {
    pub id: String,
    pub name: String,
    pub country: String,
    pub country_code: String,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResort {
    pub id: i32,
    pub name: String,
    pub destination_id: String,
    pub country: String,
    pub country_code: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderLookupItem {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderNoteType {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderHotelNote {
    pub note_type_id: i32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRoom {
    pub id: i64,
    pub room_type_id: i32,
    pub beds: i32,
    pub extra_beds: i32,
    pub feature_ids: Vec<i32>,
    pub image_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderHotel {
    pub id: i32,
    pub name: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub resort_id: Option<i32>,
    pub category: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub feature_ids: Vec<i32>,
    pub theme_ids: Vec<i32>,
    pub image_urls: Vec<String>,
    pub notes: Vec<ProviderHotelNote>,
    pub rooms: Vec<ProviderRoom>,
}

/// Per-resource fetch operations against the inventory provider.
///
/// Any failure is recoverable at the granularity the engine chooses
/// (per language, per destination, per hotel); implementations should not
/// retry internally.
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    async fn languages(&self) -> Result<Vec<ProviderLanguage>, ProviderError>;

    async fn themes(&self) -> Result<Vec<ProviderTheme>, ProviderError>;

    async fn destinations(&self, language: &str)
        -> Result<Vec<ProviderDestination>, ProviderError>;

    async fn resorts(&self, language: &str) -> Result<Vec<ProviderResort>, ProviderError>;

    async fn lookup_items(
        &self,
        kind: LookupKind,
        language: &str,
    ) -> Result<Vec<ProviderLookupItem>, ProviderError>;

    async fn note_types(
        &self,
        category: NoteCategory,
        language: &str,
    ) -> Result<Vec<ProviderNoteType>, ProviderError>;

    /// Combined static hotels-and-rooms fetch for one destination.
    async fn static_hotels(
        &self,
        destination_id: &str,
        language: &str,
    ) -> Result<Vec<ProviderHotel>, ProviderError>;
}

// Fixture-backed provider for tests, with failure injection and call
// counters so scope and containment properties can be asserted.
#[cfg(test)]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default, Clone)]
    pub struct Fixture {
        pub languages: Vec<ProviderLanguage>,
        pub themes: Vec<ProviderTheme>,
        pub destinations: Vec<ProviderDestination>,
        pub resorts: Vec<ProviderResort>,
        pub lookups: HashMap<LookupKind, Vec<ProviderLookupItem>>,
        pub note_types: HashMap<NoteCategory, Vec<ProviderNoteType>>,
        pub hotels: HashMap<String, Vec<ProviderHotel>>,
        /// Languages whose per-language fetches all fail.
        pub fail_languages: HashSet<String>,
        /// Fail the language-list call itself (escapes all containment).
        pub fail_language_list: bool,
    }

    #[derive(Default)]
    pub struct MockProvider {
        pub fixture: Mutex<Fixture>,
        pub static_hotel_calls: AtomicUsize,
        /// Optional delay on the language-list call, to hold a sync open.
        pub language_list_delay: Mutex<Option<Duration>>,
    }

    impl MockProvider {
        pub fn with_fixture(fixture: Fixture) -> Self {
            Self {
                fixture: Mutex::new(fixture),
                static_hotel_calls: AtomicUsize::new(0),
                language_list_delay: Mutex::new(None),
            }
        }

        pub fn hotel_call_count(&self) -> usize {
            self.static_hotel_calls.load(Ordering::SeqCst)
        }

        fn check_language(&self, language: &str) -> Result<(), ProviderError> {
            if self.fixture.lock().fail_languages.contains(language) {
                return Err(ProviderError::Api(format!(
                    "injected failure for language {language}"
                )));
            }
            Ok(())
        }

        fn localize(name: &str, language: &str) -> String {
            format!("{name} [{language}]")
        }
    }

    #[async_trait]
    impl InventoryProvider for MockProvider {
        async fn languages(&self) -> Result<Vec<ProviderLanguage>, ProviderError> {
            let delay = *self.language_list_delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let fixture = self.fixture.lock();
            if fixture.fail_language_list {
                return Err(ProviderError::Transport(
                    "injected language list failure".to_string(),
                ));
            }
            Ok(fixture.languages.clone())
        }

        async fn themes(&self) -> Result<Vec<ProviderTheme>, ProviderError> {
            Ok(self.fixture.lock().themes.clone())
        }

        async fn destinations(
            &self,
            language: &str,
        ) -> Result<Vec<ProviderDestination>, ProviderError> {
            self.check_language(language)?;
            Ok(self.fixture.lock().destinations.clone())
        }

        async fn resorts(&self, language: &str) -> Result<Vec<ProviderResort>, ProviderError> {
            self.check_language(language)?;
            Ok(self
                .fixture
                .lock()
                .resorts
                .iter()
                .map(|resort| ProviderResort {
                    name: Self::localize(&resort.name, language),
                    ..resort.clone()
                })
                .collect())
        }

        async fn lookup_items(
            &self,
            kind: LookupKind,
            language: &str,
        ) -> Result<Vec<ProviderLookupItem>, ProviderError> {
            self.check_language(language)?;
            Ok(self
                .fixture
                .lock()
                .lookups
                .get(&kind)
                .map(|items| {
                    items
                        .iter()
                        .map(|item| ProviderLookupItem {
                            id: item.id,
                            name: Self::localize(&item.name, language),
                        })
                        .collect()
                })
                .unwrap_or_default())
        }

        async fn note_types(
            &self,
            category: NoteCategory,
            language: &str,
        ) -> Result<Vec<ProviderNoteType>, ProviderError> {
            self.check_language(language)?;
            Ok(self
                .fixture
                .lock()
                .note_types
                .get(&category)
                .map(|items| {
                    items
                        .iter()
                        .map(|item| ProviderNoteType {
                            id: item.id,
                            name: Self::localize(&item.name, language),
                        })
                        .collect()
                })
                .unwrap_or_default())
        }

        async fn static_hotels(
            &self,
            destination_id: &str,
            language: &str,
        ) -> Result<Vec<ProviderHotel>, ProviderError> {
            self.static_hotel_calls.fetch_add(1, Ordering::SeqCst);
            self.check_language(language)?;
            Ok(self
                .fixture
                .lock()
                .hotels
                .get(destination_id)
                .map(|hotels| {
                    hotels
                        .iter()
                        .map(|hotel| ProviderHotel {
                            name: Self::localize(&hotel.name, language),
                            ..hotel.clone()
                        })
                        .collect()
                })
                .unwrap_or_default())
        }
    }

    /// Shared fixture: three languages, two destinations, one hotel that is
    /// reachable from both destinations.
    pub fn standard_fixture() -> Fixture {
        let mut lookups = HashMap::new();
        lookups.insert(
            LookupKind::Meal,
            vec![
                ProviderLookupItem {
                    id: 1,
                    name: "Breakfast".to_string(),
                },
                ProviderLookupItem {
                    id: 2,
                    name: "Half board".to_string(),
                },
            ],
        );
        lookups.insert(
            LookupKind::RoomType,
            vec![
                ProviderLookupItem {
                    id: 7,
                    name: "Double room".to_string(),
                },
                ProviderLookupItem {
                    id: 8,
                    name: "Suite".to_string(),
                },
            ],
        );
        lookups.insert(
            LookupKind::Feature,
            vec![ProviderLookupItem {
                id: 11,
                name: "Pool".to_string(),
            }],
        );
        lookups.insert(
            LookupKind::TransferType,
            vec![ProviderLookupItem {
                id: 21,
                name: "Shared shuttle".to_string(),
            }],
        );

        let mut note_types = HashMap::new();
        note_types.insert(
            NoteCategory::Hotel,
            vec![ProviderNoteType {
                id: 1,
                name: "Check-in information".to_string(),
            }],
        );
        note_types.insert(
            NoteCategory::Room,
            vec![ProviderNoteType {
                id: 1,
                name: "Bedding note".to_string(),
            }],
        );

        let shared_hotel = ProviderHotel {
            id: 303,
            name: "Hotel Mirador".to_string(),
            address: "3 Harbour St".to_string(),
            city: "Palma".to_string(),
            country: "Spain".to_string(),
            resort_id: Some(51),
            category: Some(3.5),
            latitude: Some(39.55),
            longitude: Some(2.63),
            phone: Some("+34 971 000 000".to_string()),
            email: None,
            feature_ids: vec![11],
            theme_ids: vec![1],
            image_urls: vec!["https://img.example/303/1.jpg".to_string()],
            notes: vec![],
            rooms: vec![ProviderRoom {
                id: 3031,
                room_type_id: 7,
                beds: 2,
                extra_beds: 0,
                feature_ids: vec![],
                image_urls: vec![],
            }],
        };

        let mut hotels = HashMap::new();
        hotels.insert(
            "PMI".to_string(),
            vec![
                ProviderHotel {
                    id: 101,
                    name: "Hotel Playa".to_string(),
                    address: "1 Beach Rd".to_string(),
                    city: "Palma".to_string(),
                    country: "Spain".to_string(),
                    resort_id: Some(51),
                    category: Some(4.0),
                    latitude: Some(39.57),
                    longitude: Some(2.65),
                    phone: None,
                    email: Some("info@playa.example".to_string()),
                    feature_ids: vec![11],
                    theme_ids: vec![1, 2],
                    image_urls: vec![
                        "https://img.example/101/1.jpg".to_string(),
                        "https://img.example/101/2.jpg".to_string(),
                    ],
                    notes: vec![ProviderHotelNote {
                        note_type_id: 1,
                        text: "Check-in from 14:00".to_string(),
                    }],
                    rooms: vec![
                        ProviderRoom {
                            id: 1011,
                            room_type_id: 7,
                            beds: 2,
                            extra_beds: 1,
                            feature_ids: vec![11],
                            image_urls: vec!["https://img.example/101/r1.jpg".to_string()],
                        },
                        ProviderRoom {
                            id: 1012,
                            room_type_id: 8,
                            beds: 3,
                            extra_beds: 0,
                            feature_ids: vec![],
                            image_urls: vec![],
                        },
                    ],
                },
                shared_hotel.clone(),
            ],
        );
        hotels.insert("BCN".to_string(), vec![shared_hotel]);

        Fixture {
            languages: vec![
                ProviderLanguage {
                    code: "en".to_string(),
                    name: "English".to_string(),
                },
                ProviderLanguage {
                    code: "de".to_string(),
                    name: "German".to_string(),
                },
                ProviderLanguage {
                    code: "fr".to_string(),
                    name: "French".to_string(),
                },
            ],
            themes: vec![
                ProviderTheme {
                    id: 1,
                    name: "Beach".to_string(),
                },
                ProviderTheme {
                    id: 2,
                    name: "City break".to_string(),
                },
            ],
            destinations: vec![
                ProviderDestination {
                    id: "PMI".to_string(),
                    name: "Mallorca".to_string(),
                    country: "Spain".to_string(),
                    country_code: "ES".to_string(),
                    timezone: Some("Europe/Madrid".to_string()),
                },
                ProviderDestination {
                    id: "BCN".to_string(),
                    name: "Barcelona".to_string(),
                    country: "Spain".to_string(),
                    country_code: "ES".to_string(),
                    timezone: Some("Europe/Madrid".to_string()),
                },
            ],
            resorts: vec![
                ProviderResort {
                    id: 51,
                    name: "Playa de Palma".to_string(),
                    destination_id: "PMI".to_string(),
                    country: "Spain".to_string(),
                    country_code: "ES".to_string(),
                },
                ProviderResort {
                    id: 52,
                    name: "Barceloneta".to_string(),
                    destination_id: "BCN".to_string(),
                    country: "Spain".to_string(),
                    country_code: "ES".to_string(),
                },
            ],
            lookups,
            note_types,
            hotels,
            fail_languages: HashSet::new(),
            fail_language_list: false,
        }
    }
}
