// SunHotels NonStatic XML API transport. Every static-data endpoint is a
// GET with credentials in the query string and an XML body in the response;
// a logical failure comes back as an <Error> element inside an HTTP 200.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::model::{LookupKind, NoteCategory};
use crate::provider::{
    InventoryProvider, ProviderDestination, ProviderError, ProviderHotel, ProviderHotelNote,
    ProviderLanguage, ProviderLookupItem, ProviderNoteType, ProviderResort, ProviderRoom,
    ProviderTheme,
};

pub const DEFAULT_BASE_URL: &str =
    "https://xml.sunhotels.net/15/PostGet/NonStaticXMLAPI.asmx";

#[derive(Debug, Clone)]
pub struct SunHotelsConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl Default for SunHotelsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            username: String::new(),
            password: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct SunHotelsClient {
    http: reqwest::Client,
    config: SunHotelsConfig,
}

impl SunHotelsClient {
    /// The HTTP client is fully configured here; request paths never make
    /// per-call transport decisions.
    pub fn new(config: SunHotelsConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|build_error| ProviderError::Transport(build_error.to_string()))?;
        Ok(Self { http, config })
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        method: &str,
        extra: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}/{method}", self.config.base_url.trim_end_matches('/'));
        let mut query: Vec<(&str, &str)> = vec![
            ("userName", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];
        query.extend_from_slice(extra);

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|send_error| ProviderError::Transport(send_error.to_string()))?;
        if !response.status().is_success() {
            return Err(ProviderError::Api(format!(
                "{method} returned HTTP {}",
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|body_error| ProviderError::Transport(body_error.to_string()))?;
        quick_xml::de::from_str(&body)
            .map_err(|decode_error| ProviderError::Decode(format!("{method}: {decode_error}")))
    }
}

#[async_trait]
impl InventoryProvider for SunHotelsClient {
    async fn languages(&self) -> Result<Vec<ProviderLanguage>, ProviderError> {
        map_languages(self.fetch("GetLanguages", &[]).await?)
    }

    async fn themes(&self) -> Result<Vec<ProviderTheme>, ProviderError> {
        map_themes(self.fetch("GetThemes", &[]).await?)
    }

    async fn destinations(
        &self,
        language: &str,
    ) -> Result<Vec<ProviderDestination>, ProviderError> {
        map_destinations(
            self.fetch("GetDestinations", &[("language", language)])
                .await?,
        )
    }

    async fn resorts(&self, language: &str) -> Result<Vec<ProviderResort>, ProviderError> {
        map_resorts(self.fetch("GetResorts", &[("language", language)]).await?)
    }

    async fn lookup_items(
        &self,
        kind: LookupKind,
        language: &str,
    ) -> Result<Vec<ProviderLookupItem>, ProviderError> {
        let method = match kind {
            LookupKind::Meal => "GetMeals",
            LookupKind::RoomType => "GetRoomTypes",
            LookupKind::Feature => "GetFeatures",
            LookupKind::TransferType => "GetTransferTypes",
        };
        map_lookup_items(method, self.fetch(method, &[("language", language)]).await?)
    }

    async fn note_types(
        &self,
        category: NoteCategory,
        language: &str,
    ) -> Result<Vec<ProviderNoteType>, ProviderError> {
        map_note_types(
            self.fetch(
                "GetNotesTypes",
                &[("language", language), ("type", category.as_str())],
            )
            .await?,
        )
    }

    async fn static_hotels(
        &self,
        destination_id: &str,
        language: &str,
    ) -> Result<Vec<ProviderHotel>, ProviderError> {
        map_hotels(
            self.fetch(
                "GetStaticHotelsAndRooms",
                &[("language", language), ("destinationID", destination_id)],
            )
            .await?,
        )
    }
}

// Wire structures for XML deserialization. Everything defaults so partial
// responses decode instead of failing wholesale.

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct WireError {
    #[serde(rename = "Message")]
    message: String,
}

fn fail_on_error(method: &str, error: Option<WireError>) -> Result<(), ProviderError> {
    match error {
        Some(error) => Err(ProviderError::Api(format!("{method}: {}", error.message))),
        None => Ok(()),
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct LanguagesEnvelope {
    #[serde(rename = "Error")]
    error: Option<WireError>,
    languages: LanguageList,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct LanguageList {
    language: Vec<WireLanguage>,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct WireLanguage {
    #[serde(rename = "isoCode")]
    iso_code: String,
    name: String,
}

fn map_languages(envelope: LanguagesEnvelope) -> Result<Vec<ProviderLanguage>, ProviderError> {
    fail_on_error("GetLanguages", envelope.error)?;
    Ok(envelope
        .languages
        .language
        .into_iter()
        .map(|language| ProviderLanguage {
            code: language.iso_code,
            name: language.name,
        })
        .collect())
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct ThemesEnvelope {
    #[serde(rename = "Error")]
    error: Option<WireError>,
    themes: ThemeList,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct ThemeList {
    theme: Vec<WireTheme>,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct WireTheme {
    #[serde(rename = "themeId")]
    theme_id: i32,
    name: String,
}

fn map_themes(envelope: ThemesEnvelope) -> Result<Vec<ProviderTheme>, ProviderError> {
    fail_on_error("GetThemes", envelope.error)?;
    Ok(envelope
        .themes
        .theme
        .into_iter()
        .map(|theme| ProviderTheme {
            id: theme.theme_id,
            name: theme.name,
        })
        .collect())
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct DestinationsEnvelope {
    #[serde(rename = "Error")]
    error: Option<WireError>,
    destinations: DestinationList,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct DestinationList {
    destination: Vec<WireDestination>,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct WireDestination {
    #[serde(rename = "destinationId")]
    destination_id: String,
    #[serde(rename = "destinationName")]
    destination_name: String,
    #[serde(rename = "countryName")]
    country_name: String,
    #[serde(rename = "countryCode")]
    country_code: String,
    #[serde(rename = "timeZone")]
    time_zone: String,
}

fn map_destinations(
    envelope: DestinationsEnvelope,
) -> Result<Vec<ProviderDestination>, ProviderError> {
    fail_on_error("GetDestinations", envelope.error)?;
    Ok(envelope
        .destinations
        .destination
        .into_iter()
        .map(|destination| ProviderDestination {
            id: destination.destination_id,
            name: destination.destination_name,
            country: destination.country_name,
            country_code: destination.country_code,
            timezone: non_empty(destination.time_zone),
        })
        .collect())
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct ResortsEnvelope {
    #[serde(rename = "Error")]
    error: Option<WireError>,
    resorts: ResortList,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct ResortList {
    resort: Vec<WireResort>,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct WireResort {
    #[serde(rename = "resortId")]
    resort_id: i32,
    #[serde(rename = "resortName")]
    resort_name: String,
    #[serde(rename = "destinationId")]
    destination_id: String,
    #[serde(rename = "countryName")]
    country_name: String,
    #[serde(rename = "countryCode")]
    country_code: String,
}

fn map_resorts(envelope: ResortsEnvelope) -> Result<Vec<ProviderResort>, ProviderError> {
    fail_on_error("GetResorts", envelope.error)?;
    Ok(envelope
        .resorts
        .resort
        .into_iter()
        .map(|resort| ProviderResort {
            id: resort.resort_id,
            name: resort.resort_name,
            destination_id: resort.destination_id,
            country: resort.country_name,
            country_code: resort.country_code,
        })
        .collect())
}

// The four lookup endpoints share one shape; field aliases absorb the
// per-endpoint element names.

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct LookupEnvelope {
    #[serde(rename = "Error")]
    error: Option<WireError>,
    #[serde(
        alias = "meals",
        alias = "roomTypes",
        alias = "features",
        alias = "transferTypes"
    )]
    items: LookupList,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct LookupList {
    #[serde(
        alias = "meal",
        alias = "roomType",
        alias = "feature",
        alias = "transferType"
    )]
    item: Vec<WireLookupItem>,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct WireLookupItem {
    id: i32,
    name: String,
}

fn map_lookup_items(
    method: &str,
    envelope: LookupEnvelope,
) -> Result<Vec<ProviderLookupItem>, ProviderError> {
    fail_on_error(method, envelope.error)?;
    Ok(envelope
        .items
        .item
        .into_iter()
        .map(|item| ProviderLookupItem {
            id: item.id,
            name: item.name,
        })
        .collect())
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct NoteTypesEnvelope {
    #[serde(rename = "Error")]
    error: Option<WireError>,
    #[serde(rename = "notesTypes")]
    notes_types: NoteTypeList,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct NoteTypeList {
    #[serde(rename = "notesType")]
    notes_type: Vec<WireLookupItem>,
}

fn map_note_types(envelope: NoteTypesEnvelope) -> Result<Vec<ProviderNoteType>, ProviderError> {
    fail_on_error("GetNotesTypes", envelope.error)?;
    Ok(envelope
        .notes_types
        .notes_type
        .into_iter()
        .map(|item| ProviderNoteType {
            id: item.id,
            name: item.name,
        })
        .collect())
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct HotelsEnvelope {
    #[serde(rename = "Error")]
    error: Option<WireError>,
    hotels: HotelList,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct HotelList {
    hotel: Vec<WireHotel>,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct WireHotel {
    #[serde(rename = "hotelId")]
    hotel_id: i32,
    name: String,
    address: String,
    city: String,
    country: String,
    #[serde(rename = "resortId")]
    resort_id: Option<i32>,
    category: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    phone: String,
    email: String,
    features: IdList,
    themes: IdList,
    images: ImageList,
    notes: NoteList,
    rooms: RoomList,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct IdList {
    id: Vec<i32>,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct ImageList {
    image: Vec<String>,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct NoteList {
    note: Vec<WireNote>,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct WireNote {
    #[serde(rename = "noteTypeId")]
    note_type_id: i32,
    text: String,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct RoomList {
    room: Vec<WireRoom>,
}

#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
struct WireRoom {
    #[serde(rename = "roomId")]
    room_id: i64,
    #[serde(rename = "roomTypeId")]
    room_type_id: i32,
    beds: i32,
    #[serde(rename = "extraBeds")]
    extra_beds: i32,
    features: IdList,
    images: ImageList,
}

fn map_hotels(envelope: HotelsEnvelope) -> Result<Vec<ProviderHotel>, ProviderError> {
    fail_on_error("GetStaticHotelsAndRooms", envelope.error)?;
    Ok(envelope
        .hotels
        .hotel
        .into_iter()
        .map(|hotel| ProviderHotel {
            id: hotel.hotel_id,
            name: hotel.name,
            address: hotel.address,
            city: hotel.city,
            country: hotel.country,
            resort_id: hotel.resort_id,
            category: hotel.category,
            latitude: hotel.latitude,
            longitude: hotel.longitude,
            phone: non_empty(hotel.phone),
            email: non_empty(hotel.email),
            feature_ids: hotel.features.id,
            theme_ids: hotel.themes.id,
            image_urls: hotel.images.image,
            notes: hotel
                .notes
                .note
                .into_iter()
                .map(|note| ProviderHotelNote {
                    note_type_id: note.note_type_id,
                    text: note.text,
                })
                .collect(),
            rooms: hotel
                .rooms
                .room
                .into_iter()
                .map(|room| ProviderRoom {
                    id: room.room_id,
                    room_type_id: room.room_type_id,
                    beds: room.beds,
                    extra_beds: room.extra_beds,
                    feature_ids: room.features.id,
                    image_urls: room.images.image,
                })
                .collect(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::de::from_str;

    #[test]
    fn deserializes_languages() {
        let xml = r#"
            <getLanguagesResult>
                <languages>
                    <language><isoCode>en</isoCode><name>English</name></language>
                    <language><isoCode>de</isoCode><name>German</name></language>
                </languages>
            </getLanguagesResult>"#;
        let envelope: LanguagesEnvelope = from_str(xml).unwrap();
        let languages = map_languages(envelope).unwrap();
        assert_eq!(languages.len(), 2);
        assert_eq!(languages[0].code, "en");
        assert_eq!(languages[1].name, "German");
    }

    #[test]
    fn error_element_becomes_api_error() {
        let xml = r#"
            <getLanguagesResult>
                <Error><Message>Invalid credentials</Message></Error>
                <languages/>
            </getLanguagesResult>"#;
        let envelope: LanguagesEnvelope = from_str(xml).unwrap();
        let result = map_languages(envelope);
        assert!(matches!(result, Err(ProviderError::Api(message)) if message.contains("Invalid credentials")));
    }

    #[test]
    fn deserializes_destinations_with_optional_timezone() {
        let xml = r#"
            <getDestinationsResult>
                <destinations>
                    <destination>
                        <destinationId>PMI</destinationId>
                        <destinationName>Mallorca</destinationName>
                        <countryName>Spain</countryName>
                        <countryCode>ES</countryCode>
                        <timeZone>Europe/Madrid</timeZone>
                    </destination>
                    <destination>
                        <destinationId>BCN</destinationId>
                        <destinationName>Barcelona</destinationName>
                        <countryName>Spain</countryName>
                        <countryCode>ES</countryCode>
                        <timeZone></timeZone>
                    </destination>
                </destinations>
            </getDestinationsResult>"#;
        let destinations: Vec<ProviderDestination> =
            map_destinations(from_str(xml).unwrap()).unwrap();
        assert_eq!(destinations[0].timezone.as_deref(), Some("Europe/Madrid"));
        assert_eq!(destinations[1].timezone, None);
    }

    #[test]
    fn lookup_aliases_cover_every_endpoint_shape() {
        let meals = r#"
            <getMealsResult>
                <meals>
                    <meal><id>1</id><name>Breakfast</name></meal>
                </meals>
            </getMealsResult>"#;
        let items = map_lookup_items("GetMeals", from_str(meals).unwrap()).unwrap();
        assert_eq!(items[0].id, 1);

        let features = r#"
            <getFeaturesResult>
                <features>
                    <feature><id>11</id><name>Pool</name></feature>
                    <feature><id>12</id><name>Spa</name></feature>
                </features>
            </getFeaturesResult>"#;
        let items = map_lookup_items("GetFeatures", from_str(features).unwrap()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].name, "Spa");
    }

    #[test]
    fn deserializes_hotel_graph() {
        let xml = r#"
            <getStaticHotelsAndRoomsResult>
                <hotels>
                    <hotel>
                        <hotelId>101</hotelId>
                        <name>Hotel Playa</name>
                        <address>1 Beach Rd</address>
                        <city>Palma</city>
                        <country>Spain</country>
                        <resortId>51</resortId>
                        <category>4</category>
                        <latitude>39.57</latitude>
                        <longitude>2.65</longitude>
                        <phone></phone>
                        <email>info@playa.example</email>
                        <features><id>11</id><id>12</id></features>
                        <themes><id>1</id></themes>
                        <images>
                            <image>https://img.example/101/1.jpg</image>
                        </images>
                        <notes>
                            <note><noteTypeId>1</noteTypeId><text>Check-in from 14:00</text></note>
                        </notes>
                        <rooms>
                            <room>
                                <roomId>1011</roomId>
                                <roomTypeId>7</roomTypeId>
                                <beds>2</beds>
                                <extraBeds>1</extraBeds>
                                <features><id>11</id></features>
                                <images/>
                            </room>
                        </rooms>
                    </hotel>
                </hotels>
            </getStaticHotelsAndRoomsResult>"#;
        let hotels = map_hotels(from_str(xml).unwrap()).unwrap();
        assert_eq!(hotels.len(), 1);
        let hotel = &hotels[0];
        assert_eq!(hotel.id, 101);
        assert_eq!(hotel.phone, None);
        assert_eq!(hotel.email.as_deref(), Some("info@playa.example"));
        assert_eq!(hotel.feature_ids, vec![11, 12]);
        assert_eq!(hotel.notes[0].text, "Check-in from 14:00");
        assert_eq!(hotel.rooms[0].id, 1011);
        assert_eq!(hotel.rooms[0].extra_beds, 1);
        assert!(hotel.rooms[0].image_urls.is_empty());
    }

    #[test]
    fn note_types_carry_the_category_query() {
        let xml = r#"
            <getNotesTypesResult>
                <notesTypes>
                    <notesType><id>1</id><name>Check-in information</name></notesType>
                </notesTypes>
            </getNotesTypesResult>"#;
        let note_types = map_note_types(from_str(xml).unwrap()).unwrap();
        assert_eq!(note_types[0].name, "Check-in information");
    }
}
