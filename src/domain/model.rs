use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 試算表匯出的原始資料列，欄位不固定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawResourceRecord {
    pub data: Map<String, Value>,
}

/// Keys that the pipeline owns on a geocoded resource.
const DERIVED_KEYS: [&str; 4] = ["id", "latitude", "longitude", "geocodedAddress"];

impl RawResourceRecord {
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data }
    }

    /// Trimmed, non-empty text value of a field. Numbers are rendered as text
    /// because spreadsheet exports sometimes store zip codes as numbers.
    pub fn field(&self, key: &str) -> Option<String> {
        let text = match self.data.get(key)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn organization(&self) -> Option<String> {
        self.field("Organization")
    }

    pub fn id(&self) -> Option<String> {
        self.field("id")
    }

    /// Existing coordinates, only when both are finite numbers.
    pub fn coordinates(&self) -> Option<Coordinate> {
        let lat = self.data.get("latitude")?.as_f64()?;
        let lng = self.data.get("longitude")?.as_f64()?;
        if lat.is_finite() && lng.is_finite() {
            Some(Coordinate { lat, lng })
        } else {
            None
        }
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.data.insert(key.to_string(), value);
    }
}

impl From<Value> for RawResourceRecord {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(data) => Self { data },
            other => {
                let mut data = Map::new();
                data.insert("value".to_string(), other);
                Self { data }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

/// 外部地理編碼服務的標準化回應
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodingResult {
    pub lat: f64,
    pub lng: f64,
    pub formatted_address: String,
}

impl GeocodingResult {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

/// A raw record enriched with coordinates and a per-load identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodedResource {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub geocoded_address: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl GeocodedResource {
    pub fn new(
        id: String,
        record: RawResourceRecord,
        coordinate: Coordinate,
        geocoded_address: String,
    ) -> Self {
        let mut fields = record.data;
        for key in DERIVED_KEYS {
            fields.remove(key);
        }
        Self {
            id,
            latitude: coordinate.lat,
            longitude: coordinate.lng,
            geocoded_address,
            fields,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.latitude,
            lng: self.longitude,
        }
    }

    pub fn organization(&self) -> Option<&str> {
        self.fields.get("Organization").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    MissingAddress,
    NoResults,
    Failed(String),
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::MissingAddress => write!(f, "No address information"),
            FallbackReason::NoResults => write!(f, "No results found"),
            FallbackReason::Failed(message) => write!(f, "{}", message),
        }
    }
}

/// Per-record result of the geocoding pipeline. Fallback coordinates are
/// fabricated data, so they are tagged instead of silently written.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    Resolved(GeocodedResource),
    Fallback {
        resource: GeocodedResource,
        reason: FallbackReason,
    },
    Dropped {
        record: RawResourceRecord,
        reason: String,
    },
}

impl GeocodeOutcome {
    pub fn resource(&self) -> Option<&GeocodedResource> {
        match self {
            GeocodeOutcome::Resolved(resource) => Some(resource),
            GeocodeOutcome::Fallback { resource, .. } => Some(resource),
            GeocodeOutcome::Dropped { .. } => None,
        }
    }

    pub fn into_resource(self) -> Option<GeocodedResource> {
        match self {
            GeocodeOutcome::Resolved(resource) => Some(resource),
            GeocodeOutcome::Fallback { resource, .. } => Some(resource),
            GeocodeOutcome::Dropped { .. } => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, GeocodeOutcome::Fallback { .. })
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, GeocodeOutcome::Dropped { .. })
    }
}

/// 批次地理編碼時的診斷紀錄，僅供觀察用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodingError {
    pub address: String,
    pub organization: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub outcomes: Vec<GeocodeOutcome>,
    pub errors: Vec<GeocodingError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn resources(&self) -> Vec<GeocodedResource> {
        self.outcomes
            .iter()
            .filter_map(|o| o.resource().cloned())
            .collect()
    }

    pub fn into_resources(self) -> Vec<GeocodedResource> {
        self.outcomes
            .into_iter()
            .filter_map(GeocodeOutcome::into_resource)
            .collect()
    }

    pub fn fallback_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_fallback()).count()
    }
}

/// Loader output in input order, dropped rows included.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub outcomes: Vec<GeocodeOutcome>,
    pub errors: Vec<GeocodingError>,
}

impl LoadReport {
    pub fn resources(&self) -> Vec<GeocodedResource> {
        self.outcomes
            .iter()
            .filter_map(|o| o.resource().cloned())
            .collect()
    }

    pub fn into_resources(self) -> Vec<GeocodedResource> {
        self.outcomes
            .into_iter()
            .filter_map(GeocodeOutcome::into_resource)
            .collect()
    }

    pub fn dropped_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_dropped()).count()
    }

    pub fn fallback_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_fallback()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}
