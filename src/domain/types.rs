//! Shared value types for events, selling points and terminals

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::error::SummaryError;

/// Newtype wrapper for event IDs to provide type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Newtype wrapper for selling point IDs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SellingPointId(pub String);

impl std::fmt::Display for SellingPointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SellingPointId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Newtype wrapper for terminal (EPT) IDs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EptId(pub String);

impl std::fmt::Display for EptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EptId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Monetary amount in minor units (cents)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cents(pub u64);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    #[inline]
    pub fn saturating_add(self, other: Cents) -> Cents {
        Cents(self.0.saturating_add(other.0))
    }
}

impl std::iter::Sum for Cents {
    fn sum<I: Iterator<Item = Cents>>(iter: I) -> Self {
        iter.fold(Cents::ZERO, Cents::saturating_add)
    }
}

/// Fixed-point display: `12345` renders as `123.45`, `10` as `0.10`
impl std::fmt::Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Payment terminal provider (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EptProvider {
    Worldline,
    Sumup,
    Other,
}

impl EptProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            EptProvider::Worldline => "worldline",
            EptProvider::Sumup => "sumup",
            EptProvider::Other => "other",
        }
    }
}

impl std::str::FromStr for EptProvider {
    type Err = SummaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "worldline" => Ok(EptProvider::Worldline),
            "sumup" => Ok(EptProvider::Sumup),
            "other" => Ok(EptProvider::Other),
            _ => Err(SummaryError::UnknownProvider(s.to_string())),
        }
    }
}

impl std::fmt::Display for EptProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed real-world position of a selling point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Event record as listed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    #[serde(deserialize_with = "deserialize_instant")]
    pub start_at: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_instant")]
    pub end_at: DateTime<Utc>,
}

impl Event {
    pub fn duration(&self) -> chrono::Duration {
        self.end_at - self.start_at
    }
}

/// Parse an instant from RFC 3339, a naive ISO-8601 string (taken as UTC)
/// or epoch milliseconds.
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn instant_from_epoch_ms(value: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(value).single()
}

/// Serde adapter accepting the timestamp encodings in [`parse_instant`]
pub fn deserialize_instant<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(InstantVisitor)
}

/// Same as [`deserialize_instant`] for a sequence of instants
pub fn deserialize_instants<'de, D>(deserializer: D) -> Result<Vec<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapped(#[serde(deserialize_with = "deserialize_instant")] DateTime<Utc>);

    let wrapped: Vec<Wrapped> = Vec::deserialize(deserializer)?;
    Ok(wrapped.into_iter().map(|w| w.0).collect())
}

struct InstantVisitor;

impl<'de> serde::de::Visitor<'de> for InstantVisitor {
    type Value = DateTime<Utc>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("an ISO-8601 string or epoch milliseconds")
    }

    fn visit_str<E>(self, value: &str) -> Result<DateTime<Utc>, E>
    where
        E: serde::de::Error,
    {
        parse_instant(value).ok_or_else(|| E::custom(format!("invalid timestamp: {}", value)))
    }

    fn visit_u64<E>(self, value: u64) -> Result<DateTime<Utc>, E>
    where
        E: serde::de::Error,
    {
        let millis = i64::try_from(value).map_err(|_| E::custom("timestamp out of range"))?;
        instant_from_epoch_ms(millis).ok_or_else(|| E::custom("timestamp out of range"))
    }

    fn visit_i64<E>(self, value: i64) -> Result<DateTime<Utc>, E>
    where
        E: serde::de::Error,
    {
        instant_from_epoch_ms(value).ok_or_else(|| E::custom("timestamp out of range"))
    }
}
