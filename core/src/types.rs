//! Domain DTOs exchanged with the astrology backend.
//!
//! # Design
//! User records are opaque beyond their id: every other field travels
//! verbatim in a flattened JSON map so the portal never drops attributes the
//! backend adds. Placement data is typed only as far as the portal reads it
//! (sign and degree); the rest is kept alongside.

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ApiError;

/// Backend user identifier, integer or string on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Int(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Int(n) => write!(f, "{n}"),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for UserId {
    fn from(n: i64) -> Self {
        UserId::Int(n)
    }
}

impl From<i32> for UserId {
    fn from(n: i32) -> Self {
        UserId::Int(i64::from(n))
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        match s.parse::<i64>() {
            Ok(n) => UserId::Int(n),
            Err(_) => UserId::Text(s.to_string()),
        }
    }
}

/// A user as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl UserRecord {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Upsert payload. Without an id the backend creates a new user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl UserDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<UserId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }
}

impl From<UserRecord> for UserDraft {
    fn from(record: UserRecord) -> Self {
        Self {
            id: Some(record.id),
            fields: record.fields,
        }
    }
}

/// Typed create/update form. Blank optional fields are left out of the
/// payload so an update does not overwrite them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserForm {
    pub id: Option<UserId>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub birthtime: Option<NaiveTime>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub login: Option<String>,
    pub timezone: Option<String>,
}

impl UserForm {
    pub fn into_draft(self) -> Result<UserDraft, ApiError> {
        let first_name = self.first_name.trim();
        if first_name.is_empty() {
            return Err(ApiError::unsupported("first name is required"));
        }
        let mut draft = UserDraft {
            id: self.id,
            fields: Map::new(),
        }
        .field("first_name", first_name);

        let text_fields = [
            ("last_name", self.last_name),
            ("city", self.city),
            ("country", self.country),
            ("login", self.login),
            ("timezone", self.timezone),
        ];
        for (name, value) in text_fields {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                draft = draft.field(name, value);
            }
        }
        if let Some(date) = self.birthdate {
            draft = draft.field("birthdate", date.format("%Y-%m-%d").to_string());
        }
        if let Some(time) = self.birthtime {
            draft = draft.field("birthtime", time.format("%H:%M").to_string());
        }
        Ok(draft)
    }
}

/// Sign and degree of one celestial body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub sign: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Every placement the backend computed for a user, keyed by body name and
/// kept in the order the backend sent them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlacementSet(Vec<(String, Placement)>);

impl PlacementSet {
    pub fn get(&self, body: &str) -> Option<&Placement> {
        self.0.iter().find(|(name, _)| name == body).map(|(_, p)| p)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn bodies(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Placement)> {
        self.0.iter().map(|(name, p)| (name.as_str(), p))
    }

    /// Decodes either wire shape: an object keyed by body, or a list of
    /// placements carrying a `body` (or `name`) field.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let mut set: Vec<(String, Placement)> = Vec::new();
        for (body, raw) in placement_entries(value)? {
            if set.iter().any(|(name, _)| *name == body) {
                return Err(format!("duplicate placement for {body}"));
            }
            let placement = decode_placement(&body, raw)?;
            set.push((body, placement));
        }
        Ok(Self(set))
    }

    fn take_first(&mut self, names: &[&str]) -> Option<Placement> {
        names.iter().find_map(|wanted| {
            let index = self.0.iter().position(|(name, _)| name == wanted)?;
            Some(self.0.remove(index).1)
        })
    }
}

impl FromIterator<(String, Placement)> for PlacementSet {
    fn from_iter<I: IntoIterator<Item = (String, Placement)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for PlacementSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (body, placement) in &self.0 {
            map.serialize_entry(body, placement)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PlacementSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// Splits a placement payload into `(body, raw placement)` pairs, in wire
/// order, without decoding the placements themselves.
fn placement_entries(value: Value) -> Result<Vec<(String, Value)>, String> {
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| listed_entry(index, item))
            .collect(),
        other => Err(format!(
            "expected placements as an object or a list, got {}",
            json_kind(&other)
        )),
    }
}

fn listed_entry(index: usize, item: Value) -> Result<(String, Value), String> {
    let mut fields = match item {
        Value::Object(fields) => fields,
        other => return Err(format!("placement #{index} is {}, not an object", json_kind(&other))),
    };
    let body = fields.remove("body").or_else(|| fields.remove("name"));
    match body {
        Some(Value::String(body)) => Ok((body, Value::Object(fields))),
        _ => Err(format!("placement #{index} has no body name")),
    }
}

fn decode_placement(body: &str, raw: Value) -> Result<Placement, String> {
    serde_json::from_value(raw).map_err(|e| format!("{body} placement: {e}"))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

pub const SUN: &str = "Sun";
pub const MOON: &str = "Moon";
pub const ASCENDANT: &str = "Ascendant";
const ASCENDANT_SHORT: &str = "Asc";

/// Sun, Moon and Ascendant placements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BigThree {
    #[serde(rename = "Sun")]
    pub sun: Placement,
    #[serde(rename = "Moon")]
    pub moon: Placement,
    #[serde(rename = "Ascendant")]
    pub ascendant: Placement,
}

impl BigThree {
    /// Narrows a placement set to the big three, dropping every other body.
    ///
    /// Returns the name of the first missing body on failure.
    pub fn from_placements(mut set: PlacementSet) -> Result<Self, &'static str> {
        let sun = set.take_first(&[SUN]).ok_or(SUN)?;
        let moon = set.take_first(&[MOON]).ok_or(MOON)?;
        let ascendant = set
            .take_first(&[ASCENDANT, ASCENDANT_SHORT])
            .ok_or(ASCENDANT)?;
        Ok(Self {
            sun,
            moon,
            ascendant,
        })
    }

    /// Narrows a raw placement payload, in either wire shape. Only the three
    /// wanted bodies are decoded; the others may have any shape.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let mut entries = placement_entries(value)?;
        if entries.len() > 3 {
            debug!(bodies = entries.len(), "narrowing full placement set to big three");
        }
        let mut pick = |names: &[&str]| -> Result<Placement, String> {
            let (body, raw) = names
                .iter()
                .find_map(|wanted| {
                    let index = entries.iter().position(|(name, _)| name == wanted)?;
                    Some(entries.swap_remove(index))
                })
                .ok_or_else(|| format!("missing {} placement", names[0]))?;
            decode_placement(&body, raw)
        };
        Ok(Self {
            sun: pick(&[SUN])?,
            moon: pick(&[MOON])?,
            ascendant: pick(&[ASCENDANT, ASCENDANT_SHORT])?,
        })
    }

    pub fn entries(&self) -> [(&'static str, &Placement); 3] {
        [
            (SUN, &self.sun),
            (MOON, &self.moon),
            (ASCENDANT, &self.ascendant),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Booklet,
    Calendar { year: u16 },
}

/// A generated document, bytes exactly as the backend sent them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub user_id: UserId,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn year(&self) -> Option<u16> {
        match self.kind {
            ArtifactKind::Booklet => None,
            ArtifactKind::Calendar { year } => Some(year),
        }
    }

    pub fn suggested_file_name(&self) -> String {
        let id = sanitize_file_component(&self.user_id.to_string());
        match self.kind {
            ArtifactKind::Booklet => format!("booklet_{id}.pdf"),
            ArtifactKind::Calendar { year } => format!("calendar_{id}_{year}.pdf"),
        }
    }
}

fn sanitize_file_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Success half of an `OperationResult`.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Users(Vec<UserRecord>),
    User(UserRecord),
    Placements(PlacementSet),
    BigThree(BigThree),
    Artifact(Artifact),
    Health(Value),
}

/// Outcome of exactly one operator action.
pub type OperationResult = Result<Payload, ApiError>;
