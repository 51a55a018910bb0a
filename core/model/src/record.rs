//! FILENAME: core/model/src/record.rs
//! PURPOSE: Defines the animal record as fetched from the backing store.
//! CONTEXT: Records are read-only for the whole dashboard session. Empty
//! strings, unknown health states and values of the wrong shape are folded
//! into `None` at deserialization time so that every consumer has a single
//! notion of "unspecified".

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ModelError;
use crate::field::RecordField;

/// Identifier assigned by the backing store.
pub type RecordId = String;

/// Closed set of health states tracked for each animal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Sick,
    Recovering,
}

impl HealthState {
    pub const ALL: [HealthState; 3] = [
        HealthState::Healthy,
        HealthState::Sick,
        HealthState::Recovering,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Sick => "sick",
            HealthState::Recovering => "recovering",
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthState {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "healthy" => Ok(HealthState::Healthy),
            "sick" => Ok(HealthState::Sick),
            "recovering" => Ok(HealthState::Recovering),
            _ => Err(ModelError::UnknownHealthState(s.to_string())),
        }
    }
}

/// One animal as returned by the fetch collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: RecordId,

    #[serde(default, deserialize_with = "non_empty_text")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "non_empty_text")]
    pub race: Option<String>,

    #[serde(default, deserialize_with = "non_empty_text")]
    pub robe: Option<String>,

    /// Free text. Members of a discipline family are encoded as
    /// `"<family>-<subcategory>"`.
    #[serde(default, deserialize_with = "non_empty_text")]
    pub discipline: Option<String>,

    #[serde(default, deserialize_with = "non_empty_text")]
    pub sex: Option<String>,

    /// `None` when the store sent nothing readable.
    #[serde(default, deserialize_with = "crate::date::deserialize_lenient")]
    pub birth_date: Option<NaiveDate>,

    /// `None` when missing or not one of the known states.
    #[serde(default, deserialize_with = "lenient_health_state")]
    pub health_state: Option<HealthState>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Record {
            id: id.into(),
            name: None,
            race: None,
            robe: None,
            discipline: None,
            sex: None,
            birth_date: None,
            health_state: None,
        }
    }

    pub fn with_race(mut self, race: &str) -> Self {
        self.race = non_empty(race);
        self
    }

    pub fn with_robe(mut self, robe: &str) -> Self {
        self.robe = non_empty(robe);
        self
    }

    pub fn with_discipline(mut self, discipline: &str) -> Self {
        self.discipline = non_empty(discipline);
        self
    }

    pub fn with_sex(mut self, sex: &str) -> Self {
        self.sex = non_empty(sex);
        self
    }

    pub fn with_birth_date(mut self, birth_date: NaiveDate) -> Self {
        self.birth_date = Some(birth_date);
        self
    }

    pub fn with_health(mut self, health_state: HealthState) -> Self {
        self.health_state = Some(health_state);
        self
    }

    /// Returns the textual value of a field, `None` when unspecified.
    pub fn text_field(&self, field: RecordField) -> Option<&str> {
        match field {
            RecordField::Race => self.race.as_deref(),
            RecordField::Robe => self.robe.as_deref(),
            RecordField::Discipline => self.discipline.as_deref(),
            RecordField::Sex => self.sex.as_deref(),
            RecordField::HealthState => self.health_state.map(|h| h.as_str()),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Reads a health state, mapping null, unknown names and non-string
/// values to `None`.
fn lenient_health_state<'de, D>(deserializer: D) -> Result<Option<HealthState>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Lenient>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        Lenient::Text(text) => text.parse().ok(),
        Lenient::Other(_) => None,
    }))
}

/// A field value that is either text or something unusable.
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Text(String),
    Other(IgnoredAny),
}

fn non_empty_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Lenient>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        Lenient::Text(text) => non_empty(&text),
        Lenient::Other(_) => None,
    }))
}
