//! Domain models mirroring the JSON records served by the partituras API.
//! The wire format uses Spanish keys (`nombre`, `autor`, `género`, ...), so
//! every struct keeps English field names and maps them with serde renames.
//! These stay plain data holders; fetching lives in `api` and presentation in
//! `ui`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// One row of the listing endpoint. The server actually returns full records
/// there; everything beyond the id and name is ignored.
pub struct SheetSummary {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
}

impl fmt::Display for SheetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// Full record returned by `GET /partituras/{id}`.
pub struct SheetDetail {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "autor", default)]
    pub author: String,
    #[serde(rename = "género", alias = "genero", default)]
    pub genre: String,
    /// The CSV behind the API stores tempo as a number, but nothing guarantees
    /// that, so we keep whatever arrives as display text.
    #[serde(default, deserialize_with = "text_or_number")]
    pub tempo: String,
    /// Key signatures, space separated.
    #[serde(rename = "claves", default, deserialize_with = "text_or_number")]
    pub keys: String,
    /// Note sequence, space separated.
    #[serde(rename = "notas", default, deserialize_with = "text_or_number")]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// A related sheet suggested for the sheet being viewed.
pub struct Recommendation {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "autor", default)]
    pub author: String,
    #[serde(rename = "género", alias = "genero", default)]
    pub genre: String,
}

impl Recommendation {
    /// `Name - Author`, dropping the dash when the author is blank.
    pub fn display_title(&self) -> String {
        if self.author.trim().is_empty() {
            self.name.clone()
        } else {
            format!("{} - {}", self.name, self.author)
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
/// Body of `POST /recomendar`.
pub struct RecommendRequest {
    pub id_cancion: i64,
    pub num_recomendaciones: usize,
}

/// Accept a JSON string, number, or bool and keep it as text. `null` becomes
/// an empty string.
fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(text) => text,
        serde_json::Value::Number(number) => number.to_string(),
        serde_json::Value::Bool(flag) => flag.to_string(),
        other => other.to_string(),
    })
}
