//! Free-text clinical notes attached to a patient.

use crate::error::{CaseworkError, CaseworkResult};
use casework_types::NonEmptyText;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(Uuid);

impl NoteId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for NoteId {
    type Err = CaseworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| CaseworkError::InvalidInput(format!("invalid note id: '{}'", s)))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalNote {
    pub id: NoteId,
    /// Clinical date the note refers to.
    pub written_on: NaiveDate,
    pub content: NonEmptyText,
    /// Display name of whoever wrote or last edited the note.
    pub author: String,
}

impl ClinicalNote {
    pub fn new(written_on: NaiveDate, content: &str, author: &str) -> CaseworkResult<Self> {
        Ok(Self {
            id: NoteId::new(),
            written_on,
            content: NonEmptyText::new(content)?,
            author: author.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_id_round_trips_through_display() {
        let id = NoteId::new();
        let parsed: NoteId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_note_rejects_blank_content() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert!(matches!(
            ClinicalNote::new(date, "   ", "Dr Vidal"),
            Err(CaseworkError::Text(_))
        ));
    }
}
