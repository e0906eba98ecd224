//! Patient schema.
//!
//! Patient data crosses the boundary as a [`PatientDraft`] (from the shell or a JSON file) and
//! is stored as a [`PatientRecord`]. Every field is either required and validated here, or
//! explicitly optional; there is one `school` field rather than several spellings of "centre".

use crate::error::{CaseworkError, CaseworkResult};
use crate::notes::ClinicalNote;
use casework_lease::{Millis, RecordId};
use casework_types::NonEmptyText;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Date format accepted for birth dates and note dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Largest value a screening score may take (three digits).
pub const MAX_SCORE: u16 = 999;

/// Wall-clock time for a millisecond timestamp. Out-of-range input maps to the epoch.
pub fn timestamp(now: Millis) -> DateTime<Utc> {
    i64::try_from(now)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_default()
}

/// Canonical patient identifier (32 lowercase hex characters, no hyphens).
///
/// # Construction
/// - [`PatientId::new`] generates a fresh identifier for a new record.
/// - [`PatientId::parse`] validates an identifier typed by the user.
///
/// # Display format
/// Always the canonical 32-character form, which is also the key used for leases.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PatientId(Uuid);

impl Default for PatientId {
    fn default() -> Self {
        Self::new()
    }
}

impl PatientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses an identifier that must already be in canonical form.
    ///
    /// Hyphenated or uppercase forms are rejected rather than normalised.
    ///
    /// # Errors
    ///
    /// Returns [`CaseworkError::InvalidInput`] if `input` is not canonical.
    pub fn parse(input: &str) -> CaseworkResult<Self> {
        if !Self::is_canonical(input) {
            return Err(CaseworkError::InvalidInput(format!(
                "patient id must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| CaseworkError::InvalidInput(e.to_string()))
    }

    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// The key this patient's edit lease is stored under.
    pub fn record_id(&self) -> RecordId {
        RecordId::new(self.to_string())
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for PatientId {
    type Err = CaseworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PatientId::parse(s)
    }
}

impl TryFrom<String> for PatientId {
    type Error = CaseworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PatientId::parse(&value)
    }
}

impl From<PatientId> for String {
    fn from(id: PatientId) -> Self {
        id.to_string()
    }
}

/// Where a case is in the diagnostic pathway.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatientStatus {
    #[default]
    Pending,
    FollowUp,
    Discharged,
}

impl PatientStatus {
    pub const ALL: [PatientStatus; 3] = [Self::Pending, Self::FollowUp, Self::Discharged];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::FollowUp => "Follow-up",
            Self::Discharged => "Discharged",
        }
    }
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PatientStatus {
    type Err = CaseworkError;

    /// Accepts the serialised form (`FOLLOW_UP`) as well as `follow-up` and `followup`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalised.as_str() {
            "pending" => Ok(Self::Pending),
            "followup" => Ok(Self::FollowUp),
            "discharged" => Ok(Self::Discharged),
            _ => Err(CaseworkError::InvalidInput(format!(
                "unknown status '{}' (expected pending, follow-up or discharged)",
                s.trim()
            ))),
        }
    }
}

/// Patient details as entered by a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientDraft {
    pub name: NonEmptyText,
    pub birth_date: NaiveDate,
    pub diagnosis: NonEmptyText,
    #[serde(default)]
    pub status: PatientStatus,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub health_centre: Option<String>,
    /// Who referred the case.
    #[serde(default)]
    pub referral: Option<String>,
    /// Whether a school support protocol has been requested.
    #[serde(default)]
    pub school_protocol: bool,
    #[serde(default)]
    pub scores: TestScores,
}

impl PatientDraft {
    /// Builds a draft from the three required fields, leaving the rest at their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CaseworkError::Text`] for a blank name or diagnosis, and
    /// [`CaseworkError::InvalidInput`] if `birth_date` is not `YYYY-MM-DD`.
    pub fn new(name: &str, birth_date: &str, diagnosis: &str) -> CaseworkResult<Self> {
        Ok(Self {
            name: NonEmptyText::new(name)?,
            birth_date: parse_date(birth_date)?,
            diagnosis: NonEmptyText::new(diagnosis)?,
            status: PatientStatus::default(),
            school: None,
            health_centre: None,
            referral: None,
            school_protocol: false,
            scores: TestScores::default(),
        })
    }

    /// Parses a JSON array of drafts.
    ///
    /// # Errors
    ///
    /// Returns [`CaseworkError::Deserialization`] if the JSON is malformed or any draft fails
    /// validation.
    pub fn list_from_json(json: &str) -> CaseworkResult<Vec<Self>> {
        serde_json::from_str(json).map_err(CaseworkError::Deserialization)
    }
}

/// WISC index scores.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiscScores {
    #[serde(default, deserialize_with = "score")]
    pub icv: Option<u16>,
    #[serde(default, deserialize_with = "score")]
    pub ive: Option<u16>,
    #[serde(default, deserialize_with = "score")]
    pub imt: Option<u16>,
    #[serde(default, deserialize_with = "score")]
    pub ivp: Option<u16>,
    #[serde(default, deserialize_with = "score")]
    pub cit: Option<u16>,
}

/// Screening and assessment results recorded on the patient form. Unset scores are `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestScores {
    #[serde(default, deserialize_with = "score")]
    pub nice: Option<u16>,
    #[serde(default, deserialize_with = "score")]
    pub amse: Option<u16>,
    #[serde(default, deserialize_with = "score")]
    pub scq: Option<u16>,
    #[serde(default)]
    pub wisc: WiscScores,
}

impl TestScores {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for TestScores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |score: Option<u16>| score.map_or_else(|| "-".to_owned(), |s| s.to_string());
        let wisc = &self.wisc;
        write!(
            f,
            "NICE {} | AMSE {} | SCQ {} | WISC ICV {} IVE {} IMT {} IVP {} CIT {}",
            show(self.nice),
            show(self.amse),
            show(self.scq),
            show(wisc.icv),
            show(wisc.ive),
            show(wisc.imt),
            show(wisc.ivp),
            show(wisc.cit)
        )
    }
}

/// Parses a score typed by the user. Blank input clears the score.
///
/// # Errors
///
/// Returns [`CaseworkError::InvalidInput`] for non-numeric input or values above
/// [`MAX_SCORE`].
pub fn parse_score(input: &str) -> CaseworkResult<Option<u16>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    input
        .parse::<u16>()
        .ok()
        .filter(|score| *score <= MAX_SCORE)
        .map(Some)
        .ok_or_else(|| {
            CaseworkError::InvalidInput(format!(
                "score must be a whole number from 0 to {MAX_SCORE}, got: '{input}'"
            ))
        })
}

/// Accepts a number, a numeric string, an empty string or null.
fn score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u16>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => u16::try_from(n)
            .ok()
            .filter(|score| *score <= MAX_SCORE)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("score out of range: {n}"))),
        Some(Raw::Text(text)) => parse_score(&text).map_err(de::Error::custom),
    }
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(input: &str) -> CaseworkResult<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|_| {
        CaseworkError::InvalidInput(format!("date must be YYYY-MM-DD, got: '{}'", input))
    })
}

/// A stored patient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: PatientId,
    /// Short human-facing case number (four digits).
    pub case_number: String,
    #[serde(flatten)]
    pub details: PatientDraft,
    #[serde(default)]
    pub notes: Vec<ClinicalNote>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PatientRecord {
    /// Completed years of age on `today`. Never negative.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        let birth = self.details.birth_date;
        let mut age = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            age -= 1;
        }
        u32::try_from(age).unwrap_or(0)
    }

    /// Age on the UTC date of `now`.
    pub fn age_at(&self, now: Millis) -> u32 {
        self.age_on(timestamp(now).date_naive())
    }

    pub fn note(&self, note_id: &crate::NoteId) -> Option<&ClinicalNote> {
        self.notes.iter().find(|note| &note.id == note_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_born(birth_date: &str) -> PatientRecord {
        PatientRecord {
            id: PatientId::new(),
            case_number: "1033".into(),
            details: PatientDraft::new("Test Patient", birth_date, "TDAH").unwrap(),
            notes: Vec::new(),
            created_at: DateTime::default(),
            updated_at: DateTime::default(),
        }
    }

    #[test]
    fn test_patient_id_display_is_canonical() {
        let id = PatientId::new();
        let canonical = id.to_string();
        assert!(PatientId::is_canonical(&canonical));
        assert_eq!(id.record_id().as_str(), canonical);
    }

    #[test]
    fn test_patient_id_parse_rejects_hyphenated() {
        let err = PatientId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap_err();
        assert!(
            matches!(err, CaseworkError::InvalidInput(msg) if msg.contains("32 lowercase hex"))
        );
        assert!(PatientId::parse("550E8400E29B41D4A716446655440000").is_err());
        assert!(PatientId::parse("550e8400e29b41d4a716446655440000").is_ok());
    }

    #[test]
    fn test_status_parses_loose_spellings() {
        assert_eq!("FOLLOW_UP".parse::<PatientStatus>().unwrap(), PatientStatus::FollowUp);
        assert_eq!("follow-up".parse::<PatientStatus>().unwrap(), PatientStatus::FollowUp);
        assert_eq!(" Discharged ".parse::<PatientStatus>().unwrap(), PatientStatus::Discharged);
        assert!("closed".parse::<PatientStatus>().is_err());
    }

    #[test]
    fn test_draft_rejects_bad_date() {
        let err = PatientDraft::new("Ana", "04/08/2012", "TDAH").unwrap_err();
        assert!(matches!(err, CaseworkError::InvalidInput(msg) if msg.contains("YYYY-MM-DD")));
    }

    #[test]
    fn test_draft_rejects_blank_name() {
        let err = PatientDraft::new("  ", "2012-08-04", "TDAH").unwrap_err();
        assert!(matches!(err, CaseworkError::Text(_)));
    }

    #[test]
    fn test_drafts_from_json_fill_defaults() {
        let json = r#"[{"name": "Lidia", "birth_date": "2012-08-04", "diagnosis": "Rasgos TEA"},
                       {"name": "Marc", "birth_date": "2015-01-20", "diagnosis": "TDAH",
                        "status": "FOLLOW_UP", "school": "CEIP Son Serra", "school_protocol": true}]"#;
        let drafts = PatientDraft::list_from_json(json).unwrap();

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].status, PatientStatus::Pending);
        assert_eq!(drafts[0].school, None);
        assert_eq!(drafts[1].status, PatientStatus::FollowUp);
        assert!(drafts[1].school_protocol);
    }

    #[test]
    fn test_drafts_from_json_rejects_missing_diagnosis() {
        let json = r#"[{"name": "Lidia", "birth_date": "2012-08-04"}]"#;
        assert!(matches!(
            PatientDraft::list_from_json(json),
            Err(CaseworkError::Deserialization(_))
        ));
    }

    #[test]
    fn test_age_counts_completed_years() {
        let record = record_born("2012-08-04");
        let on = |d: &str| record.age_on(parse_date(d).unwrap());

        assert_eq!(on("2024-08-03"), 11);
        assert_eq!(on("2024-08-04"), 12);
        assert_eq!(on("2011-01-01"), 0);
    }

    #[test]
    fn test_age_at_uses_utc_date_of_timestamp() {
        let record = record_born("2012-08-04");
        let birthday = 1_722_729_600_000; // 2024-08-04T00:00:00Z

        assert_eq!(record.age_at(birthday - 1), 11);
        assert_eq!(record.age_at(birthday), 12);
    }

    #[test]
    fn test_scores_accept_numbers_and_blank_strings() {
        let json = r#"[{"name": "Lidia", "birth_date": "2012-08-04", "diagnosis": "Rasgos TEA",
                        "scores": {"nice": 17, "amse": "", "scq": "22",
                                   "wisc": {"icv": 89, "cit": null}}}]"#;
        let scores = PatientDraft::list_from_json(json).unwrap()[0].scores;

        assert_eq!(scores.nice, Some(17));
        assert_eq!(scores.amse, None);
        assert_eq!(scores.scq, Some(22));
        assert_eq!(scores.wisc.icv, Some(89));
        assert_eq!(scores.wisc.ive, None);
        assert_eq!(scores.wisc.cit, None);
    }

    #[test]
    fn test_scores_reject_out_of_range() {
        let json = r#"[{"name": "Lidia", "birth_date": "2012-08-04", "diagnosis": "Rasgos TEA",
                        "scores": {"nice": 1000}}]"#;
        assert!(PatientDraft::list_from_json(json).is_err());

        assert_eq!(parse_score(" 999 ").unwrap(), Some(999));
        assert_eq!(parse_score("").unwrap(), None);
        assert!(matches!(parse_score("-1"), Err(CaseworkError::InvalidInput(_))));
        assert!(matches!(parse_score("abc"), Err(CaseworkError::InvalidInput(_))));
    }

    #[test]
    fn test_scores_display_marks_unset_values() {
        let mut scores = TestScores::default();
        assert!(scores.is_empty());
        scores.nice = Some(17);
        assert_eq!(
            scores.to_string(),
            "NICE 17 | AMSE - | SCQ - | WISC ICV - IVE - IMT - IVP - CIT -"
        );
    }
}
