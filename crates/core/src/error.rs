use casework_lease::LockConflict;
use casework_types::TextError;

#[derive(Debug, thiserror::Error)]
pub enum CaseworkError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("patient not found: {0}")]
    NotFound(String),
    #[error("note {note_id} not found for patient {patient_id}")]
    NoteNotFound { patient_id: String, note_id: String },
    #[error(transparent)]
    LockConflict(#[from] LockConflict),
    #[error(transparent)]
    Text(#[from] TextError),
    #[error("failed to parse patient data: {0}")]
    Deserialization(serde_json::Error),
    #[error("no free case numbers left")]
    CaseNumbersExhausted,
}

pub type CaseworkResult<T> = std::result::Result<T, CaseworkError>;
