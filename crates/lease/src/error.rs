/// Returned when an action needs exclusive access to a record that another user holds.
///
/// Always recoverable: the caller shows the message and abandons the action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("record is being edited by {holder_name}")]
pub struct LockConflict {
    pub holder_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeaseConfigError {
    #[error("{name} must be a whole number of milliseconds, got: '{value}'")]
    NotANumber { name: &'static str, value: String },
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}
