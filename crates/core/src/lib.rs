//! # Casework Core
//!
//! Patient records for a paediatric diagnostic service, and the lease-gated operations the
//! session shell runs against them.
//!
//! This crate contains pure in-memory data operations:
//! - The patient schema ([`PatientDraft`] at the input boundary, [`PatientRecord`] once stored)
//! - Free-text clinical notes per patient
//! - [`PatientRegister`], which owns the records together with a
//!   [`LeaseController`](casework_lease::LeaseController) and routes every edit, delete and
//!   note update through it
//!
//! **No surface concerns**: argument parsing, terminal output and the sweep schedule belong in
//! the `casework-run` binary.

pub mod error;
pub mod notes;
pub mod patient;
pub mod register;
pub mod seed;

pub use casework_lease::{Holder, HolderId, LockConflict, LockState, Millis, ToggleOutcome};
pub use casework_types::NonEmptyText;
pub use error::{CaseworkError, CaseworkResult};
pub use notes::{ClinicalNote, NoteId};
pub use patient::{
    parse_score, PatientDraft, PatientId, PatientRecord, PatientStatus, TestScores, WiscScores,
};
pub use register::{PatientFilter, PatientRegister, PatientStats};
