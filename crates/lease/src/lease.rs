//! Lease records and the identifiers they are keyed by.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds since the Unix epoch.
pub type Millis = u64;

/// Opaque identifier of a leased record.
///
/// This matches whatever identifier the patient register uses; the lease crate never looks
/// inside it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of the session user holding a lease.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderId(String);

impl HolderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HolderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The session identity acting on records: a stable id plus a display name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub id: HolderId,
    /// Display name, only used in user-facing messages.
    pub name: String,
}

impl Holder {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: HolderId::new(id),
            name: name.into(),
        }
    }
}

/// A claim of exclusive editing intent over one record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub record_id: RecordId,
    pub holder_id: HolderId,
    pub holder_name: String,
    /// When the lease was created or last renewed.
    pub acquired_at: Millis,
}

impl Lease {
    pub fn new(record_id: RecordId, holder: &Holder, acquired_at: Millis) -> Self {
        Self {
            record_id,
            holder_id: holder.id.clone(),
            holder_name: holder.name.clone(),
            acquired_at,
        }
    }

    /// Milliseconds elapsed since acquisition. A `now` before `acquired_at` counts as zero.
    pub fn age(&self, now: Millis) -> Millis {
        now.saturating_sub(self.acquired_at)
    }
}
