//! Patient register.
//!
//! Holds every patient record for the session together with the lease controller that guards
//! them. Each user-facing entry point maps onto one lease operation:
//!
//! | entry point        | lease operation                         |
//! |--------------------|-----------------------------------------|
//! | `open_for_edit`    | `guard_edit` (acquire, then read)       |
//! | `save_edit`        | `guard`, update, then `release`         |
//! | `cancel_edit`      | `release`, own lease only               |
//! | `delete`           | `guard`, remove, then `release`         |
//! | `toggle_lock`      | `toggle`                                |
//! | `add_note`/`update_note` | `guard`                           |
//!
//! Creating and reading records needs no lease.

use crate::error::{CaseworkError, CaseworkResult};
use crate::notes::{ClinicalNote, NoteId};
use crate::patient::{timestamp, PatientDraft, PatientId, PatientRecord, PatientStatus};
use casework_lease::{
    Holder, HolderId, InMemoryLeaseStore, LeaseController, LeaseStore, LockState, Millis, Sweep,
    ToggleOutcome,
};
use chrono::NaiveDate;
use rand::Rng;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

const CASE_NUMBER_MIN: u32 = 1000;
const CASE_NUMBER_MAX: u32 = 9999;

/// Search and status filter for [`PatientRegister::list`].
#[derive(Clone, Debug, Default)]
pub struct PatientFilter {
    /// Case-insensitive substring over name, case number, diagnosis, school and health centre.
    pub search: Option<String>,
    pub status: Option<PatientStatus>,
}

impl PatientFilter {
    pub fn matches(&self, record: &PatientRecord) -> bool {
        let status_ok = self
            .status
            .map_or(true, |status| record.details.status == status);
        status_ok && self.matches_search(record)
    }

    fn matches_search(&self, record: &PatientRecord) -> bool {
        let Some(term) = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        else {
            return true;
        };
        let term = term.to_lowercase();
        let details = &record.details;
        let contains = |value: &str| value.to_lowercase().contains(&term);

        contains(details.name.as_str())
            || record.case_number.contains(&term)
            || contains(details.diagnosis.as_str())
            || details.school.as_deref().is_some_and(contains)
            || details.health_centre.as_deref().is_some_and(contains)
    }
}

/// Case counts for the dashboard header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PatientStats {
    pub total: usize,
    pub pending: usize,
    pub follow_up: usize,
    pub discharged: usize,
}

pub struct PatientRegister<S = InMemoryLeaseStore> {
    records: HashMap<PatientId, PatientRecord>,
    leases: LeaseController<S>,
}

impl Default for PatientRegister<InMemoryLeaseStore> {
    fn default() -> Self {
        Self::new(LeaseController::default())
    }
}

impl<S: LeaseStore> PatientRegister<S> {
    pub fn new(leases: LeaseController<S>) -> Self {
        Self {
            records: HashMap::new(),
            leases,
        }
    }

    pub fn leases(&self) -> &LeaseController<S> {
        &self.leases
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // ------------------------------------------------------------------
    // Unguarded operations
    // ------------------------------------------------------------------

    fn next_case_number(&self) -> CaseworkResult<String> {
        let taken: HashSet<&str> = self
            .records
            .values()
            .map(|r| r.case_number.as_str())
            .collect();
        let capacity = (CASE_NUMBER_MAX - CASE_NUMBER_MIN + 1) as usize;
        if taken.len() >= capacity {
            return Err(CaseworkError::CaseNumbersExhausted);
        }

        let mut rng = rand::thread_rng();
        loop {
            let candidate = rng.gen_range(CASE_NUMBER_MIN..=CASE_NUMBER_MAX).to_string();
            if !taken.contains(candidate.as_str()) {
                return Ok(candidate);
            }
        }
    }

    /// Stores a new patient and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`CaseworkError::CaseNumbersExhausted`] if every four-digit case number is in
    /// use.
    pub fn create(&mut self, draft: PatientDraft, now: Millis) -> CaseworkResult<PatientRecord> {
        let record = PatientRecord {
            id: PatientId::new(),
            case_number: self.next_case_number()?,
            details: draft,
            notes: Vec::new(),
            created_at: timestamp(now),
            updated_at: timestamp(now),
        };
        tracing::info!(
            patient = %record.id,
            case = %record.case_number,
            "created patient record"
        );
        self.records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    /// Stores every draft in order, returning the new ids.
    pub fn import(
        &mut self,
        drafts: Vec<PatientDraft>,
        now: Millis,
    ) -> CaseworkResult<Vec<PatientId>> {
        drafts
            .into_iter()
            .map(|draft| self.create(draft, now).map(|record| record.id))
            .collect()
    }

    /// Loads the demo cases from [`crate::seed`].
    pub fn seed_demo_data(&mut self, now: Millis) -> CaseworkResult<Vec<PatientId>> {
        self.import(crate::seed::demo_drafts()?, now)
    }

    pub fn get(&self, id: &PatientId) -> CaseworkResult<&PatientRecord> {
        self.records
            .get(id)
            .ok_or_else(|| CaseworkError::NotFound(id.to_string()))
    }

    pub fn find_by_case_number(&self, case_number: &str) -> Option<&PatientRecord> {
        let case_number = case_number.trim().trim_start_matches('#');
        self.records
            .values()
            .find(|record| record.case_number == case_number)
    }

    /// Matching records, newest first (ties broken by case number).
    pub fn list(&self, filter: &PatientFilter) -> Vec<&PatientRecord> {
        let mut matching: Vec<&PatientRecord> = self
            .records
            .values()
            .filter(|record| filter.matches(record))
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.case_number.cmp(&b.case_number))
        });
        matching
    }

    pub fn stats(&self) -> PatientStats {
        self.records
            .values()
            .fold(PatientStats::default(), |mut stats, record| {
                stats.total += 1;
                match record.details.status {
                    PatientStatus::Pending => stats.pending += 1,
                    PatientStatus::FollowUp => stats.follow_up += 1,
                    PatientStatus::Discharged => stats.discharged += 1,
                }
                stats
            })
    }

    /// Lock badge for `id` as seen by `viewer`.
    pub fn lock_state(
        &mut self,
        id: &PatientId,
        viewer: &HolderId,
        now: Millis,
    ) -> CaseworkResult<LockState> {
        self.get(id)?;
        Ok(self.leases.lock_state(&id.record_id(), viewer, now))
    }

    // ------------------------------------------------------------------
    // Lease-gated operations
    // ------------------------------------------------------------------

    /// Claims the record for `holder` and returns a copy to edit.
    ///
    /// # Errors
    ///
    /// Returns [`CaseworkError::NotFound`] for an unknown id and
    /// [`CaseworkError::LockConflict`] if another user is editing the record.
    pub fn open_for_edit(
        &mut self,
        id: &PatientId,
        holder: &Holder,
        now: Millis,
    ) -> CaseworkResult<PatientRecord> {
        let record = self.get(id)?.clone();
        self.leases
            .guard_edit(&id.record_id(), holder, now, || record)
            .map_err(CaseworkError::from)
    }

    /// Applies `draft` to the record and ends the edit, releasing the lease.
    ///
    /// # Errors
    ///
    /// Returns [`CaseworkError::LockConflict`] if the holder's lease lapsed and somebody else
    /// has since claimed the record. Nothing is written in that case.
    pub fn save_edit(
        &mut self,
        id: &PatientId,
        holder: &Holder,
        draft: PatientDraft,
        now: Millis,
    ) -> CaseworkResult<PatientRecord> {
        let record_id = id.record_id();
        let saved = self
            .leases
            .guard(&record_id, &holder.id, now, || -> CaseworkResult<PatientRecord> {
                let record = self
                    .records
                    .get_mut(id)
                    .ok_or_else(|| CaseworkError::NotFound(id.to_string()))?;
                record.details = draft;
                record.updated_at = timestamp(now);
                Ok(record.clone())
            })??;

        self.leases.release(&record_id);
        tracing::info!(patient = %id, holder = %holder.id, "saved patient record");
        Ok(saved)
    }

    /// Abandons an edit. Returns whether `holder` had a lease to release; another user's lease
    /// is left alone.
    pub fn cancel_edit(&mut self, id: &PatientId, holder: &HolderId, now: Millis) -> bool {
        let record_id = id.record_id();
        if !self.leases.is_held_by(&record_id, holder, now) {
            return false;
        }
        self.leases.release(&record_id);
        true
    }

    /// Removes the record. Does not acquire a lease first, but is refused while another user
    /// holds one.
    pub fn delete(
        &mut self,
        id: &PatientId,
        holder: &Holder,
        now: Millis,
    ) -> CaseworkResult<PatientRecord> {
        self.get(id)?;
        let record_id = id.record_id();
        let removed = self
            .leases
            .guard(&record_id, &holder.id, now, || self.records.remove(id))?
            .ok_or_else(|| CaseworkError::NotFound(id.to_string()))?;

        self.leases.release(&record_id);
        tracing::info!(patient = %id, holder = %holder.id, "deleted patient record");
        Ok(removed)
    }

    /// The lock button on the patient list.
    pub fn toggle_lock(
        &mut self,
        id: &PatientId,
        holder: &Holder,
        now: Millis,
    ) -> CaseworkResult<ToggleOutcome> {
        self.get(id)?;
        Ok(self.leases.toggle(&id.record_id(), holder, now))
    }

    /// Appends a note. `written_on` defaults to the date of `now`.
    pub fn add_note(
        &mut self,
        id: &PatientId,
        holder: &Holder,
        content: &str,
        written_on: Option<NaiveDate>,
        now: Millis,
    ) -> CaseworkResult<ClinicalNote> {
        let note = ClinicalNote::new(
            written_on.unwrap_or_else(|| timestamp(now).date_naive()),
            content,
            &holder.name,
        )?;

        self.get(id)?;
        self.leases
            .guard(&id.record_id(), &holder.id, now, || {
                if let Some(record) = self.records.get_mut(id) {
                    record.notes.push(note.clone());
                    record.updated_at = timestamp(now);
                }
            })?;

        tracing::info!(patient = %id, note = %note.id, "added clinical note");
        Ok(note)
    }

    /// Replaces the text of an existing note.
    pub fn update_note(
        &mut self,
        id: &PatientId,
        note_id: &NoteId,
        holder: &Holder,
        content: &str,
        now: Millis,
    ) -> CaseworkResult<ClinicalNote> {
        let content = casework_types::NonEmptyText::new(content)?;
        if self.get(id)?.note(note_id).is_none() {
            return Err(CaseworkError::NoteNotFound {
                patient_id: id.to_string(),
                note_id: note_id.to_string(),
            });
        }

        let updated = self
            .leases
            .guard(&id.record_id(), &holder.id, now, || -> Option<ClinicalNote> {
                let record = self.records.get_mut(id)?;
                record.updated_at = timestamp(now);
                let note = record.notes.iter_mut().find(|n| &n.id == note_id)?;
                note.content = content;
                note.author = holder.name.clone();
                Some(note.clone())
            })?
            .ok_or_else(|| CaseworkError::NoteNotFound {
                patient_id: id.to_string(),
                note_id: note_id.to_string(),
            })?;

        tracing::info!(patient = %id, note = %note_id, "updated clinical note");
        Ok(updated)
    }
}

impl<S: LeaseStore> Sweep for PatientRegister<S> {
    fn sweep_expired(&mut self, now: Millis) -> usize {
        self.leases.sweep_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casework_lease::LEASE_TTL_MS;

    const T0: Millis = 1_700_000_000_000;

    fn alice() -> Holder {
        Holder::new("alice", "Alice")
    }

    fn bob() -> Holder {
        Holder::new("bob", "Bob")
    }

    fn register_with_one() -> (PatientRegister, PatientId) {
        let mut register = PatientRegister::default();
        let record = register
            .create(
                PatientDraft::new("Blazquez Martinez, Lidia", "2012-08-04", "Rasgos TEA").unwrap(),
                T0,
            )
            .unwrap();
        (register, record.id)
    }

    #[test]
    fn test_create_assigns_four_digit_case_number() {
        let (register, id) = register_with_one();
        let record = register.get(&id).unwrap();

        assert_eq!(record.case_number.len(), 4);
        assert!(record.case_number.parse::<u32>().is_ok());
        assert_eq!(record.created_at.timestamp_millis(), T0 as i64);
    }

    #[test]
    fn test_open_for_edit_blocks_second_user() {
        let (mut register, id) = register_with_one();
        register.open_for_edit(&id, &alice(), T0).unwrap();

        let err = register.open_for_edit(&id, &bob(), T0 + 1_000).unwrap_err();
        assert!(
            matches!(err, CaseworkError::LockConflict(ref c) if c.holder_name == "Alice"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_save_releases_lease() {
        let (mut register, id) = register_with_one();
        register.open_for_edit(&id, &alice(), T0).unwrap();

        let mut draft = register.get(&id).unwrap().details.clone();
        draft.status = PatientStatus::FollowUp;
        let saved = register.save_edit(&id, &alice(), draft, T0 + 10).unwrap();

        assert_eq!(saved.details.status, PatientStatus::FollowUp);
        assert_eq!(
            register.lock_state(&id, &HolderId::from("bob"), T0 + 10).unwrap(),
            LockState::Unlocked
        );
    }

    #[test]
    fn test_save_refused_after_lease_taken_over() {
        let (mut register, id) = register_with_one();
        register.open_for_edit(&id, &alice(), T0).unwrap();
        register
            .open_for_edit(&id, &bob(), T0 + LEASE_TTL_MS)
            .unwrap();

        let draft = PatientDraft::new("Other", "2012-08-04", "TDAH").unwrap();
        let err = register
            .save_edit(&id, &alice(), draft, T0 + LEASE_TTL_MS + 1)
            .unwrap_err();

        assert!(matches!(err, CaseworkError::LockConflict(_)));
        assert_eq!(
            register.get(&id).unwrap().details.name.as_str(),
            "Blazquez Martinez, Lidia"
        );
    }

    #[test]
    fn test_cancel_releases_lease() {
        let (mut register, id) = register_with_one();
        register.open_for_edit(&id, &alice(), T0).unwrap();
        assert!(register.cancel_edit(&id, &alice().id, T0 + 1));

        assert!(register.open_for_edit(&id, &bob(), T0 + 2).is_ok());
    }

    #[test]
    fn test_scores_cannot_be_overwritten_while_another_user_edits() {
        let (mut register, id) = register_with_one();
        let mut alices = register.open_for_edit(&id, &alice(), T0).unwrap().details;
        alices.scores.nice = Some(17);
        alices.scores.wisc.cit = Some(79);

        let mut bobs = register.get(&id).unwrap().details.clone();
        bobs.scores.nice = Some(3);
        assert!(matches!(
            register.save_edit(&id, &bob(), bobs, T0 + 1),
            Err(CaseworkError::LockConflict(_))
        ));
        assert!(register.get(&id).unwrap().details.scores.is_empty());

        register.save_edit(&id, &alice(), alices, T0 + 2).unwrap();
        let scores = register.get(&id).unwrap().details.scores;
        assert_eq!(scores.nice, Some(17));
        assert_eq!(scores.wisc.cit, Some(79));
    }

    #[test]
    fn test_cancel_leaves_other_holders_lease() {
        let (mut register, id) = register_with_one();
        register.open_for_edit(&id, &alice(), T0).unwrap();

        assert!(!register.cancel_edit(&id, &bob().id, T0 + 1));
        assert!(register.open_for_edit(&id, &bob(), T0 + 2).is_err());
    }

    #[test]
    fn test_delete_blocked_by_other_holder() {
        let (mut register, id) = register_with_one();
        register.open_for_edit(&id, &alice(), T0).unwrap();

        assert!(matches!(
            register.delete(&id, &bob(), T0 + 1),
            Err(CaseworkError::LockConflict(_))
        ));
        assert!(register.get(&id).is_ok());

        register.delete(&id, &alice(), T0 + 2).unwrap();
        assert!(matches!(register.get(&id), Err(CaseworkError::NotFound(_))));
        assert!(register.leases().store().is_empty());
    }

    #[test]
    fn test_delete_does_not_acquire() {
        let (mut register, id) = register_with_one();
        let other = register
            .create(PatientDraft::new("Second", "2014-02-02", "TDI").unwrap(), T0)
            .unwrap();

        register.delete(&other.id, &bob(), T0).unwrap();
        assert!(register.leases().store().is_empty());
        assert_eq!(register.len(), 1);
        assert!(register.get(&id).is_ok());
    }

    #[test]
    fn test_notes_guarded_by_lease() {
        let (mut register, id) = register_with_one();
        let note = register
            .add_note(&id, &alice(), "Primera visita", None, T0)
            .unwrap();
        assert_eq!(note.author, "Alice");

        register.toggle_lock(&id, &bob(), T0 + 1).unwrap();
        let err = register
            .update_note(&id, &note.id, &alice(), "Corregido", T0 + 2)
            .unwrap_err();
        assert!(matches!(err, CaseworkError::LockConflict(_)));

        let updated = register
            .update_note(&id, &note.id, &bob(), "Corregido", T0 + 3)
            .unwrap();
        assert_eq!(updated.content.as_str(), "Corregido");
        assert_eq!(updated.author, "Bob");
        assert_eq!(register.get(&id).unwrap().notes.len(), 1);
    }

    #[test]
    fn test_update_unknown_note() {
        let (mut register, id) = register_with_one();
        let err = register
            .update_note(&id, &NoteId::new(), &alice(), "text", T0)
            .unwrap_err();
        assert!(matches!(err, CaseworkError::NoteNotFound { .. }));
    }

    #[test]
    fn test_toggle_unknown_patient() {
        let mut register = PatientRegister::default();
        assert!(matches!(
            register.toggle_lock(&PatientId::new(), &alice(), T0),
            Err(CaseworkError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_filters_and_orders() {
        let mut register = PatientRegister::default();
        let mut first = PatientDraft::new("Lidia", "2012-08-04", "Rasgos TEA").unwrap();
        first.school = Some("IES Joan Maria Thomas".into());
        register.create(first, T0).unwrap();
        let mut second = PatientDraft::new("Marc", "2015-01-20", "TDAH").unwrap();
        second.status = PatientStatus::FollowUp;
        register.create(second, T0 + 1).unwrap();

        let all = register.list(&PatientFilter::default());
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].details.name.as_str(), "Marc");

        let by_school = register.list(&PatientFilter {
            search: Some("joan maria".into()),
            status: None,
        });
        assert_eq!(by_school.len(), 1);
        assert_eq!(by_school[0].details.name.as_str(), "Lidia");

        let follow_up = register.list(&PatientFilter {
            search: None,
            status: Some(PatientStatus::FollowUp),
        });
        assert_eq!(follow_up.len(), 1);

        let stats = register.stats();
        assert_eq!(
            stats,
            PatientStats {
                total: 2,
                pending: 1,
                follow_up: 1,
                discharged: 0
            }
        );
    }

    #[test]
    fn test_sweep_through_register() {
        let (mut register, id) = register_with_one();
        register.toggle_lock(&id, &alice(), T0).unwrap();

        assert_eq!(Sweep::sweep_expired(&mut register, T0 + LEASE_TTL_MS), 1);
        assert!(register.leases().store().is_empty());
    }
}
