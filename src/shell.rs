//! Line commands for an interactive session.
//!
//! Each input line is split (double quotes group words) and parsed with clap. Lock conflicts
//! and validation failures are rendered as messages; they never end the session.

use casework_core::{
    parse_score, CaseworkError, CaseworkResult, Holder, LockState, NoteId, PatientDraft,
    PatientFilter, PatientId, PatientRecord, PatientRegister, PatientStatus, TestScores,
    ToggleOutcome,
};
use casework_lease::Clock;
use clap::{Args, Parser, Subcommand};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    disable_help_flag = true,
    disable_help_subcommand = true,
    disable_version_flag = true
)]
struct ShellLine {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Switch the session user
    Login { user: String, name: String },
    /// List patients, optionally filtered
    List {
        search: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Case counts per status
    Stats,
    /// Show one patient with notes
    Show { patient: String },
    /// Create a patient
    Create {
        name: String,
        /// Birth date (YYYY-MM-DD)
        birth_date: String,
        diagnosis: String,
    },
    /// Open a patient for editing (acquires the edit lock)
    Edit { patient: String },
    /// Save an open edit and release the lock
    Save {
        patient: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        diagnosis: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        school: Option<String>,
        #[command(flatten)]
        scores: ScoreArgs,
    },
    /// Abandon an open edit and release the lock
    Cancel { patient: String },
    /// Delete a patient
    Delete { patient: String },
    /// Toggle the edit lock on a patient
    Lock { patient: String },
    /// Add a clinical note
    Note {
        patient: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Replace the text of a clinical note
    NoteEdit {
        patient: String,
        note_id: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Evict expired locks now
    Sweep,
    /// Show commands
    Help,
    /// End the session
    Quit,
}

/// Score flags for `save`. An empty value (`--nice ""`) clears the score.
#[derive(Args, Debug, Default)]
struct ScoreArgs {
    #[arg(long)]
    nice: Option<String>,
    #[arg(long)]
    amse: Option<String>,
    #[arg(long)]
    scq: Option<String>,
    #[arg(long)]
    icv: Option<String>,
    #[arg(long)]
    ive: Option<String>,
    #[arg(long)]
    imt: Option<String>,
    #[arg(long)]
    ivp: Option<String>,
    #[arg(long)]
    cit: Option<String>,
}

impl ScoreArgs {
    fn apply(self, scores: &mut TestScores) -> CaseworkResult<()> {
        for (arg, slot) in [
            (self.nice, &mut scores.nice),
            (self.amse, &mut scores.amse),
            (self.scq, &mut scores.scq),
            (self.icv, &mut scores.wisc.icv),
            (self.ive, &mut scores.wisc.ive),
            (self.imt, &mut scores.wisc.imt),
            (self.ivp, &mut scores.wisc.ivp),
            (self.cit, &mut scores.wisc.cit),
        ] {
            if let Some(value) = arg {
                *slot = parse_score(&value)?;
            }
        }
        Ok(())
    }
}

/// What the caller should do after a line has been handled.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue(String),
    Quit,
}

pub struct Session {
    register: Arc<Mutex<PatientRegister>>,
    clock: Arc<dyn Clock>,
    user: Holder,
}

/// Splits a line on whitespace, keeping double-quoted segments together.
pub fn split_line(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_word = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

fn lock_badge(state: &LockState) -> String {
    match state {
        LockState::Unlocked => String::new(),
        LockState::LockedBySelf => " [locked by you]".into(),
        LockState::LockedByOther { holder_name } => format!(" [locked by {holder_name}]"),
    }
}

fn conflict_message(err: &CaseworkError, action: &str) -> String {
    match err {
        CaseworkError::LockConflict(conflict) => format!(
            "This patient is being edited by {}. {action}",
            conflict.holder_name
        ),
        other => format!("error: {other}"),
    }
}

impl Session {
    pub fn new(register: Arc<Mutex<PatientRegister>>, clock: Arc<dyn Clock>, user: Holder) -> Self {
        Self {
            register,
            clock,
            user,
        }
    }

    pub fn user(&self) -> &Holder {
        &self.user
    }

    /// Handles one input line.
    pub fn execute(&mut self, line: &str) -> Flow {
        let words = split_line(line);
        if words.is_empty() {
            return Flow::Continue(String::new());
        }

        let command = match ShellLine::try_parse_from(&words) {
            Ok(parsed) => parsed.command,
            Err(e) => return Flow::Continue(e.to_string().trim_end().to_owned()),
        };

        match command {
            Command::Quit => Flow::Quit,
            Command::Help => Flow::Continue(Self::help()),
            Command::Login { user, name } => {
                self.user = Holder::new(user, name);
                tracing::info!(user = %self.user.id, "session user changed");
                Flow::Continue(format!("Logged in as {} ({})", self.user.name, self.user.id))
            }
            command => {
                let Ok(mut register) = self.register.lock() else {
                    return Flow::Continue("error: patient register is unavailable".into());
                };
                let now = self.clock.now_millis();
                let output = self
                    .run(&mut register, command, now)
                    .unwrap_or_else(|e| format!("error: {e}"));
                Flow::Continue(output)
            }
        }
    }

    fn help() -> String {
        use clap::CommandFactory;
        ShellLine::command()
            .render_help()
            .to_string()
            .trim_end()
            .to_owned()
    }

    /// Resolves a patient by canonical id or by case number.
    fn resolve(register: &PatientRegister, reference: &str) -> CaseworkResult<PatientId> {
        if PatientId::is_canonical(reference) {
            return PatientId::parse(reference);
        }
        register
            .find_by_case_number(reference)
            .map(|record| record.id.clone())
            .ok_or_else(|| CaseworkError::NotFound(reference.to_owned()))
    }

    fn summary(record: &PatientRecord, badge: &str) -> String {
        format!(
            "#{} {} | {} | {}{}",
            record.case_number,
            record.details.name,
            record.details.diagnosis,
            record.details.status,
            badge
        )
    }

    fn run(
        &self,
        register: &mut PatientRegister,
        command: Command,
        now: u64,
    ) -> CaseworkResult<String> {
        let user = &self.user;
        let output = match command {
            Command::List { search, status } => {
                let filter = PatientFilter {
                    search,
                    status: status
                        .as_deref()
                        .map(str::parse::<PatientStatus>)
                        .transpose()?,
                };
                let ids: Vec<PatientId> = register
                    .list(&filter)
                    .into_iter()
                    .map(|record| record.id.clone())
                    .collect();
                if ids.is_empty() {
                    return Ok("No patients found.".into());
                }
                let mut out = String::new();
                for id in ids {
                    let badge = lock_badge(&register.lock_state(&id, &user.id, now)?);
                    let _ = writeln!(out, "{}", Self::summary(register.get(&id)?, &badge));
                }
                out.trim_end().to_owned()
            }
            Command::Stats => {
                let stats = register.stats();
                format!(
                    "total: {}, pending: {}, follow-up: {}, discharged: {}",
                    stats.total, stats.pending, stats.follow_up, stats.discharged
                )
            }
            Command::Show { patient } => {
                let id = Self::resolve(register, &patient)?;
                let badge = lock_badge(&register.lock_state(&id, &user.id, now)?);
                let record = register.get(&id)?;
                let mut out = Self::summary(record, &badge);
                let details = &record.details;
                let _ = write!(
                    out,
                    "\nid: {}\nborn: {} (age {})",
                    record.id,
                    details.birth_date,
                    record.age_at(now)
                );
                if let Some(school) = &details.school {
                    let _ = write!(out, "\nschool: {school}");
                }
                if let Some(centre) = &details.health_centre {
                    let _ = write!(out, "\nhealth centre: {centre}");
                }
                if let Some(referral) = &details.referral {
                    let _ = write!(out, "\nreferred by: {referral}");
                }
                if details.school_protocol {
                    let _ = write!(out, "\nschool protocol: requested");
                }
                if !details.scores.is_empty() {
                    let _ = write!(out, "\ntests: {}", details.scores);
                }
                for note in &record.notes {
                    let _ = write!(
                        out,
                        "\n  - {} {} ({}): {}",
                        note.id, note.written_on, note.author, note.content
                    );
                }
                out
            }
            Command::Create {
                name,
                birth_date,
                diagnosis,
            } => {
                let draft = PatientDraft::new(&name, &birth_date, &diagnosis)?;
                let record = register.create(draft, now)?;
                format!("Created {}", Self::summary(&record, ""))
            }
            Command::Edit { patient } => {
                let id = Self::resolve(register, &patient)?;
                match register.open_for_edit(&id, user, now) {
                    Ok(record) => format!("Editing {}", Self::summary(&record, " [locked by you]")),
                    Err(e) => conflict_message(&e, "Try again later."),
                }
            }
            Command::Save {
                patient,
                name,
                diagnosis,
                status,
                school,
                scores,
            } => {
                let id = Self::resolve(register, &patient)?;
                let mut draft = register.get(&id)?.details.clone();
                if let Some(name) = name {
                    draft.name = name.parse()?;
                }
                if let Some(diagnosis) = diagnosis {
                    draft.diagnosis = diagnosis.parse()?;
                }
                if let Some(status) = status {
                    draft.status = status.parse::<PatientStatus>()?;
                }
                if let Some(school) = school {
                    draft.school = Some(school).filter(|s| !s.trim().is_empty());
                }
                scores.apply(&mut draft.scores)?;
                match register.save_edit(&id, user, draft, now) {
                    Ok(record) => format!("Saved {}", Self::summary(&record, "")),
                    Err(e) => conflict_message(&e, "Your changes were not saved."),
                }
            }
            Command::Cancel { patient } => {
                let id = Self::resolve(register, &patient)?;
                if register.cancel_edit(&id, &user.id, now) {
                    "Edit cancelled.".into()
                } else {
                    "You are not editing this patient.".into()
                }
            }
            Command::Delete { patient } => {
                let id = Self::resolve(register, &patient)?;
                match register.delete(&id, user, now) {
                    Ok(record) => format!("Deleted #{}", record.case_number),
                    Err(e) => conflict_message(&e, "It cannot be deleted."),
                }
            }
            Command::Lock { patient } => {
                let id = Self::resolve(register, &patient)?;
                let name = register.get(&id)?.details.name.clone();
                match register.toggle_lock(&id, user, now)? {
                    ToggleOutcome::Acquired => format!("{name} locked for your editing"),
                    ToggleOutcome::Released => format!("{name} is available for editing"),
                    ToggleOutcome::Conflict { holder_name } => {
                        format!("This patient is being edited by {holder_name}.")
                    }
                }
            }
            Command::Note { patient, text } => {
                let id = Self::resolve(register, &patient)?;
                match register.add_note(&id, user, &text.join(" "), None, now) {
                    Ok(note) => format!("Added note {}", note.id),
                    Err(e) => conflict_message(&e, "The note was not added."),
                }
            }
            Command::NoteEdit {
                patient,
                note_id,
                text,
            } => {
                let id = Self::resolve(register, &patient)?;
                let note_id: NoteId = note_id.parse()?;
                match register.update_note(&id, &note_id, user, &text.join(" "), now) {
                    Ok(note) => format!("Updated note {}", note.id),
                    Err(e) => conflict_message(&e, "The note was not updated."),
                }
            }
            Command::Sweep => {
                let evicted = casework_lease::Sweep::sweep_expired(register, now);
                format!("Released {evicted} expired lock(s).")
            }
            Command::Login { .. } | Command::Help | Command::Quit => String::new(),
        };
        Ok(output)
    }
}
