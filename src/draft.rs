//! Working state of the attendance page: the loaded roster, the persisted
//! records for the current (date, period), and the Draft Map of pending
//! statuses.
//!
//! Loads are issued as tickets stamped with a generation. Every date or
//! period change bumps the generation, so a response for an older key can be
//! recognised and dropped instead of overwriting newer draft state.

use chrono::NaiveDate;
use rusqlite::Connection;
use std::collections::HashMap;

use crate::error::{StoreError, StoreResult};
use crate::model::{AttendanceStatus, Filter, GradeFilter, Period, PeriodFilter, ViewMode};
use crate::records::{self, AttendanceRecord, HistoryRow, NewAttendance, ReplaceScope};
use crate::roster::{self, RosterStudent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub date: NaiveDate,
    pub period: PeriodFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosterTicket {
    pub generation: u64,
    pub grade: GradeFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Current,
    Stale,
}

/// How far a save reaches when clearing the previous batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveScope {
    /// Replace every record at (date, period), including students the
    /// current grade filter hides.
    #[default]
    DatePeriod,
    /// Replace only the records of students in the loaded roster.
    Roster,
}

impl std::str::FromStr for SaveScope {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "datePeriod" => Ok(SaveScope::DatePeriod),
            "roster" => Ok(SaveScope::Roster),
            other => Err(StoreError::Invalid(format!("unknown save scope: {:?}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub date: NaiveDate,
    pub period: Period,
    pub record_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AttendanceView {
    date: NaiveDate,
    period: PeriodFilter,
    grade: GradeFilter,
    mode: ViewMode,
    generation: u64,
    roster_generation: u64,
    roster: Vec<RosterStudent>,
    existing: Vec<AttendanceRecord>,
    draft: HashMap<String, AttendanceStatus>,
}

impl AttendanceView {
    pub fn new(date: NaiveDate, period: PeriodFilter, grade: GradeFilter) -> Self {
        Self {
            date,
            period,
            grade,
            mode: ViewMode::Mark,
            generation: 0,
            roster_generation: 0,
            roster: Vec::new(),
            existing: Vec::new(),
            draft: HashMap::new(),
        }
    }

    /// Builds a view and runs both loads for its initial filters.
    pub fn open(
        conn: &Connection,
        date: NaiveDate,
        period: PeriodFilter,
        grade: GradeFilter,
    ) -> StoreResult<Self> {
        let mut view = Self::new(date, period, grade);
        view.reload_roster(conn)?;
        view.reload_records(conn)?;
        Ok(view)
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn period(&self) -> PeriodFilter {
        self.period
    }

    pub fn grade(&self) -> GradeFilter {
        self.grade
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn roster(&self) -> &[RosterStudent] {
        &self.roster
    }

    pub fn existing(&self) -> &[AttendanceRecord] {
        &self.existing
    }

    pub fn draft(&self) -> &HashMap<String, AttendanceStatus> {
        &self.draft
    }

    pub fn status_of(&self, student_id: &str) -> Option<AttendanceStatus> {
        self.draft.get(student_id).copied()
    }

    /// `None` means the caller did not pin a generation.
    pub fn is_current(&self, seen: Option<u64>) -> bool {
        seen.map_or(true, |g| g == self.generation)
    }

    /// Switches to a new (date, period) key. Unsaved edits are dropped at
    /// once; the map stays empty until the matching ticket is applied.
    pub fn begin_load(&mut self, date: NaiveDate, period: PeriodFilter) -> LoadTicket {
        self.date = date;
        self.period = period;
        self.generation += 1;
        self.draft.clear();
        self.existing.clear();
        LoadTicket {
            generation: self.generation,
            date,
            period,
        }
    }

    pub fn apply_records(&mut self, ticket: LoadTicket, records: Vec<AttendanceRecord>) -> Applied {
        if ticket.generation != self.generation {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.generation,
                "discarding stale attendance load"
            );
            return Applied::Stale;
        }
        self.draft = records
            .iter()
            .map(|r| (r.student_id.clone(), r.status))
            .collect();
        self.existing = records;
        Applied::Current
    }

    pub fn begin_roster_load(&mut self, grade: GradeFilter) -> RosterTicket {
        self.grade = grade;
        self.roster_generation += 1;
        RosterTicket {
            generation: self.roster_generation,
            grade,
        }
    }

    pub fn apply_roster(&mut self, ticket: RosterTicket, students: Vec<RosterStudent>) -> Applied {
        if ticket.generation != self.roster_generation {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.roster_generation,
                "discarding stale roster load"
            );
            return Applied::Stale;
        }
        self.roster = students;
        Applied::Current
    }

    pub fn reload_records(&mut self, conn: &Connection) -> StoreResult<Applied> {
        let ticket = self.begin_load(self.date, self.period);
        let records = records::load_attendance(conn, ticket.date, ticket.period)?;
        Ok(self.apply_records(ticket, records))
    }

    pub fn reload_roster(&mut self, conn: &Connection) -> StoreResult<Applied> {
        let ticket = self.begin_roster_load(self.grade);
        let students = roster::load_roster(conn, ticket.grade)?;
        Ok(self.apply_roster(ticket, students))
    }

    /// Applies whichever filters changed. Only a date or period change
    /// resets the Draft Map; a grade change reloads the roster alone.
    pub fn change_filters(
        &mut self,
        conn: &Connection,
        date: Option<NaiveDate>,
        period: Option<PeriodFilter>,
        grade: Option<GradeFilter>,
    ) -> StoreResult<()> {
        if let Some(grade) = grade.filter(|g| *g != self.grade) {
            self.grade = grade;
            self.reload_roster(conn)?;
        }
        let date = date.unwrap_or(self.date);
        let period = period.unwrap_or(self.period);
        if date != self.date || period != self.period {
            self.date = date;
            self.period = period;
            self.reload_records(conn)?;
        }
        Ok(())
    }

    pub fn set_status(&mut self, student_id: &str, status: AttendanceStatus) {
        self.draft.insert(student_id.to_string(), status);
    }

    /// Sets every loaded roster student to `status`, overriding individual
    /// choices. Entries for students outside the roster are untouched.
    pub fn mark_all(&mut self, status: AttendanceStatus) {
        for s in &self.roster {
            self.draft.insert(s.id.clone(), status);
        }
    }

    /// One row per roster student with a draft entry, in roster order.
    pub fn candidates(&self, marker: Option<&str>) -> StoreResult<Vec<NewAttendance>> {
        let period = self.save_period()?;
        Ok(self
            .roster
            .iter()
            .filter_map(|s| {
                self.draft.get(&s.id).map(|status| NewAttendance {
                    student_id: s.id.clone(),
                    date: self.date,
                    status: *status,
                    period,
                    subject: None,
                    marked_by: marker.map(str::to_string),
                })
            })
            .collect())
    }

    fn save_period(&self) -> StoreResult<Period> {
        match self.period {
            Filter::Only(p) => Ok(p),
            Filter::All => Err(StoreError::Invalid(
                "select a period before saving attendance".to_string(),
            )),
        }
    }

    /// Replace-on-save commit. On error the Draft Map is left as it was so
    /// the caller can retry.
    pub fn save(
        &mut self,
        conn: &Connection,
        marker: Option<&str>,
        scope: SaveScope,
    ) -> StoreResult<SaveOutcome> {
        let period = self.save_period()?;
        let rows = self.candidates(marker)?;
        let replace = match scope {
            SaveScope::DatePeriod => ReplaceScope::DatePeriod,
            SaveScope::Roster => {
                ReplaceScope::Students(self.roster.iter().map(|s| s.id.clone()).collect())
            }
        };
        let record_ids = records::replace_attendance(conn, self.date, period, &replace, &rows)?;
        match records::load_attendance(conn, self.date, self.period) {
            Ok(existing) => self.existing = existing,
            // The batch is committed; only the history list is out of date.
            Err(e) => tracing::warn!(error = %e, "reloading saved attendance failed"),
        }
        Ok(SaveOutcome {
            date: self.date,
            period,
            record_ids,
        })
    }

    pub fn history(&self) -> Vec<HistoryRow> {
        records::history_rows(&self.existing, &self.roster)
    }
}
