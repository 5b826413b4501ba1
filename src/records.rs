use chrono::{NaiveDate, SecondsFormat, Utc};
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{db_err, DbOp, StoreResult};
use crate::model::{AttendanceStatus, Period, PeriodFilter};
use crate::roster::RosterStudent;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub period: Option<Period>,
    pub subject: Option<String>,
    pub marked_by: Option<String>,
}

/// A row to be inserted by a commit; the id is assigned on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendance {
    pub student_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub period: Period,
    pub subject: Option<String>,
    pub marked_by: Option<String>,
}

/// Which persisted rows a commit replaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceScope {
    /// Every row for the (date, period) key, whatever the student.
    DatePeriod,
    /// Only rows for the listed students at the (date, period) key.
    Students(Vec<String>),
}

const RECORD_COLUMNS: &str = "id, student_id, date, status, period, subject, marked_by";

fn record_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    let date: String = r.get(2)?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(AttendanceRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        date,
        status: r.get(3)?,
        period: r.get(4)?,
        subject: r.get(5)?,
        marked_by: r.get(6)?,
    })
}

/// Rows for `date` (and `period` unless `all`) in insertion order.
pub fn load_attendance(
    conn: &Connection,
    date: NaiveDate,
    period: PeriodFilter,
) -> StoreResult<Vec<AttendanceRecord>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM attendance
             WHERE date = ?1 AND (?2 IS NULL OR period = ?2)
             ORDER BY rowid",
            RECORD_COLUMNS
        ))
        .map_err(db_err(DbOp::Query, "attendance"))?;
    stmt.query_map((date.to_string(), period.value()), record_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err(DbOp::Query, "attendance"))
}

/// One student's most recent rows, newest date first.
pub fn student_attendance(
    conn: &Connection,
    student_id: &str,
    limit: usize,
) -> StoreResult<Vec<AttendanceRecord>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM attendance
             WHERE student_id = ?
             ORDER BY date DESC, rowid DESC
             LIMIT ?",
            RECORD_COLUMNS
        ))
        .map_err(db_err(DbOp::Query, "attendance"))?;
    stmt.query_map((student_id, limit as i64), record_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err(DbOp::Query, "attendance"))
}

/// Replaces the rows in `scope` for (`date`, `period`) with `rows` in one
/// transaction. Returns the ids assigned to the inserted rows.
pub fn replace_attendance(
    conn: &Connection,
    date: NaiveDate,
    period: Period,
    scope: &ReplaceScope,
    rows: &[NewAttendance],
) -> StoreResult<Vec<String>> {
    let date_key = date.to_string();
    let tx = conn
        .unchecked_transaction()
        .map_err(db_err(DbOp::Tx, "attendance"))?;

    let deleted = match scope {
        ReplaceScope::DatePeriod => tx
            .execute(
                "DELETE FROM attendance WHERE date = ? AND period = ?",
                (&date_key, period),
            )
            .map_err(db_err(DbOp::Delete, "attendance"))?,
        ReplaceScope::Students(ids) if ids.is_empty() => 0,
        ReplaceScope::Students(ids) => {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!(
                "DELETE FROM attendance WHERE date = ? AND period = ? AND student_id IN ({})",
                placeholders
            );
            let mut bind: Vec<String> = Vec::with_capacity(ids.len() + 2);
            bind.push(date_key.clone());
            bind.push(period.to_string());
            bind.extend(ids.iter().cloned());
            tx.execute(&sql, params_from_iter(bind.iter()))
                .map_err(db_err(DbOp::Delete, "attendance"))?
        }
    };

    let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
    let mut ids = Vec::with_capacity(rows.len());
    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO attendance(id, student_id, date, status, period, subject, marked_by, created_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .map_err(db_err(DbOp::Insert, "attendance"))?;
        for row in rows {
            let id = Uuid::new_v4().to_string();
            stmt.execute(rusqlite::params![
                id,
                row.student_id,
                row.date.to_string(),
                row.status,
                row.period,
                row.subject,
                row.marked_by,
                created_at,
            ])
            .map_err(db_err(DbOp::Insert, "attendance"))?;
            ids.push(id);
        }
    }

    tx.commit().map_err(db_err(DbOp::Commit, "attendance"))?;
    tracing::info!(
        date = %date_key,
        %period,
        deleted,
        inserted = ids.len(),
        "attendance batch replaced"
    );
    Ok(ids)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    pub record_id: String,
    pub student_id: String,
    pub student_name: String,
    pub date: NaiveDate,
    pub period: Option<Period>,
    pub status: AttendanceStatus,
}

pub const UNKNOWN_STUDENT: &str = "Unknown";

/// Joins records against the loaded roster, keeping record order.
pub fn history_rows(records: &[AttendanceRecord], roster: &[RosterStudent]) -> Vec<HistoryRow> {
    let names: HashMap<&str, String> = roster
        .iter()
        .map(|s| (s.id.as_str(), s.display_name()))
        .collect();
    records
        .iter()
        .map(|r| HistoryRow {
            record_id: r.id.clone(),
            student_id: r.student_id.clone(),
            student_name: names
                .get(r.student_id.as_str())
                .cloned()
                .unwrap_or_else(|| UNKNOWN_STUDENT.to_string()),
            date: r.date,
            period: r.period,
            status: r.status,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
    /// Whole-number percentage of `Present` rows; 0 when there are none.
    pub rate: u32,
}

impl AttendanceSummary {
    pub fn from_records(records: &[AttendanceRecord]) -> Self {
        let mut s = AttendanceSummary {
            total: records.len(),
            ..Self::default()
        };
        for r in records {
            match r.status {
                AttendanceStatus::Present => s.present += 1,
                AttendanceStatus::Absent => s.absent += 1,
                AttendanceStatus::Late => s.late += 1,
                AttendanceStatus::Excused => s.excused += 1,
            }
        }
        if s.total > 0 {
            s.rate = (s.present as f64 / s.total as f64 * 100.0).round() as u32;
        }
        s
    }
}
