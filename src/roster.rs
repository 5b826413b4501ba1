use chrono::{NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{db_err, DbOp, StoreError, StoreResult};
use crate::model::{Filter, Gender, Grade, GradeFilter, Section, StudentStatus};

/// The identity and classification fields the attendance page works with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStudent {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub grade: Grade,
    pub section: Section,
}

impl RosterStudent {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub user_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<Gender>,
    pub grade: Grade,
    pub section: Section,
    pub status: StudentStatus,
    pub gpa: f64,
    pub enrollment_date: String,
    pub address: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub created_at: String,
}

/// Enrollment form contents. Empty optional strings are stored as NULL.
#[derive(Debug, Clone, Default)]
pub struct NewStudent {
    pub user_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub grade: Option<Grade>,
    pub section: Option<Section>,
    pub status: Option<StudentStatus>,
    pub gpa: Option<f64>,
    pub enrollment_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
}

const STUDENT_COLUMNS: &str = "id, user_id, first_name, last_name, email, phone, date_of_birth,
     gender, grade, section, status, gpa, enrollment_date, address, guardian_name,
     guardian_phone, created_at";

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<StudentRecord> {
    Ok(StudentRecord {
        id: r.get(0)?,
        user_id: r.get(1)?,
        first_name: r.get(2)?,
        last_name: r.get(3)?,
        email: r.get(4)?,
        phone: r.get(5)?,
        date_of_birth: r.get(6)?,
        gender: r.get(7)?,
        grade: r.get(8)?,
        section: r.get(9)?,
        status: r.get(10)?,
        gpa: r.get(11)?,
        enrollment_date: r.get(12)?,
        address: r.get(13)?,
        guardian_name: r.get(14)?,
        guardian_phone: r.get(15)?,
        created_at: r.get(16)?,
    })
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Active students matching `grade`, ordered by last name, first name.
pub fn load_roster(conn: &Connection, grade: GradeFilter) -> StoreResult<Vec<RosterStudent>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, first_name, last_name, grade, section
             FROM students
             WHERE status = ?1 AND (?2 IS NULL OR grade = ?2)
             ORDER BY last_name, first_name, id",
        )
        .map_err(db_err(DbOp::Query, "students"))?;
    stmt.query_map((StudentStatus::Active, grade.value()), |r| {
        Ok(RosterStudent {
            id: r.get(0)?,
            first_name: r.get(1)?,
            last_name: r.get(2)?,
            grade: r.get(3)?,
            section: r.get(4)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(db_err(DbOp::Query, "students"))
}

pub fn create_student(conn: &Connection, new: &NewStudent) -> StoreResult<String> {
    let first_name = new.first_name.trim();
    let last_name = new.last_name.trim();
    let email = new.email.trim();
    if first_name.is_empty() {
        return Err(StoreError::MissingField("firstName"));
    }
    if last_name.is_empty() {
        return Err(StoreError::MissingField("lastName"));
    }
    if email.is_empty() {
        return Err(StoreError::MissingField("email"));
    }
    let grade = new.grade.ok_or(StoreError::MissingField("grade"))?;

    let now = Utc::now();
    let id = Uuid::new_v4().to_string();
    let enrollment_date = new.enrollment_date.unwrap_or_else(|| now.date_naive());
    conn.execute(
        "INSERT INTO students(id, user_id, first_name, last_name, email, phone, date_of_birth,
            gender, grade, section, status, gpa, enrollment_date, address, guardian_name,
            guardian_phone, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            id,
            non_empty(&new.user_id),
            first_name,
            last_name,
            email,
            non_empty(&new.phone),
            new.date_of_birth.map(|d| d.to_string()),
            new.gender,
            grade,
            new.section.unwrap_or(Section::A),
            new.status.unwrap_or(StudentStatus::Active),
            new.gpa.unwrap_or(0.0),
            enrollment_date.to_string(),
            non_empty(&new.address),
            non_empty(&new.guardian_name),
            non_empty(&new.guardian_phone),
            now.to_rfc3339_opts(SecondsFormat::Micros, true),
        ],
    )
    .map_err(db_err(DbOp::Insert, "students"))?;
    tracing::info!(student_id = %id, %grade, "student enrolled");
    Ok(id)
}

pub fn get_student(conn: &Connection, student_id: &str) -> StoreResult<StudentRecord> {
    conn.query_row(
        &format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS),
        [student_id],
        student_from_row,
    )
    .optional()
    .map_err(db_err(DbOp::Query, "students"))?
    .ok_or(StoreError::NotFound("student"))
}

/// The student row linked to a portal login, if any.
pub fn student_for_user(conn: &Connection, user_id: &str) -> StoreResult<Option<StudentRecord>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM students WHERE user_id = ? ORDER BY rowid LIMIT 1",
            STUDENT_COLUMNS
        ),
        [user_id],
        student_from_row,
    )
    .optional()
    .map_err(db_err(DbOp::Query, "students"))
}

/// Every student, newest enrollment record first.
pub fn list_students(conn: &Connection) -> StoreResult<Vec<StudentRecord>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM students ORDER BY created_at DESC, rowid DESC",
            STUDENT_COLUMNS
        ))
        .map_err(db_err(DbOp::Query, "students"))?;
    stmt.query_map([], student_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err(DbOp::Query, "students"))
}

pub fn set_student_status(
    conn: &Connection,
    student_id: &str,
    status: StudentStatus,
) -> StoreResult<()> {
    let n = conn
        .execute(
            "UPDATE students SET status = ? WHERE id = ?",
            (status, student_id),
        )
        .map_err(db_err(DbOp::Update, "students"))?;
    if n == 0 {
        return Err(StoreError::NotFound("student"));
    }
    Ok(())
}

/// Removes the student; their attendance rows go with them.
pub fn delete_student(conn: &Connection, student_id: &str) -> StoreResult<()> {
    let n = conn
        .execute("DELETE FROM students WHERE id = ?", [student_id])
        .map_err(db_err(DbOp::Delete, "students"))?;
    if n == 0 {
        return Err(StoreError::NotFound("student"));
    }
    tracing::info!(%student_id, "student deleted");
    Ok(())
}

/// Search box and dropdown filters applied to an already-fetched list.
#[derive(Debug, Clone)]
pub struct StudentFilter {
    pub search: String,
    pub grade: GradeFilter,
    pub status: Filter<StudentStatus>,
}

impl Default for StudentFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            grade: Filter::All,
            status: Filter::All,
        }
    }
}

impl StudentFilter {
    pub fn matches(&self, s: &StudentRecord) -> bool {
        let needle = self.search.trim().to_lowercase();
        let haystack = format!("{} {} {}", s.first_name, s.last_name, s.email).to_lowercase();
        haystack.contains(&needle) && self.grade.matches(&s.grade) && self.status.matches(&s.status)
    }

    pub fn apply(&self, students: Vec<StudentRecord>) -> Vec<StudentRecord> {
        students.into_iter().filter(|s| self.matches(s)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_students: usize,
    pub active_students: usize,
    pub graduated_count: usize,
    pub average_gpa: f64,
    pub recent_students: Vec<StudentRecord>,
}

const RECENT_STUDENTS: usize = 5;

pub fn dashboard_stats(conn: &Connection) -> StoreResult<DashboardStats> {
    let students = list_students(conn)?;
    let count = |status: StudentStatus| students.iter().filter(|s| s.status == status).count();
    let average_gpa = if students.is_empty() {
        0.0
    } else {
        let sum: f64 = students.iter().map(|s| s.gpa).sum();
        (sum / students.len() as f64 * 100.0).round() / 100.0
    };
    Ok(DashboardStats {
        total_students: students.len(),
        active_students: count(StudentStatus::Active),
        graduated_count: count(StudentStatus::Graduated),
        average_gpa,
        recent_students: students.iter().take(RECENT_STUDENTS).cloned().collect(),
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::enroll;
    use super::*;
    use crate::db::test_support::temp_db;

    #[test]
    fn roster_is_active_only_and_grade_filtered() {
        let (_dir, conn) = temp_db();
        let zoe = enroll(&conn, "Zoe", "Adams", Grade::Ninth);
        let liam = enroll(&conn, "Liam", "Brown", Grade::Tenth);
        let gone = enroll(&conn, "Ava", "Cole", Grade::Ninth);
        set_student_status(&conn, &gone, StudentStatus::Graduated).expect("graduate");

        let all = load_roster(&conn, Filter::All).expect("roster");
        let ids: Vec<_> = all.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![zoe.as_str(), liam.as_str()]);

        let ninth = load_roster(&conn, Filter::Only(Grade::Ninth)).expect("roster");
        assert_eq!(ninth.len(), 1);
        assert_eq!(ninth[0].display_name(), "Zoe Adams");

        let twelfth = load_roster(&conn, Filter::Only(Grade::Twelfth)).expect("roster");
        assert!(twelfth.is_empty());
    }

    #[test]
    fn create_requires_name_email_and_grade() {
        let (_dir, conn) = temp_db();
        let mut new = NewStudent {
            first_name: "Mia".into(),
            last_name: "Lee".into(),
            email: "  ".into(),
            grade: Some(Grade::Eleventh),
            ..NewStudent::default()
        };
        let e = create_student(&conn, &new).unwrap_err();
        assert!(matches!(e, StoreError::MissingField("email")));
        assert_eq!(e.code(), "bad_params");

        new.email = "mia@school.edu".into();
        new.grade = None;
        assert!(matches!(
            create_student(&conn, &new),
            Err(StoreError::MissingField("grade"))
        ));

        new.grade = Some(Grade::Eleventh);
        new.phone = Some(String::new());
        let id = create_student(&conn, &new).expect("create");
        let rec = get_student(&conn, &id).expect("get");
        assert_eq!(rec.section, Section::A);
        assert_eq!(rec.status, StudentStatus::Active);
        assert_eq!(rec.phone, None);
    }

    #[test]
    fn filter_searches_name_and_email_case_insensitively() {
        let (_dir, conn) = temp_db();
        enroll(&conn, "Sophia", "Patel", Grade::Ninth);
        enroll(&conn, "Noah", "Garcia", Grade::Twelfth);
        let students = list_students(&conn).expect("list");

        let f = StudentFilter {
            search: "PATEL".into(),
            ..StudentFilter::default()
        };
        assert_eq!(f.apply(students.clone()).len(), 1);

        let f = StudentFilter {
            search: "school.edu".into(),
            grade: Filter::Only(Grade::Twelfth),
            status: Filter::Only(StudentStatus::Active),
        };
        let hits = f.apply(students);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].first_name, "Noah");
    }

    #[test]
    fn dashboard_counts_and_rounds_gpa() {
        let (_dir, conn) = temp_db();
        assert_eq!(dashboard_stats(&conn).expect("stats").average_gpa, 0.0);
        for (i, gpa) in [3.333, 2.5, 4.0].into_iter().enumerate() {
            create_student(
                &conn,
                &NewStudent {
                    first_name: format!("S{}", i),
                    last_name: "Test".into(),
                    email: format!("s{}@school.edu", i),
                    grade: Some(Grade::Ninth),
                    gpa: Some(gpa),
                    status: Some(if i == 2 {
                        StudentStatus::Graduated
                    } else {
                        StudentStatus::Active
                    }),
                    ..NewStudent::default()
                },
            )
            .expect("create");
        }
        let stats = dashboard_stats(&conn).expect("stats");
        assert_eq!(stats.total_students, 3);
        assert_eq!(stats.active_students, 2);
        assert_eq!(stats.graduated_count, 1);
        assert_eq!(stats.average_gpa, 3.28);
        assert_eq!(stats.recent_students[0].first_name, "S2");
    }

    #[test]
    fn missing_rows_report_not_found() {
        let (_dir, conn) = temp_db();
        assert!(matches!(
            get_student(&conn, "nope"),
            Err(StoreError::NotFound("student"))
        ));
        assert!(matches!(
            delete_student(&conn, "nope"),
            Err(StoreError::NotFound("student"))
        ));
    }
}
