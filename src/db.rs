use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "rollbook.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS profiles(
            user_id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS user_roles(
            user_id TEXT PRIMARY KEY,
            role TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES profiles(user_id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            user_id TEXT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT,
            date_of_birth TEXT,
            gender TEXT,
            grade TEXT NOT NULL,
            section TEXT NOT NULL DEFAULT 'A',
            status TEXT NOT NULL DEFAULT 'Active',
            gpa REAL NOT NULL DEFAULT 0,
            enrollment_date TEXT NOT NULL,
            address TEXT,
            guardian_name TEXT,
            guardian_phone TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_status_grade ON students(status, grade)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_user ON students(user_id)",
        [],
    )?;

    // No UNIQUE(student_id, date, period): one row per key is kept by the
    // replace-on-save commit, not by the schema.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            period TEXT,
            subject TEXT,
            marked_by TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_date_period ON attendance(date, period)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance(student_id)",
        [],
    )?;

    Ok(conn)
}
