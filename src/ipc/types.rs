use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::draft::AttendanceView;
use crate::session::Session;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: Option<Session>,
    pub attendance: Option<AttendanceView>,
}

impl AppState {
    /// Drops everything tied to the signed-in user.
    pub fn end_session(&mut self) {
        self.session = None;
        self.attendance = None;
    }
}
