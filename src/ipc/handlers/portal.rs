use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::require_role;
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::records::{self, AttendanceSummary};
use crate::roster;
use serde_json::json;

const PORTAL_HISTORY_LIMIT: usize = 30;
const PORTAL_RECENT: usize = 10;

fn portal_open(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let (conn, session) = require_role(state, &[Role::Student])?;
    let welcome = session
        .profile
        .as_ref()
        .map(|p| p.first_name.clone())
        .unwrap_or_else(|| "Student".to_string());
    let Some(student) = roster::student_for_user(conn, &session.user_id)? else {
        return Ok(json!({
            "welcome": welcome,
            "student": null,
            "recent": [],
            "summary": AttendanceSummary::default(),
        }));
    };
    let history = records::student_attendance(conn, &student.id, PORTAL_HISTORY_LIMIT)?;
    let summary = AttendanceSummary::from_records(&history);
    let recent: Vec<_> = history.iter().take(PORTAL_RECENT).collect();
    Ok(json!({
        "welcome": welcome,
        "student": student,
        "recent": recent,
        "summary": summary,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "portal.open" => Some(respond(&req.id, portal_open(state))),
        _ => None,
    }
}
