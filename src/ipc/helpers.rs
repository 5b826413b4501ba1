use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::draft::AttendanceView;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::AppState;
use crate::model::{ModelError, Role};
use crate::session::Session;

pub const STAFF: &[Role] = &[Role::Admin, Role::Teacher];

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// A string param; absent, null and blank all read as `None`.
pub fn get_opt_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => {
            let s = v
                .as_str()
                .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a string", key)))?;
            let t = s.trim();
            Ok(if t.is_empty() { None } else { Some(t.to_string()) })
        }
    }
}

pub fn get_opt_parsed<T>(params: &serde_json::Value, key: &str) -> Result<Option<T>, HandlerErr>
where
    T: FromStr<Err = ModelError>,
{
    get_opt_str(params, key)?
        .map(|s| s.parse::<T>())
        .transpose()
        .map_err(|e| HandlerErr::bad_params(format!("{}: {}", key, e)))
}

pub fn get_required_parsed<T>(params: &serde_json::Value, key: &str) -> Result<T, HandlerErr>
where
    T: FromStr<Err = ModelError>,
{
    get_opt_parsed(params, key)?.ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn parse_date(s: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params("date must be YYYY-MM-DD"))
}

pub fn get_opt_date(params: &serde_json::Value, key: &str) -> Result<Option<NaiveDate>, HandlerErr> {
    get_opt_str(params, key)?.as_deref().map(parse_date).transpose()
}

pub fn get_opt_u64(params: &serde_json::Value, key: &str) -> Result<Option<u64>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a non-negative integer", key))),
    }
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

/// The open workspace plus a session holding one of `allowed`.
pub fn require_role<'a>(
    state: &'a AppState,
    allowed: &[Role],
) -> Result<(&'a Connection, &'a Session), HandlerErr> {
    let conn = require_db(state)?;
    let session = state
        .session
        .as_ref()
        .ok_or_else(|| HandlerErr::new("not_signed_in", "sign in first"))?;
    if !session.has_role(allowed) {
        return Err(HandlerErr::new(
            "forbidden",
            format!(
                "role {} may not do this",
                session.role.map_or("none", |r| r.as_str())
            ),
        ));
    }
    Ok((conn, session))
}

/// Like `require_role` for staff, also handing out the open attendance view.
pub fn attendance_parts(
    state: &mut AppState,
) -> Result<(&Connection, &Session, &mut AttendanceView), HandlerErr> {
    require_role(state, STAFF)?;
    let AppState {
        db,
        session,
        attendance,
        ..
    } = state;
    let conn = db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    let session = session
        .as_ref()
        .ok_or_else(|| HandlerErr::new("not_signed_in", "sign in first"))?;
    let view = attendance
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_attendance_view", "open attendance first"))?;
    Ok((conn, session, view))
}
