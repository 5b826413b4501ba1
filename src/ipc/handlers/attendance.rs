use chrono::Utc;
use serde_json::json;

use crate::draft::{AttendanceView, SaveScope};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    attendance_parts, get_opt_date, get_opt_parsed, get_opt_str, get_opt_u64,
    get_required_parsed, get_required_str, require_role, STAFF,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Filter, Period};

fn snapshot(view: &AttendanceView) -> serde_json::Value {
    let students: Vec<serde_json::Value> = view
        .roster()
        .iter()
        .map(|s| {
            json!({
                "id": s.id,
                "firstName": s.first_name,
                "lastName": s.last_name,
                "displayName": s.display_name(),
                "grade": s.grade,
                "section": s.section,
                "status": view.status_of(&s.id),
            })
        })
        .collect();
    json!({
        "generation": view.generation(),
        "date": view.date(),
        "period": view.period(),
        "grade": view.grade(),
        "view": view.mode(),
        "students": students,
        "draftCount": view.draft().len(),
        "records": view.existing(),
    })
}

fn check_generation(view: &AttendanceView, params: &serde_json::Value) -> Result<(), HandlerErr> {
    let seen = get_opt_u64(params, "generation")?;
    if view.is_current(seen) {
        return Ok(());
    }
    Err(HandlerErr {
        code: "stale_generation",
        message: "attendance view changed since this request was prepared".to_string(),
        details: Some(json!({
            "seen": seen,
            "current": view.generation(),
        })),
    })
}

fn attendance_open(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let (conn, _) = require_role(state, STAFF)?;
    let date = get_opt_date(params, "date")?.unwrap_or_else(|| Utc::now().date_naive());
    let period = get_opt_parsed(params, "period")?.unwrap_or(Filter::Only(Period::FIRST));
    let grade = get_opt_parsed(params, "grade")?.unwrap_or(Filter::All);
    let view = AttendanceView::open(conn, date, period, grade)?;
    let result = snapshot(&view);
    state.attendance = Some(view);
    Ok(result)
}

fn attendance_set_filters(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let date = get_opt_date(params, "date")?;
    let period = get_opt_parsed(params, "period")?;
    let grade = get_opt_parsed(params, "grade")?;
    let (conn, _, view) = attendance_parts(state)?;
    view.change_filters(conn, date, period, grade)?;
    Ok(snapshot(view))
}

fn attendance_set_status(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let status = get_required_parsed(params, "status")?;
    let (_, _, view) = attendance_parts(state)?;
    check_generation(view, params)?;
    view.set_status(&student_id, status);
    Ok(json!({
        "generation": view.generation(),
        "studentId": student_id,
        "status": status,
    }))
}

fn attendance_mark_all(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let status = get_required_parsed(params, "status")?;
    let (_, _, view) = attendance_parts(state)?;
    check_generation(view, params)?;
    view.mark_all(status);
    Ok(snapshot(view))
}

fn attendance_save(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let scope = match get_opt_str(params, "scope")? {
        Some(s) => s.parse::<SaveScope>()?,
        None => SaveScope::default(),
    };
    let (conn, session, view) = attendance_parts(state)?;
    check_generation(view, params)?;
    let outcome = view.save(conn, Some(&session.user_id), scope)?;
    Ok(json!({
        "saved": outcome.record_ids.len(),
        "recordIds": outcome.record_ids,
        "message": format!(
            "Attendance for {} period {} saved.",
            outcome.date, outcome.period
        ),
        "state": snapshot(view),
    }))
}

fn attendance_set_view(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let mode = get_required_parsed(params, "view")?;
    let (_, _, view) = attendance_parts(state)?;
    view.set_mode(mode);
    Ok(json!({ "view": view.mode() }))
}

fn attendance_history(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let (_, _, view) = attendance_parts(state)?;
    Ok(json!({
        "date": view.date(),
        "period": view.period(),
        "rows": view.history(),
    }))
}

fn attendance_state(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let (_, _, view) = attendance_parts(state)?;
    Ok(snapshot(view))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.open" => attendance_open(state, &req.params),
        "attendance.setFilters" => attendance_set_filters(state, &req.params),
        "attendance.setStatus" => attendance_set_status(state, &req.params),
        "attendance.markAll" => attendance_mark_all(state, &req.params),
        "attendance.save" => attendance_save(state, &req.params),
        "attendance.setView" => attendance_set_view(state, &req.params),
        "attendance.history" => attendance_history(state),
        "attendance.state" => attendance_state(state),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
