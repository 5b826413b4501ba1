use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    get_opt_date, get_opt_parsed, get_opt_str, get_required_parsed, get_required_str,
    require_role, STAFF,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Filter, Role};
use crate::roster::{self, NewStudent, StudentFilter};
use serde_json::json;

fn students_list(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let (conn, _) = require_role(state, STAFF)?;
    let filter = StudentFilter {
        search: get_opt_str(params, "search")?.unwrap_or_default(),
        grade: get_opt_parsed(params, "grade")?.unwrap_or(Filter::All),
        status: get_opt_parsed(params, "status")?.unwrap_or(Filter::All),
    };
    let all = roster::list_students(conn)?;
    let total = all.len();
    let students = filter.apply(all);
    Ok(json!({ "students": students, "total": total }))
}

fn students_get(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let (conn, _) = require_role(state, STAFF)?;
    let student_id = get_required_str(params, "studentId")?;
    let student = roster::get_student(conn, &student_id)?;
    Ok(json!({ "student": student }))
}

fn students_create(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let (conn, _) = require_role(state, STAFF)?;
    let gpa = match params.get("gpa") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => Some(
            v.as_f64()
                .ok_or_else(|| HandlerErr::bad_params("gpa must be a number"))?,
        ),
    };
    let new = NewStudent {
        user_id: get_opt_str(params, "userId")?,
        first_name: get_opt_str(params, "firstName")?.unwrap_or_default(),
        last_name: get_opt_str(params, "lastName")?.unwrap_or_default(),
        email: get_opt_str(params, "email")?.unwrap_or_default(),
        phone: get_opt_str(params, "phone")?,
        date_of_birth: get_opt_date(params, "dateOfBirth")?,
        gender: get_opt_parsed(params, "gender")?,
        grade: get_opt_parsed(params, "grade")?,
        section: get_opt_parsed(params, "section")?,
        status: get_opt_parsed(params, "status")?,
        gpa,
        enrollment_date: get_opt_date(params, "enrollmentDate")?,
        address: get_opt_str(params, "address")?,
        guardian_name: get_opt_str(params, "guardianName")?,
        guardian_phone: get_opt_str(params, "guardianPhone")?,
    };
    let student_id = roster::create_student(conn, &new)?;
    Ok(json!({ "studentId": student_id }))
}

fn students_set_status(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let (conn, _) = require_role(state, STAFF)?;
    let student_id = get_required_str(params, "studentId")?;
    let status = get_required_parsed(params, "status")?;
    roster::set_student_status(conn, &student_id, status)?;
    Ok(json!({ "ok": true }))
}

fn students_delete(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let (conn, _) = require_role(state, &[Role::Admin])?;
    let student_id = get_required_str(params, "studentId")?;
    roster::delete_student(conn, &student_id)?;
    Ok(json!({ "ok": true }))
}

fn dashboard_stats(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let (conn, _) = require_role(state, STAFF)?;
    let stats = roster::dashboard_stats(conn)?;
    Ok(json!(stats))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => students_list(state, &req.params),
        "students.get" => students_get(state, &req.params),
        "students.create" => students_create(state, &req.params),
        "students.setStatus" => students_set_status(state, &req.params),
        "students.delete" => students_delete(state, &req.params),
        "dashboard.stats" => dashboard_stats(state),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
