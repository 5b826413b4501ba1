use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rollbookd");
    let mut child = Command::new(exe)
        .env_remove("ROLLBOOKD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rollbookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

fn result(value: &serde_json::Value) -> &serde_json::Value {
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "request failed: {}",
        value
    );
    value.get("result").expect("result")
}

#[test]
fn staff_methods_need_workspace_then_session_then_role() {
    let ws = tempfile::tempdir().expect("temp dir");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let r = request(&mut stdin, &mut reader, "1", "students.list", json!({}));
    assert_eq!(error_code(&r), Some("no_workspace"));

    result(&request(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": ws.path().to_string_lossy() }),
    ));
    let r = request(&mut stdin, &mut reader, "3", "attendance.open", json!({}));
    assert_eq!(error_code(&r), Some("not_signed_in"));

    result(&request(
        &mut stdin,
        &mut reader,
        "4",
        "session.register",
        json!({
            "userId": "stu-1",
            "email": "kid@school.edu",
            "firstName": "Kai",
            "lastName": "Ito",
            "role": "student"
        }),
    ));
    let signed = request(
        &mut stdin,
        &mut reader,
        "5",
        "session.signIn",
        json!({ "userId": "stu-1" }),
    );
    let views = result(&signed)
        .get("views")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(views.len(), 1);
    assert_eq!(
        views[0].get("label").and_then(|v| v.as_str()),
        Some("My Dashboard")
    );

    let r = request(&mut stdin, &mut reader, "6", "attendance.open", json!({}));
    assert_eq!(error_code(&r), Some("forbidden"));
    let r = request(&mut stdin, &mut reader, "7", "dashboard.stats", json!({}));
    assert_eq!(error_code(&r), Some("forbidden"));

    result(&request(&mut stdin, &mut reader, "8", "session.signOut", json!({})));
    let current = request(&mut stdin, &mut reader, "9", "session.current", json!({}));
    assert!(result(&current).get("session").map_or(false, |v| v.is_null()));
}

#[test]
fn only_admins_delete_students() {
    let ws = tempfile::tempdir().expect("temp dir");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    result(&request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": ws.path().to_string_lossy() }),
    ));
    for (i, (uid, role)) in [("admin-1", "admin"), ("teacher-1", "teacher")].iter().enumerate() {
        result(&request(
            &mut stdin,
            &mut reader,
            &format!("reg{}", i),
            "session.register",
            json!({
                "userId": uid,
                "email": format!("{}@school.edu", uid),
                "firstName": "Staff",
                "lastName": "Member",
                "role": role
            }),
        ));
    }

    result(&request(
        &mut stdin,
        &mut reader,
        "2",
        "session.signIn",
        json!({ "userId": "teacher-1" }),
    ));
    let created = request(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({
            "firstName": "Liam",
            "lastName": "Brown",
            "email": "liam@school.edu",
            "grade": "11th",
            "section": "C",
            "gpa": 3.4
        }),
    );
    let student_id = result(&created)
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();
    let r = request(
        &mut stdin,
        &mut reader,
        "4",
        "students.delete",
        json!({ "studentId": student_id }),
    );
    assert_eq!(error_code(&r), Some("forbidden"));

    result(&request(
        &mut stdin,
        &mut reader,
        "5",
        "session.signIn",
        json!({ "userId": "admin-1" }),
    ));
    result(&request(
        &mut stdin,
        &mut reader,
        "6",
        "students.delete",
        json!({ "studentId": student_id }),
    ));
    let r = request(
        &mut stdin,
        &mut reader,
        "7",
        "students.get",
        json!({ "studentId": student_id }),
    );
    assert_eq!(error_code(&r), Some("not_found"));
}

#[test]
fn students_list_filters_and_validates_required_fields() {
    let ws = tempfile::tempdir().expect("temp dir");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    result(&request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": ws.path().to_string_lossy() }),
    ));
    result(&request(
        &mut stdin,
        &mut reader,
        "2",
        "session.register",
        json!({
            "userId": "admin-1",
            "email": "admin@school.edu",
            "firstName": "Ada",
            "lastName": "Min",
            "role": "admin"
        }),
    ));
    result(&request(
        &mut stdin,
        &mut reader,
        "3",
        "session.signIn",
        json!({ "userId": "admin-1" }),
    ));

    let missing = request(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({ "firstName": "No", "lastName": "Grade", "email": "ng@school.edu" }),
    );
    assert_eq!(error_code(&missing), Some("bad_params"));

    for (i, (first, grade)) in [("Mia", "9th"), ("Noah", "12th"), ("Ava", "9th")].iter().enumerate() {
        result(&request(
            &mut stdin,
            &mut reader,
            &format!("c{}", i),
            "students.create",
            json!({
                "firstName": first,
                "lastName": "Lee",
                "email": format!("{}@school.edu", first.to_lowercase()),
                "grade": grade
            }),
        ));
    }

    let listed = request(
        &mut stdin,
        &mut reader,
        "5",
        "students.list",
        json!({ "search": "lee", "grade": "9th" }),
    );
    let res = result(&listed);
    assert_eq!(res.get("total").and_then(|v| v.as_u64()), Some(3));
    let names: Vec<&str> = res
        .get("students")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|s| s.get("firstName").and_then(|v| v.as_str()))
                .collect()
        })
        .unwrap_or_default();
    assert_eq!(names, vec!["Ava", "Mia"]);

    let stats = request(&mut stdin, &mut reader, "6", "dashboard.stats", json!({}));
    assert_eq!(
        result(&stats).get("activeStudents").and_then(|v| v.as_u64()),
        Some(3)
    );
}

#[test]
fn student_portal_shows_own_attendance() {
    let ws = tempfile::tempdir().expect("temp dir");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    result(&request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": ws.path().to_string_lossy() }),
    ));
    for (uid, role, first) in [("teacher-1", "teacher", "Tess"), ("stu-1", "student", "Kai")] {
        result(&request(
            &mut stdin,
            &mut reader,
            &format!("reg-{}", uid),
            "session.register",
            json!({
                "userId": uid,
                "email": format!("{}@school.edu", uid),
                "firstName": first,
                "lastName": "Ito",
                "role": role
            }),
        ));
    }
    result(&request(
        &mut stdin,
        &mut reader,
        "2",
        "session.signIn",
        json!({ "userId": "teacher-1" }),
    ));
    let created = request(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({
            "userId": "stu-1",
            "firstName": "Kai",
            "lastName": "Ito",
            "email": "kai@school.edu",
            "grade": "10th"
        }),
    );
    let student_id = result(&created)
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();

    for (i, (period, status)) in [("1", "Present"), ("2", "Absent"), ("3", "Present")]
        .iter()
        .enumerate()
    {
        result(&request(
            &mut stdin,
            &mut reader,
            &format!("open{}", i),
            "attendance.open",
            json!({ "date": "2024-02-01", "period": period }),
        ));
        result(&request(
            &mut stdin,
            &mut reader,
            &format!("set{}", i),
            "attendance.setStatus",
            json!({ "studentId": student_id, "status": status }),
        ));
        result(&request(
            &mut stdin,
            &mut reader,
            &format!("save{}", i),
            "attendance.save",
            json!({}),
        ));
    }

    result(&request(
        &mut stdin,
        &mut reader,
        "4",
        "session.signIn",
        json!({ "userId": "stu-1" }),
    ));
    let portal = request(&mut stdin, &mut reader, "5", "portal.open", json!({}));
    let res = result(&portal);
    assert_eq!(res.get("welcome").and_then(|v| v.as_str()), Some("Kai"));
    let summary = res.get("summary").expect("summary");
    assert_eq!(summary.get("total").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(summary.get("present").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(summary.get("rate").and_then(|v| v.as_u64()), Some(67));
    assert_eq!(
        res.get("recent").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(3)
    );

    // Signing in as someone else drops the teacher's attendance view.
    let r = request(&mut stdin, &mut reader, "6", "attendance.state", json!({}));
    assert_eq!(error_code(&r), Some("forbidden"));
}
