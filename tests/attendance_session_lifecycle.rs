use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rollcalld");
    let mut child = Command::new(exe)
        .env("ROLLCALLD_RNG_SEED", "7")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rollcalld");
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
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

#[test]
fn create_redeem_close_flow() {
    let workspace = temp_dir("rollcall-session-lifecycle");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let class = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.create",
        json!({ "name": "Computer Science", "division": "A" }),
    );
    let class_id = class["classId"].as_str().expect("classId").to_string();
    let student = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "name": "Asha Rao", "rollNumber": "CS01", "classId": class_id }),
    );
    let student_id = student["studentId"].as_str().expect("studentId").to_string();

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "sessions.create",
        json!({
            "classId": class_id,
            "subject": "Data Structures",
            "durationMinutes": 15,
            "facultyId": "f1",
            "facultyName": "Dr. Mehta",
        }),
    );
    let session = &created["session"];
    let session_id = session["id"].as_str().expect("session id").to_string();
    let code = session["code"].as_str().expect("code").to_string();
    assert_eq!(code.len(), 6);
    assert!(code
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    assert_eq!(session["status"], json!("active"));
    assert_eq!(session["className"], json!("Computer Science"));
    assert_eq!(session["division"], json!("A"));
    assert_eq!(session["redeemable"], json!(true));

    // Codes are matched case-insensitively.
    let redeemed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.redeem",
        json!({
            "code": code.to_lowercase(),
            "studentId": student_id,
            "studentName": "Asha Rao",
            "rollNumber": "CS01",
        }),
    );
    assert_eq!(
        redeemed["message"],
        json!("Attendance marked for Data Structures - Computer Science - A")
    );
    assert_eq!(redeemed["session"]["id"], json!(session_id));
    assert_eq!(redeemed["session"]["presentCount"], json!(1));

    let again = request(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.redeem",
        json!({ "code": code, "studentId": student_id }),
    );
    assert_eq!(again["ok"], json!(false));
    assert_eq!(error_code(&again), Some("already_marked"));
    assert_eq!(again["error"]["details"]["httpStatus"], json!(409));

    let records = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "sessions.records",
        json!({ "sessionId": session_id }),
    );
    let rows = records["records"].as_array().expect("records");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["studentId"], json!(student_id));
    assert_eq!(rows[0]["status"], json!("present"));

    let closed = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "sessions.close",
        json!({ "sessionId": session_id }),
    );
    assert_eq!(closed["status"], json!("closed"));

    let late = request(
        &mut stdin,
        &mut reader,
        "9",
        "attendance.redeem",
        json!({ "code": code, "studentId": "someone-else" }),
    );
    assert_eq!(error_code(&late), Some("invalid_code"));
    assert_eq!(late["error"]["details"]["httpStatus"], json!(404));

    let history = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "attendance.history",
        json!({ "studentId": student_id }),
    );
    assert_eq!(history["presentCount"], json!(1));
    assert_eq!(history["totalCount"], json!(1));
    assert_eq!(history["percentage"], json!(100));
    assert_eq!(history["activeSessions"], json!(0));
    assert_eq!(history["records"][0]["subject"], json!("Data Structures"));
    assert_eq!(history["records"][0]["className"], json!("Computer Science - A"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn create_rejects_bad_input() {
    let workspace = temp_dir("rollcall-session-validation");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let unknown_class = request(
        &mut stdin,
        &mut reader,
        "2",
        "sessions.create",
        json!({ "classId": "nope", "subject": "Physics", "durationMinutes": 10 }),
    );
    assert_eq!(error_code(&unknown_class), Some("invalid_class"));

    let class = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "classes.create",
        json!({ "name": "Physics" }),
    );
    let class_id = class["classId"].as_str().expect("classId").to_string();
    let bad_duration = request(
        &mut stdin,
        &mut reader,
        "4",
        "sessions.create",
        json!({ "classId": class_id, "subject": "Optics", "durationMinutes": 7 }),
    );
    assert_eq!(error_code(&bad_duration), Some("invalid_duration"));

    let missing_subject = request(
        &mut stdin,
        &mut reader,
        "5",
        "sessions.create",
        json!({ "classId": class_id, "durationMinutes": 5 }),
    );
    assert_eq!(error_code(&missing_subject), Some("bad_params"));

    // Form inputs may send the duration as a string.
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "sessions.create",
        json!({ "classId": class_id, "subject": "Optics", "durationMinutes": "5" }),
    );
    assert_eq!(created["session"]["status"], json!("active"));

    let unknown_code = request(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.redeem",
        json!({ "code": "ZZZZZZ!", "studentId": "s1" }),
    );
    assert_eq!(error_code(&unknown_code), Some("invalid_code"));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "sessions.list",
        json!({ "status": "active" }),
    );
    assert_eq!(listed["sessions"].as_array().map(|a| a.len()), Some(1));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
