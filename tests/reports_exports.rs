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
fn session_sheet_and_summary_exports() {
    let workspace = temp_dir("rollcall-reports");
    let out_path = workspace.join("exports").join("sheet.csv");
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
        json!({ "name": "Mathematics", "division": "B" }),
    );
    let class_id = class["classId"].as_str().expect("classId").to_string();
    let present = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({
            "name": "Ravi, K",
            "rollNumber": "M01",
            "classId": class_id,
            "attendancePercentage": 92,
            "averageScore": 81,
            "riskLevel": "low",
        }),
    );
    let present_id = present["studentId"].as_str().expect("studentId").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({
            "name": "Meera",
            "rollNumber": "M02",
            "classId": class_id,
            "attendancePercentage": 60,
            "averageScore": 55,
            "riskLevel": "high",
        }),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "sessions.create",
        json!({
            "classId": class_id,
            "subject": "Calculus",
            "durationMinutes": 10,
            "facultyName": "Prof. Iyer",
        }),
    );
    let session_id = created["session"]["id"].as_str().expect("id").to_string();
    let code = created["session"]["code"].as_str().expect("code").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.redeem",
        json!({ "code": code, "studentId": present_id, "studentName": "Ravi, K", "rollNumber": "M01" }),
    );

    let sheet = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "reports.sessionSheet",
        json!({ "sessionId": session_id, "outPath": out_path.to_string_lossy() }),
    );
    assert_eq!(sheet["rowCount"], json!(2));
    let csv = sheet["csv"].as_str().expect("csv");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "Attendance Report - Mathematics - B");
    assert_eq!(lines[1], "Subject: Calculus");
    assert_eq!(lines[3], "Faculty: Prof. Iyer");
    assert_eq!(lines[4], "");
    assert_eq!(lines[5], "Roll No,Name,Status,Marked At");
    assert!(lines[6].starts_with("M01,\"Ravi, K\",present,"));
    assert_eq!(lines[7], "M02,Meera,absent,-");
    let written = std::fs::read_to_string(&out_path).expect("read exported csv");
    assert_eq!(written, csv);
    assert_eq!(
        sheet["path"].as_str(),
        Some(out_path.to_string_lossy().as_ref())
    );

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "reports.attendance",
        json!({ "classId": class_id }),
    );
    assert_eq!(summary["rowCount"], json!(1));
    let row = summary["csv"].as_str().expect("csv").lines().nth(1).expect("row").to_string();
    assert!(row.contains("Mathematics - B"), "{}", row);
    assert!(row.ends_with(",active,1"), "{}", row);

    let risk = request_ok(&mut stdin, &mut reader, "9", "reports.risk", json!({}));
    let risk_csv = risk["csv"].as_str().expect("csv");
    assert!(risk_csv.contains("Continue current approach"));
    assert!(risk_csv.contains("Improve attendance"));

    let students = request_ok(&mut stdin, &mut reader, "10", "reports.students", json!({}));
    assert_eq!(students["rowCount"], json!(2));
    assert!(students["fileName"]
        .as_str()
        .map(|n| n.starts_with("student_report_") && n.ends_with(".csv"))
        .unwrap_or(false));

    let stats = request_ok(&mut stdin, &mut reader, "11", "dashboard.stats", json!({}));
    assert_eq!(stats["totalStudents"], json!(2));
    assert_eq!(stats["presentToday"], json!(1));
    assert_eq!(stats["atRiskStudents"], json!(1));
    assert_eq!(stats["averageAttendance"], json!(76));
    assert_eq!(stats["activeSessions"], json!(1));
    assert_eq!(
        stats["riskDistribution"],
        json!({ "low": 1, "medium": 0, "high": 1 })
    );

    let missing = request(
        &mut stdin,
        &mut reader,
        "12",
        "reports.sessionSheet",
        json!({ "sessionId": "nope" }),
    );
    assert_eq!(error_code(&missing), Some("not_found"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
