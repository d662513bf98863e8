use serde_json::json;
use std::path::PathBuf;

use crate::ipc::helpers::{get_opt_str, get_required_str, require_workspace, respond, today, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::reports::{self, Report};

/// Shapes a report result; when `outPath` is given the CSV is also written
/// there.
fn report_result(report: Report, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let mut result = json!({
        "csv": report.csv,
        "rowCount": report.row_count,
        "fileName": format!("{}.csv", report.file_stem),
    });
    if let Some(out) = get_opt_str(params, "outPath") {
        let out_path = PathBuf::from(out);
        reports::write_report(&out_path, &report.csv)
            .map_err(|e| HandlerErr::new("io_failed", format!("{e:#}")))?;
        result["path"] = json!(out_path.to_string_lossy());
    }
    Ok(result)
}

fn reports_session_sheet(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let session_id = get_required_str(params, "sessionId")?;
    let session = ws
        .attendance
        .find_session(&session_id)
        .ok_or_else(|| HandlerErr::new("not_found", "attendance session not found"))?;
    let records: Vec<_> = ws.attendance.records_for_session(&session_id).collect();
    let mut enrolled = ws.roster.students_in_class(&session.class_id);
    enrolled.sort_by(|a, b| a.roll_number.cmp(&b.roll_number));
    let report = reports::session_sheet(session, &records, &enrolled);
    report_result(report, params)
}

fn reports_attendance(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let class_id = get_opt_str(params, "classId");
    let report = reports::attendance_summary(
        ws.attendance.sessions(),
        ws.attendance.records(),
        class_id.as_deref(),
        today(),
    );
    report_result(report, params)
}

fn reports_students(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let class_id = get_opt_str(params, "classId");
    let report = reports::student_directory(ws.roster.students(), class_id.as_deref(), today());
    report_result(report, params)
}

fn reports_risk(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let class_id = get_opt_str(params, "classId");
    let report = reports::risk_report(ws.roster.students(), class_id.as_deref(), today());
    report_result(report, params)
}

fn dashboard_stats(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let stats = reports::dashboard_stats(
        ws.roster.students(),
        ws.attendance.sessions(),
        ws.attendance.records(),
        today(),
    );
    Ok(json!(stats))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "reports.sessionSheet" => reports_session_sheet(state, &req.params),
        "reports.attendance" => reports_attendance(state, &req.params),
        "reports.students" => reports_students(state, &req.params),
        "reports.risk" => reports_risk(state, &req.params),
        "dashboard.stats" => dashboard_stats(state),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
