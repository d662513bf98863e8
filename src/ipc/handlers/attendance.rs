use chrono::{DateTime, Utc};
use serde_json::json;

use crate::attendance::{NewSession, Redemption};
use crate::ipc::helpers::{
    get_opt_str, get_required_str, get_required_u32, require_workspace, respond, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceSession, SessionStatus};
use crate::workspace::Workspace;

fn session_json(ws: &Workspace, session: &AttendanceSession, now: DateTime<Utc>) -> serde_json::Value {
    let mut v = json!(session);
    v["presentCount"] = json!(ws.attendance.records_for_session(&session.id).count());
    v["enrolledCount"] = json!(ws.roster.student_count(&session.class_id));
    v["secondsRemaining"] = json!(session.seconds_remaining(now));
    v["redeemable"] = json!(session.is_open_at(now));
    v
}

/// Runs one expiry sweep against the selected workspace, if any. Called from
/// the daemon's ticker on the same thread that serves requests.
pub fn sweep_tick(state: &mut AppState, now: DateTime<Utc>) {
    let Some(ws) = state.workspace.as_mut() else {
        return;
    };
    if let Err(e) = ws.attendance.sweep_expirations(now) {
        log::error!("expiry sweep failed: {e:#}");
    }
}

fn sessions_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let now = Utc::now();
    let req = NewSession {
        class_id: get_required_str(params, "classId")?,
        subject: get_required_str(params, "subject")?,
        duration_minutes: get_required_u32(params, "durationMinutes")?,
        faculty_id: get_opt_str(params, "facultyId").unwrap_or_default(),
        faculty_name: get_opt_str(params, "facultyName").unwrap_or_default(),
    };
    let session = ws.attendance.create_session(&ws.roster, req, now)?;
    Ok(json!({ "session": session_json(ws, &session, now) }))
}

fn sessions_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let Some(ws) = state.workspace.as_ref() else {
        return Ok(json!({ "sessions": [] }));
    };
    let class_id = get_opt_str(params, "classId");
    let status = match get_opt_str(params, "status") {
        Some(raw) => Some(
            SessionStatus::parse(&raw)
                .ok_or_else(|| HandlerErr::bad_params(format!("unknown status: {}", raw)))?,
        ),
        None => None,
    };
    let now = Utc::now();
    // Newest first, matching how faculty see their session list.
    let sessions: Vec<serde_json::Value> = ws
        .attendance
        .sessions()
        .iter()
        .rev()
        .filter(|s| class_id.as_deref().map(|c| c == s.class_id).unwrap_or(true))
        .filter(|s| status.map(|st| st == s.status).unwrap_or(true))
        .map(|s| session_json(ws, s, now))
        .collect();
    Ok(json!({ "sessions": sessions }))
}

fn sessions_get(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let session_id = get_required_str(params, "sessionId")?;
    let session = ws
        .attendance
        .find_session(&session_id)
        .ok_or_else(|| HandlerErr::new("not_found", "attendance session not found"))?;
    let records: Vec<_> = ws.attendance.records_for_session(&session_id).collect();
    Ok(json!({
        "session": session_json(ws, session, Utc::now()),
        "records": records,
    }))
}

fn sessions_records(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let session_id = get_required_str(params, "sessionId")?;
    if ws.attendance.find_session(&session_id).is_none() {
        return Err(HandlerErr::new("not_found", "attendance session not found"));
    }
    let records: Vec<_> = ws.attendance.records_for_session(&session_id).collect();
    Ok(json!({ "sessionId": session_id, "records": records }))
}

fn sessions_close(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let session_id = get_required_str(params, "sessionId")?;
    let session = ws.attendance.close_session(&session_id)?;
    Ok(json!({ "sessionId": session.id, "status": session.status }))
}

fn sessions_sweep(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let expired = ws.attendance.sweep_expirations(Utc::now())?;
    let ids: Vec<&str> = expired.iter().map(|s| s.id.as_str()).collect();
    Ok(json!({ "expiredCount": ids.len(), "expiredSessionIds": ids }))
}

fn attendance_redeem(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let req = Redemption {
        code: get_required_str(params, "code")?,
        student_id: get_required_str(params, "studentId")?,
        student_name: get_opt_str(params, "studentName").unwrap_or_default(),
        roll_number: get_opt_str(params, "rollNumber").unwrap_or_default(),
    };
    let now = Utc::now();
    let session = ws.attendance.redeem(req, now)?;
    Ok(json!({
        "message": format!(
            "Attendance marked for {} - {}",
            session.subject,
            session.class_label()
        ),
        "session": session_json(ws, &session, now),
    }))
}

fn attendance_history(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let student_id = get_required_str(params, "studentId")?;
    let history = ws.attendance.student_history(&student_id);
    // Most recent first, joined with the session they belong to.
    let records: Vec<serde_json::Value> = history
        .records
        .iter()
        .rev()
        .map(|r| {
            let session = ws.attendance.find_session(&r.session_id);
            json!({
                "record": r,
                "subject": session.map(|s| s.subject.clone()),
                "className": session.map(|s| s.class_label()),
                "date": session.map(|s| s.date.to_string()),
            })
        })
        .collect();
    Ok(json!({
        "studentId": student_id,
        "records": records,
        "presentCount": history.present_count,
        "totalCount": history.total_count,
        "percentage": history.percentage,
        "activeSessions": ws.attendance.active_count(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "sessions.create" => sessions_create(state, &req.params),
        "sessions.list" => sessions_list(state, &req.params),
        "sessions.get" => sessions_get(state, &req.params),
        "sessions.records" => sessions_records(state, &req.params),
        "sessions.close" => sessions_close(state, &req.params),
        "sessions.sweep" => sessions_sweep(state),
        "attendance.redeem" => attendance_redeem(state, &req.params),
        "attendance.history" => attendance_history(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
