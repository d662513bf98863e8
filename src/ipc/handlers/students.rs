use serde_json::json;

use crate::ipc::helpers::{get_opt_str, get_required_str, require_workspace, respond, today, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::roster::{NewStudent, StudentPatch};

fn students_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let Some(ws) = state.workspace.as_ref() else {
        return Ok(json!({ "students": [] }));
    };
    let class_id = get_opt_str(params, "classId");
    let mut students: Vec<_> = ws
        .roster
        .students()
        .iter()
        .filter(|s| class_id.as_deref().map(|c| c == s.class_id).unwrap_or(true))
        .collect();
    students.sort_by(|a, b| a.roll_number.cmp(&b.roll_number).then(a.name.cmp(&b.name)));
    Ok(json!({ "students": students }))
}

fn students_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let new: NewStudent = serde_json::from_value(params.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid student: {e}")))?;
    let student = ws.roster.add_student(new, today())?;
    Ok(json!({ "studentId": student.id, "student": student }))
}

fn students_update(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let student_id = get_required_str(params, "studentId")?;
    let raw = params
        .get("patch")
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params("missing patch"))?;
    let patch: StudentPatch = serde_json::from_value(raw)
        .map_err(|e| HandlerErr::bad_params(format!("invalid patch: {e}")))?;
    let student = ws.roster.update_student(&student_id, patch)?;
    Ok(json!({ "student": student }))
}

fn students_delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let student_id = get_required_str(params, "studentId")?;
    let removed = ws.roster.delete_student(&student_id)?;
    Ok(json!({ "studentId": removed.id, "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => students_list(state, &req.params),
        "students.create" => students_create(state, &req.params),
        "students.update" => students_update(state, &req.params),
        "students.delete" => students_delete(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
