use chrono::Utc;
use serde_json::json;

use crate::ipc::helpers::{get_opt_str, get_required_str, require_workspace, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::notes::{NewNote, SUBJECTS};

fn notes_upload(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    // Presence and shape are checked by the library so every missing field
    // reports the same way.
    let new = NewNote {
        title: get_opt_str(params, "title").unwrap_or_default(),
        subject: get_opt_str(params, "subject").unwrap_or_default(),
        description: get_opt_str(params, "description").unwrap_or_default(),
        class_id: get_opt_str(params, "classId").unwrap_or_default(),
        file_name: get_opt_str(params, "fileName").unwrap_or_default(),
        file_url: get_opt_str(params, "fileUrl"),
        uploaded_by: get_opt_str(params, "uploadedBy").unwrap_or_default(),
        uploaded_by_name: get_opt_str(params, "uploadedByName").unwrap_or_default(),
    };
    let note = ws.notes.upload(&ws.roster, new, Utc::now())?;
    Ok(json!({ "noteId": note.id, "note": note }))
}

fn notes_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let Some(ws) = state.workspace.as_ref() else {
        return Ok(json!({ "notes": [] }));
    };
    let query = get_opt_str(params, "query");
    let subject = get_opt_str(params, "subject");
    let notes = ws.notes.list(query.as_deref(), subject.as_deref());
    Ok(json!({ "notes": notes }))
}

fn notes_delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let note_id = get_required_str(params, "noteId")?;
    let removed = ws.notes.delete(&note_id)?;
    Ok(json!({ "noteId": removed.id, "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "notes.upload" => notes_upload(state, &req.params),
        "notes.list" => notes_list(state, &req.params),
        "notes.delete" => notes_delete(state, &req.params),
        "notes.subjects" => Ok(json!({ "subjects": SUBJECTS })),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
