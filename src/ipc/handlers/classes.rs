use serde_json::json;

use crate::ipc::helpers::{get_opt_str, get_required_str, require_workspace, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::roster::NewClass;

fn classes_list(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    // Listing before a workspace is chosen is not an error; there is just nothing yet.
    let Some(ws) = state.workspace.as_ref() else {
        return Ok(json!({ "classes": [] }));
    };
    let mut classes: Vec<serde_json::Value> = ws
        .roster
        .classes()
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.name,
                "division": c.division,
                "label": c.label(),
                "institutionId": c.institution_id,
                "studentCount": ws.roster.student_count(&c.id),
            })
        })
        .collect();
    classes.sort_by(|a, b| a["label"].as_str().cmp(&b["label"].as_str()));
    Ok(json!({ "classes": classes }))
}

fn classes_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let class = ws.roster.add_class(NewClass {
        name: get_required_str(params, "name")?,
        division: get_opt_str(params, "division"),
    })?;
    Ok(json!({
        "classId": class.id,
        "class": class,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "classes.list" => classes_list(state),
        "classes.create" => classes_create(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
