use serde_json::json;
use std::path::PathBuf;

use crate::ipc::helpers::{get_required_str, require_workspace, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::workspace::Workspace;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(
        &req.id,
        Ok(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state
                .workspace
                .as_ref()
                .map(|w| w.path.to_string_lossy().to_string())
        })),
    )
}

fn workspace_select(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let path = PathBuf::from(get_required_str(params, "path")?);
    let ws = Workspace::open(&path, state.config.rng_seed)
        .map_err(|e| HandlerErr::new("db_open_failed", format!("{e:#}")))?;
    let result = json!({
        "workspacePath": path.to_string_lossy(),
        "classCount": ws.roster.classes().len(),
        "studentCount": ws.roster.students().len(),
        "sessionCount": ws.attendance.sessions().len(),
    });
    state.workspace = Some(ws);
    Ok(result)
}

fn settings_get(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    Ok(ws.settings_json())
}

fn settings_update(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let patch = params
        .get("patch")
        .ok_or_else(|| HandlerErr::bad_params("missing patch"))?;
    ws.update_settings(patch)?;
    Ok(ws.settings_json())
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "health" => return Some(handle_health(state, req)),
        "workspace.select" => workspace_select(state, &req.params),
        "settings.get" => settings_get(state),
        "settings.update" => settings_update(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
