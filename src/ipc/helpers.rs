use chrono::{Local, NaiveDate};
use serde_json::json;

use crate::attendance::AttendanceError;
use crate::ipc::error::{err, ok};
use crate::ipc::types::AppState;
use crate::notes::NoteError;
use crate::roster::RosterError;
use crate::workspace::{SettingsError, Workspace};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<AttendanceError> for HandlerErr {
    fn from(e: AttendanceError) -> Self {
        if let AttendanceError::Storage(inner) = &e {
            log::error!("attendance storage failure: {inner:#}");
        }
        let status = e.http_status();
        HandlerErr::new(e.code(), e.to_string()).with_details(json!({ "httpStatus": status }))
    }
}

impl From<RosterError> for HandlerErr {
    fn from(e: RosterError) -> Self {
        let code = match &e {
            RosterError::ClassNotFound(_) | RosterError::StudentNotFound(_) => "not_found",
            RosterError::Invalid(_) => "bad_params",
            RosterError::Storage(inner) => {
                log::error!("roster storage failure: {inner:#}");
                "storage_failed"
            }
        };
        HandlerErr::new(code, e.to_string())
    }
}

impl From<NoteError> for HandlerErr {
    fn from(e: NoteError) -> Self {
        let code = match &e {
            NoteError::Missing(_) | NoteError::NotPdf | NoteError::UnknownSubject(_) => {
                "bad_params"
            }
            NoteError::ClassNotFound(_) | NoteError::NotFound(_) => "not_found",
            NoteError::Storage(inner) => {
                log::error!("notes storage failure: {inner:#}");
                "storage_failed"
            }
        };
        HandlerErr::new(code, e.to_string())
    }
}

impl From<SettingsError> for HandlerErr {
    fn from(e: SettingsError) -> Self {
        match e {
            SettingsError::Invalid(m) => HandlerErr::bad_params(m),
            SettingsError::Storage(inner) => {
                log::error!("settings storage failure: {inner:#}");
                HandlerErr::new("storage_failed", inner.to_string())
            }
        }
    }
}

pub fn respond(id: &str, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}

pub fn require_workspace(state: &mut AppState) -> Result<&mut Workspace, HandlerErr> {
    state
        .workspace
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Trimmed string param; empty strings count as absent.
pub fn get_opt_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Accepts numbers or numeric strings, since form inputs often send "15".
pub fn get_required_u32(params: &serde_json::Value, key: &str) -> Result<u32, HandlerErr> {
    let v = params
        .get(key)
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    let n = match v {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    n.and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a non-negative integer", key)))
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_helpers_trim_and_validate() {
        let p = json!({ "a": "  x ", "b": "", "n": "15", "m": 30, "neg": -1, "big": 5_000_000_000u64 });
        assert_eq!(get_required_str(&p, "a").ok(), Some("x".to_string()));
        assert!(get_required_str(&p, "b").is_err());
        assert_eq!(get_opt_str(&p, "b"), None);
        assert_eq!(get_required_u32(&p, "n").ok(), Some(15));
        assert_eq!(get_required_u32(&p, "m").ok(), Some(30));
        assert!(get_required_u32(&p, "neg").is_err());
        assert!(get_required_u32(&p, "big").is_err());
        assert!(get_required_u32(&p, "zzz").is_err());
    }

    #[test]
    fn attendance_errors_carry_http_status() {
        let e: HandlerErr = AttendanceError::AlreadyMarked.into();
        assert_eq!(e.code, "already_marked");
        assert_eq!(e.details, Some(json!({ "httpStatus": 409 })));
        let e: HandlerErr = AttendanceError::CodeExpired.into();
        assert_eq!(e.details, Some(json!({ "httpStatus": 410 })));
    }
}
