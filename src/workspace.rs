use rand::rngs::StdRng;
use rand::SeedableRng;
use rusqlite::Connection;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::attendance::{AttendanceController, AttendancePolicy, DEFAULT_DURATIONS};
use crate::db;
use crate::notes::NoteLibrary;
use crate::roster::Roster;
use crate::store::KvStore;

pub const SETTING_ALLOWED_DURATIONS: &str = "attendance.allowedDurations";
pub const SETTING_ENFORCE_UNIQUE_CODES: &str = "attendance.enforceUniqueCodes";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Everything a selected workspace directory holds, rehydrated at open.
pub struct Workspace {
    pub path: PathBuf,
    conn: Rc<Connection>,
    pub roster: Roster,
    pub attendance: AttendanceController,
    pub notes: NoteLibrary,
    /// Source for the participation draw in risk scoring.
    pub rng: StdRng,
}

impl Workspace {
    pub fn open(path: &Path, seed: Option<u64>) -> anyhow::Result<Self> {
        let conn = Rc::new(db::open_db(path)?);
        let kv: Rc<dyn KvStore> = conn.clone();
        let policy = load_policy(&conn)?;

        let (code_rng, rng) = match seed {
            Some(s) => (
                StdRng::seed_from_u64(s),
                StdRng::seed_from_u64(s.wrapping_add(1)),
            ),
            None => (StdRng::from_entropy(), StdRng::from_entropy()),
        };

        let roster = Roster::open(kv.clone())?;
        let attendance = AttendanceController::open(kv.clone(), Box::new(code_rng), policy)?;
        let notes = NoteLibrary::open(kv)?;
        log::info!(
            "workspace opened at {} ({} classes, {} students, {} sessions)",
            path.display(),
            roster.classes().len(),
            roster.students().len(),
            attendance.sessions().len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            conn,
            roster,
            attendance,
            notes,
            rng,
        })
    }

    pub fn settings_json(&self) -> serde_json::Value {
        policy_json(self.attendance.policy())
    }

    /// Applies a partial settings object. Unknown keys are rejected so typos
    /// do not silently do nothing.
    pub fn update_settings(&mut self, patch: &serde_json::Value) -> Result<AttendancePolicy, SettingsError> {
        let Some(obj) = patch.as_object() else {
            return Err(SettingsError::Invalid("patch must be an object".into()));
        };
        let mut policy = self.attendance.policy().clone();
        for (key, value) in obj {
            match key.as_str() {
                "allowedDurations" => {
                    policy.allowed_durations = parse_durations(value)?;
                }
                "enforceUniqueCodes" => {
                    policy.enforce_unique_codes = value.as_bool().ok_or_else(|| {
                        SettingsError::Invalid("enforceUniqueCodes must be a boolean".into())
                    })?;
                }
                other => {
                    return Err(SettingsError::Invalid(format!("unknown setting: {}", other)));
                }
            }
        }

        // Both keys land together or not at all.
        let tx = self.conn.unchecked_transaction().map_err(anyhow::Error::from)?;
        db::settings_set_json(&tx, SETTING_ALLOWED_DURATIONS, &json!(policy.allowed_durations))?;
        db::settings_set_json(
            &tx,
            SETTING_ENFORCE_UNIQUE_CODES,
            &json!(policy.enforce_unique_codes),
        )?;
        tx.commit().map_err(anyhow::Error::from)?;
        self.attendance.set_policy(policy.clone());
        log::info!("attendance settings updated: {:?}", policy);
        Ok(policy)
    }
}

pub fn policy_json(policy: &AttendancePolicy) -> serde_json::Value {
    json!({
        "allowedDurations": policy.allowed_durations,
        "enforceUniqueCodes": policy.enforce_unique_codes,
    })
}

/// Only subsets of the standard session lengths are accepted.
fn parse_durations(value: &serde_json::Value) -> Result<Vec<u32>, SettingsError> {
    let Some(items) = value.as_array() else {
        return Err(SettingsError::Invalid(
            "allowedDurations must be an array of minutes".into(),
        ));
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let minutes = item
            .as_u64()
            .and_then(|m| u32::try_from(m).ok())
            .filter(|m| DEFAULT_DURATIONS.contains(m));
        match minutes {
            Some(m) => out.push(m),
            None => {
                return Err(SettingsError::Invalid(format!(
                    "allowedDurations entries must be one of {:?} minutes",
                    DEFAULT_DURATIONS
                )))
            }
        }
    }
    out.sort_unstable();
    out.dedup();
    if out.is_empty() {
        return Err(SettingsError::Invalid(
            "allowedDurations must not be empty".into(),
        ));
    }
    Ok(out)
}

/// Reads one stored setting. Unparseable JSON is logged and treated as unset.
fn stored_setting(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let Some(raw) = db::settings_get_raw(conn, key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            log::warn!("ignoring malformed {key}: {e}");
            Ok(None)
        }
    }
}

fn load_policy(conn: &Connection) -> anyhow::Result<AttendancePolicy> {
    let mut policy = AttendancePolicy::default();
    if let Some(v) = stored_setting(conn, SETTING_ALLOWED_DURATIONS)? {
        match parse_durations(&v) {
            Ok(d) => policy.allowed_durations = d,
            Err(e) => log::warn!("ignoring stored {SETTING_ALLOWED_DURATIONS}: {e}"),
        }
    }
    if let Some(v) = stored_setting(conn, SETTING_ENFORCE_UNIQUE_CODES)? {
        match v.as_bool() {
            Some(b) => policy.enforce_unique_codes = b,
            None => log::warn!("ignoring stored {SETTING_ENFORCE_UNIQUE_CODES}: not a boolean"),
        }
    }
    Ok(policy)
}
