use chrono::{DateTime, Duration, Local, Utc};
use rand::RngCore;
use std::collections::HashSet;
use std::rc::Rc;
use uuid::Uuid;

use crate::codegen::{generate_code, normalize_code};
use crate::model::{AttendanceRecord, AttendanceSession, RecordStatus, SessionStatus};
use crate::roster::Roster;
use crate::store::{Collection, KvStore};

pub const SESSIONS_KEY: &str = "attendanceSessions";
pub const RECORDS_KEY: &str = "attendanceRecords";
pub const DEFAULT_DURATIONS: [u32; 5] = [5, 10, 15, 30, 60];

const MAX_CODE_ATTEMPTS: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error("class not found: {0}")]
    InvalidClass(String),
    #[error("duration must be one of {allowed:?} minutes (got {got})")]
    InvalidDuration { got: u32, allowed: Vec<u32> },
    #[error("attendance session not found: {0}")]
    SessionNotFound(String),
    #[error("Invalid or expired code. Please try again.")]
    InvalidOrExpiredCode,
    #[error("This code has expired. Please ask your teacher for a new code.")]
    CodeExpired,
    #[error("You have already marked your attendance for this session.")]
    AlreadyMarked,
    #[error("could not allocate an attendance code not already in use")]
    CodeSpaceExhausted,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl AttendanceError {
    pub fn code(&self) -> &'static str {
        match self {
            AttendanceError::InvalidClass(_) => "invalid_class",
            AttendanceError::InvalidDuration { .. } => "invalid_duration",
            AttendanceError::SessionNotFound(_) => "not_found",
            AttendanceError::InvalidOrExpiredCode => "invalid_code",
            AttendanceError::CodeExpired => "code_expired",
            AttendanceError::AlreadyMarked => "already_marked",
            AttendanceError::CodeSpaceExhausted => "code_space_exhausted",
            AttendanceError::Storage(_) => "storage_failed",
        }
    }

    /// Status a REST front-end would use for the same outcome.
    pub fn http_status(&self) -> u16 {
        match self {
            AttendanceError::InvalidClass(_) | AttendanceError::InvalidDuration { .. } => 400,
            AttendanceError::SessionNotFound(_) | AttendanceError::InvalidOrExpiredCode => 404,
            AttendanceError::CodeExpired => 410,
            AttendanceError::AlreadyMarked => 409,
            AttendanceError::CodeSpaceExhausted | AttendanceError::Storage(_) => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendancePolicy {
    pub allowed_durations: Vec<u32>,
    /// Reject codes already held by a session that is still open.
    pub enforce_unique_codes: bool,
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            allowed_durations: DEFAULT_DURATIONS.to_vec(),
            enforce_unique_codes: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub class_id: String,
    pub subject: String,
    pub duration_minutes: u32,
    pub faculty_id: String,
    pub faculty_name: String,
}

#[derive(Debug, Clone)]
pub struct Redemption {
    pub code: String,
    pub student_id: String,
    pub student_name: String,
    pub roll_number: String,
}

/// Per-student view over the records, as shown on the student's own page.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentHistory {
    pub records: Vec<AttendanceRecord>,
    pub present_count: usize,
    pub total_count: usize,
    pub percentage: u32,
}

/// Owns the session and record collections and is their only writer.
///
/// Every operation assumes serialized execution; callers on more than one
/// thread must wrap the controller in a lock.
pub struct AttendanceController {
    sessions: Collection<AttendanceSession>,
    records: Collection<AttendanceRecord>,
    rng: Box<dyn RngCore>,
    policy: AttendancePolicy,
}

impl AttendanceController {
    pub fn open(
        kv: Rc<dyn KvStore>,
        rng: Box<dyn RngCore>,
        policy: AttendancePolicy,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            sessions: Collection::open(kv.clone(), SESSIONS_KEY)?,
            records: Collection::open(kv, RECORDS_KEY)?,
            rng,
            policy,
        })
    }

    pub fn policy(&self) -> &AttendancePolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: AttendancePolicy) {
        self.policy = policy;
    }

    pub fn sessions(&self) -> &[AttendanceSession] {
        self.sessions.list_all()
    }

    pub fn records(&self) -> &[AttendanceRecord] {
        self.records.list_all()
    }

    pub fn find_session(&self, session_id: &str) -> Option<&AttendanceSession> {
        self.sessions.find_by_id(session_id)
    }

    pub fn records_for_session<'a>(
        &'a self,
        session_id: &'a str,
    ) -> impl Iterator<Item = &'a AttendanceRecord> + 'a {
        self.records
            .list_all()
            .iter()
            .filter(move |r| r.session_id == session_id)
    }

    pub fn active_count(&self) -> usize {
        self.sessions
            .list_all()
            .iter()
            .filter(|s| s.status == SessionStatus::Active)
            .count()
    }

    pub fn create_session(
        &mut self,
        roster: &Roster,
        req: NewSession,
        now: DateTime<Utc>,
    ) -> Result<AttendanceSession, AttendanceError> {
        let class = roster
            .find_class(&req.class_id)
            .ok_or_else(|| AttendanceError::InvalidClass(req.class_id.clone()))?;
        if !self.policy.allowed_durations.contains(&req.duration_minutes) {
            return Err(AttendanceError::InvalidDuration {
                got: req.duration_minutes,
                allowed: self.policy.allowed_durations.clone(),
            });
        }

        let code = self.allocate_code(now)?;
        let session = AttendanceSession {
            id: Uuid::new_v4().to_string(),
            class_id: class.id.clone(),
            class_name: class.name.clone(),
            division: class.division.clone(),
            date: now.with_timezone(&Local).date_naive(),
            code,
            expires_at: now + Duration::minutes(i64::from(req.duration_minutes)),
            faculty_id: req.faculty_id,
            faculty_name: req.faculty_name,
            subject: req.subject.trim().to_string(),
            status: SessionStatus::Active,
        };
        self.sessions.insert(session.clone())?;
        log::info!(
            "attendance session {} opened for {} ({}), code {} valid {} min",
            session.id,
            session.class_label(),
            session.subject,
            session.code,
            req.duration_minutes
        );
        Ok(session)
    }

    fn allocate_code(&mut self, now: DateTime<Utc>) -> Result<String, AttendanceError> {
        if !self.policy.enforce_unique_codes {
            return Ok(generate_code(&mut self.rng));
        }
        let in_use: HashSet<&str> = self
            .sessions
            .list_all()
            .iter()
            .filter(|s| s.is_open_at(now))
            .map(|s| s.code.as_str())
            .collect();
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_code(&mut self.rng);
            if !in_use.contains(code.as_str()) {
                return Ok(code);
            }
            log::debug!("attendance code collision on {code}, retrying");
        }
        Err(AttendanceError::CodeSpaceExhausted)
    }

    /// Moves every active session whose deadline is at or before `now` to
    /// `expired`. Returns the sessions that changed; re-running with the same
    /// `now` changes nothing.
    pub fn sweep_expirations(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<AttendanceSession>, AttendanceError> {
        let expired = self.sessions.update_where(
            |s| s.status == SessionStatus::Active && s.expires_at <= now,
            |s| s.status = SessionStatus::Expired,
        )?;
        for s in &expired {
            log::info!("attendance session {} expired (code {})", s.id, s.code);
        }
        Ok(expired)
    }

    /// Closing is allowed from any state and always lands on `closed`.
    pub fn close_session(&mut self, session_id: &str) -> Result<AttendanceSession, AttendanceError> {
        let closed = self
            .sessions
            .update(session_id, |s| s.status = SessionStatus::Closed)?
            .ok_or_else(|| AttendanceError::SessionNotFound(session_id.to_string()))?;
        log::info!("attendance session {} closed", closed.id);
        Ok(closed)
    }

    /// Marks `student_id` present on the active session holding `code`.
    ///
    /// Checks run in order: an active session with the code must exist, its
    /// deadline must not have passed (checked live, independent of the sweep),
    /// and the student must not already hold a record for it.
    pub fn redeem(
        &mut self,
        req: Redemption,
        now: DateTime<Utc>,
    ) -> Result<AttendanceSession, AttendanceError> {
        let code = normalize_code(&req.code);
        let candidates: Vec<&AttendanceSession> = self
            .sessions
            .list_all()
            .iter()
            .filter(|s| s.status == SessionStatus::Active && s.code.eq_ignore_ascii_case(&code))
            .collect();
        // Duplicate live codes can only come from data written with uniqueness
        // disabled; prefer the one that is still within its deadline.
        let Some(session) = candidates
            .iter()
            .find(|s| now < s.expires_at)
            .or_else(|| candidates.first())
            .map(|s| (*s).clone())
        else {
            log::debug!("redeem rejected: no active session for code {code}");
            return Err(AttendanceError::InvalidOrExpiredCode);
        };

        if session.expires_at <= now {
            log::debug!("redeem rejected: session {} past deadline", session.id);
            return Err(AttendanceError::CodeExpired);
        }

        let already = self
            .records
            .list_all()
            .iter()
            .any(|r| r.session_id == session.id && r.student_id == req.student_id);
        if already {
            log::debug!(
                "redeem rejected: {} already marked on {}",
                req.student_id,
                session.id
            );
            return Err(AttendanceError::AlreadyMarked);
        }

        let record = AttendanceRecord {
            id: Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            student_id: req.student_id,
            student_name: req.student_name,
            roll_number: req.roll_number,
            marked_at: now,
            status: RecordStatus::Present,
        };
        self.records.insert(record.clone())?;
        log::info!(
            "attendance marked: {} on session {} ({})",
            record.student_id,
            session.id,
            session.subject
        );
        Ok(session)
    }

    pub fn student_history(&self, student_id: &str) -> StudentHistory {
        let records: Vec<AttendanceRecord> = self
            .records
            .list_all()
            .iter()
            .filter(|r| r.student_id == student_id)
            .cloned()
            .collect();
        let present_count = records
            .iter()
            .filter(|r| r.status == RecordStatus::Present)
            .count();
        let total_count = records.len();
        let percentage = if total_count > 0 {
            ((present_count as f64 / total_count as f64) * 100.0).round() as u32
        } else {
            0
        };
        StudentHistory {
            records,
            present_count,
            total_count,
            percentage,
        }
    }
}
