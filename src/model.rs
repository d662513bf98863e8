use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Keyed;

pub const DEFAULT_INSTITUTION_ID: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub division: Option<String>,
    #[serde(default = "default_institution_id")]
    pub institution_id: String,
}

fn default_institution_id() -> String {
    DEFAULT_INSTITUTION_ID.to_string()
}

impl Class {
    /// "Class 10 - A", or just the name when there is no division.
    pub fn label(&self) -> String {
        class_label(&self.name, self.division.as_deref())
    }
}

pub fn class_label(name: &str, division: Option<&str>) -> String {
    match division.filter(|d| !d.is_empty()) {
        Some(d) => format!("{} - {}", name, d),
        None => name.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Inactive,
}

impl StudentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Active => "active",
            StudentStatus::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub roll_number: String,
    pub class_id: String,
    pub class_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub division: Option<String>,
    pub enrollment_date: NaiveDate,
    pub status: StudentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendance_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_score: Option<f64>,
}

impl Student {
    pub fn class_label(&self) -> String {
        class_label(&self.class_name, self.division.as_deref())
    }
}

/// Lifecycle: `Active` moves to `Expired` (time-driven) or `Closed` (manual);
/// `Expired` may still be closed. Nothing ever returns to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Expired,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Expired => "expired",
            SessionStatus::Closed => "closed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(SessionStatus::Active),
            "expired" => Some(SessionStatus::Expired),
            "closed" => Some(SessionStatus::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSession {
    pub id: String,
    pub class_id: String,
    pub class_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub division: Option<String>,
    pub date: NaiveDate,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub faculty_id: String,
    pub faculty_name: String,
    pub subject: String,
    pub status: SessionStatus,
}

impl AttendanceSession {
    pub fn class_label(&self) -> String {
        class_label(&self.class_name, self.division.as_deref())
    }

    /// Redeemable only while the status is still active AND the deadline has
    /// not passed; the status field may lag by up to one sweep interval.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Active && now < self.expires_at
    }

    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Present,
    Absent,
    Late,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Present => "present",
            RecordStatus::Absent => "absent",
            RecordStatus::Late => "late",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub session_id: String,
    pub student_id: String,
    pub student_name: String,
    pub roll_number: String,
    pub marked_at: DateTime<Utc>,
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyNote {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub description: String,
    pub file_name: String,
    pub file_url: String,
    pub uploaded_by: String,
    pub uploaded_by_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub class_id: String,
    pub class_name: String,
}

impl Keyed for Class {
    fn key_id(&self) -> &str {
        &self.id
    }
}

impl Keyed for Student {
    fn key_id(&self) -> &str {
        &self.id
    }
}

impl Keyed for AttendanceSession {
    fn key_id(&self) -> &str {
        &self.id
    }
}

impl Keyed for AttendanceRecord {
    fn key_id(&self) -> &str {
        &self.id
    }
}

impl Keyed for StudyNote {
    fn key_id(&self) -> &str {
        &self.id
    }
}
