use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

use crate::model::{AttendanceRecord, AttendanceSession, RecordStatus, SessionStatus, Student};
use crate::risk::{report_recommendation, RiskDistribution};

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub csv: String,
    pub row_count: usize,
    /// Suggested download name without extension.
    pub file_stem: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_students: usize,
    pub present_today: usize,
    pub at_risk_students: usize,
    pub average_attendance: u32,
    pub active_sessions: usize,
    pub risk_distribution: RiskDistribution,
}

pub fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn push_row<S: AsRef<str>>(csv: &mut String, fields: &[S]) {
    let line: Vec<String> = fields.iter().map(|f| csv_quote(f.as_ref())).collect();
    csv.push_str(&line.join(","));
    csv.push('\n');
}

fn opt_num(v: Option<f64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

fn in_class(class_id: Option<&str>, candidate: &str) -> bool {
    class_id.map(|c| c == candidate).unwrap_or(true)
}

/// Sign-in sheet for one session: every enrolled student, `absent` unless a
/// record exists.
pub fn session_sheet(
    session: &AttendanceSession,
    records: &[&AttendanceRecord],
    enrolled: &[&Student],
) -> Report {
    let mut csv = String::new();
    push_row(&mut csv, &[format!("Attendance Report - {}", session.class_label())]);
    push_row(&mut csv, &[format!("Subject: {}", session.subject)]);
    push_row(&mut csv, &[format!("Date: {}", session.date)]);
    push_row(&mut csv, &[format!("Faculty: {}", session.faculty_name)]);
    csv.push('\n');
    push_row(&mut csv, &["Roll No", "Name", "Status", "Marked At"]);

    for student in enrolled {
        let record = records
            .iter()
            .find(|r| r.session_id == session.id && r.student_id == student.id);
        let (status, marked_at) = match record {
            Some(r) => (
                r.status.as_str().to_string(),
                r.marked_at.with_timezone(&Local).format("%H:%M:%S").to_string(),
            ),
            None => (RecordStatus::Absent.as_str().to_string(), "-".to_string()),
        };
        push_row(
            &mut csv,
            &[
                student.roll_number.clone(),
                student.name.clone(),
                status,
                marked_at,
            ],
        );
    }

    Report {
        csv,
        row_count: enrolled.len(),
        file_stem: format!("attendance_{}_{}", session.class_name, session.date),
    }
}

pub fn attendance_summary(
    sessions: &[AttendanceSession],
    records: &[AttendanceRecord],
    class_id: Option<&str>,
    today: NaiveDate,
) -> Report {
    let mut csv = String::new();
    push_row(
        &mut csv,
        &["Date", "Class", "Subject", "Faculty", "Code", "Status", "Present Count"],
    );
    let mut row_count = 0;
    for s in sessions.iter().filter(|s| in_class(class_id, &s.class_id)) {
        let present = records
            .iter()
            .filter(|r| r.session_id == s.id && r.status == RecordStatus::Present)
            .count();
        push_row(
            &mut csv,
            &[
                s.date.to_string(),
                s.class_label(),
                s.subject.clone(),
                s.faculty_name.clone(),
                s.code.clone(),
                s.status.as_str().to_string(),
                present.to_string(),
            ],
        );
        row_count += 1;
    }
    Report {
        csv,
        row_count,
        file_stem: format!("attendance_report_{}", today),
    }
}

pub fn student_directory(students: &[Student], class_id: Option<&str>, today: NaiveDate) -> Report {
    let mut csv = String::new();
    push_row(
        &mut csv,
        &[
            "Roll No",
            "Name",
            "Email",
            "Phone",
            "Class",
            "Division",
            "Status",
            "Attendance %",
            "Average Score",
            "Risk Level",
        ],
    );
    let mut row_count = 0;
    for s in students.iter().filter(|s| in_class(class_id, &s.class_id)) {
        push_row(
            &mut csv,
            &[
                s.roll_number.clone(),
                s.name.clone(),
                s.email.clone(),
                s.phone.clone(),
                s.class_name.clone(),
                s.division.clone().unwrap_or_else(|| "-".to_string()),
                s.status.as_str().to_string(),
                opt_num(s.attendance_percentage),
                opt_num(s.average_score),
                s.risk_level.map(|r| r.as_str().to_string()).unwrap_or_default(),
            ],
        );
        row_count += 1;
    }
    Report {
        csv,
        row_count,
        file_stem: format!("student_report_{}", today),
    }
}

pub fn risk_report(students: &[Student], class_id: Option<&str>, today: NaiveDate) -> Report {
    let mut csv = String::new();
    push_row(
        &mut csv,
        &[
            "Roll No",
            "Name",
            "Class",
            "Attendance %",
            "Academic Score",
            "Risk Level",
            "Recommendation",
        ],
    );
    let mut row_count = 0;
    for s in students.iter().filter(|s| in_class(class_id, &s.class_id)) {
        push_row(
            &mut csv,
            &[
                s.roll_number.clone(),
                s.name.clone(),
                s.class_label(),
                opt_num(s.attendance_percentage),
                opt_num(s.average_score),
                s.risk_level.map(|r| r.as_str().to_string()).unwrap_or_default(),
                report_recommendation(s).to_string(),
            ],
        );
        row_count += 1;
    }
    Report {
        csv,
        row_count,
        file_stem: format!("risk_analysis_report_{}", today),
    }
}

pub fn write_report(out_path: &Path, csv: &str) -> anyhow::Result<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out_path, csv)?;
    Ok(())
}

pub fn dashboard_stats(
    students: &[Student],
    sessions: &[AttendanceSession],
    records: &[AttendanceRecord],
    today: NaiveDate,
) -> DashboardStats {
    let mut risk_distribution = RiskDistribution::default();
    for level in students.iter().filter_map(|s| s.risk_level) {
        risk_distribution.add(level);
    }

    let todays: HashSet<&str> = sessions
        .iter()
        .filter(|s| s.date == today)
        .map(|s| s.id.as_str())
        .collect();
    let present_today: HashSet<&str> = records
        .iter()
        .filter(|r| r.status == RecordStatus::Present && todays.contains(r.session_id.as_str()))
        .map(|r| r.student_id.as_str())
        .collect();

    let average_attendance = if students.is_empty() {
        0
    } else {
        let sum: f64 = students
            .iter()
            .map(|s| s.attendance_percentage.unwrap_or(0.0))
            .sum();
        (sum / students.len() as f64).round() as u32
    };

    DashboardStats {
        total_students: students.len(),
        present_today: present_today.len(),
        at_risk_students: risk_distribution.high,
        average_attendance,
        active_sessions: sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Active)
            .count(),
        risk_distribution,
    }
}
