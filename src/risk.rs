use rand::Rng;
use serde::Serialize;

use crate::model::{RiskLevel, Student};

pub const ATTENDANCE_THRESHOLD: f64 = 75.0;
pub const ACADEMIC_THRESHOLD: f64 = 60.0;
pub const PARTICIPATION_THRESHOLD: u32 = 60;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskPrediction {
    pub student_id: String,
    pub student_name: String,
    pub roll_number: String,
    pub class_name: String,
    pub attendance_score: f64,
    pub academic_score: f64,
    pub participation_score: u32,
    pub overall_risk: RiskLevel,
    pub risk_percentage: u32,
    pub factors: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskDistribution {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl RiskDistribution {
    pub fn add(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::Low => self.low += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::High => self.high += 1,
        }
    }
}

/// Participation has no recorded source; it is drawn uniformly from 50..=100.
pub fn participation_score<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    (50.0 + rng.gen::<f64>() * 50.0).round() as u32
}

pub fn level_for(risk_percentage: f64) -> RiskLevel {
    if risk_percentage < 30.0 {
        RiskLevel::Low
    } else if risk_percentage < 60.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

pub fn predict(student: &Student, participation: u32) -> RiskPrediction {
    let attendance = student.attendance_percentage.unwrap_or(0.0);
    let academic = student.average_score.unwrap_or(0.0);
    let risk = (100.0 - (attendance * 0.4 + academic * 0.4 + f64::from(participation) * 0.2))
        .clamp(0.0, 100.0);

    let mut factors = Vec::new();
    let mut recommendations = Vec::new();
    if attendance < ATTENDANCE_THRESHOLD {
        factors.push("Low attendance rate".to_string());
        recommendations.push("Implement attendance improvement plan".to_string());
    }
    if academic < ACADEMIC_THRESHOLD {
        factors.push("Below average academic performance".to_string());
        recommendations.push("Consider remedial classes or tutoring".to_string());
    }
    if participation < PARTICIPATION_THRESHOLD {
        factors.push("Limited class participation".to_string());
        recommendations.push("Encourage active participation in discussions".to_string());
    }
    if factors.is_empty() {
        factors.push("Student is performing well".to_string());
        recommendations.push("Continue current approach".to_string());
    }

    RiskPrediction {
        student_id: student.id.clone(),
        student_name: student.name.clone(),
        roll_number: student.roll_number.clone(),
        class_name: student.class_label(),
        attendance_score: attendance,
        academic_score: academic,
        participation_score: participation,
        overall_risk: level_for(risk),
        risk_percentage: risk.round() as u32,
        factors,
        recommendations,
    }
}

pub fn predict_all<'a, R, I>(students: I, rng: &mut R) -> Vec<RiskPrediction>
where
    R: Rng + ?Sized,
    I: IntoIterator<Item = &'a Student>,
{
    students
        .into_iter()
        .map(|s| {
            let participation = participation_score(rng);
            predict(s, participation)
        })
        .collect()
}

/// One-line advice used by the exported risk report; driven by the stored
/// figures only.
pub fn report_recommendation(student: &Student) -> &'static str {
    if student.attendance_percentage.unwrap_or(0.0) < ATTENDANCE_THRESHOLD {
        "Improve attendance"
    } else if student.average_score.unwrap_or(0.0) < ACADEMIC_THRESHOLD {
        "Academic support needed"
    } else {
        "Continue current approach"
    }
}
