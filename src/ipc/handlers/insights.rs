use serde_json::json;
use std::collections::BTreeMap;

use crate::ipc::helpers::{get_opt_str, require_workspace, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::RiskLevel;
use crate::recommend;
use crate::risk::{self, RiskDistribution};

fn risk_predictions(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let class_id = get_opt_str(params, "classId");
    let level = match get_opt_str(params, "risk") {
        Some(raw) => Some(
            RiskLevel::parse(&raw)
                .ok_or_else(|| HandlerErr::bad_params(format!("unknown risk level: {}", raw)))?,
        ),
        None => None,
    };

    let students = ws
        .roster
        .students()
        .iter()
        .filter(|s| class_id.as_deref().map(|c| c == s.class_id).unwrap_or(true));
    // Participation is drawn for every student before filtering by level so a
    // filter does not change which draw each student receives.
    let predictions: Vec<_> = risk::predict_all(students, &mut ws.rng)
        .into_iter()
        .filter(|p| level.map(|l| l == p.overall_risk).unwrap_or(true))
        .collect();
    Ok(json!({ "predictions": predictions }))
}

fn risk_summary(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let predictions = risk::predict_all(ws.roster.students(), &mut ws.rng);
    let mut distribution = RiskDistribution::default();
    for p in &predictions {
        distribution.add(p.overall_risk);
    }
    let average_risk = if predictions.is_empty() {
        0
    } else {
        let sum: u32 = predictions.iter().map(|p| p.risk_percentage).sum();
        (f64::from(sum) / predictions.len() as f64).round() as u32
    };
    Ok(json!({
        "studentCount": predictions.len(),
        "distribution": distribution,
        "highRiskCount": distribution.high,
        "averageRiskPercentage": average_risk,
    }))
}

fn recommendations_for_scores(params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let raw = params
        .get("scores")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("scores must be an object of subject to score"))?;
    let mut scores = BTreeMap::new();
    for (subject, v) in raw {
        let score = v
            .as_f64()
            .filter(|n| (0.0..=100.0).contains(n))
            .ok_or_else(|| {
                HandlerErr::bad_params(format!("score for {} must be between 0 and 100", subject))
            })?;
        scores.insert(subject.clone(), score);
    }
    Ok(json!(recommend::recommend(&scores)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "risk.predictions" => risk_predictions(state, &req.params),
        "risk.summary" => risk_summary(state),
        "recommendations.forScores" => recommendations_for_scores(&req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
