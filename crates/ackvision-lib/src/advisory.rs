//! Rule-based academic advisory
//!
//! Combines the four model outputs, and the raw inputs when available, into
//! ordered guidance strings. Rules run in declaration order and each adds at
//! most one message. No learned component.

use crate::models::{Badge, FeatureRecord, Severity};
use crate::predictor::features::{
    coerce_numeric, ATTENDANCE, INTERNET_USAGE, SLEEP_HOURS, STUDY_HOURS,
};
use crate::predictor::output::{HIGH_RISK, LOW_RISK, MEDIUM_RISK};
use serde_json::{Map, Value};

pub const MIN_ATTENDANCE: f64 = 75.0;
pub const MIN_STUDY_HOURS: f64 = 4.0;
pub const MIN_SLEEP_HOURS: f64 = 6.0;
pub const MAX_INTERNET_HOURS: f64 = 8.0;

const PERFORMANCE_TIPS: [(&str, &str); 4] = [
    (
        "High",
        "🌟 High performer! Consider mentoring peers or exploring advanced topics.",
    ),
    (
        "Medium",
        "📚 Steady performance. A structured daily study plan can lift you to the top band.",
    ),
    (
        "Low",
        "🆘 Low performance detected. Reduce distractions and ask your teachers for guidance.",
    ),
    (
        "Unknown",
        "❔ Performance category could not be determined. Review the entered values.",
    ),
];

const RISK_TIPS: [(&str, &str); 3] = [
    (
        HIGH_RISK,
        "🔴 High academic risk. Attend all classes and submit all assignments on time.",
    ),
    (
        MEDIUM_RISK,
        "🟡 Moderate risk. Small improvements in attendance and study hours will help.",
    ),
    (
        LOW_RISK,
        "🟢 Low risk. Stay consistent and avoid last-minute studying.",
    ),
];

/// Raw inputs the feature-level rules look at; each is optional
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AdvisoryInputs {
    pub attendance: Option<f64>,
    pub study_hours: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub internet_usage: Option<f64>,
}

impl AdvisoryInputs {
    /// Lenient extraction: absent or non-numeric values skip their rule
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let get = |key: &str| map.get(key).and_then(|v| coerce_numeric(key, v).ok());
        Self {
            attendance: get(ATTENDANCE),
            study_hours: get(STUDY_HOURS),
            sleep_hours: get(SLEEP_HOURS),
            internet_usage: get(INTERNET_USAGE),
        }
    }
}

impl From<&FeatureRecord> for AdvisoryInputs {
    fn from(record: &FeatureRecord) -> Self {
        Self {
            attendance: Some(record.attendance),
            study_hours: Some(record.study_hours),
            sleep_hours: Some(record.sleep_hours),
            internet_usage: Some(record.internet_usage),
        }
    }
}

fn score_band(exam_score: f64) -> &'static str {
    if exam_score >= 85.0 {
        "🏆 Outstanding predicted score! Keep up your excellent work."
    } else if exam_score >= 70.0 {
        "📈 Good predicted score. A little more effort could push you to excellence."
    } else if exam_score >= 50.0 {
        "⚠️ Borderline score predicted. Focus on weak subjects immediately."
    } else {
        "🚨 Critical: very low score predicted. Seek academic support urgently."
    }
}

fn pass_fail_tip(pass_fail: &str) -> &'static str {
    if pass_fail == "Fail" {
        "❌ You are at risk of failing. Prioritise exam preparation over all else."
    } else {
        "✅ On track to pass. Maintain consistency to secure the result."
    }
}

fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<String> {
    table
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, tip)| tip.to_string())
}

fn feature_tips(inputs: &AdvisoryInputs) -> Vec<Option<String>> {
    vec![
        inputs
            .attendance
            .filter(|a| *a < MIN_ATTENDANCE)
            .map(|a| format!("📅 Attendance is {a:.0}%, below the 75% minimum. Attend more classes.")),
        inputs
            .study_hours
            .filter(|h| *h < MIN_STUDY_HOURS)
            .map(|h| format!("📖 Only {h:.1} study hours/day. Aim for at least 4 to 6 hours.")),
        inputs
            .sleep_hours
            .filter(|h| *h < MIN_SLEEP_HOURS)
            .map(|h| format!("😴 Sleeping only {h:.1} hours. Poor sleep reduces memory retention.")),
        inputs
            .internet_usage
            .filter(|h| *h > MAX_INTERNET_HOURS)
            .map(|h| format!("📱 {h:.1} hours of internet usage/day is high. Reduce screen time.")),
    ]
}

/// Produce the ordered advisory messages for one student
pub fn advise(
    exam_score: f64,
    pass_fail: &str,
    performance: &str,
    risk_cluster: &str,
    inputs: Option<&AdvisoryInputs>,
) -> Vec<String> {
    let mut tips: Vec<Option<String>> = vec![
        Some(score_band(exam_score).to_string()),
        Some(pass_fail_tip(pass_fail).to_string()),
        lookup(&PERFORMANCE_TIPS, performance),
        lookup(&RISK_TIPS, risk_cluster),
    ];
    if let Some(inputs) = inputs {
        tips.extend(feature_tips(inputs));
    }

    tips.into_iter()
        .flatten()
        .filter(|t| !t.is_empty())
        .collect()
}

/// Reduce pass/fail and risk group to a result-card severity
pub fn badge(pass_fail: &str, risk_cluster: &str) -> Badge {
    let severity = if pass_fail == "Fail" || risk_cluster == HIGH_RISK {
        Severity::Danger
    } else if risk_cluster == MEDIUM_RISK {
        Severity::Warning
    } else {
        Severity::Success
    };
    severity.into()
}
