//! Canonical analysis schema.
//!
//! Whatever shape the oracle answers in, it is normalised into these types before leaving the
//! core. Confidence is always a percentage in `0..=100`.

use api_shared::wire;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Moderate,
    Severe,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "mild" => Ok(Severity::Low),
            "moderate" | "medium" => Ok(Severity::Moderate),
            "severe" | "high" => Ok(Severity::Severe),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeficiencyFinding {
    pub vitamin: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub deficiencies: Vec<DeficiencyFinding>,
    pub overall_health: String,
}

impl AnalysisResult {
    pub fn is_clear(&self) -> bool {
        self.deficiencies.is_empty()
    }
}

impl From<&DeficiencyFinding> for wire::DeficiencyRes {
    fn from(f: &DeficiencyFinding) -> Self {
        wire::DeficiencyRes {
            vitamin: f.vitamin.clone(),
            confidence: f.confidence,
            severity: f.severity.map(|s| s.as_str().to_string()),
            signs: f.signs.clone(),
            recommendations: f.recommendations.clone(),
            description: f.description.clone(),
        }
    }
}

impl From<&AnalysisResult> for wire::AnalysisRes {
    fn from(r: &AnalysisResult) -> Self {
        wire::AnalysisRes {
            deficiencies: r.deficiencies.iter().map(Into::into).collect(),
            overall_health: r.overall_health.clone(),
        }
    }
}

impl From<wire::AnalysisRes> for AnalysisResult {
    /// Accepts a result echoed back by a client. Unrecognised severities are dropped and
    /// confidence is clamped to the canonical range.
    fn from(r: wire::AnalysisRes) -> Self {
        AnalysisResult {
            deficiencies: r
                .deficiencies
                .into_iter()
                .map(|d| DeficiencyFinding {
                    vitamin: d.vitamin,
                    confidence: d.confidence.clamp(0.0, 100.0),
                    severity: d.severity.and_then(|s| s.parse().ok()),
                    signs: d.signs,
                    recommendations: d.recommendations,
                    description: d.description,
                })
                .collect(),
            overall_health: r.overall_health,
        }
    }
}
