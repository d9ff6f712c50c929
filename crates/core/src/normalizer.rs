//! Turns the oracle's textual answer into the canonical [`AnalysisResult`].
//!
//! The oracle answers in several historical shapes (percent or fractional confidence,
//! with or without severity/signs/recommendations, `overall_health` or `overallHealth`).
//! Every shape is folded into one schema here.
//!
//! Policy for incomplete findings: an element without a vitamin name or without a numeric
//! confidence fails the whole payload with [`AnalysisError::Parse`].

use crate::body_part::BodyPart;
use crate::finding::{AnalysisResult, DeficiencyFinding, Severity};
use crate::{AnalysisError, AnalysisOutcome};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

#[derive(Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    deficiencies: Option<Vec<RawFinding>>,
    #[serde(default, alias = "overallHealth")]
    overall_health: Option<String>,
}

#[derive(Deserialize)]
struct RawFinding {
    #[serde(default, alias = "vitaminOrMineral", alias = "vitamin_or_mineral")]
    vitamin: Option<String>,
    #[serde(default)]
    confidence: Option<Value>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    signs: Option<Value>,
    #[serde(default)]
    recommendations: Option<Value>,
    #[serde(default)]
    description: Option<String>,
}

/// Parse and normalise a raw analysis payload for `part`.
///
/// # Errors
/// Returns [`AnalysisError::Parse`] if the text is not JSON of the expected shape or a finding
/// lacks a vitamin name or confidence.
pub fn normalize(raw: &str, part: BodyPart) -> AnalysisOutcome<AnalysisResult> {
    let payload = strip_code_fence(raw);
    let parsed: RawAnalysis = serde_json::from_str(payload)
        .map_err(|e| AnalysisError::Parse(format!("invalid analysis JSON: {e}")))?;

    let raw_findings = parsed.deficiencies.unwrap_or_default();
    let scale = confidence_scale(&raw_findings);
    let deficiencies = raw_findings
        .into_iter()
        .enumerate()
        .map(|(index, raw)| normalize_finding(index, raw, scale))
        .collect::<AnalysisOutcome<Vec<_>>>()?;

    // The oracle's "all clear" wording is not trusted.
    let overall_health = if deficiencies.is_empty() {
        part.no_deficiency_message().to_string()
    } else {
        parsed.overall_health.unwrap_or_default()
    };

    Ok(AnalysisResult {
        deficiencies,
        overall_health,
    })
}

fn normalize_finding(
    index: usize,
    raw: RawFinding,
    scale: f64,
) -> AnalysisOutcome<DeficiencyFinding> {
    let vitamin = raw
        .vitamin
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            AnalysisError::Parse(format!("deficiency #{index} is missing a vitamin name"))
        })?;

    let confidence = raw
        .confidence
        .as_ref()
        .and_then(numeric)
        .map(|c| c.to_percent(scale))
        .ok_or_else(|| {
            AnalysisError::Parse(format!("deficiency '{vitamin}' is missing a confidence"))
        })?;

    let severity = raw.severity.and_then(|s| match s.parse::<Severity>() {
        Ok(sev) => Some(sev),
        Err(e) => {
            warn!(vitamin = %vitamin, error = %e, "dropping unrecognised severity");
            None
        }
    });

    Ok(DeficiencyFinding {
        vitamin,
        confidence,
        severity,
        signs: string_list(raw.signs),
        recommendations: string_list(raw.recommendations),
        description: raw
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
    })
}

struct Confidence {
    value: f64,
    /// Written with a trailing `%`.
    marked: bool,
}

impl Confidence {
    fn to_percent(&self, scale: f64) -> f64 {
        let percent = if self.marked { self.value } else { self.value * scale };
        percent.clamp(0.0, 100.0)
    }
}

/// Accepts `85`, `0.85`, `"85"` and `"85%"`.
fn numeric(value: &Value) -> Option<Confidence> {
    let (n, marked) = match value {
        Value::Number(n) => (n.as_f64(), false),
        Value::String(s) => {
            let s = s.trim();
            let marked = s.ends_with('%');
            (s.trim_end_matches('%').trim().parse::<f64>().ok(), marked)
        }
        _ => (None, false),
    };
    n.filter(|n| n.is_finite())
        .map(|value| Confidence { value, marked })
}

/// One scale per payload: if no unmarked confidence exceeds 1, they are all fractions.
fn confidence_scale(findings: &[RawFinding]) -> f64 {
    let mut unmarked = findings
        .iter()
        .filter_map(|f| f.confidence.as_ref().and_then(numeric))
        .filter(|c| !c.marked)
        .peekable();
    if unmarked.peek().is_none() {
        return 1.0;
    }
    if unmarked.all(|c| c.value <= 1.0) {
        100.0
    } else {
        1.0
    }
}

fn string_list(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Removes a surrounding Markdown code fence, if any.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
