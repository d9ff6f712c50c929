//! Validate-then-classify request orchestration.
//!
//! One call to [`Orchestrator::run`] walks a request through
//! `Received → Validating → {Rejected | Validated} → Classifying → {Classified | Failed} →
//! Normalized`. Validation always completes before classification starts, and a rejected image
//! is never classified.

use crate::body_part::BodyPart;
use crate::finding::AnalysisResult;
use crate::normalizer::normalize;
use crate::oracle::Oracle;
use crate::{AnalysisError, AnalysisOutcome};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vdd_types::NonEmptyText;

/// A validated analyze request: a non-empty image and a supported body part.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    image: NonEmptyText,
    body_part: BodyPart,
}

impl AnalysisRequest {
    pub fn new(image: NonEmptyText, body_part: BodyPart) -> Self {
        Self { image, body_part }
    }

    /// Build a request from the raw wire fields.
    ///
    /// # Errors
    /// Returns [`AnalysisError::BadRequest`] naming the missing parameter(s), or the
    /// unsupported body part.
    pub fn from_raw(image: Option<&str>, body_part: Option<&str>) -> AnalysisOutcome<Self> {
        let image = NonEmptyText::from_optional(image);
        let body_part = NonEmptyText::from_optional(body_part);

        match (image, body_part) {
            (Some(image), Some(part)) => Ok(Self::new(image, part.as_str().parse()?)),
            (None, Some(_)) => Err(AnalysisError::BadRequest(
                "Missing required parameter: image".into(),
            )),
            (Some(_), None) => Err(AnalysisError::BadRequest(
                "Missing required parameter: bodyPart".into(),
            )),
            (None, None) => Err(AnalysisError::BadRequest(
                "Missing required parameters: image and bodyPart".into(),
            )),
        }
    }

    pub fn image(&self) -> &NonEmptyText {
        &self.image
    }

    pub fn body_part(&self) -> BodyPart {
        self.body_part
    }
}

/// Orchestration states, used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validating,
    Rejected,
    Validated,
    Classifying,
    Classified,
    Failed,
    Normalized,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Validating => "validating",
            Stage::Rejected => "rejected",
            Stage::Validated => "validated",
            Stage::Classifying => "classifying",
            Stage::Classified => "classified",
            Stage::Failed => "failed",
            Stage::Normalized => "normalized",
        };
        f.write_str(name)
    }
}

/// Anything that can turn a request into an analysis.
///
/// The upload flow submits through this trait so it can run against the in-process
/// orchestrator or a test double.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest) -> AnalysisOutcome<AnalysisResult>;
}

pub struct Orchestrator {
    oracle: Arc<dyn Oracle>,
}

impl Orchestrator {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }

    /// Run one request through validation, classification and normalisation.
    ///
    /// # Errors
    /// - [`AnalysisError::ImageRejected`] when the image does not show the body part.
    /// - Any oracle fault from validation or classification.
    /// - [`AnalysisError::Parse`] when the analysis cannot be normalised.
    pub async fn run(&self, request: &AnalysisRequest) -> AnalysisOutcome<AnalysisResult> {
        let part = request.body_part();
        trace_stage(Stage::Received, part);

        trace_stage(Stage::Validating, part);
        let verdict = self
            .oracle
            .validate(request.image(), part)
            .await
            .inspect_err(|e| warn!(body_part = %part, error = %e, "validation failed"))?;

        if !verdict {
            trace_stage(Stage::Rejected, part);
            info!(body_part = %part, "image rejected by validation");
            return Err(AnalysisError::ImageRejected { body_part: part });
        }
        trace_stage(Stage::Validated, part);

        trace_stage(Stage::Classifying, part);
        let raw = match self.oracle.classify(request.image(), part).await {
            Ok(raw) => raw,
            Err(e) => {
                trace_stage(Stage::Failed, part);
                warn!(body_part = %part, error = %e, "classification failed");
                return Err(e);
            }
        };
        trace_stage(Stage::Classified, part);

        let result = normalize(&raw, part)
            .inspect_err(|e| warn!(body_part = %part, error = %e, "normalisation failed"))?;
        trace_stage(Stage::Normalized, part);

        info!(
            body_part = %part,
            deficiencies = result.deficiencies.len(),
            "analysis complete"
        );
        Ok(result)
    }
}

#[async_trait]
impl Analyzer for Orchestrator {
    async fn analyze(&self, request: AnalysisRequest) -> AnalysisOutcome<AnalysisResult> {
        self.run(&request).await
    }
}

fn trace_stage(stage: Stage, part: BodyPart) {
    debug!(%stage, body_part = %part, "orchestration stage");
}
