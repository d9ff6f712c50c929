//! The anatomy a photograph is taken of.
//!
//! The body part selects the validation question, the analysis instruction, the admissible
//! nutrients and the canned "all clear" message.

use crate::{AnalysisError, AnalysisOutcome};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyPart {
    Skin,
    Eyes,
    Tongue,
    Nails,
}

impl BodyPart {
    pub const ALL: [BodyPart; 4] = [
        BodyPart::Skin,
        BodyPart::Eyes,
        BodyPart::Tongue,
        BodyPart::Nails,
    ];

    /// Wire form, as sent in `bodyPart`.
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyPart::Skin => "skin",
            BodyPart::Eyes => "eyes",
            BodyPart::Tongue => "tongue",
            BodyPart::Nails => "nails",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BodyPart::Skin => "Skin",
            BodyPart::Eyes => "Eyes",
            BodyPart::Tongue => "Tongue",
            BodyPart::Nails => "Nails",
        }
    }

    /// Short description shown next to the selection.
    pub fn description(&self) -> &'static str {
        match self {
            BodyPart::Skin => "Analyze skin texture & color",
            BodyPart::Eyes => "Check eye health indicators",
            BodyPart::Tongue => "Examine tongue appearance",
            BodyPart::Nails => "Inspect nail condition",
        }
    }

    /// Singular noun used in prompts ("this nail image").
    pub fn image_noun(&self) -> &'static str {
        match self {
            BodyPart::Skin => "skin",
            BodyPart::Eyes => "eye",
            BodyPart::Tongue => "tongue",
            BodyPart::Nails => "nail",
        }
    }

    /// Deterministic message used whenever an analysis reports no deficiencies.
    pub fn no_deficiency_message(&self) -> &'static str {
        match self {
            BodyPart::Skin => "No vitamin deficiency detected in your skin image.",
            BodyPart::Eyes => "No vitamin deficiency detected in your eye image.",
            BodyPart::Tongue => "No vitamin deficiency detected in your tongue image.",
            BodyPart::Nails => "No vitamin deficiency detected in your nail image.",
        }
    }

    fn expected_values() -> String {
        Self::ALL
            .iter()
            .map(BodyPart::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BodyPart {
    type Err = AnalysisError;

    fn from_str(s: &str) -> AnalysisOutcome<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skin" => Ok(BodyPart::Skin),
            "eyes" => Ok(BodyPart::Eyes),
            "tongue" => Ok(BodyPart::Tongue),
            "nails" => Ok(BodyPart::Nails),
            other => Err(AnalysisError::BadRequest(format!(
                "Unsupported bodyPart: '{}'. Expected one of: {}",
                other,
                Self::expected_values()
            ))),
        }
    }
}
