//! Request and response bodies exchanged over HTTP.
//!
//! Field names follow what the browser client already sends and reads: `bodyPart` on the
//! analyze request, `overall_health` on the result, snake_case on profile resources.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Analyze request. Both fields are optional on the wire so that a missing field can be
/// reported by name rather than as a generic deserialisation failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalyzeReq {
    /// Image as a data URI (`data:image/jpeg;base64,...`)
    #[serde(default)]
    pub image: Option<String>,
    /// One of `skin`, `eyes`, `tongue`, `nails`
    #[serde(default, rename = "bodyPart")]
    pub body_part: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeficiencyRes {
    pub vitamin: String,
    /// Percent, 0-100
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisRes {
    pub deficiencies: Vec<DeficiencyRes>,
    pub overall_health: String,
}

/// Generic fault body (`400`, `402`, `429`, `500`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

/// Body returned when the image does not show the selected body part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InvalidImageRes {
    /// Always `invalid_image`
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProfileRes {
    pub user_id: String,
    pub full_name: String,
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileReq {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MedicalHistoryRes {
    pub user_id: String,
    pub known_conditions: String,
    pub current_medications: String,
    pub allergies: String,
    pub family_history: String,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UpsertMedicalHistoryReq {
    #[serde(default)]
    pub known_conditions: String,
    #[serde(default)]
    pub current_medications: String,
    #[serde(default)]
    pub allergies: String,
    #[serde(default)]
    pub family_history: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisHistoryRes {
    pub id: String,
    pub user_id: String,
    pub body_part: String,
    pub image_preview: String,
    pub analysis_result: AnalysisRes,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ListAnalysesRes {
    pub analyses: Vec<AnalysisHistoryRes>,
}

/// Records a completed analysis for a signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordAnalysisReq {
    pub body_part: String,
    pub image: String,
    pub analysis_result: AnalysisRes,
}
