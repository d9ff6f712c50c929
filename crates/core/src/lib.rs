//! # VDD Core
//!
//! Core logic for the vitamin deficiency detector.
//!
//! This crate contains:
//! - The two-stage validate-then-classify pipeline against the AI gateway
//! - Normalisation of the model's answer into one canonical schema
//! - The client upload flow and its fire-and-forget history writes
//! - File-backed profile, medical history and analysis history storage
//!
//! **No API concerns**: HTTP routing, CORS and OpenAPI belong in `api-rest`; wire types live
//! in `api-shared`.

pub mod body_part;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod finding;
pub mod flow;
pub mod normalizer;
pub mod oracle;
pub mod orchestrator;
pub mod prompts;
pub mod store;
pub mod user_id;
pub mod verdict;

pub use api_shared::wire;

pub use body_part::BodyPart;
pub use config::{AnalysisScope, CoreConfig, OracleConfig};
pub use dispatch::HistoryDispatcher;
pub use error::{
    AnalysisError, AnalysisOutcome, ConfigError, ConfigResult, StoreError, StoreResult,
};
pub use finding::{AnalysisResult, DeficiencyFinding, Severity};
pub use flow::{FlowError, FlowResult, FlowState, SubmissionNotice, UploadFlow};
pub use oracle::{GatewayOracle, Oracle};
pub use orchestrator::{AnalysisRequest, Analyzer, Orchestrator, Stage};
pub use store::{
    AnalysisHistoryRecord, FileProfileStore, MedicalHistory, MedicalHistoryFields, ProfileStore,
    UserProfile,
};
pub use user_id::UserId;
pub use vdd_types::NonEmptyText;
