//! # API REST
//!
//! REST API implementation for VDD.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, CORS, status mapping)
//!
//! Uses `api-shared` for wire types and `vdd-core` for all behaviour.

#![warn(rust_2018_idioms)]

mod error;

pub use error::ApiError;

use api_shared::wire;
use api_shared::HealthService;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::{header, HeaderName, Method, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use vdd_core::constants::MAX_IMAGE_BYTES;
use vdd_core::{
    AnalysisHistoryRecord, AnalysisRequest, AnalysisResult, BodyPart, Oracle, Orchestrator,
    ProfileStore, StoreResult, UserId,
};
use vdd_types::NonEmptyText;

/// Headers browsers may send on the analyze call.
pub fn allowed_headers() -> [HeaderName; 4] {
    [
        header::AUTHORIZATION,
        HeaderName::from_static("x-client-info"),
        HeaderName::from_static("apikey"),
        header::CONTENT_TYPE,
    ]
}

/// Largest analyze body accepted: a base64 data URI of a maximum-size image plus JSON framing.
pub const ANALYZE_BODY_LIMIT: usize = MAX_IMAGE_BYTES.div_ceil(3) * 4 + 64 * 1024;

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn ProfileStore>,
}

impl AppState {
    pub fn new(oracle: Arc<dyn Oracle>, store: Arc<dyn ProfileStore>) -> Self {
        Self {
            orchestrator: Arc::new(Orchestrator::new(oracle)),
            store,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        analyze_vitamin_deficiency,
        get_profile,
        update_profile,
        get_medical_history,
        upsert_medical_history,
        list_analyses,
        record_analysis,
    ),
    components(schemas(
        wire::HealthRes,
        wire::AnalyzeReq,
        wire::AnalysisRes,
        wire::DeficiencyRes,
        wire::ErrorRes,
        wire::InvalidImageRes,
        wire::ProfileRes,
        wire::UpdateProfileReq,
        wire::MedicalHistoryRes,
        wire::UpsertMedicalHistoryReq,
        wire::AnalysisHistoryRes,
        wire::ListAnalysesRes,
        wire::RecordAnalysisReq,
    ))
)]
pub struct ApiDoc;

/// Build the REST router with CORS and Swagger UI attached.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(allowed_headers());

    Router::new()
        .route("/health", get(health))
        .route(
            "/analyze-vitamin-deficiency",
            post(analyze_vitamin_deficiency).layer(DefaultBodyLimit::max(ANALYZE_BODY_LIMIT)),
        )
        .route("/profiles/:user_id", get(get_profile).put(update_profile))
        .route(
            "/profiles/:user_id/medical-history",
            get(get_medical_history).put(upsert_medical_history),
        )
        .route(
            "/profiles/:user_id/analyses",
            get(list_analyses).post(record_analysis),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = wire::HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<wire::HealthRes> {
    Json(HealthService::check_health())
}

/// Runs a store call on the blocking pool.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("store task failed: {e}")))?
        .map_err(ApiError::from)
}

#[utoipa::path(
    post,
    path = "/analyze-vitamin-deficiency",
    request_body = wire::AnalyzeReq,
    responses(
        (status = 200, description = "Analysis result", body = wire::AnalysisRes),
        (status = 400, description = "Missing parameter or image rejected", body = wire::InvalidImageRes),
        (status = 402, description = "Gateway credits exhausted", body = wire::ErrorRes),
        (status = 413, description = "Request body too large", body = wire::ErrorRes),
        (status = 429, description = "Gateway rate limit", body = wire::ErrorRes),
        (status = 500, description = "Gateway or parse failure", body = wire::ErrorRes)
    )
)]
/// Validate the image against the chosen body part, then classify it.
///
/// # Errors
/// - `400` when a parameter is missing, the body part is unsupported, the body is not JSON, or
///   the image does not show the body part (`{"error":"invalid_image","message":...}`).
/// - `413` when the body exceeds [`ANALYZE_BODY_LIMIT`].
/// - `429` / `402` passed through from the gateway.
/// - `500` for any other gateway, validation or parse failure.
#[axum::debug_handler]
async fn analyze_vitamin_deficiency(
    State(state): State<AppState>,
    payload: Result<Json<wire::AnalyzeReq>, JsonRejection>,
) -> Result<Json<wire::AnalysisRes>, ApiError> {
    let Json(req) = payload?;
    let request = AnalysisRequest::from_raw(req.image.as_deref(), req.body_part.as_deref())?;

    tracing::info!(body_part = %request.body_part(), "analysis requested");
    let result = state.orchestrator.run(&request).await?;
    Ok(Json(wire::AnalysisRes::from(&result)))
}

#[utoipa::path(
    get,
    path = "/profiles/{user_id}",
    params(("user_id" = String, Path, description = "Canonical 32-hex user id")),
    responses(
        (status = 200, description = "User profile", body = wire::ProfileRes),
        (status = 400, description = "Invalid user id", body = wire::ErrorRes),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<wire::ProfileRes>, ApiError> {
    let user = UserId::parse(&user_id)?;
    let store = state.store.clone();
    let profile = run_blocking(move || store.profile(&user)).await?;
    Ok(Json((&profile).into()))
}

#[utoipa::path(
    put,
    path = "/profiles/{user_id}",
    params(("user_id" = String, Path, description = "Canonical 32-hex user id")),
    request_body = wire::UpdateProfileReq,
    responses(
        (status = 200, description = "Profile updated", body = wire::ProfileRes),
        (status = 400, description = "Invalid user id", body = wire::ErrorRes),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn update_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<wire::UpdateProfileReq>,
) -> Result<Json<wire::ProfileRes>, ApiError> {
    let user = UserId::parse(&user_id)?;
    let store = state.store.clone();
    let profile =
        run_blocking(move || store.update_profile(&user, req.full_name, req.phone_number)).await?;
    Ok(Json((&profile).into()))
}

#[utoipa::path(
    get,
    path = "/profiles/{user_id}/medical-history",
    params(("user_id" = String, Path, description = "Canonical 32-hex user id")),
    responses(
        (status = 200, description = "Medical history", body = wire::MedicalHistoryRes),
        (status = 400, description = "Invalid user id", body = wire::ErrorRes),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn get_medical_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<wire::MedicalHistoryRes>, ApiError> {
    let user = UserId::parse(&user_id)?;
    let store = state.store.clone();
    let history = run_blocking(move || store.medical_history(&user)).await?;
    Ok(Json((&history).into()))
}

#[utoipa::path(
    put,
    path = "/profiles/{user_id}/medical-history",
    params(("user_id" = String, Path, description = "Canonical 32-hex user id")),
    request_body = wire::UpsertMedicalHistoryReq,
    responses(
        (status = 200, description = "Medical history saved", body = wire::MedicalHistoryRes),
        (status = 400, description = "Invalid user id", body = wire::ErrorRes),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn upsert_medical_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<wire::UpsertMedicalHistoryReq>,
) -> Result<Json<wire::MedicalHistoryRes>, ApiError> {
    let user = UserId::parse(&user_id)?;
    let store = state.store.clone();
    let history = run_blocking(move || store.upsert_medical_history(&user, req.into())).await?;
    Ok(Json((&history).into()))
}

#[utoipa::path(
    get,
    path = "/profiles/{user_id}/analyses",
    params(("user_id" = String, Path, description = "Canonical 32-hex user id")),
    responses(
        (status = 200, description = "Analyses, newest first", body = wire::ListAnalysesRes),
        (status = 400, description = "Invalid user id", body = wire::ErrorRes),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn list_analyses(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<wire::ListAnalysesRes>, ApiError> {
    let user = UserId::parse(&user_id)?;
    let store = state.store.clone();
    let analyses = run_blocking(move || store.list_analyses(&user))
        .await?
        .iter()
        .map(Into::into)
        .collect();
    Ok(Json(wire::ListAnalysesRes { analyses }))
}

#[utoipa::path(
    post,
    path = "/profiles/{user_id}/analyses",
    params(("user_id" = String, Path, description = "Canonical 32-hex user id")),
    request_body = wire::RecordAnalysisReq,
    responses(
        (status = 201, description = "Analysis recorded", body = wire::AnalysisHistoryRes),
        (status = 400, description = "Invalid user id or body part", body = wire::ErrorRes),
        (status = 500, description = "Internal server error")
    )
)]
/// Record a completed analysis. Only a short prefix of the image is kept.
#[axum::debug_handler]
async fn record_analysis(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<wire::RecordAnalysisReq>,
) -> Result<(StatusCode, Json<wire::AnalysisHistoryRes>), ApiError> {
    let user = UserId::parse(&user_id)?;
    let body_part: BodyPart = req.body_part.parse()?;
    let image = NonEmptyText::new(&req.image)
        .map_err(|_| ApiError::BadRequest("Missing required parameter: image".into()))?;

    let record = AnalysisHistoryRecord::new(
        user,
        body_part,
        &image,
        AnalysisResult::from(req.analysis_result),
    );
    let store = state.store.clone();
    let record = run_blocking(move || store.append_analysis(&record).map(|()| record)).await?;
    Ok((StatusCode::CREATED, Json((&record).into())))
}
