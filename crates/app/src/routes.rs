use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use compagnon_core::model::{
    ModuleId, PresentationMode, Session, SessionCode, SessionPosition, SubmoduleId, Theme,
    ThemeDraft,
};
use serde::{Deserialize, Serialize};
use services::{AdvanceOutcome, ModuleOutline, NavigateRequest};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub connections: usize,
    pub uptime_secs: u64,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        connections: state.peers.count().await,
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub module_ids: Vec<ModuleId>,
    #[serde(default)]
    pub mode: PresentationMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub code: SessionCode,
    pub module_ids: Vec<ModuleId>,
    pub mode: PresentationMode,
    pub theme_override: Option<String>,
    pub position: Option<SessionPosition>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub active: bool,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            code: session.code().clone(),
            module_ids: session.module_ids().to_vec(),
            mode: session.mode(),
            theme_override: session.theme_override().map(str::to_string),
            position: session.position(),
            started_at: session.started_at(),
            ended_at: session.ended_at(),
            active: session.is_active(),
        }
    }
}

/// POST /api/sessions
pub async fn start_session(
    State(state): State<AppState>,
    Json(body): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let session = state
        .services
        .sessions()
        .start(body.module_ids, body.mode)
        .await?;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(&session))))
}

/// GET /api/sessions/{code}
pub async fn get_session(
    State(state): State<AppState>,
    Path(code): Path<SessionCode>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.services.sessions().get(&code).await?;
    Ok(Json(SessionResponse::from(&session)))
}

/// POST /api/sessions/{code}/end
pub async fn end_session(
    State(state): State<AppState>,
    Path(code): Path<SessionCode>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.services.sessions().end(&code).await?;
    Ok(Json(SessionResponse::from(&session)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModeRequest {
    pub mode: PresentationMode,
}

/// PUT /api/sessions/{code}/mode
pub async fn set_mode(
    State(state): State<AppState>,
    Path(code): Path<SessionCode>,
    Json(body): Json<ModeRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.services.sessions().set_mode(&code, body.mode).await?;
    Ok(Json(SessionResponse::from(&session)))
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ThemeOverrideRequest {
    #[serde(default)]
    pub theme: Option<String>,
}

/// PUT /api/sessions/{code}/theme
pub async fn set_theme_override(
    State(state): State<AppState>,
    Path(code): Path<SessionCode>,
    Json(body): Json<ThemeOverrideRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .services
        .sessions()
        .set_theme_override(&code, body.theme)
        .await?;
    Ok(Json(SessionResponse::from(&session)))
}

/// GET /api/sessions/{code}/theme
pub async fn session_theme(
    State(state): State<AppState>,
    Path(code): Path<SessionCode>,
) -> Result<Json<Theme>, ApiError> {
    let session = state.services.sessions().get(&code).await?;
    Ok(Json(state.services.theme().for_session(&session).await))
}

/// GET /api/sessions/{code}/modules/{module_id}/outline
pub async fn module_outline(
    State(state): State<AppState>,
    Path((code, module_id)): Path<(SessionCode, ModuleId)>,
) -> Result<Json<ModuleOutline>, ApiError> {
    let outline = state.services.sessions().outline(&code, module_id).await?;
    Ok(Json(outline))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowedIndexResponse {
    pub module_id: ModuleId,
    pub allowed_index: u32,
}

/// GET /api/sessions/{code}/modules/{module_id}/allowed-index
pub async fn allowed_index(
    State(state): State<AppState>,
    Path((code, module_id)): Path<(SessionCode, ModuleId)>,
) -> Result<Json<AllowedIndexResponse>, ApiError> {
    let allowed_index = state.services.gate().allowed_index(&code, module_id).await?;
    Ok(Json(AllowedIndexResponse {
        module_id,
        allowed_index,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceRequest {
    pub new_index: u32,
}

/// POST /api/sessions/{code}/modules/{module_id}/advance
pub async fn advance(
    State(state): State<AppState>,
    Path((code, module_id)): Path<(SessionCode, ModuleId)>,
    Json(body): Json<AdvanceRequest>,
) -> Result<Json<AdvanceOutcome>, ApiError> {
    let outcome = state
        .services
        .gate()
        .advance(&code, module_id, body.new_index)
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceSyncRequest {
    pub target_index: u32,
}

/// POST /api/sessions/{code}/modules/{module_id}/force-sync
pub async fn force_sync(
    State(state): State<AppState>,
    Path((code, module_id)): Path<(SessionCode, ModuleId)>,
    Json(body): Json<ForceSyncRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .services
        .gate()
        .force_sync(&code, module_id, body.target_index)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateBody {
    pub submodule_index: u32,
    #[serde(default)]
    pub submodule_id: Option<SubmoduleId>,
    #[serde(default)]
    pub module_id: Option<ModuleId>,
}

/// POST /api/sessions/{code}/navigate
pub async fn navigate(
    State(state): State<AppState>,
    Path(code): Path<SessionCode>,
    Json(body): Json<NavigateBody>,
) -> Result<StatusCode, ApiError> {
    let request = NavigateRequest {
        module_id: body.module_id,
        submodule_index: body.submodule_index,
        submodule_id: body.submodule_id,
    };
    state.services.gate().navigate(&code, request).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/theme
pub async fn get_theme(State(state): State<AppState>) -> Json<Theme> {
    Json(state.services.theme().current().await)
}

/// PUT /api/theme
pub async fn put_theme(
    State(state): State<AppState>,
    Json(draft): Json<ThemeDraft>,
) -> Result<Json<Theme>, ApiError> {
    let theme = state.services.theme().update(draft).await?;
    Ok(Json(theme))
}
