// src/handlers/workshop.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::i18n::Locale,
    models::{
        client::KanbanBoard,
        workflow::{Checklists, Pipeline},
    },
    services::client_service::ChecklistChangeOutcome,
};

// GET /api/workshop/{pipeline}/board
#[utoipa::path(
    get,
    path = "/api/workshop/{pipeline}/board",
    tag = "Workshop",
    responses(
        (status = 200, description = "Quadro kanban do pipeline", body = KanbanBoard)
    ),
    params(("pipeline" = Pipeline, Path, description = "atelier ou intervention")),
    security(("api_jwt" = []))
)]
pub async fn get_board(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(pipeline): Path<Pipeline>,
) -> Result<impl IntoResponse, ApiError> {
    let board = app_state.client_service
        .workshop_board(&app_state.db_pool, pipeline)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(board)))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateChecklistsPayload {
    #[schema(value_type = Object, example = json!({"diagnostic": {"items": [{"id": "d4", "checked": true}]}}))]
    pub checklists: Checklists,
}

// PUT /api/workshop/{pipeline}/clients/{id}/checklists
#[utoipa::path(
    put,
    path = "/api/workshop/{pipeline}/clients/{id}/checklists",
    tag = "Workshop",
    request_body = UpdateChecklistsPayload,
    responses(
        (status = 200, description = "Checklists salvos (e transição, se houve)", body = ChecklistChangeOutcome),
        (status = 404, description = "Cliente não encontrado")
    ),
    params(
        ("pipeline" = Pipeline, Path, description = "atelier ou intervention"),
        ("id" = Uuid, Path, description = "ID do cliente")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_checklists(
    State(app_state): State<AppState>,
    locale: Locale,
    Path((pipeline, id)): Path<(Pipeline, Uuid)>,
    Json(payload): Json<UpdateChecklistsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = app_state.client_service
        .on_checklist_change(&app_state.db_pool, pipeline, id, payload.checklists)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(outcome)))
}
