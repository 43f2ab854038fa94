// src/handlers/emails.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::AppState,
    middleware::i18n::Locale,
    services::notification_service::NotificationKind,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEmailPayload {
    pub client_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TriggerEmailResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// POST /api/admin/emails/{kind}
#[utoipa::path(
    post,
    path = "/api/admin/emails/{kind}",
    tag = "Emails",
    request_body = TriggerEmailPayload,
    responses(
        (status = 200, description = "E-mail enviado", body = TriggerEmailResponse),
        (status = 404, description = "Cliente não encontrado", body = TriggerEmailResponse),
        (status = 502, description = "Falha no provedor de e-mail", body = TriggerEmailResponse)
    ),
    params(("kind" = NotificationKind, Path, description = "diagnostic-complete, repair-complete ou vehicle-ready")),
    security(("api_jwt" = []))
)]
pub async fn trigger_email(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(kind): Path<NotificationKind>,
    Json(payload): Json<TriggerEmailPayload>,
) -> impl IntoResponse {
    match app_state.notification_service.send(kind, payload.client_id).await {
        Ok(()) => (StatusCode::OK, Json(TriggerEmailResponse { ok: true, error: None })),
        Err(e) => {
            tracing::warn!(client_id = %payload.client_id, kind = kind.slug(), error = %e, "Envio manual de e-mail falhou");
            let api = e.to_api_error(&locale);
            (api.status, Json(TriggerEmailResponse { ok: false, error: Some(api.error) }))
        }
    }
}
