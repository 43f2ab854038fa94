// src/handlers/clients.rs

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::client::{Client, ClientPatch, NewClient},
};

// =============================================================================
//  ÁREA 1: FORMULÁRIO PÚBLICO (LEADS)
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingPayload {
    #[validate(length(min = 2, max = 120, message = "required"))]
    #[schema(example = "Jeanne Martin")]
    pub full_name: String,

    #[validate(email(message = "invalid_email"))]
    #[schema(example = "jeanne@example.com")]
    pub email: Option<String>,

    #[validate(length(min = 6, max = 30, message = "invalid_phone"))]
    #[schema(example = "06 12 34 56 78")]
    pub phone: Option<String>,

    #[validate(length(max = 300, message = "too_long"))]
    pub address: Option<String>,

    #[schema(example = "collecte")]
    pub service_type: Option<String>,

    #[validate(length(max = 2000, message = "too_long"))]
    pub notes: Option<String>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CreateBookingPayload {
    /// Formulários mandam "" para campos não preenchidos.
    fn normalized(self) -> Self {
        Self {
            full_name: self.full_name.trim().to_string(),
            email: blank_to_none(self.email),
            phone: blank_to_none(self.phone),
            address: blank_to_none(self.address),
            service_type: blank_to_none(self.service_type),
            notes: blank_to_none(self.notes),
        }
    }

    // Precisamos de pelo menos um meio de contato
    fn has_contact(&self) -> bool {
        self.email.is_some() || self.phone.is_some()
    }

    fn check(&self) -> Result<(), validator::ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => validator::ValidationErrors::new(),
            Err(errors) => errors,
        };
        if !self.has_contact() {
            errors.add("phone", validator::ValidationError::new("contact_required"));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

// POST /api/bookings
#[utoipa::path(
    post,
    path = "/api/bookings",
    tag = "Bookings",
    request_body = CreateBookingPayload,
    responses(
        (status = 201, description = "Lead registrado", body = Client),
        (status = 400, description = "Dados inválidos")
    )
)]
pub async fn create_booking(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<CreateBookingPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.normalized();
    payload
        .check()
        .map_err(|errors| AppError::ValidationError(errors).to_api_error(&locale))?;

    let new = NewClient {
        full_name: payload.full_name,
        email: payload.email,
        phone: payload.phone,
        address: payload.address,
        service_type: payload.service_type,
        notes: payload.notes,
    };

    let client = app_state.client_service
        .create_booking(&app_state.db_pool, new)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(client)))
}

// =============================================================================
//  ÁREA 2: CLIENTES (ADMIN)
// =============================================================================

// GET /api/clients
#[utoipa::path(
    get,
    path = "/api/clients",
    tag = "Clients",
    responses(
        (status = 200, description = "Lista de clientes", body = Vec<Client>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_clients(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let clients = app_state.client_service
        .list_clients(&app_state.db_pool)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(clients)))
}

// GET /api/clients/{id}
#[utoipa::path(
    get,
    path = "/api/clients/{id}",
    tag = "Clients",
    responses(
        (status = 200, description = "Cliente", body = Client),
        (status = 404, description = "Cliente não encontrado")
    ),
    params(("id" = Uuid, Path, description = "ID do cliente")),
    security(("api_jwt" = []))
)]
pub async fn get_client(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let client = app_state.client_service
        .get_client(&app_state.db_pool, id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(client)))
}

// PATCH /api/clients/{id}
#[utoipa::path(
    patch,
    path = "/api/clients/{id}",
    tag = "Clients",
    request_body = ClientPatch,
    responses(
        (status = 200, description = "Cliente atualizado", body = Client),
        (status = 400, description = "Patch vazio"),
        (status = 404, description = "Cliente não encontrado")
    ),
    params(("id" = Uuid, Path, description = "ID do cliente")),
    security(("api_jwt" = []))
)]
pub async fn update_client(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
    Json(patch): Json<ClientPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let client = app_state.client_service
        .update_client(&app_state.db_pool, id, &patch)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(client)))
}

// GET /api/clients/{id}/sheet.pdf
#[utoipa::path(
    get,
    path = "/api/clients/{id}/sheet.pdf",
    tag = "Clients",
    responses(
        (status = 200, description = "Ficha atelier em PDF", body = Vec<u8>, content_type = "application/pdf"),
        (status = 404, description = "Cliente não encontrado")
    ),
    params(("id" = Uuid, Path, description = "ID do cliente")),
    security(("api_jwt" = []))
)]
pub async fn get_client_sheet(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let pdf = app_state.document_service
        .generate_sheet_pdf(&app_state.db_pool, id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    let disposition = format!("inline; filename=\"fiche-{}.pdf\"", id);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    ))
}
