// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,
        handlers::auth::get_me,

        // --- Bookings / Clients ---
        handlers::clients::create_booking,
        handlers::clients::list_clients,
        handlers::clients::get_client,
        handlers::clients::update_client,
        handlers::clients::get_client_sheet,

        // --- Workshop ---
        handlers::workshop::get_board,
        handlers::workshop::update_checklists,

        // --- Emails ---
        handlers::emails::trigger_email,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::User,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- Clients ---
            models::client::CrmStage,
            models::client::Client,
            models::client::ClientPatch,
            models::client::ContactLinks,
            models::client::BoardCard,
            models::client::BoardColumn,
            models::client::KanbanBoard,

            // --- Workflow ---
            models::workflow::Pipeline,
            models::workflow::Substage,
            models::workflow::QuoteDecision,
            services::workflow::StageTransition,
            services::client_service::ChecklistChangeOutcome,
            services::notification_service::NotificationKind,

            // --- Payloads ---
            handlers::clients::CreateBookingPayload,
            handlers::workshop::UpdateChecklistsPayload,
            handlers::emails::TriggerEmailPayload,
            handlers::emails::TriggerEmailResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação dos operadores"),
        (name = "Users", description = "Dados do operador"),
        (name = "Bookings", description = "Captura de leads pelo site público"),
        (name = "Clients", description = "Fichas de clientes"),
        (name = "Workshop", description = "Kanban Atelier / Interventions e checklists"),
        (name = "Emails", description = "Notificações ao cliente (best-effort)")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
