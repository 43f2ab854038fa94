// src/common/error.rs

use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::{middleware::i18n::Locale, services::notification_service::MailError};

// Erro de domínio, usado por repositórios e serviços.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Cliente {0} não encontrado")]
    ClientNotFound(Uuid),

    #[error("Cliente {0} sem e-mail cadastrado")]
    NoRecipient(Uuid),

    #[error("Patch vazio")]
    EmptyPatch,

    #[error("Falha no envio de e-mail: {0}")]
    Mail(#[from] MailError),

    #[error("Fonte não encontrada: {0}")]
    FontNotFound(String),

    #[error("Erro ao gerar documento: {0}")]
    Document(String),

    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

/// Corpo de erro que vai para o cliente HTTP.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "error": self.error, "code": self.code });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "validation_failed"),
            AppError::EmptyPatch => (StatusCode::BAD_REQUEST, "empty_patch"),
            AppError::EmailAlreadyExists => (StatusCode::CONFLICT, "email_already_exists"),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AppError::ClientNotFound(_) => (StatusCode::NOT_FOUND, "client_not_found"),
            AppError::NoRecipient(_) => (StatusCode::UNPROCESSABLE_ENTITY, "no_recipient"),
            AppError::Mail(_) => (StatusCode::BAD_GATEWAY, "mail_failed"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    /// Converte para o formato da API, traduzindo a mensagem para o idioma do pedido.
    pub fn to_api_error(self, locale: &Locale) -> ApiError {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            // O detalhe fica só no log
            tracing::error!("Erro Interno do Servidor: {}", self);
        }

        let details = match &self {
            AppError::ValidationError(errors) => {
                let mut fields: HashMap<String, Vec<String>> = HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let codes = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    fields.insert(field.to_string(), codes);
                }
                Some(json!(fields))
            }
            _ => None,
        };

        ApiError {
            status,
            code,
            error: message(code, &locale.0).to_string(),
            details,
        }
    }
}

// Middlewares não têm o Locale à mão: usam o idioma padrão.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default()).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        err.to_api_error(&Locale::default())
    }
}

fn message(code: &str, lang: &str) -> &'static str {
    let english = lang == "en";
    match (code, english) {
        ("validation_failed", false) => "Un ou plusieurs champs sont invalides.",
        ("validation_failed", true) => "One or more fields are invalid.",
        ("empty_patch", false) => "Aucune modification à enregistrer.",
        ("empty_patch", true) => "Nothing to update.",
        ("email_already_exists", false) => "Cet e-mail est déjà utilisé.",
        ("email_already_exists", true) => "This e-mail is already in use.",
        ("invalid_credentials", false) => "E-mail ou mot de passe invalide.",
        ("invalid_credentials", true) => "Invalid e-mail or password.",
        ("invalid_token", false) => "Jeton d'authentification invalide ou absent.",
        ("invalid_token", true) => "Missing or invalid authentication token.",
        ("client_not_found", false) => "Client introuvable.",
        ("client_not_found", true) => "Client not found.",
        ("no_recipient", false) => "Ce client n'a pas d'adresse e-mail.",
        ("no_recipient", true) => "This client has no e-mail address.",
        ("mail_failed", false) => "L'envoi de l'e-mail a échoué.",
        ("mail_failed", true) => "Sending the e-mail failed.",
        (_, false) => "Une erreur inattendue est survenue.",
        (_, true) => "An unexpected error occurred.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 1, message = "required"))]
        name: String,
    }

    #[test]
    fn not_found_is_localized() {
        let fr = AppError::ClientNotFound(Uuid::nil()).to_api_error(&Locale("fr".to_string()));
        assert_eq!(fr.status, StatusCode::NOT_FOUND);
        assert_eq!(fr.error, "Client introuvable.");

        let en = AppError::ClientNotFound(Uuid::nil()).to_api_error(&Locale("en".to_string()));
        assert_eq!(en.error, "Client not found.");
        assert_eq!(en.code, "client_not_found");
    }

    #[test]
    fn unknown_language_falls_back_to_french() {
        let err = AppError::InvalidToken.to_api_error(&Locale("de".to_string()));
        assert_eq!(err.error, "Jeton d'authentification invalide ou absent.");
    }

    #[test]
    fn validation_errors_carry_field_codes() {
        let errors = Probe { name: String::new() }.validate().unwrap_err();
        let api = AppError::from(errors).to_api_error(&Locale::default());

        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.details, Some(json!({"name": ["required"]})));
    }

    #[test]
    fn internal_errors_hide_details() {
        let api = AppError::Document("boom".to_string()).to_api_error(&Locale("en".to_string()));
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.error.contains("boom"));
    }
}
