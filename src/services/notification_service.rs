// src/services/notification_service.rs

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{common::error::AppError, db::ClientRepository, models::client::Client};

// --- TIPOS ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    DiagnosticComplete,
    RepairComplete,
    VehicleReady,
}

impl NotificationKind {
    pub fn slug(self) -> &'static str {
        match self {
            NotificationKind::DiagnosticComplete => "diagnostic-complete",
            NotificationKind::RepairComplete => "repair-complete",
            NotificationKind::VehicleReady => "vehicle-ready",
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum MailError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

// =========================================================================
//  MAILERS
// =========================================================================

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Envia via API HTTP de e-mail transacional (`{from, to, subject, html}`).
pub struct HttpMailer {
    http: HttpClient,
    endpoint: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

impl HttpMailer {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(endpoint: String, api_key: String, from: String) -> Result<Self, MailError> {
        let http = HttpClient::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("atelier-backend/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(Self { http, endpoint, api_key, from })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let body = OutgoingEmail {
            from: &self.from,
            to: [message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
        };

        let res = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = res.status();
        if status.is_success() {
            return Ok(());
        }

        let body = res.text().await.unwrap_or_default();
        Err(MailError::Http { status: status.as_u16(), body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> MailError {
    if e.is_timeout() {
        MailError::Timeout
    } else {
        MailError::Transport(e.to_string())
    }
}

/// Usado quando nenhuma API de e-mail está configurada.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        tracing::info!(to = %message.to, subject = %message.subject, "📧 E-mail (modo log, não enviado)");
        Ok(())
    }
}

// =========================================================================
//  CONTEÚDO
// =========================================================================

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn compose(kind: NotificationKind, client: &Client, company_name: &str) -> Result<EmailMessage, AppError> {
    let to = client
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or(AppError::NoRecipient(client.id))?;

    let tracking = client.tracking_label();
    let (subject, body) = match kind {
        NotificationKind::DiagnosticComplete => (
            format!("Diagnostic terminé - dossier {}", tracking),
            "Le diagnostic de votre équipement est terminé. Nous revenons vers vous très vite avec un devis.",
        ),
        NotificationKind::RepairComplete => (
            format!("Réparation terminée - dossier {}", tracking),
            "Les travaux sont terminés. Votre équipement passe maintenant au contrôle final.",
        ),
        NotificationKind::VehicleReady => (
            format!("Votre véhicule est prêt - dossier {}", tracking),
            "Le contrôle final est validé : votre véhicule est prêt. Contactez-nous pour organiser la restitution.",
        ),
    };

    let html = format!(
        "<p>Bonjour {},</p><p>{}</p><p>{}</p>",
        escape_html(&client.full_name),
        body,
        escape_html(company_name)
    );

    Ok(EmailMessage { to: to.to_string(), subject, html })
}

// =========================================================================
//  SERVIÇO
// =========================================================================

#[derive(Clone)]
pub struct NotificationService {
    repo: ClientRepository,
    mailer: Arc<dyn Mailer>,
    company_name: String,
}

impl NotificationService {
    pub fn new(repo: ClientRepository, mailer: Arc<dyn Mailer>, company_name: String) -> Self {
        Self { repo, mailer, company_name }
    }

    /// Uma única tentativa, sem retry.
    pub async fn send(&self, kind: NotificationKind, client_id: Uuid) -> Result<(), AppError> {
        let client = self
            .repo
            .find_by_id(self.repo.pool(), client_id)
            .await?
            .ok_or(AppError::ClientNotFound(client_id))?;

        let message = compose(kind, &client, &self.company_name)?;
        self.mailer.send(&message).await?;

        tracing::info!(%client_id, kind = kind.slug(), "📧 Notificação enviada");
        Ok(())
    }

    /// Dispara o envio numa task destacada; o chamador não espera o resultado.
    pub fn dispatch(&self, kind: NotificationKind, client_id: Uuid) -> JoinHandle<()> {
        let service = self.clone();
        spawn_best_effort(kind, client_id, async move { service.send(kind, client_id).await })
    }
}

/// Quem reage a uma transição de etapa. O chamador nunca espera o envio.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NotificationKind, client_id: Uuid);
}

impl Notifier for NotificationService {
    fn notify(&self, kind: NotificationKind, client_id: Uuid) {
        self.dispatch(kind, client_id);
    }
}

/// Erros só vão para o log: nunca voltam para quem disparou.
pub fn spawn_best_effort<F>(kind: NotificationKind, client_id: Uuid, send: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), AppError>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = send.await {
            tracing::warn!(%client_id, kind = kind.slug(), error = %e, "Falha ao enviar notificação (ignorada)");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::client::{fixtures::client, CrmStage};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn kind_slugs_match_route_segments() {
        for kind in [
            NotificationKind::DiagnosticComplete,
            NotificationKind::RepairComplete,
            NotificationKind::VehicleReady,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.slug()));
        }
    }

    #[test]
    fn compose_escapes_name_and_uses_tracking_label() {
        let mut c = client(CrmStage::Atelier, json!({}), json!({}));
        c.full_name = "Tom & <Jerry>".to_string();

        let message = compose(NotificationKind::VehicleReady, &c, "Atelier Mobilité").unwrap();
        assert_eq!(message.to, "jeanne@example.com");
        assert!(message.subject.ends_with("#0007"));
        assert!(message.html.contains("Tom &amp; &lt;Jerry&gt;"));
    }

    #[test]
    fn compose_without_email_fails() {
        let mut c = client(CrmStage::Atelier, json!({}), json!({}));
        c.email = Some("  ".to_string());
        let err = compose(NotificationKind::DiagnosticComplete, &c, "Atelier").unwrap_err();
        assert!(matches!(err, AppError::NoRecipient(id) if id == c.id));
    }

    #[tokio::test]
    async fn failing_send_is_swallowed() {
        let handle = spawn_best_effort(NotificationKind::RepairComplete, Uuid::new_v4(), async {
            Err(AppError::Mail(MailError::Timeout))
        });
        // A task termina normalmente, sem panic e sem propagar o erro
        assert!(handle.await.is_ok());
    }

    struct CountingMailer(AtomicUsize);

    #[async_trait]
    impl Mailer for CountingMailer {
        async fn send(&self, _message: &EmailMessage) -> Result<(), MailError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(MailError::Http { status: 503, body: "down".to_string() })
        }
    }

    #[tokio::test]
    async fn mailer_is_attempted_exactly_once() {
        let mailer = Arc::new(CountingMailer(AtomicUsize::new(0)));
        let c = client(CrmStage::Atelier, json!({}), json!({}));
        let message = compose(NotificationKind::DiagnosticComplete, &c, "Atelier").unwrap();

        let m = mailer.clone();
        let handle = spawn_best_effort(NotificationKind::DiagnosticComplete, c.id, async move {
            m.send(&message).await.map_err(AppError::from)
        });

        assert!(handle.await.is_ok());
        assert_eq!(mailer.0.load(Ordering::SeqCst), 1);
    }
}
