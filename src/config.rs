// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{ClientRepository, UserRepository},
    services::{
        auth::AuthService,
        client_service::ClientService,
        document_service::DocumentService,
        notification_service::{HttpMailer, LogMailer, Mailer, NotificationService},
    },
};

/// Configuração lida do ambiente (.env incluso).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub email: Option<EmailConfig>,
    pub company_name: String,
    pub public_site_url: Option<String>,
    pub fonts_dir: String,
    pub admin: Option<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Variáveis vazias contam como ausentes
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = get("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        let database_max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS inválido: {}", raw))?,
            None => 5,
        };

        let email = match (get("EMAIL_API_URL"), get("EMAIL_API_KEY")) {
            (Some(api_url), Some(api_key)) => Some(EmailConfig {
                api_url,
                api_key,
                from: get("EMAIL_FROM").context("EMAIL_FROM é obrigatório quando EMAIL_API_URL está definida")?,
            }),
            (None, None) => None,
            _ => anyhow::bail!("EMAIL_API_URL e EMAIL_API_KEY devem ser definidas juntas"),
        };

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some((email, password)),
            _ => None,
        };

        Ok(Self {
            database_url,
            database_max_connections,
            jwt_secret,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            email,
            company_name: get("COMPANY_NAME").unwrap_or_else(|| "Atelier".to_string()),
            public_site_url: get("PUBLIC_SITE_URL").map(|u| u.trim_end_matches('/').to_string()),
            fonts_dir: get("FONTS_DIR").unwrap_or_else(|| "./fonts".to_string()),
            admin,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub auth_service: AuthService,
    pub client_service: ClientService,
    pub notification_service: NotificationService,
    pub document_service: DocumentService,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        let mailer: Arc<dyn Mailer> = match &config.email {
            Some(email) => Arc::new(
                HttpMailer::new(email.api_url.clone(), email.api_key.clone(), email.from.clone())
                    .context("Falha ao criar o cliente HTTP de e-mail")?,
            ),
            None => {
                tracing::warn!("EMAIL_API_URL não definida: e-mails serão apenas registrados no log");
                Arc::new(LogMailer)
            }
        };

        // --- Monta o gráfico de dependências ---
        let user_repo = UserRepository::new(db_pool.clone());
        let client_repo = ClientRepository::new(db_pool.clone());

        let auth_service = AuthService::new(user_repo, config.jwt_secret.clone());
        let notification_service =
            NotificationService::new(client_repo.clone(), mailer, config.company_name.clone());
        let client_service = ClientService::new(client_repo.clone(), notification_service.clone());
        let document_service = DocumentService::new(
            client_repo,
            config.company_name.clone(),
            config.public_site_url.clone(),
            config.fonts_dir.clone(),
        );

        Ok(Self {
            db_pool,
            auth_service,
            client_service,
            notification_service,
            document_service,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/atelier"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.company_name, "Atelier");
        assert!(config.email.is_none());
        assert!(config.admin.is_none());
    }

    #[test]
    fn missing_database_url_fails() {
        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "secret")])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn email_settings_must_come_together() {
        let result = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/atelier"),
            ("JWT_SECRET", "secret"),
            ("EMAIL_API_URL", "https://mail.example.com/emails"),
        ]));
        assert!(result.is_err());

        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/atelier"),
            ("JWT_SECRET", "secret"),
            ("EMAIL_API_URL", "https://mail.example.com/emails"),
            ("EMAIL_API_KEY", "key"),
            ("EMAIL_FROM", "atelier@example.com"),
            ("PUBLIC_SITE_URL", "https://example.com/"),
        ]))
        .unwrap();
        assert_eq!(config.email.unwrap().from, "atelier@example.com");
        assert_eq!(config.public_site_url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/atelier"),
            ("JWT_SECRET", "secret"),
            ("BIND_ADDR", "   "),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
    }
}
