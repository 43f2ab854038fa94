//src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppState, Config};
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

fn build_router(app_state: AppState) -> Router {
    // Rotas públicas
    let auth_routes = Router::new()
        .route("/login", post(handlers::auth::login));

    let booking_routes = Router::new()
        .route("/", post(handlers::clients::create_booking));

    // Rotas do painel (protegidas pelo middleware)
    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me));

    let client_routes = Router::new()
        .route("/", get(handlers::clients::list_clients))
        .route("/{id}"
               ,get(handlers::clients::get_client)
               .patch(handlers::clients::update_client)
        )
        .route("/{id}/sheet.pdf", get(handlers::clients::get_client_sheet));

    let workshop_routes = Router::new()
        .route("/{pipeline}/board", get(handlers::workshop::get_board))
        .route("/{pipeline}/clients/{id}/checklists", put(handlers::workshop::update_checklists));

    let admin_routes = Router::new()
        .route("/emails/{kind}", post(handlers::emails::trigger_email));

    let protected = Router::new()
        .nest("/users", user_routes)
        .nest("/clients", client_routes)
        .nest("/workshop", workshop_routes)
        .nest("/admin", admin_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Combina tudo no router principal
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .nest("/api/bookings", booking_routes)
        .nest("/api", protected)
        .with_state(app_state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controla o nível; padrão "info"
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;
    let app_state = AppState::new(&config).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await?;

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    if let Some((email, password)) = &config.admin {
        app_state.auth_service
            .ensure_admin(email, password)
            .await
            .map_err(|e| anyhow::anyhow!("Falha ao criar o operador inicial: {}", e))?;
    }

    let app = build_router(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(config.bind_addr.as_str()).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
