//src/main.rs

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post},
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
mod wecom;

use crate::config::AppState;
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new().await?;

    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Rotas públicas
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    // O WeCom chama sem sessão; a autenticidade vem da assinatura
    let callback_routes = Router::new().route(
        "/callback",
        get(handlers::wecom::callback).post(handlers::wecom::callback),
    );

    // Rotas protegidas pelo middleware
    let user_routes = Router::new().route("/me", get(handlers::auth::get_me));

    let lead_routes = Router::new()
        .route("/", post(handlers::leads::create_lead))
        .route("/get_lead", post(handlers::leads::get_lead))
        .route("/give_up_lead", post(handlers::leads::give_up_lead))
        .route(
            "/{id}",
            get(handlers::leads::get_lead_details).put(handlers::leads::update_lead),
        )
        .route("/{id}/notes", post(handlers::leads::add_note))
        .route("/{id}/contact", post(handlers::leads::create_contact));

    let protected = Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/leads", lead_routes)
        .route("/api/employees", post(handlers::auth::create_employee))
        .route(
            "/api/wecom/messages/{id}/create-lead",
            post(handlers::wecom::create_lead_from_message),
        )
        .route(
            "/api/original-leads",
            post(handlers::wecom::import_original_lead),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let bind_addr = app_state.bind_addr.clone();

    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .nest("/api/wecom", callback_routes)
        .merge(protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state);

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
