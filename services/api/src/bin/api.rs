//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{db::PgDocumentStore, identity::JwtIdentityAdapter},
    config::Config,
    error::ApiError,
    triggers::spawn_trigger_loop,
    web::{
        create_document_handler, delete_document_handler, get_document_handler,
        middleware::resolve_caller, reserve_category_name_handler, rest::ApiDoc, state::AppState,
        update_document_handler,
    },
};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use threadboard_core::{CounterEngine, DocumentGateway};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgDocumentStore::new(db_pool));
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Start the Counter Engine's Trigger Loop ---
    let shutdown = CancellationToken::new();
    let engine = Arc::new(CounterEngine::new(store.clone()));
    let (triggers, trigger_loop) = spawn_trigger_loop(engine, shutdown.clone());

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        gateway: DocumentGateway::new(store),
        identity: Arc::new(JwtIdentityAdapter::new(&config.jwt_secret)),
        triggers,
    });

    // --- 5. Create the Web Router ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    let api_router = Router::new()
        .route(
            "/documents/{*path}",
            get(get_document_handler)
                .post(create_document_handler)
                .patch(update_document_handler)
                .delete(delete_document_handler),
        )
        .route(
            "/category-names/{category_name}",
            post(reserve_category_name_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            resolve_caller,
        ))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // --- 7. Drain the Trigger Loop ---
    shutdown.cancel();
    if let Err(e) = trigger_loop.await {
        warn!("Trigger loop ended abnormally: {}", e);
    }
    info!("Server stopped.");
    Ok(())
}

/// Resolves on Ctrl-C, or when something else has already requested shutdown.
async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for the shutdown signal: {}", e);
            }
            info!("Shutdown signal received.");
        }
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
