// src/bin/api_server.rs

use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use wildsats_ledger::infra::config::{self, LedgerBackend};
use wildsats_ledger::infra::logging;
use wildsats_ledger::transport;
use wildsats_ledger::{LedgerStore, MemoryLedgerStore, OwnershipLedger, PostgresLedgerStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init();

    // --- Ledger backend ---
    let backend = config::ledger_backend()?;
    let store: Arc<dyn LedgerStore> = match backend {
        LedgerBackend::Postgres => {
            let database_url = config::database_url()?;
            Arc::new(PostgresLedgerStore::connect(&database_url).await?)
        }
        LedgerBackend::Memory => {
            tracing::warn!("using the in-memory ledger; records are lost on exit");
            Arc::new(MemoryLedgerStore::new())
        }
    };
    let timeouts = config::timeouts();
    let ledger = Arc::new(OwnershipLedger::new(
        store,
        config::default_character(),
        timeouts.ledger,
    ));
    tracing::info!(?backend, "ledger initialized");

    // --- API Server ---
    let app_state = transport::http::AppState { ledger };
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = transport::http::create_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let bind_addr = config::bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("API server listening on http://{}", bind_addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    tracing::info!("graceful shutdown complete");
    Ok(())
}
