use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use villaclean::config::AppConfig;
use villaclean::db;
use villaclean::handlers;
use villaclean::services::ai::groq::GroqProvider;
use villaclean::services::ai::ollama::OllamaProvider;
use villaclean::services::ai::LlmProvider;
use villaclean::services::cache::AvailabilityCache;
use villaclean::services::calendar::google::GoogleCalendarProvider;
use villaclean::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let llm: Box<dyn LlmProvider> = match config.llm_provider.as_str() {
        "groq" => {
            anyhow::ensure!(
                !config.groq_api_key.is_empty(),
                "GROQ_API_KEY must be set when LLM_PROVIDER=groq"
            );
            tracing::info!("using Groq LLM provider (model: {})", config.groq_model);
            Box::new(GroqProvider::new(
                config.groq_api_key.clone(),
                config.groq_model.clone(),
            ))
        }
        _ => {
            tracing::info!("using Ollama LLM provider (url: {})", config.ollama_url);
            Box::new(OllamaProvider::new(
                config.ollama_url.clone(),
                "llama3.2".to_string(),
            ))
        }
    };

    let calendar = GoogleCalendarProvider::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
    );

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        llm,
        calendar: Box::new(calendar),
        availability_cache: AvailabilityCache::new(Duration::from_secs(60)),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/availability",
            get(handlers::availability::check_availability),
        )
        .route(
            "/api/availability/next",
            get(handlers::availability::next_available),
        )
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/transition",
            post(handlers::bookings::transition_booking),
        )
        .route(
            "/api/cleaners/:id/sync",
            post(handlers::cleaners::sync_calendar),
        )
        .route(
            "/api/cleaners/:id/blocks",
            post(handlers::cleaners::create_block),
        )
        .route(
            "/api/cleaners/:id/blocks/:block_id",
            delete(handlers::cleaners::delete_block),
        )
        .route("/api/agent/message", post(handlers::agent::agent_message))
        .route("/api/admin/bookings", get(handlers::admin::list_bookings))
        .route("/api/admin/cleaners", get(handlers::admin::list_cleaners))
        .route("/api/admin/status", get(handlers::admin::status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
