//! WorldChat Server
//!
//! Self-hosted API server for agents, world groups and autonomous
//! conversation generation, with a WebSocket feed per world group.
//! This is a library crate; the binary calls `start_server()`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{extract::State, http::Method, middleware, routing::get, Json, Router};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use worldchat_core::ai::{AiClient, AiClientConfig, ProviderId};
use worldchat_core::generation::{
    ConversationGenerator, ConversationSink, LlmGenerator, SchedulerDeps, SqliteDirectory,
    SqliteSink,
};
use worldchat_core::paths;
use worldchat_core::storage::{CredentialStore, Database};
use worldchat_core::{ConversationHub, GenerationPolicy, SchedulerRegistry};

pub mod auth;
pub mod error;
pub mod routes;
pub mod types;
pub mod ws;

/// Configuration for starting the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on (default: 3000).
    pub port: u16,
    /// SQLite database location.
    pub db_path: PathBuf,
    pub provider: ProviderId,
    /// Model override; the provider default otherwise.
    pub model: Option<String>,
    pub policy: GenerationPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            db_path: paths::default_db_path(),
            provider: ProviderId::default(),
            model: None,
            policy: GenerationPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `PORT`, `WORLDCHAT_DB`, `WORLDCHAT_PROVIDER`,
    /// `WORLDCHAT_MODEL` and the generation policy variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            policy: GenerationPolicy::from_env(),
            ..Self::default()
        };

        if let Ok(port) = std::env::var("PORT") {
            match port.parse() {
                Ok(port) => config.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PORT '{}'", port),
            }
        }
        if let Ok(db) = std::env::var("WORLDCHAT_DB") {
            if !db.trim().is_empty() {
                config.db_path = PathBuf::from(db);
            }
        }
        if let Ok(raw) = std::env::var("WORLDCHAT_PROVIDER") {
            match ProviderId::parse(&raw) {
                Some(provider) => config.provider = provider,
                None => tracing::warn!("Unknown WORLDCHAT_PROVIDER '{}', using {}", raw, config.provider),
            }
        }
        config.model = std::env::var("WORLDCHAT_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty());

        config
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// SQLite database path (opened per request).
    pub db_path: Arc<PathBuf>,
    /// Provider-backed generator (fails with a configuration error without credentials).
    pub generator: Arc<dyn ConversationGenerator>,
    /// Line writer that also publishes to the realtime hub.
    pub sink: Arc<dyn ConversationSink>,
    pub hub: ConversationHub,
    /// One generation scheduler per world group.
    pub schedulers: Arc<SchedulerRegistry>,
    /// Whether a provider API key was found at startup.
    pub generation_configured: bool,
}

impl AppState {
    /// Wire the stores, hub and scheduler registry around a generator
    pub fn new(
        db_path: PathBuf,
        generator: Arc<dyn ConversationGenerator>,
        policy: GenerationPolicy,
        generation_configured: bool,
    ) -> Self {
        let hub = ConversationHub::new();
        let sink: Arc<dyn ConversationSink> = Arc::new(SqliteSink::new(&db_path, hub.clone()));
        let deps = SchedulerDeps {
            directory: Arc::new(SqliteDirectory::new(&db_path)),
            generator: generator.clone(),
            sink: sink.clone(),
            hub: hub.clone(),
        };

        Self {
            db_path: Arc::new(db_path),
            generator,
            sink,
            hub,
            schedulers: Arc::new(SchedulerRegistry::new(policy, deps)),
            generation_configured,
        }
    }
}

/// Build an AI client from configured credentials and env overrides.
///
/// The API key never leaves the server.
pub fn create_ai_client(config: &ServerConfig, credentials: &CredentialStore) -> Option<AiClient> {
    let api_key = match credentials.resolve(&config.provider) {
        Some(key) => key,
        None => {
            tracing::warn!(
                "No credentials found for provider {} (set {}); generation will be unavailable",
                config.provider,
                config.provider.env_key()
            );
            return None;
        }
    };

    let client_config = AiClientConfig::for_provider(config.provider, config.model.as_deref());
    tracing::info!(
        provider = %config.provider,
        model = %client_config.model,
        "AI client configured"
    );
    Some(AiClient::new(client_config, api_key))
}

/// Open the database, resolve credentials and assemble the state.
pub fn build_state(config: &ServerConfig) -> anyhow::Result<AppState> {
    // Runs migrations once up front
    let _db = Database::new(&config.db_path)?;

    let credentials = CredentialStore::load().unwrap_or_else(|e| {
        tracing::warn!("Failed to load credentials: {}", e);
        CredentialStore::default()
    });
    let ai_client = create_ai_client(config, &credentials).map(Arc::new);
    let configured = ai_client.is_some();
    let generator = Arc::new(LlmGenerator::new(ai_client, config.policy.mode));

    Ok(AppState::new(
        config.db_path.clone(),
        generator,
        config.policy,
        configured,
    ))
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/ws/world-groups/:id", get(ws::world_groups::handler))
        .nest(
            "/api",
            routes::api_router().layer(middleware::from_fn(auth::auth_middleware)),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the WorldChat server and block until shutdown.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let state = build_state(&config)?;
    let schedulers = state.schedulers.clone();
    let app = build_router(state);

    tracing::info!("WorldChat server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    schedulers.shutdown_all();
    tracing::info!("WorldChat server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        features: HashMap::from([
            ("generation".to_string(), state.generation_configured),
            ("realtime".to_string(), true),
        ]),
        active_schedulers: state.schedulers.active_count(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    features: HashMap<String, bool>,
    active_schedulers: usize,
}
