//! HTTP routes and server wiring.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::auth;
use super::types::{AcceptedResponse, HealthResponse, QuizTaskRequest};
use crate::chain::{ChainRecord, ChainRegistry, ChainRunner, QuizTask};
use crate::config::Config;
use crate::eval::PythonProcessEvaluator;
use crate::llm::{LlmClient, OpenRouterClient};
use crate::render::HeadlessRenderer;
use crate::solver::SolverSynthesizer;
use crate::submit::SubmissionDispatcher;

pub struct AppState {
    pub config: Config,
    pub registry: ChainRegistry,
    pub runner: Arc<ChainRunner>,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let llm: Arc<dyn LlmClient> = Arc::new(OpenRouterClient::new(config.api_key.clone()));

    let runner = Arc::new(ChainRunner::new(
        Arc::new(HeadlessRenderer::new(
            config.render_timeout,
            config.render_settle,
        )),
        Arc::new(PythonProcessEvaluator::new(
            config.python_bin.clone(),
            config.eval_timeout,
        )),
        SolverSynthesizer::new(Arc::clone(&llm), config.default_model.clone()),
        SubmissionDispatcher::new(
            llm,
            config.default_model.clone(),
            config.submit_timeout,
            config.fallback_submit_url.clone(),
        ),
        config.max_chain_length,
    ));

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState {
        config,
        registry: ChainRegistry::new(),
        runner,
    });

    let app = router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    let shutdown_state = Arc::clone(&state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal(shutdown_state).await;
        })
        .await?;

    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/quiz", post(create_quiz_task))
        .route("/api/chains", get(list_chains))
        .route("/api/chains/:id", get(get_chain))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wait for SIGINT/SIGTERM. Running chains are not cancelled; they are
/// abandoned with the process and their registry state is lost.
async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    let active = state.registry.active_count().await;
    tracing::info!(
        active_chains = active,
        "Shutdown signal received, abandoning running chains"
    );
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_chains: state.registry.active_count().await,
    })
}

/// Accept a quiz task and acknowledge immediately; the chain runs as a
/// spawned background task.
async fn create_quiz_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QuizTaskRequest>,
) -> Result<Json<AcceptedResponse>, (StatusCode, String)> {
    if !auth::verify_secret(&req.secret, &state.config.quiz_secret) {
        return Err((StatusCode::FORBIDDEN, "Invalid secret".to_string()));
    }

    let id = Uuid::new_v4();
    let task = QuizTask {
        email: req.email,
        secret: req.secret,
        url: req.url,
    };

    state
        .registry
        .insert(ChainRecord::new(id, task.url.clone()))
        .await;
    tracing::info!(chain = %id, url = %task.url, "Accepted quiz task");

    let runner = Arc::clone(&state.runner);
    let registry = state.registry.clone();
    tokio::spawn(async move {
        runner.run_tracked(id, task, &registry).await;
    });

    Ok(Json(AcceptedResponse {
        id,
        status: "running".to_string(),
        message: "Quiz chain started".to_string(),
    }))
}

async fn list_chains(State(state): State<Arc<AppState>>) -> Json<Vec<ChainRecord>> {
    Json(state.registry.list().await)
}

async fn get_chain(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChainRecord>, (StatusCode, String)> {
    match state.registry.get(&id).await {
        Some(record) => Ok(Json(record)),
        None => Err((StatusCode::NOT_FOUND, format!("Chain {} not found", id))),
    }
}
