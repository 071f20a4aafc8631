//! # relay-server
//!
//! HTTP relay that lets independently running agents exchange chat messages.
//! Provides:
//!
//! - Agent registration, heartbeats and unregistration
//! - Fan-out of every posted message to all other agents' queues
//! - Offset-based polling (`/getUpdates`) that drains an agent's queue
//! - A background sweep evicting agents that went quiet
//! - Health and Prometheus metrics endpoints

pub mod auth;
pub mod error;
pub mod mailbox;
pub mod metrics;
pub mod sweeper;

use axum::{
    Router,
    extract::{
        DefaultBodyLimit, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{Request, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::Utc;
use parking_lot::Mutex;
use relay_config::{MailboxConfig, RelayConfig, ServerConfig};
use relay_core::RelayError;
use relay_core::api::{
    AckResponse, AgentRequest, ChatActionRequest, HealthResponse, HeartbeatResponse,
    RegisterResponse, SendMessageRequest, SendMessageResponse, UpdatesQuery, UpdatesResponse,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

pub use error::{ApiError, ApiResult};
pub use mailbox::{Delivery, Mailbox, Registration};
pub use metrics::Metrics;

/// Shared server state.
pub struct AppState {
    pub config: ServerConfig,
    /// All agent state. One lock serializes every mutation.
    pub mailbox: Mutex<Mailbox>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            mailbox: Mutex::new(Mailbox::new()),
            metrics: Metrics::new(),
        })
    }
}

/// Build the Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let relay_routes = Router::new()
        .route("/register", post(register_handler))
        .route("/unregister", post(unregister_handler))
        .route("/heartbeat", post(heartbeat_handler))
        .route("/getUpdates", get(get_updates_handler))
        .route("/sendMessage", post(send_message_handler))
        .route("/sendChatAction", post(send_chat_action_handler))
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/ping", get(ping_handler))
        .merge(relay_routes)
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(TraceLayer::new_for_http());

    if state.config.cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
}

/// Count every request, and every 4xx/5xx response.
async fn track_requests(
    State(state): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    state.metrics.inc_http_requests();
    let response = next.run(request).await;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        state.metrics.inc_http_errors();
    }
    response
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError(RelayError::InvalidBody(rejection.body_text())))
}

fn require(value: &str, field: &'static str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError(RelayError::MissingField(field)));
    }
    Ok(())
}

async fn register_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AgentRequest>, JsonRejection>,
) -> ApiResult<Json<RegisterResponse>> {
    let req = json_body(body)?;
    require(&req.agent_id, "agent_id")?;

    let connected_agents = {
        let mut mailbox = state.mailbox.lock();
        if mailbox.register(&req.agent_id, Utc::now()) == Registration::Created {
            state.metrics.inc_registrations();
        }
        mailbox.agent_ids()
    };

    Ok(Json(RegisterResponse {
        success: true,
        connected_agents,
    }))
}

async fn unregister_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AgentRequest>, JsonRejection>,
) -> ApiResult<Json<AckResponse>> {
    let req = json_body(body)?;
    require(&req.agent_id, "agent_id")?;

    state.mailbox.lock().unregister(&req.agent_id, Utc::now())?;
    state.metrics.inc_unregistrations();
    Ok(Json(AckResponse { success: true }))
}

async fn heartbeat_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AgentRequest>, JsonRejection>,
) -> ApiResult<Json<HeartbeatResponse>> {
    let req = json_body(body)?;
    require(&req.agent_id, "agent_id")?;

    let registration = state.mailbox.lock().heartbeat(&req.agent_id, Utc::now());
    let auto_registered = match registration {
        Registration::Created => {
            state.metrics.inc_registrations();
            Some(true)
        }
        Registration::Refreshed => None,
    };
    Ok(Json(HeartbeatResponse {
        success: true,
        auto_registered,
    }))
}

async fn get_updates_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UpdatesQuery>, QueryRejection>,
) -> ApiResult<Json<UpdatesResponse>> {
    let Query(query) =
        query.map_err(|rejection| ApiError(RelayError::InvalidBody(rejection.body_text())))?;
    require(&query.agent_id, "agent_id")?;

    let messages = state.mailbox.lock().take_updates(
        &query.agent_id,
        query.offset.unwrap_or(0),
        Utc::now(),
    )?;
    state.metrics.add_delivered(messages.len());
    Ok(Json(UpdatesResponse {
        success: true,
        messages,
    }))
}

async fn send_message_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> ApiResult<Json<SendMessageResponse>> {
    let req = json_body(body)?;
    require(&req.agent_id, "agent_id")?;
    let chat_id = req
        .chat_id
        .ok_or(ApiError(RelayError::MissingField("chat_id")))?;
    require(&req.text, "text")?;

    let delivery = state.mailbox.lock().send_message(
        &req.agent_id,
        chat_id,
        &req.text,
        req.telegram_message,
        Utc::now(),
    )?;
    state.metrics.record_message(delivery.recipients);

    Ok(Json(SendMessageResponse {
        success: true,
        message_id: delivery.update_id,
        recipients: delivery.recipients,
    }))
}

async fn send_chat_action_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatActionRequest>, JsonRejection>,
) -> ApiResult<Json<AckResponse>> {
    let req = json_body(body)?;
    require(&req.agent_id, "agent_id")?;
    let chat_id = req
        .chat_id
        .ok_or(ApiError(RelayError::MissingField("chat_id")))?;
    require(&req.action, "action")?;

    state.mailbox.lock().touch(&req.agent_id, Utc::now());
    debug!(agent_id = %req.agent_id, %chat_id, action = %req.action, "chat action");
    Ok(Json(AckResponse { success: true }))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (agents_list, agents_details) = {
        let mailbox = state.mailbox.lock();
        (mailbox.agent_ids(), mailbox.details())
    };
    Json(HealthResponse {
        status: "ok".into(),
        agents: agents_list.len(),
        agents_list,
        agents_details,
        uptime: state.metrics.uptime_secs(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

async fn ping_handler() -> &'static str {
    "pong"
}

/// Prometheus-compatible metrics endpoint.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (agents, queued) = {
        let mailbox = state.mailbox.lock();
        (mailbox.len(), mailbox.queued_total())
    };
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render_prometheus(agents, queued),
    )
}

/// Serve the relay on an already-bound listener until `shutdown` fires.
///
/// The inactivity sweeper runs for as long as the server does.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    mailbox_config: &MailboxConfig,
    shutdown: CancellationToken,
) -> relay_core::Result<()> {
    let sweeper = sweeper::spawn_sweeper(state.clone(), mailbox_config, shutdown.child_token());
    let router = build_router(state);

    let signal = shutdown.clone();
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(async move { signal.cancelled().await })
        .await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "sweeper task failed");
    }
    result.map_err(|e| RelayError::Server(format!("server error: {e}")))
}

/// Bind the configured address and run the relay until `shutdown` fires.
pub async fn start_server(config: RelayConfig, shutdown: CancellationToken) -> relay_core::Result<()> {
    let listen = config.server.listen.clone();
    let listener = TcpListener::bind(&listen)
        .await
        .map_err(|e| RelayError::Server(format!("failed to bind {}: {}", listen, e)))?;

    info!(
        listen = %listen,
        agent_timeout_secs = config.relay.agent_timeout_secs,
        sweep_interval_secs = config.relay.sweep_interval_secs,
        "starting relay server"
    );

    let state = AppState::new(config.server);
    serve(listener, state, &config.relay, shutdown).await
}
