//! HTTP + WebSocket API for Facebind
//!
//! Endpoints:
//! - GET /health - Health check
//! - GET /profiles - Full profile set
//! - POST /profiles - Create profile (selects it)
//! - DELETE /profiles/selected - Remove selected profile
//! - PUT /selection - Select profile
//! - POST /profiles/:p/bindings - Add binding
//! - PUT /profiles/:p/bindings/:b - Edit binding
//! - DELETE /profiles/:p/bindings/:b - Remove binding
//! - GET /state - Run-time state of the selected profile
//! - POST /frame - Evaluate one detector frame
//! - GET /diagnostics - Drain collected diagnostics
//! - POST /save - Write profiles to disk
//! - WS /ws - Live action stream
//!
//! The session sits behind one mutex: user edits and frame evaluation
//! never interleave.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, State, WebSocketUpgrade, ws::{Message, WebSocket}},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post, put},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::core::{
    ActionEvent, BindingEdit, BindingEngine, BroadcastDispatcher, CollectingSink,
    ExpressionCompiler, GatedDispatcher, TeeSink, TracingSink, save_profiles,
};
use crate::DIAGNOSTIC_BACKLOG;
use crate::types::{
    DetectorFrame, Diagnostic, FrameReport, ProfileError, ProfileSet, RuntimeState, Settings,
};

/// Editable state shared by every request
pub struct Session {
    pub set: ProfileSet,
    pub engine: BindingEngine,
}

/// App state
pub struct AppState {
    pub session: Mutex<Session>,
    pub actions: BroadcastDispatcher,
    pub diagnostics: Arc<CollectingSink>,
    pub profiles_path: Option<PathBuf>,
    /// Save the profile set when the server shuts down
    pub auto_save: bool,
}

impl AppState {
    /// Wire the engine to the broadcast dispatcher and a bounded diagnostic
    /// backlog, then normalize the starting profile set
    pub fn new(options: ServerOptions) -> Self {
        let actions = BroadcastDispatcher::new(256);
        let diagnostics = Arc::new(CollectingSink::with_capacity(DIAGNOSTIC_BACKLOG));
        let engine = BindingEngine::new(
            Arc::new(ExpressionCompiler::new()),
            Arc::new(GatedDispatcher::new(
                Arc::new(actions.clone()),
                options.settings.allow_input_simulation,
            )),
            Arc::new(TeeSink::new(Arc::new(TracingSink), diagnostics.clone())),
        );

        let mut set = options.profiles;
        engine.normalize(&mut set);

        Self {
            session: Mutex::new(Session { set, engine }),
            actions,
            diagnostics,
            profiles_path: options.profiles_path,
            auto_save: options.settings.auto_save_profiles,
        }
    }

    /// Shutdown hook: write the profile set if auto-save is on and a
    /// profile file is configured. Returns whether anything was written.
    pub async fn save_on_exit(&self) -> Result<bool, ProfileError> {
        let Some(ref path) = self.profiles_path else {
            return Ok(false);
        };
        if !self.auto_save {
            return Ok(false);
        }
        let session = self.session.lock().await;
        save_profiles(&session.set, path)?;
        Ok(true)
    }
}

/// What the server starts from
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    pub profiles: ProfileSet,
    pub settings: Settings,
    /// Where POST /save writes; `None` disables saving
    pub profiles_path: Option<PathBuf>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub profiles: usize,
}

/// Create profile request
#[derive(Debug, Deserialize)]
pub struct NewProfileRequest {
    pub name: Option<String>,
}

/// Select profile request
#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub index: usize,
}

/// Index of a created item
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub index: usize,
}

/// Run-time state of the selected profile
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub selection: usize,
    pub profile: Option<String>,
    pub bindings: Vec<RuntimeState>,
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: ProfileError) -> ApiError {
    let status = match err {
        ProfileError::NoSuchProfile(_) | ProfileError::NoSuchBinding(_) => StatusCode::NOT_FOUND,
        ProfileError::ThresholdOutOfRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ProfileError::Io(_) | ProfileError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: err.to_string() }))
}

/// Create the API router
pub fn create_router(options: ServerOptions) -> Router {
    routes(Arc::new(AppState::new(options)))
}

/// Router over existing state (kept by the caller for the shutdown hook)
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/profiles", get(get_profiles).post(create_profile))
        .route("/profiles/selected", delete(remove_selected))
        .route("/selection", put(select_profile))
        .route("/profiles/:p/bindings", post(create_binding))
        .route("/profiles/:p/bindings/:b", put(edit_binding).delete(remove_binding))
        .route("/state", get(get_state))
        .route("/frame", post(process_frame))
        .route("/diagnostics", get(get_diagnostics))
        .route("/save", post(save))
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let session = state.session.lock().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        profiles: session.set.len(),
    })
}

async fn get_profiles(State(state): State<Arc<AppState>>) -> Json<ProfileSet> {
    let session = state.session.lock().await;
    Json(session.set.clone())
}

async fn create_profile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewProfileRequest>,
) -> Json<CreatedResponse> {
    let mut session = state.session.lock().await;
    let index = session.set.create_profile(req.name.unwrap_or_default());
    info!(index, "profile created");
    Json(CreatedResponse { index })
}

async fn remove_selected(State(state): State<Arc<AppState>>) -> StatusCode {
    let mut session = state.session.lock().await;
    match session.set.remove_selected() {
        Some(profile) => {
            info!(name = %profile.name, "profile removed");
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn select_profile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SelectRequest>,
) -> Result<StatusCode, ApiError> {
    let mut session = state.session.lock().await;
    session.set.select(req.index).map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_binding(
    State(state): State<Arc<AppState>>,
    Path(p): Path<usize>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let mut session = state.session.lock().await;
    let index = session.set.create_binding(p).map_err(api_error)?;
    Ok(Json(CreatedResponse { index }))
}

async fn edit_binding(
    State(state): State<Arc<AppState>>,
    Path((p, b)): Path<(usize, usize)>,
    Json(edit): Json<BindingEdit>,
) -> Result<StatusCode, ApiError> {
    let mut guard = state.session.lock().await;
    let session = &mut *guard;
    session.engine.edit_binding(&mut session.set, p, b, edit).map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_binding(
    State(state): State<Arc<AppState>>,
    Path((p, b)): Path<(usize, usize)>,
) -> Result<StatusCode, ApiError> {
    let mut session = state.session.lock().await;
    session.set.remove_binding(p, b).map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_state(State(state): State<Arc<AppState>>) -> Json<StateResponse> {
    let session = state.session.lock().await;
    let selected = session.set.selected();
    Json(StateResponse {
        selection: session.set.selection(),
        profile: selected.map(|p| p.name.clone()),
        bindings: selected
            .map(|p| p.bindings.iter().map(|b| b.runtime()).collect())
            .unwrap_or_default(),
    })
}

/// Evaluate one frame against the selected profile
async fn process_frame(
    State(state): State<Arc<AppState>>,
    Json(frame): Json<DetectorFrame>,
) -> Json<FrameReport> {
    let mut guard = state.session.lock().await;
    let session = &mut *guard;
    let selection = session.set.selection();
    let report = session.engine.process_frame(&mut session.set, selection, &frame);
    for event in report.fired() {
        debug!(binding = event.binding, edge = %event.edge, "{}", event.to_parseable_string());
    }
    Json(report)
}

async fn get_diagnostics(State(state): State<Arc<AppState>>) -> Json<Vec<Diagnostic>> {
    Json(state.diagnostics.take())
}

async fn save(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    let Some(ref path) = state.profiles_path else {
        return Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse { error: "no profile file configured".to_string() }),
        ));
    };
    let session = state.session.lock().await;
    save_profiles(&session.set, path).map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// WebSocket handler for live actions
async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let rx = state.actions.subscribe();
    ws.on_upgrade(move |socket| handle_websocket(socket, rx))
}

/// Forward actions until the client goes away
async fn handle_websocket(socket: WebSocket, mut rx: broadcast::Receiver<ActionEvent>) {
    let (mut sender, mut receiver) = socket.split();

    let mut forward = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let json = serde_json::to_string(&event).unwrap_or_default();
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "action subscriber lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut inbound = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut forward => inbound.abort(),
        _ = &mut inbound => forward.abort(),
    }
}

/// Run the API server
pub async fn run_server(addr: &str, options: ServerOptions) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::new(options));
    let router = routes(state.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("facebind API running on {}", addr);
    println!("  GET    /health                   - Health check");
    println!("  GET    /profiles                 - Profile set");
    println!("  POST   /profiles                 - Create profile");
    println!("  DELETE /profiles/selected        - Remove selected profile");
    println!("  PUT    /selection                - Select profile");
    println!("  POST   /profiles/:p/bindings     - Add binding");
    println!("  PUT    /profiles/:p/bindings/:b  - Edit binding");
    println!("  DELETE /profiles/:p/bindings/:b  - Remove binding");
    println!("  GET    /state                    - Binding run-time state");
    println!("  POST   /frame                    - Evaluate detector frame");
    println!("  GET    /diagnostics              - Collected diagnostics");
    println!("  POST   /save                     - Save profiles");
    println!("  WS     /ws                       - Live actions");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("facebind API shutting down");
    if state.save_on_exit().await? {
        info!("profiles saved on exit");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
