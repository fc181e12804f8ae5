//! Chat HTTP server.
//!
//! Exposes the load → search → generate pipeline to the chat frontend.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat` | Answer a parent question, grounded in the corpus |
//! | `POST` | `/api/tts` | Synthesize a reply as MP3 audio |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! `/api/chat` always answers with a `{"reply": ...}` body, including on
//! errors, so the frontend can render any outcome as a bot bubble.
//! `/api/tts` uses `{"error": ...}` bodies. Failures inside the pipeline
//! map to the school's Vietnamese "please try again" reply; a missing
//! API key surfaces its configuration message instead.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support
//! browser-based clients.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::corpus::CorpusProvider;
use crate::generate::AnswerGenerator;
use crate::models::ChatMessage;
use crate::search::{self, SearchParams};
use crate::tts::{sanitize_for_speech, TtsClient};

/// Reply for an empty or whitespace-only question.
const EMPTY_MESSAGE_REPLY: &str = "Phụ huynh vui lòng nhập câu hỏi ạ.";
/// Generic reply when the pipeline fails.
const SYSTEM_TROUBLE_REPLY: &str =
    "Hiện tại hệ thống đang gặp sự cố. Phụ huynh vui lòng thử lại sau ạ.";

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    provider: Arc<CorpusProvider>,
    generator: Arc<dyn AnswerGenerator>,
    tts: Arc<TtsClient>,
    params: SearchParams,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsResponse {
    pub audio_content: String,
}

/// Start the chat server on the configured bind address.
///
/// The generator is injected as a trait object so callers (and tests)
/// can substitute their own implementation.
pub async fn run_server(
    config: Arc<Config>,
    provider: Arc<CorpusProvider>,
    generator: Arc<dyn AnswerGenerator>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        provider,
        generator,
        tts: Arc::new(TtsClient::new(config.tts.clone())),
        params: config.search_params(),
        config,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/api/tts", post(handle_tts))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    info!(addr = %bind_addr, "chat server listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ── chat ───────────────────────────────────────────────────────────────

/// Chat error response: still a `{"reply": ...}` body so the frontend
/// renders it like any other bot message.
struct ChatError {
    status: StatusCode,
    reply: String,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        (self.status, Json(ChatResponse { reply: self.reply })).into_response()
    }
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ChatError> {
    let request_started = Instant::now();

    let message = request.message.trim().to_string();
    if message.is_empty() {
        return Err(ChatError {
            status: StatusCode::BAD_REQUEST,
            reply: EMPTY_MESSAGE_REPLY.to_string(),
        });
    }

    let step = Instant::now();
    let corpus = state
        .provider
        .get()
        .await
        .map_err(|err| chat_failure(&state, err))?;
    debug!(
        elapsed_ms = step.elapsed().as_millis() as u64,
        documents = corpus.len(),
        "corpus ready"
    );

    let step = Instant::now();
    let context = search::search(&message, &corpus, &state.params);
    debug!(
        elapsed_ms = step.elapsed().as_millis() as u64,
        context_chars = context.chars().count(),
        "context assembled"
    );

    let step = Instant::now();
    let reply = state
        .generator
        .generate(&context, &message, &request.history)
        .await
        .map_err(|err| chat_failure(&state, err))?;
    debug!(
        elapsed_ms = step.elapsed().as_millis() as u64,
        "generator replied"
    );

    info!(
        total_ms = request_started.elapsed().as_millis() as u64,
        history = request.history.len(),
        grounded = !context.is_empty(),
        "chat request served"
    );
    Ok(Json(ChatResponse { reply }))
}

fn chat_failure(state: &AppState, err: anyhow::Error) -> ChatError {
    error!(error = %err, "chat request failed");
    ChatError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        reply: failure_reply(&err.to_string(), &state.config.generator.api_key_env),
    }
}

/// A missing API key is actionable for the operator, so its message is
/// surfaced; everything else collapses into the generic reply.
fn failure_reply(message: &str, api_key_env: &str) -> String {
    if message.contains(api_key_env) {
        message.to_string()
    } else {
        SYSTEM_TROUBLE_REPLY.to_string()
    }
}

// ── tts ────────────────────────────────────────────────────────────────

struct TtsError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for TtsError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

fn tts_bad_request(message: impl Into<String>) -> TtsError {
    TtsError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

async fn handle_tts(
    State(state): State<AppState>,
    Json(request): Json<TtsRequest>,
) -> Result<Json<TtsResponse>, TtsError> {
    if request.text.trim().is_empty() {
        return Err(tts_bad_request("Thiếu nội dung văn bản"));
    }

    let clean = sanitize_for_speech(&request.text);
    if clean.is_empty() {
        return Err(tts_bad_request("Không có văn bản hợp lệ để đọc"));
    }

    let audio_content = state.tts.synthesize(&clean).await.map_err(|err| {
        error!(error = %err, "tts request failed");
        TtsError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    })?;

    Ok(Json(TtsResponse { audio_content }))
}

// ── health ─────────────────────────────────────────────────────────────

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
