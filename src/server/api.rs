use crate::agent::{ ChatReply, StudyAgent };
use crate::cli::Args;
use crate::error::AgentError;
use crate::models::chat::{ Conversation, Message };
use crate::models::roadmap::Roadmap;
use crate::quiz::{ QuizFeedback, QuizQuestion, DEFAULT_QUESTION_COUNT };
use crate::roadmap::{ Expansion, RoadmapRequest };
use crate::video::VideoResult;

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    body::Bytes,
    routing::{ get, post },
    Router,
    Json,
    extract::{ Path, Query, Request, State },
    middleware::{ self, Next },
    response::{ IntoResponse, Response },
    http::StatusCode,
};
use serde::{ Deserialize, Serialize };
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error, warn };

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<StudyAgent>,
    pub api_key: Option<String>,
}

/// Maps library errors onto HTTP statuses with a JSON `{error}` body.
pub struct ApiError(AgentError);

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        ApiError(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.is_not_found() => StatusCode::NOT_FOUND,
            e if e.is_invalid_input() => StatusCode::BAD_REQUEST,
            AgentError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            | AgentError::Http(_)
            | AgentError::ProviderStatus { .. }
            | AgentError::EmptyResponse { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("API request failed: {}", self.0);
        } else {
            warn!("API request rejected: {}", self.0);
        }
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Deserialize, Default)]
pub struct NewConversationRequest {
    pub persona: Option<String>,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Deserialize)]
pub struct DoubtRequest {
    #[serde(default)]
    pub messages: Vec<Message>,
    pub question: String,
}

#[derive(Serialize)]
struct DoubtResponse {
    messages: Vec<Message>,
}

#[derive(Deserialize)]
pub struct ExpandRequest {
    pub label: String,
    pub topic: String,
    #[serde(default)]
    pub context: String,
    /// Set when expanding a node of an already expanded roadmap.
    #[serde(default)]
    pub nested: bool,
}

#[derive(Deserialize)]
pub struct DetailsRequest {
    pub label: String,
    pub topic: String,
    #[serde(default)]
    pub context: String,
}

#[derive(Serialize)]
struct DetailsResponse {
    details: String,
}

#[derive(Deserialize)]
pub struct VideoQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Deserialize)]
pub struct QuizRequest {
    pub topic: String,
    pub count: Option<usize>,
}

#[derive(Serialize)]
struct QuizResponse {
    questions: Vec<QuizQuestion>,
}

#[derive(Deserialize)]
pub struct CheckAnswerRequest {
    pub question: QuizQuestion,
    pub answer: String,
}

#[derive(Deserialize)]
pub struct CareerRequest {
    pub field: String,
}

#[derive(Serialize)]
struct CareerResponse {
    guidance: String,
}

#[derive(Serialize)]
struct ReloadResponse {
    success: bool,
    message: String,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/api/conversations", get(list_conversations).post(create_conversation))
        .route("/api/conversations/{id}", get(get_conversation).delete(delete_conversation))
        .route("/api/conversations/{id}/messages", post(send_message))
        .route("/api/doubts", post(clarify_doubt))
        .route("/api/roadmap", post(generate_roadmap))
        .route("/api/roadmap/expand", post(expand_roadmap))
        .route("/api/roadmap/details", post(roadmap_details))
        .route("/api/videos", get(search_videos))
        .route("/api/quiz/generate", post(generate_quiz))
        .route("/api/quiz/check", post(check_quiz_answer))
        .route("/api/career", post(career_guidance))
        .route("/api/reload-prompts", get(reload_prompts_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/api/health", get(health))
        .merge(protected)
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    http_port: u16,
    agent: Arc<StudyAgent>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    let app = router(AppState {
        agent,
        api_key: args.server_api_key.clone().filter(|k| !k.is_empty()),
    });

    match (args.enable_tls, &args.tls_cert_path, &args.tls_key_path) {
        (true, Some(cert_path), Some(key_path)) => {
            info!("Starting HTTPS API server on: https://{}", addr);
            let tls_config = axum_server::tls_rustls::RustlsConfig
                ::from_pem_file(cert_path, key_path).await?;

            tokio::spawn(async move {
                let result = axum_server
                    ::bind_rustls(addr, tls_config)
                    .serve(app.into_make_service()).await;
                if let Err(e) = result {
                    error!("HTTPS server error: {}", e);
                }
            });
        }
        _ => {
            info!("Starting HTTP API server on: http://{}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
                format!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e)
            })?;

            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                    error!("HTTP server error: {}", e);
                }
            });
        }
    }

    Ok(())
}

async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(expected) = &state.api_key {
        let provided = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            warn!("Rejected {} {}: missing or wrong API key", req.method(), req.uri().path());
            let body = ErrorBody { error: "Invalid or missing API key".into() };
            return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        }
    }
    next.run(req).await
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_conversations(State(state): State<AppState>) -> ApiResult<Json<Vec<Conversation>>> {
    Ok(Json(state.agent.list_conversations().await?))
}

async fn create_conversation(
    State(state): State<AppState>,
    body: Bytes
) -> ApiResult<(StatusCode, Json<Conversation>)> {
    // The body is optional; an empty POST opens a default-persona conversation.
    let req: NewConversationRequest = if body.is_empty() {
        NewConversationRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AgentError::InvalidInput(e.to_string()))?
    };
    let conversation = state.agent.create_conversation(req.persona.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> ApiResult<Json<Conversation>> {
    Ok(Json(state.agent.get_conversation(&id).await?))
}

async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> ApiResult<StatusCode> {
    state.agent.delete_conversation(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>
) -> ApiResult<Json<ChatReply>> {
    Ok(Json(state.agent.process_message(&id, &req.text).await?))
}

async fn clarify_doubt(
    State(state): State<AppState>,
    Json(req): Json<DoubtRequest>
) -> ApiResult<impl IntoResponse> {
    let messages = state.agent.clarify_doubt(req.messages, &req.question).await?;
    Ok(Json(DoubtResponse { messages }))
}

async fn generate_roadmap(
    State(state): State<AppState>,
    Json(req): Json<RoadmapRequest>
) -> ApiResult<Json<Roadmap>> {
    Ok(Json(state.agent.generate_roadmap(&req).await?))
}

async fn expand_roadmap(
    State(state): State<AppState>,
    Json(req): Json<ExpandRequest>
) -> ApiResult<Json<Roadmap>> {
    let expansion = if req.nested { Expansion::Nested } else { Expansion::Subtree };
    let roadmap = state.agent.expand_roadmap_node(
        &req.label,
        &req.topic,
        &req.context,
        expansion
    ).await?;
    Ok(Json(roadmap))
}

async fn roadmap_details(
    State(state): State<AppState>,
    Json(req): Json<DetailsRequest>
) -> ApiResult<impl IntoResponse> {
    let details = state.agent.roadmap_node_details(&req.label, &req.topic, &req.context).await?;
    Ok(Json(DetailsResponse { details }))
}

async fn search_videos(
    State(state): State<AppState>,
    Query(query): Query<VideoQuery>
) -> ApiResult<Json<Vec<VideoResult>>> {
    Ok(Json(state.agent.search_videos(&query.q).await?))
}

async fn generate_quiz(
    State(state): State<AppState>,
    Json(req): Json<QuizRequest>
) -> ApiResult<impl IntoResponse> {
    let count = req.count.unwrap_or(DEFAULT_QUESTION_COUNT);
    let questions = state.agent.generate_quiz(&req.topic, count).await?;
    Ok(Json(QuizResponse { questions }))
}

async fn check_quiz_answer(
    State(state): State<AppState>,
    Json(req): Json<CheckAnswerRequest>
) -> ApiResult<Json<QuizFeedback>> {
    Ok(Json(state.agent.check_quiz_answer(&req.question, &req.answer).await?))
}

async fn career_guidance(
    State(state): State<AppState>,
    Json(req): Json<CareerRequest>
) -> ApiResult<impl IntoResponse> {
    let guidance = state.agent.career_guidance(&req.field).await?;
    Ok(Json(CareerResponse { guidance }))
}

async fn reload_prompts_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.agent.reload_prompts_if_changed() {
        Ok(changed) => {
            let message = if changed { "Prompts reloaded" } else { "Prompts unchanged" };
            (StatusCode::OK, Json(ReloadResponse { success: true, message: message.into() }))
        }
        Err(e) => {
            error!("Prompt reload failed: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(ReloadResponse { success: false, message: e.to_string() }),
            )
        }
    }
}
