//! REST API Server for the property analyzer
//!
//! Exposes the analysis engine, dashboard sessions and AI tools over HTTP

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::PropvestError;
use crate::finance;
use crate::models::{
    ExpensesUpdate, FinancingAssumptions, FinancingUpdate, OperatingExpenses, PropertyListing,
};
use crate::session::SessionStore;
use crate::tools::{require_text, strip_data_url, tool_catalog, PropertyTools};
use crate::voice;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnalysisRequest {
    pub assumptions: FinancingAssumptions,
    pub expenses: OperatingExpenses,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CreateSessionRequest {
    pub assumptions: Option<FinancingAssumptions>,
    pub expenses: Option<OperatingExpenses>,
}

#[derive(Debug, Deserialize)]
pub struct ImageEditRequest {
    pub image_base64: String,
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct VideoRequest {
    pub image_base64: String,
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VideoDownloadQuery {
    pub uri: String,
}

#[derive(Debug, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn ok<T: Serialize>(data: T) -> ApiResult {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn fail(err: PropvestError) -> ApiResult {
    let status = match &err {
        PropvestError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        PropvestError::DegenerateResult(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PropvestError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        PropvestError::MissingApiKey | PropvestError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
        PropvestError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        PropvestError::LlmError(_) | PropvestError::HttpError(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!(%status, "Request failed: {}", err);
    } else {
        warn!(%status, "Request rejected: {}", err);
    }

    (status, Json(ApiResponse::error(err.to_string())))
}

/// Upstream AI failures reach the user as a generic notice
fn tool_failure(tool: &str, err: PropvestError) -> ApiResult {
    let (status, Json(mut body)) = fail(err);
    if status == StatusCode::BAD_GATEWAY {
        body.error = Some(format!("Failed to run {}. Please try again.", tool));
    }
    (status, Json(body))
}

fn parse_session_id(raw: &str) -> std::result::Result<Uuid, ApiResult> {
    Uuid::parse_str(raw).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!("Invalid session id '{}': {}", raw, e))),
        )
    })
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub sessions: Arc<dyn SessionStore>,
    pub tools: Arc<dyn PropertyTools>,
}

/// =============================
/// Health & Defaults
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn defaults() -> ApiResult {
    let listing = PropertyListing::sample();
    let assumptions = listing.default_assumptions();
    let expenses = OperatingExpenses::default();

    match finance::compute_breakdown(&assumptions, &expenses) {
        Ok(analysis) => ok(serde_json::json!({
            "listing": listing,
            "assumptions": assumptions,
            "expenses": expenses,
            "analysis": analysis,
        })),
        Err(e) => fail(e),
    }
}

/// =============================
/// Stateless Analysis
/// =============================

async fn analyze(Json(req): Json<AnalysisRequest>) -> ApiResult {
    match finance::compute_breakdown(&req.assumptions, &req.expenses) {
        Ok(breakdown) => ok(breakdown),
        Err(e) => fail(e),
    }
}

/// =============================
/// Sessions
/// =============================

async fn create_session(
    State(state): State<ApiState>,
    body: Option<Json<CreateSessionRequest>>,
) -> ApiResult {
    let req = body.map(|Json(r)| r).unwrap_or_default();

    match state.sessions.create(req.assumptions, req.expenses).await {
        Ok(snapshot) => (StatusCode::CREATED, Json(ApiResponse::success(snapshot))),
        Err(e) => fail(e),
    }
}

async fn list_sessions(State(state): State<ApiState>) -> ApiResult {
    match state.sessions.list().await {
        Ok(ids) => ok(ids),
        Err(e) => fail(e),
    }
}

async fn get_session(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResult {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.sessions.get(id).await {
        Ok(snapshot) => ok(snapshot),
        Err(e) => fail(e),
    }
}

async fn update_assumptions(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(update): Json<FinancingUpdate>,
) -> ApiResult {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.sessions.update_assumptions(id, update).await {
        Ok(snapshot) => {
            info!(session_id = %id, revision = snapshot.revision, "Assumptions updated");
            ok(snapshot)
        }
        Err(e) => fail(e),
    }
}

async fn update_expenses(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(update): Json<ExpensesUpdate>,
) -> ApiResult {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.sessions.update_expenses(id, update).await {
        Ok(snapshot) => {
            info!(session_id = %id, revision = snapshot.revision, "Expenses updated");
            ok(snapshot)
        }
        Err(e) => fail(e),
    }
}

async fn delete_session(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResult {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.sessions.remove(id).await {
        Ok(()) => ok(serde_json::json!({ "deleted": id })),
        Err(e) => fail(e),
    }
}

/// =============================
/// AI Tools
/// =============================

async fn list_tools() -> ApiResult {
    ok(tool_catalog())
}

async fn image_edit(State(state): State<ApiState>, Json(req): Json<ImageEditRequest>) -> ApiResult {
    let image = match strip_data_url(&req.image_base64) {
        Ok(image) => image,
        Err(e) => return fail(e),
    };
    let prompt = match require_text("prompt", &req.prompt) {
        Ok(prompt) => prompt,
        Err(e) => return fail(e),
    };

    info!(prompt = %prompt, "Image edit requested");
    match state.tools.edit_image(image, prompt).await {
        Ok(data_url) => ok(serde_json::json!({ "image_data_url": data_url })),
        Err(e) => tool_failure("image edit", e),
    }
}

async fn video(State(state): State<ApiState>, Json(req): Json<VideoRequest>) -> ApiResult {
    let image = match strip_data_url(&req.image_base64) {
        Ok(image) => image,
        Err(e) => return fail(e),
    };

    info!("Video generation requested");
    match state.tools.animate(image, req.prompt.as_deref()).await {
        Ok(video_uri) => ok(serde_json::json!({ "video_uri": video_uri })),
        Err(e) => tool_failure("video generation", e),
    }
}

async fn video_download(
    State(state): State<ApiState>,
    Query(query): Query<VideoDownloadQuery>,
) -> Response {
    let uri = match require_text("uri", &query.uri) {
        Ok(uri) => uri,
        Err(e) => return fail(e).into_response(),
    };

    match state.tools.fetch_video(uri).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "video/mp4")], bytes).into_response(),
        Err(e) => tool_failure("video download", e).into_response(),
    }
}

async fn research(State(state): State<ApiState>, Json(req): Json<ResearchRequest>) -> ApiResult {
    let query = match require_text("query", &req.query) {
        Ok(q) => q,
        Err(e) => return fail(e),
    };

    info!(query = %query, "Market research requested");
    ok(state.tools.research(query).await)
}

/// =============================
/// Voice
/// =============================

/// Everything a browser needs to open the Live session itself
async fn voice_setup() -> ApiResult {
    ok(serde_json::json!({
        "model": voice::LIVE_MODEL,
        "input_sample_rate": voice::INPUT_SAMPLE_RATE,
        "output_sample_rate": voice::OUTPUT_SAMPLE_RATE,
        "setup": voice::setup_message(),
    }))
}

/// =============================
/// Router
/// =============================

pub fn create_router(sessions: Arc<dyn SessionStore>, tools: Arc<dyn PropertyTools>) -> Router {
    let state = ApiState { sessions, tools };

    Router::new()
        .route("/health", get(health))
        .route("/api/defaults", get(defaults))
        .route("/api/analysis", post(analyze))
        .route("/api/sessions", post(create_session).get(list_sessions))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/assumptions", patch(update_assumptions))
        .route("/api/sessions/:id/expenses", patch(update_expenses))
        .route("/api/tools", get(list_tools))
        .route("/api/tools/image-edit", post(image_edit))
        .route("/api/tools/video", post(video).get(video_download))
        .route("/api/tools/research", post(research))
        .route("/api/voice/setup", get(voice_setup))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    sessions: Arc<dyn SessionStore>,
    tools: Arc<dyn PropertyTools>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(sessions, tools);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::GeminiClient;
    use crate::session::InMemorySessionStore;
    use crate::tools::stub::StubTools;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(Arc::new(InMemorySessionStore::new()), Arc::new(StubTools))
    }

    async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_stateless_analysis() {
        let body = json!({
            "assumptions": {
                "purchasePrice": 200000, "downPaymentPercent": 50, "interestRate": 0,
                "loanTermYears": 15, "nightlyRate": 250, "occupancyRate": 65
            },
            "expenses": serde_json::to_value(OperatingExpenses::default()).unwrap()
        });

        let (status, resp) = call(&app(), Method::POST, "/api/analysis", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["success"], true);
        assert_eq!(resp["data"]["loanAmount"], 100000.0);
        let mortgage = resp["data"]["monthlyMortgage"].as_f64().unwrap();
        assert!((mortgage - 100_000.0 / 180.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_invalid_analysis_is_bad_request() {
        let mut assumptions = serde_json::to_value(FinancingAssumptions::default()).unwrap();
        assumptions["downPaymentPercent"] = json!(120);
        let body = json!({
            "assumptions": assumptions,
            "expenses": serde_json::to_value(OperatingExpenses::default()).unwrap()
        });

        let (status, resp) = call(&app(), Method::POST, "/api/analysis", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["success"], false);
        assert!(resp["error"].as_str().unwrap().contains("downPaymentPercent"));
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let router = app();

        let (status, created) = call(&router, Method::POST, "/api/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["data"]["sessionId"].as_str().unwrap().to_string();
        let income = created["data"]["analysis"]["monthlyIncome"].as_f64().unwrap();
        assert_eq!(income, 4875.0);

        let (status, updated) = call(
            &router,
            Method::PATCH,
            &format!("/api/sessions/{}/assumptions", id),
            Some(json!({ "occupancyRate": 80 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["data"]["revision"], 1);
        assert_eq!(updated["data"]["analysis"]["monthlyIncome"], 6000.0);

        let (status, rejected) = call(
            &router,
            Method::PATCH,
            &format!("/api/sessions/{}/expenses", id),
            Some(json!({ "hoaMonthly": -5 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(rejected["success"], false);

        let (status, fetched) = call(&router, Method::GET, &format!("/api/sessions/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["data"]["revision"], 1);
        assert_eq!(fetched["data"]["expenses"]["hoaMonthly"], 50.0);

        let (status, _) = call(&router, Method::DELETE, &format!("/api/sessions/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&router, Method::GET, &format!("/api/sessions/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_session_id() {
        let (status, resp) = call(&app(), Method::GET, "/api/sessions/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(resp["error"].as_str().unwrap().contains("not-a-uuid"));
    }

    #[tokio::test]
    async fn test_tools() {
        let router = app();

        let (status, catalog) = call(&router, Method::GET, "/api/tools", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(catalog["data"].as_array().unwrap().len(), 4);

        let (status, edited) = call(
            &router,
            Method::POST,
            "/api/tools/image-edit",
            Some(json!({ "image_base64": "data:image/jpeg;base64,QUJD", "prompt": "Add a pool" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(edited["data"]["image_data_url"], "data:image/png;base64,QUJD");

        let (status, _) = call(
            &router,
            Method::POST,
            "/api/tools/image-edit",
            Some(json!({ "image_base64": "QUJD", "prompt": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, research) = call(
            &router,
            Method::POST,
            "/api/tools/research",
            Some(json!({ "query": "Austin rents" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(research["data"]["text"], "Findings for Austin rents");
        assert_eq!(research["data"]["sources"][0]["uri"], "https://example.com");
    }

    #[tokio::test]
    async fn test_video_download() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/tools/video?uri=https://files.example/video.mp4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.ends_with(b"ftypmp42"));
    }

    #[tokio::test]
    async fn test_video_download_rejects_foreign_uri() {
        let gemini = GeminiClient::new("SECRET_GEMINI_KEY".to_string()).unwrap();
        let router = create_router(Arc::new(InMemorySessionStore::new()), Arc::new(gemini));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (status, resp) = call(
            &router,
            Method::GET,
            &format!("/api/tools/video?uri=http://{}/attacker", addr),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let message = resp["error"].as_str().unwrap();
        assert!(message.contains("uri"));
        assert!(!message.contains("SECRET_GEMINI_KEY"));

        let connection = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
        assert!(connection.is_err(), "no request may leave for a foreign host");
    }

    #[tokio::test]
    async fn test_voice_setup() {
        let (status, resp) = call(&app(), Method::GET, "/api/voice/setup", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["data"]["input_sample_rate"], 16000);
        assert_eq!(resp["data"]["output_sample_rate"], 24000);
        assert!(resp["data"]["setup"]["setup"]["systemInstruction"].is_object());
    }

    #[tokio::test]
    async fn test_video_failure_is_generic() {
        let (status, resp) = call(
            &app(),
            Method::POST,
            "/api/tools/video",
            Some(json!({ "image_base64": "QUJD", "prompt": "fail" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(resp["error"], "Failed to run video generation. Please try again.");
    }
}
