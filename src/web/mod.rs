// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Web UI for the AetherPulse dashboard

mod pages;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::panels::analytics::{AnalyticsState, ViewMode};
use crate::panels::audit::AuditQueue;
use crate::panels::extraction::{ExtractionRequest, ExtractionState};
use crate::panels::visuals::VisualsView;
use crate::panels::{AppSection, SharedDashboard};
use crate::PulseError;

/// Shared application state
pub struct AppState {
    pub dashboard: SharedDashboard,
    pub config: AppConfig,
}

type ApiError = (StatusCode, String);

/// Create the web application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.web.upload_limit());

    Router::new()
        // Pages
        .route("/", get(index_page))
        .route("/section/:slug", get(section_page))
        // Form actions
        .route("/actions/analytics/refresh", post(analytics_refresh_form))
        .route("/actions/visuals", post(visuals_form))
        .route("/actions/extraction", post(extraction_form))
        .route(
            "/actions/security/upload",
            post(security_upload_form).layer(upload_limit.clone()),
        )
        // API endpoints
        .route("/api/section", get(api_get_section))
        .route("/api/section/:slug", post(api_navigate))
        .route("/api/analytics", get(api_get_analytics).post(api_refresh_analytics))
        .route("/api/analytics/view", post(api_select_view))
        .route("/api/visuals", get(api_get_visuals))
        .route("/api/visuals/generate", post(api_generate_visual))
        .route("/api/visuals/export", get(api_export_visual))
        .route("/api/extraction", get(api_get_extraction).post(api_extract))
        .route("/api/audit", get(api_get_audit))
        .route("/api/audit/upload", post(api_upload).layer(upload_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_section(slug: &str) -> Result<AppSection, ApiError> {
    slug.parse::<AppSection>().map_err(|e| (StatusCode::NOT_FOUND, e))
}

// === Page Handlers ===

async fn index_page(State(state): State<Arc<AppState>>) -> Redirect {
    let active = state.dashboard.active().await;
    Redirect::to(&format!("/section/{}", active.slug()))
}

#[derive(Deserialize)]
struct SectionQuery {
    view: Option<ViewMode>,
}

async fn section_page(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<SectionQuery>,
) -> Result<Html<String>, ApiError> {
    let section = parse_section(&slug)?;
    state.dashboard.navigate(section).await;

    if let (AppSection::ThermalAnalytics, Some(view)) = (section, query.view) {
        state.dashboard.analytics.select_view(view).await;
    }

    Ok(Html(render_section(&state, section).await))
}

async fn render_section(state: &AppState, section: AppSection) -> String {
    let dashboard = &state.dashboard;
    match section {
        AppSection::ThermalAnalytics => {
            let snapshot = dashboard.analytics.snapshot().await;
            pages::render_analytics(&snapshot, &state.config)
        }
        AppSection::AssetGen => pages::render_visuals(&dashboard.visuals.snapshot().await),
        AppSection::ExtractionAgent => pages::render_extraction(&dashboard.extraction.snapshot().await),
        AppSection::RdPipeline => pages::render_security(&dashboard.audit.snapshot().await),
    }
}

async fn analytics_refresh_form(State(state): State<Arc<AppState>>) -> Redirect {
    refresh_analytics(&state).await;
    Redirect::to("/section/analytics")
}

/// Mounting the analytics panel already starts an analysis, so only an
/// already visible panel is refreshed explicitly
async fn refresh_analytics(state: &AppState) -> AnalyticsState {
    if state.dashboard.navigate(AppSection::ThermalAnalytics).await {
        state.dashboard.analytics.snapshot().await
    } else {
        state.dashboard.analytics.refresh().await
    }
}

#[derive(Deserialize)]
struct PromptForm {
    prompt: String,
}

async fn visuals_form(State(state): State<Arc<AppState>>, Form(form): Form<PromptForm>) -> Html<String> {
    state.dashboard.navigate(AppSection::AssetGen).await;
    let snapshot = state.dashboard.visuals.generate(&form.prompt).await;
    Html(pages::render_visuals(&snapshot))
}

async fn extraction_form(
    State(state): State<Arc<AppState>>,
    Form(request): Form<ExtractionRequest>,
) -> Html<String> {
    state.dashboard.navigate(AppSection::ExtractionAgent).await;
    let snapshot = state.dashboard.extraction.extract(&request).await;
    Html(pages::render_extraction(&snapshot))
}

async fn security_upload_form(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Redirect, ApiError> {
    state.dashboard.navigate(AppSection::RdPipeline).await;
    queue_uploads(&state, multipart).await?;
    Ok(Redirect::to("/section/security"))
}

// === API Handlers ===

#[derive(Serialize)]
struct SectionResponse {
    section: AppSection,
    title: &'static str,
}

impl From<AppSection> for SectionResponse {
    fn from(section: AppSection) -> Self {
        Self { section, title: section.title() }
    }
}

async fn api_get_section(State(state): State<Arc<AppState>>) -> Json<SectionResponse> {
    Json(state.dashboard.active().await.into())
}

async fn api_navigate(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<SectionResponse>, ApiError> {
    let section = parse_section(&slug)?;
    state.dashboard.navigate(section).await;
    Ok(Json(section.into()))
}

async fn api_get_analytics(State(state): State<Arc<AppState>>) -> Json<AnalyticsState> {
    Json(state.dashboard.analytics.snapshot().await)
}

async fn api_refresh_analytics(State(state): State<Arc<AppState>>) -> Json<AnalyticsState> {
    Json(refresh_analytics(&state).await)
}

#[derive(Deserialize)]
struct ViewRequest {
    view: ViewMode,
}

async fn api_select_view(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ViewRequest>,
) -> Json<AnalyticsState> {
    state.dashboard.analytics.select_view(request.view).await;
    Json(state.dashboard.analytics.snapshot().await)
}

async fn api_get_visuals(State(state): State<Arc<AppState>>) -> Json<VisualsView> {
    Json(state.dashboard.visuals.snapshot().await.view())
}

async fn api_generate_visual(
    State(state): State<Arc<AppState>>,
    Json(form): Json<PromptForm>,
) -> Json<VisualsView> {
    state.dashboard.navigate(AppSection::AssetGen).await;
    Json(state.dashboard.visuals.generate(&form.prompt).await.view())
}

async fn api_export_visual(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let exported = state
        .dashboard
        .visuals
        .export()
        .await
        .ok_or((StatusCode::NOT_FOUND, "No generated asset to export".to_string()))?;

    let disposition = format!("attachment; filename=\"{}\"", exported.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, exported.mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        exported.bytes,
    )
        .into_response())
}

async fn api_get_extraction(State(state): State<Arc<AppState>>) -> Json<ExtractionState> {
    Json(state.dashboard.extraction.snapshot().await)
}

async fn api_extract(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExtractionRequest>,
) -> Result<Json<ExtractionState>, ApiError> {
    if !request.is_submittable() {
        return Err((StatusCode::BAD_REQUEST, "Provide a url or document text".to_string()));
    }
    state.dashboard.navigate(AppSection::ExtractionAgent).await;
    Ok(Json(state.dashboard.extraction.extract(&request).await))
}

async fn api_get_audit(State(state): State<Arc<AppState>>) -> Json<AuditQueue> {
    Json(state.dashboard.audit.snapshot().await)
}

#[derive(Serialize)]
struct QueuedUpload {
    id: String,
    name: String,
}

async fn api_upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<QueuedUpload>>), ApiError> {
    state.dashboard.navigate(AppSection::RdPipeline).await;
    let queued = queue_uploads(&state, multipart).await?;
    Ok((StatusCode::ACCEPTED, Json(queued)))
}

/// Queue every file part of a multipart body. Only the size of each file
/// is kept; the audit runs in the background.
async fn queue_uploads(state: &AppState, mut multipart: Multipart) -> Result<Vec<QueuedUpload>, ApiError> {
    let mut queued = Vec::new();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Malformed upload: {}", e)))?
    {
        let Some(name) = field.file_name().map(String::from) else {
            continue;
        };
        let mut size = 0u64;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read {}: {}", name, e)))?
        {
            size += chunk.len() as u64;
        }

        let handle = state.dashboard.audit.upload(&name, size).await;
        queued.push(QueuedUpload { id: handle.id, name });
    }

    if queued.is_empty() {
        warn!("Upload request carried no files");
        return Err((StatusCode::BAD_REQUEST, "No files in upload".to_string()));
    }
    Ok(queued)
}

/// Start the web server for a dashboard
pub async fn start_server(config: AppConfig, dashboard: SharedDashboard) -> crate::Result<()> {
    dashboard.start().await;

    let addr = format!("{}:{}", config.web.host, config.web.port);
    let state = Arc::new(AppState { dashboard, config });

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PulseError::Server(format!("Failed to bind {}: {}", addr, e)))?;

    info!("Web UI available at http://{}", addr);

    let router = create_router(state);
    axum::serve(listener, router)
        .await
        .map_err(|e| PulseError::Server(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{gateway_with, ScriptedModel};
    use crate::gemini::{ContentPart, GenerateResponse};
    use crate::panels::analytics::{AnalyticsPanel, FixedTrend};
    use crate::panels::audit::AuditPanel;
    use crate::panels::extraction::ExtractionPanel;
    use crate::panels::visuals::VisualsPanel;
    use crate::panels::Dashboard;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    fn test_state(model: Arc<ScriptedModel>) -> Arc<AppState> {
        let mut config = AppConfig::default();
        config.audit.step_delay_ms = 0;
        let gateway = gateway_with(model);
        let dashboard = Dashboard::from_panels(
            AnalyticsPanel::with_source(gateway.clone(), &config, Arc::new(FixedTrend(3))),
            VisualsPanel::new(gateway.clone(), &config),
            ExtractionPanel::new(gateway.clone()),
            AuditPanel::new(gateway, &config),
        );
        Arc::new(AppState { dashboard: Arc::new(dashboard), config })
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_redirects_to_active_section() {
        let app = create_router(test_state(Arc::new(ScriptedModel::new())));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/section/analytics");
    }

    #[tokio::test]
    async fn test_section_page_navigates() {
        let state = test_state(Arc::new(ScriptedModel::new()));
        let app = create_router(state.clone());
        let response = app
            .oneshot(Request::builder().uri("/section/visuals").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("AetherVisuals Lab"));
        assert_eq!(state.dashboard.active().await, AppSection::AssetGen);
    }

    #[tokio::test]
    async fn test_unknown_section_is_not_found() {
        let app = create_router(test_state(Arc::new(ScriptedModel::new())));
        let response = app
            .oneshot(Request::builder().uri("/section/settings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_prompt_is_ignored() {
        let model = Arc::new(ScriptedModel::new());
        let app = create_router(test_state(model.clone()));
        let response = app
            .oneshot(json_request("POST", "/api/visuals/generate", serde_json::json!({ "prompt": "  " })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["phase"], "idle");
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_generate_then_export() {
        let model = Arc::new(ScriptedModel::new().reply(Ok(GenerateResponse {
            parts: vec![ContentPart::InlineData { mime_type: "image/png".to_string(), data: PNG_1X1.to_string() }],
        })));
        let app = create_router(test_state(model));

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/visuals/generate", serde_json::json!({ "prompt": "frost" })))
            .await
            .unwrap();
        let view = body_json(response).await;
        assert_eq!(view["phase"], "displaying");
        assert!(view["image"].as_str().unwrap().starts_with("data:image/png;base64,"));

        let response = app
            .oneshot(Request::builder().uri("/api/visuals/export").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.contains("aethersole_asset.png"));
    }

    #[tokio::test]
    async fn test_export_without_asset_is_not_found() {
        let app = create_router(test_state(Arc::new(ScriptedModel::new())));
        let response = app
            .oneshot(Request::builder().uri("/api/visuals/export").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_select_view() {
        let app = create_router(test_state(Arc::new(ScriptedModel::new())));
        let response = app
            .oneshot(json_request("POST", "/api/analytics/view", serde_json::json!({ "view": "table" })))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["view"], "table");
    }

    #[tokio::test]
    async fn test_extraction_api() {
        let model = Arc::new(ScriptedModel::new().reply_json(serde_json::json!([{
            "module": "Thermal Management Core",
            "description": "Fan logic",
            "submoduleItems": [{ "name": "Safety Shutoff", "description": "45C cutoff" }]
        }])));
        let app = create_router(test_state(model));

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/extraction", serde_json::json!({ "url": "docs.aetherlabs.tech" })))
            .await
            .unwrap();
        let state = body_json(response).await;
        assert_eq!(state["phase"], "displaying");
        assert_eq!(state["modules"][0]["submodules"]["Safety Shutoff"], "45C cutoff");

        let response = app
            .oneshot(json_request("POST", "/api/extraction", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_multipart_upload_queues_files() {
        let state = test_state(Arc::new(ScriptedModel::new()));
        let app = create_router(state.clone());

        let body = "--BOUNDARY\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"run.mp4\"\r\n\
            Content-Type: video/mp4\r\n\r\n\
            0123456789\r\n\
            --BOUNDARY--\r\n";
        let request = Request::builder()
            .method("POST")
            .uri("/api/audit/upload")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=BOUNDARY")
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let queued = body_json(response).await;
        assert_eq!(queued[0]["name"], "run.mp4");

        let queue = state.dashboard.audit.snapshot().await;
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.entries()[0].name, "run.mp4");
    }

    #[tokio::test]
    async fn test_upload_without_files_is_rejected() {
        let app = create_router(test_state(Arc::new(ScriptedModel::new())));
        let body = "--BOUNDARY\r\n\
            Content-Disposition: form-data; name=\"note\"\r\n\r\n\
            hello\r\n\
            --BOUNDARY--\r\n";
        let request = Request::builder()
            .method("POST")
            .uri("/api/audit/upload")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=BOUNDARY")
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    fn multipart_upload(uri: &str, file_name: &str, contents: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--BOUNDARY\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
             Content-Type: video/mp4\r\n\r\n",
            file_name
        )
        .into_bytes();
        body.extend_from_slice(contents);
        body.extend_from_slice(b"\r\n--BOUNDARY--\r\n");

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=BOUNDARY")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_five_megabyte_upload_is_accepted() {
        let state = test_state(Arc::new(ScriptedModel::new()));
        let app = create_router(state.clone());

        let footage = vec![0u8; 5 * 1024 * 1024];
        let response = app.oneshot(multipart_upload("/api/audit/upload", "run.mp4", &footage)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let queue = state.dashboard.audit.snapshot().await;
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.entries()[0].size, "5.00 MB");
    }

    #[tokio::test]
    async fn test_upload_over_limit_is_rejected() {
        let mut config = AppConfig::default();
        config.web.max_upload_mb = 1;
        let state = test_state(Arc::new(ScriptedModel::new()));
        let state = Arc::new(AppState { dashboard: state.dashboard.clone(), config });
        let app = create_router(state.clone());

        let footage = vec![0u8; 2 * 1024 * 1024];
        let response = app.oneshot(multipart_upload("/api/audit/upload", "run.mp4", &footage)).await.unwrap();
        assert!(response.status().is_client_error());
        assert!(state.dashboard.audit.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_api_calls_navigate_to_their_panel() {
        let model = Arc::new(ScriptedModel::new().reply_text("no image"));
        let state = test_state(model);
        let app = create_router(state.clone());

        app.clone()
            .oneshot(json_request("POST", "/api/visuals/generate", serde_json::json!({ "prompt": "frost" })))
            .await
            .unwrap();
        assert_eq!(state.dashboard.active().await, AppSection::AssetGen);

        app.oneshot(multipart_upload("/api/audit/upload", "run.mp4", b"0123"))
            .await
            .unwrap();
        assert_eq!(state.dashboard.active().await, AppSection::RdPipeline);
    }

    #[tokio::test]
    async fn test_generation_started_elsewhere_does_not_block_visuals_page() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let model = Arc::new(ScriptedModel::gated(gate.clone()).reply_text("no image"));
        let state = test_state(model.clone());

        let pending = {
            let state = state.clone();
            tokio::spawn(async move { state.dashboard.visuals.generate("glacier").await })
        };
        while model.call_count() == 0 {
            tokio::task::yield_now().await;
        }

        let app = create_router(state.clone());
        let response = app
            .oneshot(Request::builder().uri("/section/visuals").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        pending.await.unwrap();

        let html = body_text(response).await;
        assert!(!html.contains("http-equiv=\"refresh\""));
        assert!(!state.dashboard.visuals.snapshot().await.is_generating());
    }
}
