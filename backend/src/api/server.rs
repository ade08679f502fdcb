//! HTTP Server for the Catalog Buddy API.
//!
//! Provides REST endpoints for template listing and catalog transformation.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                          |
//! |--------|-------------------|--------------------------------------|
//! | GET    | `/health`         | Health check                         |
//! | GET    | `/templates`      | List available templates             |
//! | POST   | `/transform`      | Transform an upload (CSV or preview) |
//! | GET    | `/api/logs`       | SSE stream for real-time logs        |

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{error_response, parse_flag, TemplateListResponse};
use crate::config::AppConfig;
use crate::error::{ServerError, ServerResult};
use crate::models::{ProductValuePolicy, VariantColumns};
use crate::registry::{TemplateRegistry, TemplateStore};
use crate::transform::pipeline::{prepare, TransformRequest};

/// Shared, read-only state of the server.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TemplateStore>,
    pub variants: Arc<VariantColumns>,
    pub preview_rows: usize,
}

impl AppState {
    pub fn new(store: impl TemplateStore + 'static, preview_rows: usize) -> Self {
        Self {
            store: Arc::new(store),
            variants: Arc::new(VariantColumns::default()),
            preview_rows,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::Pipeline(_) | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log_error(format!("Transform error: {}", self));
        }
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

/// Build the application router.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    // Permissive CORS for development
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/templates", get(list_templates))
        .route("/transform", post(transform))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = TemplateRegistry::with_dir(&config.templates_dir);
    let state = AppState::new(registry, config.preview_rows);
    let app = build_router(state, config.max_upload_bytes());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    println!("🚀 Catalog Buddy server running on http://localhost:{}", config.port);
    println!("   GET  /templates  - List templates");
    println!("   POST /transform  - Transform a catalog upload");
    println!("   GET  /api/logs   - SSE log stream");
    println!("   GET  /health     - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "catalog-buddy",
        "version": env!("CARGO_PKG_VERSION"),
        "templates": state.store.list().len(),
        "endpoints": {
            "templates": "GET /templates",
            "transform": "POST /transform",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn list_templates(State(state): State<AppState>) -> Json<TemplateListResponse> {
    Json(TemplateListResponse::new(state.store.list()))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Multipart form of `POST /transform`.
#[derive(Debug, Default)]
struct TransformForm {
    file: Option<Vec<u8>>,
    file_name: Option<String>,
    template_key: Option<String>,
    mapping: Option<String>,
    text_cleanup: Option<String>,
    filename: Option<String>,
    preview: Option<String>,
    policy: Option<String>,
}

impl TransformForm {
    async fn read(multipart: &mut Multipart) -> ServerResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();

            if name == "file" {
                form.file_name = field.file_name().map(|s| s.to_string());
                form.file = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?
                        .to_vec(),
                );
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            match name.as_str() {
                "templateKey" => form.template_key = Some(value),
                "mapping" => form.mapping = Some(value),
                "textCleanup" => form.text_cleanup = Some(value),
                "filename" => form.filename = Some(value),
                "preview" => form.preview = Some(value),
                "productValuePolicy" => form.policy = Some(value),
                _ => {}
            }
        }

        Ok(form)
    }

    fn into_request(self) -> ServerResult<(TransformRequest, Option<String>)> {
        let file = self
            .file
            .ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;
        let policy = self
            .policy
            .as_deref()
            .unwrap_or("")
            .parse::<ProductValuePolicy>()
            .map_err(ServerError::BadRequest)?;

        let request = TransformRequest {
            file,
            template_key: self.template_key.unwrap_or_default(),
            mapping: self.mapping.unwrap_or_else(|| "{}".to_string()),
            text_cleanup: self.text_cleanup.unwrap_or_default(),
            filename: self.filename,
            preview: parse_flag(self.preview.as_deref()),
            policy,
        };
        Ok((request, self.file_name))
    }
}

/// Transform endpoint: preview JSON or streamed CSV download
async fn transform(State(state): State<AppState>, mut multipart: Multipart) -> ServerResult<Response> {
    let (request, upload_name) = TransformForm::read(&mut multipart).await?.into_request()?;
    let preview = request.preview;

    log_info(format!(
        "📄 {} upload: {} ({} bytes) → {}",
        if preview { "Preview" } else { "Export" },
        upload_name.as_deref().unwrap_or("unknown"),
        request.file.len(),
        request.template_key
    ));

    let store = Arc::clone(&state.store);
    let variants = Arc::clone(&state.variants);
    let run = tokio::task::spawn_blocking(move || prepare(request, store.as_ref(), &variants))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    if preview {
        let limit = state.preview_rows;
        let body = tokio::task::spawn_blocking(move || run.preview(limit))
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        return Ok(Json(body).into_response());
    }

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", run.filename))
        .map_err(|e| ServerError::BadRequest(format!("Invalid filename: {}", e)))?;
    let body = Body::from_stream(futures::stream::iter(run.stream()));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExportRules, Field, Template};
    use crate::transform::encoder::UTF8_BOM;
    use axum::body::to_bytes;
    use axum::http::Request;
    use tower::ServiceExt;

    const BOUNDARY: &str = "catalogbuddyboundary";

    const PRODUCTS: &str = "Handle,Title,Variant SKU,Image Src,Image Position\n\
        A,T1,S1,img1.png,1\n\
        A,,S2,img2.png,2\n\
        A,,,img3.png,3\n";

    fn app() -> Router {
        let template = Template::new(
            "noon",
            vec![
                Field::text("name", "Name"),
                Field::text("sku", "SKU"),
                Field::image("img1", "Image 1", 1),
                Field::image("img2", "Image 2", 2),
            ],
        )
        .with_export_rules(ExportRules::require("sku"));
        let state = AppState::new(TemplateRegistry::from_templates([template]), 10);
        build_router(state, 1024 * 1024)
    }

    fn multipart(fields: &[(&str, &str)], file: Option<&str>) -> Request<Body> {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            ));
        }
        if let Some(content) = file {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"products.csv\"\r\n\
                 Content-Type: text/csv\r\n\r\n{}\r\n",
                BOUNDARY, content
            ));
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));

        Request::builder()
            .method("POST")
            .uri("/transform")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    const MAPPING: &str = r#"{"name": "Title", "sku": "Variant SKU"}"#;

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["templates"], 1);
    }

    #[tokio::test]
    async fn test_list_templates() {
        let response = app()
            .oneshot(Request::get("/templates").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["templates"][0]["templateKey"], "noon");
        assert_eq!(body["templates"][0]["fields"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_preview() {
        let request = multipart(
            &[("templateKey", "noon"), ("mapping", MAPPING), ("preview", "TRUE")],
            Some(PRODUCTS),
        );
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["templateKey"], "noon");
        assert_eq!(body["totalRows"], 2);
        assert_eq!(body["headers"], json!(["Name", "SKU", "Image 1", "Image 2"]));
        assert_eq!(body["rows"][1], json!(["T1", "S2", "img1.png", "img2.png"]));
    }

    #[tokio::test]
    async fn test_stream_export() {
        let request = multipart(
            &[
                ("templateKey", "noon"),
                ("mapping", MAPPING),
                ("filename", "noon_upload.csv"),
            ],
            Some(PRODUCTS),
        );
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"noon_upload.csv\""
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = std::str::from_utf8(&bytes[UTF8_BOM.len()..]).unwrap();
        assert_eq!(
            text,
            "Name,SKU,Image 1,Image 2\r\nT1,S1,img1.png,img2.png\r\nT1,S2,img1.png,img2.png\r\n"
        );
    }

    #[tokio::test]
    async fn test_default_filename() {
        let request = multipart(&[("templateKey", "noon"), ("mapping", MAPPING)], Some(PRODUCTS));
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"catalog_export.csv\""
        );
    }

    #[tokio::test]
    async fn test_unknown_template_is_400() {
        let request = multipart(&[("templateKey", "etsy"), ("mapping", MAPPING)], Some(PRODUCTS));
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "Unknown templateKey: etsy");
    }

    #[tokio::test]
    async fn test_invalid_mapping_is_400() {
        let request = multipart(&[("templateKey", "noon"), ("mapping", "{oops")], Some(PRODUCTS));
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("Invalid mapping JSON"));
    }

    #[tokio::test]
    async fn test_missing_file_is_400() {
        let request = multipart(&[("templateKey", "noon")], None);
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid request: No file provided");
    }

    #[tokio::test]
    async fn test_bad_policy_is_400() {
        let request = multipart(
            &[("templateKey", "noon"), ("mapping", MAPPING), ("productValuePolicy", "mixed")],
            Some(PRODUCTS),
        );
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
