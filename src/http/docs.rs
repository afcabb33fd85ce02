//! API documentation surface.
//!
//! # Responsibilities
//! - Serve OpenAPI documents from a local directory under `/openapi/`
//! - Serve a standalone Swagger UI page at `/swagger-ui`
//!
//! # Design Decisions
//! - Mounted next to `/healthz`, outside the rate limiter and the envelope
//! - The document list is fixed at startup, from config or a directory scan
//! - The UI assets load from the public `swagger-ui-dist` CDN

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::services::ServeDir;

use crate::config::DocsConfig;

pub const OPENAPI_PREFIX: &str = "/openapi";

const SWAGGER_UI_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>__TITLE__</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
        .swagger-ui .topbar { background-color: #1a1a1a; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                urls: __URLS__,
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                plugins: [SwaggerUIBundle.plugins.DownloadUrl],
                layout: "StandaloneLayout",
                persistAuthorization: true,
                filter: true,
                tryItOutEnabled: true,
                displayRequestDuration: true,
                servers: [{ url: __SERVER__, description: 'Gateway Server' }]
            });
        };
    </script>
</body>
</html>
"#;

/// One document offered by the UI picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentLink {
    pub url: String,
    pub name: String,
}

struct DocsPage {
    title: String,
    documents: Vec<DocumentLink>,
}

/// Build the `/openapi/` file service and the `/swagger-ui` page.
pub fn docs_router(config: &DocsConfig) -> Router {
    let dir = Path::new(&config.openapi_dir);
    let documents = if config.documents.is_empty() {
        discover_documents(dir)
    } else {
        config
            .documents
            .iter()
            .map(|document| DocumentLink {
                url: document.url.clone(),
                name: document.name.clone(),
            })
            .collect()
    };

    if !dir.is_dir() {
        tracing::warn!(openapi_dir = %config.openapi_dir, "OpenAPI directory not found");
    }
    tracing::info!(openapi_dir = %config.openapi_dir, documents = documents.len(), "Serving API documentation");

    let page = Arc::new(DocsPage {
        title: config.title.clone(),
        documents,
    });

    Router::new()
        .route("/swagger-ui", get(swagger_ui))
        .route("/swagger-ui/", get(swagger_ui))
        .with_state(page)
        .nest_service(OPENAPI_PREFIX, ServeDir::new(dir))
}

/// List every `.json`, `.yaml` and `.yml` document below `dir`, sorted by URL.
pub fn discover_documents(dir: &Path) -> Vec<DocumentLink> {
    let mut found = Vec::new();
    collect(dir, dir, &mut found);
    found.sort_by(|a, b| a.url.cmp(&b.url));
    found
}

fn collect(root: &Path, dir: &Path, found: &mut Vec<DocumentLink>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect(root, &path, found);
            continue;
        }

        if !matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("json" | "yaml" | "yml")
        ) {
            continue;
        }
        let (Ok(relative), Some(stem)) = (
            path.strip_prefix(root),
            path.file_stem().and_then(|s| s.to_str()),
        ) else {
            continue;
        };

        let segments: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        found.push(DocumentLink {
            url: format!("{}/{}", OPENAPI_PREFIX, segments.join("/")),
            name: stem.trim_end_matches(".swagger").to_string(),
        });
    }
}

async fn swagger_ui(State(page): State<Arc<DocsPage>>, headers: HeaderMap) -> impl IntoResponse {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    let html = render(&page, &format!("{}://{}", scheme, host));
    (
        [(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        )],
        Html(html),
    )
}

fn render(page: &DocsPage, server_url: &str) -> String {
    SWAGGER_UI_TEMPLATE
        .replace("__TITLE__", &escape_html(&page.title))
        .replace("__URLS__", &script_json(&page.documents))
        .replace("__SERVER__", &script_json(&server_url))
}

/// JSON literal safe to embed in a `<script>` block.
fn script_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace("</", "<\\/")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocumentConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn openapi_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("user/v1")).unwrap();
        std::fs::write(
            dir.path().join("user/v1/user.swagger.json"),
            r#"{"swagger":"2.0","info":{"title":"Merchant API"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("product.yaml"), "openapi: 3.0.0\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "notes").unwrap();
        dir
    }

    fn config(dir: &Path) -> DocsConfig {
        DocsConfig {
            enabled: true,
            openapi_dir: dir.to_string_lossy().into_owned(),
            ..DocsConfig::default()
        }
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_discover_documents() {
        let dir = openapi_dir();
        assert_eq!(
            discover_documents(dir.path()),
            vec![
                DocumentLink {
                    url: "/openapi/product.yaml".into(),
                    name: "product".into(),
                },
                DocumentLink {
                    url: "/openapi/user/v1/user.swagger.json".into(),
                    name: "user".into(),
                },
            ]
        );
        assert!(discover_documents(&dir.path().join("missing")).is_empty());
    }

    #[tokio::test]
    async fn test_serves_documents() {
        let dir = openapi_dir();
        let response = docs_router(&config(dir.path()))
            .oneshot(
                Request::get("/openapi/user/v1/user.swagger.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert!(body_text(response).await.contains("Merchant API"));
    }

    #[tokio::test]
    async fn test_missing_document_is_404() {
        let dir = openapi_dir();
        let response = docs_router(&config(dir.path()))
            .oneshot(Request::get("/openapi/nope.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_swagger_ui_page() {
        let dir = openapi_dir();
        let mut config = config(dir.path());
        config.title = "Merchant <Docs>".into();
        config.documents = vec![DocumentConfig {
            url: "/openapi/user/v1/user.swagger.json".into(),
            name: "Merchant API".into(),
        }];

        let response = docs_router(&config)
            .oneshot(
                Request::get("/swagger-ui")
                    .header(header::HOST, "gw.internal:8081")
                    .header("x-forwarded-proto", "https")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html"));
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "no-cache, no-store, must-revalidate"
        );

        let html = body_text(response).await;
        assert!(html.contains("<title>Merchant &lt;Docs&gt;</title>"));
        assert!(html.contains(r#"{"url":"/openapi/user/v1/user.swagger.json","name":"Merchant API"}"#));
        assert!(html.contains(r#""https://gw.internal:8081""#));
        assert!(!html.contains("product.yaml"));
    }

    #[test]
    fn test_script_json_cannot_close_the_script() {
        assert_eq!(script_json("</script>"), r#""<\/script>""#);
    }
}
