//! Synthesized offline responses.
//!
//! Pure builders: output depends only on the URL they are attached to.

use harbor_net::{Response, ResponseSource};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

pub const PLACEHOLDER_IMAGE_TEXT: &str = "Image not available";
pub const OFFLINE_ERROR: &str = "Offline";
pub const OFFLINE_MESSAGE: &str = "This content is not available offline";

const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="400" height="300" viewBox="0 0 400 300">
  <rect width="400" height="300" fill="#f0f0f0"/>
  <text x="200" y="150" text-anchor="middle" dominant-baseline="middle" font-family="sans-serif" font-size="18" fill="#999">Image not available</text>
</svg>"##;

const OFFLINE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Offline</title>
  <style>
    body { font-family: sans-serif; display: flex; align-items: center; justify-content: center; min-height: 100vh; margin: 0; background: #f7f7f7; color: #333; }
    .offline { text-align: center; padding: 2rem; }
    button { margin-top: 1rem; padding: 0.6rem 1.4rem; font-size: 1rem; cursor: pointer; }
  </style>
</head>
<body>
  <div class="offline">
    <h1>You're Offline</h1>
    <p>Check your internet connection and try again.</p>
    <button onclick="window.location.reload()">Retry</button>
  </div>
</body>
</html>"#;

/// JSON body returned for API requests that cannot be served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineEnvelope {
    pub error: String,
    pub message: String,
}

impl Default for OfflineEnvelope {
    fn default() -> Self {
        Self {
            error: OFFLINE_ERROR.to_string(),
            message: OFFLINE_MESSAGE.to_string(),
        }
    }
}

/// Placeholder SVG served for images that are neither online nor cached.
pub fn placeholder_image(url: &Url) -> Response {
    Response::with_content_type(url.clone(), StatusCode::OK, "image/svg+xml", PLACEHOLDER_SVG)
        .with_source(ResponseSource::Synthesized)
}

/// Self-contained offline page with a retry button.
pub fn offline_page(url: &Url) -> Response {
    Response::with_content_type(
        url.clone(),
        StatusCode::OK,
        "text/html; charset=utf-8",
        OFFLINE_HTML,
    )
    .with_source(ResponseSource::Synthesized)
}

/// 503 JSON error envelope.
pub fn offline_json(url: &Url) -> Response {
    // A two-string struct always serializes.
    let body = serde_json::to_vec(&OfflineEnvelope::default()).unwrap_or_default();
    Response::with_content_type(
        url.clone(),
        StatusCode::SERVICE_UNAVAILABLE,
        "application/json",
        body,
    )
    .with_source(ResponseSource::Synthesized)
}
