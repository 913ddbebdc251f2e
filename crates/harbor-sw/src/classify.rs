//! Request classification.
//!
//! First match wins: API root, static asset, navigation, dynamic.

use std::fmt;
use std::sync::Arc;

use harbor_net::Request;
use http::Method;
use tracing::trace;

use crate::config::EngineConfig;

/// Which strategy serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    StaticAsset,
    ApiEndpoint,
    Navigation,
    Dynamic,
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestClass::StaticAsset => write!(f, "static-asset"),
            RequestClass::ApiEndpoint => write!(f, "api-endpoint"),
            RequestClass::Navigation => write!(f, "navigation"),
            RequestClass::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// Maps requests to a [`RequestClass`] using one version's configuration.
#[derive(Debug, Clone)]
pub struct Classifier {
    config: Arc<EngineConfig>,
}

impl Classifier {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    /// Only GET requests go through the engine.
    pub fn should_intercept(&self, request: &Request) -> bool {
        request.method == Method::GET
    }

    /// Classify a request. Total over all inputs.
    pub fn classify(&self, request: &Request) -> RequestClass {
        let path = request.url.path();

        let class = if path.starts_with(&self.config.api_root) {
            RequestClass::ApiEndpoint
        } else if self.is_static_asset(path) {
            RequestClass::StaticAsset
        } else if request.is_navigation() {
            RequestClass::Navigation
        } else {
            RequestClass::Dynamic
        };

        trace!(url = %request.url, %class, "Classified request");
        class
    }

    /// Extension in the static list or path under an asset root.
    pub fn is_static_asset(&self, path: &str) -> bool {
        let by_extension = extension(path).is_some_and(|ext| {
            self.config
                .static_extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        });

        by_extension
            || self
                .config
                .asset_roots
                .iter()
                .any(|root| path.starts_with(root.as_str()))
    }

    /// Whether the path names an image resource: an image extension, or no
    /// recognised extension under an image root.
    pub fn is_image(&self, path: &str) -> bool {
        match mime_guess::from_path(path).first() {
            Some(m) => m.type_() == mime::IMAGE,
            None => self
                .config
                .image_roots
                .iter()
                .any(|root| path.starts_with(root.as_str())),
        }
    }

    /// API paths whose responses must never be cached.
    pub fn is_sensitive(&self, path: &str) -> bool {
        self.config
            .sensitive_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Extension of the last path segment, if any.
fn extension(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use harbor_net::Url;

    fn classifier() -> Classifier {
        Classifier::new(Arc::new(EngineConfig::default()))
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    fn nav(url: &str) -> Request {
        Request::navigate(Url::parse(url).unwrap())
    }

    #[test]
    fn test_api_wins_over_extension() {
        let c = classifier();
        assert_eq!(
            c.classify(&get("https://example.com/api/export.js")),
            RequestClass::ApiEndpoint
        );
        assert_eq!(
            c.classify(&nav("https://example.com/api/items")),
            RequestClass::ApiEndpoint
        );
    }

    #[test]
    fn test_static_by_extension_and_root() {
        let c = classifier();
        for url in [
            "https://example.com/style.css",
            "https://example.com/bundle.JS",
            "https://example.com/photos/cat.webp",
            "https://example.com/fonts/inter",
            "https://example.com/images/banner",
        ] {
            assert_eq!(c.classify(&get(url)), RequestClass::StaticAsset, "{url}");
        }
    }

    #[test]
    fn test_static_wins_over_navigation() {
        let c = classifier();
        assert_eq!(
            c.classify(&nav("https://example.com/css/print.css")),
            RequestClass::StaticAsset
        );
    }

    #[test]
    fn test_navigation_and_dynamic() {
        let c = classifier();
        assert_eq!(
            c.classify(&nav("https://example.com/products/42")),
            RequestClass::Navigation
        );
        assert_eq!(
            c.classify(&get("https://example.com/products/42")),
            RequestClass::Dynamic
        );
        assert_eq!(
            c.classify(&get("https://example.com/feed.xml")),
            RequestClass::Dynamic
        );
    }

    #[test]
    fn test_query_string_is_ignored() {
        let c = classifier();
        assert_eq!(
            c.classify(&get("https://example.com/app.js?v=123")),
            RequestClass::StaticAsset
        );
    }

    #[test]
    fn test_should_intercept_only_get() {
        let c = classifier();
        let url = Url::parse("https://example.com/api/items").unwrap();
        assert!(c.should_intercept(&Request::get(url.clone())));
        assert!(!c.should_intercept(&Request::post(url, Bytes::new())));
    }

    #[test]
    fn test_is_image() {
        let c = classifier();
        assert!(c.is_image("/images/logo.png"));
        assert!(c.is_image("/icons/favicon.ico"));
        assert!(c.is_image("/img/diagram.svg"));
        assert!(!c.is_image("/css/style.css"));
        assert!(!c.is_image("/fonts/inter.woff2"));
    }

    #[test]
    fn test_extensionless_image_roots() {
        let c = classifier();
        assert!(c.is_image("/images/banner"));
        assert!(c.is_image("/icons/cart"));
        assert!(!c.is_image("/images/credits.txt"));
        assert!(!c.is_image("/fonts/inter"));
        assert!(!c.is_image("/products/7"));
    }

    #[test]
    fn test_is_sensitive() {
        let c = classifier();
        assert!(c.is_sensitive("/api/auth/login"));
        assert!(c.is_sensitive("/api/admin"));
        assert!(c.is_sensitive("/api/private/notes"));
        assert!(!c.is_sensitive("/api/products"));
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("/a/b.css"), Some("css"));
        assert_eq!(extension("/a/.hidden"), None);
        assert_eq!(extension("/a/b."), None);
        assert_eq!(extension("/a.dir/b"), None);
    }
}
