//! Engine configuration.
//!
//! One [`EngineConfig`] describes one deployed version: its cache names,
//! the request patterns it classifies, and the manifest it installs.

use std::path::Path;
use std::time::Duration;

use harbor_common::HarborError;
use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration for one engine version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Version tag embedded in every namespace name.
    pub version: String,

    /// Origin the manifest and fallback paths resolve against.
    pub origin: Url,

    /// Namespace name prefixes.
    pub static_prefix: String,
    pub dynamic_prefix: String,
    pub api_prefix: String,

    /// Path prefix of API endpoints.
    pub api_root: String,

    /// API prefixes whose responses are never cached.
    pub sensitive_prefixes: Vec<String>,

    /// Path prefixes that hold static assets.
    pub asset_roots: Vec<String>,

    /// Asset roots whose extension-less paths are images.
    pub image_roots: Vec<String>,

    /// File extensions treated as static assets.
    pub static_extensions: Vec<String>,

    /// Absolute paths fetched and cached at install.
    pub precache_manifest: Vec<String>,

    /// Cached document served to navigations with no exact match.
    pub root_document: String,

    /// Per-request network timeout in milliseconds.
    pub network_timeout_ms: Option<u64>,

    /// Tag that triggers the background sync hook.
    pub sync_tag: String,

    /// Icon shown on push notifications.
    pub notification_icon: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            origin: Url::parse("http://localhost:3000/").expect("static origin parses"),
            static_prefix: "static".to_string(),
            dynamic_prefix: "dynamic".to_string(),
            api_prefix: "api".to_string(),
            api_root: "/api/".to_string(),
            sensitive_prefixes: vec![
                "/api/auth".to_string(),
                "/api/admin".to_string(),
                "/api/private".to_string(),
            ],
            asset_roots: vec![
                "/css/".to_string(),
                "/js/".to_string(),
                "/images/".to_string(),
                "/fonts/".to_string(),
                "/icons/".to_string(),
            ],
            image_roots: vec!["/images/".to_string(), "/icons/".to_string()],
            static_extensions: [
                "css", "js", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "woff", "woff2",
                "ttf", "eot", "otf",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            precache_manifest: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/css/style.css".to_string(),
                "/js/app.js".to_string(),
                "/manifest.json".to_string(),
            ],
            root_document: "/".to_string(),
            network_timeout_ms: Some(30_000),
            sync_tag: "background-sync".to_string(),
            notification_icon: Some("/icons/icon-192.png".to_string()),
        }
    }
}

impl EngineConfig {
    /// Default configuration for a version and origin.
    pub fn for_version(version: impl Into<String>, origin: Url) -> Self {
        Self {
            version: version.into(),
            origin,
            ..Default::default()
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> harbor_common::Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| HarborError::config_with_source("invalid engine config JSON", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> harbor_common::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            HarborError::config_with_source(format!("cannot read {}", path.display()), e)
        })?;
        Self::from_json_str(&json)
    }

    /// Check the invariants the engine relies on.
    pub fn validate(&self) -> harbor_common::Result<()> {
        if self.version.trim().is_empty() {
            return Err(HarborError::config("version must not be empty"));
        }

        let prefixes = [&self.static_prefix, &self.dynamic_prefix, &self.api_prefix];
        for (i, a) in prefixes.iter().enumerate() {
            if a.is_empty() {
                return Err(HarborError::config("namespace prefixes must not be empty"));
            }
            if prefixes[i + 1..].contains(a) {
                return Err(HarborError::config(format!(
                    "namespace prefix {a:?} is used twice"
                )));
            }
        }

        let paths = std::iter::once(&self.api_root)
            .chain(std::iter::once(&self.root_document))
            .chain(&self.sensitive_prefixes)
            .chain(&self.asset_roots)
            .chain(&self.precache_manifest);
        for path in paths {
            if !path.starts_with('/') {
                return Err(HarborError::config(format!(
                    "path {path:?} must be absolute"
                )));
            }
        }

        Ok(())
    }

    /// Network timeout, if one is configured.
    pub fn network_timeout(&self) -> Option<Duration> {
        self.network_timeout_ms.map(Duration::from_millis)
    }

    /// Resolve an absolute path against the origin.
    pub fn resolve(&self, path: &str) -> Result<Url, url::ParseError> {
        self.origin.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.network_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{"version": "v7", "origin": "https://shop.example/"}"#,
        )
        .unwrap();
        assert_eq!(config.version, "v7");
        assert_eq!(config.api_root, "/api/");
        assert_eq!(
            config.resolve("/css/style.css").unwrap().as_str(),
            "https://shop.example/css/style.css"
        );
    }

    #[test]
    fn test_rejects_relative_manifest_path() {
        let err = EngineConfig::from_json_str(r#"{"precache_manifest": ["css/style.css"]}"#)
            .unwrap_err();
        assert!(matches!(err, HarborError::Config { .. }));
    }

    #[test]
    fn test_rejects_duplicate_prefix() {
        let config = EngineConfig {
            api_prefix: "static".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_version() {
        let config = EngineConfig {
            version: " ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"version": "v2", "network_timeout_ms": null}}"#).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.version, "v2");
        assert_eq!(config.network_timeout(), None);
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, HarborError::Config { .. }));
    }
}
