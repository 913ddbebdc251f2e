//! Versioned cache namespaces.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

/// What a namespace holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CachePurpose {
    /// Precached and cache-first assets.
    Static,
    /// Pass-through pages and resources.
    Dynamic,
    /// API responses.
    Api,
}

impl fmt::Display for CachePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CachePurpose::Static => write!(f, "static"),
            CachePurpose::Dynamic => write!(f, "dynamic"),
            CachePurpose::Api => write!(f, "api"),
        }
    }
}

/// A named, versioned cache partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheNamespace {
    pub name: String,
    pub purpose: CachePurpose,
}

impl CacheNamespace {
    pub fn new(prefix: &str, version: &str, purpose: CachePurpose) -> Self {
        Self {
            name: format!("{prefix}-{version}"),
            purpose,
        }
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The three current namespaces of one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceSet {
    pub version: String,
    pub static_assets: CacheNamespace,
    pub dynamic: CacheNamespace,
    pub api: CacheNamespace,
}

impl NamespaceSet {
    pub fn from_config(config: &EngineConfig) -> Self {
        let version = config.version.as_str();
        Self {
            version: version.to_string(),
            static_assets: CacheNamespace::new(
                &config.static_prefix,
                version,
                CachePurpose::Static,
            ),
            dynamic: CacheNamespace::new(&config.dynamic_prefix, version, CachePurpose::Dynamic),
            api: CacheNamespace::new(&config.api_prefix, version, CachePurpose::Api),
        }
    }

    /// Namespace for a purpose.
    pub fn get(&self, purpose: CachePurpose) -> &CacheNamespace {
        match purpose {
            CachePurpose::Static => &self.static_assets,
            CachePurpose::Dynamic => &self.dynamic,
            CachePurpose::Api => &self.api,
        }
    }

    /// All namespaces in lookup order.
    pub fn all(&self) -> [&CacheNamespace; 3] {
        [&self.static_assets, &self.dynamic, &self.api]
    }

    /// Names that survive activation of this version.
    pub fn allow_list(&self) -> Vec<String> {
        self.all().iter().map(|ns| ns.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_embed_version() {
        let config = EngineConfig {
            version: "v3".to_string(),
            ..Default::default()
        };
        let set = NamespaceSet::from_config(&config);

        assert_eq!(set.static_assets.name, "static-v3");
        assert_eq!(set.get(CachePurpose::Dynamic).name, "dynamic-v3");
        assert_eq!(set.get(CachePurpose::Api).purpose, CachePurpose::Api);
        assert_eq!(set.allow_list(), vec!["static-v3", "dynamic-v3", "api-v3"]);
    }
}
