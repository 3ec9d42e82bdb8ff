use serde::{Deserialize, Serialize};

/// Where a configuration lookup was served from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    /// A live cache entry
    Cache,
    /// A fresh fetch from the Apollo Config Service
    Apollo,
}

/// Result of a `getApolloConfig` invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigLookup {
    pub source: ConfigSource,
    pub data: serde_json::Value,
}

impl ConfigLookup {
    pub fn cached(data: serde_json::Value) -> Self {
        Self {
            source: ConfigSource::Cache,
            data,
        }
    }

    pub fn fetched(data: serde_json::Value) -> Self {
        Self {
            source: ConfigSource::Apollo,
            data,
        }
    }
}

/// Coordinates of one Apollo configuration resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigCoordinates {
    pub app_id: String,
    pub cluster: String,
    pub namespace: String,
}

impl ConfigCoordinates {
    pub fn new(
        app_id: impl Into<String>,
        cluster: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            cluster: cluster.into(),
            namespace: namespace.into(),
        }
    }

    /// Stable cache key for these coordinates
    pub fn cache_key(&self) -> CacheKey {
        CacheKey(format!("{}::{}::{}", self.app_id, self.cluster, self.namespace))
    }
}

impl std::fmt::Display for ConfigCoordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.app_id, self.cluster, self.namespace)
    }
}

/// Key identifying one cached configuration resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(pub String);

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_stable() {
        let coords = ConfigCoordinates::new("app", "default", "application");
        assert_eq!(coords.cache_key(), CacheKey("app::default::application".to_string()));
        assert_eq!(coords.cache_key(), coords.clone().cache_key());
    }

    #[test]
    fn test_lookup_serializes_source_lowercase() {
        let lookup = ConfigLookup::cached(serde_json::json!({"k": "v"}));
        let value = serde_json::to_value(&lookup).unwrap();
        assert_eq!(value["source"], "cache");
        assert_eq!(value["data"]["k"], "v");

        let lookup = ConfigLookup::fetched(serde_json::Value::Null);
        assert_eq!(serde_json::to_value(&lookup).unwrap()["source"], "apollo");
    }
}
