//! YAML configuration.
//!
//! ```yaml
//! routes:
//!   - matcher: "/api/service/pipelines/[^/]+/dspa/apis/v2beta1/experiments/[^?].*"
//!     max_age: 60s
//! unobserved: Continue
//! store:
//!   label: api-cache
//!   max_entries: 1000
//! ```
//!
//! Durations use the humantime format (`500ms`, `60s`, `5m`). When `routes`
//! is omitted the default rule set applies; `routes: []` caches nothing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coalesce::UnobservedFetch;
use crate::error::ConfigError;
use crate::intercept::InterceptorBuilder;
use crate::route::{EXPERIMENTS_MAX_AGE, EXPERIMENTS_PATTERN, RouteRule, RouteTable};

/// Default store label.
pub const DEFAULT_STORE_LABEL: &str = "api-cache";

/// Default entry capacity when neither `max_entries` nor `max_bytes` is set.
pub const DEFAULT_MAX_ENTRIES: u64 = 1_000;

/// One cacheable route.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct RouteConfig {
    /// Regular expression searched in the request URL.
    pub matcher: String,
    /// Freshness window (e.g., "60s", "500ms", "0s").
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,
}

impl RouteConfig {
    /// Compiles the rule.
    pub fn to_rule(&self) -> Result<RouteRule, ConfigError> {
        RouteRule::new(&self.matcher, self.max_age)
    }
}

/// Session store settings.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct StoreConfig {
    /// Label used in logs and metrics.
    #[serde(default = "default_label")]
    pub label: String,
    /// Maximum number of entries.
    #[serde(default)]
    pub max_entries: Option<u64>,
    /// Maximum approximate memory in bytes. Exclusive with `max_entries`.
    #[serde(default)]
    pub max_bytes: Option<u64>,
    /// Evict entries untouched for this long (e.g., "10m").
    #[serde(default, with = "humantime_serde")]
    pub time_to_idle: Option<Duration>,
}

fn default_label() -> String {
    DEFAULT_STORE_LABEL.to_owned()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            label: default_label(),
            max_entries: None,
            max_bytes: None,
            time_to_idle: None,
        }
    }
}

impl StoreConfig {
    /// Builds the in-memory Moka store described by this section.
    #[cfg(feature = "moka")]
    #[cfg_attr(docsrs, doc(cfg(feature = "moka")))]
    pub fn into_store(self) -> Result<fetchgate_moka::MokaStore, ConfigError> {
        use fetchgate_moka::MokaStore;

        let builder = MokaStore::builder().label(self.label);
        let builder = match self.time_to_idle {
            Some(idle) => builder.time_to_idle(idle),
            None => builder,
        };
        match (self.max_entries, self.max_bytes) {
            (Some(_), Some(_)) => Err(ConfigError::Invalid(
                "store: set either `max_entries` or `max_bytes`, not both".to_owned(),
            )),
            (None, Some(bytes)) => Ok(builder.max_bytes(bytes).build()),
            (entries, None) => Ok(builder
                .max_entries(entries.unwrap_or(DEFAULT_MAX_ENTRIES))
                .build()),
        }
    }
}

/// Interceptor configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Config {
    /// Cacheable routes in priority order.
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteConfig>,
    /// What to do with a fetch whose callers all cancelled.
    #[serde(default)]
    pub unobserved: UnobservedFetch,
    /// Session store settings.
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_routes() -> Vec<RouteConfig> {
    vec![RouteConfig {
        matcher: EXPERIMENTS_PATTERN.to_owned(),
        max_age: EXPERIMENTS_MAX_AGE,
    }]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            routes: default_routes(),
            unobserved: UnobservedFetch::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    /// Parses a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_saphyr::from_str(yaml).map_err(|error| ConfigError::Parse(error.to_string()))
    }

    /// Compiles the route table.
    pub fn routes(&self) -> Result<RouteTable, ConfigError> {
        self.routes.iter().map(RouteConfig::to_rule).collect()
    }

    /// Applies the routes and the unobserved fetch policy to `builder`.
    pub fn configure<F, S, C>(
        &self,
        builder: InterceptorBuilder<F, S, C>,
    ) -> Result<InterceptorBuilder<F, S, C>, ConfigError> {
        Ok(builder.routes(self.routes()?).unobserved(self.unobserved))
    }
}
