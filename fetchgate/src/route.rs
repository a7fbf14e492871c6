//! Route matching: which URLs are cacheable, and for how long.

use std::time::Duration;

use regex::Regex;

use crate::error::ConfigError;

/// Pattern of the pipeline experiments API served by the default rule set.
pub const EXPERIMENTS_PATTERN: &str =
    "/api/service/pipelines/[^/]+/dspa/apis/v2beta1/experiments/[^?].*";

/// Freshness window of the default rule set.
pub const EXPERIMENTS_MAX_AGE: Duration = Duration::from_secs(60);

/// A cacheable route: a URL pattern and the freshness window of its entries.
///
/// The pattern is searched anywhere in the absolute URL, like an unanchored
/// regular expression. Anchor it with `^`/`$` to restrict that.
#[derive(Debug, Clone)]
pub struct RouteRule {
    matcher: Regex,
    max_age: Duration,
}

impl RouteRule {
    /// Compiles a rule. A `max_age` of zero is legal: matching requests are
    /// still coalesced but never served from the cache.
    pub fn new(pattern: &str, max_age: Duration) -> Result<Self, ConfigError> {
        let matcher = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.to_owned(),
            source,
        })?;
        Ok(Self { matcher, max_age })
    }

    /// Returns `true` if `url` falls under this rule.
    pub fn matches(&self, url: &str) -> bool {
        self.matcher.is_match(url)
    }

    /// The source pattern.
    pub fn pattern(&self) -> &str {
        self.matcher.as_str()
    }

    /// How long an entry stays fresh.
    pub fn max_age(&self) -> Duration {
        self.max_age
    }
}

/// Ordered list of [`RouteRule`]s. The first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Creates a table from rules in priority order.
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// The rules shipped by default: the pipeline experiments API, fresh for
    /// 60 seconds.
    pub fn default_rules() -> Self {
        RouteRule::new(EXPERIMENTS_PATTERN, EXPERIMENTS_MAX_AGE)
            .into_iter()
            .collect()
    }

    /// Appends a rule with the lowest priority.
    pub fn push(&mut self, rule: RouteRule) {
        self.rules.push(rule);
    }

    /// Returns the first rule matching `url`, or `None` when the request is
    /// not cacheable.
    pub fn classify(&self, url: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| rule.matches(url))
    }

    /// The rules in priority order.
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Returns `true` if no rule is configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<RouteRule> for RouteTable {
    fn from_iter<I: IntoIterator<Item = RouteRule>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
