pub mod authorizer;

use std::str::FromStr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use hyper::Method;

use crate::config::RouteDefinition;
use crate::error::ConfigError;
use crate::utils::normalize_path;

/// System paths that are always public, regardless of configuration.
///
/// These are checked before any configured route and cannot be shadowed
/// by the route table.
pub const SYSTEM_PUBLIC_PATHS: &[&str] = &["/health", "/health/live", "/health/ready", "/metrics"];

/// Documentation UI prefix; sub-resources (assets, specs) match by prefix.
pub const DOCS_PATH_PREFIX: &str = "/docs";

/// One admission policy entry
#[derive(Debug, Clone)]
pub struct RouteRule {
    /// Owning backend service label, used for diagnostics and cache
    /// invalidation, never for forwarding decisions here
    pub service: String,

    /// Normalized path prefix
    pub path_prefix: String,

    /// Methods this rule covers
    pub methods: Vec<Method>,

    /// Whether a verified identity is required
    pub requires_auth: bool,

    /// Whether responses on this route may be cached
    pub cache_enabled: bool,
}

impl RouteRule {
    /// Whether this rule covers the given normalized path and method
    pub fn matches(&self, normalized_path: &str, method: &Method) -> bool {
        self.prefix_matches(normalized_path) && self.methods.contains(method)
    }

    /// Whether the rule's prefix covers the given normalized path.
    ///
    /// Plain string prefix over the normalized forms: "/api/users"
    /// covers "/api/users", "/api/users/42" and any longer path that
    /// starts with it.
    pub fn prefix_matches(&self, normalized_path: &str) -> bool {
        normalized_path.starts_with(self.path_prefix.as_str())
    }
}

/// Ordered collection of route rules plus the fixed system public paths
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Build a table from configuration, enforcing the rule invariants.
    ///
    /// Overlapping (prefix, method) pairs are legal and resolved by table
    /// order (first match wins), but they are an easy way to misconfigure
    /// auth requirements, so each overlap is logged at startup.
    pub fn from_definitions(definitions: &[RouteDefinition]) -> Result<Self, ConfigError> {
        let mut rules = Vec::with_capacity(definitions.len());

        for (i, def) in definitions.iter().enumerate() {
            if def.path_prefix.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "route {}: empty path prefix",
                    i
                )));
            }
            if def.path_prefix.contains('?') {
                return Err(ConfigError::ValidationError(format!(
                    "route {}: path prefix '{}' contains a query string",
                    i, def.path_prefix
                )));
            }
            if def.methods.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "route {}: empty method set for prefix '{}'",
                    i, def.path_prefix
                )));
            }

            let mut methods = Vec::with_capacity(def.methods.len());
            for name in &def.methods {
                let method = Method::from_str(name.trim().to_uppercase().as_str()).map_err(|_| {
                    ConfigError::ValidationError(format!(
                        "route {}: invalid HTTP method '{}'",
                        i, name
                    ))
                })?;
                if !methods.contains(&method) {
                    methods.push(method);
                }
            }

            rules.push(RouteRule {
                service: def.service.clone(),
                path_prefix: normalize_path(&def.path_prefix),
                methods,
                requires_auth: def.requires_auth,
                cache_enabled: def.cache_enabled,
            });
        }

        let table = Self { rules };
        table.warn_on_overlaps();
        Ok(table)
    }

    /// The rules in match order
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Find the first rule covering the given normalized path and method
    pub fn first_match(&self, normalized_path: &str, method: &Method) -> Option<&RouteRule> {
        self.rules.iter().find(|r| r.matches(normalized_path, method))
    }

    /// Whether the given normalized path is a system public path
    pub fn is_system_public(normalized_path: &str) -> bool {
        if SYSTEM_PUBLIC_PATHS.contains(&normalized_path) {
            return true;
        }

        normalized_path == DOCS_PATH_PREFIX
            || normalized_path.starts_with(&format!("{}/", DOCS_PATH_PREFIX))
    }

    fn warn_on_overlaps(&self) {
        for (i, earlier) in self.rules.iter().enumerate() {
            for later in self.rules.iter().skip(i + 1) {
                if earlier.path_prefix != later.path_prefix {
                    continue;
                }
                let shared: Vec<&Method> = earlier
                    .methods
                    .iter()
                    .filter(|m| later.methods.contains(m))
                    .collect();
                if !shared.is_empty() {
                    tracing::warn!(
                        prefix = %earlier.path_prefix,
                        methods = ?shared,
                        "overlapping route rules; the earlier rule wins for the shared methods"
                    );
                }
            }
        }
    }
}

/// Atomically replaceable route table snapshot.
///
/// Steady-state lookups are lock-free loads; a reload publishes a whole
/// new table in a single atomic swap, so in-flight requests keep reading
/// the snapshot they started with.
pub struct RouteTableHandle {
    inner: ArcSwap<RouteTable>,
}

impl RouteTableHandle {
    /// Create a handle around an initial table
    pub fn new(table: RouteTable) -> Self {
        Self {
            inner: ArcSwap::from_pointee(table),
        }
    }

    /// The current table snapshot
    pub fn snapshot(&self) -> Arc<RouteTable> {
        self.inner.load_full()
    }

    /// Replace the table for all subsequent lookups
    pub fn replace(&self, table: RouteTable) {
        self.inner.store(Arc::new(table));
        tracing::info!("route table replaced");
    }
}
