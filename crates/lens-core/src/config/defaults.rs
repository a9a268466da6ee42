//! Default values for Semantic Lens configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Store Defaults
// ============================================================================

/// Default SurrealDB endpoint for the remote backend.
pub const DEFAULT_STORE_ENDPOINT: &str = "ws://127.0.0.1:8000";

/// Default SurrealDB namespace.
pub const DEFAULT_STORE_NAMESPACE: &str = "semantic_lens";

/// Default SurrealDB database.
pub const DEFAULT_STORE_DATABASE: &str = "graph";

/// Default timeout for establishing the remote connection (5 s).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// View Cache Defaults
// ============================================================================

/// Maximum number of cached view projections.
pub const DEFAULT_CACHE_MAX_SIZE: usize = 64;

/// Default cache entry lifetime (5 minutes).
pub const DEFAULT_CACHE_TTL_MS: u64 = 5 * 60 * 1000;

// ============================================================================
// Pattern Matching Defaults
// ============================================================================

/// Upper bound on role bindings reported per pattern.
pub const DEFAULT_MAX_MATCHES_PER_PATTERN: usize = 1_000;

// ============================================================================
// Edge Families
// ============================================================================

/// Edge kinds treated as calls.
pub const DEFAULT_CALL_KINDS: &[&str] = &["calls", "invokes"];

/// Edge kinds treated as inheritance.
pub const DEFAULT_INHERITANCE_KINDS: &[&str] = &["inherits", "extends", "implements"];

/// Kind given to aggregated module dependency edges.
pub const MODULE_DEPENDENCY_KIND: &str = "depends_on";

/// Hop count for neighborhood views without `max_depth`.
pub const DEFAULT_NEIGHBORHOOD_DEPTH: usize = 1;

// ============================================================================
// Server Defaults
// ============================================================================

/// Default bind address for `lens serve`.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default port for `lens serve`.
pub const DEFAULT_SERVER_PORT: u16 = 3001;

// ============================================================================
// Files
// ============================================================================

/// Project-local config file name.
pub const PROJECT_CONFIG_FILE: &str = "lens.toml";

/// Directory name under the user config dir.
pub const USER_CONFIG_DIR: &str = "semantic-lens";
