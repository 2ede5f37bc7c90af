use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `FLASHBID__` and a `__` separator between levels.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    #[serde(default = "default_db_url")]
    pub url: String,
    #[serde(default = "default_db_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
            pool_size: default_db_pool_size(),
            statement_timeout_ms: default_statement_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            connect_timeout_ms: default_connect_timeout_ms(),
            op_timeout_ms: default_op_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,
    #[serde(default = "default_user_cache_ttl_secs")]
    pub user_cache_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_secs: default_token_ttl_secs(),
            user_cache_ttl_secs: default_user_cache_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

/// Tuning for the three-tier campaign cache (C3).
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_tier1_capacity")]
    pub tier1_capacity: u64,
    #[serde(default = "default_tier1_ttl_secs")]
    pub tier1_ttl_secs: u64,
    #[serde(default = "default_tier2_ttl_secs")]
    pub tier2_ttl_secs: u64,
    #[serde(default = "default_stats_snapshot_ttl_secs")]
    pub stats_snapshot_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tier1_capacity: default_tier1_capacity(),
            tier1_ttl_secs: default_tier1_ttl_secs(),
            tier2_ttl_secs: default_tier2_ttl_secs(),
            stats_snapshot_ttl_secs: default_stats_snapshot_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    #[serde(default = "default_settlement_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_settlement_poll_interval_ms(),
            lock_ttl_secs: default_lock_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastConfig {
    #[serde(default = "default_broadcast_interval_ms")]
    pub interval_ms: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_broadcast_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_window_secs")]
    pub window_secs: i64,
    #[serde(default = "default_max_requests_per_window")]
    pub max_requests_per_window: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests_per_window: default_max_requests_per_window(),
        }
    }
}

fn default_node_id() -> String {
    "flashbid-node-1".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}
fn default_db_url() -> String {
    "postgres://localhost:5432/flashbid".to_string()
}
fn default_db_pool_size() -> u32 {
    16
}
fn default_statement_timeout_ms() -> u64 {
    5_000
}
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_redis_pool_size() -> u32 {
    32
}
fn default_connect_timeout_ms() -> u64 {
    3_000
}
fn default_op_timeout_ms() -> u64 {
    2_000
}
fn default_jwt_secret() -> String {
    "change-me-in-production".to_string()
}
fn default_token_ttl_secs() -> i64 {
    24 * 3600
}
fn default_user_cache_ttl_secs() -> u64 {
    120
}
fn default_metrics_port() -> u16 {
    9100
}
fn default_tier1_capacity() -> u64 {
    10_000
}
fn default_tier1_ttl_secs() -> u64 {
    5
}
fn default_tier2_ttl_secs() -> u64 {
    3600
}
fn default_stats_snapshot_ttl_secs() -> u64 {
    5
}
fn default_settlement_poll_interval_ms() -> u64 {
    10_000
}
fn default_lock_ttl_secs() -> u64 {
    5
}
fn default_broadcast_interval_ms() -> u64 {
    2_000
}
fn default_window_secs() -> i64 {
    60
}
fn default_max_requests_per_window() -> u32 {
    120
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            db: DbConfig::default(),
            redis: RedisConfig::default(),
            auth: AuthConfig::default(),
            metrics: MetricsConfig::default(),
            cache: CacheConfig::default(),
            settlement: SettlementConfig::default(),
            broadcast: BroadcastConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the environment, falling back to
    /// defaults for anything unset. Prefix `FLASHBID`, `__` nesting,
    /// e.g. `FLASHBID__DB__URL`, `FLASHBID__API__HTTP_PORT`.
    pub fn load() -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("FLASHBID")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        cfg.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.api.http_port, 8080);
        assert_eq!(cfg.broadcast.interval_ms, 2_000);
        assert_eq!(cfg.settlement.lock_ttl_secs, 5);
    }

    #[test]
    fn load_falls_back_to_defaults_without_env() {
        let cfg = AppConfig::load().expect("config should load with defaults");
        assert_eq!(cfg.db.pool_size, 16);
    }
}
