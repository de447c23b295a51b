use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub cache: CacheConfig,
    pub providers: ProvidersConfig,
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub client_url: String,
    pub cors_origins: Vec<String>,
}

/// Which store implementation backs the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    Supabase,
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub supabase_url: String,
    #[serde(skip_serializing)]
    pub supabase_anon_key: String,
    #[serde(skip_serializing)]
    pub supabase_service_key: String,
    #[serde(skip_serializing)]
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations: bool,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_rate_limiting: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    /// Key the rate limiter on `X-Forwarded-For`; only safe behind a proxy that sets it
    pub trust_proxy: bool,
    pub max_request_size_bytes: usize,
    pub max_upload_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub portfolio_ttl_secs: u64,
    pub portfolio_cooldown_secs: u64,
    pub transactions_ttl_secs: u64,
    pub transactions_cooldown_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(skip_serializing)]
    pub alpha_vantage_api_key: Option<String>,
    pub alpha_vantage_base_url: String,
    pub alpha_vantage_timeout_secs: u64,
    #[serde(skip_serializing)]
    pub indian_api_key: Option<String>,
    pub indian_api_base_url: String,
    pub indian_api_timeout_secs: u64,
    #[serde(skip_serializing)]
    pub motilal_oswal_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub motilal_oswal_api_secret: Option<String>,
    pub motilal_oswal_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    pub enabled: bool,
    pub timezone: String,
    /// Stock prices: every N minutes inside the market window
    pub stock_interval_minutes: u32,
    pub stock_window_start_hour: u32,
    pub stock_window_end_hour: u32,
    /// NAV refresh: daily at this local hour, or every N minutes when set
    pub nav_daily_hour: u32,
    pub nav_interval_minutes: Option<u32>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let env_name = env::var("APP_ENV").or_else(|_| env::var("NODE_ENV"));
        let environment = match env_name.as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(v) = env::var("PORT").ok().and_then(|v| v.parse().ok()) {
            self.server.port = v;
        }
        if let Ok(v) = env::var("CLIENT_URL") {
            if !self.server.cors_origins.contains(&v) {
                self.server.cors_origins.push(v.clone());
            }
            self.server.client_url = v;
        }
        if let Ok(v) = env::var("CORS_ORIGINS") {
            self.server.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Backend overrides
        if let Ok(v) = env::var("SUPABASE_URL") {
            self.backend.supabase_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("SUPABASE_ANON_KEY") {
            self.backend.supabase_anon_key = v;
        }
        if let Ok(v) = env::var("SUPABASE_SERVICE_KEY") {
            self.backend.supabase_service_key = v;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.backend.database_url = Some(v);
        }
        self.backend.kind = match env::var("BACKEND").as_deref() {
            Ok("supabase") => BackendKind::Supabase,
            Ok("postgres") | Ok("pg") => BackendKind::Postgres,
            Ok("memory") => BackendKind::Memory,
            // Pick the store from whichever credentials are present
            _ if !self.backend.supabase_url.is_empty() => BackendKind::Supabase,
            _ if self.backend.database_url.is_some() => BackendKind::Postgres,
            _ => self.backend.kind,
        };
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.backend.max_connections = v.parse().unwrap_or(self.backend.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.backend.connection_timeout = v.parse().unwrap_or(self.backend.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.backend.run_migrations = v.parse().unwrap_or(self.backend.run_migrations);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_RATE_LIMITING") {
            self.api.enable_rate_limiting = v.parse().unwrap_or(self.api.enable_rate_limiting);
        }
        if let Ok(v) = env::var("RATE_LIMIT_MAX_REQUESTS") {
            self.api.rate_limit_requests = v.parse().unwrap_or(self.api.rate_limit_requests);
        }
        if let Ok(v) = env::var("RATE_LIMIT_WINDOW_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                self.api.rate_limit_window_secs = (ms / 1000).max(1);
            }
        }
        if let Ok(v) = env::var("TRUST_PROXY") {
            self.api.trust_proxy = v.parse().unwrap_or(self.api.trust_proxy);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }

        // Provider overrides
        self.providers.alpha_vantage_api_key = non_empty_var("ALPHA_VANTAGE_API_KEY");
        self.providers.indian_api_key = non_empty_var("INDIAN_API_KEY");
        self.providers.motilal_oswal_api_key = non_empty_var("MOTILAL_OSWAL_API_KEY");
        self.providers.motilal_oswal_api_secret = non_empty_var("MOTILAL_OSWAL_API_SECRET");
        if let Ok(v) = env::var("ALPHA_VANTAGE_BASE_URL") {
            self.providers.alpha_vantage_base_url = v;
        }
        if let Ok(v) = env::var("INDIAN_API_BASE_URL") {
            self.providers.indian_api_base_url = v;
        }
        if let Ok(v) = env::var("MOTILAL_OSWAL_BASE_URL") {
            self.providers.motilal_oswal_base_url = v;
        }

        // Job overrides
        if let Ok(v) = env::var("JOBS_ENABLED") {
            self.jobs.enabled = v.parse().unwrap_or(self.jobs.enabled);
        }
        if let Ok(v) = env::var("JOBS_TIMEZONE") {
            self.jobs.timezone = v;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig::default(),
            backend: BackendConfig {
                kind: BackendKind::Memory,
                supabase_url: String::new(),
                supabase_anon_key: String::new(),
                supabase_service_key: String::new(),
                database_url: None,
                max_connections: 10,
                connection_timeout: 30,
                run_migrations: true,
                request_timeout_secs: 30,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                rate_limit_requests: 1000,
                rate_limit_window_secs: 60,
                trust_proxy: false,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
                max_upload_size_bytes: 10 * 1024 * 1024,
            },
            security: SecurityConfig {
                jwt_secret: "development-only-secret".to_string(),
                jwt_expiry_hours: 24,
            },
            cache: CacheConfig::default(),
            providers: ProvidersConfig::default(),
            jobs: JobsConfig {
                nav_interval_minutes: Some(5),
                ..JobsConfig::default()
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            backend: BackendConfig {
                kind: BackendKind::Supabase,
                max_connections: 20,
                connection_timeout: 10,
                ..Self::development().backend
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
            },
            jobs: JobsConfig::default(),
            ..Self::development()
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            backend: BackendConfig {
                kind: BackendKind::Supabase,
                max_connections: 50,
                connection_timeout: 5,
                ..Self::development().backend
            },
            api: ApiConfig {
                max_request_size_bytes: 10 * 1024 * 1024,
                ..Self::development().api
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
            },
            jobs: JobsConfig::default(),
            ..Self::development()
        }
    }

    /// Configuration for tests: in-memory store, no jobs, no rate limiting
    pub fn for_tests() -> Self {
        let mut config = Self::development();
        config.backend.kind = BackendKind::Memory;
        config.api.enable_rate_limiting = false;
        config.jobs.enabled = false;
        config.security.jwt_secret = "test-secret".to_string();
        config
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4200,
            client_url: "http://localhost:4200".to_string(),
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:4200".to_string(),
            ],
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            portfolio_ttl_secs: 5 * 60,
            portfolio_cooldown_secs: 30,
            transactions_ttl_secs: 5 * 60,
            transactions_cooldown_secs: 20,
        }
    }
}

impl CacheConfig {
    pub fn portfolio_ttl(&self) -> Duration {
        Duration::from_secs(self.portfolio_ttl_secs)
    }

    pub fn portfolio_cooldown(&self) -> Duration {
        Duration::from_secs(self.portfolio_cooldown_secs)
    }

    pub fn transactions_ttl(&self) -> Duration {
        Duration::from_secs(self.transactions_ttl_secs)
    }

    pub fn transactions_cooldown(&self) -> Duration {
        Duration::from_secs(self.transactions_cooldown_secs)
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            alpha_vantage_api_key: None,
            alpha_vantage_base_url: "https://www.alphavantage.co".to_string(),
            alpha_vantage_timeout_secs: 10,
            indian_api_key: None,
            indian_api_base_url: "https://stock.indianapi.in".to_string(),
            indian_api_timeout_secs: 30,
            motilal_oswal_api_key: None,
            motilal_oswal_api_secret: None,
            motilal_oswal_base_url: "https://openapi.motilaloswal.com".to_string(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timezone: "Asia/Kolkata".to_string(),
            stock_interval_minutes: 5,
            stock_window_start_hour: 9,
            stock_window_end_hour: 16,
            nav_daily_hour: 23,
            nav_interval_minutes: None,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.server.port, 4200);
        assert_eq!(config.backend.kind, BackendKind::Memory);
        assert_eq!(config.jobs.nav_interval_minutes, Some(5));
        assert_eq!(config.api.rate_limit_requests, 1000);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.backend.kind, BackendKind::Supabase);
        assert!(config.security.jwt_secret.is_empty());
        assert_eq!(config.jobs.nav_interval_minutes, None);
        assert_eq!(config.jobs.nav_daily_hour, 23);
        assert_eq!(config.jobs.timezone, "Asia/Kolkata");
    }

    #[test]
    fn test_cache_windows() {
        let cache = CacheConfig::default();
        assert_eq!(cache.portfolio_ttl(), Duration::from_secs(300));
        assert_eq!(cache.portfolio_cooldown(), Duration::from_secs(30));
        assert_eq!(cache.transactions_cooldown(), Duration::from_secs(20));
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let mut config = AppConfig::for_tests();
        config.providers.alpha_vantage_api_key = Some("av-key".into());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("av-key"));
        assert!(!json.contains("test-secret"));
    }
}
