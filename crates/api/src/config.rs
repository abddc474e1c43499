use std::time::Duration;

use devsession_core::deploy::helm::{DEFAULT_CHART_PATH, DEFAULT_DEPLOY_TIMEOUT};
use devsession_core::deploy::DriverConfig;
use devsession_core::session::DEFAULT_SESSION_TTL_DAYS;

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `360`). Must outlast a
    /// full deploy, since get-or-create waits for the workload.
    pub request_timeout_secs: u64,
    /// How long in-flight requests may drain after a shutdown signal (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Connection pool size (default: `20`).
    pub db_max_connections: u32,
    pub log_format: LogFormat,
    pub deploy: DeployConfig,
}

/// Settings for the helm driver and session lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConfig {
    pub helm_bin: String,
    pub kubectl_bin: String,
    pub chart_path: String,
    pub deploy_timeout_secs: u64,
    pub session_ttl_days: i64,
}

impl DeployConfig {
    /// Load from environment variables with defaults.
    ///
    /// | Env Var               | Default                       |
    /// |-----------------------|-------------------------------|
    /// | `HELM_BIN`            | `helm`                        |
    /// | `KUBECTL_BIN`         | `kubectl`                     |
    /// | `HELM_CHART_PATH`     | `./helm/dev-session-template` |
    /// | `DEPLOY_TIMEOUT_SECS` | `300`                         |
    /// | `SESSION_TTL_DAYS`    | `365`                         |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let helm_bin = lookup("HELM_BIN").unwrap_or_else(|| "helm".into());
        let kubectl_bin = lookup("KUBECTL_BIN").unwrap_or_else(|| "kubectl".into());
        let chart_path = lookup("HELM_CHART_PATH").unwrap_or_else(|| DEFAULT_CHART_PATH.into());

        let deploy_timeout_secs: u64 = lookup("DEPLOY_TIMEOUT_SECS")
            .map(|v| {
                v.parse()
                    .expect("DEPLOY_TIMEOUT_SECS must be a valid u64")
            })
            .unwrap_or(DEFAULT_DEPLOY_TIMEOUT.as_secs());

        let session_ttl_days: i64 = lookup("SESSION_TTL_DAYS")
            .map(|v| v.parse().expect("SESSION_TTL_DAYS must be a valid i64"))
            .unwrap_or(DEFAULT_SESSION_TTL_DAYS);
        assert!(session_ttl_days > 0, "SESSION_TTL_DAYS must be positive");

        Self {
            helm_bin,
            kubectl_bin,
            chart_path,
            deploy_timeout_secs,
            session_ttl_days,
        }
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            helm_bin: self.helm_bin.clone(),
            kubectl_bin: self.kubectl_bin.clone(),
            chart_path: self.chart_path.clone(),
            timeout: Duration::from_secs(self.deploy_timeout_secs),
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.session_ttl_days)
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `8080`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `360`                      |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                       |
    /// | `DB_MAX_CONNECTIONS`    | `20`                       |
    /// | `LOG_FORMAT`            | pretty (`json` to switch)  |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());

        let port: u16 = lookup("PORT")
            .unwrap_or_else(|| "8080".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = lookup("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|| "360".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = lookup("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let db_max_connections: u32 = lookup("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|| "20".into())
            .parse()
            .expect("DB_MAX_CONNECTIONS must be a valid u32");

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let deploy = DeployConfig::from_lookup(&lookup);

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            db_max_connections,
            log_format,
            deploy,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
