use std::env;

use serde::{Deserialize, Serialize};

use crate::task::Operator;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub operations: OperationTimings,
    pub auth: AuthConfig,
    pub agent: AgentConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `ABACUS_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("ABACUS_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            database: DatabaseConfig::from_env_profiled(p),
            operations: OperationTimings::from_env_profiled(p),
            auth: AuthConfig::from_env_profiled(p),
            agent: AgentConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:      {}:{}", self.server.host, self.server.port);
        tracing::info!("  database:    url={}", self.database.redacted_url());
        tracing::info!(
            "  operations:  +{}ms -{}ms *{}ms /{}ms",
            self.operations.addition_ms,
            self.operations.subtraction_ms,
            self.operations.multiplication_ms,
            self.operations.division_ms
        );
        tracing::info!("  auth:        token_ttl={}s", self.auth.token_ttl_secs);
        tracing::info!(
            "  agent:       orchestrator={}, computing_power={}",
            self.agent.orchestrator_url,
            self.agent.computing_power
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 8080),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── Database ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_or(p, "DATABASE_URL", "sqlite://calculator.db?mode=rwc"),
            max_connections: profiled_env_u32(p, "DATABASE_MAX_CONNECTIONS", 5),
        }
    }

    /// URL without any query string, safe for logs.
    pub fn redacted_url(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }
}

// ── Operation timings ─────────────────────────────────────────

/// Simulated execution cost per operator, handed to workers with each task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationTimings {
    pub addition_ms: u64,
    pub subtraction_ms: u64,
    pub multiplication_ms: u64,
    pub division_ms: u64,
}

impl Default for OperationTimings {
    fn default() -> Self {
        Self {
            addition_ms: 1000,
            subtraction_ms: 1000,
            multiplication_ms: 1000,
            division_ms: 1000,
        }
    }
}

impl OperationTimings {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            addition_ms: profiled_env_u64(p, "TIME_ADDITION_MS", defaults.addition_ms),
            subtraction_ms: profiled_env_u64(p, "TIME_SUBTRACTION_MS", defaults.subtraction_ms),
            multiplication_ms: profiled_env_u64(
                p,
                "TIME_MULTIPLICATIONS_MS",
                defaults.multiplication_ms,
            ),
            division_ms: profiled_env_u64(p, "TIME_DIVISIONS_MS", defaults.division_ms),
        }
    }

    /// Uniform cost for every operator (handy for tests and demos).
    pub fn uniform(ms: u64) -> Self {
        Self {
            addition_ms: ms,
            subtraction_ms: ms,
            multiplication_ms: ms,
            division_ms: ms,
        }
    }

    pub fn for_operator(&self, op: Operator) -> u64 {
        match op {
            Operator::Add => self.addition_ms,
            Operator::Subtract => self.subtraction_ms,
            Operator::Multiply => self.multiplication_ms,
            Operator::Divide => self.division_ms,
        }
    }
}

// ── Auth ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
}

impl AuthConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            jwt_secret: profiled_env_or(p, "JWT_SECRET", "very_secret"),
            token_ttl_secs: profiled_env_u64(p, "TOKEN_TTL_SECS", 120),
        }
    }
}

// ── Agent (compute worker) ────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub orchestrator_url: String,
    /// Number of concurrent worker loops.
    pub computing_power: usize,
    pub poll_interval_ms: u64,
}

impl AgentConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            orchestrator_url: profiled_env_or(p, "ORCHESTRATOR_URL", "http://localhost:8080"),
            computing_power: profiled_env_u32(p, "COMPUTING_POWER", 2) as usize,
            poll_interval_ms: profiled_env_u64(p, "POLL_INTERVAL_MS", 2000),
        }
    }
}
