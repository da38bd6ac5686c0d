use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Triggers observed up to a minute late still fire normally; beyond that
/// the misfire policy applies.
pub const DEFAULT_MISFIRE_THRESHOLD_SECS: u64 = 60;
pub const DEFAULT_MAX_WORKERS: u32 = 4;
/// How long finished jobs stay queryable before the sweep evicts them.
pub const DEFAULT_RETENTION_SECS: u64 = 300;

/// Top-level config (herald.toml + HERALD_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeraldConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl HeraldConfig {
    /// Load config: explicit path > HERALD_CONFIG env > ~/.herald/herald.toml.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: HeraldConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("HERALD_").split("_"))
            .extract()
            .map_err(|e| crate::error::HeraldError::Config(e.to_string()))?;

        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            auth: AuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    pub token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::None,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    Token,
    #[default]
    None,
}

/// Tuning knobs for the dispatch loop and worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// A trigger observed more than this many seconds past its fire time is
    /// treated as misfired and handled per its misfire policy.
    #[serde(default = "default_misfire_threshold")]
    pub misfire_threshold_secs: u64,
    /// Maximum concurrently executing deliveries.
    #[serde(default = "default_max_workers")]
    pub max_workers: u32,
    /// Seconds a completed or failed job remains queryable before eviction.
    #[serde(default = "default_retention")]
    pub retention_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            misfire_threshold_secs: DEFAULT_MISFIRE_THRESHOLD_SECS,
            max_workers: DEFAULT_MAX_WORKERS,
            retention_secs: DEFAULT_RETENTION_SECS,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_misfire_threshold() -> u64 {
    DEFAULT_MISFIRE_THRESHOLD_SECS
}

fn default_max_workers() -> u32 {
    DEFAULT_MAX_WORKERS
}

fn default_retention() -> u64 {
    DEFAULT_RETENTION_SECS
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.herald/herald.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let config: HeraldConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.gateway.port, DEFAULT_PORT);
        assert_eq!(config.gateway.auth.mode, AuthMode::None);
        assert_eq!(
            config.scheduler.misfire_threshold_secs,
            DEFAULT_MISFIRE_THRESHOLD_SECS
        );
        assert_eq!(config.scheduler.max_workers, DEFAULT_MAX_WORKERS);
    }

    #[test]
    fn auth_mode_kebab_case() {
        let auth: AuthConfig =
            serde_json::from_str(r#"{"mode":"token","token":"secret"}"#).unwrap();
        assert_eq!(auth.mode, AuthMode::Token);
        assert_eq!(auth.token.as_deref(), Some("secret"));
    }
}
