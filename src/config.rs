use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub supabase: SupabaseConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    pub admin: AdminConfig,
    #[serde(default)]
    pub draw: DrawConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackendKind {
    #[default]
    Supabase,
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(StoreBackendKind::Supabase),
            "postgres" => Ok(StoreBackendKind::Postgres),
            "memory" => Ok(StoreBackendKind::Memory),
            other => Err(AppError::ConfigError(format!(
                "unknown store backend: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackendKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub anon_key: String,
    #[serde(default = "default_image_bucket")]
    pub image_bucket: String,
    #[serde(default = "default_products_table")]
    pub products_table: String,
    #[serde(default = "default_access_codes_table")]
    pub access_codes_table: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            image_bucket: default_image_bucket(),
            products_table: default_products_table(),
            access_codes_table: default_access_codes_table(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

/// Local blob storage for the postgres and memory backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    #[serde(default = "default_uploads_dir")]
    pub dir: String,
    #[serde(default = "default_uploads_public_base_url")]
    pub public_base_url: String,
    /// Largest accepted product image body, in bytes
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: default_uploads_dir(),
            public_base_url: default_uploads_public_base_url(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// bcrypt hash of the admin password
    pub password_hash: String,
    pub jwt_secret: String,
    #[serde(default = "default_token_expires_in")]
    pub token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawConfig {
    #[serde(default = "default_tick_count")]
    pub tick_count: u32,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_download_delay_ms")]
    pub download_delay_ms: u64,
    #[serde(default = "default_download_dir")]
    pub download_dir: String,
    #[serde(default = "default_download_suffix")]
    pub download_suffix: String,
    #[serde(default)]
    pub final_frame_matches_winner: bool,
    #[serde(default = "default_session_idle_ttl_secs")]
    pub session_idle_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            tick_count: default_tick_count(),
            tick_interval_ms: default_tick_interval_ms(),
            download_delay_ms: default_download_delay_ms(),
            download_dir: default_download_dir(),
            download_suffix: default_download_suffix(),
            final_frame_matches_winner: false,
            session_idle_ttl_secs: default_session_idle_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl DrawConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn download_delay(&self) -> Duration {
        Duration::from_millis(self.download_delay_ms)
    }

    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_ttl_secs)
    }
}

fn default_image_bucket() -> String {
    "product_image".to_string()
}
fn default_products_table() -> String {
    "products".to_string()
}
fn default_access_codes_table() -> String {
    "access_keys".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    10
}
fn default_uploads_dir() -> String {
    "uploads".to_string()
}
fn default_uploads_public_base_url() -> String {
    "http://localhost:8080/uploads".to_string()
}
fn default_max_image_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_token_expires_in() -> i64 {
    7200
}
fn default_tick_count() -> u32 {
    30
}
fn default_tick_interval_ms() -> u64 {
    100
}
fn default_download_delay_ms() -> u64 {
    2000
}
fn default_download_dir() -> String {
    "downloads".to_string()
}
fn default_download_suffix() -> String {
    "_winner.png".to_string()
}
fn default_session_idle_ttl_secs() -> u64 {
    1800
}
fn default_sweep_interval_secs() -> u64 {
    60
}

impl Config {
    pub fn from_toml() -> AppResult<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // Without a config file everything comes from the environment
        let mut config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::parse(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                let password_hash = get_env("ADMIN_PASSWORD_HASH").ok_or_else(|| {
                    AppError::ConfigError(
                        "ADMIN_PASSWORD_HASH is not set and config.toml was not found".into(),
                    )
                })?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    store: StoreConfig::default(),
                    supabase: SupabaseConfig::default(),
                    database: DatabaseConfig::default(),
                    uploads: UploadsConfig::default(),
                    admin: AdminConfig {
                        password_hash,
                        jwt_secret: get_env("ADMIN_JWT_SECRET").unwrap_or_default(),
                        token_expires_in: get_env_parse(
                            "ADMIN_TOKEN_EXPIRES_IN",
                            default_token_expires_in(),
                        ),
                    },
                    draw: DrawConfig::default(),
                }
            }
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "cannot read config file {config_path}: {e}"
                )));
            }
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(config_str: &str) -> AppResult<Self> {
        toml::from_str(config_str)
            .map_err(|e| AppError::ConfigError(format!("failed to parse config file: {e}")))
    }

    /// Environment variables win over the file, field by field.
    fn apply_env_overrides(&mut self) -> AppResult<()> {
        fn parse_into<T: std::str::FromStr>(name: &str, target: &mut T) {
            if let Ok(v) = env::var(name)
                && let Ok(parsed) = v.parse()
            {
                *target = parsed;
            }
        }

        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        parse_into("SERVER_PORT", &mut self.server.port);

        if let Ok(v) = env::var("STORE_BACKEND") {
            self.store.backend = v.parse()?;
        }

        if let Ok(v) = env::var("SUPABASE_URL") {
            self.supabase.url = v;
        }
        if let Ok(v) = env::var("SUPABASE_ANON_KEY") {
            self.supabase.anon_key = v;
        }
        if let Ok(v) = env::var("SUPABASE_IMAGE_BUCKET") {
            self.supabase.image_bucket = v;
        }
        parse_into("SUPABASE_TIMEOUT_SECS", &mut self.supabase.timeout_secs);

        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        parse_into("DB_MAX_CONNECTIONS", &mut self.database.max_connections);

        if let Ok(v) = env::var("UPLOADS_DIR") {
            self.uploads.dir = v;
        }
        if let Ok(v) = env::var("UPLOADS_PUBLIC_BASE_URL") {
            self.uploads.public_base_url = v;
        }
        parse_into("UPLOADS_MAX_IMAGE_BYTES", &mut self.uploads.max_image_bytes);

        if let Ok(v) = env::var("ADMIN_PASSWORD_HASH") {
            self.admin.password_hash = v;
        }
        if let Ok(v) = env::var("ADMIN_JWT_SECRET") {
            self.admin.jwt_secret = v;
        }
        parse_into("ADMIN_TOKEN_EXPIRES_IN", &mut self.admin.token_expires_in);

        parse_into("DRAW_TICK_COUNT", &mut self.draw.tick_count);
        parse_into("DRAW_TICK_INTERVAL_MS", &mut self.draw.tick_interval_ms);
        parse_into("DRAW_DOWNLOAD_DELAY_MS", &mut self.draw.download_delay_ms);
        if let Ok(v) = env::var("DRAW_DOWNLOAD_DIR") {
            self.draw.download_dir = v;
        }
        if let Ok(v) = env::var("DRAW_DOWNLOAD_SUFFIX") {
            self.draw.download_suffix = v;
        }
        parse_into(
            "DRAW_FINAL_FRAME_MATCHES_WINNER",
            &mut self.draw.final_frame_matches_winner,
        );
        parse_into(
            "DRAW_SESSION_IDLE_TTL_SECS",
            &mut self.draw.session_idle_ttl_secs,
        );
        parse_into(
            "DRAW_SWEEP_INTERVAL_SECS",
            &mut self.draw.sweep_interval_secs,
        );

        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.draw.tick_count == 0 {
            return Err(AppError::ConfigError("draw.tick_count must be positive".into()));
        }
        if self.draw.tick_interval_ms == 0 {
            return Err(AppError::ConfigError(
                "draw.tick_interval_ms must be positive".into(),
            ));
        }
        if self.uploads.max_image_bytes == 0 {
            return Err(AppError::ConfigError(
                "uploads.max_image_bytes must be positive".into(),
            ));
        }
        if self.draw.sweep_interval_secs == 0 {
            return Err(AppError::ConfigError(
                "draw.sweep_interval_secs must be positive".into(),
            ));
        }
        if self.admin.password_hash.is_empty() {
            return Err(AppError::ConfigError("admin.password_hash is empty".into()));
        }
        if self.admin.jwt_secret.is_empty() {
            return Err(AppError::ConfigError("admin.jwt_secret is empty".into()));
        }
        match self.store.backend {
            StoreBackendKind::Supabase
                if self.supabase.url.is_empty() || self.supabase.anon_key.is_empty() =>
            {
                Err(AppError::ConfigError(
                    "supabase.url and supabase.anon_key are required for the supabase backend"
                        .into(),
                ))
            }
            StoreBackendKind::Postgres if self.database.url.is_empty() => Err(
                AppError::ConfigError("database.url is required for the postgres backend".into()),
            ),
            _ => Ok(()),
        }
    }
}
