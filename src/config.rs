use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_DATABASE_URL: &str = "sqlite://kedai.db?mode=rwc";
const DEFAULT_APP_URL: &str = "http://localhost:3000";
const DEFAULT_TOYYIB_API_URL: &str = "https://toyyibpay.com";
const DEFAULT_DEPLOY_PROVIDER: &str = "vercel";
const DEFAULT_EMAIL_FROM: &str = "KEDAI <noreply@kedai.my>";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;
const DEV_DEFAULT_ADMIN_SECRET: &str = "development-admin-secret-change-me";

/// Application configuration, layered from `config/default.toml`,
/// `config/{environment}.toml`, and `APP__*` environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Public base URL of the storefront host; used for payment return
    /// URLs, webhook callback URLs, store links, and revalidation calls
    pub app_url: String,

    /// Shared secret for the admin control surface (`x-admin-secret`)
    #[validate(length(min = 16))]
    pub admin_secret: String,

    /// ToyyibPay API base URL
    pub toyyib_api_url: String,

    /// ToyyibPay user secret key
    #[serde(default)]
    pub toyyib_secret_key: String,

    /// ToyyibPay category code bills are created under
    #[serde(default)]
    pub toyyib_category_code: String,

    /// Deploy provider: "vercel" (targeted revalidation) or "netlify"
    /// (full rebuild hook)
    pub deploy_provider: String,

    /// Secret for the storefront host's revalidation endpoint
    #[serde(default)]
    pub revalidate_secret: Option<String>,

    /// Vercel deploy hook for manual full rebuilds
    #[serde(default)]
    pub vercel_deploy_hook: Option<String>,

    /// Netlify build hook
    #[serde(default)]
    pub netlify_build_hook: Option<String>,

    /// From address for transactional email
    pub email_from: String,

    /// Optional webhook notified when payment-webhook processing
    /// records an error; silent failed orders are otherwise only
    /// visible by polling the admin list
    #[serde(default)]
    pub alert_webhook_url: Option<String>,

    /// Timeout (seconds) applied to every outbound HTTP call
    pub http_timeout_secs: u64,

    /// Event channel capacity for async audit processing
    pub event_channel_capacity: usize,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Environment-dependent checks that the validator derive cannot
    /// express: production must not run on development fallbacks.
    pub fn validate_for_environment(&self) -> Result<(), ConfigError> {
        if self.is_production() {
            if self.admin_secret == DEV_DEFAULT_ADMIN_SECRET {
                return Err(ConfigError::Message(
                    "admin_secret must be set explicitly in production".into(),
                ));
            }
            if self.toyyib_secret_key.is_empty() {
                return Err(ConfigError::Message(
                    "toyyib_secret_key must be set in production".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Loads configuration from files and environment.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = std::env::var("APP__ENVIRONMENT")
        .or_else(|_| std::env::var("ENVIRONMENT"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder()
        .set_default("database_url", DEFAULT_DATABASE_URL)?
        .set_default("host", DEFAULT_HOST)?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", environment.clone())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("app_url", DEFAULT_APP_URL)?
        .set_default("admin_secret", DEV_DEFAULT_ADMIN_SECRET)?
        .set_default("toyyib_api_url", DEFAULT_TOYYIB_API_URL)?
        .set_default("deploy_provider", DEFAULT_DEPLOY_PROVIDER)?
        .set_default("email_from", DEFAULT_EMAIL_FROM)?
        .set_default("http_timeout_secs", DEFAULT_HTTP_TIMEOUT_SECS as i64)?
        .set_default("event_channel_capacity", DEFAULT_EVENT_CHANNEL_CAPACITY as i64)?;

    let default_file = Path::new(CONFIG_DIR).join("default.toml");
    if default_file.exists() {
        builder = builder.add_source(File::from(default_file));
    }
    let env_file = Path::new(CONFIG_DIR).join(format!("{environment}.toml"));
    if env_file.exists() {
        builder = builder.add_source(File::from(env_file));
    }

    let config: AppConfig = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;

    config
        .validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {e}")))?;
    config.validate_for_environment()?;

    if config.is_development() && config.admin_secret == DEV_DEFAULT_ADMIN_SECRET {
        info!("using development default admin secret");
    }

    Ok(config)
}

/// Initializes the global tracing subscriber. `level` is the fallback
/// filter when `RUST_LOG` is unset; `json` switches to structured
/// output for log aggregation.
pub fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if json {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            database_url: DEFAULT_DATABASE_URL.into(),
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            environment: DEFAULT_ENV.into(),
            log_level: DEFAULT_LOG_LEVEL.into(),
            log_json: false,
            auto_migrate: false,
            app_url: DEFAULT_APP_URL.into(),
            admin_secret: DEV_DEFAULT_ADMIN_SECRET.into(),
            toyyib_api_url: DEFAULT_TOYYIB_API_URL.into(),
            toyyib_secret_key: String::new(),
            toyyib_category_code: String::new(),
            deploy_provider: DEFAULT_DEPLOY_PROVIDER.into(),
            revalidate_secret: None,
            vercel_deploy_hook: None,
            netlify_build_hook: None,
            email_from: DEFAULT_EMAIL_FROM.into(),
            alert_webhook_url: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            cors_allowed_origins: None,
        }
    }

    #[test]
    fn development_accepts_defaults() {
        let config = base_config();
        assert!(config.is_development());
        assert!(config.validate_for_environment().is_ok());
    }

    #[test]
    fn production_rejects_dev_admin_secret() {
        let mut config = base_config();
        config.environment = "production".into();
        assert!(config.validate_for_environment().is_err());
    }

    #[test]
    fn production_requires_gateway_secret() {
        let mut config = base_config();
        config.environment = "production".into();
        config.admin_secret = "a-real-production-secret".into();
        config.toyyib_secret_key = String::new();
        assert!(config.validate_for_environment().is_err());
        config.toyyib_secret_key = "sk-live".into();
        assert!(config.validate_for_environment().is_ok());
    }
}
