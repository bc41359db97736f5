use std::{env, fs, net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_jwt_ttl")]
    pub jwt_ttl_seconds: i64,
    #[serde(default)]
    pub environment: Environment,
    /// Emit `_id` next to `id` in resource payloads for older clients.
    #[serde(default)]
    pub legacy_id_alias: bool,
    #[serde(default)]
    pub ai: Option<AiConfig>,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub email: Option<EmailConfig>,
    #[serde(default)]
    pub billing: Option<BillingConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub api_key: String,
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarConfig {
    #[serde(default)]
    pub google: Option<CalendarProviderConfig>,
    #[serde(default)]
    pub microsoft: Option<CalendarProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Azure AD tenant; ignored by Google.
    #[serde(default)]
    pub tenant: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub api_key: String,
    #[serde(default = "default_email_base_url")]
    pub base_url: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    pub secret_key: String,
    #[serde(default = "default_billing_base_url")]
    pub base_url: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            database_path: default_database_path(),
            database_max_connections: default_max_connections(),
            jwt_secret: String::new(),
            jwt_ttl_seconds: default_jwt_ttl(),
            environment: Environment::default(),
            legacy_id_alias: false,
            ai: None,
            calendar: CalendarConfig::default(),
            email: None,
            billing: None,
        }
    }
}

impl AppConfig {
    const CONFIG_ENV: &'static str = "TASKHIVE_CONFIG_FILE";
    const BIND_ADDRESS_ENV: &'static str = "TASKHIVE_BIND_ADDRESS";
    const DATABASE_PATH_ENV: &'static str = "TASKHIVE_DATABASE_PATH";
    const MAX_CONNECTIONS_ENV: &'static str = "TASKHIVE_DATABASE_MAX_CONNECTIONS";
    const JWT_SECRET_ENV: &'static str = "TASKHIVE_JWT_SECRET";
    const JWT_TTL_ENV: &'static str = "TASKHIVE_JWT_TTL_SECONDS";
    const ENVIRONMENT_ENV: &'static str = "TASKHIVE_ENV";
    const LEGACY_ID_ALIAS_ENV: &'static str = "TASKHIVE_LEGACY_ID_ALIAS";

    /// Load configuration from defaults layered with optional config files and
    /// environment variables.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    pub fn load_with(config_path: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::resolve_config_path(config_path)? {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            config = toml::from_str(&contents)
                .with_context(|| format!("invalid config file: {}", path.display()))?;
        }

        config.apply_env()?;
        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(addr) = non_empty_env(Self::BIND_ADDRESS_ENV) {
            self.bind_address = addr
                .parse()
                .with_context(|| format!("invalid {name}", name = Self::BIND_ADDRESS_ENV))?;
        }

        if let Some(path) = non_empty_env(Self::DATABASE_PATH_ENV) {
            self.database_path = path;
        }

        if let Some(value) = non_empty_env(Self::MAX_CONNECTIONS_ENV) {
            self.database_max_connections = value
                .parse()
                .with_context(|| format!("invalid {name}", name = Self::MAX_CONNECTIONS_ENV))?;
        }

        if let Some(secret) = non_empty_env(Self::JWT_SECRET_ENV) {
            self.jwt_secret = secret;
        }

        if let Some(value) = non_empty_env(Self::JWT_TTL_ENV) {
            self.jwt_ttl_seconds = value
                .parse()
                .with_context(|| format!("invalid {name}", name = Self::JWT_TTL_ENV))?;
        }

        if let Some(value) = non_empty_env(Self::ENVIRONMENT_ENV) {
            self.environment = match value.to_ascii_lowercase().as_str() {
                "development" | "dev" | "local" => Environment::Development,
                "production" | "prod" => Environment::Production,
                other => return Err(anyhow!("invalid {}: {other}", Self::ENVIRONMENT_ENV)),
            };
        }

        if let Some(value) = non_empty_env(Self::LEGACY_ID_ALIAS_ENV) {
            self.legacy_id_alias = matches!(value.as_str(), "1" | "true" | "yes");
        }

        if let Some(api_key) = non_empty_env("TASKHIVE_AI_API_KEY") {
            let ai = self.ai.get_or_insert_with(|| AiConfig {
                api_key: String::new(),
                base_url: default_ai_base_url(),
                model: default_ai_model(),
            });
            ai.api_key = api_key;
            if let Some(model) = non_empty_env("TASKHIVE_AI_MODEL") {
                ai.model = model;
            }
        }

        if let Some(google) = provider_from_env("GOOGLE") {
            self.calendar.google = Some(google);
        }
        if let Some(microsoft) = provider_from_env("MICROSOFT") {
            self.calendar.microsoft = Some(microsoft);
        }

        if let (Some(api_key), Some(from)) = (
            non_empty_env("TASKHIVE_EMAIL_API_KEY"),
            non_empty_env("TASKHIVE_EMAIL_FROM"),
        ) {
            self.email = Some(EmailConfig {
                api_key,
                base_url: non_empty_env("TASKHIVE_EMAIL_BASE_URL")
                    .unwrap_or_else(default_email_base_url),
                from,
            });
        }

        if let (Some(secret_key), Some(price_id), Some(success_url), Some(cancel_url)) = (
            non_empty_env("TASKHIVE_BILLING_SECRET_KEY"),
            non_empty_env("TASKHIVE_BILLING_PRICE_ID"),
            non_empty_env("TASKHIVE_BILLING_SUCCESS_URL"),
            non_empty_env("TASKHIVE_BILLING_CANCEL_URL"),
        ) {
            self.billing = Some(BillingConfig {
                secret_key,
                base_url: non_empty_env("TASKHIVE_BILLING_BASE_URL")
                    .unwrap_or_else(default_billing_base_url),
                price_id,
                success_url,
                cancel_url,
            });
        }

        Ok(())
    }

    fn resolve_config_path(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            return Self::validate_path(path);
        }

        if let Some(path) = non_empty_env(Self::CONFIG_ENV) {
            return Self::validate_path(PathBuf::from(path));
        }

        let mut candidates = vec![PathBuf::from("taskhive.toml")];
        if let Some(dir) = home_dir() {
            candidates.push(dir.join(".taskhive").join("config.toml"));
        }

        Ok(candidates.into_iter().find(|candidate| candidate.exists()))
    }

    fn validate_path(path: PathBuf) -> Result<Option<PathBuf>> {
        if path.exists() {
            Ok(Some(path))
        } else {
            Err(anyhow!(
                "configuration file does not exist: {}",
                path.display()
            ))
        }
    }
}

fn provider_from_env(provider: &str) -> Option<CalendarProviderConfig> {
    let client_id = non_empty_env(&format!("TASKHIVE_CALENDAR_{provider}_CLIENT_ID"))?;
    let client_secret = non_empty_env(&format!("TASKHIVE_CALENDAR_{provider}_CLIENT_SECRET"))?;
    let redirect_uri = non_empty_env(&format!("TASKHIVE_CALENDAR_{provider}_REDIRECT_URI"))?;
    Some(CalendarProviderConfig {
        client_id,
        client_secret,
        redirect_uri,
        tenant: non_empty_env(&format!("TASKHIVE_CALENDAR_{provider}_TENANT")),
    })
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_database_path() -> String {
    "./data/taskhive.db".to_owned()
}

fn default_max_connections() -> u32 {
    8
}

fn default_jwt_ttl() -> i64 {
    60 * 60 * 24 * 7
}

fn default_ai_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_owned()
}

fn default_ai_model() -> String {
    "gemini-1.5-flash".to_owned()
}

fn default_email_base_url() -> String {
    "https://api.resend.com".to_owned()
}

fn default_billing_base_url() -> String {
    "https://api.stripe.com/v1".to_owned()
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
