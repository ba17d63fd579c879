//! Configuration management for Autocast

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::types::Platform;

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    pub twitter: Option<PlatformAppConfig>,
    pub linkedin: Option<PlatformAppConfig>,
    pub instagram: Option<PlatformAppConfig>,
    pub gemini: Option<GeminiConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the scheduler checks for due projects (humantime, e.g. "15m")
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Result<Duration> {
        parse_interval(&self.poll_interval, "scheduler.poll_interval")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishingConfig {
    /// Directory that local image paths such as `/generated/x.png` are resolved under
    #[serde(default = "default_public_dir")]
    pub public_dir: String,
    /// Public origin serving `public_dir`; required for Instagram
    pub public_base_url: Option<String>,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            public_dir: default_public_dir(),
            public_base_url: None,
        }
    }
}

impl PublishingConfig {
    pub fn public_dir_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.public_dir).to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Origin the platform redirects back to, e.g. "https://app.example.com"
    #[serde(default = "default_redirect_base_url")]
    pub redirect_base_url: String,
    /// Pending authorization states (PKCE verifiers) are kept here
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            redirect_base_url: default_redirect_base_url(),
            state_file: default_state_file(),
        }
    }
}

impl OAuthConfig {
    pub fn redirect_uri(&self, platform: Platform) -> String {
        format!(
            "{}/api/auth/callback/{}",
            self.redirect_base_url.trim_end_matches('/'),
            platform.as_str()
        )
    }

    pub fn state_file_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.state_file).to_string())
    }
}

/// OAuth application registered with a platform
#[derive(Debug, Serialize, Deserialize)]
pub struct PlatformAppConfig {
    pub client_id: String,
    #[serde(default, deserialize_with = "deserialize_secret", skip_serializing)]
    pub client_secret: Option<SecretString>,
    /// Overrides the platform's API origin
    pub api_base: Option<String>,
    /// Overrides the platform's OAuth token origin
    pub oauth_base: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default, deserialize_with = "deserialize_secret", skip_serializing)]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_image_model")]
    pub image_model: String,
    pub api_base: Option<String>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
            image_model: default_gemini_image_model(),
            api_base: None,
        }
    }
}

fn default_poll_interval() -> String {
    "15m".to_string()
}

fn default_public_dir() -> String {
    "~/.local/share/autocast/public".to_string()
}

fn default_redirect_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_state_file() -> String {
    "~/.local/share/autocast/oauth-state.json".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_gemini_image_model() -> String {
    "gemini-2.0-flash-preview-image-generation".to_string()
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value
        .filter(|s| !s.trim().is_empty())
        .map(SecretString::from))
}

/// Parse a humantime interval such as "15m" or "1h 30m"
pub fn parse_interval(input: &str, field: &str) -> Result<Duration> {
    let duration = humantime::parse_duration(input.trim()).map_err(|e| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: e.to_string(),
        }
    })?;

    if duration.is_zero() {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: "interval must be greater than zero".to_string(),
        }
        .into());
    }

    Ok(duration)
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let mut config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/autocast/autocast.db".to_string(),
            },
            scheduler: SchedulerConfig::default(),
            publishing: PublishingConfig::default(),
            oauth: OAuthConfig::default(),
            twitter: None,
            linkedin: None,
            instagram: None,
            gemini: None,
        }
    }

    /// OAuth application settings for a platform, if configured
    pub fn platform_app(&self, platform: Platform) -> Option<&PlatformAppConfig> {
        match platform {
            Platform::Twitter => self.twitter.as_ref(),
            Platform::LinkedIn => self.linkedin.as_ref(),
            Platform::Instagram => self.instagram.as_ref(),
        }
    }

    /// Environment variables win over file values so secrets can stay out of the file
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("AUTOCAST_DB_PATH") {
            self.database.path = path;
        }

        if let Ok(url) = std::env::var("AUTOCAST_PUBLIC_BASE_URL") {
            self.publishing.public_base_url = Some(url);
        }

        if let Ok(key) = std::env::var("AUTOCAST_GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                self.gemini
                    .get_or_insert_with(GeminiConfig::default)
                    .api_key = Some(SecretString::from(key));
            }
        }

        for platform in Platform::ALL {
            let var = format!(
                "AUTOCAST_{}_CLIENT_SECRET",
                platform.as_str().to_uppercase()
            );
            let Ok(secret) = std::env::var(&var) else {
                continue;
            };
            let app = match platform {
                Platform::Twitter => self.twitter.as_mut(),
                Platform::LinkedIn => self.linkedin.as_mut(),
                Platform::Instagram => self.instagram.as_mut(),
            };
            if let Some(app) = app {
                app.client_secret = Some(SecretString::from(secret));
            }
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory conventions
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("AUTOCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("autocast").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory conventions
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("autocast"))
}
