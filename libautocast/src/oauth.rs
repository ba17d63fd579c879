//! OAuth 2.0 connect and refresh flows
//!
//! Connecting an account is two steps: [`OAuthClient::authorization_url`]
//! records a pending state and returns the URL to open in a browser, then
//! [`OAuthClient::exchange_code`] trades the callback code for tokens.
//! Twitter uses PKCE. Instagram swaps the short-lived token for a long-lived one.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::{Config, PlatformAppConfig};
use crate::error::{AutocastError, PlatformError, Result};
use crate::platforms::{expect_json, PlatformResult};
use crate::types::{NewSocialAccount, Platform};

const TWITTER_AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";
const LINKEDIN_AUTHORIZE_URL: &str = "https://www.linkedin.com/oauth/v2/authorization";
const INSTAGRAM_AUTHORIZE_URL: &str = "https://www.instagram.com/oauth/authorize";

const TWITTER_SCOPES: &str = "tweet.read tweet.write users.read offline.access";
const LINKEDIN_SCOPES: &str = "openid profile w_member_social";
const INSTAGRAM_SCOPES: &[&str] = &[
    "instagram_business_basic",
    "instagram_business_manage_messages",
    "instagram_business_manage_comments",
    "instagram_business_content_publish",
];

/// Lifetime assumed when a token response omits `expires_in`, in seconds
pub fn default_expires_in(platform: Platform) -> i64 {
    match platform {
        Platform::Twitter => 7200,
        Platform::LinkedIn | Platform::Instagram => 5_184_000,
    }
}

fn default_bases(platform: Platform) -> (&'static str, &'static str) {
    match platform {
        Platform::Twitter => ("https://api.twitter.com", "https://api.twitter.com"),
        Platform::LinkedIn => ("https://api.linkedin.com", "https://www.linkedin.com"),
        Platform::Instagram => ("https://graph.instagram.com", "https://api.instagram.com"),
    }
}

/// A platform's registered OAuth application plus the API origins to talk to
#[derive(Debug)]
pub struct OAuthApp {
    pub platform: Platform,
    pub client_id: String,
    client_secret: Option<SecretString>,
    pub api_base: String,
    pub oauth_base: String,
}

impl OAuthApp {
    pub fn new(platform: Platform, client_id: impl Into<String>, client_secret: Option<SecretString>) -> Self {
        let (api_base, oauth_base) = default_bases(platform);
        Self {
            platform,
            client_id: client_id.into(),
            client_secret,
            api_base: api_base.to_string(),
            oauth_base: oauth_base.to_string(),
        }
    }

    /// App with no client credentials; publishing works, refresh and connect do not
    pub fn unconfigured(platform: Platform) -> Self {
        Self::new(platform, String::new(), None)
    }

    pub fn from_config(platform: Platform, config: &PlatformAppConfig) -> Self {
        let secret = config
            .client_secret
            .as_ref()
            .map(|s| SecretString::from(s.expose_secret().to_string()));
        let mut app = Self::new(platform, config.client_id.clone(), secret);
        if let Some(base) = &config.api_base {
            app.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(base) = &config.oauth_base {
            app.oauth_base = base.trim_end_matches('/').to_string();
        }
        app
    }

    /// Settings for `platform` from the config file, unconfigured if absent
    pub fn for_platform(config: &Config, platform: Platform) -> Self {
        config
            .platform_app(platform)
            .map(|app| Self::from_config(platform, app))
            .unwrap_or_else(|| Self::unconfigured(platform))
    }

    /// Point both origins at one base URL (used against mock servers)
    pub fn with_base(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        self.api_base = base.clone();
        self.oauth_base = base;
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty()
    }

    fn secret(&self) -> &str {
        self.client_secret
            .as_ref()
            .map(|s| s.expose_secret())
            .unwrap_or("")
    }

    fn require_configured(&self) -> PlatformResult<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(PlatformError::NotConnected(format!(
                "No OAuth client configured for {}",
                self.platform.display_name()
            )))
        }
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn oauth_url(&self, path: &str) -> String {
        format!("{}{}", self.oauth_base, path)
    }
}

/// Credentials returned by a code exchange or refresh
#[derive(Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    /// `None` when the platform did not rotate (or never issues) a refresh token
    pub refresh_token: Option<String>,
    /// Seconds until `access_token` expires
    pub expires_in: i64,
}

impl TokenGrant {
    /// Absolute expiry in epoch milliseconds
    pub fn expires_at(&self, now_ms: i64) -> i64 {
        now_ms.saturating_add(self.expires_in.saturating_mul(1000))
    }
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_grant(self, platform: Platform) -> TokenGrant {
        TokenGrant {
            access_token: self.access_token,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            expires_in: self
                .expires_in
                .unwrap_or_else(|| default_expires_in(platform)),
        }
    }
}

/// Run the `refresh_token` grant against the platform's token endpoint.
///
/// Twitter authenticates the client with HTTP Basic; LinkedIn takes the
/// client credentials in the form body. Instagram has no refresh grant.
pub async fn refresh_grant(
    http: &reqwest::Client,
    app: &OAuthApp,
    refresh_token: &str,
) -> PlatformResult<TokenGrant> {
    app.require_configured()?;

    let response = match app.platform {
        Platform::Twitter => {
            http.post(app.oauth_url("/2/oauth2/token"))
                .basic_auth(&app.client_id, Some(app.secret()))
                .form(&[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("client_id", app.client_id.as_str()),
                ])
                .send()
                .await?
        }
        Platform::LinkedIn => {
            http.post(app.oauth_url("/oauth/v2/accessToken"))
                .form(&[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("client_id", app.client_id.as_str()),
                    ("client_secret", app.secret()),
                ])
                .send()
                .await?
        }
        Platform::Instagram => {
            return Err(PlatformError::UnsupportedOperation(
                "Instagram tokens cannot be refreshed; reconnect the account".to_string(),
            ))
        }
    };

    let token: TokenResponse = expect_json(app.platform, response).await?;
    debug!("Refreshed {} access token", app.platform.display_name());
    Ok(token.into_grant(app.platform))
}

/// A random PKCE code verifier, 32 bytes base64url-encoded
pub fn generate_code_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// S256 challenge for a verifier
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// An authorization started by `authorization_url`, awaiting its callback
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingAuthorization {
    pub platform: Platform,
    pub project_id: String,
    pub code_verifier: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Pending authorizations keyed by state, persisted as one JSON object
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Result<HashMap<String, PendingAuthorization>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                AutocastError::InvalidInput(format!(
                    "Corrupt OAuth state file {}: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(crate::error::ConfigError::ReadError(e).into()),
        }
    }

    fn write(&self, states: &HashMap<String, PendingAuthorization>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(crate::error::ConfigError::ReadError)?;
        }
        let content = serde_json::to_string_pretty(states)
            .map_err(|e| AutocastError::InvalidInput(format!("Cannot encode OAuth state: {}", e)))?;
        std::fs::write(&self.path, content).map_err(crate::error::ConfigError::ReadError)?;
        Ok(())
    }

    pub fn save(&self, state: &str, pending: PendingAuthorization) -> Result<()> {
        let mut states = self.load()?;
        states.insert(state.to_string(), pending);
        self.write(&states)
    }

    /// Remove and return the pending authorization for `state`.
    ///
    /// Instagram appends `#_` to the state it sends back; that suffix is ignored.
    pub fn take(&self, state: &str) -> Result<Option<PendingAuthorization>> {
        let key = state.strip_suffix("#_").unwrap_or(state);
        let mut states = self.load()?;
        let pending = states.remove(key);
        if pending.is_some() {
            self.write(&states)?;
        }
        Ok(pending)
    }
}

/// URL to send the user to, and the state that will come back with the code
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

#[derive(Deserialize)]
struct TwitterMe {
    data: Option<TwitterMeData>,
}

#[derive(Deserialize)]
struct TwitterMeData {
    username: String,
}

#[derive(Deserialize)]
struct LinkedInUserInfo {
    name: Option<String>,
    given_name: Option<String>,
}

#[derive(Deserialize)]
struct InstagramMe {
    username: Option<String>,
}

pub struct OAuthClient {
    http: reqwest::Client,
    redirect_base_url: String,
    states: StateStore,
    twitter: OAuthApp,
    linkedin: OAuthApp,
    instagram: OAuthApp,
}

impl OAuthClient {
    pub fn new(
        http: reqwest::Client,
        redirect_base_url: impl Into<String>,
        states: StateStore,
        apps: [OAuthApp; 3],
    ) -> Self {
        let [twitter, linkedin, instagram] = apps;
        Self {
            http,
            redirect_base_url: redirect_base_url.into().trim_end_matches('/').to_string(),
            states,
            twitter,
            linkedin,
            instagram,
        }
    }

    pub fn from_config(http: reqwest::Client, config: &Config) -> Self {
        Self::new(
            http,
            config.oauth.redirect_base_url.clone(),
            StateStore::new(config.oauth.state_file_path()),
            [
                OAuthApp::for_platform(config, Platform::Twitter),
                OAuthApp::for_platform(config, Platform::LinkedIn),
                OAuthApp::for_platform(config, Platform::Instagram),
            ],
        )
    }

    fn app(&self, platform: Platform) -> &OAuthApp {
        match platform {
            Platform::Twitter => &self.twitter,
            Platform::LinkedIn => &self.linkedin,
            Platform::Instagram => &self.instagram,
        }
    }

    pub fn redirect_uri(&self, platform: Platform) -> String {
        format!(
            "{}/api/auth/callback/{}",
            self.redirect_base_url,
            platform.as_str()
        )
    }

    /// Start connecting `platform` for a project
    pub fn authorization_url(
        &self,
        platform: Platform,
        project_id: &str,
    ) -> Result<AuthorizationRequest> {
        let app = self.app(platform);
        app.require_configured()?;

        let state = uuid::Uuid::new_v4().to_string();
        let redirect_uri = self.redirect_uri(platform);
        let client_id = app.client_id.as_str();

        let (url, code_verifier) = match platform {
            Platform::Twitter => {
                let verifier = generate_code_verifier();
                let challenge = code_challenge(&verifier);
                let url = Url::parse_with_params(
                    TWITTER_AUTHORIZE_URL,
                    &[
                        ("response_type", "code"),
                        ("client_id", client_id),
                        ("redirect_uri", redirect_uri.as_str()),
                        ("scope", TWITTER_SCOPES),
                        ("state", state.as_str()),
                        ("code_challenge", challenge.as_str()),
                        ("code_challenge_method", "S256"),
                    ],
                );
                (url, Some(verifier))
            }
            Platform::LinkedIn => {
                let url = Url::parse_with_params(
                    LINKEDIN_AUTHORIZE_URL,
                    &[
                        ("response_type", "code"),
                        ("client_id", client_id),
                        ("redirect_uri", redirect_uri.as_str()),
                        ("scope", LINKEDIN_SCOPES),
                        ("state", state.as_str()),
                    ],
                );
                (url, None)
            }
            Platform::Instagram => {
                let scopes = INSTAGRAM_SCOPES.join(",");
                let url = Url::parse_with_params(
                    INSTAGRAM_AUTHORIZE_URL,
                    &[
                        ("client_id", client_id),
                        ("redirect_uri", redirect_uri.as_str()),
                        ("scope", scopes.as_str()),
                        ("response_type", "code"),
                        ("state", state.as_str()),
                    ],
                );
                (url, None)
            }
        };

        let url = url.map_err(|e| AutocastError::InvalidInput(format!("Bad authorize URL: {}", e)))?;

        self.states.save(
            &state,
            PendingAuthorization {
                platform,
                project_id: project_id.to_string(),
                code_verifier,
                created_at: Utc::now(),
            },
        )?;

        info!("Started {} authorization for project {}", platform.display_name(), project_id);
        Ok(AuthorizationRequest {
            url: url.to_string(),
            state,
        })
    }

    /// Finish an authorization: verify the state, exchange the code, look up the username
    pub async fn exchange_code(
        &self,
        platform: Platform,
        code: &str,
        state: &str,
    ) -> Result<NewSocialAccount> {
        let pending = self
            .states
            .take(state)?
            .filter(|p| p.platform == platform)
            .ok_or_else(|| AutocastError::InvalidInput("Invalid OAuth state".to_string()))?;

        let app = self.app(platform);
        app.require_configured()?;

        let (grant, username) = match platform {
            Platform::Twitter => self.exchange_twitter(app, code, &pending).await?,
            Platform::LinkedIn => self.exchange_linkedin(app, code).await?,
            Platform::Instagram => self.exchange_instagram(app, code).await?,
        };

        let now_ms = Utc::now().timestamp_millis();
        info!(
            "Connected {} account {} for project {}",
            platform.display_name(),
            username,
            pending.project_id
        );

        Ok(NewSocialAccount {
            project_id: pending.project_id,
            platform,
            username,
            access_token: grant.access_token.clone(),
            refresh_token: grant.refresh_token.clone(),
            expires_at: Some(grant.expires_at(now_ms)),
        })
    }

    async fn exchange_twitter(
        &self,
        app: &OAuthApp,
        code: &str,
        pending: &PendingAuthorization,
    ) -> PlatformResult<(TokenGrant, String)> {
        let redirect_uri = self.redirect_uri(Platform::Twitter);
        let verifier = pending.code_verifier.as_deref().unwrap_or("");

        let response = self
            .http
            .post(app.oauth_url("/2/oauth2/token"))
            .basic_auth(&app.client_id, Some(app.secret()))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri.as_str()),
                ("code_verifier", verifier),
            ])
            .send()
            .await?;
        let grant = expect_json::<TokenResponse>(Platform::Twitter, response)
            .await?
            .into_grant(Platform::Twitter);

        let me = self
            .http
            .get(app.api_url("/2/users/me"))
            .bearer_auth(&grant.access_token)
            .send()
            .await?;
        let username = match expect_json::<TwitterMe>(Platform::Twitter, me).await {
            Ok(me) => me.data.map(|d| d.username),
            Err(e) => {
                warn!("Could not fetch Twitter username: {}", e);
                None
            }
        };

        Ok((grant, username.unwrap_or_else(|| "unknown".to_string())))
    }

    async fn exchange_linkedin(
        &self,
        app: &OAuthApp,
        code: &str,
    ) -> PlatformResult<(TokenGrant, String)> {
        let redirect_uri = self.redirect_uri(Platform::LinkedIn);

        let response = self
            .http
            .post(app.oauth_url("/oauth/v2/accessToken"))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", app.client_id.as_str()),
                ("client_secret", app.secret()),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .send()
            .await?;
        let grant = expect_json::<TokenResponse>(Platform::LinkedIn, response)
            .await?
            .into_grant(Platform::LinkedIn);

        let profile = self
            .http
            .get(app.api_url("/v2/userinfo"))
            .bearer_auth(&grant.access_token)
            .send()
            .await?;
        let username = match expect_json::<LinkedInUserInfo>(Platform::LinkedIn, profile).await {
            Ok(info) => info.name.or(info.given_name),
            Err(e) => {
                warn!("Could not fetch LinkedIn profile: {}", e);
                None
            }
        };

        Ok((grant, username.unwrap_or_else(|| "LinkedIn User".to_string())))
    }

    async fn exchange_instagram(
        &self,
        app: &OAuthApp,
        code: &str,
    ) -> PlatformResult<(TokenGrant, String)> {
        let redirect_uri = self.redirect_uri(Platform::Instagram);

        let short = self
            .http
            .post(app.oauth_url("/oauth/access_token"))
            .form(&[
                ("client_id", app.client_id.as_str()),
                ("client_secret", app.secret()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
                ("code", code),
            ])
            .send()
            .await?;
        let short: TokenResponse = expect_json(Platform::Instagram, short).await?;

        let long = self
            .http
            .get(app.api_url("/access_token"))
            .query(&[
                ("grant_type", "ig_exchange_token"),
                ("client_secret", app.secret()),
                ("access_token", short.access_token.as_str()),
            ])
            .send()
            .await?;
        let grant = expect_json::<TokenResponse>(Platform::Instagram, long)
            .await?
            .into_grant(Platform::Instagram);

        let profile = self
            .http
            .get(app.api_url("/v21.0/me"))
            .query(&[("fields", "username"), ("access_token", grant.access_token.as_str())])
            .send()
            .await?;
        let username = match expect_json::<InstagramMe>(Platform::Instagram, profile).await {
            Ok(me) => me.username,
            Err(e) => {
                warn!("Could not fetch Instagram username: {}", e);
                None
            }
        };

        Ok((
            TokenGrant {
                refresh_token: None,
                ..grant
            },
            username.unwrap_or_else(|| "instagram_user".to_string()),
        ))
    }
}
