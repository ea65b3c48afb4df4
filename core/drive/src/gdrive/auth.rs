//! OAuth2 authentication and token management for Google Drive.

use chrono::{DateTime, Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use classdrive_common::{Error, Result, SecretString};

/// OAuth2 authorization endpoint.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// OAuth2 token endpoint.
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Loopback redirect used by installed applications.
const REDIRECT_URL: &str = "http://127.0.0.1:8080";

/// Full Drive scope. Narrower scopes cannot see course folders created by hand.
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

type GoogleClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// OAuth2 tokens with expiration tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tokens {
    /// Access token for API requests.
    pub access_token: SecretString,
    /// Refresh token for obtaining new access tokens.
    pub refresh_token: SecretString,
    /// When the access token expires.
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Check if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        // Consider expired if less than 5 minutes remaining
        self.expires_at < Utc::now() + Duration::minutes(5)
    }
}

/// Configuration for OAuth2 authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// Redirect URL for the OAuth2 callback.
    #[serde(default = "default_redirect_url")]
    pub redirect_url: String,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URL.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

fn default_redirect_url() -> String {
    REDIRECT_URL.to_string()
}

/// Client secret file as downloaded from the Google Cloud console.
///
/// Desktop clients are wrapped in `installed`, web clients in `web`.
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<AuthConfig>,
    web: Option<AuthConfig>,
}

impl AuthConfig {
    /// Parse a Google client secret JSON document.
    pub fn from_client_secret_json(json: &str) -> Result<Self> {
        let file: ClientSecretFile = serde_json::from_str(json)?;
        file.installed.or(file.web).ok_or_else(|| {
            Error::Config("Client secret file has neither an 'installed' nor a 'web' section".to_string())
        })
    }

    /// Read a Google client secret file (usually `credentials.json`).
    pub fn from_client_secret_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Cannot read client secret file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_client_secret_json(&json)
    }

    /// Same client, different redirect (e.g. the port actually bound).
    pub fn with_redirect_url(mut self, redirect_url: impl Into<String>) -> Self {
        self.redirect_url = redirect_url.into();
        self
    }
}

/// OAuth2 authentication manager for Google Drive.
pub struct AuthManager {
    client: GoogleClient,
    http: oauth2::reqwest::Client,
    config: AuthConfig,
}

impl AuthManager {
    /// Create a new authentication manager.
    pub fn new(config: AuthConfig) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(
                config.client_secret.expose().to_string(),
            ))
            .set_auth_uri(
                AuthUrl::new(config.auth_uri.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid auth URL: {}", e)))?,
            )
            .set_token_uri(
                TokenUrl::new(config.token_uri.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid token URL: {}", e)))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_url.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid redirect URL: {}", e)))?,
            );

        // Token endpoints must not follow redirects.
        let http = oauth2::reqwest::ClientBuilder::new()
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            http,
            config,
        })
    }

    /// Generate the authorization URL for the user to visit.
    ///
    /// Returns the URL and a CSRF token that should be verified on callback.
    pub fn authorization_url(&self) -> (String, String) {
        let (auth_url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(DRIVE_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        (auth_url.to_string(), csrf_token.secret().clone())
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Preconditions
    /// - `code` is a valid authorization code from the OAuth2 callback
    ///
    /// # Errors
    /// - Invalid authorization code
    /// - No refresh token granted
    /// - Network errors
    pub async fn exchange_code(&self, code: &str) -> Result<Tokens> {
        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| Error::Authentication(format!("Token exchange failed: {}", e)))?;

        let refresh_token = token_result
            .refresh_token()
            .ok_or_else(|| {
                Error::Authentication("No refresh token received. Ensure 'offline' access and 'consent' prompt were requested.".to_string())
            })?
            .secret()
            .clone();

        Ok(Tokens {
            access_token: SecretString::new(token_result.access_token().secret().clone()),
            refresh_token: SecretString::new(refresh_token),
            expires_at: expiry(token_result.expires_in()),
        })
    }

    /// Refresh an access token using the refresh token.
    ///
    /// # Errors
    /// - Invalid or revoked refresh token
    /// - Network errors
    pub async fn refresh_token(&self, refresh_token: &SecretString) -> Result<Tokens> {
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.expose().to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| Error::Authentication(format!("Token refresh failed: {}", e)))?;

        // Google usually omits the refresh token on refresh.
        let new_refresh_token = token_result
            .refresh_token()
            .map(|t| SecretString::new(t.secret().clone()))
            .unwrap_or_else(|| refresh_token.clone());

        Ok(Tokens {
            access_token: SecretString::new(token_result.access_token().secret().clone()),
            refresh_token: new_refresh_token,
            expires_at: expiry(token_result.expires_in()),
        })
    }

    /// Get the current configuration.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

fn expiry(expires_in: Option<std::time::Duration>) -> DateTime<Utc> {
    let expires_in = expires_in.unwrap_or_else(|| std::time::Duration::from_secs(3600));
    Utc::now() + Duration::from_std(expires_in).unwrap_or_else(|_| Duration::hours(1))
}

/// On-disk JSON cache for tokens between runs.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load cached tokens. Returns `None` when no cache exists yet.
    pub fn load(&self) -> Result<Option<Tokens>> {
        match std::fs::read_to_string(&self.path) {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist tokens, creating the parent directory if needed.
    ///
    /// The file is written owner-only beside the destination, then renamed
    /// into place.
    pub fn save(&self, tokens: &Tokens) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let json = serde_json::to_string_pretty(tokens)?;
        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        staged.write_all(json.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Token manager that automatically refreshes expired tokens.
pub struct TokenManager {
    auth_manager: AuthManager,
    tokens: tokio::sync::RwLock<Tokens>,
    cache: Option<TokenCache>,
}

impl TokenManager {
    /// Create a new token manager with initial tokens.
    pub fn new(auth_manager: AuthManager, tokens: Tokens) -> Self {
        Self {
            auth_manager,
            tokens: tokio::sync::RwLock::new(tokens),
            cache: None,
        }
    }

    /// Write refreshed tokens back to this cache.
    pub fn with_cache(mut self, cache: TokenCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Get a valid access token, refreshing if necessary.
    ///
    /// # Errors
    /// - Token refresh failed
    pub async fn get_access_token(&self) -> Result<SecretString> {
        let tokens = self.tokens.read().await;

        if !tokens.is_expired() {
            return Ok(tokens.access_token.clone());
        }

        drop(tokens);

        let mut tokens = self.tokens.write().await;

        // Double-check after acquiring write lock
        if !tokens.is_expired() {
            return Ok(tokens.access_token.clone());
        }

        tracing::info!("Refreshing expired access token");

        let new_tokens = self
            .auth_manager
            .refresh_token(&tokens.refresh_token)
            .await?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save(&new_tokens) {
                tracing::warn!("Could not update token cache {}: {}", cache.path().display(), e);
            }
        }

        *tokens = new_tokens;

        Ok(tokens.access_token.clone())
    }

    /// Get the current tokens.
    pub async fn get_tokens(&self) -> Tokens {
        self.tokens.read().await.clone()
    }
}
