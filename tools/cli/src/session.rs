//! Credential provider: turns the OAuth client secret and token cache into
//! an authorized Drive client.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{info, warn};
use url::Url;

use classdrive_drive::{AuthConfig, AuthManager, DriveClient, TokenCache, TokenManager, Tokens};

use crate::config::AppConfig;

const CALLBACK_PAGE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nConnection: close\r\n\r\nclassdrive is authorized. You can close this tab.\n";

fn load_client(config: &AppConfig) -> Result<AuthConfig> {
    AuthConfig::from_client_secret_file(&config.credentials_path).with_context(|| {
        format!(
            "Failed to load OAuth client from {}",
            config.credentials_path.display()
        )
    })
}

/// Authorized Drive client. Runs the browser consent flow when no token is
/// cached yet.
pub async fn connect(config: &AppConfig) -> Result<DriveClient> {
    let client = load_client(config)?;
    let cache = TokenCache::new(&config.token_cache);

    let tokens = match cache.load().context("Failed to read token cache")? {
        Some(tokens) => tokens,
        None => {
            info!("No cached token at {}; starting browser consent", cache.path().display());
            authorize(client.clone(), &cache).await?
        }
    };

    let auth_manager = AuthManager::new(client)?;
    let token_manager = TokenManager::new(auth_manager, tokens).with_cache(cache);
    Ok(DriveClient::new(Arc::new(token_manager))?)
}

/// Run the consent flow from the client-secret file and cache the tokens.
pub async fn login(config: &AppConfig) -> Result<()> {
    let client = load_client(config)?;
    let cache = TokenCache::new(&config.token_cache);
    authorize(client, &cache).await?;
    println!("Token saved to {}", cache.path().display());
    Ok(())
}

/// Installed-application flow with a loopback redirect on a free port.
async fn authorize(client: AuthConfig, cache: &TokenCache) -> Result<Tokens> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("Failed to bind loopback port for the OAuth callback")?;
    let port = listener.local_addr()?.port();

    let manager = AuthManager::new(client.with_redirect_url(format!("http://127.0.0.1:{}", port)))?;
    let (auth_url, csrf) = manager.authorization_url();

    println!("Authorize classdrive in your browser:\n\n  {}\n", auth_url);
    if let Err(e) = open::that(&auth_url) {
        warn!("Could not open a browser: {}", e);
    }

    let code = wait_for_code(&listener, &csrf).await?;
    let tokens = manager
        .exchange_code(&code)
        .await
        .context("Failed to exchange authorization code")?;

    cache
        .save(&tokens)
        .with_context(|| format!("Failed to write token cache {}", cache.path().display()))?;
    info!("Cached token at {}", cache.path().display());
    Ok(tokens)
}

async fn wait_for_code(listener: &TcpListener, csrf: &str) -> Result<String> {
    loop {
        let (mut stream, _) = listener.accept().await?;
        let mut request_line = String::new();
        BufReader::new(&mut stream).read_line(&mut request_line).await?;

        let code = parse_callback(&request_line, csrf);
        if !matches!(code, Ok(None)) {
            stream.write_all(CALLBACK_PAGE.as_bytes()).await?;
        }
        if let Some(code) = code? {
            return Ok(code);
        }
    }
}

/// Extract the authorization code from the callback request line.
///
/// Returns `Ok(None)` for requests that are not the callback (e.g. favicon).
fn parse_callback(request_line: &str, csrf: &str) -> Result<Option<String>> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .context("Malformed OAuth callback request")?;
    let url = Url::parse(&format!("http://127.0.0.1{}", target))
        .context("Malformed OAuth callback URL")?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => bail!("Authorization was refused: {}", value),
            _ => {}
        }
    }

    let Some(code) = code else {
        return Ok(None);
    };
    if state.as_deref() != Some(csrf) {
        bail!("OAuth callback state does not match; try again");
    }
    Ok(Some(code))
}
