/// Earth Engine OAuth access tokens
///
/// Tokens come from the refresh token cached by `earthengine authenticate`
/// (`~/.config/earthengine/credentials`). If that file is missing or the
/// refresh token is rejected, one interactive authorization is attempted:
/// the consent page opens in the browser and the redirect is caught on a
/// loopback port. The new refresh token is written back to the cache.

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};

use crate::config::EarthEngineConfig;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const SCOPES: &str = "https://www.googleapis.com/auth/earthengine https://www.googleapis.com/auth/cloud-platform";

/// Refresh this long before the token actually expires
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
/// How long to wait for the user to finish the consent page
const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);
/// Upper bound for the redirect listener to drain its connections
const LISTENER_DRAIN: Duration = Duration::from_secs(5);

const PAGE_WAITING: &str = "Waiting for Earth Engine authorization...";
const PAGE_DONE: &str = "Authorization complete. You can close this tab.";
const PAGE_FAILED: &str = "Authorization failed. Check the application log.";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no cached credentials at {0}")]
    MissingCredentials(String),
    #[error("failed to access credentials: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid credentials file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("token endpoint returned {status}: {body}")]
    Token { status: u16, body: String },
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("interactive authorization failed: {0}")]
    Interactive(String),
}

/// Cached credentials, compatible with the file written by the Earth Engine CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_at: Instant,
}

pub struct TokenProvider {
    client: reqwest::Client,
    credentials_path: PathBuf,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    pub fn new(client: reqwest::Client, config: &EarthEngineConfig) -> Self {
        let credentials_path = config
            .credentials_path
            .clone()
            .unwrap_or_else(default_credentials_path);
        Self {
            client,
            credentials_path,
            client_id: config.oauth_client_id.clone(),
            client_secret: config.oauth_client_secret.clone(),
            cached: Mutex::new(None),
        }
    }

    /// Project named in the cached credentials, if any
    pub fn credentials_project(&self) -> Option<String> {
        load_credentials(&self.credentials_path)
            .ok()
            .and_then(|c| c.project)
            .filter(|p| !p.is_empty())
    }

    /// Return a valid bearer token, refreshing or re-authorizing as needed
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + EXPIRY_MARGIN {
                return Ok(token.token.clone());
            }
        }

        let token = match self.refresh_from_cache().await {
            Ok(token) => token,
            Err(e) => {
                log::warn!("⚠️  Cached Earth Engine credentials unusable ({e}), starting interactive authorization");
                let credentials = self.authorize_interactively().await?;
                save_credentials(&self.credentials_path, &credentials)?;
                self.refresh(&credentials).await?
            }
        };

        *cached = Some(token.clone());
        Ok(token.token)
    }

    async fn refresh_from_cache(&self) -> Result<AccessToken, AuthError> {
        let credentials = load_credentials(&self.credentials_path)?;
        self.refresh(&credentials).await
    }

    async fn refresh(&self, credentials: &StoredCredentials) -> Result<AccessToken, AuthError> {
        let client_id = credentials.client_id.as_deref().unwrap_or(&self.client_id);
        let client_secret = credentials.client_secret.as_deref().unwrap_or(&self.client_secret);
        let response = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", credentials.refresh_token.as_str()),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .await?;
        log::info!("🔑 Earth Engine access token refreshed");
        Ok(AccessToken {
            token: response.access_token,
            expires_at: Instant::now() + Duration::from_secs(response.expires_in),
        })
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self.client.post(TOKEN_URL).form(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Token { status: status.as_u16(), body });
        }
        Ok(response.json().await?)
    }

    /// Browser consent flow with a loopback redirect
    async fn authorize_interactively(&self) -> Result<StoredCredentials, AuthError> {
        if self.client_id.is_empty() {
            return Err(AuthError::Interactive(
                "no OAuth client configured (earth_engine.oauth_client_id)".to_string(),
            ));
        }

        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let redirect_uri = format!("http://127.0.0.1:{}", listener.local_addr()?.port());
        let state = consent_state();

        let mut url = reqwest::Url::parse(AUTH_URL)
            .map_err(|e| AuthError::Interactive(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", SCOPES)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", &state);

        log::info!("🌐 Opening browser for Earth Engine authorization");
        open::that_detached(url.as_str())?;

        let code = tokio::time::timeout(CONSENT_TIMEOUT, receive_code(listener, state))
            .await
            .map_err(|_| AuthError::Interactive("timed out waiting for consent".to_string()))??;

        let response = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .await?;

        let refresh_token = response
            .refresh_token
            .ok_or_else(|| AuthError::Interactive("no refresh token granted".to_string()))?;

        Ok(StoredCredentials {
            refresh_token,
            client_id: Some(self.client_id.clone()),
            client_secret: Some(self.client_secret.clone()),
            project: None,
        })
    }
}

fn default_credentials_path() -> PathBuf {
    let mut path = dirs::home_dir().unwrap_or_default();
    path.push(".config");
    path.push("earthengine");
    path.push("credentials");
    path
}

fn consent_state() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{:x}{:x}", nanos, std::process::id())
}

pub fn load_credentials(path: &Path) -> Result<StoredCredentials, AuthError> {
    if !path.exists() {
        return Err(AuthError::MissingCredentials(path.display().to_string()));
    }
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn save_credentials(path: &Path, credentials: &StoredCredentials) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(credentials)?)?;
    log::info!("💾 Earth Engine credentials saved to {}", path.display());
    Ok(())
}

/// Query of the OAuth redirect, e.g. `/?state=..&code=..&scope=..`
#[derive(Debug, Default, Deserialize)]
struct RedirectParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Shared by the redirect handler; the first real redirect takes the sender
struct Consent {
    expected_state: String,
    result: std::sync::Mutex<Option<oneshot::Sender<Result<String, AuthError>>>>,
}

impl Consent {
    fn deliver(&self, result: Result<String, AuthError>) {
        let sender = self.result.lock().ok().and_then(|mut slot| slot.take());
        match sender {
            Some(sender) => {
                let _ = sender.send(result);
            }
            None => log::warn!("Ignoring repeated authorization redirect"),
        }
    }
}

async fn redirect(State(consent): State<Arc<Consent>>, Query(params): Query<RedirectParams>) -> Html<&'static str> {
    // favicon probes, reloads and the like carry neither a code nor an error
    if params.code.is_none() && params.error.is_none() {
        return Html(PAGE_WAITING);
    }
    let result = check_redirect(params, &consent.expected_state);
    let page = if result.is_ok() { PAGE_DONE } else { PAGE_FAILED };
    consent.deliver(result);
    Html(page)
}

/// Serve the loopback redirect until the authorization code arrives
async fn receive_code(listener: TcpListener, expected_state: String) -> Result<String, AuthError> {
    let (result_tx, result_rx) = oneshot::channel();
    let consent = Arc::new(Consent {
        expected_state,
        result: std::sync::Mutex::new(Some(result_tx)),
    });
    let app = Router::new().route("/", get(redirect)).with_state(consent);

    let (shutdown, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let result = result_rx
        .await
        .map_err(|_| AuthError::Interactive("redirect listener stopped".to_string()));

    let _ = shutdown.send(());
    match tokio::time::timeout(LISTENER_DRAIN, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => log::warn!("⚠️  Redirect listener failed: {e}"),
        Ok(Err(e)) => log::warn!("⚠️  Redirect listener task failed: {e}"),
        Err(_) => log::warn!("⚠️  Redirect listener did not drain in time"),
    }

    result?
}

fn check_redirect(params: RedirectParams, expected_state: &str) -> Result<String, AuthError> {
    if let Some(error) = params.error {
        return Err(AuthError::Interactive(format!("consent denied: {error}")));
    }
    if params.state.as_deref() != Some(expected_state) {
        return Err(AuthError::Interactive("state mismatch in redirect".to_string()));
    }
    params
        .code
        .ok_or_else(|| AuthError::Interactive("redirect carried no code".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(state: Option<&str>, code: Option<&str>, error: Option<&str>) -> RedirectParams {
        RedirectParams {
            state: state.map(String::from),
            code: code.map(String::from),
            error: error.map(String::from),
        }
    }

    #[test]
    fn test_check_redirect_extracts_code() {
        let code = check_redirect(params(Some("abc"), Some("4/0Ad-xyz"), None), "abc").unwrap();
        assert_eq!(code, "4/0Ad-xyz");
    }

    #[test]
    fn test_check_redirect_rejects_wrong_state_and_errors() {
        assert!(matches!(
            check_redirect(params(Some("other"), Some("x"), None), "abc"),
            Err(AuthError::Interactive(_))
        ));
        assert!(matches!(
            check_redirect(params(Some("abc"), None, Some("access_denied")), "abc"),
            Err(AuthError::Interactive(msg)) if msg.contains("access_denied")
        ));
        assert!(check_redirect(params(Some("abc"), None, None), "abc").is_err());
    }

    #[tokio::test]
    async fn test_receive_code_survives_idle_connections() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let receiver = tokio::spawn(receive_code(listener, "abc".to_string()));

        // browsers open speculative connections that never send a request
        let idle = tokio::net::TcpStream::connect(addr).await.unwrap();
        drop(idle);

        // a request without code or error does not end the flow
        let waiting = reqwest::get(format!("http://{addr}/")).await.unwrap().text().await.unwrap();
        assert_eq!(waiting, PAGE_WAITING);

        let page = reqwest::get(format!("http://{addr}/?state=abc&code=good&scope=earthengine"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(page, PAGE_DONE);

        assert_eq!(receiver.await.unwrap().unwrap(), "good");
    }

    #[tokio::test]
    async fn test_receive_code_reports_denied_consent() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let receiver = tokio::spawn(receive_code(listener, "abc".to_string()));

        let page = reqwest::get(format!("http://{addr}/?state=abc&error=access_denied"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(page, PAGE_FAILED);
        assert!(matches!(receiver.await.unwrap(), Err(AuthError::Interactive(_))));
    }

    #[test]
    fn test_credentials_project_is_exposed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials");
        let provider = TokenProvider::new(reqwest::Client::new(), &EarthEngineConfig {
            credentials_path: Some(path.clone()),
            ..EarthEngineConfig::default()
        });
        assert_eq!(provider.credentials_project(), None);

        std::fs::write(&path, r#"{"refresh_token": "x", "project": "demo"}"#).unwrap();
        assert_eq!(provider.credentials_project().as_deref(), Some("demo"));
    }

    #[test]
    fn test_credentials_roundtrip_with_cli_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("earthengine").join("credentials");

        assert!(matches!(load_credentials(&path), Err(AuthError::MissingCredentials(_))));

        // The CLI writes extra fields such as scopes; they are ignored
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"refresh_token": "1//abc", "scopes": ["x"], "project": "demo"}"#,
        )
        .unwrap();
        let loaded = load_credentials(&path).unwrap();
        assert_eq!(loaded.refresh_token, "1//abc");
        assert_eq!(loaded.project.as_deref(), Some("demo"));
        assert!(loaded.client_id.is_none());

        save_credentials(&path, &loaded).unwrap();
        assert_eq!(load_credentials(&path).unwrap(), loaded);
    }

    #[tokio::test]
    async fn test_interactive_flow_requires_client_id() {
        let provider = TokenProvider::new(reqwest::Client::new(), &EarthEngineConfig {
            credentials_path: Some(PathBuf::from("/nonexistent/gusi/credentials")),
            ..EarthEngineConfig::default()
        });
        assert!(matches!(provider.access_token().await, Err(AuthError::Interactive(_))));
    }
}
