/// Earth Engine REST client
///
/// Two endpoints are used:
/// - `projects/{project}/value:compute` evaluates an expression to JSON
/// - `projects/{project}/maps` registers a visualized image and returns
///   the map name tiles are fetched under
///
/// See <https://developers.google.com/earth-engine/reference/rest>

use serde_json::{json, Value};
use thiserror::Error;

use super::auth::{AuthError, TokenProvider};
use super::expr::{Expr, Image};
use crate::config::EarthEngineConfig;
use crate::map::layers::LayerStyle;

#[derive(Debug, Error)]
pub enum EarthEngineError {
    #[error("Earth Engine authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("no Earth Engine project configured (earth_engine.project, GUSI_EE_PROJECT or the cached credentials)")]
    NoProject,
    #[error("Earth Engine returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Earth Engine request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Earth Engine result has no value for {0} (empty or fully masked region?)")]
    MissingValue(String),
}

pub struct EarthEngineClient {
    http: reqwest::Client,
    api_url: String,
    project: String,
    tokens: TokenProvider,
}

impl EarthEngineClient {
    pub fn new(http: reqwest::Client, config: &EarthEngineConfig) -> Self {
        Self {
            tokens: TokenProvider::new(http.clone(), config),
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            project: config.project.clone(),
        }
    }

    /// Configured project, else the one the cached credentials were created for
    fn project(&self) -> Result<String, EarthEngineError> {
        if !self.project.is_empty() {
            return Ok(self.project.clone());
        }
        self.tokens.credentials_project().ok_or(EarthEngineError::NoProject)
    }

    fn project_url(&self, suffix: &str) -> Result<String, EarthEngineError> {
        Ok(format!("{}/projects/{}/{}", self.api_url, self.project()?, suffix))
    }

    async fn post(&self, url: String, body: Value) -> Result<Value, EarthEngineError> {
        let token = self.tokens.access_token().await?;
        let response = self.http.post(url).bearer_auth(token).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }
        Ok(response.json().await?)
    }

    /// Evaluate an expression and return its JSON result
    pub async fn compute_value(&self, expr: &Expr) -> Result<Value, EarthEngineError> {
        let url = self.project_url("value:compute")?;
        let mut payload = self.post(url, json!({ "expression": expr.to_expression() })).await?;
        Ok(payload["result"].take())
    }

    /// Evaluate an expression expected to produce a number
    pub async fn compute_number(&self, what: &str, expr: &Expr) -> Result<f64, EarthEngineError> {
        self.compute_value(expr)
            .await?
            .as_f64()
            .ok_or_else(|| EarthEngineError::MissingValue(what.to_string()))
    }

    /// Register a styled image and return its XYZ tile URL template
    pub async fn create_map(&self, image: &Image, style: &LayerStyle) -> Result<String, EarthEngineError> {
        let url = self.project_url("maps")?;
        let payload = self.post(url, map_request(image, style)).await?;
        let name = payload["name"]
            .as_str()
            .ok_or_else(|| EarthEngineError::MissingValue(format!("map name of {}", style.name)))?;
        Ok(tile_url(&self.api_url, name))
    }
}

fn map_request(image: &Image, style: &LayerStyle) -> Value {
    json!({
        "expression": image.expr().to_expression(),
        "fileFormat": "PNG",
        "visualizationOptions": {
            "ranges": [{ "min": style.min, "max": style.max }],
            "paletteColors": style.palette_hex(),
        },
    })
}

fn tile_url(api_url: &str, map_name: &str) -> String {
    format!("{api_url}/{map_name}/tiles/{{z}}/{{x}}/{{y}}")
}

/// Error bodies are usually `{"error": {"message": ..}}`, but proxies answer with HTML or plain text
fn api_error(status: u16, body: &str) -> EarthEngineError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|payload| payload["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.trim().to_string());
    EarthEngineError::Api { status, message }
}
