/// Place name → coordinate resolution
///
/// Uses the Google Geocoding web service. One attempt per search, no retry.
/// Every failure comes back as a [`GeocodeError`] so the caller can tell a
/// missing place from an unavailable service, even though the UI shows the
/// same message for all of them.
///
/// See <https://developers.google.com/maps/documentation/geocoding/requests-geocoding>

use std::future::Future;
use thiserror::Error;

use crate::config::GeocodingConfig;
use crate::state::data::Coordinate;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("no place matches {0:?}")]
    NotFound(String),
    #[error("geocoding quota exceeded")]
    QuotaExceeded,
    #[error("geocoding request denied: {0}")]
    RequestDenied(String),
    #[error("invalid geocoding request: {0}")]
    InvalidRequest(String),
    #[error("geocoding HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected geocoding response: {0}")]
    Parse(String),
}

/// Anything that can turn a place name into a coordinate
pub trait Geocode: Send + Sync {
    fn resolve(&self, place: &str) -> impl Future<Output = Result<Coordinate, GeocodeError>> + Send;
}

pub struct GoogleGeocoder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(client: reqwest::Client, config: &GeocodingConfig) -> Self {
        if config.api_key.is_empty() {
            log::warn!("⚠️  No geocoding API key configured, every lookup will be denied");
        }
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

impl Geocode for GoogleGeocoder {
    async fn resolve(&self, place: &str) -> Result<Coordinate, GeocodeError> {
        let place = place.trim();
        if place.is_empty() {
            return Err(GeocodeError::InvalidRequest("empty place name".to_string()));
        }

        let body: serde_json::Value = self
            .client
            .get(&self.endpoint)
            .query(&[("address", place), ("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_response(place, &body)
    }
}

/// Parses a Geocoding API JSON response, taking the first candidate
fn parse_response(place: &str, body: &serde_json::Value) -> Result<Coordinate, GeocodeError> {
    let status = body["status"]
        .as_str()
        .ok_or_else(|| GeocodeError::Parse("missing status".to_string()))?;
    let message = || body["error_message"].as_str().unwrap_or(status).to_string();

    match status {
        "OK" => {}
        "ZERO_RESULTS" => return Err(GeocodeError::NotFound(place.to_string())),
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => return Err(GeocodeError::QuotaExceeded),
        "REQUEST_DENIED" => return Err(GeocodeError::RequestDenied(message())),
        "INVALID_REQUEST" => return Err(GeocodeError::InvalidRequest(message())),
        other => return Err(GeocodeError::Parse(format!("status {other}"))),
    }

    let location = &body["results"][0]["geometry"]["location"];
    let lat = location["lat"]
        .as_f64()
        .ok_or_else(|| GeocodeError::Parse("missing lat".to_string()))?;
    let lon = location["lng"]
        .as_f64()
        .ok_or_else(|| GeocodeError::Parse("missing lng".to_string()))?;

    Ok(Coordinate::new(lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_result() {
        let body = serde_json::json!({
            "status": "OK",
            "results": [
                { "geometry": { "location": { "lat": 1.352083, "lng": 103.819836 } } },
                { "geometry": { "location": { "lat": 0.0, "lng": 0.0 } } }
            ]
        });
        let coordinate = parse_response("Singapore", &body).unwrap();
        assert!((coordinate.lat - 1.352083).abs() < 1e-9);
        assert!((coordinate.lon - 103.819836).abs() < 1e-9);
    }

    #[test]
    fn zero_results_is_not_found() {
        let body = serde_json::json!({ "status": "ZERO_RESULTS", "results": [] });
        assert!(matches!(
            parse_response("qwzx", &body),
            Err(GeocodeError::NotFound(place)) if place == "qwzx"
        ));
    }

    #[test]
    fn service_statuses_are_distinguished() {
        let quota = serde_json::json!({ "status": "OVER_QUERY_LIMIT" });
        assert!(matches!(parse_response("x", &quota), Err(GeocodeError::QuotaExceeded)));

        let denied = serde_json::json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid."
        });
        assert!(matches!(
            parse_response("x", &denied),
            Err(GeocodeError::RequestDenied(msg)) if msg.contains("API key")
        ));
    }

    #[test]
    fn malformed_response_is_parse_error() {
        let body = serde_json::json!({ "status": "OK", "results": [] });
        assert!(matches!(parse_response("x", &body), Err(GeocodeError::Parse(_))));
        assert!(matches!(parse_response("x", &serde_json::json!([])), Err(GeocodeError::Parse(_))));
    }

    #[tokio::test]
    async fn empty_place_fails_without_request() {
        let geocoder = GoogleGeocoder::new(
            reqwest::Client::new(),
            &GeocodingConfig {
                endpoint: "http://127.0.0.1:9/unreachable".to_string(),
                api_key: String::new(),
            },
        );
        assert!(matches!(geocoder.resolve("   ").await, Err(GeocodeError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn unreachable_service_is_an_error_not_a_panic() {
        let geocoder = GoogleGeocoder::new(
            reqwest::Client::new(),
            &GeocodingConfig {
                endpoint: "http://127.0.0.1:9/unreachable".to_string(),
                api_key: "key".to_string(),
            },
        );
        assert!(matches!(geocoder.resolve("Singapore").await, Err(GeocodeError::Http(_))));
    }
}
