/// Search pipeline
///
/// geocode → compute indices → write the map file. A failed geocode stops
/// the pipeline before any imagery request is made.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::earth::client::EarthEngineError;
use crate::earth::indices::IndexSource;
use crate::geocoder::{Geocode, GeocodeError};
use crate::map::html::{write_map, MapContent, MapError};
use crate::state::data::{IndexResult, Location, TimePeriod};

/// Message shown for every geocoding failure
pub const LOCATION_NOT_FOUND: &str = "Failed to find location";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Failed to find location")]
    Geocode(#[source] GeocodeError),
    #[error("{0}")]
    Indices(#[from] EarthEngineError),
    #[error("{0}")]
    Map(#[from] MapError),
}

/// A search as submitted from the UI
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub place: String,
    pub period: TimePeriod,
}

impl SearchRequest {
    /// Row label in the comparison table, e.g. "Singapore202410"
    pub fn label(&self) -> String {
        format!("{}{}", self.place.trim(), self.period.label_suffix())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub request: SearchRequest,
    pub location: Location,
    pub indices: IndexResult,
}

/// Where and how the map file is written
#[derive(Debug, Clone)]
pub struct MapTarget {
    pub path: PathBuf,
    pub zoom: u8,
}

pub struct Services<G, I> {
    pub geocoder: G,
    pub indices: I,
    pub map: MapTarget,
}

pub async fn run<G: Geocode, I: IndexSource>(
    services: Arc<Services<G, I>>,
    request: SearchRequest,
) -> Result<SearchOutcome, SearchError> {
    log::info!("🔍 Searching {:?} for {}-{:02}", request.place, request.period.year, request.period.month);

    let coordinate = services.geocoder.resolve(&request.place).await.map_err(|e| {
        log::warn!("⚠️  Geocoding {:?} failed: {e}", request.place);
        SearchError::Geocode(e)
    })?;
    log::info!("📍 {} resolved to ({:.4}, {:.4})", request.place, coordinate.lat, coordinate.lon);

    let indices = services.indices.compute(coordinate, request.period).await?;

    write_map(
        &services.map.path,
        &MapContent::Overlays { center: coordinate, zoom: services.map.zoom, tiles: &indices.tiles },
    )?;

    Ok(SearchOutcome {
        location: Location { name: request.place.trim().to_string(), coordinate },
        request,
        indices,
    })
}
