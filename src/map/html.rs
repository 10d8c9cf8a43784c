/// Map file generation
///
/// The map is a single Leaflet HTML page: an OpenStreetMap basemap plus,
/// after a search, the three Earth Engine tile overlays clipped to the AOI.
/// The file is replaced atomically so the file server never serves a
/// half-written page.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::layers::{LayerStyle, NDVI_STYLE, NO2_STYLE, THERMAL_STYLE};
use crate::state::data::{AreaOfInterest, Coordinate, LayerTiles};

const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";
const OSM_TILES: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";
const OSM_ATTRIBUTION: &str = "&copy; OpenStreetMap contributors";

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to write map file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// What the map page shows
#[derive(Debug, Clone, PartialEq)]
pub enum MapContent<'a> {
    /// World view with the basemap only
    Blank,
    Overlays {
        center: Coordinate,
        zoom: u8,
        tiles: &'a LayerTiles,
    },
}

pub fn render(content: &MapContent) -> String {
    let (view, overlays) = match content {
        MapContent::Blank => ("map.setView([20, 0], 2);".to_string(), String::new()),
        MapContent::Overlays { center, zoom, tiles } => {
            let aoi = AreaOfInterest::around(*center);
            let view = format!("map.setView([{}, {}], {});", center.lat, center.lon, zoom);
            let layers = [(&NDVI_STYLE, &tiles.ndvi), (&NO2_STYLE, &tiles.no2), (&THERMAL_STYLE, &tiles.thermal)]
                .iter()
                .map(|(style, url)| overlay_js(style, url))
                .collect::<String>();
            let outline = format!(
                "L.rectangle([[{}, {}], [{}, {}]], {{color: '#333', weight: 1, fill: false}}).addTo(map);\n",
                aoi.south(),
                aoi.west(),
                aoi.north(),
                aoi.east()
            );
            (view, layers + &outline)
        }
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>GUSI map</title>
<link rel="stylesheet" href="{LEAFLET_CSS}">
<script src="{LEAFLET_JS}"></script>
<style>html, body, #map {{ height: 100%; margin: 0; }}</style>
</head>
<body>
<div id="map"></div>
<script>
var map = L.map('map');
{view}
L.tileLayer('{OSM_TILES}', {{maxZoom: 19, attribution: '{OSM_ATTRIBUTION}'}}).addTo(map);
var overlays = {{}};
{overlays}L.control.layers(null, overlays, {{collapsed: false}}).addTo(map);
L.control.scale().addTo(map);
</script>
</body>
</html>
"#
    )
}

fn overlay_js(style: &LayerStyle, url: &str) -> String {
    format!(
        "overlays['{name}'] = L.tileLayer('{url}', {{opacity: {opacity}, attribution: 'Google Earth Engine'}}).addTo(map);\n",
        name = style.name,
        url = url.replace('\'', "%27"),
        opacity = style.opacity,
    )
}

/// Write the page to `path`, replacing any previous file
pub fn write_map(path: &Path, content: &MapContent) -> Result<(), MapError> {
    let html = render(content);
    let tmp = temp_path(path);
    let to_error = |source| MapError::Write { path: path.display().to_string(), source };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(to_error)?;
    }
    fs::write(&tmp, html).map_err(to_error)?;
    fs::rename(&tmp, path).map_err(to_error)?;

    log::info!("🗺️  Map written to {}", path.display());
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiles() -> LayerTiles {
        LayerTiles {
            ndvi: "https://ee/v1/projects/p/maps/ndvi/tiles/{z}/{x}/{y}".to_string(),
            no2: "https://ee/v1/projects/p/maps/no2/tiles/{z}/{x}/{y}".to_string(),
            thermal: "https://ee/v1/projects/p/maps/swir/tiles/{z}/{x}/{y}".to_string(),
        }
    }

    #[test]
    fn test_blank_map_has_no_overlays() {
        let html = render(&MapContent::Blank);
        assert!(html.contains("L.map('map')"));
        assert!(html.contains("tile.openstreetmap.org"));
        assert!(!html.contains("overlays['"));
    }

    #[test]
    fn test_overlay_map_has_three_layers_and_center() {
        let tiles = tiles();
        let html = render(&MapContent::Overlays {
            center: Coordinate::new(1.5, 103.75),
            zoom: 12,
            tiles: &tiles,
        });

        assert!(html.contains("map.setView([1.5, 103.75], 12);"));
        for (name, url) in [("NDVI", &tiles.ndvi), ("NO2 Concentration", &tiles.no2), ("Land Surface Temperature", &tiles.thermal)] {
            assert!(html.contains(&format!("overlays['{name}'] = L.tileLayer('{url}'")), "missing {name}");
        }
        assert!(html.contains("opacity: 0.8"));
        assert!(html.contains("L.rectangle([[1, 103.25], [2, 104.25]]"));
    }

    #[test]
    fn test_write_map_replaces_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.html");
        let tiles = tiles();

        write_map(&path, &MapContent::Blank).unwrap();
        write_map(
            &path,
            &MapContent::Overlays { center: Coordinate::new(0.0, 0.0), zoom: 12, tiles: &tiles },
        )
        .unwrap();

        let html = fs::read_to_string(&path).unwrap();
        assert!(html.contains("overlays['NDVI']"));
        assert!(!temp_path(&path).exists());
    }
}
