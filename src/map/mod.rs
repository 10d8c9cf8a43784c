/// Map output module
///
/// This module handles:
/// - Fixed styles of the three overlays (layers.rs)
/// - Writing the Leaflet map page (html.rs)
/// - Serving it over localhost (server.rs)

pub mod html;
pub mod layers;
pub mod server;
