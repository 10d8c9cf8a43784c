/// Earth Engine access
///
/// This module handles:
/// - Building server-side expressions (expr.rs)
/// - OAuth access tokens (auth.rs)
/// - REST calls for values and map tiles (client.rs)
/// - The NDVI / NO2 / UHII index calculator (indices.rs)

pub mod auth;
pub mod client;
pub mod expr;
pub mod indices;
