/// State management module
///
/// This module handles all application state, including:
/// - Shared data structures (data.rs)
/// - The comparison dataset behind the charts (comparison.rs)

pub mod comparison;
pub mod data;
