/// UI widgets
///
/// - Year/month selector (time.rs)
/// - NDVI/UHII comparison charts (chart.rs)
/// - Map pane with layer legends (map_view.rs)

pub mod chart;
pub mod map_view;
pub mod time;
