/// Map pane
///
/// iced has no embedded browser surface, so the generated page is shown in
/// the system browser. The pane keeps track of the served URL, reloads it
/// with a fresh revision after every search and draws the layer legends.
use iced::alignment::{Horizontal, Vertical};
use iced::widget::canvas::{self, Text};
use iced::widget::{button, canvas as canvas_widget, column, row, text};
use iced::{Element, Length, Pixels, Point, Rectangle, Size};

use crate::map::layers::{LayerStyle, ALL_STYLES};
use crate::state::data::Location;
use crate::Message;

pub struct MapView {
    url: Option<String>,
    revision: u64,
    location: Option<Location>,
    legend: Legend,
}

impl MapView {
    pub fn new() -> Self {
        Self { url: None, revision: 0, location: None, legend: Legend }
    }

    /// Point the view at the blank map
    pub fn show_blank_map(&mut self, url: String) {
        self.location = None;
        self.load(url);
    }

    /// Point the view at the freshly written overlay map
    pub fn reload_map(&mut self, url: String, location: Location) {
        self.location = Some(location);
        self.load(url);
    }

    fn load(&mut self, url: String) {
        self.revision += 1;
        // browsers cache the page by URL, the revision forces a refetch
        self.url = Some(format!("{url}?v={}", self.revision));
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Open the current map in the system browser
    pub fn open(&self) {
        let Some(url) = &self.url else {
            return;
        };
        match open::that_detached(url) {
            Ok(()) => log::info!("🌐 Opened {url}"),
            Err(e) => log::warn!("⚠️  Could not open browser for {url}: {e}"),
        }
    }

    pub fn view(&self) -> Element<Message> {
        let heading = match &self.location {
            Some(location) => format!(
                "{} ({:.4}, {:.4})",
                location.name, location.coordinate.lat, location.coordinate.lon
            ),
            None => "No location searched yet".to_string(),
        };

        column![
            text(heading).size(24),
            row![
                text(self.url().unwrap_or("map not served")).size(14),
                button("Open map").on_press_maybe(self.url().map(|_| Message::OpenMap)),
            ]
            .spacing(10),
            canvas_widget(&self.legend).width(Length::Fill).height(Length::Fixed(170.0)),
        ]
        .spacing(12)
        .padding(10)
        .into()
    }
}

/// Color ramps of the three overlays
pub struct Legend;

const RAMP_STEPS: usize = 64;
const RAMP_HEIGHT: f32 = 16.0;
const ROW_HEIGHT: f32 = 54.0;

impl canvas::Program<Message> for Legend {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &iced::Renderer,
        theme: &iced::Theme,
        bounds: Rectangle,
        _cursor: iced::mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        let ink = theme.palette().text;
        let width = bounds.width.max(1.0);

        for (i, style) in ALL_STYLES.iter().enumerate() {
            let top = i as f32 * ROW_HEIGHT;
            draw_ramp(&mut frame, style, top + 18.0, width);

            let caption = |content: String, x: f32, h: Horizontal| Text {
                content,
                position: Point::new(x, top),
                color: ink,
                size: Pixels(13.0),
                horizontal_alignment: h,
                vertical_alignment: Vertical::Top,
                ..Text::default()
            };
            frame.fill_text(caption(style.name.to_string(), 0.0, Horizontal::Left));
            frame.fill_text(caption(format!("{} – {}", style.min, style.max), width, Horizontal::Right));
        }

        vec![frame.into_geometry()]
    }
}

fn draw_ramp(frame: &mut canvas::Frame, style: &LayerStyle, top: f32, width: f32) {
    let step = width / RAMP_STEPS as f32;
    for s in 0..RAMP_STEPS {
        let t = s as f32 / (RAMP_STEPS - 1) as f32;
        frame.fill_rectangle(
            Point::new(s as f32 * step, top),
            Size::new(step + 0.5, RAMP_HEIGHT),
            style.color_at(t),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::Coordinate;

    #[test]
    fn test_starts_without_map() {
        let view = MapView::new();
        assert!(view.url().is_none());
    }

    #[test]
    fn test_reload_bumps_revision() {
        let mut view = MapView::new();
        view.show_blank_map("http://localhost:8000/map.html".to_string());
        assert_eq!(view.url(), Some("http://localhost:8000/map.html?v=1"));

        let location = Location { name: "Singapore".to_string(), coordinate: Coordinate::new(1.35, 103.82) };
        view.reload_map("http://localhost:8000/map.html".to_string(), location.clone());
        assert_eq!(view.url(), Some("http://localhost:8000/map.html?v=2"));
        assert_eq!(view.location, Some(location));
    }
}
