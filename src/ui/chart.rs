/// Comparison bar charts
/// One bar per city, NDVI and UHII on separate tabs
use iced::alignment::{Horizontal, Vertical};
use iced::widget::canvas::{self, Cache, Path, Stroke, Text};
use iced::widget::{button, canvas as canvas_widget, column, row};
use iced::{Color, Element, Length, Pixels, Point, Rectangle, Size, Vector};

use crate::state::data::ComparisonRow;
use crate::Message;

const NDVI_COLOR: Color = Color::from_rgb(0.12, 0.47, 0.71); // tab:blue
const UHII_COLOR: Color = Color::from_rgb(0.84, 0.15, 0.16); // tab:red

/// Space reserved around the plot area for title, axis and labels
const MARGIN_LEFT: f32 = 70.0;
const MARGIN_RIGHT: f32 = 20.0;
const MARGIN_TOP: f32 = 40.0;
const MARGIN_BOTTOM: f32 = 110.0;
const Y_TICKS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Ndvi,
    Uhii,
}

impl Metric {
    fn value(&self, row: &ComparisonRow) -> f64 {
        match self {
            Metric::Ndvi => row.ndvi,
            Metric::Uhii => row.uhii,
        }
    }

    fn color(&self) -> Color {
        match self {
            Metric::Ndvi => NDVI_COLOR,
            Metric::Uhii => UHII_COLOR,
        }
    }

    fn axis_label(&self) -> &'static str {
        match self {
            Metric::Ndvi => "NDVI",
            Metric::Uhii => "UHII base on SWIR",
        }
    }

    fn title(&self, period: &str) -> String {
        match self {
            Metric::Ndvi => format!("NDVI Comparison({period})"),
            Metric::Uhii => format!("UHII Comparison base on SWIR({period})"),
        }
    }
}

/// A bar positioned in plot coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct BarRect {
    pub label: String,
    pub top_left: Point,
    pub size: Size,
}

/// Value range of the y axis. Always includes zero.
fn y_range(values: &[f64]) -> (f64, f64) {
    let max = values.iter().copied().fold(0.0, f64::max);
    let min = values.iter().copied().fold(0.0, f64::min);
    if max - min <= f64::EPSILON {
        (min, min + 1.0)
    } else {
        (min, max)
    }
}

/// Place one bar per row inside `plot`
pub fn layout(rows: &[(String, f64)], plot: Rectangle) -> Vec<BarRect> {
    if rows.is_empty() {
        return Vec::new();
    }
    let values: Vec<f64> = rows.iter().map(|(_, v)| *v).collect();
    let (lo, hi) = y_range(&values);
    let to_y = |v: f64| plot.y + plot.height * (1.0 - ((v - lo) / (hi - lo)) as f32);
    let zero_y = to_y(0.0);

    let slot = plot.width / rows.len() as f32;
    let bar_width = slot * 0.8;

    rows.iter()
        .enumerate()
        .map(|(i, (label, value))| {
            let y = to_y(*value);
            let x = plot.x + slot * i as f32 + (slot - bar_width) / 2.0;
            BarRect {
                label: label.clone(),
                top_left: Point::new(x, y.min(zero_y)),
                size: Size::new(bar_width, (zero_y - y).abs()),
            }
        })
        .collect()
}

pub struct BarChart {
    metric: Metric,
    title: String,
    rows: Vec<(String, f64)>,
    cache: Cache,
}

impl BarChart {
    pub fn new(metric: Metric, period: &str) -> Self {
        Self { metric, title: metric.title(period), rows: Vec::new(), cache: Cache::new() }
    }

    /// Replace the chart contents. Nothing of the previous drawing is kept.
    pub fn redraw(&mut self, rows: &[ComparisonRow]) {
        self.rows = rows.iter().map(|r| (r.city.clone(), self.metric.value(r))).collect();
        self.cache.clear();
    }

    pub fn bars(&self, bounds: Size) -> Vec<BarRect> {
        layout(&self.rows, plot_area(bounds))
    }
}

fn plot_area(bounds: Size) -> Rectangle {
    Rectangle {
        x: MARGIN_LEFT,
        y: MARGIN_TOP,
        width: (bounds.width - MARGIN_LEFT - MARGIN_RIGHT).max(1.0),
        height: (bounds.height - MARGIN_TOP - MARGIN_BOTTOM).max(1.0),
    }
}

fn label_text(content: String, position: Point, color: Color, h: Horizontal, v: Vertical) -> Text {
    Text {
        content,
        position,
        color,
        size: Pixels(12.0),
        horizontal_alignment: h,
        vertical_alignment: v,
        ..Text::default()
    }
}

impl canvas::Program<Message> for BarChart {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &iced::Renderer,
        theme: &iced::Theme,
        bounds: Rectangle,
        _cursor: iced::mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        let geometry = self.cache.draw(renderer, bounds.size(), |frame| {
            let ink = theme.palette().text;
            let plot = plot_area(bounds.size());
            let color = self.metric.color();

            frame.fill_text(Text {
                size: Pixels(16.0),
                ..label_text(
                    self.title.clone(),
                    Point::new(bounds.width / 2.0, MARGIN_TOP / 2.0),
                    ink,
                    Horizontal::Center,
                    Vertical::Center,
                )
            });

            // y axis label, rotated
            frame.with_save(|frame| {
                frame.translate(Vector::new(16.0, plot.y + plot.height / 2.0));
                frame.rotate(-std::f32::consts::FRAC_PI_2);
                frame.fill_text(label_text(
                    self.metric.axis_label().to_string(),
                    Point::ORIGIN,
                    color,
                    Horizontal::Center,
                    Vertical::Center,
                ));
            });

            let values: Vec<f64> = self.rows.iter().map(|(_, v)| *v).collect();
            let (lo, hi) = y_range(&values);

            // axes and ticks
            let axes = Path::new(|p| {
                p.move_to(Point::new(plot.x, plot.y));
                p.line_to(Point::new(plot.x, plot.y + plot.height));
                p.line_to(Point::new(plot.x + plot.width, plot.y + plot.height));
            });
            frame.stroke(&axes, Stroke::default().with_color(ink).with_width(1.0));

            for i in 0..=Y_TICKS {
                let t = i as f64 / Y_TICKS as f64;
                let value = lo + (hi - lo) * t;
                let y = plot.y + plot.height * (1.0 - t as f32);
                frame.stroke(
                    &Path::line(Point::new(plot.x - 4.0, y), Point::new(plot.x, y)),
                    Stroke::default().with_color(ink).with_width(1.0),
                );
                frame.fill_text(label_text(
                    format_tick(value, hi - lo),
                    Point::new(plot.x - 6.0, y),
                    color,
                    Horizontal::Right,
                    Vertical::Center,
                ));
            }

            for bar in self.bars(bounds.size()) {
                frame.fill_rectangle(bar.top_left, bar.size, color);

                // x label rotated 45° so long city names stay readable
                let anchor = Point::new(bar.top_left.x + bar.size.width / 2.0, plot.y + plot.height + 6.0);
                frame.with_save(|frame| {
                    frame.translate(Vector::new(anchor.x, anchor.y));
                    frame.rotate(-std::f32::consts::FRAC_PI_4);
                    frame.fill_text(label_text(
                        bar.label.clone(),
                        Point::ORIGIN,
                        ink,
                        Horizontal::Right,
                        Vertical::Top,
                    ));
                });
            }
        });

        vec![geometry]
    }
}

fn format_tick(value: f64, span: f64) -> String {
    if span < 10.0 {
        format!("{value:.2}")
    } else {
        format!("{value:.0}")
    }
}

/// Chart tab currently shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartTab {
    #[default]
    Ndvi,
    Uhii,
}

/// The two comparison charts behind a tab bar
pub struct ChartView {
    ndvi: BarChart,
    uhii: BarChart,
    active: ChartTab,
}

impl ChartView {
    pub fn new(period: &str) -> Self {
        Self {
            ndvi: BarChart::new(Metric::Ndvi, period),
            uhii: BarChart::new(Metric::Uhii, period),
            active: ChartTab::default(),
        }
    }

    /// Redraw both charts from the table
    pub fn redraw(&mut self, rows: &[ComparisonRow]) {
        self.ndvi.redraw(rows);
        self.uhii.redraw(rows);
    }

    pub fn select(&mut self, tab: ChartTab) {
        self.active = tab;
    }

    /// City labels of the bars, in drawing order
    #[cfg(test)]
    pub fn labels(&self) -> Vec<String> {
        self.ndvi.rows.iter().map(|(city, _)| city.clone()).collect()
    }

    pub fn view(&self) -> Element<Message> {
        let tab = |label: &'static str, tab: ChartTab| {
            let b = button(label).padding([6, 16]).on_press(Message::ChartTab(tab));
            if self.active == tab {
                b.style(button::primary)
            } else {
                b.style(button::secondary)
            }
        };
        let chart = match self.active {
            ChartTab::Ndvi => &self.ndvi,
            ChartTab::Uhii => &self.uhii,
        };

        column![
            row![tab("NDVI", ChartTab::Ndvi), tab("UHII", ChartTab::Uhii)].spacing(4),
            canvas_widget(chart).width(Length::Fill).height(Length::Fill),
        ]
        .spacing(8)
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<ComparisonRow> {
        vec![
            ComparisonRow::new("Singapore202410", 0.1, 1500.0),
            ComparisonRow::new("New York", 0.25, 600.0),
            ComparisonRow::new("Geneva", 0.4, 1650.0),
        ]
    }

    #[test]
    fn test_one_bar_per_city_in_table_order() {
        let mut chart = BarChart::new(Metric::Ndvi, "2024-10");
        chart.redraw(&rows());
        let bars = chart.bars(Size::new(800.0, 600.0));

        let labels: Vec<_> = bars.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["Singapore202410", "New York", "Geneva"]);
        // tallest value fills the plot height
        let plot = plot_area(Size::new(800.0, 600.0));
        assert!((bars[2].size.height - plot.height).abs() < 1e-3);
        assert!(bars[0].size.height < bars[1].size.height);
    }

    #[test]
    fn test_redraw_is_idempotent() {
        let mut chart = BarChart::new(Metric::Uhii, "2024-10");
        chart.redraw(&rows());
        let first = chart.bars(Size::new(640.0, 480.0));
        chart.redraw(&rows());
        let second = chart.bars(Size::new(640.0, 480.0));
        assert_eq!(first, second);
        assert_eq!(second.len(), 3);
    }

    #[test]
    fn test_redraw_replaces_previous_bars() {
        let mut chart = BarChart::new(Metric::Ndvi, "2024-10");
        chart.redraw(&rows());
        chart.redraw(&rows()[..1]);
        let bars = chart.bars(Size::new(640.0, 480.0));
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].label, "Singapore202410");
    }

    #[test]
    fn test_negative_values_hang_below_zero() {
        let rows = vec![("a".to_string(), -10.0), ("b".to_string(), 30.0)];
        let plot = Rectangle { x: 0.0, y: 0.0, width: 100.0, height: 400.0 };
        let bars = layout(&rows, plot);
        let zero_y = 300.0;
        assert!((bars[0].top_left.y - zero_y).abs() < 1e-3);
        assert!((bars[0].size.height - 100.0).abs() < 1e-3);
        assert!((bars[1].top_left.y).abs() < 1e-3);
        assert!((bars[1].size.height - 300.0).abs() < 1e-3);
    }

    #[test]
    fn test_titles() {
        assert_eq!(Metric::Ndvi.title("2024-10"), "NDVI Comparison(2024-10)");
        assert_eq!(Metric::Uhii.title("2024-10"), "UHII Comparison base on SWIR(2024-10)");
    }
}
