use iced::widget::{button, column, container, row, text, text_input, Column};
use iced::{window, Element, Length, Size, Subscription, Task, Theme};
use rfd::FileDialog;
use std::sync::Arc;
use thiserror::Error;

mod config;
mod earth;
mod geocoder;
mod map;
mod search;
mod state;
mod ui;

use config::{Config, ConfigError};
use earth::client::EarthEngineClient;
use earth::indices::EarthEngineIndices;
use geocoder::GoogleGeocoder;
use map::html::{write_map, MapContent, MapError};
use map::server::{FileServer, ServerError};
use search::{MapTarget, SearchError, SearchOutcome, SearchRequest, Services, LOCATION_NOT_FOUND};
use state::comparison::ComparisonTable;
use ui::chart::{ChartTab, ChartView};
use ui::map_view::MapView;
use ui::time::TimeSelector;

type LiveServices = Services<GoogleGeocoder, EarthEngineIndices>;

/// Anything that keeps the application from coming up
#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Map(#[from] MapError),
    #[error("failed to create HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GUI failed: {0}")]
    Gui(#[from] iced::Error),
}

/// Main application state
struct Gusi {
    config: Config,
    /// Serves the map file, stopped on close
    server: FileServer,
    services: Arc<LiveServices>,
    time: TimeSelector,
    /// Contents of the location input
    place: String,
    map_view: MapView,
    comparison: ComparisonTable,
    charts: ChartView,
    /// Shown when the last search could not geocode its place
    location_failed: bool,
    /// Status message to display to the user
    status: String,
    /// Incremented per search so superseded results can be recognized
    search_generation: u64,
    search_handle: Option<iced::task::Handle>,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    PlaceChanged(String),
    YearSelected(i32),
    MonthSelected(u32),
    /// User clicked "Search" or pressed enter
    Search,
    /// Background search finished, tagged with its generation
    SearchFinished(u64, Result<SearchOutcome, Arc<SearchError>>),
    /// Keep the current table as the base for later searches
    SaveToCompare,
    ExportComparison,
    OpenMap,
    ChartTab(ChartTab),
    CloseRequested(window::Id),
}

impl Gusi {
    /// Create the application around an already running file server
    fn new(config: Config, server: FileServer, services: Arc<LiveServices>) -> (Self, Task<Message>) {
        let mut map_view = MapView::new();
        map_view.show_blank_map(server.url_for(&config.map.file));

        let comparison = ComparisonTable::seeded(config.seed.clone());
        let mut charts = ChartView::new(&config.seed_period);
        charts.redraw(comparison.rows());

        let status = format!("Ready. {} reference cities loaded.", comparison.len());
        log::info!("🎨 GUSI initialized with {} reference cities", comparison.len());

        (
            Gusi {
                time: TimeSelector::new(config.years()),
                config,
                server,
                services,
                place: String::new(),
                map_view,
                comparison,
                charts,
                location_failed: false,
                status,
                search_generation: 0,
                search_handle: None,
            },
            Task::none(),
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::PlaceChanged(place) => {
                self.place = place;
                Task::none()
            }
            Message::YearSelected(year) => {
                self.time.select_year(year);
                Task::none()
            }
            Message::MonthSelected(month) => {
                self.time.select_month(month);
                Task::none()
            }
            Message::Search => self.start_search(),
            Message::SearchFinished(generation, result) => {
                if generation != self.search_generation {
                    log::warn!("Dropping result of superseded search #{generation}");
                    return Task::none();
                }
                self.search_handle = None;
                self.finish_search(result);
                Task::none()
            }
            Message::SaveToCompare => {
                self.comparison.snapshot_save();
                self.status = format!("Saved {} rows for comparison.", self.comparison.saved().len());
                Task::none()
            }
            Message::ExportComparison => {
                let target = FileDialog::new()
                    .set_title("Export saved comparison")
                    .set_file_name("comparison.json")
                    .add_filter("JSON", &["json"])
                    .save_file();

                if let Some(path) = target {
                    self.status = match self.comparison.export_saved(&path) {
                        Ok(()) => format!("✅ Exported comparison to {}", path.display()),
                        Err(e) => {
                            log::error!("Export failed: {e}");
                            format!("❌ {e}")
                        }
                    };
                }
                Task::none()
            }
            Message::OpenMap => {
                self.map_view.open();
                Task::none()
            }
            Message::ChartTab(tab) => {
                self.charts.select(tab);
                Task::none()
            }
            Message::CloseRequested(id) => {
                if let Some(handle) = self.search_handle.take() {
                    handle.abort();
                }
                if self.server.is_running() {
                    self.server.stop();
                }
                window::close(id).chain(iced::exit())
            }
        }
    }

    fn start_search(&mut self) -> Task<Message> {
        // a newer search replaces the one in flight
        if let Some(handle) = self.search_handle.take() {
            handle.abort();
        }
        self.search_generation += 1;
        let generation = self.search_generation;

        let request = SearchRequest { place: self.place.trim().to_string(), period: self.time.period() };
        self.location_failed = false;
        self.status = format!(
            "Searching {} for {}-{:02}...",
            request.place, request.period.year, request.period.month
        );

        let (task, handle) = Task::perform(search::run(self.services.clone(), request), move |result| {
            Message::SearchFinished(generation, result.map_err(Arc::new))
        })
        .abortable();
        self.search_handle = Some(handle);
        task
    }

    fn finish_search(&mut self, result: Result<SearchOutcome, Arc<SearchError>>) {
        match result {
            Ok(outcome) => {
                let label = outcome.request.label();
                self.comparison.record(label.clone(), outcome.indices.ndvi_mean, outcome.indices.uhii);
                self.charts.redraw(self.comparison.rows());

                self.map_view.reload_map(self.server.url_for(&self.config.map.file), outcome.location);
                if self.config.map.open_in_browser {
                    self.map_view.open();
                }

                self.status = format!(
                    "✅ {label}: NDVI {:.3}, UHII {:.1}",
                    outcome.indices.ndvi_mean, outcome.indices.uhii
                );
            }
            Err(e) => match e.as_ref() {
                SearchError::Geocode(_) => {
                    self.location_failed = true;
                    self.status.clear();
                }
                other => {
                    log::error!("Search failed: {other}");
                    self.status = format!("❌ Search failed: {other}");
                }
            },
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let mut place: Column<Message> = column![
            row![
                text("Location: "),
                text_input("City or place", &self.place)
                    .on_input(Message::PlaceChanged)
                    .on_submit(Message::Search)
                    .padding(6),
            ]
            .spacing(10)
            .align_y(iced::Alignment::Center),
            row![
                button("Search").on_press(Message::Search).padding(10),
                button("save current place to compare")
                    .on_press(Message::SaveToCompare)
                    .padding(10),
                button("Export saved comparison")
                    .on_press(Message::ExportComparison)
                    .padding(10),
            ]
            .spacing(10),
        ]
        .spacing(10);

        if self.location_failed {
            place = place.push(text(LOCATION_NOT_FOUND).style(text::danger));
        }
        if !self.status.is_empty() {
            place = place.push(text(&self.status).size(14));
        }

        let left_side = column![
            self.time.view(),
            place,
            container(self.charts.view()).height(Length::FillPortion(15)),
        ]
        .spacing(20)
        .padding(10);

        row![
            container(self.map_view.view()).width(Length::FillPortion(1)).height(Length::Fill),
            container(left_side).width(Length::FillPortion(1)).height(Length::Fill),
        ]
        .into()
    }

    fn subscription(&self) -> Subscription<Message> {
        window::close_requests().map(Message::CloseRequested)
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Load config, start the file server and write the blank map
fn startup() -> Result<(Config, FileServer, Arc<LiveServices>), StartupError> {
    let config = Config::load()?;

    let map_path = config.map_path();
    write_map(&map_path, &MapContent::Blank)?;

    let mut server = FileServer::new(config.server.port, config.server.root.clone());
    server.start()?;

    let http = reqwest::Client::builder().user_agent(concat!("gusi/", env!("CARGO_PKG_VERSION"))).build()?;
    let services = Arc::new(Services {
        geocoder: GoogleGeocoder::new(http.clone(), &config.geocoding),
        indices: EarthEngineIndices::new(EarthEngineClient::new(http, &config.earth_engine)),
        map: MapTarget { path: map_path, zoom: config.map.zoom },
    });

    Ok((config, server, services))
}

fn main() -> Result<(), StartupError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (config, server, services) = startup()?;

    iced::application("GUSI demonstration", Gusi::update, Gusi::view)
        .theme(Gusi::theme)
        .subscription(Gusi::subscription)
        .window(window::Settings {
            size: Size::new(1600.0, 1000.0),
            exit_on_close_request: false,
            ..window::Settings::default()
        })
        .centered()
        .run_with(move || Gusi::new(config, server, services))?;

    Ok(())
}
