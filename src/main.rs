mod app;
mod color;
mod config;
mod data;
mod state;
mod ui;

use app::AirlineDelaysApp;
use config::DashboardConfig;
use eframe::egui;
use state::AppState;

fn main() -> eframe::Result {
    env_logger::init();

    let config = DashboardConfig::from_args();
    let source = config.source.clone();
    let mut state = AppState::new(config);
    // A failed startup load leaves the dashboard empty with the error shown;
    // other files can still be opened from the File menu.
    state.load_source(source);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([800.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "US Airline Delays Dashboard",
        options,
        Box::new(|_cc| Ok(Box::new(AirlineDelaysApp::new(state)))),
    )
}
