use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::data::export::{EXPORT_FILE_NAME, SUMMARY_FILE_NAME};
use crate::data::loader::SourceSpec;
use crate::data::model::{DelayType, Month};
use crate::state::{AppState, Dimension};

const WARNING_COLOR: Color32 = Color32::from_rgb(230, 160, 40);

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

/// Render the left filter panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filters");
    ui.separator();

    // Cheap Arc clone so we can mutate state inside the loop.
    let Some(table) = state.table.clone() else {
        ui.label("No dataset loaded.");
        return;
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Years ----
            let years: Vec<(String, bool)> = table
                .years
                .iter()
                .map(|y| (y.to_string(), state.filters.years.contains(y)))
                .collect();
            if let Some(i) = filter_section(ui, state, Dimension::Year, "Year", &years) {
                state.toggle_year(table.years[i]);
            }

            // ---- Months ----
            let months: Vec<Month> = Month::all().collect();
            let month_options: Vec<(String, bool)> = months
                .iter()
                .map(|m| (m.label().to_string(), state.filters.months.contains(m)))
                .collect();
            if let Some(i) = filter_section(ui, state, Dimension::Month, "Month", &month_options) {
                state.toggle_month(months[i]);
            }

            // ---- Delay types (Total Delay is exclusive) ----
            ui.strong("Delay Type(s)");
            for dt in DelayType::ALL {
                let mut checked = state.filters.delay_types.contains(&dt);
                if ui.checkbox(&mut checked, dt.label()).changed() {
                    state.toggle_delay_type(dt);
                }
            }
            if let Some(warning) = state.delay_warning {
                ui.label(RichText::new(warning).color(WARNING_COLOR));
            }
            ui.separator();

            // ---- Hours, when the data has them ----
            if let Some(hours) = &table.hours {
                let selected = state.filters.hours.clone().unwrap_or_default();
                let hour_options: Vec<(String, bool)> = hours
                    .iter()
                    .map(|h| (format!("{h:02}:00"), selected.contains(h)))
                    .collect();
                if let Some(i) = filter_section(ui, state, Dimension::Hour, "Hour", &hour_options) {
                    state.toggle_hour(hours[i]);
                }
            }

            // ---- Airlines ----
            let carriers: Vec<(String, bool)> = table
                .carriers
                .iter()
                .map(|c| (c.clone(), state.filters.carriers.contains(c)))
                .collect();
            if let Some(i) = filter_section(ui, state, Dimension::Carrier, "Airlines", &carriers) {
                state.toggle_carrier(&table.carriers[i]);
            }

            // ---- Airports ----
            let codes: Vec<&String> = table.airports.keys().collect();
            let airports: Vec<(String, bool)> = table
                .airports
                .iter()
                .map(|(code, name)| {
                    (format!("{name} ({code})"), state.filters.airports.contains(code))
                })
                .collect();
            if let Some(i) = filter_section(ui, state, Dimension::Airport, "Airports", &airports) {
                state.toggle_airport(codes[i]);
            }
        });
}

/// Collapsible multi-select with All / None buttons.
/// Returns the index of the option whose checkbox was toggled.
fn filter_section(
    ui: &mut Ui,
    state: &mut AppState,
    dim: Dimension,
    title: &str,
    options: &[(String, bool)],
) -> Option<usize> {
    let n_selected = options.iter().filter(|(_, selected)| *selected).count();
    let header_text = format!("{title}  ({n_selected}/{})", options.len());
    let mut toggled = None;

    egui::CollapsingHeader::new(RichText::new(header_text).strong())
        .id_salt(title)
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            ui.horizontal(|ui: &mut Ui| {
                if ui.small_button("All").clicked() {
                    state.select_all(dim);
                }
                if ui.small_button("None").clicked() {
                    state.select_none(dim);
                }
            });

            for (i, (label, selected)) in options.iter().enumerate() {
                let mut checked = *selected;
                if ui.checkbox(&mut checked, label.as_str()).changed() {
                    toggled = Some(i);
                }
            }
        });
    toggled
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open delay + airport CSVs…").clicked() {
                open_joined_dialog(state);
                ui.close_menu();
            }
            if ui.button("Open merged table…").clicked() {
                open_merged_dialog(state);
                ui.close_menu();
            }
            if ui
                .add_enabled(state.source.is_some(), egui::Button::new("Reload"))
                .clicked()
            {
                state.reload();
                ui.close_menu();
            }
            ui.separator();
            let has_views = state.views.is_some();
            if ui
                .add_enabled(has_views, egui::Button::new("Download filtered data…"))
                .clicked()
            {
                save_csv_dialog(state);
                ui.close_menu();
            }
            if ui
                .add_enabled(has_views, egui::Button::new("Export summary JSON…"))
                .clicked()
            {
                save_summary_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let (Some(table), Some(views)) = (&state.table, &state.views) {
            ui.label(format!(
                "{} records loaded, {} selected",
                table.len(),
                views.rows.len()
            ));
        }

        if let Some(msg) = &state.status_message {
            let color = if msg.starts_with("Error") {
                Color32::RED
            } else {
                Color32::GRAY
            };
            ui.separator();
            ui.label(RichText::new(msg).color(color));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_joined_dialog(state: &mut AppState) {
    let Some(delays) = rfd::FileDialog::new()
        .set_title("Open delay statistics CSV")
        .add_filter("CSV", &["csv"])
        .pick_file()
    else {
        return;
    };
    let Some(airports) = rfd::FileDialog::new()
        .set_title("Open airport reference CSV")
        .add_filter("CSV", &["csv"])
        .pick_file()
    else {
        return;
    };
    state.load_source(SourceSpec::Joined { delays, airports });
}

pub fn open_merged_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open merged delay table")
        .add_filter("Supported files", &["csv", "parquet", "pq"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .pick_file();

    if let Some(path) = file {
        state.load_source(SourceSpec::Merged { path });
    }
}

fn save_csv_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Download filtered data")
        .set_file_name(EXPORT_FILE_NAME)
        .add_filter("CSV", &["csv"])
        .save_file();

    if let Some(path) = file {
        state.export_csv(&path);
    }
}

fn save_summary_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Export summary")
        .set_file_name(SUMMARY_FILE_NAME)
        .add_filter("JSON", &["json"])
        .save_file();

    if let Some(path) = file {
        state.export_summary(&path);
    }
}
