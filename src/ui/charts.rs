use std::f64::consts::TAU;

use eframe::egui::{self, Align2, Color32, RichText, ScrollArea, Stroke, Ui};
use egui_plot::{
    Bar, BarChart, Legend, Line, Plot, PlotPoint, PlotPoints, Points, Polygon, Text,
};

use crate::color::{YearColors, cause_color, magnitude_color};
use crate::data::aggregate::{
    AirportDelayRate, AirportDelayTotals, CauseTotal, GeoPoint, GeoView, Kpis, MonthlyTrend,
};
use crate::data::model::Month;
use crate::state::AppState;
use crate::ui::table;

pub const NO_DATA_MESSAGE: &str = "No data available for the selected filters and delay type.";

const WARNING_COLOR: Color32 = Color32::from_rgb(230, 160, 40);
const CHART_HEIGHT: f32 = 280.0;
/// Largest marker radius on the map, in points.
const SIZE_MAX: f64 = 20.0;
/// Map markers are drawn as this many magnitude classes, one plot item each.
const GEO_BINS: usize = 8;

// ---------------------------------------------------------------------------
// Dashboard (central panel)
// ---------------------------------------------------------------------------

/// Render every chart for the current views.
pub fn dashboard(ui: &mut Ui, state: &AppState) {
    let (Some(base), Some(views)) = (&state.table, &state.views) else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a data file to view delays  (File → Open…)");
        });
        return;
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            ui.heading("US Airline Delays Dashboard");
            ui.add_space(4.0);

            if views.is_empty() {
                ui.label(RichText::new(NO_DATA_MESSAGE).color(WARNING_COLOR));
            }

            ui.strong("Key Metrics (Based on Filters)");
            kpi_row(ui, &views.kpis);
            ui.separator();

            ui.strong("Delay Breakdown Visualizations");
            ui.columns(2, |cols: &mut [Ui]| {
                cause_pie(&mut cols[0], &views.cause_counts);
                cause_duration_bars(&mut cols[1], &views.cause_minutes);
            });

            if let Some(trend) = &views.monthly_trend {
                ui.separator();
                ui.strong("Monthly Delay Trend");
                monthly_trend(ui, trend, state.year_colors.as_ref());
            }

            ui.separator();
            ui.strong("Airport-wise Delay Metrics");
            ui.columns(2, |cols: &mut [Ui]| {
                airport_delay_bars(&mut cols[0], &views.top_airports_by_delay);
                airport_rate_bars(&mut cols[1], &views.top_airports_by_rate);
            });

            ui.separator();
            let delay_labels: Vec<&str> = views.delay_types.iter().map(|dt| dt.label()).collect();
            ui.strong(format!("Airport Delay Intensity by {}", delay_labels.join(", ")));
            ui.label(format!(
                "Selected Airlines: {} | Selected Airports: {} | Points: {}",
                state.filters.carriers.len(),
                state.filters.airports.len(),
                views.geo.len()
            ));
            geo_scatter(ui, &views.geo);

            ui.separator();
            egui::CollapsingHeader::new("View Filtered Raw Data")
                .default_open(false)
                .show(ui, |ui: &mut Ui| {
                    table::filtered_table(ui, base, views.preview(state.config.preview_rows));
                });
        });
}

// ---------------------------------------------------------------------------
// KPI cards
// ---------------------------------------------------------------------------

pub fn kpi_row(ui: &mut Ui, kpis: &Kpis) {
    ui.columns(6, |cols: &mut [Ui]| {
        metric(&mut cols[0], "Total Flights", format!("{}", kpis.total_flights as i64));
        metric(&mut cols[1], "Total Delays", format!("{}", kpis.total_delayed as i64));
        metric(&mut cols[2], "Delay %", format!("{:.2}%", kpis.delay_percentage));
        metric(
            &mut cols[3],
            "Total Delay Time (min)",
            format!("{}", kpis.total_delay_minutes as i64),
        );
        metric(
            &mut cols[4],
            "Total Cancellations",
            format!("{}", kpis.total_cancellations as i64),
        );
        metric(
            &mut cols[5],
            "Total Diversions",
            format!("{}", kpis.total_diverted as i64),
        );
    });
}

fn metric(ui: &mut Ui, label: &str, value: String) {
    ui.vertical(|ui: &mut Ui| {
        ui.label(RichText::new(label).weak());
        ui.heading(value);
    });
}

// ---------------------------------------------------------------------------
// Cause breakdown
// ---------------------------------------------------------------------------

/// Pie of cause occurrence counts, drawn as polygon wedges.
pub fn cause_pie(ui: &mut Ui, counts: &[CauseTotal]) {
    let total: f64 = counts.iter().map(|c| c.value).sum();

    Plot::new("cause_pie")
        .legend(Legend::default())
        .data_aspect(1.0)
        .height(CHART_HEIGHT)
        .show_axes(false)
        .show_grid(false)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            if total <= 0.0 {
                return;
            }
            let mut start = 0.0;
            for c in counts.iter().filter(|c| c.value > 0.0) {
                let sweep = c.value / total * TAU;
                let name = format!("{} ({:.1}%)", c.cause.label(), 100.0 * c.value / total);
                plot_ui.polygon(
                    Polygon::new(PlotPoints::new(wedge(start, sweep)))
                        .name(name)
                        .fill_color(cause_color(c.cause))
                        .stroke(Stroke::new(1.0, Color32::WHITE)),
                );
                start += sweep;
            }
        });
}

/// Unit-circle wedge from `start` spanning `sweep` radians.
fn wedge(start: f64, sweep: f64) -> Vec<[f64; 2]> {
    let steps = ((sweep / TAU) * 90.0).ceil().max(2.0) as usize;
    let mut points = vec![[0.0, 0.0]];
    for i in 0..=steps {
        let angle = start + sweep * i as f64 / steps as f64;
        points.push([angle.cos(), angle.sin()]);
    }
    points
}

/// Bar chart of summed minutes per cause.
pub fn cause_duration_bars(ui: &mut Ui, minutes: &[CauseTotal]) {
    let labels: Vec<String> = minutes.iter().map(|c| c.cause.label().to_string()).collect();
    let bars: Vec<Bar> = minutes
        .iter()
        .enumerate()
        .map(|(i, c)| {
            Bar::new(i as f64, c.value)
                .name(c.cause.label())
                .fill(cause_color(c.cause))
        })
        .collect();

    Plot::new("cause_duration")
        .legend(Legend::default())
        .height(CHART_HEIGHT)
        .y_axis_label("Total Delay (min)")
        .x_axis_formatter(move |mark, _range| category_label(&labels, mark.value))
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).name("Delay Duration by Cause"));
        });
}

/// Label for a categorical axis tick; blank between categories.
fn category_label(labels: &[String], value: f64) -> String {
    let rounded = value.round();
    if (value - rounded).abs() > 1e-6 || rounded < 0.0 {
        return String::new();
    }
    labels.get(rounded as usize).cloned().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Monthly trend
// ---------------------------------------------------------------------------

pub fn monthly_trend(ui: &mut Ui, trend: &MonthlyTrend, colors: Option<&YearColors>) {
    Plot::new("monthly_trend")
        .legend(Legend::default())
        .height(CHART_HEIGHT)
        .x_axis_label("Month")
        .y_axis_label("Selected Delay (min)")
        .include_x(0.5)
        .include_x(12.5)
        .x_axis_formatter(|mark, _range| month_tick(mark.value))
        .show(ui, |plot_ui| {
            for series in &trend.series {
                let color = colors
                    .map(|c| c.color_for(series.year))
                    .unwrap_or(Color32::LIGHT_BLUE);
                let points: Vec<[f64; 2]> = series
                    .points
                    .iter()
                    .map(|p| [p.month.number() as f64, p.selected_delay])
                    .collect();

                plot_ui.line(
                    Line::new(PlotPoints::new(points.clone()))
                        .name(series.year)
                        .color(color)
                        .width(2.0),
                );
                plot_ui.points(
                    Points::new(PlotPoints::new(points))
                        .name(series.year)
                        .color(color)
                        .radius(3.0),
                );
            }
        });
}

fn month_tick(value: f64) -> String {
    let rounded = value.round();
    if (value - rounded).abs() > 1e-6 || rounded < 1.0 {
        return String::new();
    }
    Month::new(rounded as u32)
        .map(|m| m.label().to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Airport rankings
// ---------------------------------------------------------------------------

pub fn airport_delay_bars(ui: &mut Ui, airports: &[AirportDelayTotals]) {
    let entries: Vec<(&str, String, f64)> = airports
        .iter()
        .map(|a| {
            let hover = format!(
                "{}\ndelayed: {:.0}, cancelled: {:.0}, diverted: {:.0}",
                a.airport_name, a.arr_del15, a.arr_cancelled, a.arr_diverted
            );
            (a.airport.as_str(), hover, a.selected_delay)
        })
        .collect();
    ranking_chart(ui, "top_airports_delay", "Top Airports by Selected Delay", &entries);
}

pub fn airport_rate_bars(ui: &mut Ui, airports: &[AirportDelayRate]) {
    let entries: Vec<(&str, String, f64)> = airports
        .iter()
        .map(|a| (a.airport.as_str(), a.airport_name.clone(), a.delay_rate))
        .collect();
    ranking_chart(ui, "top_airports_rate", "Top Airports by Delay Rate", &entries);
}

/// Bars coloured by value; ticks show the airport code, hover the full name.
fn ranking_chart(ui: &mut Ui, id: &str, title: &str, entries: &[(&str, String, f64)]) {
    ui.label(title);
    let max = entries.iter().map(|e| e.2).fold(0.0, f64::max);
    let labels: Vec<String> = entries.iter().map(|e| e.0.to_string()).collect();
    let bars: Vec<Bar> = entries
        .iter()
        .enumerate()
        .map(|(i, (_, name, value))| {
            let t = if max > 0.0 { value / max } else { 0.0 };
            Bar::new(i as f64, *value)
                .name(name)
                .fill(magnitude_color(t))
        })
        .collect();

    Plot::new(id)
        .height(CHART_HEIGHT)
        .x_axis_formatter(move |mark, _range| category_label(&labels, mark.value))
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).name(title));
        });
}

// ---------------------------------------------------------------------------
// Geographic scatter
// ---------------------------------------------------------------------------

pub fn geo_scatter(ui: &mut Ui, geo: &GeoView) {
    let points = match geo {
        GeoView::NoData => {
            ui.label(RichText::new(NO_DATA_MESSAGE).color(WARNING_COLOR));
            return;
        }
        GeoView::Points(points) => points,
    };
    let bins = magnitude_bins(points);

    Plot::new("geo_scatter")
        .data_aspect(1.0)
        .height(420.0)
        .x_axis_label("Longitude")
        .y_axis_label("Latitude")
        // Continental US
        .include_x(-125.0)
        .include_x(-66.0)
        .include_y(24.0)
        .include_y(50.0)
        .allow_boxed_zoom(true)
        .show(ui, |plot_ui| {
            for (bin, coords) in bins.into_iter().enumerate() {
                if coords.is_empty() {
                    continue;
                }
                let t = (bin as f64 + 0.5) / GEO_BINS as f64;
                plot_ui.points(
                    Points::new(PlotPoints::new(coords))
                        .radius((3.0 + SIZE_MAX * t.sqrt()) as f32)
                        .color(magnitude_color(t).gamma_multiply(0.7)),
                );
            }

            // Hover text only for the marker under the pointer
            let Some(pointer) = plot_ui.pointer_coordinate() else {
                return;
            };
            let tolerance = plot_ui.plot_bounds().width() * 0.01;
            if let Some(p) = nearest_point(points, pointer, tolerance) {
                let at = PlotPoint::new(p.longitude, p.latitude);
                plot_ui.points(
                    Points::new(PlotPoints::new(vec![[p.longitude, p.latitude]]))
                        .radius(4.0)
                        .color(Color32::WHITE),
                );
                plot_ui.text(Text::new(at, hover_text(p)).anchor(Align2::LEFT_BOTTOM));
            }
        });
}

/// Marker coordinates grouped into [`GEO_BINS`] classes of relative magnitude.
fn magnitude_bins(points: &[GeoPoint]) -> Vec<Vec<[f64; 2]>> {
    let max = points.iter().map(|p| p.magnitude).fold(0.0, f64::max);
    let mut bins = vec![Vec::new(); GEO_BINS];
    for p in points {
        let t = if max > 0.0 { p.magnitude / max } else { 0.0 };
        let bin = ((t * GEO_BINS as f64) as usize).min(GEO_BINS - 1);
        bins[bin].push([p.longitude, p.latitude]);
    }
    bins
}

/// Closest point to `pointer` within `tolerance` plot units.
fn nearest_point(points: &[GeoPoint], pointer: PlotPoint, tolerance: f64) -> Option<&GeoPoint> {
    points
        .iter()
        .map(|p| {
            let dx = p.longitude - pointer.x;
            let dy = p.latitude - pointer.y;
            (p, dx * dx + dy * dy)
        })
        .filter(|(_, d2)| *d2 <= tolerance * tolerance)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(p, _)| p)
}

fn hover_text(p: &GeoPoint) -> String {
    let mut text = format!(
        "{}\n{}\nSelected delay: {:.0} min",
        p.airport_name, p.carrier_name, p.magnitude
    );
    for (cause, value) in &p.hover {
        match value {
            Some(v) => text.push_str(&format!("\n{}: {v:.0}", cause.label())),
            None => text.push_str(&format!("\n{}: n/a", cause.label())),
        }
    }
    text
}
