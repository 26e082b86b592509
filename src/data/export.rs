use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use super::aggregate::{
    AirportDelayRate, AirportDelayTotals, CauseTotal, DerivedViews, FilteredRow, Kpis, MonthlyTrend,
};
use super::model::{BaseTable, DelayCause, FlightDelayRecord};

pub const EXPORT_FILE_NAME: &str = "filtered_airline_delay_data.csv";
pub const SUMMARY_FILE_NAME: &str = "airline_delay_summary.json";

/// Header of the filtered-data export, also used by the table preview.
pub const EXPORT_COLUMNS: [&str; 26] = [
    "year",
    "month",
    "month_name",
    "hour",
    "airport",
    "airport_name",
    "carrier_name",
    "arr_flights",
    "arr_del15",
    "arr_cancelled",
    "arr_diverted",
    "carrier_ct",
    "weather_ct",
    "nas_ct",
    "security_ct",
    "late_aircraft_ct",
    "carrier_delay",
    "weather_delay",
    "nas_delay",
    "security_delay",
    "late_aircraft_delay",
    "Total_Delay",
    "LATITUDE",
    "LONGITUDE",
    "Selected_Delay",
    "delay_rate",
];

// ---------------------------------------------------------------------------
// Filtered rows → CSV
// ---------------------------------------------------------------------------

/// Field order must match [`EXPORT_COLUMNS`].
#[derive(Serialize)]
struct ExportRow<'a> {
    year: i32,
    month: u32,
    month_name: &'static str,
    hour: Option<u32>,
    airport: &'a str,
    airport_name: &'a str,
    carrier_name: &'a str,
    arr_flights: f64,
    arr_del15: f64,
    arr_cancelled: f64,
    arr_diverted: f64,
    carrier_ct: f64,
    weather_ct: f64,
    nas_ct: f64,
    security_ct: f64,
    late_aircraft_ct: f64,
    carrier_delay: Option<f64>,
    weather_delay: Option<f64>,
    nas_delay: Option<f64>,
    security_delay: Option<f64>,
    late_aircraft_delay: Option<f64>,
    total_delay: f64,
    latitude: f64,
    longitude: f64,
    selected_delay: f64,
    delay_rate: Option<f64>,
}

impl<'a> ExportRow<'a> {
    fn new(rec: &'a FlightDelayRecord, selected_delay: f64) -> Self {
        let [carrier_ct, weather_ct, nas_ct, security_ct, late_aircraft_ct] = rec.cause_counts;
        let [carrier_delay, weather_delay, nas_delay, security_delay, late_aircraft_delay] =
            rec.cause_minutes;
        ExportRow {
            year: rec.year,
            month: rec.month.number(),
            month_name: rec.month_name(),
            hour: rec.hour,
            airport: &rec.airport,
            airport_name: &rec.airport_name,
            carrier_name: &rec.carrier_name,
            arr_flights: rec.arr_flights,
            arr_del15: rec.arr_del15,
            arr_cancelled: rec.arr_cancelled,
            arr_diverted: rec.arr_diverted,
            carrier_ct,
            weather_ct,
            nas_ct,
            security_ct,
            late_aircraft_ct,
            carrier_delay,
            weather_delay,
            nas_delay,
            security_delay,
            late_aircraft_delay,
            total_delay: rec.total_delay,
            latitude: rec.latitude,
            longitude: rec.longitude,
            selected_delay,
            delay_rate: (rec.arr_flights > 0.0).then(|| rec.arr_del15 / rec.arr_flights),
        }
    }
}

/// Write the filtered rows as UTF-8 CSV. Returns the number of data rows.
pub fn write_filtered_csv<W: Write>(
    table: &BaseTable,
    rows: &[FilteredRow],
    writer: W,
) -> Result<usize> {
    let mut csv = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    csv.write_record(EXPORT_COLUMNS)
        .context("writing CSV header")?;
    for row in rows {
        let rec = &table.records[row.index];
        csv.serialize(ExportRow::new(rec, row.selected_delay))
            .with_context(|| format!("writing row for {} {}", rec.airport, rec.month))?;
    }
    csv.flush().context("flushing CSV export")?;
    Ok(rows.len())
}

pub fn export_filtered_csv(path: &Path, table: &BaseTable, rows: &[FilteredRow]) -> Result<usize> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let n = write_filtered_csv(table, rows, file)?;
    log::info!("Exported {n} filtered rows to {}", path.display());
    Ok(n)
}

/// Cells of one row as strings in [`EXPORT_COLUMNS`] order.
pub fn row_cells(rec: &FlightDelayRecord, selected_delay: f64) -> Vec<String> {
    let opt = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
    let mut cells = vec![
        rec.year.to_string(),
        rec.month.number().to_string(),
        rec.month_name().to_string(),
        rec.hour.map(|h| h.to_string()).unwrap_or_default(),
        rec.airport.clone(),
        rec.airport_name.clone(),
        rec.carrier_name.clone(),
        rec.arr_flights.to_string(),
        rec.arr_del15.to_string(),
        rec.arr_cancelled.to_string(),
        rec.arr_diverted.to_string(),
    ];
    cells.extend(DelayCause::ALL.iter().map(|c| rec.cause_count(*c).to_string()));
    cells.extend(DelayCause::ALL.iter().map(|c| opt(rec.cause_minutes(*c))));
    cells.extend([
        rec.total_delay.to_string(),
        rec.latitude.to_string(),
        rec.longitude.to_string(),
        selected_delay.to_string(),
        opt((rec.arr_flights > 0.0).then(|| rec.arr_del15 / rec.arr_flights)),
    ]);
    cells
}

// ---------------------------------------------------------------------------
// Derived views → JSON
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Summary<'a> {
    delay_types: Vec<&'static str>,
    filtered_rows: usize,
    kpis: &'a Kpis,
    cause_counts: &'a [CauseTotal],
    cause_minutes: &'a [CauseTotal],
    monthly_trend: Option<&'a MonthlyTrend>,
    top_airports_by_delay: &'a [AirportDelayTotals],
    top_airports_by_rate: &'a [AirportDelayRate],
    geo_points: usize,
}

pub fn write_summary_json<W: Write>(views: &DerivedViews, writer: W) -> Result<()> {
    let summary = Summary {
        delay_types: views.delay_types.iter().map(|dt| dt.label()).collect(),
        filtered_rows: views.rows.len(),
        kpis: &views.kpis,
        cause_counts: &views.cause_counts,
        cause_minutes: &views.cause_minutes,
        monthly_trend: views.monthly_trend.as_ref(),
        top_airports_by_delay: &views.top_airports_by_delay,
        top_airports_by_rate: &views.top_airports_by_rate,
        geo_points: views.geo.len(),
    };
    serde_json::to_writer_pretty(writer, &summary).context("writing summary JSON")
}

pub fn export_summary_json(path: &Path, views: &DerivedViews) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    write_summary_json(views, file)?;
    log::info!("Exported summary to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::aggregate::{ViewOptions, compute_views};
    use crate::data::filter::FilterSpec;
    use crate::data::model::DelayType;

    fn views() -> (BaseTable, DerivedViews) {
        let records = vec![
            FlightDelayRecord::sample("ATL", "Delta", 2015, 1)
                .with_minutes(DelayCause::Carrier, Some(10.0))
                .with_minutes(DelayCause::Weather, None)
                .with_flights(100.0, 20.0),
            FlightDelayRecord::sample("SFO", "United", 2015, 2)
                .with_minutes(DelayCause::Nas, Some(4.0))
                .with_flights(0.0, 0.0),
        ];
        let table = BaseTable::from_records(records, false);
        let views = compute_views(&table, &FilterSpec::select_all(&table), &ViewOptions::default());
        (table, views)
    }

    #[test]
    fn csv_export_has_header_and_one_line_per_row() {
        let (table, views) = views();
        let mut buf = Vec::new();
        let n = write_filtered_csv(&table, &views.rows, &mut buf).unwrap();
        assert_eq!(n, 2);

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], EXPORT_COLUMNS.join(","));
        assert!(lines[0].contains("Selected_Delay"));

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let first = reader.records().next().unwrap().unwrap();
        assert_eq!(first.len(), EXPORT_COLUMNS.len());
        assert_eq!(&first[2], "Jan");
        assert_eq!(&first[17], "");
        assert_eq!(&first[24], "10.0");
    }

    #[test]
    fn empty_selection_still_writes_header() {
        let (table, _) = views();
        let mut buf = Vec::new();
        assert_eq!(write_filtered_csv(&table, &[], &mut buf).unwrap(), 0);
        assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 1);
    }

    #[test]
    fn preview_cells_line_up_with_header() {
        let (table, views) = views();
        let row = views.rows[1];
        let cells = row_cells(&table.records[row.index], row.selected_delay);
        assert_eq!(cells.len(), EXPORT_COLUMNS.len());
        assert_eq!(cells[4], "SFO");
        assert_eq!(cells[25], "");
    }

    #[test]
    fn summary_json_contains_views() {
        let (_, views) = views();
        let mut buf = Vec::new();
        write_summary_json(&views, &mut buf).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(json["filtered_rows"], 2);
        assert_eq!(json["delay_types"][0], DelayType::Total.label());
        assert_eq!(json["kpis"]["total_delay_minutes"], 14.0);
        assert_eq!(json["monthly_trend"]["series"][0]["points"][1]["month"], "Feb");
        assert_eq!(json["cause_minutes"][0]["cause"], "carrier");
    }
}
