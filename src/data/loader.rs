use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use arrow::record_batch::RecordBatch;
use csv::StringRecord;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use thiserror::Error;

use super::model::{BaseTable, DelayCause, FlightDelayRecord, Month, sum_cause_minutes};

// ---------------------------------------------------------------------------
// Errors and inputs
// ---------------------------------------------------------------------------

/// Why a base table could not be built. Loading never yields a partial table.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Parquet error in {}: {source}", .path.display())]
    Parquet {
        path: PathBuf,
        #[source]
        source: parquet::errors::ParquetError,
    },

    #[error("Arrow error in {}: {source}", .path.display())]
    Arrow {
        path: PathBuf,
        #[source]
        source: arrow::error::ArrowError,
    },

    #[error("{} is missing required columns: {}", .path.display(), .columns.join(", "))]
    MissingColumns { path: PathBuf, columns: Vec<String> },

    #[error("{}, line {line}: invalid value '{value}' in column '{column}'", .path.display())]
    InvalidValue {
        path: PathBuf,
        /// 1-based file line for CSV (header is line 1), 1-based row for Parquet.
        line: usize,
        column: String,
        value: String,
    },

    #[error("Unsupported file extension: .{0}")]
    UnsupportedFormat(String),
}

/// Which files make up the base table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceSpec {
    /// Delay statistics inner-joined with an airport reference table.
    Joined { delays: PathBuf, airports: PathBuf },
    /// A single file already carrying airport names and coordinates.
    Merged { path: PathBuf },
}

impl SourceSpec {
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            SourceSpec::Joined { delays, airports } => vec![delays.as_path(), airports.as_path()],
            SourceSpec::Merged { path } => vec![path.as_path()],
        }
    }
}

/// What happened while loading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_read: usize,
    /// Delay rows whose airport code had no match in the reference table.
    pub rows_dropped_by_join: usize,
    /// Empty cause-duration cells (counted as zero in `Total_Delay`).
    pub missing_cause_cells: usize,
}

const DELAY_COLUMNS: [&str; 18] = [
    "year",
    "month",
    "airport",
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
];

const AIRPORT_COLUMNS: [&str; 4] = ["IATA", "airport_name", "LATITUDE", "LONGITUDE"];

const GEO_COLUMNS: [&str; 3] = ["airport_name", "LATITUDE", "LONGITUDE"];

const HOUR_COLUMN: &str = "hour";

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load and normalize the base table.
pub fn load_source(source: &SourceSpec) -> Result<(BaseTable, LoadReport), LoadError> {
    let (records, has_hour, report) = match source {
        SourceSpec::Joined { delays, airports } => load_joined(delays, airports)?,
        SourceSpec::Merged { path } => load_merged(path)?,
    };

    if report.rows_dropped_by_join > 0 {
        log::warn!(
            "Dropped {} delay rows with no matching airport in the reference table",
            report.rows_dropped_by_join
        );
    }
    log::info!(
        "Loaded {} delay records ({} rows read, {} missing cause cells)",
        records.len(),
        report.rows_read,
        report.missing_cause_cells
    );

    Ok((BaseTable::from_records(records, has_hour), report))
}

type Loaded = (Vec<FlightDelayRecord>, bool, LoadReport);

// ---------------------------------------------------------------------------
// Column resolution
// ---------------------------------------------------------------------------

/// Header name → position, checked against the required columns up front.
struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn resolve<'a>(
        path: &Path,
        headers: impl IntoIterator<Item = &'a str>,
        required: &[&str],
    ) -> Result<Self, LoadError> {
        let index: HashMap<String, usize> = headers
            .into_iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_string(), i))
            .collect();

        let missing: Vec<String> = required
            .iter()
            .filter(|c| !index.contains_key(**c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(LoadError::MissingColumns {
                path: path.to_path_buf(),
                columns: missing,
            });
        }
        Ok(Columns { index })
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    fn has(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }
}

// ---------------------------------------------------------------------------
// Row access shared by the CSV and Parquet readers
// ---------------------------------------------------------------------------

enum Cell<'a> {
    Missing,
    Text(Cow<'a, str>),
    Number(f64),
}

trait RowCells {
    fn cell(&self, column: &str) -> Cell<'_>;
    fn invalid(&self, column: &str, value: String) -> LoadError;

    fn text(&self, column: &str) -> Result<String, LoadError> {
        match self.cell(column) {
            Cell::Text(s) => Ok(s.into_owned()),
            Cell::Number(v) => Ok(v.to_string()),
            Cell::Missing => Err(self.invalid(column, String::new())),
        }
    }

    fn number(&self, column: &str) -> Result<Option<f64>, LoadError> {
        match self.cell(column) {
            Cell::Missing => Ok(None),
            Cell::Number(v) if v.is_nan() => Ok(None),
            Cell::Number(v) => Ok(Some(v)),
            Cell::Text(s) => match s.parse::<f64>() {
                Ok(v) if v.is_nan() => Ok(None),
                Ok(v) => Ok(Some(v)),
                Err(_) => Err(self.invalid(column, s.into_owned())),
            },
        }
    }

    /// Integral value; `2015` and `2015.0` are both accepted.
    fn integer(&self, column: &str) -> Result<Option<i64>, LoadError> {
        match self.number(column)? {
            None => Ok(None),
            Some(v) if v.fract() == 0.0 => Ok(Some(v as i64)),
            Some(v) => Err(self.invalid(column, v.to_string())),
        }
    }

    fn required_integer(&self, column: &str) -> Result<i64, LoadError> {
        self.integer(column)?
            .ok_or_else(|| self.invalid(column, String::new()))
    }

    fn required_number(&self, column: &str) -> Result<f64, LoadError> {
        self.number(column)?
            .ok_or_else(|| self.invalid(column, String::new()))
    }
}

struct CsvRow<'a> {
    path: &'a Path,
    line: usize,
    record: &'a StringRecord,
    columns: &'a Columns,
}

impl RowCells for CsvRow<'_> {
    fn cell(&self, column: &str) -> Cell<'_> {
        let raw = self
            .columns
            .position(column)
            .and_then(|i| self.record.get(i))
            .map(str::trim)
            .unwrap_or("");
        if raw.is_empty() {
            Cell::Missing
        } else {
            Cell::Text(Cow::Borrowed(raw))
        }
    }

    fn invalid(&self, column: &str, value: String) -> LoadError {
        LoadError::InvalidValue {
            path: self.path.to_path_buf(),
            line: self.line,
            column: column.to_string(),
            value,
        }
    }
}

struct ArrowRow<'a> {
    path: &'a Path,
    row: usize,
    offset: usize,
    batch: &'a RecordBatch,
    columns: &'a Columns,
}

impl RowCells for ArrowRow<'_> {
    fn cell(&self, column: &str) -> Cell<'_> {
        match self.columns.position(column) {
            Some(i) => arrow_cell(self.batch.column(i), self.row),
            None => Cell::Missing,
        }
    }

    fn invalid(&self, column: &str, value: String) -> LoadError {
        LoadError::InvalidValue {
            path: self.path.to_path_buf(),
            line: self.offset + self.row + 1,
            column: column.to_string(),
            value,
        }
    }
}

/// Read one cell of an Arrow column as text or number.
fn arrow_cell(col: &ArrayRef, row: usize) -> Cell<'_> {
    if col.is_null(row) {
        return Cell::Missing;
    }
    match col.data_type() {
        DataType::Utf8 => Cell::Text(Cow::Borrowed(col.as_string::<i32>().value(row))),
        DataType::LargeUtf8 => Cell::Text(Cow::Borrowed(col.as_string::<i64>().value(row))),
        DataType::Int32 => Cell::Number(col.as_primitive::<Int32Type>().value(row) as f64),
        DataType::Int64 => Cell::Number(col.as_primitive::<Int64Type>().value(row) as f64),
        DataType::Float32 => Cell::Number(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => Cell::Number(col.as_primitive::<Float64Type>().value(row)),
        other => Cell::Text(Cow::Owned(format!("<{other:?}>"))),
    }
}

// ---------------------------------------------------------------------------
// Record construction
// ---------------------------------------------------------------------------

/// Build a record from the delay-statistics columns. Airport name and
/// coordinates are left blank for the caller to fill.
fn parse_delay_fields<R: RowCells>(
    row: &R,
    has_hour: bool,
    report: &mut LoadReport,
) -> Result<FlightDelayRecord, LoadError> {
    let year = row.required_integer("year")?;
    let month_number = row.required_integer("month")?;
    let month = u32::try_from(month_number)
        .ok()
        .and_then(Month::new)
        .ok_or_else(|| row.invalid("month", month_number.to_string()))?;
    let hour = if has_hour {
        match row.integer(HOUR_COLUMN)? {
            Some(h) => Some(
                u32::try_from(h).map_err(|_| row.invalid(HOUR_COLUMN, h.to_string()))?,
            ),
            None => None,
        }
    } else {
        None
    };

    let mut cause_counts = [0.0; 5];
    let mut cause_minutes = [None; 5];
    for (i, cause) in DelayCause::ALL.iter().enumerate() {
        cause_counts[i] = row.number(cause.count_column())?.unwrap_or(0.0);
        cause_minutes[i] = row.number(cause.duration_column())?;
        if cause_minutes[i].is_none() {
            report.missing_cause_cells += 1;
        }
    }

    Ok(FlightDelayRecord {
        year: i32::try_from(year).map_err(|_| row.invalid("year", year.to_string()))?,
        month,
        hour,
        airport: row.text("airport")?,
        airport_name: String::new(),
        carrier_name: row.text("carrier_name")?,
        arr_flights: row.number("arr_flights")?.unwrap_or(0.0),
        arr_del15: row.number("arr_del15")?.unwrap_or(0.0),
        arr_cancelled: row.number("arr_cancelled")?.unwrap_or(0.0),
        arr_diverted: row.number("arr_diverted")?.unwrap_or(0.0),
        cause_counts,
        total_delay: sum_cause_minutes(&cause_minutes),
        cause_minutes,
        latitude: 0.0,
        longitude: 0.0,
    })
}

// ---------------------------------------------------------------------------
// Joined CSV sources
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AirportRow {
    #[serde(rename = "IATA")]
    iata: String,
    airport_name: String,
    #[serde(rename = "LATITUDE")]
    latitude: f64,
    #[serde(rename = "LONGITUDE")]
    longitude: f64,
}

fn open_csv(path: &Path) -> Result<csv::Reader<std::fs::File>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file))
}

/// File line where a record starts.
fn csv_line(record: &StringRecord) -> usize {
    record.position().map_or(0, |p| p.line() as usize)
}

fn csv_err(path: &Path) -> impl Fn(csv::Error) -> LoadError + '_ {
    move |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

/// Airport reference table keyed by IATA code. The first row for a code wins.
fn load_airports(path: &Path) -> Result<HashMap<String, AirportRow>, LoadError> {
    let mut reader = open_csv(path)?;
    let headers = reader.headers().map_err(csv_err(path))?.clone();
    Columns::resolve(path, headers.iter(), &AIRPORT_COLUMNS)?;

    let mut airports = HashMap::new();
    for result in reader.deserialize::<AirportRow>() {
        let row = result.map_err(csv_err(path))?;
        if airports.contains_key(&row.iata) {
            log::debug!("Duplicate airport code {} in {}", row.iata, path.display());
            continue;
        }
        airports.insert(row.iata.clone(), row);
    }
    Ok(airports)
}

fn load_joined(delays: &Path, airports: &Path) -> Result<Loaded, LoadError> {
    let reference = load_airports(airports)?;

    let mut reader = open_csv(delays)?;
    let headers = reader.headers().map_err(csv_err(delays))?.clone();
    let columns = Columns::resolve(delays, headers.iter(), &DELAY_COLUMNS)?;
    let has_hour = columns.has(HOUR_COLUMN);

    let mut report = LoadReport::default();
    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_err(delays))?;
        let row = CsvRow {
            path: delays,
            line: csv_line(&record),
            record: &record,
            columns: &columns,
        };
        report.rows_read += 1;

        let mut rec = parse_delay_fields(&row, has_hour, &mut report)?;
        let Some(airport) = reference.get(&rec.airport) else {
            report.rows_dropped_by_join += 1;
            continue;
        };
        rec.airport_name = airport.airport_name.clone();
        rec.latitude = airport.latitude;
        rec.longitude = airport.longitude;
        records.push(rec);
    }

    Ok((records, has_hour, report))
}

// ---------------------------------------------------------------------------
// Pre-merged sources
// ---------------------------------------------------------------------------

/// Load a single pre-merged table. Dispatch by extension.
fn load_merged(path: &Path) -> Result<Loaded, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => load_merged_csv(path),
        "parquet" | "pq" => load_merged_parquet(path),
        other => Err(LoadError::UnsupportedFormat(other.to_string())),
    }
}

fn merged_required() -> Vec<&'static str> {
    DELAY_COLUMNS.iter().chain(GEO_COLUMNS.iter()).copied().collect()
}

fn parse_merged_row<R: RowCells>(
    row: &R,
    has_hour: bool,
    report: &mut LoadReport,
) -> Result<FlightDelayRecord, LoadError> {
    let mut rec = parse_delay_fields(row, has_hour, report)?;
    rec.airport_name = row.text("airport_name")?;
    rec.latitude = row.required_number("LATITUDE")?;
    rec.longitude = row.required_number("LONGITUDE")?;
    Ok(rec)
}

fn load_merged_csv(path: &Path) -> Result<Loaded, LoadError> {
    let mut reader = open_csv(path)?;
    let headers = reader.headers().map_err(csv_err(path))?.clone();
    let columns = Columns::resolve(path, headers.iter(), &merged_required())?;
    let has_hour = columns.has(HOUR_COLUMN);

    let mut report = LoadReport::default();
    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_err(path))?;
        let row = CsvRow {
            path,
            line: csv_line(&record),
            record: &record,
            columns: &columns,
        };
        report.rows_read += 1;
        records.push(parse_merged_row(&row, has_hour, &mut report)?);
    }
    Ok((records, has_hour, report))
}

/// Parquet with the same column names as the merged CSV. Numeric columns may
/// be Int32/Int64/Float32/Float64, text columns Utf8/LargeUtf8.
fn load_merged_parquet(path: &Path) -> Result<Loaded, LoadError> {
    let parquet_err = |source| LoadError::Parquet {
        path: path.to_path_buf(),
        source,
    };
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(parquet_err)?;
    let schema = builder.schema().clone();
    let columns = Columns::resolve(
        path,
        schema.fields().iter().map(|f| f.name().as_str()),
        &merged_required(),
    )?;
    let has_hour = columns.has(HOUR_COLUMN);
    let reader = builder.build().map_err(parquet_err)?;

    let mut report = LoadReport::default();
    let mut records = Vec::new();
    for batch_result in reader {
        let batch = batch_result.map_err(|source| LoadError::Arrow {
            path: path.to_path_buf(),
            source,
        })?;
        let offset = report.rows_read;
        for row_no in 0..batch.num_rows() {
            let row = ArrowRow {
                path,
                row: row_no,
                offset,
                batch: &batch,
                columns: &columns,
            };
            report.rows_read += 1;
            records.push(parse_merged_row(&row, has_hour, &mut report)?);
        }
    }
    Ok((records, has_hour, report))
}
