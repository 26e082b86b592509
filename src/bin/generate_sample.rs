use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

const DELAYS_PATH: &str = "Airline_Delay_Cause.csv";
const AIRPORTS_PATH: &str = "airports.csv";
const MERGED_PATH: &str = "airline_delays_merged.parquet";

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

#[derive(Serialize)]
struct AirportRow {
    #[serde(rename = "IATA")]
    iata: &'static str,
    airport_name: &'static str,
    #[serde(rename = "LATITUDE")]
    latitude: f64,
    #[serde(rename = "LONGITUDE")]
    longitude: f64,
}

#[derive(Serialize, Clone)]
struct DelayRow {
    year: i64,
    month: i64,
    airport: &'static str,
    carrier_name: &'static str,
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
}

static AIRPORTS: [(&str, &str, f64, f64); 8] = [
    ("ATL", "Hartsfield-Jackson Atlanta International", 33.6407, -84.4277),
    ("ORD", "Chicago O'Hare International", 41.9742, -87.9073),
    ("DFW", "Dallas/Fort Worth International", 32.8998, -97.0403),
    ("DEN", "Denver International", 39.8561, -104.6737),
    ("LAX", "Los Angeles International", 33.9416, -118.4085),
    ("JFK", "John F. Kennedy International", 40.6413, -73.7781),
    ("SEA", "Seattle-Tacoma International", 47.4502, -122.3088),
    ("MIA", "Miami International", 25.7959, -80.2870),
];

const CARRIERS: [&str; 4] = [
    "Delta Air Lines Inc.",
    "American Airlines Inc.",
    "United Air Lines Inc.",
    "Southwest Airlines Co.",
];

/// Airport codes present in the delay table but absent from the reference
/// table, so the join has something to drop.
const UNLISTED_AIRPORTS: [&str; 1] = ["PPG"];

fn airport_info(code: &str) -> Option<&'static (&'static str, &'static str, f64, f64)> {
    AIRPORTS.iter().find(|a| a.0 == code)
}

fn generate_row(
    rng: &mut SimpleRng,
    year: i64,
    month: i64,
    airport: &'static str,
    carrier_name: &'static str,
) -> DelayRow {
    // Winter and summer peaks
    let season = if matches!(month, 6..=8 | 12 | 1) { 1.4 } else { 1.0 };
    let arr_flights = rng.range(200.0, 2000.0).round();
    let arr_del15 = (arr_flights * rng.range(0.08, 0.25) * season).round();
    let arr_cancelled = (arr_flights * rng.range(0.0, 0.03)).round();
    let arr_diverted = (arr_flights * rng.range(0.0, 0.005)).round();

    // Split delayed flights across the five causes
    let weights = [
        rng.range(0.2, 0.4),
        rng.range(0.01, 0.08) * season,
        rng.range(0.2, 0.35),
        rng.range(0.0, 0.01),
        rng.range(0.25, 0.45),
    ];
    let weight_sum: f64 = weights.iter().sum();
    let counts: Vec<f64> = weights
        .iter()
        .map(|w| (arr_del15 * w / weight_sum * 100.0).round() / 100.0)
        .collect();
    let minutes: Vec<Option<f64>> = counts
        .iter()
        .map(|ct| {
            // A few cells left empty, as in the BTS export
            if rng.next_f64() < 0.01 {
                None
            } else {
                Some((ct * rng.range(40.0, 90.0)).round())
            }
        })
        .collect();

    DelayRow {
        year,
        month,
        airport,
        carrier_name,
        arr_flights,
        arr_del15,
        arr_cancelled,
        arr_diverted,
        carrier_ct: counts[0],
        weather_ct: counts[1],
        nas_ct: counts[2],
        security_ct: counts[3],
        late_aircraft_ct: counts[4],
        carrier_delay: minutes[0],
        weather_delay: minutes[1],
        nas_delay: minutes[2],
        security_delay: minutes[3],
        late_aircraft_delay: minutes[4],
    }
}

fn write_airports() -> Result<()> {
    let mut writer = csv::Writer::from_path(AIRPORTS_PATH).context("creating airports CSV")?;
    for (iata, airport_name, latitude, longitude) in AIRPORTS {
        writer.serialize(AirportRow {
            iata,
            airport_name,
            latitude,
            longitude,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn write_delays(rows: &[DelayRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(DELAYS_PATH).context("creating delays CSV")?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Pre-merged Parquet with airport names and coordinates inlined.
fn write_merged(rows: &[DelayRow]) -> Result<usize> {
    let listed: Vec<&DelayRow> = rows
        .iter()
        .filter(|r| AIRPORTS.iter().any(|a| a.0 == r.airport))
        .collect();
    let f64_col = |f: fn(&DelayRow) -> Option<f64>| -> ArrayRef {
        Arc::new(Float64Array::from(listed.iter().map(|r| f(r)).collect::<Vec<_>>()))
    };

    let schema = Arc::new(Schema::new(vec![
        Field::new("year", DataType::Int64, false),
        Field::new("month", DataType::Int64, false),
        Field::new("airport", DataType::Utf8, false),
        Field::new("airport_name", DataType::Utf8, false),
        Field::new("carrier_name", DataType::Utf8, false),
        Field::new("arr_flights", DataType::Float64, true),
        Field::new("arr_del15", DataType::Float64, true),
        Field::new("arr_cancelled", DataType::Float64, true),
        Field::new("arr_diverted", DataType::Float64, true),
        Field::new("carrier_ct", DataType::Float64, true),
        Field::new("weather_ct", DataType::Float64, true),
        Field::new("nas_ct", DataType::Float64, true),
        Field::new("security_ct", DataType::Float64, true),
        Field::new("late_aircraft_ct", DataType::Float64, true),
        Field::new("carrier_delay", DataType::Float64, true),
        Field::new("weather_delay", DataType::Float64, true),
        Field::new("nas_delay", DataType::Float64, true),
        Field::new("security_delay", DataType::Float64, true),
        Field::new("late_aircraft_delay", DataType::Float64, true),
        Field::new("LATITUDE", DataType::Float64, false),
        Field::new("LONGITUDE", DataType::Float64, false),
    ]));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(listed.iter().map(|r| r.year).collect::<Vec<_>>())),
        Arc::new(Int64Array::from(listed.iter().map(|r| r.month).collect::<Vec<_>>())),
        Arc::new(StringArray::from(listed.iter().map(|r| r.airport).collect::<Vec<_>>())),
        Arc::new(StringArray::from(
            listed
                .iter()
                .map(|r| airport_info(r.airport).map(|a| a.1).unwrap_or_default())
                .collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(listed.iter().map(|r| r.carrier_name).collect::<Vec<_>>())),
        f64_col(|r| Some(r.arr_flights)),
        f64_col(|r| Some(r.arr_del15)),
        f64_col(|r| Some(r.arr_cancelled)),
        f64_col(|r| Some(r.arr_diverted)),
        f64_col(|r| Some(r.carrier_ct)),
        f64_col(|r| Some(r.weather_ct)),
        f64_col(|r| Some(r.nas_ct)),
        f64_col(|r| Some(r.security_ct)),
        f64_col(|r| Some(r.late_aircraft_ct)),
        f64_col(|r| r.carrier_delay),
        f64_col(|r| r.weather_delay),
        f64_col(|r| r.nas_delay),
        f64_col(|r| r.security_delay),
        f64_col(|r| r.late_aircraft_delay),
        f64_col(|r| airport_info(r.airport).map(|a| a.2)),
        f64_col(|r| airport_info(r.airport).map(|a| a.3)),
    ];

    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;
    let file = std::fs::File::create(MERGED_PATH).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(listed.len())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);

    let mut rows = Vec::new();
    for year in [2019, 2020] {
        for month in 1..=12 {
            for (code, ..) in AIRPORTS {
                for carrier in CARRIERS {
                    rows.push(generate_row(&mut rng, year, month, code, carrier));
                }
            }
            for code in UNLISTED_AIRPORTS {
                rows.push(generate_row(&mut rng, year, month, code, CARRIERS[0]));
            }
        }
    }

    write_airports()?;
    write_delays(&rows)?;
    let merged = write_merged(&rows)?;

    println!(
        "Wrote {} delay rows to {DELAYS_PATH}, {} airports to {AIRPORTS_PATH}, {merged} merged rows to {MERGED_PATH}",
        rows.len(),
        AIRPORTS.len()
    );
    Ok(())
}
