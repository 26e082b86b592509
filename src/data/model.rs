use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Month – calendar month with a fixed Jan…Dec ordering
// ---------------------------------------------------------------------------

pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// A calendar month (1–12). Ordering is the canonical Jan…Dec order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month(u32);

impl Month {
    pub fn new(number: u32) -> Option<Self> {
        (1..=12).contains(&number).then_some(Month(number))
    }

    pub fn number(self) -> u32 {
        self.0
    }

    /// Three-letter label, e.g. `"Jan"`.
    pub fn label(self) -> &'static str {
        MONTH_LABELS[(self.0 - 1) as usize]
    }

    /// All twelve months, Jan first.
    pub fn all() -> impl Iterator<Item = Month> {
        (1..=12).map(Month)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Delay causes and user-facing delay types
// ---------------------------------------------------------------------------

/// One of the five BTS delay causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayCause {
    Carrier,
    Weather,
    Nas,
    Security,
    LateAircraft,
}

impl DelayCause {
    /// Canonical order, also used to break ties in rankings.
    pub const ALL: [DelayCause; 5] = [
        DelayCause::Carrier,
        DelayCause::Weather,
        DelayCause::Nas,
        DelayCause::Security,
        DelayCause::LateAircraft,
    ];

    /// Source column holding the delay duration in minutes.
    pub fn duration_column(self) -> &'static str {
        match self {
            DelayCause::Carrier => "carrier_delay",
            DelayCause::Weather => "weather_delay",
            DelayCause::Nas => "nas_delay",
            DelayCause::Security => "security_delay",
            DelayCause::LateAircraft => "late_aircraft_delay",
        }
    }

    /// Source column holding the number of delay occurrences.
    pub fn count_column(self) -> &'static str {
        match self {
            DelayCause::Carrier => "carrier_ct",
            DelayCause::Weather => "weather_ct",
            DelayCause::Nas => "nas_ct",
            DelayCause::Security => "security_ct",
            DelayCause::LateAircraft => "late_aircraft_ct",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DelayCause::Carrier => "Carrier Delay",
            DelayCause::Weather => "Weather Delay",
            DelayCause::Nas => "NAS Delay",
            DelayCause::Security => "Security Delay",
            DelayCause::LateAircraft => "Late Aircraft Delay",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// A delay-type key the user can select: a single cause or the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DelayType {
    Cause(DelayCause),
    Total,
}

impl DelayType {
    pub const ALL: [DelayType; 6] = [
        DelayType::Cause(DelayCause::Carrier),
        DelayType::Cause(DelayCause::Weather),
        DelayType::Cause(DelayCause::Nas),
        DelayType::Cause(DelayCause::Security),
        DelayType::Cause(DelayCause::LateAircraft),
        DelayType::Total,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DelayType::Cause(cause) => cause.label(),
            DelayType::Total => "Total Delay",
        }
    }
}

impl fmt::Display for DelayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// FlightDelayRecord – one row of the base table
// ---------------------------------------------------------------------------

/// Aggregate delay statistics for one (airport, carrier, year, month[, hour]).
///
/// Count measures are `f64` because BTS publishes fractional cause counts.
/// Missing counts load as `0.0`; missing cause durations stay `None` so the
/// geographic view can tell "missing" from "zero".
#[derive(Debug, Clone, PartialEq)]
pub struct FlightDelayRecord {
    pub year: i32,
    pub month: Month,
    pub hour: Option<u32>,
    pub airport: String,
    pub airport_name: String,
    pub carrier_name: String,

    pub arr_flights: f64,
    pub arr_del15: f64,
    pub arr_cancelled: f64,
    pub arr_diverted: f64,

    /// Occurrence counts in [`DelayCause::ALL`] order.
    pub cause_counts: [f64; 5],
    /// Durations in minutes in [`DelayCause::ALL`] order.
    pub cause_minutes: [Option<f64>; 5],
    /// Sum of `cause_minutes`, missing treated as zero. Set once at load.
    pub total_delay: f64,

    pub latitude: f64,
    pub longitude: f64,
}

impl FlightDelayRecord {
    pub fn cause_count(&self, cause: DelayCause) -> f64 {
        self.cause_counts[cause.index()]
    }

    pub fn cause_minutes(&self, cause: DelayCause) -> Option<f64> {
        self.cause_minutes[cause.index()]
    }

    pub fn month_name(&self) -> &'static str {
        self.month.label()
    }
}

/// Row-wise sum of the cause durations, missing values counted as zero.
pub fn sum_cause_minutes(minutes: &[Option<f64>; 5]) -> f64 {
    minutes.iter().map(|m| m.unwrap_or(0.0)).sum()
}

// ---------------------------------------------------------------------------
// BaseTable – the loaded, immutable dataset
// ---------------------------------------------------------------------------

/// The normalized dataset plus the distinct values offered as filters.
#[derive(Debug, Clone, Default)]
pub struct BaseTable {
    pub records: Vec<FlightDelayRecord>,
    /// Distinct years, ascending.
    pub years: Vec<i32>,
    /// Distinct carriers in first-seen order.
    pub carriers: Vec<String>,
    /// Airport code → airport name.
    pub airports: BTreeMap<String, String>,
    /// Distinct hours, only when the source carried an `hour` column with at
    /// least one value. `None` turns hour filtering off.
    pub hours: Option<Vec<u32>>,
}

impl BaseTable {
    /// Build filter domains from the loaded records.
    pub fn from_records(records: Vec<FlightDelayRecord>, has_hour_column: bool) -> Self {
        let mut years = BTreeSet::new();
        let mut carriers: Vec<String> = Vec::new();
        let mut seen_carriers = BTreeSet::new();
        let mut airports = BTreeMap::new();
        let mut hours = BTreeSet::new();

        for rec in &records {
            years.insert(rec.year);
            if seen_carriers.insert(rec.carrier_name.as_str()) {
                carriers.push(rec.carrier_name.clone());
            }
            airports
                .entry(rec.airport.clone())
                .or_insert_with(|| rec.airport_name.clone());
            if let Some(h) = rec.hour {
                hours.insert(h);
            }
        }

        BaseTable {
            years: years.into_iter().collect(),
            carriers,
            airports,
            hours: (has_hour_column && !hours.is_empty())
                .then(|| hours.into_iter().collect()),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Display name for an airport code, falling back to the code itself.
    pub fn airport_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.airports.get(code).map(String::as_str).unwrap_or(code)
    }
}

#[cfg(test)]
impl FlightDelayRecord {
    /// Test helper: a row with all measures zeroed.
    pub(crate) fn sample(airport: &str, carrier: &str, year: i32, month: u32) -> Self {
        FlightDelayRecord {
            year,
            month: Month::new(month).expect("valid month"),
            hour: None,
            airport: airport.to_string(),
            airport_name: format!("{airport} International"),
            carrier_name: carrier.to_string(),
            arr_flights: 0.0,
            arr_del15: 0.0,
            arr_cancelled: 0.0,
            arr_diverted: 0.0,
            cause_counts: [0.0; 5],
            cause_minutes: [Some(0.0); 5],
            total_delay: 0.0,
            latitude: 33.64,
            longitude: -84.43,
        }
    }

    /// Test helper: set one cause duration and keep `total_delay` consistent.
    pub(crate) fn with_minutes(mut self, cause: DelayCause, minutes: Option<f64>) -> Self {
        self.cause_minutes[cause.index()] = minutes;
        self.total_delay = sum_cause_minutes(&self.cause_minutes);
        self
    }

    pub(crate) fn with_flights(mut self, flights: f64, delayed: f64) -> Self {
        self.arr_flights = flights;
        self.arr_del15 = delayed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_labels_round_trip_in_canonical_order() {
        let labels: Vec<&str> = Month::all().map(Month::label).collect();
        assert_eq!(labels, MONTH_LABELS);
        assert_eq!(Month::new(2).map(Month::label), Some("Feb"));
        assert_eq!(Month::new(13), None);
        assert_eq!(Month::new(0), None);
    }

    #[test]
    fn total_delay_treats_missing_as_zero() {
        let minutes = [Some(10.0), None, Some(2.5), None, Some(0.5)];
        assert_eq!(sum_cause_minutes(&minutes), 13.0);
    }

    #[test]
    fn domains_are_collected_from_records() {
        let records = vec![
            FlightDelayRecord::sample("SFO", "Delta", 2016, 3),
            FlightDelayRecord::sample("ATL", "United", 2015, 1),
            FlightDelayRecord::sample("ATL", "Delta", 2015, 2),
        ];
        let table = BaseTable::from_records(records, false);
        assert_eq!(table.years, vec![2015, 2016]);
        assert_eq!(table.carriers, vec!["Delta", "United"]);
        assert_eq!(table.airports.keys().collect::<Vec<_>>(), vec!["ATL", "SFO"]);
        assert!(table.hours.is_none());
    }

    #[test]
    fn hour_domain_present_only_with_hour_column() {
        let mut rec = FlightDelayRecord::sample("ATL", "Delta", 2015, 1);
        rec.hour = Some(7);
        let table = BaseTable::from_records(vec![rec], true);
        assert_eq!(table.hours, Some(vec![7]));
    }

    #[test]
    fn blank_hour_column_gives_no_hour_domain() {
        let rec = FlightDelayRecord::sample("ATL", "Delta", 2015, 1);
        let table = BaseTable::from_records(vec![rec], true);
        assert!(table.hours.is_none());
    }

    #[test]
    fn unknown_airport_name_falls_back_to_code() {
        let rec = FlightDelayRecord::sample("ATL", "Delta", 2015, 1);
        let table = BaseTable::from_records(vec![rec], false);
        let code = String::from("ZZZ");
        assert_eq!(table.airport_name(&code), "ZZZ");
        assert_eq!(table.airport_name("ATL"), "ATL International");
    }
}
