use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::filter::{FilterSpec, filtered_indices, has_selected_values, selected_delay};
use super::model::{BaseTable, DelayCause, DelayType, Month};

// ---------------------------------------------------------------------------
// View types
// ---------------------------------------------------------------------------

/// A record that survived filtering, with its `Selected_Delay`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilteredRow {
    /// Index into [`BaseTable::records`].
    pub index: usize,
    pub selected_delay: f64,
}

/// Headline metrics. All zero for an empty selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Kpis {
    pub total_flights: f64,
    pub total_delayed: f64,
    /// `100 * total_delayed / total_flights`, or 0 when there are no flights.
    pub delay_percentage: f64,
    pub total_delay_minutes: f64,
    pub total_cancellations: f64,
    pub total_diverted: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CauseTotal {
    pub cause: DelayCause,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub month: Month,
    pub selected_delay: f64,
}

/// One line of the trend chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub year: i32,
    /// Jan…Dec order.
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTrend {
    /// One series per year, ascending.
    pub series: Vec<TrendSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirportDelayTotals {
    pub airport: String,
    pub airport_name: String,
    pub arr_del15: f64,
    pub arr_cancelled: f64,
    pub arr_diverted: f64,
    pub selected_delay: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirportDelayRate {
    pub airport: String,
    pub airport_name: String,
    /// Mean of per-row `arr_del15 / arr_flights`.
    pub delay_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub magnitude: f64,
    pub airport_name: String,
    pub carrier_name: String,
    /// Cause values shown on hover: the selected causes, or all five for Total Delay.
    pub hover: Vec<(DelayCause, Option<f64>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeoView {
    NoData,
    Points(Vec<GeoPoint>),
}

impl GeoView {
    pub fn len(&self) -> usize {
        match self {
            GeoView::NoData => 0,
            GeoView::Points(points) => points.len(),
        }
    }
}

/// Tunables for view derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    /// Length of the airport rankings.
    pub top_n: usize,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self { top_n: 10 }
    }
}

/// Everything the dashboard draws for one filter selection.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedViews {
    pub delay_types: Vec<DelayType>,
    pub rows: Vec<FilteredRow>,
    pub kpis: Kpis,
    /// Summed `*_ct` columns, descending.
    pub cause_counts: Vec<CauseTotal>,
    /// Summed cause durations, descending.
    pub cause_minutes: Vec<CauseTotal>,
    /// `None` when the rows span fewer than two distinct months.
    pub monthly_trend: Option<MonthlyTrend>,
    pub top_airports_by_delay: Vec<AirportDelayTotals>,
    pub top_airports_by_rate: Vec<AirportDelayRate>,
    pub geo: GeoView,
}

impl DerivedViews {
    /// First `n` filtered rows for the table preview.
    pub fn preview(&self, n: usize) -> &[FilteredRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Derive every view from the base table. Pure: the table is only read.
///
/// `spec.delay_types` must already be normalized.
pub fn compute_views(
    table: &BaseTable,
    spec: &FilterSpec,
    options: &ViewOptions,
) -> DerivedViews {
    let rows: Vec<FilteredRow> = filtered_indices(table, spec)
        .into_iter()
        .map(|index| FilteredRow {
            index,
            selected_delay: selected_delay(&table.records[index], &spec.delay_types),
        })
        .collect();

    let (cause_counts, cause_minutes) = cause_breakdown(table, &rows);
    let airports = airport_totals(table, &rows);

    DerivedViews {
        kpis: kpis(table, &rows),
        cause_counts,
        cause_minutes,
        monthly_trend: monthly_trend(table, &rows),
        top_airports_by_delay: airports.into_iter().take(options.top_n).collect(),
        top_airports_by_rate: airport_delay_rates(table, &rows)
            .into_iter()
            .take(options.top_n)
            .collect(),
        geo: geo_view(table, &rows, &spec.delay_types),
        delay_types: spec.delay_types.clone(),
        rows,
    }
}

pub fn kpis(table: &BaseTable, rows: &[FilteredRow]) -> Kpis {
    let mut k = Kpis::default();
    for row in rows {
        let rec = &table.records[row.index];
        k.total_flights += rec.arr_flights;
        k.total_delayed += rec.arr_del15;
        k.total_delay_minutes += row.selected_delay;
        k.total_cancellations += rec.arr_cancelled;
        k.total_diverted += rec.arr_diverted;
    }
    k.delay_percentage = if k.total_flights > 0.0 {
        100.0 * k.total_delayed / k.total_flights
    } else {
        0.0
    };
    k
}

/// Per-cause occurrence counts and minutes, each ranked descending.
pub fn cause_breakdown(
    table: &BaseTable,
    rows: &[FilteredRow],
) -> (Vec<CauseTotal>, Vec<CauseTotal>) {
    let mut counts = [0.0; 5];
    let mut minutes = [0.0; 5];
    for row in rows {
        let rec = &table.records[row.index];
        for (i, cause) in DelayCause::ALL.iter().enumerate() {
            counts[i] += rec.cause_count(*cause);
            minutes[i] += rec.cause_minutes(*cause).unwrap_or(0.0);
        }
    }

    let ranked = |totals: [f64; 5]| {
        let mut out: Vec<CauseTotal> = DelayCause::ALL
            .iter()
            .zip(totals)
            .map(|(cause, value)| CauseTotal {
                cause: *cause,
                value,
            })
            .collect();
        rank_descending(&mut out, |c| c.value);
        out
    };
    (ranked(counts), ranked(minutes))
}

/// `Selected_Delay` per (year, month), one Jan…Dec series per year.
pub fn monthly_trend(table: &BaseTable, rows: &[FilteredRow]) -> Option<MonthlyTrend> {
    let distinct_months: BTreeSet<Month> = rows
        .iter()
        .map(|row| table.records[row.index].month)
        .collect();
    if distinct_months.len() < 2 {
        return None;
    }

    let mut grouped: BTreeMap<i32, BTreeMap<Month, f64>> = BTreeMap::new();
    for row in rows {
        let rec = &table.records[row.index];
        *grouped
            .entry(rec.year)
            .or_default()
            .entry(rec.month)
            .or_insert(0.0) += row.selected_delay;
    }

    let series = grouped
        .into_iter()
        .map(|(year, months)| TrendSeries {
            year,
            points: months
                .into_iter()
                .map(|(month, selected_delay)| TrendPoint {
                    month,
                    selected_delay,
                })
                .collect(),
        })
        .collect();
    Some(MonthlyTrend { series })
}

/// Per-airport sums, ranked by `Selected_Delay`, ties by airport code.
pub fn airport_totals(table: &BaseTable, rows: &[FilteredRow]) -> Vec<AirportDelayTotals> {
    let mut grouped: BTreeMap<&str, AirportDelayTotals> = BTreeMap::new();
    for row in rows {
        let rec = &table.records[row.index];
        let entry = grouped
            .entry(rec.airport.as_str())
            .or_insert_with(|| AirportDelayTotals {
                airport: rec.airport.clone(),
                airport_name: rec.airport_name.clone(),
                arr_del15: 0.0,
                arr_cancelled: 0.0,
                arr_diverted: 0.0,
                selected_delay: 0.0,
            });
        entry.arr_del15 += rec.arr_del15;
        entry.arr_cancelled += rec.arr_cancelled;
        entry.arr_diverted += rec.arr_diverted;
        entry.selected_delay += row.selected_delay;
    }

    let mut out: Vec<AirportDelayTotals> = grouped.into_values().collect();
    rank_descending(&mut out, |a| a.selected_delay);
    out
}

/// Mean per-row delay rate per airport, ranked descending, ties by code.
///
/// Rows without arriving flights have no rate and are skipped; an airport
/// with no rated rows is left out entirely.
pub fn airport_delay_rates(table: &BaseTable, rows: &[FilteredRow]) -> Vec<AirportDelayRate> {
    let mut grouped: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for row in rows {
        let rec = &table.records[row.index];
        if rec.arr_flights <= 0.0 {
            continue;
        }
        let (sum, n) = grouped.entry(rec.airport.as_str()).or_insert((0.0, 0));
        *sum += rec.arr_del15 / rec.arr_flights;
        *n += 1;
    }

    let mut out: Vec<AirportDelayRate> = grouped
        .into_iter()
        .map(|(code, (sum, n))| AirportDelayRate {
            airport: code.to_string(),
            airport_name: table.airport_name(code).to_string(),
            delay_rate: sum / n as f64,
        })
        .collect();
    rank_descending(&mut out, |a| a.delay_rate);
    out
}

/// Rows with all selected delay columns present and a positive `Selected_Delay`.
pub fn geo_view(table: &BaseTable, rows: &[FilteredRow], delay_types: &[DelayType]) -> GeoView {
    let hover_causes: Vec<DelayCause> = if delay_types.contains(&DelayType::Total) {
        DelayCause::ALL.to_vec()
    } else {
        delay_types
            .iter()
            .filter_map(|dt| match dt {
                DelayType::Cause(cause) => Some(*cause),
                DelayType::Total => None,
            })
            .collect()
    };

    let points: Vec<GeoPoint> = rows
        .iter()
        .filter(|row| row.selected_delay > 0.0)
        .filter(|row| has_selected_values(&table.records[row.index], delay_types))
        .map(|row| {
            let rec = &table.records[row.index];
            GeoPoint {
                latitude: rec.latitude,
                longitude: rec.longitude,
                magnitude: row.selected_delay,
                airport_name: rec.airport_name.clone(),
                carrier_name: rec.carrier_name.clone(),
                hover: hover_causes
                    .iter()
                    .map(|c| (*c, rec.cause_minutes(*c)))
                    .collect(),
            }
        })
        .collect();

    if points.is_empty() {
        GeoView::NoData
    } else {
        GeoView::Points(points)
    }
}

/// Stable descending sort; equal keys keep their incoming order.
fn rank_descending<T>(items: &mut [T], key: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| key(b).total_cmp(&key(a)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::FlightDelayRecord;

    fn atl_example() -> BaseTable {
        let jan = FlightDelayRecord::sample("ATL", "Delta", 2015, 1)
            .with_minutes(DelayCause::Carrier, Some(10.0))
            .with_minutes(DelayCause::Weather, Some(5.0))
            .with_flights(100.0, 20.0);
        let feb = FlightDelayRecord::sample("ATL", "Delta", 2015, 2)
            .with_minutes(DelayCause::Carrier, Some(10.0))
            .with_minutes(DelayCause::Weather, Some(5.0))
            .with_flights(50.0, 5.0);
        BaseTable::from_records(vec![jan, feb], false)
    }

    #[test]
    fn total_delay_example_yields_two_point_trend() {
        let table = atl_example();
        for rec in &table.records {
            assert_eq!(rec.total_delay, 15.0);
        }
        let spec = FilterSpec::select_all(&table);
        let views = compute_views(&table, &spec, &ViewOptions::default());

        assert_eq!(views.kpis.total_delay_minutes, 30.0);
        let trend = views.monthly_trend.expect("two months give a trend");
        assert_eq!(trend.series.len(), 1);
        let months: Vec<&str> = trend.series[0].points.iter().map(|p| p.month.label()).collect();
        assert_eq!(months, vec!["Jan", "Feb"]);
        assert_eq!(trend.series[0].points[0].selected_delay, 15.0);
    }

    #[test]
    fn kpis_compute_delay_percentage() {
        let table = atl_example();
        let views = compute_views(&table, &FilterSpec::select_all(&table), &ViewOptions::default());
        assert_eq!(views.kpis.total_flights, 150.0);
        assert_eq!(views.kpis.total_delayed, 25.0);
        assert!((views.kpis.delay_percentage - 100.0 * 25.0 / 150.0).abs() < 1e-9);
    }

    #[test]
    fn zero_flights_give_zero_percentage() {
        let table = BaseTable::from_records(
            vec![FlightDelayRecord::sample("ATL", "Delta", 2015, 1).with_flights(0.0, 3.0)],
            false,
        );
        let views = compute_views(&table, &FilterSpec::select_all(&table), &ViewOptions::default());
        assert_eq!(views.kpis.delay_percentage, 0.0);
        assert!(views.top_airports_by_rate.is_empty());
    }

    #[test]
    fn unmatched_airport_selection_gives_empty_views() {
        let table = atl_example();
        let mut spec = FilterSpec::select_all(&table);
        spec.airports = BTreeSet::from(["ZZZ".to_string()]);
        let views = compute_views(&table, &spec, &ViewOptions::default());

        assert!(views.is_empty());
        assert_eq!(views.kpis, Kpis::default());
        assert_eq!(views.geo, GeoView::NoData);
        assert!(views.monthly_trend.is_none());
        assert!(views.top_airports_by_delay.is_empty());
        assert!(views.cause_minutes.iter().all(|c| c.value == 0.0));
    }

    #[test]
    fn single_month_omits_trend() {
        let table = atl_example();
        let mut spec = FilterSpec::select_all(&table);
        spec.months = BTreeSet::from([Month::new(1).unwrap()]);
        let views = compute_views(&table, &spec, &ViewOptions::default());
        assert_eq!(views.rows.len(), 1);
        assert!(views.monthly_trend.is_none());
    }

    #[test]
    fn trend_orders_months_canonically_per_year() {
        let records = vec![
            FlightDelayRecord::sample("ATL", "Delta", 2016, 12)
                .with_minutes(DelayCause::Nas, Some(1.0)),
            FlightDelayRecord::sample("ATL", "Delta", 2015, 3)
                .with_minutes(DelayCause::Nas, Some(2.0)),
            FlightDelayRecord::sample("SFO", "Delta", 2016, 2)
                .with_minutes(DelayCause::Nas, Some(4.0)),
            FlightDelayRecord::sample("SFO", "Delta", 2015, 3)
                .with_minutes(DelayCause::Nas, Some(8.0)),
        ];
        let table = BaseTable::from_records(records, false);
        let trend = compute_views(&table, &FilterSpec::select_all(&table), &ViewOptions::default())
            .monthly_trend
            .unwrap();

        assert_eq!(trend.series.iter().map(|s| s.year).collect::<Vec<_>>(), vec![2015, 2016]);
        assert_eq!(trend.series[0].points.len(), 1);
        assert_eq!(trend.series[0].points[0].selected_delay, 10.0);
        let months_2016: Vec<u32> = trend.series[1]
            .points
            .iter()
            .map(|p| p.month.number())
            .collect();
        assert_eq!(months_2016, vec![2, 12]);
    }

    #[test]
    fn cause_breakdown_is_ranked_descending() {
        let mut rec = FlightDelayRecord::sample("ATL", "Delta", 2015, 1)
            .with_minutes(DelayCause::LateAircraft, Some(30.0))
            .with_minutes(DelayCause::Weather, Some(7.0));
        rec.cause_counts = [1.0, 0.5, 4.0, 0.0, 2.0];
        let table = BaseTable::from_records(vec![rec], false);
        let views = compute_views(&table, &FilterSpec::select_all(&table), &ViewOptions::default());

        let minutes: Vec<DelayCause> = views.cause_minutes.iter().map(|c| c.cause).collect();
        assert_eq!(
            minutes,
            vec![
                DelayCause::LateAircraft,
                DelayCause::Weather,
                DelayCause::Carrier,
                DelayCause::Nas,
                DelayCause::Security
            ]
        );
        assert_eq!(views.cause_counts[0].cause, DelayCause::Nas);
        assert_eq!(views.cause_counts[0].value, 4.0);
        assert_eq!(views.cause_counts[4].cause, DelayCause::Security);
    }

    #[test]
    fn selected_cause_drives_airport_ranking() {
        let records = vec![
            FlightDelayRecord::sample("ATL", "Delta", 2015, 1)
                .with_minutes(DelayCause::Weather, Some(5.0))
                .with_minutes(DelayCause::Carrier, Some(100.0)),
            FlightDelayRecord::sample("SFO", "Delta", 2015, 1)
                .with_minutes(DelayCause::Weather, Some(9.0)),
        ];
        let table = BaseTable::from_records(records, false);
        let mut spec = FilterSpec::select_all(&table);
        spec.set_delay_types(&[DelayType::Cause(DelayCause::Weather)]);
        let views = compute_views(&table, &spec, &ViewOptions::default());

        assert_eq!(views.top_airports_by_delay[0].airport, "SFO");
        assert_eq!(views.kpis.total_delay_minutes, 14.0);
    }

    #[test]
    fn airport_rankings_are_deterministic_under_ties() {
        let records: Vec<FlightDelayRecord> = ["ORD", "ATL", "SFO", "DEN"]
            .iter()
            .map(|code| {
                FlightDelayRecord::sample(code, "Delta", 2015, 1)
                    .with_minutes(DelayCause::Carrier, Some(10.0))
                    .with_flights(10.0, 1.0)
            })
            .collect();
        let table = BaseTable::from_records(records, false);
        let spec = FilterSpec::select_all(&table);

        let first = compute_views(&table, &spec, &ViewOptions::default());
        let second = compute_views(&table, &spec, &ViewOptions::default());
        let codes: Vec<&str> = first
            .top_airports_by_delay
            .iter()
            .map(|a| a.airport.as_str())
            .collect();
        assert_eq!(codes, vec!["ATL", "DEN", "ORD", "SFO"]);
        assert_eq!(first.top_airports_by_delay, second.top_airports_by_delay);
        assert_eq!(first.top_airports_by_rate, second.top_airports_by_rate);
    }

    #[test]
    fn rankings_are_truncated_to_top_n() {
        let records: Vec<FlightDelayRecord> = (0..12)
            .map(|i| {
                FlightDelayRecord::sample(&format!("A{i:02}"), "Delta", 2015, 1)
                    .with_minutes(DelayCause::Carrier, Some(i as f64))
                    .with_flights(10.0, i as f64)
            })
            .collect();
        let table = BaseTable::from_records(records, false);
        let views = compute_views(&table, &FilterSpec::select_all(&table), &ViewOptions::default());
        assert_eq!(views.top_airports_by_delay.len(), 10);
        assert_eq!(views.top_airports_by_delay[0].airport, "A11");
        assert_eq!(views.top_airports_by_rate.len(), 10);
        assert!((views.top_airports_by_rate[0].delay_rate - 1.1).abs() < 1e-9);
    }

    #[test]
    fn delay_rate_is_mean_of_row_rates() {
        let records = vec![
            FlightDelayRecord::sample("ATL", "Delta", 2015, 1).with_flights(10.0, 5.0),
            FlightDelayRecord::sample("ATL", "United", 2015, 1).with_flights(100.0, 10.0),
            FlightDelayRecord::sample("ATL", "American", 2015, 1).with_flights(0.0, 0.0),
        ];
        let table = BaseTable::from_records(records, false);
        let rates = airport_delay_rates(
            &table,
            &compute_views(&table, &FilterSpec::select_all(&table), &ViewOptions::default()).rows,
        );
        assert_eq!(rates.len(), 1);
        assert!((rates[0].delay_rate - 0.3).abs() < 1e-9);
    }

    #[test]
    fn geo_view_skips_missing_and_zero_delays() {
        let records = vec![
            FlightDelayRecord::sample("ATL", "Delta", 2015, 1)
                .with_minutes(DelayCause::Weather, Some(3.0)),
            FlightDelayRecord::sample("SFO", "Delta", 2015, 1)
                .with_minutes(DelayCause::Weather, None),
            FlightDelayRecord::sample("ORD", "Delta", 2015, 1)
                .with_minutes(DelayCause::Carrier, Some(8.0)),
        ];
        let table = BaseTable::from_records(records, false);
        let mut spec = FilterSpec::select_all(&table);
        spec.set_delay_types(&[DelayType::Cause(DelayCause::Weather)]);

        let GeoView::Points(points) = compute_views(&table, &spec, &ViewOptions::default()).geo
        else {
            panic!("expected geo points");
        };
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].airport_name, "ATL International");
        assert_eq!(points[0].hover, vec![(DelayCause::Weather, Some(3.0))]);

        spec.set_delay_types(&[DelayType::Total]);
        let geo = compute_views(&table, &spec, &ViewOptions::default()).geo;
        assert_eq!(geo.len(), 2);
        if let GeoView::Points(points) = geo {
            assert_eq!(points[0].hover.len(), 5);
        }
    }

    #[test]
    fn preview_is_capped() {
        let table = atl_example();
        let views = compute_views(&table, &FilterSpec::select_all(&table), &ViewOptions::default());
        assert_eq!(views.preview(1).len(), 1);
        assert_eq!(views.preview(100).len(), 2);
    }
}
