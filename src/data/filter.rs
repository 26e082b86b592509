use std::collections::BTreeSet;

use super::model::{BaseTable, DelayType, FlightDelayRecord, Month};

// ---------------------------------------------------------------------------
// FilterSpec: which values are selected per dimension
// ---------------------------------------------------------------------------

pub const CONFLICTING_DELAY_WARNING: &str =
    "Total Delay selected. Other delay types will be ignored.";

/// User selection for one recomputation.
///
/// Every dimension uses set-membership semantics: an empty set selects
/// nothing. `hours` is `None` when the data has no hour column, in which case
/// hours are not filtered at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub years: BTreeSet<i32>,
    pub months: BTreeSet<Month>,
    /// Normalized delay-type keys, see [`normalize_delay_types`].
    pub delay_types: Vec<DelayType>,
    pub carriers: BTreeSet<String>,
    /// Airport codes.
    pub airports: BTreeSet<String>,
    pub hours: Option<BTreeSet<u32>>,
}

impl FilterSpec {
    /// Everything selected, delay type = Total Delay.
    pub fn select_all(table: &BaseTable) -> Self {
        FilterSpec {
            years: table.years.iter().copied().collect(),
            months: Month::all().collect(),
            delay_types: vec![DelayType::Total],
            carriers: table.carriers.iter().cloned().collect(),
            airports: table.airports.keys().cloned().collect(),
            hours: table
                .hours
                .as_ref()
                .map(|hours| hours.iter().copied().collect()),
        }
    }

    /// Replace the delay-type selection, normalizing it first.
    /// Returns the warning to surface when the request was conflicting.
    pub fn set_delay_types(&mut self, requested: &[DelayType]) -> Option<&'static str> {
        let selection = normalize_delay_types(requested);
        self.delay_types = selection.types;
        selection.warning
    }

    /// Whether a record passes every row-selection dimension.
    pub fn matches(&self, rec: &FlightDelayRecord) -> bool {
        self.years.contains(&rec.year)
            && self.months.contains(&rec.month)
            && self.carriers.contains(&rec.carrier_name)
            && self.airports.contains(&rec.airport)
            && match &self.hours {
                None => true,
                Some(hours) => rec.hour.is_some_and(|h| hours.contains(&h)),
            }
    }
}

// ---------------------------------------------------------------------------
// Delay-type normalization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelaySelection {
    pub types: Vec<DelayType>,
    pub warning: Option<&'static str>,
}

/// Apply the Total-Delay exclusivity rule.
///
/// Total Delay together with anything else collapses to Total Delay alone and
/// yields [`CONFLICTING_DELAY_WARNING`]. Duplicates are dropped, order kept.
pub fn normalize_delay_types(requested: &[DelayType]) -> DelaySelection {
    let mut types: Vec<DelayType> = Vec::with_capacity(requested.len());
    for dt in requested {
        if !types.contains(dt) {
            types.push(*dt);
        }
    }

    if types.contains(&DelayType::Total) && types.len() > 1 {
        log::warn!("{CONFLICTING_DELAY_WARNING}");
        return DelaySelection {
            types: vec![DelayType::Total],
            warning: Some(CONFLICTING_DELAY_WARNING),
        };
    }
    DelaySelection {
        types,
        warning: None,
    }
}

// ---------------------------------------------------------------------------
// Row selection and Selected_Delay
// ---------------------------------------------------------------------------

/// Indices of records passing the filter, in base-table order.
pub fn filtered_indices(table: &BaseTable, spec: &FilterSpec) -> Vec<usize> {
    table
        .records
        .iter()
        .enumerate()
        .filter(|(_, rec)| spec.matches(rec))
        .map(|(i, _)| i)
        .collect()
}

/// Sum of the selected delay columns for one record, missing counted as zero.
pub fn selected_delay(rec: &FlightDelayRecord, delay_types: &[DelayType]) -> f64 {
    delay_types
        .iter()
        .map(|dt| match dt {
            DelayType::Total => rec.total_delay,
            DelayType::Cause(cause) => rec.cause_minutes(*cause).unwrap_or(0.0),
        })
        .sum()
}

/// Whether every selected delay column has a value for this record.
/// `Total_Delay` is always present.
pub fn has_selected_values(rec: &FlightDelayRecord, delay_types: &[DelayType]) -> bool {
    delay_types.iter().all(|dt| match dt {
        DelayType::Total => true,
        DelayType::Cause(cause) => rec.cause_minutes(*cause).is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::DelayCause;
    use proptest::prelude::*;

    fn table() -> BaseTable {
        let records = vec![
            FlightDelayRecord::sample("ATL", "Delta", 2015, 1),
            FlightDelayRecord::sample("ATL", "United", 2015, 2),
            FlightDelayRecord::sample("SFO", "Delta", 2016, 1),
            FlightDelayRecord::sample("ORD", "American", 2016, 7),
        ];
        BaseTable::from_records(records, false)
    }

    #[test]
    fn select_all_keeps_every_row() {
        let t = table();
        let spec = FilterSpec::select_all(&t);
        assert_eq!(filtered_indices(&t, &spec), vec![0, 1, 2, 3]);
        assert_eq!(spec.delay_types, vec![DelayType::Total]);
    }

    #[test]
    fn empty_dimension_selects_nothing() {
        let t = table();
        let mut spec = FilterSpec::select_all(&t);
        spec.carriers.clear();
        assert!(filtered_indices(&t, &spec).is_empty());
    }

    #[test]
    fn dimensions_intersect() {
        let t = table();
        let mut spec = FilterSpec::select_all(&t);
        spec.years = BTreeSet::from([2015]);
        spec.months = BTreeSet::from([Month::new(2).unwrap()]);
        assert_eq!(filtered_indices(&t, &spec), vec![1]);
    }

    #[test]
    fn total_delay_overrides_other_types() {
        let sel = normalize_delay_types(&[
            DelayType::Cause(DelayCause::Weather),
            DelayType::Total,
            DelayType::Cause(DelayCause::Nas),
        ]);
        assert_eq!(sel.types, vec![DelayType::Total]);
        assert_eq!(sel.warning, Some(CONFLICTING_DELAY_WARNING));
    }

    #[test]
    fn non_conflicting_selection_is_kept_without_warning() {
        let requested = [
            DelayType::Cause(DelayCause::Weather),
            DelayType::Cause(DelayCause::Nas),
            DelayType::Cause(DelayCause::Weather),
        ];
        let sel = normalize_delay_types(&requested);
        assert_eq!(
            sel.types,
            vec![
                DelayType::Cause(DelayCause::Weather),
                DelayType::Cause(DelayCause::Nas)
            ]
        );
        assert!(sel.warning.is_none());
        assert_eq!(normalize_delay_types(&[DelayType::Total]).warning, None);
    }

    #[test]
    fn hours_filter_only_when_enabled() {
        let mut morning = FlightDelayRecord::sample("ATL", "Delta", 2015, 1);
        morning.hour = Some(8);
        let mut evening = FlightDelayRecord::sample("ATL", "Delta", 2015, 1);
        evening.hour = Some(19);
        let t = BaseTable::from_records(vec![morning, evening], true);

        let mut spec = FilterSpec::select_all(&t);
        assert_eq!(filtered_indices(&t, &spec).len(), 2);
        spec.hours = Some(BTreeSet::from([19]));
        assert_eq!(filtered_indices(&t, &spec), vec![1]);
        spec.hours = Some(BTreeSet::new());
        assert!(filtered_indices(&t, &spec).is_empty());
        spec.hours = None;
        assert_eq!(filtered_indices(&t, &spec).len(), 2);
    }

    #[test]
    fn selected_delay_sums_chosen_causes() {
        let rec = FlightDelayRecord::sample("ATL", "Delta", 2015, 1)
            .with_minutes(DelayCause::Carrier, Some(10.0))
            .with_minutes(DelayCause::Weather, Some(5.0))
            .with_minutes(DelayCause::Security, None);
        assert_eq!(selected_delay(&rec, &[DelayType::Total]), 15.0);
        assert_eq!(
            selected_delay(&rec, &[DelayType::Cause(DelayCause::Weather)]),
            5.0
        );
        assert!(!has_selected_values(
            &rec,
            &[DelayType::Cause(DelayCause::Security)]
        ));
        assert!(has_selected_values(&rec, &[DelayType::Total]));
    }

    /// Like `table()`, but every record carries an hour.
    fn table_with_hours() -> BaseTable {
        let records = table()
            .records
            .into_iter()
            .zip([6, 9, 18, 9])
            .map(|(mut rec, hour)| {
                rec.hour = Some(hour);
                rec
            })
            .collect();
        BaseTable::from_records(records, true)
    }

    proptest! {
        #[test]
        fn shrinking_a_selection_never_adds_rows(
            drop_year in any::<bool>(),
            drop_month in 1u32..=12,
            keep_carriers in proptest::collection::vec(any::<bool>(), 3),
            keep_airports in proptest::collection::vec(any::<bool>(), 3),
            keep_hours in proptest::collection::vec(any::<bool>(), 3),
        ) {
            let t = table_with_hours();
            let full = FilterSpec::select_all(&t);
            let before = filtered_indices(&t, &full);
            prop_assert_eq!(before.len(), t.len());

            let mut narrower = full.clone();
            if drop_year {
                narrower.years.remove(&2016);
            }
            narrower.months.remove(&Month::new(drop_month).unwrap());
            for (carrier, keep) in t.carriers.iter().zip(&keep_carriers) {
                if !keep {
                    narrower.carriers.remove(carrier);
                }
            }
            for (code, keep) in t.airports.keys().zip(&keep_airports) {
                if !keep {
                    narrower.airports.remove(code);
                }
            }
            let hours = t.hours.clone().unwrap_or_default();
            if let Some(selected) = narrower.hours.as_mut() {
                for (hour, keep) in hours.iter().zip(&keep_hours) {
                    if !keep {
                        selected.remove(hour);
                    }
                }
            }
            let after = filtered_indices(&t, &narrower);

            prop_assert!(after.len() <= before.len());
            prop_assert!(after.iter().all(|i| before.contains(i)));
        }
    }
}
