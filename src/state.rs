use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use crate::color::YearColors;
use crate::config::DashboardConfig;
use crate::data::aggregate::{DerivedViews, ViewOptions, compute_views};
use crate::data::cache::TableCache;
use crate::data::export;
use crate::data::filter::FilterSpec;
use crate::data::loader::SourceSpec;
use crate::data::model::{BaseTable, DelayType, Month};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// A filter dimension with a multi-select widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Year,
    Month,
    Carrier,
    Airport,
    Hour,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: DashboardConfig,

    /// Base-table cache, owned here and reused across reloads.
    pub cache: TableCache,

    /// Source of the currently loaded table.
    pub source: Option<SourceSpec>,

    /// Loaded base table (None until a load succeeds).
    pub table: Option<Arc<BaseTable>>,

    /// Current selection.
    pub filters: FilterSpec,

    /// Views for the current selection (recomputed on change).
    pub views: Option<DerivedViews>,

    /// Shown when a conflicting delay-type selection was normalized.
    pub delay_warning: Option<&'static str>,

    /// Colour per year for the trend chart.
    pub year_colors: Option<YearColors>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            cache: TableCache::new(),
            source: None,
            table: None,
            filters: FilterSpec::select_all(&BaseTable::default()),
            views: None,
            delay_warning: None,
            year_colors: None,
            status_message: None,
        }
    }

    /// Load (or fetch from cache) the table for `source` and reset filters.
    /// On failure the previous dashboard is cleared and the error shown.
    pub fn load_source(&mut self, source: SourceSpec) {
        match self.cache.get_or_load(&source) {
            Ok(table) => {
                self.source = Some(source);
                self.set_table(table);
                if let Some(report) = self.cache.last_report() {
                    if report.rows_dropped_by_join > 0 {
                        self.status_message = Some(format!(
                            "{} rows had no matching airport and were skipped",
                            report.rows_dropped_by_join
                        ));
                    }
                }
            }
            Err(e) => {
                log::error!("Failed to load data: {e}");
                self.source = None;
                self.table = None;
                self.views = None;
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    /// Drop the cached table and load the current source again.
    pub fn reload(&mut self) {
        if let Some(source) = self.source.clone() {
            self.cache.invalidate();
            self.load_source(source);
        }
    }

    /// Ingest a newly loaded table, initialise filters and colours.
    pub fn set_table(&mut self, table: Arc<BaseTable>) {
        self.filters = FilterSpec::select_all(&table);
        self.year_colors = Some(YearColors::new(&table.years));
        self.delay_warning = None;
        self.status_message = None;
        self.table = Some(table);
        self.refilter();
    }

    /// Recompute every derived view for the current filters.
    pub fn refilter(&mut self) {
        if let Some(table) = &self.table {
            let options = ViewOptions {
                top_n: self.config.top_n,
            };
            let views = compute_views(table, &self.filters, &options);
            log::debug!("Recomputed views: {} rows selected", views.rows.len());
            self.views = Some(views);
        }
    }

    /// Set the delay types, applying the Total Delay rule.
    pub fn set_delay_types(&mut self, requested: &[DelayType]) {
        self.delay_warning = self.filters.set_delay_types(requested);
        self.refilter();
    }

    /// Toggle one delay type in the current selection.
    pub fn toggle_delay_type(&mut self, dt: DelayType) {
        let mut requested = self.filters.delay_types.clone();
        if let Some(pos) = requested.iter().position(|d| *d == dt) {
            requested.remove(pos);
        } else {
            requested.push(dt);
        }
        self.set_delay_types(&requested);
    }

    pub fn toggle_year(&mut self, year: i32) {
        toggle(&mut self.filters.years, year);
        self.refilter();
    }

    pub fn toggle_month(&mut self, month: Month) {
        toggle(&mut self.filters.months, month);
        self.refilter();
    }

    pub fn toggle_carrier(&mut self, carrier: &str) {
        toggle(&mut self.filters.carriers, carrier.to_string());
        self.refilter();
    }

    pub fn toggle_airport(&mut self, code: &str) {
        toggle(&mut self.filters.airports, code.to_string());
        self.refilter();
    }

    pub fn toggle_hour(&mut self, hour: u32) {
        if let Some(hours) = &mut self.filters.hours {
            toggle(hours, hour);
            self.refilter();
        }
    }

    /// Select all values of a dimension.
    pub fn select_all(&mut self, dim: Dimension) {
        let Some(table) = self.table.clone() else {
            return;
        };
        let all = FilterSpec::select_all(&table);
        match dim {
            Dimension::Year => self.filters.years = all.years,
            Dimension::Month => self.filters.months = all.months,
            Dimension::Carrier => self.filters.carriers = all.carriers,
            Dimension::Airport => self.filters.airports = all.airports,
            Dimension::Hour => self.filters.hours = all.hours,
        }
        self.refilter();
    }

    /// Deselect all values of a dimension.
    pub fn select_none(&mut self, dim: Dimension) {
        match dim {
            Dimension::Year => self.filters.years.clear(),
            Dimension::Month => self.filters.months.clear(),
            Dimension::Carrier => self.filters.carriers.clear(),
            Dimension::Airport => self.filters.airports.clear(),
            Dimension::Hour => {
                if let Some(hours) = &mut self.filters.hours {
                    hours.clear();
                }
            }
        }
        self.refilter();
    }

    /// Write the filtered rows to `path`.
    pub fn export_csv(&mut self, path: &Path) {
        let (Some(table), Some(views)) = (&self.table, &self.views) else {
            return;
        };
        self.status_message = match export::export_filtered_csv(path, table, &views.rows) {
            Ok(n) => Some(format!("Exported {n} rows to {}", path.display())),
            Err(e) => {
                log::error!("Export failed: {e:#}");
                Some(format!("Error: {e:#}"))
            }
        };
    }

    /// Write the KPI / ranking summary to `path`.
    pub fn export_summary(&mut self, path: &Path) {
        let Some(views) = &self.views else {
            return;
        };
        self.status_message = match export::export_summary_json(path, views) {
            Ok(()) => Some(format!("Exported summary to {}", path.display())),
            Err(e) => {
                log::error!("Export failed: {e:#}");
                Some(format!("Error: {e:#}"))
            }
        };
    }
}

fn toggle<T: Ord>(set: &mut BTreeSet<T>, value: T) {
    if !set.remove(&value) {
        set.insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::aggregate::GeoView;
    use crate::data::filter::CONFLICTING_DELAY_WARNING;
    use crate::data::loader::tests::{AIRPORTS_CSV, DELAYS_CSV, temp_csv};
    use crate::data::model::DelayCause;

    fn loaded() -> (AppState, tempfile::NamedTempFile, tempfile::NamedTempFile) {
        let delays = temp_csv(DELAYS_CSV);
        let airports = temp_csv(AIRPORTS_CSV);
        let mut state = AppState::new(DashboardConfig::default());
        state.load_source(SourceSpec::Joined {
            delays: delays.path().to_path_buf(),
            airports: airports.path().to_path_buf(),
        });
        (state, delays, airports)
    }

    #[test]
    fn load_populates_views_with_everything_selected() {
        let (state, _d, _a) = loaded();
        let views = state.views.as_ref().unwrap();
        assert_eq!(views.rows.len(), 3);
        assert!(views.monthly_trend.is_some());
        assert!(state.status_message.as_deref().unwrap().contains("1 rows"));
    }

    #[test]
    fn load_failure_clears_dashboard() {
        let (mut state, _d, _a) = loaded();
        state.load_source(SourceSpec::Merged {
            path: "nope.csv".into(),
        });
        assert!(state.table.is_none());
        assert!(state.views.is_none());
        assert!(state.status_message.unwrap().starts_with("Error"));
    }

    #[test]
    fn deselecting_airports_gives_no_data() {
        let (mut state, _d, _a) = loaded();
        state.select_none(Dimension::Airport);
        let views = state.views.as_ref().unwrap();
        assert!(views.is_empty());
        assert_eq!(views.kpis.total_flights, 0.0);
        assert_eq!(views.geo, GeoView::NoData);

        state.toggle_airport("SFO");
        assert_eq!(state.views.as_ref().unwrap().rows.len(), 1);
        state.select_all(Dimension::Airport);
        assert_eq!(state.views.as_ref().unwrap().rows.len(), 3);
    }

    #[test]
    fn adding_a_cause_to_total_delay_warns() {
        let (mut state, _d, _a) = loaded();
        state.toggle_delay_type(DelayType::Cause(DelayCause::Weather));
        assert_eq!(state.filters.delay_types, vec![DelayType::Total]);
        assert_eq!(state.delay_warning, Some(CONFLICTING_DELAY_WARNING));

        state.toggle_delay_type(DelayType::Total);
        assert!(state.filters.delay_types.is_empty());
        state.toggle_delay_type(DelayType::Cause(DelayCause::Weather));
        assert_eq!(state.delay_warning, None);
        assert_eq!(state.views.as_ref().unwrap().kpis.total_delay_minutes, 10.0);
    }

    #[test]
    fn month_toggle_drops_trend() {
        let (mut state, _d, _a) = loaded();
        state.toggle_month(Month::new(2).unwrap());
        assert!(state.views.as_ref().unwrap().monthly_trend.is_none());
    }

    #[test]
    fn export_writes_file_and_reports() {
        let (mut state, _d, _a) = loaded();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(export::EXPORT_FILE_NAME);
        state.export_csv(&path);
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 4);
        assert!(state.status_message.unwrap().starts_with("Exported 3 rows"));
    }
}
