use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use super::loader::{LoadError, LoadReport, SourceSpec, load_source};
use super::model::BaseTable;

// ---------------------------------------------------------------------------
// Base table cache
// ---------------------------------------------------------------------------

/// Size and modification time of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

impl Fingerprint {
    fn of(path: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        Some(Fingerprint {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

struct CacheEntry {
    source: SourceSpec,
    fingerprints: Vec<Option<Fingerprint>>,
    table: Arc<BaseTable>,
    report: LoadReport,
}

/// Holds the loaded base table for as long as its inputs are unchanged.
///
/// Owned by the caller and passed explicitly; a different [`SourceSpec`] or a
/// changed source file triggers a reload.
#[derive(Default)]
pub struct TableCache {
    entry: Option<CacheEntry>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached table for `source`, loading it on first use or when
    /// any of its files changed since the last load.
    pub fn get_or_load(&mut self, source: &SourceSpec) -> Result<Arc<BaseTable>, LoadError> {
        let fingerprints = fingerprints(source);
        if let Some(entry) = &self.entry {
            if entry.source == *source
                && entry.fingerprints == fingerprints
                && fingerprints.iter().all(Option::is_some)
            {
                log::debug!("Base table cache hit for {source:?}");
                return Ok(Arc::clone(&entry.table));
            }
        }

        log::info!("Loading base table from {source:?}");
        let (table, report) = load_source(source)?;
        let table = Arc::new(table);
        self.entry = Some(CacheEntry {
            source: source.clone(),
            fingerprints,
            table: Arc::clone(&table),
            report,
        });
        Ok(table)
    }

    /// Report of the load that produced the cached table.
    pub fn last_report(&self) -> Option<&LoadReport> {
        self.entry.as_ref().map(|e| &e.report)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

fn fingerprints(source: &SourceSpec) -> Vec<Option<Fingerprint>> {
    source.paths().into_iter().map(Fingerprint::of).collect()
}
