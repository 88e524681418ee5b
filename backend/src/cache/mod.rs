//! Analysis cache - reuse prepared tables for unchanged inputs
//!
//! Entries are keyed by input fingerprint (`name:mtime:size`, see
//! [`crate::parser::fingerprint_dir`]), so a modified file never hits a stale
//! entry. Only the prepared table is cached; income-group filtering and
//! aggregation run per request.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::transform::pipeline::{CsvInfo, PreparedTable};

/// Default number of fingerprints kept.
const DEFAULT_CAPACITY: usize = 8;

/// A prepared table with metadata
#[derive(Debug, Clone)]
pub struct CachedAnalysis {
    pub fingerprint: String,
    pub csv_info: CsvInfo,
    pub prepared: PreparedTable,
    /// When the pipeline ran
    pub computed_at: DateTime<Utc>,
}

/// In-memory cache shared between request handlers
pub struct AnalysisCache {
    capacity: usize,
    entries: Mutex<HashMap<String, Arc<CachedAnalysis>>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get an entry by fingerprint
    pub fn get(&self, fingerprint: &str) -> Option<Arc<CachedAnalysis>> {
        self.lock().get(fingerprint).cloned()
    }

    /// Store a prepared table, evicting the oldest entry when full
    pub fn insert(
        &self,
        fingerprint: impl Into<String>,
        csv_info: CsvInfo,
        prepared: PreparedTable,
    ) -> Arc<CachedAnalysis> {
        let fingerprint = fingerprint.into();
        let entry = Arc::new(CachedAnalysis {
            fingerprint: fingerprint.clone(),
            csv_info,
            prepared,
            computed_at: Utc::now(),
        });

        let mut entries = self.lock();
        if !entries.contains_key(&fingerprint) && entries.len() >= self.capacity {
            let oldest = entries
                .values()
                .min_by_key(|e| e.computed_at)
                .map(|e| e.fingerprint.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(fingerprint, Arc::clone(&entry));
        entry
    }

    /// Cached entry for `fingerprint`, or the result of `prepare` stored under it
    pub fn get_or_try_insert_with<E, F>(
        &self,
        fingerprint: &str,
        prepare: F,
    ) -> Result<Arc<CachedAnalysis>, E>
    where
        F: FnOnce() -> Result<(CsvInfo, PreparedTable), E>,
    {
        if let Some(hit) = self.get(fingerprint) {
            return Ok(hit);
        }
        let (csv_info, prepared) = prepare()?;
        Ok(self.insert(fingerprint, csv_info, prepared))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<CachedAnalysis>>> {
        // A poisoned map is still a valid map
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cell, Column, Table};
    use crate::transform::pipeline::{prepare, PipelineOptions};

    fn entry() -> (CsvInfo, PreparedTable) {
        let raw = Table::new(vec![
            Column::text("city", vec![Cell::text("A")]),
            Column::numeric("rent", vec![Some(1000.0)]),
            Column::numeric("income", vec![Some(40000.0)]),
        ])
        .unwrap();
        let info = CsvInfo {
            encoding: "utf-8".into(),
            delimiter: ',',
            headers: vec!["city".into(), "rent".into(), "income".into()],
            row_count: 1,
            fingerprint: None,
        };
        (info, prepare(&raw, &PipelineOptions::default()).unwrap())
    }

    #[test]
    fn test_hit_skips_prepare() {
        let cache = AnalysisCache::new();
        let mut calls = 0;

        for _ in 0..2 {
            let hit: Result<_, ()> = cache.get_or_try_insert_with("rents.csv:1:10", || {
                calls += 1;
                Ok(entry())
            });
            assert_eq!(hit.unwrap().fingerprint, "rents.csv:1:10");
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_changed_fingerprint_misses() {
        let cache = AnalysisCache::new();
        let (info, prepared) = entry();
        cache.insert("rents.csv:1:10", info, prepared);

        assert!(cache.get("rents.csv:1:10").is_some());
        assert!(cache.get("rents.csv:2:10").is_none());
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = AnalysisCache::new();
        let result =
            cache.get_or_try_insert_with("x", || Err::<(CsvInfo, PreparedTable), _>("boom"));
        assert_eq!(result.unwrap_err(), "boom");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts() {
        let cache = AnalysisCache::with_capacity(2);
        for key in ["a", "b", "c"] {
            let (info, prepared) = entry();
            cache.insert(key, info, prepared);
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_entries_are_timestamped_in_insert_order() {
        let cache = AnalysisCache::new();
        let (info, prepared) = entry();
        let first = cache.insert("a", info, prepared);
        let (info, prepared) = entry();
        let second = cache.insert("b", info, prepared);

        assert!(first.computed_at <= second.computed_at);
        assert!(first.computed_at <= Utc::now());
    }
}
