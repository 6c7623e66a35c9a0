//! Memoized raw loads. Parsing the export is the only cached step in
//! the pipeline; everything downstream recomputes on every invocation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cohortlens_core::{CohortResult, SubscriptionTable};
use dashmap::DashMap;
use tracing::debug;

/// Caches parsed tables keyed by canonical source path and delimiter.
/// The same file parsed under two delimiters yields two entries; a hit
/// is only served for the exact parse that was requested.
pub struct LoadCache {
    tables: DashMap<(PathBuf, u8), Arc<SubscriptionTable>>,
}

impl LoadCache {
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
        }
    }

    /// Load a table, reusing the parsed result for a (path, delimiter)
    /// pair seen before.
    pub fn load(&self, path: &Path, delimiter: u8) -> CohortResult<Arc<SubscriptionTable>> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let key = (canonical, delimiter);
        if let Some(table) = self.tables.get(&key) {
            debug!(path = %key.0.display(), "load cache hit");
            return Ok(table.clone());
        }

        let table = Arc::new(crate::load_table(path, delimiter)?);
        self.tables.insert(key, table.clone());
        Ok(table)
    }

    /// Drop every cached parse of a path, forcing a re-read on next load.
    pub fn invalidate(&self, path: &Path) {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.tables.retain(|(cached, _), _| cached != &canonical);
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl Default for LoadCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_export(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("cohortlens-{}-{}", std::process::id(), name));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            "created_at\tcharges_count\treal_payment\n2024-01-01\t2\t1\n"
        )
        .unwrap();
        path
    }

    #[test]
    fn test_repeated_loads_share_the_table() {
        let path = temp_export("shared.tsv");
        let cache = LoadCache::new();

        let first = cache.load(&path, b'\t').unwrap();
        let second = cache.load(&path, b'\t').unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_delimiter_is_part_of_the_cache_key() {
        let path = temp_export("delimiter.tsv");
        let cache = LoadCache::new();

        let tab = cache.load(&path, b'\t').unwrap();
        // a comma request re-parses instead of reusing the tab table,
        // and fails because the comma parse finds a single column
        assert!(cache.load(&path, b',').is_err());

        let again = cache.load(&path, b'\t').unwrap();
        assert!(Arc::ptr_eq(&tab, &again));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_invalidate_forces_reread() {
        let path = temp_export("invalidate.tsv");
        let cache = LoadCache::new();

        let first = cache.load(&path, b'\t').unwrap();
        cache.invalidate(&path);
        assert!(cache.is_empty());
        let second = cache.load(&path, b'\t').unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        std::fs::remove_file(&path).ok();
    }
}
