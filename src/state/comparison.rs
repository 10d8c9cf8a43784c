/// Comparison dataset shown in the NDVI/UHII bar charts
///
/// The table is built from a base set of rows (the seed reference cities,
/// or whatever was last saved for comparison) plus the most recent search,
/// which always sits in front.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::data::ComparisonRow;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to serialize comparison table: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Serialized form of an exported snapshot
#[derive(Debug, Serialize, Deserialize)]
struct ExportedTable {
    rows: Vec<ComparisonRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonTable {
    /// Rows every new search is compared against
    saved: Vec<ComparisonRow>,
    /// Rows currently drawn: `saved` with the latest search prepended
    working: Vec<ComparisonRow>,
}

impl ComparisonTable {
    /// Create a table from the reference rows
    pub fn seeded(seed: Vec<ComparisonRow>) -> Self {
        Self { working: seed.clone(), saved: seed }
    }

    /// Record a search result in front of the saved rows and return the new table
    ///
    /// Earlier unsaved results are replaced, not accumulated. Use
    /// [`snapshot_save`](Self::snapshot_save) to keep a result around for
    /// later comparisons.
    pub fn record(&mut self, city: impl Into<String>, ndvi: f64, uhii: f64) -> &[ComparisonRow] {
        let mut rows = Vec::with_capacity(self.saved.len() + 1);
        rows.push(ComparisonRow::new(city, ndvi, uhii));
        rows.extend(self.saved.iter().cloned());
        self.working = rows;
        &self.working
    }

    /// Copy the working table into the saved slot.
    ///
    /// The working table is left as is.
    pub fn snapshot_save(&mut self) {
        self.saved = self.working.clone();
    }

    pub fn rows(&self) -> &[ComparisonRow] {
        &self.working
    }

    pub fn saved(&self) -> &[ComparisonRow] {
        &self.saved
    }

    pub fn len(&self) -> usize {
        self.working.len()
    }

    /// Write the saved rows as pretty JSON
    pub fn export_saved(&self, path: &Path) -> Result<(), ExportError> {
        let json = serde_json::to_string_pretty(&ExportedTable { rows: self.saved.clone() })?;
        fs::write(path, json).map_err(|source| ExportError::Io {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("💾 Exported {} comparison rows to {}", self.saved.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> Vec<ComparisonRow> {
        vec![
            ComparisonRow::new("New York", 0.2358, 633.98),
            ComparisonRow::new("Singapore", 0.1064, 1535.28),
            ComparisonRow::new("Geneva", 0.4070, 1662.04),
        ]
    }

    #[test]
    fn test_record_prepends_and_keeps_order() {
        let mut table = ComparisonTable::seeded(seed());
        let rows = table.record("Taipei202410", 0.3, 900.0);

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], ComparisonRow::new("Taipei202410", 0.3, 900.0));
        let rest: Vec<_> = rows[1..].iter().map(|r| r.city.as_str()).collect();
        assert_eq!(rest, ["New York", "Singapore", "Geneva"]);
    }

    #[test]
    fn test_unsaved_result_is_replaced() {
        let mut table = ComparisonTable::seeded(seed());
        table.record("A202401", 0.1, 1.0);
        table.record("B202401", 0.2, 2.0);

        assert_eq!(table.len(), 4);
        assert_eq!(table.rows()[0].city, "B202401");
        assert!(table.rows().iter().all(|r| r.city != "A202401"));
    }

    #[test]
    fn test_saved_result_is_kept_for_next_search() {
        let mut table = ComparisonTable::seeded(seed());
        table.record("A202401", 0.1, 1.0);
        table.snapshot_save();
        table.record("B202401", 0.2, 2.0);

        let cities: Vec<_> = table.rows().iter().map(|r| r.city.as_str()).collect();
        assert_eq!(cities, ["B202401", "A202401", "New York", "Singapore", "Geneva"]);
    }

    #[test]
    fn test_snapshot_is_independent_of_working_table() {
        let mut table = ComparisonTable::seeded(seed());
        table.record("A202401", 0.1, 1.0);
        table.snapshot_save();
        let saved_before = table.saved().to_vec();

        table.record("B202401", 0.2, 2.0);
        assert_eq!(table.saved(), saved_before.as_slice());
        assert_eq!(table.rows().len(), saved_before.len() + 1);

        // snapshot does not reset the working table
        table.snapshot_save();
        assert_eq!(table.rows()[0].city, "B202401");
    }

    #[test]
    fn test_export_saved_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compare.json");
        let table = ComparisonTable::seeded(seed());

        table.export_saved(&path).unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        let parsed: ExportedTable = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.rows, seed());
    }
}
