// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Road risk table and the classification of roads into colored risk tiers.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Risk level assigned to roads absent from the [RiskTable].
pub const DEFAULT_RISK_LEVEL: &str = "0";

#[derive(Debug, thiserror::Error)]
pub enum RiskError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("malformed risk table: {0}")]
    Csv(#[from] csv::Error),
}

/// Display tier of a road, derived from its risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskColor {
    Green,
    Yellow,
    Orange,
    Red,
}

impl RiskColor {
    /// Maps a risk level onto a color.
    ///
    /// Levels are categories, not numbers: only the exact strings
    /// "1", "2" and "3" map onto yellow, orange and red. Everything else is green.
    pub fn from_level(level: &str) -> Self {
        match level {
            "3" => Self::Red,
            "2" => Self::Orange,
            "1" => Self::Yellow,
            _ => Self::Green,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Orange => "orange",
            Self::Red => "red",
        }
    }
}

impl std::fmt::Display for RiskColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk level and color of a single road.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub level: String,
    pub color: RiskColor,
}

/// Single row of the risk table: the predicted risk of a road on a given calendar day,
/// together with the features used for the prediction.
///
/// Source tables are sparse, so every numeric cell may be empty. Such rows are still
/// used for classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRecord {
    pub road_name: String,

    #[serde(alias = "Risk Level", default)]
    pub risk_level: String,

    #[serde(default)]
    pub month: Option<u32>,

    #[serde(default)]
    pub day: Option<u32>,

    #[serde(default)]
    pub most_common_condition: Option<f64>,

    #[serde(default)]
    pub avg_yearly_accidents: Option<f64>,

    #[serde(default)]
    pub average_monthly_occurrences: Option<f64>,
}

/// Name of the risk level column, preserved when a table is written back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum LevelHeader {
    #[default]
    Snake,
    Titled,
}

impl LevelHeader {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Snake => "risk_level",
            Self::Titled => "Risk Level",
        }
    }
}

/// Immutable collection of [RiskRecords](RiskRecord), indexed by road name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskTable {
    rows: Vec<RiskRecord>,

    /// Index of the first row of every road name.
    first_row: HashMap<String, usize>,

    level_header: LevelHeader,
}

impl RiskTable {
    pub fn new(rows: Vec<RiskRecord>) -> Self {
        let mut first_row = HashMap::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            first_row.entry(row.road_name.clone()).or_insert(idx);
        }
        Self {
            rows,
            first_row,
            level_header: LevelHeader::default(),
        }
    }

    /// Creates a table with different rows, but the same CSV layout as `self`.
    pub fn with_rows(&self, rows: Vec<RiskRecord>) -> Self {
        Self {
            level_header: self.level_header,
            ..Self::new(rows)
        }
    }

    /// Loads a risk table from a CSV file with a header row.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, RiskError> {
        let f = File::open(path)?;
        Self::from_reader(f)
    }

    /// Loads a risk table from any CSV source with a header row.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, RiskError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let level_header = if csv_reader
            .headers()?
            .iter()
            .any(|h| h == LevelHeader::Titled.as_str())
        {
            LevelHeader::Titled
        } else {
            LevelHeader::Snake
        };

        let rows = csv_reader
            .deserialize::<RiskRecord>()
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("Loaded {} risk table rows", rows.len());
        Ok(Self {
            level_header,
            ..Self::new(rows)
        })
    }

    /// Writes the table as CSV with a header row.
    /// The risk level column keeps the name it was loaded with.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), RiskError> {
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        csv_writer.write_record([
            "road_name",
            self.level_header.as_str(),
            "month",
            "day",
            "most_common_condition",
            "avg_yearly_accidents",
            "average_monthly_occurrences",
        ])?;
        for row in &self.rows {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Writes the table as CSV into a file at the provided path.
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), RiskError> {
        let f = File::create(path)?;
        self.write_csv(io::BufWriter::new(f))
    }

    pub fn rows(&self) -> &[RiskRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the risk level of the first row for the given road,
    /// or [DEFAULT_RISK_LEVEL] if the road is not in the table.
    pub fn level_of(&self, road_name: &str) -> &str {
        self.first_row
            .get(road_name)
            .map(|&idx| self.rows[idx].risk_level.as_str())
            .unwrap_or(DEFAULT_RISK_LEVEL)
    }

    /// Returns the risk level and color of the given road.
    pub fn classify(&self, road_name: &str) -> Classification {
        let level = self.level_of(road_name);
        Classification {
            level: level.to_string(),
            color: RiskColor::from_level(level),
        }
    }
}

/// Shared, atomically replaceable [RiskTable].
///
/// Readers take a [snapshot](RiskStore::snapshot) which stays valid (and unchanged)
/// for as long as they hold it. Writers are serialized, and publish a whole new table at once,
/// so a reader never observes a partially updated table.
#[derive(Debug, Default)]
pub struct RiskStore {
    current: RwLock<Arc<RiskTable>>,
    writer: Mutex<()>,
}

impl RiskStore {
    pub fn new(table: RiskTable) -> Self {
        Self {
            current: RwLock::new(Arc::new(table)),
            writer: Mutex::default(),
        }
    }

    /// Returns the currently published table.
    pub fn snapshot(&self) -> Arc<RiskTable> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publishes a new table, replacing the current one.
    pub fn replace(&self, table: RiskTable) {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.publish(table);
    }

    /// Builds a new table from the current one and publishes it.
    ///
    /// Other writers are blocked until `f` returns; readers are not.
    /// If `f` fails, the current table stays in place.
    pub fn update<F, E>(&self, f: F) -> Result<(), E>
    where
        F: FnOnce(&RiskTable) -> Result<RiskTable, E>,
    {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        let updated = f(current.as_ref())?;
        self.publish(updated);
        Ok(())
    }

    fn publish(&self, table: RiskTable) {
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE_CSV: &str = "\
road_name,risk_level,month,day,most_common_condition,avg_yearly_accidents,average_monthly_occurrences
Main St,3,10,19,1,12.5,2.0
Oak Ave,2,10,19,0,4.0,1.0
Main St,1,10,20,1,12.5,2.0
Park Lane,1,10,19,2,1.0,0.5
Quiet Way,,10,19,0,0.0,0.0
";

    fn table() -> RiskTable {
        RiskTable::from_reader(TABLE_CSV.as_bytes()).unwrap()
    }

    #[test]
    fn color_mapping() {
        assert_eq!(RiskColor::from_level("3"), RiskColor::Red);
        assert_eq!(RiskColor::from_level("2"), RiskColor::Orange);
        assert_eq!(RiskColor::from_level("1"), RiskColor::Yellow);
        assert_eq!(RiskColor::from_level("0"), RiskColor::Green);
        assert_eq!(RiskColor::from_level(""), RiskColor::Green);
        assert_eq!(RiskColor::from_level("4"), RiskColor::Green);
        assert_eq!(RiskColor::from_level("3.0"), RiskColor::Green);
        assert_eq!(RiskColor::from_level(" 3"), RiskColor::Green);
    }

    #[test]
    fn first_matching_row_wins() {
        let t = table();
        assert_eq!(t.len(), 5);
        assert_eq!(
            t.classify("Main St"),
            Classification {
                level: "3".to_string(),
                color: RiskColor::Red
            }
        );
        assert_eq!(t.classify("Oak Ave").color, RiskColor::Orange);
        assert_eq!(t.classify("Park Lane").color, RiskColor::Yellow);
    }

    #[test]
    fn unknown_road_is_green() {
        let t = table();
        assert_eq!(
            t.classify("Nowhere Road"),
            Classification {
                level: DEFAULT_RISK_LEVEL.to_string(),
                color: RiskColor::Green
            }
        );
    }

    #[test]
    fn empty_level_is_kept_and_green() {
        let t = table();
        assert_eq!(t.level_of("Quiet Way"), "");
        assert_eq!(t.classify("Quiet Way").color, RiskColor::Green);
    }

    #[test]
    fn classification_is_deterministic() {
        let t = table();
        for name in ["Main St", "Oak Ave", "Nowhere Road"] {
            assert_eq!(t.classify(name), t.classify(name));
        }
    }

    #[test]
    fn accepts_risk_level_header_alias() {
        let csv = "road_name,Risk Level,month,day,most_common_condition,avg_yearly_accidents,average_monthly_occurrences\n\
                   Main St,2,1,1,0,1.0,1.0\n";
        let t = RiskTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(t.level_of("Main St"), "2");
    }

    #[test]
    fn sparse_rows_are_loaded() {
        let csv = "road_name,risk_level,month,day,most_common_condition,avg_yearly_accidents,average_monthly_occurrences\n\
                   Main St,3,10,19,1,12.5,2.0\n\
                   Oak Ave,2,10,19,,,\n\
                   Park Lane,1,,,,,\n";
        let t = RiskTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.classify("Main St").color, RiskColor::Red);
        assert_eq!(t.classify("Oak Ave").color, RiskColor::Orange);
        assert_eq!(t.classify("Park Lane").color, RiskColor::Yellow);

        assert_eq!(t.rows()[1].month, Some(10));
        assert_eq!(t.rows()[1].avg_yearly_accidents, None);
        assert_eq!(t.rows()[2].day, None);
    }

    #[test]
    fn keeps_level_header() {
        let csv = "road_name,Risk Level,month,day,most_common_condition,avg_yearly_accidents,average_monthly_occurrences\n\
                   Main St,2,1,1,0,1.0,\n";
        let t = RiskTable::from_reader(csv.as_bytes()).unwrap();

        let mut out = Vec::new();
        t.with_rows(t.rows().to_vec()).write_csv(&mut out).unwrap();
        let written = String::from_utf8(out).unwrap();
        assert!(written.starts_with("road_name,Risk Level,month,"));
        assert!(written.contains("\nMain St,2,1,1,"));
        assert!(written.ends_with(",\n"));
        assert_eq!(RiskTable::from_reader(written.as_bytes()).unwrap(), t);

        let mut out = Vec::new();
        RiskTable::new(t.rows().to_vec()).write_csv(&mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("road_name,risk_level,"));
    }

    #[test]
    fn csv_round_trip() {
        let t = table();
        let mut out = Vec::new();
        t.write_csv(&mut out).unwrap();
        assert_eq!(RiskTable::from_reader(out.as_slice()).unwrap(), t);
    }

    #[test]
    fn malformed_table() {
        let csv = "road_name,risk_level,month\nMain St,1,not-a-month\n";
        assert!(matches!(
            RiskTable::from_reader(csv.as_bytes()),
            Err(RiskError::Csv(_))
        ));
    }

    #[test]
    fn store_publishes_whole_tables() {
        let store = RiskStore::new(table());
        let before = store.snapshot();

        store.replace(RiskTable::default());
        assert!(store.snapshot().is_empty());
        assert_eq!(before.len(), 5);

        let failed: Result<(), &str> = store.update(|_| Err("model exploded"));
        assert!(failed.is_err());
        assert!(store.snapshot().is_empty());
    }
}
