//! ---
//! pwl_section: "01-core-functionality"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Canonical in-memory model of the simulated plant."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Precomputed substation measurement snapshots, loaded once at startup from
//! a fixed-schema CSV and indexed by {normal|attack} x load level. Used
//! instead of a live physics simulation.

use std::fs;
use std::path::Path;

use csv::ReaderBuilder;
use rand::Rng;

use crate::{Result, StateError};

/// Register values per snapshot row (`ff00`..`ff09`).
pub const REGISTER_COUNT: usize = 10;

const LOAD_LEVELS: usize = 4;

/// Which measurement population a lookup draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioTag {
    /// Plant operating normally.
    Normal,
    /// Stealthy attack active; rows carry the falsified measurements.
    Attack,
}

impl ScenarioTag {
    fn index(&self) -> usize {
        match self {
            ScenarioTag::Normal => 0,
            ScenarioTag::Attack => 1,
        }
    }

    /// Label used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            ScenarioTag::Normal => "normal",
            ScenarioTag::Attack => "attack",
        }
    }
}

/// 2 x 4 x N lookup of canned register rows.
#[derive(Debug, Clone, Default)]
pub struct ScenarioTable {
    buckets: [[Vec<[String; REGISTER_COUNT]>; LOAD_LEVELS]; 2],
}

impl ScenarioTable {
    /// Load the table from its CSV resource. Schema: a header row, then
    /// `tag,load,v0..v9` where tag is 0 (normal) or 1 (attack) and load is
    /// the 0..=3 load level. Every value must parse as a real number.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
        let mut table = Self::default();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() != REGISTER_COUNT + 2 {
                return Err(StateError::Schema(format!(
                    "row {}: expected {} columns, got {}",
                    line + 2,
                    REGISTER_COUNT + 2,
                    record.len()
                )));
            }
            let tag = match &record[0] {
                "0" => ScenarioTag::Normal,
                "1" => ScenarioTag::Attack,
                other => {
                    return Err(StateError::Schema(format!(
                        "row {}: tag must be 0 or 1, got '{}'",
                        line + 2,
                        other
                    )))
                }
            };
            let load: usize = record[1].parse().map_err(|_| {
                StateError::Schema(format!("row {}: bad load level '{}'", line + 2, &record[1]))
            })?;
            if load >= LOAD_LEVELS {
                return Err(StateError::Schema(format!(
                    "row {}: load level {} out of range",
                    line + 2,
                    load
                )));
            }
            let mut values: [String; REGISTER_COUNT] = Default::default();
            for (idx, value) in record.iter().skip(2).enumerate() {
                if value.parse::<f32>().is_err() {
                    return Err(StateError::Schema(format!(
                        "row {}: register value '{}' is not numeric",
                        line + 2,
                        value
                    )));
                }
                values[idx] = value.to_owned();
            }
            table.buckets[tag.index()][load].push(values);
        }
        Ok(table)
    }

    /// Pick one full row for the given bucket. Always resolves to all
    /// [`REGISTER_COUNT`] values; an empty bucket is an error, never a
    /// partial row.
    pub fn pick_row(&self, tag: ScenarioTag, load: usize) -> Result<&[String; REGISTER_COUNT]> {
        let load = load.min(LOAD_LEVELS - 1);
        let bucket = &self.buckets[tag.index()][load];
        if bucket.is_empty() {
            return Err(StateError::EmptyBucket {
                tag: tag.label(),
                load,
            });
        }
        let idx = rand::thread_rng().gen_range(0..bucket.len());
        Ok(&bucket[idx])
    }

    /// Number of rows loaded for a bucket.
    pub fn rows(&self, tag: ScenarioTag, load: usize) -> usize {
        self.buckets[tag.index()][load.min(LOAD_LEVELS - 1)].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn table_csv(rows: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("tempfile");
        writeln!(file, "tag,load,v0,v1,v2,v3,v4,v5,v6,v7,v8,v9").unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        file.flush().unwrap();
        file
    }

    // One row per (tag, load) bucket.
    fn full_table() -> NamedTempFile {
        let mut rows = Vec::new();
        for tag in 0..2 {
            for load in 0..4 {
                rows.push(format!(
                    "{},{},1.1,2.2,3.3,4.4,5.5,6.6,7.7,8.8,9.9,0.1",
                    tag, load
                ));
            }
        }
        let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        table_csv(&refs)
    }

    #[test]
    fn lookup_is_total_over_all_buckets() {
        let file = full_table();
        let table = ScenarioTable::from_path(file.path()).unwrap();
        for tag in [ScenarioTag::Normal, ScenarioTag::Attack] {
            for load in 0..4 {
                let row = table.pick_row(tag, load).unwrap();
                assert_eq!(row.len(), REGISTER_COUNT);
                assert!(row.iter().all(|v| !v.is_empty()));
            }
        }
    }

    #[test]
    fn empty_bucket_fails_rather_than_partial() {
        let file = table_csv(&["0,0,1,2,3,4,5,6,7,8,9,10"]);
        let table = ScenarioTable::from_path(file.path()).unwrap();
        assert!(table.pick_row(ScenarioTag::Normal, 0).is_ok());
        let err = table.pick_row(ScenarioTag::Attack, 0).unwrap_err();
        assert!(matches!(err, StateError::EmptyBucket { tag: "attack", .. }));
    }

    #[test]
    fn rejects_short_rows_and_bad_tags() {
        let short = table_csv(&["0,0,1,2,3"]);
        assert!(ScenarioTable::from_path(short.path()).is_err());
        let bad_tag = table_csv(&["7,0,1,2,3,4,5,6,7,8,9,10"]);
        assert!(ScenarioTable::from_path(bad_tag.path()).is_err());
        let not_numeric = table_csv(&["0,0,a,2,3,4,5,6,7,8,9,10"]);
        assert!(ScenarioTable::from_path(not_numeric.path()).is_err());
    }
}
