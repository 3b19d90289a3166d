//! Flat CSV output (attributes only, no geometry).

use std::{collections::BTreeSet, path::Path};

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerWriter, prelude::{Column, CsvWriter}};

use crate::common::PendingWrite;
use crate::partition::Attributes;

/// Build a string DataFrame from attribute rows. `leading` columns come first
/// in the given order; the rest follow alphabetically. Missing values are null.
pub(crate) fn attributes_to_dataframe(rows: &[Attributes], leading: &[&str]) -> Result<DataFrame> {
    let rest: BTreeSet<&str> = rows.iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .filter(|name| !leading.contains(name))
        .collect();

    let columns = leading.iter().copied().chain(rest)
        .map(|name| Column::new(
            name.into(),
            rows.iter().map(|row| row.get(name).cloned()).collect::<Vec<Option<String>>>(),
        ))
        .collect();

    DataFrame::new(columns).context("[io::csv::write] Failed to build DataFrame")
}

/// Write attribute rows to a CSV file, atomically.
pub fn write_attributes_csv(path: &Path, rows: &[Attributes], leading: &[&str], force: bool) -> Result<()> {
    let mut df = attributes_to_dataframe(rows, leading)?;

    let mut sink = PendingWrite::open(path, force)?;
    CsvWriter::new(&mut sink)
        .finish(&mut df)
        .with_context(|| format!("[io::csv::write] Failed to write CSV to {}", path.display()))?;
    sink.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Attributes {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn leading_columns_first_then_alphabetical() {
        let rows = vec![
            row(&[("SMALL_AREA", "A"), ("postcodes", "Dublin 18"), ("EDNAME", "Foxrock")]),
            row(&[("SMALL_AREA", "B"), ("local_authority", "Fingal")]),
        ];
        let df = attributes_to_dataframe(&rows, &["SMALL_AREA"]).unwrap();

        let names: Vec<&str> = df.get_column_names().into_iter().map(|name| name.as_str()).collect();
        assert_eq!(names, vec!["SMALL_AREA", "EDNAME", "local_authority", "postcodes"]);
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("postcodes").unwrap().null_count(), 1);
    }

    #[test]
    fn writes_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linked.csv");
        let rows = vec![row(&[("SMALL_AREA", "267075008"), ("postcodes", "Co. Dublin")])];

        write_attributes_csv(&path, &rows, &["SMALL_AREA"], false).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("SMALL_AREA,postcodes"));
        assert_eq!(lines.next(), Some("267075008,Co. Dublin"));

        // Existing outputs are kept unless forced.
        assert!(write_attributes_csv(&path, &rows, &["SMALL_AREA"], false).is_err());
        assert!(write_attributes_csv(&path, &rows, &["SMALL_AREA"], true).is_ok());
    }
}
