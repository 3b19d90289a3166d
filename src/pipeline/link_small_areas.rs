use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::datasets::{Vintage, DUBLIN_POSTCODES};
use crate::geom::{Epsg, Reprojection};
use crate::io::{write_attributes_csv, write_geojson};
use crate::link::{link_with_overrides, LinkResult, OverrideTable};
use crate::partition::Attributes;
use crate::pipeline::Pipeline;

const SMALL_AREA: &str = "SMALL_AREA";
const EDNAME: &str = "EDNAME";

/// Common prefix of the per-vintage linked outputs.
pub fn linked_small_areas_stem(vintage: Vintage) -> String {
    format!("small_areas_boundaries_{vintage}_linked_to_autoaddress_dublin_postcodes")
}

/// Options for [`Pipeline::link_small_areas`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSmallAreas {
    pub vintage: Vintage,
    /// Override table; defaults to the one shipped for the vintage.
    pub overrides: Option<PathBuf>,
    /// Fail instead of warning when small areas remain unlinked.
    pub strict: bool,
}

impl LinkSmallAreas {
    pub fn new(vintage: Vintage) -> Self {
        Self { vintage, ..Self::default() }
    }

    fn load_overrides(&self, data_dir: &Path) -> Result<OverrideTable> {
        match &self.overrides {
            Some(path) => OverrideTable::load(path),
            None => {
                let path = self.vintage.default_overrides(data_dir);
                if path.exists() {
                    OverrideTable::load(&path)
                } else {
                    eprintln!("[link] warning: no override table at {}; linking by geometry only", path.display());
                    Ok(OverrideTable::new())
                }
            }
        }
    }
}

impl Pipeline {
    /// Link the vintage's Dublin small areas to Dublin postcodes, close the
    /// gaps with the override table and write the linked outputs.
    pub fn link_small_areas(&mut self, options: &LinkSmallAreas) -> Result<LinkResult> {
        let vintage = options.vintage;
        let overrides = options.load_overrides(self.data_dir())?;
        if self.verbose() > 0 {
            eprintln!(
                "[link] {} overrides{}",
                overrides.len(),
                overrides.description().map(|d| format!(" ({d})")).unwrap_or_default()
            );
        }

        let small_areas = self.dublin_small_areas(vintage)?.select(&[SMALL_AREA, EDNAME]);
        let postcodes = self.load(&DUBLIN_POSTCODES, None)?.select(&["postcodes", "local_authority"]);

        let result = link_with_overrides(&small_areas, &postcodes, &overrides)?;
        self.log_stats(vintage, &result, small_areas.len());

        if options.strict && !result.unresolved().is_empty() {
            self.write_unresolved_report(vintage, &result)?;
            result.ensure_complete()
                .with_context(|| format!("[link] {vintage} small areas are not fully linked"))?;
        }

        let stem = linked_small_areas_stem(vintage);

        let geojson = self.output_path(&format!("{stem}.geojson"));
        write_geojson(&geojson, &result.to_features(), result.epsg(), self.overwrite())
            .with_context(|| format!("[link] failed to write {}", geojson.display()))?;

        let csv = self.output_path(&format!("{stem}.csv"));
        write_attributes_csv(&csv, &result.to_rows(), &[SMALL_AREA], self.overwrite())
            .with_context(|| format!("[link] failed to write {}", csv.display()))?;

        // Only touched once the outputs it describes are in place.
        self.write_unresolved_report(vintage, &result)?;

        println!(
            "Linked {} of {} {vintage} small areas ({} by override) -> {}",
            result.links().len(), small_areas.len(), result.overridden(), geojson.display()
        );
        Ok(result)
    }

    fn log_stats(&self, vintage: Vintage, result: &LinkResult, total: usize) {
        let stats = result.stats();
        if self.verbose() > 0 {
            eprintln!(
                "[link] {vintage}: {} of {total} linked by geometry ({} ambiguous), {} unlinked",
                stats.linked, stats.ambiguous, stats.unlinked
            );
        }
        for id in result.stale_overrides() {
            eprintln!("[link] warning: override for {id} matches no unlinked small area; ignored");
        }
    }

    /// Write `small_areas_boundaries_<vintage>_unresolved.csv`, or remove an old one
    /// when every small area is linked.
    fn write_unresolved_report(&self, vintage: Vintage, result: &LinkResult) -> Result<()> {
        let unresolved = result.unresolved();
        let path = self.output_path(&format!("small_areas_boundaries_{vintage}_unresolved.csv"));
        if unresolved.is_empty() {
            // A report left over from an earlier run no longer applies.
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("[link] failed to remove stale report {}", path.display()))?;
            }
            return Ok(());
        }

        write_attributes_csv(&path, &unresolved_rows(result)?, &[SMALL_AREA, EDNAME, "x", "y", "lon", "lat"], true)
            .with_context(|| format!("[link] failed to write {}", path.display()))?;

        eprintln!(
            "[link] warning: {} small areas left unlinked after overrides; see {}",
            unresolved.len(), path.display()
        );
        Ok(())
    }
}

/// One row per unresolved small area with its interior point in the working CRS and in WGS84.
fn unresolved_rows(result: &LinkResult) -> Result<Vec<Attributes>> {
    let to_wgs84 = Reprojection::new(result.epsg(), Epsg::WGS84)?;

    result.unresolved().records().iter()
        .map(|unlinked| {
            let mut row = Attributes::new();
            row.insert(SMALL_AREA.to_string(), unlinked.id().to_string());
            if let Some(edname) = unlinked.record().attribute(EDNAME) {
                row.insert(EDNAME.to_string(), edname.to_string());
            }
            if let Some(point) = unlinked.point() {
                let lonlat = to_wgs84.point(point)?;
                row.insert("x".to_string(), format!("{:.1}", point.x()));
                row.insert("y".to_string(), format!("{:.1}", point.y()));
                row.insert("lon".to_string(), format!("{:.6}", lonlat.x()));
                row.insert("lat".to_string(), format!("{:.6}", lonlat.y()));
            }
            Ok(row)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linked_output_names() {
        assert_eq!(
            linked_small_areas_stem(Vintage::Census2016),
            "small_areas_boundaries_2016_linked_to_autoaddress_dublin_postcodes"
        );
    }

    #[test]
    fn explicit_override_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let options = LinkSmallAreas {
            overrides: Some(dir.path().join("missing.json")),
            ..LinkSmallAreas::new(Vintage::Census2011)
        };
        assert!(options.load_overrides(dir.path()).is_err());
    }

    #[test]
    fn missing_default_table_means_no_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let table = LinkSmallAreas::new(Vintage::Census2016).load_overrides(dir.path()).unwrap();
        assert!(table.is_empty());
    }
}
