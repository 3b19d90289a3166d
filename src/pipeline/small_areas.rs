use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::datasets::{Vintage, DUBLIN_BOUNDARY};
use crate::geom::Epsg;
use crate::io::write_geojson;
use crate::link::link_with_stats;
use crate::partition::Partition;
use crate::pipeline::Pipeline;

const SMALL_AREA: &str = "SMALL_AREA";

/// Common prefix of the per-vintage small-area outputs.
pub fn dublin_small_areas_stem(vintage: Vintage) -> String {
    format!("dublin_small_area_boundaries_{vintage}")
}

/// Files written by [`Pipeline::write_dublin_small_areas`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmallAreaOutputs {
    pub complete: PathBuf,
    pub tableau: PathBuf,
    pub count: usize,
}

impl Pipeline {
    /// Small areas of a census vintage whose interior point lies inside the Dublin boundary.
    /// Attributes of the boundary are merged in; geometry stays in the working CRS.
    pub fn dublin_small_areas(&mut self, vintage: Vintage) -> Result<Partition> {
        let boundary = self.load(&DUBLIN_BOUNDARY, None)?;
        let small_areas = self.load(&vintage.small_areas(), Some(SMALL_AREA))?;

        let (inside, outside, stats) = link_with_stats(&small_areas, &boundary)?;
        if self.verbose() > 0 {
            eprintln!(
                "[small-areas] {vintage}: {} of {} small areas inside Dublin ({} outside, {} degenerate)",
                stats.linked, small_areas.len(), outside.len(), stats.degenerate
            );
        }
        if inside.is_empty() {
            anyhow::bail!("[small-areas] no {vintage} small areas fall inside the Dublin boundary");
        }

        inside.to_partition(Some(SMALL_AREA))
    }

    /// Write the complete Dublin small-area file and its slim WGS84 companion
    /// (`SMALL_AREA` and `area_km2` only).
    pub fn write_dublin_small_areas(&mut self, vintage: Vintage) -> Result<SmallAreaOutputs> {
        let dublin = self.dublin_small_areas(vintage)?;
        let stem = dublin_small_areas_stem(vintage);

        let complete = self.output_path(&format!("{stem}_complete.geojson"));
        write_geojson(&complete, &dublin.to_features(), dublin.epsg(), self.overwrite())
            .with_context(|| format!("[small-areas] failed to write {}", complete.display()))?;

        let tableau_partition = dublin
            .select(&[SMALL_AREA])
            .with_area_column("area_km2", 1e-6)?
            .to_crs(Epsg::WGS84)?;
        let tableau = self.output_path(&format!("{stem}_tableau.geojson"));
        write_geojson(&tableau, &tableau_partition.to_features(), tableau_partition.epsg(), self.overwrite())
            .with_context(|| format!("[small-areas] failed to write {}", tableau.display()))?;

        println!("Wrote {} Dublin {vintage} small areas -> {}", dublin.len(), complete.display());
        if self.verbose() > 0 {
            eprintln!("[small-areas] tableau copy -> {}", tableau.display());
        }

        Ok(SmallAreaOutputs { complete, tableau, count: dublin.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_carry_the_vintage() {
        assert_eq!(dublin_small_areas_stem(Vintage::Census2011), "dublin_small_area_boundaries_2011");
        assert_eq!(dublin_small_areas_stem(Vintage::Census2016), "dublin_small_area_boundaries_2016");
    }
}
