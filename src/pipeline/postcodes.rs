use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::datasets::{DUBLIN_ADMIN_COUNTIES, IRELAND_POSTCODES};
use crate::io::write_geojson;
use crate::link::link_with_stats;
use crate::partition::Partition;
use crate::pipeline::Pipeline;

/// Output file name, shared with the published copy in `datasets::DUBLIN_POSTCODES`.
pub const DUBLIN_POSTCODES_OUTPUT: &str = "dublin_postcode_boundaries_autoaddress.geojson";

static DUBLIN_DISTRICT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^Dublin").expect("valid regex"));

/// Postcode label from a routing-key descriptor: title-cased Dublin districts
/// ("DUBLIN 6W" -> "Dublin 6W"), anything else collapses to "Co. Dublin".
pub fn postcode_label(descriptor: &str) -> String {
    let titled = title_case(descriptor.trim());
    if DUBLIN_DISTRICT.is_match(&titled) { titled } else { "Co. Dublin".to_string() }
}

/// Uppercase letters that start a run of letters, lowercase the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if prev_is_letter { out.extend(c.to_lowercase()) } else { out.extend(c.to_uppercase()) }
        prev_is_letter = c.is_alphabetic();
    }
    out
}

impl Pipeline {
    /// Postcode boundaries whose interior point lies in a Dublin local authority,
    /// tagged with `local_authority` and a derived `postcodes` label.
    pub fn dublin_postcodes(&mut self) -> Result<Partition> {
        let counties = self.load(&DUBLIN_ADMIN_COUNTIES, Some("COUNTYNAME"))?
            .select(&[])
            .rename("COUNTYNAME", "local_authority");
        let postcodes = self.load(&IRELAND_POSTCODES, None)?;

        let (linked, outside, stats) = link_with_stats(&postcodes, &counties)?;
        if self.verbose() > 0 {
            eprintln!(
                "[postcodes] {} of {} routing areas inside Dublin ({} elsewhere, {} ambiguous)",
                stats.linked, postcodes.len(), outside.len(), stats.ambiguous
            );
        }

        let dublin = linked.to_partition(None)?
            .with_column("postcodes", |attributes| attributes.get("Descriptor").map(|d| postcode_label(d)));
        Ok(dublin)
    }

    /// Build and write `dublin_postcode_boundaries_autoaddress.geojson`.
    pub fn write_dublin_postcodes(&mut self) -> Result<Partition> {
        let dublin = self.dublin_postcodes()?;

        let path = self.output_path(DUBLIN_POSTCODES_OUTPUT);
        write_geojson(&path, &dublin.to_features(), dublin.epsg(), self.overwrite())
            .with_context(|| format!("[postcodes] failed to write {}", path.display()))?;

        println!("Wrote {} Dublin postcode boundaries -> {}", dublin.len(), path.display());
        Ok(dublin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dublin_districts_are_title_cased() {
        assert_eq!(postcode_label("DUBLIN 18"), "Dublin 18");
        assert_eq!(postcode_label("DUBLIN 6W"), "Dublin 6W");
        assert_eq!(postcode_label("dublin 1"), "Dublin 1");
        assert_eq!(postcode_label("DUBLINSTOWN"), "Dublinstown");
    }

    #[test]
    fn other_descriptors_become_county_dublin() {
        assert_eq!(postcode_label("SWORDS"), "Co. Dublin");
        assert_eq!(postcode_label("DUN LAOGHAIRE"), "Co. Dublin");
        assert_eq!(postcode_label("CO DUBLIN"), "Co. Dublin");
    }
}
