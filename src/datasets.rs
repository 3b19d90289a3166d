//! Upstream boundary datasets and census vintages.

use std::{fmt, path::{Path, PathBuf}, str::FromStr};

use anyhow::{anyhow, bail, Context, Result};

use crate::geom::Epsg;
use crate::io::{find_shapefile, read_geojson, read_shapefile};
use crate::partition::Partition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// A single GeoJSON file.
    GeoJson,
    /// A zip archive holding one shapefile; extracted into a directory.
    ZippedShapefile,
}

/// A remote boundary file and where it is cached under the data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source {
    pub key: &'static str,
    pub url: &'static str,
    /// File (GeoJSON) or extraction directory (shapefile), relative to the data directory.
    pub path: &'static str,
    pub format: SourceFormat,
}

pub const DUBLIN_BOUNDARY: Source = Source {
    key: "dublin-boundary",
    url: "https://zenodo.org/record/4577018/files/dublin_boundary.geojson",
    path: "dublin_boundary.geojson",
    format: SourceFormat::GeoJson,
};

pub const DUBLIN_ADMIN_COUNTIES: Source = Source {
    key: "dublin-admin-counties",
    url: "https://zenodo.org/record/4576987/files/dublin_admin_county_boundaries.geojson",
    path: "dublin_admin_county_boundaries.geojson",
    format: SourceFormat::GeoJson,
};

pub const IRELAND_POSTCODES: Source = Source {
    key: "ireland-postcodes",
    url: "https://www.autoaddress.ie/docs/default-source/default-document-library/routingkeys_shape_itm_2016_09_29.zip",
    path: "ireland_postcode_boundaries_autoaddress",
    format: SourceFormat::ZippedShapefile,
};

/// Published copy of the `postcodes` output; a locally built file at the same path takes precedence.
pub const DUBLIN_POSTCODES: Source = Source {
    key: "dublin-postcodes",
    url: "https://zenodo.org/record/4564347/files/dublin_postcode_boundaries_autoaddress.geojson",
    path: "dublin_postcode_boundaries_autoaddress.geojson",
    format: SourceFormat::GeoJson,
};

pub const SMALL_AREAS_2011: Source = Source {
    key: "small-areas-2011",
    url: "http://census.cso.ie/censusasp/saps/boundaries/Census2011_Small_Areas_generalised20m.zip",
    path: "Census2011_Small_Areas_generalised20m",
    format: SourceFormat::ZippedShapefile,
};

pub const SMALL_AREAS_2016: Source = Source {
    key: "small-areas-2016",
    url: "https://opendata.arcgis.com/datasets/c85e610da1464178a2cd84a88020c8e2_3.zip",
    path: "Small_Areas_Ungeneralised_-_OSi_National_Statistical_Boundaries_-_2015-shp",
    format: SourceFormat::ZippedShapefile,
};

/// Every upstream input, in fetch order.
pub const ALL_SOURCES: [Source; 6] = [
    DUBLIN_BOUNDARY,
    DUBLIN_ADMIN_COUNTIES,
    IRELAND_POSTCODES,
    DUBLIN_POSTCODES,
    SMALL_AREAS_2011,
    SMALL_AREAS_2016,
];

impl Source {
    /// Cached location of this source.
    pub fn local_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(self.path)
    }

    /// The file whose digest pins this source: the GeoJSON itself, or the kept zip archive.
    pub fn pinned_file(&self) -> String {
        match self.format {
            SourceFormat::GeoJson => self.path.to_string(),
            SourceFormat::ZippedShapefile => format!("{}.zip", self.path),
        }
    }

    /// Read the cached copy into a partition.
    pub fn read(&self, data_dir: &Path, id_field: Option<&str>) -> Result<Partition> {
        let path = self.local_path(data_dir);
        let (features, epsg) = match self.format {
            SourceFormat::GeoJson => read_geojson(&path)?,
            SourceFormat::ZippedShapefile => {
                let shp = find_shapefile(&path)?;
                let (features, epsg) = read_shapefile(&shp)?;
                let epsg = epsg.ok_or_else(|| anyhow!(
                    "could not determine the coordinate system of {} (missing or unrecognised .prj)",
                    shp.display()
                ))?;
                (features, epsg)
            }
        };

        Partition::from_features(features, id_field, epsg)
            .with_context(|| format!("[{}] failed to load {}", self.key, path.display()))
    }
}

/// Census small-area boundary releases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Vintage {
    Census2011,
    #[default]
    Census2016,
}

impl Vintage {
    pub fn year(self) -> u16 {
        match self {
            Self::Census2011 => 2011,
            Self::Census2016 => 2016,
        }
    }

    pub fn small_areas(self) -> Source {
        match self {
            Self::Census2011 => SMALL_AREAS_2011,
            Self::Census2016 => SMALL_AREAS_2016,
        }
    }

    /// Override table shipped for this vintage.
    pub fn default_overrides(self, data_dir: &Path) -> PathBuf {
        data_dir.join("overrides").join(format!("small_areas_{}.json", self.year()))
    }
}

impl fmt::Display for Vintage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.year())
    }
}

impl FromStr for Vintage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "2011" => Ok(Self::Census2011),
            "2016" => Ok(Self::Census2016),
            other => bail!("unknown census vintage {other:?} (expected 2011 or 2016)"),
        }
    }
}

/// Coordinate system every join runs in (Irish Transverse Mercator).
pub const WORKING_CRS: Epsg = Epsg::ITM;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vintages_parse_and_display() {
        assert_eq!("2011".parse::<Vintage>().unwrap(), Vintage::Census2011);
        assert_eq!(" 2016 ".parse::<Vintage>().unwrap(), Vintage::Census2016);
        assert!("2022".parse::<Vintage>().is_err());
        assert_eq!(Vintage::Census2011.to_string(), "2011");
    }

    #[test]
    fn zipped_sources_are_pinned_by_archive() {
        assert_eq!(SMALL_AREAS_2011.pinned_file(), "Census2011_Small_Areas_generalised20m.zip");
        assert_eq!(DUBLIN_BOUNDARY.pinned_file(), "dublin_boundary.geojson");
    }

    #[test]
    fn source_keys_are_unique() {
        let mut keys: Vec<_> = ALL_SOURCES.iter().map(|source| source.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), ALL_SOURCES.len());
    }

    #[test]
    fn default_override_paths() {
        assert_eq!(
            Vintage::Census2016.default_overrides(Path::new("data")),
            Path::new("data/overrides/small_areas_2016.json")
        );
    }
}
