//! Format-specific reading and writing.
//!
//! - `geojson` - GeoJSON FeatureCollections (read + write)
//! - `shp` - Shapefiles, as shipped inside the upstream zip archives (read)
//! - `csv` - flat attribute tables (write)

mod csv;
mod geojson;
mod shp;

use geo::MultiPolygon;

use crate::partition::Attributes;

pub use csv::write_attributes_csv;
pub use geojson::{read_geojson, read_geojson_bytes, write_geojson, write_geojson_bytes};
pub use shp::{find_shapefile, read_shapefile};

/// A polygon feature as read from, or written to, a geometry file.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: Option<String>,
    pub properties: Attributes,
    pub geometry: MultiPolygon<f64>,
}
