#![doc = "Dublin boundary linker: assigns census small areas to Dublin postcodes by representative-point containment, closed by a manual override table."]
mod common;
mod datasets;
mod geom;
mod io;
mod link;
mod partition;
mod pipeline;

#[doc(inline)]
pub use geom::Epsg;

#[doc(inline)]
pub use partition::{Attributes, Partition, PolygonRecord};

#[doc(inline)]
pub use link::{
    link, link_with_overrides, link_with_stats,
    Link, LinkResult, LinkSource, LinkStats, LinkedPartition, OverrideTable, Resolution, Unlinked, UnlinkedSet,
};

#[doc(inline)]
pub use io::{read_geojson, read_geojson_bytes, read_shapefile, write_attributes_csv, write_geojson, write_geojson_bytes, Feature};

#[doc(inline)]
pub use datasets::{Source, SourceFormat, Vintage, ALL_SOURCES, WORKING_CRS};

#[doc(inline)]
pub use pipeline::{
    dublin_small_areas_stem, linked_small_areas_stem, postcode_label,
    LinkSmallAreas, Pipeline, SmallAreaOutputs, DUBLIN_POSTCODES_OUTPUT,
};

#[doc(inline)]
pub use common::{FileHash, InputLock, LockStatus};
