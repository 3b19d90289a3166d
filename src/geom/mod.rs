mod bbox;
mod crosswalk;
mod crs;
mod geom;
mod proj;

pub use crs::Epsg;
pub(crate) use geom::Geometries;
pub(crate) use proj::{reproject, Reprojection};
