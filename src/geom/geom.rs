use geo::{BoundingRect, MultiPolygon};
use rstar::{RTree, AABB};

use crate::geom::{bbox::BoundingBox, Epsg};

/// Geometries is an indexed collection of MultiPolygons sharing one CRS.
/// Unlike a partition, the shapes are allowed to overlap or leave gaps.
#[derive(Debug, Clone)]
pub(crate) struct Geometries {
    shapes: Vec<MultiPolygon<f64>>,
    rtree: RTree<BoundingBox>,
    epsg: Epsg,
}

impl Geometries {
    /// Construct a Geometries object from a slice of MultiPolygons.
    /// Empty shapes have no bounding box and are left out of the R-tree.
    pub(crate) fn new(polygons: &[MultiPolygon<f64>], epsg: Epsg) -> Self {
        Self {
            rtree: RTree::bulk_load(
                polygons.iter().enumerate()
                    .filter_map(|(i, polygon)| polygon.bounding_rect().map(|rect| BoundingBox::new(i, rect)))
                    .collect()
            ),
            shapes: polygons.to_vec(),
            epsg,
        }
    }

    /// Get a reference to the list of MultiPolygons.
    #[inline] pub(crate) fn shapes(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    /// Get the EPSG code of the shapes.
    #[inline] pub(crate) fn epsg(&self) -> Epsg { self.epsg }

    /// Indices of shapes whose bounding box intersects the given envelope.
    #[inline]
    pub(crate) fn query_indices(&self, envelope: &AABB<[f64; 2]>) -> Vec<usize> {
        self.rtree.locate_in_envelope_intersecting(envelope)
            .map(|bb| bb.idx())
            .collect()
    }
}
