use anyhow::{ensure, Result};
use geo::{InteriorPoint, Intersects, Point};
use rstar::AABB;

use crate::geom::Geometries;

/// Where the interior point of one shape landed among the shapes of another collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Crosswalk {
    /// Interior point of the source shape; `None` for empty/degenerate shapes.
    pub(crate) point: Option<Point<f64>>,
    /// First containing shape in input order.
    pub(crate) parent: Option<usize>,
    /// Number of shapes containing the point.
    pub(crate) matches: usize,
}

impl Geometries {
    /// Indices (ascending) of all shapes whose area contains `pt`, boundary included.
    pub(crate) fn containing(&self, pt: &Point<f64>) -> Vec<usize> {
        // Query the R-tree with a degenerate AABB at `pt`
        let env = AABB::from_corners([pt.x(), pt.y()], [pt.x(), pt.y()]);

        let mut hits: Vec<usize> = self.query_indices(&env).into_iter()
            .filter(|&j| self.shapes()[j].intersects(pt))
            .collect();
        hits.sort_unstable();
        hits
    }

    /// For each geometry in `self`, pick its interior point and find the
    /// geometries in `other` that contain it. Ties resolve to the lowest index.
    pub(crate) fn compute_crosswalks(&self, other: &Geometries) -> Result<Vec<Crosswalk>> {
        ensure!(
            self.epsg() == other.epsg(),
            "cannot compare geometries in different coordinate systems ({} vs {})",
            self.epsg(), other.epsg()
        );

        Ok(self.shapes().iter()
            .map(|shape| {
                // Guaranteed interior point for areal geometries; None for degenerate/empty.
                let Some(point) = shape.interior_point() else {
                    return Crosswalk { point: None, parent: None, matches: 0 };
                };
                let hits = other.containing(&point);
                Crosswalk { point: Some(point), parent: hits.first().copied(), matches: hits.len() }
            })
            .collect())
    }
}
