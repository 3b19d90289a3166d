use anyhow::{anyhow, Context, Result};
use geo::{Coord, MapCoords, MultiPolygon, Point};
use proj4rs::{proj::Proj as Proj4, transform::transform};

use crate::geom::Epsg;

/// A reusable transform between two supported EPSG codes.
pub(crate) struct Reprojection {
    from: Proj4,
    to: Proj4,
    from_geographic: bool,
    to_geographic: bool,
}

impl Reprojection {
    pub(crate) fn new(from: Epsg, to: Epsg) -> Result<Self> {
        let build = |epsg: Epsg| -> Result<Proj4> {
            let proj_string = epsg.proj4()?;
            Proj4::from_proj_string(proj_string)
                .map_err(|e| anyhow!("{e:?}"))
                .with_context(|| format!("failed to build PROJ.4 for {epsg}: {proj_string}"))
        };

        Ok(Self {
            from: build(from)?,
            to: build(to)?,
            from_geographic: from.is_geographic(),
            to_geographic: to.is_geographic(),
        })
    }

    /// Transform one coordinate. Degrees in/out for geographic systems, meters otherwise.
    pub(crate) fn coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let mut point = if self.from_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        transform(&self.from, &self.to, &mut point)
            .map_err(|e| anyhow!("CRS transform failed at ({}, {}): {e:?}", coord.x, coord.y))?;

        Ok(if self.to_geographic {
            Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
        } else {
            Coord { x: point.0, y: point.1 }
        })
    }

    pub(crate) fn point(&self, point: Point<f64>) -> Result<Point<f64>> {
        self.coord(point.0).map(Point)
    }

    pub(crate) fn multipolygon(&self, shape: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        shape.try_map_coords(|coord| self.coord(coord))
    }
}

/// Reproject shapes between two coordinate systems. A no-op when they match.
pub(crate) fn reproject(shapes: &[MultiPolygon<f64>], from: Epsg, to: Epsg) -> Result<Vec<MultiPolygon<f64>>> {
    if from == to {
        return Ok(shapes.to_vec());
    }
    let projection = Reprojection::new(from, to)?;
    shapes.iter()
        .map(|shape| projection.multipolygon(shape))
        .collect()
}
