//! Shapefile reading.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use shapefile::{dbase::{FieldValue, Record}, Reader, Shape};
use walkdir::WalkDir;

use crate::geom::Epsg;
use crate::io::Feature;
use crate::partition::Attributes;

/// Reads all polygons + attribute records from a `.shp` file, along with the
/// EPSG code named by its `.prj` sidecar, if recognisable.
pub fn read_shapefile(path: &Path) -> Result<(Vec<Feature>, Option<Epsg>)> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open shapefile: {}", path.display()))?;

    let mut features = Vec::with_capacity(reader.shape_count()?);
    for (i, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result
            .with_context(|| format!("Error reading shape+record {i} from {}", path.display()))?;
        features.push(Feature {
            id: Some(i.to_string()),
            properties: record_to_attributes(record),
            geometry: shape_to_multipolygon(shape)
                .with_context(|| format!("record {i} in {}", path.display()))?,
        });
    }

    Ok((features, epsg_from_shapefile(path)))
}

/// Find the single `.shp` file inside an extracted archive directory.
pub fn find_shapefile(dir: &Path) -> Result<PathBuf> {
    let mut found = WalkDir::new(dir).sort_by_file_name().into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("shp")));

    let Some(first) = found.next() else {
        bail!("no .shp file found under {}", dir.display());
    };
    if let Some(second) = found.next() {
        bail!("more than one .shp file under {}: {} and {}", dir.display(), first.display(), second.display());
    }
    Ok(first)
}

/// Read the `.prj` next to a `.shp` and map it to a known EPSG code.
pub(crate) fn epsg_from_shapefile(path: &Path) -> Option<Epsg> {
    std::fs::read_to_string(path.with_extension("prj")).ok()
        .and_then(|wkt| Epsg::from_prj_wkt(&wkt))
}

/// Coerce a generic shape into an owned multipolygon, raising error if different shape
fn shape_to_multipolygon(shape: Shape) -> Result<geo::MultiPolygon<f64>> {
    match shape {
        Shape::Polygon(polygon) => Ok(shp_to_geo(&polygon)),
        Shape::NullShape => Ok(geo::MultiPolygon(vec![])),
        other => bail!("found non-Polygon shape in layer: {:?}", other.shapetype())
    }
}

/// dBase fields as trimmed strings; empty and null values are dropped.
fn record_to_attributes(record: Record) -> Attributes {
    record.into_iter()
        .filter_map(|(field, value)| {
            let value = match value {
                FieldValue::Character(Some(s)) => s.trim().to_string(),
                FieldValue::Memo(s) => s.trim().to_string(),
                FieldValue::Numeric(Some(n)) => n.to_string(),
                FieldValue::Float(Some(n)) => n.to_string(),
                FieldValue::Double(n) => n.to_string(),
                FieldValue::Integer(n) => n.to_string(),
                FieldValue::Logical(Some(b)) => b.to_string(),
                _ => return None,
            };
            (!value.is_empty()).then_some((field, value))
        })
        .collect()
}

/// Convert shapefile::Polygon to geo::MultiPolygon<f64>
fn shp_to_geo(p: &shapefile::Polygon) -> geo::MultiPolygon<f64> {
    /// Ensure first and last are the same for geo::LineString coords
    fn ensure_closed(coords: &mut Vec<geo::Coord<f64>>) {
        if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
            if first != last { coords.push(first) }
        }
    }

    // Each exterior ring is followed by its holes (Shapefile stores rings in this order)
    let mut polys: Vec<geo::Polygon<f64>> = Vec::new();
    let mut current_exterior: Option<geo::LineString<f64>> = None;
    let mut current_holes: Vec<geo::LineString<f64>> = Vec::new();

    for ring in p.rings() {
        let mut coords: Vec<geo::Coord<f64>> = ring.points().iter()
            .map(|pt| geo::Coord { x: pt.x, y: pt.y })
            .collect();
        ensure_closed(&mut coords);
        let ls = geo::LineString(coords);

        match ring {
            shapefile::PolygonRing::Outer(_) => {
                if let Some(ext) = current_exterior.replace(ls) {
                    polys.push(geo::Polygon::new(ext, std::mem::take(&mut current_holes)));
                }
            }
            shapefile::PolygonRing::Inner(_) => current_holes.push(ls),
        }
    }
    if let Some(ext) = current_exterior {
        polys.push(geo::Polygon::new(ext, current_holes));
    }

    geo::MultiPolygon(polys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapefile::{Point, PolygonRing};

    fn ring(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point { x, y }).collect()
    }

    #[test]
    fn rings_are_grouped_into_polygons_with_holes() {
        let polygon = shapefile::Polygon::with_rings(vec![
            PolygonRing::Outer(ring(&[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (0.0, 0.0)])),
            PolygonRing::Inner(ring(&[(2.0, 2.0), (4.0, 2.0), (4.0, 4.0), (2.0, 4.0), (2.0, 2.0)])),
            PolygonRing::Outer(ring(&[(20.0, 0.0), (20.0, 10.0), (30.0, 10.0), (30.0, 0.0), (20.0, 0.0)])),
        ]);

        let mp = shp_to_geo(&polygon);
        assert_eq!(mp.0.len(), 2);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert_eq!(mp.0[1].interiors().len(), 0);
    }

    #[test]
    fn missing_shapefile_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_shapefile(dir.path()).is_err());
    }

    #[test]
    fn finds_nested_shapefile() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("Small_Areas");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("Small_Areas.SHP"), b"").unwrap();
        std::fs::write(nested.join("Small_Areas.dbf"), b"").unwrap();

        assert_eq!(find_shapefile(dir.path()).unwrap(), nested.join("Small_Areas.SHP"));
    }
}
