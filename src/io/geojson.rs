//! GeoJSON FeatureCollection reading and writing.

use std::{io::Write, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{json, Map, Value};

use crate::common::PendingWrite;
use crate::geom::Epsg;
use crate::io::Feature;
use crate::partition::Attributes;

/// Read a GeoJSON file into features and the EPSG code named by its `crs` member (WGS84 if absent).
pub fn read_geojson(path: &Path) -> Result<(Vec<Feature>, Epsg)> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("[io::geojson::read] Failed to open GeoJSON file: {}", path.display()))?;
    read_geojson_bytes(&bytes)
        .with_context(|| format!("[io::geojson::read] Failed to read GeoJSON from {}", path.display()))
}

/// Read features from GeoJSON bytes.
pub fn read_geojson_bytes(bytes: &[u8]) -> Result<(Vec<Feature>, Epsg)> {
    let value: Value = serde_json::from_slice(bytes).context("Failed to parse GeoJSON bytes")?;

    let epsg = match value["crs"]["properties"]["name"].as_str() {
        Some(name) => Epsg::from_crs_name(name)
            .ok_or_else(|| anyhow!("unrecognised crs name {name:?}"))?,
        None => Epsg::WGS84,
    };

    let features = value["features"].as_array()
        .ok_or_else(|| anyhow!("expected a FeatureCollection with a \"features\" array"))?;

    let features = features.iter().enumerate()
        .map(|(i, feature)| parse_feature(feature).with_context(|| format!("invalid feature {i}")))
        .collect::<Result<Vec<_>>>()?;

    Ok((features, epsg))
}

/// Write features as a GeoJSON FeatureCollection, atomically.
/// Refuses to replace an existing file unless `force` is set.
pub fn write_geojson(path: &Path, features: &[Feature], epsg: Epsg, force: bool) -> Result<()> {
    let bytes = write_geojson_bytes(features, epsg)?;
    let mut sink = PendingWrite::open(path, force)?;
    sink.write_all(&bytes)
        .with_context(|| format!("[io::geojson::write] Failed to write {}", path.display()))?;
    sink.finalize()
}

/// Write features to GeoJSON bytes. Non-WGS84 output carries a legacy `crs` member.
pub fn write_geojson_bytes(features: &[Feature], epsg: Epsg) -> Result<Vec<u8>> {
    let features: Vec<Value> = features.iter().enumerate()
        .map(|(i, feature)| json!({
            "type": "Feature",
            "id": feature.id.clone().unwrap_or_else(|| i.to_string()),
            "geometry": multipolygon_to_geojson(&feature.geometry),
            "properties": feature.properties,
        }))
        .collect();

    let mut collection = Map::new();
    collection.insert("type".into(), json!("FeatureCollection"));
    if epsg != Epsg::WGS84 {
        collection.insert("crs".into(), json!({ "type": "name", "properties": { "name": epsg.urn() } }));
    }
    collection.insert("features".into(), Value::Array(features));

    serde_json::to_vec(&Value::Object(collection)).context("Failed to serialize GeoJSON to bytes")
}

fn parse_feature(feature: &Value) -> Result<Feature> {
    let id = match &feature["id"] {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };

    let properties = match &feature["properties"] {
        Value::Object(map) => map.iter()
            .filter_map(|(name, value)| property_to_string(value).map(|v| (name.clone(), v)))
            .collect(),
        _ => Attributes::new(),
    };

    let geometry = match &feature["geometry"] {
        Value::Null => MultiPolygon(vec![]),
        geometry => {
            let coords = geometry["coordinates"].as_array()
                .ok_or_else(|| anyhow!("geometry has no coordinates array"))?;
            match geometry["type"].as_str() {
                Some("Polygon") => MultiPolygon(vec![parse_polygon_coords(coords)?]),
                Some("MultiPolygon") => MultiPolygon(coords.iter()
                    .map(|polygon| polygon.as_array()
                        .ok_or_else(|| anyhow!("MultiPolygon member is not an array"))
                        .and_then(|rings| parse_polygon_coords(rings)))
                    .collect::<Result<Vec<_>>>()?),
                other => bail!("found non-polygon geometry: {other:?}"),
            }
        }
    };

    Ok(Feature { id, properties, geometry })
}

/// Properties are kept as strings; nulls are dropped.
fn property_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Parse `[exterior, hole, hole, ...]` into a Polygon.
fn parse_polygon_coords(rings: &[Value]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| {
        ring.as_array()
            .ok_or_else(|| anyhow!("polygon ring is not an array"))
            .and_then(|coords| parse_ring_coords(coords))
    });

    let exterior = rings.next()
        .ok_or_else(|| anyhow!("Invalid Polygon: missing exterior ring"))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;

    Ok(Polygon::new(exterior, interiors))
}

/// Parse a ring from GeoJSON coordinates `[[x, y], [x, y], ...]`, closing it if needed.
fn parse_ring_coords(coords: &[Value]) -> Result<LineString<f64>> {
    let mut points = coords.iter()
        .map(|pair| {
            let x = pair[0].as_f64().ok_or_else(|| anyhow!("Invalid coordinate: x must be a number"))?;
            let y = pair[1].as_f64().ok_or_else(|| anyhow!("Invalid coordinate: y must be a number"))?;
            Ok(Coord { x, y })
        })
        .collect::<Result<Vec<_>>>()?;

    if let (Some(&first), Some(&last)) = (points.first(), points.last()) {
        if first != last { points.push(first) }
    }

    Ok(LineString(points))
}

/// Convert a MultiPolygon to a GeoJSON geometry object.
fn multipolygon_to_geojson(mp: &MultiPolygon<f64>) -> Value {
    let ring = |ls: &LineString<f64>| ls.coords().map(|c| vec![c.x, c.y]).collect::<Vec<_>>();

    let polygons: Vec<Vec<Vec<Vec<f64>>>> = mp.0.iter()
        .map(|polygon| std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .map(ring)
            .collect())
        .collect();

    json!({ "type": "MultiPolygon", "coordinates": polygons })
}
