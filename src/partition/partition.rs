use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use geo::{Area, MultiPolygon};

use crate::geom::{reproject, Epsg, Geometries};
use crate::io::Feature;
use crate::partition::{Attributes, PolygonRecord};

/// An ordered collection of polygon records in a single coordinate system.
/// Identifiers are unique within a partition; geometries are expected, but
/// not required, to tile a region without gaps.
#[derive(Debug, Clone)]
pub struct Partition {
    records: Vec<PolygonRecord>,
    index: HashMap<String, usize>,
    id_field: Option<String>,
    epsg: Epsg,
}

impl Partition {
    /// Build a partition, rejecting duplicate identifiers.
    /// `id_field` names the attribute the identifiers were read from, if any.
    pub fn new(records: Vec<PolygonRecord>, id_field: Option<&str>, epsg: Epsg) -> Result<Self> {
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if let Some(previous) = index.insert(record.id().to_string(), i) {
                bail!("duplicate identifier {:?} (records {previous} and {i})", record.id());
            }
        }
        Ok(Self { records, index, id_field: id_field.map(str::to_string), epsg })
    }

    /// Build a partition from features read from a geometry file.
    ///
    /// With `id_field`, each feature's identifier is that property (which must be present).
    /// Without it, the feature's own id is used, falling back to its position in the file.
    pub fn from_features(features: Vec<Feature>, id_field: Option<&str>, epsg: Epsg) -> Result<Self> {
        let records = features.into_iter().enumerate()
            .map(|(i, feature)| {
                let id = match id_field {
                    Some(field) => feature.properties.get(field).cloned()
                        .ok_or_else(|| anyhow!("feature {i} has no {field:?} property"))?,
                    None => feature.id.unwrap_or_else(|| i.to_string()),
                };
                Ok(PolygonRecord::new(id, feature.properties, feature.geometry))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(records, id_field, epsg)
    }

    #[inline] pub fn len(&self) -> usize { self.records.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.records.is_empty() }

    #[inline] pub fn epsg(&self) -> Epsg { self.epsg }

    /// The attribute the identifiers came from, if they came from one.
    #[inline] pub fn id_field(&self) -> Option<&str> { self.id_field.as_deref() }

    #[inline] pub fn records(&self) -> &[PolygonRecord] { &self.records }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &PolygonRecord> {
        self.records.iter()
    }

    /// Identifiers in input order.
    #[inline]
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(PolygonRecord::id)
    }

    /// Look up a record by identifier.
    pub fn get(&self, id: &str) -> Option<&PolygonRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    /// Keep only the given attribute columns (the identifier column is always kept).
    pub fn select(&self, columns: &[&str]) -> Self {
        self.map_records(|record| {
            record.with_attributes(record.attributes().iter()
                .filter(|(name, _)| columns.contains(&name.as_str()) || self.id_field() == Some(name.as_str()))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect())
        })
    }

    /// Rename an attribute column; the identifier column follows the rename.
    pub fn rename(&self, from: &str, to: &str) -> Self {
        let mut renamed = self.map_records(|record| {
            let mut attributes = record.attributes().clone();
            if let Some(value) = attributes.remove(from) {
                attributes.insert(to.to_string(), value);
            }
            record.with_attributes(attributes)
        });
        if renamed.id_field.as_deref() == Some(from) {
            renamed.id_field = Some(to.to_string());
        }
        renamed
    }

    /// Add or replace the `name` column with a value computed from each record's attributes.
    pub fn with_column(&self, name: &str, value: impl Fn(&Attributes) -> Option<String>) -> Self {
        self.map_records(|record| {
            let mut attributes = record.attributes().clone();
            match value(&attributes) {
                Some(v) => { attributes.insert(name.to_string(), v); }
                None => { attributes.remove(name); }
            }
            record.with_attributes(attributes)
        })
    }

    /// Add an `area_km2` style column holding each geometry's planar area scaled by `scale`.
    /// Only meaningful for projected coordinate systems.
    pub fn with_area_column(&self, name: &str, scale: f64) -> Result<Self> {
        if self.epsg.is_geographic() {
            bail!("area of geographic coordinates ({}) is not planar; reproject first", self.epsg);
        }
        Ok(self.map_records(|record| {
            let mut attributes = record.attributes().clone();
            attributes.insert(name.to_string(), (record.geometry().unsigned_area() * scale).to_string());
            record.with_attributes(attributes)
        }))
    }

    /// Reproject every geometry into `epsg`.
    pub fn to_crs(&self, epsg: Epsg) -> Result<Self> {
        let shapes = reproject(&self.shapes(), self.epsg, epsg)
            .with_context(|| format!("failed to reproject {} records from {} to {epsg}", self.len(), self.epsg))?;

        let mut projected = self.map_records_with_index(|i, record| record.with_geometry(shapes[i].clone()));
        projected.epsg = epsg;
        Ok(projected)
    }

    /// Keep the records satisfying `keep`, in input order.
    pub fn filter(&self, keep: impl Fn(&PolygonRecord) -> bool) -> Self {
        let records: Vec<_> = self.records.iter().filter(|r| keep(r)).cloned().collect();
        let index = records.iter().enumerate()
            .map(|(i, record)| (record.id().to_string(), i))
            .collect();
        Self { records, index, id_field: self.id_field.clone(), epsg: self.epsg }
    }

    /// Records as writable features, identifiers carried as feature ids.
    pub fn to_features(&self) -> Vec<Feature> {
        self.records.iter()
            .map(|record| Feature {
                id: Some(record.id().to_string()),
                properties: record.attributes().clone(),
                geometry: record.geometry().clone(),
            })
            .collect()
    }

    /// Clone the geometries in input order.
    pub(crate) fn shapes(&self) -> Vec<MultiPolygon<f64>> {
        self.records.iter().map(|record| record.geometry().clone()).collect()
    }

    /// Build the spatial index over this partition's geometries.
    pub(crate) fn geometries(&self) -> Geometries {
        Geometries::new(&self.shapes(), self.epsg)
    }

    fn map_records(&self, f: impl Fn(&PolygonRecord) -> PolygonRecord) -> Self {
        self.map_records_with_index(|_, record| f(record))
    }

    /// Record-wise transform that keeps ids, order and index intact.
    fn map_records_with_index(&self, f: impl Fn(usize, &PolygonRecord) -> PolygonRecord) -> Self {
        Self {
            records: self.records.iter().enumerate().map(|(i, record)| f(i, record)).collect(),
            index: self.index.clone(),
            id_field: self.id_field.clone(),
            epsg: self.epsg,
        }
    }
}
