use std::collections::BTreeMap;

use geo::MultiPolygon;

/// Descriptive attributes of a record, keyed by column name.
pub type Attributes = BTreeMap<String, String>;

/// One labeled polygon: an identifier, its attributes, and its geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonRecord {
    id: String,
    attributes: Attributes,
    geometry: MultiPolygon<f64>,
}

impl PolygonRecord {
    pub fn new(id: impl Into<String>, attributes: Attributes, geometry: MultiPolygon<f64>) -> Self {
        Self { id: id.into(), attributes, geometry }
    }

    #[inline] pub fn id(&self) -> &str { &self.id }

    #[inline] pub fn attributes(&self) -> &Attributes { &self.attributes }

    #[inline] pub fn geometry(&self) -> &MultiPolygon<f64> { &self.geometry }

    /// Get a single attribute value by column name.
    #[inline]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Copy of this record with different attributes.
    pub(crate) fn with_attributes(&self, attributes: Attributes) -> Self {
        Self { id: self.id.clone(), attributes, geometry: self.geometry.clone() }
    }

    /// Copy of this record with a different geometry.
    pub(crate) fn with_geometry(&self, geometry: MultiPolygon<f64>) -> Self {
        Self { id: self.id.clone(), attributes: self.attributes.clone(), geometry }
    }
}
