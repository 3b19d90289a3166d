use std::collections::{BTreeSet, HashSet};

use anyhow::{bail, ensure, Result};
use geo::{MultiPolygon, Point};

use crate::geom::Epsg;
use crate::io::Feature;
use crate::link::OverrideTable;
use crate::partition::{Attributes, Partition, PolygonRecord};

/// How a fine record received its linked attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSource {
    /// Its interior point fell inside a coarse polygon.
    Geometry,
    /// It was looked up in the override table.
    Override,
}

/// A fine record paired with the attributes of the coarse record it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    position: usize, // index of the record in the fine partition
    record: PolygonRecord,
    coarse_id: Option<String>,
    linked: Attributes,
    source: LinkSource,
}

impl Link {
    #[inline] pub fn id(&self) -> &str { self.record.id() }

    /// The fine record, geometry untouched.
    #[inline] pub fn record(&self) -> &PolygonRecord { &self.record }

    #[inline] pub fn geometry(&self) -> &MultiPolygon<f64> { self.record.geometry() }

    /// Identifier of the coarse record. For overrides, the value given for the
    /// coarse partition's identifier column, if any.
    #[inline] pub fn coarse_id(&self) -> Option<&str> { self.coarse_id.as_deref() }

    /// Attributes copied from the coarse record or the override table.
    #[inline] pub fn linked_attributes(&self) -> &Attributes { &self.linked }

    #[inline] pub fn source(&self) -> LinkSource { self.source }

    /// Look up a linked attribute, falling back to the fine record's own attributes.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.linked.get(name).map(String::as_str).or_else(|| self.record.attribute(name))
    }

    /// Fine attributes followed by linked attributes. A linked column whose
    /// name is already taken by the fine record is written as `<name>_right`.
    pub fn to_attributes(&self) -> Attributes {
        let mut attributes = self.record.attributes().clone();
        for (name, value) in &self.linked {
            let name = if attributes.contains_key(name) { format!("{name}_right") } else { name.clone() };
            attributes.insert(name, value.clone());
        }
        attributes
    }

    pub fn to_feature(&self) -> Feature {
        Feature {
            id: Some(self.id().to_string()),
            properties: self.to_attributes(),
            geometry: self.geometry().clone(),
        }
    }
}

/// A fine record whose interior point fell outside every coarse polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Unlinked {
    position: usize,
    record: PolygonRecord,
    point: Option<Point<f64>>,
}

impl Unlinked {
    #[inline] pub fn id(&self) -> &str { self.record.id() }

    #[inline] pub fn record(&self) -> &PolygonRecord { &self.record }

    /// The interior point used for matching; `None` for empty or degenerate geometry.
    #[inline] pub fn point(&self) -> Option<Point<f64>> { self.point }
}

/// Counters describing one geometric join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub linked: usize,
    pub unlinked: usize,
    /// Linked records whose point fell in more than one coarse polygon.
    pub ambiguous: usize,
    /// Unlinked records with no interior point at all.
    pub degenerate: usize,
}

/// Fine records that found a coarse polygon, in fine input order.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedPartition {
    links: Vec<Link>,
    epsg: Epsg,
}

impl LinkedPartition {
    #[inline] pub fn len(&self) -> usize { self.links.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.links.is_empty() }
    #[inline] pub fn links(&self) -> &[Link] { &self.links }
    #[inline] pub fn epsg(&self) -> Epsg { self.epsg }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.links.iter().map(Link::id)
    }

    pub fn get(&self, id: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.id() == id)
    }

    /// The linked fine records with the coarse attributes merged in.
    pub fn to_partition(&self, id_field: Option<&str>) -> Result<Partition> {
        Partition::new(
            self.links.iter().map(|link| link.record.with_attributes(link.to_attributes())).collect(),
            id_field,
            self.epsg,
        )
    }

    pub fn to_features(&self) -> Vec<Feature> {
        self.links.iter().map(Link::to_feature).collect()
    }
}

/// Fine records that matched no coarse polygon, in fine input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnlinkedSet {
    records: Vec<Unlinked>,
}

impl UnlinkedSet {
    #[inline] pub fn len(&self) -> usize { self.records.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.records.is_empty() }
    #[inline] pub fn records(&self) -> &[Unlinked] { &self.records }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(Unlinked::id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.iter().any(|unlinked| unlinked.id() == id)
    }

    /// Close the set with an override table.
    ///
    /// Unlinked records with an override entry become links carrying the
    /// override attributes; the rest stay unresolved. Entries for identifiers
    /// that are not in this set are reported as stale.
    pub fn resolve(self, overrides: &OverrideTable, coarse_id_field: Option<&str>) -> Resolution {
        let pending: HashSet<&str> = self.ids().collect();
        let stale = overrides.ids()
            .filter(|id| !pending.contains(id))
            .map(str::to_string)
            .collect();

        let (found, missing): (Vec<_>, Vec<_>) = self.records.into_iter()
            .partition(|unlinked| overrides.get(unlinked.id()).is_some());

        let resolved = found.into_iter()
            .filter_map(|unlinked| {
                let linked = overrides.get(unlinked.id())?.clone();
                let coarse_id = coarse_id_field.and_then(|field| linked.get(field).cloned());
                Some(Link {
                    position: unlinked.position,
                    record: unlinked.record,
                    coarse_id,
                    linked,
                    source: LinkSource::Override,
                })
            })
            .collect();

        Resolution { resolved, unresolved: UnlinkedSet { records: missing }, stale }
    }
}

/// Outcome of closing an [`UnlinkedSet`] with an override table.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub resolved: Vec<Link>,
    pub unresolved: UnlinkedSet,
    /// Override identifiers that did not correspond to any unlinked record.
    pub stale: Vec<String>,
}

/// Assign every fine record to the coarse record containing its interior point.
///
/// Both partitions must share a coordinate system. Where several coarse
/// polygons contain the point, the first in coarse input order wins.
pub fn link(fine: &Partition, coarse: &Partition) -> Result<(LinkedPartition, UnlinkedSet)> {
    let (linked, unlinked, _) = link_with_stats(fine, coarse)?;
    Ok((linked, unlinked))
}

/// [`link`], also returning counters for logging.
pub fn link_with_stats(fine: &Partition, coarse: &Partition) -> Result<(LinkedPartition, UnlinkedSet, LinkStats)> {
    ensure!(
        fine.epsg() == coarse.epsg(),
        "cannot link partitions in different coordinate systems: fine is {}, coarse is {}",
        fine.epsg(), coarse.epsg()
    );

    let crosswalks = fine.geometries().compute_crosswalks(&coarse.geometries())?;

    let mut stats = LinkStats::default();
    let mut links = Vec::new();
    let mut unlinked = Vec::new();

    for (position, (record, crosswalk)) in fine.iter().zip(crosswalks).enumerate() {
        match crosswalk.parent {
            Some(parent) => {
                let parent = &coarse.records()[parent];
                stats.linked += 1;
                if crosswalk.matches > 1 { stats.ambiguous += 1 }
                links.push(Link {
                    position,
                    record: record.clone(),
                    coarse_id: Some(parent.id().to_string()),
                    linked: parent.attributes().clone(),
                    source: LinkSource::Geometry,
                });
            }
            None => {
                stats.unlinked += 1;
                if crosswalk.point.is_none() { stats.degenerate += 1 }
                unlinked.push(Unlinked { position, record: record.clone(), point: crosswalk.point });
            }
        }
    }

    Ok((LinkedPartition { links, epsg: fine.epsg() }, UnlinkedSet { records: unlinked }, stats))
}

/// Linked records after override closure, plus whatever is still unresolved.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkResult {
    links: Vec<Link>,
    unresolved: UnlinkedSet,
    stale_overrides: Vec<String>,
    stats: LinkStats,
    epsg: Epsg,
}

impl LinkResult {
    /// Merge geometric links with override-resolved links, restoring fine input order.
    pub fn compose(linked: LinkedPartition, resolution: Resolution, stats: LinkStats) -> Result<Self> {
        let Resolution { resolved, unresolved, stale } = resolution;

        let mut links = linked.links;
        links.extend(resolved);
        links.sort_by_key(|link| link.position);

        let mut seen = BTreeSet::new();
        for id in links.iter().map(Link::id).chain(unresolved.ids()) {
            if !seen.insert(id) {
                bail!("fine identifier {id:?} appears more than once in the linked output");
            }
        }

        Ok(Self { links, unresolved, stale_overrides: stale, stats, epsg: linked.epsg })
    }

    #[inline] pub fn links(&self) -> &[Link] { &self.links }
    #[inline] pub fn unresolved(&self) -> &UnlinkedSet { &self.unresolved }
    #[inline] pub fn stale_overrides(&self) -> &[String] { &self.stale_overrides }
    #[inline] pub fn stats(&self) -> LinkStats { self.stats }
    #[inline] pub fn epsg(&self) -> Epsg { self.epsg }

    pub fn get(&self, id: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.id() == id)
    }

    /// Number of links that came from the override table.
    pub fn overridden(&self) -> usize {
        self.links.iter().filter(|link| link.source() == LinkSource::Override).count()
    }

    /// True when every fine identifier has exactly one link.
    #[inline] pub fn is_complete(&self) -> bool { self.unresolved.is_empty() }

    /// Fail, listing the stragglers, unless every fine identifier is linked.
    pub fn ensure_complete(&self) -> Result<()> {
        if self.is_complete() {
            return Ok(());
        }
        const SHOWN: usize = 20;
        let ids: Vec<&str> = self.unresolved.ids().take(SHOWN).collect();
        let more = self.unresolved.len().saturating_sub(SHOWN);
        bail!(
            "{} records left unlinked after overrides: {}{}",
            self.unresolved.len(),
            ids.join(", "),
            if more > 0 { format!(" (and {more} more)") } else { String::new() }
        )
    }

    pub fn to_features(&self) -> Vec<Feature> {
        self.links.iter().map(Link::to_feature).collect()
    }

    /// One flat attribute row per link (no geometry).
    pub fn to_rows(&self) -> Vec<Attributes> {
        self.links.iter().map(Link::to_attributes).collect()
    }
}

/// Geometric join followed by override closure.
pub fn link_with_overrides(fine: &Partition, coarse: &Partition, overrides: &OverrideTable) -> Result<LinkResult> {
    let (linked, unlinked, stats) = link_with_stats(fine, coarse)?;
    let resolution = unlinked.resolve(overrides, coarse.id_field());
    LinkResult::compose(linked, resolution, stats)
}
