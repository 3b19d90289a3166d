use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// An EPSG coordinate reference system code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epsg(pub u32);

impl Epsg {
    /// WGS 84 longitude/latitude, the GeoJSON default.
    pub const WGS84: Epsg = Epsg(4326);
    /// ETRS89 longitude/latitude.
    pub const ETRS89: Epsg = Epsg(4258);
    /// IRENET95 / Irish Transverse Mercator.
    pub const ITM: Epsg = Epsg(2157);
    /// TM65 / Irish Grid.
    pub const IRISH_GRID: Epsg = Epsg(29902);
    /// TM75 / Irish Grid.
    pub const TM75_IRISH_GRID: Epsg = Epsg(29903);

    /// True for longitude/latitude systems (proj4rs works in radians for these).
    #[inline]
    pub fn is_geographic(self) -> bool {
        matches!(self, Self::WGS84 | Self::ETRS89)
    }

    /// PROJ.4 definition for the systems this crate can reproject between.
    pub(crate) fn proj4(self) -> Result<&'static str> {
        Ok(match self {
            Self::WGS84 => "+proj=longlat +datum=WGS84 +no_defs +type=crs",
            Self::ETRS89 => "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs +type=crs",
            Self::ITM => "+proj=tmerc +lat_0=53.5 +lon_0=-8 +k=0.99982 +x_0=600000 +y_0=750000 \
                +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs +type=crs",
            Self::IRISH_GRID => "+proj=tmerc +lat_0=53.5 +lon_0=-8 +k=1.000035 +x_0=200000 +y_0=250000 \
                +ellps=mod_airy +towgs84=482.5,-130.6,564.6,-1.042,-0.214,-0.631,8.15 +units=m +no_defs +type=crs",
            Self::TM75_IRISH_GRID => "+proj=tmerc +lat_0=53.5 +lon_0=-8 +k=1.000035 +x_0=200000 +y_0=250000 \
                +ellps=mod_airy +towgs84=482.5,-130.6,564.6,-1.042,-0.214,-0.631,8.15 +units=m +no_defs +type=crs",
            other => bail!("unsupported coordinate reference system: {other}"),
        })
    }

    /// Parse a GeoJSON `crs` name such as `urn:ogc:def:crs:EPSG::2157`,
    /// `EPSG:2157` or the CRS84 alias.
    pub fn from_crs_name(name: &str) -> Option<Epsg> {
        if name.ends_with("CRS84") {
            return Some(Self::WGS84);
        }
        name.rsplit(':')
            .next()
            .and_then(|code| code.trim().parse().ok())
            .map(Epsg)
    }

    /// Infer the EPSG code from the WKT stored in a shapefile's `.prj`.
    pub fn from_prj_wkt(wkt: &str) -> Option<Epsg> {
        let wkt = wkt.to_ascii_uppercase();
        if wkt.contains("IRENET95") || wkt.contains("IRISH_TRANSVERSE_MERCATOR") {
            Some(Self::ITM)
        } else if wkt.contains("TM75") {
            Some(Self::TM75_IRISH_GRID)
        } else if wkt.contains("IRISH_GRID") || wkt.contains("TM65") {
            Some(Self::IRISH_GRID)
        } else if wkt.starts_with("PROJCS") {
            None
        } else if wkt.contains("ETRS_1989") || wkt.contains("ETRS89") {
            Some(Self::ETRS89)
        } else if wkt.contains("WGS_1984") || wkt.contains("WGS84") {
            Some(Self::WGS84)
        } else {
            None
        }
    }

    /// The GeoJSON `crs` member name for this code.
    pub(crate) fn urn(self) -> String {
        format!("urn:ogc:def:crs:EPSG::{}", self.0)
    }
}

impl Default for Epsg {
    fn default() -> Self { Self::WGS84 }
}

impl fmt::Display for Epsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}
