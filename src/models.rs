use ahash::AHashMap;
use geo_types::{Coord, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A geographic position. Serialized as `[lon, lat]`, the order the backend
/// and GeoJSON both use.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Vertex {
    pub lon: f64,
    pub lat: f64,
}

impl Vertex {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn from_lat_lon(lat: f64, lon: f64) -> Self {
        Self { lon, lat }
    }
}

impl From<(f64, f64)> for Vertex {
    fn from((lon, lat): (f64, f64)) -> Self {
        Vertex { lon, lat }
    }
}

impl From<Vertex> for (f64, f64) {
    fn from(v: Vertex) -> Self {
        (v.lon, v.lat)
    }
}

impl From<Vertex> for Coord<f64> {
    fn from(v: Vertex) -> Self {
        Coord { x: v.lon, y: v.lat }
    }
}

impl From<Coord<f64>> for Vertex {
    fn from(c: Coord<f64>) -> Self {
        Vertex { lon: c.x, lat: c.y }
    }
}

impl From<Vertex> for Point<f64> {
    fn from(v: Vertex) -> Self {
        Point::new(v.lon, v.lat)
    }
}

/// One cut across a parcel. Always holds at least two vertices.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SplitLine(Vec<Vertex>);

impl SplitLine {
    /// Returns `None` when fewer than two vertices are given.
    pub fn new(vertices: Vec<Vertex>) -> Option<Self> {
        if vertices.len() < 2 {
            return None;
        }
        Some(SplitLine(vertices))
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_line_string(&self) -> LineString<f64> {
        self.0.iter().map(|v| Coord::from(*v)).collect()
    }
}

/// Dataset (database schema) and table a parcel was loaded from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(dataset: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dataset, self.table)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parcel {
    pub identifier: String,
    /// Feature rows can arrive without a shape; consolidation counts these.
    pub geometry: Option<Polygon<f64>>,
    pub source_table: String,
    pub source_dataset: String,
    pub properties: AHashMap<String, String>,
}

impl Parcel {
    pub fn new(
        identifier: impl Into<String>,
        geometry: Option<Polygon<f64>>,
        table: &TableRef,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            geometry,
            source_table: table.table.clone(),
            source_dataset: table.dataset.clone(),
            properties: AHashMap::new(),
        }
    }

    pub fn table(&self) -> TableRef {
        TableRef::new(self.source_dataset.clone(), self.source_table.clone())
    }

    pub fn belongs_to(&self, table: &TableRef) -> bool {
        self.source_dataset == table.dataset && self.source_table == table.table
    }
}

/// One fragment of a server-computed subdivision preview.
#[derive(Clone, Debug, PartialEq)]
pub struct PreviewPart {
    pub geometry: Polygon<f64>,
    pub suggested_identifier: String,
}

/// Full attribute row of a parcel as stored by the backend.
pub type AttributeRecord = serde_json::Map<String, serde_json::Value>;
