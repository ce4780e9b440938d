use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;

/// Kind of a facility node. Closed set; base boosts live here instead of
/// being decided by runtime type inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocKind {
    Estate,
    Building,
    Room,
}

impl DocKind {
    /// Baseline score a document of this kind starts from. Estates float to
    /// the top of otherwise unscored listings.
    pub fn base_boost(self) -> f64 {
        match self {
            DocKind::Estate => 15.0,
            DocKind::Building => 0.0,
            DocKind::Room => 0.0,
        }
    }
}

/// Indexed field of a document, with its relevance weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Name,
    PopularName,
    Path,
    AncestorName,
    AncestorPopularName,
    Address,
}

impl Field {
    pub fn weight(self) -> f64 {
        match self {
            Field::Name => 20.0,
            Field::PopularName => 25.0,
            Field::Path => 2.0,
            Field::AncestorName => 1.5,
            Field::AncestorPopularName => 1.0,
            Field::Address => 8.0,
        }
    }
}

/// Summary of a parent node, root-to-parent order in `Document::ancestors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AncestorRef {
    pub id: i64,
    pub kind: DocKind,
    pub name: String,
    #[serde(default)]
    pub popular_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// A search-indexed facility node. Immutable input to a build; ids are only
/// unique within a kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub kind: DocKind,
    pub name: String,
    #[serde(default)]
    pub popular_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub ancestors: Vec<AncestorRef>,
    #[serde(default)]
    pub geo: Option<GeoPoint>,
    #[serde(default)]
    pub gross_area: Option<f64>,
    #[serde(default)]
    pub num_floors: Option<u32>,
    #[serde(default)]
    pub num_rooms: Option<u32>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    /// Used only by the business-type result filter.
    #[serde(default)]
    pub business_type_id: Option<i64>,
}

impl Document {
    /// Ancestor names joined with the node's own name, root first.
    pub fn path(&self) -> String {
        let mut parts: Vec<&str> = self.ancestors.iter().map(|a| a.name.as_str()).collect();
        parts.push(&self.name);
        parts.join(" / ")
    }

    /// Popular name when present, otherwise the formal name. This is the
    /// alphabetical tie-break key for result ordering.
    pub fn display_name(&self) -> &str {
        self.popular_name.as_deref().unwrap_or(&self.name)
    }
}
