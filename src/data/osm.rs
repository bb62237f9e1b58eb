use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub type OsmId = i64;

/// Tag key to tag value. `created_by` never appears as a key.
pub type Tags = HashMap<String, String>;

/// Tag key dropped at ingestion.
pub const CREATED_BY: &str = "created_by";

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, Copy, PartialEq)]
#[archive(check_bytes)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn lon_lat(&self) -> (f64, f64) {
        (self.lon, self.lat)
    }
}

/// A node that carried at least one tag. Untagged nodes only live in the
/// graph's coordinate lookup.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct Node {
    pub id: OsmId,
    pub coordinate: Coordinate,
    pub tags: Tags,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct Way {
    pub id: OsmId,
    pub tags: Tags,
    /// Node references in document order. They may point outside the extract.
    pub nodes: Vec<OsmId>,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct Relation {
    pub id: OsmId,
    pub tags: Tags,
    /// Way members in document order; other member types are not kept.
    pub ways: Vec<OsmId>,
    /// Way members with role `outer`. Only ever populated for multipolygons.
    pub outer_ways: Vec<OsmId>,
}

/// The relation kinds worth keeping. Anything else is dropped while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelationType {
    Multipolygon,
    Boundary,
    Route,
}

impl RelationType {
    pub const ALL: [RelationType; 3] = [
        RelationType::Multipolygon,
        RelationType::Boundary,
        RelationType::Route,
    ];

    /// Matches a tag value against the recognized type names.
    pub fn from_tag_value(value: &str) -> Option<RelationType> {
        match value {
            "multipolygon" => Some(RelationType::Multipolygon),
            "boundary" => Some(RelationType::Boundary),
            "route" => Some(RelationType::Route),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Multipolygon => "multipolygon",
            RelationType::Boundary => "boundary",
            RelationType::Route => "route",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRelationType(pub String);

impl fmt::Display for UnknownRelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown relation type {:?}", self.0)
    }
}

impl std::error::Error for UnknownRelationType {}

impl FromStr for RelationType {
    type Err = UnknownRelationType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationType::from_tag_value(s).ok_or_else(|| UnknownRelationType(s.to_string()))
    }
}

/// Top-level OSM element kinds tracked by the graph builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

impl ElementKind {
    pub fn from_name(name: &str) -> Option<ElementKind> {
        match name {
            "node" => Some(ElementKind::Node),
            "way" => Some(ElementKind::Way),
            "relation" => Some(ElementKind::Relation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
            ElementKind::Relation => "relation",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
