use std::collections::HashMap;

use self::osm::{Coordinate, Node, OsmId, Relation, RelationType, Way};

pub mod osm;

/// Map data as read from an .osm file. Untagged nodes survive only as
/// coordinates and relations only when they have a recognized type.
///
/// A graph is built once by [`crate::builder::GraphBuilder`] and never
/// mutated afterwards; everything public here is read-only.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Default, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct OsmGraph {
    coordinates: HashMap<OsmId, Coordinate>,
    nodes: HashMap<OsmId, Node>,
    ways: HashMap<OsmId, Way>,
    multipolygons: HashMap<OsmId, Relation>,
    boundaries: HashMap<OsmId, Relation>,
    routes: HashMap<OsmId, Relation>,
}

/// Element counts of a graph, used for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphSummary {
    pub coordinates: usize,
    pub tagged_nodes: usize,
    pub ways: usize,
    pub multipolygons: usize,
    pub boundaries: usize,
    pub routes: usize,
}

impl OsmGraph {
    /// `(lon, lat)` of a node, if the document contained it.
    pub fn coordinate_of(&self, id: OsmId) -> Option<(f64, f64)> {
        self.coordinates.get(&id).map(Coordinate::lon_lat)
    }

    pub fn coordinate(&self, id: OsmId) -> Option<Coordinate> {
        self.coordinates.get(&id).copied()
    }

    /// Coordinates of `refs` in order. References without a coordinate are
    /// skipped, so the result may be shorter than the input.
    pub fn resolve_path(&self, refs: &[OsmId]) -> Vec<Coordinate> {
        refs.iter()
            .filter_map(|id| self.coordinates.get(id).copied())
            .collect()
    }

    pub fn tagged_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn tagged_node(&self, id: OsmId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// All ways, in no particular order.
    pub fn ways(&self) -> impl Iterator<Item = &Way> {
        self.ways.values()
    }

    pub fn way(&self, id: OsmId) -> Option<&Way> {
        self.ways.get(&id)
    }

    pub fn relations_of_type(&self, kind: RelationType) -> impl Iterator<Item = &Relation> {
        self.partition(kind).values()
    }

    /// Like [`OsmGraph::relations_of_type`], keyed by the type name. Unknown
    /// names yield nothing.
    pub fn relations_named<'a>(&'a self, name: &str) -> Box<dyn Iterator<Item = &'a Relation> + 'a> {
        match RelationType::from_tag_value(name) {
            Some(kind) => Box::new(self.relations_of_type(kind)),
            None => Box::new(std::iter::empty()),
        }
    }

    pub fn relation(&self, kind: RelationType, id: OsmId) -> Option<&Relation> {
        self.partition(kind).get(&id)
    }

    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            coordinates: self.coordinates.len(),
            tagged_nodes: self.nodes.len(),
            ways: self.ways.len(),
            multipolygons: self.multipolygons.len(),
            boundaries: self.boundaries.len(),
            routes: self.routes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
            && self.ways.is_empty()
            && RelationType::ALL
                .iter()
                .all(|kind| self.partition(*kind).is_empty())
    }

    pub(crate) fn insert_coordinate(&mut self, id: OsmId, coordinate: Coordinate) {
        self.coordinates.insert(id, coordinate);
    }

    pub(crate) fn insert_node(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    pub(crate) fn insert_way(&mut self, way: Way) {
        self.ways.insert(way.id, way);
    }

    pub(crate) fn insert_relation(&mut self, kind: RelationType, relation: Relation) {
        self.partition_mut(kind).insert(relation.id, relation);
    }

    fn partition(&self, kind: RelationType) -> &HashMap<OsmId, Relation> {
        match kind {
            RelationType::Multipolygon => &self.multipolygons,
            RelationType::Boundary => &self.boundaries,
            RelationType::Route => &self.routes,
        }
    }

    fn partition_mut(&mut self, kind: RelationType) -> &mut HashMap<OsmId, Relation> {
        match kind {
            RelationType::Multipolygon => &mut self.multipolygons,
            RelationType::Boundary => &mut self.boundaries,
            RelationType::Route => &mut self.routes,
        }
    }
}

impl GraphSummary {
    pub fn relations(&self) -> usize {
        self.multipolygons + self.boundaries + self.routes
    }
}
