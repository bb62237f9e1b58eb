use std::io::BufRead;
use std::path::Path;

use log::{debug, info};

use crate::data::osm::{
    Coordinate, ElementKind, Node, OsmId, Relation, RelationType, Tags, Way, CREATED_BY,
};
use crate::data::OsmGraph;
use crate::errors::{Error, Result};
use crate::reader::{open_document, ElementReader, ReadEvent, XmlElementReader};

const ROOT: &str = "osm";

/// Where the walk currently is relative to the `osm` root.
enum Phase {
    BeforeRoot,
    InRoot,
    AfterRoot,
}

/// Scratch state of the one `node`, `way` or `relation` being read. It is
/// created on the element's start tag and consumed on its end tag.
struct OpenElement {
    kind: ElementKind,
    id: OsmId,
    coordinate: Option<Coordinate>,
    tags: Tags,
    children: Vec<OsmId>,
    outer_members: Vec<OsmId>,
    relation_type: Option<RelationType>,
    /// Elements started inside this one and not yet ended.
    nested: usize,
}

impl OpenElement {
    fn new(kind: ElementKind, id: OsmId) -> Self {
        OpenElement {
            kind,
            id,
            coordinate: None,
            tags: Tags::new(),
            children: Vec::new(),
            outer_members: Vec::new(),
            relation_type: None,
            nested: 0,
        }
    }
}

/// Drives an [`ElementReader`] through one OSM document and collects the
/// graph. Apart from node coordinates, which are taken from the start tag,
/// elements are committed only when their end tag is reached. A failed
/// build returns no graph.
pub struct GraphBuilder {
    graph: OsmGraph,
    phase: Phase,
    open: Option<OpenElement>,
    /// Unrecognized elements open below the root, outside any tracked element.
    skipped: usize,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        GraphBuilder {
            graph: OsmGraph::default(),
            phase: Phase::BeforeRoot,
            open: None,
            skipped: 0,
        }
    }

    pub fn build<R: ElementReader>(mut self, reader: &mut R) -> Result<OsmGraph> {
        loop {
            match reader.advance()? {
                ReadEvent::Start(name) => self.on_start(&name, reader)?,
                ReadEvent::End(name) => self.on_end(&name),
                ReadEvent::Eof => break,
            }
        }

        if matches!(self.phase, Phase::BeforeRoot) {
            debug!(root = ROOT; "Document has no root element, returning an empty graph");
        }

        let summary = self.graph.summary();
        info!(
            coordinates = summary.coordinates,
            tagged_nodes = summary.tagged_nodes,
            ways = summary.ways,
            multipolygons = summary.multipolygons,
            boundaries = summary.boundaries,
            routes = summary.routes;
            "Built OSM graph"
        );
        Ok(self.graph)
    }

    fn on_start<R: ElementReader>(&mut self, name: &str, reader: &R) -> Result<()> {
        match self.phase {
            Phase::BeforeRoot => {
                if name == ROOT {
                    self.phase = Phase::InRoot;
                }
                return Ok(());
            }
            Phase::AfterRoot => return Ok(()),
            Phase::InRoot => (),
        }

        if let Some(open) = self.open.as_mut() {
            if open.nested == 0 {
                Self::on_child(open, name, reader)?;
            }
            open.nested += 1;
            return Ok(());
        }

        let Some(kind) = ElementKind::from_name(name) else {
            self.skipped += 1;
            return Ok(());
        };
        let open = Self::open_element(kind, reader)?;
        // Coordinates are known from the start tag alone.
        if let Some(coordinate) = open.coordinate {
            self.graph.insert_coordinate(open.id, coordinate);
        }
        self.open = Some(open);
        Ok(())
    }

    fn on_end(&mut self, name: &str) {
        if !matches!(self.phase, Phase::InRoot) {
            return;
        }

        if let Some(open) = self.open.as_mut() {
            if open.nested > 0 {
                open.nested -= 1;
                return;
            }
        }
        if let Some(open) = self.open.take() {
            self.commit(open);
            return;
        }

        if self.skipped > 0 {
            self.skipped -= 1;
        } else if name == ROOT {
            self.phase = Phase::AfterRoot;
        }
    }

    fn open_element<R: ElementReader>(kind: ElementKind, reader: &R) -> Result<OpenElement> {
        let id = reader
            .attribute("id")
            .and_then(|value| value.parse::<OsmId>().ok())
            .ok_or_else(|| Error::MissingIdentifier {
                element: kind,
                position: reader.position(),
            })?;

        let mut open = OpenElement::new(kind, id);
        if kind == ElementKind::Node {
            open.coordinate = Some(Coordinate {
                lon: Self::parse_coordinate(id, "lon", reader)?,
                lat: Self::parse_coordinate(id, "lat", reader)?,
            });
        }
        Ok(open)
    }

    fn parse_coordinate<R: ElementReader>(node: OsmId, attribute: &'static str, reader: &R) -> Result<f64> {
        reader
            .attribute(attribute)
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .ok_or_else(|| Error::MissingCoordinate {
                node,
                attribute,
                position: reader.position(),
            })
    }

    fn parse_ref<R: ElementReader>(open: &OpenElement, reader: &R) -> Result<OsmId> {
        reader
            .attribute("ref")
            .and_then(|value| value.parse::<OsmId>().ok())
            .ok_or_else(|| Error::InvalidReference {
                element: open.kind,
                id: open.id,
                position: reader.position(),
            })
    }

    fn on_child<R: ElementReader>(open: &mut OpenElement, name: &str, reader: &R) -> Result<()> {
        match (open.kind, name) {
            (_, "tag") => {
                let (Some(key), Some(value)) = (reader.attribute("k"), reader.attribute("v")) else {
                    debug!(element = open.kind.as_str(), id = open.id; "Dropping tag without k or v");
                    return Ok(());
                };
                if key == CREATED_BY {
                    return Ok(());
                }
                if open.kind == ElementKind::Relation {
                    if let Some(relation_type) = RelationType::from_tag_value(value) {
                        open.relation_type = Some(relation_type);
                    }
                }
                open.tags.insert(key.to_string(), value.to_string());
            }
            (ElementKind::Way, "nd") => {
                let node = Self::parse_ref(open, reader)?;
                open.children.push(node);
            }
            (ElementKind::Relation, "member") => {
                if reader.attribute("type") != Some("way") {
                    return Ok(());
                }
                let way = Self::parse_ref(open, reader)?;
                open.children.push(way);
                if reader.attribute("role") == Some("outer") {
                    open.outer_members.push(way);
                }
            }
            _ => (),
        }
        Ok(())
    }

    fn commit(&mut self, open: OpenElement) {
        match open.kind {
            ElementKind::Node => {
                if let (Some(coordinate), false) = (open.coordinate, open.tags.is_empty()) {
                    self.graph.insert_node(Node {
                        id: open.id,
                        coordinate,
                        tags: open.tags,
                    });
                }
            }
            ElementKind::Way => self.graph.insert_way(Way {
                id: open.id,
                tags: open.tags,
                nodes: open.children,
            }),
            ElementKind::Relation => {
                let Some(relation_type) = open.relation_type else {
                    debug!(id = open.id; "Dropping relation without a recognized type");
                    return;
                };
                let outer_ways = if relation_type == RelationType::Multipolygon {
                    open.outer_members
                } else {
                    Vec::new()
                };
                self.graph.insert_relation(
                    relation_type,
                    Relation {
                        id: open.id,
                        tags: open.tags,
                        ways: open.children,
                        outer_ways,
                    },
                );
            }
        }
    }
}

/// Builds the graph of any element stream.
pub fn parse<R: ElementReader>(reader: &mut R) -> Result<OsmGraph> {
    GraphBuilder::new().build(reader)
}

pub fn parse_reader<B: BufRead>(source: B) -> Result<OsmGraph> {
    parse(&mut XmlElementReader::new(source))
}

pub fn parse_str(xml: &str) -> Result<OsmGraph> {
    parse_reader(xml.as_bytes())
}

/// Parses an .osm or .osm.xz file.
pub fn parse_file(path: &Path) -> Result<OsmGraph> {
    let mut reader = open_document(path)?;
    parse(&mut reader)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use rstest::{fixture, rstest};

    use super::*;

    /// Element stream assembled by hand, without any XML.
    #[derive(Default)]
    struct ScriptedReader {
        events: VecDeque<(ReadEvent, Vec<(String, String)>)>,
        attributes: Vec<(String, String)>,
        consumed: usize,
    }

    impl ScriptedReader {
        fn start(mut self, name: &str, attributes: &[(&str, &str)]) -> Self {
            let attributes = attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            self.events.push_back((ReadEvent::Start(name.to_string()), attributes));
            self
        }

        fn end(mut self, name: &str) -> Self {
            self.events.push_back((ReadEvent::End(name.to_string()), Vec::new()));
            self
        }

        fn leaf(self, name: &str, attributes: &[(&str, &str)]) -> Self {
            self.start(name, attributes).end(name)
        }

        fn tag(self, k: &str, v: &str) -> Self {
            self.leaf("tag", &[("k", k), ("v", v)])
        }

        fn member(self, kind: &str, reference: &str, role: &str) -> Self {
            self.leaf("member", &[("type", kind), ("ref", reference), ("role", role)])
        }
    }

    impl ElementReader for ScriptedReader {
        fn advance(&mut self) -> Result<ReadEvent> {
            let Some((event, attributes)) = self.events.pop_front() else {
                return Ok(ReadEvent::Eof);
            };
            self.consumed += 1;
            if matches!(event, ReadEvent::Start(_)) {
                self.attributes = attributes;
            }
            Ok(event)
        }

        fn attribute(&self, name: &str) -> Option<&str> {
            self.attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        }

        fn position(&self) -> usize {
            self.consumed
        }
    }

    #[fixture]
    fn root() -> ScriptedReader {
        ScriptedReader::default().start("osm", &[("version", "0.6")])
    }

    fn build(reader: ScriptedReader) -> Result<OsmGraph> {
        parse(&mut reader.end("osm"))
    }

    #[rstest]
    fn untagged_node_only_has_a_coordinate(root: ScriptedReader) {
        let graph = build(root.leaf("node", &[("id", "7"), ("lat", "45.0"), ("lon", "7.0")])).unwrap();

        assert_eq!(graph.coordinate_of(7), Some((7.0, 45.0)));
        assert_eq!(graph.tagged_nodes().count(), 0);
    }

    #[rstest]
    fn tagged_node_is_kept_without_created_by(root: ScriptedReader) {
        let reader = root
            .start("node", &[("id", "3"), ("lat", "51.5"), ("lon", "-0.12")])
            .tag("created_by", "JOSM")
            .tag("amenity", "pub")
            .end("node");

        let graph = build(reader).unwrap();

        let node = graph.tagged_node(3).unwrap();
        assert_eq!(node.coordinate, Coordinate { lon: -0.12, lat: 51.5 });
        assert_eq!(node.tags.len(), 1);
        assert_eq!(node.tags.get("amenity").map(String::as_str), Some("pub"));
    }

    #[rstest]
    fn node_tagged_only_with_created_by_is_untagged(root: ScriptedReader) {
        let reader = root
            .start("node", &[("id", "3"), ("lat", "1"), ("lon", "2")])
            .tag("created_by", "JOSM")
            .end("node");

        let graph = build(reader).unwrap();

        assert!(graph.tagged_node(3).is_none());
        assert_eq!(graph.coordinate_of(3), Some((2.0, 1.0)));
    }

    #[rstest]
    fn way_keeps_reference_order(root: ScriptedReader) {
        let reader = root
            .start("way", &[("id", "1")])
            .leaf("nd", &[("ref", "11")])
            .tag("highway", "residential")
            .leaf("nd", &[("ref", "10")])
            .leaf("nd", &[("ref", "12")])
            .end("way");

        let graph = build(reader).unwrap();

        let way = graph.way(1).unwrap();
        assert_eq!(way.nodes, vec![11, 10, 12]);
        assert_eq!(way.tags.get("highway").map(String::as_str), Some("residential"));
        assert_eq!(graph.coordinate_of(10), None);
    }

    #[rstest]
    fn multipolygon_keeps_way_members_and_outers(root: ScriptedReader) {
        // The type tag arrives after the members it classifies.
        let reader = root
            .start("relation", &[("id", "20")])
            .member("way", "5", "outer")
            .member("node", "6", "outer")
            .member("way", "8", "inner")
            .member("way", "9", "outer")
            .tag("name", "Lake")
            .tag("type", "multipolygon")
            .end("relation");

        let graph = build(reader).unwrap();

        let relation = graph.relation(RelationType::Multipolygon, 20).unwrap();
        assert_eq!(relation.ways, vec![5, 8, 9]);
        assert_eq!(relation.outer_ways, vec![5, 9]);
        assert_eq!(relation.tags.len(), 2);
    }

    #[rstest]
    #[case(RelationType::Boundary, "boundary")]
    #[case(RelationType::Route, "route")]
    fn other_relation_types_have_no_outers(
        root: ScriptedReader,
        #[case] kind: RelationType,
        #[case] value: &str,
    ) {
        let reader = root
            .start("relation", &[("id", "30")])
            .member("way", "1", "outer")
            .tag("type", value)
            .end("relation");

        let graph = build(reader).unwrap();

        let relation = graph.relation(kind, 30).unwrap();
        assert_eq!(relation.ways, vec![1]);
        assert!(relation.outer_ways.is_empty());
    }

    #[rstest]
    fn last_recognized_type_wins(root: ScriptedReader) {
        let reader = root
            .start("relation", &[("id", "4")])
            .tag("type", "route")
            .tag("route", "bus")
            .tag("alt_type", "boundary")
            .end("relation");

        let graph = build(reader).unwrap();

        assert!(graph.relation(RelationType::Boundary, 4).is_some());
        assert!(graph.relation(RelationType::Route, 4).is_none());
    }

    #[rstest]
    fn unclassified_relation_is_dropped(root: ScriptedReader) {
        let reader = root
            .start("relation", &[("id", "4")])
            .member("way", "1", "")
            .tag("type", "site")
            .end("relation");

        let graph = build(reader).unwrap();

        assert_eq!(graph.summary().relations(), 0);
    }

    #[rstest]
    fn member_role_is_optional(root: ScriptedReader) {
        let reader = root
            .start("relation", &[("id", "4")])
            .leaf("member", &[("type", "way"), ("ref", "2")])
            .tag("type", "multipolygon")
            .end("relation");

        let graph = build(reader).unwrap();

        let relation = graph.relation(RelationType::Multipolygon, 4).unwrap();
        assert_eq!(relation.ways, vec![2]);
        assert!(relation.outer_ways.is_empty());
    }

    #[rstest]
    fn non_way_member_needs_no_ref(root: ScriptedReader) {
        let reader = root
            .start("relation", &[("id", "4")])
            .leaf("member", &[("type", "relation")])
            .tag("type", "route")
            .end("relation");

        assert!(build(reader).is_ok());
    }

    #[rstest]
    fn unknown_elements_are_ignored(root: ScriptedReader) {
        let reader = root
            .leaf("bounds", &[("minlat", "0")])
            .start("way", &[("id", "2")])
            .start("extension", &[])
            .leaf("nd", &[("ref", "99")])
            .tag("ignored", "yes")
            .end("extension")
            .leaf("nd", &[("ref", "1")])
            .end("way");

        let graph = build(reader).unwrap();

        let way = graph.way(2).unwrap();
        assert_eq!(way.nodes, vec![1]);
        assert!(way.tags.is_empty());
    }

    #[rstest]
    fn nd_outside_a_way_is_ignored(root: ScriptedReader) {
        let reader = root
            .start("relation", &[("id", "4")])
            .leaf("nd", &[("ref", "1")])
            .tag("type", "route")
            .end("relation");

        let graph = build(reader).unwrap();

        assert!(graph.relation(RelationType::Route, 4).unwrap().ways.is_empty());
    }

    #[rstest]
    fn tag_without_value_is_dropped(root: ScriptedReader) {
        let reader = root
            .start("way", &[("id", "2")])
            .leaf("tag", &[("k", "name")])
            .end("way");

        let graph = build(reader).unwrap();

        assert!(graph.way(2).unwrap().tags.is_empty());
    }

    #[test]
    fn document_without_root_gives_empty_graph() {
        let mut reader = ScriptedReader::default()
            .start("gpx", &[])
            .leaf("way", &[("id", "1")])
            .end("gpx");

        let graph = parse(&mut reader).unwrap();

        assert!(graph.is_empty());
    }

    #[rstest]
    fn elements_after_the_root_are_ignored(root: ScriptedReader) {
        let mut reader = root.end("osm").leaf("way", &[("id", "1")]);

        let graph = parse(&mut reader).unwrap();

        assert!(graph.is_empty());
    }

    #[rstest]
    #[case::way("way")]
    #[case::relation("relation")]
    fn missing_identifier_is_fatal(root: ScriptedReader, #[case] name: &str) {
        let err = build(root.leaf(name, &[("version", "1")])).unwrap_err();

        let expected = ElementKind::from_name(name).unwrap();
        assert!(
            matches!(err, Error::MissingIdentifier { element, .. } if element == expected),
            "unexpected error: {err:?}"
        );
    }

    #[rstest]
    fn non_numeric_identifier_is_fatal(root: ScriptedReader) {
        let err = build(root.leaf("node", &[("id", "n1"), ("lat", "1"), ("lon", "1")])).unwrap_err();

        assert!(matches!(err, Error::MissingIdentifier { element: ElementKind::Node, .. }));
    }

    #[rstest]
    #[case::missing_lat(&[("id", "1"), ("lon", "1")], "lat")]
    #[case::missing_lon(&[("id", "1"), ("lat", "1")], "lon")]
    #[case::non_numeric(&[("id", "1"), ("lat", "north"), ("lon", "1")], "lat")]
    #[case::not_finite(&[("id", "1"), ("lat", "1"), ("lon", "NaN")], "lon")]
    fn bad_coordinate_is_fatal(
        root: ScriptedReader,
        #[case] attributes: &[(&str, &str)],
        #[case] expected: &str,
    ) {
        let err = build(root.leaf("node", attributes)).unwrap_err();

        assert!(
            matches!(err, Error::MissingCoordinate { node: 1, attribute, .. } if attribute == expected),
            "unexpected error: {err:?}"
        );
    }

    #[rstest]
    fn way_reference_must_be_numeric(root: ScriptedReader) {
        let reader = root
            .start("way", &[("id", "2")])
            .leaf("nd", &[("ref", "x")])
            .end("way");

        let err = build(reader).unwrap_err();

        assert!(matches!(
            err,
            Error::InvalidReference { element: ElementKind::Way, id: 2, .. }
        ));
    }

    #[rstest]
    fn node_coordinate_is_committed_on_open(root: ScriptedReader) {
        let mut reader = root.start("node", &[("id", "5"), ("lat", "1"), ("lon", "2")]).tag("name", "x");

        let graph = parse(&mut reader).unwrap();

        assert_eq!(graph.coordinate_of(5), Some((2.0, 1.0)));
        assert!(graph.tagged_node(5).is_none());
    }

    #[rstest]
    fn unclosed_element_is_never_committed(root: ScriptedReader) {
        let mut reader = root.start("way", &[("id", "2")]).leaf("nd", &[("ref", "1")]);

        let graph = parse(&mut reader).unwrap();

        assert!(graph.way(2).is_none());
    }
}
