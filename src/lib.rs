//! Reads OpenStreetMap XML extracts into an immutable graph of nodes, ways
//! and typed relations.
//!
//! ```no_run
//! use osm_graph::{parse_file, RelationType};
//!
//! let graph = parse_file("turin.osm".as_ref())?;
//! for way in graph.ways() {
//!     let path = graph.resolve_path(&way.nodes);
//!     println!("way {} has {} resolvable points", way.id, path.len());
//! }
//! let lakes = graph.relations_of_type(RelationType::Multipolygon).count();
//! # Ok::<(), osm_graph::Error>(())
//! ```

pub mod builder;
pub mod config;
pub mod data;
pub mod errors;
pub mod etl;
pub mod reader;

pub use builder::{parse, parse_file, parse_reader, parse_str, GraphBuilder};
pub use data::osm::{Coordinate, ElementKind, Node, OsmId, Relation, RelationType, Tags, Way};
pub use data::{GraphSummary, OsmGraph};
pub use errors::{Error, Result};
pub use reader::{ElementReader, ReadEvent, XmlElementReader};
