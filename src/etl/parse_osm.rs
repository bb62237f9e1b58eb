use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use log::info;
use rkyv::AlignedVec;

use crate::builder::parse;
use crate::config::UserConfig;
use crate::data::OsmGraph;
use crate::errors::{Error, Result};
use crate::etl::Etl;
use crate::reader::{open_document, XmlElementReader};

pub const ETL_NAME: &str = "parse_osm";
pub const OUTPUT_FILE_NAME: &str = "osm_graph.rkyv";

/// Parses the configured OSM extract and caches the graph as an rkyv archive.
pub struct ParseOsmEtl<'a> {
    config: &'a UserConfig,
}

impl ParseOsmEtl<'_> {
    pub fn new(config: &UserConfig) -> ParseOsmEtl {
        ParseOsmEtl { config }
    }

    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }
}

impl Etl for ParseOsmEtl<'_> {
    type Input = XmlElementReader<Box<dyn BufRead>>;
    type Output = OsmGraph;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(Self::output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        if self.is_cached(dir)? {
            fs::remove_file(Self::output_path(dir))?;
        }
        Ok(())
    }

    fn extract(&mut self, _dir: &Path) -> Result<Self::Input> {
        open_document(&self.config.data_path)
    }

    fn transform(&mut self, mut input: Self::Input) -> Result<Self::Output> {
        parse(&mut input)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        write_graph_cache(dir, &output)
    }
}

pub fn write_graph_cache(dir: &Path, graph: &OsmGraph) -> Result<()> {
    let bytes = rkyv::to_bytes::<_, 256>(graph).map_err(|err| Error::Cache(format!("{err:?}")))?;
    let mut output_file = fs::File::create(ParseOsmEtl::output_path(dir))?;
    output_file.write_all(&bytes)?;
    info!(bytes = bytes.len(); "Wrote graph cache");
    Ok(())
}

/// Reads back a graph written by [`write_graph_cache`]. The archive is
/// validated before it is deserialized.
pub fn load_graph_cache(dir: &Path) -> Result<OsmGraph> {
    let raw = fs::read(ParseOsmEtl::output_path(dir))?;
    let mut bytes = AlignedVec::with_capacity(raw.len());
    bytes.extend_from_slice(&raw);
    rkyv::from_bytes::<OsmGraph>(&bytes).map_err(|err| Error::Cache(format!("{err:?}")))
}
