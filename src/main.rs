use std::env;
use std::io;
use std::path::PathBuf;

use log::info;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use osm_graph::config::UserConfig;
use osm_graph::errors::Result;
use osm_graph::etl::parse_osm::{load_graph_cache, ParseOsmEtl};
use osm_graph::etl::Etl;

const DEFAULT_CONFIG_PATH: &str = "config.json";

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn main() -> Result<()> {
    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let user_config = UserConfig::load(&config_path)?;
    setup_logging(&user_config.log_level);

    let output_dir = user_config.create_output_dir()?;
    let mut etl = ParseOsmEtl::new(&user_config);
    if user_config.rebuild_cache {
        etl.clean(&output_dir)?;
    }
    etl.process(&output_dir)?;

    let graph = load_graph_cache(&output_dir)?;
    let summary = graph.summary();
    info!(
        coordinates = summary.coordinates,
        tagged_nodes = summary.tagged_nodes,
        ways = summary.ways,
        relations = summary.relations();
        "Read OSM graph from cache"
    );

    Ok(())
}
