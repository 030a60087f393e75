use simple_pathfinding::algorithm::PathFinder;
use simple_pathfinding::common::FoundPath;
use simple_pathfinding::config::{Cli, Config};
use simple_pathfinding::map::{Map, PathGrid};
use simple_pathfinding::query::{AgentParams, SearchQuery, TraverseMode, TraverseParms};
use simple_pathfinding::scenario::{Route, Scenario};
use simple_pathfinding::stat::Stats;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct QueryResult<'a> {
    route: &'a Route,
    path: Option<FoundPath>,
}

#[derive(Serialize)]
struct Report<'a> {
    map: &'a str,
    results: Vec<QueryResult<'a>>,
    stats: &'a Stats,
}

fn sample_routes(config: &Config) -> anyhow::Result<Vec<Route>> {
    let scenario = Scenario::load_from_scen(&config.scen_path)?;
    let mut rng = StdRng::seed_from_u64(config.seed as u64);
    if config.buckets.is_empty() {
        scenario.routes_randomly(config.num_queries, &mut rng)
    } else {
        scenario.routes_by_buckets(&config.buckets, &mut rng)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let config = Config::new(&cli)?;
    config.validate()?;

    let map = Map::from_file(&config.map_path)?;
    let routes = match &config.routes_yaml {
        Some(path) if Path::new(path).exists() => {
            info!("Loading routes from {path}");
            Scenario::load_routes_from_yaml(path)?
        }
        routes_yaml => {
            let routes = sample_routes(&config)?;
            if let Some(path) = routes_yaml {
                Scenario::write_routes_to_yaml(path, &routes)?;
                info!("Routes written to {path}");
            }
            routes
        }
    };

    let mut finder = PathFinder::new(config.search.clone());
    let mut results = Vec::with_capacity(routes.len());
    for route in &routes {
        let agent = (config.traverse_mode == TraverseMode::ByAgent).then(|| {
            let mut agent = AgentParams::new(0, map.id());
            agent.ticks_cardinal = config.search.default_ticks_cardinal;
            agent.ticks_diagonal = config.search.default_ticks_diagonal;
            agent.drafted = config.drafted;
            agent
        });
        let query = SearchQuery::new(route.start(), route.goal())
            .with_end_mode(config.end_mode)
            .with_parms(TraverseParms {
                mode: config.traverse_mode,
                can_bash: false,
                agent,
            });

        let mut path = None;
        for _ in 0..config.repeat {
            path = finder.find_path(&map, &query);
        }
        match &path {
            Some(path) => info!(
                "route {:?} -> {:?}: cost {} over {} cells",
                route.start(),
                route.goal(),
                path.cost,
                path.len()
            ),
            None => warn!("route {:?} -> {:?}: no path", route.start(), route.goal()),
        }
        results.push(QueryResult { route, path });
    }

    finder.stats().print();

    if let Some(parent) = Path::new(&config.output_path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let file = File::create(&config.output_path)
        .with_context(|| format!("cannot create output file {}", config.output_path))?;
    serde_json::to_writer_pretty(
        BufWriter::new(file),
        &Report {
            map: &config.map_path,
            results,
            stats: finder.stats(),
        },
    )?;
    info!("Results written to {}", config.output_path);

    Ok(())
}
