use anyhow::{anyhow, Context};
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::query::{PathEndMode, TraverseMode};

#[derive(Parser, Debug)]
#[command(
    name = "Simple Pathfinding",
    about = "Grid A* path finder with dynamic cell costs.",
    version = "1.0"
)]
pub struct Cli {
    #[arg(
        long,
        help = "Path to the map file",
        default_value = "map_file/test/rooms.map"
    )]
    pub map_path: String,

    #[arg(
        long,
        help = "Path to the scenario file",
        default_value = "map_file/test/rooms.scen"
    )]
    pub scen_path: String,

    #[arg(long, help = "Path to a YAML file with search settings")]
    pub config: Option<String>,

    #[arg(
        long,
        help = "Path to the output file",
        default_value = "result/result.json"
    )]
    pub output_path: String,

    #[arg(
        long,
        help = "Load routes from this YAML file if it exists, otherwise write the sampled routes to it"
    )]
    pub routes_yaml: Option<String>,

    #[arg(long, help = "Number of queries to run", default_value_t = 10)]
    pub num_queries: usize,

    #[arg(long, help = "Scenario buckets to draw queries from", use_value_delimiter = true)]
    pub buckets: Vec<usize>,

    #[arg(
        long,
        help = "Seed for the random number generator",
        default_value_t = 0
    )]
    pub seed: usize,

    #[arg(long, value_enum, help = "How the destination is reached", default_value_t = PathEndMode::OnCell)]
    pub end_mode: PathEndMode,

    #[arg(long, value_enum, help = "Traverse mode", default_value_t = TraverseMode::ByAgent)]
    pub traverse_mode: TraverseMode,

    #[arg(long, help = "Search as a drafted agent", default_value_t = false)]
    pub drafted: bool,

    #[arg(long, help = "Run every query this many times", default_value_t = 1)]
    pub repeat: usize,
}

/// Tunables of the dead-end door pruning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadEndDoorConfig {
    pub enabled: bool,
    /// Exact number of links a door region must have to be considered.
    pub door_links: usize,
    /// Rooms with more regions than this are never pruned.
    pub max_room_regions: usize,
}

impl Default for DeadEndDoorConfig {
    fn default() -> Self {
        DeadEndDoorConfig {
            enabled: true,
            door_links: 2,
            max_room_regions: 4,
        }
    }
}

/// Cost constants of the search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_ticks_cardinal: u32,
    pub default_ticks_diagonal: u32,
    pub destroyable_base_cost: u32,
    pub destroyable_hit_point_factor: f32,
    pub avoid_grid_weight: u32,
    pub outside_area_cost: u32,
    pub agent_collision_cost: u32,
    pub dead_end_door: DeadEndDoorConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            default_ticks_cardinal: 13,
            default_ticks_diagonal: 18,
            destroyable_base_cost: 70,
            destroyable_hit_point_factor: 0.2,
            avoid_grid_weight: 8,
            outside_area_cost: 600,
            agent_collision_cost: 175,
            dead_end_door: DeadEndDoorConfig::default(),
        }
    }
}

impl SearchConfig {
    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        let config: SearchConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.default_ticks_cardinal == 0 {
            return Err(anyhow!("Cardinal tick cost must be positive"));
        }
        if self.default_ticks_diagonal < self.default_ticks_cardinal {
            return Err(anyhow!(
                "Diagonal tick cost must not be below cardinal, got {} < {}",
                self.default_ticks_diagonal,
                self.default_ticks_cardinal
            ));
        }
        if self.destroyable_hit_point_factor < 0.0 {
            return Err(anyhow!(
                "Hit point factor must not be negative, got {}",
                self.destroyable_hit_point_factor
            ));
        }
        if self.dead_end_door.max_room_regions == 0 {
            return Err(anyhow!("Dead-end rooms must allow at least one region"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub map_path: String,
    pub scen_path: String,
    pub output_path: String,
    pub routes_yaml: Option<String>,
    pub num_queries: usize,
    pub buckets: Vec<usize>,
    pub seed: usize,
    pub end_mode: PathEndMode,
    pub traverse_mode: TraverseMode,
    pub drafted: bool,
    pub repeat: usize,
    pub search: SearchConfig,
}

impl Config {
    pub fn new(cli: &Cli) -> anyhow::Result<Self> {
        let search = match cli.config.as_ref() {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("cannot read config file {path}"))?;
                SearchConfig::from_yaml_str(&text)
                    .with_context(|| format!("error with config file: {path}"))?
            }
            None => SearchConfig::default(),
        };

        Ok(Self {
            map_path: cli.map_path.clone(),
            scen_path: cli.scen_path.clone(),
            output_path: cli.output_path.clone(),
            routes_yaml: cli.routes_yaml.clone(),
            num_queries: cli.num_queries,
            buckets: cli.buckets.clone(),
            seed: cli.seed,
            end_mode: cli.end_mode,
            traverse_mode: cli.traverse_mode,
            drafted: cli.drafted,
            repeat: cli.repeat,
            search,
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.buckets.is_empty() && self.buckets.len() != self.num_queries {
            return Err(anyhow!(
                "Number of buckets must match the number of queries, got {} and {}",
                self.buckets.len(),
                self.num_queries
            ));
        }
        if self.repeat == 0 {
            return Err(anyhow!("Repeat count must be at least 1"));
        }
        self.search.validate()
    }
}
