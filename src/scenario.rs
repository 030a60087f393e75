use anyhow::{anyhow, bail, Context, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use tracing::info;

use crate::common::Cell;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Route {
    pub start_x: usize,
    pub start_y: usize,
    pub goal_x: usize,
    pub goal_y: usize,
}

impl Route {
    pub fn start(&self) -> Cell {
        (self.start_x, self.start_y)
    }

    pub fn goal(&self) -> Cell {
        (self.goal_x, self.goal_y)
    }
}

type Bucket = Vec<Route>;

/// Routes of a MovingAI `.scen` file, grouped by bucket.
#[derive(Debug)]
pub struct Scenario {
    pub map: String,
    pub map_width: usize,
    pub map_height: usize,
    pub buckets: BTreeMap<usize, Bucket>,
}

impl Scenario {
    pub fn load_from_scen(path: &str) -> Result<Scenario> {
        let file = File::open(path).with_context(|| format!("cannot open scenario {path}"))?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        // First line is "version x.x" which we can skip
        lines
            .next()
            .ok_or_else(|| anyhow!("scenario {path} is empty"))??;

        let mut scenario = Scenario {
            map: String::new(),
            map_width: 0,
            map_height: 0,
            buckets: BTreeMap::new(),
        };

        for (number, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            scenario
                .parse_line(&line)
                .with_context(|| format!("{path}:{}", number + 2))?;
        }

        Ok(scenario)
    }

    fn parse_line(&mut self, line: &str) -> Result<()> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 8 {
            bail!("expected at least 8 fields, found {}", parts.len());
        }
        let field = |index: usize| -> Result<usize> {
            parts[index]
                .parse()
                .with_context(|| format!("bad field `{}`", parts[index]))
        };

        let bucket_index = field(0)?;
        let route = Route {
            start_x: field(4)?,
            start_y: field(5)?,
            goal_x: field(6)?,
            goal_y: field(7)?,
        };

        if self.map.is_empty() {
            // Initialize map details from the first route entry
            self.map = parts[1].to_string();
            self.map_width = field(2)?;
            self.map_height = field(3)?;
        }

        self.buckets.entry(bucket_index).or_default().push(route);
        Ok(())
    }

    pub fn route_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Draws one unused route from each listed bucket.
    pub fn routes_by_buckets<R: Rng + ?Sized>(
        &self,
        buckets: &[usize],
        rng: &mut R,
    ) -> Result<Vec<Route>> {
        let mut routes = Vec::new();
        let mut used_routes: HashMap<usize, HashSet<usize>> = HashMap::new();

        for &bucket_index in buckets {
            let bucket = self
                .buckets
                .get(&bucket_index)
                .ok_or_else(|| anyhow!("Bucket {bucket_index} not found"))?;

            let available_routes: Vec<usize> = (0..bucket.len())
                .filter(|idx| {
                    used_routes
                        .get(&bucket_index)
                        .map_or(true, |used| !used.contains(idx))
                })
                .collect();

            let route_index = available_routes
                .choose(rng)
                .ok_or_else(|| anyhow!("No available routes left in bucket {bucket_index}"))?;

            routes.push(bucket[*route_index].clone());
            used_routes
                .entry(bucket_index)
                .or_default()
                .insert(*route_index);
        }

        info!("Generate routes: {routes:?}");
        Ok(routes)
    }

    /// Draws `count` distinct routes from all buckets.
    pub fn routes_randomly<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Result<Vec<Route>> {
        let mut available_routes: Vec<Route> = self.buckets.values().flatten().cloned().collect();
        available_routes.sort();
        available_routes.dedup();

        if available_routes.len() < count {
            bail!(
                "Not enough unique routes, wanted {count} but only {} exist",
                available_routes.len()
            );
        }

        available_routes.shuffle(rng);
        available_routes.truncate(count);

        info!("Generate routes: {available_routes:?}");
        Ok(available_routes)
    }

    pub fn load_routes_from_yaml(path: &str) -> Result<Vec<Route>> {
        let file = File::open(path).with_context(|| format!("cannot open routes {path}"))?;
        let reader = BufReader::new(file);
        let routes = serde_yaml::from_reader(reader)?;
        Ok(routes)
    }

    pub fn write_routes_to_yaml(path: &str, routes: &[Route]) -> Result<()> {
        let file = File::create(path).with_context(|| format!("cannot create routes {path}"))?;
        let mut writer = io::BufWriter::new(file);
        let yaml_data = serde_yaml::to_string(&routes)?;
        writer.write_all(yaml_data.as_bytes())?;

        Ok(())
    }
}
