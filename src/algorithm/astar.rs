use super::construct_path;
use super::cost::{CellCost, CostModel};
use super::matcher::DestinationMatcher;
use crate::common::{
    decode, encode, Cell, FoundPath, Node, NodeTileStore, PriorityQueue, MAX_COORD,
};
use crate::config::SearchConfig;
use crate::map::PathGrid;
use crate::query::{Destination, SearchQuery};
use crate::stat::Stats;

use anyhow::bail;
use std::time::Instant;
use tracing::{debug, instrument, trace};

const CARDINALS: [(isize, isize); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

// Each diagonal with the two cardinals it passes between.
const DIAGONALS: [((isize, isize), usize, usize); 4] = [
    ((1, -1), 0, 1),
    ((1, 1), 1, 2),
    ((-1, 1), 2, 3),
    ((-1, -1), 3, 0),
];

/// Everything one search needs to know about its query.
pub(crate) struct SearchContext<'q, M> {
    width: usize,
    height: usize,
    start: Cell,
    matcher: DestinationMatcher,
    costs: CostModel<'q, M>,
}

impl<'q, M: PathGrid> SearchContext<'q, M> {
    pub(crate) fn new(
        map: &'q M,
        query: &'q SearchQuery<'q>,
        config: &'q SearchConfig,
    ) -> anyhow::Result<Self> {
        let (width, height) = map.size();
        if width > MAX_COORD + 1 || height > MAX_COORD + 1 {
            bail!("map of {width}x{height} cells is too large");
        }

        let in_bounds = |(x, y): Cell| x < width && y < height;
        if !in_bounds(query.start) {
            bail!("start {:?} is out of bounds", query.start);
        }
        let goal = query.destination.cell();
        if !in_bounds(goal) {
            bail!("destination {goal:?} is out of bounds");
        }
        if let Destination::Thing { map: thing_map, .. } = query.destination {
            if thing_map != map.id() {
                bail!("destination is on map {thing_map:?}, not {:?}", map.id());
            }
        }
        if let Some(agent) = &query.parms.agent {
            match agent.map {
                None => bail!("agent {} is not spawned", agent.id),
                Some(agent_map) if agent_map != map.id() => {
                    bail!("agent {} is on map {agent_map:?}", agent.id)
                }
                Some(_) => {}
            }
            if agent.ticks_cardinal == 0 || agent.ticks_diagonal == 0 {
                bail!("agent {} has a zero move cost", agent.id);
            }
        }

        let matcher = DestinationMatcher::new(map, &query.destination, query.end_mode);
        let costs = CostModel::new(map, &query.parms, config, goal, matcher.rect());
        Ok(SearchContext {
            width,
            height,
            start: query.start,
            matcher,
            costs,
        })
    }
}

/// Grid A* path finder owning the pooled search memory.
///
/// Node tiles and queue nodes are reused by every search run through the same
/// finder; all of them are back in the pools when `find_path` returns.
#[derive(Default)]
pub struct PathFinder {
    config: SearchConfig,
    tiles: NodeTileStore,
    open: PriorityQueue,
    stats: Stats,
}

impl PathFinder {
    pub fn new(config: SearchConfig) -> Self {
        PathFinder {
            config,
            ..PathFinder::default()
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = Stats::default();
    }

    pub fn tiles_in_use(&self) -> usize {
        self.tiles.tiles_in_use()
    }

    pub fn allocated_tiles(&self) -> usize {
        self.tiles.allocated_tiles()
    }

    pub fn queue_nodes_in_use(&self) -> usize {
        self.open.live_nodes()
    }

    pub fn allocated_queue_nodes(&self) -> usize {
        self.open.allocated_nodes()
    }

    /// Finds a cheapest path for `query`, or `None` when the query is invalid
    /// or no route exists.
    #[instrument(skip_all, name = "find_path", fields(start = ?query.start, destination = ?query.destination.cell()), level = "debug")]
    pub fn find_path<M: PathGrid>(&mut self, map: &M, query: &SearchQuery) -> Option<FoundPath> {
        let timer = Instant::now();
        self.stats.queries += 1;

        let result = self.search(map, query);

        self.open.clear();
        self.tiles.release_all();
        self.stats.time_us += timer.elapsed().as_micros() as usize;
        result
    }

    fn search<M: PathGrid>(&mut self, map: &M, query: &SearchQuery) -> Option<FoundPath> {
        let PathFinder {
            config,
            tiles,
            open,
            stats,
        } = self;

        let ctx = match SearchContext::new(map, query, config) {
            Ok(ctx) => ctx,
            Err(err) => {
                debug!("rejected query: {err:#}");
                stats.rejected += 1;
                return None;
            }
        };

        if ctx.matcher.matches(ctx.start) {
            stats.found += 1;
            return Some(FoundPath {
                cells: vec![ctx.start],
                cost: 0,
            });
        }

        if !map.can_reach(query.start, &query.destination, query.end_mode, &query.parms) {
            debug!("destination is unreachable");
            stats.not_found += 1;
            return None;
        }

        tiles.prepare(ctx.width, ctx.height);
        Search {
            ctx: &ctx,
            tiles,
            open,
            stats,
        }
        .run()
    }
}

struct Search<'s, 'q, M> {
    ctx: &'s SearchContext<'q, M>,
    tiles: &'s mut NodeTileStore,
    open: &'s mut PriorityQueue,
    stats: &'s mut Stats,
}

impl<'s, 'q, M: PathGrid> Search<'s, 'q, M> {
    fn run(mut self) -> Option<FoundPath> {
        let start = self.ctx.start;
        let h = self.ctx.costs.distance_to_goal(start);
        let node = self.tiles.get(start);
        node.g = 0;
        node.h = h;
        node.parent = None;
        node.handle = Some(self.open.push(h, encode(start)));

        while let Some((f, code)) = self.open.pop() {
            let cell = decode(code);
            let node = self.tiles.get(cell);
            node.handle = None;
            if node.closed {
                continue;
            }
            node.closed = true;
            let g = node.g;
            self.stats.expanded_nodes += 1;
            trace!("expand {cell:?} f {f} g {g}");

            if self.ctx.matcher.matches(cell) {
                self.stats.found += 1;
                return Some(FoundPath {
                    cells: construct_path(self.tiles, cell),
                    cost: g,
                });
            }

            self.expand(cell, g);
        }

        debug!("cannot find path");
        self.stats.not_found += 1;
        None
    }

    fn expand(&mut self, cell: Cell, g: u32) {
        let straight = self.tiles.get(cell).parent.map_or(true, |parent| {
            let parent = decode(parent);
            parent.0 == cell.0 || parent.1 == cell.1
        });

        // Cardinals are evaluated first since they gate the diagonals.
        let mut cardinals = [None; 4];
        let mut open_sides = [false; 4];
        for (i, &offset) in CARDINALS.iter().enumerate() {
            let Some(next) = self.neighbor(cell, offset) else {
                continue;
            };
            let node = self.visit(next, cell);
            open_sides[i] = !node.blocks_corner();
            if !node.is_impassable() {
                cardinals[i] = Some(next);
            }
        }

        let mut diagonals = [None; 4];
        for (i, &(offset, a, b)) in DIAGONALS.iter().enumerate() {
            if !(open_sides[a] && open_sides[b]) {
                continue;
            }
            let Some(next) = self.neighbor(cell, offset) else {
                continue;
            };
            if !self.visit(next, cell).is_impassable() {
                diagonals[i] = Some(next);
            }
        }

        let cardinal = self.ctx.costs.ticks_cardinal;
        let diagonal = self.ctx.costs.ticks_diagonal;
        if straight {
            self.relax_all(cell, g, &cardinals, cardinal);
            self.relax_all(cell, g, &diagonals, diagonal);
        } else {
            self.relax_all(cell, g, &diagonals, diagonal);
            self.relax_all(cell, g, &cardinals, cardinal);
        }
    }

    fn neighbor(&self, cell: Cell, (dx, dy): (isize, isize)) -> Option<Cell> {
        let x = cell.0.checked_add_signed(dx)?;
        let y = cell.1.checked_add_signed(dy)?;
        (x < self.ctx.width && y < self.ctx.height).then_some((x, y))
    }

    // Evaluates `cell` once per search and returns its cached state.
    fn visit(&mut self, cell: Cell, from: Cell) -> Node {
        let node = self.tiles.get(cell);
        if !node.is_evaluated() {
            match self.ctx.costs.evaluate(cell, from) {
                CellCost::Impassable => node.set_impassable(),
                CellCost::DeadEndDoor => {
                    trace!("prune dead-end door {cell:?}");
                    self.stats.pruned_doors += 1;
                    node.set_impassable();
                }
                CellCost::Passable { cost, door } => {
                    node.set_cost(cost, door);
                    node.h = self.ctx.costs.distance_to_goal(cell);
                }
            }
        }
        *node
    }

    fn relax_all(&mut self, from: Cell, g: u32, cells: &[Option<Cell>; 4], step: u32) {
        for &cell in cells.iter().flatten() {
            self.relax(from, g, cell, step);
        }
    }

    fn relax(&mut self, from: Cell, g: u32, cell: Cell, step: u32) {
        let node = self.tiles.get(cell);
        let Some(cost) = node.terrain_cost() else {
            return;
        };
        let candidate = g.saturating_add(step).saturating_add(cost);

        match node.handle {
            None => {
                if node.closed {
                    if candidate >= node.g {
                        return;
                    }
                    node.closed = false;
                    self.stats.reopened_nodes += 1;
                } else {
                    self.stats.opened_nodes += 1;
                }
                node.g = candidate;
                node.parent = Some(encode(from));
                node.handle = Some(self.open.push(candidate.saturating_add(node.h), encode(cell)));
            }
            Some(handle) if candidate < node.g => {
                node.g = candidate;
                node.parent = Some(encode(from));
                node.handle = Some(self.open.decrease_key(
                    handle,
                    candidate.saturating_add(node.h),
                    encode(cell),
                ));
                self.stats.decreased_keys += 1;
            }
            Some(_) => {}
        }
    }
}
