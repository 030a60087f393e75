use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::str::FromStr;

use crate::common::{Cell, Rect};
use crate::query::{AgentId, Destination, PathEndMode, TraverseMode, TraverseParms};
use crate::region::{RegionCell, RegionGrid, DEFAULT_REGION_SIZE};

/// Path costs at or above this value block movement.
pub const IMPASSABLE_COST: u32 = 10_000;

const DOOR_OPEN_TICKS: u32 = 45;
const DOOR_BASH_COST: u32 = 300;
const BLUEPRINT_COST: u32 = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MapId(pub u32);

/// Read-only view of the map consumed by the path finder.
pub trait PathGrid {
    fn id(&self) -> MapId;

    /// `(width, height)` in cells.
    fn size(&self) -> (usize, usize);

    /// Base movement cost; `IMPASSABLE_COST` or more blocks movement.
    fn path_cost(&self, cell: Cell) -> u32;

    fn is_water(&self, cell: Cell) -> bool;

    /// Terrain surcharge perceived by drafted or non-drafted agents.
    fn terrain_surcharge(&self, cell: Cell, drafted: bool) -> u32;

    fn building_at(&self, cell: Cell) -> Option<&Building>;

    /// Surcharge for moving through `building`, `None` when it cannot be
    /// passed under `parms`.
    fn building_cost(&self, building: &Building, parms: &TraverseParms) -> Option<u32>;

    fn blueprints_at(&self, cell: Cell) -> &[Blueprint];

    /// Surcharge for a blueprint, `None` when it blocks movement.
    fn blueprint_cost(&self, blueprint: &Blueprint, parms: &TraverseParms) -> Option<u32>;

    /// Whether an agent other than `agent` stands on `cell`.
    fn agent_blocking(&self, cell: Cell, agent: Option<AgentId>) -> bool;

    /// Region graph used to prune dead-end doors.
    fn regions(&self) -> Option<&RegionGrid> {
        None
    }

    /// Coarse reachability; must never reject a reachable destination.
    fn can_reach(
        &self,
        _start: Cell,
        _destination: &Destination,
        _end_mode: PathEndMode,
        _parms: &TraverseParms,
    ) -> bool {
        true
    }

    /// Whether the cell diagonal to `corner` may touch it, given the two
    /// cells flanking that diagonal.
    fn corner_touch_allowed(&self, _corner: Cell, _flank_a: Cell, _flank_b: Cell) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terrain {
    Soil,
    Mud,
    ShallowWater,
    DeepWater,
    Rock,
}

impl Terrain {
    pub fn path_cost(self) -> u32 {
        match self {
            Terrain::Soil => 0,
            Terrain::Mud => 10,
            Terrain::ShallowWater => 16,
            Terrain::DeepWater | Terrain::Rock => IMPASSABLE_COST,
        }
    }

    pub fn is_water(self) -> bool {
        matches!(self, Terrain::ShallowWater | Terrain::DeepWater)
    }

    pub fn extra_perceived_cost(self, drafted: bool) -> u32 {
        match (self, drafted) {
            (Terrain::ShallowWater, false) => 30,
            (Terrain::Mud, false) => 4,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingKind {
    Wall,
    Door { locked: bool },
    Furniture { path_cost: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub kind: BuildingKind,
    pub hit_points: u32,
    pub destroyable: bool,
}

impl Building {
    pub fn wall() -> Self {
        Building {
            kind: BuildingKind::Wall,
            hit_points: 300,
            destroyable: true,
        }
    }

    pub fn door(locked: bool) -> Self {
        Building {
            kind: BuildingKind::Door { locked },
            hit_points: 160,
            destroyable: true,
        }
    }

    pub fn is_door(&self) -> bool {
        matches!(self.kind, BuildingKind::Door { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blueprint {
    /// Blueprint of something that blocks movement once built.
    pub impassable: bool,
    /// Agent that placed it; other agents walk over it freely.
    pub owner: Option<AgentId>,
}

/// Grid map loaded from a MovingAI `.map` file, extended with terrain,
/// building and blueprint glyphs.
#[derive(Debug, Clone)]
pub struct Map {
    pub id: MapId,
    pub height: usize,
    pub width: usize,
    terrain: Vec<Terrain>,
    buildings: Vec<Option<Building>>,
    blueprints: Vec<Vec<Blueprint>>,
    agents: Vec<Option<AgentId>>,
    regions: RegionGrid,
    region_size: usize,
    components: Vec<Option<u32>>,
}

impl Map {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        let mut map = Map {
            id: MapId::default(),
            height,
            width,
            terrain: vec![Terrain::Soil; size],
            buildings: vec![None; size],
            blueprints: vec![Vec::new(); size],
            agents: vec![None; size],
            regions: RegionGrid::default(),
            region_size: DEFAULT_REGION_SIZE,
            components: Vec::new(),
        };
        map.refresh();
        map
    }

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("cannot open map file {path}"))?;
        let reader = BufReader::new(file);
        let lines = reader
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("cannot read map file {path}"))?;
        Self::parse(lines.iter().map(String::as_str)).with_context(|| format!("bad map file {path}"))
    }

    /// Builds a map straight from glyph rows, without the header.
    pub fn from_rows(rows: &[&str]) -> anyhow::Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.len());
        let mut map = Map::new(width, height);
        map.fill_rows(rows.iter().copied())?;
        map.refresh();
        Ok(map)
    }

    fn parse<'a>(mut lines: impl Iterator<Item = &'a str>) -> anyhow::Result<Self> {
        let _type = lines.next().ok_or_else(|| anyhow!("missing type line"))?;
        let height = Self::header_value(lines.next(), "height")?;
        let width = Self::header_value(lines.next(), "width")?;
        let _map = lines.next().ok_or_else(|| anyhow!("missing map line"))?;

        let mut map = Map::new(width, height);
        let rows: Vec<&str> = lines.take(height).collect();
        if rows.len() != height {
            bail!("expected {height} rows, found {}", rows.len());
        }
        map.fill_rows(rows.into_iter())?;
        map.refresh();
        Ok(map)
    }

    fn header_value(line: Option<&str>, name: &str) -> anyhow::Result<usize> {
        let line = line.ok_or_else(|| anyhow!("missing {name} line"))?;
        let mut parts = line.split_whitespace();
        if parts.next() != Some(name) {
            bail!("expected `{name} <n>`, found `{line}`");
        }
        parts
            .next()
            .ok_or_else(|| anyhow!("missing {name} value"))?
            .parse::<usize>()
            .with_context(|| format!("bad {name} value in `{line}`"))
    }

    fn fill_rows<'a>(&mut self, rows: impl Iterator<Item = &'a str>) -> anyhow::Result<()> {
        for (y, row) in rows.enumerate() {
            if row.len() < self.width {
                bail!("row {y} has {} cells, expected {}", row.len(), self.width);
            }
            for (x, glyph) in row.chars().take(self.width).enumerate() {
                let index = self.index((x, y));
                let (terrain, building, blueprint) = match glyph {
                    '.' | 'G' => (Terrain::Soil, None, None),
                    'S' => (Terrain::Mud, None, None),
                    'W' => (Terrain::ShallowWater, None, None),
                    '~' => (Terrain::DeepWater, None, None),
                    '@' | 'O' | 'T' => (Terrain::Rock, None, None),
                    '#' => (Terrain::Soil, Some(Building::wall()), None),
                    'D' => (Terrain::Soil, Some(Building::door(false)), None),
                    'L' => (Terrain::Soil, Some(Building::door(true)), None),
                    'B' => (
                        Terrain::Soil,
                        None,
                        Some(Blueprint {
                            impassable: true,
                            owner: None,
                        }),
                    ),
                    _ => bail!("unknown glyph `{glyph}` at ({x}, {y})"),
                };
                self.terrain[index] = terrain;
                self.buildings[index] = building;
                self.blueprints[index] = blueprint.into_iter().collect();
            }
        }
        Ok(())
    }

    pub fn with_id(mut self, id: MapId) -> Self {
        self.id = id;
        self
    }

    /// Rebuilds regions with chunks of `region_size` cells.
    pub fn with_region_size(mut self, region_size: usize) -> Self {
        self.region_size = region_size;
        self.refresh();
        self
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.0 < self.width && cell.1 < self.height
    }

    fn index(&self, cell: Cell) -> usize {
        cell.1 * self.width + cell.0
    }

    pub fn terrain(&self, cell: Cell) -> Terrain {
        self.terrain[self.index(cell)]
    }

    pub fn set_terrain(&mut self, cell: Cell, terrain: Terrain) {
        let index = self.index(cell);
        self.terrain[index] = terrain;
        self.refresh();
    }

    pub fn place_building(&mut self, cell: Cell, building: Option<Building>) {
        let index = self.index(cell);
        self.buildings[index] = building;
        self.refresh();
    }

    pub fn add_blueprint(&mut self, cell: Cell, blueprint: Blueprint) {
        let index = self.index(cell);
        self.blueprints[index].push(blueprint);
    }

    pub fn place_agent(&mut self, cell: Cell, agent: Option<AgentId>) {
        let index = self.index(cell);
        self.agents[index] = agent;
    }

    /// Walkable for an agent that does not bulldoze anything.
    pub fn is_walkable(&self, cell: Cell) -> bool {
        self.in_bounds(cell) && self.path_cost(cell) < IMPASSABLE_COST
    }

    fn walkable_non_door(&self, cell: Cell) -> bool {
        self.is_walkable(cell) && !self.building_at(cell).is_some_and(Building::is_door)
    }

    /// Recomputes regions and reachability after an edit.
    fn refresh(&mut self) {
        let regions = RegionGrid::build(self.width, self.height, self.region_size, |cell| {
            if !self.is_walkable(cell) {
                RegionCell::Blocked
            } else if self.building_at(cell).is_some_and(Building::is_door) {
                RegionCell::Door
            } else {
                RegionCell::Open
            }
        });
        self.regions = regions;
        self.components = self.label_components();
    }

    // 4-connected components over walkable cells, doors included.
    fn label_components(&self) -> Vec<Option<u32>> {
        let mut labels = vec![None; self.width * self.height];
        let mut next = 0;
        let mut stack = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                if labels[self.index((x, y))].is_some() || !self.is_walkable((x, y)) {
                    continue;
                }
                labels[self.index((x, y))] = Some(next);
                stack.push((x, y));
                while let Some((cx, cy)) = stack.pop() {
                    let neighbors = [
                        (cx.wrapping_sub(1), cy),
                        (cx + 1, cy),
                        (cx, cy.wrapping_sub(1)),
                        (cx, cy + 1),
                    ];
                    for neighbor in neighbors {
                        if self.is_walkable(neighbor) && labels[self.index(neighbor)].is_none() {
                            labels[self.index(neighbor)] = Some(next);
                            stack.push(neighbor);
                        }
                    }
                }
                next += 1;
            }
        }
        labels
    }

    pub fn component(&self, cell: Cell) -> Option<u32> {
        self.components.get(self.index(cell)).copied().flatten()
    }
}

impl FromStr for Map {
    type Err = anyhow::Error;

    fn from_str(text: &str) -> anyhow::Result<Self> {
        Self::parse(text.lines())
    }
}

impl PathGrid for Map {
    fn id(&self) -> MapId {
        self.id
    }

    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn path_cost(&self, cell: Cell) -> u32 {
        let index = self.index(cell);
        let building_cost = match self.buildings[index].map(|building| building.kind) {
            Some(BuildingKind::Wall) => IMPASSABLE_COST,
            Some(BuildingKind::Furniture { path_cost }) => path_cost,
            Some(BuildingKind::Door { .. }) | None => 0,
        };
        self.terrain[index].path_cost().saturating_add(building_cost)
    }

    fn is_water(&self, cell: Cell) -> bool {
        self.terrain(cell).is_water()
    }

    fn terrain_surcharge(&self, cell: Cell, drafted: bool) -> u32 {
        self.terrain(cell).extra_perceived_cost(drafted)
    }

    fn building_at(&self, cell: Cell) -> Option<&Building> {
        self.buildings[self.index(cell)].as_ref()
    }

    fn building_cost(&self, building: &Building, parms: &TraverseParms) -> Option<u32> {
        let BuildingKind::Door { locked } = building.kind else {
            return Some(0);
        };
        if !parms.mode.passes_closed_doors() {
            return None;
        }
        if !locked {
            return Some(DOOR_OPEN_TICKS);
        }
        if parms.mode == TraverseMode::PassDoors {
            return Some(0);
        }
        if parms.can_bash || parms.mode.passes_destroyable() {
            return Some(DOOR_BASH_COST);
        }
        None
    }

    fn blueprints_at(&self, cell: Cell) -> &[Blueprint] {
        &self.blueprints[self.index(cell)]
    }

    fn blueprint_cost(&self, blueprint: &Blueprint, parms: &TraverseParms) -> Option<u32> {
        let Some(agent) = parms.agent_id() else {
            return Some(0);
        };
        if !blueprint.impassable || blueprint.owner.is_some_and(|owner| owner != agent) {
            return Some(0);
        }
        Some(BLUEPRINT_COST)
    }

    fn agent_blocking(&self, cell: Cell, agent: Option<AgentId>) -> bool {
        self.agents[self.index(cell)].is_some_and(|other| Some(other) != agent)
    }

    fn regions(&self) -> Option<&RegionGrid> {
        Some(&self.regions)
    }

    fn can_reach(
        &self,
        start: Cell,
        destination: &Destination,
        end_mode: PathEndMode,
        parms: &TraverseParms,
    ) -> bool {
        if parms.mode.passes_destroyable() {
            return true;
        }
        let Some(from) = self.component(start) else {
            return true;
        };

        let mut targets = match (destination, end_mode) {
            (Destination::Thing { rect, .. }, PathEndMode::Touch) => *rect,
            _ => Rect::single(destination.cell()),
        };
        if end_mode == PathEndMode::Touch {
            targets = targets.expanded(1);
        }
        targets
            .cells_within(self.width, self.height)
            .any(|cell| self.component(cell) == Some(from))
    }

    fn corner_touch_allowed(&self, _corner: Cell, flank_a: Cell, flank_b: Cell) -> bool {
        self.walkable_non_door(flank_a) || self.walkable_non_door(flank_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::AgentParams;

    #[test]
    fn test_read_map() {
        let map = Map::from_file("map_file/test/test.map").unwrap();
        assert_eq!(map.height, 3);
        assert_eq!(map.width, 3);
        assert!(map.is_walkable((0, 0)));
        assert!(!map.is_walkable((1, 1)));
    }

    #[test]
    fn test_read_rooms_map() {
        let map = Map::from_file("map_file/test/rooms.map").unwrap();
        assert_eq!((map.width, map.height), (24, 16));
        let regions = map.regions().unwrap();
        assert_eq!(regions.regions().iter().filter(|r| r.is_doorway()).count(), 6);
        assert_eq!(map.component((1, 1)), map.component((22, 14)));
        assert!(map.component((2, 11)).is_none());
    }

    #[test]
    fn test_parse_glyphs() {
        let map: Map = "type octile\nheight 2\nwidth 5\nmap\n.SW~@\n#DLB.\n"
            .parse()
            .unwrap();
        assert_eq!(map.path_cost((0, 0)), 0);
        assert_eq!(map.path_cost((1, 0)), 10);
        assert!(map.is_water((2, 0)));
        assert!(!map.is_walkable((3, 0)));
        assert!(!map.is_walkable((4, 0)));
        assert!(!map.is_walkable((0, 1)));
        assert!(map.building_at((1, 1)).unwrap().is_door());
        assert_eq!(map.blueprints_at((3, 1)).len(), 1);
        assert!(map.blueprints_at((4, 1)).is_empty());

        assert!("type octile\nheight 1\nwidth 2\nmap\n.x\n".parse::<Map>().is_err());
        assert!("type octile\nheight 2\nwidth 2\nmap\n..\n".parse::<Map>().is_err());
    }

    #[test]
    fn test_door_costs_follow_mode() {
        let map = Map::new(1, 1);
        let door = Building::door(false);
        let locked = Building::door(true);

        let by_agent = TraverseParms::default();
        assert_eq!(map.building_cost(&door, &by_agent), Some(DOOR_OPEN_TICKS));
        assert_eq!(map.building_cost(&locked, &by_agent), None);

        let closed = TraverseParms::for_mode(TraverseMode::NoPassClosedDoors);
        assert_eq!(map.building_cost(&door, &closed), None);

        let doors = TraverseParms::for_mode(TraverseMode::PassDoors);
        assert_eq!(map.building_cost(&locked, &doors), Some(0));

        let bash = TraverseParms {
            can_bash: true,
            ..TraverseParms::default()
        };
        assert_eq!(map.building_cost(&locked, &bash), Some(DOOR_BASH_COST));
        assert_eq!(map.building_cost(&Building::wall(), &by_agent), Some(0));
    }

    #[test]
    fn test_blueprints_only_slow_bound_agents() {
        let map = Map::new(1, 1);
        let blueprint = Blueprint {
            impassable: true,
            owner: None,
        };
        assert_eq!(map.blueprint_cost(&blueprint, &TraverseParms::default()), Some(0));

        let agent = TraverseParms::for_agent(AgentParams::new(3, map.id));
        assert_eq!(map.blueprint_cost(&blueprint, &agent), Some(BLUEPRINT_COST));

        let foreign = Blueprint {
            impassable: true,
            owner: Some(4),
        };
        assert_eq!(map.blueprint_cost(&foreign, &agent), Some(0));
    }

    #[test]
    fn test_reachability_by_component() {
        let map = Map::from_rows(&[
            "..#..", //
            "..#..", //
            "..#..",
        ])
        .unwrap();
        let parms = TraverseParms::default();
        let east = Destination::Cell((4, 1));
        assert!(!map.can_reach((0, 0), &east, PathEndMode::OnCell, &parms));
        assert!(map.can_reach((3, 0), &east, PathEndMode::OnCell, &parms));

        // Touching the wall is possible from the west side.
        let wall = Destination::Cell((2, 1));
        assert!(map.can_reach((0, 0), &wall, PathEndMode::Touch, &parms));

        let bulldoze = TraverseParms::for_mode(TraverseMode::PassAllDestroyableThings);
        assert!(map.can_reach((0, 0), &east, PathEndMode::OnCell, &bulldoze));
    }

    #[test]
    fn test_agents_block_others_only() {
        let mut map = Map::new(2, 1);
        map.place_agent((1, 0), Some(7));
        assert!(map.agent_blocking((1, 0), Some(1)));
        assert!(map.agent_blocking((1, 0), None));
        assert!(!map.agent_blocking((1, 0), Some(7)));
        assert!(!map.agent_blocking((0, 0), Some(1)));
    }
}
