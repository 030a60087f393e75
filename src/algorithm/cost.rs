use super::door::DeadEndDoors;
use crate::common::{Cell, Rect};
use crate::config::SearchConfig;
use crate::map::{PathGrid, IMPASSABLE_COST};
use crate::query::{AgentId, AreaMask, TraverseParms};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CellCost {
    Impassable,
    /// A door pruned as a dead end for this search.
    DeadEndDoor,
    Passable { cost: u32, door: bool },
}

/// Per-search cost and heuristic evaluation of cells.
pub(crate) struct CostModel<'q, M> {
    map: &'q M,
    parms: &'q TraverseParms<'q>,
    config: &'q SearchConfig,
    width: usize,
    allow_water: bool,
    pass_destroyable: bool,
    drafted: bool,
    collides: bool,
    agent: Option<AgentId>,
    avoid_grid: Option<&'q [u8]>,
    allowed_area: Option<&'q AreaMask>,
    goal: Cell,
    pub(crate) ticks_cardinal: u32,
    pub(crate) ticks_diagonal: u32,
    doors: DeadEndDoors<'q, M>,
}

impl<'q, M: PathGrid> CostModel<'q, M> {
    pub(crate) fn new(
        map: &'q M,
        parms: &'q TraverseParms<'q>,
        config: &'q SearchConfig,
        goal: Cell,
        destination: Rect,
    ) -> Self {
        let agent = parms.agent.as_ref();
        let (ticks_cardinal, ticks_diagonal) = agent.map_or(
            (config.default_ticks_cardinal, config.default_ticks_diagonal),
            |agent| (agent.ticks_cardinal, agent.ticks_diagonal),
        );

        CostModel {
            map,
            parms,
            config,
            width: map.size().0,
            allow_water: parms.mode.allows_water(),
            pass_destroyable: parms.mode.passes_destroyable(),
            drafted: agent.is_some_and(|agent| agent.drafted),
            collides: agent.is_some_and(|agent| agent.collides_with_agents),
            agent: parms.agent_id(),
            avoid_grid: agent.and_then(|agent| agent.avoid_grid),
            allowed_area: agent.and_then(|agent| agent.effective_allowed_area()),
            goal,
            ticks_cardinal,
            ticks_diagonal,
            doors: DeadEndDoors::new(map, parms, &config.dead_end_door, goal, destination),
        }
    }

    /// Octile distance to the goal in ticks.
    pub(crate) fn distance_to_goal(&self, cell: Cell) -> u32 {
        let dx = cell.0.abs_diff(self.goal.0) as i64;
        let dy = cell.1.abs_diff(self.goal.1) as i64;
        let cardinal = self.ticks_cardinal as i64;
        let diagonal_surplus = self.ticks_diagonal as i64 - 2 * cardinal;
        let distance = cardinal * (dx + dy) + diagonal_surplus * dx.min(dy);
        distance.clamp(0, u32::MAX as i64) as u32
    }

    /// Cost of entering `cell`, reached while expanding `from`.
    pub(crate) fn evaluate(&self, cell: Cell, from: Cell) -> CellCost {
        if !self.allow_water && self.map.is_water(cell) {
            return CellCost::Impassable;
        }

        let building = self.map.building_at(cell);
        let mut cost = self.map.path_cost(cell);
        if cost < IMPASSABLE_COST {
            cost += self.map.terrain_surcharge(cell, self.drafted);
        } else {
            match building {
                Some(building) if self.pass_destroyable && building.destroyable => {
                    cost = (building.hit_points as f32 * self.config.destroyable_hit_point_factor)
                        as u32
                        + self.config.destroyable_base_cost;
                }
                _ => return CellCost::Impassable,
            }
        }

        let mut door = false;
        if let Some(building) = building {
            let Some(surcharge) = self.map.building_cost(building, self.parms) else {
                return CellCost::Impassable;
            };
            if building.is_door() {
                if self.doors.is_dead_end(cell, from) {
                    return CellCost::DeadEndDoor;
                }
                door = true;
            }
            cost = cost.saturating_add(surcharge);
        }

        let index = cell.1 * self.width + cell.0;
        if let Some(avoid_grid) = self.avoid_grid {
            let weight = avoid_grid.get(index).copied().unwrap_or(0) as u32;
            cost = cost.saturating_add(weight * self.config.avoid_grid_weight);
        }

        if self.allowed_area.is_some_and(|area| !area.contains(cell)) {
            cost = cost.saturating_add(self.config.outside_area_cost);
        }

        if self.collides && self.map.agent_blocking(cell, self.agent) {
            cost = cost.saturating_add(self.config.agent_collision_cost);
        }

        let mut blueprint_cost = 0;
        for blueprint in self.map.blueprints_at(cell) {
            match self.map.blueprint_cost(blueprint, self.parms) {
                Some(surcharge) => blueprint_cost = blueprint_cost.max(surcharge),
                None => return CellCost::Impassable,
            }
        }

        CellCost::Passable {
            cost: cost.saturating_add(blueprint_cost),
            door,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{Blueprint, Building, Map, MapId};
    use crate::query::{AgentParams, TraverseMode};

    fn evaluate(map: &Map, parms: &TraverseParms, cell: Cell) -> CellCost {
        let config = SearchConfig::default();
        let model = CostModel::new(map, parms, &config, (0, 0), Rect::single((0, 0)));
        model.evaluate(cell, (0, 0))
    }

    fn passable(cost: u32) -> CellCost {
        CellCost::Passable { cost, door: false }
    }

    #[test]
    fn test_heuristic_is_octile() {
        let map = Map::new(20, 20);
        let parms = TraverseParms::default();
        let config = SearchConfig::default();
        let model = CostModel::new(&map, &parms, &config, (2, 3), Rect::single((2, 3)));
        assert_eq!(model.distance_to_goal((2, 3)), 0);
        assert_eq!(model.distance_to_goal((12, 3)), 130);
        assert_eq!(model.distance_to_goal((5, 6)), 54);
        assert_eq!(model.distance_to_goal((16, 10)), 7 * 18 + 7 * 13);
    }

    #[test]
    fn test_terrain_and_water() {
        let map = Map::from_rows(&[".SW~"]).unwrap();
        let parms = TraverseParms::default();
        assert_eq!(evaluate(&map, &parms, (0, 0)), passable(0));
        assert_eq!(evaluate(&map, &parms, (1, 0)), passable(14));
        assert_eq!(evaluate(&map, &parms, (2, 0)), passable(46));
        assert_eq!(evaluate(&map, &parms, (3, 0)), CellCost::Impassable);

        let dry = TraverseParms::for_mode(TraverseMode::NoPassClosedDoorsOrWater);
        assert_eq!(evaluate(&map, &dry, (2, 0)), CellCost::Impassable);

        let mut agent = AgentParams::new(0, MapId(0));
        agent.drafted = true;
        let drafted = TraverseParms::for_agent(agent);
        assert_eq!(evaluate(&map, &drafted, (2, 0)), passable(16));
    }

    #[test]
    fn test_walls_only_pass_when_bulldozing() {
        let mut map = Map::from_rows(&[".#@"]).unwrap();
        let parms = TraverseParms::default();
        assert_eq!(evaluate(&map, &parms, (1, 0)), CellCost::Impassable);

        let bulldoze = TraverseParms::for_mode(TraverseMode::PassAllDestroyableThings);
        assert_eq!(evaluate(&map, &bulldoze, (1, 0)), passable(130));
        assert_eq!(evaluate(&map, &bulldoze, (2, 0)), CellCost::Impassable);

        map.place_building(
            (1, 0),
            Some(Building {
                destroyable: false,
                ..Building::wall()
            }),
        );
        assert_eq!(evaluate(&map, &bulldoze, (1, 0)), CellCost::Impassable);
    }

    #[test]
    fn test_doors_are_flagged() {
        let map = Map::from_rows(&[".DL"]).unwrap();
        let parms = TraverseParms::default();
        assert_eq!(
            evaluate(&map, &parms, (1, 0)),
            CellCost::Passable {
                cost: 45,
                door: true
            }
        );
        assert_eq!(evaluate(&map, &parms, (2, 0)), CellCost::Impassable);
    }

    #[test]
    fn test_agent_surcharges_add_up() {
        let mut map = Map::new(4, 1);
        map.place_agent((1, 0), Some(9));
        map.add_blueprint(
            (1, 0),
            Blueprint {
                impassable: false,
                owner: None,
            },
        );
        map.add_blueprint(
            (1, 0),
            Blueprint {
                impassable: true,
                owner: None,
            },
        );

        let avoid = [0u8, 3, 0, 0];
        let area = AreaMask::from_rect(4, 1, Rect::new(0, 0, 0, 0));
        let mut agent = AgentParams::new(1, MapId(0));
        agent.avoid_grid = Some(&avoid);
        agent.allowed_area = Some(&area);
        let parms = TraverseParms::for_agent(agent);

        // avoid 3 * 8 + outside area 600 + collision 175 + blueprint 800
        assert_eq!(evaluate(&map, &parms, (1, 0)), passable(24 + 600 + 175 + 800));
        assert_eq!(evaluate(&map, &parms, (2, 0)), passable(600));

        // Free searches ignore agent-specific costs.
        let free = TraverseParms::default();
        assert_eq!(evaluate(&map, &free, (1, 0)), passable(0));
    }
}
