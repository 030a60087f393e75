use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::common::{Cell, Rect};
use crate::map::MapId;

pub type AgentId = usize;

/// How the destination is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PathEndMode {
    /// Stand on the destination cell.
    #[default]
    OnCell,
    /// Stand next to the destination, corners included when reachable.
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TraverseMode {
    #[default]
    ByAgent,
    PassDoors,
    NoPassClosedDoors,
    NoPassClosedDoorsOrWater,
    PassAllDestroyableThings,
    PassAllDestroyableThingsNotWater,
}

impl TraverseMode {
    pub fn allows_water(self) -> bool {
        !matches!(
            self,
            TraverseMode::NoPassClosedDoorsOrWater | TraverseMode::PassAllDestroyableThingsNotWater
        )
    }

    pub fn passes_destroyable(self) -> bool {
        matches!(
            self,
            TraverseMode::PassAllDestroyableThings | TraverseMode::PassAllDestroyableThingsNotWater
        )
    }

    pub fn passes_closed_doors(self) -> bool {
        !matches!(
            self,
            TraverseMode::NoPassClosedDoors | TraverseMode::NoPassClosedDoorsOrWater
        )
    }
}

/// Cells an agent is permitted to walk in, one flag per cell in row-major
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaMask {
    width: usize,
    cells: Vec<bool>,
    true_count: usize,
}

impl AreaMask {
    pub fn new(width: usize, height: usize) -> Self {
        AreaMask {
            width,
            cells: vec![false; width * height],
            true_count: 0,
        }
    }

    pub fn from_rect(width: usize, height: usize, rect: Rect) -> Self {
        let mut area = AreaMask::new(width, height);
        for cell in rect.cells_within(width, height) {
            area.set(cell, true);
        }
        area
    }

    pub fn set(&mut self, cell: Cell, allowed: bool) {
        let index = cell.1 * self.width + cell.0;
        if self.cells[index] != allowed {
            self.cells[index] = allowed;
            if allowed {
                self.true_count += 1;
            } else {
                self.true_count -= 1;
            }
        }
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.cells
            .get(cell.1 * self.width + cell.0)
            .copied()
            .unwrap_or(false)
    }

    pub fn true_count(&self) -> usize {
        self.true_count
    }
}

/// The agent a query is bound to.
#[derive(Debug, Clone)]
pub struct AgentParams<'a> {
    pub id: AgentId,
    /// Map the agent is spawned on, `None` when not spawned.
    pub map: Option<MapId>,
    pub ticks_cardinal: u32,
    pub ticks_diagonal: u32,
    pub drafted: bool,
    pub collides_with_agents: bool,
    /// Per-cell avoidance weights in row-major order.
    pub avoid_grid: Option<&'a [u8]>,
    pub allowed_area: Option<&'a AreaMask>,
}

impl<'a> AgentParams<'a> {
    pub fn new(id: AgentId, map: MapId) -> Self {
        AgentParams {
            id,
            map: Some(map),
            ticks_cardinal: 13,
            ticks_diagonal: 18,
            drafted: false,
            collides_with_agents: true,
            avoid_grid: None,
            allowed_area: None,
        }
    }

    /// The permitted area, unless the agent ignores it.
    pub fn effective_allowed_area(&self) -> Option<&'a AreaMask> {
        if self.drafted {
            return None;
        }
        self.allowed_area.filter(|area| area.true_count() > 0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TraverseParms<'a> {
    pub mode: TraverseMode,
    pub can_bash: bool,
    pub agent: Option<AgentParams<'a>>,
}

impl<'a> TraverseParms<'a> {
    pub fn for_mode(mode: TraverseMode) -> Self {
        TraverseParms {
            mode,
            can_bash: false,
            agent: None,
        }
    }

    pub fn for_agent(agent: AgentParams<'a>) -> Self {
        TraverseParms {
            mode: TraverseMode::ByAgent,
            can_bash: false,
            agent: Some(agent),
        }
    }

    pub fn agent_id(&self) -> Option<AgentId> {
        self.agent.as_ref().map(|agent| agent.id)
    }
}

/// What the search is heading for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Cell(Cell),
    /// A thing rooted at `cell` occupying `rect` on map `map`.
    Thing { cell: Cell, rect: Rect, map: MapId },
}

impl Destination {
    pub fn cell(&self) -> Cell {
        match *self {
            Destination::Cell(cell) => cell,
            Destination::Thing { cell, .. } => cell,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchQuery<'a> {
    pub start: Cell,
    pub destination: Destination,
    pub end_mode: PathEndMode,
    pub parms: TraverseParms<'a>,
}

impl<'a> SearchQuery<'a> {
    pub fn new(start: Cell, goal: Cell) -> Self {
        SearchQuery {
            start,
            destination: Destination::Cell(goal),
            end_mode: PathEndMode::OnCell,
            parms: TraverseParms::default(),
        }
    }

    pub fn with_end_mode(mut self, end_mode: PathEndMode) -> Self {
        self.end_mode = end_mode;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_parms(mut self, parms: TraverseParms<'a>) -> Self {
        self.parms = parms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_flags() {
        assert!(TraverseMode::ByAgent.allows_water());
        assert!(!TraverseMode::NoPassClosedDoorsOrWater.allows_water());
        assert!(!TraverseMode::PassAllDestroyableThingsNotWater.allows_water());
        assert!(TraverseMode::PassAllDestroyableThingsNotWater.passes_destroyable());
        assert!(!TraverseMode::PassDoors.passes_destroyable());
        assert!(!TraverseMode::NoPassClosedDoors.passes_closed_doors());
    }

    #[test]
    fn test_allowed_area_ignored_when_drafted_or_empty() {
        let empty = AreaMask::new(4, 4);
        let area = AreaMask::from_rect(4, 4, Rect::new(0, 0, 1, 1));
        assert_eq!(area.true_count(), 4);
        assert!(area.contains((1, 1)));
        assert!(!area.contains((2, 1)));

        let mut agent = AgentParams::new(0, MapId(0));
        agent.allowed_area = Some(&empty);
        assert!(agent.effective_allowed_area().is_none());

        agent.allowed_area = Some(&area);
        assert!(agent.effective_allowed_area().is_some());

        agent.drafted = true;
        assert!(agent.effective_allowed_area().is_none());
    }
}
