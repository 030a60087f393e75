use super::{Cell, QueueHandle};

const TILE_SHIFT: usize = 3;
const TILE_SIZE: usize = 1 << TILE_SHIFT;
const TILE_MASK: usize = TILE_SIZE - 1;
const TILE_CELLS: usize = TILE_SIZE * TILE_SIZE;

const COST_UNSET: i32 = 0;
const COST_IMPASSABLE: i32 = -1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum DoorFlag {
    #[default]
    Unset,
    Clear,
    Door,
}

/// Per-cell search state, valid for one search.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Node {
    pub(crate) handle: Option<QueueHandle>,
    pub(crate) parent: Option<u32>,
    pub(crate) g: u32,
    pub(crate) h: u32,
    // 0 = not evaluated yet, negative = impassable, otherwise cost + 1.
    cost: i32,
    pub(crate) door: DoorFlag,
    pub(crate) closed: bool,
}

impl Node {
    pub(crate) fn is_evaluated(&self) -> bool {
        self.cost != COST_UNSET
    }

    pub(crate) fn is_impassable(&self) -> bool {
        self.cost < 0
    }

    /// Cached traversal cost, `None` when unset or impassable.
    pub(crate) fn terrain_cost(&self) -> Option<u32> {
        (self.cost > 0).then(|| (self.cost - 1) as u32)
    }

    /// Impassable cells and doors may not be cut past diagonally.
    pub(crate) fn blocks_corner(&self) -> bool {
        self.is_impassable() || self.door == DoorFlag::Door
    }

    pub(crate) fn set_impassable(&mut self) {
        self.cost = COST_IMPASSABLE;
        self.door = DoorFlag::Clear;
    }

    pub(crate) fn set_cost(&mut self, cost: u32, is_door: bool) {
        self.cost = cost.min(i32::MAX as u32 - 1) as i32 + 1;
        self.door = if is_door {
            DoorFlag::Door
        } else {
            DoorFlag::Clear
        };
    }
}

struct NodeTile {
    nodes: [Node; TILE_CELLS],
    slot: usize,
}

/// Sparse node storage in `TILE_SIZE` x `TILE_SIZE` tiles.
///
/// Tiles are attached on first touch and recycled by `release_all`, which
/// only visits the tiles used by the current search.
#[derive(Default)]
pub(crate) struct NodeTileStore {
    tiles_wide: usize,
    slots: Vec<Option<usize>>,
    tiles: Vec<NodeTile>,
    free: Vec<usize>,
    used: Vec<usize>,
}

impl NodeTileStore {
    /// Sizes the tile index for a `width` x `height` grid.
    pub(crate) fn prepare(&mut self, width: usize, height: usize) {
        debug_assert!(self.used.is_empty(), "tiles still attached");
        self.tiles_wide = (width + TILE_MASK) >> TILE_SHIFT;
        let tiles_high = (height + TILE_MASK) >> TILE_SHIFT;
        let needed = self.tiles_wide * tiles_high;
        if self.slots.len() < needed {
            self.slots.resize(needed, None);
        }
    }

    pub(crate) fn get(&mut self, cell: Cell) -> &mut Node {
        let slot = self.tiles_wide * (cell.1 >> TILE_SHIFT) + (cell.0 >> TILE_SHIFT);
        let local = ((cell.1 & TILE_MASK) << TILE_SHIFT) | (cell.0 & TILE_MASK);
        let tile = match self.slots[slot] {
            Some(tile) => tile,
            None => self.attach(slot),
        };
        &mut self.tiles[tile].nodes[local]
    }

    fn attach(&mut self, slot: usize) -> usize {
        let tile = match self.free.pop() {
            Some(tile) => {
                self.tiles[tile].slot = slot;
                tile
            }
            None => {
                self.tiles.push(NodeTile {
                    nodes: [Node::default(); TILE_CELLS],
                    slot,
                });
                self.tiles.len() - 1
            }
        };
        self.slots[slot] = Some(tile);
        self.used.push(tile);
        tile
    }

    /// Detaches and clears every tile touched since the last release.
    pub(crate) fn release_all(&mut self) {
        for tile in self.used.drain(..) {
            let node_tile = &mut self.tiles[tile];
            self.slots[node_tile.slot] = None;
            node_tile.nodes = [Node::default(); TILE_CELLS];
            self.free.push(tile);
        }
    }

    pub(crate) fn tiles_in_use(&self) -> usize {
        self.used.len()
    }

    pub(crate) fn allocated_tiles(&self) -> usize {
        self.tiles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_attaches_one_tile_per_block() {
        let mut store = NodeTileStore::default();
        store.prepare(20, 20);

        store.get((0, 0)).g = 5;
        store.get((7, 7)).g = 6;
        assert_eq!(store.tiles_in_use(), 1);

        store.get((8, 0)).g = 7;
        store.get((19, 19)).g = 8;
        assert_eq!(store.tiles_in_use(), 3);

        assert_eq!(store.get((0, 0)).g, 5);
        assert_eq!(store.get((7, 7)).g, 6);
        assert_eq!(store.get((8, 0)).g, 7);
        assert_eq!(store.get((19, 19)).g, 8);
    }

    #[test]
    fn test_release_clears_and_recycles() {
        let mut store = NodeTileStore::default();
        store.prepare(64, 64);
        store.get((3, 3)).set_cost(12, true);
        store.get((40, 40)).closed = true;
        assert_eq!(store.allocated_tiles(), 2);

        store.release_all();
        assert_eq!(store.tiles_in_use(), 0);

        store.prepare(64, 64);
        let node = *store.get((40, 40));
        assert!(!node.closed);
        assert!(!node.is_evaluated());
        assert_eq!(node.door, DoorFlag::Unset);
        assert_eq!(store.allocated_tiles(), 2);
    }

    #[test]
    fn test_cost_sentinels() {
        let mut node = Node::default();
        assert!(!node.is_evaluated());
        assert_eq!(node.terrain_cost(), None);

        node.set_cost(0, false);
        assert!(node.is_evaluated());
        assert_eq!(node.terrain_cost(), Some(0));
        assert!(!node.blocks_corner());

        node.set_cost(45, true);
        assert_eq!(node.terrain_cost(), Some(45));
        assert!(node.blocks_corner());

        node.set_impassable();
        assert!(node.is_impassable());
        assert_eq!(node.terrain_cost(), None);
        assert!(node.blocks_corner());
    }
}
