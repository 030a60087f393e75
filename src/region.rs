use crate::common::{Cell, Rect};

pub type RegionId = usize;
pub type RoomId = usize;

/// Side length of the chunks regions are flood-filled in.
pub const DEFAULT_REGION_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionCell {
    Blocked,
    Open,
    Door,
}

#[derive(Debug, Clone)]
pub struct Region {
    pub id: RegionId,
    /// Bounding rectangle of the region's cells.
    pub extents: Rect,
    /// Regions sharing an edge with this one.
    pub links: Vec<RegionId>,
    /// The door cell when this region is a doorway.
    pub door: Option<Cell>,
    pub room: RoomId,
    pub cell_count: usize,
}

impl Region {
    pub fn is_doorway(&self) -> bool {
        self.door.is_some()
    }
}

/// Regions connected without passing through a doorway.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub regions: Vec<RegionId>,
}

/// Region and room partition of a grid.
#[derive(Debug, Clone, Default)]
pub struct RegionGrid {
    width: usize,
    height: usize,
    cells: Vec<Option<RegionId>>,
    regions: Vec<Region>,
    rooms: Vec<Room>,
}

impl RegionGrid {
    pub fn build<F>(width: usize, height: usize, region_size: usize, classify: F) -> Self
    where
        F: Fn(Cell) -> RegionCell,
    {
        let region_size = region_size.max(1);
        let mut kinds = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                kinds.push(classify((x, y)));
            }
        }

        let mut grid = RegionGrid {
            width,
            height,
            cells: vec![None; width * height],
            regions: Vec::new(),
            rooms: Vec::new(),
        };

        let mut stack = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let index = y * width + x;
                if grid.cells[index].is_some() {
                    continue;
                }
                match kinds[index] {
                    RegionCell::Blocked => {}
                    RegionCell::Door => {
                        let id = grid.new_region((x, y), Some((x, y)));
                        grid.cells[index] = Some(id);
                    }
                    RegionCell::Open => {
                        let id = grid.new_region((x, y), None);
                        let chunk = (x / region_size, y / region_size);
                        grid.cells[index] = Some(id);
                        stack.push((x, y));
                        while let Some(cell) = stack.pop() {
                            grid.regions[id].extents.encapsulate(cell);
                            grid.regions[id].cell_count += 1;
                            for next in grid.cardinal_neighbors(cell) {
                                let next_index = next.1 * width + next.0;
                                if grid.cells[next_index].is_none()
                                    && kinds[next_index] == RegionCell::Open
                                    && (next.0 / region_size, next.1 / region_size) == chunk
                                {
                                    grid.cells[next_index] = Some(id);
                                    stack.push(next);
                                }
                            }
                        }
                    }
                }
            }
        }

        grid.link_regions();
        grid.group_rooms();
        grid
    }

    fn new_region(&mut self, cell: Cell, door: Option<Cell>) -> RegionId {
        let id = self.regions.len();
        self.regions.push(Region {
            id,
            extents: Rect::single(cell),
            links: Vec::new(),
            door,
            room: 0,
            cell_count: usize::from(door.is_some()),
        });
        id
    }

    fn cardinal_neighbors(&self, cell: Cell) -> impl Iterator<Item = Cell> {
        let (x, y) = cell;
        let (width, height) = (self.width, self.height);
        [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ]
        .into_iter()
        .filter(move |&(nx, ny)| nx < width && ny < height)
    }

    fn link_regions(&mut self) {
        for y in 0..self.height {
            for x in 0..self.width {
                let Some(a) = self.cells[y * self.width + x] else {
                    continue;
                };
                let right = (x + 1 < self.width)
                    .then(|| self.cells[y * self.width + x + 1])
                    .flatten();
                let down = (y + 1 < self.height)
                    .then(|| self.cells[(y + 1) * self.width + x])
                    .flatten();
                for b in [right, down].into_iter().flatten() {
                    if a != b {
                        self.regions[a].links.push(b);
                        self.regions[b].links.push(a);
                    }
                }
            }
        }
        for region in &mut self.regions {
            region.links.sort_unstable();
            region.links.dedup();
        }
    }

    fn group_rooms(&mut self) {
        let mut assigned = vec![false; self.regions.len()];
        let mut stack = Vec::new();
        for seed in 0..self.regions.len() {
            if assigned[seed] {
                continue;
            }
            let room = self.rooms.len();
            let mut members = vec![seed];
            assigned[seed] = true;

            // Doorways form rooms of their own.
            if !self.regions[seed].is_doorway() {
                stack.push(seed);
                while let Some(region) = stack.pop() {
                    for &link in &self.regions[region].links {
                        if !assigned[link] && !self.regions[link].is_doorway() {
                            assigned[link] = true;
                            members.push(link);
                            stack.push(link);
                        }
                    }
                }
            }

            for &member in &members {
                self.regions[member].room = room;
            }
            self.rooms.push(Room {
                id: room,
                regions: members,
            });
        }
    }

    pub fn region_at(&self, cell: Cell) -> Option<&Region> {
        if cell.0 >= self.width || cell.1 >= self.height {
            return None;
        }
        self.cells[cell.1 * self.width + cell.0].map(|id| &self.regions[id])
    }

    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id]
    }

    pub fn room(&self, id: RoomId) -> &Room {
        &self.rooms[id]
    }

    /// First region linked to `region` that is not `from`.
    pub fn other_side(&self, region: &Region, from: Option<RegionId>) -> Option<&Region> {
        region
            .links
            .iter()
            .find(|&&link| Some(link) != from)
            .map(|&link| &self.regions[link])
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }
}
