mod queue;
mod tile;

pub use queue::{PriorityQueue, QueueHandle};
pub(crate) use tile::{Node, NodeTileStore};

use serde::{Deserialize, Serialize};

/// Grid coordinate as `(x, y)`.
pub type Cell = (usize, usize);

/// Largest coordinate that fits the 16-bit halves of an encoded cell.
pub const MAX_COORD: usize = 0xffff;

pub fn encode(cell: Cell) -> u32 {
    ((cell.0 as u32) << 16) | cell.1 as u32
}

pub fn decode(code: u32) -> Cell {
    ((code >> 16) as usize, (code & 0xffff) as usize)
}

/// Inclusive rectangle of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: isize,
    pub min_y: isize,
    pub max_x: isize,
    pub max_y: isize,
}

impl Rect {
    pub fn new(min_x: isize, min_y: isize, max_x: isize, max_y: isize) -> Self {
        Rect {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn single(cell: Cell) -> Self {
        let (x, y) = (cell.0 as isize, cell.1 as isize);
        Rect::new(x, y, x, y)
    }

    pub fn expanded(&self, by: isize) -> Self {
        Rect::new(
            self.min_x - by,
            self.min_y - by,
            self.max_x + by,
            self.max_y + by,
        )
    }

    pub fn contains(&self, cell: Cell) -> bool {
        let (x, y) = (cell.0 as isize, cell.1 as isize);
        self.min_x <= x && x <= self.max_x && self.min_y <= y && y <= self.max_y
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Grows the rectangle so it covers `cell`.
    pub fn encapsulate(&mut self, cell: Cell) {
        let (x, y) = (cell.0 as isize, cell.1 as isize);
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Cells of the rectangle clipped to a `width` x `height` grid.
    pub fn cells_within(&self, width: usize, height: usize) -> impl Iterator<Item = Cell> {
        let x0 = self.min_x.max(0);
        let y0 = self.min_y.max(0);
        let x1 = self.max_x.min(width as isize - 1);
        let y1 = self.max_y.min(height as isize - 1);
        (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| (x as usize, y as usize)))
    }
}

/// A route found by the search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoundPath {
    /// Cells from the start to the cell accepted by the destination, inclusive.
    pub cells: Vec<Cell>,
    /// Total tick cost including terrain surcharges.
    pub cost: u32,
}

impl FoundPath {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn first(&self) -> Option<Cell> {
        self.cells.first().copied()
    }

    pub fn last(&self) -> Option<Cell> {
        self.cells.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_keeps_both_halves() {
        let code = encode((300, 7));
        assert_eq!(code >> 16, 300);
        assert_eq!(decode(code), (300, 7));
        assert_eq!(decode(encode((MAX_COORD, MAX_COORD))), (MAX_COORD, MAX_COORD));
    }

    #[test]
    fn test_rect_overlap_and_contains() {
        let room = Rect::new(2, 2, 4, 5);
        assert!(room.contains((2, 5)));
        assert!(!room.contains((5, 5)));
        assert!(room.overlaps(&Rect::single((4, 4))));
        assert!(!room.overlaps(&Rect::new(5, 0, 9, 9)));

        let touch = Rect::single((0, 0)).expanded(1);
        assert_eq!(touch, Rect::new(-1, -1, 1, 1));
        let clipped: Vec<Cell> = touch.cells_within(10, 10).collect();
        assert_eq!(clipped, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
    }
}
