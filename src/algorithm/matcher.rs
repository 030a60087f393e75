use crate::common::{Cell, Rect};
use crate::map::PathGrid;
use crate::query::{Destination, PathEndMode};

/// Decides whether a cell satisfies the destination.
#[derive(Debug, Clone)]
pub(crate) struct DestinationMatcher {
    rect: Rect,
    // Accepted x range on the first and last row; narrower than `rect` when
    // a corner cannot be touched diagonally.
    top: (isize, isize),
    bottom: (isize, isize),
}

impl DestinationMatcher {
    pub(crate) fn new<M: PathGrid>(map: &M, destination: &Destination, end_mode: PathEndMode) -> Self {
        let base = match destination {
            Destination::Thing { rect, .. } if end_mode != PathEndMode::OnCell => *rect,
            _ => Rect::single(destination.cell()),
        };
        let rect = match end_mode {
            PathEndMode::Touch => base.expanded(1),
            PathEndMode::OnCell => base,
        };

        let mut top = (rect.min_x, rect.max_x);
        let mut bottom = (rect.min_x, rect.max_x);
        if end_mode == PathEndMode::Touch {
            let Rect {
                min_x: x0,
                min_y: y0,
                max_x: x1,
                max_y: y1,
            } = rect;
            if !corner_allowed(map, (x0 + 1, y0 + 1), (x0 + 1, y0), (x0, y0 + 1)) {
                top.0 += 1;
            }
            if !corner_allowed(map, (x1 - 1, y0 + 1), (x1 - 1, y0), (x1, y0 + 1)) {
                top.1 -= 1;
            }
            if !corner_allowed(map, (x0 + 1, y1 - 1), (x0 + 1, y1), (x0, y1 - 1)) {
                bottom.0 += 1;
            }
            if !corner_allowed(map, (x1 - 1, y1 - 1), (x1 - 1, y1), (x1, y1 - 1)) {
                bottom.1 -= 1;
            }
        }

        DestinationMatcher { rect, top, bottom }
    }

    /// Rectangle of all cells that may match.
    pub(crate) fn rect(&self) -> Rect {
        self.rect
    }

    pub(crate) fn matches(&self, cell: Cell) -> bool {
        if !self.rect.contains(cell) {
            return false;
        }
        let (x, y) = (cell.0 as isize, cell.1 as isize);
        if y == self.rect.min_y {
            self.top.0 <= x && x <= self.top.1
        } else if y == self.rect.max_y {
            self.bottom.0 <= x && x <= self.bottom.1
        } else {
            true
        }
    }
}

// Corners whose cells fall outside the map can never be reached, so they
// are not asked about.
fn corner_allowed<M: PathGrid>(
    map: &M,
    corner: (isize, isize),
    flank_a: (isize, isize),
    flank_b: (isize, isize),
) -> bool {
    let (width, height) = map.size();
    let to_cell = |(x, y): (isize, isize)| {
        (x >= 0 && y >= 0 && (x as usize) < width && (y as usize) < height)
            .then_some((x as usize, y as usize))
    };
    match (to_cell(corner), to_cell(flank_a), to_cell(flank_b)) {
        (Some(corner), Some(flank_a), Some(flank_b)) => {
            map.corner_touch_allowed(corner, flank_a, flank_b)
        }
        _ => true,
    }
}
