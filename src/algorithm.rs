mod astar;
mod cost;
mod door;
mod matcher;

pub use astar::PathFinder;

use std::cell::RefCell;

use crate::common::{decode, Cell, FoundPath, NodeTileStore};
use crate::map::PathGrid;
use crate::query::SearchQuery;

thread_local! {
    static PATH_FINDER: RefCell<PathFinder> = RefCell::new(PathFinder::default());
}

/// Runs `query` on this thread's shared `PathFinder`.
///
/// # Panics
///
/// Panics when called from inside another search on the same thread.
pub fn find_path<M: PathGrid>(map: &M, query: &SearchQuery) -> Option<FoundPath> {
    PATH_FINDER.with(|finder| finder.borrow_mut().find_path(map, query))
}

// Walks parent links back to the start.
fn construct_path(tiles: &mut NodeTileStore, goal: Cell) -> Vec<Cell> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(parent) = tiles.get(current).parent {
        current = decode(parent);
        path.push(current);
    }
    path.reverse();
    path
}
