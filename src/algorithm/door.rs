use crate::common::{Cell, Rect};
use crate::config::DeadEndDoorConfig;
use crate::map::PathGrid;
use crate::query::TraverseParms;
use crate::region::RegionGrid;

/// Spots doors that only lead into a small closed room without the goal.
pub(crate) struct DeadEndDoors<'q, M> {
    map: &'q M,
    regions: Option<&'q RegionGrid>,
    parms: &'q TraverseParms<'q>,
    config: &'q DeadEndDoorConfig,
    goal: Cell,
    destination: Rect,
}

impl<'q, M: PathGrid> DeadEndDoors<'q, M> {
    pub(crate) fn new(
        map: &'q M,
        parms: &'q TraverseParms<'q>,
        config: &'q DeadEndDoorConfig,
        goal: Cell,
        destination: Rect,
    ) -> Self {
        DeadEndDoors {
            map,
            regions: config.enabled.then(|| map.regions()).flatten(),
            parms,
            config,
            goal,
            destination,
        }
    }

    /// Whether the door at `door`, entered from `from`, leads only into a
    /// dead-end room.
    pub(crate) fn is_dead_end(&self, door: Cell, from: Cell) -> bool {
        let Some(regions) = self.regions else {
            return false;
        };
        let Some(door_region) = regions.region_at(door) else {
            return false;
        };
        if !door_region.is_doorway() || door_region.extents.contains(self.goal) {
            return false;
        }
        if door_region.links.len() != self.config.door_links {
            return false;
        }

        let near = regions.region_at(from).map(|region| region.id);
        let Some(far) = regions.other_side(door_region, near) else {
            return false;
        };
        if far.is_doorway() {
            return false;
        }

        let room = regions.room(far.room);
        if room.regions.len() > self.config.max_room_regions {
            return false;
        }

        for &id in &room.regions {
            let region = regions.region(id);
            if region.extents.overlaps(&self.destination) {
                return false;
            }

            // Any other usable door out of the room makes it a passage.
            for &link in &region.links {
                let other = regions.region(link);
                let Some(other_door) = other.door else {
                    continue;
                };
                if other.id == door_region.id || !self.door_usable(other_door) {
                    continue;
                }
                let Some(beyond) = regions.other_side(other, Some(region.id)) else {
                    continue;
                };
                if beyond.room != room.id {
                    return false;
                }
            }
        }

        true
    }

    fn door_usable(&self, door: Cell) -> bool {
        self.map
            .building_at(door)
            .map_or(true, |building| self.map.building_cost(building, self.parms).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{Building, Map};

    const HALL_AND_CLOSET: [&str; 8] = [
        "###########",
        "#.........#",
        "#.........#",
        "#.........#",
        "####D######",
        "###...#####",
        "###...#####",
        "###########",
    ];

    fn check(map: &Map, config: &DeadEndDoorConfig, goal: Cell) -> bool {
        let parms = TraverseParms::default();
        let doors = DeadEndDoors::new(map, &parms, config, goal, Rect::single(goal));
        doors.is_dead_end((4, 4), (4, 3))
    }

    #[test]
    fn test_closet_without_goal_is_dead_end() {
        let map = Map::from_rows(&HALL_AND_CLOSET).unwrap();
        let config = DeadEndDoorConfig::default();
        assert!(check(&map, &config, (9, 1)));
        assert!(!check(&map, &config, (4, 6)));
    }

    #[test]
    fn test_large_room_or_disabled_is_kept() {
        let config = DeadEndDoorConfig::default();
        let split = Map::from_rows(&HALL_AND_CLOSET)
            .unwrap()
            .with_region_size(1);
        assert!(!check(&split, &config, (9, 1)));

        let map = Map::from_rows(&HALL_AND_CLOSET).unwrap();
        let disabled = DeadEndDoorConfig {
            enabled: false,
            ..DeadEndDoorConfig::default()
        };
        assert!(!check(&map, &disabled, (9, 1)));
    }

    #[test]
    fn test_door_needs_exact_link_count() {
        // The door only touches the closet; its east side is a wall.
        let map = Map::from_rows(&[
            "######", //
            "#.D#.#", //
            "######",
        ])
        .unwrap();
        let config = DeadEndDoorConfig::default();
        let parms = TraverseParms::default();
        let doors = DeadEndDoors::new(&map, &parms, &config, (4, 1), Rect::single((4, 1)));
        assert_eq!(map.regions().unwrap().region_at((2, 1)).unwrap().links.len(), 1);
        assert!(!doors.is_dead_end((2, 1), (3, 1)));
    }

    #[test]
    fn test_second_exit_makes_passage() {
        let mut rows = HALL_AND_CLOSET.to_vec();
        rows[7] = "#####D#####";
        rows.push("#.........#");
        rows.push("###########");
        let mut map = Map::from_rows(&rows).unwrap();
        let config = DeadEndDoorConfig::default();
        assert!(!check(&map, &config, (9, 1)));

        // A locked exit does not count.
        map.place_building((5, 7), Some(Building::door(true)));
        assert!(check(&map, &config, (9, 1)));
    }
}
