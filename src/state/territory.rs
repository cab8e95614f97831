//! Static territory graph.
//!
//! The 42 territories, their adjacency and the six regions never change at
//! runtime. Game state stores ownership and troops separately and refers back
//! here by [`TerritoryId`].

use std::collections::{BTreeSet, HashSet, VecDeque};

/// Territory identifier, `1..=42`.
pub type TerritoryId = u8;

/// Number of territories on the board.
pub const TERRITORY_COUNT: usize = 42;

/// Static description of a territory.
#[derive(Debug, Clone, Copy)]
pub struct TerritoryDef {
    pub id: TerritoryId,
    pub name: &'static str,
    /// Display coordinates, passed through to clients untouched.
    pub position: (i32, i32),
    pub neighbors: &'static [TerritoryId],
}

/// Static description of a region (continent).
#[derive(Debug, Clone, Copy)]
pub struct RegionDef {
    pub name: &'static str,
    pub territories: &'static [TerritoryId],
    pub bonus: u32,
}

impl RegionDef {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "territories": self.territories,
            "bonus": self.bonus
        })
    }
}

const fn def(
    id: TerritoryId,
    name: &'static str,
    x: i32,
    y: i32,
    neighbors: &'static [TerritoryId],
) -> TerritoryDef {
    TerritoryDef {
        id,
        name,
        position: (x, y),
        neighbors,
    }
}

/// All territories, indexed by `id - 1`.
pub static TERRITORIES: [TerritoryDef; TERRITORY_COUNT] = [
    // North America
    def(1, "Alaska", 45, 90, &[2, 4, 30]),
    def(2, "Northwest Territory", 140, 85, &[1, 3, 4, 5]),
    def(3, "Greenland", 330, 50, &[2, 5, 6, 14]),
    def(4, "Alberta", 130, 145, &[1, 2, 5, 7]),
    def(5, "Ontario", 205, 150, &[2, 3, 4, 6, 7, 8]),
    def(6, "Quebec", 275, 150, &[3, 5, 8]),
    def(7, "Western United States", 135, 215, &[4, 5, 8, 9]),
    def(8, "Eastern United States", 215, 230, &[5, 6, 7, 9]),
    def(9, "Central America", 150, 300, &[7, 8, 10]),
    // South America
    def(10, "Venezuela", 220, 365, &[9, 11, 12]),
    def(11, "Peru", 225, 440, &[10, 12, 13]),
    def(12, "Brazil", 290, 415, &[10, 11, 13, 21]),
    def(13, "Argentina", 245, 520, &[11, 12]),
    // Europe
    def(14, "Iceland", 425, 110, &[3, 15, 17]),
    def(15, "Scandinavia", 500, 100, &[14, 16, 17, 18]),
    def(16, "Ukraine", 585, 140, &[15, 18, 20, 27, 34, 36]),
    def(17, "Great Britain", 420, 170, &[14, 15, 18, 19]),
    def(18, "Northern Europe", 490, 180, &[15, 16, 17, 19, 20]),
    def(19, "Western Europe", 430, 245, &[17, 18, 20, 21]),
    def(20, "Southern Europe", 510, 235, &[16, 18, 19, 21, 22, 36]),
    // Africa
    def(21, "North Africa", 450, 330, &[12, 19, 20, 22, 23, 24]),
    def(22, "Egypt", 530, 310, &[20, 21, 23, 36]),
    def(23, "East Africa", 575, 385, &[21, 22, 24, 25, 26, 36]),
    def(24, "Congo", 520, 420, &[21, 23, 25]),
    def(25, "South Africa", 530, 500, &[23, 24, 26]),
    def(26, "Madagascar", 615, 490, &[23, 25]),
    // Asia
    def(27, "Ural", 685, 120, &[16, 28, 34, 35]),
    def(28, "Siberia", 745, 90, &[27, 29, 31, 32, 35]),
    def(29, "Yakutsk", 820, 70, &[28, 30, 31]),
    def(30, "Kamchatka", 900, 80, &[1, 29, 31, 32, 33]),
    def(31, "Irkutsk", 810, 135, &[28, 29, 30, 32]),
    def(32, "Mongolia", 820, 190, &[28, 30, 31, 33, 35]),
    def(33, "Japan", 915, 200, &[30, 32]),
    def(34, "Afghanistan", 660, 195, &[16, 27, 35, 36, 37]),
    def(35, "China", 770, 245, &[27, 28, 32, 34, 37, 38]),
    def(36, "Middle East", 600, 270, &[16, 20, 22, 23, 34, 37]),
    def(37, "India", 705, 300, &[34, 35, 36, 38]),
    def(38, "Siam", 785, 320, &[35, 37, 39]),
    // Australia
    def(39, "Indonesia", 800, 410, &[38, 40, 41]),
    def(40, "New Guinea", 885, 395, &[39, 41, 42]),
    def(41, "Western Australia", 830, 490, &[39, 40, 42]),
    def(42, "Eastern Australia", 905, 480, &[40, 41]),
];

/// The six regions. Together they partition all territory ids.
pub static REGIONS: [RegionDef; 6] = [
    RegionDef {
        name: "North America",
        territories: &[1, 2, 3, 4, 5, 6, 7, 8, 9],
        bonus: 5,
    },
    RegionDef {
        name: "South America",
        territories: &[10, 11, 12, 13],
        bonus: 2,
    },
    RegionDef {
        name: "Europe",
        territories: &[14, 15, 16, 17, 18, 19, 20],
        bonus: 5,
    },
    RegionDef {
        name: "Africa",
        territories: &[21, 22, 23, 24, 25, 26],
        bonus: 3,
    },
    RegionDef {
        name: "Asia",
        territories: &[27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 37, 38],
        bonus: 7,
    },
    RegionDef {
        name: "Australia",
        territories: &[39, 40, 41, 42],
        bonus: 2,
    },
];

/// Check if an id names a territory on the board.
pub fn is_valid(id: TerritoryId) -> bool {
    (1..=TERRITORY_COUNT).contains(&(id as usize))
}

/// Look up a territory definition.
pub fn territory(id: TerritoryId) -> Option<&'static TerritoryDef> {
    if is_valid(id) {
        Some(&TERRITORIES[id as usize - 1])
    } else {
        None
    }
}

/// All territory ids in board order.
pub fn all_ids() -> impl Iterator<Item = TerritoryId> {
    TERRITORIES.iter().map(|t| t.id)
}

/// Neighbors of a territory. Unknown ids have none.
pub fn neighbors(id: TerritoryId) -> &'static [TerritoryId] {
    territory(id).map(|t| t.neighbors).unwrap_or(&[])
}

/// Check whether two territories share a border.
pub fn are_adjacent(a: TerritoryId, b: TerritoryId) -> bool {
    neighbors(a).contains(&b)
}

/// The region a territory belongs to.
pub fn region_of(id: TerritoryId) -> Option<&'static RegionDef> {
    REGIONS.iter().find(|r| r.territories.contains(&id))
}

/// Check if an owned set covers every territory of a region.
pub fn owns_entire_region(owned: &BTreeSet<TerritoryId>, region: &RegionDef) -> bool {
    region.territories.iter().all(|id| owned.contains(id))
}

/// Sum of bonuses for every region fully covered by `owned`.
pub fn region_bonus(owned: &BTreeSet<TerritoryId>) -> u32 {
    REGIONS
        .iter()
        .filter(|r| owns_entire_region(owned, r))
        .map(|r| r.bonus)
        .sum()
}

/// Check whether `to` can be reached from `from` stepping only through
/// territories accepted by `passable`.
///
/// Both endpoints must themselves be passable. Each call allocates its own
/// visited set.
pub fn is_reachable<F>(from: TerritoryId, to: TerritoryId, passable: F) -> bool
where
    F: Fn(TerritoryId) -> bool,
{
    if !passable(from) || !passable(to) {
        return false;
    }

    let mut visited = HashSet::from([from]);
    let mut queue = VecDeque::from([from]);

    while let Some(current) = queue.pop_front() {
        if current == to {
            return true;
        }
        for &next in neighbors(current) {
            if passable(next) && visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_match_positions() {
        for (i, t) in TERRITORIES.iter().enumerate() {
            assert_eq!(t.id as usize, i + 1);
        }
        assert!(territory(0).is_none());
        assert!(territory(43).is_none());
        assert_eq!(territory(42).unwrap().name, "Eastern Australia");
    }

    #[test]
    fn test_adjacency_is_symmetric() {
        for t in &TERRITORIES {
            assert!(!t.neighbors.is_empty());
            for &n in t.neighbors {
                assert!(
                    are_adjacent(n, t.id),
                    "{} lists {} but not the reverse",
                    t.id,
                    n
                );
            }
        }
    }

    #[test]
    fn test_regions_partition_board() {
        let mut seen = BTreeSet::new();
        for region in &REGIONS {
            for &id in region.territories {
                assert!(seen.insert(id), "territory {} in two regions", id);
            }
        }
        assert_eq!(seen.len(), TERRITORY_COUNT);
        assert_eq!(region_of(17).unwrap().name, "Europe");
        assert_eq!(region_of(30).unwrap().name, "Asia");
        assert!(region_of(99).is_none());
    }

    #[test]
    fn test_region_ownership() {
        let europe = &REGIONS[2];
        let mut owned: BTreeSet<TerritoryId> = europe.territories.iter().copied().collect();
        assert!(owns_entire_region(&owned, europe));
        assert_eq!(region_bonus(&owned), 5);

        owned.remove(&16);
        assert!(!owns_entire_region(&owned, europe));
        assert_eq!(region_bonus(&owned), 0);
    }

    #[test]
    fn test_cross_region_links() {
        assert!(are_adjacent(1, 30)); // Alaska - Kamchatka
        assert!(are_adjacent(12, 21)); // Brazil - North Africa
        assert!(are_adjacent(38, 39)); // Siam - Indonesia
        assert!(!are_adjacent(1, 42));
    }

    #[test]
    fn test_reachability_respects_filter() {
        // Alaska -> Alberta -> Western US, avoiding Northwest Territory
        let allowed: BTreeSet<TerritoryId> = [1, 4, 7].into_iter().collect();
        assert!(is_reachable(1, 7, |id| allowed.contains(&id)));

        // Remove the middle link
        let broken: BTreeSet<TerritoryId> = [1, 7].into_iter().collect();
        assert!(!is_reachable(1, 7, |id| broken.contains(&id)));

        // Endpoint outside the filter
        assert!(!is_reachable(1, 4, |id| id == 1));
    }
}
