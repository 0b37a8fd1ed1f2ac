//! Board assignment
//!
//! A run's board maps grid coordinates to tiles. Fixed (secret) tiles sit at
//! their declared coordinate on every board; pool tiles are shuffled into the
//! remaining cells without replacement, independently per run.
//!
//! [`BoardMap`] keeps the forward (coordinate → tile) and reverse
//! (tile → coordinate) lookups together so they cannot drift apart.

use crate::types::{Coordinate, Tile, TileId};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Bidirectional coordinate ↔ tile mapping for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(Coordinate, TileId)>", into = "Vec<(Coordinate, TileId)>")]
pub struct BoardMap {
    cells: BTreeMap<Coordinate, TileId>,
    positions: HashMap<TileId, Coordinate>,
}

impl BoardMap {
    /// Empty board
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `tile` at `coord`.
    ///
    /// Returns false (and changes nothing) if the cell is taken or the tile
    /// is already on the board.
    pub fn place(&mut self, coord: Coordinate, tile: TileId) -> bool {
        if self.cells.contains_key(&coord) || self.positions.contains_key(&tile) {
            return false;
        }
        self.cells.insert(coord, tile);
        self.positions.insert(tile, coord);
        true
    }

    /// Tile at a cell
    pub fn tile_at(&self, coord: Coordinate) -> Option<TileId> {
        self.cells.get(&coord).copied()
    }

    /// Cell holding a tile
    pub fn position_of(&self, tile: TileId) -> Option<Coordinate> {
        self.positions.get(&tile).copied()
    }

    /// Number of occupied cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// No cells occupied
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Occupied cells in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (Coordinate, TileId)> + '_ {
        self.cells.iter().map(|(coord, tile)| (*coord, *tile))
    }
}

impl From<Vec<(Coordinate, TileId)>> for BoardMap {
    fn from(cells: Vec<(Coordinate, TileId)>) -> Self {
        let mut board = BoardMap::new();
        for (coord, tile) in cells {
            board.place(coord, tile);
        }
        board
    }
}

impl From<BoardMap> for Vec<(Coordinate, TileId)> {
    fn from(board: BoardMap) -> Self {
        board.cells.into_iter().collect()
    }
}

/// Result of an assignment request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// This call generated and committed the board
    Assigned(BoardMap),
    /// A board was already committed; it is returned unchanged
    Existing(BoardMap),
}

impl Assignment {
    /// The committed board, whoever produced it
    pub fn board(&self) -> &BoardMap {
        match self {
            Assignment::Assigned(board) | Assignment::Existing(board) => board,
        }
    }

    /// Consume into the committed board
    pub fn into_board(self) -> BoardMap {
        match self {
            Assignment::Assigned(board) | Assignment::Existing(board) => board,
        }
    }

    /// True if this call produced the board
    pub fn is_new(&self) -> bool {
        matches!(self, Assignment::Assigned(_))
    }
}

/// Build a board for an `n` x `n` grid.
///
/// Fixed tiles outside the grid, or colliding with an earlier fixed tile on
/// the same cell, are skipped. Cells left over once the pool is exhausted stay
/// empty.
pub fn assign_board(n: u8, tiles: &[Tile], rng: &mut impl Rng) -> BoardMap {
    let mut board = BoardMap::new();

    for tile in tiles {
        if let Some(coord) = tile.fixed_coordinate() {
            if !coord.within(n) || !board.place(coord, tile.tile_id) {
                tracing::warn!(
                    tile_id = %tile.tile_id,
                    coordinate = %coord,
                    "Fixed tile skipped: outside grid or cell already pinned"
                );
            }
        }
    }

    let mut pool: Vec<TileId> = tiles
        .iter()
        .filter(|t| !t.is_fixed())
        .map(|t| t.tile_id)
        .collect();
    pool.shuffle(rng);
    let mut pool = pool.into_iter();

    for coord in Coordinate::grid(n) {
        if board.tile_at(coord).is_some() {
            continue;
        }
        match pool.next() {
            Some(tile_id) => {
                board.place(coord, tile_id);
            }
            None => {
                tracing::warn!(
                    coordinate = %coord,
                    "Tile pool exhausted, leaving remaining cells empty"
                );
                break;
            }
        }
    }

    board
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventId, Placement, SubmissionFormat, TileType};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tile(event_id: EventId, placement: Placement) -> Tile {
        Tile {
            tile_id: TileId::new(),
            event_id,
            label: "?".into(),
            description: String::new(),
            hint: String::new(),
            points: 10,
            tile_type: TileType::Normal,
            event_bonus_points: 0,
            submission_format: SubmissionFormat::Any,
            placement,
            publish_at: None,
        }
    }

    fn tiles(fixed: &[Coordinate], pool: usize) -> Vec<Tile> {
        let event_id = EventId::new();
        let mut out: Vec<Tile> = fixed
            .iter()
            .map(|c| tile(event_id, Placement::Fixed(*c)))
            .collect();
        out.extend((0..pool).map(|_| tile(event_id, Placement::Pool)));
        out
    }

    #[test]
    fn test_place_rejects_duplicates() {
        let mut board = BoardMap::new();
        let a = TileId::new();
        let b = TileId::new();
        assert!(board.place(Coordinate::new(0, 0), a));
        assert!(!board.place(Coordinate::new(0, 0), b));
        assert!(!board.place(Coordinate::new(1, 0), a));
        assert_eq!(board.position_of(a), Some(Coordinate::new(0, 0)));
        assert_eq!(board.position_of(b), None);
    }

    #[test]
    fn test_full_board_with_fixed_tiles() {
        let fixed = [Coordinate::new(2, 2), Coordinate::new(4, 0)];
        let tiles = tiles(&fixed, 23);
        let mut rng = StdRng::seed_from_u64(42);

        let board = assign_board(5, &tiles, &mut rng);
        assert_eq!(board.len(), 25);
        assert_eq!(board.tile_at(Coordinate::new(2, 2)), Some(tiles[0].tile_id));
        assert_eq!(board.tile_at(Coordinate::new(4, 0)), Some(tiles[1].tile_id));
    }

    #[test]
    fn test_short_pool_leaves_cells_empty() {
        let tiles = tiles(&[Coordinate::new(1, 1)], 5);
        let mut rng = StdRng::seed_from_u64(7);

        let board = assign_board(3, &tiles, &mut rng);
        assert_eq!(board.len(), 6);
        assert_eq!(board.tile_at(Coordinate::new(1, 1)), Some(tiles[0].tile_id));
        // Row-major fill: the last cells stay empty
        assert_eq!(board.tile_at(Coordinate::new(2, 2)), None);
    }

    #[test]
    fn test_large_pool_draws_without_replacement() {
        let tiles = tiles(&[], 40);
        let mut rng = StdRng::seed_from_u64(3);

        let board = assign_board(5, &tiles, &mut rng);
        assert_eq!(board.len(), 25);
        let mut seen: Vec<TileId> = board.iter().map(|(_, t)| t).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 25);
    }

    #[test]
    fn test_fixed_tile_outside_grid_is_skipped() {
        let tiles = tiles(&[Coordinate::new(4, 4)], 9);
        let mut rng = StdRng::seed_from_u64(1);

        let board = assign_board(3, &tiles, &mut rng);
        assert_eq!(board.len(), 9);
        assert_eq!(board.position_of(tiles[0].tile_id), None);
    }

    #[test]
    fn test_same_seed_same_board() {
        let tiles = tiles(&[Coordinate::new(0, 0)], 24);
        let a = assign_board(5, &tiles, &mut StdRng::seed_from_u64(99));
        let b = assign_board(5, &tiles, &mut StdRng::seed_from_u64(99));
        let c = assign_board(5, &tiles, &mut StdRng::seed_from_u64(100));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_board_serialization_rebuilds_reverse_lookup() {
        let tiles = tiles(&[], 9);
        let board = assign_board(3, &tiles, &mut StdRng::seed_from_u64(5));

        let bytes = bincode::serialize(&board).unwrap();
        let decoded: BoardMap = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, board);
        for t in &tiles {
            assert_eq!(decoded.position_of(t.tile_id), board.position_of(t.tile_id));
        }
    }
}
