//! Tile grid and map-file parsing

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const WALL_SYMBOL: char = '▤';
pub const COLLECTIBLE_SYMBOL: char = '♣';
pub const EMPTY_SYMBOL: char = ' ';
pub const START_SYMBOL: char = '☺';
pub const TRAP_SYMBOL: char = 'X';
pub const TRAP_ALERT_SYMBOL: char = '!';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("map has no rows")]
    Empty,
}

/// A single map cell
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tile {
    Empty,
    Wall,
    Collectible,
    /// Dormant trap; arms when a player comes near
    Trap,
    /// Armed trap, reverts to [`Tile::Trap`] after a while
    TrapAlert,
}

impl Tile {
    pub fn from_symbol(symbol: char) -> Self {
        match symbol {
            WALL_SYMBOL => Tile::Wall,
            COLLECTIBLE_SYMBOL => Tile::Collectible,
            // maps always load traps dormant
            TRAP_SYMBOL | TRAP_ALERT_SYMBOL => Tile::Trap,
            _ => Tile::Empty,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Tile::Empty => EMPTY_SYMBOL,
            Tile::Wall => WALL_SYMBOL,
            Tile::Collectible => COLLECTIBLE_SYMBOL,
            Tile::Trap => TRAP_SYMBOL,
            Tile::TrapAlert => TRAP_ALERT_SYMBOL,
        }
    }

    pub fn is_passable(self) -> bool {
        matches!(self, Tile::Empty | Tile::Collectible)
    }
}

/// Column/row coordinate on the grid
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Returns the neighbouring position, or None when it would leave the
    /// non-negative quadrant.
    pub fn offset(self, dx: i32, dy: i32) -> Option<Position> {
        let x = self.x.checked_add_signed(dx as isize)?;
        let y = self.y.checked_add_signed(dy as isize)?;
        Some(Position { x, y })
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Rectangular, row-major tile array. Dimensions never change after load.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
    start: Option<Position>,
}

impl Grid {
    /// Parses the plain-text map format, one line per row.
    ///
    /// Unknown characters become empty tiles and short rows are padded with
    /// empty tiles up to the widest row. The start marker is recorded and
    /// left as an empty tile.
    pub fn parse(text: &str) -> Result<Self, GridError> {
        let rows: Vec<Vec<char>> = text
            .lines()
            .map(|line| line.trim_end_matches('\r').chars().collect())
            .collect();

        if rows.is_empty() {
            return Err(GridError::Empty);
        }

        let height = rows.len();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut tiles = Vec::with_capacity(width * height);
        let mut start = None;

        for (y, row) in rows.iter().enumerate() {
            for x in 0..width {
                let symbol = row.get(x).copied().unwrap_or(EMPTY_SYMBOL);
                if symbol == START_SYMBOL && start.is_none() {
                    start = Some(Position::new(x, y));
                }
                tiles.push(Tile::from_symbol(symbol));
            }
        }

        Ok(Self {
            width,
            height,
            tiles,
            start,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Start marker found in the map file, if any
    pub fn start(&self) -> Option<Position> {
        self.start
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    pub fn tile(&self, pos: Position) -> Option<Tile> {
        if self.in_bounds(pos) {
            Some(self.tiles[pos.y * self.width + pos.x])
        } else {
            None
        }
    }

    pub fn is_passable(&self, pos: Position) -> bool {
        self.tile(pos).is_some_and(Tile::is_passable)
    }

    /// Replaces one tile. Out-of-bounds positions are ignored and reported
    /// as `false`.
    pub fn set_tile(&mut self, pos: Position, tile: Tile) -> bool {
        if !self.in_bounds(pos) {
            return false;
        }
        self.tiles[pos.y * self.width + pos.x] = tile;
        true
    }

    /// All positions whose tile satisfies `predicate`, in row-major order
    pub fn positions_where(&self, predicate: impl Fn(Tile) -> bool) -> Vec<Position> {
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, tile)| predicate(**tile))
            .map(|(i, _)| Position::new(i % self.width, i / self.width))
            .collect()
    }

    /// Turns every `from` tile into `to`, returning how many changed
    pub fn replace_all(&mut self, from: Tile, to: Tile) -> usize {
        let mut changed = 0;
        for tile in self.tiles.iter_mut().filter(|t| **t == from) {
            *tile = to;
            changed += 1;
        }
        changed
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Tile]> {
        self.tiles.chunks(self.width.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_MAP: &str = "▤▤▤\n▤ ♣\n▤▤▤";

    #[test]
    fn test_parse_dimensions_and_symbols() {
        let grid = Grid::parse(SMALL_MAP).unwrap();
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.tile(Position::new(0, 0)), Some(Tile::Wall));
        assert_eq!(grid.tile(Position::new(1, 1)), Some(Tile::Empty));
        assert_eq!(grid.tile(Position::new(2, 1)), Some(Tile::Collectible));
        assert_eq!(grid.tile(Position::new(3, 1)), None);
    }

    #[test]
    fn test_unknown_symbols_become_empty() {
        let grid = Grid::parse("▤?#").unwrap();
        assert_eq!(grid.tile(Position::new(1, 0)), Some(Tile::Empty));
        assert_eq!(grid.tile(Position::new(2, 0)), Some(Tile::Empty));
    }

    #[test]
    fn test_traps_load_dormant_and_block() {
        let grid = Grid::parse(" X!").unwrap();
        assert_eq!(grid.tile(Position::new(1, 0)), Some(Tile::Trap));
        assert_eq!(grid.tile(Position::new(2, 0)), Some(Tile::Trap));
        assert!(!grid.is_passable(Position::new(1, 0)));
        assert!(!Tile::TrapAlert.is_passable());
        assert_eq!(Tile::TrapAlert.symbol(), '!');
    }

    #[test]
    fn test_replace_all() {
        let mut grid = Grid::parse("X X\n ▤X").unwrap();
        assert_eq!(grid.replace_all(Tile::Trap, Tile::TrapAlert), 3);
        assert_eq!(grid.tile(Position::new(2, 1)), Some(Tile::TrapAlert));
        assert_eq!(grid.replace_all(Tile::Trap, Tile::TrapAlert), 0);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let grid = Grid::parse("▤▤▤▤\n▤\r\n▤▤").unwrap();
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.tile(Position::new(3, 1)), Some(Tile::Empty));
        assert_eq!(grid.tile(Position::new(1, 2)), Some(Tile::Wall));
    }

    #[test]
    fn test_start_marker_is_recorded_and_passable() {
        let grid = Grid::parse("▤▤▤\n▤☺▤").unwrap();
        assert_eq!(grid.start(), Some(Position::new(1, 1)));
        assert!(grid.is_passable(Position::new(1, 1)));
    }

    #[test]
    fn test_empty_map_is_error() {
        assert_eq!(Grid::parse(""), Err(GridError::Empty));
    }

    #[test]
    fn test_set_tile_out_of_bounds_is_ignored() {
        let mut grid = Grid::parse(SMALL_MAP).unwrap();
        let before = grid.clone();
        assert!(!grid.set_tile(Position::new(10, 0), Tile::Empty));
        assert_eq!(grid, before);

        assert!(grid.set_tile(Position::new(2, 1), Tile::Empty));
        assert_eq!(grid.tile(Position::new(2, 1)), Some(Tile::Empty));
    }

    #[test]
    fn test_position_offset() {
        let origin = Position::new(0, 0);
        assert_eq!(origin.offset(-1, 0), None);
        assert_eq!(origin.offset(1, 1), Some(Position::new(1, 1)));
    }

    #[test]
    fn test_positions_where() {
        let grid = Grid::parse(SMALL_MAP).unwrap();
        let passable = grid.positions_where(Tile::is_passable);
        assert_eq!(passable, vec![Position::new(1, 1), Position::new(2, 1)]);
    }
}
