//! Spawn tile selection for newly joining players

use rand::seq::SliceRandom;
use rand::Rng;
use shared::{Grid, Position, Tile};

/// Pool of spawn positions, computed once from the loaded grid.
///
/// Tiles are never reserved, so two players may be handed the same tile.
#[derive(Debug, Clone)]
pub struct SpawnAllocator {
    pool: Vec<Position>,
}

impl SpawnAllocator {
    /// Builds the pool from `grid`. Empty tiles are preferred over
    /// collectibles; returns None when nothing on the grid is passable.
    pub fn new(grid: &Grid) -> Option<Self> {
        let mut pool = grid.positions_where(|tile| tile == Tile::Empty);
        if pool.is_empty() {
            pool = grid.positions_where(Tile::is_passable);
        }

        if pool.is_empty() {
            None
        } else {
            Some(Self { pool })
        }
    }

    /// Picks one pool position uniformly at random. The pool is never empty
    /// after [`new`](Self::new), so this only returns None for a bad pool.
    pub fn allocate<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Position> {
        self.pool.choose(rng).copied()
    }

    pub fn pool(&self) -> &[Position] {
        &self.pool
    }
}
