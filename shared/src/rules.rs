//! Movement, pickup and trap rules shared by the authoritative store and client prediction
//!
//! Both sides run exactly this code so a prediction made on the client matches
//! what the server will do with the same action, as long as the client's copy
//! of the grid and players is current.

use crate::grid::{Grid, Position, Tile};
use crate::{Action, PlayerRecord};
use std::collections::HashMap;

/// Chebyshev distance at which a dormant trap notices a player
pub const TRAP_RADIUS: usize = 2;

/// Why a move could not be made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveBlock {
    OutOfBounds,
    Impassable,
    Occupied,
}

/// What applying an action changed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActionOutcome {
    pub moved: bool,
    pub collected: bool,
    pub blocked: Option<MoveBlock>,
    /// The move armed the traps and cost the player one health
    pub tripped: bool,
    pub status: Option<String>,
}

/// Checks that `identity` may stand on `pos`.
pub fn check_position(
    grid: &Grid,
    players: &HashMap<String, PlayerRecord>,
    identity: &str,
    pos: Position,
    block_stacking: bool,
) -> Result<(), MoveBlock> {
    if !grid.in_bounds(pos) {
        return Err(MoveBlock::OutOfBounds);
    }
    if !grid.is_passable(pos) {
        return Err(MoveBlock::Impassable);
    }
    if block_stacking
        && players
            .values()
            .any(|p| p.identity != identity && p.position == pos)
    {
        return Err(MoveBlock::Occupied);
    }
    Ok(())
}

/// Resolves the destination of a one-step move from `from`.
pub fn resolve_move(
    grid: &Grid,
    players: &HashMap<String, PlayerRecord>,
    identity: &str,
    from: Position,
    dx: i32,
    dy: i32,
    block_stacking: bool,
) -> Result<Position, MoveBlock> {
    let target = from.offset(dx, dy).ok_or(MoveBlock::OutOfBounds)?;
    check_position(grid, players, identity, target, block_stacking)?;
    Ok(target)
}

/// Collects the tile under `pos` if it holds a collectible.
///
/// The tile becomes empty and the record's count goes up by exactly one;
/// a second call on the same position finds an empty tile and does nothing.
pub fn collect_at(grid: &mut Grid, record: &mut PlayerRecord, pos: Position) -> bool {
    if grid.tile(pos) == Some(Tile::Collectible) {
        grid.set_tile(pos, Tile::Empty);
        record.collected += 1;
        true
    } else {
        false
    }
}

/// Whether a dormant trap lies within [`TRAP_RADIUS`] of `pos`
pub fn near_trap(grid: &Grid, pos: Position) -> bool {
    let min_y = pos.y.saturating_sub(TRAP_RADIUS);
    let min_x = pos.x.saturating_sub(TRAP_RADIUS);
    (min_y..=pos.y + TRAP_RADIUS).any(|y| {
        (min_x..=pos.x + TRAP_RADIUS).any(|x| grid.tile(Position::new(x, y)) == Some(Tile::Trap))
    })
}

/// Arms every trap on the grid when `record` stands near a dormant one.
///
/// Armed traps do not fire again until they are settled back to dormant, so
/// one arming costs at most one health. Health never drops below zero.
pub fn trip_traps(grid: &mut Grid, record: &mut PlayerRecord) -> bool {
    if !near_trap(grid, record.position) {
        return false;
    }
    grid.replace_all(Tile::Trap, Tile::TrapAlert);
    record.health = record.health.saturating_sub(1).max(0);
    true
}

/// Returns armed traps to dormant
pub fn settle_traps(grid: &mut Grid) -> usize {
    grid.replace_all(Tile::TrapAlert, Tile::Trap)
}

pub fn trap_status(record: &PlayerRecord) -> String {
    format!(
        "Trap activated! {} has {} health left",
        record.identity, record.health
    )
}

/// Applies `action` for `identity` to a grid and player map.
///
/// Unknown identities and blocked moves leave everything untouched.
pub fn apply_action(
    grid: &mut Grid,
    players: &mut HashMap<String, PlayerRecord>,
    identity: &str,
    action: &Action,
    block_stacking: bool,
) -> ActionOutcome {
    let mut outcome = ActionOutcome::default();

    let Some(from) = players.get(identity).map(|p| p.position) else {
        return outcome;
    };

    match *action {
        Action::Move { dx, dy } => {
            match resolve_move(grid, players, identity, from, dx, dy, block_stacking) {
                Ok(target) => {
                    if let Some(record) = players.get_mut(identity) {
                        record.position = target;
                        outcome.collected = collect_at(grid, record, target);
                        outcome.moved = true;
                        if trip_traps(grid, record) {
                            outcome.tripped = true;
                            outcome.status = Some(trap_status(record));
                        }
                    }
                }
                Err(block) => outcome.blocked = Some(block),
            }
        }
        Action::Interact => {
            outcome.status = Some(format!("{} interacted at {}", identity, from));
        }
    }

    outcome
}
