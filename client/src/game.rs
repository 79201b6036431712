//! Client-side copy of the game state with optimistic prediction
//!
//! Local actions are validated and applied to the local copy immediately, using
//! the same rules the server runs. Snapshots fetched from the server replace the
//! local copy wholesale; what happens to predictions the snapshot does not yet
//! reflect depends on the [`ReconcileMode`].

use log::debug;
use shared::rules::apply_action;
use shared::{Action, GameState, PlayerRecord, Tile, TileChange};

/// Stacking is always checked locally; the server has the final word.
const BLOCK_STACKING: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileMode {
    /// Overwrite the local copy; unconfirmed predictions are lost and the
    /// player may visibly snap back
    #[default]
    Replace,
    /// Overwrite, then re-apply predictions the server has not acknowledged
    Replay,
}

/// A local action that passed validation and was applied to the local copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub action: Action,
    /// Own record after the action
    pub record: PlayerRecord,
    /// Tile cleared by a pickup, if any
    pub tile_change: Option<TileChange>,
}

#[derive(Debug, Clone)]
struct PendingAction {
    sequence: i64,
    action: Action,
}

pub struct ClientGameState {
    identity: String,
    state: GameState,
    pending: Vec<PendingAction>,
    mode: ReconcileMode,
}

impl ClientGameState {
    pub fn new(identity: &str, snapshot: GameState, mode: ReconcileMode) -> Self {
        Self {
            identity: identity.to_string(),
            state: snapshot,
            pending: Vec::new(),
            mode,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn own_record(&self) -> Option<&PlayerRecord> {
        self.state.player(&self.identity)
    }

    pub fn mode(&self) -> ReconcileMode {
        self.mode
    }

    /// Number of sent actions not yet reflected in a server snapshot
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Validates `action` against the local copy and applies it.
    ///
    /// Returns None for a move that is out of bounds, into a wall or onto
    /// another known player; the local copy is left untouched in that case.
    pub fn predict(&mut self, action: Action) -> Option<Prediction> {
        let outcome = apply_action(
            &mut self.state.grid,
            &mut self.state.players,
            &self.identity,
            &action,
            BLOCK_STACKING,
        );

        if let Some(block) = outcome.blocked {
            debug!("Local move blocked: {:?}", block);
            return None;
        }
        if let Some(status) = outcome.status {
            self.state.status = status;
        }

        let record = self.own_record()?.clone();
        let tile_change = outcome.collected.then_some(TileChange {
            position: record.position,
            tile: Tile::Empty,
        });

        Some(Prediction {
            action,
            record,
            tile_change,
        })
    }

    /// Remembers an action sent to the server under `sequence`
    pub fn record_pending(&mut self, sequence: i64, action: Action) {
        self.pending.push(PendingAction { sequence, action });
    }

    /// Replaces the local copy with a server snapshot
    pub fn apply_server_state(&mut self, snapshot: GameState) {
        let acknowledged = snapshot.acknowledged_for(&self.identity);
        self.pending.retain(|p| p.sequence > acknowledged);
        self.state = snapshot;

        if self.pending.is_empty() {
            return;
        }

        match self.mode {
            ReconcileMode::Replace => {
                debug!(
                    "Snapshot overwrote {} unconfirmed predictions",
                    self.pending.len()
                );
            }
            ReconcileMode::Replay => {
                for pending in &self.pending {
                    apply_action(
                        &mut self.state.grid,
                        &mut self.state.players,
                        &self.identity,
                        &pending.action,
                        BLOCK_STACKING,
                    );
                }
                debug!("Replayed {} unconfirmed predictions", self.pending.len());
            }
        }
    }
}
