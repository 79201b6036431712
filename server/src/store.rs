//! Authoritative state store
//!
//! The store owns the grid, the player records, the status message and the
//! sequence ledger. Every operation, including snapshot reads, runs inside the
//! same exclusive lock, so from a caller's point of view the store behaves as if
//! it were single threaded. Nothing awaits while the lock is held; the hold
//! time is bounded by one update application.
//!
//! Update handling follows one order of checks for both update shapes:
//! 1. a sequence number at or below the ledger value is a duplicate and is
//!    acknowledged without touching anything
//! 2. an identity that never joined is rejected
//! 3. the payload is validated; invalid payloads are rejected and the ledger
//!    does not advance
//! 4. the payload is applied and the ledger advances
//!
//! A rejected update leaves the store exactly as it was before the call.
//!
//! Tiles only change in three ways: a collectible is picked up, traps arm when
//! a player moves near one, and armed traps settle back to dormant once the
//! alert period has passed. Settling is checked lazily whenever the lock is
//! taken.

use crate::ledger::SequenceLedger;
use crate::spawn::SpawnAllocator;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::rules::{
    apply_action, check_position, collect_at, near_trap, settle_traps, trap_status,
};
use shared::{
    snapshot_reply_size, Action, ClientCommand, ClientUpdate, GameState, Grid, PlayerRecord,
    Tile, TileChange, MAX_DATAGRAM_SIZE, MAX_IDENTITY_LEN,
};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

/// Fatal or join-time store errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("map has no passable tile to spawn players on")]
    NoPassableTile,
    #[error("identity must not be empty")]
    InvalidIdentity,
    #[error("identity is {0} bytes; the limit is {max}", max = MAX_IDENTITY_LEN)]
    IdentityTooLong(usize),
    #[error("no room for another player in a snapshot")]
    WorldFull,
}

/// Reasons an update or command is rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UpdateError {
    #[error("unknown identity '{0}'")]
    UnknownIdentity(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Sequence already applied; nothing was changed
    Duplicate,
}

#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    /// Refuse moves onto a tile held by another identity
    pub block_stacking: bool,
    /// How long armed traps stay armed
    pub trap_alert: Duration,
    /// Joins that would push an encoded snapshot past this are refused
    pub max_snapshot_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            block_stacking: true,
            trap_alert: Duration::from_secs(3),
            max_snapshot_bytes: MAX_DATAGRAM_SIZE,
        }
    }
}

struct World {
    state: GameState,
    ledger: SequenceLedger,
    spawns: SpawnAllocator,
    rng: StdRng,
    config: StoreConfig,
    /// When armed traps go back to dormant
    traps_settle_at: Option<Instant>,
}

pub struct StateStore {
    world: Mutex<World>,
}

impl StateStore {
    /// Creates a store over a freshly loaded grid.
    ///
    /// Fails when the grid has nowhere to spawn players.
    pub fn new(grid: Grid, config: StoreConfig) -> Result<Self, StoreError> {
        Self::with_rng(grid, config, StdRng::from_entropy())
    }

    /// Like [`new`](Self::new) with a caller-supplied random source for spawns
    pub fn with_rng(grid: Grid, config: StoreConfig, rng: StdRng) -> Result<Self, StoreError> {
        let spawns = SpawnAllocator::new(&grid).ok_or(StoreError::NoPassableTile)?;
        info!(
            "Loaded {}x{} map with {} spawn tiles",
            grid.width(),
            grid.height(),
            spawns.pool().len()
        );

        Ok(Self {
            world: Mutex::new(World {
                state: GameState::new(grid),
                ledger: SequenceLedger::new(),
                spawns,
                rng,
                config,
                traps_settle_at: None,
            }),
        })
    }

    /// Takes the lock and brings timed tile state up to date
    async fn lock(&self) -> MutexGuard<'_, World> {
        let mut world = self.world.lock().await;
        world.settle_traps();
        world
    }

    /// Registers `identity` or treats the call as a reconnect.
    ///
    /// A reconnecting identity keeps its position and score. A new identity
    /// is refused when its record would make the snapshot too large to send.
    pub async fn join(&self, identity: &str) -> Result<GameState, StoreError> {
        if identity.trim().is_empty() {
            return Err(StoreError::InvalidIdentity);
        }
        if identity.len() > MAX_IDENTITY_LEN {
            return Err(StoreError::IdentityTooLong(identity.len()));
        }

        let mut world = self.lock().await;

        if world.state.players.contains_key(identity) {
            info!("Player '{}' reconnected", identity);
        } else {
            let World { spawns, rng, .. } = &mut *world;
            let position = spawns.allocate(rng).ok_or(StoreError::NoPassableTile)?;
            let record = PlayerRecord::new(identity, position);

            if !world.has_room_for(&record) {
                warn!("Refusing '{}': snapshot would not fit", identity);
                return Err(StoreError::WorldFull);
            }

            world.state.players.insert(identity.to_string(), record);
            info!("Player '{}' joined at {}", identity, position);
        }

        Ok(world.snapshot())
    }

    /// Independent copy of the current state
    pub async fn snapshot(&self) -> GameState {
        self.lock().await.snapshot()
    }

    /// Applies a full-replace update
    pub async fn apply_update(&self, update: &ClientUpdate) -> Result<ApplyOutcome, UpdateError> {
        self.lock().await.apply_update(update)
    }

    /// Applies a delta command
    pub async fn apply_command(
        &self,
        command: &ClientCommand,
    ) -> Result<ApplyOutcome, UpdateError> {
        self.lock().await.apply_command(command)
    }

    pub async fn set_status(&self, status: String) {
        self.lock().await.state.status = status;
    }

    /// Identity with the most collectibles; ties go to the smallest identity
    pub async fn leader(&self) -> Option<(String, u32)> {
        let world = self.lock().await;
        world
            .state
            .players
            .values()
            .max_by(|a, b| {
                a.collected
                    .cmp(&b.collected)
                    .then_with(|| b.identity.cmp(&a.identity))
            })
            .map(|p| (p.identity.clone(), p.collected))
    }

    pub async fn player_count(&self) -> usize {
        self.lock().await.state.players.len()
    }
}

impl World {
    fn snapshot(&self) -> GameState {
        let mut snapshot = self.state.clone();
        snapshot.acknowledged = self.ledger.entries();
        snapshot
    }

    /// Whether adding `record`, and later a ledger entry for it, keeps the
    /// snapshot within the configured size
    fn has_room_for(&self, record: &PlayerRecord) -> bool {
        let mut candidate = self.snapshot();
        candidate
            .players
            .insert(record.identity.clone(), record.clone());
        candidate.acknowledged.insert(record.identity.clone(), i64::MAX);
        snapshot_reply_size(&candidate).is_some_and(|size| size <= self.config.max_snapshot_bytes)
    }

    fn arm_traps(&mut self) {
        self.traps_settle_at = Some(Instant::now() + self.config.trap_alert);
    }

    fn settle_traps(&mut self) {
        if let Some(at) = self.traps_settle_at {
            if Instant::now() >= at {
                let settled = settle_traps(&mut self.state.grid);
                self.traps_settle_at = None;
                debug!("{} traps back to dormant", settled);
            }
        }
    }

    /// Steps 1 and 2 of update handling. `Ok(true)` means carry on.
    fn admit(&self, identity: &str, sequence: i64) -> Result<bool, UpdateError> {
        if !self.ledger.is_new(identity, sequence) {
            debug!("Duplicate update {} from '{}'", sequence, identity);
            return Ok(false);
        }
        if !self.state.players.contains_key(identity) {
            return Err(UpdateError::UnknownIdentity(identity.to_string()));
        }
        Ok(true)
    }

    fn apply_update(&mut self, update: &ClientUpdate) -> Result<ApplyOutcome, UpdateError> {
        let identity = update.identity.as_str();
        if !self.admit(identity, update.sequence)? {
            return Ok(ApplyOutcome::Duplicate);
        }

        if update.record.identity != identity {
            return Err(UpdateError::InvalidPayload(format!(
                "record belongs to '{}'",
                update.record.identity
            )));
        }

        let target = update.record.position;
        check_position(
            &self.state.grid,
            &self.state.players,
            identity,
            target,
            self.config.block_stacking,
        )
        .map_err(|block| {
            UpdateError::InvalidPayload(format!("cannot stand on {}: {:?}", target, block))
        })?;

        let mut record = match self.state.players.get(identity) {
            Some(record) => record.clone(),
            None => return Err(UpdateError::UnknownIdentity(identity.to_string())),
        };
        record.position = target;
        record.health = update.record.health;
        // pickups are credited here, never taken from the client's count
        if collect_at(&mut self.state.grid, &mut record, target) {
            debug!("'{}' collected at {}", identity, target);
        }
        // health already reflects the client's own trap prediction
        if near_trap(&self.state.grid, target) {
            self.state.grid.replace_all(Tile::Trap, Tile::TrapAlert);
            self.state.status = trap_status(&record);
            self.arm_traps();
        }
        self.state.players.insert(identity.to_string(), record);

        if let Some(change) = update.tile_change {
            self.apply_tile_change(change);
        }

        self.ledger.accept(identity, update.sequence);
        Ok(ApplyOutcome::Applied)
    }

    fn apply_command(&mut self, command: &ClientCommand) -> Result<ApplyOutcome, UpdateError> {
        let identity = command.identity.as_str();
        if !self.admit(identity, command.sequence)? {
            return Ok(ApplyOutcome::Duplicate);
        }

        if let Action::Move { dx, dy } = command.action {
            if !(-1..=1).contains(&dx) || !(-1..=1).contains(&dy) {
                return Err(UpdateError::InvalidPayload(format!(
                    "move ({}, {}) is more than one step",
                    dx, dy
                )));
            }
        }

        let outcome = apply_action(
            &mut self.state.grid,
            &mut self.state.players,
            identity,
            &command.action,
            self.config.block_stacking,
        );
        if let Some(block) = outcome.blocked {
            debug!("Move by '{}' blocked: {:?}", identity, block);
        }
        if outcome.tripped {
            self.arm_traps();
        }
        if let Some(status) = outcome.status {
            self.state.status = status;
        }

        self.ledger.accept(identity, command.sequence);
        Ok(ApplyOutcome::Applied)
    }

    /// The only change a client may report is a collectible turning empty.
    /// Everything else is silently dropped.
    fn apply_tile_change(&mut self, change: TileChange) {
        let current = self.state.grid.tile(change.position);
        if change.tile != Tile::Empty || current != Some(Tile::Collectible) {
            debug!(
                "Ignoring tile change to {:?} at {} (currently {:?})",
                change.tile, change.position, current
            );
            return;
        }
        self.state.grid.set_tile(change.position, Tile::Empty);
    }
}
