use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod grid;
pub mod rules;

pub use grid::{Grid, GridError, Position, Tile};

pub const DEFAULT_HEALTH: i32 = 3;
pub const DEFAULT_PORT: u16 = 1234;
pub const DEFAULT_STATUS: &str = "Server online. Welcome!";

/// Largest UDP payload we ever send or expect to receive
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Longest identity, in bytes, a server will register
pub const MAX_IDENTITY_LEN: usize = 64;

/// Requests are answered with exactly one response carrying the same id
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Request { request_id: u64, call: Call },
    Response { request_id: u64, reply: Reply },
}

/// The four remote operations
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Call {
    Join { identity: String },
    GetSnapshot,
    SubmitUpdate(ClientUpdate),
    SubmitCommand(ClientCommand),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Reply {
    Snapshot(GameState),
    /// true means applied or already applied
    Ack(bool),
    Failed { reason: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub identity: String,
    pub position: Position,
    pub health: i32,
    pub collected: u32,
}

impl PlayerRecord {
    pub fn new(identity: &str, position: Position) -> Self {
        Self {
            identity: identity.to_string(),
            position,
            health: DEFAULT_HEALTH,
            collected: 0,
        }
    }
}

/// Full copy of the authoritative state at one instant
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GameState {
    pub grid: Grid,
    pub players: HashMap<String, PlayerRecord>,
    pub status: String,
    /// Highest applied sequence number per identity
    pub acknowledged: HashMap<String, i64>,
}

impl GameState {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            players: HashMap::new(),
            status: DEFAULT_STATUS.to_string(),
            acknowledged: HashMap::new(),
        }
    }

    pub fn player(&self, identity: &str) -> Option<&PlayerRecord> {
        self.players.get(identity)
    }

    pub fn acknowledged_for(&self, identity: &str) -> i64 {
        self.acknowledged.get(identity).copied().unwrap_or(0)
    }
}

/// Encoded size of the response packet carrying a snapshot of `state`
pub fn snapshot_reply_size(state: &GameState) -> Option<usize> {
    let packet = Packet::Response {
        request_id: u64::MAX,
        reply: Reply::Snapshot(state.clone()),
    };
    bincode::serialized_size(&packet)
        .ok()
        .map(|size| size as usize)
}

/// Whether a snapshot of `state` fits in a single response datagram
pub fn fits_in_datagram(state: &GameState) -> bool {
    snapshot_reply_size(state).is_some_and(|size| size <= MAX_DATAGRAM_SIZE)
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Move { dx: i32, dy: i32 },
    Interact,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct TileChange {
    pub position: Position,
    pub tile: Tile,
}

/// Full-replace update: the client's view of its own record after a local action
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ClientUpdate {
    pub identity: String,
    pub sequence: i64,
    pub record: PlayerRecord,
    pub tile_change: Option<TileChange>,
}

/// Delta update: the action the client performed
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ClientCommand {
    pub identity: String,
    pub sequence: i64,
    pub action: Action,
}
