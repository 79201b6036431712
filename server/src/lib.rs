//! # Tile World Server Library
//!
//! This library provides the authoritative server for the multiplayer tile
//! world. One process owns the shared game state; clients read and mutate it
//! through four remote calls carried over UDP.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! The server holds the only true copy of the grid, the player records and the
//! status line. Clients predict locally, but whatever the server applies is
//! what every client eventually sees.
//!
//! ### Exactly-Once Application
//! Clients may deliver the same update more than once, and out of order. Every
//! update carries a per-client sequence number; the sequence ledger records the
//! highest one applied per identity, and anything at or below it is
//! acknowledged without being applied again.
//!
//! ### Serialized Mutation
//! Requests are served concurrently, one task per request, but every store
//! operation runs under a single exclusive lock. Updates from different players
//! are therefore serialized against each other; there is no ordering guarantee
//! between players beyond that.
//!
//! ## Module Organization
//!
//! ### Ledger Module (`ledger`)
//! Per-identity highest applied sequence number.
//!
//! ### Spawn Module (`spawn`)
//! Random spawn tile selection from a pool computed once at load.
//!
//! ### Store Module (`store`)
//! The authoritative state store: join, snapshot, full-replace updates and
//! delta commands.
//!
//! ### RPC Module (`rpc`)
//! Maps wire calls onto store operations and store errors onto replies.
//!
//! ### Network Module (`network`)
//! UDP receive loop, per-request tasks, response encoding.
//!
//! ### Round Module (`round`)
//! Optional timed round with a countdown and a winner announcement.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::store::{StateStore, StoreConfig};
//! use shared::Grid;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let grid = Grid::parse("▤▤▤▤\n▤ ♣▤\n▤▤▤▤")?;
//!     let store = Arc::new(StateStore::new(grid, StoreConfig::default())?);
//!
//!     let server = Server::new("127.0.0.1:1234", store).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod ledger;
pub mod network;
pub mod round;
pub mod rpc;
pub mod spawn;
pub mod store;
