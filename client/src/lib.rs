//! # Tile World Client Library
//!
//! This library provides the terminal client for the multiplayer tile world.
//! It joins the server under a chosen identity, keeps a local copy of the game
//! state, and turns key presses into updates sent to the server.
//!
//! ## Architecture Overview
//!
//! ### Client-Side Prediction
//! Every local action is checked against the local copy with the same movement
//! rules the server uses, and applied at once. The update is then sent without
//! waiting for the reply, so the player never waits on the network to see a
//! move.
//!
//! ### Polling
//! A background task fetches a full snapshot on a fixed interval and hands it
//! to the local copy. The snapshot always wins; in replay mode the actions the
//! server has not yet acknowledged are re-applied on top of it.
//!
//! ### Sequencing
//! Each update carries a sequence number, strictly increasing per identity.
//! After a reconnect numbering continues from what the server reports as last
//! applied, so nothing new is mistaken for a duplicate.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Local state copy, prediction and reconciliation.
//!
//! ### Input Module (`input`)
//! Key decoding and sequence numbers.
//!
//! ### Network Module (`network`)
//! Request/response calls over UDP and the client run loop.
//!
//! ### Rendering Module (`rendering`)
//! Plain-text drawing of the grid, status line and scores.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{Client, ClientConfig};
//! use tokio::io::BufReader;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("127.0.0.1:1234", "alice");
//!     let mut client = Client::connect(config).await?;
//!
//!     client.run(BufReader::new(tokio::io::stdin())).await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
