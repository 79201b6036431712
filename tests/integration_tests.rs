//! Integration tests for the tile world server and client
//!
//! These tests run a real server on a loopback UDP socket and talk to it
//! through the client library.

use client::network::{Client, ClientConfig, RpcClient, UpdateMode};
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::network::Server;
use server::store::{StateStore, StoreConfig};
use shared::{Action, ClientCommand, ClientUpdate, GameState, Grid, Position, Tile};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

const SMALL_MAP: &str = "▤▤▤\n▤ ♣\n▤▤▤";
const ROOM_MAP: &str = "▤▤▤▤▤▤\n▤    ▤\n▤ ♣  ▤\n▤    ▤\n▤▤▤▤▤▤";

async fn start_server(map: &str) -> (SocketAddr, JoinHandle<()>) {
    let grid = Grid::parse(map).unwrap();
    let store =
        StateStore::with_rng(grid, StoreConfig::default(), StdRng::seed_from_u64(7)).unwrap();
    let server = Server::new("127.0.0.1:0", Arc::new(store)).await.unwrap();
    let addr = server.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let _ = server.run().await;
    });
    (addr, handle)
}

async fn connect(addr: SocketAddr) -> RpcClient {
    RpcClient::connect(&addr.to_string(), Some(Duration::from_secs(2)))
        .await
        .unwrap()
}

fn command(identity: &str, sequence: i64, action: Action) -> ClientCommand {
    ClientCommand {
        identity: identity.to_string(),
        sequence,
        action,
    }
}

fn quiet_config(addr: SocketAddr, identity: &str) -> ClientConfig {
    let mut config = ClientConfig::new(&addr.to_string(), identity);
    config.render = false;
    config.poll_interval = Duration::from_millis(20);
    config
}

/// Polls until `check` holds for a snapshot, or gives up after two seconds
async fn wait_for<F>(rpc: &RpcClient, check: F) -> GameState
where
    F: Fn(&GameState) -> bool,
{
    for _ in 0..100 {
        let snapshot = rpc.get_snapshot().await.unwrap();
        if check(&snapshot) {
            return snapshot;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached within two seconds");
}

/// SCENARIO TESTS
mod scenario_tests {
    use super::*;

    /// Pickup, duplicate resend, and a second player seeing the result
    #[tokio::test]
    async fn pickup_then_duplicate_then_second_player() {
        let (addr, server) = start_server(SMALL_MAP).await;
        let alice = connect(addr).await;

        let joined = alice.join("A").await.unwrap();
        assert_eq!(joined.players["A"].position, Position::new(1, 1));
        assert_eq!(joined.players["A"].collected, 0);

        let step = command("A", 1, Action::Move { dx: 1, dy: 0 });
        assert!(alice.submit_command(step.clone()).await.unwrap());

        let after = alice.get_snapshot().await.unwrap();
        assert_eq!(after.players["A"].position, Position::new(2, 1));
        assert_eq!(after.players["A"].collected, 1);
        assert_eq!(after.grid.tile(Position::new(2, 1)), Some(Tile::Empty));
        assert_eq!(after.acknowledged_for("A"), 1);

        // resend of an applied sequence is acknowledged but changes nothing
        assert!(alice.submit_command(step).await.unwrap());
        assert_eq!(alice.get_snapshot().await.unwrap(), after);

        let bob = connect(addr).await;
        let seen_by_bob = bob.join("B").await.unwrap();
        assert_eq!(seen_by_bob.players["A"].collected, 1);
        assert_eq!(seen_by_bob.players["B"].position, Position::new(1, 1));

        server.abort();
    }

    /// Full-replace updates take position from the record but credit pickups
    /// on the server
    #[tokio::test]
    async fn full_replace_ignores_claimed_score() {
        let (addr, server) = start_server(SMALL_MAP).await;
        let rpc = connect(addr).await;

        let mut record = rpc.join("A").await.unwrap().players["A"].clone();
        record.position = Position::new(2, 1);
        record.collected = 99;

        let update = ClientUpdate {
            identity: "A".to_string(),
            sequence: 1,
            record,
            tile_change: None,
        };
        assert!(rpc.submit_update(update).await.unwrap());

        let snapshot = rpc.get_snapshot().await.unwrap();
        assert_eq!(snapshot.players["A"].position, Position::new(2, 1));
        assert_eq!(snapshot.players["A"].collected, 1);

        server.abort();
    }
}

/// REJECTION TESTS
mod rejection_tests {
    use super::*;

    #[tokio::test]
    async fn unknown_identity_is_rejected() {
        let (addr, server) = start_server(SMALL_MAP).await;
        let rpc = connect(addr).await;

        let accepted = rpc
            .submit_command(command("ghost", 1, Action::Interact))
            .await
            .unwrap();
        assert!(!accepted);

        let snapshot = rpc.get_snapshot().await.unwrap();
        assert!(snapshot.players.is_empty());
        assert_eq!(snapshot.acknowledged_for("ghost"), 0);

        server.abort();
    }

    #[tokio::test]
    async fn older_sequence_after_newer_is_dropped() {
        let (addr, server) = start_server(ROOM_MAP).await;
        let rpc = connect(addr).await;

        let start = rpc.join("A").await.unwrap().players["A"].position;
        assert!(rpc
            .submit_command(command("A", 5, Action::Interact))
            .await
            .unwrap());

        // arrives late; already covered by sequence 5
        assert!(rpc
            .submit_command(command("A", 3, Action::Move { dx: 0, dy: 1 }))
            .await
            .unwrap());

        let snapshot = rpc.get_snapshot().await.unwrap();
        assert_eq!(snapshot.players["A"].position, start);
        assert_eq!(snapshot.acknowledged_for("A"), 5);

        server.abort();
    }

    #[tokio::test]
    async fn oversized_move_is_rejected() {
        let (addr, server) = start_server(ROOM_MAP).await;
        let rpc = connect(addr).await;

        rpc.join("A").await.unwrap();
        let accepted = rpc
            .submit_command(command("A", 1, Action::Move { dx: 2, dy: 0 }))
            .await
            .unwrap();
        assert!(!accepted);
        assert_eq!(rpc.get_snapshot().await.unwrap().acknowledged_for("A"), 0);

        server.abort();
    }

    #[tokio::test]
    async fn blank_identity_cannot_join() {
        let (addr, server) = start_server(SMALL_MAP).await;
        let rpc = connect(addr).await;

        tokio_test::assert_err!(rpc.join("  ").await);

        server.abort();
    }
}

/// CLIENT SESSION TESTS
mod client_session_tests {
    use super::*;

    #[tokio::test]
    async fn keys_from_input_reach_the_server() {
        let (addr, server) = start_server(SMALL_MAP).await;

        let mut client = Client::connect(quiet_config(addr, "A")).await.unwrap();
        client.run(&b"d\nq\n"[..]).await.unwrap();

        let observer = connect(addr).await;
        let snapshot = wait_for(&observer, |s| s.acknowledged_for("A") == 1).await;
        assert_eq!(snapshot.players["A"].position, Position::new(2, 1));
        assert_eq!(snapshot.players["A"].collected, 1);

        server.abort();
    }

    #[tokio::test]
    async fn full_update_mode_reaches_the_server() {
        let (addr, server) = start_server(SMALL_MAP).await;

        let mut config = quiet_config(addr, "A");
        config.update_mode = UpdateMode::Full;
        let mut client = Client::connect(config).await.unwrap();

        let submission = client
            .handle_action(Action::Move { dx: 1, dy: 0 })
            .await
            .unwrap();
        submission.await.unwrap();

        let snapshot = client.rpc().get_snapshot().await.unwrap();
        assert_eq!(snapshot.players["A"].position, Position::new(2, 1));
        assert_eq!(snapshot.players["A"].collected, 1);
        assert_eq!(snapshot.grid.tile(Position::new(2, 1)), Some(Tile::Empty));

        server.abort();
    }

    #[tokio::test]
    async fn reconnect_keeps_record_and_sequence() {
        let (addr, server) = start_server(SMALL_MAP).await;

        {
            let mut first = Client::connect(quiet_config(addr, "A")).await.unwrap();
            let submission = first
                .handle_action(Action::Move { dx: 1, dy: 0 })
                .await
                .unwrap();
            submission.await.unwrap();
        }

        let mut second = Client::connect(quiet_config(addr, "A")).await.unwrap();
        {
            let game_state = second.game_state();
            let game_state = game_state.lock().await;
            assert_eq!(game_state.own_record().unwrap().position, Position::new(2, 1));
            assert_eq!(game_state.state().acknowledged_for("A"), 1);
        }

        // the next action goes out as sequence 2 and is applied
        let submission = second
            .handle_action(Action::Move { dx: -1, dy: 0 })
            .await
            .unwrap();
        submission.await.unwrap();

        let snapshot = second.rpc().get_snapshot().await.unwrap();
        assert_eq!(snapshot.acknowledged_for("A"), 2);
        assert_eq!(snapshot.players["A"].position, Position::new(1, 1));

        server.abort();
    }

    #[tokio::test]
    async fn poller_brings_in_other_players() {
        let (addr, server) = start_server(ROOM_MAP).await;

        let client = Client::connect(quiet_config(addr, "A")).await.unwrap();
        let poller = client.spawn_poller();

        let other = connect(addr).await;
        other.join("B").await.unwrap();

        let game_state = client.game_state();
        let mut seen = false;
        for _ in 0..100 {
            if game_state.lock().await.state().players.contains_key("B") {
                seen = true;
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }
        assert!(seen, "poller never delivered the second player");

        poller.abort();
        server.abort();
    }
}

/// CONCURRENCY TESTS
mod concurrency_tests {
    use super::*;

    /// Many players submitting at once; every update is applied exactly once
    #[tokio::test]
    async fn concurrent_players_are_all_applied() {
        let (addr, server) = start_server(ROOM_MAP).await;

        let mut handles = Vec::new();
        for n in 0..8 {
            handles.push(tokio::spawn(async move {
                let identity = format!("P{}", n);
                let rpc = connect(addr).await;
                rpc.join(&identity).await.unwrap();
                for sequence in 1..=5 {
                    let accepted = rpc
                        .submit_command(command(&identity, sequence, Action::Interact))
                        .await
                        .unwrap();
                    assert!(accepted);
                }
                identity
            }));
        }

        let mut identities = Vec::new();
        for handle in handles {
            identities.push(handle.await.unwrap());
        }

        let snapshot = connect(addr).await.get_snapshot().await.unwrap();
        assert_eq!(snapshot.players.len(), 8);
        for identity in identities {
            assert_eq!(snapshot.acknowledged_for(&identity), 5);
        }

        server.abort();
    }
}
