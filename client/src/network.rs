use crate::game::{ClientGameState, Prediction, ReconcileMode};
use crate::input::{InputEvent, InputManager};
use crate::rendering::Renderer;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{
    Action, Call, ClientCommand, ClientUpdate, GameState, Packet, Reply, MAX_DATAGRAM_SIZE,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::net::UdpSocket;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    #[error("connection closed before a reply arrived")]
    Closed,
    #[error("server refused the call: {0}")]
    Remote(String),
    #[error("unexpected reply to {0}")]
    UnexpectedReply(&'static str),
}

type PendingCalls = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

/// Request/response calls to the game server over UDP.
///
/// Replies are matched to calls by request id, so any number of calls may be
/// in flight at once. With no timeout configured a lost datagram leaves its
/// call waiting forever.
pub struct RpcClient {
    socket: Arc<UdpSocket>,
    pending: PendingCalls,
    next_request_id: AtomicU64,
    timeout: Option<Duration>,
    receiver: JoinHandle<()>,
}

impl RpcClient {
    pub async fn connect(server_addr: &str, timeout: Option<Duration>) -> Result<Self, RpcError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(server_addr).await?;
        info!("Talking to server at {}", socket.peer_addr()?);

        let socket = Arc::new(socket);
        let pending: PendingCalls = Arc::new(Mutex::new(HashMap::new()));
        let receiver = tokio::spawn(Self::receive_loop(
            Arc::clone(&socket),
            Arc::clone(&pending),
        ));

        Ok(Self {
            socket,
            pending,
            next_request_id: AtomicU64::new(1),
            timeout,
            receiver,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RpcError> {
        Ok(self.socket.local_addr()?)
    }

    async fn receive_loop(socket: Arc<UdpSocket>, pending: PendingCalls) {
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            match socket.recv(&mut buffer).await {
                Ok(len) => match deserialize::<Packet>(&buffer[..len]) {
                    Ok(Packet::Response { request_id, reply }) => {
                        match pending.lock().await.remove(&request_id) {
                            Some(sender) => {
                                let _ = sender.send(reply);
                            }
                            None => debug!("Dropping late reply to request {}", request_id),
                        }
                    }
                    Ok(Packet::Request { .. }) => warn!("Ignoring request sent to a client"),
                    Err(e) => warn!("Failed to decode reply: {}", e),
                },
                Err(e) => {
                    error!("Error receiving reply: {}", e);
                    sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    /// Sends one call and waits for its reply
    pub async fn call(&self, call: Call) -> Result<Reply, RpcError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let data = serialize(&Packet::Request { request_id, call })?;

        let (sender, receiver) = oneshot::channel();
        self.pending.lock().await.insert(request_id, sender);

        if let Err(e) = self.socket.send(&data).await {
            self.pending.lock().await.remove(&request_id);
            return Err(e.into());
        }

        let reply = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, receiver).await {
                Ok(reply) => reply,
                Err(_) => {
                    self.pending.lock().await.remove(&request_id);
                    return Err(RpcError::Timeout(limit));
                }
            },
            None => receiver.await,
        };

        reply.map_err(|_| RpcError::Closed)
    }

    /// Registers `identity` and returns the snapshot taken right after
    pub async fn join(&self, identity: &str) -> Result<GameState, RpcError> {
        let call = Call::Join {
            identity: identity.to_string(),
        };
        match self.call(call).await? {
            Reply::Snapshot(state) => Ok(state),
            Reply::Failed { reason } => Err(RpcError::Remote(reason)),
            Reply::Ack(_) => Err(RpcError::UnexpectedReply("join")),
        }
    }

    pub async fn get_snapshot(&self) -> Result<GameState, RpcError> {
        match self.call(Call::GetSnapshot).await? {
            Reply::Snapshot(state) => Ok(state),
            Reply::Failed { reason } => Err(RpcError::Remote(reason)),
            Reply::Ack(_) => Err(RpcError::UnexpectedReply("get_snapshot")),
        }
    }

    /// Returns whether the server accepted the update (true also for a duplicate)
    pub async fn submit_update(&self, update: ClientUpdate) -> Result<bool, RpcError> {
        match self.call(Call::SubmitUpdate(update)).await? {
            Reply::Ack(accepted) => Ok(accepted),
            Reply::Failed { reason } => Err(RpcError::Remote(reason)),
            Reply::Snapshot(_) => Err(RpcError::UnexpectedReply("submit_update")),
        }
    }

    pub async fn submit_command(&self, command: ClientCommand) -> Result<bool, RpcError> {
        match self.call(Call::SubmitCommand(command)).await? {
            Reply::Ack(accepted) => Ok(accepted),
            Reply::Failed { reason } => Err(RpcError::Remote(reason)),
            Reply::Snapshot(_) => Err(RpcError::UnexpectedReply("submit_command")),
        }
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}

/// What a client sends for each accepted local action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum UpdateMode {
    /// The action itself; the server computes the result
    #[default]
    Command,
    /// The full predicted player record plus any tile it cleared. Interactions
    /// still go out as commands.
    Full,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: String,
    pub identity: String,
    pub poll_interval: Duration,
    /// None waits for replies forever
    pub call_timeout: Option<Duration>,
    pub update_mode: UpdateMode,
    pub reconcile_mode: ReconcileMode,
    pub render: bool,
}

impl ClientConfig {
    pub fn new(server: &str, identity: &str) -> Self {
        Self {
            server: server.to_string(),
            identity: identity.to_string(),
            poll_interval: Duration::from_millis(150),
            call_timeout: Some(Duration::from_millis(2000)),
            update_mode: UpdateMode::Command,
            reconcile_mode: ReconcileMode::Replace,
            render: true,
        }
    }
}

pub struct Client {
    rpc: Arc<RpcClient>,
    identity: String,
    game_state: Arc<Mutex<ClientGameState>>,
    input_manager: InputManager,
    renderer: Renderer,
    update_mode: UpdateMode,
    poll_interval: Duration,
}

impl Client {
    /// Connects, joins and seeds the local copy from the join snapshot.
    ///
    /// Sequence numbering resumes after whatever the server last applied for
    /// this identity, so a reconnecting player is not treated as a replay.
    pub async fn connect(config: ClientConfig) -> Result<Self, RpcError> {
        let rpc = RpcClient::connect(&config.server, config.call_timeout).await?;
        let snapshot = rpc.join(&config.identity).await?;

        let acknowledged = snapshot.acknowledged_for(&config.identity);
        if acknowledged > 0 {
            info!(
                "Rejoined as {}; resuming after sequence {}",
                config.identity, acknowledged
            );
        } else {
            info!("Joined as {}", config.identity);
        }

        let renderer = Renderer::new(config.render);
        renderer.render(&snapshot, &config.identity);

        Ok(Self {
            rpc: Arc::new(rpc),
            identity: config.identity.clone(),
            game_state: Arc::new(Mutex::new(ClientGameState::new(
                &config.identity,
                snapshot,
                config.reconcile_mode,
            ))),
            input_manager: InputManager::resume_after(acknowledged),
            renderer,
            update_mode: config.update_mode,
            poll_interval: config.poll_interval,
        })
    }

    pub fn rpc(&self) -> Arc<RpcClient> {
        Arc::clone(&self.rpc)
    }

    pub fn game_state(&self) -> Arc<Mutex<ClientGameState>> {
        Arc::clone(&self.game_state)
    }

    /// Predicts `action` locally and, if it is valid, sends it without waiting.
    ///
    /// Returns the handle of the submission task, or None when the action was
    /// rejected locally and nothing was sent.
    pub async fn handle_action(&mut self, action: Action) -> Option<JoinHandle<()>> {
        let (prediction, sequence) = {
            let mut game_state = self.game_state.lock().await;
            let prediction = game_state.predict(action)?;
            let sequence = self.input_manager.next_sequence();
            game_state.record_pending(sequence, action);
            self.renderer.render(game_state.state(), &self.identity);
            (prediction, sequence)
        };

        Some(self.spawn_submission(prediction, sequence))
    }

    fn spawn_submission(&self, prediction: Prediction, sequence: i64) -> JoinHandle<()> {
        let rpc = Arc::clone(&self.rpc);
        let identity = self.identity.clone();
        let update_mode = self.update_mode;

        tokio::spawn(async move {
            // a full record cannot express an interaction, so it always goes as a command
            let as_command = update_mode == UpdateMode::Command
                || matches!(prediction.action, Action::Interact);
            let result = if as_command {
                rpc.submit_command(ClientCommand {
                    identity,
                    sequence,
                    action: prediction.action,
                })
                .await
            } else {
                rpc.submit_update(ClientUpdate {
                    identity,
                    sequence,
                    record: prediction.record,
                    tile_change: prediction.tile_change,
                })
                .await
            };

            match result {
                Ok(true) => debug!("Sequence {} acknowledged", sequence),
                Ok(false) => warn!("Server rejected sequence {}", sequence),
                Err(e) => warn!("Failed to submit sequence {}: {}", sequence, e),
            }
        })
    }

    /// Periodically fetches a snapshot and reconciles the local copy with it
    pub fn spawn_poller(&self) -> JoinHandle<()> {
        let rpc = Arc::clone(&self.rpc);
        let game_state = Arc::clone(&self.game_state);
        let renderer = self.renderer;
        let identity = self.identity.clone();
        let period = self.poll_interval;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match rpc.get_snapshot().await {
                    Ok(snapshot) => {
                        let mut game_state = game_state.lock().await;
                        game_state.apply_server_state(snapshot);
                        renderer.render(game_state.state(), &identity);
                    }
                    Err(e) => warn!("Failed to fetch snapshot: {}", e),
                }
            }
        })
    }

    /// Reads key lines from `input` until quit or end of input
    pub async fn run<R>(&mut self, input: R) -> Result<(), RpcError>
    where
        R: AsyncBufRead + Unpin,
    {
        let poller = self.spawn_poller();
        let mut lines = input.lines();

        let result = loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(()),
                Err(e) => break Err(RpcError::Io(e)),
            };

            let mut quit = false;
            for event in self.input_manager.decode(&line) {
                match event {
                    InputEvent::Action(action) => {
                        if self.handle_action(action).await.is_none() {
                            debug!("Ignoring blocked action {:?}", action);
                        }
                    }
                    InputEvent::Quit => {
                        quit = true;
                        break;
                    }
                }
            }
            if quit {
                break Ok(());
            }
        };

        poller.abort();
        info!("Client stopped");
        result
    }
}
