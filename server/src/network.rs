//! Server network layer handling UDP request/response traffic
//!
//! Each datagram carries one bincode-encoded [`Packet`]. The receive loop
//! decodes requests and hands every one to its own task, which runs the call
//! against the shared store and sends exactly one response back to the
//! sender's address.

use crate::rpc::dispatch;
use crate::store::StateStore;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Call, Packet, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;

/// Authoritative server endpoint
pub struct Server {
    socket: Arc<UdpSocket>,
    store: Arc<StateStore>,
}

impl Server {
    pub async fn new(
        addr: &str,
        store: Arc<StateStore>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        Ok(Server { socket, store })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn store(&self) -> Arc<StateStore> {
        Arc::clone(&self.store)
    }

    /// Runs one call and answers it
    async fn handle_request(
        socket: Arc<UdpSocket>,
        store: Arc<StateStore>,
        request_id: u64,
        call: Call,
        addr: SocketAddr,
    ) {
        let reply = dispatch(&store, call).await;
        let packet = Packet::Response { request_id, reply };
        Self::send_packet_impl(&socket, &packet, addr).await;
    }

    async fn send_packet_impl(socket: &UdpSocket, packet: &Packet, addr: SocketAddr) {
        let data = match serialize(packet) {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to encode response for {}: {}", addr, e);
                return;
            }
        };

        if data.len() > MAX_DATAGRAM_SIZE {
            error!(
                "Response for {} is {} bytes, larger than one datagram; dropped",
                addr,
                data.len()
            );
            return;
        }

        if let Err(e) = socket.send_to(&data, addr).await {
            error!("Failed to send packet to {}: {}", addr, e);
        }
    }

    /// Receive loop; spawns one task per request and never returns under
    /// normal operation
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        info!("Server started successfully");

        loop {
            match self.socket.recv_from(&mut buffer).await {
                Ok((len, addr)) => match deserialize::<Packet>(&buffer[..len]) {
                    Ok(Packet::Request { request_id, call }) => {
                        debug!("Request {} from {}", request_id, addr);
                        tokio::spawn(Self::handle_request(
                            Arc::clone(&self.socket),
                            Arc::clone(&self.store),
                            request_id,
                            call,
                            addr,
                        ));
                    }
                    Ok(Packet::Response { .. }) => {
                        warn!("Unexpected response packet from {}", addr);
                    }
                    Err(_) => {
                        warn!("Failed to deserialize packet from {}", addr);
                    }
                },
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}
