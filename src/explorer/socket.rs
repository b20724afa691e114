//! UDP socket layer, encoding outbound and decoding inbound discovery messages.

use std::fmt::Debug;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use tracing::{debug, trace};

use crate::common::{DiscoveryEvent, MessageCodec};

use super::config::Config;

const MTU: usize = 2048;

pub const DEFAULT_PORT: u16 = 5050;
/// The maximum duration to block on an empty [UdpSocket] buffer, before
/// the actor loop gets to check its control messages and scheduled ticks again.
pub const MAX_THREAD_BLOCK_DURATION: Duration = Duration::from_millis(10);

/// Outbound side of the discovery protocol.
///
/// Sends are fire-and-forget, lost packets are recovered by the
/// explorer's retry and expiry logic.
pub trait Transport: Debug + Send {
    /// Send `event.message` to `event.address`.
    fn send(&mut self, event: DiscoveryEvent);
}

impl Transport for flume::Sender<DiscoveryEvent> {
    fn send(&mut self, event: DiscoveryEvent) {
        let _ = flume::Sender::send(self, event);
    }
}

/// A UdpSocket wrapper that decodes and verifies inbound discovery packets.
#[derive(Debug)]
pub struct DiscoverySocket {
    socket: UdpSocket,
    codec: MessageCodec,
    local_addr: SocketAddr,
}

impl DiscoverySocket {
    pub fn bind(config: &Config, codec: MessageCodec) -> Result<Self, std::io::Error> {
        let ip = config
            .bind_address
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        let socket = if let Some(port) = config.port {
            UdpSocket::bind(SocketAddr::new(ip, port))?
        } else {
            match UdpSocket::bind(SocketAddr::new(ip, DEFAULT_PORT)) {
                Ok(socket) => Ok(socket),
                Err(_) => UdpSocket::bind(SocketAddr::new(ip, 0)),
            }?
        };

        socket.set_read_timeout(Some(MAX_THREAD_BLOCK_DURATION))?;

        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            codec,
            local_addr,
        })
    }

    // === Getters ===

    /// Returns the address the socket is listening to.
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    // === Public Methods ===

    /// A [Transport] sending through this socket.
    pub fn transport(&self) -> Result<UdpTransport, std::io::Error> {
        Ok(UdpTransport {
            socket: self.socket.try_clone()?,
            codec: self.codec.clone(),
        })
    }

    /// Receives a single discovery packet on the socket, blocking for at most
    /// [MAX_THREAD_BLOCK_DURATION].
    ///
    /// Returns `None` on timeout, or if the packet was invalid.
    pub fn recv_from(&mut self) -> Option<DiscoveryEvent> {
        let mut buf = [0u8; MTU];

        match self.socket.recv_from(&mut buf) {
            Ok((amount, from)) => {
                let bytes = &buf[..amount];

                if from.port() == 0 {
                    trace!(
                        context = "socket_validation",
                        message = "Packet from port 0"
                    );
                    return None;
                }

                match self.codec.decode(bytes) {
                    Ok(message) => {
                        trace!(
                            context = "socket_message_receiving",
                            ?message,
                            ?from,
                            "Received discovery message"
                        );

                        return Some(DiscoveryEvent::new(message, from));
                    }
                    Err(error) => {
                        debug!(
                            context = "socket_error",
                            ?error,
                            ?from,
                            payload = %to_hex(bytes),
                            "Received invalid discovery packet."
                        );
                    }
                }
            }
            Err(error) => match error.kind() {
                ErrorKind::WouldBlock | ErrorKind::TimedOut => {}
                _ => {
                    debug!(context = "socket_error", ?error, "recv_from failed unexpectedly");
                }
            },
        }

        None
    }
}

#[derive(Debug)]
/// [Transport] writing signed packets to a UDP socket.
pub struct UdpTransport {
    socket: UdpSocket,
    codec: MessageCodec,
}

impl UdpTransport {
    fn send_to(&mut self, event: &DiscoveryEvent) -> Result<(), SendMessageError> {
        let bytes = self.codec.encode(&event.message)?;
        self.socket.send_to(&bytes, event.address)?;

        trace!(context = "socket_message_sending", message = ?event.message, to = ?event.address);
        Ok(())
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, event: DiscoveryEvent) {
        let _ = self.send_to(&event).map_err(|error| {
            debug!(?error, address = ?event.address, "Error sending discovery message");
        });
    }
}

#[derive(thiserror::Error, Debug)]
/// Failure writing a discovery packet.
pub enum SendMessageError {
    /// Errors encoding discovery messages.
    #[error("Failed to encode packet: {0}")]
    BencodeError(#[from] serde_bencode::Error),

    #[error(transparent)]
    /// Transparent [std::io::Error]
    IO(#[from] std::io::Error),
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod test {
    use std::thread;

    use ed25519_dalek::SigningKey;

    use super::*;
    use crate::common::{DiscoveryMessage, MessageBody, MessageId};

    fn socket() -> DiscoverySocket {
        let config = Config {
            port: Some(0),
            bind_address: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            ..Default::default()
        };

        DiscoverySocket::bind(&config, MessageCodec::new(SigningKey::from_bytes(&rand::random())))
            .unwrap()
    }

    fn recv(socket: &mut DiscoverySocket) -> Option<DiscoveryEvent> {
        for _ in 0..100 {
            if let Some(event) = socket.recv_from() {
                return Some(event);
            }
        }

        None
    }

    #[test]
    fn send_and_receive() {
        let server = socket();
        let client = socket();

        let server_address = server.local_addr();
        let client_address = client.local_addr();
        let client_id = client.codec.node_id();

        let message = DiscoveryMessage {
            message_id: MessageId::random(),
            network_id: Some(1),
            node_id: client_id,
            body: MessageBody::Ping,
        };
        let expected = message.clone();

        let server_thread = thread::spawn(move || {
            let mut server = server;
            let event = recv(&mut server).unwrap();

            assert_eq!(event.address, client_address);
            assert_eq!(event.message, expected);
        });

        let mut transport = client.transport().unwrap();
        transport.send(DiscoveryEvent::new(message, server_address));

        server_thread.join().unwrap();
    }

    #[test]
    fn invalid_packets_are_dropped() {
        let mut server = socket();
        let raw = UdpSocket::bind("127.0.0.1:0").unwrap();

        raw.send_to(b"d1:b2:hie", server.local_addr()).unwrap();

        assert!(recv(&mut server).is_none());
    }
}
