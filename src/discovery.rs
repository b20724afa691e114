//! Discovery node.

use std::net::IpAddr;
use std::ops::ControlFlow;
use std::thread;
use std::time::Duration;

use ed25519_dalek::SigningKey;
use flume::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, info, warn};

use crate::common::{MessageCodec, Node};
use crate::core::reputation::{NoBans, PeerReputation};
use crate::explorer::{Config, DiscoverySocket, Info, PeerExplorer};

/// Pause between attempts to bind the UDP socket.
pub const BIND_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
/// Discovery node, running a [PeerExplorer] in its own thread.
///
/// Dropping every clone of this handle stops the thread.
pub struct Discovery(pub(crate) Sender<ActorMessage>);

#[derive(Debug, Default)]
/// Discovery node builder
pub struct DiscoveryBuilder {
    config: Config,
    reputation: Option<Box<dyn PeerReputation>>,
}

impl DiscoveryBuilder {
    /// Set boot nodes, as `host:port` strings.
    pub fn bootstrap<T: ToString>(&mut self, bootstrap: &[T]) -> &mut Self {
        self.config.bootstrap = bootstrap.iter().map(|b| b.to_string()).collect();

        self
    }

    /// Add more boot nodes alongside the ones already set.
    pub fn extra_bootstrap<T: ToString>(&mut self, extra_bootstrap: &[T]) -> &mut Self {
        for address in extra_bootstrap {
            self.config.bootstrap.push(address.to_string());
        }

        self
    }

    /// Set the port to listen on.
    pub fn port(&mut self, port: u16) -> &mut Self {
        self.config.port = Some(port);

        self
    }

    /// Set the address to bind the UDP socket to.
    pub fn bind_address(&mut self, bind_address: IpAddr) -> &mut Self {
        self.config.bind_address = Some(bind_address);

        self
    }

    /// Set the duration after which an unanswered request is considered lost.
    pub fn request_timeout(&mut self, request_timeout: Duration) -> &mut Self {
        self.config.request_timeout = request_timeout;

        self
    }

    pub fn update_period(&mut self, update_period: Duration) -> &mut Self {
        self.config.update_period = update_period;

        self
    }

    pub fn clean_period(&mut self, clean_period: Duration) -> &mut Self {
        self.config.clean_period = clean_period;

        self
    }

    /// Set the network id, messages from other networks are ignored.
    pub fn network_id(&mut self, network_id: u32) -> &mut Self {
        self.config.network_id = network_id;

        self
    }

    pub fn allow_multiple_connections_per_host_port(&mut self, allow: bool) -> &mut Self {
        self.config.allow_multiple_connections_per_host_port = allow;

        self
    }

    /// Set how many times to retry bootstrapping when disconnected, `-1` for unlimited.
    pub fn max_boot_retries(&mut self, max_boot_retries: i32) -> &mut Self {
        self.config.max_boot_retries = max_boot_retries;

        self
    }

    pub fn bucket_size(&mut self, bucket_size: usize) -> &mut Self {
        self.config.bucket_size = bucket_size;

        self
    }

    /// Set this node's identity.
    pub fn signing_key(&mut self, signing_key: SigningKey) -> &mut Self {
        self.config.signing_key = Some(signing_key);

        self
    }

    /// Set the oracle deciding which advertised peers to ignore.
    pub fn reputation(&mut self, reputation: Box<dyn PeerReputation>) -> &mut Self {
        self.reputation = Some(reputation);

        self
    }

    /// Create a Discovery node with the set configurations.
    pub fn build(&mut self) -> Result<Discovery, std::io::Error> {
        let reputation = self.reputation.take().unwrap_or_else(|| Box::new(NoBans));

        Discovery::new_with(self.config.clone(), reputation)
    }
}

impl Discovery {
    /// Returns a builder to edit settings before creating a Discovery node.
    pub fn builder() -> DiscoveryBuilder {
        DiscoveryBuilder::default()
    }

    /// Create a new Discovery node, that doesn't ban any peer.
    pub fn new(config: Config) -> Result<Self, std::io::Error> {
        Discovery::new_with(config, Box::new(NoBans))
    }

    fn new_with(config: Config, reputation: Box<dyn PeerReputation>) -> Result<Self, std::io::Error> {
        let (sender, receiver) = flume::unbounded();

        thread::Builder::new()
            .name("peer-explorer".to_string())
            .spawn(move || run(config, reputation, receiver))?;

        Ok(Discovery(sender))
    }

    // === Getters ===

    /// Information and statistics about this node.
    ///
    /// Blocks until the UDP socket is bound.
    pub fn info(&self) -> Result<Info, DiscoveryWasShutdown> {
        let (sender, receiver) = flume::bounded::<Info>(1);

        self.0
            .send(ActorMessage::Info(sender))
            .map_err(|_| DiscoveryWasShutdown)?;

        receiver.recv().map_err(|_| DiscoveryWasShutdown)
    }

    /// Snapshot of the nodes currently considered alive.
    pub fn get_nodes(&self) -> Result<Vec<Node>, DiscoveryWasShutdown> {
        let (sender, receiver) = flume::bounded::<Vec<Node>>(1);

        self.0
            .send(ActorMessage::Nodes(sender))
            .map_err(|_| DiscoveryWasShutdown)?;

        receiver.recv().map_err(|_| DiscoveryWasShutdown)
    }

    // === Public Methods ===

    /// Dispose the explorer and stop the actor thread loop.
    pub fn shutdown(&mut self) {
        let (sender, receiver) = flume::bounded::<()>(1);

        let _ = self.0.send(ActorMessage::Shutdown(sender));
        let _ = receiver.recv();
    }
}

fn run(mut config: Config, reputation: Box<dyn PeerReputation>, receiver: Receiver<ActorMessage>) {
    let signing_key = config
        .signing_key
        .take()
        .unwrap_or_else(|| SigningKey::from_bytes(&rand::random()));
    let codec = MessageCodec::new(signing_key);

    let mut deferred = Vec::new();

    let mut socket = loop {
        match DiscoverySocket::bind(&config, codec.clone()) {
            Ok(socket) => break socket,
            Err(error) => {
                warn!(?error, port = ?config.port, retry_in = ?BIND_RETRY_DELAY, "Failed to bind discovery socket");

                match receiver.recv_timeout(BIND_RETRY_DELAY) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => return,
                    Ok(ActorMessage::Shutdown(sender)) => {
                        drop(deferred);
                        return close(receiver, sender);
                    }
                    // Answered once there is an explorer to answer them.
                    Ok(message) => deferred.push(message),
                }
            }
        }
    };

    let transport = match socket.transport() {
        Ok(transport) => transport,
        Err(error) => {
            warn!(?error, "Failed to clone discovery socket");
            return;
        }
    };

    let local_node = Node::new(codec.node_id(), socket.local_addr());
    let mut explorer = PeerExplorer::new(&config, local_node, Box::new(transport), reputation);

    info!(address = ?socket.local_addr(), id = %local_node.id, "Peer explorer listening");

    explorer.start();

    let mut deferred = deferred.into_iter();

    while let Some(message) = deferred.next() {
        if let ControlFlow::Break(sender) = handle(&mut explorer, message) {
            drop(deferred);
            return close(receiver, sender);
        }
    }

    loop {
        match receiver.try_recv() {
            Ok(message) => {
                if let ControlFlow::Break(sender) = handle(&mut explorer, message) {
                    return close(receiver, sender);
                }
            }
            Err(TryRecvError::Disconnected) => {
                // Discovery was dropped, kill this thread.
                debug!("peer_explorer::Discovery's actor thread was shutdown after Drop.");
                explorer.dispose();
                return;
            }
            Err(TryRecvError::Empty) => {}
        }

        explorer.run_scheduled();

        if let Some(event) = socket.recv_from() {
            explorer.handle_message(event);
        }
    }
}

/// Handle a control message, breaking with the acknowledgement sender on shutdown.
fn handle(explorer: &mut PeerExplorer, message: ActorMessage) -> ControlFlow<Sender<()>> {
    match message {
        ActorMessage::Shutdown(sender) => {
            explorer.dispose();

            return ControlFlow::Break(sender);
        }
        ActorMessage::Nodes(sender) => {
            let _ = sender.send(explorer.get_nodes());
        }
        ActorMessage::Info(sender) => {
            let _ = sender.send(explorer.info());
        }
    }

    ControlFlow::Continue(())
}

/// Disconnect the control channel, then acknowledge the shutdown.
///
/// Requests still queued are dropped with their reply senders, so their callers
/// get [DiscoveryWasShutdown] instead of waiting forever.
fn close(receiver: Receiver<ActorMessage>, ack: Sender<()>) {
    receiver.drain().for_each(drop);
    drop(receiver);

    debug!("Peer explorer shutdown");
    let _ = ack.send(());
}

#[derive(Debug)]
pub(crate) enum ActorMessage {
    Shutdown(Sender<()>),
    Nodes(Sender<Vec<Node>>),
    Info(Sender<Info>),
}

#[derive(thiserror::Error, Debug)]
#[error("Discovery node was shutdown")]
/// The actor thread of this [Discovery] node is no longer running.
pub struct DiscoveryWasShutdown;
