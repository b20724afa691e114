//! The discovery engine: protocol state machine and periodic maintenance.

pub(crate) mod config;
mod handle_message;
mod info;
pub(crate) mod socket;

use std::collections::{HashMap, HashSet};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::common::{
    DiscoveryEvent, DiscoveryMessage, MessageBody, MessageId, MessageType, Node, NodeDistanceTable,
    NodeId,
};
use crate::core::challenges::{ChallengeManager, NodeChallenge};
use crate::core::pending_requests::{PeerDiscoveryRequest, PendingRequests};
use crate::core::reputation::PeerReputation;
use crate::core::sampling::randomize_limited_list;
use crate::scheduler::{Scheduler, Tick};

pub use config::Config;
pub use info::Info;
pub use socket::{DiscoverySocket, Transport, UdpTransport, DEFAULT_PORT};

/// Maximum number of nodes sent in, or accepted from, a NEIGHBORS message.
pub const MAX_NODES_PER_MSG: usize = 20;
/// Maximum number of closest nodes asked for more nodes on every update.
pub const MAX_NODES_TO_ASK: usize = 24;
/// Maximum number of closest nodes pinged on every update.
pub const MAX_NODES_TO_CHECK: usize = 16;
/// Number of unanswered pings after which a node is evicted.
pub const RETRIES_COUNT: u32 = 3;

const NODES_TO_ASK_RANDOM: usize = 5;
const NODES_TO_CHECK_RANDOM: usize = 10;
const NEIGHBORS_RANDOM: usize = 5;

/// Default request timeout before abandoning an unanswered PING or FIND_NODE.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_UPDATE_PERIOD: Duration = Duration::from_secs(60);
pub const DEFAULT_CLEAN_PERIOD: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Lifecycle of a [PeerExplorer].
pub enum ExecState {
    Created,
    Running,
    Finished,
}

#[derive(Debug)]
/// Discovery engine, finding and tracking live peers.
///
/// Not thread safe by itself: every entry point takes `&mut self`, and is meant
/// to be driven by a single thread, see [crate::Discovery].
pub struct PeerExplorer {
    // Options
    local_node: Node,
    network_id: u32,
    allow_multiple_connections_per_host_port: bool,
    max_boot_retries: i32,

    state: ExecState,
    boot_retries: u32,

    initial_boot_nodes: Vec<SocketAddr>,
    /// Addresses to start a conversation with.
    boot_nodes: HashSet<SocketAddr>,

    established_connections: HashMap<NodeId, Node>,
    /// `host:port` to the last node id seen there.
    known_hosts: HashMap<String, NodeId>,

    pending_ping_requests: PendingRequests,
    pending_find_node_requests: PendingRequests,
    challenges: ChallengeManager,
    distance_table: NodeDistanceTable,

    scheduler: Scheduler,
    transport: Box<dyn Transport>,
    reputation: Box<dyn PeerReputation>,
}

impl PeerExplorer {
    /// Creates a new explorer in the [ExecState::Created] state.
    ///
    /// `local_node` is this node's id and the address it is reachable at.
    /// Does not perform any network I/O until [PeerExplorer::start].
    pub fn new(
        config: &Config,
        local_node: Node,
        transport: Box<dyn Transport>,
        reputation: Box<dyn PeerReputation>,
    ) -> Self {
        let initial_boot_nodes = to_socket_address(&config.bootstrap);

        PeerExplorer {
            local_node,
            network_id: config.network_id,
            allow_multiple_connections_per_host_port: config
                .allow_multiple_connections_per_host_port,
            max_boot_retries: config.max_boot_retries,

            state: ExecState::Created,
            boot_retries: 0,

            boot_nodes: initial_boot_nodes.iter().copied().collect(),
            initial_boot_nodes,

            established_connections: HashMap::new(),
            known_hosts: HashMap::new(),

            pending_ping_requests: PendingRequests::new(config.request_timeout),
            pending_find_node_requests: PendingRequests::new(config.request_timeout),
            challenges: ChallengeManager::new(),
            distance_table: NodeDistanceTable::new(config.bucket_size, local_node.id),

            scheduler: Scheduler::new(config.clean_period, config.update_period),
            transport,
            reputation,
        }
    }

    // === Getters ===

    pub fn local_node(&self) -> &Node {
        &self.local_node
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ExecState::Running
    }

    /// Snapshot of the nodes currently considered alive.
    pub fn get_nodes(&self) -> Vec<Node> {
        self.established_connections.values().copied().collect()
    }

    pub fn distance_table(&self) -> &NodeDistanceTable {
        &self.distance_table
    }

    pub fn known_hosts(&self) -> &HashMap<String, NodeId> {
        &self.known_hosts
    }

    /// Addresses waiting for a conversation to be started with.
    pub fn boot_nodes(&self) -> &HashSet<SocketAddr> {
        &self.boot_nodes
    }

    /// The pending challenge settled by a pong to the ping `challenge_id`.
    pub fn challenge(&self, challenge_id: &MessageId) -> Option<&NodeChallenge> {
        self.challenges.get(challenge_id)
    }

    pub fn challenge_count(&self) -> usize {
        self.challenges.count()
    }

    /// The pending ping with this message id.
    pub fn pending_ping(&self, message_id: &MessageId) -> Option<&PeerDiscoveryRequest> {
        self.pending_ping_requests.get(message_id)
    }

    pub fn pending_ping_count(&self) -> usize {
        self.pending_ping_requests.len()
    }

    pub fn pending_find_node_count(&self) -> usize {
        self.pending_find_node_requests.len()
    }

    /// Number of times the boot nodes were reloaded after getting disconnected.
    pub fn boot_retries(&self) -> u32 {
        self.boot_retries
    }

    /// Returns a thread safe and lightweight summary of this node's
    /// information and statistics.
    pub fn info(&self) -> Info {
        Info::from(self)
    }

    // === Public Methods ===

    /// Same as [PeerExplorer::start_with] starting a conversation with the boot nodes.
    pub fn start(&mut self) -> bool {
        self.start_with(true)
    }

    /// Starts the maintenance scheduler, and optionally pings all boot nodes.
    ///
    /// Returns `false`, doing nothing, unless this explorer is in the [ExecState::Created] state.
    pub fn start_with(&mut self, start_conversation: bool) -> bool {
        if self.state != ExecState::Created {
            warn!(state = ?self.state, "Cannot start peer explorer");
            return false;
        }

        self.state = ExecState::Running;
        self.scheduler.start();

        if start_conversation {
            self.start_conversation_with_new_nodes();
        }

        true
    }

    /// Stops the maintenance scheduler. Every entry point is a no-op afterwards.
    pub fn dispose(&mut self) {
        if self.state == ExecState::Finished {
            warn!(state = ?self.state, "Cannot dispose peer explorer");
            return;
        }

        self.state = ExecState::Finished;
        self.scheduler.stop();
    }

    /// Run the [PeerExplorer::clean] and [PeerExplorer::update] ticks fired since the last call.
    pub fn run_scheduled(&mut self) {
        for tick in self.scheduler.ticks() {
            match tick {
                Tick::Clean => self.clean(),
                Tick::Update => self.update(),
            }
        }
    }

    /// Ping every pending boot node, then forget those that now have a pending ping.
    ///
    /// Returns the addresses pinged.
    pub fn start_conversation_with_new_nodes(&mut self) -> HashSet<SocketAddr> {
        let addresses: HashSet<SocketAddr> = self.boot_nodes.iter().copied().collect();

        for address in &addresses {
            self.send_ping(*address, 1, None);
        }

        let pending = &self.pending_ping_requests;
        self.boot_nodes
            .retain(|address| !pending.contains_address(address));

        addresses
    }

    /// Send a PING to `address`, expecting a PONG.
    ///
    /// If a ping to that address is already pending, returns it instead of sending another one.
    pub fn send_ping(
        &mut self,
        address: SocketAddr,
        attempt: u32,
        related_node: Option<Node>,
    ) -> DiscoveryMessage {
        if let Some(request) = self.pending_ping_requests.find_by_address(&address) {
            return request.message.clone();
        }

        let message = self.message(MessageBody::Ping);

        trace!(context = "send_ping", ?address, attempt, "Sending ping");
        self.send(address, message.clone());

        self.pending_ping_requests.create(
            message.clone(),
            address,
            MessageType::Pong,
            attempt,
            related_node,
        );

        message
    }

    /// Ask `node` for the nodes closest to us, expecting NEIGHBORS.
    pub fn send_find_node(&mut self, node: Node) -> DiscoveryMessage {
        let message = self.message(MessageBody::FindNode {
            target: self.local_node.id,
        });

        trace!(context = "send_find_node", address = ?node.address, "Sending find node");
        self.send(node.address, message.clone());

        self.pending_find_node_requests.create(
            message.clone(),
            node.address,
            MessageType::Neighbors,
            1,
            Some(node),
        );

        message
    }

    /// Purge expired requests, resend unanswered pings, and evict nodes
    /// that did not answer [RETRIES_COUNT] pings in a row.
    pub fn clean(&mut self) {
        self.clean_at(Instant::now())
    }

    pub(crate) fn clean_at(&mut self, now: Instant) {
        if !self.is_running() {
            warn!(state = ?self.state, "Cannot clean");
            return;
        }

        let expired_pings = self.pending_ping_requests.expired_at(now);

        for request in &expired_pings {
            if let Some(challenge) = self.challenges.expire(&request.message_id) {
                debug!(
                    challenged = %challenge.challenged.id,
                    challenger = %challenge.challenger.id,
                    "Challenged node did not answer"
                );
            }
        }

        for request in &expired_pings {
            if request.attempt < RETRIES_COUNT {
                self.send_ping(request.address, request.attempt + 1, request.related_node);
            } else if let Some(node) = request.related_node {
                self.remove_connection(&node);
            }
        }

        let expired_find_nodes = self.pending_find_node_requests.expired_at(now);

        trace!(
            context = "clean",
            pings = expired_pings.len(),
            find_nodes = expired_find_nodes.len(),
            "Purged expired requests"
        );
    }

    /// Retry bootstrapping if disconnected, otherwise ask the closest nodes
    /// for more nodes and check their pulse.
    pub fn update(&mut self) {
        if !self.is_running() {
            warn!(state = ?self.state, "Cannot update");
            return;
        }

        let closest = self.distance_table.get_closest_nodes(&self.local_node.id);

        if closest.is_empty()
            && self.boot_nodes.is_empty()
            && self.pending_ping_requests.is_empty()
            && self.pending_find_node_requests.is_empty()
            && self.established_connections.is_empty()
        {
            self.retry_bootstrap();
            return;
        }

        self.ask_for_more_nodes(&closest);
        self.check_peers_pulse(&closest);
    }

    // === Private Methods ===

    fn message(&self, body: MessageBody) -> DiscoveryMessage {
        DiscoveryMessage {
            message_id: MessageId::random(),
            network_id: Some(self.network_id),
            node_id: self.local_node.id,
            body,
        }
    }

    fn send(&mut self, address: SocketAddr, message: DiscoveryMessage) {
        self.transport.send(DiscoveryEvent::new(message, address));
    }

    fn retry_bootstrap(&mut self) {
        if self.max_boot_retries >= 0 && self.boot_retries >= self.max_boot_retries as u32 {
            warn!(
                max_boot_retries = self.max_boot_retries,
                "Disconnected, and out of boot retries"
            );
            return;
        }

        self.boot_retries += 1;
        info!(
            attempt = self.boot_retries,
            boot_nodes = self.initial_boot_nodes.len(),
            "Disconnected, retrying bootstrap"
        );

        self.boot_nodes.extend(self.initial_boot_nodes.iter().copied());
        self.start_conversation_with_new_nodes();
    }

    fn ask_for_more_nodes(&mut self, closest: &[Node]) {
        let nodes = randomize_limited_list(closest, MAX_NODES_TO_ASK, NODES_TO_ASK_RANDOM);

        trace!(context = "update", count = nodes.len(), "Asking for more nodes");

        for node in nodes {
            self.send_find_node(node);
        }
    }

    fn check_peers_pulse(&mut self, closest: &[Node]) {
        let nodes = randomize_limited_list(closest, MAX_NODES_TO_CHECK, NODES_TO_CHECK_RANDOM);

        trace!(context = "update", count = nodes.len(), "Checking peers pulse");

        for node in nodes {
            self.send_ping(node.address, 1, Some(node));
        }
    }

    /// Admit a node that answered our ping.
    fn add_connection(&mut self, node: Node) {
        if node.id == self.local_node.id {
            debug!(address = ?node.address, "Ignoring node claiming our own id");
            return;
        }

        if !self.allow_multiple_connections_per_host_port {
            self.disconnect_if_duplicated(&node);
        }

        let result = self.distance_table.add_node(&node);

        if result.success {
            let host = node.address_string();

            // A node that moved is no longer known at its previous address.
            self.known_hosts
                .retain(|known, id| *id != node.id || *known == host);
            self.known_hosts.insert(host, node.id);
            self.established_connections.insert(node.id, node);

            debug!(id = %node.id, address = ?node.address, "New peer found");
        } else {
            let challenged = *result.affected_entry.node();
            let ping = self.send_ping(challenged.address, 1, Some(challenged));

            self.challenges.start(challenged, node, ping.message_id);

            debug!(
                challenged = %challenged.id,
                challenger = %node.id,
                "Bucket full, challenging least recently seen node"
            );
        }
    }

    /// Evict the node previously seen at `node`'s address under another id.
    fn disconnect_if_duplicated(&mut self, node: &Node) {
        if let Some(old_id) = self.known_hosts.get(&node.address_string()).copied() {
            if old_id != node.id {
                warn!(address = ?node.address, %old_id, new_id = %node.id, "Disconnecting peer with old id");

                self.remove_connection(&Node::new(old_id, node.address));
            }
        }
    }

    fn remove_connection(&mut self, node: &Node) {
        debug!(id = %node.id, address = ?node.address, "Removing node");

        self.established_connections.remove(&node.id);
        self.distance_table.remove_node(node);
        self.known_hosts.retain(|_, id| *id != node.id);
    }
}

/// Resolve `host:port` strings, preferring Ipv4 addresses. Unresolvable entries are skipped.
pub(crate) fn to_socket_address<T: AsRef<str>>(bootstrap: &[T]) -> Vec<SocketAddr> {
    bootstrap
        .iter()
        .filter_map(|s| {
            let s = s.as_ref();

            match s.to_socket_addrs() {
                Ok(addrs) => {
                    let addrs: Vec<SocketAddr> = addrs.collect();

                    let address = addrs
                        .iter()
                        .find(|a| a.is_ipv4())
                        .or_else(|| addrs.first())
                        .copied();

                    if address.is_none() {
                        debug!(address = s, "Boot node resolved to no address");
                    }

                    address
                }
                Err(error) => {
                    debug!(address = s, ?error, "Invalid boot node address");
                    None
                }
            }
        })
        .collect()
}
