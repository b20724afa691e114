use std::net::SocketAddr;

use tracing::{debug, trace, warn};

use crate::common::{DiscoveryEvent, DiscoveryMessage, MessageBody, MessageId, MessageType, Node};
use crate::core::sampling::randomize_limited_list;

use super::{PeerExplorer, MAX_NODES_PER_MSG, NEIGHBORS_RANDOM};

impl PeerExplorer {
    /// Handle an inbound discovery message.
    ///
    /// Messages from other networks, and responses that don't match a pending
    /// request, are dropped.
    pub fn handle_message(&mut self, event: DiscoveryEvent) {
        if !self.is_running() {
            warn!(state = ?self.state, "Cannot handle message");
            return;
        }

        let DiscoveryEvent { message, address } = event;

        // Messages without a network id predate it, let them through.
        if let Some(network_id) = message.network_id {
            if network_id != self.network_id {
                debug!(
                    context = "handle_message",
                    network_id,
                    local_network_id = self.network_id,
                    ?address,
                    "Ignoring message from another network"
                );
                return;
            }
        }

        trace!(context = "handle_message", ?message, ?address);

        match message.body {
            MessageBody::Ping => self.handle_ping(address, &message),
            MessageBody::Pong => self.handle_pong(address, &message),
            MessageBody::FindNode { .. } => self.handle_find_node(&message),
            MessageBody::Neighbors { ref nodes } => self.handle_neighbors(address, &message, nodes),
        }
    }

    fn handle_ping(&mut self, address: SocketAddr, message: &DiscoveryMessage) {
        self.send_pong(address, message.message_id);

        if self.established_connections.contains_key(&message.node_id) {
            self.distance_table.update_entry(&message.node_id);
        } else {
            // Don't trust the ping, make it prove it can answer ours.
            self.send_ping(address, 1, Some(Node::new(message.node_id, address)));
        }
    }

    fn handle_pong(&mut self, address: SocketAddr, message: &DiscoveryMessage) {
        if !self
            .pending_ping_requests
            .validate(&message.message_id, &address, MessageType::Pong)
        {
            debug!(
                context = "handle_pong",
                ?address,
                message_id = ?message.message_id,
                "Unexpected or expired pong"
            );
            return;
        }

        self.pending_ping_requests.remove(&message.message_id);

        match self.challenges.resolve(&message.message_id) {
            Some(challenge) => {
                debug!(
                    challenged = %challenge.challenged.id,
                    challenger = %challenge.challenger.id,
                    "Challenged node is alive, discarding challenger"
                );
            }
            None => self.add_connection(Node::new(message.node_id, address)),
        }
    }

    fn handle_find_node(&mut self, message: &DiscoveryMessage) {
        let connected = match self.established_connections.get(&message.node_id) {
            Some(node) => *node,
            None => {
                debug!(
                    context = "handle_find_node",
                    node_id = %message.node_id,
                    "Ignoring find node from unknown node"
                );
                return;
            }
        };

        let closest = self.distance_table.get_closest_nodes(&connected.id);

        self.send_neighbors(connected.address, &closest, message.message_id);
        self.distance_table.update_entry(&connected.id);
    }

    fn handle_neighbors(&mut self, address: SocketAddr, message: &DiscoveryMessage, nodes: &[Node]) {
        let connected = match self.established_connections.get(&message.node_id) {
            Some(node) => *node,
            None => {
                debug!(
                    context = "handle_neighbors",
                    node_id = %message.node_id,
                    "Ignoring neighbors from unknown node"
                );
                return;
            }
        };

        if self.pending_find_node_requests.validate(
            &message.message_id,
            &address,
            MessageType::Neighbors,
        ) {
            self.pending_find_node_requests.remove(&message.message_id);

            let local_id = self.local_node.id;
            let reputation = &self.reputation;

            let candidates: Vec<SocketAddr> = nodes
                .iter()
                .take(MAX_NODES_PER_MSG)
                .filter(|node| {
                    node.id != local_id
                        && !reputation.is_address_banned(&node.address.ip())
                        && !reputation.is_node_id_banned(&node.id)
                })
                .map(|node| node.address)
                .collect();

            trace!(
                context = "handle_neighbors",
                received = nodes.len(),
                accepted = candidates.len()
            );

            self.boot_nodes.extend(candidates);
            self.start_conversation_with_new_nodes();
        } else {
            debug!(
                context = "handle_neighbors",
                ?address,
                message_id = ?message.message_id,
                "Unexpected or expired neighbors"
            );
        }

        self.distance_table.update_entry(&connected.id);
    }

    fn send_pong(&mut self, address: SocketAddr, message_id: MessageId) {
        let mut pong = self.message(MessageBody::Pong);
        pong.message_id = message_id;

        self.send(address, pong);
    }

    fn send_neighbors(&mut self, address: SocketAddr, closest: &[Node], message_id: MessageId) {
        let nodes = randomize_limited_list(closest, MAX_NODES_PER_MSG, NEIGHBORS_RANDOM);

        trace!(context = "send_neighbors", ?address, count = nodes.len());

        let mut neighbors = self.message(MessageBody::Neighbors { nodes });
        neighbors.message_id = message_id;

        self.send(address, neighbors);
    }
}
