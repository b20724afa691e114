use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::common::{DiscoveryMessage, MessageId, MessageType, Node};

#[derive(Debug, Clone)]
/// An outbound PING or FIND_NODE waiting for its response.
pub struct PeerDiscoveryRequest {
    pub message_id: MessageId,
    pub message: DiscoveryMessage,
    pub address: SocketAddr,
    pub expected_response: MessageType,
    pub expiration: Instant,
    /// 1 for the first send, incremented on every resend.
    pub attempt: u32,
    /// The node this request is probing, if it is already known.
    pub related_node: Option<Node>,
}

impl PeerDiscoveryRequest {
    pub fn has_expired(&self) -> bool {
        self.has_expired_at(Instant::now())
    }

    pub fn has_expired_at(&self, now: Instant) -> bool {
        now > self.expiration
    }

    /// Returns true if a response of `kind` coming from `address` answers this request.
    pub fn validate_response(&self, address: &SocketAddr, kind: MessageType) -> bool {
        self.validate_response_at(address, kind, Instant::now())
    }

    pub fn validate_response_at(&self, address: &SocketAddr, kind: MessageType, now: Instant) -> bool {
        self.expected_response == kind && &self.address == address && !self.has_expired_at(now)
    }
}

#[derive(Debug)]
/// Requests in flight, keyed by their message id.
pub struct PendingRequests {
    requests: HashMap<MessageId, PeerDiscoveryRequest>,
    timeout: Duration,
}

impl PendingRequests {
    pub fn new(timeout: Duration) -> Self {
        Self {
            requests: HashMap::new(),
            timeout,
        }
    }

    /// Record a request that expires after this registry's timeout.
    pub fn create(
        &mut self,
        message: DiscoveryMessage,
        address: SocketAddr,
        expected_response: MessageType,
        attempt: u32,
        related_node: Option<Node>,
    ) -> PeerDiscoveryRequest {
        let request = PeerDiscoveryRequest {
            message_id: message.message_id,
            message,
            address,
            expected_response,
            expiration: Instant::now() + self.timeout,
            attempt,
            related_node,
        };

        self.requests.insert(request.message_id, request.clone());

        request
    }

    pub fn get(&self, message_id: &MessageId) -> Option<&PeerDiscoveryRequest> {
        self.requests.get(message_id)
    }

    /// Returns true if `message_id` is pending, unexpired, and was sent
    /// to `address` expecting a response of `kind`.
    pub fn validate(&self, message_id: &MessageId, address: &SocketAddr, kind: MessageType) -> bool {
        self.requests
            .get(message_id)
            .map(|request| request.validate_response(address, kind))
            .unwrap_or(false)
    }

    pub fn remove(&mut self, message_id: &MessageId) -> Option<PeerDiscoveryRequest> {
        self.requests.remove(message_id)
    }

    /// Remove and return all requests expired at `now`.
    pub fn expired_at(&mut self, now: Instant) -> Vec<PeerDiscoveryRequest> {
        let ids: Vec<MessageId> = self
            .requests
            .values()
            .filter(|request| request.has_expired_at(now))
            .map(|request| request.message_id)
            .collect();

        ids.iter()
            .filter_map(|id| self.requests.remove(id))
            .collect()
    }

    /// Returns a pending request sent to `address`, if any.
    pub fn find_by_address(&self, address: &SocketAddr) -> Option<&PeerDiscoveryRequest> {
        self.requests.values().find(|r| &r.address == address)
    }

    pub fn contains_address(&self, address: &SocketAddr) -> bool {
        self.find_by_address(address).is_some()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
