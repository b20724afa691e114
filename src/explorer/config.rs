use std::{net::IpAddr, time::Duration};

use ed25519_dalek::SigningKey;

use crate::common::KADEMLIA_BUCKET_SIZE;

use super::{DEFAULT_CLEAN_PERIOD, DEFAULT_REQUEST_TIMEOUT, DEFAULT_UPDATE_PERIOD};

#[derive(Debug, Clone)]
/// Peer explorer configurations
pub struct Config {
    /// Boot nodes, as `host:port` strings.
    ///
    /// Defaults to an empty list, where this node waits to be contacted.
    pub bootstrap: Vec<String>,
    /// Explicit port to listen on.
    ///
    /// Defaults to None, where [super::DEFAULT_PORT] is tried first,
    /// then any available port.
    pub port: Option<u16>,
    /// Address to bind the UDP socket to.
    ///
    /// Defaults to None, where all Ipv4 interfaces are used.
    pub bind_address: Option<IpAddr>,
    /// Duration after which an unanswered PING or FIND_NODE is considered lost.
    ///
    /// Defaults to [DEFAULT_REQUEST_TIMEOUT]
    pub request_timeout: Duration,
    /// Interval between "update" ticks, asking known nodes for more nodes
    /// and checking their pulse.
    ///
    /// Defaults to [DEFAULT_UPDATE_PERIOD]
    pub update_period: Duration,
    /// Interval between "clean" ticks, retrying and evicting unresponsive nodes.
    ///
    /// Defaults to [DEFAULT_CLEAN_PERIOD]
    pub clean_period: Duration,
    /// Network id stamped on outbound messages. Inbound messages
    /// carrying a different network id are dropped.
    ///
    /// Defaults to `0`
    pub network_id: u32,
    /// Whether more than one node id may be connected from the same `host:port`.
    ///
    /// If false, a new id showing up at a known address replaces the old one.
    ///
    /// Defaults to `true`
    pub allow_multiple_connections_per_host_port: bool,
    /// How many times to reload the boot nodes when this node ends up disconnected.
    ///
    /// Defaults to `-1`, meaning unlimited.
    pub max_boot_retries: i32,
    /// Capacity of each bucket in the distance table.
    ///
    /// Defaults to [KADEMLIA_BUCKET_SIZE]
    pub bucket_size: usize,
    /// This node's identity, its public key is the node id.
    ///
    /// Defaults to None, where a random key is generated.
    pub signing_key: Option<SigningKey>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bootstrap: Vec::new(),
            port: None,
            bind_address: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            update_period: DEFAULT_UPDATE_PERIOD,
            clean_period: DEFAULT_CLEAN_PERIOD,
            network_id: 0,
            allow_multiple_connections_per_host_port: true,
            max_boot_retries: -1,
            bucket_size: KADEMLIA_BUCKET_SIZE,
            signing_key: None,
        }
    }
}
