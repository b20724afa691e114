#![doc = include_str!("../README.md")]
//! ## Feature flags
#![doc = document_features::document_features!()]
//!

// Modules
mod common;
mod core;
mod error;
mod scheduler;

#[cfg(feature = "async")]
pub mod async_discovery;
mod discovery;
pub mod explorer;

pub use crate::common::{
    DiscoveryEvent, DiscoveryMessage, DistanceTableEntry, MessageBody, MessageCodec, MessageId,
    MessageType, Node, NodeBucket, NodeDistanceTable, NodeId, OperationResult,
    KADEMLIA_BUCKET_SIZE,
};
pub use crate::core::challenges::{ChallengeState, NodeChallenge};
pub use crate::core::pending_requests::PeerDiscoveryRequest;
pub use crate::core::reputation::{BanList, NoBans, PeerReputation};
pub use discovery::{Discovery, DiscoveryBuilder, DiscoveryWasShutdown, BIND_RETRY_DELAY};
pub use error::{DecodeError, Error};
pub use explorer::{Config, ExecState, Info, PeerExplorer, Transport};

pub use ed25519_dalek::SigningKey;

// Alias Result to be the crate Result.
pub type Result<T, E = Error> = std::result::Result<T, E>;
