//! Main Crate Error

#[derive(thiserror::Error, Debug)]
/// Peer explorer crate error enum.
pub enum Error {
    /// Node ids are exactly 32 bytes.
    #[error("Invalid node id size, expected 32, got {0}")]
    InvalidIdSize(usize),

    /// Node id is not a valid hex encoded 32 bytes.
    #[error("Invalid node id: {0}")]
    InvalidNodeId(String),
}

#[derive(thiserror::Error, Debug)]
/// Reasons an inbound packet was rejected by the [crate::MessageCodec].
pub enum DecodeError {
    #[error("Invalid bencode: {0}")]
    /// The packet or its body is not valid bencode of the expected shape.
    Bencode(#[from] serde_bencode::Error),

    #[error("Invalid public key")]
    /// The `k` field is not a valid ed25519 public key.
    InvalidPublicKey,

    #[error("Invalid signature")]
    /// The signature does not verify against the body and public key.
    InvalidSignature,

    #[error("Unknown message type: {0}")]
    /// The `y` field is not one of PING, PONG, FIND_NODE or NEIGHBORS.
    UnknownMessageType(u8),

    #[error("Missing field: {0}")]
    /// A field required by the message type is absent.
    MissingField(&'static str),

    #[error("Invalid compact node of {0} bytes")]
    /// A compact node is neither 38 (IPv4) nor 50 (IPv6) bytes.
    InvalidCompactNode(usize),

    #[error("Invalid message id of {0} bytes")]
    /// Message ids are exactly 16 bytes.
    InvalidMessageId(usize),
}
