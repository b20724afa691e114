//! Discovery messages, and their signed bencode encoding.

mod internal;

use std::{
    convert::TryInto,
    fmt::{self, Debug, Formatter},
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
};

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::Rng;
use serde_bytes::ByteBuf;

use crate::common::{Node, NodeId, ID_SIZE};
use crate::error::DecodeError;

/// The size of message ids in bytes.
pub const MESSAGE_ID_SIZE: usize = 16;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
/// Correlates a request (PING, FIND_NODE) with its response (PONG, NEIGHBORS).
pub struct MessageId(pub [u8; MESSAGE_ID_SIZE]);

impl MessageId {
    pub fn random() -> MessageId {
        let mut rng = rand::thread_rng();
        let random_bytes: [u8; MESSAGE_ID_SIZE] = rng.gen();

        MessageId(random_bytes)
    }

    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<MessageId, DecodeError> {
        let bytes = bytes.as_ref();

        let array: [u8; MESSAGE_ID_SIZE] = bytes
            .try_into()
            .map_err(|_| DecodeError::InvalidMessageId(bytes.len()))?;

        Ok(MessageId(array))
    }
}

impl Debug for MessageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId(")?;
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Ping,
    Pong,
    FindNode,
    Neighbors,
}

impl MessageType {
    fn code(&self) -> u8 {
        match self {
            MessageType::Ping => 1,
            MessageType::Pong => 2,
            MessageType::FindNode => 3,
            MessageType::Neighbors => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Ping,
    Pong,
    FindNode { target: NodeId },
    Neighbors { nodes: Vec<Node> },
}

#[derive(Debug, Clone, PartialEq)]
/// A decoded discovery message.
pub struct DiscoveryMessage {
    pub message_id: MessageId,
    /// Network this message belongs to, `None` for nodes predating network ids.
    pub network_id: Option<u32>,
    /// Sender of the message, the public key that signed it.
    pub node_id: NodeId,
    pub body: MessageBody,
}

impl DiscoveryMessage {
    pub fn message_type(&self) -> MessageType {
        match self.body {
            MessageBody::Ping => MessageType::Ping,
            MessageBody::Pong => MessageType::Pong,
            MessageBody::FindNode { .. } => MessageType::FindNode,
            MessageBody::Neighbors { .. } => MessageType::Neighbors,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A message together with the remote address it came from or is sent to.
pub struct DiscoveryEvent {
    pub message: DiscoveryMessage,
    pub address: SocketAddr,
}

impl DiscoveryEvent {
    pub fn new(message: DiscoveryMessage, address: SocketAddr) -> Self {
        Self { message, address }
    }
}

/// Encodes and signs outbound messages with this node's key,
/// decodes and verifies inbound ones.
#[derive(Clone)]
pub struct MessageCodec {
    signing_key: SigningKey,
}

impl Debug for MessageCodec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageCodec")
            .field("node_id", &self.node_id())
            .finish()
    }
}

impl MessageCodec {
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// The id of the node owning this codec.
    pub fn node_id(&self) -> NodeId {
        NodeId::from(&self.signing_key.verifying_key())
    }

    /// Encode a message, signed by this codec's key.
    ///
    /// The `node_id` of the message is ignored, the receiver learns the sender's id from
    /// the signing key.
    pub fn encode(&self, message: &DiscoveryMessage) -> Result<Vec<u8>, serde_bencode::Error> {
        let (target, nodes) = match &message.body {
            MessageBody::FindNode { target } => (Some(ByteBuf::from(target.to_vec())), None),
            MessageBody::Neighbors { nodes } => (
                None,
                Some(nodes.iter().map(|n| ByteBuf::from(node_to_bytes(n))).collect()),
            ),
            _ => (None, None),
        };

        let body = internal::PacketBody {
            message_id: ByteBuf::from(message.message_id.0.to_vec()),
            network_id: message.network_id,
            message_type: message.message_type().code(),
            target,
            nodes,
        }
        .to_bytes()?;

        let signature = self.signing_key.sign(&body);

        internal::SignedPacket {
            body,
            public_key: self.signing_key.verifying_key().to_bytes(),
            signature: signature.to_bytes(),
        }
        .to_bytes()
    }

    /// Decode and verify an inbound packet.
    pub fn decode(&self, bytes: &[u8]) -> Result<DiscoveryMessage, DecodeError> {
        let packet = internal::SignedPacket::from_bytes(bytes)?;

        let key = VerifyingKey::from_bytes(&packet.public_key)
            .map_err(|_| DecodeError::InvalidPublicKey)?;
        let signature = Signature::from_bytes(&packet.signature);

        key.verify(&packet.body, &signature)
            .map_err(|_| DecodeError::InvalidSignature)?;

        let body = internal::PacketBody::from_bytes(&packet.body)?;

        let message_body = match body.message_type {
            1 => MessageBody::Ping,
            2 => MessageBody::Pong,
            3 => {
                let target = body.target.ok_or(DecodeError::MissingField("target"))?;

                MessageBody::FindNode {
                    target: NodeId::from_bytes(&target)
                        .map_err(|_| DecodeError::MissingField("target"))?,
                }
            }
            4 => MessageBody::Neighbors {
                nodes: body
                    .nodes
                    .unwrap_or_default()
                    .iter()
                    .map(|bytes| bytes_to_node(bytes))
                    .collect::<Result<Vec<_>, _>>()?,
            },
            other => return Err(DecodeError::UnknownMessageType(other)),
        };

        Ok(DiscoveryMessage {
            message_id: MessageId::from_bytes(&body.message_id)?,
            network_id: body.network_id,
            node_id: NodeId::from(&key),
            body: message_body,
        })
    }
}

fn node_to_bytes(node: &Node) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(ID_SIZE + 18);

    bytes.extend_from_slice(node.id.as_bytes());
    bytes.extend(sockaddr_to_bytes(&node.address));

    bytes
}

fn bytes_to_node(bytes: &[u8]) -> Result<Node, DecodeError> {
    if bytes.len() <= ID_SIZE {
        return Err(DecodeError::InvalidCompactNode(bytes.len()));
    }

    let id = NodeId::from_bytes(&bytes[..ID_SIZE])
        .map_err(|_| DecodeError::InvalidCompactNode(bytes.len()))?;
    let address = bytes_to_sockaddr(&bytes[ID_SIZE..])
        .ok_or(DecodeError::InvalidCompactNode(bytes.len()))?;

    Ok(Node::new(id, address))
}

fn sockaddr_to_bytes(sockaddr: &SocketAddr) -> Vec<u8> {
    let mut bytes = match sockaddr.ip() {
        IpAddr::V4(ip) => ip.octets().to_vec(),
        IpAddr::V6(ip) => ip.octets().to_vec(),
    };

    bytes.extend(sockaddr.port().to_be_bytes());

    bytes
}

fn bytes_to_sockaddr(bytes: &[u8]) -> Option<SocketAddr> {
    match bytes.len() {
        6 => {
            let octets: [u8; 4] = bytes[..4].try_into().ok()?;
            let port = u16::from_be_bytes(bytes[4..].try_into().ok()?);

            Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), port))
        }
        18 => {
            let octets: [u8; 16] = bytes[..16].try_into().ok()?;
            let port = u16::from_be_bytes(bytes[16..].try_into().ok()?);

            Some(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
        }
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn codec() -> MessageCodec {
        MessageCodec::new(SigningKey::from_bytes(&rand::random()))
    }

    fn message(codec: &MessageCodec, body: MessageBody) -> DiscoveryMessage {
        DiscoveryMessage {
            message_id: MessageId::random(),
            network_id: Some(33),
            node_id: codec.node_id(),
            body,
        }
    }

    #[test]
    fn ping_carries_sender_id() {
        let codec = codec();
        let ping = message(&codec, MessageBody::Ping);

        let bytes = codec.encode(&ping).unwrap();
        let decoded = codec.decode(&bytes).unwrap();

        assert_eq!(decoded, ping);
        assert_eq!(decoded.message_type(), MessageType::Ping);
    }

    #[test]
    fn node_id_comes_from_signing_key() {
        let sender = codec();
        let receiver = codec();

        let mut pong = message(&sender, MessageBody::Pong);
        pong.node_id = NodeId::random();

        let decoded = receiver.decode(&sender.encode(&pong).unwrap()).unwrap();

        assert_eq!(decoded.node_id, sender.node_id());
    }

    #[test]
    fn missing_network_id() {
        let codec = codec();
        let mut find_node = message(
            &codec,
            MessageBody::FindNode {
                target: NodeId::random(),
            },
        );
        find_node.network_id = None;

        let decoded = codec.decode(&codec.encode(&find_node).unwrap()).unwrap();

        assert_eq!(decoded, find_node);
    }

    #[test]
    fn neighbors_with_mixed_addresses() {
        let codec = codec();
        let neighbors = message(
            &codec,
            MessageBody::Neighbors {
                nodes: vec![
                    Node::random("127.0.0.1:5050".parse().unwrap()),
                    Node::random("[::1]:6060".parse().unwrap()),
                ],
            },
        );

        let decoded = codec.decode(&codec.encode(&neighbors).unwrap()).unwrap();

        match decoded.body {
            MessageBody::Neighbors { nodes } => {
                assert_eq!(nodes.len(), 2);
                assert_eq!(nodes[0].address, "127.0.0.1:5050".parse().unwrap());
                assert_eq!(nodes[1].address, "[::1]:6060".parse().unwrap());
            }
            _ => panic!("expected neighbors"),
        }
    }

    #[test]
    fn tampered_body_is_rejected() {
        let codec = codec();
        let ping = message(&codec, MessageBody::Ping);

        let mut packet = internal::SignedPacket::from_bytes(&codec.encode(&ping).unwrap()).unwrap();
        packet.body = internal::PacketBody {
            message_id: ByteBuf::from(vec![0; MESSAGE_ID_SIZE]),
            network_id: None,
            message_type: 2,
            target: None,
            nodes: None,
        }
        .to_bytes()
        .unwrap();

        assert!(matches!(
            codec.decode(&packet.to_bytes().unwrap()),
            Err(DecodeError::InvalidSignature)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let codec = codec();

        assert!(matches!(
            codec.decode(b"not bencode"),
            Err(DecodeError::Bencode(_))
        ));
    }

    #[test]
    fn unknown_message_type() {
        let codec = codec();

        let body = internal::PacketBody {
            message_id: ByteBuf::from(vec![0; MESSAGE_ID_SIZE]),
            network_id: None,
            message_type: 9,
            target: None,
            nodes: None,
        }
        .to_bytes()
        .unwrap();

        let signature = codec.signing_key.sign(&body);
        let packet = internal::SignedPacket {
            body,
            public_key: codec.signing_key.verifying_key().to_bytes(),
            signature: signature.to_bytes(),
        };

        assert!(matches!(
            codec.decode(&packet.to_bytes().unwrap()),
            Err(DecodeError::UnknownMessageType(9))
        ));
    }
}
