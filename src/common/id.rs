//! Discovery node identity and the Kademlia distance between identities.
use ed25519_dalek::VerifyingKey;
use rand::Rng;
use std::{
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};

use crate::{Error, Result};

/// The size of node ids in bytes.
pub const ID_SIZE: usize = 32;
/// Number of distinct distances between two ids, and so the number of buckets.
pub const MAX_DISTANCE: u16 = ID_SIZE as u16 * 8;

#[derive(Clone, Copy, PartialEq, Ord, PartialOrd, Eq, Hash)]
/// Node identity on the discovery network, the node's ed25519 public key.
pub struct NodeId(pub [u8; ID_SIZE]);

impl NodeId {
    pub fn random() -> NodeId {
        let mut rng = rand::thread_rng();
        let random_bytes: [u8; ID_SIZE] = rng.gen();

        NodeId(random_bytes)
    }

    /// Create a new NodeId from some bytes. Returns Err if `bytes` is not of length
    /// [ID_SIZE].
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<NodeId> {
        let bytes = bytes.as_ref();
        if bytes.len() != ID_SIZE {
            return Err(Error::InvalidIdSize(bytes.len()));
        }

        let mut tmp: [u8; ID_SIZE] = [0; ID_SIZE];
        tmp.copy_from_slice(bytes);

        Ok(NodeId(tmp))
    }

    /// Simplified XOR distance between this NodeId and a target NodeId.
    ///
    /// The distance is the number of trailing bits after the longest common prefix.
    ///
    /// Distance to self is 0
    /// Distance to the furthest NodeId is 256
    /// Distance to a NodeId with 5 leading matching bits is 251
    pub fn distance(&self, other: &NodeId) -> u16 {
        for i in 0..ID_SIZE {
            let a = self.0[i];
            let b = other.0[i];

            if a != b {
                let leading_zeros = i as u16 * 8 + (a ^ b).leading_zeros() as u16;

                return MAX_DISTANCE - leading_zeros;
            }
        }

        0
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl From<&VerifyingKey> for NodeId {
    fn from(key: &VerifyingKey) -> Self {
        NodeId(key.to_bytes())
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }

        Ok(())
    }
}

impl Debug for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self)
    }
}

impl FromStr for NodeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<NodeId> {
        if s.len() != ID_SIZE * 2 || !s.is_ascii() {
            return Err(Error::InvalidNodeId(s.to_string()));
        }

        let mut bytes = [0_u8; ID_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::InvalidNodeId(s.to_string()))?;
        }

        Ok(NodeId(bytes))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn distance_to_self() {
        let id = NodeId::random();
        let distance = id.distance(&id);
        assert_eq!(distance, 0)
    }

    #[test]
    fn distance_to_id() {
        let id = NodeId([0; ID_SIZE]);

        let mut bytes = [0; ID_SIZE];
        bytes[0] = 0b0000_0100;
        let target = NodeId(bytes);

        assert_eq!(id.distance(&target), 251);
    }

    #[test]
    fn distance_to_random_id() {
        let id = NodeId::random();
        let target = NodeId::random();

        let distance = id.distance(&target);

        assert_ne!(distance, 0);
        assert!(distance <= MAX_DISTANCE);
    }

    #[test]
    fn distance_to_furthest() {
        let id = NodeId::random();

        let mut opposite = [0_u8; ID_SIZE];
        for (i, &value) in id.0.iter().enumerate() {
            opposite[i] = value ^ 0xff;
        }
        let target = NodeId(opposite);

        assert_eq!(id.distance(&target), MAX_DISTANCE);
    }

    #[test]
    fn from_bytes_wrong_size() {
        assert!(matches!(
            NodeId::from_bytes([0_u8; 20]),
            Err(Error::InvalidIdSize(20))
        ));
    }

    #[test]
    fn hex_display_and_parse() {
        let id = NodeId::random();
        let hex = id.to_string();

        assert_eq!(hex.len(), 64);
        assert_eq!(hex.parse::<NodeId>().unwrap(), id);
        assert!("zz".parse::<NodeId>().is_err());
    }
}
