use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

/// Signed envelope around a bencoded [PacketBody].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SignedPacket {
    #[serde(rename = "b", with = "serde_bytes")]
    pub body: Vec<u8>,

    #[serde(rename = "k", with = "serde_bytes")]
    pub public_key: [u8; 32],

    #[serde(rename = "s", with = "serde_bytes")]
    pub signature: [u8; 64],
}

impl SignedPacket {
    pub fn from_bytes(bytes: &[u8]) -> Result<SignedPacket, serde_bencode::Error> {
        let obj = serde_bencode::from_bytes(bytes)?;
        Ok(obj)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_bencode::Error> {
        serde_bencode::to_bytes(self)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PacketBody {
    #[serde(rename = "i")]
    pub message_id: ByteBuf,

    #[serde(default)]
    #[serde(rename = "n")]
    // Older nodes don't send a network id at all.
    pub network_id: Option<u32>,

    #[serde(rename = "y")]
    pub message_type: u8,

    #[serde(default)]
    #[serde(rename = "t")]
    pub target: Option<ByteBuf>,

    #[serde(default)]
    pub nodes: Option<Vec<ByteBuf>>,
}

impl PacketBody {
    pub fn from_bytes(bytes: &[u8]) -> Result<PacketBody, serde_bencode::Error> {
        let obj = serde_bencode::from_bytes(bytes)?;
        Ok(obj)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_bencode::Error> {
        serde_bencode::to_bytes(self)
    }
}
