//! Frame layout, one frame per logical message:
//!
//! ```text
//! [ kind tag: TAG_LENGTH bytes, right-padded with 0x00 ]
//! [ payload: serde_json encoding of the message body   ]
//! [ signature: SIGNATURE_LENGTH bytes, absent for Reply ]
//! ```

use crate::common::{
    crypto::{self, Keypair, Pubkey, Signature, SIGNATURE_LENGTH},
    error::{Error, Result},
};

use super::message::{Kind, Message};

pub const TAG_LENGTH: usize = 12;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Frame {
    pub kind: Kind,
    pub payload: Vec<u8>,
    pub signature: Option<Signature>,
}

impl Frame {
    pub fn message(&self) -> Result<Message> {
        Message::decode_payload(self.kind, &self.payload)
    }

    pub fn is_signed_by(&self, pubkey: &Pubkey) -> bool {
        self.signature
            .as_ref()
            .is_some_and(|signature| crypto::verify(&self.payload, signature, pubkey))
    }
}

pub fn compose(kind: Kind, payload: &[u8], signature: Option<&Signature>) -> Result<Vec<u8>> {
    if kind.is_signed() != signature.is_some() {
        return Err(Error::SignatureSegment(kind));
    }
    let mut bytes = Vec::with_capacity(TAG_LENGTH + payload.len() + SIGNATURE_LENGTH);
    let mut tag = [0u8; TAG_LENGTH];
    tag[..kind.tag().len()].copy_from_slice(kind.tag().as_bytes());
    bytes.extend_from_slice(&tag);
    bytes.extend_from_slice(payload);
    if let Some(signature) = signature {
        bytes.extend_from_slice(signature.as_ref());
    }
    Ok(bytes)
}

pub fn split(bytes: &[u8]) -> Result<Frame> {
    if bytes.len() < TAG_LENGTH {
        return Err(Error::Truncated { len: bytes.len() });
    }
    let (tag, rest) = bytes.split_at(TAG_LENGTH);
    let name_len = tag.iter().position(|&b| b == 0).unwrap_or(TAG_LENGTH);
    let (name, padding) = tag.split_at(name_len);
    let name = String::from_utf8_lossy(name);
    let kind = Kind::from_tag(&name)
        .filter(|_| padding.iter().all(|&b| b == 0))
        .ok_or_else(|| Error::UnknownKind(name.into_owned()))?;

    if !kind.is_signed() {
        return Ok(Frame {
            kind,
            payload: rest.to_vec(),
            signature: None,
        });
    }
    if rest.len() < SIGNATURE_LENGTH {
        return Err(Error::Truncated { len: bytes.len() });
    }
    let (payload, signature) = rest.split_at(rest.len() - SIGNATURE_LENGTH);
    Ok(Frame {
        kind,
        payload: payload.to_vec(),
        signature: Some(Signature::from_slice(signature)?),
    })
}

/// Encodes `message` and, for signed kinds, signs the encoded payload.
pub fn seal(message: &Message, keypair: Option<&Keypair>) -> Result<Vec<u8>> {
    let kind = message.kind();
    let payload = message.encode_payload()?;
    if kind.is_signed() {
        let signature = crypto::sign(&payload, keypair)?;
        compose(kind, &payload, Some(&signature))
    } else {
        compose(kind, &payload, None)
    }
}
