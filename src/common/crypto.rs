use std::fmt;

use ed25519_dalek::{ed25519::{self, signature::Signer}, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as ShaDigest, Sha256};

use super::error::{Error, Result};

pub const DIGEST_LENGTH: usize = 32;
pub const SIGNATURE_LENGTH: usize = ed25519_dalek::SIGNATURE_LENGTH;

/// SHA-256 content hash. Travels as a lowercase hex string inside payloads.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; DIGEST_LENGTH]);

impl Digest {
    /// Hashes the canonical (`serde_json`) encoding of `value`.
    pub fn of<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(value)?;
        Ok(Self::of_bytes(&encoded))
    }

    pub fn of_bytes(bytes: &[u8]) -> Self {
        let result = Sha256::digest(bytes);
        let mut digest = [0u8; DIGEST_LENGTH];
        digest.copy_from_slice(&result[..]);
        Digest(digest)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded).map_err(|err| Error::InvalidDigest(err.to_string()))?;
        let digest: [u8; DIGEST_LENGTH] = bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| Error::InvalidDigest(format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(Digest(digest))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..12])
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Digest::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}

pub struct Keypair {
    pubkey: Pubkey,
    dalek_signer: SigningKey,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Pubkey {
    pub key: [u8; 32],
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Signature {
    pub sig: [u8; SIGNATURE_LENGTH],
}

impl Keypair {
    pub fn new_pair() -> Self {
        let mut csprng = OsRng;
        Self::from_signing_key(SigningKey::generate(&mut csprng))
    }

    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(secret))
    }

    pub fn from_secret_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded.trim()).map_err(|err| Error::InvalidKey(err.to_string()))?;
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidKey("secret key must be 32 bytes".to_string()))?;
        Ok(Self::from_secret_bytes(&secret))
    }

    fn from_signing_key(dalek_signer: SigningKey) -> Self {
        let pubkey = Pubkey::from(&dalek_signer.verifying_key().to_bytes());
        Keypair {
            pubkey,
            dalek_signer,
        }
    }

    /// Signs the digest of `payload`, never the raw bytes.
    pub fn sign(&self, payload: &[u8]) -> Signature {
        let digest = Digest::of_bytes(payload);
        let sig = self.dalek_signer.sign(&digest.0).to_bytes();
        Signature { sig }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.pubkey.clone()
    }

    pub fn secret_to_hex(&self) -> String {
        hex::encode(self.dalek_signer.to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair").field("pubkey", &self.pubkey).finish_non_exhaustive()
    }
}

/// Signing entry point for replicas. A replica without key material must not
/// emit anything, so the absent key surfaces as a fatal error.
pub fn sign(payload: &[u8], keypair: Option<&Keypair>) -> Result<Signature> {
    keypair
        .map(|keypair| keypair.sign(payload))
        .ok_or(Error::MissingPrivateKey)
}

/// Recomputes the digest of `payload` and checks `signature` against it.
/// Malformed keys and signatures verify as `false`.
pub fn verify(payload: &[u8], signature: &Signature, pubkey: &Pubkey) -> bool {
    let Ok(dalek_pubkey) = VerifyingKey::from_bytes(&pubkey.key) else {
        return false;
    };
    let dalek_sig = ed25519::Signature::from_bytes(&signature.sig);
    let digest = Digest::of_bytes(payload);
    dalek_pubkey.verify_strict(&digest.0, &dalek_sig).is_ok()
}

impl Pubkey {
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded.trim()).map_err(|err| Error::InvalidKey(err.to_string()))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidKey("public key must be 32 bytes".to_string()))?;
        Ok(Pubkey { key })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.key)
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.key
    }
}

impl From<&[u8; 32]> for Pubkey {
    fn from(bytes: &[u8; 32]) -> Self {
        Pubkey { key: *bytes }
    }
}

impl Signature {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let sig: [u8; SIGNATURE_LENGTH] = bytes
            .try_into()
            .map_err(|_| Error::Truncated { len: bytes.len() })?;
        Ok(Signature { sig })
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.sig
    }
}
