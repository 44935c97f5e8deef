use std::{collections::HashSet, path::Path};

use serde::{Deserialize, Serialize};

use super::{
    crypto::{Keypair, Pubkey},
    error::{Error, Result},
};
use crate::consensus::{
    message::{ClientId, ReplicaId, ViewId},
    peers::{Peer, Peers},
};

/// Resolved system configuration, usually loaded from a JSON file:
///
/// ```json
/// {
///   "view": 0,
///   "replicas": [{ "id": 0, "address": "127.0.0.1:7000", "public_key": "<hex>" }],
///   "clients": [{ "id": 10, "public_key": "<hex>" }]
/// }
/// ```
///
/// `secret_key` is optional on every entry. A deployment keeps only its own
/// secret; a single-process cluster may carry all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub view: ViewId,
    pub replicas: Vec<ReplicaEntry>,
    #[serde(default)]
    pub clients: Vec<ClientEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaEntry {
    pub id: ReplicaId,
    pub address: String,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEntry {
    pub id: ClientId,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Fresh keys for `num_replica` replicas and one client, secrets included.
    pub fn generate_local(num_replica: usize, client_id: ClientId) -> Self {
        let replicas = (0..num_replica as ReplicaId)
            .map(|id| {
                let keypair = Keypair::new_pair();
                ReplicaEntry {
                    id,
                    address: format!("local-{id}"),
                    public_key: keypair.pubkey().to_hex(),
                    secret_key: Some(keypair.secret_to_hex()),
                }
            })
            .collect();
        let keypair = Keypair::new_pair();
        Config {
            view: 0,
            replicas,
            clients: vec![ClientEntry {
                id: client_id,
                public_key: keypair.pubkey().to_hex(),
                secret_key: Some(keypair.secret_to_hex()),
            }],
        }
    }

    /// The replica's signing key, `None` if the entry carries no secret.
    pub fn replica_keypair(&self, id: ReplicaId) -> Result<Option<Keypair>> {
        let entry = self
            .replicas
            .iter()
            .find(|entry| entry.id == id)
            .ok_or_else(|| Error::Config(format!("replica {id} is not configured")))?;
        entry
            .secret_key
            .as_deref()
            .map(|secret| load_keypair(secret, &entry.public_key))
            .transpose()
    }

    pub fn client_keypair(&self, id: ClientId) -> Result<Keypair> {
        let entry = self
            .clients
            .iter()
            .find(|entry| entry.id == id)
            .ok_or_else(|| Error::Config(format!("client {id} is not configured")))?;
        let secret = entry
            .secret_key
            .as_deref()
            .ok_or_else(|| Error::Config(format!("client {id} has no secret key")))?;
        load_keypair(secret, &entry.public_key)
    }

    /// Builds the immutable roster. Replica ids must be exactly `0..N`.
    pub fn roster(&self) -> Result<Peers> {
        if self.replicas.is_empty() {
            return Err(Error::Config("no replicas configured".to_string()));
        }
        let mut replicas = self.replicas.clone();
        replicas.sort_by_key(|entry| entry.id);
        let mut members = Vec::with_capacity(replicas.len());
        for (index, entry) in replicas.iter().enumerate() {
            if entry.id as usize != index {
                return Err(Error::Config(format!(
                    "replica ids must be contiguous from 0, found {} at position {index}",
                    entry.id
                )));
            }
            members.push(Peer {
                id: entry.id,
                address: entry.address.clone(),
                pubkey: Pubkey::from_hex(&entry.public_key)?,
            });
        }

        let mut seen = HashSet::new();
        let mut clients = Vec::with_capacity(self.clients.len());
        for entry in &self.clients {
            if !seen.insert(entry.id) {
                return Err(Error::Config(format!("duplicate client id {}", entry.id)));
            }
            clients.push((entry.id, Pubkey::from_hex(&entry.public_key)?));
        }
        Ok(Peers::new(members).with_clients(clients))
    }
}

fn load_keypair(secret: &str, public_key: &str) -> Result<Keypair> {
    let keypair = Keypair::from_secret_hex(secret)?;
    if keypair.pubkey() != Pubkey::from_hex(public_key)? {
        return Err(Error::InvalidKey(format!(
            "secret key does not match public key {public_key}"
        )));
    }
    Ok(keypair)
}
