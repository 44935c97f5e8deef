use std::collections::HashMap;

use crate::common::crypto::Pubkey;
use super::message::{ClientId, ReplicaId, ViewId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub id: ReplicaId,
    pub address: String,
    pub pubkey: Pubkey,
}

/// Fixed roster of replicas (indexed by id) plus the known client keys.
#[derive(Debug, Clone)]
pub struct Peers {
    pub members: Vec<Peer>,
    clients: HashMap<ClientId, Pubkey>,
}

impl Peers {
    pub fn new(mut members: Vec<Peer>) -> Self {
        members.sort_by_key(|peer| peer.id);
        Peers {
            members,
            clients: HashMap::new(),
        }
    }

    pub fn with_clients(mut self, clients: impl IntoIterator<Item = (ClientId, Pubkey)>) -> Self {
        self.clients.extend(clients);
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// f = ⌊(N - 1) / 3⌋
    pub fn num_faulty(&self) -> usize {
        self.len().saturating_sub(1) / 3
    }

    /// Matching votes needed to advance a phase: 2f + 1.
    pub fn quorum(&self) -> usize {
        2 * self.num_faulty() + 1
    }

    /// Matching replies a client waits for: f + 1.
    pub fn reply_quorum(&self) -> usize {
        self.num_faulty() + 1
    }

    pub fn get(&self, id: ReplicaId) -> Option<&Peer> {
        self.members
            .get(id as usize)
            .filter(|peer| peer.id == id)
    }

    pub fn pubkey(&self, id: ReplicaId) -> Option<&Pubkey> {
        self.get(id).map(|peer| &peer.pubkey)
    }

    pub fn is_member(&self, id: ReplicaId) -> bool {
        self.get(id).is_some()
    }

    pub fn client_pubkey(&self, id: ClientId) -> Option<&Pubkey> {
        self.clients.get(&id)
    }
}

/// Primary selection. The view never changes in this engine, so a crashed
/// primary stalls every pending request.
#[derive(Debug, Clone, Copy)]
pub struct ViewManager {
    view: ViewId,
    num_replica: usize,
}

impl ViewManager {
    pub fn new(view: ViewId, num_replica: usize) -> Self {
        assert!(num_replica > 0, "empty roster");
        ViewManager { view, num_replica }
    }

    pub fn current_view(&self) -> ViewId {
        self.view
    }

    pub fn primary_for(&self, view: ViewId) -> ReplicaId {
        (view % self.num_replica as ViewId) as ReplicaId
    }

    pub fn primary(&self) -> ReplicaId {
        self.primary_for(self.view)
    }

    pub fn is_primary(&self, id: ReplicaId) -> bool {
        self.primary() == id
    }
}
