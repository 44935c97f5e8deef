pub mod node;

pub use node::*;

/*
    The engine does not own sockets. A transport hands every raw frame it
    receives, from any connection, to the replica's single inbound queue, and
    takes outbound frames off the replica's hands without blocking it:
    sending is queued, never performed inside a protocol transition.
*/

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::warn;

use crate::{
    common::error::{Error, Result},
    consensus::message::{ClientId, ReplicaId},
};

pub trait Transport: Send + Sync + 'static {
    /// Queues `frame` for every consensus peer except this replica.
    fn broadcast(&self, frame: Vec<u8>) -> Result<()>;

    fn send_to_client(&self, client_id: ClientId, frame: Vec<u8>) -> Result<()>;
}

pub type Inbound = UnboundedReceiver<Vec<u8>>;

/// In-process network: one unbounded queue per replica and per client.
#[derive(Debug)]
pub struct LocalNetwork {
    replicas: Vec<UnboundedSender<Vec<u8>>>,
    inbound: Vec<Option<Inbound>>,
    clients: Arc<RwLock<HashMap<ClientId, UnboundedSender<Vec<u8>>>>>,
}

impl LocalNetwork {
    pub fn new(num_replica: usize) -> Self {
        let (replicas, inbound) = (0..num_replica)
            .map(|_| {
                let (tx, rx) = unbounded_channel();
                (tx, Some(rx))
            })
            .unzip();
        LocalNetwork {
            replicas,
            inbound,
            clients: Default::default(),
        }
    }

    pub fn register_client(&self, id: ClientId) -> Inbound {
        let (tx, rx) = unbounded_channel();
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        rx
    }

    /// Hands out a replica's inbound queue. Each queue has a single consumer,
    /// so this returns `None` after the first call.
    pub fn take_inbound(&mut self, replica: ReplicaId) -> Option<Inbound> {
        self.inbound.get_mut(replica as usize)?.take()
    }

    pub fn transport(&self, replica: ReplicaId) -> ChannelTransport {
        ChannelTransport {
            id: replica,
            replicas: self.replicas.clone(),
            clients: self.clients.clone(),
        }
    }

    pub fn replica_senders(&self) -> ReplicaSenders {
        ReplicaSenders(self.replicas.clone())
    }
}

#[derive(Debug, Clone)]
pub struct ChannelTransport {
    id: ReplicaId,
    replicas: Vec<UnboundedSender<Vec<u8>>>,
    clients: Arc<RwLock<HashMap<ClientId, UnboundedSender<Vec<u8>>>>>,
}

impl Transport for ChannelTransport {
    fn broadcast(&self, frame: Vec<u8>) -> Result<()> {
        for (peer, sender) in self.replicas.iter().enumerate() {
            if peer == self.id as usize {
                continue;
            }
            // a crashed peer must not stop delivery to the rest
            if sender.send(frame.clone()).is_err() {
                warn!(replica = self.id, peer, "peer queue closed");
            }
        }
        Ok(())
    }

    fn send_to_client(&self, client_id: ClientId, frame: Vec<u8>) -> Result<()> {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        let sender = clients
            .get(&client_id)
            .ok_or_else(|| Error::UnknownSender(format!("client {client_id}")))?;
        sender.send(frame).map_err(|_| Error::ChannelClosed)
    }
}

/// Client-side handle for submitting frames to every replica.
#[derive(Debug, Clone)]
pub struct ReplicaSenders(Vec<UnboundedSender<Vec<u8>>>);

impl ReplicaSenders {
    pub fn send_to(&self, replica: ReplicaId, frame: Vec<u8>) -> Result<()> {
        self.0
            .get(replica as usize)
            .ok_or_else(|| Error::UnknownSender(format!("replica {replica}")))?
            .send(frame)
            .map_err(|_| Error::ChannelClosed)
    }

    pub fn send_to_all(&self, frame: Vec<u8>) -> Result<()> {
        let mut delivered = 0;
        for sender in &self.0 {
            if sender.send(frame.clone()).is_ok() {
                delivered += 1;
            }
        }
        if delivered == 0 {
            return Err(Error::ChannelClosed);
        }
        Ok(())
    }
}
