use std::{collections::HashMap, sync::Arc};

use tracing::{debug, info};

use crate::{
    common::{
        clock::Clock,
        crypto::{Digest, Keypair},
        error::{Error, Result},
    },
    network::{Inbound, ReplicaSenders},
};
use super::{
    codec,
    message::{ClientId, ClientRequest, Message, ReplicaId, RequestMessage},
};

/// Submits signed requests and waits for f + 1 replicas to agree on the
/// result. A single faulty replica can never satisfy a request on its own.
pub struct Client {
    id: ClientId,
    keypair: Keypair,
    num_replica: usize,
    num_faulty: usize,
    pending: HashMap<Digest, HashMap<ReplicaId, String>>,
    /// Agreed results. Replicas drop a request they already admitted, so a
    /// repeated payload can only be answered from here.
    completed: HashMap<Digest, String>,
    clock: Arc<dyn Clock>,
}

impl Client {
    pub fn new(id: ClientId, keypair: Keypair, num_replica: usize, clock: Arc<dyn Clock>) -> Self {
        Client {
            id,
            keypair,
            num_replica,
            num_faulty: num_replica.saturating_sub(1) / 3,
            pending: HashMap::new(),
            completed: HashMap::new(),
            clock,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn reply_quorum(&self) -> usize {
        self.num_faulty + 1
    }

    /// Builds a signed request frame and starts tracking its replies.
    pub fn request(&mut self, operation: &str, message: &str) -> Result<(Digest, Vec<u8>)> {
        let request = RequestMessage {
            operation: operation.to_string(),
            timestamp: self.clock.now(),
            client_id: self.id,
            request: ClientRequest::new(message)?,
        };
        let digest = request.digest();
        let frame = codec::seal(&Message::Request(request), Some(&self.keypair))?;
        if !self.completed.contains_key(&digest) {
            self.pending.entry(digest).or_default();
        }
        Ok((digest, frame))
    }

    /// Records one reply. Returns the agreed result the first time f + 1
    /// distinct replicas have returned it.
    pub fn handle_reply(&mut self, bytes: &[u8]) -> Result<Option<(Digest, String)>> {
        let frame = codec::split(bytes)?;
        let Message::Reply(reply) = frame.message()? else {
            return Err(Error::UnexpectedKind(frame.kind));
        };
        if reply.client_id != self.id || reply.replica_id as usize >= self.num_replica {
            return Err(Error::UnknownSender(format!(
                "replica {} replying to client {}",
                reply.replica_id, reply.client_id
            )));
        }
        if self.completed.contains_key(&reply.digest) {
            debug!(client = self.id, digest = %reply.digest, "late reply");
            return Ok(None);
        }
        let replies = self
            .pending
            .get_mut(&reply.digest)
            .ok_or(Error::UnknownDigest(reply.digest))?;
        replies.entry(reply.replica_id).or_insert(reply.result);

        let quorum = self.num_faulty + 1;
        let agreed = replies.values().find(|candidate| {
            replies.values().filter(|result| result == candidate).count() >= quorum
        });
        let Some(result) = agreed.cloned() else {
            return Ok(None);
        };
        self.pending.remove(&reply.digest);
        self.completed.insert(reply.digest, result.clone());
        info!(client = self.id, digest = %reply.digest, "request satisfied");
        Ok(Some((reply.digest, result)))
    }

    /// Distinct replicas that have replied for `digest` so far.
    pub fn reply_count(&self, digest: &Digest) -> usize {
        self.pending.get(digest).map_or(0, HashMap::len)
    }

    pub fn is_completed(&self, digest: &Digest) -> bool {
        self.completed.contains_key(digest)
    }

    pub fn result(&self, digest: &Digest) -> Option<&str> {
        self.completed.get(digest).map(String::as_str)
    }

    /// Sends the request to every replica and waits on `replies` until it
    /// is satisfied. A payload that already completed returns its agreed
    /// result without going to the replicas. There is no retry: if quorum
    /// is never reached this waits until the reply channel closes.
    pub async fn invoke(
        &mut self,
        operation: &str,
        message: &str,
        replicas: &ReplicaSenders,
        replies: &mut Inbound,
    ) -> Result<String> {
        let (digest, frame) = self.request(operation, message)?;
        if let Some(result) = self.completed.get(&digest) {
            debug!(client = self.id, %digest, "already satisfied");
            return Ok(result.clone());
        }
        replicas.send_to_all(frame)?;
        debug!(client = self.id, %digest, "request submitted");

        while let Some(bytes) = replies.recv().await {
            match self.handle_reply(&bytes) {
                Ok(Some((satisfied, result))) if satisfied == digest => return Ok(result),
                Ok(_) => {}
                Err(err) => debug!(client = self.id, %err, "ignored reply"),
            }
        }
        Err(Error::ChannelClosed)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("num_replica", &self.num_replica)
            .field("pending", &self.pending.len())
            .finish()
    }
}
