use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::{
    crypto::Digest,
    error::{Error, Result},
};

/*
    A client c requests the execution of operation o by sending a
    <REQUEST, o, t, c> message to the primary. The primary assigns the
    request a sequence number n in view v and multicasts
    <PRE-PREPARE, v, n, d> together with the request, where d is the
    request's digest. A backup that accepts the pre-prepare multicasts
    <PREPARE, v, n, d, i>. Once a replica has the pre-prepare and 2f
    matching prepares it multicasts <COMMIT, v, n, d, i>, and once it has
    2f + 1 matching commits it executes the operation and sends
    <REPLY, v, t, c, i, r> straight to the client.
*/

pub type ReplicaId = u32;
pub type ClientId = u32;
pub type ViewId = u64;
pub type SequenceId = u64;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Kind {
    Request,
    PrePrepare,
    Prepare,
    Commit,
    Reply,
}

impl Kind {
    pub const ALL: [Kind; 5] = [
        Kind::Request,
        Kind::PrePrepare,
        Kind::Prepare,
        Kind::Commit,
        Kind::Reply,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Kind::Request => "Request",
            Kind::PrePrepare => "PrePrepare",
            Kind::Prepare => "Prepare",
            Kind::Commit => "Commit",
            Kind::Reply => "Reply",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Kind> {
        Kind::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Replies go to the client unsigned; everything else carries a signature.
    pub fn is_signed(&self) -> bool {
        !matches!(self, Kind::Reply)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The opaque operation payload plus the digest the client computed over it.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ClientRequest {
    pub message: String,
    pub digest: Digest,
}

impl ClientRequest {
    pub fn new(message: impl Into<String>) -> Result<Self> {
        let message = message.into();
        let digest = Digest::of(&message)?;
        Ok(ClientRequest { message, digest })
    }

    /// Recomputes the digest and checks it against the client's claim.
    pub fn verify_digest(&self) -> Result<Digest> {
        let computed = Digest::of(&self.message)?;
        if computed != self.digest {
            return Err(Error::DigestMismatch {
                claimed: self.digest,
                computed,
            });
        }
        Ok(computed)
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RequestMessage {
    pub operation: String,
    pub timestamp: u64,
    pub client_id: ClientId,
    pub request: ClientRequest,
}

impl RequestMessage {
    pub fn digest(&self) -> Digest {
        self.request.digest
    }
}

/// Position of a request in the total order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Slot {
    pub view: ViewId,
    pub sequence: SequenceId,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PrePrepareMessage {
    pub request: RequestMessage,
    pub digest: Digest,
    pub view: ViewId,
    pub sequence: SequenceId,
    /// The primary that issued it.
    pub replica_id: ReplicaId,
}

impl PrePrepareMessage {
    pub fn slot(&self) -> Slot {
        Slot {
            view: self.view,
            sequence: self.sequence,
        }
    }
}

/// Body shared by prepare and commit messages.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Vote {
    pub digest: Digest,
    pub view: ViewId,
    pub sequence: SequenceId,
    pub replica_id: ReplicaId,
}

impl Vote {
    pub fn slot(&self) -> Slot {
        Slot {
            view: self.view,
            sequence: self.sequence,
        }
    }
}

pub type PrepareMessage = Vote;
pub type CommitMessage = Vote;

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ReplyMessage {
    pub view: ViewId,
    pub timestamp: u64,
    pub client_id: ClientId,
    pub replica_id: ReplicaId,
    pub digest: Digest,
    pub result: String,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Message {
    Request(RequestMessage),
    PrePrepare(PrePrepareMessage),
    Prepare(PrepareMessage),
    Commit(CommitMessage),
    Reply(ReplyMessage),
}

impl Message {
    pub fn kind(&self) -> Kind {
        match self {
            Message::Request(_) => Kind::Request,
            Message::PrePrepare(_) => Kind::PrePrepare,
            Message::Prepare(_) => Kind::Prepare,
            Message::Commit(_) => Kind::Commit,
            Message::Reply(_) => Kind::Reply,
        }
    }

    pub fn encode_payload(&self) -> Result<Vec<u8>> {
        let payload = match self {
            Message::Request(request) => serde_json::to_vec(request)?,
            Message::PrePrepare(pre_prepare) => serde_json::to_vec(pre_prepare)?,
            Message::Prepare(vote) | Message::Commit(vote) => serde_json::to_vec(vote)?,
            Message::Reply(reply) => serde_json::to_vec(reply)?,
        };
        Ok(payload)
    }

    pub fn decode_payload(kind: Kind, payload: &[u8]) -> Result<Self> {
        let message = match kind {
            Kind::Request => Message::Request(serde_json::from_slice(payload)?),
            Kind::PrePrepare => Message::PrePrepare(serde_json::from_slice(payload)?),
            Kind::Prepare => Message::Prepare(serde_json::from_slice(payload)?),
            Kind::Commit => Message::Commit(serde_json::from_slice(payload)?),
            Kind::Reply => Message::Reply(serde_json::from_slice(payload)?),
        };
        Ok(message)
    }
}
