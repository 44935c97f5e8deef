use thiserror::Error;

use super::crypto::Digest;
use crate::consensus::message::{Kind, ReplicaId, SequenceId, ViewId};

/// Everything that can go wrong between an inbound frame and an outbound one.
///
/// Protocol and decode errors are handled where they occur: the frame is
/// dropped and logged. Only [`Error::is_fatal`] errors stop a replica.
#[derive(Debug, Error)]
pub enum Error {
    /// Tag segment does not name one of the five message kinds.
    #[error("unknown message kind tag {0:?}")]
    UnknownKind(String),

    /// Frame too short to hold the tag (and signature, for signed kinds).
    #[error("truncated frame of {len} bytes")]
    Truncated { len: usize },

    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid digest encoding: {0}")]
    InvalidDigest(String),

    /// Signature presence does not match the kind (reply frames carry none).
    #[error("signature segment does not match kind {0}")]
    SignatureSegment(Kind),

    #[error("digest mismatch: claimed {claimed}, computed {computed}")]
    DigestMismatch { claimed: Digest, computed: Digest },

    #[error("invalid {kind} signature from {signer}")]
    InvalidSignature { kind: Kind, signer: String },

    #[error("no pre-prepare recorded for digest {0}")]
    UnknownDigest(Digest),

    #[error(
        "vote for {digest} at view {view} seq {sequence} does not match pre-prepared view {expected_view} seq {expected_sequence}"
    )]
    SlotMismatch {
        digest: Digest,
        view: ViewId,
        sequence: SequenceId,
        expected_view: ViewId,
        expected_sequence: SequenceId,
    },

    #[error("pre-prepare for view {view} from replica {actual}, primary is {expected}")]
    WrongPrimary {
        view: ViewId,
        expected: ReplicaId,
        actual: ReplicaId,
    },

    #[error("message for view {view}, current view is {current}")]
    WrongView { view: ViewId, current: ViewId },

    #[error("view {view} seq {sequence} already bound to {existing}, refusing {proposed}")]
    ConflictingPrePrepare {
        view: ViewId,
        sequence: SequenceId,
        existing: Digest,
        proposed: Digest,
    },

    #[error("unknown sender {0}")]
    UnknownSender(String),

    /// Client request delivered to a backup.
    #[error("replica {replica} is not the primary")]
    NotPrimary { replica: ReplicaId },

    #[error("unexpected {0} message")]
    UnexpectedKind(Kind),

    /// Local precondition violation: this replica cannot sign.
    #[error("no private key loaded")]
    MissingPrivateKey,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("channel closed")]
    ChannelClosed,
}

impl Error {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::MissingPrivateKey)
    }

    /// Drops that say something about a peer's honesty, as opposed to ordinary
    /// reordering or routing noise.
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            Error::DigestMismatch { .. }
                | Error::InvalidSignature { .. }
                | Error::SlotMismatch { .. }
                | Error::WrongPrimary { .. }
                | Error::ConflictingPrePrepare { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
