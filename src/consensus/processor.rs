use std::{collections::HashMap, sync::Arc};

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    common::{
        clock::Clock,
        crypto::{Digest, Keypair, Pubkey},
        error::{Error, Result},
    },
    network::Transport,
};
use super::{
    codec::{self, Frame},
    executor::Executor,
    log::{ConsensusLog, LogReader, Phase},
    message::{
        ClientId, Kind, Message, PrePrepareMessage, ReplicaId, ReplyMessage, RequestMessage, Slot,
        Vote,
    },
    peers::{Peers, ViewManager},
    sequence::SequenceAllocator,
    store::RequestPool,
};

/*
    Per digest a replica moves Unseen -> PrePrepared -> Prepared ->
    Committed -> Replied and never back. Every inbound frame is handled to
    completion before the next one is looked at, so no transition needs a
    lock of its own.

    TODO: votes for a digest whose pre-prepare has not arrived yet are
    dropped; buffer them and replay once the pre-prepare is accepted.
*/

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ConsensusRole {
    Primary,
    Backup,
}

/// What a transition asks the transport to do.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Outbound {
    Broadcast(Vec<u8>),
    Reply { client_id: ClientId, frame: Vec<u8> },
}

pub struct ConsensusProcessor<E> {
    id: ReplicaId,
    keypair: Option<Keypair>,
    peers: Peers,
    views: ViewManager,
    sequence: SequenceAllocator,
    log: ConsensusLog,
    pool: RequestPool,
    slots: HashMap<Slot, Digest>,
    accepted: HashMap<Digest, Slot>,
    clock: Arc<dyn Clock>,
    executor: E,
}

impl<E: Executor> ConsensusProcessor<E> {
    pub fn new(
        id: ReplicaId,
        keypair: Option<Keypair>,
        peers: Peers,
        view: u64,
        clock: Arc<dyn Clock>,
        executor: E,
    ) -> Result<Self> {
        if !peers.is_member(id) {
            return Err(Error::Config(format!("replica {id} is not in the roster")));
        }
        let views = ViewManager::new(view, peers.len());
        Ok(ConsensusProcessor {
            id,
            keypair,
            peers,
            views,
            sequence: SequenceAllocator::new(),
            log: ConsensusLog::new(),
            pool: RequestPool::new(),
            slots: HashMap::new(),
            accepted: HashMap::new(),
            clock,
            executor,
        })
    }

    pub fn id(&self) -> ReplicaId {
        self.id
    }

    pub fn role(&self) -> ConsensusRole {
        if self.views.is_primary(self.id) {
            ConsensusRole::Primary
        } else {
            ConsensusRole::Backup
        }
    }

    pub fn log_reader(&self) -> LogReader {
        self.log.reader()
    }

    pub fn request(&self, digest: &Digest) -> Option<&RequestMessage> {
        self.pool.get(digest)
    }

    /// Drains `inbound` until every sender is gone. Stops early only on a
    /// fatal error; everything else is logged and the frame dropped.
    pub async fn run<T: Transport>(
        &mut self,
        mut inbound: UnboundedReceiver<Vec<u8>>,
        transport: T,
    ) -> Result<()> {
        info!(replica = self.id, role = ?self.role(), view = self.views.current_view(), "running consensus processor");
        while let Some(frame) = inbound.recv().await {
            match self.process(&frame) {
                Ok(outbound) => {
                    for action in outbound {
                        self.dispatch(action, &transport);
                    }
                }
                Err(err) if err.is_fatal() => {
                    error!(replica = self.id, %err, "stopping replica");
                    return Err(err);
                }
                Err(err) => self.log_drop(&err),
            }
        }
        info!(replica = self.id, "inbound queue closed");
        Ok(())
    }

    fn dispatch<T: Transport>(&self, action: Outbound, transport: &T) {
        let result = match action {
            Outbound::Broadcast(frame) => transport.broadcast(frame),
            Outbound::Reply { client_id, frame } => transport.send_to_client(client_id, frame),
        };
        if let Err(err) = result {
            warn!(replica = self.id, %err, "transport refused frame");
        }
    }

    fn log_drop(&self, err: &Error) {
        if err.is_violation() {
            warn!(replica = self.id, %err, "dropped frame: protocol violation");
        } else if matches!(err, Error::UnknownDigest(_) | Error::NotPrimary { .. }) {
            debug!(replica = self.id, %err, "dropped frame");
        } else {
            warn!(replica = self.id, %err, "dropped frame");
        }
    }

    /// Runs one transition for a raw inbound frame. Usually yields zero or
    /// one action; a vote that completes both quorums at once yields two.
    pub fn process(&mut self, bytes: &[u8]) -> Result<Vec<Outbound>> {
        let frame = codec::split(bytes)?;
        match frame.message()? {
            Message::Request(request) => self.handle_request(request, &frame),
            Message::PrePrepare(pre_prepare) => self.handle_pre_prepare(pre_prepare, &frame),
            Message::Prepare(vote) => self.handle_vote(Phase::Prepared, vote, &frame),
            Message::Commit(vote) => self.handle_vote(Phase::Committed, vote, &frame),
            Message::Reply(_) => Err(Error::UnexpectedKind(Kind::Reply)),
        }
    }

    #[instrument(skip_all, fields(replica = self.id, client = request.client_id))]
    fn handle_request(&mut self, request: RequestMessage, frame: &Frame) -> Result<Vec<Outbound>> {
        if self.role() != ConsensusRole::Primary {
            return Err(Error::NotPrimary { replica: self.id });
        }
        let pubkey = self
            .peers
            .client_pubkey(request.client_id)
            .ok_or_else(|| Error::UnknownSender(format!("client {}", request.client_id)))?;
        check_signature(frame, pubkey, || format!("client {}", request.client_id))?;
        let digest = request.request.verify_digest()?;

        if self.pool.contains(&digest) {
            debug!(%digest, "request already admitted");
            return Ok(Vec::new());
        }

        let view = self.views.current_view();
        let sequence = self.sequence.next_sequence();
        let pre_prepare = PrePrepareMessage {
            request,
            digest,
            view,
            sequence,
            replica_id: self.id,
        };
        let slot = pre_prepare.slot();
        let bytes = codec::seal(&Message::PrePrepare(pre_prepare.clone()), self.keypair.as_ref())?;

        self.pool.admit(pre_prepare.request);
        self.bind(slot, digest);
        self.log.record_vote(Phase::PrePrepared, digest, self.id);
        // the primary's pre-prepare doubles as its prepare
        self.log.record_vote(Phase::Prepared, digest, self.id);
        debug!(%digest, view, sequence, "broadcasting pre-prepare");

        let mut outbound = vec![Outbound::Broadcast(bytes)];
        outbound.extend(self.advance(digest, slot)?);
        Ok(outbound)
    }

    #[instrument(skip_all, fields(replica = self.id, view = pre_prepare.view, sequence = pre_prepare.sequence))]
    fn handle_pre_prepare(
        &mut self,
        pre_prepare: PrePrepareMessage,
        frame: &Frame,
    ) -> Result<Vec<Outbound>> {
        let current = self.views.current_view();
        if pre_prepare.view != current {
            return Err(Error::WrongView {
                view: pre_prepare.view,
                current,
            });
        }
        let primary = self.views.primary_for(pre_prepare.view);
        if pre_prepare.replica_id != primary {
            return Err(Error::WrongPrimary {
                view: pre_prepare.view,
                expected: primary,
                actual: pre_prepare.replica_id,
            });
        }
        let pubkey = self
            .peers
            .pubkey(primary)
            .ok_or_else(|| Error::UnknownSender(format!("replica {primary}")))?;
        check_signature(frame, pubkey, || format!("replica {primary}"))?;

        let computed = pre_prepare.request.request.verify_digest()?;
        if pre_prepare.digest != computed {
            return Err(Error::DigestMismatch {
                claimed: pre_prepare.digest,
                computed,
            });
        }

        let digest = pre_prepare.digest;
        let slot = pre_prepare.slot();
        match (self.slots.get(&slot), self.accepted.get(&digest)) {
            (Some(existing), _) if *existing == digest => {
                debug!(%digest, "pre-prepare already accepted");
                return Ok(Vec::new());
            }
            (Some(existing), _) => {
                return Err(Error::ConflictingPrePrepare {
                    view: slot.view,
                    sequence: slot.sequence,
                    existing: *existing,
                    proposed: digest,
                });
            }
            (None, Some(bound)) => {
                return Err(Error::SlotMismatch {
                    digest,
                    view: slot.view,
                    sequence: slot.sequence,
                    expected_view: bound.view,
                    expected_sequence: bound.sequence,
                });
            }
            (None, None) => {}
        }

        let prepare = Vote {
            digest,
            view: slot.view,
            sequence: slot.sequence,
            replica_id: self.id,
        };
        let bytes = codec::seal(&Message::Prepare(prepare), self.keypair.as_ref())?;

        self.pool.admit(pre_prepare.request);
        self.bind(slot, digest);
        self.log.record_vote(Phase::PrePrepared, digest, primary);
        self.log.record_vote(Phase::Prepared, digest, primary);
        self.log.record_vote(Phase::Prepared, digest, self.id);
        debug!(%digest, "broadcasting prepare");

        let mut outbound = vec![Outbound::Broadcast(bytes)];
        outbound.extend(self.advance(digest, slot)?);
        Ok(outbound)
    }

    #[instrument(skip_all, fields(replica = self.id, phase = ?phase, voter = vote.replica_id))]
    fn handle_vote(&mut self, phase: Phase, vote: Vote, frame: &Frame) -> Result<Vec<Outbound>> {
        let pubkey = self
            .peers
            .pubkey(vote.replica_id)
            .ok_or_else(|| Error::UnknownSender(format!("replica {}", vote.replica_id)))?;
        check_signature(frame, pubkey, || format!("replica {}", vote.replica_id))?;

        let slot = *self
            .accepted
            .get(&vote.digest)
            .ok_or(Error::UnknownDigest(vote.digest))?;
        if vote.slot() != slot {
            return Err(Error::SlotMismatch {
                digest: vote.digest,
                view: vote.view,
                sequence: vote.sequence,
                expected_view: slot.view,
                expected_sequence: slot.sequence,
            });
        }

        if !self.log.record_vote(phase, vote.digest, vote.replica_id) {
            debug!(digest = %vote.digest, "duplicate vote");
            return Ok(Vec::new());
        }
        self.advance(vote.digest, slot)
    }

    /// Emits this replica's commit once prepare quorum holds, and its reply
    /// once commit quorum holds, each at most once per digest.
    fn advance(&mut self, digest: Digest, slot: Slot) -> Result<Vec<Outbound>> {
        let quorum = self.peers.quorum();
        let mut outbound = Vec::new();

        if !self.log.has_voted(Phase::Committed, &digest, self.id)
            && self.log.count_votes(Phase::Prepared, &digest) >= quorum
        {
            let commit = Vote {
                digest,
                view: slot.view,
                sequence: slot.sequence,
                replica_id: self.id,
            };
            let bytes = codec::seal(&Message::Commit(commit), self.keypair.as_ref())?;
            self.log.record_vote(Phase::Committed, digest, self.id);
            debug!(%digest, "prepared, broadcasting commit");
            outbound.push(Outbound::Broadcast(bytes));
        }

        if !self.log.has_voted(Phase::Replied, &digest, self.id)
            && self.log.count_votes(Phase::Committed, &digest) >= quorum
        {
            outbound.push(self.reply(digest, slot)?);
        }
        Ok(outbound)
    }

    fn reply(&mut self, digest: Digest, slot: Slot) -> Result<Outbound> {
        let request = self.pool.get(&digest).ok_or(Error::UnknownDigest(digest))?;
        let result = self.executor.execute(request);
        let reply = ReplyMessage {
            view: self.views.current_view(),
            timestamp: self.clock.now(),
            client_id: request.client_id,
            replica_id: self.id,
            digest,
            result,
        };
        let client_id = reply.client_id;
        let frame = codec::seal(&Message::Reply(reply), None)?;
        self.log.record_vote(Phase::Replied, digest, self.id);
        info!(replica = self.id, %digest, sequence = slot.sequence, client = client_id, "committed, replying");
        Ok(Outbound::Reply { client_id, frame })
    }

    fn bind(&mut self, slot: Slot, digest: Digest) {
        self.slots.insert(slot, digest);
        self.accepted.insert(digest, slot);
    }
}

fn check_signature(frame: &Frame, pubkey: &Pubkey, signer: impl FnOnce() -> String) -> Result<()> {
    if frame.is_signed_by(pubkey) {
        Ok(())
    } else {
        Err(Error::InvalidSignature {
            kind: frame.kind,
            signer: signer(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::clock::ManualClock,
        consensus::{
            executor::EchoExecutor,
            message::{ClientRequest, ReplyMessage},
            peers::Peer,
        },
    };

    const CLIENT: ClientId = 100;

    fn replica_key(id: ReplicaId) -> Keypair {
        Keypair::from_secret_bytes(&[id as u8 + 1; 32])
    }

    fn client_key() -> Keypair {
        Keypair::from_secret_bytes(&[200u8; 32])
    }

    fn peers(n: usize) -> Peers {
        Peers::new(
            (0..n as ReplicaId)
                .map(|id| Peer {
                    id,
                    address: format!("replica-{id}"),
                    pubkey: replica_key(id).pubkey(),
                })
                .collect(),
        )
        .with_clients([(CLIENT, client_key().pubkey())])
    }

    fn processor(id: ReplicaId) -> ConsensusProcessor<EchoExecutor> {
        ConsensusProcessor::new(
            id,
            Some(replica_key(id)),
            peers(4),
            0,
            Arc::new(ManualClock::new(42)),
            EchoExecutor,
        )
        .unwrap()
    }

    fn request(message: &str) -> RequestMessage {
        RequestMessage {
            operation: "solve".to_string(),
            timestamp: 1,
            client_id: CLIENT,
            request: ClientRequest::new(message).unwrap(),
        }
    }

    fn request_frame(message: &str) -> Vec<u8> {
        codec::seal(&Message::Request(request(message)), Some(&client_key())).unwrap()
    }

    fn pre_prepare(message: &str, sequence: u64) -> PrePrepareMessage {
        let request = request(message);
        PrePrepareMessage {
            digest: request.digest(),
            request,
            view: 0,
            sequence,
            replica_id: 0,
        }
    }

    fn signed(message: Message, signer: ReplicaId) -> Vec<u8> {
        codec::seal(&message, Some(&replica_key(signer))).unwrap()
    }

    fn vote(message: &str, sequence: u64, replica_id: ReplicaId) -> Vote {
        Vote {
            digest: Digest::of(&message).unwrap(),
            view: 0,
            sequence,
            replica_id,
        }
    }

    fn broadcast_message(outbound: &Outbound) -> Message {
        let Outbound::Broadcast(bytes) = outbound else {
            panic!("expected broadcast, got {outbound:?}");
        };
        codec::split(bytes).unwrap().message().unwrap()
    }

    #[test]
    fn test_primary_admits_request() {
        let mut primary = processor(0);
        assert_eq!(primary.role(), ConsensusRole::Primary);

        let outbound = primary.process(&request_frame("hello")).unwrap();
        assert_eq!(outbound.len(), 1);
        let Message::PrePrepare(pre_prepare) = broadcast_message(&outbound[0]) else {
            panic!("expected pre-prepare");
        };
        assert_eq!(pre_prepare.sequence, 0);
        assert_eq!(pre_prepare.digest, Digest::of(&"hello").unwrap());

        let digest = pre_prepare.digest;
        let log = primary.log_reader();
        assert!(log.has_voted(Phase::PrePrepared, &digest, 0));
        assert_eq!(log.count_votes(Phase::Prepared, &digest), 1);
        assert!(primary.request(&digest).is_some());

        let Message::PrePrepare(next) =
            broadcast_message(&primary.process(&request_frame("world")).unwrap()[0])
        else {
            panic!("expected pre-prepare");
        };
        assert_eq!(next.sequence, 1);
    }

    #[test]
    fn test_duplicate_request_is_ignored() {
        let mut primary = processor(0);
        primary.process(&request_frame("hello")).unwrap();
        assert!(primary.process(&request_frame("hello")).unwrap().is_empty());
        assert_eq!(primary.sequence.allocated(), 1);
    }

    #[test]
    fn test_request_checks() {
        let mut backup = processor(1);
        assert!(matches!(
            backup.process(&request_frame("hello")),
            Err(Error::NotPrimary { replica: 1 })
        ));

        let mut primary = processor(0);
        let mut tampered = request("hello");
        tampered.request.message = "hellp".to_string();
        let frame = codec::seal(&Message::Request(tampered), Some(&client_key())).unwrap();
        assert!(matches!(primary.process(&frame), Err(Error::DigestMismatch { .. })));

        let forged = codec::seal(&Message::Request(request("hello")), Some(&replica_key(3))).unwrap();
        assert!(matches!(primary.process(&forged), Err(Error::InvalidSignature { .. })));

        let mut stranger = request("hello");
        stranger.client_id = 5;
        let frame = codec::seal(&Message::Request(stranger), Some(&client_key())).unwrap();
        assert!(matches!(primary.process(&frame), Err(Error::UnknownSender(_))));
        assert_eq!(primary.sequence.allocated(), 0);
    }

    #[test]
    fn test_backup_prepares_on_pre_prepare() {
        let mut backup = processor(2);
        let outbound = backup
            .process(&signed(Message::PrePrepare(pre_prepare("hello", 0)), 0))
            .unwrap();
        assert_eq!(outbound.len(), 1);
        assert_eq!(
            broadcast_message(&outbound[0]),
            Message::Prepare(vote("hello", 0, 2))
        );

        let digest = Digest::of(&"hello").unwrap();
        let log = backup.log_reader();
        assert!(log.has_voted(Phase::PrePrepared, &digest, 0));
        assert!(log.has_voted(Phase::Prepared, &digest, 0));
        assert!(log.has_voted(Phase::Prepared, &digest, 2));
    }

    #[test]
    fn test_duplicate_pre_prepare_is_noop() {
        let mut backup = processor(1);
        let frame = signed(Message::PrePrepare(pre_prepare("hello", 0)), 0);
        assert_eq!(backup.process(&frame).unwrap().len(), 1);
        assert!(backup.process(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_pre_prepare_from_non_primary() {
        let mut backup = processor(1);
        let mut message = pre_prepare("hello", 0);
        message.replica_id = 3;
        assert!(matches!(
            backup.process(&signed(Message::PrePrepare(message), 3)),
            Err(Error::WrongPrimary { expected: 0, actual: 3, .. })
        ));

        // claims to be the primary but signed by someone else
        assert!(matches!(
            backup.process(&signed(Message::PrePrepare(pre_prepare("hello", 0)), 3)),
            Err(Error::InvalidSignature { kind: Kind::PrePrepare, .. })
        ));
    }

    #[test]
    fn test_pre_prepare_digest_mismatch() {
        let mut backup = processor(1);
        let mut message = pre_prepare("hello", 0);
        message.digest = Digest::of(&"other").unwrap();
        assert!(matches!(
            backup.process(&signed(Message::PrePrepare(message), 0)),
            Err(Error::DigestMismatch { .. })
        ));
        assert!(backup.request(&Digest::of(&"hello").unwrap()).is_none());
    }

    #[test]
    fn test_pre_prepare_wrong_view() {
        let mut backup = processor(1);
        let mut message = pre_prepare("hello", 0);
        message.view = 4;
        assert!(matches!(
            backup.process(&signed(Message::PrePrepare(message), 0)),
            Err(Error::WrongView { view: 4, current: 0 })
        ));
    }

    #[test]
    fn test_conflicting_pre_prepare_for_slot() {
        let mut backup = processor(1);
        backup
            .process(&signed(Message::PrePrepare(pre_prepare("hello", 0)), 0))
            .unwrap();
        assert!(matches!(
            backup.process(&signed(Message::PrePrepare(pre_prepare("evil", 0)), 0)),
            Err(Error::ConflictingPrePrepare { sequence: 0, .. })
        ));
        // same digest re-proposed at another sequence
        assert!(matches!(
            backup.process(&signed(Message::PrePrepare(pre_prepare("hello", 1)), 0)),
            Err(Error::SlotMismatch { .. })
        ));
    }

    #[test]
    fn test_prepare_for_unknown_digest_is_dropped() {
        let mut backup = processor(1);
        backup
            .process(&signed(Message::PrePrepare(pre_prepare("hello", 0)), 0))
            .unwrap();

        let tampered = vote("tampered", 0, 2);
        assert!(matches!(
            backup.process(&signed(Message::Prepare(tampered.clone()), 2)),
            Err(Error::UnknownDigest(_))
        ));
        assert_eq!(
            backup.log_reader().count_votes(Phase::Prepared, &tampered.digest),
            0
        );
    }

    #[test]
    fn test_vote_checks() {
        let mut backup = processor(1);
        backup
            .process(&signed(Message::PrePrepare(pre_prepare("hello", 0)), 0))
            .unwrap();

        // voter id does not match signer
        assert!(matches!(
            backup.process(&signed(Message::Prepare(vote("hello", 0, 2)), 3)),
            Err(Error::InvalidSignature { .. })
        ));
        assert!(matches!(
            backup.process(&signed(Message::Prepare(vote("hello", 5, 2)), 2)),
            Err(Error::SlotMismatch { .. })
        ));
        assert!(matches!(
            backup.process(&signed(Message::Commit(vote("hello", 0, 9)), 2)),
            Err(Error::UnknownSender(_))
        ));
        let digest = Digest::of(&"hello").unwrap();
        assert_eq!(backup.log_reader().count_votes(Phase::Prepared, &digest), 2);
    }

    #[test]
    fn test_prepare_quorum_emits_single_commit() {
        let mut backup = processor(1);
        backup
            .process(&signed(Message::PrePrepare(pre_prepare("hello", 0)), 0))
            .unwrap();

        let outbound = backup
            .process(&signed(Message::Prepare(vote("hello", 0, 2)), 2))
            .unwrap();
        assert_eq!(outbound.len(), 1);
        assert_eq!(
            broadcast_message(&outbound[0]),
            Message::Commit(vote("hello", 0, 1))
        );

        // a late prepare past quorum does not re-send the commit
        assert!(backup
            .process(&signed(Message::Prepare(vote("hello", 0, 3)), 3))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_duplicate_commit_counts_once() {
        let mut backup = processor(1);
        backup
            .process(&signed(Message::PrePrepare(pre_prepare("hello", 0)), 0))
            .unwrap();
        let digest = Digest::of(&"hello").unwrap();
        let commit = signed(Message::Commit(vote("hello", 0, 2)), 2);

        backup.process(&commit).unwrap();
        assert_eq!(backup.log_reader().count_votes(Phase::Committed, &digest), 1);
        assert!(backup.process(&commit).unwrap().is_empty());
        assert_eq!(backup.log_reader().count_votes(Phase::Committed, &digest), 1);
    }

    #[test]
    fn test_commit_quorum_replies_once() {
        let mut backup = processor(1);
        backup
            .process(&signed(Message::PrePrepare(pre_prepare("hello", 0)), 0))
            .unwrap();
        backup
            .process(&signed(Message::Prepare(vote("hello", 0, 2)), 2))
            .unwrap();

        assert!(backup
            .process(&signed(Message::Commit(vote("hello", 0, 0)), 0))
            .unwrap()
            .is_empty());
        let outbound = backup
            .process(&signed(Message::Commit(vote("hello", 0, 2)), 2))
            .unwrap();
        assert_eq!(outbound.len(), 1);
        let Outbound::Reply { client_id, frame } = &outbound[0] else {
            panic!("expected reply");
        };
        assert_eq!(*client_id, CLIENT);
        let Message::Reply(ReplyMessage { replica_id, timestamp, digest, result, .. }) =
            codec::split(frame).unwrap().message().unwrap()
        else {
            panic!("expected reply message");
        };
        assert_eq!(replica_id, 1);
        assert_eq!(timestamp, 42);
        assert!(result.contains(&digest.to_hex()));

        assert!(backup
            .process(&signed(Message::Commit(vote("hello", 0, 3)), 3))
            .unwrap()
            .is_empty());
        assert!(backup.log_reader().has_voted(Phase::Replied, &digest, 1));
    }

    #[test]
    fn test_reply_frames_are_not_accepted() {
        let mut backup = processor(1);
        let reply = ReplyMessage {
            view: 0,
            timestamp: 0,
            client_id: CLIENT,
            replica_id: 2,
            digest: Digest::of(&"hello").unwrap(),
            result: String::new(),
        };
        let frame = codec::seal(&Message::Reply(reply), None).unwrap();
        assert!(matches!(
            backup.process(&frame),
            Err(Error::UnexpectedKind(Kind::Reply))
        ));
        assert!(matches!(backup.process(b"garbage"), Err(Error::Truncated { .. })));
    }

    #[test]
    fn test_signing_without_key_is_fatal() {
        let mut primary = ConsensusProcessor::new(
            0,
            None,
            peers(4),
            0,
            Arc::new(ManualClock::new(0)),
            EchoExecutor,
        )
        .unwrap();
        let err = primary.process(&request_frame("hello")).unwrap_err();
        assert!(err.is_fatal());
        assert!(primary.pool.is_empty());
        assert!(primary.log_reader().snapshot().entries.is_empty());
    }

    #[test]
    fn test_single_replica_commits_alone() {
        let mut solo = ConsensusProcessor::new(
            0,
            Some(replica_key(0)),
            peers(1),
            0,
            Arc::new(ManualClock::new(0)),
            EchoExecutor,
        )
        .unwrap();
        let outbound = solo.process(&request_frame("hello")).unwrap();
        // pre-prepare, commit and reply in one step
        assert_eq!(outbound.len(), 3);
        assert!(matches!(outbound[2], Outbound::Reply { client_id: CLIENT, .. }));
    }

    #[test]
    fn test_rejects_replica_outside_roster() {
        assert!(matches!(
            ConsensusProcessor::new(
                7,
                Some(replica_key(7)),
                peers(4),
                0,
                Arc::new(ManualClock::new(0)),
                EchoExecutor,
            ),
            Err(Error::Config(_))
        ));
    }
}
