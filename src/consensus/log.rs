use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard},
};

use serde::Serialize;

use super::message::ReplicaId;
use crate::common::crypto::Digest;

/*
    A replica's message log is the set of votes it has accepted, indexed by
    request digest and phase. Entries only ever grow: a replica that has
    voted in a phase for a digest stays recorded, and recording the same
    vote again changes nothing. Quorum checks are plain set sizes over
    distinct replica ids.
*/

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize)]
pub enum Phase {
    PrePrepared,
    Prepared,
    Committed,
    Replied,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::PrePrepared,
        Phase::Prepared,
        Phase::Committed,
        Phase::Replied,
    ];
}

#[derive(Debug, Default)]
struct LogState {
    votes: HashMap<Digest, HashMap<Phase, BTreeSet<ReplicaId>>>,
}

impl LogState {
    fn voters(&self, phase: Phase, digest: &Digest) -> Option<&BTreeSet<ReplicaId>> {
        self.votes.get(digest).and_then(|phases| phases.get(&phase))
    }

    fn count_votes(&self, phase: Phase, digest: &Digest) -> usize {
        self.voters(phase, digest).map_or(0, BTreeSet::len)
    }

    fn has_voted(&self, phase: Phase, digest: &Digest, replica: ReplicaId) -> bool {
        self.voters(phase, digest)
            .is_some_and(|voters| voters.contains(&replica))
    }
}

/// Write side of the vote log. Owned by the replica's processing path; not
/// `Clone`, so there is exactly one writer.
#[derive(Debug, Default)]
pub struct ConsensusLog {
    state: Arc<RwLock<LogState>>,
}

/// Read-only view of a [`ConsensusLog`] for status reporters.
#[derive(Debug, Clone)]
pub struct LogReader {
    state: Arc<RwLock<LogState>>,
}

/// Vote counts per digest and phase at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogSnapshot {
    pub entries: BTreeMap<Digest, BTreeMap<Phase, usize>>,
}

fn read(state: &RwLock<LogState>) -> RwLockReadGuard<'_, LogState> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

impl ConsensusLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the vote was already recorded.
    pub fn record_vote(&mut self, phase: Phase, digest: Digest, replica: ReplicaId) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state
            .votes
            .entry(digest)
            .or_default()
            .entry(phase)
            .or_default()
            .insert(replica)
    }

    pub fn count_votes(&self, phase: Phase, digest: &Digest) -> usize {
        read(&self.state).count_votes(phase, digest)
    }

    pub fn has_voted(&self, phase: Phase, digest: &Digest, replica: ReplicaId) -> bool {
        read(&self.state).has_voted(phase, digest, replica)
    }

    pub fn reader(&self) -> LogReader {
        LogReader {
            state: self.state.clone(),
        }
    }
}

impl LogReader {
    pub fn count_votes(&self, phase: Phase, digest: &Digest) -> usize {
        read(&self.state).count_votes(phase, digest)
    }

    pub fn has_voted(&self, phase: Phase, digest: &Digest, replica: ReplicaId) -> bool {
        read(&self.state).has_voted(phase, digest, replica)
    }

    /// Furthest phase `replica` has voted in for `digest`.
    pub fn phase_of(&self, digest: &Digest, replica: ReplicaId) -> Option<Phase> {
        let state = read(&self.state);
        Phase::ALL
            .into_iter()
            .rev()
            .find(|phase| state.has_voted(*phase, digest, replica))
    }

    pub fn snapshot(&self) -> LogSnapshot {
        let state = read(&self.state);
        let entries = state
            .votes
            .iter()
            .map(|(digest, phases)| {
                let counts = phases
                    .iter()
                    .map(|(phase, voters)| (*phase, voters.len()))
                    .collect();
                (*digest, counts)
            })
            .collect();
        LogSnapshot { entries }
    }
}
