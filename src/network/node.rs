use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::{
    common::{
        clock::Clock,
        crypto::Keypair,
        error::Result,
    },
    consensus::{
        executor::{EchoExecutor, Executor},
        log::LogReader,
        message::{ReplicaId, ViewId},
        peers::Peers,
        processor::ConsensusProcessor,
    },
};
use super::{Inbound, Transport};

/// Everything a replica needs before it can start processing.
pub struct Node {
    pub id: ReplicaId,
    pub keypair: Option<Keypair>,
    pub peers: Peers,
    pub view: ViewId,
}

/// A running replica. Dropping the handle does not stop the task; close
/// the inbound queue instead.
#[derive(Debug)]
pub struct NodeHandle {
    pub id: ReplicaId,
    pub log: LogReader,
    pub task: JoinHandle<Result<()>>,
}

impl Node {
    pub fn new(id: ReplicaId, keypair: Option<Keypair>, peers: Peers, view: ViewId) -> Self {
        Node {
            id,
            keypair,
            peers,
            view,
        }
    }

    pub fn spawn<T: Transport>(
        self,
        inbound: Inbound,
        transport: T,
        clock: Arc<dyn Clock>,
    ) -> Result<NodeHandle> {
        self.spawn_with(inbound, transport, clock, EchoExecutor)
    }

    pub fn spawn_with<T: Transport, E: Executor>(
        self,
        inbound: Inbound,
        transport: T,
        clock: Arc<dyn Clock>,
        executor: E,
    ) -> Result<NodeHandle> {
        let mut processor =
            ConsensusProcessor::new(self.id, self.keypair, self.peers, self.view, clock, executor)?;
        let log = processor.log_reader();
        info!(replica = self.id, "spawning node");
        let task = tokio::spawn(async move { processor.run(inbound, transport).await });
        Ok(NodeHandle {
            id: self.id,
            log,
            task,
        })
    }
}
