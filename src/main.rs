use std::sync::Arc;

use pbft_engine::{
    common::{clock::SystemClock, config::Config},
    consensus::client::Client,
    network::{LocalNetwork, Node},
    Error, Result,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const NUM_REPLICA: usize = 4;
const CLIENT_ID: u32 = 100;

/*
    Runs a replica cluster in one process over in-memory queues and submits
    each remaining command line argument (or "hello") as a request.

        pbft-engine [--config <path>] [message ...]

    Without a config file four replicas and one client get fresh keys. With
    one, the first configured client submits and replicas without a
    secret_key run unable to sign.
*/

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config = if args.first().map(String::as_str) == Some("--config") {
        let path = args
            .get(1)
            .cloned()
            .ok_or_else(|| Error::Config("--config needs a path".to_string()))?;
        args.drain(..2);
        info!(%path, "loading config");
        Config::from_file(path)?
    } else {
        Config::generate_local(NUM_REPLICA, CLIENT_ID)
    };

    let peers = config.roster()?;
    let client_id = config
        .clients
        .first()
        .map(|entry| entry.id)
        .ok_or_else(|| Error::Config("no client configured".to_string()))?;
    info!(replicas = peers.len(), faulty = peers.num_faulty(), quorum = peers.quorum(), "starting cluster");

    let clock = Arc::new(SystemClock);
    let mut network = LocalNetwork::new(peers.len());
    let mut replies = network.register_client(client_id);
    let mut nodes = Vec::with_capacity(peers.len());
    for peer in &peers.members {
        let inbound = network
            .take_inbound(peer.id)
            .ok_or_else(|| Error::Config(format!("no inbound queue for replica {}", peer.id)))?;
        let node = Node::new(peer.id, config.replica_keypair(peer.id)?, peers.clone(), config.view);
        nodes.push(node.spawn(inbound, network.transport(peer.id), clock.clone())?);
    }

    let mut client = Client::new(client_id, config.client_keypair(client_id)?, peers.len(), clock);
    if args.is_empty() {
        args.push("hello".to_string());
    }
    let senders = network.replica_senders();
    for message in &args {
        let result = client.invoke("echo", message, &senders, &mut replies).await?;
        info!(%message, %result, "request committed");
    }

    for node in nodes {
        node.task.abort();
    }
    Ok(())
}
