//! Wires the query executor's write path to cluster routing and this node's
//! Raft replica group: local writes land in storage directly (the owning
//! shard is a single writer) and bump the replica group's log forward;
//! remote writes are forwarded as a cluster `Data` frame.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{error, warn};
use prost::bytes::BufMut;

use raft::{Config as RaftConfig, ConsensusModule};
use raft::persistence::FilePersistence;
use storage::DatabaseContext;

use crate::cluster::{ClusterMessage, Route, Router};
use crate::query::{QueryError, WriteSink};

/// Owns the local shard's storage context, its Raft replica (driven on a
/// background thread), and the cluster router used to forward writes that
/// belong to other shards.
pub struct ReplicaContext {
    db: Arc<Mutex<DatabaseContext>>,
    router: Mutex<Router>,
    consensus: Arc<Mutex<ConsensusModule<FilePersistence>>>,
    write_seq: AtomicI32,
}

impl ReplicaContext {
    pub fn new(
        db: Arc<Mutex<DatabaseContext>>,
        router: Router,
        consensus: ConsensusModule<FilePersistence>,
    ) -> Arc<Self> {
        let ctx = Arc::new(ReplicaContext {
            db,
            router: Mutex::new(router),
            consensus: Arc::new(Mutex::new(consensus)),
            write_seq: AtomicI32::new(0),
        });
        ctx.spawn_raft_thread();
        ctx
    }

    fn spawn_raft_thread(self: &Arc<Self>) {
        let consensus = Arc::clone(&self.consensus);
        thread::spawn(move || loop {
            {
                let mut consensus = consensus.lock().unwrap();
                consensus.tick();
                for entry in consensus.take_committed() {
                    log::debug!("raft committed write-sequence entry {:?}", entry);
                }
            }
            thread::sleep(Duration::from_millis(10));
        });
    }

    pub fn db(&self) -> &Arc<Mutex<DatabaseContext>> {
        &self.db
    }

    /// Applies an incoming cluster `Data` frame to local storage — this node
    /// is the owning shard for the key it carries.
    pub fn apply_remote(&self, ts_name: &str, timestamp_ns: u64, value: f64) -> Result<(), QueryError> {
        let mut db = self.db.lock().unwrap();
        db.active_mut()?.series_mut(ts_name)?.insert(timestamp_ns, value)?;
        Ok(())
    }
}

impl WriteSink for Arc<ReplicaContext> {
    fn submit_insert(&self, ts_name: &str, timestamp_ns: u64, value: f64) -> Result<(), QueryError> {
        let route = self.router.lock().unwrap().route(ts_name.as_bytes());
        match route {
            Route::Local => {
                {
                    let mut db = self.db.lock().unwrap();
                    db.active_mut()?.series_mut(ts_name)?.insert(timestamp_ns, value)?;
                }
                let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
                if let Err(err) = self.consensus.lock().unwrap().submit(seq) {
                    warn!("raft submit failed for write-sequence {}: {}", seq, err);
                }
                Ok(())
            }
            Route::Remote(shard_id) => {
                let payload = encode_insert_payload(timestamp_ns, value);
                self.router
                    .lock()
                    .unwrap()
                    .forward(shard_id, ts_name.as_bytes().to_vec(), payload)
                    .map_err(|err| {
                        error!("failed to forward insert for '{}' to shard {}: {}", ts_name, shard_id, err);
                        QueryError::UnexpectedToken(format!("routing failure: {}", err))
                    })
            }
        }
    }
}

fn encode_insert_payload(timestamp_ns: u64, value: f64) -> Vec<u8> {
    let mut out = Vec::with_capacity(16);
    out.put_u64(timestamp_ns);
    out.put_f64(value);
    out
}

/// Decodes a payload built by [`encode_insert_payload`].
pub fn decode_insert_payload(payload: &[u8]) -> Option<(u64, f64)> {
    if payload.len() != 16 {
        return None;
    }
    let timestamp_ns = u64::from_be_bytes(payload[0..8].try_into().ok()?);
    let value = f64::from_be_bytes(payload[8..16].try_into().ok()?);
    Some((timestamp_ns, value))
}

/// Handles an inbound [`ClusterMessage`] received over this node's TCP
/// listener from a peer shard.
pub fn handle_cluster_message(ctx: &ReplicaContext, ts_name: &str, message: ClusterMessage) {
    match message {
        ClusterMessage::Join => {}
        ClusterMessage::Data { payload, .. } => match decode_insert_payload(&payload) {
            Some((timestamp_ns, value)) => {
                if let Err(err) = ctx.apply_remote(ts_name, timestamp_ns, value) {
                    error!("failed to apply forwarded insert for '{}': {}", ts_name, err);
                }
            }
            None => error!("malformed cluster data payload for '{}'", ts_name),
        },
    }
}

pub fn new_consensus(
    node_id: i32,
    host: std::net::SocketAddrV4,
    peers: &[(i32, std::net::SocketAddrV4)],
    persistence_path: &std::path::Path,
    heartbeat_interval: Duration,
) -> raft::Result<ConsensusModule<FilePersistence>> {
    let persistence = FilePersistence::new(persistence_path);
    let config = RaftConfig { heartbeat_interval };
    ConsensusModule::new(node_id, host, peers, persistence, config)
}
