use super::error::RoutingError;
use super::message::ClusterMessage;
use super::peer::ShardPeer;
use super::ring::Ring;

/// Where a key's write should be handled: applied through the local Raft
/// leader, or forwarded over TCP to the shard that owns it.
#[derive(Debug, PartialEq, Eq)]
pub enum Route {
    Local,
    Remote(usize),
}

/// Consistent-hash router: decides local-submit vs. forward-to-peer and owns
/// one lazily-connected TCP handle per remote shard.
pub struct Router {
    local_shard_id: usize,
    ring: Ring,
    peers: Vec<ShardPeer>,
}

impl Router {
    pub fn new(local_shard_id: usize, ring: Ring) -> Self {
        let peers = ring
            .shards()
            .iter()
            .enumerate()
            .map(|(shard_id, addr)| ShardPeer::new(shard_id, *addr))
            .collect();
        Router { local_shard_id, ring, peers }
    }

    /// Determines where a write for `key` should land. A lookup always
    /// succeeds against a non-empty ring.
    pub fn route(&self, key: &[u8]) -> Route {
        match self.ring.shard_id_for(key) {
            Some(shard_id) if shard_id == self.local_shard_id => Route::Local,
            Some(shard_id) => Route::Remote(shard_id),
            None => Route::Local,
        }
    }

    /// Sends a write for `key` to the owning remote shard. Panics if called
    /// for a key that routes locally — callers should branch on [`Router::route`]
    /// first.
    pub fn forward(&mut self, shard_id: usize, key: Vec<u8>, payload: Vec<u8>) -> Result<(), RoutingError> {
        let peer = self
            .peers
            .get_mut(shard_id)
            .expect("shard_id came from this router's own ring");
        peer.send(&ClusterMessage::Data { key, payload })
    }

    pub fn is_connected(&self, shard_id: usize) -> bool {
        self.peers.get(shard_id).map(ShardPeer::connected).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring() -> Ring {
        Ring::with_defaults(vec![
            "127.0.0.1:8777".parse().unwrap(),
            "127.0.0.1:8877".parse().unwrap(),
            "127.0.0.1:8977".parse().unwrap(),
        ])
    }

    #[test]
    fn routes_to_local_or_remote_consistently() {
        let router = Router::new(0, ring());
        match router.route(b"cpu.load") {
            Route::Local => assert_eq!(router.ring.shard_id_for(b"cpu.load"), Some(0)),
            Route::Remote(shard_id) => assert_ne!(shard_id, 0),
        }
    }

    #[test]
    fn unconnected_peers_report_not_connected() {
        let router = Router::new(0, ring());
        assert!(!router.is_connected(1));
    }
}
