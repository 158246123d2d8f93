use std::net::SocketAddrV4;

use super::hash::hash_key;

const DEFAULT_VNODES_PER_SHARD: usize = 10;

#[derive(Debug, Clone, Copy)]
struct VNode {
    hash: u32,
    shard_id: usize,
}

/// A consistent-hash ring of shard leaders. Construction is deterministic in
/// the resulting lookup table regardless of the order `shards` is given in.
#[derive(Debug, Clone)]
pub struct Ring {
    shards: Vec<SocketAddrV4>,
    vnodes: Vec<VNode>,
}

impl Ring {
    pub fn with_defaults(shards: Vec<SocketAddrV4>) -> Self {
        Self::new(shards, DEFAULT_VNODES_PER_SHARD)
    }

    /// `vnodes_per_shard` is a construction parameter rather than a hard-coded
    /// constant, per the redesign note that the original's v-node count was
    /// fixed at compile time.
    pub fn new(shards: Vec<SocketAddrV4>, vnodes_per_shard: usize) -> Self {
        let mut vnodes = Vec::with_capacity(shards.len() * vnodes_per_shard);
        for (shard_id, addr) in shards.iter().enumerate() {
            for v in 0..vnodes_per_shard {
                let key = format!("{}-v{}", addr, v);
                vnodes.push(VNode { hash: hash_key(key.as_bytes()), shard_id });
            }
        }
        vnodes.sort_by_key(|v| v.hash);
        Ring { shards, vnodes }
    }

    /// Returns the shard address owning `key`.
    ///
    /// `vnodes` is always non-empty for a non-empty shard list, so this never
    /// returns `None` unless the ring has no shards at all.
    pub fn lookup(&self, key: &[u8]) -> Option<SocketAddrV4> {
        if self.vnodes.is_empty() {
            return None;
        }
        let target = hash_key(key);
        let vnode = self
            .vnodes
            .iter()
            .find(|v| v.hash >= target)
            .unwrap_or(&self.vnodes[0]);
        self.shards.get(vnode.shard_id).copied()
    }

    pub fn shard_id_for(&self, key: &[u8]) -> Option<usize> {
        if self.vnodes.is_empty() {
            return None;
        }
        let target = hash_key(key);
        let vnode = self
            .vnodes
            .iter()
            .find(|v| v.hash >= target)
            .unwrap_or(&self.vnodes[0]);
        Some(vnode.shard_id)
    }

    pub fn shards(&self) -> &[SocketAddrV4] {
        &self.shards
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shards() -> Vec<SocketAddrV4> {
        vec![
            "127.0.0.1:8777".parse().unwrap(),
            "127.0.0.1:8877".parse().unwrap(),
            "127.0.0.1:8977".parse().unwrap(),
        ]
    }

    #[test]
    fn lookup_is_deterministic() {
        let ring = Ring::with_defaults(shards());
        let first = ring.lookup(b"any-fixed-key");
        let second = ring.lookup(b"any-fixed-key");
        assert_eq!(first, second);
    }

    #[test]
    fn lookup_is_stable_under_peer_reordering() {
        let mut reordered = shards();
        reordered.reverse();

        let a = Ring::with_defaults(shards());
        let b = Ring::with_defaults(reordered);

        for key in ["cpu.load", "mem.free", "disk.io"] {
            assert_eq!(a.lookup(key.as_bytes()), b.lookup(key.as_bytes()));
        }
    }

    #[test]
    fn every_shard_gets_ten_vnodes_by_default() {
        let ring = Ring::with_defaults(shards());
        assert_eq!(ring.vnodes.len(), 30);
    }
}
