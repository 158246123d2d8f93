use std::net::SocketAddrV4;
use std::time::Instant;

/// A known Raft peer: its address, when it was last heard from, and the log
/// length it was known to have at the last successful AppendEntries — used
/// to size the next broadcast to it.
#[derive(Debug, Clone)]
pub struct Peer {
    pub node_id: i32,
    pub addr: SocketAddrV4,
    pub last_active: Option<Instant>,
    pub saved_log_length: usize,
}

impl Peer {
    pub fn new(node_id: i32, addr: SocketAddrV4) -> Self {
        Peer {
            node_id,
            addr,
            last_active: None,
            saved_log_length: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Some(Instant::now());
    }

    /// A peer is online if it has been heard from within `deadline`.
    pub fn is_active(&self, deadline: std::time::Duration) -> bool {
        match self.last_active {
            Some(t) => t.elapsed() <= deadline,
            None => false,
        }
    }
}
