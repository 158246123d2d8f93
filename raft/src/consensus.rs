//! Drives a [`RaftState`] over a UDP socket: owns the peer table, the
//! election/heartbeat timers, and a pluggable persistence backend. The
//! caller is expected to run [`ConsensusModule::tick`] in a loop on its own
//! thread — mirroring the non-blocking, poll-and-sleep accept loop the rest
//! of this workspace's TCP server uses.

use std::net::{SocketAddrV4, UdpSocket};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::Rng;

use crate::error::{RaftError, Result};
use crate::message::{
    AddPeerRpc, AppendEntriesRpc, ClusterJoinRpc, ForwardValueRpc, LogEntry, PeerAddr, RaftMessage,
    RequestVoteRpc,
};
use crate::peer::Peer;
use crate::persistence::Persistence;
use crate::state::{RaftState, Role};

/// Lower/upper bound for the randomized election timeout.
pub const ELECTION_TIMEOUT_MIN_MS: u64 = 150;
pub const ELECTION_TIMEOUT_MAX_MS: u64 = 300;

/// Default leader heartbeat interval; overridable via [`Config::heartbeat_interval`].
pub const DEFAULT_HEARTBEAT_MS: u64 = 1000;

/// Peers are marked inactive after this long without a message.
pub const NODE_ACTIVE_DEADLINE: Duration = Duration::from_secs(10);

pub struct Config {
    pub heartbeat_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            heartbeat_interval: Duration::from_millis(DEFAULT_HEARTBEAT_MS),
        }
    }
}

pub struct ConsensusModule<P: Persistence> {
    node_id: i32,
    socket: UdpSocket,
    local_addr: SocketAddrV4,
    state: RaftState,
    peers: Vec<Peer>,
    persistence: P,
    config: Config,
    election_deadline: Instant,
    heartbeat_deadline: Instant,
}

fn election_timeout() -> Duration {
    let millis = rand::thread_rng().gen_range(ELECTION_TIMEOUT_MIN_MS..=ELECTION_TIMEOUT_MAX_MS);
    Duration::from_millis(millis)
}

impl<P: Persistence> ConsensusModule<P> {
    pub fn new(
        node_id: i32,
        bind_addr: SocketAddrV4,
        peer_addrs: &[(i32, SocketAddrV4)],
        mut persistence: P,
        config: Config,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr).map_err(RaftError::Io)?;
        socket.set_nonblocking(true).map_err(RaftError::Io)?;

        let hard_state = persistence.load().map_err(RaftError::Persistence)?;
        let mut state = RaftState::restore(node_id, hard_state);
        // A node with an empty peer table and no recovered term has never
        // joined a cluster; it waits in `Dead` until told to join.
        state.role = if peer_addrs.is_empty() && state.current_term == 0 {
            Role::Dead
        } else {
            Role::Follower
        };

        let peers = peer_addrs
            .iter()
            .map(|(id, addr)| Peer::new(*id, *addr))
            .collect();

        let now = Instant::now();
        Ok(ConsensusModule {
            node_id,
            socket,
            local_addr: bind_addr,
            state,
            peers,
            persistence,
            heartbeat_deadline: now + config.heartbeat_interval,
            election_deadline: now + election_timeout(),
            config,
        })
    }

    pub fn node_id(&self) -> i32 {
        self.node_id
    }

    pub fn is_leader(&self) -> bool {
        self.state.is_leader()
    }

    pub fn current_term(&self) -> i32 {
        self.state.current_term
    }

    fn log_prefix(&self) -> String {
        format!("[raft node={} term={}]", self.node_id, self.state.current_term)
    }

    fn persist(&mut self) {
        if let Err(err) = self.persistence.save(&self.state.hard_state()) {
            warn!("{} failed to persist state: {}", self.log_prefix(), err);
        }
    }

    fn peer_index(&self, addr: &SocketAddrV4) -> Option<usize> {
        self.peers.iter().position(|p| &p.addr == addr)
    }

    fn peer_addr_for(&self, node_id: i32) -> Option<SocketAddrV4> {
        self.peers.iter().find(|p| p.node_id == node_id).map(|p| p.addr)
    }

    fn online_peer_count(&self) -> usize {
        self.peers
            .iter()
            .filter(|p| p.is_active(NODE_ACTIVE_DEADLINE))
            .count()
    }

    fn send(&self, addr: SocketAddrV4, message: &RaftMessage) {
        if let Err(err) = self.socket.send_to(&message.encode(), addr) {
            warn!("{} send to {} failed: {}", self.log_prefix(), addr, err);
        }
    }

    /// Registers (or refreshes) a peer seen on the wire.
    fn note_peer(&mut self, node_id: i32, addr: SocketAddrV4) {
        match self.peers.iter_mut().find(|p| p.node_id == node_id) {
            Some(peer) => peer.touch(),
            None => {
                let mut peer = Peer::new(node_id, addr);
                peer.touch();
                self.peers.push(peer);
            }
        }
    }

    /// Runs one iteration: drains at most one datagram, then checks timers.
    /// Intended to be called in a tight loop with a short sleep between
    /// calls, like the rest of this workspace's accept loops.
    pub fn tick(&mut self) {
        let mut buf = [0u8; 2048];
        match self.socket.recv_from(&mut buf) {
            Ok((n, src)) => {
                if let std::net::SocketAddr::V4(src_v4) = src {
                    match RaftMessage::decode(&buf[..n]) {
                        Ok(message) => self.handle_message(src_v4, message),
                        Err(err) => debug!("{} decode error from {}: {}", self.log_prefix(), src_v4, err),
                    }
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(err) => warn!("{} recv error: {}", self.log_prefix(), err),
        }

        let now = Instant::now();
        if self.state.is_leader() {
            if now >= self.heartbeat_deadline {
                self.broadcast_heartbeat();
                self.heartbeat_deadline = now + self.config.heartbeat_interval;
            }
        } else if self.state.role != Role::Dead && now >= self.election_deadline {
            self.start_election();
        }
    }

    fn reset_election_deadline(&mut self) {
        self.election_deadline = Instant::now() + election_timeout();
    }

    fn handle_message(&mut self, src: SocketAddrV4, message: RaftMessage) {
        match message {
            RaftMessage::ClusterJoin(join) => self.handle_cluster_join(src, join),
            RaftMessage::AddPeer(add) => self.handle_add_peer(add),
            RaftMessage::ForwardValue(fwd) => {
                let _ = self.submit(fwd.value);
            }
            RaftMessage::RequestVoteRequest(rv) => self.handle_request_vote(src, rv),
            RaftMessage::RequestVoteReply(rv) => self.handle_request_vote_reply(src, rv),
            RaftMessage::AppendEntriesRequest(ae) => self.handle_append_entries(src, ae),
            RaftMessage::AppendEntriesReply(ae) => self.handle_append_entries_reply(src, ae),
        }
    }

    fn handle_cluster_join(&mut self, src: SocketAddrV4, join: ClusterJoinRpc) {
        if self.state.role == Role::Dead {
            self.state.role = Role::Follower;
            self.reset_election_deadline();
        }
        if !self.state.is_leader() {
            if let Some(leader_id) = self.state.current_leader_id {
                if let Some(leader_addr) = self.peer_addr_for(leader_id) {
                    self.send(leader_addr, &RaftMessage::ClusterJoin(join));
                    return;
                }
            }
            return;
        }

        info!("{} registering new peer {}", self.log_prefix(), join.node_id);
        self.note_peer(join.node_id, src);
        let announce = RaftMessage::AddPeer(AddPeerRpc {
            node_id: join.node_id,
            addr: PeerAddr {
                ip: *src.ip(),
                port: src.port(),
            },
        });
        let targets: Vec<SocketAddrV4> = self
            .peers
            .iter()
            .filter(|p| p.node_id != join.node_id)
            .map(|p| p.addr)
            .collect();
        for addr in targets {
            self.send(addr, &announce);
        }
    }

    fn handle_add_peer(&mut self, add: AddPeerRpc) {
        let addr = SocketAddrV4::new(add.addr.ip, add.addr.port);
        self.note_peer(add.node_id, addr);
    }

    fn handle_request_vote(&mut self, src: SocketAddrV4, rv: RequestVoteRpc) {
        let reply = self.state.handle_request_vote(&rv);
        self.persist();
        self.reset_election_deadline();
        self.send(src, &RaftMessage::RequestVoteReply(reply));
    }

    fn handle_request_vote_reply(&mut self, src: SocketAddrV4, rv: crate::message::RequestVoteReply) {
        let peer_count = self.peers.len();
        if let Some(idx) = self.peer_index(&src) {
            self.peers[idx].touch();
        }
        let became_leader = self.state.handle_request_vote_reply(&rv, peer_count);
        self.persist();
        if became_leader {
            info!("{} elected leader", self.log_prefix());
            self.broadcast_heartbeat();
            self.heartbeat_deadline = Instant::now() + self.config.heartbeat_interval;
        }
    }

    fn handle_append_entries(&mut self, src: SocketAddrV4, ae: AppendEntriesRpc) {
        self.reset_election_deadline();
        let reply = self.state.handle_append_entries(&ae);
        self.persist();
        self.send(src, &RaftMessage::AppendEntriesReply(reply));
    }

    fn handle_append_entries_reply(&mut self, src: SocketAddrV4, ae: crate::message::AppendEntriesReply) {
        let peer_index = match self.peer_index(&src) {
            Some(idx) => idx,
            None => {
                debug!("{} append-entries reply from unknown peer {}", self.log_prefix(), src);
                return;
            }
        };
        self.peers[peer_index].touch();
        let sent_log_length = self.peers[peer_index].saved_log_length as i32;
        self.state
            .handle_append_entries_reply(peer_index, &ae, sent_log_length);
        self.persist();
    }

    fn start_election(&mut self) {
        info!("{} election timeout, starting election", self.log_prefix());
        self.state.role = Role::Candidate;
        let rv = self.state.become_candidate();
        self.persist();
        self.reset_election_deadline();
        let targets: Vec<SocketAddrV4> = self.peers.iter().map(|p| p.addr).collect();
        for addr in targets {
            self.send(addr, &RaftMessage::RequestVoteRequest(rv.clone()));
        }
    }

    fn broadcast_heartbeat(&mut self) {
        debug!("{} broadcasting heartbeat", self.log_prefix());
        let commit_index = self.state.commit_index;
        let current_term = self.state.current_term;
        let log = self.state.log.clone();

        for i in 0..self.peers.len() {
            let next_index = self
                .state
                .leader_volatile
                .as_ref()
                .map(|lv| lv.next_index[i])
                .unwrap_or(0)
                .max(0) as usize;
            let prev_log_index = next_index as i32 - 1;
            let prev_log_term = if prev_log_index >= 0 {
                log.get(prev_log_index as usize).map(|e| e.term).unwrap_or(-1)
            } else {
                -1
            };
            let entries: Vec<LogEntry> = log[next_index.min(log.len())..].to_vec();
            self.peers[i].saved_log_length = next_index + entries.len();

            let message = RaftMessage::AppendEntriesRequest(AppendEntriesRpc {
                term: current_term,
                leader_id: self.node_id,
                prev_log_term,
                prev_log_index,
                leader_commit: commit_index,
                entries,
            });
            let addr = self.peers[i].addr;
            self.send(addr, &message);
        }
    }

    /// Submits a value for replication. If this node is not the leader, the
    /// value is forwarded to the last known leader instead.
    pub fn submit(&mut self, value: i32) -> Result<()> {
        if self.state.is_leader() {
            self.state.submit(value);
            self.persist();
            return Ok(());
        }
        match self.state.current_leader_id.and_then(|id| self.peer_addr_for(id)) {
            Some(leader_addr) => {
                self.send(leader_addr, &RaftMessage::ForwardValue(ForwardValueRpc { value }));
                Ok(())
            }
            None => Err(RaftError::Codec("no known leader to forward value to".into())),
        }
    }

    /// Sends `cluster_join_rpc` to a seed peer. Call repeatedly (e.g. every
    /// heartbeat interval) from `Dead` until a reply establishes membership.
    pub fn join_cluster(&mut self, seed: SocketAddrV4) {
        self.send(
            seed,
            &RaftMessage::ClusterJoin(ClusterJoinRpc {
                node_id: self.node_id,
                addr: PeerAddr {
                    ip: *self.local_addr.ip(),
                    port: self.local_addr.port(),
                },
            }),
        );
    }

    pub fn take_committed(&mut self) -> Vec<LogEntry> {
        self.state.take_committed()
    }

    pub fn online_peers(&self) -> usize {
        self.online_peer_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPersistence;

    fn addr(port: u16) -> SocketAddrV4 {
        SocketAddrV4::new(std::net::Ipv4Addr::new(127, 0, 0, 1), port)
    }

    #[test]
    fn starts_as_follower_with_known_peers() {
        let cm = ConsensusModule::new(
            0,
            addr(17800),
            &[(1, addr(17801)), (2, addr(17802))],
            MemoryPersistence::default(),
            Config::default(),
        )
        .unwrap();
        assert!(!cm.is_leader());
    }

    #[test]
    fn starts_dead_with_no_peers_and_no_recovered_term() {
        let cm = ConsensusModule::new(0, addr(17803), &[], MemoryPersistence::default(), Config::default())
            .unwrap();
        assert_eq!(cm.state.role, Role::Dead);
    }
}
