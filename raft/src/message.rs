//! Wire format for Raft datagrams: `u8 type` followed by a type-specific,
//! length-free payload. Every multi-byte integer is big-endian; signed
//! 32-bit fields use two's complement, matching the rest of the cluster's
//! wire formats.

use std::net::Ipv4Addr;

use crate::error::{RaftError, Result};

/// A single log entry: a term and an opaque command value.
///
/// Commands are plain signed integers in this design — a real workload
/// would parameterize the value type, but the replication core does not
/// need to interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntry {
    pub term: i32,
    pub value: i32,
}

/// An `ip:port` pair as carried on the wire for peer announcements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr {
    pub ip: Ipv4Addr,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestVoteRpc {
    pub term: i32,
    pub candidate_id: i32,
    pub last_log_term: i32,
    pub last_log_index: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestVoteReply {
    pub term: i32,
    pub vote_granted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppendEntriesRpc {
    pub term: i32,
    pub leader_id: i32,
    pub prev_log_term: i32,
    pub prev_log_index: i32,
    pub leader_commit: i32,
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendEntriesReply {
    pub term: i32,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterJoinRpc {
    pub node_id: i32,
    pub addr: PeerAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddPeerRpc {
    pub node_id: i32,
    pub addr: PeerAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardValueRpc {
    pub value: i32,
}

/// A Raft UDP datagram: always exactly one message, no length prefix (the
/// caller trusts `recvfrom`'s datagram boundary).
#[derive(Debug, Clone, PartialEq)]
pub enum RaftMessage {
    ClusterJoin(ClusterJoinRpc),
    AddPeer(AddPeerRpc),
    ForwardValue(ForwardValueRpc),
    AppendEntriesRequest(AppendEntriesRpc),
    AppendEntriesReply(AppendEntriesReply),
    RequestVoteRequest(RequestVoteRpc),
    RequestVoteReply(RequestVoteReply),
}

const TAG_CLUSTER_JOIN: u8 = 0;
const TAG_ADD_PEER: u8 = 1;
const TAG_FORWARD_VALUE: u8 = 2;
const TAG_APPEND_ENTRIES_RQ: u8 = 3;
const TAG_APPEND_ENTRIES_RS: u8 = 4;
const TAG_REQUEST_VOTE_RQ: u8 = 5;
const TAG_REQUEST_VOTE_RS: u8 = 6;

fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_addr(out: &mut Vec<u8>, addr: &PeerAddr) {
    out.extend_from_slice(&addr.ip.octets());
    out.extend_from_slice(&addr.port.to_be_bytes());
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(RaftError::Codec(format!(
                "expected {} more bytes, found {}",
                n,
                self.buf.len() - self.pos
            )));
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn addr(&mut self) -> Result<PeerAddr> {
        let ip = self.take(4)?;
        let port = self.u16_be()?;
        Ok(PeerAddr {
            ip: Ipv4Addr::new(ip[0], ip[1], ip[2], ip[3]),
            port,
        })
    }

    fn u16_be(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }
}

impl RaftMessage {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        match self {
            RaftMessage::ClusterJoin(m) => {
                out.push(TAG_CLUSTER_JOIN);
                put_i32(&mut out, m.node_id);
                put_addr(&mut out, &m.addr);
            }
            RaftMessage::AddPeer(m) => {
                out.push(TAG_ADD_PEER);
                put_i32(&mut out, m.node_id);
                put_addr(&mut out, &m.addr);
            }
            RaftMessage::ForwardValue(m) => {
                out.push(TAG_FORWARD_VALUE);
                put_i32(&mut out, m.value);
            }
            RaftMessage::AppendEntriesRequest(m) => {
                out.push(TAG_APPEND_ENTRIES_RQ);
                put_i32(&mut out, m.term);
                put_i32(&mut out, m.leader_id);
                put_i32(&mut out, m.prev_log_term);
                put_i32(&mut out, m.prev_log_index);
                put_i32(&mut out, m.leader_commit);
                put_u32(&mut out, m.entries.len() as u32);
                for entry in &m.entries {
                    put_i32(&mut out, entry.term);
                    put_i32(&mut out, entry.value);
                }
            }
            RaftMessage::AppendEntriesReply(m) => {
                out.push(TAG_APPEND_ENTRIES_RS);
                put_i32(&mut out, m.term);
                out.push(m.success as u8);
            }
            RaftMessage::RequestVoteRequest(m) => {
                out.push(TAG_REQUEST_VOTE_RQ);
                put_i32(&mut out, m.term);
                put_i32(&mut out, m.candidate_id);
                put_i32(&mut out, m.last_log_term);
                put_i32(&mut out, m.last_log_index);
            }
            RaftMessage::RequestVoteReply(m) => {
                out.push(TAG_REQUEST_VOTE_RS);
                put_i32(&mut out, m.term);
                out.push(m.vote_granted as u8);
            }
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let tag = r.u8()?;
        let message = match tag {
            TAG_CLUSTER_JOIN => RaftMessage::ClusterJoin(ClusterJoinRpc {
                node_id: r.i32()?,
                addr: r.addr()?,
            }),
            TAG_ADD_PEER => RaftMessage::AddPeer(AddPeerRpc {
                node_id: r.i32()?,
                addr: r.addr()?,
            }),
            TAG_FORWARD_VALUE => RaftMessage::ForwardValue(ForwardValueRpc { value: r.i32()? }),
            TAG_APPEND_ENTRIES_RQ => {
                let term = r.i32()?;
                let leader_id = r.i32()?;
                let prev_log_term = r.i32()?;
                let prev_log_index = r.i32()?;
                let leader_commit = r.i32()?;
                let count = r.u32()? as usize;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    entries.push(LogEntry {
                        term: r.i32()?,
                        value: r.i32()?,
                    });
                }
                RaftMessage::AppendEntriesRequest(AppendEntriesRpc {
                    term,
                    leader_id,
                    prev_log_term,
                    prev_log_index,
                    leader_commit,
                    entries,
                })
            }
            TAG_APPEND_ENTRIES_RS => RaftMessage::AppendEntriesReply(AppendEntriesReply {
                term: r.i32()?,
                success: r.u8()? != 0,
            }),
            TAG_REQUEST_VOTE_RQ => RaftMessage::RequestVoteRequest(RequestVoteRpc {
                term: r.i32()?,
                candidate_id: r.i32()?,
                last_log_term: r.i32()?,
                last_log_index: r.i32()?,
            }),
            TAG_REQUEST_VOTE_RS => RaftMessage::RequestVoteReply(RequestVoteReply {
                term: r.i32()?,
                vote_granted: r.u8()? != 0,
            }),
            other => return Err(RaftError::Codec(format!("unknown message tag {}", other))),
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_entries_round_trips_with_entries() {
        let msg = RaftMessage::AppendEntriesRequest(AppendEntriesRpc {
            term: 3,
            leader_id: 1,
            prev_log_term: 2,
            prev_log_index: 4,
            leader_commit: 3,
            entries: vec![LogEntry { term: 3, value: 7 }, LogEntry { term: 3, value: 8 }],
        });
        let encoded = msg.encode();
        assert_eq!(RaftMessage::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn request_vote_round_trips() {
        let msg = RaftMessage::RequestVoteRequest(RequestVoteRpc {
            term: 5,
            candidate_id: 2,
            last_log_term: 4,
            last_log_index: 10,
        });
        assert_eq!(RaftMessage::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn cluster_join_round_trips() {
        let msg = RaftMessage::ClusterJoin(ClusterJoinRpc {
            node_id: 9,
            addr: PeerAddr {
                ip: Ipv4Addr::new(127, 0, 0, 1),
                port: 7000,
            },
        });
        assert_eq!(RaftMessage::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn truncated_buffer_is_a_codec_error() {
        assert!(RaftMessage::decode(&[TAG_REQUEST_VOTE_RQ, 0, 0]).is_err());
    }

    #[test]
    fn unknown_tag_is_a_codec_error() {
        assert!(RaftMessage::decode(&[99]).is_err());
    }
}
