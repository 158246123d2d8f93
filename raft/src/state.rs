//! The pure Raft state machine: term, vote, log, and the follower/candidate
//! /leader/dead transitions. No I/O happens in this module — [`consensus`](crate::consensus)
//! drives it with messages taken off the wire and persists the result.

use crate::message::{AppendEntriesReply, AppendEntriesRpc, LogEntry, RequestVoteReply, RequestVoteRpc};
use crate::persistence::HardState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Boot state before the node has made contact with any peer.
    Dead,
    Follower,
    Candidate,
    Leader,
}

/// Leader-only bookkeeping, reset on every transition to leader.
#[derive(Debug, Clone)]
pub struct LeaderVolatile {
    pub next_index: Vec<i32>,
    pub match_index: Vec<i32>,
}

pub struct RaftState {
    pub node_id: i32,
    pub role: Role,
    pub current_term: i32,
    pub voted_for: i32,
    pub log: Vec<LogEntry>,
    pub commit_index: i32,
    pub last_applied: i32,
    pub current_leader_id: Option<i32>,
    pub votes_received: usize,
    pub leader_volatile: Option<LeaderVolatile>,
}

impl RaftState {
    pub fn new(node_id: i32) -> Self {
        RaftState {
            node_id,
            role: Role::Dead,
            current_term: 0,
            voted_for: -1,
            log: Vec::new(),
            commit_index: -1,
            last_applied: -1,
            current_leader_id: None,
            votes_received: 0,
            leader_volatile: None,
        }
    }

    pub fn restore(node_id: i32, hard: HardState) -> Self {
        let mut state = RaftState::new(node_id);
        state.current_term = hard.current_term;
        state.voted_for = hard.voted_for;
        state.log = hard.log;
        state
    }

    pub fn hard_state(&self) -> HardState {
        HardState {
            current_term: self.current_term,
            voted_for: self.voted_for,
            log: self.log.clone(),
        }
    }

    pub fn last_log_index(&self) -> i32 {
        self.log.len() as i32 - 1
    }

    pub fn last_log_term(&self) -> i32 {
        self.log.last().map(|e| e.term).unwrap_or(0)
    }

    pub fn is_leader(&self) -> bool {
        self.role == Role::Leader
    }

    /// `any → follower` on seeing a higher term.
    pub fn step_down(&mut self, term: i32) {
        self.role = Role::Follower;
        self.current_term = term;
        self.voted_for = -1;
        self.leader_volatile = None;
    }

    pub fn become_candidate(&mut self) -> RequestVoteRpc {
        self.role = Role::Candidate;
        self.current_term += 1;
        self.voted_for = self.node_id;
        self.votes_received = 1;
        RequestVoteRpc {
            term: self.current_term,
            candidate_id: self.node_id,
            last_log_term: self.last_log_term(),
            last_log_index: self.last_log_index(),
        }
    }

    pub fn become_leader(&mut self, peer_count: usize) {
        self.role = Role::Leader;
        self.current_leader_id = Some(self.node_id);
        self.votes_received = 0;
        let log_len = self.log.len() as i32;
        self.leader_volatile = Some(LeaderVolatile {
            next_index: vec![log_len; peer_count],
            match_index: vec![-1; peer_count],
        });
    }

    /// Handles an incoming RequestVote RPC, returning the reply to send back.
    pub fn handle_request_vote(&mut self, rv: &RequestVoteRpc) -> RequestVoteReply {
        if rv.term > self.current_term {
            self.step_down(rv.term);
        }

        let log_ok = rv.last_log_term > self.last_log_term()
            || (rv.last_log_term == self.last_log_term() && rv.last_log_index >= self.last_log_index());

        let grant = rv.term == self.current_term
            && (self.voted_for == -1 || self.voted_for == rv.candidate_id)
            && log_ok;

        if grant {
            self.voted_for = rv.candidate_id;
        }

        RequestVoteReply {
            term: self.current_term,
            vote_granted: grant,
        }
    }

    /// Handles a RequestVote reply. Returns `true` if this call made the
    /// node transition to leader.
    pub fn handle_request_vote_reply(&mut self, reply: &RequestVoteReply, peer_count: usize) -> bool {
        if self.role != Role::Candidate {
            return false;
        }
        if reply.term > self.current_term {
            self.step_down(reply.term);
            return false;
        }
        if reply.term == self.current_term && reply.vote_granted {
            self.votes_received += 1;
        }
        if self.votes_received * 2 > peer_count + 1 {
            self.become_leader(peer_count);
            return true;
        }
        false
    }

    /// Handles an incoming AppendEntries RPC: term checks, log matching,
    /// truncate-then-append merge, commit-index advance.
    pub fn handle_append_entries(&mut self, ae: &AppendEntriesRpc) -> AppendEntriesReply {
        if ae.term > self.current_term {
            self.step_down(ae.term);
        }

        if ae.term < self.current_term {
            return AppendEntriesReply {
                term: self.current_term,
                success: false,
            };
        }

        if self.role != Role::Follower {
            self.role = Role::Follower;
        }
        self.current_leader_id = Some(ae.leader_id);

        let prev_ok = ae.prev_log_index == -1
            || ((ae.prev_log_index as usize) < self.log.len()
                && self.log[ae.prev_log_index as usize].term == ae.prev_log_term);

        if !prev_ok {
            return AppendEntriesReply {
                term: self.current_term,
                success: false,
            };
        }

        let mut log_insert = (ae.prev_log_index + 1) as usize;
        let mut new_index = 0usize;
        while log_insert < self.log.len() && new_index < ae.entries.len() {
            if self.log[log_insert].term != ae.entries[new_index].term {
                break;
            }
            log_insert += 1;
            new_index += 1;
        }
        if new_index < ae.entries.len() {
            self.log.truncate(log_insert);
            self.log.extend_from_slice(&ae.entries[new_index..]);
        }

        if ae.leader_commit > self.commit_index {
            self.commit_index = ae.leader_commit.min(self.last_log_index());
        }

        AppendEntriesReply {
            term: self.current_term,
            success: true,
        }
    }

    /// Applies a successful/failed AppendEntries reply to leader bookkeeping,
    /// then advances `commit_index` using the canonical majority rule:
    /// the largest `N > commit_index` such that a majority of
    /// `match_index >= N` and `log[N].term == current_term`.
    ///
    /// Returns `true` if the reply's term forced a step-down to follower.
    pub fn handle_append_entries_reply(
        &mut self,
        peer_index: usize,
        reply: &AppendEntriesReply,
        sent_log_length: i32,
    ) -> bool {
        if reply.term > self.current_term {
            self.step_down(reply.term);
            return true;
        }
        if !self.is_leader() || reply.term != self.current_term {
            return false;
        }

        let peer_count = match &self.leader_volatile {
            Some(lv) => lv.next_index.len(),
            None => return false,
        };

        if reply.success {
            if let Some(lv) = &mut self.leader_volatile {
                lv.next_index[peer_index] = sent_log_length;
                lv.match_index[peer_index] = sent_log_length - 1;
            }
            self.advance_commit_index(peer_count);
        } else if let Some(lv) = &mut self.leader_volatile {
            if lv.next_index[peer_index] > 0 {
                lv.next_index[peer_index] -= 1;
            }
        }
        false
    }

    fn advance_commit_index(&mut self, peer_count: usize) {
        let lv = match &self.leader_volatile {
            Some(lv) => lv,
            None => return,
        };
        let mut candidate = self.commit_index;
        for n in (self.commit_index + 1)..=self.last_log_index() {
            if self.log[n as usize].term != self.current_term {
                continue;
            }
            // +1 for the leader itself, which implicitly matches its own log.
            let matching = lv.match_index.iter().filter(|&&m| m >= n).count() + 1;
            if matching * 2 > peer_count + 1 {
                candidate = n;
            }
        }
        self.commit_index = candidate;
    }

    /// Appends a client value to the local log if this node is the leader.
    /// Returns `None` when not the leader — the caller should forward the
    /// value instead.
    pub fn submit(&mut self, value: i32) -> Option<LogEntry> {
        if !self.is_leader() {
            return None;
        }
        let entry = LogEntry {
            term: self.current_term,
            value,
        };
        self.log.push(entry);
        Some(entry)
    }

    /// Entries the replicated state machine has not yet applied, and
    /// advances `last_applied` to `commit_index`.
    pub fn take_committed(&mut self) -> Vec<LogEntry> {
        if self.commit_index <= self.last_applied {
            return Vec::new();
        }
        let from = (self.last_applied + 1) as usize;
        let to = (self.commit_index + 1) as usize;
        let entries = self.log[from..to].to_vec();
        self.last_applied = self.commit_index;
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_needs_majority_to_become_leader() {
        let mut state = RaftState::new(0);
        state.become_candidate();
        assert!(!state.handle_request_vote_reply(
            &RequestVoteReply {
                term: 1,
                vote_granted: true
            },
            2
        ));
        assert!(state.handle_request_vote_reply(
            &RequestVoteReply {
                term: 1,
                vote_granted: true
            },
            2
        ));
        assert_eq!(state.role, Role::Leader);
    }

    #[test]
    fn higher_term_forces_step_down() {
        let mut state = RaftState::new(0);
        state.become_candidate();
        let granted = state.handle_request_vote_reply(
            &RequestVoteReply {
                term: 5,
                vote_granted: false,
            },
            2,
        );
        assert!(!granted);
        assert_eq!(state.role, Role::Follower);
        assert_eq!(state.current_term, 5);
    }

    #[test]
    fn vote_granted_requires_up_to_date_log() {
        let mut state = RaftState::new(1);
        state.log.push(LogEntry { term: 1, value: 9 });
        let reply = state.handle_request_vote(&RequestVoteRpc {
            term: 1,
            candidate_id: 2,
            last_log_term: 0,
            last_log_index: -1,
        });
        assert!(!reply.vote_granted);
    }

    #[test]
    fn append_entries_merges_truncating_conflicts() {
        let mut state = RaftState::new(1);
        state.current_term = 2;
        state.log = vec![
            LogEntry { term: 1, value: 1 },
            LogEntry { term: 1, value: 2 },
            LogEntry { term: 2, value: 99 },
        ];

        let reply = state.handle_append_entries(&AppendEntriesRpc {
            term: 2,
            leader_id: 0,
            prev_log_term: 1,
            prev_log_index: 1,
            leader_commit: 2,
            entries: vec![LogEntry { term: 2, value: 3 }],
        });

        assert!(reply.success);
        assert_eq!(
            state.log,
            vec![
                LogEntry { term: 1, value: 1 },
                LogEntry { term: 1, value: 2 },
                LogEntry { term: 2, value: 3 },
            ]
        );
        assert_eq!(state.commit_index, 2);
    }

    #[test]
    fn append_entries_rejects_mismatched_prev_term() {
        let mut state = RaftState::new(1);
        state.current_term = 1;
        state.log = vec![LogEntry { term: 1, value: 1 }];

        let reply = state.handle_append_entries(&AppendEntriesRpc {
            term: 1,
            leader_id: 0,
            prev_log_term: 2,
            prev_log_index: 0,
            leader_commit: 0,
            entries: vec![],
        });
        assert!(!reply.success);
    }

    #[test]
    fn commit_index_advances_only_on_current_term_majority() {
        let mut state = RaftState::new(0);
        state.current_term = 2;
        state.log = vec![
            LogEntry { term: 1, value: 1 },
            LogEntry { term: 2, value: 2 },
        ];
        state.role = Role::Leader;
        state.leader_volatile = Some(LeaderVolatile {
            next_index: vec![2, 2],
            match_index: vec![-1, -1],
        });

        // peer 0 catches up to log length 2 (index 1, term 2): with the
        // leader that's a majority of 2 out of 3.
        state.handle_append_entries_reply(0, &AppendEntriesReply { term: 2, success: true }, 2);
        assert_eq!(state.commit_index, 1);
    }

    #[test]
    fn submit_appends_only_when_leader() {
        let mut state = RaftState::new(0);
        assert!(state.submit(7).is_none());
        state.role = Role::Leader;
        assert_eq!(state.submit(7), Some(LogEntry { term: 0, value: 7 }));
    }
}
