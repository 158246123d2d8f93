//! A small Raft consensus replica.
//!
//! A [`consensus::ConsensusModule`] owns one replica's state, its peer
//! table, a UDP socket, and a pluggable [`persistence::Persistence`]
//! backend. Callers drive it by calling [`consensus::ConsensusModule::tick`]
//! in a loop — typically from a dedicated background thread — and read back
//! newly committed [`message::LogEntry`] values with
//! [`consensus::ConsensusModule::take_committed`] to apply them to a state
//! machine (in this workspace, the time-series storage engine).
//!
//! ```no_run
//! use std::net::{Ipv4Addr, SocketAddrV4};
//! use raft::consensus::{Config, ConsensusModule};
//! use raft::persistence::FilePersistence;
//!
//! let local = SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 7100);
//! let peers = [
//!     (1, SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 7101)),
//!     (2, SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 7102)),
//! ];
//! let persistence = FilePersistence::new("/tmp/raft-0.state");
//! let mut node = ConsensusModule::new(0, local, &peers, persistence, Config::default()).unwrap();
//!
//! loop {
//!     node.tick();
//!     for entry in node.take_committed() {
//!         println!("applying {:?}", entry);
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! #   break;
//! }
//! ```

pub mod consensus;
pub mod error;
pub mod message;
pub mod peer;
pub mod persistence;
pub mod state;

pub use consensus::{Config, ConsensusModule};
pub use error::{RaftError, Result};
pub use message::{LogEntry, RaftMessage};
pub use state::{RaftState, Role};
