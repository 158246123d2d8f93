//! Consistent-hash cluster routing between shard leaders over TCP.

pub mod error;
pub mod hash;
pub mod message;
pub mod peer;
pub mod ring;
pub mod router;

pub use error::RoutingError;
pub use message::ClusterMessage;
pub use ring::Ring;
pub use router::{Route, Router};
