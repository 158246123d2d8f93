use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("failed to connect to shard {shard_id} at {addr}")]
    Connect {
        shard_id: usize,
        addr: std::net::SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to send to shard {0}")]
    Send(usize, #[source] io::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}
