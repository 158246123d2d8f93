use std::io::Write;
use std::net::{SocketAddrV4, TcpStream};

use super::error::RoutingError;
use super::message::ClusterMessage;

/// A TCP handle to one shard peer. Connection is opened lazily on first send
/// and re-opened lazily after a disconnect — no background reconnect loop.
pub struct ShardPeer {
    pub shard_id: usize,
    pub addr: SocketAddrV4,
    stream: Option<TcpStream>,
}

impl ShardPeer {
    pub fn new(shard_id: usize, addr: SocketAddrV4) -> Self {
        ShardPeer { shard_id, addr, stream: None }
    }

    pub fn connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn send(&mut self, message: &ClusterMessage) -> Result<(), RoutingError> {
        if self.stream.is_none() {
            let stream = TcpStream::connect(self.addr).map_err(|source| RoutingError::Connect {
                shard_id: self.shard_id,
                addr: self.addr.into(),
                source,
            })?;
            self.stream = Some(stream);
        }

        let bytes = message.encode();
        let result = self
            .stream
            .as_mut()
            .expect("just connected above")
            .write_all(&bytes);

        if let Err(source) = result {
            self.stream = None;
            return Err(RoutingError::Send(self.shard_id, source));
        }
        Ok(())
    }
}
