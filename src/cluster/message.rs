use prost::bytes::BufMut;

use super::error::RoutingError;

const TAG_CLUSTER_JOIN: u8 = 0;
const TAG_CLUSTER_DATA: u8 = 1;

/// A TCP message exchanged directly between shard peers, distinct from the
/// Raft UDP wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterMessage {
    Join,
    Data { key: Vec<u8>, payload: Vec<u8> },
}

impl ClusterMessage {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ClusterMessage::Join => vec![TAG_CLUSTER_JOIN],
            ClusterMessage::Data { key, payload } => {
                let mut out = Vec::with_capacity(9 + key.len() + payload.len());
                out.push(TAG_CLUSTER_DATA);
                out.put_i32(key.len() as i32);
                out.put_slice(key);
                out.put_i32(payload.len() as i32);
                out.put_slice(payload);
                out
            }
        }
    }

    pub fn decode(buf: &[u8]) -> Result<Self, RoutingError> {
        let mut reader = Reader { buf };
        match reader.u8()? {
            TAG_CLUSTER_JOIN => Ok(ClusterMessage::Join),
            TAG_CLUSTER_DATA => {
                let key_len = reader.i32()? as usize;
                let key = reader.take(key_len)?.to_vec();
                let payload_len = reader.i32()? as usize;
                let payload = reader.take(payload_len)?.to_vec();
                Ok(ClusterMessage::Data { key, payload })
            }
            other => Err(io_error(format!("unknown cluster message tag {}", other))),
        }
    }
}

fn io_error(message: String) -> RoutingError {
    RoutingError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, message))
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], RoutingError> {
        if self.buf.len() < n {
            return Err(io_error("truncated cluster message".to_string()));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, RoutingError> {
        Ok(self.take(1)?[0])
    }

    fn i32(&mut self) -> Result<i32, RoutingError> {
        let bytes = self.take(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_round_trips() {
        let msg = ClusterMessage::Join;
        assert_eq!(ClusterMessage::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn data_round_trips() {
        let msg = ClusterMessage::Data { key: b"cpu.load".to_vec(), payload: b"1690000000,42.5".to_vec() };
        assert_eq!(ClusterMessage::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn truncated_data_is_an_error() {
        let mut bytes = ClusterMessage::Data { key: b"k".to_vec(), payload: b"v".to_vec() }.encode();
        bytes.truncate(bytes.len() - 1);
        assert!(ClusterMessage::decode(&bytes).is_err());
    }
}
