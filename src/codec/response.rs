use prost::bytes::BufMut;

/// A single `(timestamp, value)` pair in an array response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataPoint {
    pub timestamp_ns: u64,
    pub value: f64,
}

#[derive(Debug)]
pub enum Response {
    String(Vec<u8>),
    Error(String),
    Array(Vec<DataPoint>),
}

impl Response {
    pub fn ok() -> Self {
        Response::String(b"OK".to_vec())
    }

    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Response::String(bytes.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error(message.into())
    }

    /// Serializes into the wire form: `'$'|'!'` length-prefixed bodies, or a
    /// `'#' <count>` header followed by `':' <ts> ';' <value>` pairs.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Response::String(bytes) => frame(b'$', bytes),
            Response::Error(message) => frame(b'!', message.as_bytes()),
            Response::Array(points) => {
                let mut out = Vec::with_capacity(16 + points.len() * 32);
                out.push(b'#');
                out.put_slice(points.len().to_string().as_bytes());
                out.put_slice(b"\r\n");
                for point in points {
                    out.push(b':');
                    out.put_slice(point.timestamp_ns.to_string().as_bytes());
                    out.put_slice(b"\r\n");
                    out.push(b';');
                    out.put_slice(point.value.to_string().as_bytes());
                    out.put_slice(b"\r\n");
                }
                out
            }
        }
    }
}

fn frame(symbol: u8, bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 8);
    out.push(symbol);
    out.put_slice(bytes.len().to_string().as_bytes());
    out.put_slice(b"\r\n");
    out.put_slice(bytes);
    out.put_slice(b"\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_string_response() {
        let bytes = Response::ok().encode();
        assert_eq!(bytes, b"$2\r\nOK\r\n");
    }

    #[test]
    fn encodes_error_response() {
        let bytes = Response::error("bad query").encode();
        assert_eq!(bytes, b"!9\r\nbad query\r\n");
    }

    #[test]
    fn encodes_empty_array_response() {
        let bytes = Response::Array(vec![]).encode();
        assert_eq!(bytes, b"#0\r\n");
    }

    #[test]
    fn encodes_array_response_with_points() {
        let bytes = Response::Array(vec![DataPoint { timestamp_ns: 1000, value: 2.5 }]).encode();
        assert_eq!(bytes, b"#1\r\n:1000\r\n;2.5\r\n");
    }
}
