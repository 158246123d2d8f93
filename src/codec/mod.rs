//! Client wire codec: a text/binary hybrid framing for requests and
//! responses, independent of the Raft and cluster wire formats.

pub mod error;
pub mod request;
pub mod response;

pub use error::CodecError;
pub use request::Request;
pub use response::{DataPoint, Response};
