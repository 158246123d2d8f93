use std::io::{BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use crate::cluster::ClusterMessage;
use crate::codec::Request;
use crate::query::{Executor, Parser};
use crate::replica::{handle_cluster_message, ReplicaContext};
use crate::server::ServerState;

use super::{CloseConnection, ReceivedDataLength};

pub fn stop_sig_received(recv: &Receiver<ServerState>, sender: &Sender<ServerState>) -> bool {
    if let Ok(recv_state) = recv.try_recv() {
        if recv_state == ServerState::Stop {
            let _ = sender.send(ServerState::Stopped);
            return true;
        }
    }
    false
}

fn get_bytes_from_request(stream: &TcpStream) -> ([u8; 512], usize) {
    let mut buf_reader = BufReader::new(stream);
    let mut buf = [0; 512];
    let mut buf_length = 0_usize;

    while let Ok(s) = buf_reader.read(&mut buf) {
        buf_length += s;
        if s < 512 {
            break;
        }
    }

    (buf, buf_length)
}

/// Reads one request off `stream` and dispatches it: a leading tag byte of
/// `0`/`1` is a cluster peer message, anything else is a client query frame.
pub fn handle_request(replica: &Arc<ReplicaContext>, mut stream: &TcpStream) -> (CloseConnection, ReceivedDataLength) {
    let (buf, buf_length) = get_bytes_from_request(stream);
    if buf_length == 0 {
        return (false, 0);
    }

    match buf[0] {
        0 | 1 => {
            if let Ok(message) = ClusterMessage::decode(&buf[..buf_length]) {
                if let ClusterMessage::Data { key, .. } = &message {
                    if let Ok(ts_name) = std::str::from_utf8(key) {
                        handle_cluster_message(replica, ts_name, message);
                    }
                }
            }
            (false, buf_length)
        }
        _ => {
            let response = match Request::parse(&buf[..buf_length]) {
                Ok((request, _)) => match Parser::parse(request.query) {
                    Ok(statement) => {
                        let executor = Executor::new(Arc::clone(replica.db()), Arc::clone(replica));
                        match executor.execute(statement) {
                            Ok(response) => response,
                            Err(err) => crate::codec::Response::error(err.to_string()),
                        }
                    }
                    Err(err) => crate::codec::Response::error(err.to_string()),
                },
                Err(err) => crate::codec::Response::error(err.to_string()),
            };

            let _ = stream.write(&response.encode());
            (false, buf_length)
        }
    }
}
