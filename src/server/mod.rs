#[cfg(test)]
mod tests;

mod util;
use util::*;

use std::io::ErrorKind;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use crossbeam_channel::{Receiver, Sender};
use mpb::MPB;

use crate::replica::ReplicaContext;

type CloseConnection = bool;
type ReceivedDataLength = usize;

pub struct Server {
    server_state_bus: MPB<ServerState>,
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum ServerState {
    Start,
    Started,
    Stop,
    Stopped,
    Timeout,
    Error(String),
}

impl Server {
    pub fn new(replica: Arc<ReplicaContext>, addr: impl Into<String>) -> Self {
        let server = Server { server_state_bus: MPB::new() };
        server.init_accept_thread(addr.into(), replica);
        server
    }

    fn init_accept_thread(&self, addr: String, replica: Arc<ReplicaContext>) {
        let state_send = self.server_state_bus.sender();
        let state_recv = self.server_state_bus.receiver();

        let _ = thread::spawn(move || loop {
            if let Ok(server_state) = state_recv.recv() {
                if server_state == ServerState::Start {
                    start_server(&addr, &state_send, &state_recv, &replica);
                }
            }
        });
    }

    fn change_state(&self, change_to: ServerState) -> Option<ServerState> {
        let send_state_ch = self.server_state_bus.sender();

        let post_change_to_state = match change_to {
            ServerState::Start => ServerState::Started,
            ServerState::Stop => ServerState::Stopped,
            ServerState::Started
            | ServerState::Stopped
            | ServerState::Timeout
            | ServerState::Error(_) => return None,
        };

        let _ = thread::spawn(move || {
            let _ = thread::sleep(Duration::from_millis(100));
            let _ = send_state_ch.send(change_to);
        });

        let receiver = self.server_state_bus.receiver();

        while let Ok(server_state) = receiver.recv_timeout(Duration::from_secs(5)) {
            if server_state == post_change_to_state {
                return Some(server_state);
            }
        }

        Some(ServerState::Timeout)
    }

    pub fn start(&self) -> Option<ServerState> {
        self.change_state(ServerState::Start)
    }

    pub fn stop(&self) -> Option<ServerState> {
        self.change_state(ServerState::Stop)
    }
}

fn start_server(
    addr: &str,
    state_send: &Sender<ServerState>,
    state_recv: &Receiver<ServerState>,
    replica: &Arc<ReplicaContext>,
) {
    let listener = match TcpListener::bind(addr) {
        Ok(listener) => {
            let _ = state_send.send(ServerState::Started);
            let _ = listener.set_nonblocking(true);
            listener
        }
        Err(_) => {
            thread::sleep(Duration::from_millis(10));
            return;
        }
    };

    let thread_pool = match rayon::ThreadPoolBuilder::new()
        .thread_name(|_| "request handler".to_string())
        .num_threads(4)
        .build()
    {
        Ok(pool) => pool,
        Err(err) => panic!("{:?}", err),
    };

    for stream in listener.incoming() {
        match stream {
            Ok(tcp_stream) => {
                let replica = Arc::clone(replica);
                let state_recv = state_recv.clone();
                let state_send = state_send.clone();

                let _ = thread_pool.spawn(move || {
                    let mut last_update = SystemTime::now();

                    loop {
                        let (close_connection, received_data_length) =
                            handle_request(&replica, &tcp_stream);

                        if received_data_length > 0 {
                            last_update = SystemTime::now();
                        } else {
                            thread::sleep(Duration::from_millis(10));
                        }

                        if stop_sig_received(&state_recv, &state_send) || close_connection {
                            return;
                        }

                        if let Ok(duration) = last_update.duration_since(SystemTime::now()) {
                            if duration.as_secs() >= 300 {
                                return;
                            }
                        }
                    }
                });
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(10));
            }
            Err(_) => break,
        }

        if stop_sig_received(state_recv, state_send) {
            break;
        }
    }
}
