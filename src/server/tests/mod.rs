use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddrV4, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serial_test::serial;
use tempfile::tempdir;

use crate::cluster::{Ring, Router};
use crate::replica::{new_consensus, ReplicaContext};
use crate::server::{Server, ServerState};
use storage::DatabaseContext;

fn start_single_node_server(port: u16, raft_port: u16) -> (Server, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let db = Arc::new(Mutex::new(DatabaseContext::new(dir.path().join("data")).unwrap()));

    let host = SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), raft_port);
    let consensus = new_consensus(0, host, &[], &dir.path().join("raft.state"), Duration::from_millis(150)).unwrap();

    let ring = Ring::with_defaults(vec![SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), port)]);
    let router = Router::new(0, ring);

    let replica = ReplicaContext::new(db, router, consensus);
    let server = Server::new(replica, format!("127.0.0.1:{}", port));
    (server, dir)
}

fn send_and_read(stream: &mut TcpStream, request: &[u8], expected_len: usize) -> Vec<u8> {
    let _ = stream.write(request);
    std::thread::sleep(Duration::from_millis(50));
    let mut buf = vec![0u8; expected_len];
    let n = stream.read(&mut buf).unwrap_or(0);
    buf.truncate(n);
    buf
}

#[test]
#[serial]
fn createdb_use_create_insert_and_select_round_trip() {
    let (server, _dir) = start_single_node_server(17001, 17501);
    assert_eq!(server.start(), Some(ServerState::Started));

    let mut stream = TcpStream::connect("127.0.0.1:17001").unwrap();

    let createdb = b"$16\r\nCREATEDB metrics\r\n";
    assert_eq!(send_and_read(&mut stream, createdb, 8), b"$2\r\nOK\r\n");

    let use_db = b"$11\r\nUSE metrics\r\n";
    assert_eq!(send_and_read(&mut stream, use_db, 8), b"$2\r\nOK\r\n");

    let create = b"$12\r\nCREATE cpu_l\r\n";
    assert_eq!(send_and_read(&mut stream, create, 8), b"$2\r\nOK\r\n");

    let insert = b"$43\r\nINSERT INTO cpu_l VALUES (1700000000, 42.5)\r\n";
    assert_eq!(send_and_read(&mut stream, insert, 8), b"$2\r\nOK\r\n");

    let select = b"$23\r\nSELECT value FROM cpu_l\r\n";
    let response = send_and_read(&mut stream, select, 64);
    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("#1\r\n"));
    assert!(response.contains(";42.5"));

    assert_eq!(server.stop(), Some(ServerState::Stopped));
}

#[test]
#[serial]
fn malformed_frame_yields_error_response() {
    let (server, _dir) = start_single_node_server(17002, 17502);
    assert_eq!(server.start(), Some(ServerState::Started));

    let mut stream = TcpStream::connect("127.0.0.1:17002").unwrap();
    let response = send_and_read(&mut stream, b"*not-a-frame\r\n", 32);
    assert_eq!(response[0], b'!');

    assert_eq!(server.stop(), Some(ServerState::Stopped));
}

#[test]
#[serial]
fn unknown_series_select_yields_error_response() {
    let (server, _dir) = start_single_node_server(17003, 17503);
    assert_eq!(server.start(), Some(ServerState::Started));

    let mut stream = TcpStream::connect("127.0.0.1:17003").unwrap();

    let createdb = b"$16\r\nCREATEDB metrics\r\n";
    let _ = send_and_read(&mut stream, createdb, 8);
    let use_db = b"$11\r\nUSE metrics\r\n";
    let _ = send_and_read(&mut stream, use_db, 8);

    let select = b"$25\r\nSELECT value FROM missing\r\n";
    let response = send_and_read(&mut stream, select, 64);
    assert_eq!(response[0], b'!');

    assert_eq!(server.stop(), Some(ServerState::Stopped));
}
