use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddrV4, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use tempfile::tempdir;

use tsdb::cluster::{Ring, Router};
use tsdb::replica::{new_consensus, ReplicaContext};
use tsdb::server::{Server, ServerState};
use storage::DatabaseContext;

fn criterion_benchmarks(c: &mut Criterion) {
    let port = 3335;
    let dir = tempdir().unwrap();
    let db = Arc::new(Mutex::new(DatabaseContext::new(dir.path().join("data")).unwrap()));

    let raft_host = SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 3336);
    let consensus =
        new_consensus(0, raft_host, &[], &dir.path().join("raft.state"), Duration::from_millis(150)).unwrap();

    let ring = Ring::with_defaults(vec![SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), port)]);
    let router = Router::new(0, ring);

    let replica = ReplicaContext::new(db, router, consensus);
    let server = Server::new(replica, format!("127.0.0.1:{}", port));
    assert_eq!(server.start(), Some(ServerState::Started));

    let mut stream = TcpStream::connect(format!("localhost:{}", port)).unwrap();

    let createdb = b"$17\r\nCREATEDB bench_db\r\n";
    let _ = stream.write(createdb);
    let mut buf = [0u8; 64];
    let _ = stream.read(&mut buf);

    let use_db = b"$12\r\nUSE bench_db\r\n";
    let _ = stream.write(use_db);
    let _ = stream.read(&mut buf);

    let create = b"$10\r\nCREATE cpu\r\n";
    let _ = stream.write(create);
    let _ = stream.read(&mut buf);

    c.bench_function("insert and select", |b| {
        b.iter(|| {
            let insert = b"$25\r\nINSERT INTO cpu VALUE 1.0\r\n";
            let _ = stream.write(insert);
            let mut insert_res = [0u8; 8];
            let _ = stream.read(&mut insert_res);
            assert_eq!(insert_res, *b"$2\r\nOK\r\n");

            let select = b"$21\r\nSELECT value FROM cpu\r\n";
            let _ = stream.write(select);
            let mut select_res = [0u8; 128];
            let _ = stream.read(&mut select_res);
            assert_eq!(select_res[0], b'#');
        });
    });

    assert_eq!(server.stop(), Some(ServerState::Stopped));
}

criterion_group!(benches, criterion_benchmarks);
criterion_main!(benches);
