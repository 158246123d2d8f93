//! `server -n <node_id> -p <port> -c <config-file>`
//!
//! `-n` overrides `id` from the loaded config, `-p` overrides the port this
//! node binds for cluster and client traffic, `-c` loads a config file in
//! place of the built-in defaults. Exits non-zero on a bad flag or a bind
//! failure.

use std::net::{SocketAddrV4, TcpListener};
use std::process::exit;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{error, info};

use tsdb::cluster::{Ring, Router};
use tsdb::config::Config;
use tsdb::replica::{new_consensus, ReplicaContext};
use tsdb::server::{Server, ServerState};

struct Args {
    node_id: Option<i32>,
    port: Option<u16>,
    config_path: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args { node_id: None, port: None, config_path: None };
    let mut iter = std::env::args().skip(1);
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "-n" => {
                let value = iter.next().ok_or("-n requires a node id")?;
                args.node_id = Some(value.parse().map_err(|_| format!("invalid node id '{}'", value))?);
            }
            "-p" => {
                let value = iter.next().ok_or("-p requires a port")?;
                args.port = Some(value.parse().map_err(|_| format!("invalid port '{}'", value))?);
            }
            "-c" => {
                args.config_path = Some(iter.next().ok_or("-c requires a config file path")?);
            }
            other => return Err(format!("unrecognized flag '{}'", other)),
        }
    }
    Ok(args)
}

fn main() {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            exit(1);
        }
    };

    let mut config = match &args.config_path {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("failed to load config: {}", err);
                exit(1);
            }
        },
        None => Config::default(),
    };

    if let Some(node_id) = args.node_id {
        config.id = node_id;
    }
    if let Some(port) = args.port {
        config.host = SocketAddrV4::new(*config.host.ip(), port);
    }

    info!("starting node {} ({}) on {}", config.id, config.node_type, config.host);

    // A pre-bind probe: the background accept thread treats a failed bind as
    // a silent retry loop, so fail fast here with the exit code §6.1 asks for.
    if let Err(err) = TcpListener::bind(config.host) {
        error!("failed to bind {}: {}", config.host, err);
        exit(1);
    }

    let db = match storage::DatabaseContext::new("logdata") {
        Ok(db) => Arc::new(Mutex::new(db)),
        Err(err) => {
            error!("failed to open storage: {}", err);
            exit(1);
        }
    };

    let local_shard_id = config.id.max(0) as usize;
    let ring = Ring::with_defaults(config.shard_leaders.clone());
    let router = Router::new(local_shard_id, ring);

    let raft_peers: Vec<(i32, SocketAddrV4)> = config
        .raft_replicas
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx as i32 != config.id)
        .map(|(idx, addr)| (idx as i32, *addr))
        .collect();
    let raft_host = config
        .raft_replicas
        .get(config.id.max(0) as usize)
        .copied()
        .unwrap_or(config.host);

    let consensus = match new_consensus(
        config.id,
        raft_host,
        &raft_peers,
        std::path::Path::new("raft.state"),
        Duration::from_millis(config.raft_heartbeat_ms),
    ) {
        Ok(consensus) => consensus,
        Err(err) => {
            error!("failed to start raft consensus: {}", err);
            exit(1);
        }
    };

    let replica = ReplicaContext::new(db, router, consensus);
    let server = Server::new(replica, config.host.to_string());

    match server.start() {
        Some(ServerState::Started) => info!("listening on {}", config.host),
        _ => {
            error!("server failed to start on {}", config.host);
            exit(1);
        }
    }

    loop {
        std::thread::sleep(Duration::from_secs(3600));
    }
}
