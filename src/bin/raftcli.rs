//! `raftcli -p <port> [-d]`
//!
//! Connects to `127.0.0.1:<port>` and sends each stdin line as a query
//! frame, printing the decoded response. `-d` runs parser debug mode:
//! queries are parsed and their AST printed without opening a connection.

use std::io::{self, BufRead, Read, Write};
use std::net::TcpStream;
use std::process::exit;

use tsdb::query::Parser;

struct Args {
    port: Option<u16>,
    debug: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args { port: None, debug: false };
    let mut iter = std::env::args().skip(1);
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "-p" => {
                let value = iter.next().ok_or("-p requires a port")?;
                args.port = Some(value.parse().map_err(|_| format!("invalid port '{}'", value))?);
            }
            "-d" => args.debug = true,
            other => return Err(format!("unrecognized flag '{}'", other)),
        }
    }
    Ok(args)
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            exit(1);
        }
    };

    let stdin = io::stdin();

    if args.debug {
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(_) => break,
            };
            if line.trim().is_empty() {
                continue;
            }
            match Parser::parse(&line) {
                Ok(statement) => println!("{:?}", statement),
                Err(err) => eprintln!("parse error: {}", err),
            }
        }
        return;
    }

    let port = match args.port {
        Some(port) => port,
        None => {
            eprintln!("-p <port> is required outside of debug mode");
            exit(1);
        }
    };

    let mut stream = match TcpStream::connect(format!("127.0.0.1:{}", port)) {
        Ok(stream) => stream,
        Err(err) => {
            eprintln!("failed to connect to 127.0.0.1:{}: {}", port, err);
            exit(1);
        }
    };

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let frame = format!("${}\r\n{}\r\n", line.len(), line);
        if let Err(err) = stream.write_all(frame.as_bytes()) {
            eprintln!("write failed: {}", err);
            break;
        }

        let mut buf = [0u8; 4096];
        match stream.read(&mut buf) {
            Ok(0) => {
                eprintln!("connection closed by server");
                break;
            }
            Ok(n) => print!("{}", String::from_utf8_lossy(&buf[..n])),
            Err(err) => {
                eprintln!("read failed: {}", err);
                break;
            }
        }
    }
}
