// ABOUTME: Self-contained yamux echo demo over a real TCP socket pair
// ABOUTME: Spawns a server thread and multiplexes several client streams over one connection

//! # Multiplexed TCP echo demo
//!
//! Starts an echo server on a loopback port, connects one TCP socket to
//! it, and runs several independent yamux streams over that single
//! connection. Every stream writes a message, half-closes, and reads its
//! echo back.
//!
//! ## Usage
//!
//! ```bash
//! # Defaults: three streams, loopback port 4040
//! cargo run --example tcp_echo
//!
//! # More streams, custom message, debug logging
//! cargo run --example tcp_echo -- -d --streams 8 --message "hello mux"
//! ```

use argh::FromArgs;
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;
use yamux::{Config, Error, Session, StreamHandle};

/// Multiplexed TCP echo demo
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debug logging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// port to bind the echo server on (default: 4040)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// message to send on every stream
    #[argh(option)]
    message: Option<String>,

    /// number of concurrent streams (default: 3)
    #[argh(option)]
    streams: Option<usize>,
}

const IDLE: Duration = Duration::from_millis(1);

/// Run one engine turn, swallowing would-block. Returns false once the
/// session is finished.
fn pump<T: std::io::Read + std::io::Write>(session: &mut Session<T>) -> bool {
    match session.progress() {
        Ok(()) => true,
        Err(Error::WouldBlock) => {
            thread::sleep(IDLE);
            true
        }
        Err(Error::Closed) => false,
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            debug!("transport closed by peer");
            false
        }
        Err(e) => {
            error!("session failed: {e}");
            false
        }
    }
}

fn run_server(listener: TcpListener) {
    let (socket, peer) = match listener.accept() {
        Ok(conn) => conn,
        Err(e) => {
            error!("accept failed: {e}");
            return;
        }
    };
    info!(%peer, "server: connection up");
    if let Err(e) = socket.set_nonblocking(true) {
        error!("set_nonblocking failed: {e}");
        return;
    }

    let mut session = Session::server(socket, Config::default());
    let mut live: Vec<StreamHandle> = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        if !pump(&mut session) {
            return;
        }

        while let Ok(stream) = session.accept_stream() {
            debug!(stream = stream.id(), "server: stream accepted");
            live.push(stream);
        }

        live.retain(|&stream| {
            loop {
                match session.read(stream, &mut chunk) {
                    Ok(0) => {
                        // Clean EOF: echo done, close our half.
                        let _ = session.close(stream);
                        debug!(stream = stream.id(), "server: stream done");
                        return false;
                    }
                    Ok(n) => {
                        if let Err(e) = session.write(stream, &chunk[..n]) {
                            debug!(stream = stream.id(), "server: echo failed: {e}");
                            return false;
                        }
                    }
                    Err(Error::WouldBlock) => return true,
                    Err(_) => return false,
                }
            }
        });

        if session.go_away_received() && live.is_empty() {
            info!("server: peer went away, shutting down");
            let _ = session.shutdown();
            return;
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: CliArgs = argh::from_env();

    let level = if args.debugging {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let port = args.port.unwrap_or(4040);
    let message = args.message.unwrap_or_else(|| "ping over yamux".to_string());
    let num_streams = args.streams.unwrap_or(3).max(1);

    let listener = TcpListener::bind(("127.0.0.1", port))?;
    let server = thread::spawn(move || run_server(listener));

    let socket = TcpStream::connect(("127.0.0.1", port))?;
    socket.set_nonblocking(true)?;
    let mut session = Session::client(socket, Config::default());

    // Open every stream, send the message, half-close.
    let mut pending: Vec<StreamHandle> = Vec::new();
    for _ in 0..num_streams {
        let stream = session.open_stream()?;
        session.write(stream, message.as_bytes())?;
        session.close(stream)?;
        pending.push(stream);
    }

    // Collect the echoes.
    let mut echoes = vec![Vec::new(); pending.len()];
    let mut chunk = [0u8; 4096];
    while !pending.is_empty() {
        if !pump(&mut session) {
            return Err("session ended before all echoes arrived".into());
        }
        pending.retain(|&stream| {
            let slot = (stream.id() / 2) as usize;
            loop {
                match session.read(stream, &mut chunk) {
                    Ok(0) => {
                        info!(
                            stream = stream.id(),
                            echo = %String::from_utf8_lossy(&echoes[slot]),
                            "client: echo complete"
                        );
                        return false;
                    }
                    Ok(n) => echoes[slot].extend_from_slice(&chunk[..n]),
                    Err(Error::WouldBlock) => return true,
                    Err(e) => {
                        error!(stream = stream.id(), "client: read failed: {e}");
                        return false;
                    }
                }
            }
        });
    }

    for echo in &echoes {
        assert_eq!(echo, message.as_bytes(), "echo must match the message");
    }

    session.go_away(yamux::GoAwayCode::Normal)?;
    // Give the peer a chance to see the go-away before dropping the socket.
    for _ in 0..20 {
        if !pump(&mut session) {
            break;
        }
    }
    session.shutdown()?;
    server.join().ok();
    info!("all {num_streams} streams echoed successfully");
    Ok(())
}
