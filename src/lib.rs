//! An embeddable implementation of the yamux stream-multiplexing
//! protocol: many independent bidirectional byte streams over a single
//! reliable, ordered byte transport.
//!
//! The engine is single-threaded and cooperative. It owns no sockets
//! and spawns no tasks; the embedder hands it a transport implementing
//! [`std::io::Read`] and [`std::io::Write`] and drives it by calling
//! [`Session::progress`] whenever the transport is readable. No
//! operation blocks internally; anything that cannot complete yet
//! returns [`Error::WouldBlock`].
//!
//! # Example
//!
//! ```rust,no_run
//! use yamux::{Config, Error, Session};
//! use std::net::TcpStream;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let socket = TcpStream::connect("127.0.0.1:4000")?;
//!     socket.set_nonblocking(true)?;
//!
//!     let mut session = Session::client(socket, Config::default());
//!     let stream = session.open_stream()?;
//!     session.write(stream, b"hello")?;
//!     session.close(stream)?;
//!
//!     // Pump the engine until the echoed bytes arrive.
//!     let mut reply = [0u8; 5];
//!     loop {
//!         match session.read(stream, &mut reply) {
//!             Ok(n) => {
//!                 println!("peer sent {:?}", &reply[..n]);
//!                 break;
//!             }
//!             Err(Error::WouldBlock) => match session.progress() {
//!                 Ok(()) | Err(Error::WouldBlock) => {}
//!                 Err(e) => return Err(e.into()),
//!             },
//!             Err(e) => return Err(e.into()),
//!         }
//!     }
//!     session.shutdown()?;
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod frame;
pub mod session;


pub use buffer::ReceiveBuffer;
pub use config::Config;
pub use error::{Error, ProtocolError, Result};
pub use frame::{Flags, Frame, FrameType, GoAwayCode, Header};
pub use session::keepalive::PingStats;
pub use session::{Mode, Session, StreamHandle};
