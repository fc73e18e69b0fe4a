//! # RCon Session Library
//!
//! Client side of the BattlEye remote console protocol used to talk to a
//! running dedicated server: log in with the shared secret, run commands,
//! message and kick players, count down to a restart and shut the server down.
//!
//! ## Architecture
//!
//! ### One Socket, One Listener
//! A [`Session`] owns a connected UDP socket and spawns a listener task for its
//! whole lifetime. The listener classifies every datagram:
//! - command responses are handed to the request waiting on that sequence
//!   number (fragmented responses are reassembled first)
//! - unsolicited server messages are acknowledged, logged and published to
//!   [`Session::subscribe`] receivers
//! - a login packet nobody asked for means the server dropped the session; the
//!   waiting request is told to log in again and retry
//!
//! ### Serialized Requests
//! Commands are never pipelined. Each request takes the session's sequence
//! lock, sends, and waits for its response or the per-request timeout before
//! the next command may go out.
//!
//! ### Best-Effort Maintenance
//! [`Session::countdown`] and [`Session::kick_all`] log transport failures and
//! keep going, so players are warned and kicked as far as the network allows
//! before the shutdown command is issued.
//!
//! ## Module Organization
//!
//! - `packet`: datagram framing (magic, CRC32, type byte) and fragment headers
//! - `session`: the session, its listener task and the maintenance commands
//! - `countdown`: which countdown ticks broadcast and which keep alive
//! - `error`: wire and session error types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use rcon::{Countdown, Session};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rcon::RconError> {
//!     let session = Session::connect("127.0.0.1", 2302, "secret", Duration::from_secs(1)).await?;
//!
//!     let countdown = Countdown::new("Server restarts in {} seconds.", 120);
//!     if !session.countdown(&countdown).await {
//!         log::warn!("Some players may not have been notified");
//!     }
//!
//!     session.kick_all(60, Some("Server restart.")).await;
//!     session.shutdown().await?;
//!     session.close().await;
//!     Ok(())
//! }
//! ```

pub mod countdown;
pub mod error;
pub mod packet;
pub mod session;

pub use countdown::{Countdown, Step};
pub use error::{RconError, RconResult, WireError, WireResult};
pub use packet::{Packet, PacketType, Reply};
pub use session::{KickReport, ServerMessage, Session, ALL_PLAYERS, DEFAULT_TIMEOUT};
