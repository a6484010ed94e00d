//! Deterministic simulation harness for Touchline sessions.
//!
//! Turmoil-backed [`touchline_core::Transport`] plus a scripted match
//! authority, for reproducible end-to-end tests of the turn loop under
//! simulated latency and loss.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sim_authority;
pub mod sim_transport;

pub use sim_authority::{SimAuthority, StreamEnding};
pub use sim_transport::{SimConnection, SimTransport};
