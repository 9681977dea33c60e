//! # rtcsig-media-conn
//!
//! Media-connection facade over the ROAP signaling engine.
//!
//! [`MediaConnection`] pairs an externally supplied peer connection with
//! a [`RoapSession`](rtcsig_roap_core::RoapSession), forwards the
//! engine's signaling events to the host, and folds observed ICE/DTLS
//! transport states into a single [`ConnectionState`].
//!
//! The negotiation machinery itself lives in `rtcsig-roap-core`; this
//! crate stays deliberately thin. Track and transceiver management is
//! out of scope.

pub mod connection;
pub mod errors;
pub mod events;

pub use connection::state::{
    aggregate_connection_state, ConnectionState, DtlsTransportState, IceTransportState,
};
pub use connection::{MediaConnection, MediaConnectionConfig};
pub use errors::{MediaError, MediaResult};
pub use events::MediaConnectionEvent;
