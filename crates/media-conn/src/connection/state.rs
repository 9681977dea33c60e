//! Transport-state aggregation.
//!
//! The facade observes the ICE and DTLS transport states of the
//! underlying peer connection and folds them into one connection state,
//! with the same precedence a WebRTC peer connection uses:
//! closed > failed > disconnected > connected > connecting > new.

use serde::{Deserialize, Serialize};

/// Observed ICE transport state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IceTransportState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

/// Observed DTLS transport state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DtlsTransportState {
    New,
    Connecting,
    Connected,
    Failed,
    Closed,
}

/// Aggregated connection state exposed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::New => "new",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
            ConnectionState::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

/// Fold the two transport states into one connection state.
pub fn aggregate_connection_state(
    ice: IceTransportState,
    dtls: DtlsTransportState,
) -> ConnectionState {
    if ice == IceTransportState::Closed || dtls == DtlsTransportState::Closed {
        ConnectionState::Closed
    } else if ice == IceTransportState::Failed || dtls == DtlsTransportState::Failed {
        ConnectionState::Failed
    } else if ice == IceTransportState::Disconnected {
        ConnectionState::Disconnected
    } else if matches!(
        ice,
        IceTransportState::Connected | IceTransportState::Completed
    ) && dtls == DtlsTransportState::Connected
    {
        ConnectionState::Connected
    } else if ice == IceTransportState::Checking || dtls == DtlsTransportState::Connecting {
        ConnectionState::Connecting
    } else {
        ConnectionState::New
    }
}
