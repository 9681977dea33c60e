//! Events emitted by the media-connection facade.

use serde::{Deserialize, Serialize};

use rtcsig_roap_core::{NegotiationState, RoapMessage};

use crate::connection::state::ConnectionState;

/// Events the facade emits toward the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaConnectionEvent {
    /// A ROAP message to transmit to the remote peer immediately.
    RoapMessageToSend { message: RoapMessage },

    /// The signaling engine entered a terminal error state.
    RoapFailure {
        state: NegotiationState,
        reason: String,
    },

    /// The aggregated connection state changed.
    ConnectionStateChanged { state: ConnectionState },
}
