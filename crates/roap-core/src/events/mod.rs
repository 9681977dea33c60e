//! Outbound session events
//!
//! The host subscribes to the receiver returned by
//! [`RoapSession::new`](crate::session::RoapSession::new). Events are
//! emitted in strict causal order with respect to the state transitions
//! that produced them.

use serde::{Deserialize, Serialize};

use crate::negotiation::NegotiationState;
use crate::protocol::RoapMessage;

/// Events the session emits toward the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoapEvent {
    /// A ROAP message the host must transmit to the peer immediately.
    MessageToSend { message: RoapMessage },

    /// Emitted exactly once, on entry to a terminal error state. The
    /// engine is inert afterwards.
    Failure {
        state: NegotiationState,
        reason: String,
    },
}
