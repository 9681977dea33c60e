//! Internal command queue for the session loop.

use tokio::sync::oneshot;

use crate::errors::RoapResult;
use crate::peer::{PeerOp, SessionDescription};
use crate::protocol::RoapMessage;

/// Commands consumed by the session loop.
///
/// Public API calls carry a `oneshot` acknowledgement that resolves when
/// the input has been admitted to the state machine. Chain and timer
/// completions carry the epoch they were spawned under; a mismatch with
/// the current epoch marks them stale.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    /// Host requested a new local offer/answer exchange.
    InitiateOffer {
        ack: oneshot::Sender<RoapResult<()>>,
    },

    /// Host delivered an inbound ROAP message.
    MessageReceived {
        message: RoapMessage,
        ack: oneshot::Sender<RoapResult<()>>,
    },

    /// `create_offer` resolved for a locally initiated exchange.
    OfferCreated {
        epoch: u64,
        description: SessionDescription,
    },

    /// `set_local_description` plus the munger resolved for a locally
    /// created offer; `sdp` is the munged result.
    LocalOfferReady { epoch: u64, sdp: String },

    /// The full create/set-local/munge chain resolved for an inbound
    /// OFFER_REQUEST.
    OfferResponseReady { epoch: u64, sdp: String },

    /// `set_remote_description` resolved for an inbound OFFER.
    RemoteOfferApplied { epoch: u64 },

    /// The create-answer/set-local/munge chain resolved for an inbound
    /// OFFER.
    LocalAnswerReady { epoch: u64, sdp: String },

    /// `set_remote_description` resolved for an inbound ANSWER.
    RemoteAnswerApplied { epoch: u64 },

    /// A peer-connection primitive or the munger was rejected.
    PrimitiveFailed {
        epoch: u64,
        op: PeerOp,
        reason: String,
    },

    /// The waiting-state timeout expired.
    NegotiationTimedOut { epoch: u64 },

    /// Host requested teardown.
    Close { ack: oneshot::Sender<()> },
}
