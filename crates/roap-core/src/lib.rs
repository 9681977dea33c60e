//! # rtcsig-roap-core
//!
//! ROAP signaling engine: sequenced, glare-resolving SDP offer/answer
//! coordination over an externally supplied peer connection.
//!
//! The engine exchanges ROAP messages (draft-jennings-rtcweb-signaling)
//! with a remote peer while driving the local peer connection's
//! `createOffer` / `createAnswer` / `setLocalDescription` /
//! `setRemoteDescription` primitives. It serializes local offer
//! initiation and remote-driven negotiation through one state machine,
//! resolves glare with a fixed near-maximum tie-breaker, retries
//! rejected offers under a bounded budget, and queues renegotiation
//! requests that arrive mid-exchange.
//!
//! ## Architecture
//!
//! ```text
//! host facade                      session loop (one task)
//! -----------                      -----------------------
//! initiate_offer() ---\            +----------------------+
//! roap_message_recv() --> mpsc --> | NegotiationState     |
//!                                  | Negotiation record   |
//! RoapEvent stream <-------------- | glare/retry policy   |
//!  (MessageToSend,                 +---+------------------+
//!   Failure)                           | spawn
//!                                      v
//!                          primitive chains (createOffer,
//!                          setLocal + munger, setRemote),
//!                          outcomes posted back as commands
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rtcsig_roap_core::{PassthroughMunger, RoapConfig, RoapSession};
//! # use rtcsig_roap_core::PeerConnectionOps;
//! # async fn demo(peer: Arc<dyn PeerConnectionOps>) {
//! let (session, mut events) = RoapSession::new(
//!     peer,
//!     Arc::new(PassthroughMunger),
//!     RoapConfig::default(),
//! );
//!
//! session.initiate_offer().await.unwrap();
//! while let Some(_event) = events.recv().await {
//!     // forward MessageToSend to the peer, react to Failure
//! }
//! # }
//! ```

pub mod errors;
pub mod events;
pub mod negotiation;
pub mod peer;
pub mod protocol;
pub mod sdp;
pub mod session;

pub use errors::{RoapError, RoapResult};
pub use events::RoapEvent;
pub use negotiation::{Negotiation, NegotiationState};
pub use peer::{PeerConnectionOps, PeerOp, SdpType, SessionDescription};
pub use protocol::{
    RoapErrorKind, RoapMessage, RoapMessageType, SessionIds, LOCAL_TIE_BREAKER,
    MAX_OFFER_RETRIES, TIE_BREAKER_SENTINEL,
};
pub use sdp::{MungedSdp, PassthroughMunger, SdpMunger};
pub use session::{RoapConfig, RoapSession, SessionHandleId};
