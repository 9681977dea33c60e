//! Peer-connection dependency
//!
//! The engine drives an externally supplied peer connection through four
//! asynchronous primitives and reads back the applied local description.
//! Nothing else of the peer connection is touched here; transceivers,
//! tracks, and transports belong to the layer above.

use async_trait::async_trait;

/// Whether a description is an offer or an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

impl std::fmt::Display for SdpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SdpType::Offer => write!(f, "offer"),
            SdpType::Answer => write!(f, "answer"),
        }
    }
}

/// An SDP blob paired with its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self { sdp_type: SdpType::Offer, sdp: sdp.into() }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self { sdp_type: SdpType::Answer, sdp: sdp.into() }
    }
}

/// The primitive failing when a peer-connection call is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerOp {
    CreateOffer,
    CreateAnswer,
    SetLocalDescription,
    SetRemoteDescription,
    ProcessLocalSdp,
}

impl std::fmt::Display for PeerOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PeerOp::CreateOffer => "createOffer",
            PeerOp::CreateAnswer => "createAnswer",
            PeerOp::SetLocalDescription => "setLocalDescription",
            PeerOp::SetRemoteDescription => "setRemoteDescription",
            PeerOp::ProcessLocalSdp => "processLocalSdp",
        };
        write!(f, "{}", name)
    }
}

/// Asynchronous peer-connection primitives the engine depends on.
///
/// Each call completes asynchronously and may be rejected; a rejection
/// during an exchange sends the engine to the browser-error terminal.
/// `local_description` must return the description most recently applied
/// through `set_local_description`.
#[async_trait]
pub trait PeerConnectionOps: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, String>;

    async fn create_answer(&self) -> Result<SessionDescription, String>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), String>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), String>;

    async fn local_description(&self) -> Option<SessionDescription>;
}
