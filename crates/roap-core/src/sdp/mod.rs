//! SDP munger hook
//!
//! A caller-supplied post-processor invoked on every locally produced
//! SDP, after `set_local_description` succeeds and before the resulting
//! OFFER / OFFER_RESPONSE / ANSWER goes on the wire. The peer only ever
//! sees the munger's output; the raw local description never leaves the
//! engine.

use async_trait::async_trait;

/// Output of the munger hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MungedSdp {
    pub sdp: String,
}

/// Rewrites a locally produced SDP before emission.
#[async_trait]
pub trait SdpMunger: Send + Sync {
    async fn process_local_sdp(&self, sdp: String) -> Result<MungedSdp, String>;
}

/// Munger that leaves the SDP untouched.
#[derive(Debug, Default)]
pub struct PassthroughMunger;

#[async_trait]
impl SdpMunger for PassthroughMunger {
    async fn process_local_sdp(&self, sdp: String) -> Result<MungedSdp, String> {
        Ok(MungedSdp { sdp })
    }
}
