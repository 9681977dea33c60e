//! Shared test doubles: a recording peer connection, a recording
//! munger, and event-stream helpers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::timeout;

use rtcsig_roap_core::{
    MungedSdp, NegotiationState, PeerConnectionOps, RoapConfig, RoapEvent, RoapMessage,
    RoapSession, SdpMunger, SessionDescription,
};

const EVENT_WAIT: Duration = Duration::from_secs(1);

/// Peer connection double that records every primitive call, serves
/// numbered SDP blobs, and supports scripted failures and a gate that
/// holds `set_local_description` open until released.
#[derive(Default)]
pub struct MockPeerConnection {
    calls: Mutex<Vec<&'static str>>,
    offer_count: AtomicU32,
    answer_count: AtomicU32,
    local: Mutex<Option<SessionDescription>>,
    fail_op: Mutex<Option<(&'static str, String)>>,
    set_local_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl MockPeerConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script the next call to `op` to be rejected with `reason`.
    pub fn fail_next(&self, op: &'static str, reason: &str) {
        *self.fail_op.lock().unwrap() = Some((op, reason.to_string()));
    }

    /// Make `set_local_description` park until permits are added to the
    /// returned semaphore.
    pub fn gate_set_local(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.set_local_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, op: &'static str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    fn record(&self, op: &'static str) {
        self.calls.lock().unwrap().push(op);
    }

    fn scripted_failure(&self, op: &'static str) -> Option<String> {
        let mut guard = self.fail_op.lock().unwrap();
        match guard.as_ref() {
            Some((scripted, reason)) if *scripted == op => {
                let reason = reason.clone();
                *guard = None;
                Some(reason)
            }
            _ => None,
        }
    }
}

#[async_trait]
impl PeerConnectionOps for MockPeerConnection {
    async fn create_offer(&self) -> Result<SessionDescription, String> {
        self.record("createOffer");
        if let Some(reason) = self.scripted_failure("createOffer") {
            return Err(reason);
        }
        let n = self.offer_count.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionDescription::offer(format!("offer-sdp-{n}")))
    }

    async fn create_answer(&self) -> Result<SessionDescription, String> {
        self.record("createAnswer");
        if let Some(reason) = self.scripted_failure("createAnswer") {
            return Err(reason);
        }
        let n = self.answer_count.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionDescription::answer(format!("answer-sdp-{n}")))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), String> {
        self.record("setLocalDescription");
        if let Some(reason) = self.scripted_failure("setLocalDescription") {
            return Err(reason);
        }
        let gate = self.set_local_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        *self.local.lock().unwrap() = Some(desc);
        Ok(())
    }

    async fn set_remote_description(&self, _desc: SessionDescription) -> Result<(), String> {
        self.record("setRemoteDescription");
        if let Some(reason) = self.scripted_failure("setRemoteDescription") {
            return Err(reason);
        }
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.local.lock().unwrap().clone()
    }
}

/// Munger double that counts invocations and tags its output so tests
/// can tell munged SDP from the raw local description.
#[derive(Default)]
pub struct RecordingMunger {
    count: AtomicU32,
    fail: Mutex<Option<String>>,
}

impl RecordingMunger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, reason: &str) {
        *self.fail.lock().unwrap() = Some(reason.to_string());
    }

    pub fn invocations(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SdpMunger for RecordingMunger {
    async fn process_local_sdp(&self, sdp: String) -> Result<MungedSdp, String> {
        self.count.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.fail.lock().unwrap().take() {
            return Err(reason);
        }
        Ok(MungedSdp {
            sdp: format!("munged:{sdp}"),
        })
    }
}

/// A session over fresh doubles with the default config.
pub fn session() -> (
    RoapSession,
    mpsc::Receiver<RoapEvent>,
    Arc<MockPeerConnection>,
    Arc<RecordingMunger>,
) {
    session_with_config(RoapConfig::default())
}

pub fn session_with_config(
    config: RoapConfig,
) -> (
    RoapSession,
    mpsc::Receiver<RoapEvent>,
    Arc<MockPeerConnection>,
    Arc<RecordingMunger>,
) {
    init_tracing();
    let peer = MockPeerConnection::new();
    let munger = RecordingMunger::new();
    let (session, events) = RoapSession::new(peer.clone(), munger.clone(), config);
    (session, events, peer, munger)
}

/// Route engine logs through the test harness; honors `RUST_LOG`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Next event must be a MessageToSend; returns the message.
pub async fn expect_message(events: &mut mpsc::Receiver<RoapEvent>) -> RoapMessage {
    match timeout(EVENT_WAIT, events.recv()).await {
        Ok(Some(RoapEvent::MessageToSend { message })) => message,
        Ok(Some(other)) => panic!("expected MessageToSend, got {other:?}"),
        Ok(None) => panic!("event stream closed while waiting for a message"),
        Err(_) => panic!("timed out waiting for an outbound message"),
    }
}

/// Next event must be a Failure; returns its terminal state and reason.
pub async fn expect_failure(events: &mut mpsc::Receiver<RoapEvent>) -> (NegotiationState, String) {
    match timeout(EVENT_WAIT, events.recv()).await {
        Ok(Some(RoapEvent::Failure { state, reason })) => (state, reason),
        Ok(Some(other)) => panic!("expected Failure, got {other:?}"),
        Ok(None) => panic!("event stream closed while waiting for a failure"),
        Err(_) => panic!("timed out waiting for a failure event"),
    }
}

/// Assert that nothing is emitted for `wait`.
pub async fn expect_no_event(events: &mut mpsc::Receiver<RoapEvent>, wait: Duration) {
    if let Ok(Some(event)) = timeout(wait, events.recv()).await {
        panic!("expected silence, got {event:?}");
    }
}

/// Poll `cond` until it holds or a second passes.
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + EVENT_WAIT;
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
