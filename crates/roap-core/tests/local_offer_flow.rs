//! Locally initiated offer/answer exchanges: the happy path, queued
//! renegotiation, and creation restarts.

mod common;

use std::time::Duration;

use rtcsig_roap_core::{RoapMessage, RoapMessageType, LOCAL_TIE_BREAKER};

use common::{expect_message, expect_no_event, session, wait_until};

#[tokio::test]
async fn client_initiated_exchange_completes() {
    let (session, mut events, peer, munger) = session();

    session.initiate_offer().await.unwrap();

    let offer = expect_message(&mut events).await;
    assert_eq!(offer.message_type, RoapMessageType::Offer);
    assert_eq!(offer.seq, 1);
    assert_eq!(offer.sdp.as_deref(), Some("munged:offer-sdp-1"));
    assert_eq!(offer.tie_breaker, Some(LOCAL_TIE_BREAKER));

    session
        .roap_message_received(RoapMessage::answer(1, "remote-answer".into()))
        .await
        .unwrap();

    let ok = expect_message(&mut events).await;
    assert_eq!(ok.message_type, RoapMessageType::Ok);
    assert_eq!(ok.seq, 1);

    // Exactly one pass through the primitives, in offer order.
    assert_eq!(
        peer.calls(),
        vec!["createOffer", "setLocalDescription", "setRemoteDescription"]
    );
    assert_eq!(munger.invocations(), 1);
}

#[tokio::test]
async fn subsequent_exchanges_increase_seq() {
    let (session, mut events, _peer, _munger) = session();

    for expected_seq in 1..=3u64 {
        session.initiate_offer().await.unwrap();
        let offer = expect_message(&mut events).await;
        assert_eq!(offer.seq, expected_seq);

        session
            .roap_message_received(RoapMessage::answer(expected_seq, "answer".into()))
            .await
            .unwrap();
        let ok = expect_message(&mut events).await;
        assert_eq!(ok.seq, expected_seq);
    }
}

#[tokio::test]
async fn renegotiation_mid_exchange_is_queued() {
    let (session, mut events, peer, _munger) = session();

    session.initiate_offer().await.unwrap();
    let offer = expect_message(&mut events).await;
    assert_eq!(offer.seq, 1);

    // Offer already on the wire: this request must wait for idle.
    session.initiate_offer().await.unwrap();

    session
        .roap_message_received(RoapMessage::answer(1, "answer".into()))
        .await
        .unwrap();

    let ok = expect_message(&mut events).await;
    assert_eq!(ok.message_type, RoapMessageType::Ok);
    assert_eq!(ok.seq, 1);

    // The queued renegotiation starts on return to idle, one seq up.
    let second_offer = expect_message(&mut events).await;
    assert_eq!(second_offer.message_type, RoapMessageType::Offer);
    assert_eq!(second_offer.seq, 2);
    assert_eq!(second_offer.tie_breaker, Some(LOCAL_TIE_BREAKER));
    assert_eq!(peer.call_count("createOffer"), 2);
}

#[tokio::test]
async fn initiate_while_creation_pending_restarts_the_creation() {
    let (session, mut events, peer, munger) = session();

    let gate = peer.gate_set_local();

    session.initiate_offer().await.unwrap();
    wait_until("first setLocalDescription call", || {
        peer.call_count("setLocalDescription") == 1
    })
    .await;

    // Second request while set_local_description is still pending:
    // the creation is discarded and redone under the same seq.
    session.initiate_offer().await.unwrap();
    gate.add_permits(8);

    let offer = expect_message(&mut events).await;
    assert_eq!(offer.message_type, RoapMessageType::Offer);
    assert_eq!(offer.seq, 1);

    // Each primitive ran exactly twice; only one OFFER left the engine.
    wait_until("superseded chain to finish", || munger.invocations() == 2).await;
    assert_eq!(peer.call_count("createOffer"), 2);
    assert_eq!(peer.call_count("setLocalDescription"), 2);
    expect_no_event(&mut events, Duration::from_millis(100)).await;
}

#[tokio::test]
async fn raw_local_description_never_reaches_the_wire() {
    let (session, mut events, _peer, _munger) = session();

    session.initiate_offer().await.unwrap();
    let offer = expect_message(&mut events).await;

    let sdp = offer.sdp.unwrap();
    assert!(
        sdp.starts_with("munged:"),
        "outbound SDP must be the munger output, got {sdp}"
    );
}
