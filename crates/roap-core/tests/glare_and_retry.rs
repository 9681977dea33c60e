//! Glare resolution and the bounded offer-retry policy.

mod common;

use std::time::Duration;

use rtcsig_roap_core::{
    NegotiationState, RoapError, RoapErrorKind, RoapMessage, RoapMessageType, LOCAL_TIE_BREAKER,
};

use common::{expect_failure, expect_message, expect_no_event, session};

#[tokio::test]
async fn glare_is_rejected_and_local_offer_stands() {
    let (session, mut events, peer, _munger) = session();

    session.initiate_offer().await.unwrap();
    let offer = expect_message(&mut events).await;
    assert_eq!(offer.seq, 1);
    assert_eq!(offer.tie_breaker, Some(LOCAL_TIE_BREAKER));

    // The remote offered at the same time with a random tie-breaker.
    session
        .roap_message_received(RoapMessage::offer(1, "their-offer".into(), 0x100))
        .await
        .unwrap();

    let conflict = expect_message(&mut events).await;
    assert_eq!(conflict.message_type, RoapMessageType::Error);
    assert_eq!(conflict.error_type, Some(RoapErrorKind::Conflict));
    assert_eq!(conflict.seq, 1);

    // Their offer was never applied locally.
    assert_eq!(peer.call_count("setRemoteDescription"), 0);

    // The remote backs off and answers ours.
    session
        .roap_message_received(RoapMessage::answer(1, "their-answer".into()))
        .await
        .unwrap();
    let ok = expect_message(&mut events).await;
    assert_eq!(ok.message_type, RoapMessageType::Ok);
    assert_eq!(ok.seq, 1);
}

#[tokio::test]
async fn offer_request_during_local_offer_is_glare_too() {
    let (session, mut events, _peer, _munger) = session();

    session.initiate_offer().await.unwrap();
    let _offer = expect_message(&mut events).await;

    let request = RoapMessage {
        message_type: RoapMessageType::OfferRequest,
        seq: 4,
        sdp: None,
        tie_breaker: None,
        error_type: None,
        offerer_session_id: None,
        answerer_session_id: None,
    };
    session.roap_message_received(request).await.unwrap();

    let conflict = expect_message(&mut events).await;
    assert_eq!(conflict.error_type, Some(RoapErrorKind::Conflict));
    assert_eq!(conflict.seq, 4);
}

#[tokio::test]
async fn double_conflict_replays_offer_without_touching_the_browser() {
    let (session, mut events, peer, munger) = session();

    session.initiate_offer().await.unwrap();
    let first = expect_message(&mut events).await;
    assert_eq!(first.seq, 1);
    let first_sdp = first.sdp.clone();

    session
        .roap_message_received(RoapMessage::error(RoapErrorKind::DoubleConflict, 1))
        .await
        .unwrap();

    let retry = expect_message(&mut events).await;
    assert_eq!(retry.message_type, RoapMessageType::Offer);
    assert_eq!(retry.seq, 2);
    assert_eq!(retry.sdp, first_sdp);
    assert_eq!(retry.tie_breaker, Some(LOCAL_TIE_BREAKER));

    // Replayed verbatim: no second pass through the primitives.
    assert_eq!(peer.call_count("createOffer"), 1);
    assert_eq!(peer.call_count("setLocalDescription"), 1);
    assert_eq!(munger.invocations(), 1);

    // The retried exchange still completes normally.
    session
        .roap_message_received(RoapMessage::answer(2, "their-answer".into()))
        .await
        .unwrap();
    let ok = expect_message(&mut events).await;
    assert_eq!(ok.seq, 2);
}

#[tokio::test]
async fn fourth_retryable_error_terminates_the_engine() {
    let (session, mut events, _peer, _munger) = session();

    session.initiate_offer().await.unwrap();
    let offer = expect_message(&mut events).await;
    assert_eq!(offer.seq, 1);

    // Three consecutive retryable errors: three replays, seq 2..=4.
    for (kind, current) in [
        (RoapErrorKind::DoubleConflict, 1),
        (RoapErrorKind::Retry, 2),
        (RoapErrorKind::OutOfOrder, 3),
    ] {
        session
            .roap_message_received(RoapMessage::error(kind, current))
            .await
            .unwrap();
        let retry = expect_message(&mut events).await;
        assert_eq!(retry.message_type, RoapMessageType::Offer);
        assert_eq!(retry.seq, current + 1);
    }

    // Budget spent: the fourth error is terminal.
    session
        .roap_message_received(RoapMessage::error(RoapErrorKind::Retry, 4))
        .await
        .unwrap();

    let (state, _reason) = expect_failure(&mut events).await;
    assert_eq!(state, NegotiationState::RemoteError);

    // The engine is inert afterwards.
    expect_no_event(&mut events, Duration::from_millis(100)).await;
    assert_eq!(
        session.initiate_offer().await,
        Err(RoapError::SessionFailed)
    );
}

#[tokio::test]
async fn non_retryable_error_while_waiting_is_fatal() {
    let (session, mut events, _peer, _munger) = session();

    session.initiate_offer().await.unwrap();
    let _offer = expect_message(&mut events).await;

    session
        .roap_message_received(RoapMessage::error(RoapErrorKind::NoMatch, 1))
        .await
        .unwrap();

    let (state, reason) = expect_failure(&mut events).await;
    assert_eq!(state, NegotiationState::RemoteError);
    assert!(reason.contains("NOMATCH"), "reason was: {reason}");
}

#[tokio::test]
async fn retryable_error_while_waiting_for_ok_is_fatal() {
    let (session, mut events, _peer, _munger) = session();

    // Remote-initiated exchange puts us on the answerer side.
    session
        .roap_message_received(RoapMessage::offer(1, "their-offer".into(), 0x42))
        .await
        .unwrap();
    let answer = expect_message(&mut events).await;
    assert_eq!(answer.message_type, RoapMessageType::Answer);

    // No offer of ours exists to replay.
    session
        .roap_message_received(RoapMessage::error(RoapErrorKind::Retry, 1))
        .await
        .unwrap();

    let (state, _reason) = expect_failure(&mut events).await;
    assert_eq!(state, NegotiationState::RemoteError);
}

#[tokio::test]
async fn unknown_error_kind_is_fatal() {
    let (session, mut events, _peer, _munger) = session();

    session.initiate_offer().await.unwrap();
    let _offer = expect_message(&mut events).await;

    let wire = r#"{"messageType":"ERROR","seq":1,"errorType":"BRAND_NEW"}"#;
    let message: RoapMessage = serde_json::from_str(wire).unwrap();
    session.roap_message_received(message).await.unwrap();

    let (state, _reason) = expect_failure(&mut events).await;
    assert_eq!(state, NegotiationState::RemoteError);
}
