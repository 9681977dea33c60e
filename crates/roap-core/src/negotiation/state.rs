//! Negotiation states and the legal-transition table.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where the engine currently is in an offer/answer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NegotiationState {
    /// No exchange in flight.
    Idle,
    /// `create_offer` outstanding for a locally initiated exchange.
    CreatingLocalOffer,
    /// `set_local_description` and the munger outstanding for a locally
    /// created offer.
    SettingLocalOffer,
    /// Local OFFER or OFFER_RESPONSE emitted, awaiting the remote ANSWER.
    WaitingForAnswer,
    /// `set_remote_description` outstanding for an inbound ANSWER.
    SettingRemoteAnswer,
    /// Offer creation triggered by an inbound OFFER_REQUEST.
    HandlingOfferRequest,
    /// `set_remote_description` outstanding for an inbound OFFER.
    SettingRemoteOffer,
    /// `create_answer`, `set_local_description` and the munger
    /// outstanding for an inbound OFFER.
    CreatingLocalAnswer,
    /// Local ANSWER emitted, awaiting the remote OK.
    WaitingForOk,
    /// Terminal: a local peer-connection primitive or the munger failed.
    BrowserError,
    /// Terminal: the peer sent an unrecoverable error or the retry
    /// budget is exhausted.
    RemoteError,
}

impl NegotiationState {
    /// Terminal states absorb every further input.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NegotiationState::BrowserError | NegotiationState::RemoteError)
    }

    /// States in which the engine sits waiting on a remote message.
    pub fn is_waiting(&self) -> bool {
        matches!(self, NegotiationState::WaitingForAnswer | NegotiationState::WaitingForOk)
    }

    /// States in which `initiate_offer` discards the in-progress
    /// creation and redoes it: the outbound message has not left the
    /// engine yet, so the browser calls are simply reissued.
    pub fn restarts_initiate_offer(&self) -> bool {
        matches!(
            self,
            NegotiationState::CreatingLocalOffer
                | NegotiationState::SettingLocalOffer
                | NegotiationState::HandlingOfferRequest
        )
    }

    /// States in which `initiate_offer` is queued: the current exchange
    /// runs to completion, then a fresh exchange starts with `seq + 1`.
    pub fn queues_initiate_offer(&self) -> bool {
        matches!(
            self,
            NegotiationState::WaitingForAnswer
                | NegotiationState::SettingRemoteAnswer
                | NegotiationState::SettingRemoteOffer
                | NegotiationState::CreatingLocalAnswer
                | NegotiationState::WaitingForOk
        )
    }

    /// States in which an inbound OFFER or OFFER_REQUEST collides with a
    /// local offer that is being created or already on the wire. The
    /// collision draws a CONFLICT reply and the local offer stands.
    pub fn rejects_remote_offer_as_glare(&self) -> bool {
        matches!(
            self,
            NegotiationState::CreatingLocalOffer
                | NegotiationState::SettingLocalOffer
                | NegotiationState::HandlingOfferRequest
                | NegotiationState::WaitingForAnswer
        )
    }
}

impl std::fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NegotiationState::Idle => "idle",
            NegotiationState::CreatingLocalOffer => "creatingLocalOffer",
            NegotiationState::SettingLocalOffer => "settingLocalOffer",
            NegotiationState::WaitingForAnswer => "waitingForAnswer",
            NegotiationState::SettingRemoteAnswer => "settingRemoteAnswer",
            NegotiationState::HandlingOfferRequest => "handlingOfferRequest",
            NegotiationState::SettingRemoteOffer => "settingRemoteOffer",
            NegotiationState::CreatingLocalAnswer => "creatingLocalAnswer",
            NegotiationState::WaitingForOk => "waitingForOk",
            NegotiationState::BrowserError => "browserError",
            NegotiationState::RemoteError => "remoteError",
        };
        write!(f, "{}", name)
    }
}

/// Attempted transition not in the legal-edge table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid negotiation transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: NegotiationState,
    pub to: NegotiationState,
}

/// Check a state transition against the legal-edge table.
///
/// Self-edges (restart in a creation state, offer re-emission while
/// waiting) are legal. Entering a terminal is legal from any non-terminal
/// state; leaving one never is.
pub fn validate_transition(
    from: NegotiationState,
    to: NegotiationState,
) -> Result<(), InvalidTransition> {
    use NegotiationState::*;

    if from.is_terminal() {
        return Err(InvalidTransition { from, to });
    }
    if to.is_terminal() {
        return Ok(());
    }

    let legal = match (from, to) {
        // Local-initiated flow
        (Idle, CreatingLocalOffer) => true,
        (CreatingLocalOffer, CreatingLocalOffer) => true, // restart
        (CreatingLocalOffer, SettingLocalOffer) => true,
        (SettingLocalOffer, CreatingLocalOffer) => true, // restart
        (SettingLocalOffer, WaitingForAnswer) => true,
        (WaitingForAnswer, WaitingForAnswer) => true, // offer retry
        (WaitingForAnswer, SettingRemoteAnswer) => true,
        (SettingRemoteAnswer, WaitingForAnswer) => true, // retry during apply
        (SettingRemoteAnswer, Idle) => true,

        // Remote OFFER flow
        (Idle, SettingRemoteOffer) => true,
        (SettingRemoteOffer, CreatingLocalAnswer) => true,
        (CreatingLocalAnswer, WaitingForOk) => true,
        (WaitingForOk, Idle) => true,

        // Remote OFFER_REQUEST flow
        (Idle, HandlingOfferRequest) => true,
        (HandlingOfferRequest, HandlingOfferRequest) => true, // restart
        (HandlingOfferRequest, WaitingForAnswer) => true,

        _ => false,
    };

    if legal {
        Ok(())
    } else {
        Err(InvalidTransition { from, to })
    }
}
