//! Negotiation state machine
//!
//! The engine's single source of truth is a tagged state enum with an
//! explicit transition table, plus a bookkeeping record for the in-flight
//! exchange (sequence number, retry budget, queued renegotiation, cached
//! offer for retries, creation epoch).
//!
//! ```text
//! Local-initiated:
//!   Idle -> CreatingLocalOffer -> SettingLocalOffer -> WaitingForAnswer
//!        -> SettingRemoteAnswer -> Idle
//!
//! Remote OFFER:
//!   Idle -> SettingRemoteOffer -> CreatingLocalAnswer -> WaitingForOk -> Idle
//!
//! Remote OFFER_REQUEST:
//!   Idle -> HandlingOfferRequest -> WaitingForAnswer -> ...
//! ```
//!
//! `BrowserError` and `RemoteError` are absorbing terminals.

pub mod context;
pub mod state;

pub use context::Negotiation;
pub use state::{validate_transition, InvalidTransition, NegotiationState};
