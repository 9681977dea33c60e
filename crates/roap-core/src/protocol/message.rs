//! ROAP message types and validation.

use serde::{Deserialize, Serialize};

/// The kind of a ROAP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoapMessageType {
    /// A new SDP offer, carries `sdp` and `tieBreaker`.
    Offer,
    /// Request that the receiver produce an offer.
    OfferRequest,
    /// Offer produced in response to an OFFER_REQUEST, carries `sdp`.
    OfferResponse,
    /// SDP answer to an offer, carries `sdp`.
    Answer,
    /// Acknowledges a received answer and closes the exchange.
    Ok,
    /// Protocol error report, carries `errorType`.
    Error,
}

impl std::fmt::Display for RoapMessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = match self {
            RoapMessageType::Offer => "OFFER",
            RoapMessageType::OfferRequest => "OFFER_REQUEST",
            RoapMessageType::OfferResponse => "OFFER_RESPONSE",
            RoapMessageType::Answer => "ANSWER",
            RoapMessageType::Ok => "OK",
            RoapMessageType::Error => "ERROR",
        };
        write!(f, "{}", token)
    }
}

/// Error categories carried in the `errorType` field of ERROR messages.
///
/// Wire tokens the implementation does not know deserialize to
/// [`RoapErrorKind::Unknown`], which is always treated as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoapErrorKind {
    /// Glare: the receiver had its own offer in flight and won the
    /// tie-breaker comparison.
    Conflict,
    /// Glare with equal tie-breakers; both sides must back off.
    DoubleConflict,
    /// Message type not acceptable in the receiver's current state.
    InvalidState,
    /// Sequence number behind the receiver's current exchange.
    OutOfOrder,
    /// Transient condition; the sender should retry the exchange.
    Retry,
    /// The receiver's local environment rejected the exchange.
    Failed,
    /// No usable match for the offered session description.
    NoMatch,
    /// The receiver gave up waiting for the next message.
    Timeout,
    /// Any errorType token this implementation does not know.
    Unknown,
}

impl RoapErrorKind {
    /// Whether an inbound ERROR of this kind may be answered by
    /// re-emitting the rejected offer.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RoapErrorKind::DoubleConflict
                | RoapErrorKind::InvalidState
                | RoapErrorKind::OutOfOrder
                | RoapErrorKind::Retry
        )
    }

    /// The wire token for this kind.
    pub fn as_token(&self) -> &'static str {
        match self {
            RoapErrorKind::Conflict => "CONFLICT",
            RoapErrorKind::DoubleConflict => "DOUBLECONFLICT",
            RoapErrorKind::InvalidState => "INVALID_STATE",
            RoapErrorKind::OutOfOrder => "OUT_OF_ORDER",
            RoapErrorKind::Retry => "RETRY",
            RoapErrorKind::Failed => "FAILED",
            RoapErrorKind::NoMatch => "NOMATCH",
            RoapErrorKind::Timeout => "TIMEOUT",
            RoapErrorKind::Unknown => "UNKNOWN",
        }
    }

    /// Parse a wire token; anything unrecognized becomes `Unknown`.
    pub fn from_token(token: &str) -> Self {
        match token {
            "CONFLICT" => RoapErrorKind::Conflict,
            "DOUBLECONFLICT" => RoapErrorKind::DoubleConflict,
            "INVALID_STATE" => RoapErrorKind::InvalidState,
            "OUT_OF_ORDER" => RoapErrorKind::OutOfOrder,
            "RETRY" => RoapErrorKind::Retry,
            "FAILED" => RoapErrorKind::Failed,
            "NOMATCH" => RoapErrorKind::NoMatch,
            "TIMEOUT" => RoapErrorKind::Timeout,
            _ => RoapErrorKind::Unknown,
        }
    }
}

impl Serialize for RoapErrorKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_token())
    }
}

impl<'de> Deserialize<'de> for RoapErrorKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        Ok(RoapErrorKind::from_token(&token))
    }
}

impl std::fmt::Display for RoapErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_token())
    }
}

/// The offerer/answerer session identifier pair. Carried through
/// outbound messages unchanged once observed on an inbound one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIds {
    pub offerer_session_id: Option<String>,
    pub answerer_session_id: Option<String>,
}

impl SessionIds {
    pub fn is_empty(&self) -> bool {
        self.offerer_session_id.is_none() && self.answerer_session_id.is_none()
    }
}

/// A single ROAP wire message.
///
/// Serializes to the exact JSON shape the protocol defines; optional
/// fields are omitted when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoapMessage {
    pub message_type: RoapMessageType,

    /// Sequence number of the exchange this message belongs to.
    /// Monotonically non-decreasing per direction; paired messages share
    /// a seq.
    pub seq: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tie_breaker: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<RoapErrorKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offerer_session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answerer_session_id: Option<String>,
}

impl RoapMessage {
    /// Build an OFFER.
    pub fn offer(seq: u64, sdp: String, tie_breaker: u32) -> Self {
        Self {
            message_type: RoapMessageType::Offer,
            seq,
            sdp: Some(sdp),
            tie_breaker: Some(tie_breaker),
            error_type: None,
            offerer_session_id: None,
            answerer_session_id: None,
        }
    }

    /// Build an OFFER_RESPONSE answering an OFFER_REQUEST.
    pub fn offer_response(seq: u64, sdp: String) -> Self {
        Self {
            message_type: RoapMessageType::OfferResponse,
            seq,
            sdp: Some(sdp),
            tie_breaker: None,
            error_type: None,
            offerer_session_id: None,
            answerer_session_id: None,
        }
    }

    /// Build an ANSWER.
    pub fn answer(seq: u64, sdp: String) -> Self {
        Self {
            message_type: RoapMessageType::Answer,
            seq,
            sdp: Some(sdp),
            tie_breaker: None,
            error_type: None,
            offerer_session_id: None,
            answerer_session_id: None,
        }
    }

    /// Build an OK.
    pub fn ok(seq: u64) -> Self {
        Self {
            message_type: RoapMessageType::Ok,
            seq,
            sdp: None,
            tie_breaker: None,
            error_type: None,
            offerer_session_id: None,
            answerer_session_id: None,
        }
    }

    /// Build an ERROR of the given kind.
    pub fn error(kind: RoapErrorKind, seq: u64) -> Self {
        Self {
            message_type: RoapMessageType::Error,
            seq,
            sdp: None,
            tie_breaker: None,
            error_type: Some(kind),
            offerer_session_id: None,
            answerer_session_id: None,
        }
    }

    /// Attach a session identifier pair, overwriting nothing that is
    /// already set.
    pub fn with_session_ids(mut self, ids: &SessionIds) -> Self {
        if self.offerer_session_id.is_none() {
            self.offerer_session_id = ids.offerer_session_id.clone();
        }
        if self.answerer_session_id.is_none() {
            self.answerer_session_id = ids.answerer_session_id.clone();
        }
        self
    }

    /// The session identifier pair carried by this message.
    pub fn session_ids(&self) -> SessionIds {
        SessionIds {
            offerer_session_id: self.offerer_session_id.clone(),
            answerer_session_id: self.answerer_session_id.clone(),
        }
    }

    /// Check that every field required by this message's type is
    /// present. Returns the name of the first missing field.
    pub fn validate(&self) -> Result<(), &'static str> {
        match self.message_type {
            RoapMessageType::Offer => {
                if self.sdp.is_none() {
                    return Err("sdp");
                }
                if self.tie_breaker.is_none() {
                    return Err("tieBreaker");
                }
            }
            RoapMessageType::OfferResponse | RoapMessageType::Answer => {
                if self.sdp.is_none() {
                    return Err("sdp");
                }
            }
            RoapMessageType::Error => {
                if self.error_type.is_none() {
                    return Err("errorType");
                }
            }
            RoapMessageType::OfferRequest | RoapMessageType::Ok => {}
        }
        Ok(())
    }
}
