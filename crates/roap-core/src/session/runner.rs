//! Session event loop
//!
//! Single-threaded engine driving the negotiation state machine. The
//! loop owns all mutable state and consumes one command at a time, so a
//! message always finishes its transition before the next input is
//! looked at, and outbound events leave in the same order as the
//! transitions that produced them.
//!
//! Asynchronous browser primitives never run inside the loop. Entering a
//! creation or applying state spawns a chain task that drives the
//! futures and posts the outcome back into the queue, tagged with the
//! creation epoch. A restart bumps the epoch; the superseded chain keeps
//! running but its outcome is dropped on arrival.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::errors::{RoapError, RoapResult};
use crate::events::RoapEvent;
use crate::negotiation::{validate_transition, Negotiation, NegotiationState};
use crate::peer::{PeerConnectionOps, PeerOp, SessionDescription};
use crate::protocol::{
    RoapErrorKind, RoapMessage, RoapMessageType, LOCAL_TIE_BREAKER, MAX_OFFER_RETRIES,
};
use crate::sdp::SdpMunger;

use super::commands::SessionCommand;
use super::{RoapConfig, SessionHandleId};

/// State owned by the session loop task.
///
/// Holds only a weak command sender: when the last public handle goes
/// away the queue closes and the loop exits on its own. Spawned chains
/// upgrade to a strong sender for their lifetime.
pub(crate) struct SessionRunner {
    id: SessionHandleId,
    config: RoapConfig,
    peer: Arc<dyn PeerConnectionOps>,
    munger: Arc<dyn SdpMunger>,
    events: mpsc::Sender<RoapEvent>,
    commands: mpsc::WeakSender<SessionCommand>,
    state: NegotiationState,
    negotiation: Negotiation,
}

impl SessionRunner {
    pub(crate) fn new(
        id: SessionHandleId,
        config: RoapConfig,
        peer: Arc<dyn PeerConnectionOps>,
        munger: Arc<dyn SdpMunger>,
        events: mpsc::Sender<RoapEvent>,
        commands: mpsc::WeakSender<SessionCommand>,
    ) -> Self {
        Self {
            id,
            config,
            peer,
            munger,
            events,
            commands,
            state: NegotiationState::Idle,
            negotiation: Negotiation::default(),
        }
    }

    /// Run the loop until the session is closed or the handle is
    /// dropped.
    pub(crate) async fn run(mut self, mut cmd_rx: mpsc::Receiver<SessionCommand>) {
        debug!(session_id = %self.id, "negotiation loop starting");

        while let Some(command) = cmd_rx.recv().await {
            trace!(session_id = %self.id, state = %self.state, ?command, "processing command");
            match command {
                SessionCommand::InitiateOffer { ack } => {
                    let _ = ack.send(self.handle_initiate_offer());
                }
                SessionCommand::MessageReceived { message, ack } => {
                    let _ = ack.send(self.handle_message(message).await);
                }
                SessionCommand::OfferCreated { epoch, description } => {
                    self.handle_offer_created(epoch, description);
                }
                SessionCommand::LocalOfferReady { epoch, sdp } => {
                    self.handle_local_offer_ready(epoch, sdp).await;
                }
                SessionCommand::OfferResponseReady { epoch, sdp } => {
                    self.handle_offer_response_ready(epoch, sdp).await;
                }
                SessionCommand::RemoteOfferApplied { epoch } => {
                    self.handle_remote_offer_applied(epoch);
                }
                SessionCommand::LocalAnswerReady { epoch, sdp } => {
                    self.handle_local_answer_ready(epoch, sdp).await;
                }
                SessionCommand::RemoteAnswerApplied { epoch } => {
                    self.handle_remote_answer_applied(epoch).await;
                }
                SessionCommand::PrimitiveFailed { epoch, op, reason } => {
                    self.handle_primitive_failed(epoch, op, reason).await;
                }
                SessionCommand::NegotiationTimedOut { epoch } => {
                    self.handle_timeout(epoch).await;
                }
                SessionCommand::Close { ack } => {
                    debug!(session_id = %self.id, "session closing");
                    // Invalidate outstanding chains and timers before the
                    // queue is dropped.
                    self.negotiation.bump_epoch();
                    let _ = ack.send(());
                    break;
                }
            }
        }

        debug!(session_id = %self.id, state = %self.state, "negotiation loop ended");
    }

    // ---- public-input handlers -------------------------------------

    fn handle_initiate_offer(&mut self) -> RoapResult<()> {
        if self.state.is_terminal() {
            return Err(RoapError::SessionFailed);
        }

        if self.state == NegotiationState::Idle {
            self.start_local_offer();
        } else if self.state.restarts_initiate_offer() {
            // The outbound message has not left the engine yet: discard
            // the in-progress creation and reissue the browser calls
            // under the same seq.
            let epoch = self.negotiation.bump_epoch();
            debug!(
                session_id = %self.id,
                state = %self.state,
                seq = self.negotiation.seq,
                "restarting in-progress offer creation"
            );
            if self.state == NegotiationState::HandlingOfferRequest {
                self.transition(NegotiationState::HandlingOfferRequest);
                self.spawn_offer_request_chain(epoch);
            } else {
                self.transition(NegotiationState::CreatingLocalOffer);
                self.spawn_create_offer(epoch);
            }
        } else {
            debug!(
                session_id = %self.id,
                state = %self.state,
                "queueing renegotiation until the current exchange completes"
            );
            self.negotiation.pending_local_offer = true;
        }
        Ok(())
    }

    async fn handle_message(&mut self, message: RoapMessage) -> RoapResult<()> {
        if self.state.is_terminal() {
            debug!(
                session_id = %self.id,
                state = %self.state,
                message_type = %message.message_type,
                "terminal state, inbound message ignored"
            );
            return Ok(());
        }

        if let Err(field) = message.validate() {
            warn!(
                session_id = %self.id,
                message_type = %message.message_type,
                seq = message.seq,
                field,
                "malformed inbound message"
            );
            self.emit_message(RoapMessage::error(RoapErrorKind::Failed, message.seq))
                .await;
            self.fail_remote(format!(
                "malformed {} message: missing {}",
                message.message_type, field
            ))
            .await;
            return Err(RoapError::InvalidMessage {
                field: field.to_string(),
            });
        }

        let inbound_ids = message.session_ids();
        if !inbound_ids.is_empty() {
            self.negotiation.session_ids = inbound_ids;
        }

        // The retry budget survives only across consecutive retryable
        // ERRORs for the in-flight seq.
        let retryable_for_current = message.message_type == RoapMessageType::Error
            && message
                .error_type
                .map(|k| k.is_retryable())
                .unwrap_or(false)
            && message.seq == self.negotiation.seq;
        if !retryable_for_current {
            self.negotiation.retry_count = 0;
        }

        match message.message_type {
            RoapMessageType::Offer | RoapMessageType::OfferRequest
                if self.state.rejects_remote_offer_as_glare() =>
            {
                debug!(
                    session_id = %self.id,
                    state = %self.state,
                    seq = message.seq,
                    "glare: remote offer collides with ours, replying CONFLICT"
                );
                self.emit_message(RoapMessage::error(RoapErrorKind::Conflict, message.seq))
                    .await;
            }
            RoapMessageType::Error => {
                self.handle_inbound_error(&message).await;
            }
            _ if self.state != NegotiationState::Idle && message.seq != self.negotiation.seq => {
                warn!(
                    session_id = %self.id,
                    state = %self.state,
                    seq = message.seq,
                    expected = self.negotiation.seq,
                    "seq mismatch for in-flight exchange"
                );
                self.emit_message(RoapMessage::error(RoapErrorKind::OutOfOrder, message.seq))
                    .await;
            }
            RoapMessageType::Offer | RoapMessageType::OfferRequest
                if self.state == NegotiationState::Idle
                    && message.seq < self.negotiation.seq =>
            {
                warn!(
                    session_id = %self.id,
                    seq = message.seq,
                    current = self.negotiation.seq,
                    "stale remote offer"
                );
                self.emit_message(RoapMessage::error(RoapErrorKind::OutOfOrder, message.seq))
                    .await;
            }
            RoapMessageType::Offer if self.state == NegotiationState::Idle => {
                self.negotiation.adopt_remote_seq(message.seq);
                let epoch = self.negotiation.bump_epoch();
                self.transition(NegotiationState::SettingRemoteOffer);
                let desc = SessionDescription::offer(message.sdp.clone().unwrap_or_default());
                self.spawn_apply_remote_offer(epoch, desc);
            }
            RoapMessageType::OfferRequest if self.state == NegotiationState::Idle => {
                self.negotiation.adopt_remote_seq(message.seq);
                let epoch = self.negotiation.bump_epoch();
                self.transition(NegotiationState::HandlingOfferRequest);
                self.spawn_offer_request_chain(epoch);
            }
            RoapMessageType::Answer if self.state == NegotiationState::WaitingForAnswer => {
                let epoch = self.negotiation.bump_epoch();
                self.transition(NegotiationState::SettingRemoteAnswer);
                let desc = SessionDescription::answer(message.sdp.clone().unwrap_or_default());
                self.spawn_apply_remote_answer(epoch, desc);
            }
            RoapMessageType::Ok if self.state == NegotiationState::WaitingForOk => {
                self.negotiation.complete_exchange();
                self.negotiation.bump_epoch();
                self.transition(NegotiationState::Idle);
                info!(
                    session_id = %self.id,
                    seq = self.negotiation.seq,
                    "remote-initiated exchange completed"
                );
                self.drain_pending_offer();
            }
            other => {
                warn!(
                    session_id = %self.id,
                    state = %self.state,
                    message_type = %other,
                    seq = message.seq,
                    "message type not acceptable in current state"
                );
                self.emit_message(RoapMessage::error(
                    RoapErrorKind::InvalidState,
                    message.seq,
                ))
                .await;
            }
        }
        Ok(())
    }

    async fn handle_inbound_error(&mut self, message: &RoapMessage) {
        // Validation guarantees errorType is present on ERROR.
        let Some(kind) = message.error_type else {
            return;
        };

        if self.state == NegotiationState::Idle || message.seq != self.negotiation.seq {
            debug!(
                session_id = %self.id,
                state = %self.state,
                seq = message.seq,
                error_type = %kind,
                "ignoring ERROR outside the in-flight exchange"
            );
            return;
        }

        match self.state {
            NegotiationState::WaitingForAnswer | NegotiationState::SettingRemoteAnswer
                if kind.is_retryable() =>
            {
                if self.negotiation.retry_count >= MAX_OFFER_RETRIES {
                    warn!(
                        session_id = %self.id,
                        seq = self.negotiation.seq,
                        error_type = %kind,
                        "offer retry budget exhausted"
                    );
                    self.fail_remote(format!("retry budget exhausted after {kind}"))
                        .await;
                    return;
                }
                self.retry_last_offer(kind).await;
            }
            NegotiationState::WaitingForAnswer
            | NegotiationState::SettingRemoteAnswer
            | NegotiationState::WaitingForOk => {
                warn!(
                    session_id = %self.id,
                    state = %self.state,
                    error_type = %kind,
                    "unrecoverable error from peer"
                );
                self.fail_remote(format!("peer reported {kind}")).await;
            }
            _ => {
                debug!(
                    session_id = %self.id,
                    state = %self.state,
                    error_type = %kind,
                    "ERROR received while not waiting, ignored"
                );
            }
        }
    }

    /// Re-emit the cached offer under `seq + 1`. The browser primitives
    /// are not re-invoked; the previous munged SDP and tie-breaker are
    /// reused verbatim.
    async fn retry_last_offer(&mut self, kind: RoapErrorKind) {
        let (sdp, tie_breaker) = match (
            self.negotiation.last_offer_sdp.clone(),
            self.negotiation.last_offer_tie_breaker,
        ) {
            (Some(sdp), Some(tb)) => (sdp, tb),
            _ => {
                error!(
                    session_id = %self.id,
                    state = %self.state,
                    "retryable ERROR but no cached offer to replay"
                );
                self.fail_remote("no cached offer available for retry".to_string())
                    .await;
                return;
            }
        };

        self.negotiation.retry_count += 1;
        self.negotiation.seq += 1;
        let epoch = self.negotiation.bump_epoch();
        debug!(
            session_id = %self.id,
            seq = self.negotiation.seq,
            retry = self.negotiation.retry_count,
            error_type = %kind,
            "re-emitting offer after retryable error"
        );
        self.emit_message(RoapMessage::offer(self.negotiation.seq, sdp, tie_breaker))
            .await;
        if self.state == NegotiationState::SettingRemoteAnswer {
            self.transition(NegotiationState::WaitingForAnswer);
        }
        self.arm_timeout(epoch);
    }

    // ---- chain-outcome handlers ------------------------------------

    fn handle_offer_created(&mut self, epoch: u64, description: SessionDescription) {
        if self.is_stale(epoch) || self.state != NegotiationState::CreatingLocalOffer {
            return;
        }
        self.transition(NegotiationState::SettingLocalOffer);
        self.spawn_apply_local_offer(epoch, description);
    }

    async fn handle_local_offer_ready(&mut self, epoch: u64, sdp: String) {
        if self.is_stale(epoch) || self.state != NegotiationState::SettingLocalOffer {
            return;
        }
        self.negotiation.cache_offer(sdp.clone(), LOCAL_TIE_BREAKER);
        self.emit_message(RoapMessage::offer(
            self.negotiation.seq,
            sdp,
            LOCAL_TIE_BREAKER,
        ))
        .await;
        self.transition(NegotiationState::WaitingForAnswer);
        self.arm_timeout(epoch);
    }

    async fn handle_offer_response_ready(&mut self, epoch: u64, sdp: String) {
        if self.is_stale(epoch) || self.state != NegotiationState::HandlingOfferRequest {
            return;
        }
        self.negotiation.cache_offer(sdp.clone(), LOCAL_TIE_BREAKER);
        self.emit_message(RoapMessage::offer_response(self.negotiation.seq, sdp))
            .await;
        self.transition(NegotiationState::WaitingForAnswer);
        self.arm_timeout(epoch);
    }

    fn handle_remote_offer_applied(&mut self, epoch: u64) {
        if self.is_stale(epoch) || self.state != NegotiationState::SettingRemoteOffer {
            return;
        }
        self.transition(NegotiationState::CreatingLocalAnswer);
        self.spawn_answer_chain(epoch);
    }

    async fn handle_local_answer_ready(&mut self, epoch: u64, sdp: String) {
        if self.is_stale(epoch) || self.state != NegotiationState::CreatingLocalAnswer {
            return;
        }
        self.emit_message(RoapMessage::answer(self.negotiation.seq, sdp))
            .await;
        self.transition(NegotiationState::WaitingForOk);
        self.arm_timeout(epoch);
    }

    async fn handle_remote_answer_applied(&mut self, epoch: u64) {
        if self.is_stale(epoch) || self.state != NegotiationState::SettingRemoteAnswer {
            return;
        }
        self.emit_message(RoapMessage::ok(self.negotiation.seq)).await;
        self.negotiation.complete_exchange();
        self.transition(NegotiationState::Idle);
        info!(
            session_id = %self.id,
            seq = self.negotiation.seq,
            "local-initiated exchange completed"
        );
        self.drain_pending_offer();
    }

    async fn handle_primitive_failed(&mut self, epoch: u64, op: PeerOp, reason: String) {
        if self.is_stale(epoch) || self.state.is_terminal() {
            return;
        }
        error!(
            session_id = %self.id,
            state = %self.state,
            op = %op,
            reason = %reason,
            "peer-connection primitive rejected"
        );
        self.emit_message(RoapMessage::error(
            RoapErrorKind::Failed,
            self.negotiation.seq,
        ))
        .await;
        self.transition(NegotiationState::BrowserError);
        self.emit_failure(format!("{op} failed: {reason}")).await;
    }

    async fn handle_timeout(&mut self, epoch: u64) {
        if self.is_stale(epoch) || !self.state.is_waiting() {
            return;
        }
        warn!(
            session_id = %self.id,
            state = %self.state,
            seq = self.negotiation.seq,
            "timed out waiting for peer"
        );
        self.emit_message(RoapMessage::error(
            RoapErrorKind::Timeout,
            self.negotiation.seq,
        ))
        .await;
        self.fail_remote("timed out waiting for peer".to_string())
            .await;
    }

    // ---- exchange plumbing -----------------------------------------

    fn start_local_offer(&mut self) {
        let seq = self.negotiation.begin_local_exchange();
        let epoch = self.negotiation.bump_epoch();
        debug!(session_id = %self.id, seq, "starting local offer exchange");
        self.transition(NegotiationState::CreatingLocalOffer);
        self.spawn_create_offer(epoch);
    }

    fn drain_pending_offer(&mut self) {
        if self.negotiation.pending_local_offer {
            self.negotiation.pending_local_offer = false;
            debug!(session_id = %self.id, "starting queued renegotiation");
            self.start_local_offer();
        }
    }

    fn is_stale(&self, epoch: u64) -> bool {
        if epoch != self.negotiation.epoch {
            trace!(
                session_id = %self.id,
                stale = epoch,
                current = self.negotiation.epoch,
                "dropping stale chain outcome"
            );
            return true;
        }
        false
    }

    fn transition(&mut self, to: NegotiationState) {
        if let Err(e) = validate_transition(self.state, to) {
            error!(session_id = %self.id, error = %e, "rejected state transition");
            return;
        }
        debug!(
            session_id = %self.id,
            from = %self.state,
            to = %to,
            "state transition"
        );
        self.state = to;
    }

    async fn emit_message(&self, message: RoapMessage) {
        let message = message.with_session_ids(&self.negotiation.session_ids);
        if self
            .events
            .send(RoapEvent::MessageToSend { message })
            .await
            .is_err()
        {
            debug!(session_id = %self.id, "event receiver dropped, message discarded");
        }
    }

    async fn emit_failure(&self, reason: String) {
        warn!(session_id = %self.id, state = %self.state, reason = %reason, "negotiation failed");
        if self
            .events
            .send(RoapEvent::Failure {
                state: self.state,
                reason,
            })
            .await
            .is_err()
        {
            debug!(session_id = %self.id, "event receiver dropped, failure discarded");
        }
    }

    async fn fail_remote(&mut self, reason: String) {
        self.transition(NegotiationState::RemoteError);
        self.emit_failure(reason).await;
    }

    // ---- spawned chains --------------------------------------------

    fn spawn_create_offer(&self, epoch: u64) {
        let peer = self.peer.clone();
        let Some(tx) = self.commands.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let cmd = match peer.create_offer().await {
                Ok(description) => SessionCommand::OfferCreated { epoch, description },
                Err(reason) => SessionCommand::PrimitiveFailed {
                    epoch,
                    op: PeerOp::CreateOffer,
                    reason,
                },
            };
            let _ = tx.send(cmd).await;
        });
    }

    fn spawn_apply_local_offer(&self, epoch: u64, description: SessionDescription) {
        let peer = self.peer.clone();
        let munger = self.munger.clone();
        let Some(tx) = self.commands.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let cmd = match apply_and_munge_local(&*peer, &*munger, description).await {
                Ok(sdp) => SessionCommand::LocalOfferReady { epoch, sdp },
                Err((op, reason)) => SessionCommand::PrimitiveFailed { epoch, op, reason },
            };
            let _ = tx.send(cmd).await;
        });
    }

    fn spawn_offer_request_chain(&self, epoch: u64) {
        let peer = self.peer.clone();
        let munger = self.munger.clone();
        let Some(tx) = self.commands.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let cmd = match peer.create_offer().await {
                Ok(description) => {
                    match apply_and_munge_local(&*peer, &*munger, description).await {
                        Ok(sdp) => SessionCommand::OfferResponseReady { epoch, sdp },
                        Err((op, reason)) => SessionCommand::PrimitiveFailed { epoch, op, reason },
                    }
                }
                Err(reason) => SessionCommand::PrimitiveFailed {
                    epoch,
                    op: PeerOp::CreateOffer,
                    reason,
                },
            };
            let _ = tx.send(cmd).await;
        });
    }

    fn spawn_apply_remote_offer(&self, epoch: u64, description: SessionDescription) {
        let peer = self.peer.clone();
        let Some(tx) = self.commands.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let cmd = match peer.set_remote_description(description).await {
                Ok(()) => SessionCommand::RemoteOfferApplied { epoch },
                Err(reason) => SessionCommand::PrimitiveFailed {
                    epoch,
                    op: PeerOp::SetRemoteDescription,
                    reason,
                },
            };
            let _ = tx.send(cmd).await;
        });
    }

    fn spawn_apply_remote_answer(&self, epoch: u64, description: SessionDescription) {
        let peer = self.peer.clone();
        let Some(tx) = self.commands.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let cmd = match peer.set_remote_description(description).await {
                Ok(()) => SessionCommand::RemoteAnswerApplied { epoch },
                Err(reason) => SessionCommand::PrimitiveFailed {
                    epoch,
                    op: PeerOp::SetRemoteDescription,
                    reason,
                },
            };
            let _ = tx.send(cmd).await;
        });
    }

    fn spawn_answer_chain(&self, epoch: u64) {
        let peer = self.peer.clone();
        let munger = self.munger.clone();
        let Some(tx) = self.commands.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let cmd = match peer.create_answer().await {
                Ok(description) => {
                    match apply_and_munge_local(&*peer, &*munger, description).await {
                        Ok(sdp) => SessionCommand::LocalAnswerReady { epoch, sdp },
                        Err((op, reason)) => SessionCommand::PrimitiveFailed { epoch, op, reason },
                    }
                }
                Err(reason) => SessionCommand::PrimitiveFailed {
                    epoch,
                    op: PeerOp::CreateAnswer,
                    reason,
                },
            };
            let _ = tx.send(cmd).await;
        });
    }

    fn arm_timeout(&self, epoch: u64) {
        let Some(timeout) = self.config.negotiation_timeout else {
            return;
        };
        let Some(tx) = self.commands.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx
                .send(SessionCommand::NegotiationTimedOut { epoch })
                .await;
        });
    }
}

/// Apply a freshly created local description, read it back, and run the
/// munger over it.
async fn apply_and_munge_local(
    peer: &dyn PeerConnectionOps,
    munger: &dyn SdpMunger,
    description: SessionDescription,
) -> Result<String, (PeerOp, String)> {
    peer.set_local_description(description)
        .await
        .map_err(|reason| (PeerOp::SetLocalDescription, reason))?;

    let applied = peer.local_description().await.ok_or_else(|| {
        (
            PeerOp::SetLocalDescription,
            "no local description after set".to_string(),
        )
    })?;

    let munged = munger
        .process_local_sdp(applied.sdp)
        .await
        .map_err(|reason| (PeerOp::ProcessLocalSdp, reason))?;

    Ok(munged.sdp)
}
