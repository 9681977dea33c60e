//! ROAP session coordinator
//!
//! [`RoapSession`] is the public handle over the negotiation engine. It
//! forwards inputs into the session loop through an internal command
//! queue; the loop owns every piece of mutable state, so the machine is
//! never reentered concurrently and each inbound message finishes its
//! transition before the next one is processed.
//!
//! The returned futures resolve when the input has been admitted, not
//! when any resulting outbound message has been sent; downstream
//! failures surface through [`RoapEvent::Failure`].
//!
//! [`RoapEvent::Failure`]: crate::events::RoapEvent

mod commands;
mod runner;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::errors::{RoapError, RoapResult};
use crate::events::RoapEvent;
use crate::peer::PeerConnectionOps;
use crate::protocol::RoapMessage;
use crate::sdp::SdpMunger;

use commands::SessionCommand;
use runner::SessionRunner;

const COMMAND_QUEUE_DEPTH: usize = 64;
const EVENT_QUEUE_DEPTH: usize = 64;

/// Correlation identifier for a session, used in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandleId(pub Uuid);

impl SessionHandleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionHandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionHandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "roap-{}", self.0)
    }
}

/// Session tuning knobs.
#[derive(Debug, Clone, Default)]
pub struct RoapConfig {
    /// Give up on `waitingForAnswer` / `waitingForOk` after this long.
    /// Expiry emits `ERROR(TIMEOUT)` to the peer and terminates the
    /// engine. `None` disables the timer.
    pub negotiation_timeout: Option<Duration>,
}

/// Handle to a running ROAP negotiation engine.
///
/// Constructed per peer connection. Cloning is cheap; all clones feed
/// the same engine. Dropping the last handle tears the engine down.
#[derive(Debug, Clone)]
pub struct RoapSession {
    id: SessionHandleId,
    commands: mpsc::Sender<SessionCommand>,
}

impl RoapSession {
    /// Spawn the session loop over the given peer connection and munger.
    /// The returned receiver carries the outbound [`RoapEvent`] stream.
    pub fn new(
        peer: Arc<dyn PeerConnectionOps>,
        munger: Arc<dyn SdpMunger>,
        config: RoapConfig,
    ) -> (Self, mpsc::Receiver<RoapEvent>) {
        let id = SessionHandleId::new();
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        let runner = SessionRunner::new(
            id.clone(),
            config,
            peer,
            munger,
            event_tx,
            cmd_tx.downgrade(),
        );
        tokio::spawn(runner.run(cmd_rx));

        (
            Self {
                id,
                commands: cmd_tx,
            },
            event_rx,
        )
    }

    pub fn id(&self) -> &SessionHandleId {
        &self.id
    }

    /// Request a new local offer/answer exchange.
    ///
    /// Resolves once the engine has accepted the request: started a
    /// fresh exchange, restarted an in-progress creation, or queued the
    /// renegotiation behind the in-flight exchange.
    pub async fn initiate_offer(&self) -> RoapResult<()> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(SessionCommand::InitiateOffer { ack })
            .await
            .map_err(|_| RoapError::SessionClosed)?;
        done.await.map_err(|_| RoapError::SessionClosed)?
    }

    /// Deliver an inbound ROAP message from the peer.
    ///
    /// Resolves once the message has been admitted to the state machine.
    pub async fn roap_message_received(&self, message: RoapMessage) -> RoapResult<()> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(SessionCommand::MessageReceived { message, ack })
            .await
            .map_err(|_| RoapError::SessionClosed)?;
        done.await.map_err(|_| RoapError::SessionClosed)?
    }

    /// Shut the session down. Idempotent; pending timers and primitive
    /// chains are invalidated and later inputs return
    /// [`RoapError::SessionClosed`].
    pub async fn close(&self) {
        let (ack, done) = oneshot::channel();
        if self
            .commands
            .send(SessionCommand::Close { ack })
            .await
            .is_ok()
        {
            let _ = done.await;
        }
    }
}
