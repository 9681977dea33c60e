//! Media connection facade.

pub mod state;

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

use rtcsig_roap_core::{
    PeerConnectionOps, RoapConfig, RoapEvent, RoapMessage, RoapSession, SdpMunger,
};

use crate::errors::MediaResult;
use crate::events::MediaConnectionEvent;
use state::{aggregate_connection_state, ConnectionState, DtlsTransportState, IceTransportState};

const EVENT_QUEUE_DEPTH: usize = 32;

/// Facade tuning knobs.
#[derive(Debug, Clone, Default)]
pub struct MediaConnectionConfig {
    /// Settings handed to the underlying signaling session.
    pub roap: RoapConfig,
}

/// A peer connection paired with its ROAP signaling session.
///
/// Signaling events and connection-state changes arrive on the receiver
/// returned by [`MediaConnection::new`]. Cloning is cheap; all clones
/// drive the same connection.
#[derive(Clone)]
pub struct MediaConnection {
    session: RoapSession,
    events: mpsc::Sender<MediaConnectionEvent>,
    connection_state: Arc<Mutex<ConnectionState>>,
}

impl MediaConnection {
    /// Build the signaling session over `peer` and start forwarding its
    /// events.
    pub fn new(
        peer: Arc<dyn PeerConnectionOps>,
        munger: Arc<dyn SdpMunger>,
        config: MediaConnectionConfig,
    ) -> (Self, mpsc::Receiver<MediaConnectionEvent>) {
        let (session, mut roap_events) = RoapSession::new(peer, munger, config.roap);
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);

        let forward = event_tx.clone();
        let session_id = session.id().clone();
        tokio::spawn(async move {
            while let Some(event) = roap_events.recv().await {
                let mapped = match event {
                    RoapEvent::MessageToSend { message } => {
                        MediaConnectionEvent::RoapMessageToSend { message }
                    }
                    RoapEvent::Failure { state, reason } => {
                        MediaConnectionEvent::RoapFailure { state, reason }
                    }
                };
                if forward.send(mapped).await.is_err() {
                    break;
                }
            }
            debug!(session_id = %session_id, "signaling event stream ended");
        });

        (
            Self {
                session,
                events: event_tx,
                connection_state: Arc::new(Mutex::new(ConnectionState::New)),
            },
            event_rx,
        )
    }

    /// Kick off (or queue) a renegotiation.
    pub async fn initiate_offer(&self) -> MediaResult<()> {
        self.session.initiate_offer().await?;
        Ok(())
    }

    /// Deliver an inbound ROAP message from the remote peer.
    pub async fn roap_message_received(&self, message: RoapMessage) -> MediaResult<()> {
        self.session.roap_message_received(message).await?;
        Ok(())
    }

    /// The most recently aggregated connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.connection_state.lock().unwrap()
    }

    /// Feed observed transport states into the aggregate. Emits
    /// [`MediaConnectionEvent::ConnectionStateChanged`] only when the
    /// aggregate actually moves.
    pub async fn update_transport_states(
        &self,
        ice: IceTransportState,
        dtls: DtlsTransportState,
    ) -> ConnectionState {
        let aggregated = aggregate_connection_state(ice, dtls);
        let changed = {
            let mut current = self.connection_state.lock().unwrap();
            if *current == aggregated {
                false
            } else {
                debug!(
                    session_id = %self.session.id(),
                    from = %current,
                    to = %aggregated,
                    "connection state changed"
                );
                *current = aggregated;
                true
            }
        };
        if changed {
            let _ = self
                .events
                .send(MediaConnectionEvent::ConnectionStateChanged { state: aggregated })
                .await;
        }
        aggregated
    }

    /// Tear the signaling session down. Idempotent.
    pub async fn close(&self) {
        self.session.close().await;
    }
}
