//! Marshals events from the worker thread onto the async runtime.
//!
//! The worker never touches the hub. It pushes [`Envelope`]s into an
//! unbounded queue; a single drain task publishes them in arrival order.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use taskpilot_core::Event;

use crate::hub::{BroadcastHub, Subscription};

pub(crate) enum Envelope {
    Event(Event),
    /// Register a subscriber at this point of the event order.
    Subscribe {
        greeting: Option<Event>,
        reply: oneshot::Sender<Subscription>,
    },
}

/// Producer side of the bridge. Cheap to clone and safe to use from any
/// thread; sending never blocks.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl EventSink {
    /// Queue an event for publication. Dropped with a warning once the
    /// bridge has shut down.
    pub fn emit(&self, event: Event) {
        let event_type = event.type_name();
        if self.tx.send(Envelope::Event(event)).is_err() {
            warn!(event_type = %event_type, "Event bridge closed, dropping event");
        }
    }

    pub(crate) fn subscribe(
        &self,
        greeting: Option<Event>,
    ) -> Option<oneshot::Receiver<Subscription>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope::Subscribe { greeting, reply })
            .ok()
            .map(|_| rx)
    }
}

/// The drain task feeding a [`BroadcastHub`].
pub struct EventBridge {
    sink: EventSink,
    close: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl EventBridge {
    /// Start draining into `hub`. Must be called within a tokio runtime.
    pub fn spawn(hub: Arc<BroadcastHub>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
        let (close, mut closed) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    envelope = rx.recv() => match envelope {
                        Some(envelope) => deliver(&hub, envelope).await,
                        None => break,
                    },
                    _ = &mut closed => {
                        // Sinks may outlive the bridge; refuse new envelopes
                        // and flush what is already queued.
                        rx.close();
                        while let Some(envelope) = rx.recv().await {
                            deliver(&hub, envelope).await;
                        }
                        break;
                    }
                }
            }
            debug!("Event bridge drained");
        });

        Self {
            sink: EventSink { tx },
            close,
            task,
        }
    }

    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    /// Stop accepting events, publish everything already queued and wait for
    /// the drain task to finish. Sinks still held elsewhere drop their
    /// events from now on.
    pub async fn shutdown(self) {
        let _ = self.close.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "Event bridge task ended abnormally");
        }
    }
}

async fn deliver(hub: &BroadcastHub, envelope: Envelope) {
    match envelope {
        Envelope::Event(event) => {
            let delivered = hub.publish(event).await;
            debug!(delivered, "Event published");
        }
        Envelope::Subscribe { greeting, reply } => {
            let subscription = hub.subscribe(greeting).await;
            if let Err(subscription) = reply.send(subscription) {
                hub.unsubscribe(subscription.id).await;
            }
        }
    }
}
