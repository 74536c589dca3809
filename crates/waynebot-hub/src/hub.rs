// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-owner broadcast hub.
//!
//! One task owns the set of sinks. Registration, removal, broadcasts and
//! count queries arrive on a bounded command queue and are handled in
//! arrival order, so a count query observes every broadcast sent before it.
//! After each fan-out the owner bumps a `watch` counter that actors use as
//! their coalesced wake signal.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use waynebot_core::{Event, WaynebotError};

/// Capacity of the hub's incoming command queue.
pub const HUB_QUEUE_SIZE: usize = 256;

/// Capacity of each sink's outbound queue.
pub const SINK_QUEUE_SIZE: usize = 256;

pub type SinkId = u64;

/// Coalesced wake signal. `changed()` resolves once after any number of
/// broadcasts since the last `borrow_and_update()`.
pub type WakeReceiver = watch::Receiver<u64>;

/// A registered sink's receiving half.
///
/// `outbound` yields serialized events in broadcast order and ends when the
/// hub drops the sink (unregister, slow consumer, or stop).
pub struct Subscription {
    pub id: SinkId,
    pub outbound: mpsc::Receiver<Arc<str>>,
}

enum Command {
    Register {
        id: SinkId,
        outbound: mpsc::Sender<Arc<str>>,
    },
    Unregister(SinkId),
    Broadcast(Event),
    ClientCount(oneshot::Sender<usize>),
}

/// Handle to the hub. Clones share the same owner task.
#[derive(Clone)]
pub struct Hub {
    commands: mpsc::Sender<Command>,
    wake: Arc<watch::Sender<u64>>,
    next_id: Arc<AtomicU64>,
    done: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Hub {
    /// Spawn the owner task. Must be called inside a Tokio runtime.
    pub fn start() -> Self {
        let (commands, rx) = mpsc::channel(HUB_QUEUE_SIZE);
        let (wake, _) = watch::channel(0u64);
        let wake = Arc::new(wake);
        let done = CancellationToken::new();

        let owner = Owner {
            clients: HashMap::new(),
            wake: Arc::clone(&wake),
        };
        let task = tokio::spawn(owner.run(rx, done.clone()));

        Self {
            commands,
            wake,
            next_id: Arc::new(AtomicU64::new(1)),
            done,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Register a new sink with a bounded outbound queue.
    pub async fn register(&self) -> Result<Subscription, WaynebotError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SINK_QUEUE_SIZE);
        self.commands
            .send(Command::Register { id, outbound: tx })
            .await
            .map_err(|_| WaynebotError::Internal("hub is stopped".into()))?;
        Ok(Subscription { id, outbound: rx })
    }

    /// Remove a sink and close its outbound queue. Unknown ids are ignored.
    pub async fn unregister(&self, id: SinkId) {
        let _ = self.commands.send(Command::Unregister(id)).await;
    }

    /// Offer an event for fan-out. Never blocks; drops the event when the
    /// hub's queue is full.
    pub fn broadcast(&self, event: Event) {
        match self.commands.try_send(Command::Broadcast(event)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("broadcast channel full, dropping event"),
            Err(TrySendError::Closed(_)) => debug!("hub stopped, dropping event"),
        }
    }

    /// Number of registered sinks, as seen after every earlier command.
    pub async fn client_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::ClientCount(tx)).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// A new wake receiver. Its current value counts as already seen.
    pub fn wake_receiver(&self) -> WakeReceiver {
        self.wake.subscribe()
    }

    /// Stop the owner task, closing every sink's queue, and wait for it.
    pub async fn stop(&self) {
        self.done.cancel();
        let task = self.task.lock().ok().and_then(|mut t| t.take());
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

struct Owner {
    clients: HashMap<SinkId, mpsc::Sender<Arc<str>>>,
    wake: Arc<watch::Sender<u64>>,
}

impl Owner {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>, done: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = done.cancelled() => break,
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
            }
        }
        self.clients.clear();
        debug!("hub shutting down");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Register { id, outbound } => {
                self.clients.insert(id, outbound);
                debug!(sink = id, clients = self.clients.len(), "sink registered");
            }
            Command::Unregister(id) => {
                if self.clients.remove(&id).is_some() {
                    debug!(sink = id, clients = self.clients.len(), "sink unregistered");
                }
            }
            Command::Broadcast(event) => self.fan_out(&event),
            Command::ClientCount(reply) => {
                let _ = reply.send(self.clients.len());
            }
        }
    }

    fn fan_out(&mut self, event: &Event) {
        let payload: Arc<str> = match serde_json::to_string(event) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                warn!(error = %e, event_type = %event.event_type, "failed to serialize event");
                return;
            }
        };

        self.clients
            .retain(|id, outbound| match outbound.try_send(Arc::clone(&payload)) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(sink = *id, "sink queue full, dropping slow consumer");
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            });

        self.wake.send_modify(|n| *n = n.wrapping_add(1));
    }
}
