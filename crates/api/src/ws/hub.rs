//! Registry of connected dashboard clients.
//!
//! Each client gets a bounded outbound queue. A client that stops draining
//! it never slows the relay down: frames that do not fit are dropped and
//! counted, and the client is told how many it missed with a
//! [`LiveMessage::Lagged`] frame as soon as its queue has room again.

use std::collections::HashMap;

use axum::extract::ws::Message;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::ws::frames::LiveMessage;

/// Outbound frames buffered per client before frames start being dropped.
pub const CLIENT_QUEUE_CAPACITY: usize = 256;

struct Client {
    sender: mpsc::Sender<Message>,
    /// Frames dropped since this client last received one.
    skipped: u64,
}

enum Delivery {
    Sent,
    Dropped,
    Gone,
}

impl Client {
    fn deliver(&mut self, frame: Message) -> Delivery {
        if self.skipped > 0 {
            let notice = LiveMessage::Lagged {
                skipped: self.skipped,
            };
            match notice.to_frame().map(|notice| self.sender.try_send(notice)) {
                Some(Ok(())) | None => self.skipped = 0,
                Some(Err(TrySendError::Full(_))) => {
                    self.skipped += 1;
                    return Delivery::Dropped;
                }
                Some(Err(TrySendError::Closed(_))) => return Delivery::Gone,
            }
        }
        match self.sender.try_send(frame) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => {
                self.skipped += 1;
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => Delivery::Gone,
        }
    }
}

/// Connected dashboards, keyed by a per-connection id.
pub struct DashboardHub {
    clients: Mutex<HashMap<Uuid, Client>>,
    capacity: usize,
}

impl DashboardHub {
    pub fn new() -> Self {
        Self::with_capacity(CLIENT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Add a client. The receiver feeds its socket writer.
    pub fn register(&self) -> (Uuid, mpsc::Receiver<Message>) {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = Uuid::new_v4();
        self.clients.lock().insert(id, Client { sender, skipped: 0 });
        (id, receiver)
    }

    pub fn unregister(&self, id: &Uuid) {
        self.clients.lock().remove(id);
    }

    /// Queue `message` for one client. Returns `false` if the client is
    /// unknown or the frame was dropped.
    pub fn send_to(&self, id: &Uuid, message: &LiveMessage) -> bool {
        let Some(frame) = message.to_frame() else {
            return false;
        };
        let mut clients = self.clients.lock();
        let Some(client) = clients.get_mut(id) else {
            return false;
        };
        match client.deliver(frame) {
            Delivery::Sent => true,
            Delivery::Dropped => false,
            Delivery::Gone => {
                clients.remove(id);
                false
            }
        }
    }

    /// Queue `message` for every client. Returns how many clients got it.
    pub fn push(&self, message: &LiveMessage) -> usize {
        let Some(frame) = message.to_frame() else {
            return 0;
        };

        let mut delivered = 0;
        self.clients.lock().retain(|id, client| match client.deliver(frame.clone()) {
            Delivery::Sent => {
                delivered += 1;
                true
            }
            Delivery::Dropped => {
                tracing::debug!(client_id = %id, skipped = client.skipped, "Dashboard lagging");
                true
            }
            Delivery::Gone => false,
        });
        delivered
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Queue a Close frame for every client and forget them all. Returns
    /// how many clients were connected.
    pub fn close_all(&self) -> usize {
        let clients = std::mem::take(&mut *self.clients.lock());
        for client in clients.values() {
            let _ = client.sender.try_send(Message::Close(None));
        }
        clients.len()
    }
}

impl Default for DashboardHub {
    fn default() -> Self {
        Self::new()
    }
}
