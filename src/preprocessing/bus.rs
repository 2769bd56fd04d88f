//! In-process message bus between the preprocessing manager and its clients.
//!
//! Each [`BusConnection`] is one client: a poller, a worker or a test caller. The manager
//! owns the single event receiver and learns about connects, payloads and disconnects
//! through [`BusEvent`]s. Payloads are opaque bytes; see [`super::Message`].

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

use super::Message;
use crate::errors::BusError;

pub type ClientId = u64;

#[derive(Debug)]
pub enum BusEvent {
    Connected {
        client_id: ClientId,
        sender: UnboundedSender<Vec<u8>>,
    },
    Message {
        client_id: ClientId,
        payload: Vec<u8>,
    },
    Disconnected {
        client_id: ClientId,
    },
}

/// Cloneable connector handed to anything that talks to the manager.
#[derive(Clone, Debug)]
pub struct MessageBus {
    events: UnboundedSender<BusEvent>,
    next_client_id: Arc<AtomicU64>,
}

impl MessageBus {
    pub fn new() -> (Self, UnboundedReceiver<BusEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                events,
                next_client_id: Arc::new(AtomicU64::new(1)),
            },
            rx,
        )
    }

    pub fn connect(&self) -> Result<BusConnection, BusError> {
        let client_id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let (sender, inbox) = mpsc::unbounded_channel();
        self.events
            .send(BusEvent::Connected { client_id, sender })
            .map_err(|_| BusError::Closed)?;
        trace!("bus client {} connected", client_id);

        Ok(BusConnection {
            client_id,
            events: self.events.clone(),
            inbox,
        })
    }
}

/// One client's end of the bus. Dropping it reports the disconnect to the manager.
#[derive(Debug)]
pub struct BusConnection {
    client_id: ClientId,
    events: UnboundedSender<BusEvent>,
    inbox: UnboundedReceiver<Vec<u8>>,
}

impl BusConnection {
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn send(
        &self,
        message: &Message,
    ) -> Result<(), BusError> {
        let payload = message.encode()?;
        self.events
            .send(BusEvent::Message {
                client_id: self.client_id,
                payload,
            })
            .map_err(|_| BusError::Closed)
    }

    /// Waits for the next message addressed to this client.
    pub async fn recv(&mut self) -> Result<Message, BusError> {
        match self.inbox.recv().await {
            Some(payload) => Message::decode(&payload),
            None => Err(BusError::Closed),
        }
    }
}

impl Drop for BusConnection {
    fn drop(&mut self) {
        let _ = self.events.send(BusEvent::Disconnected {
            client_id: self.client_id,
        });
    }
}
