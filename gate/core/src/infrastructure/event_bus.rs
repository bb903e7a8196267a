// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Gate Event Bus - broadcast fan-out of GateEvents
//
// In-memory only. Slow subscribers lose the oldest events once the channel
// capacity is exceeded and observe EventBusError::Lagged.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::events::{GateEvent, GateObserver};
use crate::domain::protection_domain::GateId;

/// Observer that republishes every gate event on a broadcast channel
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<GateEvent>>,
}

impl EventBus {
    /// Create an event bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish(&self, event: GateEvent) {
        debug!(gate_id = %event.gate_id(), "Publishing gate event");
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to gate events");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            gate_id: None,
        }
    }

    /// Subscribe to events of a single gate only
    pub fn subscribe_gate(&self, gate_id: GateId) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            gate_id: Some(gate_id),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl GateObserver for EventBus {
    fn on_event(&self, event: &GateEvent) {
        self.publish(event.clone());
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<GateEvent>,
    gate_id: Option<GateId>,
}

impl EventReceiver {
    /// Wait for the next matching event
    pub async fn recv(&mut self) -> Result<GateEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => EventBusError::Closed,
                broadcast::error::RecvError::Lagged(n) => {
                    warn!("Event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Next matching event if one is already buffered
    pub fn try_recv(&mut self) -> Result<GateEvent, EventBusError> {
        loop {
            let event = self.receiver.try_recv().map_err(|e| match e {
                broadcast::error::TryRecvError::Empty => EventBusError::Empty,
                broadcast::error::TryRecvError::Closed => EventBusError::Closed,
                broadcast::error::TryRecvError::Lagged(n) => {
                    warn!("Event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    fn matches(&self, event: &GateEvent) -> bool {
        self.gate_id.map_or(true, |id| event.gate_id() == id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}
