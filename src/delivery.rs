//! Message delivery strategies between partitions.
//!
//! A producing partition writes into its own delivery object during a phase;
//! the coordinator flushes and drains every delivery before resolving the
//! phase's reduction, so all messages for a day are in their target's hands
//! before the barrier falls. Draining in ascending producer order makes the
//! overall delivery order deterministic even though no ordering is promised
//! between messages to different targets.

use serde::{Deserialize, Serialize};

/// A batch of messages addressed to one partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<M> {
    pub target: usize,
    pub messages: Vec<M>,
}

/// One contract over two transports: immediate per-message envelopes, or
/// per-target batches coalesced up to a size threshold.
pub trait Delivery<M>: Send {
    /// Hands one message to the transport.
    fn send(&mut self, target: usize, message: M);
    /// Seals any partially filled batches. Must be called before the
    /// enclosing reduction resolves.
    fn flush(&mut self);
    /// Takes every sealed envelope, in emission order.
    fn drain(&mut self) -> Vec<Envelope<M>>;
}

/// Sends each message on its own, preserving emission order exactly.
#[derive(Debug, Default)]
pub struct DirectDelivery<M> {
    outbox: Vec<Envelope<M>>,
}

impl<M> DirectDelivery<M> {
    #[must_use]
    pub fn new() -> DirectDelivery<M> {
        DirectDelivery { outbox: Vec::new() }
    }
}

impl<M: Send> Delivery<M> for DirectDelivery<M> {
    fn send(&mut self, target: usize, message: M) {
        self.outbox.push(Envelope {
            target,
            messages: vec![message],
        });
    }

    fn flush(&mut self) {}

    fn drain(&mut self) -> Vec<Envelope<M>> {
        std::mem::take(&mut self.outbox)
    }
}

/// Coalesces messages per target into batches of up to `capacity`, amortizing
/// per-message overhead. `flush` seals the remainders in ascending target
/// order.
#[derive(Debug)]
pub struct AggregatedDelivery<M> {
    capacity: usize,
    buffers: Vec<Vec<M>>,
    outbox: Vec<Envelope<M>>,
}

impl<M> AggregatedDelivery<M> {
    #[must_use]
    pub fn new(capacity: usize, num_targets: usize) -> AggregatedDelivery<M> {
        AggregatedDelivery {
            capacity: capacity.max(1),
            buffers: (0..num_targets).map(|_| Vec::new()).collect(),
            outbox: Vec::new(),
        }
    }
}

impl<M: Send> Delivery<M> for AggregatedDelivery<M> {
    fn send(&mut self, target: usize, message: M) {
        let buffer = &mut self.buffers[target];
        buffer.push(message);
        if buffer.len() >= self.capacity {
            self.outbox.push(Envelope {
                target,
                messages: std::mem::take(buffer),
            });
        }
    }

    fn flush(&mut self) {
        for (target, buffer) in self.buffers.iter_mut().enumerate() {
            if !buffer.is_empty() {
                self.outbox.push(Envelope {
                    target,
                    messages: std::mem::take(buffer),
                });
            }
        }
    }

    fn drain(&mut self) -> Vec<Envelope<M>> {
        std::mem::take(&mut self.outbox)
    }
}

/// Transport selection, chosen at partition construction from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeliveryMode {
    Direct,
    Aggregated { capacity: usize },
}

impl Default for DeliveryMode {
    fn default() -> Self {
        DeliveryMode::Direct
    }
}

impl DeliveryMode {
    /// Builds the delivery object for one producing partition.
    #[must_use]
    pub fn build<M: Send + 'static>(&self, num_targets: usize) -> Box<dyn Delivery<M>> {
        match self {
            DeliveryMode::Direct => Box::new(DirectDelivery::new()),
            DeliveryMode::Aggregated { capacity } => {
                Box::new(AggregatedDelivery::new(*capacity, num_targets))
            }
        }
    }
}
