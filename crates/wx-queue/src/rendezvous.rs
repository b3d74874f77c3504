//! Zero-buffer handoff between the scheduler and the insert workers.
//!
//! A receiver that is ready for work posts a one-shot reply slot on the
//! readiness queue. [`RendezvousSender::send`] waits for such a slot and
//! hands its value straight to that receiver, so nothing is ever buffered
//! between the two sides and the sender stalls while every receiver is busy.

use crate::{QueueError, QueueResult};
use tokio::sync::{mpsc, oneshot};

/// Sending half, owned by the scheduler
#[derive(Debug)]
pub struct RendezvousSender<T> {
    ready: mpsc::Receiver<oneshot::Sender<T>>,
}

/// Receiving half; clone one per worker
#[derive(Debug)]
pub struct RendezvousReceiver<T> {
    ready: mpsc::Sender<oneshot::Sender<T>>,
}

impl<T> Clone for RendezvousReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            ready: self.ready.clone(),
        }
    }
}

/// Create a rendezvous channel for up to `receivers` concurrently waiting receivers
pub fn channel<T>(receivers: usize) -> (RendezvousSender<T>, RendezvousReceiver<T>) {
    let (tx, rx) = mpsc::channel(receivers.max(1));
    (RendezvousSender { ready: rx }, RendezvousReceiver { ready: tx })
}

impl<T> RendezvousSender<T> {
    /// Block until some receiver takes `value`.
    ///
    /// Fails with [`QueueError::ChannelClosed`] once every receiver is gone.
    pub async fn send(&mut self, mut value: T) -> QueueResult<()> {
        loop {
            let slot = self.ready.recv().await.ok_or(QueueError::ChannelClosed)?;
            match slot.send(value) {
                Ok(()) => return Ok(()),
                // That receiver gave up waiting; offer the value to the next one
                Err(returned) => value = returned,
            }
        }
    }
}

impl<T> RendezvousReceiver<T> {
    /// Wait for the next value, or `None` once the sender is gone
    pub async fn recv(&self) -> Option<T> {
        let (slot, reply) = oneshot::channel();
        self.ready.send(slot).await.ok()?;
        reply.await.ok()
    }
}
