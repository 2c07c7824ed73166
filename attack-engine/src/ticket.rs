//! Rendezvous channel handing tickets from the scheduler to idle workers
//!
//! A ticket authorises one chain traversal. It is only handed over once a
//! worker has announced it is idle, so sends block while every worker is
//! busy: that is the pool's admission control. Workers announce themselves
//! through a semaphore permit and then wait on a shared queue; the scheduler
//! consumes one permit per ticket it enqueues, so the queue never holds a
//! ticket nobody is waiting for.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Semaphore, TryAcquireError};

/// Admission token for one chain traversal.
#[derive(Debug)]
pub struct Ticket;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrySendError {
    /// No worker is idle right now.
    Full,
    /// Every receiver is gone.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendError;

/// Create a ticket channel with no idle workers registered.
pub fn channel() -> (TicketSender, TicketReceiver) {
    let idle = Arc::new(Semaphore::new(0));
    let (tx, rx) = mpsc::unbounded_channel();
    (
        TicketSender {
            idle: Arc::clone(&idle),
            tx,
        },
        TicketReceiver {
            idle,
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Scheduler side. Dropping it closes the channel.
#[derive(Debug)]
pub struct TicketSender {
    idle: Arc<Semaphore>,
    tx: mpsc::UnboundedSender<Ticket>,
}

impl TicketSender {
    /// Hand a ticket to an idle worker without waiting.
    pub fn try_send(&self) -> Result<(), TrySendError> {
        match self.idle.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.tx.send(Ticket).map_err(|_| TrySendError::Closed)
            }
            Err(TryAcquireError::NoPermits) => Err(TrySendError::Full),
            Err(TryAcquireError::Closed) => Err(TrySendError::Closed),
        }
    }

    /// Wait for an idle worker and hand it a ticket.
    pub async fn send(&self) -> Result<(), SendError> {
        let permit = self.idle.acquire().await.map_err(|_| SendError)?;
        permit.forget();
        self.tx.send(Ticket).map_err(|_| SendError)
    }
}

/// Worker side, shared by every worker in the pool.
#[derive(Debug, Clone)]
pub struct TicketReceiver {
    idle: Arc<Semaphore>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Ticket>>>,
}

impl TicketReceiver {
    /// Announce this worker as idle and wait for a ticket.
    ///
    /// Returns `None` once the sender is dropped and no ticket is pending.
    pub async fn recv(&self) -> Option<Ticket> {
        self.idle.add_permits(1);
        self.rx.lock().await.recv().await
    }
}
