//! One-slot delivery stage
//!
//! Each stateful control owns a [`Delivery`]: a dedicated task that performs the
//! actual outbound call. Handing a value over never blocks; it is refused while
//! the previous value is still being sent, and the control simply retries with
//! its newest value on the next tick. This gives at most one command in flight
//! per control without any unbounded queueing.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace, warn};

use super::ControlKey;

/// Destination of a control's coalesced value
#[async_trait]
pub trait ValueSink<T>: Send + Sync {
    async fn set(&self, value: T) -> Result<()>;
}

/// Handle to a control's delivery task
///
/// Dropping the handle lets the task finish its current send and exit.
pub struct Delivery<T> {
    tx: mpsc::Sender<(T, OwnedSemaphorePermit)>,
    slot: Arc<Semaphore>,
}

impl<T> Delivery<T>
where
    T: Copy + fmt::Debug + Send + 'static,
{
    /// Spawn the delivery task for one control
    pub fn spawn(key: ControlKey, sink: Arc<dyn ValueSink<T>>) -> Self {
        let (tx, mut rx) = mpsc::channel::<(T, OwnedSemaphorePermit)>(1);

        tokio::spawn(async move {
            while let Some((value, permit)) = rx.recv().await {
                trace!("📤 {} → {:?}", key, value);
                if let Err(e) = sink.set(value).await {
                    warn!("⚠️  Command {:?} for {} dropped: {:#}", value, key, e);
                }
                // Freeing the slot only after the call returned keeps one command in flight
                drop(permit);
            }
            debug!("Delivery stage for {} stopped", key);
        });

        Self {
            tx,
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    /// Try to hand a value to the delivery task without waiting
    ///
    /// Returns false while the previous value is still being delivered.
    pub fn try_hand_off(&self, value: T) -> bool {
        let Ok(permit) = self.slot.clone().try_acquire_owned() else {
            return false;
        };
        self.tx.try_send((value, permit)).is_ok()
    }

    /// Whether a send is currently in flight
    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.slot.available_permits() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::testing::RecordingSink;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_hand_off_refused_while_busy() {
        let sink = Arc::new(RecordingSink::<i32>::with_latency(Duration::from_millis(30)));
        let delivery = Delivery::spawn(ControlKey::new(0, 1), sink.clone());

        assert!(delivery.try_hand_off(1));
        assert!(delivery.is_busy());
        assert!(!delivery.try_hand_off(2));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!delivery.is_busy());
        assert!(delivery.try_hand_off(3));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(sink.values(), vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_frees_slot() {
        let sink = Arc::new(RecordingSink::<i32>::failing());
        let delivery = Delivery::spawn(ControlKey::new(0, 2), sink.clone());

        assert!(delivery.try_hand_off(-10));
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(!delivery.is_busy());
        assert!(delivery.try_hand_off(-20));
        tokio::time::sleep(Duration::from_millis(1)).await;

        // Failed commands are not retried
        assert_eq!(sink.values(), vec![-10, -20]);
    }
}
