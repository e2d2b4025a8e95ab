//! Lifecycle and input queue of a control's event loop task

use parking_lot::Mutex;
use std::future::Future;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::warn;

use super::{ControlKey, TURN_QUEUE_CAPACITY};

/// Event fed into a control loop
///
/// Surface input and radio confirmations share one queue so the loop sees
/// them in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlInput {
    /// Raw position or turn delta from the surface
    Changed(i32),
    /// Value confirmed by the radio
    Confirmed(i64),
}

/// Stop signal, input queue and join handle of one control loop
pub(crate) struct ControlTask {
    key: ControlKey,
    input: mpsc::Sender<ControlInput>,
    stop: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ControlTask {
    /// Spawn a loop; it must exit once the stop receiver changes or the input queue closes
    pub(crate) fn spawn<F, Fut>(key: ControlKey, run: F) -> Self
    where
        F: FnOnce(mpsc::Receiver<ControlInput>, watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (input, input_rx) = mpsc::channel(TURN_QUEUE_CAPACITY);
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run(input_rx, stop_rx));
        Self {
            key,
            input,
            stop,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub(crate) fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Queue an input without waiting; dropped once the control is closed
    pub(crate) fn push(&self, input: ControlInput) {
        if self.is_stopped() {
            return;
        }
        if let Err(mpsc::error::TrySendError::Full(input)) = self.input.try_send(input) {
            warn!("⚠️  Input queue of {} full, dropping {:?}", self.key, input);
        }
    }

    /// Signal the loop to stop and wait until it has exited
    ///
    /// Calling it again after the loop is gone returns immediately.
    pub(crate) async fn close(&self) {
        self.stop.send_replace(true);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Control loop of {} ended abnormally: {}", self.key, e);
            }
        }
    }
}
