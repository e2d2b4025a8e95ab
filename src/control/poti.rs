//! Level control ("poti") - absolute faders and pots
//!
//! Raw positions are translated into the domain and coalesced: the loop only
//! hands the most recent value to the delivery stage once per tick. Confirmed
//! values from the radio become the new baseline unless a local change is
//! still waiting to go out, so the control never chases its own echo.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

use super::delivery::{Delivery, ValueSink};
use super::range::{ValueRange, RAW_MAX};
use super::task::{ControlInput, ControlTask};
use super::{ControlKey, Indicator, InputMode, Listener, ValueControl, TICK_INTERVAL};
use async_trait::async_trait;

/// Confirmed vs. requested value of one control
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Coalescer {
    /// Last value confirmed by the radio (or optimistically assumed after a send)
    pub(crate) active: i32,
    /// Last value requested locally
    pub(crate) selected: i32,
    /// A requested value has not been accepted by the delivery stage yet
    pub(crate) pending: bool,
}

impl Coalescer {
    /// Fold in a confirmation; it becomes the request too unless one is pending
    pub(crate) fn confirm(&mut self, value: i32) {
        self.active = value;
        if !self.pending {
            self.selected = value;
        }
    }

    /// Record a locally requested value
    ///
    /// Only a refused hand-off marks it pending; until then a confirmation
    /// arriving first replaces it.
    pub(crate) fn select(&mut self, value: i32) {
        self.selected = value;
    }

    /// Try to deliver the requested value if it differs from the confirmed one
    ///
    /// Returns the value that was handed off, if any.
    pub(crate) fn flush(&mut self, hand_off: impl FnOnce(i32) -> bool) -> Option<i32> {
        if self.active == self.selected {
            self.pending = false;
            return None;
        }
        if hand_off(self.selected) {
            self.active = self.selected;
            self.pending = false;
            Some(self.selected)
        } else {
            self.pending = true;
            None
        }
    }
}

/// Absolute value control
pub struct Poti {
    key: ControlKey,
    range: ValueRange,
    indicator: Arc<dyn Indicator>,
    task: ControlTask,
}

impl Poti {
    /// Spawn a level control and its delivery stage
    pub fn new(
        key: ControlKey,
        range: ValueRange,
        sink: Arc<dyn ValueSink<i32>>,
        indicator: Arc<dyn Indicator>,
    ) -> Self {
        let delivery = Delivery::spawn(key, sink);
        let task = ControlTask::spawn(key, move |input, stop| run(key, delivery, input, stop));
        Self {
            key,
            range,
            indicator,
            task,
        }
    }
}

async fn run(
    key: ControlKey,
    delivery: Delivery<i32>,
    mut input: mpsc::Receiver<ControlInput>,
    mut stop: watch::Receiver<bool>,
) {
    let mut state = Coalescer::default();
    let mut ticker = interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick completes immediately
    ticker.tick().await;

    debug!("Level control {} started", key);

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            received = input.recv() => match received {
                Some(ControlInput::Changed(value)) => state.select(value),
                Some(ControlInput::Confirmed(value)) => state.confirm(value as i32),
                None => break,
            },
            _ = ticker.tick() => {
                if let Some(value) = state.flush(|value| delivery.try_hand_off(value)) {
                    trace!("{} sent {}", key, value);
                }
            }
        }
    }

    debug!("Level control {} stopped", key);
}

impl Listener for Poti {}

#[async_trait]
impl ValueControl for Poti {
    fn input_mode(&self) -> InputMode {
        InputMode::Absolute
    }

    fn changed(&self, value: i32) {
        let raw = value.clamp(0, RAW_MAX as i32) as u8;
        self.task.push(ControlInput::Changed(self.range.translate(raw)));
    }

    fn set_active_value(&self, value: i32) {
        self.task.push(ControlInput::Confirmed(value as i64));
        self.indicator.set_value(self.key, self.range.project(value));
    }

    async fn close(&self) {
        self.task.close().await;
    }
}
