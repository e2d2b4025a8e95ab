//! Incremental control - endless encoders reporting signed turns
//!
//! Turns are scaled by the configured step, accumulated and quantized onto
//! multiples of the step. Everything already queued is folded in before one
//! immediate hand-off, so a quick flick produces a single command carrying
//! the sum.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

use super::delivery::{Delivery, ValueSink};
use super::poti::Coalescer;
use super::range::ValueRange;
use super::task::{ControlInput, ControlTask};
use super::{ControlKey, Indicator, InputMode, Listener, ValueControl, TICK_INTERVAL};

/// Step and direction parameters of an encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stepping {
    range: ValueRange,
    step: i32,
    direction: i32,
    dynamic: bool,
}

/// Loop-local encoder state
#[derive(Debug, Default)]
struct EncoderState {
    values: Coalescer,
    accumulated: i32,
}

impl EncoderState {
    fn turn(&mut self, turns: i32, stepping: &Stepping) {
        let scaled = if stepping.dynamic {
            turns.saturating_mul(stepping.step)
        } else {
            turns.signum() * stepping.step
        };
        self.accumulated = self
            .accumulated
            .saturating_add(scaled * stepping.direction);
        if self.accumulated == 0 {
            return;
        }

        // Build on the latest request, confirmed or not
        let base = self.values.selected;
        let target = base.saturating_add(self.accumulated) as f64 / stepping.step as f64;
        let candidate = stepping
            .range
            .trim((target.round() as i32).saturating_mul(stepping.step));

        let used = candidate - base;
        if used == 0 {
            self.accumulated = 0;
            return;
        }
        self.accumulated -= used;
        self.values.select(candidate);
    }
}

/// Relative value control
pub struct Encoder {
    key: ControlKey,
    range: ValueRange,
    indicator: Arc<dyn Indicator>,
    task: ControlTask,
}

impl Encoder {
    /// Spawn an encoder and its delivery stage
    ///
    /// `step` below 1 is raised to 1. `reverse` flips the turn direction,
    /// `dynamic` multiplies the step by the number of reported turns instead
    /// of moving one step per event.
    pub fn new(
        key: ControlKey,
        range: ValueRange,
        sink: Arc<dyn ValueSink<i32>>,
        indicator: Arc<dyn Indicator>,
        step: i32,
        reverse: bool,
        dynamic: bool,
    ) -> Self {
        let stepping = Stepping {
            range,
            step: step.max(1),
            direction: if reverse { -1 } else { 1 },
            dynamic,
        };
        let delivery = Delivery::spawn(key, sink);
        let task = ControlTask::spawn(key, move |input, stop| {
            run(key, stepping, delivery, input, stop)
        });
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
    stepping: Stepping,
    delivery: Delivery<i32>,
    mut input: mpsc::Receiver<ControlInput>,
    mut stop: watch::Receiver<bool>,
) {
    let mut state = EncoderState::default();
    let mut ticker = interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    debug!("Encoder {} started (step {})", key, stepping.step);

    let apply = |state: &mut EncoderState, received: ControlInput| match received {
        ControlInput::Changed(turns) => state.turn(turns, &stepping),
        ControlInput::Confirmed(value) => state.values.confirm(value as i32),
    };

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            received = input.recv() => {
                let Some(received) = received else { break };
                let turned = matches!(received, ControlInput::Changed(_));
                apply(&mut state, received);

                // Fold in whatever queued up meanwhile, then hand off once
                let mut drained = turned;
                while let Ok(next) = input.try_recv() {
                    drained |= matches!(next, ControlInput::Changed(_));
                    apply(&mut state, next);
                }
                if drained {
                    if let Some(value) = state.values.flush(|value| delivery.try_hand_off(value)) {
                        trace!("{} sent {}", key, value);
                    }
                }
            },
            _ = ticker.tick() => {
                if let Some(value) = state.values.flush(|value| delivery.try_hand_off(value)) {
                    trace!("{} resent {}", key, value);
                }
            }
        }
    }

    debug!("Encoder {} stopped", key);
}

impl Listener for Encoder {}

#[async_trait]
impl ValueControl for Encoder {
    fn input_mode(&self) -> InputMode {
        InputMode::Relative
    }

    fn changed(&self, value: i32) {
        self.task.push(ControlInput::Changed(value));
    }

    fn set_active_value(&self, value: i32) {
        self.task.push(ControlInput::Confirmed(value as i64));
        self.indicator.set_value(self.key, self.range.project(value));
    }

    async fn close(&self) {
        self.task.close().await;
    }
}
