//! Velocity-ramped tuning wheel (jog wheel → VFO frequency)
//!
//! Turns are accumulated over a short scan window. At the end of every window
//! the accumulated ticks are converted into a frequency delta; slow turning
//! moves by the fine step, fast turning by the coarse step.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

use super::delivery::{Delivery, ValueSink};
use super::task::{ControlInput, ControlTask};
use super::{ControlKey, Listener, Wheel, WHEEL_SCAN_INTERVAL};
use crate::radio::{RadioController, RadioEvent, Trx, Vfo};

/// Velocity profile of a wheel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelProfile {
    /// Hz per tick while turning slowly
    pub fine_step: i64,
    /// Hz per tick while turning fast
    pub coarse_step: i64,
    /// Ticks per scan window from which on the coarse step applies
    pub threshold: i32,
    /// +1 or -1
    pub direction: i32,
}

impl Default for WheelProfile {
    fn default() -> Self {
        Self {
            fine_step: 10,
            coarse_step: 100,
            threshold: 4,
            direction: 1,
        }
    }
}

impl WheelProfile {
    fn velocity(&self, accumulated: i32) -> i64 {
        if accumulated.abs() < self.threshold {
            self.fine_step
        } else {
            self.coarse_step
        }
    }
}

#[derive(Debug, Default)]
struct WheelState {
    /// Frequency the next delta applies to; unknown until the radio reports one
    base: Option<i64>,
    accumulated: i32,
    turning: bool,
}

impl WheelState {
    fn turn(&mut self, delta: i32, profile: &WheelProfile) {
        if delta == 0 {
            return;
        }
        self.accumulated = self
            .accumulated
            .saturating_add(delta.saturating_mul(profile.direction));
        self.turning = true;
    }

    fn confirm(&mut self, hz: i64) {
        // Reports racing our own commands would drag the wheel back
        if !self.turning || self.base.is_none() {
            self.base = Some(hz);
        }
    }

    /// End of a scan window; returns the frequency that was handed off
    fn scan(&mut self, profile: &WheelProfile, hand_off: impl FnOnce(i64) -> bool) -> Option<i64> {
        if self.accumulated == 0 {
            self.turning = false;
            return None;
        }
        let base = self.base?;
        let delta = self.accumulated as i64 * profile.velocity(self.accumulated);
        let target = base.saturating_add(delta);
        if !hand_off(target) {
            return None;
        }
        self.base = Some(target);
        self.accumulated = 0;
        Some(target)
    }
}

/// Tuning wheel bound to one VFO
pub struct VfoWheel {
    trx: Trx,
    vfo: Vfo,
    task: ControlTask,
}

impl VfoWheel {
    pub fn new(
        key: ControlKey,
        trx: Trx,
        vfo: Vfo,
        profile: WheelProfile,
        sink: Arc<dyn ValueSink<i64>>,
    ) -> Self {
        let delivery = Delivery::spawn(key, sink);
        let task = ControlTask::spawn(key, move |input, stop| {
            run(key, profile, delivery, input, stop)
        });
        Self { trx, vfo, task }
    }
}

async fn run(
    key: ControlKey,
    profile: WheelProfile,
    delivery: Delivery<i64>,
    mut input: mpsc::Receiver<ControlInput>,
    mut stop: watch::Receiver<bool>,
) {
    let mut state = WheelState::default();
    let mut ticker = interval(WHEEL_SCAN_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    debug!("Wheel {} started", key);

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            received = input.recv() => match received {
                Some(ControlInput::Changed(delta)) => state.turn(delta, &profile),
                Some(ControlInput::Confirmed(hz)) => state.confirm(hz),
                None => break,
            },
            _ = ticker.tick() => {
                if let Some(hz) = state.scan(&profile, |hz| delivery.try_hand_off(hz)) {
                    trace!("{} tuned to {} Hz", key, hz);
                }
            }
        }
    }

    debug!("Wheel {} stopped", key);
}

impl Listener for VfoWheel {
    fn on_radio_event(&self, event: &RadioEvent) {
        if let RadioEvent::VfoFrequency { trx, vfo, hz } = *event {
            if trx == self.trx && vfo == self.vfo {
                self.task.push(ControlInput::Confirmed(hz));
            }
        }
    }
}

#[async_trait]
impl Wheel for VfoWheel {
    fn turned(&self, delta: i32) {
        self.task.push(ControlInput::Changed(delta));
    }

    async fn close(&self) {
        self.task.close().await;
    }
}

/// Writes wheel frequencies to one VFO of the radio
pub struct VfoFrequencySink {
    radio: Arc<dyn RadioController>,
    trx: Trx,
    vfo: Vfo,
}

impl VfoFrequencySink {
    pub fn new(radio: Arc<dyn RadioController>, trx: Trx, vfo: Vfo) -> Self {
        Self { radio, trx, vfo }
    }
}

#[async_trait]
impl ValueSink<i64> for VfoFrequencySink {
    async fn set(&self, hz: i64) -> Result<()> {
        self.radio.set_vfo_frequency(self.trx, self.vfo, hz).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::testing::RecordingSink;
    use std::time::Duration;

    fn spawn_wheel(profile: WheelProfile, sink: Arc<RecordingSink<i64>>) -> VfoWheel {
        VfoWheel::new(ControlKey::new(0, 0x3C), 0, Vfo::A, profile, sink)
    }

    fn confirm(wheel: &VfoWheel, vfo: Vfo, hz: i64) {
        wheel.on_radio_event(&RadioEvent::VfoFrequency { trx: 0, vfo, hz });
    }

    /// Just past the first scan window
    const AFTER_SCAN: Duration = Duration::from_millis(60);

    #[test]
    fn test_velocity_threshold() {
        let profile = WheelProfile::default();
        assert_eq!(profile.velocity(1), 10);
        assert_eq!(profile.velocity(-3), 10);
        assert_eq!(profile.velocity(4), 100);
        assert_eq!(profile.velocity(-9), 100);
    }

    #[test]
    fn test_refused_hand_off_keeps_accumulating() {
        let profile = WheelProfile::default();
        let mut state = WheelState::default();
        state.confirm(7_000_000);
        state.turn(2, &profile);

        assert_eq!(state.scan(&profile, |_| false), None);
        state.turn(3, &profile);
        assert_eq!(state.scan(&profile, |_| true), Some(7_000_500));
        assert_eq!(state.accumulated, 0);

        // Idle window ends the turn
        assert_eq!(state.scan(&profile, |_| panic!("idle")), None);
        assert!(!state.turning);
    }

    #[test]
    fn test_zero_delta_does_not_start_a_turn() {
        let profile = WheelProfile::default();
        let mut state = WheelState::default();
        state.confirm(7_000_000);
        state.turn(0, &profile);
        assert!(!state.turning);

        // Radio reports still move the base
        state.confirm(7_100_000);
        assert_eq!(state.base, Some(7_100_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_turn_uses_fine_step() {
        let sink = Arc::new(RecordingSink::new());
        let wheel = spawn_wheel(WheelProfile::default(), sink.clone());

        confirm(&wheel, Vfo::A, 7_000_000);
        wheel.turned(1);
        tokio::time::sleep(AFTER_SCAN).await;

        assert_eq!(sink.values(), vec![7_000_010]);
        wheel.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_turn_uses_coarse_step() {
        let sink = Arc::new(RecordingSink::new());
        let wheel = spawn_wheel(WheelProfile::default(), sink.clone());

        confirm(&wheel, Vfo::A, 7_000_000);
        for _ in 0..5 {
            wheel.turned(1);
        }
        tokio::time::sleep(AFTER_SCAN).await;

        assert_eq!(sink.values(), vec![7_000_500]);
        wheel.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverse_direction() {
        let sink = Arc::new(RecordingSink::new());
        let profile = WheelProfile {
            direction: -1,
            ..WheelProfile::default()
        };
        let wheel = spawn_wheel(profile, sink.clone());

        confirm(&wheel, Vfo::A, 7_000_000);
        wheel.turned(1);
        tokio::time::sleep(AFTER_SCAN).await;

        assert_eq!(sink.values(), vec![6_999_990]);
        wheel.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_first_frequency() {
        let sink = Arc::new(RecordingSink::new());
        let wheel = spawn_wheel(WheelProfile::default(), sink.clone());

        wheel.turned(1);
        tokio::time::sleep(AFTER_SCAN).await;
        assert!(sink.values().is_empty());

        confirm(&wheel, Vfo::A, 14_000_000);
        tokio::time::sleep(WHEEL_SCAN_INTERVAL).await;
        assert_eq!(sink.values(), vec![14_000_010]);

        wheel.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmations_ignored_while_turning() {
        let sink = Arc::new(RecordingSink::new());
        let wheel = spawn_wheel(WheelProfile::default(), sink.clone());

        confirm(&wheel, Vfo::A, 7_000_000);
        wheel.turned(1);
        confirm(&wheel, Vfo::A, 3_500_000);
        tokio::time::sleep(AFTER_SCAN).await;

        assert_eq!(sink.values(), vec![7_000_010]);
        wheel.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_vfo_is_ignored() {
        let sink = Arc::new(RecordingSink::new());
        let wheel = spawn_wheel(WheelProfile::default(), sink.clone());

        confirm(&wheel, Vfo::B, 10_000_000);
        wheel.on_radio_event(&RadioEvent::VfoFrequency {
            trx: 1,
            vfo: Vfo::A,
            hz: 10_000_000,
        });
        wheel.turned(1);
        tokio::time::sleep(AFTER_SCAN).await;

        assert!(sink.values().is_empty());
        wheel.close().await;
    }
}
