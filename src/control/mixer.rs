//! RX mixer - one fader cross-fading the two receivers of a transceiver
//!
//! At the centre both VFOs play at full volume, A panned left and B panned
//! right. Moving down fades B out and pulls A towards the middle; moving up
//! does the same for A.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use super::bound::{BoundValueControl, TargetSink, ValueTarget};
use super::range::RAW_MAX;
use super::{Button, ControlKey, Indicator, InputMode, Listener, NoIndicator, Poti, ValueControl};
use crate::radio::{RadioController, RadioEvent, Trx, Vfo};

const CENTER: i32 = 0x40;
const FULL: i32 = RAW_MAX as i32;
const LEFT: i32 = 0x00;
const RIGHT: i32 = RAW_MAX as i32;

/// Raw levels `[volume A, balance A, volume B, balance B]` for one fader position
fn split(raw: i32) -> [i32; 4] {
    let levels = if raw == CENTER {
        [FULL, LEFT, FULL, RIGHT]
    } else if raw < CENTER {
        [FULL, CENTER - raw, FULL - (CENTER - raw) * 2, RIGHT]
    } else {
        [FULL - (raw - CENTER) * 2, LEFT, FULL, RIGHT - (raw - CENTER)]
    };
    levels.map(|level| level.clamp(0, FULL))
}

fn targets(trx: Trx) -> [ValueTarget; 4] {
    [
        ValueTarget::RxVolume { trx, vfo: Vfo::A },
        ValueTarget::RxBalance { trx, vfo: Vfo::A },
        ValueTarget::RxVolume { trx, vfo: Vfo::B },
        ValueTarget::RxBalance { trx, vfo: Vfo::B },
    ]
}

/// Fader driving volume and balance of both receivers
pub struct RxMixer {
    key: ControlKey,
    levels: [BoundValueControl; 4],
}

impl RxMixer {
    pub fn new(key: ControlKey, trx: Trx, radio: Arc<dyn RadioController>) -> Self {
        let levels = targets(trx).map(|target| {
            let sink = Arc::new(TargetSink::new(radio.clone(), target));
            let poti = Poti::new(key, target.range(), sink, Arc::new(NoIndicator));
            BoundValueControl::new(target, Arc::new(poti))
        });
        Self { key, levels }
    }
}

impl Listener for RxMixer {
    fn on_radio_event(&self, event: &RadioEvent) {
        for level in &self.levels {
            level.on_radio_event(event);
        }
    }
}

#[async_trait]
impl ValueControl for RxMixer {
    fn input_mode(&self) -> InputMode {
        InputMode::Absolute
    }

    fn changed(&self, value: i32) {
        let raw = value.clamp(0, FULL);
        for (level, raw) in self.levels.iter().zip(split(raw)) {
            level.changed(raw);
        }
    }

    fn set_active_value(&self, _value: i32) {
        // The four levels take their confirmations from the broadcast
        debug!("Ignoring direct value for mixer {}", self.key);
    }

    async fn close(&self) {
        for level in &self.levels {
            level.close().await;
        }
    }
}

/// Preset of all four mixer levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixerPreset {
    pub volume_a: i32,
    pub volume_b: i32,
    pub balance_a: i32,
    pub balance_b: i32,
}

impl MixerPreset {
    fn values(&self) -> [i32; 4] {
        [self.volume_a, self.balance_a, self.volume_b, self.balance_b]
    }
}

/// Button applying a [`MixerPreset`], lit while all four levels match it
pub struct MixerPresetButton {
    key: ControlKey,
    trx: Trx,
    preset: MixerPreset,
    radio: Arc<dyn RadioController>,
    indicator: Arc<dyn Indicator>,
    confirmed: Mutex<[Option<i32>; 4]>,
}

impl MixerPresetButton {
    pub fn new(
        key: ControlKey,
        trx: Trx,
        preset: MixerPreset,
        radio: Arc<dyn RadioController>,
        indicator: Arc<dyn Indicator>,
    ) -> Self {
        Self {
            key,
            trx,
            preset,
            radio,
            indicator,
            confirmed: Mutex::new([None; 4]),
        }
    }
}

impl Listener for MixerPresetButton {
    fn on_radio_event(&self, event: &RadioEvent) {
        let Some((slot, value)) = targets(self.trx)
            .iter()
            .enumerate()
            .find_map(|(slot, target)| target.confirmed(event).map(|value| (slot, value)))
        else {
            return;
        };

        let active = {
            let mut confirmed = self.confirmed.lock();
            confirmed[slot] = Some(value);
            confirmed
                .iter()
                .zip(self.preset.values())
                .all(|(current, wanted)| *current == Some(wanted))
        };
        self.indicator.set_on(self.key, active);
    }
}

#[async_trait]
impl Button for MixerPresetButton {
    async fn pressed(&self) {
        debug!("Mixer preset {:?} for trx{}", self.preset, self.trx);
        for (target, value) in targets(self.trx).iter().zip(self.preset.values()) {
            if let Err(e) = target.send(self.radio.as_ref(), value).await {
                warn!("⚠️  Failed to set {}: {:#}", target, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::indicator::testing::{IndicatorCall, RecordingIndicator};
    use crate::control::TICK_INTERVAL;
    use crate::radio::testing::RecordingRadio;

    #[test]
    fn test_split_center() {
        assert_eq!(split(0x40), [0x7F, 0x00, 0x7F, 0x7F]);
    }

    #[test]
    fn test_split_fades_b_out_below_center() {
        assert_eq!(split(0x30), [0x7F, 0x10, 0x5F, 0x7F]);
        // Volume B bottoms out instead of going negative
        assert_eq!(split(0x00), [0x7F, 0x40, 0x00, 0x7F]);
    }

    #[test]
    fn test_split_fades_a_out_above_center() {
        assert_eq!(split(0x50), [0x5F, 0x00, 0x7F, 0x6F]);
        assert_eq!(split(0x7F), [0x01, 0x00, 0x7F, 0x40]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixer_drives_four_levels() {
        let radio = Arc::new(RecordingRadio::default());
        let mixer = RxMixer::new(ControlKey::new(0, 0x08), 0, radio.clone());

        // Baseline away from the centre values
        for (target, value) in targets(0).iter().zip([-30, 10, -30, -10]) {
            let event = match *target {
                ValueTarget::RxVolume { trx, vfo } => RadioEvent::RxVolume { trx, vfo, db: value },
                ValueTarget::RxBalance { trx, vfo } => RadioEvent::RxBalance {
                    trx,
                    vfo,
                    balance: value,
                },
                _ => unreachable!(),
            };
            mixer.on_radio_event(&event);
        }
        mixer.changed(0x40);
        tokio::time::sleep(TICK_INTERVAL * 3).await;

        let mut commands = radio.commands();
        commands.sort();
        assert_eq!(
            commands,
            vec![
                "rx_balance 0 VFOA -40",
                "rx_balance 0 VFOB 40",
                "rx_volume 0 VFOA 0",
                "rx_volume 0 VFOB 0",
            ]
        );

        mixer.close().await;
    }

    #[tokio::test]
    async fn test_preset_button_lit_when_all_levels_match() {
        let radio = Arc::new(RecordingRadio::default());
        let indicator = Arc::new(RecordingIndicator::default());
        let key = ControlKey::new(0, 0x20);
        let preset = MixerPreset {
            volume_a: -10,
            volume_b: -20,
            balance_a: -40,
            balance_b: 40,
        };
        let button = MixerPresetButton::new(key, 0, preset, radio.clone(), indicator.clone());

        button.pressed().await;
        assert_eq!(
            radio.commands(),
            vec![
                "rx_volume 0 VFOA -10",
                "rx_balance 0 VFOA -40",
                "rx_volume 0 VFOB -20",
                "rx_balance 0 VFOB 40",
            ]
        );

        button.on_radio_event(&RadioEvent::RxVolume {
            trx: 0,
            vfo: Vfo::A,
            db: -10,
        });
        button.on_radio_event(&RadioEvent::RxBalance {
            trx: 0,
            vfo: Vfo::A,
            balance: -40,
        });
        button.on_radio_event(&RadioEvent::RxVolume {
            trx: 0,
            vfo: Vfo::B,
            db: -20,
        });
        assert_eq!(indicator.last(), Some(IndicatorCall::On(key, false)));

        button.on_radio_event(&RadioEvent::RxBalance {
            trx: 0,
            vfo: Vfo::B,
            balance: 40,
        });
        assert_eq!(indicator.last(), Some(IndicatorCall::On(key, true)));

        // Other transceiver is ignored
        button.on_radio_event(&RadioEvent::RxVolume {
            trx: 1,
            vfo: Vfo::A,
            db: 0,
        });
        assert_eq!(indicator.calls().len(), 4);
    }
}
