//! Value controls bound to one radio parameter
//!
//! [`ValueTarget`] names the parameter (which command to send, which
//! confirmation to listen for, which domain range applies).
//! [`BoundValueControl`] glues a level control or encoder to it.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use super::delivery::ValueSink;
use super::range::ValueRange;
use super::{InputMode, Listener, ValueControl};
use crate::radio::{RadioController, RadioEvent, Trx, Vfo};

/// Radio parameter driven by a value control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTarget {
    /// Receiver volume of one VFO, dB
    RxVolume { trx: Trx, vfo: Vfo },
    /// Receiver stereo balance of one VFO
    RxBalance { trx: Trx, vfo: Vfo },
    /// Main volume, dB
    Volume,
    /// RIT offset, Hz
    RitOffset { trx: Trx },
    /// XIT offset, Hz
    XitOffset { trx: Trx },
    /// Keyer speed, words per minute
    CwSpeed,
}

impl ValueTarget {
    pub fn range(&self) -> ValueRange {
        match self {
            ValueTarget::RxVolume { .. } | ValueTarget::Volume => ValueRange::new(-60, 0),
            ValueTarget::RxBalance { .. } => ValueRange::new(-40, 40),
            ValueTarget::RitOffset { .. } | ValueTarget::XitOffset { .. } => {
                ValueRange::new(-500, 500)
            }
            ValueTarget::CwSpeed => ValueRange::new(5, 50),
        }
    }

    /// Extract this parameter's value from a confirmation, if it carries it
    pub fn confirmed(&self, event: &RadioEvent) -> Option<i32> {
        match (*self, event) {
            (
                ValueTarget::RxVolume { trx, vfo },
                RadioEvent::RxVolume {
                    trx: t,
                    vfo: v,
                    db,
                },
            ) if trx == *t && vfo == *v => Some(*db),
            (
                ValueTarget::RxBalance { trx, vfo },
                RadioEvent::RxBalance {
                    trx: t,
                    vfo: v,
                    balance,
                },
            ) if trx == *t && vfo == *v => Some(*balance),
            (ValueTarget::Volume, RadioEvent::Volume { db }) => Some(*db),
            (ValueTarget::RitOffset { trx }, RadioEvent::RitOffset { trx: t, hz }) if trx == *t => {
                Some(*hz)
            }
            (ValueTarget::XitOffset { trx }, RadioEvent::XitOffset { trx: t, hz }) if trx == *t => {
                Some(*hz)
            }
            (ValueTarget::CwSpeed, RadioEvent::CwMacrosSpeed { wpm }) => Some(*wpm),
            _ => None,
        }
    }

    /// Send a value of this parameter to the radio
    pub async fn send(&self, radio: &dyn RadioController, value: i32) -> Result<()> {
        match *self {
            ValueTarget::RxVolume { trx, vfo } => radio.set_rx_volume(trx, vfo, value).await,
            ValueTarget::RxBalance { trx, vfo } => radio.set_rx_balance(trx, vfo, value).await,
            ValueTarget::Volume => radio.set_volume(value).await,
            ValueTarget::RitOffset { trx } => radio.set_rit_offset(trx, value).await,
            ValueTarget::XitOffset { trx } => radio.set_xit_offset(trx, value).await,
            ValueTarget::CwSpeed => radio.set_cw_macros_speed(value).await,
        }
    }
}

impl fmt::Display for ValueTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueTarget::RxVolume { trx, vfo } => write!(f, "rx_volume trx{} {}", trx, vfo),
            ValueTarget::RxBalance { trx, vfo } => write!(f, "rx_balance trx{} {}", trx, vfo),
            ValueTarget::Volume => write!(f, "volume"),
            ValueTarget::RitOffset { trx } => write!(f, "rit trx{}", trx),
            ValueTarget::XitOffset { trx } => write!(f, "xit trx{}", trx),
            ValueTarget::CwSpeed => write!(f, "cw_speed"),
        }
    }
}

/// Delivery sink writing one radio parameter
pub struct TargetSink {
    radio: Arc<dyn RadioController>,
    target: ValueTarget,
}

impl TargetSink {
    pub fn new(radio: Arc<dyn RadioController>, target: ValueTarget) -> Self {
        Self { radio, target }
    }
}

#[async_trait]
impl ValueSink<i32> for TargetSink {
    async fn set(&self, value: i32) -> Result<()> {
        self.target.send(self.radio.as_ref(), value).await
    }
}

/// Value control that picks its confirmations off the broadcast
pub struct BoundValueControl {
    target: ValueTarget,
    control: Arc<dyn ValueControl>,
}

impl BoundValueControl {
    pub fn new(target: ValueTarget, control: Arc<dyn ValueControl>) -> Self {
        Self { target, control }
    }
}

impl Listener for BoundValueControl {
    fn on_radio_event(&self, event: &RadioEvent) {
        if let Some(value) = self.target.confirmed(event) {
            self.control.set_active_value(value);
        }
    }
}

#[async_trait]
impl ValueControl for BoundValueControl {
    fn input_mode(&self) -> InputMode {
        self.control.input_mode()
    }

    fn changed(&self, value: i32) {
        self.control.changed(value);
    }

    fn set_active_value(&self, value: i32) {
        self.control.set_active_value(value);
    }

    async fn close(&self) {
        self.control.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::testing::RecordingSink;
    use crate::control::{ControlKey, NoIndicator, Poti, TICK_INTERVAL};

    #[test]
    fn test_confirmation_matching() {
        let target = ValueTarget::RxVolume { trx: 0, vfo: Vfo::B };

        assert_eq!(
            target.confirmed(&RadioEvent::RxVolume {
                trx: 0,
                vfo: Vfo::B,
                db: -12
            }),
            Some(-12)
        );
        assert_eq!(
            target.confirmed(&RadioEvent::RxVolume {
                trx: 0,
                vfo: Vfo::A,
                db: -12
            }),
            None
        );
        assert_eq!(
            target.confirmed(&RadioEvent::RxVolume {
                trx: 1,
                vfo: Vfo::B,
                db: -12
            }),
            None
        );
        assert_eq!(target.confirmed(&RadioEvent::Volume { db: -12 }), None);
    }

    #[test]
    fn test_ranges() {
        assert_eq!(ValueTarget::Volume.range(), ValueRange::new(-60, 0));
        assert_eq!(ValueTarget::CwSpeed.range(), ValueRange::new(5, 50));
        assert_eq!(
            ValueTarget::RitOffset { trx: 0 }.range(),
            ValueRange::new(-500, 500)
        );
        assert_eq!(
            ValueTarget::RxBalance { trx: 0, vfo: Vfo::A }.range(),
            ValueRange::new(-40, 40)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_confirmation_reaches_control() {
        let sink = Arc::new(RecordingSink::<i32>::new());
        let target = ValueTarget::Volume;
        let poti = Arc::new(Poti::new(
            ControlKey::new(0, 0x07),
            target.range(),
            sink.clone(),
            Arc::new(NoIndicator),
        ));
        let bound = BoundValueControl::new(target, poti);

        bound.on_radio_event(&RadioEvent::Volume { db: -60 });
        bound.on_radio_event(&RadioEvent::CwMacrosSpeed { wpm: 20 });
        bound.changed(0x40);
        tokio::time::sleep(TICK_INTERVAL * 2).await;

        assert_eq!(sink.values(), vec![-30]);
        bound.close().await;
    }
}
