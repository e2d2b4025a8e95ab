//! Control layer - turns raw surface events into coalesced radio commands
//!
//! Every mapped physical control becomes one of three roles:
//!
//! - [`Button`]: one-shot action on press
//! - [`ValueControl`]: absolute ([`Poti`]) or relative ([`Encoder`]) value
//! - [`Wheel`]: velocity-ramped frequency tuning ([`VfoWheel`])
//!
//! Stateful controls run their own task with loop-local state and hand values
//! to a one-slot [`Delivery`] stage, so there is never more than one command in
//! flight per control. Confirmed radio state reaches every control through
//! [`Listener::on_radio_event`].

pub mod bound;
pub mod buttons;
pub mod delivery;
pub mod encoder;
pub mod indicator;
pub mod mixer;
pub mod poti;
pub mod range;
mod task;
pub mod wheel;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::radio::RadioEvent;

pub use bound::{BoundValueControl, ValueTarget};
pub use delivery::{Delivery, ValueSink};
pub use encoder::Encoder;
pub use indicator::{Indicator, NoIndicator};
pub use mixer::RxMixer;
pub use poti::Poti;
pub use range::ValueRange;
pub use wheel::{VfoWheel, WheelProfile};

/// Coalescing tick of level and incremental controls
pub const TICK_INTERVAL: Duration = Duration::from_millis(20);

/// Accumulation window of velocity-ramped wheels
pub const WHEEL_SCAN_INTERVAL: Duration = Duration::from_millis(50);

/// Capacity of the per-control turn queue
pub const TURN_QUEUE_CAPACITY: usize = 256;

/// Identity of one physical control: (channel, control number)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ControlKey {
    /// MIDI channel (0-15)
    pub channel: u8,
    /// Note or controller number (0-127)
    pub key: u8,
}

impl ControlKey {
    pub const fn new(channel: u8, key: u8) -> Self {
        Self { channel, key }
    }
}

impl fmt::Display for ControlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}/{:#04x}", self.channel, self.key)
    }
}

/// Receiver of confirmed radio state
pub trait Listener: Send + Sync {
    /// Called for every confirmation; implementations ignore what they don't track
    fn on_radio_event(&self, _event: &RadioEvent) {}
}

/// How a value control interprets the raw byte of a Control Change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Absolute position (fader, pot)
    Absolute,
    /// Signed turn delta (endless encoder)
    Relative,
}

/// One-shot action control
#[async_trait]
pub trait Button: Listener {
    async fn pressed(&self);
}

/// Absolute or relative value control
#[async_trait]
pub trait ValueControl: Listener {
    fn input_mode(&self) -> InputMode;

    /// Raw position (absolute) or signed turns (relative) from the surface
    fn changed(&self, value: i32);

    /// Domain value confirmed by the radio
    fn set_active_value(&self, value: i32);

    /// Stop accepting input and wait for the control's loop to exit
    async fn close(&self);
}

/// Velocity-ramped tuning wheel
#[async_trait]
pub trait Wheel: Listener {
    fn turned(&self, delta: i32);

    async fn close(&self);
}

/// Parameters selecting and configuring a value control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueControlKind {
    Poti,
    Encoder {
        step: i32,
        reverse: bool,
        dynamic: bool,
    },
}

/// Spawn the value control described by `kind`
pub fn new_value_control(
    key: ControlKey,
    kind: ValueControlKind,
    range: ValueRange,
    sink: Arc<dyn ValueSink<i32>>,
    indicator: Arc<dyn Indicator>,
) -> Arc<dyn ValueControl> {
    match kind {
        ValueControlKind::Poti => Arc::new(Poti::new(key, range, sink, indicator)),
        ValueControlKind::Encoder {
            step,
            reverse,
            dynamic,
        } => Arc::new(Encoder::new(
            key, range, sink, indicator, step, reverse, dynamic,
        )),
    }
}

/// A built control, tagged by role
#[derive(Clone)]
pub enum Control {
    Button(Arc<dyn Button>),
    Value(Arc<dyn ValueControl>),
    Wheel(Arc<dyn Wheel>),
}

impl Control {
    /// Role name for logs
    pub fn role(&self) -> &'static str {
        match self {
            Control::Button(_) => "button",
            Control::Value(control) => match control.input_mode() {
                InputMode::Absolute => "level",
                InputMode::Relative => "encoder",
            },
            Control::Wheel(_) => "wheel",
        }
    }

    pub fn on_radio_event(&self, event: &RadioEvent) {
        match self {
            Control::Button(button) => button.on_radio_event(event),
            Control::Value(control) => control.on_radio_event(event),
            Control::Wheel(wheel) => wheel.on_radio_event(event),
        }
    }

    pub async fn close(&self) {
        match self {
            Control::Button(_) => {}
            Control::Value(control) => control.close().await,
            Control::Wheel(wheel) => wheel.close().await,
        }
    }
}
