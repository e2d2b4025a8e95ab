//! Dispatcher - routes surface events to controls and confirmations to everyone
//!
//! The dispatch table is built once from the mapping entries and never changes
//! afterwards:
//! - one map per control class (buttons, value controls, wheels), keyed by
//!   [`ControlKey`]; a later entry for the same key replaces the earlier one
//! - the ordered list of every built control, which receives each
//!   confirmation from the radio


use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::control::{Button, Control, ControlKey, Indicator, InputMode, ValueControl, Wheel};
use crate::mapping::{build_control, Mapping, MappingError};
use crate::midi::{relative_delta, MidiMessage};
use crate::radio::{RadioController, RadioEvent};

/// A mapping entry that made it into the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub key: ControlKey,
    pub role: &'static str,
    pub mapping: String,
}

/// Immutable routing table of the gateway
pub struct Dispatcher {
    buttons: HashMap<ControlKey, Arc<dyn Button>>,
    values: HashMap<ControlKey, Arc<dyn ValueControl>>,
    wheels: HashMap<ControlKey, Arc<dyn Wheel>>,
    controls: Vec<Control>,
    registered: Vec<Registration>,
    skipped: Vec<(String, MappingError)>,
}

impl Dispatcher {
    /// Build a control for every mapping entry
    ///
    /// Invalid entries (including ones addressing a transceiver beyond
    /// `trx_count`) are logged and skipped; the rest of the table is built
    /// regardless. Must run inside a tokio runtime.
    pub fn build(
        mappings: &[Mapping],
        trx_count: u8,
        radio: Arc<dyn RadioController>,
        indicator: Arc<dyn Indicator>,
    ) -> Self {
        let mut dispatcher = Self {
            buttons: HashMap::new(),
            values: HashMap::new(),
            wheels: HashMap::new(),
            controls: Vec::with_capacity(mappings.len()),
            registered: Vec::new(),
            skipped: Vec::new(),
        };

        for mapping in mappings {
            match build_control(mapping, trx_count, radio.clone(), indicator.clone()) {
                Ok(control) => dispatcher.register(mapping, control),
                Err(e) => {
                    warn!("⚠️  Skipping mapping {}: {}", mapping, e);
                    dispatcher.skipped.push((mapping.to_string(), e));
                }
            }
        }

        info!(
            "✅ Registered {} controls ({} buttons, {} value controls, {} wheels), {} skipped",
            dispatcher.controls.len(),
            dispatcher.buttons.len(),
            dispatcher.values.len(),
            dispatcher.wheels.len(),
            dispatcher.skipped.len()
        );
        dispatcher
    }

    fn register(&mut self, mapping: &Mapping, control: Control) {
        let key = ControlKey::new(mapping.channel, mapping.key);
        let replaced = match &control {
            Control::Button(button) => self.buttons.insert(key, button.clone()).is_some(),
            Control::Value(value) => self.values.insert(key, value.clone()).is_some(),
            Control::Wheel(wheel) => self.wheels.insert(key, wheel.clone()).is_some(),
        };
        if replaced {
            warn!("⚠️  {} {} replaces an earlier mapping", control.role(), key);
        }
        debug!("Registered {} {} ({})", control.role(), key, mapping);

        self.registered.push(Registration {
            key,
            role: control.role(),
            mapping: mapping.to_string(),
        });
        self.controls.push(control);
    }

    /// Entries that were built, in configuration order
    pub fn registered(&self) -> &[Registration] {
        &self.registered
    }

    /// Entries that were rejected, with the reason
    pub fn skipped(&self) -> &[(String, MappingError)] {
        &self.skipped
    }

    /// Route one surface message to its control
    ///
    /// Note On goes to buttons, Control Change to value controls (or wheels
    /// when no value control owns the key). Everything else is ignored.
    /// Presses run on their own task so a slow radio call never holds up
    /// the faders and encoders behind it.
    pub fn on_midi(&self, message: &MidiMessage) {
        match *message {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } if velocity > 0 => {
                let key = ControlKey::new(channel, note);
                match self.buttons.get(&key) {
                    Some(button) => {
                        trace!("Press {}", key);
                        let button = button.clone();
                        tokio::spawn(async move { button.pressed().await });
                    }
                    None => trace!("No button on {}", key),
                }
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                let key = ControlKey::new(channel, cc);
                if let Some(control) = self.values.get(&key) {
                    let value = match control.input_mode() {
                        InputMode::Absolute => value as i32,
                        InputMode::Relative => relative_delta(value),
                    };
                    control.changed(value);
                } else if let Some(wheel) = self.wheels.get(&key) {
                    wheel.turned(relative_delta(value));
                } else {
                    trace!("No control on {}", key);
                }
            }
            _ => trace!("Ignoring {}", message),
        }
    }

    /// Broadcast a confirmation to every control
    pub fn notify(&self, event: &RadioEvent) {
        for control in &self.controls {
            control.on_radio_event(event);
        }
    }

    /// Feed confirmations from the bus until it closes
    pub async fn run_confirmations(&self, mut confirmations: broadcast::Receiver<RadioEvent>) {
        loop {
            match confirmations.recv().await {
                Ok(event) => self.notify(&event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("⚠️  Missed {} radio confirmations", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("Confirmation feed closed");
    }

    /// Close every control and wait for their loops to exit
    pub async fn close(&self) {
        for control in &self.controls {
            control.close().await;
        }
        info!("✅ All controls closed");
    }
}
