//! Control surface driver
//!
//! Handles MIDI communication with the surface: incoming messages are parsed
//! and queued for the dispatcher, indicator updates are encoded and written
//! by a dedicated task.

use anyhow::{anyhow, Context, Result};
use midir::{MidiIO, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::MidiConfig;
use crate::control::{ControlKey, Indicator, NoIndicator};
use crate::midi::{format_hex, MidiMessage};

/// Client name announced to the MIDI system
const CLIENT_NAME: &str = "TCI-Surface-GW";

/// Capacity of the incoming event queue
pub const EVENT_QUEUE_CAPACITY: usize = 1000;

/// Capacity of the indicator output queue
pub const OUTPUT_QUEUE_CAPACITY: usize = 512;

/// Velocity that makes an LED blink (Mackie Control convention)
const FLASH_VELOCITY: u8 = 0x01;
const LED_ON_VELOCITY: u8 = 0x7F;

/// Case-insensitive substring match of a port name
pub fn port_matches(name: &str, pattern: &str) -> bool {
    name.to_lowercase().contains(&pattern.to_lowercase())
}

fn find_port<T: MidiIO>(io: &T, pattern: &str) -> Option<(T::Port, String)> {
    io.ports().into_iter().find_map(|port| {
        let name = io.port_name(&port).ok()?;
        if port_matches(&name, pattern) {
            debug!("Found port '{}' matching pattern '{}'", name, pattern);
            Some((port, name))
        } else {
            None
        }
    })
}

fn port_names<T: MidiIO>(io: &T) -> Vec<String> {
    io.ports()
        .iter()
        .filter_map(|port| io.port_name(port).ok())
        .collect()
}

/// List available MIDI input and output ports
pub fn list_ports() -> Result<(Vec<String>, Vec<String>)> {
    let midi_in = MidiInput::new(CLIENT_NAME).context("Failed to create MIDI input")?;
    let midi_out = MidiOutput::new(CLIENT_NAME).context("Failed to create MIDI output")?;
    Ok((port_names(&midi_in), port_names(&midi_out)))
}

/// Indicator that drives LEDs and rings through MIDI messages
///
/// Binary indicators are notes, analog indicators are controllers with the
/// same channel and number as the control itself.
pub struct LedIndicator {
    tx: mpsc::Sender<MidiMessage>,
}

impl LedIndicator {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<MidiMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    fn emit(&self, message: MidiMessage) {
        if let Err(e) = self.tx.try_send(message) {
            match e {
                mpsc::error::TrySendError::Full(message) => {
                    warn!("⚠️  Indicator queue full, dropping {}", message)
                }
                mpsc::error::TrySendError::Closed(_) => trace!("Indicator output closed"),
            }
        }
    }

    fn note(key: ControlKey, velocity: u8) -> MidiMessage {
        MidiMessage::NoteOn {
            channel: key.channel,
            note: key.key,
            velocity,
        }
    }
}

impl Indicator for LedIndicator {
    fn set_on(&self, key: ControlKey, on: bool) {
        self.emit(Self::note(key, if on { LED_ON_VELOCITY } else { 0 }));
    }

    fn set_flashing(&self, key: ControlKey, flashing: bool) {
        self.emit(Self::note(key, if flashing { FLASH_VELOCITY } else { 0 }));
    }

    fn set_value(&self, key: ControlKey, value: u8) {
        self.emit(MidiMessage::ControlChange {
            channel: key.channel,
            cc: key.key,
            value: value.min(0x7F),
        });
    }
}

/// Connected control surface
pub struct SurfaceDriver {
    input_conn: Option<MidiInputConnection<()>>,
    writer: Option<JoinHandle<()>>,
    indicator: Arc<dyn Indicator>,
    event_rx: Option<mpsc::Receiver<MidiMessage>>,
}

impl SurfaceDriver {
    /// Connect to the surface ports and send the init sequence
    ///
    /// The input port is required. Without a matching output port the surface
    /// still works, only its indicators stay dark.
    pub fn connect(config: &MidiConfig) -> Result<Self> {
        let init = config
            .init_messages()
            .context("Invalid MIDI init sequence")?;

        info!(
            "Connecting to surface - Input: '{}', Output: '{}'",
            config.input_port,
            config.output_port()
        );

        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let input_conn = Self::connect_input(&config.input_port, event_tx)?;

        let (indicator, writer) = match Self::connect_output(config.output_port()) {
            Ok(conn) => {
                let (leds, rx) = LedIndicator::new(OUTPUT_QUEUE_CAPACITY);
                let indicator: Arc<dyn Indicator> = Arc::new(leds);
                (indicator, Some(tokio::spawn(run_writer(conn, init, rx))))
            }
            Err(e) => {
                warn!("⚠️  No surface output, indicators disabled: {:#}", e);
                let indicator: Arc<dyn Indicator> = Arc::new(NoIndicator);
                (indicator, None)
            }
        };

        info!("✅ Surface connected");
        Ok(Self {
            input_conn: Some(input_conn),
            writer,
            indicator,
            event_rx: Some(event_rx),
        })
    }

    fn connect_input(
        pattern: &str,
        event_tx: mpsc::Sender<MidiMessage>,
    ) -> Result<MidiInputConnection<()>> {
        let midi_in = MidiInput::new(CLIENT_NAME).context("Failed to create MIDI input")?;
        debug!("Found {} MIDI input ports", midi_in.port_count());

        let (port, name) = find_port(&midi_in, pattern)
            .ok_or_else(|| anyhow!("Input port '{}' not found", pattern))?;
        info!("Connecting to input port: {}", name);

        midi_in
            .connect(
                &port,
                CLIENT_NAME,
                move |_timestamp, data, _| match MidiMessage::parse(data) {
                    Some(message) => {
                        // Never block the MIDI thread
                        if event_tx.try_send(message).is_err() {
                            debug!("Surface event queue full, dropping {}", format_hex(data));
                        }
                    }
                    None => trace!("Ignoring MIDI: {}", format_hex(data)),
                },
                (),
            )
            .map_err(|e| anyhow!("Failed to connect to input port '{}': {}", name, e))
    }

    fn connect_output(pattern: &str) -> Result<MidiOutputConnection> {
        let midi_out = MidiOutput::new(CLIENT_NAME).context("Failed to create MIDI output")?;
        debug!("Found {} MIDI output ports", midi_out.port_count());

        let (port, name) = find_port(&midi_out, pattern)
            .ok_or_else(|| anyhow!("Output port '{}' not found", pattern))?;
        info!("Connecting to output port: {}", name);

        midi_out
            .connect(&port, CLIENT_NAME)
            .map_err(|e| anyhow!("Failed to connect to output port '{}': {}", name, e))
    }

    /// Indicator sink for the controls
    pub fn indicator(&self) -> Arc<dyn Indicator> {
        self.indicator.clone()
    }

    /// Take the event receiver (for the dispatcher loop to consume)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<MidiMessage>> {
        self.event_rx.take()
    }

    /// Close both ports
    pub fn disconnect(&mut self) {
        self.input_conn = None;
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
        info!("Surface disconnected");
    }
}

impl Drop for SurfaceDriver {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }
}

/// Write the init sequence, then every indicator update, to the output port
async fn run_writer(
    mut conn: MidiOutputConnection,
    init: Vec<Vec<u8>>,
    mut rx: mpsc::Receiver<MidiMessage>,
) {
    for data in &init {
        match conn.send(data) {
            Ok(()) => debug!("Sent init: {}", format_hex(data)),
            Err(e) => warn!("⚠️  Failed to send init message {}: {}", format_hex(data), e),
        }
    }

    while let Some(message) = rx.recv().await {
        let data = message.encode();
        match conn.send(&data) {
            Ok(()) => trace!("Sent: {} | {}", format_hex(&data), message),
            Err(e) => warn!("⚠️  Failed to send {}: {}", message, e),
        }
    }
    debug!("Indicator writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_matching() {
        assert!(port_matches("X-Touch MIDI 1", "x-touch"));
        assert!(port_matches("Platform M+ V2.15", "Platform M+"));
        assert!(!port_matches("loopMIDI Port", "X-Touch"));
    }

    #[test]
    fn test_led_encoding() {
        let (indicator, mut rx) = LedIndicator::new(8);
        let key = ControlKey::new(1, 0x10);

        indicator.set_on(key, true);
        indicator.set_on(key, false);
        indicator.set_flashing(key, true);
        indicator.set_value(ControlKey::new(0, 0x30), 0x40);

        let sent: Vec<Vec<u8>> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|m| m.encode())
            .collect();
        assert_eq!(
            sent,
            vec![
                vec![0x91, 0x10, 0x7F],
                vec![0x91, 0x10, 0x00],
                vec![0x91, 0x10, 0x01],
                vec![0xB0, 0x30, 0x40],
            ]
        );
    }

    #[test]
    fn test_full_queue_drops_updates() {
        let (indicator, mut rx) = LedIndicator::new(1);
        let key = ControlKey::new(0, 1);

        indicator.set_on(key, true);
        indicator.set_on(key, false);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_port_listing_does_not_panic() {
        // No MIDI system in CI is fine, only panics are failures
        let _ = list_ports();
    }
}
