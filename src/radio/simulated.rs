//! Simulated radio - logs every command and echoes the confirmation
//!
//! Lets the gateway run end to end against a surface without a transceiver:
//! every command is logged and, after a configurable delay, reported back on
//! the confirmation bus as if the radio had applied it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::{ConfirmationBus, Mode, RadioController, RadioEvent, Trx, Vfo};

/// Frequency both VFOs start on
const INITIAL_FREQUENCY: i64 = 7_000_000;

/// In-process stand-in for a transceiver
pub struct SimulatedRadio {
    name: String,
    bus: ConfirmationBus,
    confirm_delay: Duration,
    trx_count: u8,
    frequencies: Mutex<HashMap<(Trx, Vfo), i64>>,
    command_count: AtomicU64,
}

impl SimulatedRadio {
    pub fn new(
        name: impl Into<String>,
        bus: ConfirmationBus,
        confirm_delay: Duration,
        trx_count: u8,
    ) -> Self {
        let mut frequencies = HashMap::new();
        for trx in 0..trx_count {
            frequencies.insert((trx, Vfo::A), INITIAL_FREQUENCY);
            frequencies.insert((trx, Vfo::B), INITIAL_FREQUENCY);
        }
        Self {
            name: name.into(),
            bus,
            confirm_delay,
            trx_count,
            frequencies: Mutex::new(frequencies),
            command_count: AtomicU64::new(0),
        }
    }

    /// Publish the full initial state, as a radio does when a client connects
    pub fn announce(&self) {
        let mut events = vec![
            RadioEvent::Volume { db: -20 },
            RadioEvent::Mute { muted: false },
            RadioEvent::CwMacrosSpeed { wpm: 20 },
        ];
        for trx in 0..self.trx_count {
            events.extend([
                RadioEvent::Mode { trx, mode: Mode::Usb },
                RadioEvent::RxFilterBand {
                    trx,
                    min: 300,
                    max: 2700,
                },
                RadioEvent::Tx {
                    trx,
                    enabled: false,
                },
                RadioEvent::Tune {
                    trx,
                    enabled: false,
                },
                RadioEvent::RitEnable {
                    trx,
                    enabled: false,
                },
                RadioEvent::RitOffset { trx, hz: 0 },
                RadioEvent::XitEnable {
                    trx,
                    enabled: false,
                },
                RadioEvent::XitOffset { trx, hz: 0 },
                RadioEvent::SplitEnable {
                    trx,
                    enabled: false,
                },
            ]);
            for vfo in [Vfo::A, Vfo::B] {
                events.extend([
                    RadioEvent::VfoFrequency {
                        trx,
                        vfo,
                        hz: INITIAL_FREQUENCY,
                    },
                    RadioEvent::RxVolume { trx, vfo, db: 0 },
                    RadioEvent::RxBalance {
                        trx,
                        vfo,
                        balance: 0,
                    },
                    RadioEvent::RxChannelEnable {
                        trx,
                        vfo,
                        enabled: vfo == Vfo::A,
                    },
                ]);
            }
        }

        info!(
            "📡 Radio '{}' announcing {} state values",
            self.name,
            events.len()
        );
        for event in events {
            self.bus.publish(event);
        }
    }

    fn check_trx(&self, trx: Trx) -> Result<()> {
        if trx >= self.trx_count {
            anyhow::bail!("Radio '{}' has no trx{}", self.name, trx);
        }
        Ok(())
    }

    /// Log a command and schedule its confirmation
    fn apply(&self, command: &str, event: RadioEvent) -> Result<()> {
        let exec_num = self.command_count.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "🎮 [{}] Radio '{}' → {} [cmd #{}]",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            self.name,
            command,
            exec_num
        );
        debug!(radio = %self.name, event = ?event, "Simulated confirmation scheduled");

        if self.confirm_delay.is_zero() {
            self.bus.publish(event);
        } else {
            let bus = self.bus.clone();
            let delay = self.confirm_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                bus.publish(event);
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RadioController for SimulatedRadio {
    async fn set_vfo_frequency(&self, trx: Trx, vfo: Vfo, hz: i64) -> Result<()> {
        self.check_trx(trx)?;
        self.frequencies.lock().insert((trx, vfo), hz);
        self.apply(
            &format!("vfo trx{} {} {} Hz", trx, vfo, hz),
            RadioEvent::VfoFrequency { trx, vfo, hz },
        )
    }

    async fn vfo_frequency(&self, trx: Trx, vfo: Vfo) -> Result<i64> {
        self.frequencies
            .lock()
            .get(&(trx, vfo))
            .copied()
            .with_context(|| format!("Radio '{}' has no trx{} {}", self.name, trx, vfo))
    }

    async fn set_mode(&self, trx: Trx, mode: Mode) -> Result<()> {
        self.check_trx(trx)?;
        self.apply(
            &format!("mode trx{} {}", trx, mode),
            RadioEvent::Mode { trx, mode },
        )
    }

    async fn set_rx_volume(&self, trx: Trx, vfo: Vfo, db: i32) -> Result<()> {
        self.check_trx(trx)?;
        self.apply(
            &format!("rx volume trx{} {} {} dB", trx, vfo, db),
            RadioEvent::RxVolume { trx, vfo, db },
        )
    }

    async fn set_rx_balance(&self, trx: Trx, vfo: Vfo, balance: i32) -> Result<()> {
        self.check_trx(trx)?;
        self.apply(
            &format!("rx balance trx{} {} {}", trx, vfo, balance),
            RadioEvent::RxBalance { trx, vfo, balance },
        )
    }

    async fn set_rx_channel_enable(&self, trx: Trx, vfo: Vfo, enabled: bool) -> Result<()> {
        self.check_trx(trx)?;
        self.apply(
            &format!("rx enable trx{} {} {}", trx, vfo, enabled),
            RadioEvent::RxChannelEnable { trx, vfo, enabled },
        )
    }

    async fn set_rx_filter_band(&self, trx: Trx, min: i32, max: i32) -> Result<()> {
        self.check_trx(trx)?;
        self.apply(
            &format!("filter band trx{} {}..{} Hz", trx, min, max),
            RadioEvent::RxFilterBand { trx, min, max },
        )
    }

    async fn set_volume(&self, db: i32) -> Result<()> {
        self.apply(&format!("volume {} dB", db), RadioEvent::Volume { db })
    }

    async fn set_mute(&self, muted: bool) -> Result<()> {
        self.apply(&format!("mute {}", muted), RadioEvent::Mute { muted })
    }

    async fn set_tx(&self, trx: Trx, enabled: bool) -> Result<()> {
        self.check_trx(trx)?;
        self.apply(
            &format!("tx trx{} {}", trx, enabled),
            RadioEvent::Tx { trx, enabled },
        )
    }

    async fn set_tune(&self, trx: Trx, enabled: bool) -> Result<()> {
        self.check_trx(trx)?;
        self.apply(
            &format!("tune trx{} {}", trx, enabled),
            RadioEvent::Tune { trx, enabled },
        )
    }

    async fn set_rit_enable(&self, trx: Trx, enabled: bool) -> Result<()> {
        self.check_trx(trx)?;
        self.apply(
            &format!("rit trx{} {}", trx, enabled),
            RadioEvent::RitEnable { trx, enabled },
        )
    }

    async fn set_rit_offset(&self, trx: Trx, hz: i32) -> Result<()> {
        self.check_trx(trx)?;
        self.apply(
            &format!("rit offset trx{} {} Hz", trx, hz),
            RadioEvent::RitOffset { trx, hz },
        )
    }

    async fn set_xit_enable(&self, trx: Trx, enabled: bool) -> Result<()> {
        self.check_trx(trx)?;
        self.apply(
            &format!("xit trx{} {}", trx, enabled),
            RadioEvent::XitEnable { trx, enabled },
        )
    }

    async fn set_xit_offset(&self, trx: Trx, hz: i32) -> Result<()> {
        self.check_trx(trx)?;
        self.apply(
            &format!("xit offset trx{} {} Hz", trx, hz),
            RadioEvent::XitOffset { trx, hz },
        )
    }

    async fn set_split_enable(&self, trx: Trx, enabled: bool) -> Result<()> {
        self.check_trx(trx)?;
        self.apply(
            &format!("split trx{} {}", trx, enabled),
            RadioEvent::SplitEnable { trx, enabled },
        )
    }

    async fn set_cw_macros_speed(&self, wpm: i32) -> Result<()> {
        self.apply(
            &format!("cw speed {} wpm", wpm),
            RadioEvent::CwMacrosSpeed { wpm },
        )
    }

    async fn send_cw_message(&self, trx: Trx, text: &str) -> Result<()> {
        self.check_trx(trx)?;
        let exec_num = self.command_count.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "🎮 [{}] Radio '{}' → cw trx{} \"{}\" [cmd #{}]",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            self.name,
            trx,
            text,
            exec_num
        );
        Ok(())
    }

    async fn stop_cw(&self) -> Result<()> {
        let exec_num = self.command_count.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "🎮 [{}] Radio '{}' → stop cw [cmd #{}]",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            self.name,
            exec_num
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn radio(delay: Duration) -> (SimulatedRadio, ConfirmationBus) {
        let bus = ConfirmationBus::new();
        (SimulatedRadio::new("sim", bus.clone(), delay, 1), bus)
    }

    #[tokio::test]
    async fn test_command_is_confirmed() {
        let (radio, bus) = radio(Duration::ZERO);
        let mut confirmations = bus.subscribe();

        radio.set_mute(true).await.unwrap();
        assert_eq!(
            confirmations.recv().await.unwrap(),
            RadioEvent::Mute { muted: true }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_is_delayed() {
        let (radio, bus) = radio(Duration::from_millis(30));
        let mut confirmations = bus.subscribe();

        radio.set_rit_offset(0, 120).await.unwrap();
        assert!(confirmations.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(
            confirmations.try_recv().unwrap(),
            RadioEvent::RitOffset { trx: 0, hz: 120 }
        );
    }

    #[tokio::test]
    async fn test_frequency_model() {
        let (radio, _bus) = radio(Duration::ZERO);

        assert_eq!(radio.vfo_frequency(0, Vfo::B).await.unwrap(), INITIAL_FREQUENCY);
        radio.set_vfo_frequency(0, Vfo::B, 14_074_000).await.unwrap();
        assert_eq!(radio.vfo_frequency(0, Vfo::B).await.unwrap(), 14_074_000);
        assert!(radio.vfo_frequency(3, Vfo::A).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_trx_rejected() {
        let (radio, bus) = radio(Duration::ZERO);
        let mut confirmations = bus.subscribe();

        assert!(radio.set_tx(2, true).await.is_err());
        assert!(confirmations.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_announce_reports_every_toggle() {
        let (radio, bus) = radio(Duration::ZERO);
        let mut confirmations = bus.subscribe();

        radio.announce();

        let mut events = Vec::new();
        while let Ok(event) = confirmations.try_recv() {
            events.push(event);
        }
        assert!(events.contains(&RadioEvent::Mute { muted: false }));
        assert!(events.contains(&RadioEvent::SplitEnable {
            trx: 0,
            enabled: false
        }));
        assert!(events.contains(&RadioEvent::VfoFrequency {
            trx: 0,
            vfo: Vfo::A,
            hz: INITIAL_FREQUENCY
        }));
    }
}
