//! Radio collaborators - outbound commands and confirmed state
//!
//! The gateway talks to the transceiver through [`RadioController`], one
//! method per domain action. The transceiver reports its actual state back
//! as [`RadioEvent`]s on a [`ConfirmationBus`]; those reports are not
//! necessarily answers to our own commands (another client or the operator
//! at the radio may have changed something).

pub mod simulated;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use tokio::sync::broadcast;

pub use simulated::SimulatedRadio;

/// Capacity of the confirmation broadcast channel
pub const CONFIRMATION_CAPACITY: usize = 256;

/// Transceiver index (TRX 0, TRX 1, ...)
pub type Trx = u8;

/// VFO selector within a transceiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vfo {
    A,
    B,
}

impl FromStr for Vfo {
    type Err = UnknownVfo;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" | "VFOA" => Ok(Vfo::A),
            "B" | "VFOB" => Ok(Vfo::B),
            _ => Err(UnknownVfo(s.to_string())),
        }
    }
}

impl fmt::Display for Vfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vfo::A => write!(f, "VFOA"),
            Vfo::B => write!(f, "VFOB"),
        }
    }
}

/// Error for an unparseable VFO name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0} is not a valid VFO, use VFOA or VFOB")]
pub struct UnknownVfo(pub String);

/// Demodulation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Am,
    Sam,
    Dsb,
    Lsb,
    Usb,
    Cw,
    Nfm,
    Wfm,
    Digl,
    Digu,
    Spec,
    Drm,
}

impl Mode {
    pub const ALL: [Mode; 12] = [
        Mode::Am,
        Mode::Sam,
        Mode::Dsb,
        Mode::Lsb,
        Mode::Usb,
        Mode::Cw,
        Mode::Nfm,
        Mode::Wfm,
        Mode::Digl,
        Mode::Digu,
        Mode::Spec,
        Mode::Drm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Am => "am",
            Mode::Sam => "sam",
            Mode::Dsb => "dsb",
            Mode::Lsb => "lsb",
            Mode::Usb => "usb",
            Mode::Cw => "cw",
            Mode::Nfm => "nfm",
            Mode::Wfm => "wfm",
            Mode::Digl => "digl",
            Mode::Digu => "digu",
            Mode::Spec => "spec",
            Mode::Drm => "drm",
        }
    }
}

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Mode::ALL
            .iter()
            .copied()
            .find(|mode| mode.as_str() == wanted)
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unparseable mode name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0} is not a known mode")]
pub struct UnknownMode(pub String);

/// State confirmed by the radio
///
/// Every variant carries the address fields (trx, vfo) needed to decide
/// which controls are interested in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    VfoFrequency { trx: Trx, vfo: Vfo, hz: i64 },
    Mode { trx: Trx, mode: Mode },
    RxVolume { trx: Trx, vfo: Vfo, db: i32 },
    RxBalance { trx: Trx, vfo: Vfo, balance: i32 },
    RxChannelEnable { trx: Trx, vfo: Vfo, enabled: bool },
    RxFilterBand { trx: Trx, min: i32, max: i32 },
    Volume { db: i32 },
    Mute { muted: bool },
    Tx { trx: Trx, enabled: bool },
    Tune { trx: Trx, enabled: bool },
    RitEnable { trx: Trx, enabled: bool },
    RitOffset { trx: Trx, hz: i32 },
    XitEnable { trx: Trx, enabled: bool },
    XitOffset { trx: Trx, hz: i32 },
    SplitEnable { trx: Trx, enabled: bool },
    CwMacrosSpeed { wpm: i32 },
}

/// Outbound command sink
///
/// Implementations apply their own timeouts; a returned error means the
/// command was dropped.
#[async_trait]
pub trait RadioController: Send + Sync {
    async fn set_vfo_frequency(&self, trx: Trx, vfo: Vfo, hz: i64) -> Result<()>;

    /// Read the current frequency of a VFO
    async fn vfo_frequency(&self, trx: Trx, vfo: Vfo) -> Result<i64>;

    async fn set_mode(&self, trx: Trx, mode: Mode) -> Result<()>;

    async fn set_rx_volume(&self, trx: Trx, vfo: Vfo, db: i32) -> Result<()>;

    async fn set_rx_balance(&self, trx: Trx, vfo: Vfo, balance: i32) -> Result<()>;

    async fn set_rx_channel_enable(&self, trx: Trx, vfo: Vfo, enabled: bool) -> Result<()>;

    async fn set_rx_filter_band(&self, trx: Trx, min: i32, max: i32) -> Result<()>;

    async fn set_volume(&self, db: i32) -> Result<()>;

    async fn set_mute(&self, muted: bool) -> Result<()>;

    async fn set_tx(&self, trx: Trx, enabled: bool) -> Result<()>;

    async fn set_tune(&self, trx: Trx, enabled: bool) -> Result<()>;

    async fn set_rit_enable(&self, trx: Trx, enabled: bool) -> Result<()>;

    async fn set_rit_offset(&self, trx: Trx, hz: i32) -> Result<()>;

    async fn set_xit_enable(&self, trx: Trx, enabled: bool) -> Result<()>;

    async fn set_xit_offset(&self, trx: Trx, hz: i32) -> Result<()>;

    async fn set_split_enable(&self, trx: Trx, enabled: bool) -> Result<()>;

    async fn set_cw_macros_speed(&self, wpm: i32) -> Result<()>;

    async fn send_cw_message(&self, trx: Trx, text: &str) -> Result<()>;

    async fn stop_cw(&self) -> Result<()>;
}

/// Broadcast channel carrying confirmed radio state
#[derive(Clone)]
pub struct ConfirmationBus {
    tx: broadcast::Sender<RadioEvent>,
}

impl ConfirmationBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CONFIRMATION_CAPACITY);
        Self { tx }
    }

    /// Publish a confirmation; having no subscriber is not an error
    pub fn publish(&self, event: RadioEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RadioEvent> {
        self.tx.subscribe()
    }
}

impl Default for ConfirmationBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use anyhow::bail;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Radio recording every command as a readable line
    #[derive(Default)]
    pub struct RecordingRadio {
        commands: Mutex<Vec<String>>,
        frequencies: Mutex<HashMap<(Trx, Vfo), i64>>,
        read_latency: Mutex<Duration>,
    }

    impl RecordingRadio {
        pub fn commands(&self) -> Vec<String> {
            self.commands.lock().clone()
        }

        pub fn set_frequency(&self, trx: Trx, vfo: Vfo, hz: i64) {
            self.frequencies.lock().insert((trx, vfo), hz);
        }

        /// Delay every frequency read by `latency`
        pub fn set_read_latency(&self, latency: Duration) {
            *self.read_latency.lock() = latency;
        }

        fn record(&self, command: String) -> Result<()> {
            self.commands.lock().push(command);
            Ok(())
        }
    }

    #[async_trait]
    impl RadioController for RecordingRadio {
        async fn set_vfo_frequency(&self, trx: Trx, vfo: Vfo, hz: i64) -> Result<()> {
            self.record(format!("vfo {} {} {}", trx, vfo, hz))
        }

        async fn vfo_frequency(&self, trx: Trx, vfo: Vfo) -> Result<i64> {
            let latency = *self.read_latency.lock();
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            match self.frequencies.lock().get(&(trx, vfo)) {
                Some(hz) => Ok(*hz),
                None => bail!("no frequency for trx{} {}", trx, vfo),
            }
        }

        async fn set_mode(&self, trx: Trx, mode: Mode) -> Result<()> {
            self.record(format!("mode {} {}", trx, mode))
        }

        async fn set_rx_volume(&self, trx: Trx, vfo: Vfo, db: i32) -> Result<()> {
            self.record(format!("rx_volume {} {} {}", trx, vfo, db))
        }

        async fn set_rx_balance(&self, trx: Trx, vfo: Vfo, balance: i32) -> Result<()> {
            self.record(format!("rx_balance {} {} {}", trx, vfo, balance))
        }

        async fn set_rx_channel_enable(&self, trx: Trx, vfo: Vfo, enabled: bool) -> Result<()> {
            self.record(format!("rx_channel_enable {} {} {}", trx, vfo, enabled))
        }

        async fn set_rx_filter_band(&self, trx: Trx, min: i32, max: i32) -> Result<()> {
            self.record(format!("rx_filter_band {} {} {}", trx, min, max))
        }

        async fn set_volume(&self, db: i32) -> Result<()> {
            self.record(format!("volume {}", db))
        }

        async fn set_mute(&self, muted: bool) -> Result<()> {
            self.record(format!("mute {}", muted))
        }

        async fn set_tx(&self, trx: Trx, enabled: bool) -> Result<()> {
            self.record(format!("tx {} {}", trx, enabled))
        }

        async fn set_tune(&self, trx: Trx, enabled: bool) -> Result<()> {
            self.record(format!("tune {} {}", trx, enabled))
        }

        async fn set_rit_enable(&self, trx: Trx, enabled: bool) -> Result<()> {
            self.record(format!("rit_enable {} {}", trx, enabled))
        }

        async fn set_rit_offset(&self, trx: Trx, hz: i32) -> Result<()> {
            self.record(format!("rit_offset {} {}", trx, hz))
        }

        async fn set_xit_enable(&self, trx: Trx, enabled: bool) -> Result<()> {
            self.record(format!("xit_enable {} {}", trx, enabled))
        }

        async fn set_xit_offset(&self, trx: Trx, hz: i32) -> Result<()> {
            self.record(format!("xit_offset {} {}", trx, hz))
        }

        async fn set_split_enable(&self, trx: Trx, enabled: bool) -> Result<()> {
            self.record(format!("split_enable {} {}", trx, enabled))
        }

        async fn set_cw_macros_speed(&self, wpm: i32) -> Result<()> {
            self.record(format!("cw_speed {}", wpm))
        }

        async fn send_cw_message(&self, trx: Trx, text: &str) -> Result<()> {
            self.record(format!("cw {} {}", trx, text))
        }

        async fn stop_cw(&self) -> Result<()> {
            self.record("stop_cw".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vfo_parsing() {
        assert_eq!("A".parse::<Vfo>().unwrap(), Vfo::A);
        assert_eq!("vfob".parse::<Vfo>().unwrap(), Vfo::B);
        assert_eq!(" VFOA ".parse::<Vfo>().unwrap(), Vfo::A);
        assert!("C".parse::<Vfo>().is_err());
        assert!("".parse::<Vfo>().is_err());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("CW".parse::<Mode>().unwrap(), Mode::Cw);
        assert_eq!(" digu ".parse::<Mode>().unwrap(), Mode::Digu);
        assert_eq!(Mode::Lsb.to_string(), "lsb");
        assert_eq!(
            "fm".parse::<Mode>().unwrap_err(),
            UnknownMode("fm".to_string())
        );
    }

    #[tokio::test]
    async fn test_confirmation_bus_fans_out() {
        let bus = ConfirmationBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(RadioEvent::Mute { muted: true });

        assert_eq!(first.recv().await.unwrap(), RadioEvent::Mute { muted: true });
        assert_eq!(second.recv().await.unwrap(), RadioEvent::Mute { muted: true });
    }
}
