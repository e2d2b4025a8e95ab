//! Buttons - one outbound command per press
//!
//! Toggles flip the last flag the radio *confirmed*; presets send a fixed
//! value and light up while the radio reports exactly that value. Indicators
//! follow confirmations only, never the press itself.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Button, ControlKey, Indicator, Listener};
use crate::radio::{Mode, RadioController, RadioEvent, Trx, Vfo};

/// Flag flipped by a toggle button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleKind {
    Mute,
    Mox { trx: Trx },
    Tune { trx: Trx },
    Rit { trx: Trx },
    Xit { trx: Trx },
    Split { trx: Trx },
    RxEnable { trx: Trx, vfo: Vfo },
}

impl ToggleKind {
    /// The flag carried by a confirmation, if it is ours
    pub fn confirmed(&self, event: &RadioEvent) -> Option<bool> {
        match (*self, event) {
            (ToggleKind::Mute, RadioEvent::Mute { muted }) => Some(*muted),
            (ToggleKind::Mox { trx }, RadioEvent::Tx { trx: t, enabled })
            | (ToggleKind::Tune { trx }, RadioEvent::Tune { trx: t, enabled })
            | (ToggleKind::Rit { trx }, RadioEvent::RitEnable { trx: t, enabled })
            | (ToggleKind::Xit { trx }, RadioEvent::XitEnable { trx: t, enabled })
            | (ToggleKind::Split { trx }, RadioEvent::SplitEnable { trx: t, enabled })
                if trx == *t =>
            {
                Some(*enabled)
            }
            (
                ToggleKind::RxEnable { trx, vfo },
                RadioEvent::RxChannelEnable {
                    trx: t,
                    vfo: v,
                    enabled,
                },
            ) if trx == *t && vfo == *v => Some(*enabled),
            _ => None,
        }
    }

    async fn send(&self, radio: &dyn RadioController, flag: bool) -> Result<()> {
        match *self {
            ToggleKind::Mute => radio.set_mute(flag).await,
            ToggleKind::Mox { trx } => radio.set_tx(trx, flag).await,
            ToggleKind::Tune { trx } => radio.set_tune(trx, flag).await,
            ToggleKind::Rit { trx } => radio.set_rit_enable(trx, flag).await,
            ToggleKind::Xit { trx } => radio.set_xit_enable(trx, flag).await,
            ToggleKind::Split { trx } => radio.set_split_enable(trx, flag).await,
            ToggleKind::RxEnable { trx, vfo } => radio.set_rx_channel_enable(trx, vfo, flag).await,
        }
    }

    /// Show a confirmed flag on the button's LED
    fn render(&self, indicator: &dyn Indicator, key: ControlKey, flag: bool) {
        match self {
            // Lit while audio is on
            ToggleKind::Mute => indicator.set_on(key, !flag),
            ToggleKind::Mox { .. } => indicator.set_flashing(key, flag),
            _ => indicator.set_on(key, flag),
        }
    }
}

impl fmt::Display for ToggleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToggleKind::Mute => write!(f, "mute"),
            ToggleKind::Mox { trx } => write!(f, "mox trx{}", trx),
            ToggleKind::Tune { trx } => write!(f, "tune trx{}", trx),
            ToggleKind::Rit { trx } => write!(f, "rit trx{}", trx),
            ToggleKind::Xit { trx } => write!(f, "xit trx{}", trx),
            ToggleKind::Split { trx } => write!(f, "split trx{}", trx),
            ToggleKind::RxEnable { trx, vfo } => write!(f, "rx trx{} {}", trx, vfo),
        }
    }
}

/// Button flipping a confirmed flag
pub struct ToggleButton {
    key: ControlKey,
    kind: ToggleKind,
    radio: Arc<dyn RadioController>,
    indicator: Arc<dyn Indicator>,
    /// Last confirmed flag, unknown until the radio reported it
    confirmed: Mutex<Option<bool>>,
}

impl ToggleButton {
    pub fn new(
        key: ControlKey,
        kind: ToggleKind,
        radio: Arc<dyn RadioController>,
        indicator: Arc<dyn Indicator>,
    ) -> Self {
        Self {
            key,
            kind,
            radio,
            indicator,
            confirmed: Mutex::new(None),
        }
    }
}

impl Listener for ToggleButton {
    fn on_radio_event(&self, event: &RadioEvent) {
        if let Some(flag) = self.kind.confirmed(event) {
            *self.confirmed.lock() = Some(flag);
            self.kind.render(self.indicator.as_ref(), self.key, flag);
        }
    }
}

#[async_trait]
impl Button for ToggleButton {
    async fn pressed(&self) {
        let current = *self.confirmed.lock();
        let Some(current) = current else {
            warn!("⚠️  {} state not known yet, ignoring press on {}", self.kind, self.key);
            return;
        };

        debug!("{} → {}", self.kind, !current);
        if let Err(e) = self.kind.send(self.radio.as_ref(), !current).await {
            warn!("⚠️  Failed to switch {}: {:#}", self.kind, e);
        }
    }
}

/// Fixed value sent by a preset button
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preset {
    Mode { trx: Trx, mode: Mode },
    FilterBand { trx: Trx, min: i32, max: i32 },
    RxVolume { trx: Trx, vfo: Vfo, db: i32 },
    RxBalance { trx: Trx, vfo: Vfo, balance: i32 },
}

impl Preset {
    /// Whether a confirmation shows the preset as active; `None` if unrelated
    pub fn matches(&self, event: &RadioEvent) -> Option<bool> {
        match (self, event) {
            (Preset::Mode { trx, mode }, RadioEvent::Mode { trx: t, mode: m }) if trx == t => {
                Some(mode == m)
            }
            (
                Preset::FilterBand { trx, min, max },
                RadioEvent::RxFilterBand {
                    trx: t,
                    min: lo,
                    max: hi,
                },
            ) if trx == t => Some(min == lo && max == hi),
            (
                Preset::RxVolume { trx, vfo, db },
                RadioEvent::RxVolume {
                    trx: t,
                    vfo: v,
                    db: confirmed,
                },
            ) if trx == t && vfo == v => Some(db == confirmed),
            (
                Preset::RxBalance { trx, vfo, balance },
                RadioEvent::RxBalance {
                    trx: t,
                    vfo: v,
                    balance: confirmed,
                },
            ) if trx == t && vfo == v => Some(balance == confirmed),
            _ => None,
        }
    }

    async fn send(&self, radio: &dyn RadioController) -> Result<()> {
        match *self {
            Preset::Mode { trx, mode } => radio.set_mode(trx, mode).await,
            Preset::FilterBand { trx, min, max } => radio.set_rx_filter_band(trx, min, max).await,
            Preset::RxVolume { trx, vfo, db } => radio.set_rx_volume(trx, vfo, db).await,
            Preset::RxBalance { trx, vfo, balance } => {
                radio.set_rx_balance(trx, vfo, balance).await
            }
        }
    }
}

/// Button sending a fixed value
pub struct PresetButton {
    key: ControlKey,
    preset: Preset,
    radio: Arc<dyn RadioController>,
    indicator: Arc<dyn Indicator>,
}

impl PresetButton {
    pub fn new(
        key: ControlKey,
        preset: Preset,
        radio: Arc<dyn RadioController>,
        indicator: Arc<dyn Indicator>,
    ) -> Self {
        Self {
            key,
            preset,
            radio,
            indicator,
        }
    }
}

impl Listener for PresetButton {
    fn on_radio_event(&self, event: &RadioEvent) {
        if let Some(active) = self.preset.matches(event) {
            self.indicator.set_on(self.key, active);
        }
    }
}

#[async_trait]
impl Button for PresetButton {
    async fn pressed(&self) {
        debug!("Preset {:?}", self.preset);
        if let Err(e) = self.preset.send(self.radio.as_ref()).await {
            warn!("⚠️  Failed to apply {:?}: {:#}", self.preset, e);
        }
    }
}

/// Stateless command issued by an action button
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Key a CW message
    SendCw { trx: Trx, text: String },
    /// Abort the CW message being keyed
    StopCw,
    /// Copy the frequency of one VFO (plus an offset) to another
    SyncVfo {
        trx: Trx,
        vfo: Vfo,
        src_trx: Trx,
        src_vfo: Vfo,
        offset: i64,
    },
}

impl Action {
    async fn execute(&self, radio: &dyn RadioController) -> Result<()> {
        match self {
            Action::SendCw { trx, text } => radio.send_cw_message(*trx, text).await,
            Action::StopCw => radio.stop_cw().await,
            Action::SyncVfo {
                trx,
                vfo,
                src_trx,
                src_vfo,
                offset,
            } => {
                let hz = radio
                    .vfo_frequency(*src_trx, *src_vfo)
                    .await
                    .with_context(|| format!("Failed to read frequency of trx{} {}", src_trx, src_vfo))?;
                radio.set_vfo_frequency(*trx, *vfo, hz + offset).await
            }
        }
    }
}

/// Button without state or indicator
pub struct ActionButton {
    key: ControlKey,
    action: Action,
    radio: Arc<dyn RadioController>,
}

impl ActionButton {
    pub fn new(key: ControlKey, action: Action, radio: Arc<dyn RadioController>) -> Self {
        Self { key, action, radio }
    }
}

impl Listener for ActionButton {}

#[async_trait]
impl Button for ActionButton {
    async fn pressed(&self) {
        debug!("Action {:?} on {}", self.action, self.key);
        if let Err(e) = self.action.execute(self.radio.as_ref()).await {
            warn!("⚠️  {:?} failed: {:#}", self.action, e);
        }
    }
}
