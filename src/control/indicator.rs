//! Indicator sink - LEDs, LED rings and motor faders on the surface
//!
//! Controls never drive an indicator from a local press or turn; they only
//! reflect what the radio confirmed.

use super::ControlKey;

/// Capability set of the surface's indicators, keyed by control identity
pub trait Indicator: Send + Sync {
    /// Switch a binary indicator on or off
    fn set_on(&self, key: ControlKey, on: bool);

    /// Let a binary indicator flash (or stop flashing)
    fn set_flashing(&self, key: ControlKey, flashing: bool);

    /// Drive an analog indicator with a raw 7-bit value
    fn set_value(&self, key: ControlKey, value: u8);
}

/// Indicator that ignores everything
///
/// Used for controls without a display and for surfaces without an output port.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndicator;

impl Indicator for NoIndicator {
    fn set_on(&self, _key: ControlKey, _on: bool) {}

    fn set_flashing(&self, _key: ControlKey, _flashing: bool) {}

    fn set_value(&self, _key: ControlKey, _value: u8) {}
}
