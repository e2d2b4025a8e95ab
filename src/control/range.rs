//! Value ranges - conversion between raw 7-bit control values and domain values
//!
//! A physical control reports 0-127. The radio expects dB, Hz offsets, words per
//! minute and so on. A [`ValueRange`] maps one onto the other and back again so
//! that indicators (LED rings, motor faders) can display the confirmed value.

/// Highest raw value carried by a 7-bit MIDI data byte
pub const RAW_MAX: u8 = 0x7F;

/// Number of distinct raw values
const RAW_STEPS: f64 = 128.0;

/// Domain range of a control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRange {
    /// Bounded range `[min, max]`, `max >= min`
    Static { min: i32, max: i32 },
    /// Unbounded range, raw values pass through unchanged
    Infinite,
}

impl ValueRange {
    /// Create a bounded range, swapping the bounds if they are given in the wrong order
    pub const fn new(min: i32, max: i32) -> Self {
        if max >= min {
            ValueRange::Static { min, max }
        } else {
            ValueRange::Static { min: max, max: min }
        }
    }

    /// Lower bound (0 for the identity range)
    pub fn min(&self) -> i32 {
        match *self {
            ValueRange::Static { min, .. } => min,
            ValueRange::Infinite => 0,
        }
    }

    /// Upper bound (0 for the identity range)
    pub fn max(&self) -> i32 {
        match *self {
            ValueRange::Static { max, .. } => max,
            ValueRange::Infinite => 0,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, ValueRange::Infinite)
    }

    /// Domain units covered by one raw step
    pub fn tick(&self) -> f64 {
        match *self {
            ValueRange::Static { min, max } => (max as f64 - min as f64 + 1.0) / RAW_STEPS,
            ValueRange::Infinite => 1.0,
        }
    }

    /// Map a raw control value onto the domain
    ///
    /// The result is clamped into the range to absorb rounding overshoot at the
    /// top of the raw scale.
    pub fn translate(&self, raw: u8) -> i32 {
        match *self {
            ValueRange::Static { min, max } => {
                let offset = (raw as f64 * self.tick()).floor() as i32;
                min.saturating_add(offset).clamp(min, max)
            }
            ValueRange::Infinite => raw as i32,
        }
    }

    /// Map a domain value back onto the raw scale
    pub fn project(&self, value: i32) -> u8 {
        match *self {
            ValueRange::Static { min, max } => {
                if value < min {
                    return 0;
                }
                if value > max {
                    return RAW_MAX;
                }
                let raw = ((value as f64 - min as f64) / self.tick()).ceil();
                raw.min(RAW_MAX as f64) as u8
            }
            ValueRange::Infinite => (value & RAW_MAX as i32) as u8,
        }
    }

    /// Clamp a domain value into the range (identity range leaves it untouched)
    pub fn trim(&self, value: i32) -> i32 {
        match *self {
            ValueRange::Static { min, max } => value.clamp(min, max),
            ValueRange::Infinite => value,
        }
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        ValueRange::Infinite
    }
}
