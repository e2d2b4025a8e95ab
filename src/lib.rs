//! TCI Surface GW - drive an SDR transceiver from a MIDI control surface
//!
//! Surface events are routed by a [`dispatcher::Dispatcher`] to controls
//! built from the configured mappings. Controls send commands to the radio
//! and follow the state the radio confirms; indicators on the surface only
//! ever show confirmed state.

pub mod config;
pub mod control;
pub mod dispatcher;
pub mod mapping;
pub mod midi;
pub mod paths;
pub mod radio;
pub mod surface;
