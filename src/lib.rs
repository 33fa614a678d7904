//! Host-testable core of the penguin-mother acoustic-tracking firmware:
//! PCM accumulation, spectral peak-picking, bearing estimation, source
//! tracking, motion control, and the mission state machine. None of these
//! modules touch `esp_idf_hal`/`esp_idf_svc` directly; `main.rs` wires them
//! to real ESP32 peripherals behind the `drivers` traits.

pub mod bearing;
pub mod constants;
pub mod drivers;
pub mod error;
pub mod evade_indicator;
pub mod mission;
pub mod motion;
pub mod pcm;
pub mod spectral;
pub mod tracker;
