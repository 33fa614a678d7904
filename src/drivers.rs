//! Contracts for the collaborators this firmware consumes but does not
//! implement: the raw mic DMA driver, the ToF/IR sensor drivers, the
//! stepper driver, and the serial console. Out of scope per the system
//! spec; kept here as small traits so the core can be built and unit
//! tested on a host target, the same way the teacher firmware kept its
//! OLED/WiFi adapters (`display.rs`, `web_server.rs`) behind thin
//! functions wrapping `esp_idf_hal`/`esp_idf_svc` types instead of
//! calling into the HAL directly from the analysis logic.

use crate::constants::IrChannel;

/// Forward-range and infrared proximity readings, polled once per motion
/// control period.
pub trait SensorDriver: Send {
    /// Distance to the nearest obstacle in front of the robot, in mm. `0`
    /// during the ToF sensor's warm-up period.
    fn range_mm(&mut self) -> u16;
    /// Calibrated proximity reading for one IR channel; higher means nearer.
    fn ir_channel(&mut self, channel: IrChannel) -> i16;
}

/// The stepper wheel driver.
pub trait WheelDriver: Send {
    /// Commands both wheels. `left`/`right` are always within
    /// `[-MOTOR_LIMIT, +MOTOR_LIMIT]`.
    fn set_wheel_steps_per_second(&mut self, left: i16, right: i16);
}

/// Line-oriented serial console: printf-style writes and blocking
/// read-line, no binary framing.
pub trait Console: Send {
    fn print_line(&mut self, line: &str);
    /// Blocks until a full line (without its trailing newline) is available.
    fn read_line(&mut self) -> String;
}

/// The single body LED set during the `PenguinReached` sequence. Out of
/// scope per the acoustic/motion core contract, but part of a complete
/// firmware image (`main.c`'s `GPIOB_LED_BODY`).
pub trait BodyLed: Send {
    fn set(&mut self, on: bool);
}

/// The four peripheral LEDs blinked round-robin while evading a predator
/// tone (`main.c`'s `ThdLed`). Out of scope for the core's contract.
pub trait PredatorLeds: Send {
    /// Lights exactly one of the four LEDs, indexed `0..4`, all others off.
    fn set_active(&mut self, index: usize);
    fn all_off(&mut self);
}
