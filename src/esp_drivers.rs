//! ESP-IDF adapters that implement the `drivers` trait contracts over real
//! peripherals: ToF + IR over I2C/ADC, the stepper wheels over LEDC PWM,
//! the console over UART, and the two LED groups over plain GPIO. Kept out
//! of `lib.rs` the same way the teacher keeps `display.rs`/`web_server.rs`
//! as thin wrappers `main.rs` calls into rather than folding HAL calls into
//! the analysis logic itself.

use std::sync::Arc;

use anyhow::Result;
use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_hal::adc::ADC1;
use esp_idf_hal::gpio::{AnyIOPin, Gpio32, Gpio33, Gpio34, Gpio35, Output, PinDriver};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::ledc::LedcDriver;
use esp_idf_hal::prelude::*;
use esp_idf_hal::uart::UartDriver;
use log::warn;

use penguin_mother::constants::IrChannel;
use penguin_mother::drivers::{BodyLed, Console, PredatorLeds, SensorDriver, WheelDriver};

/// I2C register holding the ToF sensor's 16-bit range-in-mm reading.
const TOF_RANGE_REGISTER: u8 = 0x62;
const TOF_I2C_ADDR: u8 = 0x29;

/// ToF ranger over I2C plus four IR proximity channels over the on-chip ADC.
pub struct EspSensors<'a> {
    i2c: I2cDriver<'a>,
    ir_front_right: AdcChannelDriver<'a, Gpio34, Arc<AdcDriver<'a, ADC1>>>,
    ir_right: AdcChannelDriver<'a, Gpio35, Arc<AdcDriver<'a, ADC1>>>,
    ir_left: AdcChannelDriver<'a, Gpio32, Arc<AdcDriver<'a, ADC1>>>,
    ir_front_left: AdcChannelDriver<'a, Gpio33, Arc<AdcDriver<'a, ADC1>>>,
}

impl<'a> EspSensors<'a> {
    pub fn new(
        i2c: I2cDriver<'a>,
        ir_front_right: AdcChannelDriver<'a, Gpio34, Arc<AdcDriver<'a, ADC1>>>,
        ir_right: AdcChannelDriver<'a, Gpio35, Arc<AdcDriver<'a, ADC1>>>,
        ir_left: AdcChannelDriver<'a, Gpio32, Arc<AdcDriver<'a, ADC1>>>,
        ir_front_left: AdcChannelDriver<'a, Gpio33, Arc<AdcDriver<'a, ADC1>>>,
    ) -> Self {
        Self {
            i2c,
            ir_front_right,
            ir_right,
            ir_left,
            ir_front_left,
        }
    }
}

impl SensorDriver for EspSensors<'_> {
    fn range_mm(&mut self) -> u16 {
        let mut buf = [0u8; 2];
        match self.i2c.write_read(TOF_I2C_ADDR, &[TOF_RANGE_REGISTER], &mut buf, 50) {
            Ok(()) => u16::from_be_bytes(buf),
            Err(e) => {
                warn!("ToF read failed: {:?}", e);
                0
            }
        }
    }

    fn ir_channel(&mut self, channel: IrChannel) -> i16 {
        let reading = match channel {
            IrChannel::FrontRight => self.ir_front_right.read(),
            IrChannel::Right => self.ir_right.read(),
            IrChannel::Left => self.ir_left.read(),
            IrChannel::FrontLeft => self.ir_front_left.read(),
        };
        reading.map(|mv| mv as i16).unwrap_or(0)
    }
}

/// Two stepper wheels, each driven by a LEDC PWM channel whose frequency
/// encodes steps-per-second and whose direction pin carries the sign.
pub struct EspWheels<'a> {
    left_pwm: LedcDriver<'a>,
    right_pwm: LedcDriver<'a>,
    left_dir: PinDriver<'a, AnyIOPin, Output>,
    right_dir: PinDriver<'a, AnyIOPin, Output>,
}

impl<'a> EspWheels<'a> {
    pub fn new(
        left_pwm: LedcDriver<'a>,
        right_pwm: LedcDriver<'a>,
        left_dir: PinDriver<'a, AnyIOPin, Output>,
        right_dir: PinDriver<'a, AnyIOPin, Output>,
    ) -> Self {
        Self {
            left_pwm,
            right_pwm,
            left_dir,
            right_dir,
        }
    }

    fn drive_one(pwm: &mut LedcDriver<'_>, dir: &mut PinDriver<'_, AnyIOPin, Output>, sps: i16) {
        let _ = dir.set_level(if sps >= 0 { esp_idf_hal::gpio::Level::High } else { esp_idf_hal::gpio::Level::Low });
        let magnitude = (sps.unsigned_abs() as u32).min(penguin_mother::constants::MOTOR_LIMIT as u32);
        let duty = pwm.get_max_duty() as u64 * magnitude as u64 / penguin_mother::constants::MOTOR_LIMIT as u64;
        let _ = pwm.set_duty(duty as u32);
    }
}

impl WheelDriver for EspWheels<'_> {
    fn set_wheel_steps_per_second(&mut self, left: i16, right: i16) {
        Self::drive_one(&mut self.left_pwm, &mut self.left_dir, left);
        Self::drive_one(&mut self.right_pwm, &mut self.right_dir, right);
    }
}

/// Line-oriented console over a UART, matching the original firmware's
/// serial terminal link.
pub struct EspConsole<'a> {
    uart: UartDriver<'a>,
}

impl<'a> EspConsole<'a> {
    pub fn new(uart: UartDriver<'a>) -> Self {
        Self { uart }
    }
}

impl Console for EspConsole<'_> {
    fn print_line(&mut self, line: &str) {
        let mut out = line.as_bytes().to_vec();
        out.push(b'\n');
        let _ = self.uart.write(&out);
    }

    fn read_line(&mut self) -> String {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.uart.read(&mut byte, esp_idf_hal::delay::BLOCK) {
                Ok(_) if byte[0] == b'\n' => break,
                Ok(_) if byte[0] == b'\r' => continue,
                Ok(_) => line.push(byte[0]),
                Err(_) => break,
            }
        }
        String::from_utf8_lossy(&line).into_owned()
    }
}

/// The single body LED lit during the `PenguinReached` sequence.
pub struct EspBodyLed<'a> {
    pin: PinDriver<'a, AnyIOPin, Output>,
}

impl<'a> EspBodyLed<'a> {
    pub fn new(pin: PinDriver<'a, AnyIOPin, Output>) -> Self {
        Self { pin }
    }
}

impl BodyLed for EspBodyLed<'_> {
    fn set(&mut self, on: bool) {
        let _ = self.pin.set_level(if on { esp_idf_hal::gpio::Level::High } else { esp_idf_hal::gpio::Level::Low });
    }
}

/// The four peripheral LEDs blinked round-robin while evading.
pub struct EspPredatorLeds<'a> {
    pins: [PinDriver<'a, AnyIOPin, Output>; 4],
}

impl<'a> EspPredatorLeds<'a> {
    pub fn new(pins: [PinDriver<'a, AnyIOPin, Output>; 4]) -> Self {
        Self { pins }
    }
}

impl PredatorLeds for EspPredatorLeds<'_> {
    fn set_active(&mut self, index: usize) {
        for (i, pin) in self.pins.iter_mut().enumerate() {
            let _ = pin.set_level(if i == index { esp_idf_hal::gpio::Level::High } else { esp_idf_hal::gpio::Level::Low });
        }
    }

    fn all_off(&mut self) {
        for pin in self.pins.iter_mut() {
            let _ = pin.set_level(esp_idf_hal::gpio::Level::Low);
        }
    }
}

/// Builds an `I2cDriver` for the ToF sensor, matching the teacher's own
/// `I2cConfig::new().baudrate(...)` pattern in `display.rs`.
pub fn init_tof_i2c(i2c0: esp_idf_hal::i2c::I2C0, sda: AnyIOPin, scl: AnyIOPin) -> Result<I2cDriver<'static>> {
    let config = I2cConfig::new().baudrate(400.kHz().into());
    Ok(I2cDriver::new(i2c0, sda, scl, &config)?)
}

