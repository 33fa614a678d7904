//! Firmware entry point: brings up the four-microphone TDM I2S front-end,
//! the ToF/IR/stepper/console peripherals, and spawns the three execution
//! contexts the core's concurrency model calls for — the mic DMA callback
//! thread, the analysis task, and the periodic motion task. Generalized
//! from the teacher's single-threaded I2S-to-FFT loop into that
//! three-thread model; peripheral bring-up keeps the teacher's own phase
//! order (`link_patches` -> `EspLogger::initialize_default` ->
//! `Peripherals::take` -> per-peripheral driver init -> spawn worker
//! threads).

mod esp_drivers;

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_hal::cpu::Core;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyIOPin, PinDriver};
use esp_idf_hal::i2s::config::{
    Config as I2sConfig, DataBitWidth, SlotMode, TdmClkConfig, TdmConfig, TdmGpioConfig, TdmSlotConfig,
};
use esp_idf_hal::i2s::I2sDriver;
use esp_idf_hal::ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::prelude::*;
use esp_idf_hal::task::thread::ThreadSpawnConfiguration;
use esp_idf_hal::uart::{config::Config as UartConfig, UartDriver};
use esp_idf_svc::log::EspLogger;
use log::{error, info};

use penguin_mother::constants::{SAMPLE_RATE_HZ, T_CTRL_MS};
use penguin_mother::mission::MissionFsm;
use penguin_mother::motion::{MotionController, ObstacleNotifier, SharedMotion};
use penguin_mother::pcm::{AudioFront, MicBuffers};
use penguin_mother::spectral::SpectralCore;

use esp_drivers::{init_tof_i2c, EspBodyLed, EspConsole, EspPredatorLeds, EspSensors, EspWheels};

/// Single-slot mailbox handing a completed scan window from the audio
/// producer to the analysis task, "latest wins" — the same discipline
/// `pcm::AudioFront` itself uses for mid-window overwrites, just lifted
/// one level up to the inter-task handoff.
struct FrameMailbox {
    slot: Mutex<Option<MicBuffers>>,
    ready: Condvar,
}

impl FrameMailbox {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        })
    }

    fn publish(&self, frame: MicBuffers) {
        let mut slot = self.slot.lock().unwrap();
        *slot = Some(frame);
        self.ready.notify_one();
    }

    fn take(&self) -> MicBuffers {
        let mut slot = self.slot.lock().unwrap();
        loop {
            if let Some(frame) = slot.take() {
                return frame;
            }
            slot = self.ready.wait(slot).unwrap();
        }
    }
}

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();
    info!("penguin-mother firmware starting...");

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    // Four-channel TDM I2S capture: [R, L, B, F] interleaved, 16 kHz, 16-bit.
    let clock_config = TdmClkConfig::from_sample_rate_hz(SAMPLE_RATE_HZ);
    let slot_config = TdmSlotConfig::philips_slot_default(DataBitWidth::Bits16, SlotMode::Mono)
        .slot_mask(0b1111); // all four TDM slots active
    let tdm_config = TdmConfig::new(I2sConfig::default(), clock_config, slot_config, TdmGpioConfig::default());
    let mut i2s = I2sDriver::new_tdm_rx(
        peripherals.i2s0,
        &tdm_config,
        pins.gpio25, // BCLK
        pins.gpio26, // DIN
        None::<AnyIOPin>,
        pins.gpio27, // WS
    )?;
    i2s.rx_enable()?;
    info!("4-channel TDM I2S mic array initialized at {} Hz", SAMPLE_RATE_HZ);

    // ToF + IR sensors.
    let tof_i2c = init_tof_i2c(peripherals.i2c0, pins.gpio21.into(), pins.gpio22.into())?;
    let adc = AdcDriver::new(peripherals.adc1)?;
    let adc = Arc::new(adc);
    let ir_front_right = AdcChannelDriver::new(adc.clone(), pins.gpio34, &Default::default())?;
    let ir_right = AdcChannelDriver::new(adc.clone(), pins.gpio35, &Default::default())?;
    let ir_left = AdcChannelDriver::new(adc.clone(), pins.gpio32, &Default::default())?;
    let ir_front_left = AdcChannelDriver::new(adc, pins.gpio33, &Default::default())?;
    let sensors = EspSensors::new(tof_i2c, ir_front_right, ir_right, ir_left, ir_front_left);

    // Stepper wheels via LEDC PWM + direction pins.
    let left_timer = LedcTimerDriver::new(peripherals.ledc.timer0, &TimerConfig::new().frequency(2.kHz().into()))?;
    let left_pwm = LedcDriver::new(peripherals.ledc.channel0, left_timer, pins.gpio18)?;
    let right_timer = LedcTimerDriver::new(peripherals.ledc.timer1, &TimerConfig::new().frequency(2.kHz().into()))?;
    let right_pwm = LedcDriver::new(peripherals.ledc.channel1, right_timer, pins.gpio19)?;
    let left_dir = PinDriver::output(pins.gpio5.into())?;
    let right_dir = PinDriver::output(pins.gpio17.into())?;
    let wheels = EspWheels::new(left_pwm, right_pwm, left_dir, right_dir);

    // Console over UART.
    let uart = UartDriver::new(
        peripherals.uart1,
        pins.gpio1,
        pins.gpio3,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &UartConfig::new().baudrate(Hertz(115_200)),
    )?;
    let console = EspConsole::new(uart);

    // LEDs: one body LED, four predator-evade LEDs.
    let body_led = EspBodyLed::new(PinDriver::output(pins.gpio2.into())?);
    let evade_leds = EspPredatorLeds::new([
        PinDriver::output(pins.gpio4.into())?,
        PinDriver::output(pins.gpio16.into())?,
        PinDriver::output(pins.gpio23.into())?,
        PinDriver::output(pins.gpio15.into())?,
    ]);

    let mailbox = FrameMailbox::new();
    let shared_motion = SharedMotion::new();
    let (obstacle_notifier, obstacle_rx) = ObstacleNotifier::channel();

    spawn_audio_thread(i2s, mailbox.clone());
    spawn_motion_thread(sensors, wheels, shared_motion.clone(), obstacle_notifier);
    spawn_analysis_thread(mailbox, shared_motion, obstacle_rx, console, body_led, evade_leds);

    loop {
        FreeRtos::delay_ms(1000);
    }
}

/// Audio producer: the mic driver's callback context. Runs `AudioFront`
/// and must not block beyond the I2S read itself or allocate per frame.
fn spawn_audio_thread(mut i2s: I2sDriver<'static>, mailbox: Arc<FrameMailbox>) {
    let config = ThreadSpawnConfiguration {
        name: Some(b"audio producer\0"),
        priority: 10,
        pin_to_core: Some(Core::Core0),
        ..Default::default()
    };
    config.set().expect("failed to set audio thread configuration");

    thread::Builder::new()
        .stack_size(8192)
        .name("audio-producer".into())
        .spawn(move || {
            let mut front = AudioFront::new();
            let mut raw = [0u8; 1280]; // PCM_FRAME_LEN * 2 bytes/sample
            loop {
                match i2s.read(&mut raw, 100) {
                    Ok(bytes_read) => {
                        let samples: Vec<i16> = raw[..bytes_read]
                            .chunks_exact(2)
                            .map(|b| i16::from_le_bytes([b[0], b[1]]))
                            .collect();
                        if let Some(frame) = front.on_pcm(&samples) {
                            mailbox.publish(frame);
                        }
                    }
                    Err(e) => error!("I2S read error: {:?}", e),
                }
            }
        })
        .expect("failed to spawn audio producer thread");
}

/// Motion task: periodic at `T_CTRL_MS`, owns the wheel/sensor drivers.
fn spawn_motion_thread<S, W>(sensors: S, wheels: W, shared: Arc<SharedMotion>, notifier: ObstacleNotifier)
where
    S: penguin_mother::drivers::SensorDriver + 'static,
    W: penguin_mother::drivers::WheelDriver + 'static,
{
    let config = ThreadSpawnConfiguration {
        name: Some(b"motion\0"),
        priority: 9,
        pin_to_core: Some(Core::Core1),
        ..Default::default()
    };
    config.set().expect("failed to set motion thread configuration");

    thread::Builder::new()
        .stack_size(4096)
        .name("motion".into())
        .spawn(move || {
            let mut controller = MotionController::new(sensors, wheels, shared, notifier);
            loop {
                controller.tick();
                FreeRtos::delay_ms(T_CTRL_MS as u32);
            }
        })
        .expect("failed to spawn motion thread");
}

/// Analysis/mission task: blocks on the buffer-ready mailbox, runs
/// SpectralCore -> BearingEstimator/SourceTracker -> MissionFsm each edge.
fn spawn_analysis_thread<C, L, P>(
    mailbox: Arc<FrameMailbox>,
    shared: Arc<SharedMotion>,
    obstacle_rx: std::sync::mpsc::Receiver<()>,
    console: C,
    body_led: L,
    evade_leds: P,
) where
    C: penguin_mother::drivers::Console + 'static,
    L: penguin_mother::drivers::BodyLed + 'static,
    P: penguin_mother::drivers::PredatorLeds + 'static,
{
    thread::Builder::new()
        .stack_size(16384)
        .name("analysis".into())
        .spawn(move || {
            let core = SpectralCore::new();
            let mut fsm = MissionFsm::new(shared, obstacle_rx, console, body_led, evade_leds);
            fsm.boot();
            loop {
                let mut window = mailbox.take();
                let scan = core.scan(&mut window);
                fsm.on_scan(&window, &scan);
                thread::sleep(Duration::from_millis(0));
            }
        })
        .expect("failed to spawn analysis thread");
}
