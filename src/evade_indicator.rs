//! Peripheral LED blink shown while `MissionFsm` is in the `Evading`
//! state. Grounded on the source firmware's `main.c` `ThdLed`: round-robins
//! four LEDs with a fixed per-LED delay. Ambient indicator behavior, not
//! navigation logic — spawned when evasion begins and stopped when it ends,
//! the same way the teacher spawns its OLED display thread alongside (not
//! inside) the analysis loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::drivers::PredatorLeds;

const STEP_DELAY_MS: u64 = 150;
const NUM_LEDS: usize = 4;

/// Handle to a running blink loop, generic over the LED driver it took
/// ownership of. `stop` hands that driver back so the caller can reuse it
/// the next time evasion starts, instead of it being dropped with the
/// thread.
pub struct EvadeIndicator<L> {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<L>>,
}

impl<L: PredatorLeds + Send + 'static> EvadeIndicator<L> {
    /// Spawns the blink loop on a dedicated thread.
    pub fn spawn(mut leds: L) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = running.clone();

        let handle = thread::Builder::new()
            .stack_size(2048)
            .name("evade-leds".into())
            .spawn(move || {
                let mut step = 0usize;
                while running_thread.load(Ordering::Relaxed) {
                    leds.set_active(step % NUM_LEDS);
                    step += 1;
                    thread::sleep(Duration::from_millis(STEP_DELAY_MS));
                }
                leds.all_off();
                leds
            })
            .expect("failed to spawn evade-leds thread");

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Signals the loop to stop, waits for the LEDs to go dark, and hands
    /// the LED driver back.
    pub fn stop(mut self) -> L {
        self.running.store(false, Ordering::Relaxed);
        self.handle
            .take()
            .expect("stop called more than once")
            .join()
            .expect("evade-leds thread panicked")
    }
}

impl<L> Drop for EvadeIndicator<L> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}
