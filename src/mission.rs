//! MissionFsm: the procedural state machine that turns scan results into
//! user-facing behavior — prompting for a target, pursuing it, announcing
//! arrival or loss, and evading a predator tone. Grounded on the source
//! firmware's `main.c` (`communicationUser`, `moveTowardsTarget`,
//! `escapeKiller`, `printSources`, `destinationReached`).
//!
//! Each state's action happens the instant it is entered rather than on a
//! later call: `Lost` and `PenguinReached` run their whole exit sequence
//! and hand control straight back to `Scanning` within the same
//! `on_scan()` call, and `UserPrompt` blocks on the console until it has a
//! decision, exactly as the original single-threaded main loop did.

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::bearing::BearingEstimator;
use crate::constants::{PREDATOR_HZ_HIGH, PREDATOR_HZ_LOW};
use crate::drivers::{BodyLed, Console};
use crate::evade_indicator::EvadeIndicator;
use crate::motion::SharedMotion;
use crate::pcm::MicBuffers;
use crate::spectral::{bin_to_hz, hz_to_bin, ScanResult, Source};
use crate::tracker::SourceTracker;

/// Printed at boot, matching the original firmware's welcome banner.
pub const BOOT_BANNER: &str = "\
Welcome to penguin-mother!
Our robot-penguin-mother tries to feed their children by following the \
sound of fish swimming nearby. Help her find a fish, but watch out for \
the killer whale's call -- she'll flee from that one.";

const OBSTACLE_WAIT_AFTER_REACHED: Duration = Duration::from_millis(1500);
const OBSTACLE_BACKUP_DURATION: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionState {
    Idle,
    Scanning,
    UserPrompt,
    Pursuing,
    Evading,
}

/// Drives the robot's behavior from scan to scan. Runs on the analysis
/// task: it owns the `BearingEstimator`/`SourceTracker` core state and
/// talks to the motion task only through `SharedMotion` and the
/// obstacle-reached receiver, never touching the wheels directly.
pub struct MissionFsm<C, L, P> {
    state: MissionState,
    pre_evade_state: MissionState,
    bearing: BearingEstimator,
    tracker: SourceTracker,
    shared: Arc<SharedMotion>,
    obstacle_rx: Receiver<()>,
    console: C,
    body_led: L,
    evade_leds: Option<P>,
    evade_indicator: Option<EvadeIndicator<P>>,
}

impl<C: Console, L: BodyLed, P: crate::drivers::PredatorLeds + 'static> MissionFsm<C, L, P> {
    pub fn new(shared: Arc<SharedMotion>, obstacle_rx: Receiver<()>, console: C, body_led: L, evade_leds: P) -> Self {
        Self {
            state: MissionState::Idle,
            pre_evade_state: MissionState::Idle,
            bearing: BearingEstimator::new(),
            tracker: SourceTracker::new(),
            shared,
            obstacle_rx,
            console,
            body_led,
            evade_leds: Some(evade_leds),
            evade_indicator: None,
        }
    }

    pub fn state(&self) -> MissionState {
        self.state
    }

    pub fn boot(&mut self) {
        self.console.print_line(BOOT_BANNER);
        self.state = MissionState::Scanning;
    }

    /// Feeds one scan's worth of frequency-domain data and peak list
    /// through the FSM, advancing it by however many transitions are
    /// "automatic" for the current state.
    pub fn on_scan(&mut self, buffers: &MicBuffers, scan: &ScanResult) {
        if self.state == MissionState::Idle {
            self.boot();
        }

        if let Some(predator) = find_predator(scan) {
            self.enter_evading(predator, buffers);
            return;
        } else if self.state == MissionState::Evading {
            self.leave_evading();
        }

        match self.state {
            MissionState::Idle | MissionState::Evading => unreachable!("handled above"),
            MissionState::Scanning => {
                self.print_sources(buffers, scan);
                self.state = MissionState::UserPrompt;
                self.run_user_prompt(buffers, scan);
            }
            MissionState::UserPrompt => {
                self.run_user_prompt(buffers, scan);
            }
            MissionState::Pursuing => self.pursue(buffers, scan),
        }
    }

    /// Blocks on the console until the operator picks a source or asks for
    /// a rescan, exactly as the original single-threaded loop did.
    fn run_user_prompt(&mut self, buffers: &MicBuffers, scan: &ScanResult) {
        loop {
            self.console
                .print_line("Please enter the number of the penguin you want to go to or enter 'r' to rescan penguins.");
            let line = self.console.read_line();
            let trimmed = line.trim();

            if trimmed == "r" {
                self.state = MissionState::Scanning;
                return;
            }

            match trimmed.parse::<usize>() {
                Ok(idx) if idx < scan.len() => {
                    let source = scan.as_slice()[idx];
                    match self.bearing.update(buffers, source.freq_bin) {
                        Ok(deg) => {
                            self.tracker.acquire(source, deg);
                            self.shared.go_to_angle(deg.round() as i16);
                            self.state = MissionState::Pursuing;
                            return;
                        }
                        Err(_) => {
                            self.console.print_line("could not estimate a bearing for that source, try again");
                        }
                    }
                }
                _ => {
                    self.console
                        .print_line("please enter a valid penguin number, or 'r' to rescan");
                }
            }
        }
    }

    fn pursue(&mut self, buffers: &MicBuffers, scan: &ScanResult) {
        if self.obstacle_rx.try_recv().is_ok() {
            self.destination_reached();
            return;
        }

        match self.tracker.match_source(scan) {
            Ok(source) => match self.bearing.update(buffers, source.freq_bin) {
                Ok(deg) => {
                    self.tracker.refresh(source, deg);
                    self.shared.go_to_angle(deg.round() as i16);
                }
                Err(_) => self.lost(),
            },
            Err(_) => self.lost(),
        }
    }

    /// `PenguinReached`: LED on, wait, back up, wait, stop, LED off, then
    /// straight back to `Scanning` — matches `main.c`'s `destinationReached`.
    fn destination_reached(&mut self) {
        self.console.print_line("destination reached");
        self.body_led.set(true);
        thread::sleep(OBSTACLE_WAIT_AFTER_REACHED);
        self.shared.request_move_backwards();
        thread::sleep(OBSTACLE_BACKUP_DURATION);
        self.shared.stop_moving();
        self.body_led.set(false);

        self.tracker.clear();
        self.bearing.reset();
        self.state = MissionState::Scanning;
    }

    /// `Lost`: print, stop, straight back to `Scanning`.
    fn lost(&mut self) {
        self.console.print_line("source not available anymore, please select a new one");
        self.shared.stop_moving();
        self.tracker.clear();
        self.bearing.reset();
        self.state = MissionState::Scanning;
    }

    fn enter_evading(&mut self, predator: Source, buffers: &MicBuffers) {
        let predator_deg = crate::bearing::raw_bearing_deg(buffers, predator.freq_bin)
            .map(|d| d.round() as i16)
            .unwrap_or(0);
        let opposite = wrap_deg_i16(predator_deg + 180);

        if self.state != MissionState::Evading {
            self.pre_evade_state = self.state;
            self.console
                .print_line(&format!("predator tone detected at {:.0} Hz, evading", bin_to_hz(predator.freq_bin)));
            if let Some(leds) = self.evade_leds.take() {
                self.evade_indicator = Some(EvadeIndicator::spawn(leds));
            }
            self.state = MissionState::Evading;
        }

        // Steer away from the predator's current bearing, re-issued each
        // scan while evasion continues (the predator may keep moving).
        self.shared.go_to_angle(opposite);
    }

    fn leave_evading(&mut self) {
        if let Some(indicator) = self.evade_indicator.take() {
            self.evade_leds = Some(indicator.stop());
        }
        self.shared.stop_moving();
        self.state = self.pre_evade_state;
        if self.state == MissionState::Idle {
            self.state = MissionState::Scanning;
        }
    }

    fn print_sources(&mut self, buffers: &MicBuffers, scan: &ScanResult) {
        if scan.is_empty() {
            self.console.print_line("no sources detected");
            return;
        }
        for (i, source) in scan.as_slice().iter().enumerate() {
            let angle = crate::bearing::raw_bearing_deg(buffers, source.freq_bin)
                .map(|d| d.round() as i16)
                .unwrap_or(0);
            self.console.print_line(&format!(
                "Source {}: frequency ={:.0} angle ={}",
                i,
                bin_to_hz(source.freq_bin),
                angle,
            ));
        }
    }
}

fn wrap_deg_i16(deg: i16) -> i16 {
    let mut d = deg % 360;
    if d > 180 {
        d -= 360;
    } else if d < -180 {
        d += 360;
    }
    d
}

/// True when any scanned source falls in the predator band.
fn find_predator(scan: &ScanResult) -> Option<Source> {
    let low_bin = hz_to_bin(PREDATOR_HZ_HIGH);
    let high_bin = hz_to_bin(PREDATOR_HZ_LOW);
    scan.as_slice()
        .iter()
        .find(|s| s.freq_bin >= low_bin && s.freq_bin <= high_bin)
        .copied()
}
