//! MotionController: the 10ms periodic control law that steers the wheels
//! towards a target bearing while braking for obstacles. Grounded on the
//! source firmware's `travelController.c` (`travelControllerRoutine` and
//! its ToF/IR obstacle handling).
//!
//! Shared state between the analysis task (producer) and the motion task
//! (consumer) is two atomics plus a single-entry notification channel, the
//! same "latest wins, no queueing" discipline `pcm::AudioFront` uses for
//! frame handoff: whichever target angle or move-request was set most
//! recently is the one the next tick acts on.

use std::sync::atomic::{AtomicBool, AtomicI16, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;

use crate::constants::{
    IrChannel, DISCARD_N, EMA_WEIGHT_TOF, EMA_WEIGHT_WHEELS, INIT_MM, IR_STOP, MAX_CORR_DEG,
    MAX_DIFF_SPS, MAX_MM, MAX_SPS, MIN_SPS, MOTOR_LIMIT, STOP_MM,
};
use crate::drivers::{SensorDriver, WheelDriver};

/// State shared between whichever task decides where to go (the mission
/// FSM, running on the analysis task) and the motion task that owns the
/// wheels. A single machine word per field, `Relaxed` ordering: the motion
/// task only ever needs the latest value, never a causally ordered series.
pub struct SharedMotion {
    target_angle_deg: AtomicI16,
    moving: AtomicBool,
    /// Requests the one-off `move_backwards` bypass from a thread that
    /// does not own the wheel driver. Not part of spec.md's literal
    /// two-field shared state, but required since `MotionController`
    /// (and the wheel driver it owns) lives on the motion task while
    /// `move_backwards` is invoked by `MissionFsm` on the analysis task.
    backward_request: AtomicBool,
}

impl SharedMotion {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            target_angle_deg: AtomicI16::new(0),
            moving: AtomicBool::new(false),
            backward_request: AtomicBool::new(false),
        })
    }

    /// Sets the bearing to steer towards and starts (or keeps) the robot moving.
    pub fn go_to_angle(&self, angle_deg: i16) {
        self.target_angle_deg.store(angle_deg, Ordering::Relaxed);
        self.moving.store(true, Ordering::Relaxed);
    }

    /// Clears the moving flag. The next control tick commands the wheels
    /// to (0, 0) rather than merely skipping the wheel write, so the
    /// wheels reliably reach rest even if a command was in flight.
    pub fn stop_moving(&self) {
        self.moving.store(false, Ordering::Relaxed);
    }

    /// Requests the brief backward nudge used after destination-reached
    /// and while escaping a predator tone. Consumed by the very next tick.
    pub fn request_move_backwards(&self) {
        self.backward_request.store(true, Ordering::Relaxed);
    }
}

/// Single-entry mailbox used to notify the mission FSM that an obstacle (or
/// the destination) was reached, without the motion task blocking on a full
/// channel. Mirrors `pcm::AudioFront`'s "latest wins" handoff.
pub struct ObstacleNotifier {
    tx: SyncSender<()>,
}

impl ObstacleNotifier {
    pub fn channel() -> (Self, Receiver<()>) {
        let (tx, rx) = sync_channel(1);
        (Self { tx }, rx)
    }

    /// Non-blocking: if a notification is already pending, this one is
    /// dropped rather than queued, matching the "no queueing" mailbox rule.
    fn notify(&self) {
        let _ = self.tx.try_send(());
    }

    #[cfg(test)]
    pub fn notify_for_test(&self) {
        self.notify();
    }
}

/// Owns the wheel and sensor drivers and runs the periodic control law.
/// Exclusively owned by the motion task: its EMA state (`ema_range_mm`,
/// `ema_left_sps`, `ema_right_sps`) is never touched from any other thread.
pub struct MotionController<S, W> {
    sensors: S,
    wheels: W,
    shared: Arc<SharedMotion>,
    notifier: ObstacleNotifier,

    ema_range_mm: f32,
    discard_count: u32,
    ema_left_sps: f32,
    ema_right_sps: f32,
}

impl<S: SensorDriver, W: WheelDriver> MotionController<S, W> {
    pub fn new(sensors: S, wheels: W, shared: Arc<SharedMotion>, notifier: ObstacleNotifier) -> Self {
        Self {
            sensors,
            wheels,
            shared,
            notifier,
            ema_range_mm: INIT_MM as f32,
            discard_count: 0,
            ema_left_sps: 0.0,
            ema_right_sps: 0.0,
        }
    }

    /// Runs one `T_CTRL_MS`-period control step. Returns `true` if an
    /// obstacle/destination distance was reached this tick (and was
    /// reported via the notifier).
    pub fn tick(&mut self) -> bool {
        if self.shared.backward_request.swap(false, Ordering::Relaxed) {
            self.wheels.set_wheel_steps_per_second(-MAX_SPS, -MAX_SPS);
            return false;
        }

        if !self.shared.moving.load(Ordering::Relaxed) {
            // `stop_moving()` only flips the shared flag (it has no handle to
            // the wheel driver, which the motion task exclusively owns), so
            // the zero command it promises is issued here, on the very next
            // tick, and the EMA state is cleared to avoid a residual ramp
            // if the robot is sent off again immediately.
            self.ema_left_sps = 0.0;
            self.ema_right_sps = 0.0;
            self.wheels.set_wheel_steps_per_second(0, 0);
            return false;
        }

        let range = self.sensors.range_mm();
        if self.discard_count < DISCARD_N as u32 {
            self.discard_count += 1;
        } else {
            self.ema_range_mm = EMA_WEIGHT_TOF * self.ema_range_mm + (1.0 - EMA_WEIGHT_TOF) * range as f32;
        }

        let ir_hit = [
            IrChannel::FrontLeft,
            IrChannel::FrontRight,
            IrChannel::Left,
            IrChannel::Right,
        ]
        .iter()
        .any(|&ch| self.sensors.ir_channel(ch) > IR_STOP);

        if self.ema_range_mm <= STOP_MM as f32 || ir_hit {
            self.shared.stop_moving();
            self.wheels.set_wheel_steps_per_second(0, 0);
            self.notifier.notify();
            return true;
        }

        let target_angle = self.shared.target_angle_deg.load(Ordering::Relaxed);
        let theta = target_angle.clamp(-MAX_CORR_DEG, MAX_CORR_DEG);
        let diff_sps = MAX_DIFF_SPS as f32 * theta as f32 / MAX_CORR_DEG as f32;

        let forward = if target_angle.abs() >= MAX_CORR_DEG {
            0.0
        } else if self.ema_range_mm <= STOP_MM as f32 {
            0.0
        } else if self.ema_range_mm <= MAX_MM as f32 {
            MAX_SPS as f32 * (self.ema_range_mm - STOP_MM as f32) / (MAX_MM - STOP_MM) as f32
        } else {
            MAX_SPS as f32
        };

        let right_raw = forward - diff_sps;
        let left_raw = forward + diff_sps;

        self.ema_left_sps = EMA_WEIGHT_WHEELS * self.ema_left_sps + (1.0 - EMA_WEIGHT_WHEELS) * left_raw;
        self.ema_right_sps = EMA_WEIGHT_WHEELS * self.ema_right_sps + (1.0 - EMA_WEIGHT_WHEELS) * right_raw;

        let left = dead_zone_command(self.ema_left_sps);
        let right = dead_zone_command(self.ema_right_sps);
        self.wheels
            .set_wheel_steps_per_second(clamp_to_motor_limit(left), clamp_to_motor_limit(right));
        false
    }
}

/// Stepper dead-zone offset: a nonzero commanded speed is always bumped
/// away from zero by `MIN_SPS`, since the stepper driver stalls below it.
fn dead_zone_command(ema: f32) -> i16 {
    if ema > 0.0 {
        (ema + MIN_SPS as f32).round() as i16
    } else if ema < 0.0 {
        (ema - MIN_SPS as f32).round() as i16
    } else {
        0
    }
}

fn clamp_to_motor_limit(v: i16) -> i16 {
    v.clamp(-MOTOR_LIMIT, MOTOR_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSensors {
        range: u16,
        ir: i16,
    }
    impl SensorDriver for FakeSensors {
        fn range_mm(&mut self) -> u16 {
            self.range
        }
        fn ir_channel(&mut self, _channel: IrChannel) -> i16 {
            self.ir
        }
    }

    struct FakeWheels {
        last: (i16, i16),
    }
    impl WheelDriver for FakeWheels {
        fn set_wheel_steps_per_second(&mut self, left: i16, right: i16) {
            self.last = (left, right);
        }
    }

    fn make_controller(range: u16, ir: i16) -> (MotionController<FakeSensors, FakeWheels>, Receiver<()>) {
        let shared = SharedMotion::new();
        let (notifier, rx) = ObstacleNotifier::channel();
        let controller = MotionController::new(
            FakeSensors { range, ir },
            FakeWheels { last: (0, 0) },
            shared,
            notifier,
        );
        (controller, rx)
    }

    #[test]
    fn not_moving_commands_zero_wheels() {
        let (mut controller, _rx) = make_controller(200, 0);
        let reached = controller.tick();
        assert!(!reached);
        assert_eq!(controller.wheels.last, (0, 0));
    }

    #[test]
    fn moving_towards_zero_angle_drives_forward_symmetrically() {
        let (mut controller, _rx) = make_controller(200, 0);
        controller.shared.go_to_angle(0);
        for _ in 0..(DISCARD_N as u32 + 30) {
            controller.tick();
        }
        let (l, r) = controller.wheels.last;
        assert!(l > 0 && r > 0);
        assert_eq!(l, r);
    }

    #[test]
    fn large_angle_rotates_in_place() {
        let (mut controller, _rx) = make_controller(200, 0);
        controller.shared.go_to_angle(90);
        for _ in 0..(DISCARD_N as u32 + 30) {
            controller.tick();
        }
        let (l, r) = controller.wheels.last;
        // forward component should settle to 0, leaving opposite-signed wheels.
        assert!(l < 0 && r > 0 || l > 0 && r < 0);
    }

    #[test]
    fn wheel_commands_never_exceed_motor_limit() {
        let (mut controller, _rx) = make_controller(350, 0);
        controller.shared.go_to_angle(179);
        for _ in 0..(DISCARD_N as u32 + 40) {
            controller.tick();
        }
        let (l, r) = controller.wheels.last;
        assert!(l.abs() <= MOTOR_LIMIT && r.abs() <= MOTOR_LIMIT);
    }

    #[test]
    fn ir_hit_stops_and_notifies_exactly_once() {
        let (mut controller, rx) = make_controller(300, IR_STOP + 1);
        controller.shared.go_to_angle(0);
        let reached = controller.tick();
        assert!(reached);
        assert_eq!(controller.wheels.last, (0, 0));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn close_tof_range_eventually_stops() {
        let (mut controller, rx) = make_controller(10, 0);
        controller.shared.go_to_angle(0);
        let mut reached = false;
        for _ in 0..(DISCARD_N as u32 + 5) {
            if controller.tick() {
                reached = true;
                break;
            }
        }
        assert!(reached);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn backward_request_is_consumed_once() {
        let (mut controller, _rx) = make_controller(200, 0);
        controller.shared.go_to_angle(0);
        controller.shared.request_move_backwards();
        controller.tick();
        assert_eq!(controller.wheels.last, (-MAX_SPS, -MAX_SPS));

        for _ in 0..(DISCARD_N as u32 + 30) {
            controller.tick();
        }
        assert_ne!(controller.wheels.last, (-MAX_SPS, -MAX_SPS));
    }

    #[test]
    fn stop_moving_commands_wheels_to_zero_on_the_next_tick() {
        let (mut controller, _rx) = make_controller(200, 0);
        controller.shared.go_to_angle(0);
        controller.tick();
        controller.shared.stop_moving();
        let reached = controller.tick();
        assert!(!reached);
        assert_eq!(controller.wheels.last, (0, 0));
    }

    #[test]
    fn go_to_angle_called_twice_with_no_intervening_scan_is_idempotent() {
        let (mut controller, _rx) = make_controller(200, 10);
        controller.shared.go_to_angle(20);
        controller.shared.go_to_angle(20);
        for _ in 0..(DISCARD_N as u32 + 10) {
            controller.tick();
        }
        let first = controller.wheels.last;
        controller.tick();
        let second = controller.wheels.last;
        assert_eq!(first, second);
    }
}
