//! Tuning constants for the acoustic direction-finding subsystem and the
//! motion controller. These are the external config surface of the core:
//! nothing here is read from disk or negotiated at runtime, they are bound
//! into firmware the same way `FFT_LENGTH`/`SAMPLING_RATE` are bound in the
//! upstream single-mic analyzer this module was generalized from.

/// Audio sampling rate, in Hertz, for each of the four microphone channels.
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Samples per channel accumulated before a forward FFT is run.
pub const FFT_SIZE: usize = 1024;

/// Samples delivered per mic driver callback, interleaved as `[R,L,B,F]`.
pub const PCM_FRAME_LEN: usize = 640;

/// Number of microphone channels.
pub const NUM_MICS: usize = 4;

/// Scanned FFT bin band, half-open `[BIN_LOW, BIN_HIGH)`. Only the upper
/// half of the spectrum is scanned, matching the source firmware's
/// `HALF_FFT_SIZE..FFT_SIZE` sweep.
pub const BIN_LOW: u16 = (FFT_SIZE / 2) as u16;
pub const BIN_HIGH: u16 = FFT_SIZE as u16;

/// Peak amplitude floor. Bins at or below this are not sources.
pub const AMPLI_THD: f32 = 15_000.0;

/// Minimum bin separation between two distinct sources.
pub const FREQ_THD: u16 = 3;

/// Maximum number of simultaneously tracked sources.
pub const N_MAX: usize = 5;

/// Maximum plausible phase difference, in degrees, between a mic pair for
/// any frequency inside the scanned band.
pub const PHASE_DIF_LIMIT: f32 = 75.569;

/// Bearing EMA smoothing weight: `ema <- w*angle + (1-w)*ema_prev`.
pub const EMA_WEIGHT: f32 = 0.2;

/// Distance between microphones within a pair, in meters.
pub const MIC_SPACING_M: f32 = 0.06;

/// Speed of sound, in meters per second.
pub const SPEED_SOUND_MPS: f32 = 343.0;

/// Bin <-> Hz calibration.
///
/// The source firmware carries three slightly different affine constants for
/// this mapping (see the original `audioConvertFreq`/`AUDIOP__HZ_TO_FFT_FREQ`
/// macros), reflecting drafts that never converged. This firmware fixes one
/// calibration, derived from `SAMPLE_RATE_HZ / FFT_SIZE` and the half-band
/// offset, and uses it everywhere:
///
/// `bin_to_hz(b) = NYQUIST_HZ - (b - BIN_LOW) * HZ_PER_BIN`
///
/// Frequency decreases as the bin index increases across the scanned band,
/// mirroring the upper-half-spectrum convention the original sweep used
/// (bin `BIN_LOW` sits at Nyquist, bin `BIN_HIGH` at ~0 Hz).
pub const HZ_PER_BIN: f32 = SAMPLE_RATE_HZ as f32 / FFT_SIZE as f32;
pub const NYQUIST_HZ: f32 = SAMPLE_RATE_HZ as f32 / 2.0;

/// Predator ("killer whale") band, closed `[PREDATOR_BIN_LOW, PREDATOR_BIN_HIGH]`.
/// Corresponds to roughly 950-1050 Hz; because the mapping above is
/// frequency-descending-with-bin, the *low* Hz bound maps to the *high* bin.
pub const PREDATOR_HZ_LOW: f32 = 950.0;
pub const PREDATOR_HZ_HIGH: f32 = 1050.0;

/// ToF distance, in mm, at or below which an obstacle/destination counts as reached.
pub const STOP_MM: u16 = 35;
/// ToF distance, in mm, beyond which forward speed saturates at `MAX_SPS`.
pub const MAX_MM: u16 = 350;
/// Neutral ToF EMA seed used during sensor warm-up.
pub const INIT_MM: u16 = 80;
/// Number of initial ToF samples discarded for sensor warm-up.
pub const DISCARD_N: u8 = 50;
/// ToF EMA smoothing weight (weight kept on the previous value).
pub const EMA_WEIGHT_TOF: f32 = 0.8;

/// IR proximity threshold; at or above this an obstacle is considered reached.
pub const IR_STOP: i16 = 300;

/// Wheel speed envelope, in steps per second.
pub const MAX_SPS: i16 = 500;
pub const MAX_DIFF_SPS: i16 = 222;
pub const MIN_SPS: i16 = 150;
/// Wheel-speed EMA smoothing weight (weight kept on the previous value).
pub const EMA_WEIGHT_WHEELS: f32 = 0.9;

/// Rotate-in-place threshold, in degrees.
pub const MAX_CORR_DEG: i16 = 40;

/// Motion control loop period.
pub const T_CTRL_MS: u64 = 10;

/// Maximum command magnitude the wheel driver accepts.
pub const MOTOR_LIMIT: i16 = 1100;

/// IR sensor channel indices, matching the original firmware's proximity
/// sensor numbering (`IR2`=right, `IR7`=left, `IR1`=front-right, `IR8`=front-left).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrChannel {
    FrontRight = 0,
    Right = 1,
    Left = 6,
    FrontLeft = 7,
}

pub const IR_CHANNELS: [IrChannel; 4] = [
    IrChannel::FrontRight,
    IrChannel::Right,
    IrChannel::Left,
    IrChannel::FrontLeft,
];
