//! BearingEstimator: turns four mics' worth of frequency-domain data for a
//! single tracked bin into a smoothed bearing angle. Grounded on the source
//! firmware's `audioDeterminePhase` / `audio_determineAngle`.

use std::f32::consts::PI;

use crate::constants::{EMA_WEIGHT, MIC_SPACING_M, PHASE_DIF_LIMIT, SPEED_SOUND_MPS};
use crate::error::CoreError;
use crate::pcm::{MicBuffers, MIC_BACK, MIC_FRONT, MIC_LEFT, MIC_RIGHT};
use crate::spectral::bin_to_hz;

/// Two microphones' worth of phase angle (radians, `atan2` range) at a
/// single tracked bin.
fn phase_at(buffers: &MicBuffers, mic: usize, bin: u16) -> f32 {
    buffers[mic][bin as usize].arg()
}

/// Raw inter-mic phase difference in degrees, `[-180, 180]`, with the
/// `[-pi, +pi]` individual-phase check and the `PHASE_DIF_LIMIT` check from
/// the system spec's step 2.
fn phase_diff_deg(phase_a: f32, phase_b: f32) -> Result<f32, CoreError> {
    if !(-PI..=PI).contains(&phase_a) || !(-PI..=PI).contains(&phase_b) {
        return Err(CoreError::PhaseOutOfRange);
    }

    let mut diff = (phase_a - phase_b).to_degrees();
    if diff > 180.0 {
        diff -= 360.0;
    } else if diff < -180.0 {
        diff += 360.0;
    }

    if diff.abs() > PHASE_DIF_LIMIT {
        return Err(CoreError::PhaseOutOfRange);
    }

    Ok(diff)
}

/// Converts a pair's raw phase difference (degrees) into its bearing
/// contribution, `clamp(diff * c * 90 / (f_hz * d * 360), -90, 90)` — the
/// system spec's step 3, grounded on the original `audioConvertPhase`.
fn phase_to_alpha_deg(diff_deg: f32, freq_bin: u16) -> f32 {
    let f_hz = bin_to_hz(freq_bin);
    let alpha = diff_deg * SPEED_SOUND_MPS * 90.0 / (f_hz * MIC_SPACING_M * 360.0);
    alpha.clamp(-90.0, 90.0)
}

/// Resolves the two pair bearings into a full-plane angle via the
/// quadrant-sign case split of the system spec's step 4 (and the original
/// `audio_determineAngle`).
fn resolve_quadrant(alpha_lr: f32, alpha_bf: f32) -> f32 {
    if alpha_lr >= 0.0 && alpha_bf >= 0.0 {
        (alpha_lr - alpha_bf + 90.0) / 2.0
    } else if alpha_lr > 0.0 && alpha_bf < 0.0 {
        (-alpha_lr - alpha_bf + 270.0) / 2.0
    } else if alpha_lr < 0.0 && alpha_bf > 0.0 {
        (alpha_lr + alpha_bf - 90.0) / 2.0
    } else {
        (-alpha_lr + alpha_bf - 270.0) / 2.0
    }
}

/// Tracks one source's bearing across scans with EMA smoothing, resetting
/// across the +/-180 degree wrap discontinuity instead of averaging through it.
pub struct BearingEstimator {
    smoothed_deg: Option<f32>,
}

impl BearingEstimator {
    pub fn new() -> Self {
        Self { smoothed_deg: None }
    }

    /// Computes this scan's raw bearing for `bin` from all four mics, then
    /// folds it into the running EMA.
    pub fn update(&mut self, buffers: &MicBuffers, bin: u16) -> Result<f32, CoreError> {
        let raw = raw_bearing_deg(buffers, bin)?;

        let next = match self.smoothed_deg {
            None => raw,
            Some(prev) => {
                if wrap_discontinuity(prev, raw) {
                    raw
                } else {
                    EMA_WEIGHT * raw + (1.0 - EMA_WEIGHT) * prev
                }
            }
        };
        let next = wrap_deg(next);
        self.smoothed_deg = Some(next);
        Ok(next)
    }

    pub fn current(&self) -> Option<f32> {
        self.smoothed_deg
    }

    pub fn reset(&mut self) {
        self.smoothed_deg = None;
    }
}

impl Default for BearingEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// The unsmoothed bearing for one bin, with no EMA state touched. Used by
/// the source listing printed on each `Scanning -> UserPrompt` transition,
/// where every candidate source needs a preview angle without disturbing
/// whichever source is currently being tracked.
pub fn raw_bearing_deg(buffers: &MicBuffers, bin: u16) -> Result<f32, CoreError> {
    let left = phase_at(buffers, MIC_LEFT, bin);
    let right = phase_at(buffers, MIC_RIGHT, bin);
    let front = phase_at(buffers, MIC_FRONT, bin);
    let back = phase_at(buffers, MIC_BACK, bin);

    let lr_diff = phase_diff_deg(left, right)?;
    let bf_diff = phase_diff_deg(back, front)?;

    let alpha_lr = phase_to_alpha_deg(lr_diff, bin);
    let alpha_bf = phase_to_alpha_deg(bf_diff, bin);

    Ok(wrap_deg(resolve_quadrant(alpha_lr, alpha_bf)))
}

fn wrap_deg(deg: f32) -> f32 {
    let mut d = deg % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d < -180.0 {
        d += 360.0;
    }
    d
}

/// True when averaging `prev` and `next` directly would cross the +/-180
/// seam and produce a nonsense midpoint.
fn wrap_discontinuity(prev: f32, next: f32) -> bool {
    (next - prev).abs() > 180.0
}

/// Speed-of-sound / mic-spacing derived max time-delay-of-arrival, in
/// seconds, between any mic pair. Exposed for diagnostics/testing; not used
/// in the bearing formula itself (the firmware works entirely in phase).
pub fn max_tdoa_seconds() -> f32 {
    MIC_SPACING_M / SPEED_SOUND_MPS
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfft::num_complex::Complex32;
    use crate::constants::{FFT_SIZE, NUM_MICS};

    fn buffers_with_phase(bin: u16, phases: [f32; NUM_MICS]) -> MicBuffers {
        let mut bufs = [[Complex32::new(0.0, 0.0); FFT_SIZE]; NUM_MICS];
        for (m, p) in phases.iter().enumerate() {
            bufs[m][bin as usize] = Complex32::new(p.cos(), p.sin());
        }
        bufs
    }

    // Bin corresponding to ~1200 Hz, where PHASE_DIF_LIMIT (calibrated for
    // the highest admissible frequency) exactly saturates alpha_pair at 90°.
    fn bin_1200hz() -> u16 {
        crate::spectral::hz_to_bin(1200.0)
    }

    #[test]
    fn directly_ahead_configuration_gives_near_zero_bearing() {
        // Left-right symmetric (alpha_lr = 0) and back-front saturated near
        // +90 (source equidistant left/right, maximally closer to front than
        // back) resolves to a bearing near 0, matching the original
        // firmware's forward convention.
        let bin = bin_1200hz();
        let half_diff_rad = PHASE_DIF_LIMIT.to_radians() / 2.0;
        let bufs = buffers_with_phase(bin, [0.0, 0.0, half_diff_rad, -half_diff_rad]);
        let mut est = BearingEstimator::new();
        let bearing = est.update(&bufs, bin).unwrap();
        assert!(bearing.abs() < 2.0, "expected near-zero bearing, got {bearing}");
    }

    #[test]
    fn quadrant_resolution_matches_the_documented_case_split() {
        assert_eq!(resolve_quadrant(0.0, 90.0), 0.0);
        assert_eq!(resolve_quadrant(90.0, 0.0), 90.0);
        assert_eq!(resolve_quadrant(-90.0, 0.0), -90.0);
        // lr == 0 here falls to the final else branch (not the lr > 0 && bf <
        // 0 branch), same as the original's ladder; this sits exactly on the
        // +/-180 wrap seam, where the two branches agree mod 360 but not on
        // which sign they return.
        assert_eq!(resolve_quadrant(0.0, -90.0), -180.0);
        assert_eq!(resolve_quadrant(90.0, 90.0), 45.0);
    }

    #[test]
    fn quadrant_boundary_cases_use_strict_inequalities_like_the_original() {
        // lr == 0, bf < 0: must NOT be treated as the lr > 0 && bf < 0 branch.
        assert_eq!(resolve_quadrant(0.0, -10.0), -140.0);
        // lr < 0, bf == 0: must NOT be treated as the lr < 0 && bf > 0 branch.
        assert_eq!(resolve_quadrant(-10.0, 0.0), -130.0);
    }

    #[test]
    fn bearing_stays_within_valid_range() {
        let bufs = buffers_with_phase(900, [0.1, -0.05, 0.2, -0.1]);
        let mut est = BearingEstimator::new();
        let bearing = est.update(&bufs, 900).unwrap();
        assert!((-180.0..=180.0).contains(&bearing));
    }

    #[test]
    fn implausible_phase_difference_is_rejected() {
        // left = 1.5 rad, right = -1.5 rad: a 171.9 deg raw difference,
        // comfortably past PHASE_DIF_LIMIT, with each phase still inside
        // [-pi, +pi] on its own.
        let bufs = buffers_with_phase(900, [-1.5, 1.5, 0.0, 0.0]);
        let mut est = BearingEstimator::new();
        let result = est.update(&bufs, 900);
        assert_eq!(result, Err(CoreError::PhaseOutOfRange));
    }

    #[test]
    fn ema_smooths_towards_new_estimate_without_overshoot() {
        let mut est = BearingEstimator::new();
        let bufs_a = buffers_with_phase(900, [0.05, -0.05, 0.1, -0.05]);
        let first = est.update(&bufs_a, 900).unwrap();

        let bufs_b = buffers_with_phase(900, [0.1, -0.1, 0.1, -0.05]);
        let second = est.update(&bufs_b, 900).unwrap();

        assert!(est.current().is_some());
        // smoothing should not explode outside the bearing range
        assert!((-180.0..=180.0).contains(&second));
        let _ = first;
    }

    #[test]
    fn wrap_discontinuity_resets_instead_of_averaging_through_the_seam() {
        assert!(wrap_discontinuity(179.0, -179.0));
        assert!(!wrap_discontinuity(10.0, 20.0));
    }

    #[test]
    fn reset_clears_smoothing_state() {
        let mut est = BearingEstimator::new();
        let bufs = buffers_with_phase(900, [0.0; NUM_MICS]);
        est.update(&bufs, 900).unwrap();
        assert!(est.current().is_some());
        est.reset();
        assert!(est.current().is_none());
    }
}
