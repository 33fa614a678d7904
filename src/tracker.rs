//! SourceTracker: holds the currently pursued destination and re-locates
//! it, scan over scan, among whatever `ScanResult` the spectral core just
//! produced. Grounded on the source firmware's `Destination` struct and the
//! re-acquire logic in `main.c`'s `moveTowardsTarget`.

use crate::constants::FREQ_THD;
use crate::error::CoreError;
use crate::spectral::{ScanResult, Source};

/// A source currently being pursued or reported on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Destination {
    pub freq_bin: u16,
    pub bearing_deg: f32,
}

/// Re-acquires a previously chosen source across scans by nearest-bin match.
pub struct SourceTracker {
    target: Option<Destination>,
}

impl SourceTracker {
    pub fn new() -> Self {
        Self { target: None }
    }

    /// Starts pursuing `source`, replacing whatever was previously tracked.
    pub fn acquire(&mut self, source: Source, bearing_deg: f32) {
        self.target = Some(Destination {
            freq_bin: source.freq_bin,
            bearing_deg,
        });
    }

    pub fn current(&self) -> Option<Destination> {
        self.target
    }

    pub fn clear(&mut self) {
        self.target = None;
    }

    /// Finds the scan entry nearest the tracked frequency bin. Ties (two
    /// sources equidistant in bin index) resolve to the louder one, since a
    /// louder tone is the more plausible continuation of the same source
    /// across frames of FFT noise.
    pub fn match_source<'a>(&self, scan: &'a ScanResult) -> Result<&'a Source, CoreError> {
        let target = self.target.ok_or(CoreError::SourceNotFound)?;

        scan.as_slice()
            .iter()
            .filter(|s| bin_distance(s.freq_bin, target.freq_bin) < FREQ_THD)
            .min_by(|a, b| {
                let da = bin_distance(a.freq_bin, target.freq_bin);
                let db = bin_distance(b.freq_bin, target.freq_bin);
                da.cmp(&db).then_with(|| b.amplitude.partial_cmp(&a.amplitude).unwrap())
            })
            .ok_or(CoreError::SourceNotFound)
    }

    /// Updates the tracked bin/bearing after a successful re-match.
    pub fn refresh(&mut self, source: &Source, bearing_deg: f32) {
        self.target = Some(Destination {
            freq_bin: source.freq_bin,
            bearing_deg,
        });
    }
}

impl Default for SourceTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn bin_distance(a: u16, b: u16) -> u16 {
    a.max(b) - a.min(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::N_MAX;

    fn scan_with(sources: &[Source]) -> ScanResult {
        // ScanResult's fields are private; build via the public constructor
        // path used elsewhere in the crate (SpectralCore::scan). For tests
        // we reconstruct by exercising the peak-picking entry points is
        // overkill, so we go through as_slice-compatible helpers instead.
        assert!(sources.len() <= N_MAX);
        crate::spectral::test_support::scan_from(sources)
    }

    #[test]
    fn match_fails_when_nothing_acquired_yet() {
        let tracker = SourceTracker::new();
        let scan = scan_with(&[Source { freq_bin: 900, amplitude: 20_000.0 }]);
        assert_eq!(tracker.match_source(&scan), Err(CoreError::SourceNotFound));
    }

    #[test]
    fn match_finds_nearby_bin() {
        let mut tracker = SourceTracker::new();
        tracker.acquire(Source { freq_bin: 900, amplitude: 20_000.0 }, 10.0);
        let scan = scan_with(&[Source { freq_bin: 901, amplitude: 21_000.0 }]);
        let found = tracker.match_source(&scan).unwrap();
        assert_eq!(found.freq_bin, 901);
    }

    #[test]
    fn match_fails_when_bin_has_drifted_too_far() {
        let mut tracker = SourceTracker::new();
        tracker.acquire(Source { freq_bin: 900, amplitude: 20_000.0 }, 10.0);
        let scan = scan_with(&[Source { freq_bin: 950, amplitude: 21_000.0 }]);
        assert_eq!(tracker.match_source(&scan), Err(CoreError::SourceNotFound));
    }

    #[test]
    fn match_fails_exactly_at_the_freq_thd_boundary() {
        // distance == FREQ_THD must reject, matching the original's strict `<`.
        let mut tracker = SourceTracker::new();
        tracker.acquire(Source { freq_bin: 900, amplitude: 20_000.0 }, 10.0);
        let scan = scan_with(&[Source { freq_bin: 903, amplitude: 21_000.0 }]);
        assert_eq!(tracker.match_source(&scan), Err(CoreError::SourceNotFound));
    }

    #[test]
    fn tie_breaks_towards_louder_source() {
        let mut tracker = SourceTracker::new();
        tracker.acquire(Source { freq_bin: 900, amplitude: 20_000.0 }, 10.0);
        let scan = scan_with(&[
            Source { freq_bin: 899, amplitude: 16_000.0 },
            Source { freq_bin: 901, amplitude: 40_000.0 },
        ]);
        let found = tracker.match_source(&scan).unwrap();
        assert_eq!(found.freq_bin, 901);
    }
}
