//! AudioFront: assembles four interleaved PCM streams into FFT-sized
//! complex buffers and hands them off whole once per `FFT_SIZE`-sample
//! window. Grounded on the source firmware's `processAudioData`, which
//! does the same fixed-index fill-and-signal with no queueing.

use rustfft::num_complex::Complex32;

use crate::constants::{FFT_SIZE, NUM_MICS, PCM_FRAME_LEN};

/// One audio callback's worth of interleaved samples: `[R,L,B,F, R,L,B,F, ...]`.
pub type PcmFrame<'a> = &'a [i16];

/// The four per-mic FFT-sized complex buffers, in `[right, left, back, front]`
/// order (matching the PCM interleave).
pub type MicBuffers = [[Complex32; FFT_SIZE]; NUM_MICS];

pub const MIC_RIGHT: usize = 0;
pub const MIC_LEFT: usize = 1;
pub const MIC_BACK: usize = 2;
pub const MIC_FRONT: usize = 3;

fn empty_mic_buffers() -> MicBuffers {
    [[Complex32::new(0.0, 0.0); FFT_SIZE]; NUM_MICS]
}

/// Accumulates interleaved PCM into four time-domain complex buffers and
/// reports when a full `FFT_SIZE`-sample window is ready.
///
/// `on_pcm` is infallible and allocation-free: it never blocks, and if the
/// previous ready window hasn't been consumed yet by the time a new one
/// completes, the old one is simply overwritten (no backpressure, matching
/// the "buffer-ready" semantics of the system's concurrency model).
pub struct AudioFront {
    buffers: MicBuffers,
    filled: usize,
}

impl AudioFront {
    pub fn new() -> Self {
        Self {
            buffers: empty_mic_buffers(),
            filled: 0,
        }
    }

    /// Consumes one PCM callback's samples. `frame.len()` is always a
    /// multiple of `NUM_MICS` by driver contract. Returns the completed
    /// window (by value, a plain array copy, no heap allocation) the
    /// instant `FFT_SIZE` samples per mic have accumulated.
    pub fn on_pcm(&mut self, frame: PcmFrame) -> Option<MicBuffers> {
        debug_assert_eq!(frame.len() % NUM_MICS, 0);
        debug_assert!(frame.len() <= PCM_FRAME_LEN);

        let mut ready = None;
        let mut i = 0;
        while i < frame.len() {
            if self.filled < FFT_SIZE {
                self.buffers[MIC_RIGHT][self.filled] = Complex32::new(frame[i] as f32, 0.0);
                self.buffers[MIC_LEFT][self.filled] = Complex32::new(frame[i + 1] as f32, 0.0);
                self.buffers[MIC_BACK][self.filled] = Complex32::new(frame[i + 2] as f32, 0.0);
                self.buffers[MIC_FRONT][self.filled] = Complex32::new(frame[i + 3] as f32, 0.0);
                self.filled += 1;
                i += NUM_MICS;
            } else {
                ready = Some(self.buffers);
                self.filled = 0;
            }
        }
        ready
    }
}

impl Default for AudioFront {
    fn default() -> Self {
        Self::new()
    }
}
