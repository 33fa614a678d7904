//! Tagged results for the core's transient failure conditions.
//!
//! None of these are exceptions: every function that can fail this way
//! returns `Result<T, CoreError>` and the caller (ultimately `MissionFsm`)
//! decides the state transition. Catastrophic collaborator failure (mic DMA,
//! bus halt) is not modeled here; it surfaces as whatever `anyhow::Error`
//! the offending driver call already produces and is not caught by the core.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// A mic-pair phase reading fell outside `[-PHASE_DIF_LIMIT, PHASE_DIF_LIMIT]`,
    /// or an individual phase fell outside `[-pi, +pi]`. Transient: retried on
    /// the next scan.
    PhaseOutOfRange,
    /// `SourceTracker` could not find a source within `FREQ_THD` of the
    /// previously pursued frequency.
    SourceNotFound,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::PhaseOutOfRange => write!(f, "phase difference out of plausible range"),
            CoreError::SourceNotFound => write!(f, "source not available anymore"),
        }
    }
}

impl std::error::Error for CoreError {}
