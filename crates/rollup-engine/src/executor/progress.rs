//! Overall progress from phase-local progress.

use rollup_core::models::ExecutionPhase;

/// Map `phase_percent` of `phase` onto the phase's overall band.
pub fn overall_progress(phase: ExecutionPhase, phase_percent: u8) -> u8 {
    let (start, end) = phase.progress_band();
    let width = u32::from(end - start);
    let offset = width * u32::from(phase_percent.min(100)) / 100;
    start + offset as u8
}

/// Whether a progress event for `next` is worth publishing after `last`.
/// Never goes backwards; small steps are dropped except the band end.
pub fn should_emit(last: u8, next: u8, step: u8, band_end: u8) -> bool {
    if next <= last {
        return false;
    }
    next >= band_end || next - last >= step.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_map_endpoints() {
        assert_eq!(overall_progress(ExecutionPhase::Loading, 0), 0);
        assert_eq!(overall_progress(ExecutionPhase::Loading, 100), 25);
        assert_eq!(overall_progress(ExecutionPhase::Matching, 50), 42);
        assert_eq!(overall_progress(ExecutionPhase::Storing, 100), 100);
        assert_eq!(overall_progress(ExecutionPhase::Merging, 250), 85);
    }

    #[test]
    fn emission_is_monotonic_and_stepped() {
        assert!(!should_emit(30, 30, 5, 60));
        assert!(!should_emit(30, 29, 5, 60));
        assert!(!should_emit(30, 33, 5, 60));
        assert!(should_emit(30, 35, 5, 60));
        assert!(should_emit(58, 60, 5, 60));
        assert!(should_emit(30, 31, 0, 60));
    }
}
