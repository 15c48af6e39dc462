//! Policy ladder — a monotone sequence of encoding profiles indexed by
//! degradation level, precomputed once from a base profile and a depth `L`.
//!
//! Always a dense `Vec<EncodingProfile>` of length `L+1`, never a map: mixing
//! the two representations was a known bug in the system this was modeled
//! on, and is not reproduced here.

use crate::error::{RestreamerError, Result};
use crate::profile::{EncodingProfile, MIN_BITRATE_KBPS, MIN_FPS, MIN_HEIGHT, MIN_WIDTH};

/// Immutable, shareable ladder of profiles `P[0..=L]`. `P[0]` is the base
/// profile (best quality), `P[L]` is the worst.
#[derive(Debug, Clone)]
pub struct ProfileLadder {
    steps: Vec<EncodingProfile>,
}

impl ProfileLadder {
    /// Build the ladder from a base profile and degradation depth `steps`.
    ///
    /// `1 <= steps <= 10`, otherwise rejected as [`RestreamerError::BadLadder`].
    pub fn new(base: EncodingProfile, steps: u32) -> Result<Self> {
        if !(1..=10).contains(&steps) {
            return Err(RestreamerError::BadLadder(format!(
                "degradation_steps must be in 1..=10, got {steps}"
            )));
        }

        let l = steps;
        let mut profiles = Vec::with_capacity(l as usize + 1);
        for step in 0..=l {
            let width = (base.width.saturating_sub(step * (base.width / l))).max(MIN_WIDTH);
            let height = (base.height.saturating_sub(step * (base.height / l))).max(MIN_HEIGHT);

            let bitrate_kbps = ((base.bitrate_kbps as u64 * (l - step) as u64) / l as u64) as u32;
            let bitrate_kbps = bitrate_kbps.max(MIN_BITRATE_KBPS);

            let fps = if base.fps > step.saturating_mul(3) {
                base.fps - step * 3
            } else {
                0
            };
            let fps = fps.max(MIN_FPS).max(12);

            profiles.push(EncodingProfile { width, height, bitrate_kbps, fps });
        }

        Ok(Self { steps: profiles })
    }

    /// Highest valid degradation level, `L`.
    pub fn max_level(&self) -> usize {
        self.steps.len() - 1
    }

    /// Number of entries in the ladder (`L + 1`).
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Profile at `level`, clamped to `[0, L]`.
    pub fn profile_at(&self, level: usize) -> EncodingProfile {
        self.steps[level.min(self.max_level())]
    }

    pub fn base(&self) -> EncodingProfile {
        self.steps[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_1080p() -> EncodingProfile {
        EncodingProfile::new(1920, 1080, 4500, 30).unwrap()
    }

    #[test]
    fn rejects_out_of_range_depth() {
        assert!(ProfileLadder::new(base_1080p(), 0).is_err());
        assert!(ProfileLadder::new(base_1080p(), 11).is_err());
    }

    #[test]
    fn has_exactly_l_plus_one_entries() {
        let ladder = ProfileLadder::new(base_1080p(), 4).unwrap();
        assert_eq!(ladder.len(), 5);
        assert_eq!(ladder.max_level(), 4);
    }

    /// Scenario S1 from the spec: L=4, base 1920x1080 @ 4500k @ 30.
    #[test]
    fn scenario_s1_matches_worked_example() {
        let ladder = ProfileLadder::new(base_1080p(), 4).unwrap();

        let p0 = ladder.profile_at(0);
        assert_eq!(p0, EncodingProfile::new(1920, 1080, 4500, 30).unwrap());

        let p4 = ladder.profile_at(4);
        assert_eq!(p4, EncodingProfile::new(320, 240, 300, 18).unwrap());
    }

    #[test]
    fn monotone_non_increasing_per_field() {
        let ladder = ProfileLadder::new(base_1080p(), 6).unwrap();
        for i in 0..ladder.max_level() {
            let a = ladder.profile_at(i);
            let b = ladder.profile_at(i + 1);
            assert!(a.width >= b.width);
            assert!(a.height >= b.height);
            assert!(a.bitrate_kbps >= b.bitrate_kbps);
            assert!(a.fps >= b.fps);
        }
    }

    #[test]
    fn never_falls_below_floor() {
        let ladder = ProfileLadder::new(base_1080p(), 10).unwrap();
        for i in 0..=ladder.max_level() {
            let p = ladder.profile_at(i);
            assert!(p.width >= MIN_WIDTH);
            assert!(p.height >= MIN_HEIGHT);
            assert!(p.bitrate_kbps >= MIN_BITRATE_KBPS);
            assert!(p.fps >= MIN_FPS);
        }
    }

    #[test]
    fn profile_at_clamps_above_max_level() {
        let ladder = ProfileLadder::new(base_1080p(), 3).unwrap();
        assert_eq!(ladder.profile_at(99), ladder.profile_at(3));
    }
}
