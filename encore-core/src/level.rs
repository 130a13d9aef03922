//! Player level curve.
//!
//! Level is never stored independently of experience: it is always derived
//! from total XP with a triangular curve, so reaching level `L + 1` costs
//! `base * L * (L + 1) / 2` total XP.

use crate::config::EconomyConfig;

/// Total XP required to reach `level`.
#[must_use]
pub fn xp_for_level(level: u32, economy: &EconomyConfig) -> u64 {
    let steps = u64::from(level.saturating_sub(1));
    economy
        .base_level_xp
        .saturating_mul(steps.saturating_mul(steps + 1) / 2)
}

/// Level reached with `xp` total experience, capped at `max_level`.
#[must_use]
pub fn level_for_xp(xp: u64, economy: &EconomyConfig) -> u32 {
    // Binary search over the monotonic threshold function.
    let (mut lo, mut hi) = (1_u32, economy.max_level.max(1));
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if xp_for_level(mid, economy) <= xp {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

/// XP earned inside the current level and the size of that level's span.
///
/// Returns `(into_level, span)`; `span` is 0 at the level cap.
#[must_use]
pub fn progress_to_next(xp: u64, economy: &EconomyConfig) -> (u64, u64) {
    let level = level_for_xp(xp, economy);
    let floor = xp_for_level(level, economy);
    if level >= economy.max_level {
        return (xp - floor, 0);
    }
    let next = xp_for_level(level + 1, economy);
    (xp - floor, next - floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_follow_triangular_curve() {
        let eco = EconomyConfig::default();
        assert_eq!(xp_for_level(1, &eco), 0);
        assert_eq!(xp_for_level(2, &eco), 100);
        assert_eq!(xp_for_level(3, &eco), 300);
        assert_eq!(xp_for_level(4, &eco), 600);
    }

    #[test]
    fn level_boundaries() {
        let eco = EconomyConfig::default();
        assert_eq!(level_for_xp(0, &eco), 1);
        assert_eq!(level_for_xp(99, &eco), 1);
        assert_eq!(level_for_xp(100, &eco), 2);
        assert_eq!(level_for_xp(299, &eco), 2);
        assert_eq!(level_for_xp(300, &eco), 3);
    }

    #[test]
    fn level_is_capped() {
        let eco = EconomyConfig {
            max_level: 5,
            ..EconomyConfig::default()
        };
        assert_eq!(level_for_xp(u64::MAX, &eco), 5);
        assert_eq!(progress_to_next(u64::MAX, &eco).1, 0);
    }

    #[test]
    fn progress_within_level() {
        let eco = EconomyConfig::default();
        assert_eq!(progress_to_next(150, &eco), (50, 200));
    }
}
