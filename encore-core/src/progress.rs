//! Generic progress tracker shared by missions, quests and relationships.
//!
//! Every progress-tracked entity in the engine carries a [`Progress`]
//! counter and walks the same lifecycle:
//!
//! ```text
//! Locked → Available → Active → Completed → Claimed
//! ```
//!
//! - Quests use all five states.
//! - Daily/weekly missions start `Active` the moment they are drawn.
//! - Relationships reuse the counter for RP, but "completion" is only
//!   eligibility: a status change needs an explicit player action.
//!
//! Threshold crossings are strict transitions: `crossed` is reported once,
//! on the step that moves the counter from below the target to the target.

use serde::{Deserialize, Serialize};

use crate::error::{EncoreError, Result};

/// A clamped counter toward a positive target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawProgress")]
pub struct Progress {
    current: u32,
    target: u32,
}

/// Wire shape of [`Progress`], checked before it becomes one.
#[derive(Deserialize)]
struct RawProgress {
    current: u32,
    target: u32,
}

impl TryFrom<RawProgress> for Progress {
    type Error = EncoreError;

    fn try_from(raw: RawProgress) -> Result<Self> {
        let mut progress = Self::new(raw.target)?;
        progress.current = raw.current.min(raw.target);
        Ok(progress)
    }
}

/// Result of moving a [`Progress`] counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    /// Value before the step.
    pub before: u32,
    /// Value after the step (clamped).
    pub after: u32,
    /// The step moved the counter from below the target to the target.
    pub crossed: bool,
}

impl Advance {
    /// Signed change actually applied after clamping.
    #[must_use]
    pub fn applied(&self) -> i64 {
        i64::from(self.after) - i64::from(self.before)
    }
}

impl Progress {
    /// New counter at zero.
    ///
    /// # Errors
    /// Returns [`EncoreError::Invariant`] for a zero target, which would make
    /// the entity complete before any progress is made.
    pub fn new(target: u32) -> Result<Self> {
        if target == 0 {
            return Err(EncoreError::invariant("progress target must be positive"));
        }
        Ok(Self { current: 0, target })
    }

    /// Current value.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Target value.
    #[must_use]
    pub fn target(&self) -> u32 {
        self.target
    }

    /// Whether the counter sits at its target.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current >= self.target
    }

    /// Fraction of the target reached, in `[0, 1]`.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        f64::from(self.current) / f64::from(self.target)
    }

    /// Apply a signed increment, clamped to `[0, target]`.
    pub fn advance(&mut self, delta: i64) -> Advance {
        let raw = i64::from(self.current).saturating_add(delta);
        let clamped = raw.clamp(0, i64::from(self.target));
        // clamped is within [0, target] so it fits a u32.
        self.set(u32::try_from(clamped).unwrap_or(self.target))
    }

    /// Set an absolute value (boolean or "best so far" objectives), clamped
    /// to `[0, target]`.
    pub fn set(&mut self, value: u32) -> Advance {
        let before = self.current;
        let after = value.min(self.target);
        self.current = after;
        Advance {
            before,
            after,
            crossed: before < self.target && after >= self.target,
        }
    }

    /// Move to a new target and restart from zero.
    ///
    /// # Errors
    /// Returns [`EncoreError::Invariant`] for a zero target.
    pub fn retarget(&mut self, target: u32) -> Result<()> {
        *self = Self::new(target)?;
        Ok(())
    }
}

/// Indices of `fractions` whose thresholds were passed moving from `before`
/// to `after` (upward only).
///
/// A checkpoint at fraction `f` sits at `ceil(f * target)`.
#[must_use]
pub fn crossed_checkpoints(before: u32, after: u32, target: u32, fractions: &[f64]) -> Vec<usize> {
    if after <= before {
        return Vec::new();
    }
    fractions
        .iter()
        .enumerate()
        .filter_map(|(idx, fraction)| {
            let mark = checkpoint_value(*fraction, target);
            (before < mark && after >= mark).then_some(idx)
        })
        .collect()
}

/// RP (or progress) value at which a fractional checkpoint sits.
#[must_use]
pub fn checkpoint_value(fraction: f64, target: u32) -> u32 {
    let mark = (fraction * f64::from(target)).ceil();
    if mark <= 0.0 {
        0
    } else if mark >= f64::from(target) {
        target
    } else {
        // Bounded by target above.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mark = mark as u32;
        mark
    }
}

/// Shared lifecycle of progress-tracked entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Prerequisites not met.
    Locked,
    /// May be started.
    Available,
    /// In progress.
    Active,
    /// Target reached, reward not yet claimed.
    Completed,
    /// Reward claimed; closed.
    Claimed,
}

/// Something that owns progress toward a goal.
pub trait Tracked {
    /// Current lifecycle state.
    fn lifecycle(&self) -> Lifecycle;

    /// Whether the entity still accepts progress.
    fn accepts_progress(&self) -> bool {
        self.lifecycle() == Lifecycle::Active
    }
}

/// Whether an inactive entity may be offered or activated.
pub trait Eligibility {
    /// Context the check needs (the player's quest log, the mission board…).
    type Context;

    /// `true` when the entity can move out of `Locked`.
    fn is_eligible(&self, ctx: &Self::Context) -> bool;
}
