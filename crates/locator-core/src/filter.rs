use time::OffsetDateTime;
use tracing::trace;

use crate::fix::Fix;

/// Fixes older than this at receipt are treated as cached readings.
pub const DEFAULT_MAX_FIX_AGE: time::Duration = time::Duration::seconds(5);

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Negative accuracy. Best state was cleared.
    Invalid,
    /// Older than the max fix age. Best state was cleared.
    Stale { age: time::Duration },
    /// Usable, but not strictly more accurate than the current best.
    NotImproved,
    /// Became the new best. `desired_met` when accuracy <= desired threshold.
    Improved { fix: Fix, desired_met: bool },
}

/// Tracks the most accurate fresh fix seen so far.
#[derive(Debug, Clone)]
pub struct BestEffortFilter {
    max_age: time::Duration,
    best: Option<Fix>,
}

impl Default for BestEffortFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FIX_AGE)
    }
}

impl BestEffortFilter {
    pub fn new(max_age: time::Duration) -> Self {
        Self { max_age, best: None }
    }

    pub fn best(&self) -> Option<&Fix> {
        self.best.as_ref()
    }

    pub fn clear(&mut self) {
        self.best = None;
    }

    /// Clears best state and returns the rejection if `fix` is invalid or
    /// stale. `None` means the fix is usable.
    pub fn screen(&mut self, fix: &Fix, now: OffsetDateTime) -> Option<Verdict> {
        if !fix.is_valid() {
            trace!(accuracy = fix.horizontal_accuracy_m, "filter: invalid fix");
            self.best = None;
            return Some(Verdict::Invalid);
        }

        let age = fix.age(now);
        if age > self.max_age {
            trace!(age_s = age.as_seconds_f64(), "filter: stale fix");
            self.best = None;
            return Some(Verdict::Stale { age });
        }
        None
    }

    pub fn on_fix(&mut self, fix: Fix, desired_accuracy_m: f64, now: OffsetDateTime) -> Verdict {
        if let Some(rejected) = self.screen(&fix, now) {
            return rejected;
        }

        let improves = match &self.best {
            None => true,
            Some(b) => fix.horizontal_accuracy_m < b.horizontal_accuracy_m,
        };
        if !improves {
            return Verdict::NotImproved;
        }

        let desired_met = fix.horizontal_accuracy_m <= desired_accuracy_m;
        self.best = Some(fix.clone());
        Verdict::Improved { fix, desired_met }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-05-01 12:00:00 UTC);

    fn fix(acc: f64, age_s: i64) -> Fix {
        Fix::new(47.37, 8.54, acc, NOW - time::Duration::seconds(age_s))
    }

    #[test]
    fn test_invalid_fix_clears_best() {
        let mut f = BestEffortFilter::default();
        f.on_fix(fix(20.0, 1), 10.0, NOW);
        assert!(f.best().is_some());

        assert_eq!(f.on_fix(fix(-1.0, 1), 10.0, NOW), Verdict::Invalid);
        assert!(f.best().is_none());
    }

    #[test]
    fn test_stale_fix_clears_best_regardless_of_accuracy() {
        let mut f = BestEffortFilter::default();
        f.on_fix(fix(20.0, 1), 10.0, NOW);

        let v = f.on_fix(fix(1.0, 6), 10.0, NOW);
        assert!(matches!(v, Verdict::Stale { .. }));
        assert!(f.best().is_none());
    }

    #[test]
    fn test_age_exactly_at_limit_is_fresh() {
        let mut f = BestEffortFilter::default();
        let v = f.on_fix(fix(20.0, 5), 10.0, NOW);
        assert!(matches!(v, Verdict::Improved { desired_met: false, .. }));
    }

    #[test]
    fn test_decreasing_accuracy_always_improves() {
        let mut f = BestEffortFilter::default();
        for acc in [80.0, 50.0, 31.5, 20.0, 12.0] {
            let v = f.on_fix(fix(acc, 1), 10.0, NOW);
            assert!(matches!(v, Verdict::Improved { .. }), "acc={}", acc);
            assert_eq!(f.best().map(|b| b.horizontal_accuracy_m), Some(acc));
        }
    }

    #[test]
    fn test_equal_accuracy_does_not_replace_best() {
        let mut f = BestEffortFilter::default();
        let first = fix(20.0, 2);
        f.on_fix(first.clone(), 10.0, NOW);

        assert_eq!(f.on_fix(fix(20.0, 1), 10.0, NOW), Verdict::NotImproved);
        assert_eq!(f.best(), Some(&first));
    }

    #[test]
    fn test_worse_fix_is_ignored() {
        let mut f = BestEffortFilter::default();
        f.on_fix(fix(15.0, 1), 10.0, NOW);
        assert_eq!(f.on_fix(fix(40.0, 0), 10.0, NOW), Verdict::NotImproved);
        assert_eq!(f.best().map(|b| b.horizontal_accuracy_m), Some(15.0));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut f = BestEffortFilter::default();
        let v = f.on_fix(fix(10.0, 1), 10.0, NOW);
        assert!(matches!(v, Verdict::Improved { desired_met: true, .. }));
    }

    #[test]
    fn test_scenario_refines_to_best_effort() {
        let mut f = BestEffortFilter::default();
        let a = fix(50.0, 1);
        let b = fix(20.0, 1);
        let c = fix(5.0, 1);

        assert_eq!(f.on_fix(a.clone(), 10.0, NOW), Verdict::Improved { fix: a, desired_met: false });
        assert_eq!(f.on_fix(b.clone(), 10.0, NOW), Verdict::Improved { fix: b, desired_met: false });
        assert_eq!(f.on_fix(c.clone(), 10.0, NOW), Verdict::Improved { fix: c.clone(), desired_met: true });
        assert_eq!(f.best(), Some(&c));

        assert_eq!(f.on_fix(fix(-1.0, 0), 10.0, NOW), Verdict::Invalid);
        assert!(f.best().is_none());
    }

    #[test]
    fn test_screen_keeps_best_for_usable_fix() {
        let mut f = BestEffortFilter::default();
        let best = fix(4.0, 1);
        f.on_fix(best.clone(), 10.0, NOW);

        assert_eq!(f.screen(&fix(1.0, 0), NOW), None);
        assert_eq!(f.best(), Some(&best));

        assert_eq!(f.screen(&fix(-1.0, 0), NOW), Some(Verdict::Invalid));
        assert!(f.best().is_none());
    }

    #[test]
    fn test_after_clear_any_fresh_fix_improves() {
        let mut f = BestEffortFilter::default();
        f.on_fix(fix(3.0, 1), 10.0, NOW);
        f.on_fix(fix(3.0, 9), 10.0, NOW);
        assert!(matches!(f.on_fix(fix(90.0, 1), 10.0, NOW), Verdict::Improved { .. }));
    }
}
