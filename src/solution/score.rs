use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

use serde::Serialize;

/// Hard/soft score. Hard is the negated capacity overflow, soft the negated
/// travel distance. Higher is better and hard always dominates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Score {
    hard: i64,
    soft: i64,
}

impl Score {
    pub const ZERO: Score = Score { hard: 0, soft: 0 };

    pub fn of(overflow: u64, distance: u64) -> Self {
        Self {
            hard: -(overflow as i64),
            soft: -(distance as i64),
        }
    }

    pub fn hard(&self) -> i64 {
        self.hard
    }

    pub fn soft(&self) -> i64 {
        self.soft
    }

    pub fn distance(&self) -> u64 {
        self.soft.unsigned_abs()
    }

    pub fn is_feasible(&self) -> bool {
        self.hard >= 0
    }
}

impl Add for Score {
    type Output = Score;

    fn add(self, rhs: Score) -> Score {
        Score {
            hard: self.hard + rhs.hard,
            soft: self.soft + rhs.soft,
        }
    }
}

impl Sub for Score {
    type Output = Score;

    fn sub(self, rhs: Score) -> Score {
        Score {
            hard: self.hard - rhs.hard,
            soft: self.soft - rhs.soft,
        }
    }
}

impl Sum for Score {
    fn sum<I: Iterator<Item = Score>>(iter: I) -> Score {
        iter.fold(Score::ZERO, Add::add)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}hard/{}soft", self.hard, self.soft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_dominates_soft() {
        let feasible_but_long = Score::of(0, 10_000);
        let short_but_overloaded = Score::of(1, 10);
        assert!(feasible_but_long > short_but_overloaded);
    }

    #[test]
    fn test_sum_and_distance() {
        let total: Score = [Score::of(0, 5), Score::of(2, 7)].into_iter().sum();
        assert_eq!(total.distance(), 12);
        assert_eq!(total.hard(), -2);
        assert!(!total.is_feasible());
        assert_eq!(total.to_string(), "-2hard/-12soft");
    }
}
