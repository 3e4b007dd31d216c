//! Per-key running statistics and the count-weighted merge rule.

use std::fmt;

use ahash::AHashMap;

/// Key → aggregate map, used both worker-locally and by the merger.
pub type AggregateMap = AHashMap<String, Aggregate>;

/// Running `{min, max, count, mean}` for one key, in tenths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    pub count: u64,
    pub min: i64,
    pub max: i64,
    /// Running arithmetic mean, in tenths.
    pub mean: f64,
}

impl Default for Aggregate {
    fn default() -> Self {
        Self {
            count: 0,
            min: i64::MAX,
            max: i64::MIN,
            mean: 0.0,
        }
    }
}

impl Aggregate {
    pub fn of(value: i64) -> Self {
        let mut aggregate = Self::default();
        aggregate.observe(value);
        aggregate
    }

    /// Fold one observation in, updating the mean incrementally.
    #[inline]
    pub fn observe(&mut self, value: i64) {
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.mean += (value as f64 - self.mean) / self.count as f64;
    }

    /// Combine another aggregate of the same key into this one.
    pub fn merge(&mut self, other: &Aggregate) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let count = self.count + other.count;
        self.mean =
            (self.mean * self.count as f64 + other.mean * other.count as f64) / count as f64;
        self.count = count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// The mean rounded half away from zero to whole tenths.
    pub fn rounded_mean(&self) -> i64 {
        self.mean.round() as i64
    }
}

/// Fold `partial` into `global`, inserting keys that are new.
pub fn merge_into(global: &mut AggregateMap, partial: AggregateMap) {
    for (key, aggregate) in partial {
        global
            .entry(key)
            .and_modify(|existing| existing.merge(&aggregate))
            .or_insert(aggregate);
    }
}

/// A tenths value rendered with exactly one fractional digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPoint(pub i64);

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{}", abs / 10, abs % 10)
    }
}

impl fmt::Display for Aggregate {
    /// `min/mean/max`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            FixedPoint(self.min),
            FixedPoint(self.rounded_mean()),
            FixedPoint(self.max)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(values: &[i64]) -> Aggregate {
        let mut aggregate = Aggregate::default();
        values.iter().for_each(|v| aggregate.observe(*v));
        aggregate
    }

    #[test]
    fn single_observation() {
        let aggregate = Aggregate::of(-55);
        assert_eq!(aggregate.count, 1);
        assert_eq!(aggregate.min, -55);
        assert_eq!(aggregate.max, -55);
        assert_eq!(aggregate.mean, -55.0);
    }

    #[test]
    fn first_observation_replaces_sentinels() {
        let aggregate = fold(&[i64::MAX - 1]);
        assert_eq!(aggregate.min, i64::MAX - 1);
        let aggregate = fold(&[i64::MIN + 1]);
        assert_eq!(aggregate.max, i64::MIN + 1);
    }

    #[test]
    fn running_mean() {
        let aggregate = fold(&[100, 200, 300, -50]);
        assert_eq!(aggregate.count, 4);
        assert_eq!(aggregate.min, -50);
        assert_eq!(aggregate.max, 300);
        assert!((aggregate.mean - 137.5).abs() < 1e-9);
    }

    #[test]
    fn merge_is_weighted_by_count() {
        let mut left = fold(&[10, 20, 30]);
        let right = fold(&[100]);
        left.merge(&right);
        assert_eq!(left, fold(&[10, 20, 30, 100]));
        assert_eq!(left.count, 4);
        assert!((left.mean - 40.0).abs() < 1e-9);
    }

    #[test]
    fn merge_with_empty() {
        let mut empty = Aggregate::default();
        let full = fold(&[5, 7]);
        empty.merge(&full);
        assert_eq!(empty, full);

        let mut full_again = full;
        full_again.merge(&Aggregate::default());
        assert_eq!(full_again, full);
    }

    #[test]
    fn merge_into_inserts_and_combines() {
        let mut global = AggregateMap::default();
        global.insert("a".to_owned(), fold(&[10]));

        let mut partial = AggregateMap::default();
        partial.insert("a".to_owned(), fold(&[30]));
        partial.insert("b".to_owned(), fold(&[-1]));
        merge_into(&mut global, partial);

        assert_eq!(global.len(), 2);
        assert_eq!(global["a"].count, 2);
        assert!((global["a"].mean - 20.0).abs() < 1e-9);
        assert_eq!(global["b"], Aggregate::of(-1));
    }

    #[test]
    fn renders_tenths() {
        assert_eq!(FixedPoint(-32).to_string(), "-3.2");
        assert_eq!(FixedPoint(-5).to_string(), "-0.5");
        assert_eq!(FixedPoint(0).to_string(), "0.0");
        assert_eq!(FixedPoint(999).to_string(), "99.9");
        assert_eq!(fold(&[100, 200]).to_string(), "10.0/15.0/20.0");
    }

    #[test]
    fn mean_ties_round_away_from_zero() {
        assert_eq!(fold(&[10, 15]).to_string(), "1.0/1.3/1.5");
        assert_eq!(fold(&[0, 5]).to_string(), "0.0/0.3/0.5");
        assert_eq!(fold(&[2, 7]).to_string(), "0.2/0.5/0.7");
        assert_eq!(fold(&[-10, -15]).to_string(), "-1.5/-1.3/-1.0");
    }

    #[test]
    fn small_negative_mean_is_not_negative_zero() {
        assert_eq!(fold(&[-1, 0, 0, 0]).to_string(), "-0.1/0.0/0.0");
    }
}
