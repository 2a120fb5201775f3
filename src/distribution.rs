use rand::{
    distributions::{WeightedError, WeightedIndex},
    prelude::Distribution,
    Rng,
};

/// Weighted random choice over a fixed list of items.
///
/// Heavier items cover a larger share of the cumulative weight range and are
/// picked proportionally more often. A distribution whose weights sum to zero
/// (or that has no items) is still valid: sampling it yields `None`, which the
/// generator reads as "no viable option".
#[derive(Clone, Debug)]
pub struct WeightedDistribution<T> {
    items: Vec<T>,
    index: Option<WeightedIndex<f64>>,
}

impl<T> WeightedDistribution<T> {
    pub fn new<I: IntoIterator<Item = (T, f64)>>(weighted: I) -> Result<Self, WeightedError> {
        let (items, weights): (Vec<T>, Vec<f64>) = weighted.into_iter().unzip();

        let index = match WeightedIndex::new(&weights) {
            Ok(index) => Some(index),
            Err(WeightedError::NoItem | WeightedError::AllWeightsZero) => None,
            Err(e) => return Err(e),
        };

        Ok(WeightedDistribution { items, index })
    }

    pub fn uniform(items: Vec<T>) -> Self {
        let index = WeightedIndex::new(vec![1.0; items.len()]).ok();
        WeightedDistribution { items, index }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&T> {
        let index = self.index.as_ref()?;
        self.items.get(index.sample(rng))
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn is_viable(&self) -> bool {
        self.index.is_some()
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn zero_total_weight_yields_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        let dist = WeightedDistribution::new([('a', 0.0), ('b', 0.0)]).unwrap();
        assert!(!dist.is_viable());
        assert_eq!(dist.sample(&mut rng), None);

        let empty = WeightedDistribution::<char>::uniform(vec![]);
        assert_eq!(empty.sample(&mut rng), None);
    }

    #[test]
    fn zero_weight_items_are_never_drawn() {
        let mut rng = StdRng::seed_from_u64(7);
        let dist = WeightedDistribution::new([(0, 0.0), (1, 1.0), (2, 0.0)]).unwrap();
        for _ in 0..1000 {
            assert_eq!(dist.sample(&mut rng), Some(&1));
        }
    }

    #[test]
    fn frequencies_follow_weights() {
        let mut rng = StdRng::seed_from_u64(42);
        let dist = WeightedDistribution::new([("light", 1.0), ("heavy", 3.0)]).unwrap();

        let heavy = (0..10_000)
            .filter(|_| dist.sample(&mut rng) == Some(&"heavy"))
            .count();

        assert!((7_000..8_000).contains(&heavy), "heavy drawn {heavy} times");
    }

    #[test]
    fn negative_weights_are_rejected() {
        assert!(WeightedDistribution::new([(0, 1.0), (1, -1.0)]).is_err());
    }
}
