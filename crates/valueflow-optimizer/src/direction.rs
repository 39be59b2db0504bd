//! Search directions: vectors in `{-1, 0, 1}^N`.

use rand::Rng;

use crate::error::OptimizerError;

/// How many random draws a direction change tries before falling back to a
/// deterministic perturbation.
pub const DIRECTION_ATTEMPTS: usize = 5;

/// A unit step per dimension: `-1`, `0` or `1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Direction(Vec<i8>);

impl Direction {
    /// Validate and wrap `components`.
    pub fn new(components: Vec<i8>) -> Result<Self, OptimizerError> {
        if let Some(&bad) = components.iter().find(|c| !(-1..=1).contains(*c)) {
            return Err(OptimizerError::InvalidDirection(bad));
        }
        Ok(Self(components))
    }

    /// A uniformly drawn non-zero direction.
    pub fn random<R: Rng + ?Sized>(dimensions: usize, rng: &mut R) -> Self {
        let mut components: Vec<i8> = (0..dimensions).map(|_| rng.gen_range(-1..=1)).collect();
        if dimensions > 0 && components.iter().all(|c| *c == 0) {
            let d = rng.gen_range(0..dimensions);
            components[d] = if rng.gen_bool(0.5) { 1 } else { -1 };
        }
        Self(components)
    }

    pub fn components(&self) -> &[i8] {
        &self.0
    }

    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    pub fn reversed(&self) -> Self {
        Self(self.0.iter().map(|c| -c).collect())
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|c| *c == 0)
    }

    /// Change one random dimension: a zero component becomes `±1`, a non-zero
    /// one becomes zero. If that would leave the zero vector, the removed
    /// component moves to the next dimension instead; in one dimension the
    /// direction simply reverses.
    pub fn perturbed<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let n = self.0.len();
        if n == 0 {
            return self.clone();
        }
        let d = rng.gen_range(0..n);
        let mut components = self.0.clone();
        if components[d] == 0 {
            components[d] = if rng.gen_bool(0.5) { 1 } else { -1 };
            return Self(components);
        }
        let removed = components[d];
        components[d] = 0;
        if components.iter().all(|c| *c == 0) {
            if n == 1 {
                return self.reversed();
            }
            components[(d + 1) % n] = removed;
        }
        Self(components)
    }

    /// A new direction that is neither `self` nor its reverse.
    ///
    /// Tries [`DIRECTION_ATTEMPTS`] random draws, then falls back to
    /// [`perturbed`](Self::perturbed).
    pub fn change<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let reverse = self.reversed();
        for _ in 0..DIRECTION_ATTEMPTS {
            let candidate = Self::random(self.dimensions(), rng);
            if candidate != *self && candidate != reverse {
                return candidate;
            }
        }
        self.perturbed(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn components_are_validated() {
        assert!(Direction::new(vec![-1, 0, 1]).is_ok());
        assert_eq!(
            Direction::new(vec![0, 2]),
            Err(OptimizerError::InvalidDirection(2))
        );
    }

    #[test]
    fn reverse_flips_every_component() {
        let d = Direction::new(vec![1, 0, -1]).unwrap();
        assert_eq!(d.reversed().components(), &[-1, 0, 1]);
    }

    #[test]
    fn perturbing_a_single_axis_rotates_it() {
        let d = Direction::new(vec![0, 1]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..20 {
            let p = d.perturbed(&mut rng);
            assert!(!p.is_zero());
            assert_ne!(p, d);
            assert_ne!(p, d.reversed());
        }
    }

    #[test]
    fn one_dimension_perturbs_to_reverse() {
        let d = Direction::new(vec![1]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(d.perturbed(&mut rng), d.reversed());
    }

    proptest! {
        #[test]
        fn random_directions_are_nonzero(dims in 1..6usize, seed in any::<u64>()) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let d = Direction::random(dims, &mut rng);
            prop_assert_eq!(d.dimensions(), dims);
            prop_assert!(!d.is_zero());
        }

        #[test]
        fn changed_direction_differs(dims in 2..6usize, seed in any::<u64>()) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let d = Direction::random(dims, &mut rng);
            let changed = d.change(&mut rng);
            prop_assert!(!changed.is_zero());
            prop_assert_ne!(&changed, &d);
            prop_assert_ne!(changed, d.reversed());
        }
    }
}
