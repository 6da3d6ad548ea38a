//! Raw exponential draws, right-censored to the allowed range.

use rand::Rng;
use rand_distr::{Distribution, Exp};

/// Replaces `out` with `count` draws from `distribution`, censoring every
/// draw above `ceiling` down to `ceiling`.
///
/// Censoring piles the excess mass on the boundary instead of rejecting it,
/// which is what turns the draw into a truncated exponential.
pub fn sample_candidates<R>(
    rng: &mut R,
    distribution: &Exp<f64>,
    ceiling: f64,
    count: usize,
    out: &mut Vec<f64>,
) where
    R: Rng + ?Sized,
{
    out.clear();
    out.extend((0..count).map(|_| distribution.sample(&mut *rng).min(ceiling)));
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn draws_are_censored_to_the_ceiling() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let distribution = Exp::new(0.25).expect("positive rate");
        let mut out = Vec::new();
        sample_candidates(&mut rng, &distribution, 3.0, 500, &mut out);

        assert_eq!(out.len(), 500);
        assert!(out.iter().all(|&value| (0.0..=3.0).contains(&value)));
        // With mean 4 most of the mass lies above 3, so the boundary must be hit.
        assert!(out.iter().any(|&value| value == 3.0));
    }

    #[test]
    fn reuses_the_output_buffer() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let distribution = Exp::new(1.0).expect("positive rate");
        let mut out = vec![42.0; 8];
        sample_candidates(&mut rng, &distribution, 10.0, 3, &mut out);
        assert_eq!(out.len(), 3);
        assert!(!out.contains(&42.0));
    }
}
