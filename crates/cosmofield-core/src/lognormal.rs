//! Log-normal Mapper
//!
//! Maps a Gaussian field X to a strictly positive density
//!
//! ```text
//!   ρ(x) = exp(X(x) − σ²/2),   σ² = Var[X] over the grid
//! ```
//!
//! For Gaussian X, E[exp(X)] = exp(σ²/2), so the shift makes ⟨ρ⟩ = 1 and
//! ρ − 1 is a density contrast that can never drop below −1.

use tracing::warn;

use crate::types::ScalarField;

/// Apply the unit-mean log-normal transform.
///
/// An all-equal input has zero variance and no structure; it maps to ρ ≡ 1.
pub fn apply_log_normal(field: &ScalarField) -> ScalarField {
    if field.is_uniform() {
        warn!(cells = field.len(), "log-normal input has zero variance, returning unit density");
        return ScalarField::constant(field.n(), 1.0);
    }

    let half_sigma2 = 0.5 * field.variance();
    field.map(|x| (x - half_sigma2).exp())
}

/// Density contrast δ = ρ − 1 of a log-normal density.
pub fn density_contrast(rho: &ScalarField) -> ScalarField {
    rho.map(|r| r - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::Normal;

    #[test]
    fn test_constant_field_maps_to_one() {
        for value in [0.0, 0.3, -2.5] {
            let rho = apply_log_normal(&ScalarField::constant(5, value));
            assert!(rho.data().iter().all(|&r| r == 1.0));
        }
    }

    #[test]
    fn test_unit_mean() {
        let n = 32;
        let normal = Normal::new(0.0, 0.5).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let x = ScalarField::from_fn(n, |_, _, _| rng.sample(normal));

        let rho = apply_log_normal(&x);
        assert_relative_eq!(rho.mean(), 1.0, epsilon = 0.02);
        assert!(rho.data().iter().all(|&r| r > 0.0));
    }

    #[test]
    fn test_input_untouched() {
        let x = ScalarField::from_fn(4, |i, j, k| 0.1 * (i + 2 * j + 3 * k) as f64);
        let before = x.clone();
        let _ = apply_log_normal(&x);
        assert_eq!(x, before);
    }

    #[test]
    fn test_density_contrast_bounded_below() {
        let x = ScalarField::from_fn(4, |i, _, _| -3.0 * i as f64);
        let delta = density_contrast(&apply_log_normal(&x));
        assert!(delta.data().iter().all(|&d| d > -1.0));
    }
}
