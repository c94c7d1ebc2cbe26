//! Variate generators built only on uniform draws.
//!
//! Each generator consumes the shared random source in a fixed pattern, so
//! the draw count for a given uniform stream is reproducible.

use std::f64::consts::PI;

use crate::deterministic::RandomSource;

/// Smallest uniform fed to a logarithm.
const MIN_UNIFORM: f64 = 1e-12;

/// Standard normal draw via the Box-Muller transform. Consumes two uniforms.
pub fn standard_normal(rng: &mut (impl RandomSource + ?Sized)) -> f64 {
    let u1 = rng.random().max(MIN_UNIFORM);
    let u2 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Gamma(shape, 1) draw using Marsaglia and Tsang's rejection method.
///
/// Shapes below one are boosted: one uniform `u` is drawn first and the
/// result is `Gamma(shape + 1) * u^(1/shape)`.
pub fn gamma(rng: &mut (impl RandomSource + ?Sized), shape: f64) -> f64 {
    if shape < 1.0 {
        let u = rng.random();
        return gamma(rng, shape + 1.0) * u.powf(1.0 / shape);
    }

    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();
    loop {
        let x = standard_normal(rng);
        let v = 1.0 + c * x;
        if v <= 0.0 {
            continue;
        }
        let v = v * v * v;
        let u = rng.random();
        if u < 1.0 - 0.0331 * x.powi(4) {
            return d * v;
        }
        if u.ln() < 0.5 * x * x + d * (1.0 - v + v.ln()) {
            return d * v;
        }
    }
}

/// Beta(alpha, beta) draw as the ratio of two gamma variates.
///
/// Returns `None` for non-positive parameters or a degenerate draw; callers
/// fall back to a uniform.
pub fn beta(rng: &mut (impl RandomSource + ?Sized), alpha: f64, beta: f64) -> Option<f64> {
    if alpha <= 0.0 || beta <= 0.0 {
        return None;
    }
    let x = gamma(rng, alpha);
    let y = gamma(rng, beta);
    if x + y <= 0.0 {
        return None;
    }
    Some(x / (x + y))
}
