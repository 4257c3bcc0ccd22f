//! Random source for batch sampling

use rand::Rng;

/// Draws one uniform value in `[0, 1)` per batch
pub trait Sampler: Send + Sync {
    fn draw(&self) -> f64;
}

/// Thread-local RNG sampler used in production
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngSampler;

impl Sampler for ThreadRngSampler {
    fn draw(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Always returns the same value. Deterministic sampling for tests and for
/// callers that want to pin the drop decision.
#[derive(Debug, Clone, Copy)]
pub struct FixedSampler(pub f64);

impl Sampler for FixedSampler {
    fn draw(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_rng_stays_in_unit_interval() {
        let sampler = ThreadRngSampler;
        for _ in 0..1_000 {
            let value = sampler.draw();
            assert!((0.0..1.0).contains(&value));
        }
    }
}
