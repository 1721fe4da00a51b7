//! Synthetic readers that never run dry.
use crate::core::{Reader, Reading};
use crate::error::MeterError;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Upper bound (exclusive for the raw draw) of [`RandomReader`] values.
pub const RANDOM_READING_SCALE: f64 = 5.0;

/// Turns a uniform draw from `[0, 1)` into a reading: `round(draw * 5, 2)`.
///
/// Rounds the exact decimal value of the product, ties to even, so `0.625`
/// (`3.125`) reads `3.12`.
pub fn scale_draw(draw: f64) -> f64 {
    let scaled = draw * RANDOM_READING_SCALE;
    format!("{scaled:.2}").parse().unwrap_or(scaled)
}

/// Always reads `0.0`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroReader;

impl ZeroReader {
    /// Creates a zero reader.
    pub fn new() -> Self {
        Self
    }
}

impl Reader for ZeroReader {
    type Sample = f64;

    fn read(&mut self) -> Result<Reading<f64>, MeterError> {
        Ok(Reading::Sample(0.0))
    }
}

/// Reads pseudo-random values in `[0, 5]` with two decimals.
pub struct RandomReader<R = StdRng> {
    rng: R,
}

impl Default for RandomReader {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomReader {
    /// Random reader seeded from the operating system.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl<R: RngCore + Send> RandomReader<R> {
    /// Random reader drawing from the given generator.
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: RngCore + Send> Reader for RandomReader<R> {
    type Sample = f64;

    fn read(&mut self) -> Result<Reading<f64>, MeterError> {
        let draw: f64 = self.rng.gen();
        Ok(Reading::Sample(scale_draw(draw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn sample<R: Reader<Sample = f64>>(reader: &mut R) -> f64 {
        reader.read().unwrap().into_result().unwrap()
    }

    #[test]
    fn zero_reader_always_zero() {
        let mut reader = ZeroReader::new();
        for _ in 0..5 {
            assert_eq!(sample(&mut reader), 0.0);
        }
    }

    #[test]
    fn scale_draw_edges() {
        assert_eq!(scale_draw(0.0), 0.0);
        assert_eq!(scale_draw(1.0), 5.0);
        assert_eq!(scale_draw(0.5), 2.5);
        assert_eq!(scale_draw(0.123456), 0.62);
    }

    #[test]
    fn scale_draw_ties_round_to_even() {
        assert_eq!(scale_draw(0.625), 3.12);
        assert_eq!(scale_draw(0.075), 0.38);
        assert_eq!(scale_draw(0.025), 0.12);
    }

    #[test]
    fn random_reader_in_range_and_rounded() {
        let mut reader = RandomReader::new();
        for _ in 0..100 {
            let value = sample(&mut reader);
            assert!((0.0..=5.0).contains(&value), "out of range: {value}");
            assert_eq!(value, (value * 100.0).round() / 100.0);
        }
    }

    #[test]
    fn random_reader_uses_injected_rng() {
        let mut low = RandomReader::with_rng(StepRng::new(0, 0));
        assert_eq!(sample(&mut low), 0.0);

        let mut half = RandomReader::with_rng(StepRng::new(1 << 63, 0));
        assert_eq!(sample(&mut half), 2.5);

        let mut high = RandomReader::with_rng(StepRng::new(u64::MAX, 0));
        assert_eq!(sample(&mut high), 5.0);
    }
}
