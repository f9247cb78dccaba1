//! Symmetric callback digests.

mod hmac;
mod legacy;

pub use self::hmac::{normalize_key, HmacDigest};
pub use legacy::LegacyDigest;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::Error;
use crate::validator::Algorithm;

/// Trait for computing a digest string over an ordered list of fields.
///
/// Implementations take the fields exactly as given: they never reorder or
/// deduplicate them, and they have no side effects.
pub trait DigestAlgorithm: Send + Sync {
    /// The verdict tag for digests produced by this algorithm.
    fn algorithm(&self) -> Algorithm;

    /// Compute the digest of `fields`, rendered in the algorithm's wire casing.
    fn compute(&self, fields: &[&str]) -> Result<String, Error>;
}

/// Compare two digest strings in constant time.
///
/// Both sides are first hashed to a fixed-width value, so the comparison
/// neither returns early on a length mismatch nor depends on where the
/// inputs first differ.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = Sha256::digest(a.as_bytes());
    let b = Sha256::digest(b.as_bytes());
    a.as_slice().ct_eq(b.as_slice()).into()
}

#[cfg(test)]
pub(crate) mod timing {
    use std::hint::black_box;
    use std::time::{Duration, Instant};

    /// Ratio between the slower and faster median batch time of two closures.
    ///
    /// Samples alternate between `a` and `b` so drift affects both equally.
    pub(crate) fn median_ratio(
        samples: usize,
        batch: usize,
        mut a: impl FnMut() -> bool,
        mut b: impl FnMut() -> bool,
    ) -> f64 {
        let mut times_a = Vec::with_capacity(samples);
        let mut times_b = Vec::with_capacity(samples);
        for _ in 0..samples {
            times_a.push(time_batch(batch, &mut a));
            times_b.push(time_batch(batch, &mut b));
        }

        let median_a = median(&mut times_a).as_nanos().max(1) as f64;
        let median_b = median(&mut times_b).as_nanos().max(1) as f64;
        median_a.max(median_b) / median_a.min(median_b)
    }

    fn time_batch(batch: usize, f: &mut impl FnMut() -> bool) -> Duration {
        let start = Instant::now();
        for _ in 0..batch {
            black_box(f());
        }
        start.elapsed()
    }

    fn median(times: &mut [Duration]) -> Duration {
        times.sort();
        times[times.len() / 2]
    }
}
