// Copyright (c) 2022-2023 The MobileCoin Foundation

//! xoshiro256** generator seeded from a SHA256 digest

use rand_core::{impls, Error as RngError, RngCore};
use sha2::{Digest, Sha256};

/// Deterministic generator used for fragment selection
pub struct Xoshiro256 {
    s: [u64; 4],
}

impl Xoshiro256 {
    /// Seed from `SHA256(seed)`, state words are big-endian
    pub fn from_seed(seed: &[u8]) -> Self {
        let h = Sha256::digest(seed);

        let mut s = [0u64; 4];
        for (w, c) in s.iter_mut().zip(h.chunks_exact(8)) {
            let mut b = [0u8; 8];
            b.copy_from_slice(c);
            *w = u64::from_be_bytes(b);
        }

        Self { s }
    }

    fn step(&mut self) -> u64 {
        let s = &mut self.s;

        let result = s[1].wrapping_mul(5).rotate_left(7).wrapping_mul(9);
        let t = s[1] << 17;

        s[2] ^= s[0];
        s[3] ^= s[1];
        s[1] ^= s[2];
        s[0] ^= s[3];

        s[2] ^= t;
        s[3] = s[3].rotate_left(45);

        result
    }

    /// Uniform double in `[0, 1)`
    pub fn next_double(&mut self) -> f64 {
        self.step() as f64 / (u64::MAX as f64 + 1.0)
    }

    /// Uniform integer in `[low, high]`
    pub fn next_int(&mut self, low: u64, high: u64) -> u64 {
        (self.next_double() * (high - low + 1) as f64) as u64 + low
    }
}

impl RngCore for Xoshiro256 {
    fn next_u32(&mut self) -> u32 {
        self.step() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.step()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), RngError> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_sequence() {
        let mut rng = Xoshiro256::from_seed(b"Wolf");

        let v: Vec<u64> = (0..12).map(|_| rng.next_u64() % 100).collect();
        assert_eq!(v, &[42, 81, 85, 8, 82, 84, 76, 73, 70, 88, 2, 74]);
    }

    #[test]
    fn int_range() {
        let mut rng = Xoshiro256::from_seed(b"range");

        for _ in 0..1000 {
            let v = rng.next_int(3, 9);
            assert!((3..=9).contains(&v));
        }
    }
}
