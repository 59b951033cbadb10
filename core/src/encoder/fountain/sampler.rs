// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Walker alias method sampler over a fixed weight table

use super::xoshiro::Xoshiro256;

pub struct Sampler {
    probs: Vec<f64>,
    aliases: Vec<usize>,
}

impl Sampler {
    /// Build a sampler for `weights`, which must be non-empty and positive
    pub fn new(weights: &[f64]) -> Self {
        let n = weights.len();
        let sum: f64 = weights.iter().sum();

        let mut p: Vec<f64> = weights.iter().map(|w| w * n as f64 / sum).collect();

        let (mut small, mut large) = (vec![], vec![]);
        for j in (0..n).rev() {
            if p[j] < 1.0 {
                small.push(j);
            } else {
                large.push(j);
            }
        }

        let mut probs = vec![0.0; n];
        let mut aliases = vec![0; n];

        while let (Some(&a), Some(&g)) = (small.last(), large.last()) {
            small.pop();
            large.pop();

            probs[a] = p[a];
            aliases[a] = g;

            p[g] += p[a] - 1.0;
            if p[g] < 1.0 {
                small.push(g);
            } else {
                large.push(g);
            }
        }

        for i in large.into_iter().chain(small) {
            probs[i] = 1.0;
        }

        Self { probs, aliases }
    }

    /// Draw an index
    pub fn next(&self, rng: &mut Xoshiro256) -> usize {
        let r1 = rng.next_double();
        let r2 = rng.next_double();

        let i = (self.probs.len() as f64 * r1) as usize;
        if r2 < self.probs[i] {
            i
        } else {
            self.aliases[i]
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn follows_weights() {
        let s = Sampler::new(&[1.0, 2.0, 4.0, 8.0]);
        let mut rng = Xoshiro256::from_seed(b"sampler");

        let mut counts = [0usize; 4];
        for _ in 0..15_000 {
            counts[s.next(&mut rng)] += 1;
        }

        // Expected 1000, 2000, 4000, 8000
        for (c, e) in counts.iter().zip([1000.0, 2000.0, 4000.0, 8000.0]) {
            assert!((*c as f64 - e).abs() < e * 0.15, "{counts:?}");
        }
    }

    #[test]
    fn single_weight() {
        let s = Sampler::new(&[0.5]);
        let mut rng = Xoshiro256::from_seed(b"one");

        assert!((0..10).all(|_| s.next(&mut rng) == 0));
    }
}
