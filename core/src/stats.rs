//! Single-pass per-channel moment statistics.
//!
//! [`MomentAccumulator::update`] streams blocks through a Welford-style
//! recurrence extended to the third and fourth central moments (Terriberry;
//! Pébay 2008).  For a new value `x` with running count `n`:
//!
//! ```text
//! δ   = x − M1          δn = δ / n          t = δ · δn · (n − 1)
//! M1 += δn
//! M4 += t·δn²·(n² − 3n + 3) + 6·δn²·M2 − 4·δn·M3
//! M3 += t·δn·(n − 2) − 3·δn·M2
//! M2 += t
//! ```
//!
//! The accumulator only carries raw moment sums; turning them into
//! variance, skewness and kurtosis is left to [`MomentAccumulator::summary`]
//! or the caller's own calibration step.

use log::{debug, info};
use ndarray::{ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::block::{check_len, KernelError};

// ---------------------------------------------------------------------------
// ChannelMoments
// ---------------------------------------------------------------------------

/// Running moments of one channel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelMoments {
    pub count: u64,
    /// Running mean.
    pub m1: f64,
    /// Sum of squared deviations from the mean.
    pub m2: f64,
    pub m3: f64,
    pub m4: f64,
    pub min: f32,
    pub max: f32,
}

impl Default for ChannelMoments {
    fn default() -> Self {
        Self {
            count: 0,
            m1: 0.0,
            m2: 0.0,
            m3: 0.0,
            m4: 0.0,
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
        }
    }
}

impl ChannelMoments {
    #[inline]
    pub fn push(&mut self, x: f32) {
        if self.count == 0 {
            self.min = x;
            self.max = x;
        } else {
            self.min = self.min.min(x);
            self.max = self.max.max(x);
        }

        self.count += 1;
        let n = self.count as f64;
        let delta = x as f64 - self.m1;
        let delta_n = delta / n;
        let delta_n2 = delta_n * delta_n;
        let term1 = delta * delta_n * (n - 1.0);

        self.m1 += delta_n;
        self.m4 += term1 * delta_n2 * (n * n - 3.0 * n + 3.0) + 6.0 * delta_n2 * self.m2
            - 4.0 * delta_n * self.m3;
        self.m3 += term1 * delta_n * (n - 2.0) - 3.0 * delta_n * self.m2;
        self.m2 += term1;
    }

    /// Fold another channel's moments into this one, as if its samples had
    /// been pushed after ours.
    pub fn combine(&mut self, other: &ChannelMoments) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }

        let na = self.count as f64;
        let nb = other.count as f64;
        let n = na + nb;
        let delta = other.m1 - self.m1;
        let delta2 = delta * delta;
        let delta3 = delta2 * delta;
        let delta4 = delta2 * delta2;

        let m1 = self.m1 + delta * nb / n;
        let m2 = self.m2 + other.m2 + delta2 * na * nb / n;
        let m3 = self.m3
            + other.m3
            + delta3 * na * nb * (na - nb) / (n * n)
            + 3.0 * delta * (na * other.m2 - nb * self.m2) / n;
        let m4 = self.m4
            + other.m4
            + delta4 * na * nb * (na * na - na * nb + nb * nb) / (n * n * n)
            + 6.0 * delta2 * (na * na * other.m2 + nb * nb * self.m2) / (n * n)
            + 4.0 * delta * (na * other.m3 - nb * self.m3) / n;

        self.count += other.count;
        self.m1 = m1;
        self.m2 = m2;
        self.m3 = m3;
        self.m4 = m4;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Derived statistics; `None` until at least one sample was seen.
    pub fn summary(&self) -> Option<ChannelSummary> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let variance = self.m2 / n;
        let (skewness, kurtosis) = if self.m2 > 0.0 {
            (
                n.sqrt() * self.m3 / self.m2.powf(1.5),
                n * self.m4 / (self.m2 * self.m2) - 3.0,
            )
        } else {
            (0.0, 0.0)
        };
        Some(ChannelSummary {
            count: self.count,
            mean: self.m1,
            stdev: variance.sqrt(),
            skewness,
            kurtosis,
            min: self.min,
            max: self.max,
        })
    }
}

/// Per-channel statistics derived from [`ChannelMoments`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub count: u64,
    pub mean: f64,
    /// Population standard deviation.
    pub stdev: f64,
    pub skewness: f64,
    /// Excess kurtosis (0 for a Gaussian).
    pub kurtosis: f64,
    pub min: f32,
    pub max: f32,
}

// ---------------------------------------------------------------------------
// MomentAccumulator
// ---------------------------------------------------------------------------

/// Streaming moment accumulator over a fixed channel set.
///
/// Allocate one per observation, feed it successive blocks with
/// [`MomentAccumulator::update`], and read the result at the end.  State is
/// only meaningful for the channel order it was built with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MomentAccumulator {
    channels: Vec<ChannelMoments>,
}

impl MomentAccumulator {
    pub fn new(nchans: usize) -> Self {
        Self {
            channels: vec![ChannelMoments::default(); nchans],
        }
    }

    pub fn nchans(&self) -> usize {
        self.channels.len()
    }

    pub fn channels(&self) -> &[ChannelMoments] {
        &self.channels
    }

    pub fn channel(&self, j: usize) -> Option<&ChannelMoments> {
        self.channels.get(j)
    }

    /// Samples seen so far, per channel.
    pub fn counts(&self) -> Vec<u64> {
        self.channels.iter().map(|c| c.count).collect()
    }

    pub fn means(&self) -> Vec<f64> {
        self.channels.iter().map(|c| c.m1).collect()
    }

    pub fn reset(&mut self) {
        self.channels.fill(ChannelMoments::default());
    }

    /// Push every row of `block` through the per-channel recurrence.
    ///
    /// Channels are independent, so they are updated in parallel; within a
    /// channel samples are consumed in row order.
    pub fn update(&mut self, block: ArrayView2<f32>) -> Result<(), KernelError> {
        let (nsamps, nchans) = block.dim();
        check_len("moment accumulator channels", self.channels.len(), nchans)?;
        debug!("moments: {}x{} block", nsamps, nchans);

        self.channels
            .par_iter_mut()
            .zip(block.axis_iter(Axis(1)).into_par_iter())
            .for_each(|(acc, column)| {
                for &x in column.iter() {
                    acc.push(x);
                }
            });
        Ok(())
    }

    /// Merge an accumulator built over other data for the same channels.
    pub fn merge(&mut self, other: &MomentAccumulator) -> Result<(), KernelError> {
        check_len("merged accumulator channels", self.channels.len(), other.channels.len())?;
        self.channels
            .iter_mut()
            .zip(&other.channels)
            .for_each(|(a, b)| a.combine(b));
        Ok(())
    }

    /// Derived per-channel statistics.  Channels that never saw a sample
    /// report zero mean and spread.
    pub fn summary(&self) -> Vec<ChannelSummary> {
        let summaries: Vec<ChannelSummary> = self
            .channels
            .iter()
            .map(|c| {
                c.summary().unwrap_or(ChannelSummary {
                    count: 0,
                    mean: 0.0,
                    stdev: 0.0,
                    skewness: 0.0,
                    kurtosis: 0.0,
                    min: 0.0,
                    max: 0.0,
                })
            })
            .collect();
        if let Some(first) = summaries.first() {
            info!(
                "moment summary over {} channels, {} samples each",
                summaries.len(),
                first.count
            );
        }
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{s, Array2};

    fn two_pass(values: &[f64]) -> (f64, f64, f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let m = |p: i32| values.iter().map(|v| (v - mean).powi(p)).sum::<f64>();
        (mean, m(2), m(3), m(4))
    }

    fn skewed_block(nsamps: usize, nchans: usize) -> Array2<f32> {
        Array2::from_shape_fn((nsamps, nchans), |(i, j)| {
            let x = ((i * 7919 + j * 104729) % 1000) as f32 / 100.0;
            x * x / 10.0 + j as f32
        })
    }

    #[test]
    fn matches_two_pass_moments() {
        let block = skewed_block(500, 3);
        let mut acc = MomentAccumulator::new(3);
        acc.update(block.view()).unwrap();

        for j in 0..3 {
            let column: Vec<f64> = block.column(j).iter().map(|&v| v as f64).collect();
            let (mean, m2, m3, m4) = two_pass(&column);
            let c = acc.channel(j).unwrap();
            assert_eq!(c.count, 500);
            assert_relative_eq!(c.m1, mean, max_relative = 1e-9);
            assert_relative_eq!(c.m2, m2, max_relative = 1e-9);
            assert_relative_eq!(c.m3, m3, max_relative = 1e-7);
            assert_relative_eq!(c.m4, m4, max_relative = 1e-7);
        }
    }

    #[test]
    fn first_block_seeds_min_max() {
        let block = Array2::from_shape_vec((3, 2), vec![5.0, -1.0, 7.0, -3.0, 6.0, -2.0]).unwrap();
        let mut acc = MomentAccumulator::new(2);
        acc.update(block.view()).unwrap();
        let c0 = acc.channel(0).unwrap();
        let c1 = acc.channel(1).unwrap();
        assert_eq!((c0.min, c0.max), (5.0, 7.0));
        assert_eq!((c1.min, c1.max), (-3.0, -1.0));
    }

    #[test]
    fn count_continues_across_calls() {
        let block = skewed_block(40, 2);
        let mut acc = MomentAccumulator::new(2);
        acc.update(block.slice(s![..15, ..])).unwrap();
        acc.update(block.slice(s![15.., ..])).unwrap();
        assert_eq!(acc.counts(), vec![40, 40]);

        let mut whole = MomentAccumulator::new(2);
        whole.update(block.view()).unwrap();
        for (a, b) in acc.channels().iter().zip(whole.channels()) {
            assert_relative_eq!(a.m2, b.m2, max_relative = 1e-12);
            assert_eq!(a.min, b.min);
            assert_eq!(a.max, b.max);
        }
    }

    #[test]
    fn merge_equals_sequential_feed() {
        let block = skewed_block(300, 4);
        let mut left = MomentAccumulator::new(4);
        let mut right = MomentAccumulator::new(4);
        left.update(block.slice(s![..120, ..])).unwrap();
        right.update(block.slice(s![120.., ..])).unwrap();
        left.merge(&right).unwrap();

        let mut whole = MomentAccumulator::new(4);
        whole.update(block.view()).unwrap();
        for (a, b) in left.channels().iter().zip(whole.channels()) {
            assert_eq!(a.count, b.count);
            assert_relative_eq!(a.m1, b.m1, max_relative = 1e-10);
            assert_relative_eq!(a.m2, b.m2, max_relative = 1e-9);
            assert_relative_eq!(a.m3, b.m3, max_relative = 1e-7);
            assert_relative_eq!(a.m4, b.m4, max_relative = 1e-7);
            assert_eq!((a.min, a.max), (b.min, b.max));
        }
    }

    #[test]
    fn merge_into_empty_copies() {
        let block = skewed_block(10, 2);
        let mut filled = MomentAccumulator::new(2);
        filled.update(block.view()).unwrap();
        let mut empty = MomentAccumulator::new(2);
        empty.merge(&filled).unwrap();
        assert_eq!(empty, filled);

        assert!(empty.merge(&MomentAccumulator::new(3)).is_err());
    }

    #[test]
    fn summary_of_symmetric_data() {
        let block = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let mut acc = MomentAccumulator::new(1);
        acc.update(block.view()).unwrap();
        let s = acc.summary()[0];
        assert_relative_eq!(s.mean, 2.5);
        assert_relative_eq!(s.stdev, 1.25f64.sqrt());
        assert_relative_eq!(s.skewness, 0.0, epsilon = 1e-12);
        // Uniform over four points: m4/n / var² = 2.5625 / 1.5625
        assert_relative_eq!(s.kurtosis, 2.5625 / 1.5625 - 3.0, epsilon = 1e-12);
    }

    #[test]
    fn rejects_channel_mismatch() {
        let mut acc = MomentAccumulator::new(3);
        let block = Array2::<f32>::zeros((2, 4));
        assert!(acc.update(block.view()).is_err());
        assert_eq!(acc.counts(), vec![0, 0, 0]);
    }
}
