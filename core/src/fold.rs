//! Phase folding of filterbank data under a constant-period,
//! constant-acceleration timing model.
//!
//! # Algorithm
//!
//! For every row `r` of a block that can be fully dedispersed, at global
//! sample `g = index + r` and time `t = g · tsamp`:
//!
//! 1. **Phase** — `φ = nbins · t · (1 + a · (t − tobs) / 2c) / P`, where the
//!    acceleration term is a first-order Doppler correction for a source
//!    with constant line-of-sight acceleration `a`.
//! 2. **Phase bin** — `floor(φ + 0.5)` wrapped into `[0, nbins)` with a
//!    Euclidean remainder, so a negative phase still lands in a valid bin.
//! 3. **Sub-integration** — `floor(g · nints / totnsamps)`: equal-duration
//!    slices of the whole observation, independent of block boundaries.
//! 4. **Scatter** — every channel `j` adds its delay-aligned sample to cell
//!    `(subint, floor(j · nsubs / nchans), bin)` and bumps the matching hit
//!    count.
//!
//! # Concurrency
//!
//! The scatter is many-to-one: any number of `(row, channel)` pairs may
//! land in the same cell, so rows cannot be split across threads.  The
//! subband of a cell depends only on the channel, though, so each subband
//! owns a disjoint `(nints, nbins)` plane of the profile for every
//! period/acceleration/subint choice.  [`FoldedProfile::fold`] runs one task
//! per subband plane, visiting rows and channels in the same order as the
//! sequential loop in [`FoldedProfile::fold_sequential`]; the two produce
//! bit-identical profiles.

use std::ops::Range;

use log::debug;
use ndarray::{ArrayView2, Array3, Axis, Zip};
use rayon::prelude::*;

use crate::block::{check_len, check_window, DelayTable, KernelError};
use crate::types::{FilterbankHeader, FoldParams, KernelConfig};

/// Speed of light in m/s.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Phase bin of time `t` (seconds from the start of the observation).
pub fn phase_bin(t: f64, tobs: f64, params: &FoldParams) -> usize {
    let nbins = params.nbins as f64;
    let doppler = 1.0 + params.accel * (t - tobs) / (2.0 * SPEED_OF_LIGHT);
    let phase = nbins * t * doppler / params.period;
    ((phase + 0.5).floor() as i64).rem_euclid(params.nbins as i64) as usize
}

// ---------------------------------------------------------------------------
// FoldedProfile
// ---------------------------------------------------------------------------

/// Folded pulse profile accumulated over an observation.
///
/// Holds the summed power and the hit counts, both shaped
/// `(nints, nsubs, nbins)` with the phase bin varying fastest.  Create one
/// per observation and fold every block into it; the profile is only ever
/// added to until [`FoldedProfile::reset`].
#[derive(Clone, Debug)]
pub struct FoldedProfile {
    params: FoldParams,
    data: Array3<f32>,
    counts: Array3<u64>,
}

impl FoldedProfile {
    pub fn new(params: FoldParams) -> Result<Self, KernelError> {
        params.validate()?;
        let shape = (params.nints, params.nsubs, params.nbins);
        Ok(Self {
            params,
            data: Array3::zeros(shape),
            counts: Array3::zeros(shape),
        })
    }

    pub fn params(&self) -> &FoldParams {
        &self.params
    }

    /// Summed power, `(nints, nsubs, nbins)`.
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Hit counts, `(nints, nsubs, nbins)`.
    pub fn counts(&self) -> &Array3<u64> {
        &self.counts
    }

    pub fn total_hits(&self) -> u64 {
        self.counts.sum()
    }

    /// Zero both accumulators for a new observation.
    pub fn reset(&mut self) {
        self.data.fill(0.0);
        self.counts.fill(0);
    }

    /// Mean power per cell; cells with no hits are zero.
    pub fn normalised(&self) -> Array3<f32> {
        let mut out = Array3::zeros(self.data.raw_dim());
        Zip::from(&mut out)
            .and(&self.data)
            .and(&self.counts)
            .for_each(|o, &v, &c| {
                if c > 0 {
                    *o = v / c as f32;
                }
            });
        out
    }

    /// Fold one block whose first row is global sample `index`.
    ///
    /// Subbands are folded in parallel when `config.fold_parallel` is set,
    /// otherwise this is [`FoldedProfile::fold_sequential`].
    pub fn fold(
        &mut self,
        block: ArrayView2<f32>,
        delays: &DelayTable,
        header: &FilterbankHeader,
        index: usize,
        config: &KernelConfig,
    ) -> Result<(), KernelError> {
        if !config.fold_parallel {
            return self.fold_sequential(block, delays, header, index);
        }
        let rows = self.plan(&block, delays, header, index)?;
        let nchans = block.ncols();
        let nsubs = self.params.nsubs;
        let d = delays.delays();

        self.data
            .axis_iter_mut(Axis(1))
            .into_par_iter()
            .zip(self.counts.axis_iter_mut(Axis(1)).into_par_iter())
            .enumerate()
            .for_each(|(sb, (mut plane, mut hits))| {
                let chans = subband_channels(sb, nchans, nsubs);
                for (r, &(subint, bin)) in rows.iter().enumerate() {
                    for j in chans.clone() {
                        plane[[subint, bin]] += block[[r + d[j], j]];
                        hits[[subint, bin]] += 1;
                    }
                }
            });
        Ok(())
    }

    /// Fold one block with a single-threaded row-then-channel scatter.
    pub fn fold_sequential(
        &mut self,
        block: ArrayView2<f32>,
        delays: &DelayTable,
        header: &FilterbankHeader,
        index: usize,
    ) -> Result<(), KernelError> {
        let rows = self.plan(&block, delays, header, index)?;
        let nchans = block.ncols();
        let nsubs = self.params.nsubs;

        for (r, &(subint, bin)) in rows.iter().enumerate() {
            for (j, &delay) in delays.delays().iter().enumerate() {
                let cell = [subint, j * nsubs / nchans, bin];
                self.data[cell] += block[[r + delay, j]];
                self.counts[cell] += 1;
            }
        }
        Ok(())
    }

    /// Validate a fold call and resolve each valid row to its
    /// `(subint, phasebin)` cell coordinates.
    fn plan(
        &self,
        block: &ArrayView2<f32>,
        delays: &DelayTable,
        header: &FilterbankHeader,
        index: usize,
    ) -> Result<Vec<(usize, usize)>, KernelError> {
        let nvalid = delays.validate(block)?;
        check_len("header channel count", block.ncols(), header.nchans)?;
        if self.params.nsubs > header.nchans {
            return Err(KernelError::shape(
                "fold subbands",
                format!("<= {} channels", header.nchans),
                self.params.nsubs,
            ));
        }
        if self.params.nints > header.nsamples {
            return Err(KernelError::shape(
                "fold subints",
                format!("<= {} samples", header.nsamples),
                self.params.nints,
            ));
        }
        if !(header.tsamp > 0.0) {
            return Err(KernelError::DegenerateParameter(format!(
                "tsamp must be positive, got {}",
                header.tsamp
            )));
        }
        check_window("observation length", index, nvalid, header.nsamples)?;

        let totnsamps = header.nsamples;
        let tobs = header.tobs();
        let nints = self.params.nints;
        debug!(
            "fold: {:?} block at sample {}, P={} s, a={} m/s², {} rows",
            block.dim(),
            index,
            self.params.period,
            self.params.accel,
            nvalid
        );

        Ok((index..index + nvalid)
            .map(|g| {
                let subint = g * nints / totnsamps;
                (subint, phase_bin(g as f64 * header.tsamp, tobs, &self.params))
            })
            .collect())
    }
}

/// Channels `j` with `floor(j * nsubs / nchans) == sb`.
fn subband_channels(sb: usize, nchans: usize, nsubs: usize) -> Range<usize> {
    (sb * nchans).div_ceil(nsubs)..((sb + 1) * nchans).div_ceil(nsubs)
}
