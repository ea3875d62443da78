//! Bandpass normalisation and zero-DM removal.
//!
//! - [`normalize_bandpass`] turns every channel into zero-mean, unit-variance
//!   data from precomputed statistics.
//! - [`remove_zero_dm`] subtracts the channel-weighted zero-DM time series
//!   (Eatough, Keane & Lyne 2009): broadband interference shows up in every
//!   channel at the same time, i.e. at DM = 0, and is unlikely to be
//!   astrophysical.

use log::{debug, warn};
use ndarray::{ArrayView2, ArrayViewMut2, Zip};

use crate::block::{check_len, KernelError};

fn check_same_shape(block: &ArrayView2<f32>, out: &ArrayViewMut2<f32>) -> Result<(), KernelError> {
    if out.dim() != block.dim() {
        return Err(KernelError::shape(
            "corrected output",
            format!("{:?}", block.dim()),
            format!("{:?}", out.dim()),
        ));
    }
    Ok(())
}

/// Write `(x − mean[j]) / stdev[j]` for every sample into `out`.
///
/// A channel with `stdev == 0` uses unit scale, so a flat channel comes
/// out as zeros rather than NaN.
pub fn normalize_bandpass(
    block: ArrayView2<f32>,
    means: &[f32],
    stdevs: &[f32],
    mut out: ArrayViewMut2<f32>,
) -> Result<(), KernelError> {
    let (nsamps, nchans) = block.dim();
    check_len("channel means", nchans, means.len())?;
    check_len("channel stdevs", nchans, stdevs.len())?;
    check_same_shape(&block, &out)?;

    let scales: Vec<f64> = stdevs
        .iter()
        .map(|&s| if s == 0.0 { 1.0 } else { 1.0 / s as f64 })
        .collect();
    let flat = stdevs.iter().filter(|&&s| s == 0.0).count();
    if flat > 0 {
        warn!("normalize_bandpass: {} of {} channels have zero stdev, using unit scale", flat, nchans);
    }
    debug!("normalize_bandpass: {}x{} block", nsamps, nchans);

    Zip::from(out.rows_mut())
        .and(block.rows())
        .par_for_each(|mut out_row, row| {
            for j in 0..nchans {
                out_row[j] = ((row[j] - means[j]) as f64 * scales[j]) as f32;
            }
        });
    Ok(())
}

/// For every row, subtract `zerodm · chan_weights[j]` from each channel and
/// add back `bpass[j]`, where `zerodm` is the row's sum over all channels.
pub fn remove_zero_dm(
    block: ArrayView2<f32>,
    bpass: &[f32],
    chan_weights: &[f32],
    mut out: ArrayViewMut2<f32>,
) -> Result<(), KernelError> {
    let (nsamps, nchans) = block.dim();
    check_len("bandpass shape", nchans, bpass.len())?;
    check_len("channel weights", nchans, chan_weights.len())?;
    check_same_shape(&block, &out)?;
    debug!("remove_zero_dm: {}x{} block", nsamps, nchans);

    Zip::from(out.rows_mut())
        .and(block.rows())
        .par_for_each(|mut out_row, row| {
            let zerodm: f64 = row.iter().map(|&v| v as f64).sum();
            for j in 0..nchans {
                out_row[j] = (row[j] as f64 - zerodm * chan_weights[j] as f64 + bpass[j] as f64) as f32;
            }
        });
    Ok(())
}
