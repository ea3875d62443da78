//! Reductions along one axis of a sample block, and block-average
//! resampling.
//!
//! - [`time_series`] collapses the frequency axis (zero-DM time series).
//! - [`bandpass`] collapses the time axis (integrated spectrum).
//! - [`downsample`] averages `tfactor × ffactor` tiles.
//!
//! The first two accumulate into their outputs so a driver can stream a
//! long observation through them block by block.

use log::debug;
use ndarray::{s, ArrayView2, ArrayViewMut1, ArrayViewMut2, Zip};

use crate::block::{check_len, check_window, KernelError};

/// Add the channel sum of every row into `out[index + row]`.
///
/// `index` is the global sample offset of the block, so successive blocks
/// land at their correct position in a shared output series.  Rows are
/// reduced in parallel; each row writes a distinct output element.
pub fn time_series(
    block: ArrayView2<f32>,
    mut out: ArrayViewMut1<f32>,
    index: usize,
) -> Result<(), KernelError> {
    let (nsamps, nchans) = block.dim();
    check_window("time series output", index, nsamps, out.len())?;
    debug!("time_series: {}x{} block at offset {}", nsamps, nchans, index);

    let mut window = out.slice_mut(s![index..index + nsamps]);
    Zip::from(&mut window)
        .and(block.rows())
        .par_for_each(|o, row| *o += row.sum());
    Ok(())
}

/// Add the time sum of every channel into `spectrum[channel]`.
///
/// Accumulates in `f64`; repeated calls over successive blocks build the
/// bandpass of the whole observation.
pub fn bandpass(block: ArrayView2<f32>, mut spectrum: ArrayViewMut1<f64>) -> Result<(), KernelError> {
    let (nsamps, nchans) = block.dim();
    check_len("bandpass output", nchans, spectrum.len())?;
    debug!("bandpass: {}x{} block", nsamps, nchans);

    Zip::from(&mut spectrum)
        .and(block.columns())
        .par_for_each(|acc, column| {
            *acc += column.iter().map(|&v| v as f64).sum::<f64>();
        });
    Ok(())
}

/// Output shape of [`downsample`] for a block of `(nsamps, nchans)`.
pub fn downsampled_shape(nsamps: usize, nchans: usize, tfactor: usize, ffactor: usize) -> (usize, usize) {
    (nsamps / tfactor.max(1), nchans / ffactor.max(1))
}

/// Block-average `tfactor` rows by `ffactor` columns into one output cell.
///
/// `out` must have shape `(nsamps / tfactor, nchans / ffactor)`.  Rows and
/// columns beyond the last complete tile are dropped.
pub fn downsample(
    block: ArrayView2<f32>,
    mut out: ArrayViewMut2<f32>,
    tfactor: usize,
    ffactor: usize,
) -> Result<(), KernelError> {
    if tfactor == 0 || ffactor == 0 {
        return Err(KernelError::DegenerateParameter(format!(
            "resampling factors must be >= 1, got tfactor={} ffactor={}",
            tfactor, ffactor
        )));
    }
    let (nsamps, nchans) = block.dim();
    if nsamps > 0 && tfactor > nsamps {
        return Err(KernelError::OutOfRange {
            what: "tfactor",
            index: tfactor,
            limit: nsamps,
        });
    }
    if nchans > 0 && ffactor > nchans {
        return Err(KernelError::OutOfRange {
            what: "ffactor",
            index: ffactor,
            limit: nchans,
        });
    }
    let shape = downsampled_shape(nsamps, nchans, tfactor, ffactor);
    if out.dim() != shape {
        return Err(KernelError::shape("downsample output", format!("{:?}", shape), format!("{:?}", out.dim())));
    }
    if nsamps % tfactor != 0 || nchans % ffactor != 0 {
        debug!(
            "downsample: truncating {} rows and {} channels",
            nsamps % tfactor,
            nchans % ffactor
        );
    }

    let norm = (tfactor * ffactor) as f32;
    Zip::indexed(&mut out).par_for_each(|(r, c), o| {
        let tile = block.slice(s![r * tfactor..(r + 1) * tfactor, c * ffactor..(c + 1) * ffactor]);
        *o = tile.sum() / norm;
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, Array2};

    fn ramp(nsamps: usize, nchans: usize) -> Array2<f32> {
        Array2::from_shape_fn((nsamps, nchans), |(i, j)| (i * nchans + j) as f32)
    }

    #[test]
    fn time_series_lands_at_offset() {
        let block = ramp(3, 4);
        let mut out = Array1::<f32>::zeros(6);
        time_series(block.view(), out.view_mut(), 2).unwrap();
        assert_eq!(out.to_vec(), vec![0.0, 0.0, 6.0, 22.0, 38.0, 0.0]);

        // Second call accumulates.
        time_series(block.view(), out.view_mut(), 2).unwrap();
        assert_eq!(out[3], 44.0);
    }

    #[test]
    fn time_series_rejects_short_output() {
        let block = ramp(3, 4);
        let mut out = Array1::<f32>::from_elem(4, 7.0);
        assert!(time_series(block.view(), out.view_mut(), 2).is_err());
        assert!(out.iter().all(|&v| v == 7.0));
    }

    #[test]
    fn bandpass_accumulates_columns() {
        let block = ramp(3, 2);
        let mut spectrum = Array1::<f64>::zeros(2);
        bandpass(block.view(), spectrum.view_mut()).unwrap();
        bandpass(block.view(), spectrum.view_mut()).unwrap();
        assert_abs_diff_eq!(spectrum[0], 2.0 * (0.0 + 2.0 + 4.0));
        assert_abs_diff_eq!(spectrum[1], 2.0 * (1.0 + 3.0 + 5.0));
    }

    #[test]
    fn downsample_averages_tiles() {
        let block = ramp(4, 4);
        let mut out = Array2::<f32>::zeros((2, 2));
        downsample(block.view(), out.view_mut(), 2, 2).unwrap();
        // Top-left tile: 0, 1, 4, 5.
        assert_abs_diff_eq!(out[[0, 0]], 2.5);
        assert_abs_diff_eq!(out[[1, 1]], (10.0 + 11.0 + 14.0 + 15.0) / 4.0);
    }

    #[test]
    fn downsample_truncates_remainder() {
        let block = ramp(5, 3);
        let mut out = Array2::<f32>::zeros((2, 1));
        downsample(block.view(), out.view_mut(), 2, 2).unwrap();
        assert_abs_diff_eq!(out[[0, 0]], (0.0 + 1.0 + 3.0 + 4.0) / 4.0);
        assert_abs_diff_eq!(out[[1, 0]], (6.0 + 7.0 + 9.0 + 10.0) / 4.0);
    }

    #[test]
    fn downsample_validates_arguments() {
        let block = ramp(4, 4);
        let mut out = Array2::<f32>::zeros((2, 2));
        assert!(downsample(block.view(), out.view_mut(), 0, 1).is_err());
        assert!(downsample(block.view(), out.view_mut(), 8, 1).is_err());
        assert!(downsample(block.view(), out.view_mut(), 1, 1).is_err());
    }
}
