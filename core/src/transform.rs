//! Layout utilities: channel masking, band inversion, channel extraction and
//! channel-major staging.

use log::debug;
use ndarray::{s, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Zip};

use crate::block::{check_len, check_window, KernelError};

/// Zero every sample of the channels whose `mask` entry is `false`.
pub fn mask_channels(mut block: ArrayViewMut2<f32>, mask: &[bool]) -> Result<(), KernelError> {
    check_len("channel mask", block.ncols(), mask.len())?;
    let masked = mask.iter().filter(|&&keep| !keep).count();
    debug!("mask_channels: zeroing {} of {} channels", masked, mask.len());

    Zip::from(block.columns_mut())
        .and(ArrayView1::from(mask))
        .par_for_each(|mut column, &keep| {
            if !keep {
                column.fill(0.0);
            }
        });
    Ok(())
}

/// Reverse the channel order of every row: `out[i][j] = block[i][nchans − 1 − j]`.
pub fn invert_frequency(block: ArrayView2<f32>, mut out: ArrayViewMut2<f32>) -> Result<(), KernelError> {
    if out.dim() != block.dim() {
        return Err(KernelError::shape(
            "inverted output",
            format!("{:?}", block.dim()),
            format!("{:?}", out.dim()),
        ));
    }
    Zip::from(out.rows_mut())
        .and(block.rows())
        .par_for_each(|mut out_row, row| out_row.assign(&row.slice(s![..;-1])));
    Ok(())
}

/// Copy channel `chan` into `out[index .. index + nsamps]`.
pub fn extract_channel(
    block: ArrayView2<f32>,
    chan: usize,
    mut out: ArrayViewMut1<f32>,
    index: usize,
) -> Result<(), KernelError> {
    let (nsamps, nchans) = block.dim();
    if chan >= nchans {
        return Err(KernelError::OutOfRange {
            what: "channel",
            index: chan,
            limit: nchans,
        });
    }
    check_window("channel output", index, nsamps, out.len())?;
    out.slice_mut(s![index..index + nsamps]).assign(&block.column(chan));
    Ok(())
}

/// Transpose `block` into channel-major segments of length `gulp`:
/// `out[j][i] = block[i][j]`.
///
/// `out` has shape `(nchans, gulp)` with `gulp >= nsamps`; columns past
/// `nsamps` are left untouched so a short final block can share the same
/// staging buffer.
pub fn deinterleave(block: ArrayView2<f32>, mut out: ArrayViewMut2<f32>) -> Result<(), KernelError> {
    let (nsamps, nchans) = block.dim();
    let (rows, gulp) = out.dim();
    check_len("deinterleave output channels", nchans, rows)?;
    if gulp < nsamps {
        return Err(KernelError::shape("gulp", format!(">= {}", nsamps), gulp));
    }

    Zip::from(out.rows_mut())
        .and(block.columns())
        .par_for_each(|mut segment, column| {
            segment.slice_mut(s![..nsamps]).assign(&column);
        });
    Ok(())
}
