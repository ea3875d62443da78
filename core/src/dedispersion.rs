//! Incoherent dedispersion.
//!
//! # Background
//!
//! A dispersed broadband pulse reaches each frequency channel at a
//! different time.  Given the per-channel sample delays for a trial
//! dispersion measure (see [`crate::delay`]), shifting every channel back by
//! its delay and summing across the band re-aligns the pulse into a single
//! time series:
//!
//! ```text
//! out[index + r] += Σ_j block[r + delay[j]][j]      for r in [0, nsamps - maxdelay)
//! ```
//!
//! The last `maxdelay` rows of a block cannot be fully dedispersed and are
//! left for the caller to carry into the leading rows of the next block
//! (overlap-save).
//!
//! [`subband`] applies the same alignment but sums into a reduced set of
//! channel groups instead of a single series.

use log::debug;
use ndarray::{s, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis, Zip};
use rayon::prelude::*;

use crate::block::{check_len, check_window, DelayTable, KernelError, SubbandMap};

/// Dedisperse `block` with `delays`, adding the aligned channel sums into
/// `out[index .. index + nsamps - maxdelay]`.
///
/// Accumulates, so one output series can be built from many blocks.
pub fn dedisperse(
    block: ArrayView2<f32>,
    delays: &DelayTable,
    mut out: ArrayViewMut1<f32>,
    index: usize,
) -> Result<(), KernelError> {
    let nvalid = delays.validate(&block)?;
    check_window("dedispersed output", index, nvalid, out.len())?;
    debug!(
        "dedisperse: {:?} block, maxdelay {}, {} output rows at offset {}",
        block.dim(),
        delays.max_delay(),
        nvalid,
        index
    );

    let d = delays.delays();
    let mut window = out.slice_mut(s![index..index + nvalid]);
    Zip::indexed(&mut window).par_for_each(|r, o| {
        for (j, &delay) in d.iter().enumerate() {
            *o += block[[r + delay, j]];
        }
    });
    Ok(())
}

/// Dedisperse `block` into `nsubs` channel groups.
///
/// `out` must have shape `(nsamps - maxdelay, nsubs)`; it is zero-filled
/// on entry, so unlike [`dedisperse`] this kernel does not accumulate
/// across calls.
pub fn subband(
    block: ArrayView2<f32>,
    delays: &DelayTable,
    map: &SubbandMap,
    mut out: ArrayViewMut2<f32>,
) -> Result<(), KernelError> {
    let nvalid = delays.validate(&block)?;
    check_len("subband map", block.ncols(), map.nchans())?;
    let expected = (nvalid, map.nsubs());
    if out.dim() != expected {
        return Err(KernelError::shape(
            "subband output",
            format!("{:?}", expected),
            format!("{:?}", out.dim()),
        ));
    }
    debug!(
        "subband: {:?} block into {} subbands, maxdelay {}",
        block.dim(),
        map.nsubs(),
        delays.max_delay()
    );

    let d = delays.delays();
    let sub = map.as_slice();
    out.fill(0.0);
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(r, mut row)| {
            for (j, (&delay, &s)) in d.iter().zip(sub).enumerate() {
                row[s] += block[[r + delay, j]];
            }
        });
    Ok(())
}
