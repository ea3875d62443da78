//! Float → 8-bit quantization with outlier flags.
//!
//! Each sample is mapped through its channel's affine calibration,
//! `q = round(x / scale − offset)`, and receives a parallel flag byte that
//! records where the *raw* value fell relative to the channel's thresholds:
//!
//! | flag | meaning                  |
//! |------|--------------------------|
//! | `0`  | `x < flag_min`           |
//! | `1`  | within thresholds        |
//! | `2`  | `x > flag_max`           |
//!
//! The flags are independent of the quantized byte so downstream consumers
//! can drop or down-weight outliers without losing the sample itself.

use log::debug;
use ndarray::{ArrayView2, ArrayViewMut2, Zip};
use serde::{Deserialize, Serialize};

use crate::block::{check_len, KernelError};
use crate::stats::ChannelSummary;

pub const FLAG_LOW: u8 = 0;
pub const FLAG_OK: u8 = 1;
pub const FLAG_HIGH: u8 = 2;

/// Largest quantized value.
const QMAX: f32 = 255.0;

/// Per-channel affine map and flag thresholds for [`to_8bit`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantCalibration {
    pub scale: Vec<f32>,
    pub offset: Vec<f32>,
    pub flag_min: Vec<f32>,
    pub flag_max: Vec<f32>,
}

impl QuantCalibration {
    pub fn new(
        scale: Vec<f32>,
        offset: Vec<f32>,
        flag_min: Vec<f32>,
        flag_max: Vec<f32>,
    ) -> Result<Self, KernelError> {
        let nchans = scale.len();
        check_len("calibration offset", nchans, offset.len())?;
        check_len("calibration flag_min", nchans, flag_min.len())?;
        check_len("calibration flag_max", nchans, flag_max.len())?;
        Ok(Self {
            scale,
            offset,
            flag_min,
            flag_max,
        })
    }

    /// Calibrate from channel statistics: the window
    /// `[max(mean − nsigma·σ, min), min(mean + nsigma·σ, max)]` is mapped
    /// linearly onto `[0, 255]` and doubles as the flag thresholds.  A
    /// zero-width window gets unit scale.  `nsigma` must be finite and
    /// non-negative.
    pub fn from_summary(summary: &[ChannelSummary], nsigma: f64) -> Result<Self, KernelError> {
        if !(nsigma >= 0.0 && nsigma.is_finite()) {
            return Err(KernelError::DegenerateParameter(format!(
                "nsigma must be finite and >= 0, got {}",
                nsigma
            )));
        }
        let n = summary.len();
        let mut cal = Self {
            scale: Vec::with_capacity(n),
            offset: Vec::with_capacity(n),
            flag_min: Vec::with_capacity(n),
            flag_max: Vec::with_capacity(n),
        };
        for s in summary {
            let lo = ((s.mean - nsigma * s.stdev) as f32).max(s.min);
            let hi = ((s.mean + nsigma * s.stdev) as f32).min(s.max);
            let width = hi - lo;
            let scale = if width > 0.0 { width / QMAX } else { 1.0 };
            cal.scale.push(scale);
            cal.offset.push(lo / scale);
            cal.flag_min.push(lo);
            cal.flag_max.push(hi);
        }
        Ok(cal)
    }

    pub fn nchans(&self) -> usize {
        self.scale.len()
    }
}

/// Flag for raw value `x` against `[lo, hi]`.
#[inline]
pub fn flag(x: f32, lo: f32, hi: f32) -> u8 {
    if x > hi {
        FLAG_HIGH
    } else if x < lo {
        FLAG_LOW
    } else {
        FLAG_OK
    }
}

/// Quantize `block` into `out` and write a flag per sample into `flags`.
///
/// Both outputs must match the block shape.  The float → `u8` conversion
/// saturates at 0 and 255 and maps NaN to 0; choosing a calibration that
/// keeps data in range is the caller's job.
pub fn to_8bit(
    block: ArrayView2<f32>,
    cal: &QuantCalibration,
    mut out: ArrayViewMut2<u8>,
    mut flags: ArrayViewMut2<u8>,
) -> Result<(), KernelError> {
    let (nsamps, nchans) = block.dim();
    check_len("calibration channels", nchans, cal.nchans())?;
    if out.dim() != block.dim() || flags.dim() != block.dim() {
        return Err(KernelError::shape(
            "quantized output",
            format!("{:?}", block.dim()),
            format!("{:?} / {:?}", out.dim(), flags.dim()),
        ));
    }
    debug!("to_8bit: {}x{} block", nsamps, nchans);

    Zip::from(out.rows_mut())
        .and(flags.rows_mut())
        .and(block.rows())
        .par_for_each(|mut q_row, mut f_row, row| {
            for j in 0..nchans {
                let x = row[j];
                q_row[j] = (x / cal.scale[j] - cal.offset[j]).round() as u8;
                f_row[j] = flag(x, cal.flag_min[j], cal.flag_max[j]);
            }
        });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn unit_cal(nchans: usize, lo: f32, hi: f32) -> QuantCalibration {
        QuantCalibration::new(
            vec![1.0; nchans],
            vec![0.0; nchans],
            vec![lo; nchans],
            vec![hi; nchans],
        )
        .unwrap()
    }

    #[test]
    fn flags_follow_thresholds() {
        let block = Array2::from_shape_vec((1, 5), vec![-1.0, 0.0, 5.0, 10.0, 11.0]).unwrap();
        let mut out = Array2::<u8>::zeros((1, 5));
        let mut flags = Array2::<u8>::zeros((1, 5));
        to_8bit(block.view(), &unit_cal(5, 0.0, 10.0), out.view_mut(), flags.view_mut()).unwrap();
        assert_eq!(flags.row(0).to_vec(), vec![0, 1, 1, 1, 2]);
        assert_eq!(out.row(0).to_vec(), vec![0, 0, 5, 10, 11]);
    }

    #[test]
    fn affine_map_rounds() {
        let block = Array2::from_shape_vec((2, 2), vec![10.0, 3.0, 12.4, 3.8]).unwrap();
        let cal = QuantCalibration::new(vec![2.0, 0.5], vec![1.0, -2.0], vec![0.0; 2], vec![100.0; 2]).unwrap();
        let mut out = Array2::<u8>::zeros((2, 2));
        let mut flags = Array2::<u8>::zeros((2, 2));
        to_8bit(block.view(), &cal, out.view_mut(), flags.view_mut()).unwrap();
        // 10/2 - 1 = 4, 3/0.5 + 2 = 8, 12.4/2 - 1 = 5.2, 3.8/0.5 + 2 = 9.6
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![4, 8, 5, 10]);
    }

    #[test]
    fn out_of_range_saturates() {
        let block = Array2::from_shape_vec((1, 3), vec![-50.0, 300.0, f32::NAN]).unwrap();
        let mut out = Array2::<u8>::zeros((1, 3));
        let mut flags = Array2::<u8>::zeros((1, 3));
        to_8bit(block.view(), &unit_cal(3, 0.0, 255.0), out.view_mut(), flags.view_mut()).unwrap();
        assert_eq!(out.row(0).to_vec(), vec![0, 255, 0]);
        assert_eq!(flags.row(0).to_vec(), vec![0, 2, 1]);
    }

    #[test]
    fn mismatched_calibration_is_rejected() {
        assert!(QuantCalibration::new(vec![1.0; 2], vec![0.0; 3], vec![0.0; 2], vec![0.0; 2]).is_err());

        let block = Array2::<f32>::zeros((2, 3));
        let mut out = Array2::<u8>::zeros((2, 3));
        let mut flags = Array2::<u8>::from_elem((2, 3), 9);
        assert!(to_8bit(block.view(), &unit_cal(2, 0.0, 1.0), out.view_mut(), flags.view_mut()).is_err());
        assert!(flags.iter().all(|&f| f == 9));
    }

    #[test]
    fn calibration_from_summary_spans_byte_range() {
        let summary = ChannelSummary {
            count: 100,
            mean: 50.0,
            stdev: 10.0,
            skewness: 0.0,
            kurtosis: 0.0,
            min: 25.0,
            max: 200.0,
        };
        let cal = QuantCalibration::from_summary(&[summary], 3.0).unwrap();
        assert_eq!(cal.flag_min[0], 25.0);
        assert_eq!(cal.flag_max[0], 80.0);
        assert!((25.0 / cal.scale[0] - cal.offset[0]).abs() < 1e-3);
        assert!((80.0 / cal.scale[0] - cal.offset[0] - 255.0).abs() < 1e-3);
    }

    #[test]
    fn flat_channel_gets_unit_scale() {
        let summary = ChannelSummary {
            count: 10,
            mean: 4.0,
            stdev: 0.0,
            skewness: 0.0,
            kurtosis: 0.0,
            min: 4.0,
            max: 4.0,
        };
        let cal = QuantCalibration::from_summary(&[summary], 3.0).unwrap();
        assert_eq!(cal.scale[0], 1.0);
        assert_eq!(cal.offset[0], 4.0);
    }

    #[test]
    fn negative_nsigma_is_rejected() {
        let summary = ChannelSummary {
            count: 10,
            mean: 4.0,
            stdev: 1.0,
            skewness: 0.0,
            kurtosis: 0.0,
            min: 1.0,
            max: 7.0,
        };
        assert!(matches!(
            QuantCalibration::from_summary(&[summary], -1.0),
            Err(KernelError::DegenerateParameter(_))
        ));
        assert!(QuantCalibration::from_summary(&[summary], f64::NAN).is_err());

        let cal = QuantCalibration::from_summary(&[summary], 0.0).unwrap();
        assert_eq!(cal.flag_min[0], cal.flag_max[0]);
    }
}
