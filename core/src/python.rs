//! Python bindings (feature `python`).
//!
//! Blocks cross the boundary as flat row-major `Vec<f32>` plus their shape,
//! which is how a numpy caller hands over `array.ravel()`.  Stateless
//! kernels return fresh buffers; the two accumulators are exposed as
//! classes that keep their state on the Rust side.

use ndarray::{Array1, Array2, ArrayView2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::block::{DelayTable, KernelError, SubbandMap};
use crate::fold::FoldedProfile;
use crate::quantize::QuantCalibration;
use crate::stats::MomentAccumulator;
use crate::types::{FilterbankHeader, FoldParams, KernelConfig};
use crate::{correct, dedispersion, delay, reduce, transform};

impl From<KernelError> for PyErr {
    fn from(e: KernelError) -> Self {
        PyValueError::new_err(e.to_string())
    }
}

fn block_view(data: &[f32], nsamps: usize, nchans: usize) -> PyResult<ArrayView2<'_, f32>> {
    ArrayView2::from_shape((nsamps, nchans), data).map_err(|e| PyValueError::new_err(e.to_string()))
}

fn into_flat<T>(array: Array2<T>) -> Vec<T> {
    array.into_raw_vec()
}

#[pyfunction]
#[pyo3(name = "time_series")]
fn py_time_series(data: Vec<f32>, nsamps: usize, nchans: usize) -> PyResult<Vec<f32>> {
    let block = block_view(&data, nsamps, nchans)?;
    let mut out = Array1::<f32>::zeros(nsamps);
    reduce::time_series(block, out.view_mut(), 0)?;
    Ok(out.to_vec())
}

#[pyfunction]
#[pyo3(name = "bandpass")]
fn py_bandpass(data: Vec<f32>, nsamps: usize, nchans: usize) -> PyResult<Vec<f64>> {
    let block = block_view(&data, nsamps, nchans)?;
    let mut out = Array1::<f64>::zeros(nchans);
    reduce::bandpass(block, out.view_mut())?;
    Ok(out.to_vec())
}

#[pyfunction]
#[pyo3(name = "downsample")]
fn py_downsample(
    data: Vec<f32>,
    nsamps: usize,
    nchans: usize,
    tfactor: usize,
    ffactor: usize,
) -> PyResult<Vec<f32>> {
    let block = block_view(&data, nsamps, nchans)?;
    let mut out = Array2::<f32>::zeros(reduce::downsampled_shape(nsamps, nchans, tfactor, ffactor));
    reduce::downsample(block, out.view_mut(), tfactor, ffactor)?;
    Ok(into_flat(out))
}

#[pyfunction]
#[pyo3(name = "dm_delays")]
fn py_dm_delays(nchans: usize, tsamp: f64, fch1: f64, foff: f64, dm: f64) -> PyResult<Vec<usize>> {
    let header = FilterbankHeader::new(nchans, 0, tsamp, fch1, foff);
    Ok(delay::dm_delays(&header, dm)?.delays().to_vec())
}

#[pyfunction]
#[pyo3(name = "dedisperse")]
fn py_dedisperse(data: Vec<f32>, nsamps: usize, nchans: usize, delays: Vec<usize>) -> PyResult<Vec<f32>> {
    let block = block_view(&data, nsamps, nchans)?;
    let delays = DelayTable::new(delays);
    let mut out = Array1::<f32>::zeros(delays.valid_rows(nsamps));
    dedispersion::dedisperse(block, &delays, out.view_mut(), 0)?;
    Ok(out.to_vec())
}

#[pyfunction]
#[pyo3(name = "subband")]
fn py_subband(
    data: Vec<f32>,
    nsamps: usize,
    nchans: usize,
    delays: Vec<usize>,
    chan_to_sub: Vec<usize>,
    nsubs: usize,
) -> PyResult<Vec<f32>> {
    let block = block_view(&data, nsamps, nchans)?;
    let delays = DelayTable::new(delays);
    let map = SubbandMap::new(chan_to_sub, nsubs)?;
    let mut out = Array2::<f32>::zeros((delays.valid_rows(nsamps), nsubs));
    dedispersion::subband(block, &delays, &map, out.view_mut())?;
    Ok(into_flat(out))
}

#[pyfunction]
#[pyo3(name = "to_8bit")]
fn py_to_8bit(
    data: Vec<f32>,
    nsamps: usize,
    nchans: usize,
    scale: Vec<f32>,
    offset: Vec<f32>,
    flag_min: Vec<f32>,
    flag_max: Vec<f32>,
) -> PyResult<(Vec<u8>, Vec<u8>)> {
    let block = block_view(&data, nsamps, nchans)?;
    let cal = QuantCalibration::new(scale, offset, flag_min, flag_max)?;
    let mut out = Array2::<u8>::zeros((nsamps, nchans));
    let mut flags = Array2::<u8>::zeros((nsamps, nchans));
    crate::quantize::to_8bit(block, &cal, out.view_mut(), flags.view_mut())?;
    Ok((into_flat(out), into_flat(flags)))
}

#[pyfunction]
#[pyo3(name = "normalize_bandpass")]
fn py_normalize_bandpass(
    data: Vec<f32>,
    nsamps: usize,
    nchans: usize,
    means: Vec<f32>,
    stdevs: Vec<f32>,
) -> PyResult<Vec<f32>> {
    let block = block_view(&data, nsamps, nchans)?;
    let mut out = Array2::<f32>::zeros((nsamps, nchans));
    correct::normalize_bandpass(block, &means, &stdevs, out.view_mut())?;
    Ok(into_flat(out))
}

#[pyfunction]
#[pyo3(name = "remove_zero_dm")]
fn py_remove_zero_dm(
    data: Vec<f32>,
    nsamps: usize,
    nchans: usize,
    bpass: Vec<f32>,
    chan_weights: Vec<f32>,
) -> PyResult<Vec<f32>> {
    let block = block_view(&data, nsamps, nchans)?;
    let mut out = Array2::<f32>::zeros((nsamps, nchans));
    correct::remove_zero_dm(block, &bpass, &chan_weights, out.view_mut())?;
    Ok(into_flat(out))
}

#[pyfunction]
#[pyo3(name = "mask_channels")]
fn py_mask_channels(data: Vec<f32>, nsamps: usize, nchans: usize, mask: Vec<bool>) -> PyResult<Vec<f32>> {
    let mut block = Array2::from_shape_vec((nsamps, nchans), data)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    transform::mask_channels(block.view_mut(), &mask)?;
    Ok(into_flat(block))
}

#[pyfunction]
#[pyo3(name = "invert_frequency")]
fn py_invert_frequency(data: Vec<f32>, nsamps: usize, nchans: usize) -> PyResult<Vec<f32>> {
    let block = block_view(&data, nsamps, nchans)?;
    let mut out = Array2::<f32>::zeros((nsamps, nchans));
    transform::invert_frequency(block, out.view_mut())?;
    Ok(into_flat(out))
}

#[pyfunction]
#[pyo3(name = "extract_channel")]
fn py_extract_channel(data: Vec<f32>, nsamps: usize, nchans: usize, chan: usize) -> PyResult<Vec<f32>> {
    let block = block_view(&data, nsamps, nchans)?;
    let mut out = Array1::<f32>::zeros(nsamps);
    transform::extract_channel(block, chan, out.view_mut(), 0)?;
    Ok(out.to_vec())
}

#[pyfunction]
#[pyo3(name = "deinterleave")]
fn py_deinterleave(data: Vec<f32>, nsamps: usize, nchans: usize, gulp: usize) -> PyResult<Vec<f32>> {
    let block = block_view(&data, nsamps, nchans)?;
    let mut out = Array2::<f32>::zeros((nchans, gulp));
    transform::deinterleave(block, out.view_mut())?;
    Ok(into_flat(out))
}

// ---------------------------------------------------------------------------
// Accumulators
// ---------------------------------------------------------------------------

/// Streaming per-channel moments.
#[pyclass(name = "MomentAccumulator")]
pub struct PyMomentAccumulator {
    inner: MomentAccumulator,
}

#[pymethods]
impl PyMomentAccumulator {
    #[new]
    fn new(nchans: usize) -> Self {
        Self {
            inner: MomentAccumulator::new(nchans),
        }
    }

    fn update(&mut self, data: Vec<f32>, nsamps: usize) -> PyResult<()> {
        let block = block_view(&data, nsamps, self.inner.nchans())?;
        Ok(self.inner.update(block)?)
    }

    fn merge(&mut self, other: &PyMomentAccumulator) -> PyResult<()> {
        Ok(self.inner.merge(&other.inner)?)
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn counts(&self) -> Vec<u64> {
        self.inner.counts()
    }

    /// `(count, m1, m2, m3, m4, min, max)` per channel.
    fn moments(&self) -> Vec<(u64, f64, f64, f64, f64, f32, f32)> {
        self.inner
            .channels()
            .iter()
            .map(|c| (c.count, c.m1, c.m2, c.m3, c.m4, c.min, c.max))
            .collect()
    }

    /// Serialise the derived per-channel statistics to JSON.
    fn summary_json(&self) -> PyResult<String> {
        serde_json::to_string_pretty(&self.inner.summary())
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    fn __repr__(&self) -> String {
        format!("MomentAccumulator(nchans={})", self.inner.nchans())
    }
}

/// Folded profile accumulated across blocks of one observation.
#[pyclass(name = "FoldedProfile")]
pub struct PyFoldedProfile {
    inner: FoldedProfile,
    config: KernelConfig,
}

#[pymethods]
impl PyFoldedProfile {
    #[new]
    #[pyo3(signature = (period, nbins, accel=0.0, nints=1, nsubs=1, parallel=true))]
    fn new(period: f64, nbins: usize, accel: f64, nints: usize, nsubs: usize, parallel: bool) -> PyResult<Self> {
        let inner = FoldedProfile::new(FoldParams::new(period, accel, nbins, nints, nsubs))?;
        let config = KernelConfig {
            fold_parallel: parallel,
            ..KernelConfig::default()
        };
        Ok(Self { inner, config })
    }

    /// Fold a block whose first row is global sample `index` of an
    /// observation `totnsamps` samples long.
    #[pyo3(signature = (data, nsamps, nchans, delays, tsamp, totnsamps, index=0))]
    fn fold(
        &mut self,
        data: Vec<f32>,
        nsamps: usize,
        nchans: usize,
        delays: Vec<usize>,
        tsamp: f64,
        totnsamps: usize,
        index: usize,
    ) -> PyResult<()> {
        let block = block_view(&data, nsamps, nchans)?;
        let header = FilterbankHeader::new(nchans, totnsamps, tsamp, 0.0, 0.0);
        let delays = DelayTable::new(delays);
        Ok(self.inner.fold(block, &delays, &header, index, &self.config)?)
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    /// `(nints, nsubs, nbins)`.
    fn shape(&self) -> (usize, usize, usize) {
        self.inner.data().dim()
    }

    fn data(&self) -> Vec<f32> {
        self.inner.data().iter().copied().collect()
    }

    fn counts(&self) -> Vec<u64> {
        self.inner.counts().iter().copied().collect()
    }

    fn __repr__(&self) -> String {
        format!("FoldedProfile({:?})", self.inner.params())
    }
}

/// The top-level Python module exposed by this crate.
#[pymodule]
fn pulsekern_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(py_time_series, m)?)?;
    m.add_function(wrap_pyfunction!(py_bandpass, m)?)?;
    m.add_function(wrap_pyfunction!(py_downsample, m)?)?;
    m.add_function(wrap_pyfunction!(py_dm_delays, m)?)?;
    m.add_function(wrap_pyfunction!(py_dedisperse, m)?)?;
    m.add_function(wrap_pyfunction!(py_subband, m)?)?;
    m.add_function(wrap_pyfunction!(py_to_8bit, m)?)?;
    m.add_function(wrap_pyfunction!(py_normalize_bandpass, m)?)?;
    m.add_function(wrap_pyfunction!(py_remove_zero_dm, m)?)?;
    m.add_function(wrap_pyfunction!(py_mask_channels, m)?)?;
    m.add_function(wrap_pyfunction!(py_invert_frequency, m)?)?;
    m.add_function(wrap_pyfunction!(py_extract_channel, m)?)?;
    m.add_function(wrap_pyfunction!(py_deinterleave, m)?)?;
    m.add_class::<PyMomentAccumulator>()?;
    m.add_class::<PyFoldedProfile>()?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("__doc__", "Filterbank array kernels for pulsar and FRB searches.")?;
    Ok(())
}
