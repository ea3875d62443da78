//! Common parameter types shared across the kernels.
//!
//! These structures carry the per-call scalars that the caller supplies:
//! observation geometry (the filterbank header), the timing model for
//! folding, and execution settings for the worker pool.  All of them are
//! plain `serde` structs so a driver can load them from JSON.

use serde::{Deserialize, Serialize};

use crate::block::KernelError;

// ---------------------------------------------------------------------------
// FilterbankHeader
// ---------------------------------------------------------------------------

/// Geometry of a filterbank observation.
///
/// Only the fields the kernels need: the frequency axis (for the delay
/// model) and the time axis (for folding).  Header parsing lives with the
/// external block reader.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterbankHeader {
    /// Number of frequency channels.
    pub nchans: usize,

    /// Total number of time samples in the observation, across all blocks.
    pub nsamples: usize,

    /// Time between successive spectra, in seconds.
    pub tsamp: f64,

    /// Centre frequency of the *first* channel, in MHz.
    pub fch1: f64,

    /// Channel bandwidth in MHz (negative when channels run from high to
    /// low frequency, the usual sigproc convention).
    pub foff: f64,
}

impl FilterbankHeader {
    pub fn new(nchans: usize, nsamples: usize, tsamp: f64, fch1: f64, foff: f64) -> Self {
        Self {
            nchans,
            nsamples,
            tsamp,
            fch1,
            foff,
        }
    }

    /// Return the frequency of channel `i` in MHz.
    pub fn channel_freq(&self, i: usize) -> f64 {
        self.fch1 + i as f64 * self.foff
    }

    /// All channel centre frequencies, in channel order.
    pub fn channel_freqs(&self) -> Vec<f64> {
        (0..self.nchans).map(|i| self.channel_freq(i)).collect()
    }

    /// Return the total observation bandwidth in MHz.
    pub fn total_bandwidth(&self) -> f64 {
        (self.nchans as f64 * self.foff).abs()
    }

    /// Total observation length in seconds.
    pub fn tobs(&self) -> f64 {
        self.nsamples as f64 * self.tsamp
    }
}

// ---------------------------------------------------------------------------
// FoldParams
// ---------------------------------------------------------------------------

/// Timing model and output geometry for the folding engine.
///
/// The model is a constant period with a constant line-of-sight
/// acceleration; the acceleration enters as a first-order Doppler
/// correction to the pulse phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FoldParams {
    /// Trial period in seconds.
    pub period: f64,

    /// Line-of-sight acceleration in m/s².
    #[serde(default)]
    pub accel: f64,

    /// Phase bins across one period.
    pub nbins: usize,

    /// Sub-integrations the observation is partitioned into.
    #[serde(default = "one")]
    pub nints: usize,

    /// Frequency subbands the channels are grouped into.
    #[serde(default = "one")]
    pub nsubs: usize,
}

fn one() -> usize {
    1
}

impl FoldParams {
    pub fn new(period: f64, accel: f64, nbins: usize, nints: usize, nsubs: usize) -> Self {
        Self {
            period,
            accel,
            nbins,
            nints,
            nsubs,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), KernelError> {
        if !(self.period > 0.0) || !self.period.is_finite() {
            return Err(KernelError::DegenerateParameter(format!(
                "fold period must be positive, got {}",
                self.period
            )));
        }
        if !self.accel.is_finite() {
            return Err(KernelError::DegenerateParameter("acceleration is not finite".into()));
        }
        if self.nbins == 0 || self.nints == 0 || self.nsubs == 0 {
            return Err(KernelError::DegenerateParameter(format!(
                "nbins/nints/nsubs must be >= 1, got {}/{}/{}",
                self.nbins, self.nints, self.nsubs
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// KernelConfig
// ---------------------------------------------------------------------------

/// Execution settings shared by every kernel call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Number of rayon worker threads.  Set to 0 to use all available CPU
    /// cores.
    pub n_workers: usize,

    /// Fold subbands in parallel.  When false the folding engine
    /// accumulates strictly sequentially.
    pub fold_parallel: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            n_workers: 0,
            fold_parallel: true,
        }
    }
}

impl KernelConfig {
    pub fn from_json(json: &str) -> Result<Self, KernelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, KernelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build a dedicated pool sized by `n_workers`.  Kernels called inside
    /// `pool.install(..)` run on it; outside, they use rayon's global pool.
    pub fn build_pool(&self) -> Result<rayon::ThreadPool, KernelError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_workers)
            .thread_name(|i| format!("pulsekern-{}", i))
            .build()
            .map_err(|e| KernelError::ThreadPool(e.to_string()))?;
        log::info!("kernel pool ready with {} threads", pool.current_num_threads());
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_frequency_axis() {
        let header = FilterbankHeader::new(4, 100, 1e-3, 1500.0, -10.0);
        assert_eq!(header.channel_freqs(), vec![1500.0, 1490.0, 1480.0, 1470.0]);
        assert_eq!(header.total_bandwidth(), 40.0);
        assert!((header.tobs() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn config_json_defaults() {
        let config = KernelConfig::from_json(r#"{"n_workers": 3}"#).unwrap();
        assert_eq!(config.n_workers, 3);
        assert!(config.fold_parallel);

        let back = KernelConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn config_rejects_garbage() {
        assert!(matches!(
            KernelConfig::from_json("{\"n_workers\": \"many\"}"),
            Err(KernelError::Config(_))
        ));
    }

    #[test]
    fn fold_params_defaults_and_validation() {
        let params: FoldParams = serde_json::from_str(r#"{"period": 0.5, "nbins": 64}"#).unwrap();
        assert_eq!(params.nints, 1);
        assert_eq!(params.nsubs, 1);
        assert_eq!(params.accel, 0.0);
        assert!(params.validate().is_ok());

        assert!(FoldParams::new(0.0, 0.0, 64, 1, 1).validate().is_err());
        assert!(FoldParams::new(0.5, 0.0, 0, 1, 1).validate().is_err());
    }

    #[test]
    fn pool_honours_worker_count() {
        let pool = KernelConfig { n_workers: 2, fold_parallel: false }.build_pool().unwrap();
        assert_eq!(pool.current_num_threads(), 2);
    }
}
