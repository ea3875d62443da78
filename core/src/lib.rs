//! # pulsekern-core
//!
//! Array kernels for radio-telescope filterbank data, the numerical core of
//! a pulsar / fast-radio-burst search pipeline.  Optional Python bindings
//! are provided via [PyO3](https://pyo3.rs) behind the `python` feature.
//!
//! ## Overview
//!
//! A filterbank block is a dense `(nsamps, nchans)` array of power spectra,
//! one row per time sample.  Every kernel borrows a block, writes into a
//! caller-owned output or accumulator, and performs no I/O:
//!
//! | Module           | Purpose                                                   |
//! |------------------|-----------------------------------------------------------|
//! | [`block`]        | Error type, delay tables, channel→subband maps            |
//! | [`delay`]        | Dispersion delay model (DM → per-channel sample delays)   |
//! | [`reduce`]       | Time series, bandpass, block-average downsampling         |
//! | [`dedispersion`] | Incoherent dedispersion and subbanding                    |
//! | [`fold`]         | Phase folding with an acceleration-corrected timing model |
//! | [`stats`]        | Single-pass per-channel moments (mean … 4th moment)       |
//! | [`quantize`]     | 8-bit quantization with outlier flags                     |
//! | [`correct`]      | Bandpass normalisation and zero-DM removal                |
//! | [`transform`]    | Masking, band inversion, channel extraction, transposes   |
//! | [`types`]        | Shared parameter structs (header, fold params, config)    |
//!
//! ## Parallelism
//!
//! Kernels run on the current rayon pool and only split work along a
//! dimension whose outputs are disjoint (rows, channels, or fold subbands),
//! so no kernel takes a lock.  Use [`KernelConfig::build_pool`] and
//! `pool.install(..)` to bound the thread count.
//!
//! ## Example
//!
//! ```
//! use ndarray::{Array1, Array2};
//! use pulsekern_core::{dedispersion, DelayTable};
//!
//! let block = Array2::<f32>::ones((8, 4));
//! let delays = DelayTable::new(vec![0, 1, 2, 3]);
//! let mut series = Array1::<f32>::zeros(delays.valid_rows(8));
//! dedispersion::dedisperse(block.view(), &delays, series.view_mut(), 0).unwrap();
//! assert!(series.iter().all(|&v| v == 4.0));
//! ```

pub mod block;
pub mod correct;
pub mod dedispersion;
pub mod delay;
pub mod fold;
pub mod quantize;
pub mod reduce;
pub mod stats;
pub mod transform;
pub mod types;

#[cfg(feature = "python")]
mod python;

// Re-export the most commonly used items at crate root for convenience.
pub use block::{DelayTable, KernelError, SubbandMap};
pub use fold::FoldedProfile;
pub use quantize::QuantCalibration;
pub use stats::{ChannelMoments, ChannelSummary, MomentAccumulator};
pub use types::{FilterbankHeader, FoldParams, KernelConfig};
