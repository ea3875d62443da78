//! Cold-plasma dispersion delay model.
//!
//! A broadband pulse travelling through the ionised interstellar medium
//! arrives later at low frequencies: `Δt = KDM · DM · (f⁻² − f_ref⁻²)`.
//! This module turns a dispersion measure and the channel frequencies of a
//! [`FilterbankHeader`] into the integer [`DelayTable`] consumed by the
//! dedispersion, subbanding and folding kernels.

use log::debug;

use crate::block::{DelayTable, KernelError};
use crate::types::FilterbankHeader;

/// Dispersion constant in s · MHz² · pc⁻¹ · cm³.
pub const KDM: f64 = 4.148808e3;

/// Dispersion delay in seconds of frequency `f_mhz` relative to `f_ref_mhz`.
pub fn dm_smearing_delay(dm: f64, f_mhz: f64, f_ref_mhz: f64) -> f64 {
    KDM * dm * (f_mhz.powi(-2) - f_ref_mhz.powi(-2))
}

/// Per-channel sample delays for `dm`, referenced to the highest channel
/// frequency so every delay is non-negative.
pub fn dm_delays(header: &FilterbankHeader, dm: f64) -> Result<DelayTable, KernelError> {
    if !(header.tsamp > 0.0) {
        return Err(KernelError::DegenerateParameter(format!(
            "tsamp must be positive, got {}",
            header.tsamp
        )));
    }
    if !(dm >= 0.0) || !dm.is_finite() {
        return Err(KernelError::DegenerateParameter(format!(
            "dispersion measure must be finite and >= 0, got {}",
            dm
        )));
    }

    let freqs = header.channel_freqs();
    if let Some(j) = freqs.iter().position(|&f| !(f > 0.0)) {
        return Err(KernelError::DegenerateParameter(format!(
            "channel {} has non-positive frequency {} MHz",
            j, freqs[j]
        )));
    }

    let f_ref = freqs.iter().copied().fold(f64::MIN, f64::max);
    let delays: Vec<usize> = freqs
        .iter()
        .map(|&f| (dm_smearing_delay(dm, f, f_ref) / header.tsamp).round() as usize)
        .collect();

    let table = DelayTable::new(delays);
    debug!(
        "DM {:.3}: {} channels, max delay {} samples",
        dm,
        table.nchans(),
        table.max_delay()
    );
    Ok(table)
}
