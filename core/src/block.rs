//! Shared data model for the kernels: error type, shape validation, and the
//! two lookup tables (per-channel delays and channel→subband map) consumed
//! by the delay-aware kernels.
//!
//! A *sample block* is an [`ArrayView2<f32>`] of shape `(nsamps, nchans)`:
//! one row per time sample, one column per frequency channel, so element
//! `(i, j)` sits at linear offset `i * nchans + j` in a standard-layout
//! buffer.  Kernels borrow blocks and write into caller-owned outputs; none
//! of them allocates or frees a block.

use ndarray::ArrayView2;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors reported by kernel argument validation.
///
/// Every kernel validates its arguments before touching any output buffer,
/// so an `Err` always means nothing was written.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        actual: String,
    },

    #[error("{what} out of range: {index} (limit {limit})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        limit: usize,
    },

    #[error("degenerate parameter: {0}")]
    DegenerateParameter(String),

    #[error("thread pool: {0}")]
    ThreadPool(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl KernelError {
    pub(crate) fn shape(what: &'static str, expected: impl ToString, actual: impl ToString) -> Self {
        Self::ShapeMismatch {
            what,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Fail unless `len` equals `expected`.
pub(crate) fn check_len(what: &'static str, expected: usize, len: usize) -> Result<(), KernelError> {
    if len != expected {
        return Err(KernelError::shape(what, expected, len));
    }
    Ok(())
}

/// Fail unless writing `count` elements starting at `index` fits in `len`.
pub(crate) fn check_window(
    what: &'static str,
    index: usize,
    count: usize,
    len: usize,
) -> Result<(), KernelError> {
    match index.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(KernelError::shape(
            what,
            format!("at least {} elements", index.saturating_add(count)),
            len,
        )),
    }
}

// ---------------------------------------------------------------------------
// DelayTable
// ---------------------------------------------------------------------------

/// Integer sample delay per channel for one dispersion trial.
///
/// Delays are monotonic in frequency but the table is indexed by channel
/// number, so no ordering is assumed.  `max_delay` is derived on
/// construction and bounds the valid output window of every
/// delay-consuming kernel to `[0, nsamps - max_delay)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelayTable {
    delays: Vec<usize>,
    max_delay: usize,
}

impl DelayTable {
    pub fn new(delays: Vec<usize>) -> Self {
        let max_delay = delays.iter().copied().max().unwrap_or(0);
        Self { delays, max_delay }
    }

    /// A table of `nchans` zero delays (DM = 0).
    pub fn zeros(nchans: usize) -> Self {
        Self::new(vec![0; nchans])
    }

    pub fn delays(&self) -> &[usize] {
        &self.delays
    }

    pub fn nchans(&self) -> usize {
        self.delays.len()
    }

    pub fn max_delay(&self) -> usize {
        self.max_delay
    }

    /// Number of rows of an `nsamps` block that can be fully dedispersed.
    /// The trailing `max_delay` rows must be carried into the next block by
    /// the caller.
    pub fn valid_rows(&self, nsamps: usize) -> usize {
        nsamps.saturating_sub(self.max_delay)
    }

    /// Check the table against a block: one delay per channel and every
    /// delay `< nsamps`, so an empty block is always rejected.  Returns the
    /// valid row count.
    pub(crate) fn validate(&self, block: &ArrayView2<f32>) -> Result<usize, KernelError> {
        let (nsamps, nchans) = block.dim();
        check_len("delay table", nchans, self.delays.len())?;
        if self.max_delay >= nsamps {
            return Err(KernelError::OutOfRange {
                what: "channel delay",
                index: self.max_delay,
                limit: nsamps,
            });
        }
        Ok(self.valid_rows(nsamps))
    }
}

impl From<Vec<usize>> for DelayTable {
    fn from(delays: Vec<usize>) -> Self {
        Self::new(delays)
    }
}

// ---------------------------------------------------------------------------
// SubbandMap
// ---------------------------------------------------------------------------

/// Channel → subband assignment used by the subbanding kernel.
///
/// Subbands need not hold equal numbers of channels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubbandMap {
    map: Vec<usize>,
    nsubs: usize,
}

impl SubbandMap {
    pub fn new(map: Vec<usize>, nsubs: usize) -> Result<Self, KernelError> {
        if nsubs == 0 {
            return Err(KernelError::DegenerateParameter("nsubs must be >= 1".into()));
        }
        if nsubs > map.len() {
            return Err(KernelError::shape(
                "subband count",
                format!("<= {} channels", map.len()),
                nsubs,
            ));
        }
        if let Some(&bad) = map.iter().find(|&&s| s >= nsubs) {
            return Err(KernelError::OutOfRange {
                what: "subband index",
                index: bad,
                limit: nsubs,
            });
        }
        Ok(Self { map, nsubs })
    }

    /// Contiguous, near-equal grouping: channel `j` goes to
    /// `floor(j * nsubs / nchans)`.
    pub fn contiguous(nchans: usize, nsubs: usize) -> Result<Self, KernelError> {
        if nsubs == 0 {
            return Err(KernelError::DegenerateParameter("nsubs must be >= 1".into()));
        }
        let map = (0..nchans).map(|j| j * nsubs / nchans).collect();
        Self::new(map, nsubs)
    }

    /// One subband per channel.
    pub fn identity(nchans: usize) -> Result<Self, KernelError> {
        Self::new((0..nchans).collect(), nchans)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.map
    }

    pub fn nsubs(&self) -> usize {
        self.nsubs
    }

    pub fn nchans(&self) -> usize {
        self.map.len()
    }
}
