//! Log-scaled fixed-bin histogram.
//!
//! Bins tile `[min, max]` with geometrically growing widths (ratio `1 + eps`
//! per bin), so the histogram answers distribution summaries at a fixed
//! *relative* precision using a few thousand counters at most. Bin edges are
//! derived from the [`fastlog`] pair; `pow2` is the exact inverse of the
//! binning transform, which keeps adjacent bins contiguous in a way the true
//! `log2` would not.
//!
//! Out-of-range samples clamp into the edge bins; a signed variant mirrors
//! the grid onto the negative axis with a second counter vector. Only
//! *conformal* histograms (identical bounds, precision, and sign policy)
//! may be merged.

pub mod fastlog;

use serde::{Deserialize, Serialize};

use crate::codec::{decode_words, Simple64};
use crate::digest::wire::{read_f64, read_u32, write_f64, write_u32};
use crate::error::{SketchError, SketchResult};
use fastlog::{approx_log2, pow2};

const HISTOGRAM_ENCODING: u32 = 3;

/// Largest permitted bin vector.
const MAX_BINS: usize = 10_000;

/// Fixed-bin histogram on a geometric grid over `[min, max]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogHistogram {
    min: f64,
    max: f64,
    epsilon: f64,
    log_factor: f64,
    log_offset: f64,
    counts: Vec<u64>,
    /// Mirror-image counters for negative samples; `None` for the unsigned
    /// variant.
    negative_counts: Option<Vec<u64>>,
}

impl LogHistogram {
    /// Unsigned histogram over positive samples in `[min, max]` with bin
    /// width ratio `1 + epsilon`.
    pub fn new(min: f64, max: f64, epsilon: f64) -> SketchResult<Self> {
        Self::build(min, max, epsilon, false)
    }

    /// Signed variant: negative samples are bucketed by magnitude into a
    /// parallel counter vector.
    pub fn with_sign(min: f64, max: f64, epsilon: f64) -> SketchResult<Self> {
        Self::build(min, max, epsilon, true)
    }

    fn build(min: f64, max: f64, epsilon: f64, signed: bool) -> SketchResult<Self> {
        if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0) {
            return Err(SketchError::BadInput {
                context: "histogram bounds must be positive and finite",
            });
        }
        if max <= 2.0 * min {
            return Err(SketchError::BadInput {
                context: "histogram max must exceed twice the min",
            });
        }
        if !(1e-6..=0.5).contains(&epsilon) {
            return Err(SketchError::BadInput {
                context: "histogram epsilon must lie in [1e-6, 0.5]",
            });
        }

        let log_factor = std::f64::consts::LN_2 / (1.0 + epsilon).ln();
        let log_offset = approx_log2(min) * log_factor;
        let top = approx_log2(max) * log_factor - log_offset;
        let bins = top.ceil() as usize + 1;
        if bins > MAX_BINS {
            return Err(SketchError::BadInput {
                context: "histogram would need more than 10000 bins",
            });
        }

        Ok(LogHistogram {
            min,
            max,
            epsilon,
            log_factor,
            log_offset,
            counts: vec![0; bins],
            negative_counts: signed.then(|| vec![0; bins]),
        })
    }

    /// Bin index for a positive magnitude; out-of-range values clamp into
    /// the edge bins.
    pub fn bucket(&self, x: f64) -> usize {
        let scaled = approx_log2(x) * self.log_factor - self.log_offset;
        let idx = scaled.ceil() as i64 - 1;
        idx.clamp(0, self.counts.len() as i64 - 1) as usize
    }

    /// Record one sample.
    pub fn fit(&mut self, x: f64) -> SketchResult<()> {
        if !x.is_finite() {
            return Err(SketchError::BadInput {
                context: "histogram sample must be finite",
            });
        }
        if x < 0.0 {
            let Some(neg) = &mut self.negative_counts else {
                return Err(SketchError::BadInput {
                    context: "negative sample in an unsigned histogram",
                });
            };
            let idx = {
                let scaled = approx_log2(-x) * self.log_factor - self.log_offset;
                (scaled.ceil() as i64 - 1).clamp(0, neg.len() as i64 - 1) as usize
            };
            neg[idx] += 1;
        } else {
            let idx = self.bucket(x);
            self.counts[idx] += 1;
        }
        Ok(())
    }

    /// Record a batch of samples; the histogram is untouched on rejection.
    pub fn fit_all(&mut self, xs: &[f64]) -> SketchResult<()> {
        if xs.iter().any(|x| !x.is_finite()) {
            return Err(SketchError::BadInput {
                context: "histogram sample batch",
            });
        }
        if self.negative_counts.is_none() && xs.iter().any(|&x| x < 0.0) {
            return Err(SketchError::BadInput {
                context: "negative sample in an unsigned histogram",
            });
        }
        for &x in xs {
            self.fit(x)?;
        }
        Ok(())
    }

    /// True when the two histograms share bounds, precision, bin count, and
    /// sign policy, which is the precondition for bin-wise addition.
    pub fn is_conformal(&self, other: &LogHistogram) -> bool {
        self.min == other.min
            && self.max == other.max
            && self.epsilon == other.epsilon
            && self.counts.len() == other.counts.len()
            && self.negative_counts.is_some() == other.negative_counts.is_some()
    }

    /// Bin-wise addition of a conformal histogram.
    pub fn merge(&mut self, other: &LogHistogram) -> SketchResult<()> {
        if !self.is_conformal(other) {
            return Err(SketchError::BadInput {
                context: "histograms are not conformal",
            });
        }
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
        if let (Some(neg), Some(other_neg)) = (&mut self.negative_counts, &other.negative_counts) {
            for (a, b) in neg.iter_mut().zip(other_neg) {
                *a += b;
            }
        }
        Ok(())
    }

    /* ===========================
     * Summaries
     * =========================== */

    /// Lower edge of bin `i` (and `bounds()[bins]` is the top edge).
    #[inline]
    pub fn lower_bound(&self, i: usize) -> f64 {
        pow2((i as f64 + self.log_offset) / self.log_factor)
    }

    /// All `bins + 1` bin edges.
    pub fn bounds(&self) -> Vec<f64> {
        (0..=self.counts.len()).map(|i| self.lower_bound(i)).collect()
    }

    #[inline]
    pub fn bin_count(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    #[inline]
    pub fn negative(&self) -> Option<&[u64]> {
        self.negative_counts.as_deref()
    }

    #[inline]
    pub fn is_signed(&self) -> bool {
        self.negative_counts.is_some()
    }

    /// Total recorded samples.
    pub fn total(&self) -> u64 {
        let pos: u64 = self.counts.iter().sum();
        let neg: u64 = self
            .negative_counts
            .as_ref()
            .map(|v| v.iter().sum())
            .unwrap_or(0);
        pos + neg
    }

    /// Discrete CDF over bin lower bounds; NaN while empty.
    pub fn cdf(&self, x: f64) -> f64 {
        let total = self.total();
        if total == 0 || x.is_nan() {
            return f64::NAN;
        }
        let mut acc = 0u64;
        if let Some(neg) = &self.negative_counts {
            for (j, &c) in neg.iter().enumerate() {
                if -self.lower_bound(j) <= x {
                    acc += c;
                }
            }
        }
        if x >= 0.0 {
            for (i, &c) in self.counts.iter().enumerate() {
                if self.lower_bound(i) <= x {
                    acc += c;
                }
            }
        }
        acc as f64 / total as f64
    }

    /// Discrete quantile over bin lower bounds; NaN while empty.
    pub fn quantile(&self, q: f64) -> SketchResult<f64> {
        if !(0.0..=1.0).contains(&q) {
            return Err(SketchError::BadInput {
                context: "quantile must lie in [0, 1]",
            });
        }
        let total = self.total();
        if total == 0 {
            return Ok(f64::NAN);
        }
        let target = q * total as f64;
        let mut acc = 0.0;
        let mut last = f64::NAN;
        if let Some(neg) = &self.negative_counts {
            for j in (0..neg.len()).rev() {
                if neg[j] == 0 {
                    continue;
                }
                acc += neg[j] as f64;
                last = -self.lower_bound(j);
                if acc >= target {
                    return Ok(last);
                }
            }
        }
        for (i, &c) in self.counts.iter().enumerate() {
            if c == 0 {
                continue;
            }
            acc += c as f64;
            last = self.lower_bound(i);
            if acc >= target {
                return Ok(last);
            }
        }
        Ok(last)
    }

    /* ===========================
     * Byte form
     * =========================== */

    /// Compact byte form: a fixed header plus Simple-N-packed count vectors.
    pub fn to_bytes(&self) -> SketchResult<Vec<u8>> {
        let mut buf = Vec::new();
        write_u32(&mut buf, HISTOGRAM_ENCODING);
        write_f64(&mut buf, self.min);
        write_f64(&mut buf, self.max);
        write_f64(&mut buf, self.epsilon);
        buf.push(self.negative_counts.is_some() as u8);
        write_u32(&mut buf, self.counts.len() as u32);
        write_packed(&mut buf, &self.counts)?;
        if let Some(neg) = &self.negative_counts {
            write_packed(&mut buf, neg)?;
        }
        Ok(buf)
    }

    /// Rebuild from [`LogHistogram::to_bytes`] output.
    pub fn from_bytes(bytes: &[u8]) -> SketchResult<LogHistogram> {
        let mut offset = 0;
        let tag = read_u32(bytes, &mut offset)?;
        if tag != HISTOGRAM_ENCODING {
            return Err(SketchError::BadFormat {
                context: "unknown encoding tag",
            });
        }
        let min = read_f64(bytes, &mut offset)?;
        let max = read_f64(bytes, &mut offset)?;
        let epsilon = read_f64(bytes, &mut offset)?;
        let signed = match read_u8(bytes, &mut offset)? {
            0 => false,
            1 => true,
            _ => {
                return Err(SketchError::BadFormat {
                    context: "corrupt sign flag",
                })
            }
        };
        let bins = read_u32(bytes, &mut offset)? as usize;

        let mut hist = Self::build(min, max, epsilon, signed)?;
        if hist.counts.len() != bins {
            return Err(SketchError::BadFormat {
                context: "bin count disagrees with the bounds",
            });
        }
        hist.counts = read_packed(bytes, &mut offset, bins)?;
        if signed {
            hist.negative_counts = Some(read_packed(bytes, &mut offset, bins)?);
        }
        if offset != bytes.len() {
            return Err(SketchError::BadFormat {
                context: "trailing bytes after histogram payload",
            });
        }
        Ok(hist)
    }
}

fn write_packed(buf: &mut Vec<u8>, counts: &[u64]) -> SketchResult<()> {
    let words = Simple64::encode_all(counts)?;
    write_u32(buf, words.len() as u32);
    for w in words {
        buf.extend_from_slice(&w.to_le_bytes());
    }
    Ok(())
}

fn read_packed(bytes: &[u8], offset: &mut usize, bins: usize) -> SketchResult<Vec<u64>> {
    let n_words = read_u32(bytes, offset)? as usize;
    if n_words > bytes.len().saturating_sub(*offset) / 8 {
        return Err(SketchError::BadFormat {
            context: "word count exceeds the buffer",
        });
    }
    let mut words = Vec::with_capacity(n_words);
    for _ in 0..n_words {
        words.push(read_u64(bytes, offset)?);
    }
    let mut values = decode_words(&words)?;
    if values.len() < bins {
        return Err(SketchError::BadFormat {
            context: "packed counts shorter than the bin vector",
        });
    }
    values.truncate(bins);
    Ok(values)
}

#[inline]
fn read_u8(bytes: &[u8], offset: &mut usize) -> SketchResult<u8> {
    let Some(&b) = bytes.get(*offset) else {
        return Err(SketchError::BadFormat {
            context: "truncated u8",
        });
    };
    *offset += 1;
    Ok(b)
}

#[inline]
fn read_u64(bytes: &[u8], offset: &mut usize) -> SketchResult<u64> {
    let end = *offset + 8;
    if end > bytes.len() {
        return Err(SketchError::BadFormat {
            context: "truncated u64",
        });
    }
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&bytes[*offset..end]);
    *offset = end;
    Ok(u64::from_le_bytes(arr))
}
