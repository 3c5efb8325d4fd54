//! Streaming quantile sketching with tail-accurate error bounds.
//!
//! The centerpiece is [`MergingDigest`], a t-digest: feed it samples one at a
//! time or in bulk and query the empirical CDF and quantile function at any
//! point. Accuracy concentrates at the tails, two digests built from disjoint
//! streams merge into one nearly equivalent to a digest of the concatenated
//! stream, and memory stays bounded by the compression parameter.
//!
//! ```
//! use taildigest::MergingDigest;
//!
//! let mut td = MergingDigest::new(100.0);
//! td.fit_all(&[1.0, 2.0, 3.0, 5.0])?;
//! assert_eq!(td.quantile(0.0)?, 1.0);
//! assert_eq!(td.quantile(1.0)?, 5.0);
//! assert_eq!(td.cdf(0.0)?, 0.0);
//! # Ok::<(), taildigest::SketchError>(())
//! ```
//!
//! Two smaller summarizers round out the crate: [`LogHistogram`], a
//! fixed-bin histogram on a geometric grid for cheap distribution summaries
//! at a chosen relative precision, and the [`codec`] module's Simple-N
//! word packers for compressing streams of small non-negative integers.

pub mod codec;
pub mod digest;
pub mod error;
pub mod histogram;

pub use digest::{Centroid, MergingDigest, ScaleFunction};
pub use error::{SketchError, SketchResult};
pub use histogram::LogHistogram;
