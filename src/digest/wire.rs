//! Binary wire formats for the merging digest.
//!
//! Two layouts, both little-endian, both written from a freshly compressed
//! digest. The first and last centroids are guaranteed singletons at the
//! digest's min/max, so neither layout spells them out; decoding
//! reconstructs them from the header.
//!
//! Verbose layout (tag 1), `32 + 16*(m-2)` bytes for `m >= 2` centroids:
//!
//!   0..4   : u32  encoding tag = 1
//!   4..12  : f64  min centroid mean
//!   12..20 : f64  max centroid mean
//!   20..28 : f64  compression
//!   28..32 : u32  centroid count m
//!   then for each interior centroid i = 1..m-1: f64 count, f64 mean
//!
//! Small layout (tag 2), `30 + 8*(m-2)` bytes:
//!
//!   0..4   : u32  encoding tag = 2
//!   4..12  : f64  min centroid mean
//!   12..20 : f64  max centroid mean
//!   20..24 : f32  compression
//!   24..26 : i16  mean-array capacity
//!   26..28 : i16  temp-array capacity
//!   28..30 : i16  centroid count m
//!   then for each interior centroid i = 1..m-1: f32 count, f32 mean
//!
//! Unknown tags and truncated or inconsistent buffers decode to
//! `BadFormat`.

use crate::digest::centroid::Centroid;
use crate::digest::merging::MergingDigest;
use crate::digest::scale::ScaleFunction;
use crate::error::{SketchError, SketchResult};

const VERBOSE_ENCODING: u32 = 1;
const SMALL_ENCODING: u32 = 2;

const VERBOSE_HEADER: usize = 32;
const SMALL_HEADER: usize = 30;

/* ============================
 * Small helpers
 * ============================ */

#[inline]
pub(crate) fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[inline]
pub(crate) fn write_i16(buf: &mut Vec<u8>, v: i16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[inline]
pub(crate) fn write_f32(buf: &mut Vec<u8>, v: f32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[inline]
pub(crate) fn write_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[inline]
pub(crate) fn read_u32(bytes: &[u8], offset: &mut usize) -> SketchResult<u32> {
    let end = *offset + 4;
    if end > bytes.len() {
        return Err(SketchError::BadFormat {
            context: "truncated u32",
        });
    }
    let mut arr = [0u8; 4];
    arr.copy_from_slice(&bytes[*offset..end]);
    *offset = end;
    Ok(u32::from_le_bytes(arr))
}

#[inline]
pub(crate) fn read_i16(bytes: &[u8], offset: &mut usize) -> SketchResult<i16> {
    let end = *offset + 2;
    if end > bytes.len() {
        return Err(SketchError::BadFormat {
            context: "truncated i16",
        });
    }
    let mut arr = [0u8; 2];
    arr.copy_from_slice(&bytes[*offset..end]);
    *offset = end;
    Ok(i16::from_le_bytes(arr))
}

#[inline]
pub(crate) fn read_f32(bytes: &[u8], offset: &mut usize) -> SketchResult<f32> {
    let end = *offset + 4;
    if end > bytes.len() {
        return Err(SketchError::BadFormat {
            context: "truncated f32",
        });
    }
    let mut arr = [0u8; 4];
    arr.copy_from_slice(&bytes[*offset..end]);
    *offset = end;
    Ok(f32::from_le_bytes(arr))
}

#[inline]
pub(crate) fn read_f64(bytes: &[u8], offset: &mut usize) -> SketchResult<f64> {
    let end = *offset + 8;
    if end > bytes.len() {
        return Err(SketchError::BadFormat {
            context: "truncated f64",
        });
    }
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&bytes[*offset..end]);
    *offset = end;
    Ok(f64::from_le_bytes(arr))
}

#[inline]
fn saturating_i16(v: usize) -> i16 {
    v.min(i16::MAX as usize) as i16
}

/* ============================
 * Encode
 * ============================ */

impl MergingDigest {
    /// Size of [`MergingDigest::to_bytes`] output. Compresses first.
    pub fn byte_size(&mut self) -> SketchResult<usize> {
        self.compress()?;
        Ok(VERBOSE_HEADER + 16 * self.centroids.len().saturating_sub(2))
    }

    /// Size of [`MergingDigest::to_bytes_small`] output. Compresses first.
    pub fn small_byte_size(&mut self) -> SketchResult<usize> {
        self.compress()?;
        Ok(SMALL_HEADER + 8 * self.centroids.len().saturating_sub(2))
    }

    /// Serialize in the verbose (f64) layout.
    pub fn to_bytes(&mut self) -> SketchResult<Vec<u8>> {
        self.compress()?;
        let m = self.centroids.len();
        let mut buf = Vec::with_capacity(VERBOSE_HEADER + 16 * m.saturating_sub(2));

        write_u32(&mut buf, VERBOSE_ENCODING);
        write_f64(&mut buf, self.min());
        write_f64(&mut buf, self.max());
        write_f64(&mut buf, self.compression);
        write_u32(&mut buf, m as u32);
        for c in self.centroids.iter().take(m.saturating_sub(1)).skip(1) {
            write_f64(&mut buf, c.count());
            write_f64(&mut buf, c.mean());
        }
        Ok(buf)
    }

    /// Serialize in the small (f32) layout. Lossy: interior means and counts
    /// are narrowed to f32.
    pub fn to_bytes_small(&mut self) -> SketchResult<Vec<u8>> {
        self.compress()?;
        let m = self.centroids.len();
        let mut buf = Vec::with_capacity(SMALL_HEADER + 8 * m.saturating_sub(2));

        write_u32(&mut buf, SMALL_ENCODING);
        write_f64(&mut buf, self.min());
        write_f64(&mut buf, self.max());
        write_f32(&mut buf, self.compression as f32);
        write_i16(&mut buf, saturating_i16(self.max_size));
        write_i16(&mut buf, saturating_i16(self.max_pending));
        write_i16(&mut buf, saturating_i16(m));
        for c in self.centroids.iter().take(m.saturating_sub(1)).skip(1) {
            write_f32(&mut buf, c.count() as f32);
            write_f32(&mut buf, c.mean() as f32);
        }
        Ok(buf)
    }

    /* ============================
     * Decode
     * ============================ */

    /// Rebuild a digest from either wire layout. The wire formats carry no
    /// scale-function field, so the result uses the default scale.
    pub fn from_bytes(bytes: &[u8]) -> SketchResult<MergingDigest> {
        let mut offset = 0;
        let tag = read_u32(bytes, &mut offset)?;
        match tag {
            VERBOSE_ENCODING => decode_verbose(bytes, offset),
            SMALL_ENCODING => decode_small(bytes, offset),
            _ => Err(SketchError::BadFormat {
                context: "unknown encoding tag",
            }),
        }
    }
}

fn rebuild(
    mut digest: MergingDigest,
    min: f64,
    max: f64,
    m: usize,
    interior: Vec<(f64, f64)>,
) -> SketchResult<MergingDigest> {
    debug_assert!(interior.len() == m.saturating_sub(2));
    if m >= 1 && !(min.is_finite() && max.is_finite() && min <= max) {
        return Err(SketchError::BadFormat {
            context: "corrupt min/max header fields",
        });
    }
    let mut centroids = Vec::with_capacity(m);
    let mut total = 0.0;
    if m >= 1 {
        centroids.push(Centroid::singleton(min));
        total += 1.0;
    }
    let mut prev = min;
    for (raw_mean, count) in interior {
        if !raw_mean.is_finite() || !(count.is_finite() && count > 0.0) {
            return Err(SketchError::BadFormat {
                context: "corrupt interior centroid",
            });
        }
        // Narrowed means may sit an ulp outside [min, max]; pull them back
        // before the order check so only real corruption is rejected.
        let mean = raw_mean.clamp(min, max);
        if mean < prev {
            return Err(SketchError::BadFormat {
                context: "interior centroids out of order",
            });
        }
        prev = mean;
        total += count;
        centroids.push(Centroid::new(mean, count));
    }
    if m >= 2 {
        centroids.push(Centroid::singleton(max));
        total += 1.0;
    }

    // The wire layouts carry no data sum; approximate it from the cells.
    digest.data_sum = centroids.iter().map(|c| c.count() * c.mean()).sum();
    digest.centroids = centroids;
    digest.total_weight = total;
    digest.watermark = digest.centroids.len();
    digest.reversed = false;
    if m >= 1 {
        digest.min = min.into();
        digest.max = max.into();
    }
    Ok(digest)
}

fn decode_verbose(bytes: &[u8], mut offset: usize) -> SketchResult<MergingDigest> {
    let min = read_f64(bytes, &mut offset)?;
    let max = read_f64(bytes, &mut offset)?;
    let compression = read_f64(bytes, &mut offset)?;
    let m = read_u32(bytes, &mut offset)? as usize;

    let expected = VERBOSE_HEADER + 16 * m.saturating_sub(2);
    if bytes.len() != expected {
        return Err(SketchError::BadFormat {
            context: "verbose payload length mismatch",
        });
    }

    let mut interior = Vec::with_capacity(m.saturating_sub(2));
    for _ in 0..m.saturating_sub(2) {
        let count = read_f64(bytes, &mut offset)?;
        let mean = read_f64(bytes, &mut offset)?;
        interior.push((mean, count));
    }

    let digest = MergingDigest::new(compression);
    rebuild(digest, min, max, m, interior)
}

fn decode_small(bytes: &[u8], mut offset: usize) -> SketchResult<MergingDigest> {
    let min = read_f64(bytes, &mut offset)?;
    let max = read_f64(bytes, &mut offset)?;
    let compression = read_f32(bytes, &mut offset)? as f64;
    let _mean_capacity = read_i16(bytes, &mut offset)?;
    let temp_capacity = read_i16(bytes, &mut offset)?;
    let m = read_i16(bytes, &mut offset)?;
    if m < 0 {
        return Err(SketchError::BadFormat {
            context: "negative centroid count",
        });
    }
    let m = m as usize;

    let expected = SMALL_HEADER + 8 * m.saturating_sub(2);
    if bytes.len() != expected {
        return Err(SketchError::BadFormat {
            context: "small payload length mismatch",
        });
    }

    let mut interior = Vec::with_capacity(m.saturating_sub(2));
    for _ in 0..m.saturating_sub(2) {
        let count = read_f32(bytes, &mut offset)? as f64;
        let mean = read_f32(bytes, &mut offset)? as f64;
        interior.push((mean, count));
    }

    let max_pending = if temp_capacity > 0 {
        temp_capacity as usize
    } else {
        (5.0 * compression) as usize
    };
    let digest =
        MergingDigest::with_params(compression, max_pending, true, ScaleFunction::default());
    rebuild(digest, min, max, m, interior)
}
