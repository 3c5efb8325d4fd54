//! Simple-N variable-bit integer packing.
//!
//! Packs runs of small non-negative integers into fixed-width words. Each
//! word spends its low 4 bits on a size code selecting one row of the
//! variant's table: `n` fields of `b` bits each, laid out low-to-high in
//! the remaining payload bits, padded with zeros when the input runs dry.
//!
//! Two variants differ only in their tables:
//!
//!   32-bit words (28 payload bits): 28x1, 14x2, 9x3, 7x4, 5x5, 4x7, 3x9,
//!   2x14, 1x28
//!   64-bit words (60 payload bits): 60x1, 30x2, 20x3, 15x4, 12x5, 10x6,
//!   8x7, 7x8, 6x10, 5x12, 4x15, 3x20, 2x30, 1x60
//!
//! Decoding a stream yields the original values followed by any padding
//! zeros from the final words.

use std::collections::VecDeque;

use crate::error::{SketchError, SketchResult};

/// Word flavor of a Simple-N stream: the storage type, its size-code table
/// (field count, field width), ordered narrow fields first.
pub trait PackedWord: Copy {
    const BITS: u32;
    const PAYLOAD_BITS: u32;
    const TABLE: &'static [(u32, u32)];
    /// Widest single value the variant can hold (the last table row).
    const MAX_VALUE_BITS: u32;

    fn from_bits(bits: u64) -> Self;
    fn to_bits(self) -> u64;
}

impl PackedWord for u32 {
    const BITS: u32 = 32;
    const PAYLOAD_BITS: u32 = 28;
    const TABLE: &'static [(u32, u32)] = &[
        (28, 1),
        (14, 2),
        (9, 3),
        (7, 4),
        (5, 5),
        (4, 7),
        (3, 9),
        (2, 14),
        (1, 28),
    ];
    const MAX_VALUE_BITS: u32 = 28;

    #[inline]
    fn from_bits(bits: u64) -> Self {
        bits as u32
    }

    #[inline]
    fn to_bits(self) -> u64 {
        self as u64
    }
}

impl PackedWord for u64 {
    const BITS: u32 = 64;
    const PAYLOAD_BITS: u32 = 60;
    const TABLE: &'static [(u32, u32)] = &[
        (60, 1),
        (30, 2),
        (20, 3),
        (15, 4),
        (12, 5),
        (10, 6),
        (8, 7),
        (7, 8),
        (6, 10),
        (5, 12),
        (4, 15),
        (3, 20),
        (2, 30),
        (1, 60),
    ];
    const MAX_VALUE_BITS: u32 = 60;

    #[inline]
    fn from_bits(bits: u64) -> Self {
        bits
    }

    #[inline]
    fn to_bits(self) -> u64 {
        self
    }
}

/// Streaming encoder: values are buffered with their minimum size codes and
/// emitted as soon as a word is guaranteed to fill.
#[derive(Debug, Clone, Default)]
pub struct SimpleEncoder<W: PackedWord> {
    pending: VecDeque<u64>,
    codes: VecDeque<u8>,
    max_code: u8,
    words: Vec<W>,
}

/// 32-bit-word encoder.
pub type Simple32 = SimpleEncoder<u32>;
/// 64-bit-word encoder.
pub type Simple64 = SimpleEncoder<u64>;

impl<W: PackedWord> SimpleEncoder<W> {
    pub fn new() -> Self {
        SimpleEncoder {
            pending: VecDeque::new(),
            codes: VecDeque::new(),
            max_code: 0,
            words: Vec::new(),
        }
    }

    /// Buffer one value, emitting words whenever the pending run can no
    /// longer grow a denser packing. Values wider than the variant's
    /// largest field are rejected.
    pub fn add(&mut self, v: u64) -> SketchResult<()> {
        let value_bits = (64 - v.leading_zeros()).max(1);
        if value_bits > W::MAX_VALUE_BITS {
            return Err(SketchError::BadInput {
                context: "value too wide for the codec word",
            });
        }
        let code = W::TABLE.partition_point(|&(_, bits)| bits < value_bits) as u8;
        self.pending.push_back(v);
        self.codes.push_back(code);
        self.max_code = self.max_code.max(code);

        while self.word_ready() {
            self.emit(false)?;
        }
        Ok(())
    }

    /// True once even the widest pending value's packing is covered by the
    /// buffered run.
    #[inline]
    fn word_ready(&self) -> bool {
        let (_, bits) = W::TABLE[self.max_code as usize];
        bits as usize * self.pending.len() >= W::PAYLOAD_BITS as usize
    }

    /// Emit one word: the smallest size code whose field count is on hand
    /// (or padded, on flush) and whose fields hold the next values.
    fn emit(&mut self, pad: bool) -> SketchResult<()> {
        let avail = self.pending.len();
        let mut chosen = None;
        'candidates: for (code, &(fields, bits)) in W::TABLE.iter().enumerate() {
            if !pad && fields as usize > avail {
                continue;
            }
            for j in 0..(fields as usize).min(avail) {
                if self.codes[j] as usize > code {
                    continue 'candidates;
                }
            }
            chosen = Some((code, fields, bits));
            break;
        }
        let Some((code, fields, bits)) = chosen else {
            return Err(SketchError::Invariant {
                what: "no admissible size code for the pending run",
            });
        };

        let mut word = code as u64;
        for slot in 0..fields {
            let v = self.pending.pop_front().unwrap_or(0);
            self.codes.pop_front();
            word |= v << (4 + slot * bits);
        }
        self.max_code = self.codes.iter().copied().max().unwrap_or(0);
        self.words.push(W::from_bits(word));
        Ok(())
    }

    /// Drain the buffer, padding the final words with zeros.
    pub fn flush(&mut self) -> SketchResult<()> {
        while !self.pending.is_empty() {
            self.emit(true)?;
        }
        self.max_code = 0;
        Ok(())
    }

    /// Words emitted so far (pending values excluded until `flush`).
    pub fn words(&self) -> &[W] {
        &self.words
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Flush and take the encoded stream.
    pub fn into_words(mut self) -> SketchResult<Vec<W>> {
        self.flush()?;
        Ok(self.words)
    }

    /// One-shot encoding of a slice.
    pub fn encode_all(values: &[u64]) -> SketchResult<Vec<W>> {
        let mut enc = Self::new();
        for &v in values {
            enc.add(v)?;
        }
        enc.into_words()
    }
}

/// Unpack a word stream. Emits every field of every word, so the result may
/// carry trailing zeros past the originally encoded values.
pub fn decode_words<W: PackedWord>(words: &[W]) -> SketchResult<Vec<u64>> {
    let mut out = Vec::new();
    for &w in words {
        let bits = w.to_bits();
        let code = (bits & 0xF) as usize;
        let Some(&(fields, width)) = W::TABLE.get(code) else {
            return Err(SketchError::BadFormat {
                context: "unknown size code in packed word",
            });
        };
        let mask = (1u64 << width) - 1;
        for slot in 0..fields {
            out.push((bits >> (4 + slot * width)) & mask);
        }
    }
    Ok(out)
}
