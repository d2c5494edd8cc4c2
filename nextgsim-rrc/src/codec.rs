//! RRC bit-packed codec
//!
//! Every RRC message is built from six primitives written MSB-first onto a
//! bit cursor:
//!
//! | Primitive | Encoding |
//! |-----------|----------|
//! | bounded integer `[lb, ub]` | `value - lb` in `ceil(log2(ub - lb + 1))` bits |
//! | enumerated, `N` options | bounded integer `[0, N - 1]` |
//! | boolean | 1 bit |
//! | bitstring of width `W` | `W` raw bits |
//! | sequence | optional extension bit, one presence bit per optional field, then the fields |
//! | sequence-of | length as bounded integer `[min, max]`, then the elements |
//! | choice | index as bounded integer `[0, N - 1]`, then the chosen alternative |
//!
//! There are no tags and no length fields beyond the sequence-of prefix, so
//! both ends must agree on the schema. Decoding never panics: truncated
//! input, indices past the last alternative and integers above their upper
//! bound all surface as [`DecodeError`].

use nextgsim_common::{BitBuffer, BitBufferError, BitBufferReader};
use thiserror::Error;

/// Errors raised while decoding received bits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input ended before the field did
    #[error("Buffer exhausted: needed {needed} bits, {remaining} remaining")]
    BufferExhausted {
        /// Bits the field needed
        needed: usize,
        /// Bits left in the input
        remaining: usize,
    },

    /// Integer field decoded above its upper bound
    #[error("Value {value} out of range [{lb}, {ub}]")]
    OutOfRange {
        /// Decoded value
        value: i64,
        /// Lower bound
        lb: i64,
        /// Upper bound
        ub: i64,
    },

    /// Choice index names no alternative
    #[error("Invalid choice index {index} for {alternatives} alternatives")]
    InvalidChoice {
        /// Decoded index
        index: u64,
        /// Number of alternatives
        alternatives: usize,
    },

    /// Sequence-of length outside its bounds
    #[error("Invalid length {len}, expected {min}..={max}")]
    InvalidLength {
        /// Decoded length
        len: u64,
        /// Minimum size
        min: usize,
        /// Maximum size
        max: usize,
    },

    /// Extension bit set; this format carries no extension additions
    #[error("Extension additions are not supported")]
    UnsupportedExtension,

    /// Content left over after the message
    #[error("{bits} trailing bits after message")]
    TrailingBits {
        /// Number of unread bits that are not zero padding
        bits: usize,
    },

    /// Structurally valid bits carrying an inconsistent value
    #[error("Invalid field value: {0}")]
    InvalidFieldValue(String),
}

impl From<BitBufferError> for DecodeError {
    fn from(err: BitBufferError) -> Self {
        match err {
            BitBufferError::Exhausted { needed, remaining } => {
                DecodeError::BufferExhausted { needed, remaining }
            }
            BitBufferError::InvalidLength(len) => {
                DecodeError::InvalidFieldValue(format!("read of {len} bits"))
            }
        }
    }
}

/// Errors raised while encoding. These indicate a caller bug: the value
/// handed to the encoder does not fit its declared field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Integer outside `[lb, ub]`, or bounds inverted
    #[error("Value {value} out of range [{lb}, {ub}]")]
    OutOfRange {
        /// Offending value
        value: i64,
        /// Lower bound
        lb: i64,
        /// Upper bound
        ub: i64,
    },

    /// List length outside its bounds
    #[error("Size {len} out of range {min}..={max}")]
    SizeOutOfRange {
        /// Offending length
        len: usize,
        /// Minimum size
        min: usize,
        /// Maximum size
        max: usize,
    },

    /// Bitstring value wider than the field
    #[error("Value {value:#x} does not fit in {width} bits")]
    BitstringTooWide {
        /// Offending value
        value: u64,
        /// Field width
        width: usize,
    },
}

/// Number of bits needed for a bounded integer `[lb, ub]`:
/// `ceil(log2(ub - lb + 1))`, which is 0 for a single-valued range.
pub fn bits_for_range(lb: i64, ub: i64) -> usize {
    if ub <= lb {
        return 0;
    }
    let span = (ub as i128 - lb as i128) as u128;
    (128 - span.leading_zeros()) as usize
}

/// Writes primitives onto a growing bit buffer.
#[derive(Debug, Default)]
pub struct PerEncoder {
    buf: BitBuffer,
}

impl PerEncoder {
    /// Creates an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bits written so far.
    pub fn bit_len(&self) -> usize {
        self.buf.current_index()
    }

    /// Finishes encoding, zero padding to a whole octet.
    pub fn finish(self) -> Vec<u8> {
        self.buf.into_bytes()
    }

    /// Bounded integer in `[lb, ub]`.
    pub fn integer(&mut self, value: i64, lb: i64, ub: i64) -> Result<(), EncodeError> {
        if lb > ub || value < lb || value > ub {
            return Err(EncodeError::OutOfRange { value, lb, ub });
        }
        let offset = (value as i128 - lb as i128) as u64;
        self.buf.write_bits(offset, bits_for_range(lb, ub));
        Ok(())
    }

    /// Enumerated value: option `index` of `count`.
    pub fn enumerated(&mut self, index: usize, count: usize) -> Result<(), EncodeError> {
        self.integer(index as i64, 0, count as i64 - 1)
    }

    /// Single-bit boolean.
    pub fn boolean(&mut self, value: bool) {
        self.buf.write(value);
    }

    /// Fixed-width bitstring holding the low `width` bits of `value`.
    pub fn bitstring(&mut self, value: u64, width: usize) -> Result<(), EncodeError> {
        if width > 64 || (width < 64 && value >> width != 0) {
            return Err(EncodeError::BitstringTooWide { value, width });
        }
        self.buf.write_bits(value, width);
        Ok(())
    }

    /// Sequence preamble: the extension marker (always 0 on encode) when the
    /// type is extensible, then one presence bit per optional field.
    pub fn sequence<const N: usize>(&mut self, extensible: bool, presence: [bool; N]) {
        if extensible {
            self.buf.write(false);
        }
        for present in presence {
            self.buf.write(present);
        }
    }

    /// NULL alternative; occupies no bits.
    pub fn null(&mut self) {}

    /// Sequence-of length prefix.
    pub fn sequence_of(&mut self, len: usize, min: usize, max: usize) -> Result<(), EncodeError> {
        if len < min || len > max {
            return Err(EncodeError::SizeOutOfRange { len, min, max });
        }
        self.integer(len as i64, min as i64, max as i64)
    }

    /// Choice index among `count` alternatives.
    pub fn choice(&mut self, index: usize, count: usize, extensible: bool) -> Result<(), EncodeError> {
        if extensible {
            self.buf.write(false);
        }
        self.enumerated(index, count)
    }

    /// Sequence-of elements, each encoded with its own `PerCodec`.
    pub fn list<T: PerCodec>(&mut self, items: &[T], min: usize, max: usize) -> Result<(), EncodeError> {
        self.sequence_of(items.len(), min, max)?;
        for item in items {
            item.encode(self)?;
        }
        Ok(())
    }

    /// Octet payload as a sequence-of `INTEGER (0..255)`.
    pub fn octets(&mut self, data: &[u8], min: usize, max: usize) -> Result<(), EncodeError> {
        self.sequence_of(data.len(), min, max)?;
        self.buf.write_octets(data);
        Ok(())
    }

    /// Optional field body, written only when present.
    pub fn optional<T: PerCodec>(&mut self, value: &Option<T>) -> Result<(), EncodeError> {
        match value {
            Some(v) => v.encode(self),
            None => Ok(()),
        }
    }
}

/// Reads primitives from a received byte slice.
pub struct PerDecoder<'a> {
    reader: BitBufferReader<'a>,
}

impl<'a> PerDecoder<'a> {
    /// Creates a decoder over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: BitBufferReader::new(data),
        }
    }

    /// Bits consumed so far.
    pub fn position(&self) -> usize {
        self.reader.current_index()
    }

    /// Bits left unread.
    pub fn remaining_bits(&self) -> usize {
        self.reader.remaining_bits()
    }

    /// Bounded integer in `[lb, ub]`.
    pub fn integer(&mut self, lb: i64, ub: i64) -> Result<i64, DecodeError> {
        let width = bits_for_range(lb, ub);
        let raw = self.reader.read_bits(width)?;
        let value = lb as i128 + raw as i128;
        if value > ub as i128 {
            return Err(DecodeError::OutOfRange {
                value: i64::try_from(value).unwrap_or(i64::MAX),
                lb,
                ub,
            });
        }
        Ok(value as i64)
    }

    /// Enumerated value among `count` options.
    pub fn enumerated(&mut self, count: usize) -> Result<usize, DecodeError> {
        Ok(self.integer(0, count as i64 - 1)? as usize)
    }

    /// Single-bit boolean.
    pub fn boolean(&mut self) -> Result<bool, DecodeError> {
        Ok(self.reader.read()?)
    }

    /// Fixed-width bitstring.
    pub fn bitstring(&mut self, width: usize) -> Result<u64, DecodeError> {
        Ok(self.reader.read_bits(width)?)
    }

    /// Sequence preamble, returning the presence bit of each optional field
    /// in declaration order.
    pub fn sequence<const N: usize>(&mut self, extensible: bool) -> Result<[bool; N], DecodeError> {
        if extensible && self.reader.read()? {
            return Err(DecodeError::UnsupportedExtension);
        }
        let mut presence = [false; N];
        for bit in presence.iter_mut() {
            *bit = self.reader.read()?;
        }
        Ok(presence)
    }

    /// NULL alternative; occupies no bits.
    pub fn null(&mut self) {}

    /// Sequence-of length prefix.
    pub fn sequence_of(&mut self, min: usize, max: usize) -> Result<usize, DecodeError> {
        let width = bits_for_range(min as i64, max as i64);
        let raw = self.reader.read_bits(width)?;
        let len = min as u64 + raw;
        if len > max as u64 {
            return Err(DecodeError::InvalidLength { len, min, max });
        }
        Ok(len as usize)
    }

    /// Choice index among `count` alternatives.
    pub fn choice(&mut self, count: usize, extensible: bool) -> Result<usize, DecodeError> {
        if extensible && self.reader.read()? {
            return Err(DecodeError::UnsupportedExtension);
        }
        let width = bits_for_range(0, count as i64 - 1);
        let index = self.reader.read_bits(width)?;
        if index >= count as u64 {
            return Err(DecodeError::InvalidChoice {
                index,
                alternatives: count,
            });
        }
        Ok(index as usize)
    }

    /// Sequence-of elements.
    pub fn list<T: PerCodec>(&mut self, min: usize, max: usize) -> Result<Vec<T>, DecodeError> {
        let len = self.sequence_of(min, max)?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(T::decode(self)?);
        }
        Ok(items)
    }

    /// Octet payload as a sequence-of `INTEGER (0..255)`.
    pub fn octets(&mut self, min: usize, max: usize) -> Result<Vec<u8>, DecodeError> {
        let len = self.sequence_of(min, max)?;
        Ok(self.reader.read_octets(len)?)
    }

    /// Optional field body, read only when its presence bit was set.
    pub fn optional<T: PerCodec>(&mut self, present: bool) -> Result<Option<T>, DecodeError> {
        if present {
            T::decode(self).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Checks that only zero padding (fewer than 8 bits) remains.
    pub fn finish(self) -> Result<(), DecodeError> {
        let remaining = self.reader.remaining_bits();
        if remaining >= 8 {
            return Err(DecodeError::TrailingBits { bits: remaining });
        }
        if self.reader.read_bits(remaining)? != 0 {
            return Err(DecodeError::TrailingBits { bits: remaining });
        }
        Ok(())
    }
}

/// A value with a fixed bit-packed representation.
pub trait PerCodec: Sized {
    /// Appends this value to `enc`.
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError>;

    /// Reads a value from `dec`.
    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError>;
}

/// Encodes a complete message to octets.
pub fn encode_rrc<T: PerCodec>(msg: &T) -> Result<Vec<u8>, EncodeError> {
    let mut enc = PerEncoder::new();
    msg.encode(&mut enc)?;
    Ok(enc.finish())
}

/// Decodes a complete message, rejecting anything but zero padding after it.
pub fn decode_rrc<T: PerCodec>(bytes: &[u8]) -> Result<T, DecodeError> {
    let mut dec = PerDecoder::new(bytes);
    let msg = T::decode(&mut dec)?;
    dec.finish()?;
    Ok(msg)
}

/// Declares a fieldless enum encoded as an enumerated value, one option per
/// variant in declaration order.
#[macro_export]
macro_rules! per_enumerated {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// All variants, in wire order.
            pub const VARIANTS: &'static [$name] = &[$($name::$variant),+];
        }

        impl $crate::codec::PerCodec for $name {
            fn encode(
                &self,
                enc: &mut $crate::codec::PerEncoder,
            ) -> Result<(), $crate::codec::EncodeError> {
                enc.enumerated(*self as usize, Self::VARIANTS.len())
            }

            fn decode(
                dec: &mut $crate::codec::PerDecoder<'_>,
            ) -> Result<Self, $crate::codec::DecodeError> {
                let index = dec.enumerated(Self::VARIANTS.len())?;
                Ok(Self::VARIANTS[index])
            }
        }
    };
}

impl PerCodec for bool {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.boolean(*self);
        Ok(())
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        dec.boolean()
    }
}
