//! `BitBuffer` - A bit-level write buffer and fallible reader for RRC encoding.
//!
//! This module provides `BitBuffer`, a growable MSB-first bit writer, and
//! `BitBufferReader`, a cursor over a received byte slice whose reads fail
//! with [`BitBufferError`] instead of panicking when the input runs out.

use std::cell::Cell;

use thiserror::Error;

/// Errors raised by bit-level reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BitBufferError {
    /// The read would go past the end of the buffer.
    #[error("Buffer exhausted: needed {needed} bits, {remaining} remaining")]
    Exhausted {
        /// Bits requested by the read
        needed: usize,
        /// Bits left in the buffer
        remaining: usize,
    },

    /// More than 64 bits requested in a single read.
    #[error("Invalid read length: {0} bits")]
    InvalidLength(usize),
}

/// A growable bit-level write buffer.
///
/// Bits are written in MSB-first order within each byte. The buffer grows
/// as needed, so writes never fail.
///
/// # Example
/// ```
/// use nextgsim_common::BitBuffer;
///
/// let mut buffer = BitBuffer::new();
/// buffer.write_bits(0b1010, 4);
/// buffer.write_bits(0b1100, 4);
///
/// assert_eq!(buffer.into_bytes(), vec![0b1010_1100]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BitBuffer {
    data: Vec<u8>,
    index: usize, // bit index
}

impl BitBuffer {
    /// Creates a new empty `BitBuffer`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `BitBuffer` with room for `octets` bytes before reallocating.
    pub fn with_capacity(octets: usize) -> Self {
        Self {
            data: Vec::with_capacity(octets),
            index: 0,
        }
    }

    /// Returns the number of bits written so far.
    #[inline]
    pub fn current_index(&self) -> usize {
        self.index
    }

    /// Writes a single bit.
    #[inline]
    pub fn write(&mut self, bit: bool) {
        let octet_index = self.index / 8;
        let bit_index = self.index % 8;

        if octet_index == self.data.len() {
            self.data.push(0);
        }
        if bit {
            self.data[octet_index] |= 1 << (7 - bit_index);
        }
        self.index += 1;
    }

    /// Writes the low `len` bits of `value`, most significant first.
    ///
    /// # Arguments
    /// * `value` - The value containing the bits to write
    /// * `len` - Number of bits to write (0-64)
    ///
    /// # Panics
    /// Panics if `len` > 64.
    #[inline]
    pub fn write_bits(&mut self, value: u64, len: usize) {
        assert!(len <= 64, "len must be <= 64");

        for i in 0..len {
            let bit = ((value >> (len - 1 - i)) & 1) != 0;
            self.write(bit);
        }
    }

    /// Writes every bit of `octets` in order.
    pub fn write_octets(&mut self, octets: &[u8]) {
        for &octet in octets {
            self.write_bits(u64::from(octet), 8);
        }
    }

    /// Returns the total number of octets written.
    ///
    /// This rounds up to the nearest byte boundary.
    #[inline]
    pub fn written_octets(&self) -> usize {
        self.index.div_ceil(8)
    }

    /// Aligns the buffer to the next octet boundary by writing zero bits.
    #[inline]
    pub fn octet_align(&mut self) {
        let pad = self.bits_to_octet_boundary();
        self.write_bits(0, pad);
    }

    /// Returns the number of bits until the next octet boundary.
    #[inline]
    pub fn bits_to_octet_boundary(&self) -> usize {
        let remainder = self.index % 8;
        if remainder == 0 {
            0
        } else {
            8 - remainder
        }
    }

    /// Returns a reference to the written data. The last octet is zero padded.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the buffer and returns the written octets.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// A read-only bit cursor for parsing bit-level data.
///
/// Every read checks the remaining length first, so a truncated or
/// malicious PDU surfaces as an error rather than an out-of-bounds panic.
pub struct BitBufferReader<'a> {
    data: &'a [u8],
    index: Cell<usize>, // bit index
}

impl<'a> BitBufferReader<'a> {
    /// Creates a new `BitBufferReader` from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            index: Cell::new(0),
        }
    }

    /// Seeks to the specified bit index.
    #[inline]
    pub fn seek(&self, index: usize) {
        self.index.set(index);
    }

    /// Returns the current bit index.
    #[inline]
    pub fn current_index(&self) -> usize {
        self.index.get()
    }

    fn ensure(&self, needed: usize) -> Result<(), BitBufferError> {
        let remaining = self.remaining_bits();
        if needed > remaining {
            return Err(BitBufferError::Exhausted { needed, remaining });
        }
        Ok(())
    }

    #[inline]
    fn bit_at(&self, index: usize) -> bool {
        let octet_index = index / 8;
        let bit_index = index % 8;
        (self.data[octet_index] >> (7 - bit_index)) & 1 == 1
    }

    /// Peeks at the current bit without advancing the index.
    #[inline]
    pub fn peek(&self) -> Result<bool, BitBufferError> {
        self.ensure(1)?;
        Ok(self.bit_at(self.index.get()))
    }

    /// Reads a single bit and advances the index.
    #[inline]
    pub fn read(&self) -> Result<bool, BitBufferError> {
        self.ensure(1)?;
        let bit = self.bit_at(self.index.get());
        self.index.set(self.index.get() + 1);
        Ok(bit)
    }

    /// Reads `len` bits (0-64) as an unsigned value, most significant first.
    ///
    /// A zero-length read returns 0 without touching the buffer.
    #[inline]
    pub fn read_bits(&self, len: usize) -> Result<u64, BitBufferError> {
        if len > 64 {
            return Err(BitBufferError::InvalidLength(len));
        }
        self.ensure(len)?;

        let mut result = 0u64;
        for _ in 0..len {
            result = (result << 1) | u64::from(self.bit_at(self.index.get()));
            self.index.set(self.index.get() + 1);
        }
        Ok(result)
    }

    /// Reads `count` whole octets, which need not be byte aligned.
    pub fn read_octets(&self, count: usize) -> Result<Vec<u8>, BitBufferError> {
        self.ensure(count * 8)?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read_bits(8)? as u8);
        }
        Ok(out)
    }

    /// Skips to the next octet boundary.
    #[inline]
    pub fn octet_align(&self) {
        let remainder = self.index.get() % 8;
        if remainder != 0 {
            self.index.set(self.index.get() + (8 - remainder));
        }
    }

    /// Returns the total capacity in bits.
    #[inline]
    pub fn capacity_bits(&self) -> usize {
        self.data.len() * 8
    }

    /// Returns the remaining bits that can be read.
    #[inline]
    pub fn remaining_bits(&self) -> usize {
        self.capacity_bits().saturating_sub(self.index.get())
    }

    /// Returns true if there are more bits to read.
    #[inline]
    pub fn has_next(&self) -> bool {
        self.index.get() < self.capacity_bits()
    }
}
