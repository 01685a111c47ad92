//! Shared memory: `SharedArrayBuffer` plus atomic typed views.
//!
//! The buffer is a word array of `AtomicU32` behind an `Arc`, so clones of
//! the buffer and its views alias the same memory across threads. Views add
//! an element kind, byte offset and length on top; every access is bounds
//! checked and every operation is sequentially consistent, which is what the
//! `Atomics` namespace requires.
//!
//! Lanes narrower than a word are implemented with compare-exchange loops on
//! the containing word. Lane layout within a word is little-endian, so a
//! byte view and a word view over the same buffer compose the way they do on
//! little-endian hosts. 64-bit element kinds are out of scope here; BigInt
//! values live behind [`core_types::Value::BigInt`] and have no shared-memory
//! lane.

use core_types::{JsError, JsResult};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A shared, fixed-length byte buffer.
///
/// Cloning shares the underlying memory; `same_buffer` tells clones apart
/// from distinct allocations.
#[derive(Debug, Clone)]
pub struct SharedArrayBuffer {
    words: Arc<[AtomicU32]>,
    byte_length: usize,
}

impl SharedArrayBuffer {
    /// Allocates a zero-filled buffer of `byte_length` bytes.
    pub fn new(byte_length: usize) -> SharedArrayBuffer {
        let words = (0..byte_length.div_ceil(4))
            .map(|_| AtomicU32::new(0))
            .collect();
        SharedArrayBuffer { words, byte_length }
    }

    /// Length in bytes.
    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    /// Whether two handles alias the same memory.
    pub fn same_buffer(&self, other: &SharedArrayBuffer) -> bool {
        Arc::ptr_eq(&self.words, &other.words)
    }

    fn word(&self, byte: usize) -> &AtomicU32 {
        &self.words[byte / 4]
    }
}

/// Element encoding of a typed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Signed 8-bit integers.
    Int8,
    /// Unsigned 8-bit integers.
    Uint8,
    /// Signed 16-bit integers.
    Int16,
    /// Unsigned 16-bit integers.
    Uint16,
    /// Signed 32-bit integers.
    Int32,
    /// Unsigned 32-bit integers.
    Uint32,
}

impl ElementKind {
    /// Element size in bytes.
    pub fn byte_size(self) -> usize {
        match self {
            ElementKind::Int8 | ElementKind::Uint8 => 1,
            ElementKind::Int16 | ElementKind::Uint16 => 2,
            ElementKind::Int32 | ElementKind::Uint32 => 4,
        }
    }

    fn lane_bits(self) -> u32 {
        self.byte_size() as u32 * 8
    }

    fn lane_mask(self) -> u32 {
        match self.lane_bits() {
            32 => u32::MAX,
            bits => (1u32 << bits) - 1,
        }
    }

    /// Wraps an integer into this kind's lane, modulo 2^bits.
    fn to_lane(self, value: i64) -> u32 {
        (value as u32) & self.lane_mask()
    }

    /// Reads a lane back out as the kind's value, sign-extending if signed.
    fn from_lane(self, lane: u32) -> i64 {
        match self {
            ElementKind::Int8 => (lane as u8 as i8) as i64,
            ElementKind::Uint8 => (lane & 0xFF) as i64,
            ElementKind::Int16 => (lane as u16 as i16) as i64,
            ElementKind::Uint16 => (lane & 0xFFFF) as i64,
            ElementKind::Int32 => (lane as i32) as i64,
            ElementKind::Uint32 => lane as i64,
        }
    }
}

/// A typed window onto a [`SharedArrayBuffer`].
///
/// All operations are atomic with sequentially consistent ordering.
/// Read-modify-write operations return the value the element held before
/// the operation, matching the `Atomics` contract.
#[derive(Debug, Clone)]
pub struct SharedTypedView {
    buffer: SharedArrayBuffer,
    kind: ElementKind,
    byte_offset: usize,
    length: usize,
}

impl SharedTypedView {
    /// View of `length` elements starting `byte_offset` bytes into
    /// `buffer`.
    ///
    /// The offset must be a multiple of the element size and the view must
    /// fit inside the buffer.
    pub fn new(
        buffer: SharedArrayBuffer,
        kind: ElementKind,
        byte_offset: usize,
        length: usize,
    ) -> JsResult<SharedTypedView> {
        let size = kind.byte_size();
        if byte_offset % size != 0 {
            return Err(JsError::range_error(
                "start offset is not a multiple of the element size",
            ));
        }
        let byte_end = length
            .checked_mul(size)
            .and_then(|bytes| byte_offset.checked_add(bytes))
            .ok_or_else(|| JsError::range_error("view length overflows"))?;
        if byte_end > buffer.byte_length() {
            return Err(JsError::range_error(
                "view extends past the end of the buffer",
            ));
        }
        Ok(SharedTypedView {
            buffer,
            kind,
            byte_offset,
            length,
        })
    }

    /// View covering the whole buffer.
    pub fn for_buffer(buffer: SharedArrayBuffer, kind: ElementKind) -> JsResult<SharedTypedView> {
        let size = kind.byte_size();
        if buffer.byte_length() % size != 0 {
            return Err(JsError::range_error(
                "buffer length is not a multiple of the element size",
            ));
        }
        let length = buffer.byte_length() / size;
        SharedTypedView::new(buffer, kind, 0, length)
    }

    /// Number of elements.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Whether the view has no elements.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Element encoding.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Offset into the buffer, in bytes.
    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    /// The underlying buffer.
    pub fn buffer(&self) -> &SharedArrayBuffer {
        &self.buffer
    }

    fn element_byte(&self, index: usize) -> JsResult<usize> {
        if index >= self.length {
            return Err(JsError::range_error("index out of bounds"));
        }
        Ok(self.byte_offset + index * self.kind.byte_size())
    }

    fn lane_shift(&self, byte: usize) -> u32 {
        // Little-endian lane packing within the word.
        (byte % 4) as u32 * 8
    }

    /// Atomically reads the element at `index`.
    pub fn load(&self, index: usize) -> JsResult<i64> {
        let byte = self.element_byte(index)?;
        let word = self.buffer.word(byte).load(Ordering::SeqCst);
        let lane = (word >> self.lane_shift(byte)) & self.kind.lane_mask();
        Ok(self.kind.from_lane(lane))
    }

    /// Atomically stores `value` (wrapped to the element kind) at `index`.
    ///
    /// Returns the value as stored.
    pub fn store(&self, index: usize, value: i64) -> JsResult<i64> {
        let byte = self.element_byte(index)?;
        let lane = self.kind.to_lane(value);
        if self.kind.byte_size() == 4 {
            self.buffer.word(byte).store(lane, Ordering::SeqCst);
        } else {
            self.rmw_subword(byte, |_| lane);
        }
        Ok(self.kind.from_lane(lane))
    }

    /// Atomic add; returns the previous value.
    pub fn add(&self, index: usize, value: i64) -> JsResult<i64> {
        self.rmw(index, value, |lane, operand| lane.wrapping_add(operand))
    }

    /// Atomic subtract; returns the previous value.
    pub fn sub(&self, index: usize, value: i64) -> JsResult<i64> {
        self.rmw(index, value, |lane, operand| lane.wrapping_sub(operand))
    }

    /// Atomic bitwise and; returns the previous value.
    pub fn and(&self, index: usize, value: i64) -> JsResult<i64> {
        self.rmw(index, value, |lane, operand| lane & operand)
    }

    /// Atomic bitwise or; returns the previous value.
    pub fn or(&self, index: usize, value: i64) -> JsResult<i64> {
        self.rmw(index, value, |lane, operand| lane | operand)
    }

    /// Atomic bitwise xor; returns the previous value.
    pub fn xor(&self, index: usize, value: i64) -> JsResult<i64> {
        self.rmw(index, value, |lane, operand| lane ^ operand)
    }

    /// Atomic swap; returns the previous value.
    pub fn exchange(&self, index: usize, value: i64) -> JsResult<i64> {
        self.rmw(index, value, |_, operand| operand)
    }

    /// Atomic compare-and-swap.
    ///
    /// Stores `replacement` only if the element equals `expected`; returns
    /// the previous value either way.
    pub fn compare_exchange(&self, index: usize, expected: i64, replacement: i64) -> JsResult<i64> {
        let byte = self.element_byte(index)?;
        let expected_lane = self.kind.to_lane(expected);
        let replacement_lane = self.kind.to_lane(replacement);

        if self.kind.byte_size() == 4 {
            let old = match self.buffer.word(byte).compare_exchange(
                expected_lane,
                replacement_lane,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(old) => old,
                Err(old) => old,
            };
            return Ok(self.kind.from_lane(old));
        }

        let shift = self.lane_shift(byte);
        let mask = self.kind.lane_mask() << shift;
        let word = self.buffer.word(byte);
        let mut current = word.load(Ordering::SeqCst);
        loop {
            let lane = (current & mask) >> shift;
            if lane != expected_lane {
                return Ok(self.kind.from_lane(lane));
            }
            let next = (current & !mask) | (replacement_lane << shift);
            match word.compare_exchange_weak(current, next, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => return Ok(self.kind.from_lane(lane)),
                Err(actual) => current = actual,
            }
        }
    }

    fn rmw(&self, index: usize, value: i64, op: impl Fn(u32, u32) -> u32) -> JsResult<i64> {
        let byte = self.element_byte(index)?;
        let operand = self.kind.to_lane(value);
        let old = if self.kind.byte_size() == 4 {
            self.rmw_word(byte, operand, op)
        } else {
            self.rmw_subword(byte, |lane| op(lane, operand))
        };
        Ok(self.kind.from_lane(old))
    }

    /// Full-word lanes map straight onto the hardware operation.
    fn rmw_word(&self, byte: usize, operand: u32, op: impl Fn(u32, u32) -> u32) -> u32 {
        let word = self.buffer.word(byte);
        let mut current = word.load(Ordering::SeqCst);
        loop {
            let next = op(current, operand);
            match word.compare_exchange_weak(current, next, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(old) => return old,
                Err(actual) => current = actual,
            }
        }
    }

    /// Narrow lanes splice their bits into the containing word under a
    /// compare-exchange loop, leaving neighbor lanes untouched.
    fn rmw_subword(&self, byte: usize, op: impl Fn(u32) -> u32) -> u32 {
        let shift = self.lane_shift(byte);
        let mask = self.kind.lane_mask() << shift;
        let word = self.buffer.word(byte);
        let mut current = word.load(Ordering::SeqCst);
        loop {
            let lane = (current & mask) >> shift;
            let next_lane = op(lane) & self.kind.lane_mask();
            let next = (current & !mask) | (next_lane << shift);
            match word.compare_exchange_weak(current, next, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => return lane,
                Err(actual) => current = actual,
            }
        }
    }
}
