//! Byte buffers for record and handshake assembly.
//!
//! [`Buf`] wraps `Vec<u8>` and [`BufferPool`] recycles them so a session
//! reaches a steady state without allocating per record. Buffers that have
//! held secrets are wiped with [`Zeroize`] before they return to the pool.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};

use zeroize::Zeroize;

/// Pool of reusable [`Buf`] instances.
#[derive(Default)]
pub struct BufferPool {
    free: VecDeque<Buf>,
}

impl BufferPool {
    /// Take a Buffer from the pool.
    ///
    /// Creates a new buffer if none is free.
    pub fn pop(&mut self) -> Buf {
        self.free.pop_front().unwrap_or_default()
    }

    /// Return a buffer to the pool.
    ///
    /// The contents are zeroed since pooled buffers carry plaintext and keys.
    pub fn push(&mut self, mut buffer: Buf) {
        buffer.zeroize();
        self.free.push_front(buffer);
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("free", &self.free.len())
            .finish()
    }
}

/// Growable byte buffer.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Buf(Vec<u8>);

impl Buf {
    /// Create a new empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new buffer from a slice.
    pub fn from_slice(data: &[u8]) -> Self {
        Buf(data.to_vec())
    }

    /// Clear the buffer, removing all data.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Extend the buffer with a slice of bytes.
    pub fn extend_from_slice(&mut self, other: &[u8]) {
        self.0.extend_from_slice(other);
    }

    /// Push a single byte onto the buffer.
    pub fn push(&mut self, byte: u8) {
        self.0.push(byte);
    }

    /// Append a big endian u16.
    pub fn push_u16(&mut self, value: u16) {
        self.0.extend_from_slice(&value.to_be_bytes());
    }

    /// Append the low three bytes of a big endian u32.
    pub fn push_u24(&mut self, value: u32) {
        self.0.extend_from_slice(&value.to_be_bytes()[1..]);
    }

    /// Resize the buffer to the specified length, filling with the given value.
    pub fn resize(&mut self, len: usize, value: u8) {
        self.0.resize(len, value);
    }

    /// Truncate the buffer to the specified length.
    /// If `len` is greater than the buffer's current length, this has no effect.
    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    /// Remove the first `n` bytes, shifting the rest down.
    pub fn drain_front(&mut self, n: usize) {
        let n = n.min(self.0.len());
        self.0.drain(..n);
    }

    /// Write a big endian u16 at an earlier position, used to back-patch
    /// length prefixes once the body is known.
    pub fn set_u16(&mut self, pos: usize, value: u16) {
        self.0[pos..pos + 2].copy_from_slice(&value.to_be_bytes());
    }

    /// Write a big endian u24 at an earlier position.
    pub fn set_u24(&mut self, pos: usize, value: u32) {
        self.0[pos..pos + 3].copy_from_slice(&value.to_be_bytes()[1..]);
    }
}

impl Zeroize for Buf {
    fn zeroize(&mut self) {
        // Vec::zeroize wipes the full capacity and clears the length.
        self.0.zeroize();
    }
}

impl Deref for Buf {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Buf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl AsRef<[u8]> for Buf {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for Buf {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl fmt::Debug for Buf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buf").field("len", &self.0.len()).finish()
    }
}

/// Trait for types that can be converted into a `Buf`.
pub trait ToBuf {
    /// Convert this value into a `Buf`.
    fn to_buf(self) -> Buf;
}

impl ToBuf for Vec<u8> {
    fn to_buf(self) -> Buf {
        Buf(self)
    }
}

impl ToBuf for &[u8] {
    fn to_buf(self) -> Buf {
        self.to_vec().to_buf()
    }
}

/// In-place AEAD operations write the tag straight into the record buffer.
impl aes_gcm::aead::Buffer for Buf {
    fn extend_from_slice(&mut self, other: &[u8]) -> Result<(), aes_gcm::aead::Error> {
        self.0.extend_from_slice(other);
        Ok(())
    }

    fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }
}
