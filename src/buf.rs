// Distributed under The MIT License (MIT)
//
// Copyright (c) 2019 The `image-rs` developers
use core::{fmt, mem};
use std::collections::TryReserveError;

use bytemuck::{Pod, Zeroable};

/// The alignment of every pixel allocation, enough for any texel of the supported formats.
pub(crate) const MAX_ALIGN: usize = 16;

/// A chunk of bytes with the maximum alignment.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, align(16))]
pub(crate) struct MaxAligned(pub(crate) [u8; MAX_ALIGN]);

/// Allocates and manages raw pixel bytes.
///
/// The backing memory is a vector of maximally aligned chunks so that rows of 16-bit and 32-bit
/// pixels can be viewed as typed slices. Different to a plain `Vec<u8>` the capacity is rounded up
/// to whole chunks; the logical length is tracked separately and is the only length exposed.
///
/// The length of a buffer never changes after construction. Pixel views rely on this when they
/// validate their extent once, at the time a descriptor is locked.
#[derive(Clone, Default)]
pub struct Buffer {
    /// The backing memory.
    inner: Vec<MaxAligned>,
    /// The number of bytes requested.
    len: usize,
}

impl Buffer {
    const ELEMENT: MaxAligned = MaxAligned([0; MAX_ALIGN]);

    /// Allocate a new zeroed `Buffer` with a number of bytes.
    ///
    /// Panics if the allocation fails. See [`Buffer::try_new`] for the fallible version.
    pub fn new(length: usize) -> Self {
        match Self::try_new(length) {
            Ok(buffer) => buffer,
            Err(err) => panic!("Failed to allocate {length} bytes: {err}"),
        }
    }

    /// Allocate a new zeroed `Buffer`, reporting allocation failure instead of aborting.
    pub fn try_new(length: usize) -> Result<Self, TryReserveError> {
        let alloc_len = Self::alloc_len(length);
        let mut inner = Vec::new();
        inner.try_reserve_exact(alloc_len)?;
        inner.resize(alloc_len, Self::ELEMENT);

        Ok(Buffer { inner, len: length })
    }

    /// Allocate a buffer holding a copy of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TryReserveError> {
        let mut buffer = Self::try_new(bytes.len())?;
        buffer.as_bytes_mut().copy_from_slice(bytes);
        Ok(buffer)
    }

    /// The logical number of bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Retrieve the byte capacity of the allocated storage.
    pub fn capacity(&self) -> usize {
        self.inner.capacity() * mem::size_of::<MaxAligned>()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice(self.inner.as_slice())[..self.len]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut(self.inner.as_mut_slice())[..self.len]
    }

    /// Calculates the number of elements to have a byte buffer of requested length.
    fn alloc_len(length: usize) -> usize {
        const CHUNK_SIZE: usize = mem::size_of::<MaxAligned>();
        assert!(CHUNK_SIZE > 1);

        // We allocated enough chunks for at least the length. This can never overflow.
        length / CHUNK_SIZE + usize::from(length % CHUNK_SIZE != 0)
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_max_element() {
        let buf = Buffer::new(mem::size_of::<MaxAligned>());
        assert_eq!(buf.as_bytes().len(), MAX_ALIGN);
        assert_eq!(buf.capacity(), MAX_ALIGN);
    }

    #[test]
    fn length_is_exact_capacity_is_not() {
        let buf = Buffer::new(17);
        assert_eq!(buf.len(), 17);
        assert_eq!(buf.as_bytes().len(), 17);
        assert_eq!(buf.capacity(), 2 * MAX_ALIGN);
        assert!(buf.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn aligned_for_wide_texels() {
        let mut buf = Buffer::new(64);
        let words: &mut [u32] = bytemuck::cast_slice_mut(buf.as_bytes_mut());
        words[3] = 0xDEAD_BEEF;
        assert_eq!(buf.as_bytes()[12..16], 0xDEAD_BEEFu32.to_ne_bytes());
    }

    #[test]
    fn copies_bytes() {
        let buf = Buffer::from_bytes(&[1, 2, 3]).unwrap();
        assert_eq!(buf.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn oversized_allocation_fails() {
        assert!(Buffer::try_new(usize::MAX).is_err());
    }
}
