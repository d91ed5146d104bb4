//! Flattening descriptors and their pixel stores into bytes.
//!
//! All fields are little endian and four bytes wide, booleans included. A descriptor is written as
//!
//! ```text
//! width: i32, height: i32, row_bytes: i32, format: i32, opaque: bool, tag: u32
//! ```
//!
//! followed, for the tag `1`, by the store offset as `u32`, the factory name as a `u32` length and
//! UTF-8 bytes, and the payload written by the store backend. The tag `0` means no pixels follow.
//! Stores without a factory, or whose backend can not encode its content, are written with tag
//! `0`.
use std::collections::HashMap;
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::bitmap::Bitmap;
use crate::error::{BitmapError, DecodeError};
use crate::format::PixelFormat;
use crate::store::{MemoryBackend, PixelStore};

const NO_PIXELS: u32 = 0;
const STORE_PIXELS: u32 = 1;

/// A growable buffer for flattened data.
#[derive(Clone, Debug, Default)]
pub struct WriteBuffer {
    inner: BytesMut,
}

/// A cursor over flattened data.
#[derive(Clone, Debug, Default)]
pub struct ReadBuffer {
    inner: Bytes,
}

/// Recreates a pixel store from the payload its backend flattened.
pub type StoreFactory = fn(&mut ReadBuffer) -> Result<PixelStore, DecodeError>;

/// The store factories known to deserialization, by name.
#[derive(Clone, Debug)]
pub struct StoreRegistry {
    factories: HashMap<&'static str, StoreFactory>,
}

impl WriteBuffer {
    pub fn new() -> Self {
        WriteBuffer::default()
    }

    pub fn write_u32(&mut self, value: u32) {
        self.inner.put_u32_le(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.inner.put_i32_le(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u32(value.into());
    }

    /// Append raw bytes, without a length.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.inner.put_slice(bytes);
    }

    /// Append a string with its length.
    ///
    /// # Panics
    ///
    /// If the string is longer than `u32::MAX` bytes.
    pub fn write_str(&mut self, value: &str) {
        assert!(value.len() <= u32::MAX as usize, "String of {} bytes", value.len());
        self.write_u32(value.len() as u32);
        self.write_bytes(value.as_bytes());
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }

    pub fn freeze(self) -> Bytes {
        self.inner.freeze()
    }
}

impl ReadBuffer {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        ReadBuffer {
            inner: bytes.into(),
        }
    }

    /// Read from a copy of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Self {
        ReadBuffer::new(Bytes::copy_from_slice(bytes))
    }

    /// The number of bytes that have not been read.
    pub fn remaining(&self) -> usize {
        self.inner.remaining()
    }

    fn ensure(&self, len: usize) -> Result<(), DecodeError> {
        match len.checked_sub(self.inner.remaining()) {
            Some(needed) if needed > 0 => Err(DecodeError::UnexpectedEnd { needed }),
            _ => Ok(()),
        }
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.ensure(4)?;
        Ok(self.inner.get_u32_le())
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.ensure(4)?;
        Ok(self.inner.get_i32_le())
    }

    /// Read a boolean, any value other than zero is true.
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u32()? != 0)
    }

    /// Read exactly `len` raw bytes, without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes, DecodeError> {
        self.ensure(len)?;
        Ok(self.inner.split_to(len))
    }

    /// Read a string written by [`WriteBuffer::write_str`].
    pub fn read_str(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u32()?;
        let len = usize::try_from(len).map_err(|_| DecodeError::InvalidLength(len.into()))?;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }
}

impl StoreRegistry {
    /// A registry without any factory.
    pub fn new() -> Self {
        StoreRegistry {
            factories: HashMap::new(),
        }
    }

    /// A registry knowing the stores of this crate.
    pub fn with_defaults() -> Self {
        let mut registry = StoreRegistry::new();
        registry.register(MemoryBackend::FACTORY, MemoryBackend::unflatten);
        registry
    }

    /// Add a factory, returning the one previously registered under the name.
    pub fn register(&mut self, name: &'static str, factory: StoreFactory) -> Option<StoreFactory> {
        self.factories.insert(name, factory)
    }

    pub fn get(&self, name: &str) -> Option<StoreFactory> {
        self.factories.get(name).copied()
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        StoreRegistry::with_defaults()
    }
}

impl Bitmap {
    /// Write the descriptor and, if possible, the content of its store.
    pub fn flatten(&self, buffer: &mut WriteBuffer) {
        // Configuration keeps all of these within `i32`.
        buffer.write_i32(self.width() as i32);
        buffer.write_i32(self.height() as i32);
        buffer.write_i32(self.row_bytes() as i32);
        buffer.write_i32(self.format() as i32);
        buffer.write_bool(self.is_opaque());

        match self.store_payload() {
            Some((offset, factory, payload)) => {
                buffer.write_u32(STORE_PIXELS);
                buffer.write_u32(offset);
                buffer.write_str(factory);
                buffer.write_bytes(&payload);
            }
            None => buffer.write_u32(NO_PIXELS),
        }
    }

    fn store_payload(&self) -> Option<(u32, &'static str, Bytes)> {
        let store = self.store()?;
        let Some(factory) = store.factory() else {
            tracing::debug!("Pixel store has no factory, flattening without pixels");
            return None;
        };

        let offset = u32::try_from(self.store_offset()).ok()?;
        let mut payload = WriteBuffer::new();
        if !store.flatten(&mut payload) {
            tracing::debug!(factory, "Pixel store declined to flatten, flattening without pixels");
            return None;
        }

        Some((offset, factory, payload.freeze()))
    }

    /// Replace this descriptor with one read from `buffer`.
    ///
    /// Stores are recreated by the factory registered under their name. On failure the descriptor
    /// is left empty.
    pub fn unflatten(
        &mut self,
        buffer: &mut ReadBuffer,
        registry: &StoreRegistry,
    ) -> Result<(), BitmapError> {
        self.reset();
        let result = self.unflatten_fields(buffer, registry);
        if result.is_err() {
            self.reset();
        }

        result
    }

    fn unflatten_fields(
        &mut self,
        buffer: &mut ReadBuffer,
        registry: &StoreRegistry,
    ) -> Result<(), BitmapError> {
        let width = buffer.read_i32()?;
        let height = buffer.read_i32()?;
        let row_bytes = buffer.read_i32()?;
        let format = buffer.read_i32()?;
        let opaque = buffer.read_bool()?;

        let format = PixelFormat::from_i32(format).ok_or(DecodeError::UnknownFormat(format))?;
        let row_bytes = usize::try_from(row_bytes)
            .map_err(|_| DecodeError::InvalidLength(u64::from(row_bytes as u32)))?;

        self.configure(format, width, height, row_bytes)?;
        self.set_is_opaque(opaque);

        match buffer.read_u32()? {
            NO_PIXELS => Ok(()),
            STORE_PIXELS => {
                let offset = buffer.read_u32()?;
                let name = buffer.read_str()?;
                let factory = registry
                    .get(&name)
                    .ok_or(DecodeError::UnknownFactory(name))?;
                let store = factory(buffer)?;

                let offset_bytes = offset as usize;
                if offset_bytes % format.alignment() != 0 {
                    return Err(DecodeError::MisalignedOffset { offset, format }.into());
                }

                self.attach_store(Some(Arc::new(store)), offset_bytes);
                Ok(())
            }
            tag => Err(DecodeError::UnknownPixelTag(tag).into()),
        }
    }
}
