//! Parcel - Sequential Wire Buffer
//!
//! A parcel carries flat data plus a side table of object references.
//!
//! # Layout
//!
//! ```text
//! scalar:     +----------------+
//!             | value (4) LE   |   i32, u32, bool (0 / 1)
//!             +----------------+
//!
//! reference:  +----------------+----------------+
//!             | kind (4) LE    | index (4) LE   |   kind 0 = null, 1 = binder
//!             +----------------+----------------+
//! ```
//!
//! Every field is a multiple of four bytes, so the layout never needs padding.
//! Writes always append; reads consume from the read position. Each primitive
//! checks its bounds before touching the buffer, so a failed write leaves the
//! data exactly as it was before that primitive.

use std::fmt;

use crate::binder::Binder;
use crate::config::ParcelConfig;
use crate::error::ParcelError;

/// Default maximum data size (1 MiB)
pub const DEFAULT_MAX_PARCEL_SIZE: usize = 1024 * 1024;

/// Default initial data capacity
pub const DEFAULT_INITIAL_CAPACITY: usize = 256;

/// Size of one scalar word
pub const WORD_SIZE: usize = 4;

/// Size of an inline object reference (kind word plus table index)
pub const OBJECT_REFERENCE_SIZE: usize = 2 * WORD_SIZE;

/// Kind word of a null reference
const KIND_NULL: u32 = 0;

/// Kind word of a binder reference
const KIND_BINDER: u32 = 1;

/// Sequential, fail-fast encode/decode buffer
pub struct Parcel {
    data: Vec<u8>,
    objects: Vec<Binder>,
    read_pos: usize,
    max_size: usize,
}

impl Default for Parcel {
    fn default() -> Self {
        Self::new()
    }
}

impl Parcel {
    /// Create an empty parcel with the default limits
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&ParcelConfig::default())
    }

    /// Create an empty parcel with configured limits
    #[must_use]
    pub fn with_config(config: &ParcelConfig) -> Self {
        Self {
            data: Vec::with_capacity(config.initial_capacity.min(config.max_size_bytes)),
            objects: Vec::new(),
            read_pos: 0,
            max_size: config.max_size_bytes,
        }
    }

    /// Build a parcel from raw parts, positioned for reading
    #[must_use]
    pub fn from_raw(data: Vec<u8>, objects: Vec<Binder>) -> Self {
        let max_size = DEFAULT_MAX_PARCEL_SIZE.max(data.len());
        Self {
            data,
            objects,
            read_pos: 0,
            max_size,
        }
    }

    /// Flat data written so far
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size of the flat data in bytes
    #[must_use]
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    /// Current read position
    #[must_use]
    pub fn data_position(&self) -> usize {
        self.read_pos
    }

    /// Move the read position (clamped to the data size)
    pub fn set_data_position(&mut self, pos: usize) {
        self.read_pos = pos.min(self.data.len());
    }

    /// Bytes left to read
    #[must_use]
    pub fn data_avail(&self) -> usize {
        self.data.len() - self.read_pos
    }

    /// Number of entries in the object table
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Maximum data size this parcel accepts
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    // -------------------------------------------------------------------------
    // Writing
    // -------------------------------------------------------------------------

    fn reserve_words(&self, words: usize) -> Result<(), ParcelError> {
        let requested = self.data.len() + words * WORD_SIZE;
        if requested > self.max_size {
            return Err(ParcelError::CapacityExceeded {
                requested,
                limit: self.max_size,
            });
        }
        Ok(())
    }

    /// Append a signed 32-bit integer
    pub fn write_i32(&mut self, value: i32) -> Result<(), ParcelError> {
        self.reserve_words(1)?;
        self.data.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Append an unsigned 32-bit integer
    pub fn write_u32(&mut self, value: u32) -> Result<(), ParcelError> {
        self.reserve_words(1)?;
        self.data.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Append a boolean as a 32-bit 0 or 1
    pub fn write_bool(&mut self, value: bool) -> Result<(), ParcelError> {
        self.write_u32(u32::from(value))
    }

    /// Append an object reference, null when `binder` is `None`
    pub fn write_strong_binder(&mut self, binder: Option<&Binder>) -> Result<(), ParcelError> {
        self.reserve_words(2)?;
        match binder {
            Some(binder) => {
                let index = u32::try_from(self.objects.len()).map_err(|_| {
                    ParcelError::CapacityExceeded {
                        requested: self.objects.len() + 1,
                        limit: u32::MAX as usize,
                    }
                })?;
                self.objects.push(binder.clone());
                self.data.extend_from_slice(&KIND_BINDER.to_le_bytes());
                self.data.extend_from_slice(&index.to_le_bytes());
            }
            None => {
                self.data.extend_from_slice(&KIND_NULL.to_le_bytes());
                self.data.extend_from_slice(&0u32.to_le_bytes());
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Reading
    // -------------------------------------------------------------------------

    fn read_word(&mut self) -> Result<[u8; WORD_SIZE], ParcelError> {
        let available = self.data_avail();
        if available < WORD_SIZE {
            return Err(ParcelError::NotEnoughData {
                needed: WORD_SIZE,
                available,
            });
        }
        let mut word = [0u8; WORD_SIZE];
        word.copy_from_slice(&self.data[self.read_pos..self.read_pos + WORD_SIZE]);
        self.read_pos += WORD_SIZE;
        Ok(word)
    }

    /// Read a signed 32-bit integer
    pub fn read_i32(&mut self) -> Result<i32, ParcelError> {
        self.read_word().map(i32::from_le_bytes)
    }

    /// Read an unsigned 32-bit integer
    pub fn read_u32(&mut self) -> Result<u32, ParcelError> {
        self.read_word().map(u32::from_le_bytes)
    }

    /// Read a boolean written by [`Parcel::write_bool`]
    pub fn read_bool(&mut self) -> Result<bool, ParcelError> {
        match self.read_u32()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ParcelError::BadValue(format!(
                "boolean must be 0 or 1, got {other}"
            ))),
        }
    }

    /// Read a non-null object reference
    ///
    /// # Errors
    ///
    /// Returns `ParcelError::UnexpectedNull` if the reference is null.
    pub fn read_strong_binder(&mut self) -> Result<Binder, ParcelError> {
        self.read_nullable_strong_binder()?
            .ok_or(ParcelError::UnexpectedNull)
    }

    /// Read an object reference that may be null
    pub fn read_nullable_strong_binder(&mut self) -> Result<Option<Binder>, ParcelError> {
        let kind = self.read_u32()?;
        let index = self.read_u32()?;
        match kind {
            KIND_NULL if index == 0 => Ok(None),
            KIND_NULL => Err(ParcelError::BadValue(format!(
                "null reference carries index {index}"
            ))),
            KIND_BINDER => self
                .objects
                .get(index as usize)
                .cloned()
                .map(Some)
                .ok_or(ParcelError::BadObjectIndex(index)),
            other => Err(ParcelError::BadObjectKind(other)),
        }
    }
}

impl fmt::Debug for Parcel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parcel")
            .field("data_size", &self.data.len())
            .field("objects", &self.objects.len())
            .field("read_pos", &self.read_pos)
            .field("max_size", &self.max_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_layout_is_little_endian() {
        let mut parcel = Parcel::new();
        parcel.write_i32(-2).unwrap();
        parcel.write_u32(0x0102_0304).unwrap();
        parcel.write_bool(true).unwrap();

        assert_eq!(
            parcel.data(),
            &[0xFE, 0xFF, 0xFF, 0xFF, 0x04, 0x03, 0x02, 0x01, 0x01, 0x00, 0x00, 0x00]
        );

        assert_eq!(parcel.read_i32().unwrap(), -2);
        assert_eq!(parcel.read_u32().unwrap(), 0x0102_0304);
        assert!(parcel.read_bool().unwrap());
        assert_eq!(parcel.data_avail(), 0);
    }

    #[test]
    fn test_null_reference_uses_no_table_slot() {
        let mut parcel = Parcel::new();
        parcel.write_strong_binder(None).unwrap();

        assert_eq!(parcel.data_size(), 8);
        assert_eq!(parcel.object_count(), 0);
        assert!(parcel.read_nullable_strong_binder().unwrap().is_none());
    }

    #[test]
    fn test_reference_preserves_identity() {
        let token = Binder::token("test.Token");
        let mut parcel = Parcel::new();
        parcel.write_strong_binder(Some(&token)).unwrap();

        let read = parcel.read_strong_binder().unwrap();
        assert!(Binder::ptr_eq(&read, &token));
    }

    #[test]
    fn test_required_reference_rejects_null() {
        let mut parcel = Parcel::new();
        parcel.write_strong_binder(None).unwrap();

        assert_eq!(
            parcel.read_strong_binder().unwrap_err(),
            ParcelError::UnexpectedNull
        );
    }

    #[test]
    fn test_read_past_end() {
        let mut parcel = Parcel::from_raw(vec![1, 2], Vec::new());
        assert_eq!(
            parcel.read_u32().unwrap_err(),
            ParcelError::NotEnoughData {
                needed: 4,
                available: 2
            }
        );
    }

    #[test]
    fn test_bad_boolean() {
        let mut parcel = Parcel::from_raw(7u32.to_le_bytes().to_vec(), Vec::new());
        assert!(matches!(parcel.read_bool(), Err(ParcelError::BadValue(_))));
    }

    #[test]
    fn test_bad_object_index_and_kind() {
        let mut data = Vec::new();
        data.extend_from_slice(&KIND_BINDER.to_le_bytes());
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&9u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        let mut parcel = Parcel::from_raw(data, Vec::new());

        assert_eq!(
            parcel.read_nullable_strong_binder().unwrap_err(),
            ParcelError::BadObjectIndex(3)
        );
        assert_eq!(
            parcel.read_nullable_strong_binder().unwrap_err(),
            ParcelError::BadObjectKind(9)
        );
    }

    #[test]
    fn test_null_reference_with_index_is_rejected() {
        let mut data = Vec::new();
        data.extend_from_slice(&KIND_NULL.to_le_bytes());
        data.extend_from_slice(&5u32.to_le_bytes());
        let mut parcel = Parcel::from_raw(data, Vec::new());

        assert!(matches!(
            parcel.read_nullable_strong_binder(),
            Err(ParcelError::BadValue(_))
        ));
    }

    #[test]
    fn test_capacity_limit_leaves_data_untouched() {
        let config = ParcelConfig {
            max_size_bytes: 16,
            initial_capacity: 16,
        };
        let mut parcel = Parcel::with_config(&config);
        parcel.write_u32(1).unwrap();
        parcel.write_u32(2).unwrap();
        parcel.write_u32(3).unwrap();

        let token = Binder::token("test.Token");
        let err = parcel.write_strong_binder(Some(&token)).unwrap_err();
        assert_eq!(
            err,
            ParcelError::CapacityExceeded {
                requested: 20,
                limit: 16
            }
        );
        assert_eq!(parcel.data_size(), 12);
        assert_eq!(parcel.object_count(), 0);

        parcel.write_u32(4).unwrap();
        assert!(parcel.write_bool(false).is_err());
    }

    #[test]
    fn test_set_data_position_clamps() {
        let mut parcel = Parcel::new();
        parcel.write_u32(5).unwrap();
        parcel.set_data_position(100);
        assert_eq!(parcel.data_position(), 4);
        parcel.set_data_position(0);
        assert_eq!(parcel.read_u32().unwrap(), 5);
    }
}
