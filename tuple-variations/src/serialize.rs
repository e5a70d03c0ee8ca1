//! An append-only serializer with sticky error tracking.
//!
//! Modeled on HarfBuzz's `hb_serialize_context_t`: the first failure is
//! recorded in [`SerializeErrorFlags`] and every later operation becomes a
//! no-op that reports the accumulated flags.

use font_types::Scalar;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerializeErrorFlags(u16);

impl SerializeErrorFlags {
    pub const SERIALIZE_ERROR_NONE: Self = Self(0x0000);
    pub const SERIALIZE_ERROR_OTHER: Self = Self(0x0001);
    pub const SERIALIZE_ERROR_OFFSET_OVERFLOW: Self = Self(0x0002);
    pub const SERIALIZE_ERROR_OUT_OF_ROOM: Self = Self(0x0004);
    pub const SERIALIZE_ERROR_INT_OVERFLOW: Self = Self(0x0008);
    pub const SERIALIZE_ERROR_ARRAY_OVERFLOW: Self = Self(0x0010);

    /// Returns `true` if every flag in `other` is also set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for SerializeErrorFlags {
    fn default() -> Self {
        Self::SERIALIZE_ERROR_NONE
    }
}

impl std::ops::BitOrAssign for SerializeErrorFlags {
    /// Adds the set of flags.
    #[inline]
    fn bitor_assign(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl std::ops::Not for SerializeErrorFlags {
    type Output = bool;
    #[inline]
    fn not(self) -> bool {
        self == SerializeErrorFlags::SERIALIZE_ERROR_NONE
    }
}

/// A growable output buffer with a hard size limit.
#[derive(Debug, Default)]
pub struct Serializer {
    data: Vec<u8>,
    max_size: usize,
    errors: SerializeErrorFlags,
}

impl Serializer {
    /// Create a serializer that will refuse to grow beyond `max_size` bytes.
    pub fn new(max_size: usize) -> Self {
        Serializer {
            data: Vec::new(),
            max_size,
            errors: SerializeErrorFlags::default(),
        }
    }

    /// Current length of the output.
    pub fn head(&self) -> usize {
        self.data.len()
    }

    // Embed a single scalar, returning the position it was written at
    pub fn embed(&mut self, obj: impl Scalar) -> Result<usize, SerializeErrorFlags> {
        let raw = obj.to_raw();
        let bytes = raw.as_ref();
        let size = bytes.len();

        let pos = self.allocate_size(size)?;
        self.data[pos..pos + size].copy_from_slice(bytes);
        Ok(pos)
    }

    pub fn embed_bytes(&mut self, bytes: &[u8]) -> Result<usize, SerializeErrorFlags> {
        let pos = self.allocate_size(bytes.len())?;
        self.data[pos..pos + bytes.len()].copy_from_slice(bytes);
        Ok(pos)
    }

    /// Reserve `size` zeroed bytes at the end of the output.
    pub fn allocate_size(&mut self, size: usize) -> Result<usize, SerializeErrorFlags> {
        if self.in_error() {
            return Err(self.errors);
        }

        let pos = self.data.len();
        let Some(new_len) = pos.checked_add(size).filter(|len| *len <= self.max_size) else {
            return Err(self.set_err(SerializeErrorFlags::SERIALIZE_ERROR_OUT_OF_ROOM));
        };
        if self.data.try_reserve(size).is_err() {
            return Err(self.set_err(SerializeErrorFlags::SERIALIZE_ERROR_OUT_OF_ROOM));
        }
        self.data.resize(new_len, 0);
        Ok(pos)
    }

    /// Overwrite a previously written scalar at `pos`.
    pub fn copy_assign(&mut self, pos: usize, obj: impl Scalar) -> Result<(), SerializeErrorFlags> {
        if self.in_error() {
            return Err(self.errors);
        }
        let raw = obj.to_raw();
        let bytes = raw.as_ref();
        match self.data.get_mut(pos..pos.saturating_add(bytes.len())) {
            Some(out) if out.len() == bytes.len() => {
                out.copy_from_slice(bytes);
                Ok(())
            }
            _ => Err(self.set_err(SerializeErrorFlags::SERIALIZE_ERROR_OTHER)),
        }
    }

    /// Write `value` into the u16 field at `pos`, flagging `err` if it does
    /// not fit.
    pub fn check_assign_u16(
        &mut self,
        pos: usize,
        value: usize,
        err: SerializeErrorFlags,
    ) -> Result<(), SerializeErrorFlags> {
        match u16::try_from(value) {
            Ok(value) => self.copy_assign(pos, value),
            Err(_) => Err(self.set_err(err)),
        }
    }

    pub fn successful(&self) -> bool {
        !self.errors
    }

    pub fn in_error(&self) -> bool {
        !!self.errors
    }

    pub fn errors(&self) -> SerializeErrorFlags {
        self.errors
    }

    pub fn set_err(&mut self, error_type: SerializeErrorFlags) -> SerializeErrorFlags {
        self.errors |= error_type;
        self.errors
    }

    pub fn copy_bytes(self) -> Result<Vec<u8>, SerializeErrorFlags> {
        if !self.successful() {
            return Err(self.errors);
        }
        Ok(self.data)
    }
}
